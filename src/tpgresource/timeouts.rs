// This file is part of the terraform-provider-google project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `timeouts` block shared by resources with long-running operations

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::utils::{as_str, block};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts<'a> {
    pub create: ValueString<'a>,
    pub update: ValueString<'a>,
    pub delete: ValueString<'a>,
}

pub type TimeoutsBlock<'a> = ValueList<Value<Timeouts<'a>>>;

/// Default timeouts of a resource, overridable in its `timeouts` block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl ResourceTimeouts {
    pub const fn minutes(create: u64, update: u64, delete: u64) -> Self {
        Self {
            create: Duration::from_secs(create * 60),
            update: Duration::from_secs(update * 60),
            delete: Duration::from_secs(delete * 60),
        }
    }

    pub fn block(&self) -> NestedBlock {
        let attribute = || Attribute {
            attr_type: AttributeType::String,
            description: Description::plain("Duration string, like \"20m\" or \"1h30m\""),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        };
        NestedBlock::List(Block {
            attributes: map! {
                "create" => attribute(),
                "update" => attribute(),
                "delete" => attribute(),
            },
            description: Description::plain("Timeouts of the long-running operations"),
            ..Default::default()
        })
    }

    pub fn create(&self, timeouts: &TimeoutsBlock) -> Duration {
        pick(timeouts, "create").unwrap_or(self.create)
    }

    pub fn update(&self, timeouts: &TimeoutsBlock) -> Duration {
        pick(timeouts, "update").unwrap_or(self.update)
    }

    pub fn delete(&self, timeouts: &TimeoutsBlock) -> Duration {
        pick(timeouts, "delete").unwrap_or(self.delete)
    }
}

fn pick(timeouts: &TimeoutsBlock, operation: &str) -> Option<Duration> {
    let timeouts = block(timeouts)?;
    let value = match operation {
        "create" => &timeouts.create,
        "update" => &timeouts.update,
        _ => &timeouts.delete,
    };
    parse_duration(as_str(value)?).ok()
}

pub fn validate(diags: &mut Diagnostics, timeouts: &TimeoutsBlock) {
    let Value::Value(items) = timeouts else {
        return;
    };
    if items.len() > 1 {
        diags.error_short(
            "Too many timeouts blocks: at most one is allowed",
            AttributePath::new("timeouts"),
        );
    }
    for (i, item) in items.iter().enumerate() {
        let Value::Value(item) = item else {
            continue;
        };
        for (name, value) in [
            ("create", &item.create),
            ("update", &item.update),
            ("delete", &item.delete),
        ] {
            let Some(value) = as_str(value) else {
                continue;
            };
            if let Err(err) = parse_duration(value) {
                diags.error(
                    "Invalid timeout",
                    err,
                    AttributePath::new("timeouts").index(i as i64).attribute(name),
                );
            }
        }
    }
}

/// Parse a duration like `"1h30m"`, `"45s"` or `"1.5h"`
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let invalid = || format!("time: invalid duration {input:?}");
    let s = input.strip_prefix('+').unwrap_or(input);
    if s.starts_with('-') {
        return Err(format!("time: negative duration {input:?}"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("time: missing unit in duration {input:?}"))?;
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() || number == "." {
            return Err(invalid());
        }
        let number: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1e-9,
            "us" | "µs" | "μs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(format!("time: unknown unit {unit:?} in duration {input:?}")),
        };
        total += number * scale;
        rest = tail;
    }
    Ok(Duration::from_secs_f64(total))
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("20m"), Ok(Duration::from_secs(1200)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn overrides_defaults() {
        let defaults = ResourceTimeouts::minutes(20, 20, 20);
        let timeouts: TimeoutsBlock = Value::Value(vec![Value::Value(Timeouts {
            create: Value::Value(Cow::Borrowed("1h")),
            ..Default::default()
        })]);
        assert_eq!(defaults.create(&timeouts), Duration::from_secs(3600));
        assert_eq!(defaults.delete(&timeouts), Duration::from_secs(1200));
        assert_eq!(defaults.update(&Value::Null), Duration::from_secs(1200));
    }

    #[test]
    fn reports_invalid_timeouts() {
        let timeouts: TimeoutsBlock = Value::Value(vec![Value::Value(Timeouts {
            delete: Value::Value(Cow::Borrowed("soon")),
            ..Default::default()
        })]);
        let mut diags = Diagnostics::default();
        validate(&mut diags, &timeouts);
        assert_eq!(diags.errors.len(), 1);
    }
}
