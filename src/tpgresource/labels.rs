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

//! Labels of resources supporting provider `default_labels`.
//!
//! * `labels` only holds the keys written in the configuration;
//! * `terraform_labels` is `default_labels` overlaid with `labels`, and is
//!   what gets sent to the API;
//! * `effective_labels` holds every label present on the resource.

use std::borrow::Cow;
use std::collections::BTreeMap;

use tf_provider::value::{Value, ValueMap, ValueString};
use tf_provider::Attribute;
use tf_provider::schema::{AttributeConstraint, AttributeType, Description};

use crate::transport::Config;

pub fn schema() -> [(String, Attribute); 3] {
    [
        (
            "labels".to_owned(),
            Attribute {
                attr_type: AttributeType::Map(Box::new(AttributeType::String)),
                description: Description::plain(
                    "User-defined labels. This field is non-authoritative: only the labels present in the configuration are managed. Refer to `effective_labels` for all the labels present on the resource.",
                ),
                constraint: AttributeConstraint::Optional,
                ..Default::default()
            },
        ),
        (
            "terraform_labels".to_owned(),
            Attribute {
                attr_type: AttributeType::Map(Box::new(AttributeType::String)),
                description: Description::plain(
                    "The combination of labels configured directly on the resource and default labels configured on the provider.",
                ),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        ),
        (
            "effective_labels".to_owned(),
            Attribute {
                attr_type: AttributeType::Map(Box::new(AttributeType::String)),
                description: Description::plain(
                    "All labels present on the resource, including the ones set by other clients and services.",
                ),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
        ),
    ]
}

/// Planned `terraform_labels`
pub fn terraform_labels<'a>(
    config: &Config,
    labels: &ValueMap<'a, ValueString<'a>>,
) -> ValueMap<'a, ValueString<'a>> {
    let mut merged: BTreeMap<Cow<'a, str>, ValueString<'a>> = config
        .default_labels
        .iter()
        .map(|(key, value)| (Cow::Owned(key.clone()), Value::Value(Cow::Owned(value.clone()))))
        .collect();
    match labels {
        Value::Unknown => return Value::Unknown,
        Value::Null => (),
        Value::Value(labels) => {
            for (key, value) in labels {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Value(merged)
}

/// Planned `effective_labels`: unchanged unless the labels sent change
pub fn effective_labels<'a>(
    prior_terraform_labels: &ValueMap<'a, ValueString<'a>>,
    planned_terraform_labels: &ValueMap<'a, ValueString<'a>>,
    prior_effective_labels: &ValueMap<'a, ValueString<'a>>,
) -> ValueMap<'a, ValueString<'a>> {
    if prior_terraform_labels == planned_terraform_labels && !prior_effective_labels.is_null() {
        prior_effective_labels.clone()
    } else {
        Value::Unknown
    }
}

/// Labels sent to the API. No labels is sent as an absent field, which an
/// update mask naming `labels` turns into a removal.
pub fn expand(terraform_labels: &ValueMap<'_, ValueString<'_>>) -> Option<BTreeMap<String, String>> {
    crate::utils::string_map_of(terraform_labels).filter(|labels| !labels.is_empty())
}

/// Keep the values from `api` of the keys present in `prior`
fn flatten_known<'a>(
    api: &BTreeMap<String, String>,
    prior: &ValueMap<'a, ValueString<'a>>,
) -> ValueMap<'a, ValueString<'a>> {
    match prior {
        Value::Value(prior) => Value::Value(
            prior
                .keys()
                .filter_map(|key| {
                    let value = api.get(key.as_ref())?;
                    Some((key.clone(), Value::Value(Cow::Owned(value.clone()))))
                })
                .collect(),
        ),
        _ => Value::Null,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedLabels<'a> {
    pub labels: ValueMap<'a, ValueString<'a>>,
    pub terraform_labels: ValueMap<'a, ValueString<'a>>,
    pub effective_labels: ValueMap<'a, ValueString<'a>>,
}

/// The three label attributes from the labels returned by the API
pub fn flatten<'a>(
    api: Option<BTreeMap<String, String>>,
    prior_labels: &ValueMap<'a, ValueString<'a>>,
    prior_terraform_labels: &ValueMap<'a, ValueString<'a>>,
) -> FlattenedLabels<'a> {
    let api = api.unwrap_or_default();
    FlattenedLabels {
        labels: flatten_known(&api, prior_labels),
        terraform_labels: match prior_terraform_labels {
            Value::Value(_) => flatten_known(&api, prior_terraform_labels),
            _ => Value::Value(Default::default()),
        },
        effective_labels: crate::utils::string_map(Some(api)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::utils::string_map;

    fn map(entries: &[(&str, &str)]) -> ValueMap<'static, ValueString<'static>> {
        string_map(Some(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn labels_override_defaults() {
        let config = Config {
            default_labels: [("env", "prod"), ("team", "infra")]
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            ..Default::default()
        };
        assert_eq!(
            terraform_labels(&config, &map(&[("env", "dev"), ("app", "hub")])),
            map(&[("app", "hub"), ("env", "dev"), ("team", "infra")])
        );
        assert_eq!(
            terraform_labels(&config, &Value::Null),
            map(&[("env", "prod"), ("team", "infra")])
        );
        assert_eq!(terraform_labels(&config, &Value::Unknown), Value::Unknown);
    }

    #[test]
    fn effective_labels_follow_changes() {
        let prior = map(&[("env", "dev")]);
        let effective = map(&[("env", "dev"), ("goog-managed", "true")]);
        assert_eq!(effective_labels(&prior, &prior, &effective), effective);
        assert_eq!(
            effective_labels(&prior, &map(&[("env", "prod")]), &effective),
            Value::Unknown
        );
    }

    #[test]
    fn flatten_is_non_authoritative() {
        let api = [("env", "dev"), ("goog-managed", "true"), ("team", "infra")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let flattened = flatten(
            Some(api),
            &map(&[("env", "old")]),
            &map(&[("env", "old"), ("team", "infra")]),
        );
        assert_eq!(flattened.labels, map(&[("env", "dev")]));
        assert_eq!(
            flattened.terraform_labels,
            map(&[("env", "dev"), ("team", "infra")])
        );
        assert_eq!(
            flattened.effective_labels,
            map(&[("env", "dev"), ("goog-managed", "true"), ("team", "infra")])
        );

        let imported = flatten(None, &Value::Null, &Value::Null);
        assert_eq!(imported.labels, Value::Null);
        assert_eq!(imported.terraform_labels, map(&[]));
    }
}
