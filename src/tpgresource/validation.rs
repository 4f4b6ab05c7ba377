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

//! Attribute validators.
//!
//! Unknown and null values are skipped: they are checked again once known.

use regex::Regex;
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::as_str;

pub fn validate_enum(
    diags: &mut Diagnostics,
    value: &ValueString,
    allowed: &[&str],
    path: AttributePath,
) {
    let Some(value) = as_str(value) else {
        return;
    };
    if !allowed.contains(&value) {
        diags.error(
            "Invalid value",
            format!("expected one of {allowed:?}, got {value:?}"),
            path,
        );
    }
}

pub fn validate_regex(
    diags: &mut Diagnostics,
    value: &ValueString,
    regex: &Regex,
    path: AttributePath,
) {
    let Some(value) = as_str(value) else {
        return;
    };
    if !regex.is_match(value) {
        diags.error(
            "Invalid value",
            format!("{value:?} must match regex {:?}", regex.as_str()),
            path,
        );
    }
}

/// Length in characters, bounds included
pub fn validate_length(
    diags: &mut Diagnostics,
    value: &ValueString,
    min: usize,
    max: usize,
    path: AttributePath,
) {
    let Some(value) = as_str(value) else {
        return;
    };
    let len = value.chars().count();
    if len < min || len > max {
        diags.error(
            "Invalid length",
            format!("expected length to be in the range ({min} - {max}), got {len}"),
            path,
        );
    }
}

pub fn validate_json(diags: &mut Diagnostics, value: &ValueString, path: AttributePath) {
    let Some(value) = as_str(value) else {
        return;
    };
    if let Err(err) = serde_json::from_str::<serde_json::Value>(value) {
        diags.error("Invalid JSON", format!("{value:?} contains invalid JSON: {err}"), path);
    }
}

pub fn validate_max_items<T>(
    diags: &mut Diagnostics,
    list: &ValueList<T>,
    max: usize,
    path: AttributePath,
) {
    if let Value::Value(items) = list {
        if items.len() > max {
            diags.error(
                "Too many blocks",
                format!("at most {max} allowed, got {}", items.len()),
                path,
            );
        }
    }
}

/// `first` and `second` cannot be both set
pub fn validate_conflict(
    diags: &mut Diagnostics,
    (first, first_set): (&str, bool),
    (second, second_set): (&str, bool),
    path: AttributePath,
) {
    if first_set && second_set {
        diags.error(
            "Conflicting attributes",
            format!("{first:?} conflicts with {second:?}: only one of them can be set"),
            path,
        );
    }
}

/// The attribute is set in the configuration, possibly to an unknown value
pub fn is_set<T>(value: &Value<T>) -> bool {
    !value.is_null()
}

/// GCP resource name: lowercase letters, digits and dashes, starting with a
/// letter, at most 63 characters.
pub fn gcp_name_regex() -> &'static Regex {
    lazy_static::lazy_static! {
        static ref GCP_NAME: Regex =
            Regex::new(r"^(?:[a-z](?:[-a-z0-9]{0,61}[a-z0-9])?)$").expect("gcp name regex is valid");
    }
    &GCP_NAME
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use super::*;

    fn string(value: &str) -> ValueString<'_> {
        Value::Value(Cow::Borrowed(value))
    }

    #[test]
    fn enums() {
        let mut diags = Diagnostics::default();
        let allowed = ["GLOBAL", "REGIONAL"];
        validate_enum(&mut diags, &string("GLOBAL"), &allowed, AttributePath::new("access_type"));
        validate_enum(&mut diags, &Value::Unknown, &allowed, AttributePath::new("access_type"));
        assert!(diags.errors.is_empty());
        validate_enum(&mut diags, &string("LOCAL"), &allowed, AttributePath::new("access_type"));
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn names() {
        let mut diags = Diagnostics::default();
        validate_regex(&mut diags, &string("my-env-1"), gcp_name_regex(), AttributePath::new("name"));
        assert!(diags.errors.is_empty());
        validate_regex(&mut diags, &string("My_Env"), gcp_name_regex(), AttributePath::new("name"));
        validate_regex(&mut diags, &string("env-"), gcp_name_regex(), AttributePath::new("name"));
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn lengths_count_characters() {
        let mut diags = Diagnostics::default();
        validate_length(&mut diags, &string("ééé"), 0, 3, AttributePath::new("display_name"));
        assert!(diags.errors.is_empty());
        validate_length(&mut diags, &string("abcd"), 0, 3, AttributePath::new("display_name"));
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn json() {
        let mut diags = Diagnostics::default();
        validate_json(&mut diags, &string(r#"{"a": 1}"#), AttributePath::new("config"));
        assert!(diags.errors.is_empty());
        validate_json(&mut diags, &string("{a: 1"), AttributePath::new("config"));
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn conflicts_and_max_items() {
        let mut diags = Diagnostics::default();
        validate_conflict(&mut diags, ("saml", true), ("oidc", false), AttributePath::new("saml"));
        assert!(diags.errors.is_empty());
        validate_conflict(&mut diags, ("saml", true), ("oidc", true), AttributePath::new("saml"));
        let blocks: ValueList<i32> = Value::Value(vec![1, 2]);
        validate_max_items(&mut diags, &blocks, 1, AttributePath::new("config"));
        assert_eq!(diags.errors.len(), 2);
    }
}
