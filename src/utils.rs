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

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use tf_provider::value::{Value, ValueList, ValueMap, ValueString};
use tf_provider::{AttributePath, Diagnostics, Schema};

pub(crate) type ValueStringSet<'a> = Value<BTreeSet<ValueString<'a>>>;
pub(crate) type ValueBool = Value<bool>;

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

#[async_trait]
pub(crate) trait WithValidate {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// Completes a proposed state into a planned one: computed attributes
/// missing from the configuration become unknown.
pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

pub(crate) trait ResultExt<T> {
    /// Report the error as a diagnostic, and turn the result into an option
    fn or_report(self, diags: &mut Diagnostics, summary: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn or_report(self, diags: &mut Diagnostics, summary: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                diags.root_error(summary.to_owned(), err.to_string());
                None
            }
        }
    }
}

pub(crate) fn as_str<'b>(value: &'b ValueString<'_>) -> Option<&'b str> {
    match value {
        Value::Value(value) => Some(value.as_ref()),
        _ => None,
    }
}

/// Known and non-empty string
pub(crate) fn non_empty<'b>(value: &'b ValueString<'_>) -> Option<&'b str> {
    as_str(value).filter(|value| !value.is_empty())
}

pub(crate) fn owned(value: &ValueString<'_>) -> Option<String> {
    non_empty(value).map(str::to_owned)
}

pub(crate) fn string<'a>(value: Option<String>) -> ValueString<'a> {
    match value {
        Some(value) => Value::Value(Cow::Owned(value)),
        None => Value::Null,
    }
}

/// Empty strings returned by an API are stored as null
pub(crate) fn non_empty_string<'a>(value: Option<String>) -> ValueString<'a> {
    string(value.filter(|value| !value.is_empty()))
}

/// Value read back from the API for an optional string: an empty string in
/// the configuration stays empty when the API omits the field.
pub(crate) fn api_string<'a>(prior: &ValueString<'a>, api: Option<String>) -> ValueString<'a> {
    match (prior, api) {
        (Value::Value(prior), None) if prior.is_empty() => Value::Value(prior.clone()),
        (Value::Value(prior), Some(api)) if api.is_empty() && prior.is_empty() => {
            Value::Value(prior.clone())
        }
        (_, api) => non_empty_string(api),
    }
}

/// Value read back from the API for an optional flag: APIs omit `false`
pub(crate) fn api_bool(prior: &ValueBool, api: Option<bool>) -> ValueBool {
    match (prior, api) {
        (_, Some(api)) => Value::Value(api),
        (Value::Value(_), None) => Value::Value(false),
        (_, None) => Value::Null,
    }
}

/// Planned value of an optional attribute computed from a provider default
pub(crate) fn with_default<'a>(value: &ValueString<'a>, default: Option<&str>) -> ValueString<'a> {
    match (value, default) {
        (Value::Null, Some(default)) => Value::Value(Cow::Owned(default.to_owned())),
        (Value::Null, None) => Value::Unknown,
        (value, _) => value.clone(),
    }
}

pub(crate) fn known<T: Clone>(value: &Value<T>) -> Option<T> {
    match value {
        Value::Value(value) => Some(value.clone()),
        _ => None,
    }
}

pub(crate) fn unknown_if_null<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}

pub(crate) fn strings(list: &ValueList<ValueString<'_>>) -> Option<Vec<String>> {
    match list {
        Value::Value(items) => Some(
            items
                .iter()
                .filter_map(|item| as_str(item).map(str::to_owned))
                .collect(),
        ),
        _ => None,
    }
}

pub(crate) fn string_list<'a>(items: Option<Vec<String>>) -> ValueList<ValueString<'a>> {
    match items {
        Some(items) => Value::Value(
            items
                .into_iter()
                .map(|item| Value::Value(Cow::Owned(item)))
                .collect(),
        ),
        None => Value::Null,
    }
}

pub(crate) fn set_strings(set: &ValueStringSet<'_>) -> Option<Vec<String>> {
    match set {
        Value::Value(items) => Some(
            items
                .iter()
                .filter_map(|item| as_str(item).map(str::to_owned))
                .collect(),
        ),
        _ => None,
    }
}

pub(crate) fn string_set<'a>(items: Option<Vec<String>>) -> ValueStringSet<'a> {
    match items {
        Some(items) => Value::Value(
            items
                .into_iter()
                .map(|item| Value::Value(Cow::Owned(item)))
                .collect(),
        ),
        None => Value::Null,
    }
}

pub(crate) fn string_map_of(map: &ValueMap<'_, ValueString<'_>>) -> Option<BTreeMap<String, String>> {
    match map {
        Value::Value(map) => Some(
            map.iter()
                .filter_map(|(key, value)| Some((key.to_string(), as_str(value)?.to_owned())))
                .collect(),
        ),
        _ => None,
    }
}

pub(crate) fn string_map<'a>(map: Option<BTreeMap<String, String>>) -> ValueMap<'a, ValueString<'a>> {
    match map {
        Some(map) => Value::Value(
            map.into_iter()
                .map(|(key, value)| (Cow::Owned(key), Value::Value(Cow::Owned(value))))
                .collect(),
        ),
        None => Value::Null,
    }
}

/// Content of a nested block limited to one item
pub(crate) fn block<T>(list: &ValueList<Value<T>>) -> Option<&T> {
    match list {
        Value::Value(items) => match items.first() {
            Some(Value::Value(item)) => Some(item),
            _ => None,
        },
        _ => None,
    }
}

/// Optional blocks are read back when configured, or when nothing is known
/// about them yet (after an import).
pub(crate) fn tracked<T>(blocks: &ValueList<Value<T>>) -> bool {
    blocks.is_null() || block(blocks).is_some()
}

pub(crate) fn to_block<T>(item: Option<T>) -> ValueList<Value<T>> {
    Value::Value(item.map(Value::Value).into_iter().collect())
}

pub(crate) fn blocks<T>(list: &ValueList<Value<T>>) -> impl Iterator<Item = &T> {
    let items: &[Value<T>] = match list {
        Value::Value(items) => items,
        _ => &[],
    };
    items.iter().filter_map(|item| match item {
        Value::Value(item) => Some(item),
        _ => None,
    })
}

pub struct DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    iter: RefCell<T>,
    sep: &'a str,
}

pub trait DisplayJoinable {
    type Joiner<'a>;
    fn join_with(self, sep: &str) -> Self::Joiner<'_>;
}

impl<T, I> DisplayJoinable for T
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    type Joiner<'a> = DisplayJoiner<'a, T, I>;

    fn join_with(self, sep: &str) -> Self::Joiner<'_> {
        DisplayJoiner {
            iter: RefCell::new(self),
            sep,
        }
    }
}

impl<'a, T, I> std::fmt::Display for DisplayJoiner<'a, T, I>
where
    T: Iterator<Item = I>,
    I: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sep = "";
        let mut iter = self.iter.try_borrow_mut().or(Err(std::fmt::Error))?;
        for elt in iter.by_ref() {
            f.write_str(sep)?;
            f.write_fmt(format_args!("{elt}"))?;
            sep = self.sep;
        }
        Ok(())
    }
}
