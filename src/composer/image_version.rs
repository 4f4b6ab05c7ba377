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

//! Composer image versions: `composer-<composer version>-airflow-<airflow version>`

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub(super) static ref IMAGE_VERSION: Regex = Regex::new(
        r"^composer-(([0-9]+)(\.[0-9]+\.[0-9]+(-preview\.[0-9]+)?)?|latest)-airflow-(([0-9]+)((\.[0-9]+)(\.[0-9]+)?)?(-build\.[0-9]+)?)$"
    )
    .expect("image version regex is valid");
}

/// Numeric components of a version, build and preview suffixes dropped
fn components(version: &str) -> Option<Vec<u64>> {
    let version = version.split('-').next().unwrap_or(version);
    version.split('.').map(|part| part.parse().ok()).collect()
}

/// `1.10` and `1.10.0` are equal. A major-only version is an alias of every
/// version with that major.
fn versions_equivalent(a: &str, b: &str) -> bool {
    let (Some(mut a), Some(mut b)) = (components(a), components(b)) else {
        return a == b;
    };
    if a.len() == 1 || b.len() == 1 {
        return a.first() == b.first();
    }
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a == b
}

/// Both image versions select the same environment image.
///
/// `latest` matches any composer version.
pub fn image_versions_equivalent(old: &str, new: &str) -> bool {
    let (Some(old), Some(new)) = (IMAGE_VERSION.captures(old), IMAGE_VERSION.captures(new)) else {
        return false;
    };
    let group = |captures: &regex::Captures, i| {
        captures
            .get(i)
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default()
    };

    if !versions_equivalent(&group(&old, 5), &group(&new, 5)) {
        return false;
    }
    let (old_composer, new_composer) = (group(&old, 1), group(&new, 1));
    if old_composer == "latest" || new_composer == "latest" {
        return true;
    }
    versions_equivalent(&old_composer, &new_composer)
}
