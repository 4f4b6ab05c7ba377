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

use std::collections::BTreeMap;

use regex::Regex;

use crate::transport::{ApiError, Config};

/// Fields parsed out of an import id
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportId(BTreeMap<String, String>);

impl ImportId {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

/// Match `id` against `formats`, in order, and return the named groups of
/// the first match.
///
/// When the first (most complete) format captures `project`, `region` or
/// `zone` but the matching one does not, the provider default is used.
pub fn parse_import_id(formats: &[&str], id: &str, config: &Config) -> Result<ImportId, ApiError> {
    for format in formats {
        let anchored = if format.starts_with('^') {
            format.to_string()
        } else {
            format!("^{format}$")
        };
        let regex = Regex::new(&anchored)
            .map_err(|err| ApiError::Vars(format!("Import is not supported. Invalid regex formats: {err}")))?;
        let Some(captures) = regex.captures(id) else {
            continue;
        };

        let mut fields = BTreeMap::new();
        for name in regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                fields.insert(name.to_owned(), value.as_str().to_owned());
            }
        }

        let full = formats.first().copied().unwrap_or_default();
        for (name, default) in [
            ("project", &config.project),
            ("region", &config.region),
            ("zone", &config.zone),
        ] {
            if fields.contains_key(name) || !full.contains(&format!("?P<{name}>")) {
                continue;
            }
            let Some(default) = default else {
                return Err(ApiError::Vars(format!(
                    "{name}: required field is not set"
                )));
            };
            fields.insert(name.to_owned(), default.clone());
        }

        return Ok(ImportId(fields));
    }

    Err(ApiError::Vars(format!(
        "Import id {id:?} doesn't match any of the accepted formats: {formats:?}"
    )))
}
