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

use lazy_static::lazy_static;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::transport::{ApiError, Config, Service};

const MAX_DEPTH: usize = 10;

/// Characters left as-is when escaping a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

lazy_static! {
    static ref VAR: Regex =
        Regex::new(r"\{\{(%?)([A-Za-z0-9_]+)\}\}").expect("var regex is valid");
}

/// Attributes of a resource usable in `{{...}}` templates
pub trait ResourceVars {
    fn var(&self, name: &str) -> Option<String>;
}

impl<F> ResourceVars for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Substitute every `{{var}}` of `template`.
///
/// Variables come from the resource first. `project`, `region` and `zone`
/// fall back to the provider configuration and `{{<Service>BasePath}}` to the
/// service base path. `{{%var}}` escapes the value as a path segment.
/// Substituted values are themselves expanded, up to a bounded depth.
pub fn replace_vars(
    config: &Config,
    template: &str,
    vars: &dyn ResourceVars,
) -> Result<String, ApiError> {
    let mut current = template.to_owned();
    for _ in 0..=MAX_DEPTH {
        if !VAR.is_match(&current) {
            return Ok(current);
        }
        current = replace_once(config, &current, vars)?;
    }
    Err(ApiError::Vars(format!(
        "Recursive substitution detected in {template:?}"
    )))
}

fn replace_once(config: &Config, template: &str, vars: &dyn ResourceVars) -> Result<String, ApiError> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;
    for captures in VAR.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        let escape = captures.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = name.as_str();

        let value = lookup(config, name, vars).ok_or_else(|| {
            ApiError::Vars(format!("{name}: required field is not set"))
        })?;

        output.push_str(&template[last..whole.start()]);
        if escape {
            output.extend(utf8_percent_encode(&value, PATH_SEGMENT));
        } else {
            output.push_str(&value);
        }
        last = whole.end();
    }
    output.push_str(&template[last..]);
    Ok(output)
}

fn lookup(config: &Config, name: &str, vars: &dyn ResourceVars) -> Option<String> {
    if let Some(value) = vars.var(name).filter(|value| !value.is_empty()) {
        return Some(value);
    }
    if let Some(service) = Service::from_template_var(name) {
        return Some(config.base_path(service).to_owned());
    }
    match name {
        "project" => config.project.clone(),
        "region" => config.region.clone(),
        "zone" => config.zone.clone(),
        _ => None,
    }
}

/// Append query parameters to an url
pub fn add_query_params(url: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
    let mut url = url::Url::parse(url).map_err(|err| ApiError::Vars(format!("{url}: {err}")))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::testing::test_config;

    fn hub(name: &str) -> Option<String> {
        match name {
            "name" => Some("my-hub".to_owned()),
            "description" => Some("a/b c".to_owned()),
            "nested" => Some("{{name}}-copy".to_owned()),
            "loop" => Some("{{loop}}".to_owned()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_resource_and_provider_values() {
        let url = replace_vars(
            &test_config(),
            "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/global/hubs/{{name}}",
            &hub,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://networkconnectivity.googleapis.com/v1/projects/my-project/locations/global/hubs/my-hub"
        );
    }

    #[test]
    fn escapes_path_segments() {
        let value = replace_vars(&test_config(), "x/{{%description}}", &hub).unwrap();
        assert_eq!(value, "x/a%2Fb%20c");
    }

    #[test]
    fn missing_var() {
        let err = replace_vars(&Config::default(), "projects/{{project}}", &hub).unwrap_err();
        assert_eq!(err.to_string(), "project: required field is not set");
    }

    #[test]
    fn recursive_values() {
        assert_eq!(
            replace_vars(&test_config(), "{{nested}}", &hub).unwrap(),
            "my-hub-copy"
        );
        let err = replace_vars(&test_config(), "{{loop}}", &hub).unwrap_err();
        assert!(err.to_string().starts_with("Recursive substitution detected"));
    }

    #[test]
    fn query_params() {
        let url = add_query_params(
            "https://iam.googleapis.com/v1/locations/global/workforcePools",
            &[("workforcePoolId", "my pool")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://iam.googleapis.com/v1/locations/global/workforcePools?workforcePoolId=my+pool"
        );
    }
}
