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

use tf_provider::value::{Value, ValueString};

/// Last segment of a self link or relative resource name
pub fn name_from_self_link(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// Part of a link starting at `projects/`, if any
pub fn relative_path(link: &str) -> Option<&str> {
    link.find("projects/").map(|start| &link[start..])
}

/// Both values name the same resource, either one being a full self link or
/// a short name.
pub fn compare_self_link_or_resource_name(a: &str, b: &str) -> bool {
    name_from_self_link(a) == name_from_self_link(b)
}

/// Both links have the same path from `projects/` on.
pub fn compare_self_link_relative_paths(a: &str, b: &str) -> bool {
    match (relative_path(a), relative_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Value to store for an attribute read from the API: the prior spelling is
/// kept when the API returns an equivalent value.
pub fn keep_equivalent<'a>(
    prior: &ValueString<'a>,
    api: Option<String>,
    equivalent: fn(&str, &str) -> bool,
) -> ValueString<'a> {
    match (prior, api) {
        (Value::Value(prior), Some(api)) if equivalent(prior, &api) => Value::Value(prior.clone()),
        (_, Some(api)) if !api.is_empty() => Value::Value(Cow::Owned(api)),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(
            name_from_self_link("organizations/123/eventThreatDetectionSettings/customModules/456"),
            "456"
        );
        assert_eq!(name_from_self_link("plain"), "plain");
    }

    #[test]
    fn self_links() {
        assert!(compare_self_link_or_resource_name(
            "https://networkconnectivity.googleapis.com/v1/projects/p/locations/global/hubs/hub",
            "hub"
        ));
        assert!(!compare_self_link_or_resource_name("projects/p/hubs/a", "b"));
        assert!(compare_self_link_relative_paths(
            "https://www.googleapis.com/compute/v1/projects/p/global/networks/default",
            "projects/p/global/networks/default"
        ));
        assert!(!compare_self_link_relative_paths(
            "projects/p/global/networks/default",
            "projects/q/global/networks/default"
        ));
    }

    #[test]
    fn keeps_configured_spelling() {
        let prior = Value::Value(Cow::Borrowed("hub"));
        assert_eq!(
            keep_equivalent(
                &prior,
                Some("projects/p/locations/global/hubs/hub".to_owned()),
                compare_self_link_or_resource_name
            ),
            prior
        );
        assert_eq!(
            keep_equivalent(
                &prior,
                Some("projects/p/locations/global/hubs/other".to_owned()),
                compare_self_link_or_resource_name
            ),
            Value::Value(Cow::Borrowed("projects/p/locations/global/hubs/other"))
        );
        assert_eq!(
            keep_equivalent(&prior, None, compare_self_link_or_resource_name),
            Value::Null
        );
    }
}
