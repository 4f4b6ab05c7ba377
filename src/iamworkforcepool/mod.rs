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

//! Workforce identity federation: workforce pools, their identity providers
//! and the OAuth clients of a project.

use regex::Regex;
use tf_provider::value::ValueString;
use tf_provider::{AttributePath, Diagnostics};

use crate::utils::as_str;

mod oauth_client;
mod workforce_pool;
mod workforce_pool_provider;

pub use oauth_client::OauthClientResource;
pub use workforce_pool::WorkforcePoolResource;
pub use workforce_pool_provider::WorkforcePoolProviderResource;

/// Resources whose state is `DELETED` are soft-deleted, and treated as gone
const DELETED: &str = "DELETED";

/// Ids chosen by the user: `gcp-` is reserved for Google, and `regex`
/// describes the accepted shape as `rule`.
fn validate_id(
    diags: &mut Diagnostics,
    value: &ValueString,
    regex: &Regex,
    rule: &str,
    path: AttributePath,
) {
    let Some(value) = as_str(value) else {
        return;
    };
    if value.starts_with("gcp-") {
        diags.error(
            "Invalid id",
            format!("{value:?} can not start with \"gcp-\". The prefix `gcp-` is reserved for use by Google, and may not be specified."),
            path.clone(),
        );
    }
    if !regex.is_match(value) {
        diags.error("Invalid id", format!("{value:?} {rule}"), path);
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use tf_provider::value::Value;

    use super::*;

    #[test]
    fn reserved_prefix() {
        let regex = Regex::new(r"^[a-z][a-z0-9-]{4,61}[a-z0-9]$").unwrap();
        let mut diags = Diagnostics::default();
        validate_id(
            &mut diags,
            &Value::Value(Cow::Borrowed("gcp-pool")),
            &regex,
            "is invalid",
            AttributePath::new("workforce_pool_id"),
        );
        assert_eq!(diags.errors.len(), 1);
        validate_id(
            &mut diags,
            &Value::Value(Cow::Borrowed("my-pool")),
            &regex,
            "is invalid",
            AttributePath::new("workforce_pool_id"),
        );
        assert_eq!(diags.errors.len(), 1);
    }
}
