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
use std::time::Duration;

pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/userinfo.email",
];

pub const PROJECT_ENV_VARS: &[&str] = &[
    "GOOGLE_PROJECT",
    "GOOGLE_CLOUD_PROJECT",
    "GCLOUD_PROJECT",
    "CLOUDSDK_CORE_PROJECT",
];
pub const REGION_ENV_VARS: &[&str] = &["GOOGLE_REGION", "GCLOUD_REGION", "CLOUDSDK_COMPUTE_REGION"];
pub const ZONE_ENV_VARS: &[&str] = &["GOOGLE_ZONE", "GCLOUD_ZONE", "CLOUDSDK_COMPUTE_ZONE"];
pub const BILLING_PROJECT_ENV_VARS: &[&str] = &["GOOGLE_BILLING_PROJECT"];
pub const CREDENTIALS_ENV_VARS: &[&str] = &[
    "GOOGLE_CREDENTIALS",
    "GOOGLE_CLOUD_KEYFILE_JSON",
    "GCLOUD_KEYFILE_JSON",
    "GOOGLE_APPLICATION_CREDENTIALS",
];
pub const ACCESS_TOKEN_ENV_VARS: &[&str] = &["GOOGLE_OAUTH_ACCESS_TOKEN"];
pub const USER_PROJECT_OVERRIDE_ENV_VARS: &[&str] = &["USER_PROJECT_OVERRIDE"];
pub const REQUEST_REASON_ENV_VARS: &[&str] = &["CLOUDSDK_CORE_REQUEST_REASON"];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Upper bound of the retry loop when a resource gives no explicit timeout
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Google APIs reachable through this provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Service {
    AppEngine,
    Composer,
    IamWorkforcePool,
    NetworkConnectivity,
    SecurityCenter,
    SecurityCenterV2,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::AppEngine,
        Service::Composer,
        Service::IamWorkforcePool,
        Service::NetworkConnectivity,
        Service::SecurityCenter,
        Service::SecurityCenterV2,
    ];

    pub fn default_base_path(self) -> &'static str {
        match self {
            Service::AppEngine => "https://appengine.googleapis.com/v1/",
            Service::Composer => "https://composer.googleapis.com/v1/",
            Service::IamWorkforcePool => "https://iam.googleapis.com/v1/",
            Service::NetworkConnectivity => "https://networkconnectivity.googleapis.com/v1/",
            Service::SecurityCenter => "https://securitycenter.googleapis.com/v1/",
            Service::SecurityCenterV2 => "https://securitycenter.googleapis.com/v2/",
        }
    }

    /// Provider attribute overriding the base path
    pub fn endpoint_attribute(self) -> &'static str {
        match self {
            Service::AppEngine => "app_engine_custom_endpoint",
            Service::Composer => "composer_custom_endpoint",
            Service::IamWorkforcePool => "iam_workforce_pool_custom_endpoint",
            Service::NetworkConnectivity => "network_connectivity_custom_endpoint",
            Service::SecurityCenter => "security_center_custom_endpoint",
            Service::SecurityCenterV2 => "security_center_v2_custom_endpoint",
        }
    }

    pub fn endpoint_env_var(self) -> &'static str {
        match self {
            Service::AppEngine => "GOOGLE_APP_ENGINE_CUSTOM_ENDPOINT",
            Service::Composer => "GOOGLE_COMPOSER_CUSTOM_ENDPOINT",
            Service::IamWorkforcePool => "GOOGLE_IAM_WORKFORCE_POOL_CUSTOM_ENDPOINT",
            Service::NetworkConnectivity => "GOOGLE_NETWORK_CONNECTIVITY_CUSTOM_ENDPOINT",
            Service::SecurityCenter => "GOOGLE_SECURITY_CENTER_CUSTOM_ENDPOINT",
            Service::SecurityCenterV2 => "GOOGLE_SECURITY_CENTER_V2_CUSTOM_ENDPOINT",
        }
    }

    /// Name of the `{{...}}` template variable holding the base path
    pub fn template_var(self) -> &'static str {
        match self {
            Service::AppEngine => "AppEngineBasePath",
            Service::Composer => "ComposerBasePath",
            Service::IamWorkforcePool => "IAMWorkforcePoolBasePath",
            Service::NetworkConnectivity => "NetworkConnectivityBasePath",
            Service::SecurityCenter => "SecurityCenterBasePath",
            Service::SecurityCenterV2 => "SecurityCenterV2BasePath",
        }
    }

    pub fn from_template_var(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.template_var() == name)
    }
}

/// Resolved provider configuration shared by every resource
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub project: Option<String>,
    pub billing_project: Option<String>,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub user_project_override: bool,
    pub request_timeout: Duration,
    pub request_reason: Option<String>,
    pub scopes: Vec<String>,
    pub default_labels: BTreeMap<String, String>,
    pub base_paths: BTreeMap<Service, String>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: None,
            billing_project: None,
            region: None,
            zone: None,
            user_project_override: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_reason: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            default_labels: BTreeMap::new(),
            base_paths: BTreeMap::new(),
            user_agent: user_agent(""),
        }
    }
}

impl Config {
    pub fn base_path(&self, service: Service) -> &str {
        self.base_paths
            .get(&service)
            .map_or(service.default_base_path(), String::as_str)
    }

    /// Project billed for a request: the provider `billing_project` when set,
    /// the resource project otherwise.
    pub fn billing_project_for(&self, project: Option<&str>) -> Option<String> {
        self.billing_project
            .clone()
            .or_else(|| project.filter(|p| !p.is_empty()).map(str::to_owned))
    }
}

pub fn user_agent(terraform_version: &str) -> String {
    let terraform_version = if terraform_version.is_empty() {
        "0.0.0"
    } else {
        terraform_version
    };
    format!(
        "Terraform/{terraform_version} (+https://www.terraform.io) terraform-provider-google/{}",
        env!("CARGO_PKG_VERSION")
    )
}

/// First non-empty environment variable among `keys`
pub fn env_search(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
}

pub fn env_bool(keys: &[&str]) -> Option<bool> {
    env_search(keys).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_override() {
        let mut config = Config::default();
        assert_eq!(
            config.base_path(Service::SecurityCenterV2),
            "https://securitycenter.googleapis.com/v2/"
        );
        config
            .base_paths
            .insert(Service::Composer, "http://localhost:8080/v1/".to_owned());
        assert_eq!(
            config.base_path(Service::Composer),
            "http://localhost:8080/v1/"
        );
        assert_eq!(
            Service::from_template_var("IAMWorkforcePoolBasePath"),
            Some(Service::IamWorkforcePool)
        );
        assert_eq!(Service::from_template_var("UnknownBasePath"), None);
    }

    #[test]
    fn billing_project_precedence() {
        let mut config = Config::default();
        assert_eq!(config.billing_project_for(None), None);
        assert_eq!(config.billing_project_for(Some("")), None);
        assert_eq!(
            config.billing_project_for(Some("my-project")).as_deref(),
            Some("my-project")
        );
        config.billing_project = Some("billing".to_owned());
        assert_eq!(
            config.billing_project_for(Some("my-project")).as_deref(),
            Some("billing")
        );
    }

    #[test]
    fn user_agent_names_terraform() {
        assert!(user_agent("1.7.5").starts_with("Terraform/1.7.5 (+https://www.terraform.io)"));
        assert!(user_agent("").contains("terraform-provider-google/"));
    }
}
