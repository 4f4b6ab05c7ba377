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

use std::collections::HashMap;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueBool, ValueList, ValueMap, ValueString};
use tf_provider::{
    map, AttributePath, Block, Description, Diagnostics, Provider, Schema, ValueEmpty,
};
use tracing::info;

use crate::appengine::AppEngineApplicationResource;
use crate::client_config::ClientConfigDataSource;
use crate::composer::ComposerEnvironmentResource;
use crate::iamworkforcepool::{
    OauthClientResource, WorkforcePoolProviderResource, WorkforcePoolResource,
};
use crate::networkconnectivity::{HubResource, RegionalEndpointResource, SpokeResource};
use crate::securitycenter::{EventThreatDetectionCustomModuleResource, SourceResource};
use crate::securitycenterv2::BigQueryExportResource;
use crate::tpgresource::timeouts::parse_duration;
use crate::tpgresource::validation::{validate_conflict, validate_regex};
use crate::transport::auth::Credentials;
use crate::transport::config::{self, env_bool, env_search};
use crate::transport::{Config, GoogleClient, HttpTransport, ProviderHandle, Service};
use crate::utils::{as_str, owned, string_map_of, strings, ResultExt};

lazy_static! {
    static ref CUSTOM_ENDPOINT: Regex =
        Regex::new(r"^http[s]?://.+/$").expect("custom endpoint regex is valid");
}

#[derive(Debug, Default, Clone)]
pub struct GoogleProvider {
    handle: ProviderHandle<HttpTransport>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig<'a> {
    pub credentials: ValueString<'a>,
    pub access_token: ValueString<'a>,
    pub project: ValueString<'a>,
    pub billing_project: ValueString<'a>,
    pub region: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub user_project_override: ValueBool,
    pub request_timeout: ValueString<'a>,
    pub request_reason: ValueString<'a>,
    pub scopes: ValueList<ValueString<'a>>,
    pub default_labels: ValueMap<'a, ValueString<'a>>,
    pub app_engine_custom_endpoint: ValueString<'a>,
    pub composer_custom_endpoint: ValueString<'a>,
    pub iam_workforce_pool_custom_endpoint: ValueString<'a>,
    pub network_connectivity_custom_endpoint: ValueString<'a>,
    pub security_center_custom_endpoint: ValueString<'a>,
    pub security_center_v2_custom_endpoint: ValueString<'a>,
}

impl<'a> ProviderConfig<'a> {
    fn custom_endpoint(&self, service: Service) -> &ValueString<'a> {
        match service {
            Service::AppEngine => &self.app_engine_custom_endpoint,
            Service::Composer => &self.composer_custom_endpoint,
            Service::IamWorkforcePool => &self.iam_workforce_pool_custom_endpoint,
            Service::NetworkConnectivity => &self.network_connectivity_custom_endpoint,
            Service::SecurityCenter => &self.security_center_custom_endpoint,
            Service::SecurityCenterV2 => &self.security_center_v2_custom_endpoint,
        }
    }

    /// Provider configuration, completed from the environment
    fn resolve(&self, terraform_version: &str) -> Result<(Config, Credentials), String> {
        let mut resolved = Config {
            project: owned(&self.project).or_else(|| env_search(config::PROJECT_ENV_VARS)),
            billing_project: owned(&self.billing_project)
                .or_else(|| env_search(config::BILLING_PROJECT_ENV_VARS)),
            region: owned(&self.region).or_else(|| env_search(config::REGION_ENV_VARS)),
            zone: owned(&self.zone).or_else(|| env_search(config::ZONE_ENV_VARS)),
            user_project_override: match self.user_project_override {
                Value::Value(value) => value,
                _ => env_bool(config::USER_PROJECT_OVERRIDE_ENV_VARS).unwrap_or(false),
            },
            request_reason: owned(&self.request_reason)
                .or_else(|| env_search(config::REQUEST_REASON_ENV_VARS)),
            default_labels: string_map_of(&self.default_labels).unwrap_or_default(),
            user_agent: config::user_agent(terraform_version),
            ..Default::default()
        };
        if let Some(timeout) = as_str(&self.request_timeout).filter(|t| !t.is_empty()) {
            resolved.request_timeout = parse_duration(timeout)?;
        }
        if let Some(scopes) = strings(&self.scopes).filter(|scopes| !scopes.is_empty()) {
            resolved.scopes = scopes;
        }
        for service in Service::ALL {
            let endpoint = owned(self.custom_endpoint(service))
                .or_else(|| env_search(&[service.endpoint_env_var()]));
            if let Some(endpoint) = endpoint {
                resolved.base_paths.insert(service, endpoint);
            }
        }

        let access_token =
            owned(&self.access_token).or_else(|| env_search(config::ACCESS_TOKEN_ENV_VARS));
        let credentials =
            owned(&self.credentials).or_else(|| env_search(config::CREDENTIALS_ENV_VARS));
        let credentials =
            Credentials::resolve(access_token, credentials).map_err(|err| format!("{err:#}"))?;

        Ok((resolved, credentials))
    }
}

fn string_attribute(description: &'static str, sensitive: bool) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive,
        ..Default::default()
    }
}

fn provider_schema() -> Schema {
    let mut attributes: HashMap<String, Attribute> = map! {
        "credentials" => string_attribute("Path or content of a service account key file", true),
        "access_token" => string_attribute("OAuth2 access token used to authenticate requests", true),
        "project" => string_attribute("Default project of the resources", false),
        "billing_project" => string_attribute("Project billed for quota and billing purposes", false),
        "region" => string_attribute("Default region of the resources", false),
        "zone" => string_attribute("Default zone of the resources", false),
        "user_project_override" => Attribute {
            attr_type: AttributeType::Bool,
            description: Description::plain("Bill the resource project (or `billing_project`) instead of the project of the credentials"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "request_timeout" => string_attribute("Timeout of a single HTTP request, like \"120s\"", false),
        "request_reason" => string_attribute("Justification sent in the X-Goog-Request-Reason header", false),
        "scopes" => Attribute {
            attr_type: AttributeType::List(Box::new(AttributeType::String)),
            description: Description::plain("OAuth2 scopes requested for service account credentials"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
        "default_labels" => Attribute {
            attr_type: AttributeType::Map(Box::new(AttributeType::String)),
            description: Description::plain("Labels applied to every resource supporting labels"),
            constraint: AttributeConstraint::Optional,
            ..Default::default()
        },
    };
    for service in Service::ALL {
        attributes.insert(
            service.endpoint_attribute().to_owned(),
            string_attribute("Base path of the service API, ending with a slash", false),
        );
    }

    Schema {
        version: 1,
        block: Block {
            attributes,
            description: Description::plain("Google Cloud"),
            ..Default::default()
        },
    }
}

fn validate_config(diags: &mut Diagnostics, config: &ProviderConfig) {
    validate_conflict(
        diags,
        ("credentials", !config.credentials.is_null()),
        ("access_token", !config.access_token.is_null()),
        AttributePath::new("credentials"),
    );
    for service in Service::ALL {
        validate_regex(
            diags,
            config.custom_endpoint(service),
            &CUSTOM_ENDPOINT,
            AttributePath::new(service.endpoint_attribute()),
        );
    }
    if let Some(timeout) = as_str(&config.request_timeout) {
        if let Err(err) = parse_duration(timeout) {
            diags.error("Invalid request_timeout", err, AttributePath::new("request_timeout"));
        }
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(provider_schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        validate_config(diags, &config);

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let (config, credentials) = config
            .resolve(&terraform_version)
            .or_report(diags, "Invalid provider configuration")?;
        let transport = HttpTransport::new(&config, credentials)
            .or_report(diags, "Failed to initialize the Google API client")?;
        info!(
            "Provider configured: project = {:?}, region = {:?}",
            config.project, config.region
        );
        self.handle.set(GoogleClient::new(config, transport)).await;
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn tf_provider::resource::DynamicResource>>> {
        let handle = &self.handle;
        Some(map! {
            "app_engine_application" => AppEngineApplicationResource::new(handle.clone()),
            "composer_environment" => ComposerEnvironmentResource::new(handle.clone()),
            "iam_workforce_pool" => WorkforcePoolResource::new(handle.clone()),
            "iam_workforce_pool_provider" => WorkforcePoolProviderResource::new(handle.clone()),
            "iam_oauth_client" => OauthClientResource::new(handle.clone()),
            "network_connectivity_hub" => HubResource::new(handle.clone()),
            "network_connectivity_spoke" => SpokeResource::new(handle.clone()),
            "network_connectivity_regional_endpoint" => RegionalEndpointResource::new(handle.clone()),
            "scc_source" => SourceResource::new(handle.clone()),
            "scc_event_threat_detection_custom_module" => EventThreatDetectionCustomModuleResource::new(handle.clone()),
            "scc_v2_organization_source" => SourceResource::organization_source(handle.clone()),
            "scc_v2_organization_scc_big_query_export" => BigQueryExportResource::new(handle.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn tf_provider::data_source::DynamicDataSource>>> {
        Some(map! {
            "client_config" => ClientConfigDataSource::new(self.handle.clone()),
        })
    }
}
