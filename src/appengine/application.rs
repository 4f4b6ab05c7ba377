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

use async_trait::async_trait;
use crypto::{digest::Digest, sha2::Sha256};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::schema::NestedBlock;
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::schema::{self as attr, Computed, OptionalComputed, Required};
use crate::tpgresource::validation::{validate_enum, validate_max_items, validate_regex};
use crate::tpgresource::{
    force_new, replace_vars, timeouts, ResourceTimeouts, ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::mutex::MUTEX_STORE;
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    as_str, block, blocks, known, non_empty, non_empty_string, owned, to_block, tracked,
    unknown_if_null, with_default, ResultExt, ValueBool, WithNormalize, WithSchema, WithValidate,
};

const APP_URL: &str = "{{AppEngineBasePath}}apps/{{project}}";
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(4, 4, 4);
const SERVING_STATUSES: &[&str] = &["UNSPECIFIED", "SERVING", "USER_DISABLED", "SYSTEM_DISABLED"];
const DATABASE_TYPES: &[&str] = &[
    "CLOUD_FIRESTORE",
    "CLOUD_DATASTORE_COMPATIBILITY",
    "CLOUD_DATASTORE",
];

lazy_static! {
    static ref PROJECT_ID: Regex = Regex::new(
        r"^(?:(?:[-a-z0-9]{1,63}\.)*(?:[a-z](?:[-a-z0-9]{0,61}[a-z0-9])?):)?(?:[0-9]{1,19}|(?:[a-z0-9](?:[-a-z0-9]{0,61}[a-z0-9])?))$"
    )
    .expect("project id regex is valid");
}

#[derive(Debug)]
pub struct AppEngineApplicationResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> AppEngineApplicationResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationState<'a> {
    pub id: ValueString<'a>,
    pub project: ValueString<'a>,
    pub auth_domain: ValueString<'a>,
    pub location_id: ValueString<'a>,
    pub serving_status: ValueString<'a>,
    pub database_type: ValueString<'a>,
    pub feature_settings: ValueList<Value<FeatureSettings>>,
    pub iap: ValueList<Value<Iap<'a>>>,
    pub name: ValueString<'a>,
    pub app_id: ValueString<'a>,
    pub url_dispatch_rule: ValueList<Value<UrlDispatchRule<'a>>>,
    pub code_bucket: ValueString<'a>,
    pub default_hostname: ValueString<'a>,
    pub default_bucket: ValueString<'a>,
    pub gcr_domain: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub split_health_checks: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Iap<'a> {
    pub enabled: ValueBool,
    pub oauth2_client_id: ValueString<'a>,
    pub oauth2_client_secret: ValueString<'a>,
    pub oauth2_client_secret_sha256: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlDispatchRule<'a> {
    pub domain: ValueString<'a>,
    pub path: ValueString<'a>,
    pub service: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Application {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serving_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_settings: Option<ApiFeatureSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iap: Option<IdentityAwareProxy>,
    #[serde(skip_serializing)]
    name: Option<String>,
    #[serde(skip_serializing)]
    dispatch_rules: Vec<ApiUrlDispatchRule>,
    #[serde(skip_serializing)]
    code_bucket: Option<String>,
    #[serde(skip_serializing)]
    default_hostname: Option<String>,
    #[serde(skip_serializing)]
    default_bucket: Option<String>,
    #[serde(skip_serializing)]
    gcr_domain: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiFeatureSettings {
    split_health_checks: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IdentityAwareProxy {
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    oauth2_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oauth2_client_secret: Option<String>,
    #[serde(skip_serializing)]
    oauth2_client_secret_sha256: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApiUrlDispatchRule {
    domain: Option<String>,
    path: Option<String>,
    service: Option<String>,
}

fn sha256_hex(value: &str) -> String {
    let mut digest = Sha256::new();
    digest.input_str(value);
    digest.result_str()
}

impl ResourceVars for ApplicationState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "project" => owned(&self.project),
            _ => None,
        }
    }
}

impl WithSchema for ApplicationState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attr::id(),
                    "project" => attr::string(OptionalComputed, "The project ID to create the application under."),
                    "auth_domain" => attr::string(OptionalComputed, "The domain to authenticate users with when using App Engine's User API."),
                    "location_id" => attr::string(Required, "The location to serve the app from."),
                    "serving_status" => attr::string(OptionalComputed, "The serving status of the app."),
                    "database_type" => attr::string(OptionalComputed, "The type of the Cloud Firestore or Cloud Datastore database associated with this application."),
                    "name" => attr::string(Computed, "Unique name of the app."),
                    "app_id" => attr::string(Computed, "Identifier of the app."),
                    "url_dispatch_rule" => attr::computed_objects(&["domain", "path", "service"], "A list of dispatch rule blocks. Each block has a domain, path, and service field."),
                    "code_bucket" => attr::string(Computed, "The GCS bucket code is being stored in for this app."),
                    "default_hostname" => attr::string(Computed, "The default hostname for this app."),
                    "default_bucket" => attr::string(Computed, "The GCS bucket content is being stored in for this app."),
                    "gcr_domain" => attr::string(Computed, "The GCR domain used for storing managed Docker images for this app."),
                },
                blocks: map! {
                    "feature_settings" => NestedBlock::List(Block {
                        attributes: map! {
                            "split_health_checks" => attr::bool(Required, "Set to false to use the legacy health check instead of the readiness and liveness checks."),
                        },
                        description: Description::plain("A block of optional settings to configure specific App Engine features"),
                        ..Default::default()
                    }),
                    "iap" => NestedBlock::List(Block {
                        attributes: map! {
                            "enabled" => attr::bool(OptionalComputed, "Whether the serving infrastructure will authenticate and authorize all incoming requests. Defaults to false."),
                            "oauth2_client_id" => attr::string(Required, "OAuth2 client ID to use for the authentication flow."),
                            "oauth2_client_secret" => attr::sensitive(attr::string(Required, "OAuth2 client secret to use for the authentication flow. The SHA-256 hash of the value is returned in the oauth2ClientSecretSha256 field.")),
                            "oauth2_client_secret_sha256" => attr::sensitive(attr::string(Computed, "Hex-encoded SHA-256 hash of the client secret.")),
                        },
                        description: Description::plain("Settings for enabling Cloud Identity Aware Proxy"),
                        ..Default::default()
                    }),
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("Allows creation and management of an App Engine application. App Engine applications cannot be deleted once they're created; you have to delete the entire project to delete the application."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for ApplicationState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate_regex(diags, &self.project, &PROJECT_ID, AttributePath::new("project"));
        validate_enum(
            diags,
            &self.serving_status,
            SERVING_STATUSES,
            AttributePath::new("serving_status"),
        );
        validate_enum(
            diags,
            &self.database_type,
            DATABASE_TYPES,
            AttributePath::new("database_type"),
        );
        validate_max_items(diags, &self.feature_settings, 1, AttributePath::new("feature_settings"));
        validate_max_items(diags, &self.iap, 1, AttributePath::new("iap"));
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for ApplicationState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        unknown_if_null(&mut self.auth_domain);
        unknown_if_null(&mut self.serving_status);
        unknown_if_null(&mut self.database_type);
        self.name = Value::Unknown;
        self.app_id = Value::Unknown;
        self.url_dispatch_rule = Value::Unknown;
        self.code_bucket = Value::Unknown;
        self.default_hostname = Value::Unknown;
        self.default_bucket = Value::Unknown;
        self.gcr_domain = Value::Unknown;
    }
}

impl<'a> ApplicationState<'a> {
    /// Plan the IAP defaults, and its secret hash unless the secret is unchanged
    fn plan_iap(&mut self, prior: Option<&Iap<'a>>) {
        let Value::Value(items) = &mut self.iap else {
            return;
        };
        for item in items.iter_mut() {
            let Value::Value(iap) = item else {
                continue;
            };
            if iap.enabled.is_null() {
                iap.enabled = Value::Value(false);
            }
            iap.oauth2_client_secret_sha256 = match prior {
                Some(prior) if prior.oauth2_client_secret == iap.oauth2_client_secret => {
                    prior.oauth2_client_secret_sha256.clone()
                }
                _ => Value::Unknown,
            };
        }
    }

    fn expand(&self) -> Application {
        Application {
            id: owned(&self.project),
            location_id: owned(&self.location_id),
            auth_domain: owned(&self.auth_domain),
            serving_status: owned(&self.serving_status),
            database_type: owned(&self.database_type),
            feature_settings: block(&self.feature_settings).map(|settings| ApiFeatureSettings {
                split_health_checks: known(&settings.split_health_checks).unwrap_or_default(),
            }),
            iap: block(&self.iap).map(|iap| IdentityAwareProxy {
                enabled: known(&iap.enabled).unwrap_or_default(),
                oauth2_client_id: owned(&iap.oauth2_client_id),
                oauth2_client_secret: owned(&iap.oauth2_client_secret),
                oauth2_client_secret_sha256: None,
            }),
            ..Default::default()
        }
    }

    fn flatten(&mut self, app: Application) {
        self.auth_domain = non_empty_string(app.auth_domain);
        self.location_id = non_empty_string(app.location_id);
        self.serving_status = non_empty_string(app.serving_status);
        self.database_type = non_empty_string(app.database_type);
        self.name = non_empty_string(app.name);
        self.app_id = non_empty_string(app.id);
        self.code_bucket = non_empty_string(app.code_bucket);
        self.default_hostname = non_empty_string(app.default_hostname);
        self.default_bucket = non_empty_string(app.default_bucket);
        self.gcr_domain = non_empty_string(app.gcr_domain);
        self.url_dispatch_rule = Value::Value(
            app.dispatch_rules
                .into_iter()
                .map(|rule| {
                    Value::Value(UrlDispatchRule {
                        domain: non_empty_string(rule.domain),
                        path: non_empty_string(rule.path),
                        service: non_empty_string(rule.service),
                    })
                })
                .collect(),
        );

        if tracked(&self.feature_settings) {
            self.feature_settings = to_block(app.feature_settings.map(|settings| FeatureSettings {
                split_health_checks: Value::Value(settings.split_health_checks),
            }));
        }

        // An enabled IAP is surfaced even when unconfigured, so it can be turned off
        let iap_enabled = app.iap.as_ref().is_some_and(|iap| iap.enabled);
        if tracked(&self.iap) || iap_enabled {
            let prior = block(&self.iap).cloned().unwrap_or_default();
            self.iap = to_block(app.iap.map(|iap| {
                let secret = match (&iap.oauth2_client_secret_sha256, as_str(&prior.oauth2_client_secret)) {
                    (Some(hash), Some(secret)) if *hash != sha256_hex(secret) => {
                        warn!("The IAP client secret of App Engine app {:?} changed outside of Terraform", self.id);
                        Value::Null
                    }
                    _ => prior.oauth2_client_secret.clone(),
                };
                Iap {
                    enabled: Value::Value(iap.enabled),
                    oauth2_client_id: non_empty_string(iap.oauth2_client_id),
                    oauth2_client_secret: secret,
                    oauth2_client_secret_sha256: non_empty_string(iap.oauth2_client_secret_sha256),
                }
            }));
        }
    }

    fn display_id(&self) -> String {
        format!("App Engine Application {:?}", non_empty(&self.id).unwrap_or_default())
    }
}

impl<T: Transport> AppEngineApplicationResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: ApplicationState<'a>,
    ) -> Option<Option<ApplicationState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, APP_URL, &state)
            .or_report(diags, "Error reading App Engine application")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        let app = handle_not_found(
            client
                .fetch::<Application>(ApiRequest::get(url).with_billing_project(billing_project))
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(app.map(|app| {
            state.flatten(app);
            state
        }))
    }

    async fn apply<'a>(
        &self,
        diags: &mut Diagnostics,
        state: &ApplicationState<'a>,
        request: ApiRequest,
        activity: &str,
        timeout: std::time::Duration,
    ) -> Option<()> {
        let client = self.provider.client(diags).await?;
        let lock_name = replace_vars(&client.config, "apps/{{project}}", state)
            .or_report(diags, "Error constructing lock name")?;
        let _guard = MUTEX_STORE.lock(&lock_name).await;

        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        client
            .send_and_wait(
                request
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::AppEngine,
                    billing_project,
                    activity,
                    timeout,
                },
            )
            .await
            .or_report(diags, &format!("Error waiting for {activity}"))?;
        Some(())
    }
}

#[async_trait]
impl<T: Transport> Resource for AppEngineApplicationResource<T> {
    type State<'a> = Value<ApplicationState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ApplicationState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            config.validate(diags, Default::default()).await;
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(state) = state else {
            return Some((state, private_state));
        };
        let state = self.refresh(diags, state).await?;
        Some((state.map_or(Value::Null, Value::Value), private_state))
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(mut state) = proposed_state else {
            return Some((proposed_state, Default::default()));
        };
        let client = self.provider.client(diags).await?;
        state.normalize(diags);
        state.project = with_default(&state.project, client.config.project.as_deref());
        state.plan_iap(None);

        Some((Value::Value(state), Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let prior = prior_state.unwrap_or_default();
        let Value::Value(mut state) = proposed_state else {
            return Some((proposed_state, prior_private_state, vec![]));
        };
        let client = self.provider.client(diags).await?;

        if let (Some(old), Value::Value(new)) = (non_empty(&prior.location_id), &state.location_id) {
            if old != new.as_ref() {
                diags.error_short(
                    "Cannot change location_id once the resource is created.",
                    AttributePath::new("location_id"),
                );
                return None;
            }
        }

        state.project = with_default(&state.project, client.config.project.as_deref());
        for (prior, planned) in [
            (&prior.auth_domain, &mut state.auth_domain),
            (&prior.serving_status, &mut state.serving_status),
            (&prior.database_type, &mut state.database_type),
        ] {
            if planned.is_null() {
                *planned = prior.clone();
            }
        }
        state.plan_iap(block(&prior.iap));

        let mut replace = vec![];
        force_new(&mut replace, "project", &prior.project, &state.project);

        Some((Value::Value(state), prior_private_state, replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        _prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        Some(())
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = planned_state.unwrap_or_default();
        let client = self.provider.client(diags).await?;
        state.project = with_default(&state.project, client.config.project.as_deref());

        let url = replace_vars(&client.config, "{{AppEngineBasePath}}apps", &state)
            .or_report(diags, "Error creating App Engine application")?;
        let body = serde_json::to_value(state.expand())
            .or_report(diags, "Error creating App Engine application")?;

        debug!("Creating App Engine App");
        self.apply(
            diags,
            &state,
            ApiRequest::post(url, body),
            "App Engine app to create",
            TIMEOUTS.create(&state.timeouts),
        )
        .await?;
        debug!("Created App Engine App");

        state.id = state.project.clone();
        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("App Engine application disappeared right after its creation");
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = planned_state.unwrap_or_default();
        let client = self.provider.client(diags).await?;

        let mut mask = UpdateMask::new();
        mask.push("authDomain");
        mask.push("databaseType");
        mask.push("servingStatus");
        // Removed blocks are absent from the body, which resets them
        mask.push("featureSettings.splitHealthChecks");
        mask.push("iap");

        let url = replace_vars(&client.config, APP_URL, &state)
            .and_then(|url| {
                crate::tpgresource::add_query_params(&url, &[("updateMask", &mask.to_string())])
            })
            .or_report(diags, "Error updating App Engine application")?;
        let mut app = state.expand();
        app.id = None;
        app.location_id = None;
        let body = serde_json::to_value(app).or_report(diags, "Error updating App Engine application")?;

        debug!("Updating App Engine App");
        self.apply(
            diags,
            &state,
            ApiRequest::patch(url, body),
            "App Engine app to update",
            TIMEOUTS.update(&state.timeouts),
        )
        .await?;
        debug!("Updated App Engine App");

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("App Engine application disappeared during its update");
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        _state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        warn!("App Engine applications cannot be destroyed once created. The project must be deleted to delete the application.");
        diags.root_warning(
            "App Engine applications cannot be destroyed once created",
            "The application has been removed from the Terraform state only. The project must be deleted to delete the application.",
        );
        Some(())
    }

    async fn import<'a>(
        &self,
        _diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let project: ValueString<'a> = Value::Value(Cow::Owned(id));
        let state = ApplicationState {
            id: project.clone(),
            project,
            ..Default::default()
        };
        Some((Value::Value(state), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::transport::testing::{test_handle, FakeTransport};

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn iap(secret: &str) -> ValueList<Value<Iap<'static>>> {
        to_block(Some(Iap {
            enabled: Value::Value(true),
            oauth2_client_id: string("client"),
            oauth2_client_secret: string(secret),
            oauth2_client_secret_sha256: Value::Null,
        }))
    }

    fn app_json(secret: &str) -> serde_json::Value {
        json!({
            "name": "apps/my-project",
            "id": "my-project",
            "locationId": "us-central",
            "servingStatus": "SERVING",
            "databaseType": "CLOUD_DATASTORE_COMPATIBILITY",
            "defaultHostname": "my-project.uc.r.appspot.com",
            "dispatchRules": [{"domain": "*", "path": "/api/*", "service": "api"}],
            "iap": {
                "enabled": true,
                "oauth2ClientId": "client",
                "oauth2ClientSecretSha256": sha256_hex(secret)
            }
        })
    }

    #[test]
    fn secret_hash_is_hex_sha256() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn create_locks_and_reads_back() {
        let resource = AppEngineApplicationResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(json!({"name": "apps/my-project/operations/op-1", "done": true}))
                    .respond(app_json("secret")),
            )
            .await,
        );
        let proposed = ApplicationState {
            location_id: string("us-central"),
            iap: iap("secret"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(proposed.clone()),
                Value::Value(proposed),
                Default::default(),
            )
            .await
            .unwrap();
        let (state, _) = resource
            .create(&mut diags, planned.clone(), planned, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let state = state.unwrap_or_default();
        assert_eq!(state.id, string("my-project"));
        assert_eq!(state.app_id, string("my-project"));
        assert_eq!(state.auth_domain, Value::Null);
        assert_eq!(block(&state.iap).unwrap().oauth2_client_secret, string("secret"));
        assert_eq!(blocks(&state.url_dispatch_rule).count(), 1);

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].url, "https://appengine.googleapis.com/v1/apps");
        assert_eq!(
            requests[0].body,
            Some(json!({
                "id": "my-project",
                "locationId": "us-central",
                "iap": {"enabled": true, "oauth2ClientId": "client", "oauth2ClientSecret": "secret"}
            }))
        );
    }

    #[tokio::test]
    async fn secret_changed_elsewhere_is_cleared() {
        let resource = AppEngineApplicationResource::new(
            test_handle(FakeTransport::default().respond(app_json("rotated"))).await,
        );
        let state = ApplicationState {
            id: string("my-project"),
            project: string("my-project"),
            iap: iap("secret"),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, Value::Value(state), Default::default(), Default::default())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(block(&state.iap).unwrap().oauth2_client_secret, Value::Null);
    }

    #[tokio::test]
    async fn unconfigured_blocks_are_not_tracked() {
        let mut app = app_json("secret");
        app["iap"]["enabled"] = json!(false);
        app["featureSettings"] = json!({"splitHealthChecks": true});
        let resource = AppEngineApplicationResource::new(
            test_handle(FakeTransport::default().respond(app)).await,
        );
        let state = ApplicationState {
            id: string("my-project"),
            project: string("my-project"),
            feature_settings: Value::Value(vec![]),
            iap: Value::Value(vec![]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, Value::Value(state), Default::default(), Default::default())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(state.location_id, string("us-central"));
        assert_eq!(block(&state.iap), None);
        assert_eq!(block(&state.feature_settings), None);
    }

    #[tokio::test]
    async fn iap_enabled_elsewhere_is_drift() {
        let resource = AppEngineApplicationResource::new(
            test_handle(FakeTransport::default().respond(app_json("secret"))).await,
        );
        let state = ApplicationState {
            id: string("my-project"),
            project: string("my-project"),
            iap: Value::Value(vec![]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, Value::Value(state), Default::default(), Default::default())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(block(&state.iap).unwrap().enabled, Value::Value(true));
    }

    #[tokio::test]
    async fn update_sends_every_field_of_the_mask() {
        let resource = AppEngineApplicationResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(json!({"name": "apps/my-project/operations/op-2", "done": true}))
                    .respond(app_json("secret")),
            )
            .await,
        );
        let prior = ApplicationState {
            id: string("my-project"),
            project: string("my-project"),
            location_id: string("us-central"),
            serving_status: string("SERVING"),
            iap: iap("secret"),
            ..Default::default()
        };
        let mut planned = prior.clone();
        planned.auth_domain = string("example.com");
        planned.iap = iap("rotated");

        let mut diags = Diagnostics::default();
        resource
            .update(
                &mut diags,
                Value::Value(prior),
                Value::Value(planned.clone()),
                Value::Value(planned),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::PATCH);
        assert_eq!(
            requests[0].url,
            "https://appengine.googleapis.com/v1/apps/my-project?updateMask=authDomain%2CdatabaseType%2CservingStatus%2CfeatureSettings.splitHealthChecks%2Ciap"
        );
        assert_eq!(
            requests[0].body,
            Some(json!({
                "authDomain": "example.com",
                "servingStatus": "SERVING",
                "iap": {"enabled": true, "oauth2ClientId": "client", "oauth2ClientSecret": "rotated"}
            }))
        );
        assert_eq!(requests[1].method, Method::GET);
    }

    #[tokio::test]
    async fn removing_iap_disables_it() {
        let mut cleared = app_json("secret");
        cleared["iap"] = json!({"enabled": false});
        let resource = AppEngineApplicationResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(json!({"name": "apps/my-project/operations/op-3", "done": true}))
                    .respond(cleared),
            )
            .await,
        );
        let prior = ApplicationState {
            id: string("my-project"),
            project: string("my-project"),
            location_id: string("us-central"),
            iap: iap("secret"),
            ..Default::default()
        };
        let mut planned = prior.clone();
        planned.iap = Value::Value(vec![]);

        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .update(
                &mut diags,
                Value::Value(prior),
                Value::Value(planned.clone()),
                Value::Value(planned),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
        assert_eq!(block(&state.unwrap_or_default().iap), None);

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert!(requests[0].url.ends_with("featureSettings.splitHealthChecks%2Ciap"));
        assert_eq!(requests[0].body, Some(json!({})));
    }

    #[tokio::test]
    async fn import_reads_every_block() {
        let resource = AppEngineApplicationResource::new(
            test_handle(FakeTransport::default().respond(app_json("secret"))).await,
        );
        let (state, _) = resource
            .import(&mut Diagnostics::default(), "my-project".to_owned())
            .await
            .unwrap();
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        let iap = block(&state.iap).unwrap();
        assert_eq!(iap.oauth2_client_id, string("client"));
        assert_eq!(iap.oauth2_client_secret, Value::Null);
        assert_eq!(block(&state.feature_settings), None);
    }

    #[tokio::test]
    async fn location_cannot_change() {
        let resource = AppEngineApplicationResource::new(test_handle(FakeTransport::default()).await);
        let prior = ApplicationState {
            id: string("my-project"),
            project: string("my-project"),
            location_id: string("us-central"),
            ..Default::default()
        };
        let mut proposed = prior.clone();
        proposed.location_id = string("europe-west");

        let mut diags = Diagnostics::default();
        let planned = resource
            .plan_update(
                &mut diags,
                Value::Value(prior),
                Value::Value(proposed.clone()),
                Value::Value(proposed),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(planned.is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn destroy_only_warns() {
        let resource = AppEngineApplicationResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        resource
            .destroy(&mut diags, Value::Null, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
    }
}
