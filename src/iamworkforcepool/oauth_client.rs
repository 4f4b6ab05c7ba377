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
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::schema::{self as attr, Computed, Optional, OptionalComputed, Required};
use crate::tpgresource::validation::{validate_enum, validate_length};
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Transport};
use crate::utils::{
    api_bool, api_string, known, non_empty, non_empty_string, owned, string, string_list, strings,
    unknown_if_null, with_default, ResultExt, ValueBool, WithNormalize, WithSchema, WithValidate,
};

use super::{validate_id, DELETED};

const CLIENT_URL: &str = "{{IAMWorkforcePoolBasePath}}projects/{{project}}/locations/{{location}}/oauthClients/{{oauth_client_id}}";
const CLIENT_ID: &str = "projects/{{project}}/locations/{{location}}/oauthClients/{{oauth_client_id}}";
const IMPORT_FORMATS: &[&str] = &[
    "^projects/(?P<project>[^/]+)/locations/(?P<location>[^/]+)/oauthClients/(?P<oauth_client_id>[^/]+)$",
    "^(?P<project>[^/]+)/(?P<location>[^/]+)/(?P<oauth_client_id>[^/]+)$",
    "^(?P<location>[^/]+)/(?P<oauth_client_id>[^/]+)$",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const CLIENT_TYPES: &[&str] = &["CLIENT_TYPE_UNSPECIFIED", "PUBLIC_CLIENT", "CONFIDENTIAL_CLIENT"];

/// OAuth clients are read back inconsistently right after a change
const PROPAGATION_DELAY: Duration = Duration::from_secs(5);

lazy_static! {
    static ref CLIENT_ID_REGEX: Regex =
        Regex::new(r"^[a-z][a-z0-9-]{4,61}[a-z0-9]$").expect("oauth client id regex is valid");
}

#[derive(Debug)]
pub struct OauthClientResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> OauthClientResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OauthClientState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub location: ValueString<'a>,
    pub oauth_client_id: ValueString<'a>,
    pub project: ValueString<'a>,
    pub allowed_grant_types: ValueList<ValueString<'a>>,
    pub allowed_redirect_uris: ValueList<ValueString<'a>>,
    pub allowed_scopes: ValueList<ValueString<'a>>,
    pub client_type: ValueString<'a>,
    pub description: ValueString<'a>,
    pub disabled: ValueBool,
    pub display_name: ValueString<'a>,
    pub client_id: ValueString<'a>,
    pub expire_time: ValueString<'a>,
    pub state: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OauthClient {
    #[serde(skip_serializing)]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_grant_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_redirect_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing)]
    client_id: Option<String>,
    #[serde(skip_serializing)]
    expire_time: Option<String>,
    #[serde(skip_serializing)]
    state: Option<String>,
}

impl ResourceVars for OauthClientState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "project" => owned(&self.project),
            "location" => owned(&self.location),
            "oauth_client_id" => owned(&self.oauth_client_id),
            _ => None,
        }
    }
}

impl WithSchema for OauthClientState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attr::id(),
                    "name" => attr::string(Computed, "Immutable. Identifier. The resource name of the OauthClient. Format:'projects/{project}/locations/{location}/oauthClients/{oauth_client}'."),
                    "location" => attr::string(Required, "Resource ID segment making up resource 'name'. It identifies the resource within its parent collection as described in https://google.aip.dev/122."),
                    "oauth_client_id" => attr::string(Required, "Required. The ID to use for the OauthClient, which becomes the final component of the resource name. This value should be a string of 6 to 63 lowercase letters, digits, or hyphens. It must start with a letter, and cannot have a trailing hyphen. The prefix 'gcp-' is reserved for use by Google, and may not be specified."),
                    "project" => attr::project(),
                    "allowed_grant_types" => attr::string_list(Required, "Required. The list of OAuth grant types is allowed for the OauthClient."),
                    "allowed_redirect_uris" => attr::string_list(Required, "Required. The list of redirect uris that is allowed to redirect back when authorization process is completed."),
                    "allowed_scopes" => attr::string_list(Required, "Required. The list of scopes that the OauthClient is allowed to request during OAuth flows. The following scopes are supported: * 'https://www.googleapis.com/auth/cloud-platform' * 'openid' * 'email' * 'groups'"),
                    "client_type" => attr::string(OptionalComputed, "Immutable. The type of OauthClient. Either public or private. For private clients, the client secret can be managed using the dedicated OauthClientCredential resource. Possible values: CLIENT_TYPE_UNSPECIFIED PUBLIC_CLIENT CONFIDENTIAL_CLIENT"),
                    "description" => attr::string(Optional, "A user-specified description of the OauthClient. Cannot exceed 256 characters."),
                    "disabled" => attr::bool(Optional, "Whether the OauthClient is disabled. You cannot use a disabled OAuth client."),
                    "display_name" => attr::string(Optional, "A user-specified display name of the OauthClient. Cannot exceed 32 characters."),
                    "client_id" => attr::string(Computed, "Output only. The system-generated OauthClient id."),
                    "expire_time" => attr::string(Computed, "Time after which the OauthClient will be permanently purged and cannot be recovered."),
                    "state" => attr::string(Computed, "The state of the OauthClient. Possible values: STATE_UNSPECIFIED ACTIVE DELETED"),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("Represents an OAuth client. Used to access Google Cloud resources on behalf of a Workforce Identity Federation user by using OAuth 2.0 Protocol to obtain an access token from Google Cloud."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for OauthClientState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_id(
            diags,
            &self.oauth_client_id,
            &CLIENT_ID_REGEX,
            "must be 6 to 63 lowercase letters, digits, or hyphens, start with a letter, and not end with a hyphen",
            attr_path.clone().attribute("oauth_client_id"),
        );
        validate_enum(diags, &self.client_type, CLIENT_TYPES, attr_path.clone().attribute("client_type"));
        validate_length(diags, &self.display_name, 0, 32, attr_path.clone().attribute("display_name"));
        validate_length(diags, &self.description, 0, 256, attr_path.attribute("description"));
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for OauthClientState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.name = Value::Unknown;
        self.client_id = Value::Unknown;
        self.expire_time = Value::Unknown;
        self.state = Value::Unknown;
        unknown_if_null(&mut self.client_type);
    }
}

impl<'a> OauthClientState<'a> {
    fn expand(&self) -> OauthClient {
        OauthClient {
            allowed_grant_types: strings(&self.allowed_grant_types),
            allowed_redirect_uris: strings(&self.allowed_redirect_uris),
            allowed_scopes: strings(&self.allowed_scopes),
            client_type: owned(&self.client_type),
            description: owned(&self.description),
            disabled: known(&self.disabled),
            display_name: owned(&self.display_name),
            ..Default::default()
        }
    }

    fn flatten(&mut self, client: OauthClient) {
        self.name = non_empty_string(client.name);
        self.allowed_grant_types = string_list(Some(client.allowed_grant_types.unwrap_or_default()));
        self.allowed_redirect_uris =
            string_list(Some(client.allowed_redirect_uris.unwrap_or_default()));
        self.allowed_scopes = string_list(Some(client.allowed_scopes.unwrap_or_default()));
        self.client_type = api_string(&self.client_type, client.client_type);
        self.description = api_string(&self.description, client.description);
        self.disabled = api_bool(&self.disabled, client.disabled);
        self.display_name = api_string(&self.display_name, client.display_name);
        self.client_id = non_empty_string(client.client_id);
        self.expire_time = non_empty_string(client.expire_time);
        self.state = non_empty_string(client.state);
    }

    fn display_id(&self) -> String {
        format!(
            "IAMWorkforcePoolOauthClient {:?}",
            non_empty(&self.id).unwrap_or_default()
        )
    }
}

impl<T: Transport> OauthClientResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: OauthClientState<'a>,
    ) -> Option<Option<OauthClientState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, CLIENT_URL, &state)
            .or_report(diags, "Error reading OauthClient")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        let oauth_client = handle_not_found(
            client
                .fetch::<OauthClient>(ApiRequest::get(url).with_billing_project(billing_project))
                .await,
            diags,
            &state.display_id(),
        )?;
        let oauth_client =
            oauth_client.filter(|oauth_client| oauth_client.state.as_deref() != Some(DELETED));
        if oauth_client.is_none() {
            debug!("Removing {} because it no longer exists", state.display_id());
        }
        Some(oauth_client.map(|oauth_client| {
            state.flatten(oauth_client);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for OauthClientResource<T> {
    type State<'a> = Value<OauthClientState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(OauthClientState::schema())
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
        state.project = with_default(&state.project, client.config.project.as_deref());
        if state.client_type.is_null() {
            state.client_type = prior.client_type.clone();
        }

        let mut replace = vec![];
        force_new(&mut replace, "location", &prior.location, &state.location);
        force_new(&mut replace, "oauth_client_id", &prior.oauth_client_id, &state.oauth_client_id);
        force_new(&mut replace, "client_type", &prior.client_type, &state.client_type);
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

        let url = replace_vars(
            &client.config,
            "{{IAMWorkforcePoolBasePath}}projects/{{project}}/locations/{{location}}/oauthClients?oauthClientId={{oauth_client_id}}",
            &state,
        )
        .or_report(diags, "Error creating OauthClient")?;
        let body = serde_json::to_value(state.expand()).or_report(diags, "Error creating OauthClient")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        debug!("Creating new OauthClient: {body}");
        client
            .send_request(
                ApiRequest::post(url, body)
                    .with_billing_project(billing_project)
                    .with_timeout(TIMEOUTS.create(&state.timeouts)),
            )
            .await
            .or_report(diags, "Error creating OauthClient")?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, CLIENT_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        tokio::time::sleep(PROPAGATION_DELAY).await;
        debug!("Finished creating OauthClient {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("OauthClient disappeared right after its creation");
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let prior = prior_state.unwrap_or_default();
        let state = planned_state.unwrap_or_default();
        let client = self.provider.client(diags).await?;

        let mut mask = UpdateMask::new();
        mask.push_if_changed("allowedScopes", &prior.allowed_scopes, &state.allowed_scopes);
        mask.push_if_changed("disabled", &prior.disabled, &state.disabled);
        mask.push_if_changed("displayName", &prior.display_name, &state.display_name);
        mask.push_if_changed("description", &prior.description, &state.description);
        mask.push_if_changed(
            "allowedGrantTypes",
            &prior.allowed_grant_types,
            &state.allowed_grant_types,
        );
        mask.push_if_changed(
            "allowedRedirectUris",
            &prior.allowed_redirect_uris,
            &state.allowed_redirect_uris,
        );

        if !mask.is_empty() {
            let url = replace_vars(&client.config, CLIENT_URL, &state)
                .and_then(|url| add_query_params(&url, &[("updateMask", &mask.to_string())]))
                .or_report(diags, "Error updating OauthClient")?;
            let body = serde_json::to_value(state.expand()).or_report(diags, "Error updating OauthClient")?;
            let billing_project = client.config.billing_project_for(non_empty(&state.project));

            debug!("Updating OauthClient {:?} ({mask})", state.id);
            client
                .send_request(
                    ApiRequest::patch(url, body)
                        .with_billing_project(billing_project)
                        .with_timeout(TIMEOUTS.update(&state.timeouts)),
                )
                .await
                .or_report(diags, "Error updating OauthClient")?;
            tokio::time::sleep(PROPAGATION_DELAY).await;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("OauthClient disappeared during its update");
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let state = state.unwrap_or_default();
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, CLIENT_URL, &state)
            .or_report(diags, "Error deleting OauthClient")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        debug!("Deleting OauthClient {:?}", state.id);
        let result = client
            .send_request(
                ApiRequest::delete(url)
                    .with_billing_project(billing_project)
                    .with_timeout(TIMEOUTS.delete(&state.timeouts)),
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => {
                warn!("{} was already deleted", state.display_id());
                return Some(());
            }
            result => {
                result.or_report(diags, "Error deleting OauthClient")?;
            }
        }
        tokio::time::sleep(PROPAGATION_DELAY).await;
        debug!("Finished deleting OauthClient {:?}", state.id);
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.provider.client(diags).await?;
        let mut fields = parse_import_id(IMPORT_FORMATS, &id, &client.config)
            .or_report(diags, "Error importing OauthClient")?;

        let mut state = OauthClientState {
            project: string(fields.take("project")),
            location: string(fields.take("location")),
            oauth_client_id: string(fields.take("oauth_client_id")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, CLIENT_ID, &state).or_report(diags, "Error constructing id")?,
        ));
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

    const CLIENT: &str =
        "https://iam.googleapis.com/v1/projects/my-project/locations/global/oauthClients/my-client";

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn list(values: &[&str]) -> ValueList<ValueString<'static>> {
        string_list(Some(values.iter().map(|v| v.to_string()).collect()))
    }

    fn planned_client() -> OauthClientState<'static> {
        OauthClientState {
            location: string("global"),
            oauth_client_id: string("my-client"),
            allowed_grant_types: list(&["AUTHORIZATION_CODE_GRANT"]),
            allowed_redirect_uris: list(&["https://www.example.com"]),
            allowed_scopes: list(&["https://www.googleapis.com/auth/cloud-platform"]),
            client_type: string("CONFIDENTIAL_CLIENT"),
            ..Default::default()
        }
    }

    fn client_json(state: &str) -> serde_json::Value {
        json!({
            "name": "projects/my-project/locations/global/oauthClients/my-client",
            "state": state,
            "clientId": "generated-client-id",
            "clientType": "CONFIDENTIAL_CLIENT",
            "allowedGrantTypes": ["AUTHORIZATION_CODE_GRANT"],
            "allowedRedirectUris": ["https://www.example.com"],
            "allowedScopes": ["https://www.googleapis.com/auth/cloud-platform"]
        })
    }

    #[tokio::test]
    async fn invalid_client_is_rejected() {
        let resource = OauthClientResource::new(test_handle(FakeTransport::default()).await);
        let mut oauth_client = planned_client();
        oauth_client.oauth_client_id = string("client-");
        oauth_client.client_type = string("SECRET_CLIENT");
        let mut diags = Diagnostics::default();
        assert!(resource.validate(&mut diags, Value::Value(oauth_client)).await.is_none());
        assert_eq!(diags.errors.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn create_is_synchronous() {
        let resource = OauthClientResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(client_json("ACTIVE"))
                    .respond(client_json("ACTIVE")),
            )
            .await,
        );
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned_client()),
                Value::Value(planned_client()),
                Default::default(),
            )
            .await
            .unwrap();
        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);

        let state = state.unwrap_or_default();
        assert_eq!(
            state.id,
            string("projects/my-project/locations/global/oauthClients/my-client")
        );
        assert_eq!(state.project, string("my-project"));
        assert_eq!(state.client_id, string("generated-client-id"));
        assert_eq!(state.disabled, Value::Null);

        let client = resource.provider.client(&mut diags).await.unwrap();
        assert_eq!(
            client.transport().calls(),
            vec![
                (
                    Method::POST,
                    "https://iam.googleapis.com/v1/projects/my-project/locations/global/oauthClients?oauthClientId=my-client".to_owned()
                ),
                (Method::GET, CLIENT.to_owned()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn client_type_defaults_from_the_api() {
        let resource = OauthClientResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(client_json("ACTIVE"))
                    .respond(client_json("ACTIVE")),
            )
            .await,
        );
        let mut proposed = planned_client();
        proposed.client_type = Value::Null;
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(proposed.clone()),
                Value::Value(proposed.clone()),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(planned.clone().unwrap_or_default().client_type, ValueString::Unknown);

        let (state, _) = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{:?}", diags.errors);
        let state = state.unwrap_or_default();
        assert_eq!(state.client_type, string("CONFIDENTIAL_CLIENT"));

        proposed.project = state.project.clone();
        let (planned, _, replace) = resource
            .plan_update(
                &mut diags,
                Value::Value(state),
                Value::Value(proposed.clone()),
                Value::Value(proposed),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(replace.is_empty());
        assert_eq!(
            planned.unwrap_or_default().client_type,
            string("CONFIDENTIAL_CLIENT")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn update_masks_changed_fields() {
        let resource = OauthClientResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(client_json("ACTIVE"))
                    .respond(client_json("ACTIVE")),
            )
            .await,
        );
        let mut prior = planned_client();
        prior.project = string("my-project");
        let mut planned = prior.clone();
        planned.allowed_scopes = list(&["openid", "email"]);
        planned.display_name = string("Client");

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
        assert_eq!(
            client.transport().requests()[0].url,
            format!("{CLIENT}?updateMask=allowedScopes%2CdisplayName")
        );
    }

    #[tokio::test]
    async fn soft_deleted_client_is_gone() {
        let resource = OauthClientResource::new(
            test_handle(FakeTransport::default().respond(client_json(DELETED))).await,
        );
        let mut state = planned_client();
        state.project = string("my-project");
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, Value::Value(state), Default::default(), Default::default())
            .await
            .unwrap();
        assert_eq!(state, Value::Null);
    }

    #[tokio::test]
    async fn deleting_a_missing_client_succeeds() {
        let resource = OauthClientResource::new(
            test_handle(FakeTransport::default().fail(404, "not found")).await,
        );
        let mut state = planned_client();
        state.project = string("my-project");
        let mut diags = Diagnostics::default();
        assert!(resource
            .destroy(&mut diags, Value::Value(state), Default::default())
            .await
            .is_some());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn import_defaults_project() {
        let resource = OauthClientResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .import(&mut diags, "global/my-client".to_owned())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(
            state.id,
            string("projects/my-project/locations/global/oauthClients/my-client")
        );
        assert_eq!(state.project, string("my-project"));
    }
}
