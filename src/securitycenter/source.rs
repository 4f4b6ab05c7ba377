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
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::schema::{self as attr, Computed, Optional, Required};
use crate::tpgresource::validation::{validate_length, validate_regex};
use crate::tpgresource::{
    add_query_params, force_new, replace_vars, timeouts, ResourceTimeouts, ResourceVars,
    TimeoutsBlock, UpdateMask,
};
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    api_string, non_empty, non_empty_string, owned, ResultExt, WithNormalize, WithSchema,
    WithValidate,
};

const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const NAME_SHAPE: &str = "organizations/{{organization}}/sources/{{source}}";

lazy_static! {
    static ref DISPLAY_NAME: Regex = Regex::new(r"^[\p{L}\p{N}]([\p{L}\p{N}_ -]{0,30}[\p{L}\p{N}])?$")
        .expect("source display name regex is valid");
}

/// Finding source of an organization. The same resource is served by the v1
/// and v2 APIs, which only differ by their base path.
#[derive(Debug)]
pub struct SourceResource<T: Transport> {
    provider: ProviderHandle<T>,
    service: Service,
    kind: &'static str,
}

impl<T: Transport> SourceResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self {
            provider,
            service: Service::SecurityCenter,
            kind: "Source",
        }
    }

    /// `google_scc_v2_organization_source`
    pub fn organization_source(provider: ProviderHandle<T>) -> Self {
        Self {
            provider,
            service: Service::SecurityCenterV2,
            kind: "OrganizationSource",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub organization: ValueString<'a>,
    pub display_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Source {
    #[serde(skip_serializing)]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

impl ResourceVars for SourceState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "organization" => owned(&self.organization),
            "name" => owned(&self.name),
            _ => None,
        }
    }
}

impl WithSchema for SourceState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attr::id(),
                    "organization" => attr::string(Required, "The organization whose Cloud Security Command Center the Source lives in."),
                    "display_name" => attr::string(Required, "The source’s display name. A source’s display name must be unique amongst its siblings, for example, two sources with the same parent can't share the same display name. The display name must start and end with a letter or digit, may contain letters, digits, spaces, hyphens, and underscores, and can be no longer than 32 characters."),
                    "description" => attr::string(Optional, "The description of the source (max of 1024 characters)."),
                    "name" => attr::string(Computed, "The resource name of this source, in the format 'organizations/{{organization}}/sources/{{source}}'."),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("A Cloud Security Command Center's (Cloud SCC) finding source. A finding source is an entity or a mechanism that can produce a finding. A source is like a container of findings that come from the same scanner, logger, monitor, etc."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for SourceState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_regex(diags, &self.display_name, &DISPLAY_NAME, attr_path.clone().attribute("display_name"));
        validate_length(diags, &self.description, 0, 1024, attr_path.attribute("description"));
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for SourceState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.name = Value::Unknown;
    }
}

impl<'a> SourceState<'a> {
    fn expand(&self) -> Source {
        Source {
            description: owned(&self.description),
            display_name: owned(&self.display_name),
            ..Default::default()
        }
    }

    fn flatten(&mut self, source: Source) {
        self.name = non_empty_string(source.name);
        self.description = api_string(&self.description, source.description);
        self.display_name = non_empty_string(source.display_name);
    }
}

/// Name of the created source, either at the top level or in `response`
fn created_name(response: &serde_json::Value) -> Option<&str> {
    response
        .get("name")
        .or_else(|| response.get("response")?.get("name"))
        .and_then(serde_json::Value::as_str)
}

/// Organization of a source name shaped as
/// `organizations/{organization}/sources/{source}`
fn organization_of(name: &str) -> Option<&str> {
    let parts: Vec<&str> = name.split('/').collect();
    match parts.as_slice() {
        [_, organization, _, _] => Some(*organization),
        _ => None,
    }
}

impl<T: Transport> SourceResource<T> {
    fn display_id(&self, state: &SourceState) -> String {
        let product = match self.service {
            Service::SecurityCenterV2 => "SecurityCenterV2",
            _ => "SecurityCenter",
        };
        format!(
            "{product}{} {:?}",
            self.kind,
            non_empty(&state.id).unwrap_or_default()
        )
    }

    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: SourceState<'a>,
    ) -> Option<Option<SourceState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = format!(
            "{}{}",
            client.config.base_path(self.service),
            non_empty(&state.name).unwrap_or_default()
        );

        let source = handle_not_found(
            client
                .fetch::<Source>(
                    ApiRequest::get(url).with_billing_project(client.config.billing_project.clone()),
                )
                .await,
            diags,
            &self.display_id(&state),
        )?;
        Some(source.map(|source| {
            state.flatten(source);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for SourceResource<T> {
    type State<'a> = Value<SourceState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SourceState::schema())
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
        state.normalize(diags);
        Some((Value::Value(state), Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let prior = prior_state.unwrap_or_default();
        let Value::Value(state) = proposed_state else {
            return Some((proposed_state, prior_private_state, vec![]));
        };

        let mut replace = vec![];
        force_new(&mut replace, "organization", &prior.organization, &state.organization);

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
        let summary = format!("Error creating {}", self.kind);

        let url = replace_vars(&client.config, "organizations/{{organization}}/sources", &state)
            .map(|path| format!("{}{path}", client.config.base_path(self.service)))
            .or_report(diags, &summary)?;
        let body = serde_json::to_value(state.expand()).or_report(diags, &summary)?;

        debug!("Creating new {}: {body}", self.kind);
        let response = client
            .send_request(
                ApiRequest::post(url, body)
                    .with_billing_project(client.config.billing_project.clone())
                    .with_timeout(TIMEOUTS.create(&state.timeouts)),
            )
            .await
            .or_report(diags, &summary)?;

        let Some(name) = created_name(&response) else {
            diags.root_error(
                summary,
                "Create response didn't contain critical fields. Create may not have succeeded.",
            );
            return None;
        };
        state.name = Value::Value(Cow::Owned(name.to_owned()));
        state.id = state.name.clone();
        debug!("Finished creating {} {:?}", self.kind, state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short(format!("{} disappeared right after its creation", self.kind));
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
        let summary = format!("Error updating {} {:?}", self.kind, state.id);

        let mut mask = UpdateMask::new();
        mask.push_if_changed("description", &prior.description, &state.description);
        mask.push_if_changed("displayName", &prior.display_name, &state.display_name);

        if !mask.is_empty() {
            let url = format!(
                "{}{}",
                client.config.base_path(self.service),
                non_empty(&state.name).unwrap_or_default()
            );
            let url = add_query_params(&url, &[("updateMask", &mask.to_string())])
                .or_report(diags, &summary)?;
            let body = serde_json::to_value(state.expand()).or_report(diags, &summary)?;

            debug!("Updating {} {:?}: {body}", self.kind, state.id);
            client
                .send_request(
                    ApiRequest::patch(url, body)
                        .with_billing_project(client.config.billing_project.clone())
                        .with_timeout(TIMEOUTS.update(&state.timeouts)),
                )
                .await
                .or_report(diags, &summary)?;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short(format!("{} disappeared during its update", self.kind));
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let state = state.unwrap_or_default();
        warn!(
            "SecurityCenter {} resources cannot be deleted from Google Cloud. The resource {:?} will be removed from Terraform state, but will still be present on Google Cloud.",
            self.kind, state.id
        );
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Some(organization) = organization_of(&id) else {
            diags.root_error(
                format!("Error importing {}", self.kind),
                format!("Saw {id} when the name is expected to have shape {NAME_SHAPE}"),
            );
            return None;
        };
        let state = SourceState {
            organization: Value::Value(Cow::Owned(organization.to_owned())),
            name: Value::Value(Cow::Owned(id.clone())),
            id: Value::Value(Cow::Owned(id)),
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

    const SOURCE: &str = "organizations/123456789/sources/987";

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn planned_source() -> SourceState<'static> {
        SourceState {
            organization: string("123456789"),
            display_name: string("My Source"),
            description: string("My custom Cloud Security Command Center Finding Source"),
            ..Default::default()
        }
    }

    fn source_json() -> serde_json::Value {
        json!({
            "name": SOURCE,
            "displayName": "My Source",
            "description": "My custom Cloud Security Command Center Finding Source"
        })
    }

    #[test]
    fn display_names() {
        assert!(DISPLAY_NAME.is_match("My Source"));
        assert!(DISPLAY_NAME.is_match("a"));
        assert!(DISPLAY_NAME.is_match("Détection_2"));
        assert!(!DISPLAY_NAME.is_match("trailing-"));
        assert!(!DISPLAY_NAME.is_match(" leading"));
        assert!(!DISPLAY_NAME.is_match(&"a".repeat(33)));
    }

    #[test]
    fn created_names() {
        assert_eq!(created_name(&json!({"name": SOURCE})), Some(SOURCE));
        assert_eq!(
            created_name(&json!({"response": {"name": SOURCE}})),
            Some(SOURCE)
        );
        assert_eq!(created_name(&json!({"done": true})), None);
    }

    #[tokio::test]
    async fn create_uses_returned_name() {
        let resource = SourceResource::new(
            test_handle(FakeTransport::default().respond(source_json()).respond(source_json())).await,
        );
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned_source()),
                Value::Value(planned_source()),
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
        assert_eq!(state.id, string(SOURCE));
        assert_eq!(state.name, string(SOURCE));

        let client = resource.provider.client(&mut diags).await.unwrap();
        assert_eq!(
            client.transport().calls(),
            vec![
                (
                    Method::POST,
                    "https://securitycenter.googleapis.com/v1/organizations/123456789/sources".to_owned()
                ),
                (
                    Method::GET,
                    format!("https://securitycenter.googleapis.com/v1/{SOURCE}")
                ),
            ]
        );
    }

    #[tokio::test]
    async fn create_without_name_fails() {
        let resource = SourceResource::new(
            test_handle(FakeTransport::default().respond(json!({}))).await,
        );
        let mut diags = Diagnostics::default();
        let mut planned = planned_source();
        planned.normalize(&mut diags);
        assert!(resource
            .create(
                &mut diags,
                Value::Value(planned.clone()),
                Value::Value(planned),
                Default::default(),
                Default::default(),
            )
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn organization_source_uses_v2() {
        let resource = SourceResource::organization_source(
            test_handle(FakeTransport::default().respond(source_json()).respond(source_json())).await,
        );
        let mut prior = planned_source();
        prior.name = string(SOURCE);
        prior.id = string(SOURCE);
        let mut planned = prior.clone();
        planned.description = string("Updated description");

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
        assert_eq!(
            requests[0].url,
            format!("https://securitycenter.googleapis.com/v2/{SOURCE}?updateMask=description")
        );
        assert_eq!(
            requests[0].body,
            Some(json!({
                "description": "Updated description",
                "displayName": "My Source"
            }))
        );
    }

    #[tokio::test]
    async fn destroy_only_forgets() {
        let resource = SourceResource::new(test_handle(FakeTransport::default()).await);
        let mut state = planned_source();
        state.id = string(SOURCE);
        let mut diags = Diagnostics::default();
        assert!(resource
            .destroy(&mut diags, Value::Value(state), Default::default())
            .await
            .is_some());
        let client = resource.provider.client(&mut diags).await.unwrap();
        assert!(client.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn import_checks_the_name() {
        let resource = SourceResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let (state, _) = resource.import(&mut diags, SOURCE.to_owned()).await.unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(state.organization, string("123456789"));
        assert_eq!(state.name, string(SOURCE));

        assert!(resource
            .import(&mut diags, "sources/987".to_owned())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
