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

use tf_provider::schema::NestedBlock;
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::schema::{self as attr, Computed, Optional, OptionalComputed, Required};
use crate::tpgresource::validation::{validate_length, validate_max_items, validate_regex};
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    api_bool, api_string, block, blocks, known, non_empty, non_empty_string, owned, string,
    to_block, tracked, ResultExt, ValueBool, WithNormalize, WithSchema, WithValidate,
};

use super::{validate_id, DELETED};

const POOL_URL: &str =
    "{{IAMWorkforcePoolBasePath}}locations/{{location}}/workforcePools/{{workforce_pool_id}}";
const POOL_ID: &str = "locations/{{location}}/workforcePools/{{workforce_pool_id}}";
const IMPORT_FORMATS: &[&str] = &[
    "^locations/(?P<location>[^/]+)/workforcePools/(?P<workforce_pool_id>[^/]+)$",
    "^(?P<location>[^/]+)/(?P<workforce_pool_id>[^/]+)$",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const DEFAULT_SESSION_DURATION: &str = "3600s";

lazy_static! {
    static ref POOL_ID_REGEX: Regex =
        Regex::new(r"^[a-z][a-z0-9-]{4,61}[a-z0-9]$").expect("workforce pool id regex is valid");
    static ref PARENT: Regex =
        Regex::new(r"^organizations/[0-9]+$").expect("organization regex is valid");
}

#[derive(Debug)]
pub struct WorkforcePoolResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> WorkforcePoolResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkforcePoolState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub workforce_pool_id: ValueString<'a>,
    pub parent: ValueString<'a>,
    pub location: ValueString<'a>,
    pub display_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub disabled: ValueBool,
    pub session_duration: ValueString<'a>,
    pub access_restrictions: ValueList<Value<AccessRestrictions<'a>>>,
    pub state: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRestrictions<'a> {
    pub allowed_services: ValueList<Value<AllowedService<'a>>>,
    pub disable_programmatic_signin: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowedService<'a> {
    pub domain: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WorkforcePool {
    #[serde(skip_serializing)]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_restrictions: Option<ApiAccessRestrictions>,
    #[serde(skip_serializing)]
    state: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiAccessRestrictions {
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_services: Option<Vec<ApiAllowedService>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disable_programmatic_signin: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApiAllowedService {
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<String>,
}

impl ResourceVars for WorkforcePoolState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "location" => owned(&self.location),
            "workforce_pool_id" => owned(&self.workforce_pool_id),
            _ => None,
        }
    }
}

impl WithSchema for WorkforcePoolState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attr::id(),
                    "name" => attr::string(Computed, "Output only. The resource name of the pool. Format: `locations/{location}/workforcePools/{workforcePoolId}`"),
                    "workforce_pool_id" => attr::string(Required, "The name of the pool. The ID must be a globally unique string of 6 to 63 lowercase letters, digits, or hyphens. It must start with a letter, and cannot have a trailing hyphen. The prefix `gcp-` is reserved for use by Google, and may not be specified."),
                    "parent" => attr::string(Required, "Immutable. The resource name of the parent. Format: `organizations/{org-id}`."),
                    "location" => attr::string(Required, "The location for the resource."),
                    "display_name" => attr::string(Optional, "A user-specified display name of the pool in Google Cloud Console. Cannot exceed 32 characters."),
                    "description" => attr::string(Optional, "A user-specified description of the pool. Cannot exceed 256 characters."),
                    "disabled" => attr::bool(Optional, "Whether the pool is disabled. You cannot use a disabled pool to exchange tokens, or use existing tokens to access resources. If the pool is re-enabled, existing tokens grant access again."),
                    "session_duration" => attr::string(OptionalComputed, "Duration that the Google Cloud access tokens, console sign-in sessions, and `gcloud` sign-in sessions from this pool are valid. Must be greater than 15 minutes (900s) and less than 12 hours (43200s). If `sessionDuration` is not configured, minted credentials have a default duration of one hour (3600s). A duration in seconds with up to nine fractional digits, ending with 's'. Example: \"3.5s\"."),
                    "state" => attr::string(Computed, "Output only. The state of the pool. * STATE_UNSPECIFIED: State unspecified. * ACTIVE: The pool is active, and may be used in Google Cloud policies. * DELETED: The pool is soft-deleted. Soft-deleted pools are permanently deleted after approximately 30 days."),
                },
                blocks: map! {
                    "access_restrictions" => NestedBlock::List(Block {
                        attributes: map! {
                            "disable_programmatic_signin" => attr::bool(Optional, "Disable programmatic sign-in by disabling token issue via the Security Token API endpoint."),
                        },
                        blocks: map! {
                            "allowed_services" => NestedBlock::List(Block {
                                attributes: map! {
                                    "domain" => attr::string(Optional, "Domain name of the service. Example: console.cloud.google"),
                                },
                                description: Description::plain("Services allowed for web sign-in with the workforce pool. If not set by default there are no restrictions."),
                                ..Default::default()
                            }),
                        },
                        description: Description::plain("Configure access restrictions on the workforce pool users. This is an optional field. If specified web sign-in can be restricted to given set of services or programmatic sign-in can be disabled for pool users."),
                        ..Default::default()
                    }),
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("Represents a collection of external workforces. Provides namespaces for federated users that can be referenced in IAM policies."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for WorkforcePoolState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_id(
            diags,
            &self.workforce_pool_id,
            &POOL_ID_REGEX,
            "must contain only lowercase letters [a-z], digits [0-9], and hyphens [-], must start with a letter, and be 6-63 characters in length",
            attr_path.clone().attribute("workforce_pool_id"),
        );
        validate_regex(diags, &self.parent, &PARENT, attr_path.clone().attribute("parent"));
        validate_length(diags, &self.display_name, 0, 32, attr_path.clone().attribute("display_name"));
        validate_length(diags, &self.description, 0, 256, attr_path.clone().attribute("description"));
        validate_max_items(
            diags,
            &self.access_restrictions,
            1,
            attr_path.attribute("access_restrictions"),
        );
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for WorkforcePoolState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.name = Value::Unknown;
        self.state = Value::Unknown;
    }
}

impl<'a> WorkforcePoolState<'a> {
    fn expand(&self) -> WorkforcePool {
        WorkforcePool {
            parent: owned(&self.parent),
            display_name: owned(&self.display_name),
            description: owned(&self.description),
            disabled: known(&self.disabled),
            session_duration: owned(&self.session_duration),
            access_restrictions: block(&self.access_restrictions).map(|restrictions| {
                ApiAccessRestrictions {
                    allowed_services: match &restrictions.allowed_services {
                        Value::Value(_) => Some(
                            blocks(&restrictions.allowed_services)
                                .map(|service| ApiAllowedService {
                                    domain: owned(&service.domain),
                                })
                                .collect(),
                        ),
                        _ => None,
                    },
                    disable_programmatic_signin: known(&restrictions.disable_programmatic_signin),
                }
            }),
            ..Default::default()
        }
    }

    fn flatten(&mut self, pool: WorkforcePool) {
        self.name = non_empty_string(pool.name);
        self.parent = api_string(&self.parent, pool.parent);
        self.display_name = api_string(&self.display_name, pool.display_name);
        self.description = api_string(&self.description, pool.description);
        self.disabled = api_bool(&self.disabled, pool.disabled);
        self.session_duration = non_empty_string(pool.session_duration);
        if tracked(&self.access_restrictions) {
            let prior = block(&self.access_restrictions).cloned().unwrap_or_default();
            self.access_restrictions = to_block(pool.access_restrictions.map(|restrictions| {
                AccessRestrictions {
                    allowed_services: Value::Value(
                        restrictions
                            .allowed_services
                            .unwrap_or_default()
                            .into_iter()
                            .map(|service| {
                                Value::Value(AllowedService {
                                    domain: non_empty_string(service.domain),
                                })
                            })
                            .collect(),
                    ),
                    disable_programmatic_signin: api_bool(
                        &prior.disable_programmatic_signin,
                        restrictions.disable_programmatic_signin,
                    ),
                }
            }));
        }
        self.state = non_empty_string(pool.state);
    }

    fn display_id(&self) -> String {
        format!("IAMWorkforcePoolWorkforcePool {:?}", non_empty(&self.id).unwrap_or_default())
    }
}

impl<T: Transport> WorkforcePoolResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: WorkforcePoolState<'a>,
    ) -> Option<Option<WorkforcePoolState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, POOL_URL, &state)
            .or_report(diags, "Error reading WorkforcePool")?;

        let pool = handle_not_found(
            client
                .fetch::<WorkforcePool>(
                    ApiRequest::get(url).with_billing_project(client.config.billing_project.clone()),
                )
                .await,
            diags,
            &state.display_id(),
        )?;
        let pool = pool.filter(|pool| {
            let deleted = pool.state.as_deref() == Some(DELETED);
            if deleted {
                debug!("Removing {} because it is soft-deleted", state.display_id());
            }
            !deleted
        });
        Some(pool.map(|pool| {
            state.flatten(pool);
            state
        }))
    }

    async fn wait_on(
        &self,
        diags: &mut Diagnostics,
        request: ApiRequest,
        activity: &'static str,
        timeout: std::time::Duration,
    ) -> Option<()> {
        let client = self.provider.client(diags).await?;
        let billing_project = client.config.billing_project.clone();
        client
            .send_and_wait(
                request
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::IamWorkforcePool,
                    billing_project,
                    activity,
                    timeout,
                },
            )
            .await
            .or_report(diags, &format!("Error {activity}"))?;
        Some(())
    }
}

#[async_trait]
impl<T: Transport> Resource for WorkforcePoolResource<T> {
    type State<'a> = Value<WorkforcePoolState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(WorkforcePoolState::schema())
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
        if state.session_duration.is_null() {
            state.session_duration = Value::Value(Cow::Borrowed(DEFAULT_SESSION_DURATION));
        }
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
        let Value::Value(mut state) = proposed_state else {
            return Some((proposed_state, prior_private_state, vec![]));
        };
        if state.session_duration.is_null() {
            state.session_duration = Value::Value(Cow::Borrowed(DEFAULT_SESSION_DURATION));
        }

        let mut replace = vec![];
        force_new(&mut replace, "workforce_pool_id", &prior.workforce_pool_id, &state.workforce_pool_id);
        force_new(&mut replace, "parent", &prior.parent, &state.parent);
        force_new(&mut replace, "location", &prior.location, &state.location);

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

        let url = replace_vars(
            &client.config,
            "{{IAMWorkforcePoolBasePath}}locations/{{location}}/workforcePools?workforcePoolId={{workforce_pool_id}}",
            &state,
        )
        .or_report(diags, "Error creating WorkforcePool")?;
        let body = serde_json::to_value(state.expand()).or_report(diags, "Error creating WorkforcePool")?;

        debug!("Creating new WorkforcePool: {body}");
        self.wait_on(
            diags,
            ApiRequest::post(url, body),
            "creating WorkforcePool",
            TIMEOUTS.create(&state.timeouts),
        )
        .await?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, POOL_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        debug!("Finished creating WorkforcePool {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("WorkforcePool disappeared right after its creation");
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
        mask.push_if_changed("displayName", &prior.display_name, &state.display_name);
        mask.push_if_changed("description", &prior.description, &state.description);
        mask.push_if_changed("disabled", &prior.disabled, &state.disabled);
        mask.push_if_changed("sessionDuration", &prior.session_duration, &state.session_duration);
        mask.push_if_changed(
            "accessRestrictions",
            &prior.access_restrictions,
            &state.access_restrictions,
        );

        if !mask.is_empty() {
            let url = replace_vars(&client.config, POOL_URL, &state)
                .and_then(|url| add_query_params(&url, &[("updateMask", &mask.to_string())]))
                .or_report(diags, "Error updating WorkforcePool")?;
            let body =
                serde_json::to_value(state.expand()).or_report(diags, "Error updating WorkforcePool")?;

            debug!("Updating WorkforcePool {:?}: {body}", state.id);
            self.wait_on(
                diags,
                ApiRequest::patch(url, body),
                "updating WorkforcePool",
                TIMEOUTS.update(&state.timeouts),
            )
            .await?;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("WorkforcePool disappeared during its update");
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
        let url = replace_vars(&client.config, POOL_URL, &state)
            .or_report(diags, "Error deleting WorkforcePool")?;
        let timeout = TIMEOUTS.delete(&state.timeouts);

        debug!("Deleting WorkforcePool {:?}", state.id);
        let result = client
            .send_and_wait(
                ApiRequest::delete(url)
                    .with_billing_project(client.config.billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::IamWorkforcePool,
                    billing_project: client.config.billing_project.clone(),
                    activity: "Deleting WorkforcePool",
                    timeout,
                },
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => {
                warn!("{} was already deleted", state.display_id());
            }
            result => {
                result.or_report(diags, "Error deleting WorkforcePool")?;
            }
        }
        debug!("Finished deleting WorkforcePool {:?}", state.id);
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.provider.client(diags).await?;
        let mut fields = parse_import_id(IMPORT_FORMATS, &id, &client.config)
            .or_report(diags, "Error importing WorkforcePool")?;

        let mut state = WorkforcePoolState {
            location: string(fields.take("location")),
            workforce_pool_id: string(fields.take("workforce_pool_id")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, POOL_ID, &state).or_report(diags, "Error constructing id")?,
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

    const POOL: &str = "https://iam.googleapis.com/v1/locations/global/workforcePools/my-pool";

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn planned_pool() -> WorkforcePoolState<'static> {
        WorkforcePoolState {
            workforce_pool_id: string("my-pool"),
            parent: string("organizations/123456789"),
            location: string("global"),
            display_name: string("My pool"),
            access_restrictions: to_block(Some(AccessRestrictions {
                allowed_services: Value::Value(vec![Value::Value(AllowedService {
                    domain: string("backstory.chronicle.security"),
                })]),
                disable_programmatic_signin: Value::Value(false),
            })),
            ..Default::default()
        }
    }

    fn pool_json(state: &str) -> serde_json::Value {
        json!({
            "name": "locations/global/workforcePools/my-pool",
            "parent": "organizations/123456789",
            "displayName": "My pool",
            "sessionDuration": "3600s",
            "state": state,
            "accessRestrictions": {
                "allowedServices": [{"domain": "backstory.chronicle.security"}]
            }
        })
    }

    fn done() -> serde_json::Value {
        json!({"name": "locations/global/workforcePools/my-pool/operations/op-1", "done": true})
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let resource = WorkforcePoolResource::new(test_handle(FakeTransport::default()).await);
        let mut pool = planned_pool();
        pool.workforce_pool_id = string("gcp-Pool");
        pool.parent = string("folders/1");
        let mut diags = Diagnostics::default();
        assert!(resource.validate(&mut diags, Value::Value(pool)).await.is_none());
        assert_eq!(diags.errors.len(), 3);
    }

    #[tokio::test]
    async fn create_sends_parent_and_default_session() {
        let resource = WorkforcePoolResource::new(
            test_handle(FakeTransport::default().respond(done()).respond(pool_json("ACTIVE"))).await,
        );
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned_pool()),
                Value::Value(planned_pool()),
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
        assert_eq!(state.id, string("locations/global/workforcePools/my-pool"));
        assert_eq!(state.state, string("ACTIVE"));
        assert_eq!(state.disabled, Value::Null);
        let restrictions = block(&state.access_restrictions).unwrap();
        assert_eq!(restrictions.disable_programmatic_signin, Value::Value(false));

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert_eq!(
            requests[0].url,
            "https://iam.googleapis.com/v1/locations/global/workforcePools?workforcePoolId=my-pool"
        );
        assert_eq!(
            requests[0].body,
            Some(json!({
                "parent": "organizations/123456789",
                "displayName": "My pool",
                "sessionDuration": "3600s",
                "accessRestrictions": {
                    "allowedServices": [{"domain": "backstory.chronicle.security"}],
                    "disableProgrammaticSignin": false
                }
            }))
        );
    }

    #[tokio::test]
    async fn soft_deleted_pool_is_gone() {
        let resource = WorkforcePoolResource::new(
            test_handle(FakeTransport::default().respond(pool_json(DELETED))).await,
        );
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, Value::Value(planned_pool()), Default::default(), Default::default())
            .await
            .unwrap();
        assert_eq!(state, Value::Null);
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn update_masks_changed_fields() {
        let resource = WorkforcePoolResource::new(
            test_handle(FakeTransport::default().respond(done()).respond(pool_json("ACTIVE"))).await,
        );
        let prior = planned_pool();
        let mut planned = prior.clone();
        planned.disabled = Value::Value(true);
        planned.session_duration = string("7200s");

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
            format!("{POOL}?updateMask=disabled%2CsessionDuration")
        );
    }

    #[tokio::test]
    async fn import_ids() {
        let resource = WorkforcePoolResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .import(&mut diags, "global/my-pool".to_owned())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(state.id, string("locations/global/workforcePools/my-pool"));
        assert_eq!(state.location, string("global"));
    }
}
