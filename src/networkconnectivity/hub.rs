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
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::value::{Value, ValueEmpty, ValueList, ValueMap, ValueString};
use tf_provider::schema::Attribute;
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::labels::{self, FlattenedLabels};
use crate::tpgresource::schema::{self as attr, Optional, Required};
use crate::tpgresource::{
    force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts, ResourceVars,
    TimeoutsBlock, UpdateMask,
};
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    api_string, non_empty, non_empty_string, owned, with_default, ResultExt, WithNormalize,
    WithSchema, WithValidate,
};

const HUB_URL: &str =
    "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/global/hubs/{{name}}";
const HUB_ID: &str = "projects/{{project}}/locations/global/hubs/{{name}}";
const IMPORT_FORMATS: &[&str] = &[
    "projects/(?P<project>[^/]+)/locations/global/hubs/(?P<name>[^/]+)",
    "(?P<project>[^/]+)/(?P<name>[^/]+)",
    "(?P<name>[^/]+)",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);

#[derive(Debug)]
pub struct HubResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> HubResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub labels: ValueMap<'a, ValueString<'a>>,
    pub terraform_labels: ValueMap<'a, ValueString<'a>>,
    pub effective_labels: ValueMap<'a, ValueString<'a>>,
    pub project: ValueString<'a>,
    pub create_time: ValueString<'a>,
    pub routing_vpcs: ValueList<Value<RoutingVpc<'a>>>,
    pub state: ValueString<'a>,
    pub unique_id: ValueString<'a>,
    pub update_time: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingVpc<'a> {
    pub uri: ValueString<'a>,
}

/// Hub as exchanged with the API
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Hub {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing)]
    create_time: Option<String>,
    #[serde(skip_serializing)]
    routing_vpcs: Option<Vec<HubRoutingVpc>>,
    #[serde(skip_serializing)]
    state: Option<String>,
    #[serde(skip_serializing)]
    unique_id: Option<String>,
    #[serde(skip_serializing)]
    update_time: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct HubRoutingVpc {
    uri: Option<String>,
}

impl ResourceVars for HubState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "name" => owned(&self.name),
            "project" => owned(&self.project),
            _ => None,
        }
    }
}

impl WithSchema for HubState<'_> {
    fn schema() -> Schema {
        let mut attributes: HashMap<String, Attribute> = map! {
            "id" => attr::id(),
            "name" => attr::string(Required, "Immutable. The name of the hub. Hub names must be unique. They use the following form: `projects/{project_number}/locations/global/hubs/{hub_id}`"),
            "description" => attr::string(Optional, "An optional description of the hub."),
            "project" => attr::project(),
            "create_time" => attr::string(attr::Computed, "Output only. The time the hub was created."),
            "routing_vpcs" => attr::computed_objects(&["uri"], "The VPC network associated with this hub's spokes. All of the VPN tunnels, VLAN attachments, and router appliance instances referenced by this hub's spokes must belong to this VPC network. This field is read-only. Network Connectivity Center automatically populates it based on the set of spokes attached to the hub."),
            "state" => attr::string(attr::Computed, "Output only. The current lifecycle state of this hub. Possible values: STATE_UNSPECIFIED, CREATING, ACTIVE, DELETING"),
            "unique_id" => attr::string(attr::Computed, "Output only. The Google-generated UUID for the hub. This value is unique across all hub resources. If a hub is deleted and another with the same name is created, the new hub is assigned a different unique_id."),
            "update_time" => attr::string(attr::Computed, "Output only. The time the hub was last updated."),
        };
        attributes.extend(labels::schema());

        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("The NetworkConnectivity Hub resource"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for HubState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for HubState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.effective_labels = Value::Unknown;
        self.create_time = Value::Unknown;
        self.routing_vpcs = Value::Unknown;
        self.state = Value::Unknown;
        self.unique_id = Value::Unknown;
        self.update_time = Value::Unknown;
    }
}

impl<'a> HubState<'a> {
    fn expand(&self) -> Hub {
        Hub {
            description: owned(&self.description),
            labels: labels::expand(&self.terraform_labels),
            ..Default::default()
        }
    }

    fn flatten(&mut self, hub: Hub) {
        let FlattenedLabels {
            labels,
            terraform_labels,
            effective_labels,
        } = labels::flatten(hub.labels, &self.labels, &self.terraform_labels);

        if let Some(name) = hub.name.as_deref() {
            self.name = Value::Value(Cow::Owned(
                crate::tpgresource::self_link::name_from_self_link(name).to_owned(),
            ));
        }
        self.description = api_string(&self.description, hub.description);
        self.labels = labels;
        self.terraform_labels = terraform_labels;
        self.effective_labels = effective_labels;
        self.create_time = non_empty_string(hub.create_time);
        self.routing_vpcs = Value::Value(
            hub.routing_vpcs
                .unwrap_or_default()
                .into_iter()
                .map(|vpc| {
                    Value::Value(RoutingVpc {
                        uri: non_empty_string(vpc.uri),
                    })
                })
                .collect(),
        );
        self.state = non_empty_string(hub.state);
        self.unique_id = non_empty_string(hub.unique_id);
        self.update_time = non_empty_string(hub.update_time);
    }

    fn display_id(&self) -> String {
        format!("NetworkConnectivityHub {:?}", non_empty(&self.id).unwrap_or_default())
    }
}

impl<T: Transport> HubResource<T> {
    /// Read the hub back from the API into `state`, `None` when it is gone
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: HubState<'a>,
    ) -> Option<Option<HubState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, HUB_URL, &state).or_report(diags, "Error reading Hub")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        let hub = handle_not_found(
            client
                .fetch::<Hub>(ApiRequest::get(url).with_billing_project(billing_project))
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(hub.map(|hub| {
            state.flatten(hub);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for HubResource<T> {
    type State<'a> = Value<HubState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(HubState::schema())
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
        state.terraform_labels = labels::terraform_labels(&client.config, &state.labels);

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
        state.terraform_labels = labels::terraform_labels(&client.config, &state.labels);
        state.effective_labels = labels::effective_labels(
            &prior.terraform_labels,
            &state.terraform_labels,
            &prior.effective_labels,
        );

        let mut replace = vec![];
        force_new(&mut replace, "name", &prior.name, &state.name);
        force_new(&mut replace, "project", &prior.project, &state.project);

        if replace.is_empty()
            && (prior.description != state.description
                || prior.terraform_labels != state.terraform_labels)
        {
            state.update_time = Value::Unknown;
        }

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
            "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/global/hubs?hubId={{name}}",
            &state,
        )
        .or_report(diags, "Error creating Hub")?;
        let body = serde_json::to_value(state.expand()).or_report(diags, "Error creating Hub")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.create(&state.timeouts);

        debug!("Creating new Hub: {body}");
        client
            .send_and_wait(
                ApiRequest::post(url, body)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::NetworkConnectivity,
                    billing_project,
                    activity: "Creating Hub",
                    timeout,
                },
            )
            .await
            .or_report(diags, "Error creating Hub")?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, HUB_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        debug!("Finished creating Hub {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("Hub disappeared right after its creation");
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
        mask.push_if_changed("description", &prior.description, &state.description);
        mask.push_if_changed("labels", &prior.terraform_labels, &state.terraform_labels);

        if !mask.is_empty() {
            let url = replace_vars(&client.config, HUB_URL, &state)
                .and_then(|url| {
                    crate::tpgresource::add_query_params(&url, &[("updateMask", &mask.to_string())])
                })
                .or_report(diags, "Error updating Hub")?;
            let body =
                serde_json::to_value(state.expand()).or_report(diags, "Error updating Hub")?;
            let billing_project = client.config.billing_project_for(non_empty(&state.project));
            let timeout = TIMEOUTS.update(&state.timeouts);

            debug!("Updating Hub {:?}: {body}", state.id);
            client
                .send_and_wait(
                    ApiRequest::patch(url, body)
                        .with_billing_project(billing_project.clone())
                        .with_timeout(timeout),
                    OperationWait {
                        service: Service::NetworkConnectivity,
                        billing_project,
                        activity: "Updating Hub",
                        timeout,
                    },
                )
                .await
                .or_report(diags, "Error updating Hub")?;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("Hub disappeared during its update");
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
        let url = replace_vars(&client.config, HUB_URL, &state).or_report(diags, "Error deleting Hub")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.delete(&state.timeouts);

        debug!("Deleting Hub {:?}", state.id);
        let result = client
            .send_and_wait(
                ApiRequest::delete(url)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::NetworkConnectivity,
                    billing_project,
                    activity: "Deleting Hub",
                    timeout,
                },
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => {
                warn!("{} was already deleted", state.display_id());
            }
            result => {
                result.or_report(diags, "Error deleting Hub")?;
            }
        }
        debug!("Finished deleting Hub {:?}", state.id);
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.provider.client(diags).await?;
        let mut fields = parse_import_id(IMPORT_FORMATS, &id, &client.config)
            .or_report(diags, "Error importing Hub")?;

        let mut state = HubState {
            name: fields.take("name").map_or(Value::Null, |n| Value::Value(Cow::Owned(n))),
            project: fields
                .take("project")
                .map_or(Value::Null, |p| Value::Value(Cow::Owned(p))),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, HUB_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        Some((Value::Value(state), Default::default()))
    }
}
