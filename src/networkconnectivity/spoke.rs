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

use tf_provider::schema::{Attribute, NestedBlock};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueMap, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::labels::{self, FlattenedLabels};
use crate::tpgresource::schema::{self as attr, Computed, Optional, Required};
use crate::tpgresource::self_link::{
    compare_self_link_or_resource_name, keep_equivalent, name_from_self_link, relative_path,
};
use crate::tpgresource::validation::{validate_conflict, validate_max_items};
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    api_string, block, blocks, known, non_empty, non_empty_string, owned, string, string_list, strings,
    to_block, with_default, ResultExt, ValueBool, WithNormalize, WithSchema, WithValidate,
};

const SPOKE_URL: &str =
    "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/{{location}}/spokes/{{name}}";
const SPOKE_ID: &str = "projects/{{project}}/locations/{{location}}/spokes/{{name}}";
const IMPORT_FORMATS: &[&str] = &[
    "projects/(?P<project>[^/]+)/locations/(?P<location>[^/]+)/spokes/(?P<name>[^/]+)",
    "(?P<project>[^/]+)/(?P<location>[^/]+)/(?P<name>[^/]+)",
    "(?P<location>[^/]+)/(?P<name>[^/]+)",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const LINKS: [&str; 3] = [
    "linked_interconnect_attachments",
    "linked_router_appliance_instances",
    "linked_vpn_tunnels",
];

#[derive(Debug)]
pub struct SpokeResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> SpokeResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpokeState<'a> {
    pub id: ValueString<'a>,
    pub hub: ValueString<'a>,
    pub location: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub labels: ValueMap<'a, ValueString<'a>>,
    pub terraform_labels: ValueMap<'a, ValueString<'a>>,
    pub effective_labels: ValueMap<'a, ValueString<'a>>,
    pub linked_interconnect_attachments: ValueList<Value<LinkedUris<'a>>>,
    pub linked_router_appliance_instances: ValueList<Value<LinkedRouterApplianceInstances<'a>>>,
    pub linked_vpn_tunnels: ValueList<Value<LinkedUris<'a>>>,
    pub project: ValueString<'a>,
    pub create_time: ValueString<'a>,
    pub state: ValueString<'a>,
    pub unique_id: ValueString<'a>,
    pub update_time: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

/// Interconnect attachments or VPN tunnels linked to a spoke
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedUris<'a> {
    pub uris: ValueList<ValueString<'a>>,
    pub site_to_site_data_transfer: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedRouterApplianceInstances<'a> {
    pub instances: ValueList<Value<RouterApplianceInstance<'a>>>,
    pub site_to_site_data_transfer: ValueBool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterApplianceInstance<'a> {
    pub virtual_machine: ValueString<'a>,
    pub ip_address: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Spoke {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linked_interconnect_attachments: Option<ApiLinkedUris>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linked_router_appliance_instances: Option<ApiLinkedRouterApplianceInstances>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linked_vpn_tunnels: Option<ApiLinkedUris>,
    #[serde(skip_serializing)]
    create_time: Option<String>,
    #[serde(skip_serializing)]
    state: Option<String>,
    #[serde(skip_serializing)]
    unique_id: Option<String>,
    #[serde(skip_serializing)]
    update_time: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiLinkedUris {
    uris: Vec<String>,
    site_to_site_data_transfer: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiLinkedRouterApplianceInstances {
    instances: Vec<ApiRouterApplianceInstance>,
    site_to_site_data_transfer: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiRouterApplianceInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    virtual_machine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<String>,
}

impl ResourceVars for SpokeState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "name" => owned(&self.name),
            "location" => owned(&self.location),
            "project" => owned(&self.project),
            _ => None,
        }
    }
}

fn site_to_site_data_transfer() -> Attribute {
    attr::bool(Required, "A value that controls whether site-to-site data transfer is enabled for these resources. Note that data transfer is available only in supported locations.")
}

impl WithSchema for SpokeState<'_> {
    fn schema() -> Schema {
        let mut attributes: HashMap<String, Attribute> = map! {
            "id" => attr::id(),
            "hub" => attr::string(Required, "Immutable. The URI of the hub that this spoke is attached to."),
            "location" => attr::string(Required, "The location for the resource"),
            "name" => attr::string(Required, "Immutable. The name of the spoke. Spoke names must be unique."),
            "description" => attr::string(Optional, "An optional description of the spoke."),
            "project" => attr::project(),
            "create_time" => attr::string(Computed, "Output only. The time the spoke was created."),
            "state" => attr::string(Computed, "Output only. The current lifecycle state of this spoke. Possible values: STATE_UNSPECIFIED, CREATING, ACTIVE, DELETING"),
            "unique_id" => attr::string(Computed, "Output only. The Google-generated UUID for the spoke. This value is unique across all spoke resources. If a spoke is deleted and another with the same name is created, the new spoke is assigned a different unique_id."),
            "update_time" => attr::string(Computed, "Output only. The time the spoke was last updated."),
        };
        attributes.extend(labels::schema());

        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "linked_interconnect_attachments" => NestedBlock::List(Block {
                        attributes: map! {
                            "uris" => attr::string_list(Required, "The URIs of linked interconnect attachment resources"),
                            "site_to_site_data_transfer" => site_to_site_data_transfer(),
                        },
                        description: Description::plain("A collection of VLAN attachment resources. These resources should be redundant attachments that all advertise the same prefixes to Google Cloud. Alternatively, in active/passive configurations, all attachments should be capable of advertising the same prefixes."),
                        ..Default::default()
                    }),
                    "linked_router_appliance_instances" => NestedBlock::List(Block {
                        attributes: map! {
                            "site_to_site_data_transfer" => site_to_site_data_transfer(),
                        },
                        blocks: map! {
                            "instances" => NestedBlock::List(Block {
                                attributes: map! {
                                    "virtual_machine" => attr::string(Optional, "The URI of the virtual machine resource"),
                                    "ip_address" => attr::string(Optional, "The IP address on the VM to use for peering."),
                                },
                                description: Description::plain("The list of router appliance instances"),
                                ..Default::default()
                            }),
                        },
                        description: Description::plain("The URIs of linked Router appliance resources"),
                        ..Default::default()
                    }),
                    "linked_vpn_tunnels" => NestedBlock::List(Block {
                        attributes: map! {
                            "uris" => attr::string_list(Required, "The URIs of linked VPN tunnel resources."),
                            "site_to_site_data_transfer" => site_to_site_data_transfer(),
                        },
                        description: Description::plain("The URIs of linked VPN tunnel resources"),
                        ..Default::default()
                    }),
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("The NetworkConnectivity Spoke resource"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for SpokeState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        let set = [
            blocks(&self.linked_interconnect_attachments).count() > 0,
            blocks(&self.linked_router_appliance_instances).count() > 0,
            blocks(&self.linked_vpn_tunnels).count() > 0,
        ];
        validate_max_items(diags, &self.linked_interconnect_attachments, 1, AttributePath::new(LINKS[0]));
        validate_max_items(diags, &self.linked_router_appliance_instances, 1, AttributePath::new(LINKS[1]));
        validate_max_items(diags, &self.linked_vpn_tunnels, 1, AttributePath::new(LINKS[2]));
        for i in 0..LINKS.len() {
            for j in i + 1..LINKS.len() {
                validate_conflict(
                    diags,
                    (LINKS[i], set[i]),
                    (LINKS[j], set[j]),
                    AttributePath::new(LINKS[i]),
                );
            }
        }
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for SpokeState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.effective_labels = Value::Unknown;
        self.create_time = Value::Unknown;
        self.state = Value::Unknown;
        self.unique_id = Value::Unknown;
        self.update_time = Value::Unknown;
    }
}

fn expand_uris(links: &LinkedUris) -> ApiLinkedUris {
    ApiLinkedUris {
        uris: strings(&links.uris).unwrap_or_default(),
        site_to_site_data_transfer: known(&links.site_to_site_data_transfer).unwrap_or_default(),
    }
}

fn flatten_uris<'a>(links: Option<ApiLinkedUris>) -> ValueList<Value<LinkedUris<'a>>> {
    to_block(links.map(|links| LinkedUris {
        uris: string_list(Some(links.uris)),
        site_to_site_data_transfer: Value::Value(links.site_to_site_data_transfer),
    }))
}

impl<'a> SpokeState<'a> {
    /// Relative name of the hub, whatever the configured spelling
    fn hub_name(&self) -> Option<String> {
        let hub = non_empty(&self.hub)?;
        if let Some(path) = relative_path(hub) {
            return Some(path.to_owned());
        }
        let project = non_empty(&self.project)?;
        Some(format!(
            "projects/{project}/locations/global/hubs/{}",
            name_from_self_link(hub)
        ))
    }

    fn expand(&self) -> Spoke {
        Spoke {
            hub: self.hub_name(),
            description: owned(&self.description),
            labels: labels::expand(&self.terraform_labels),
            linked_interconnect_attachments: block(&self.linked_interconnect_attachments)
                .map(expand_uris),
            linked_router_appliance_instances: block(&self.linked_router_appliance_instances).map(
                |links| ApiLinkedRouterApplianceInstances {
                    instances: blocks(&links.instances)
                        .map(|instance| ApiRouterApplianceInstance {
                            virtual_machine: owned(&instance.virtual_machine),
                            ip_address: owned(&instance.ip_address),
                        })
                        .collect(),
                    site_to_site_data_transfer: known(&links.site_to_site_data_transfer)
                        .unwrap_or_default(),
                },
            ),
            linked_vpn_tunnels: block(&self.linked_vpn_tunnels).map(expand_uris),
            ..Default::default()
        }
    }

    fn flatten(&mut self, spoke: Spoke) {
        let FlattenedLabels {
            labels,
            terraform_labels,
            effective_labels,
        } = labels::flatten(spoke.labels, &self.labels, &self.terraform_labels);

        self.hub = keep_equivalent(&self.hub, spoke.hub, compare_self_link_or_resource_name);
        self.description = api_string(&self.description, spoke.description);
        self.labels = labels;
        self.terraform_labels = terraform_labels;
        self.effective_labels = effective_labels;
        self.linked_interconnect_attachments = flatten_uris(spoke.linked_interconnect_attachments);
        self.linked_vpn_tunnels = flatten_uris(spoke.linked_vpn_tunnels);

        let prior_instances: Vec<RouterApplianceInstance> = block(&self.linked_router_appliance_instances)
            .map(|links| blocks(&links.instances).cloned().collect())
            .unwrap_or_default();
        self.linked_router_appliance_instances =
            to_block(spoke.linked_router_appliance_instances.map(|links| {
                LinkedRouterApplianceInstances {
                    instances: Value::Value(
                        links
                            .instances
                            .into_iter()
                            .enumerate()
                            .map(|(i, instance)| {
                                let prior = prior_instances.get(i).cloned().unwrap_or_default();
                                Value::Value(RouterApplianceInstance {
                                    virtual_machine: keep_equivalent(
                                        &prior.virtual_machine,
                                        instance.virtual_machine,
                                        compare_self_link_or_resource_name,
                                    ),
                                    ip_address: api_string(&prior.ip_address, instance.ip_address),
                                })
                            })
                            .collect(),
                    ),
                    site_to_site_data_transfer: Value::Value(links.site_to_site_data_transfer),
                }
            }));

        self.create_time = non_empty_string(spoke.create_time);
        self.state = non_empty_string(spoke.state);
        self.unique_id = non_empty_string(spoke.unique_id);
        self.update_time = non_empty_string(spoke.update_time);
    }

    fn display_id(&self) -> String {
        format!("NetworkConnectivitySpoke {:?}", non_empty(&self.id).unwrap_or_default())
    }
}

impl<T: Transport> SpokeResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: SpokeState<'a>,
    ) -> Option<Option<SpokeState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url =
            replace_vars(&client.config, SPOKE_URL, &state).or_report(diags, "Error reading Spoke")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        let spoke = handle_not_found(
            client
                .fetch::<Spoke>(ApiRequest::get(url).with_billing_project(billing_project))
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(spoke.map(|spoke| {
            state.flatten(spoke);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for SpokeResource<T> {
    type State<'a> = Value<SpokeState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SpokeState::schema())
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
        force_new(&mut replace, "location", &prior.location, &state.location);
        force_new(&mut replace, "project", &prior.project, &state.project);
        if !matches!((&prior.hub, &state.hub), (Value::Value(a), Value::Value(b)) if compare_self_link_or_resource_name(a, b))
        {
            force_new(&mut replace, "hub", &prior.hub, &state.hub);
        }
        force_new(
            &mut replace,
            LINKS[0],
            &prior.linked_interconnect_attachments,
            &state.linked_interconnect_attachments,
        );
        force_new(
            &mut replace,
            LINKS[1],
            &prior.linked_router_appliance_instances,
            &state.linked_router_appliance_instances,
        );
        force_new(&mut replace, LINKS[2], &prior.linked_vpn_tunnels, &state.linked_vpn_tunnels);

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
            "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/{{location}}/spokes?spokeId={{name}}",
            &state,
        )
        .or_report(diags, "Error creating Spoke")?;
        let body = serde_json::to_value(state.expand()).or_report(diags, "Error creating Spoke")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.create(&state.timeouts);

        debug!("Creating new Spoke: {body}");
        client
            .send_and_wait(
                ApiRequest::post(url, body)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::NetworkConnectivity,
                    billing_project,
                    activity: "Creating Spoke",
                    timeout,
                },
            )
            .await
            .or_report(diags, "Error creating Spoke")?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, SPOKE_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        debug!("Finished creating Spoke {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("Spoke disappeared right after its creation");
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
            let url = replace_vars(&client.config, SPOKE_URL, &state)
                .and_then(|url| add_query_params(&url, &[("updateMask", &mask.to_string())]))
                .or_report(diags, "Error updating Spoke")?;
            let body =
                serde_json::to_value(state.expand()).or_report(diags, "Error updating Spoke")?;
            let billing_project = client.config.billing_project_for(non_empty(&state.project));
            let timeout = TIMEOUTS.update(&state.timeouts);

            debug!("Updating Spoke {:?}: {body}", state.id);
            client
                .send_and_wait(
                    ApiRequest::patch(url, body)
                        .with_billing_project(billing_project.clone())
                        .with_timeout(timeout),
                    OperationWait {
                        service: Service::NetworkConnectivity,
                        billing_project,
                        activity: "Updating Spoke",
                        timeout,
                    },
                )
                .await
                .or_report(diags, "Error updating Spoke")?;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("Spoke disappeared during its update");
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
        let url =
            replace_vars(&client.config, SPOKE_URL, &state).or_report(diags, "Error deleting Spoke")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.delete(&state.timeouts);

        debug!("Deleting Spoke {:?}", state.id);
        let result = client
            .send_and_wait(
                ApiRequest::delete(url)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::NetworkConnectivity,
                    billing_project,
                    activity: "Deleting Spoke",
                    timeout,
                },
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => warn!("{} was already deleted", state.display_id()),
            result => {
                result.or_report(diags, "Error deleting Spoke")?;
            }
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.provider.client(diags).await?;
        let mut fields = parse_import_id(IMPORT_FORMATS, &id, &client.config)
            .or_report(diags, "Error importing Spoke")?;

        let mut state = SpokeState {
            name: string(fields.take("name")),
            location: string(fields.take("location")),
            project: string(fields.take("project")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, SPOKE_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        Some((Value::Value(state), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::transport::testing::{test_handle, FakeTransport};

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn vpn_spoke() -> SpokeState<'static> {
        SpokeState {
            name: string("spoke-1"),
            location: string("us-central1"),
            hub: string("hub-1"),
            project: string("my-project"),
            linked_vpn_tunnels: to_block(Some(LinkedUris {
                uris: Value::Value(vec![string(
                    "https://www.googleapis.com/compute/v1/projects/my-project/regions/us-central1/vpnTunnels/tunnel-1",
                )]),
                site_to_site_data_transfer: Value::Value(true),
            })),
            ..Default::default()
        }
    }

    #[test]
    fn expands_hub_and_links() {
        let spoke = vpn_spoke().expand();
        assert_eq!(
            serde_json::to_value(spoke).unwrap(),
            json!({
                "hub": "projects/my-project/locations/global/hubs/hub-1",
                "linkedVpnTunnels": {
                    "uris": ["https://www.googleapis.com/compute/v1/projects/my-project/regions/us-central1/vpnTunnels/tunnel-1"],
                    "siteToSiteDataTransfer": true
                }
            })
        );
    }

    #[tokio::test]
    async fn links_are_exclusive() {
        let mut spoke = vpn_spoke();
        spoke.linked_interconnect_attachments = to_block(Some(LinkedUris {
            uris: Value::Value(vec![]),
            site_to_site_data_transfer: Value::Value(false),
        }));
        let mut diags = Diagnostics::default();
        spoke.validate(&mut diags, Default::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn read_keeps_short_hub_name() {
        let resource = SpokeResource::new(
            test_handle(FakeTransport::default().respond(json!({
                "name": "projects/my-project/locations/us-central1/spokes/spoke-1",
                "hub": "projects/my-project/locations/global/hubs/hub-1",
                "linkedVpnTunnels": {
                    "uris": ["https://www.googleapis.com/compute/v1/projects/my-project/regions/us-central1/vpnTunnels/tunnel-1"],
                    "siteToSiteDataTransfer": true
                },
                "state": "ACTIVE"
            })))
            .await,
        );
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .read(&mut diags, Value::Value(vpn_spoke()), Default::default(), Default::default())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(state.hub, string("hub-1"));
        assert_eq!(state.linked_vpn_tunnels, vpn_spoke().linked_vpn_tunnels);
        assert_eq!(state.linked_interconnect_attachments, Value::Value(vec![]));
        assert_eq!(state.state, string("ACTIVE"));
    }

    #[tokio::test]
    async fn changing_links_forces_replacement() {
        let resource = SpokeResource::new(test_handle(FakeTransport::default()).await);
        let prior = vpn_spoke();
        let mut proposed = prior.clone();
        proposed.linked_vpn_tunnels = Value::Value(vec![]);
        proposed.hub = string("projects/my-project/locations/global/hubs/hub-1");

        let mut diags = Diagnostics::default();
        let (_, _, replace) = resource
            .plan_update(
                &mut diags,
                Value::Value(prior),
                Value::Value(proposed.clone()),
                Value::Value(proposed),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace.len(), 1);
    }

    #[tokio::test]
    async fn import_uses_provider_project() {
        let resource = SpokeResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .import(&mut diags, "us-central1/spoke-1".to_owned())
            .await
            .unwrap();
        assert_eq!(
            state.unwrap_or_default().id,
            string("projects/my-project/locations/us-central1/spokes/spoke-1")
        );
    }
}
