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

use tf_provider::schema::Attribute;
use tf_provider::value::{Value, ValueEmpty, ValueMap, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::labels::{self, FlattenedLabels};
use crate::tpgresource::schema::{self as attr, Computed, Optional, OptionalComputed, Required};
use crate::tpgresource::validation::validate_enum;
use crate::tpgresource::{
    force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts, ResourceVars,
    TimeoutsBlock,
};
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    non_empty, non_empty_string, owned, string, unknown_if_null, with_default, ResultExt,
    WithNormalize, WithSchema, WithValidate,
};

const ENDPOINT_URL: &str = "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/{{location}}/regionalEndpoints/{{name}}";
const ENDPOINT_ID: &str = "projects/{{project}}/locations/{{location}}/regionalEndpoints/{{name}}";
const IMPORT_FORMATS: &[&str] = &[
    "projects/(?P<project>[^/]+)/locations/(?P<location>[^/]+)/regionalEndpoints/(?P<name>[^/]+)",
    "(?P<project>[^/]+)/(?P<location>[^/]+)/(?P<name>[^/]+)",
    "(?P<location>[^/]+)/(?P<name>[^/]+)",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const ACCESS_TYPES: &[&str] = &["GLOBAL", "REGIONAL"];

#[derive(Debug)]
pub struct RegionalEndpointResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> RegionalEndpointResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalEndpointState<'a> {
    pub id: ValueString<'a>,
    pub access_type: ValueString<'a>,
    pub location: ValueString<'a>,
    pub name: ValueString<'a>,
    pub target_google_api: ValueString<'a>,
    pub address: ValueString<'a>,
    pub description: ValueString<'a>,
    pub labels: ValueMap<'a, ValueString<'a>>,
    pub terraform_labels: ValueMap<'a, ValueString<'a>>,
    pub effective_labels: ValueMap<'a, ValueString<'a>>,
    pub network: ValueString<'a>,
    pub subnetwork: ValueString<'a>,
    pub project: ValueString<'a>,
    pub create_time: ValueString<'a>,
    pub psc_forwarding_rule: ValueString<'a>,
    pub update_time: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RegionalEndpoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_google_api: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subnetwork: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing)]
    create_time: Option<String>,
    #[serde(skip_serializing)]
    psc_forwarding_rule: Option<String>,
    #[serde(skip_serializing)]
    update_time: Option<String>,
}

impl ResourceVars for RegionalEndpointState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "name" => owned(&self.name),
            "location" => owned(&self.location),
            "project" => owned(&self.project),
            _ => None,
        }
    }
}

impl WithSchema for RegionalEndpointState<'_> {
    fn schema() -> Schema {
        let mut attributes: HashMap<String, Attribute> = map! {
            "id" => attr::id(),
            "access_type" => attr::string(Required, "The access type of this regional endpoint. This field is reflected in the PSC Forwarding Rule configuration to enable global access. Possible values: [\"GLOBAL\", \"REGIONAL\"]"),
            "location" => attr::string(Required, "The location of the RegionalEndpoint."),
            "name" => attr::string(Required, "The name of the RegionalEndpoint."),
            "target_google_api" => attr::string(Required, "The service endpoint this private regional endpoint connects to. Format: '{apiname}.{region}.p.rep.googleapis.com' Example: \"cloudkms.us-central1.p.rep.googleapis.com\"."),
            "address" => attr::string(OptionalComputed, "The IP Address of the Regional Endpoint. When no address is provided, an IP from the subnetwork is allocated. Use one of the following formats: IPv4 address as in '10.0.0.1', or address resource URI as in 'projects/{project}/regions/{region}/addresses/{address_name}'"),
            "description" => attr::string(Optional, "A description of this resource."),
            "network" => attr::string(OptionalComputed, "The name of the VPC network for this private regional endpoint. Format: 'projects/{project}/global/networks/{network}'"),
            "subnetwork" => attr::string(OptionalComputed, "The name of the subnetwork from which the IP address will be allocated. Format: 'projects/{project}/regions/{region}/subnetworks/{subnetwork}'"),
            "project" => attr::project(),
            "create_time" => attr::string(Computed, "Time when the RegionalEndpoint was created."),
            "psc_forwarding_rule" => attr::string(Computed, "The resource reference of the PSC Forwarding Rule created on behalf of the customer. Format: '//compute.googleapis.com/projects/{project}/regions/{region}/forwardingRules/{forwarding_rule_name}'"),
            "update_time" => attr::string(Computed, "Time when the RegionalEndpoint was updated."),
        };
        attributes.extend(labels::schema());

        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("The NetworkConnectivity RegionalEndpoint resource"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for RegionalEndpointState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, _attr_path: AttributePath) {
        validate_enum(diags, &self.access_type, ACCESS_TYPES, AttributePath::new("access_type"));
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for RegionalEndpointState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.effective_labels = Value::Unknown;
        unknown_if_null(&mut self.address);
        unknown_if_null(&mut self.network);
        unknown_if_null(&mut self.subnetwork);
        self.create_time = Value::Unknown;
        self.psc_forwarding_rule = Value::Unknown;
        self.update_time = Value::Unknown;
    }
}

impl<'a> RegionalEndpointState<'a> {
    fn expand(&self) -> RegionalEndpoint {
        RegionalEndpoint {
            description: owned(&self.description),
            target_google_api: owned(&self.target_google_api),
            network: owned(&self.network),
            subnetwork: owned(&self.subnetwork),
            access_type: owned(&self.access_type),
            address: owned(&self.address),
            labels: labels::expand(&self.terraform_labels),
            ..Default::default()
        }
    }

    fn flatten(&mut self, endpoint: RegionalEndpoint) {
        let FlattenedLabels {
            labels,
            terraform_labels,
            effective_labels,
        } = labels::flatten(endpoint.labels, &self.labels, &self.terraform_labels);

        self.description = non_empty_string(endpoint.description);
        self.target_google_api = non_empty_string(endpoint.target_google_api);
        self.network = non_empty_string(endpoint.network);
        self.subnetwork = non_empty_string(endpoint.subnetwork);
        self.access_type = non_empty_string(endpoint.access_type);
        self.address = non_empty_string(endpoint.address);
        self.labels = labels;
        self.terraform_labels = terraform_labels;
        self.effective_labels = effective_labels;
        self.create_time = non_empty_string(endpoint.create_time);
        self.psc_forwarding_rule = non_empty_string(endpoint.psc_forwarding_rule);
        self.update_time = non_empty_string(endpoint.update_time);
    }

    fn display_id(&self) -> String {
        format!(
            "NetworkConnectivityRegionalEndpoint {:?}",
            non_empty(&self.id).unwrap_or_default()
        )
    }
}

impl<T: Transport> RegionalEndpointResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: RegionalEndpointState<'a>,
    ) -> Option<Option<RegionalEndpointState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, ENDPOINT_URL, &state)
            .or_report(diags, "Error reading RegionalEndpoint")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        let endpoint = handle_not_found(
            client
                .fetch::<RegionalEndpoint>(ApiRequest::get(url).with_billing_project(billing_project))
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(endpoint.map(|endpoint| {
            state.flatten(endpoint);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for RegionalEndpointResource<T> {
    type State<'a> = Value<RegionalEndpointState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(RegionalEndpointState::schema())
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
        for (name, prior, planned) in [
            ("access_type", &prior.access_type, &state.access_type),
            ("location", &prior.location, &state.location),
            ("name", &prior.name, &state.name),
            ("target_google_api", &prior.target_google_api, &state.target_google_api),
            ("description", &prior.description, &state.description),
            ("project", &prior.project, &state.project),
        ] {
            force_new(&mut replace, name, prior, planned);
        }
        // Optional+computed: omitting them keeps the value picked by the API
        for (name, prior, planned) in [
            ("address", &prior.address, &mut state.address),
            ("network", &prior.network, &mut state.network),
            ("subnetwork", &prior.subnetwork, &mut state.subnetwork),
        ] {
            if planned.is_null() {
                *planned = prior.clone();
            }
            force_new(&mut replace, name, prior, planned);
        }
        // The endpoint labels cannot be patched
        force_new(
            &mut replace,
            "effective_labels",
            &prior.effective_labels,
            &state.effective_labels,
        );

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
            "{{NetworkConnectivityBasePath}}projects/{{project}}/locations/{{location}}/regionalEndpoints?regionalEndpointId={{name}}",
            &state,
        )
        .or_report(diags, "Error creating RegionalEndpoint")?;
        let body = serde_json::to_value(state.expand())
            .or_report(diags, "Error creating RegionalEndpoint")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.create(&state.timeouts);

        debug!("Creating new RegionalEndpoint: {body}");
        client
            .send_and_wait(
                ApiRequest::post(url, body)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::NetworkConnectivity,
                    billing_project,
                    activity: "Creating RegionalEndpoint",
                    timeout,
                },
            )
            .await
            .or_report(diags, "Error creating RegionalEndpoint")?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, ENDPOINT_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("RegionalEndpoint disappeared right after its creation");
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
        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("RegionalEndpoint disappeared during its update");
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
        let url = replace_vars(&client.config, ENDPOINT_URL, &state)
            .or_report(diags, "Error deleting RegionalEndpoint")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.delete(&state.timeouts);

        debug!("Deleting RegionalEndpoint {:?}", state.id);
        let result = client
            .send_and_wait(
                ApiRequest::delete(url)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::NetworkConnectivity,
                    billing_project,
                    activity: "Deleting RegionalEndpoint",
                    timeout,
                },
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => warn!("{} was already deleted", state.display_id()),
            result => {
                result.or_report(diags, "Error deleting RegionalEndpoint")?;
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
            .or_report(diags, "Error importing RegionalEndpoint")?;

        let mut state = RegionalEndpointState {
            name: string(fields.take("name")),
            location: string(fields.take("location")),
            project: string(fields.take("project")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, ENDPOINT_ID, &state)
                .or_report(diags, "Error constructing id")?,
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
    use crate::utils::string_map;

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn endpoint() -> RegionalEndpointState<'static> {
        RegionalEndpointState {
            name: string("rep"),
            location: string("us-central1"),
            access_type: string("REGIONAL"),
            target_google_api: string("storage.us-central1.p.rep.googleapis.com"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn access_type_is_checked() {
        let mut state = endpoint();
        state.access_type = string("LOCAL");
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, Default::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn create_leaves_address_to_the_api() {
        let resource = RegionalEndpointResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(json!({"name": "operations/op-1", "done": true}))
                    .respond(json!({
                        "targetGoogleApi": "storage.us-central1.p.rep.googleapis.com",
                        "accessType": "REGIONAL",
                        "address": "10.0.0.2",
                        "network": "projects/my-project/global/networks/default",
                        "pscForwardingRule": "//compute.googleapis.com/projects/my-project/regions/us-central1/forwardingRules/rep"
                    })),
            )
            .await,
        );
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(endpoint()),
                Value::Value(endpoint()),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(planned.clone().unwrap_or_default().address, Value::Unknown);

        let (state, _) = resource
            .create(&mut diags, planned.clone(), planned, Default::default(), Default::default())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(
            state.id,
            string("projects/my-project/locations/us-central1/regionalEndpoints/rep")
        );
        assert_eq!(state.address, string("10.0.0.2"));

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].body,
            Some(json!({
                "targetGoogleApi": "storage.us-central1.p.rep.googleapis.com",
                "accessType": "REGIONAL"
            }))
        );
    }

    #[tokio::test]
    async fn label_changes_replace_the_endpoint() {
        let resource = RegionalEndpointResource::new(test_handle(FakeTransport::default()).await);
        let mut prior = endpoint();
        prior.project = string("my-project");
        prior.address = string("10.0.0.2");
        prior.terraform_labels = string_map(Some(Default::default()));
        prior.effective_labels = string_map(Some(Default::default()));
        let mut proposed = prior.clone();
        proposed.address = Value::Null;
        proposed.labels = string_map(Some([("env".to_owned(), "dev".to_owned())].into()));

        let mut diags = Diagnostics::default();
        let (planned, _, replace) = resource
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
        assert_eq!(planned.unwrap_or_default().address, string("10.0.0.2"));
        assert_eq!(replace.len(), 1);
    }
}
