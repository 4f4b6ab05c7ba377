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
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::schema::{self as attr, Computed, Optional, OptionalComputed, Required};
use crate::tpgresource::validation::validate_length;
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Transport};
use crate::utils::{
    api_string, non_empty, non_empty_string, owned, string, unknown_if_null, ResultExt,
    WithNormalize, WithSchema, WithValidate,
};

const EXPORT_URL: &str = "{{SecurityCenterV2BasePath}}organizations/{{organization}}/locations/{{location}}/bigQueryExports/{{big_query_export_id}}";
const EXPORT_ID: &str =
    "organizations/{{organization}}/locations/{{location}}/bigQueryExports/{{big_query_export_id}}";
const IMPORT_FORMATS: &[&str] = &[
    "^organizations/(?P<organization>[^/]+)/locations/(?P<location>[^/]+)/bigQueryExports/(?P<big_query_export_id>[^/]+)$",
    "^(?P<organization>[^/]+)/(?P<location>[^/]+)/(?P<big_query_export_id>[^/]+)$",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const DEFAULT_LOCATION: &str = "global";

#[derive(Debug)]
pub struct BigQueryExportResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> BigQueryExportResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BigQueryExportState<'a> {
    pub id: ValueString<'a>,
    pub organization: ValueString<'a>,
    pub big_query_export_id: ValueString<'a>,
    pub location: ValueString<'a>,
    pub name: ValueString<'a>,
    pub dataset: ValueString<'a>,
    pub description: ValueString<'a>,
    pub filter: ValueString<'a>,
    pub create_time: ValueString<'a>,
    pub update_time: ValueString<'a>,
    pub most_recent_editor: ValueString<'a>,
    pub principal: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BigQueryExport {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing)]
    create_time: Option<String>,
    #[serde(skip_serializing)]
    update_time: Option<String>,
    #[serde(skip_serializing)]
    most_recent_editor: Option<String>,
    #[serde(skip_serializing)]
    principal: Option<String>,
}

impl ResourceVars for BigQueryExportState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "organization" => owned(&self.organization),
            "location" => owned(&self.location),
            "big_query_export_id" => owned(&self.big_query_export_id),
            _ => None,
        }
    }
}

impl WithSchema for BigQueryExportState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attr::id(),
                    "organization" => attr::string(Required, "The organization whose Cloud Security Command Center the Big Query Export Config lives in."),
                    "big_query_export_id" => attr::string(Required, "This must be unique within the organization."),
                    "location" => attr::string(OptionalComputed, "location Id is provided by organization. If not provided, Use global as default."),
                    "name" => attr::string(OptionalComputed, "The resource name of this export, in the format 'organizations/{{organization}}/locations/{{location}}/bigQueryExports/{{big_query_export_id}}'. This field is provided in responses, and is ignored when provided in create requests."),
                    "dataset" => attr::string(Optional, "The dataset to write findings' updates to. Its format is \"projects/[projectId]/datasets/[bigquery_dataset_id]\". BigQuery Dataset unique ID must contain only letters (a-z, A-Z), numbers (0-9), or underscores (_)."),
                    "description" => attr::string(Optional, "The description of the notification config (max of 1024 characters)."),
                    "filter" => attr::string(Optional, "Expression that defines the filter to apply across create/update events of findings. The expression is a list of zero or more restrictions combined via logical operators AND and OR. Parentheses are supported, and OR has higher precedence than AND."),
                    "create_time" => attr::string(Computed, "The time at which the BigQuery export was created. A timestamp in RFC3339 UTC \"Zulu\" format, with nanosecond resolution and up to nine fractional digits."),
                    "update_time" => attr::string(Computed, "The most recent time at which the BigQuery export was updated. A timestamp in RFC3339 UTC \"Zulu\" format, with nanosecond resolution and up to nine fractional digits."),
                    "most_recent_editor" => attr::string(Computed, "Email address of the user who last edited the BigQuery export."),
                    "principal" => attr::string(Computed, "The service account that needs permission to create table and upload data to the BigQuery dataset."),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("A Cloud Security Command Center (Cloud SCC) Big Query Export Config. It represents exporting Security Command Center data, including assets, findings, and security marks using gcloud scc bqexports."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for BigQueryExportState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_length(diags, &self.description, 0, 1024, attr_path.attribute("description"));
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for BigQueryExportState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        unknown_if_null(&mut self.name);
        self.create_time = Value::Unknown;
        self.update_time = Value::Unknown;
        self.most_recent_editor = Value::Unknown;
        self.principal = Value::Unknown;
    }
}

impl<'a> BigQueryExportState<'a> {
    fn plan_location(&mut self) {
        if self.location.is_null() {
            self.location = Value::Value(Cow::Borrowed(DEFAULT_LOCATION));
        }
    }

    fn expand(&self) -> BigQueryExport {
        BigQueryExport {
            name: owned(&self.name),
            description: owned(&self.description),
            dataset: owned(&self.dataset),
            filter: owned(&self.filter),
            ..Default::default()
        }
    }

    fn flatten(&mut self, export: BigQueryExport) {
        self.name = non_empty_string(export.name);
        self.description = api_string(&self.description, export.description);
        self.dataset = api_string(&self.dataset, export.dataset);
        self.filter = api_string(&self.filter, export.filter);
        self.create_time = non_empty_string(export.create_time);
        self.update_time = non_empty_string(export.update_time);
        self.most_recent_editor = non_empty_string(export.most_recent_editor);
        self.principal = non_empty_string(export.principal);
    }

    fn display_id(&self) -> String {
        format!(
            "SecurityCenterV2OrganizationSccBigQueryExport {:?}",
            non_empty(&self.id).unwrap_or_default()
        )
    }
}

impl<T: Transport> BigQueryExportResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: BigQueryExportState<'a>,
    ) -> Option<Option<BigQueryExportState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, EXPORT_URL, &state)
            .or_report(diags, "Error reading OrganizationSccBigQueryExport")?;

        let export = handle_not_found(
            client
                .fetch::<BigQueryExport>(
                    ApiRequest::get(url).with_billing_project(client.config.billing_project.clone()),
                )
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(export.map(|export| {
            state.flatten(export);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for BigQueryExportResource<T> {
    type State<'a> = Value<BigQueryExportState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(BigQueryExportState::schema())
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
        state.plan_location();
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
        state.plan_location();
        if state != prior {
            state.update_time = Value::Unknown;
            state.most_recent_editor = Value::Unknown;
        }

        let mut replace = vec![];
        force_new(&mut replace, "organization", &prior.organization, &state.organization);
        force_new(
            &mut replace,
            "big_query_export_id",
            &prior.big_query_export_id,
            &state.big_query_export_id,
        );
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
        state.plan_location();

        let url = replace_vars(
            &client.config,
            "{{SecurityCenterV2BasePath}}organizations/{{organization}}/locations/{{location}}/bigQueryExports?bigQueryExportId={{big_query_export_id}}",
            &state,
        )
        .or_report(diags, "Error creating OrganizationSccBigQueryExport")?;
        let body = serde_json::to_value(state.expand())
            .or_report(diags, "Error creating OrganizationSccBigQueryExport")?;

        debug!("Creating new OrganizationSccBigQueryExport: {body}");
        client
            .send_request(
                ApiRequest::post(url, body)
                    .with_billing_project(client.config.billing_project.clone())
                    .with_timeout(TIMEOUTS.create(&state.timeouts)),
            )
            .await
            .or_report(diags, "Error creating OrganizationSccBigQueryExport")?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, EXPORT_ID, &state).or_report(diags, "Error constructing id")?,
        ));
        debug!("Finished creating OrganizationSccBigQueryExport {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("OrganizationSccBigQueryExport disappeared right after its creation");
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
        mask.push_if_changed("name", &prior.name, &state.name);
        mask.push_if_changed("description", &prior.description, &state.description);
        mask.push_if_changed("dataset", &prior.dataset, &state.dataset);
        mask.push_if_changed("filter", &prior.filter, &state.filter);

        if !mask.is_empty() {
            let summary = format!("Error updating OrganizationSccBigQueryExport {:?}", state.id);
            let url = replace_vars(&client.config, EXPORT_URL, &state)
                .and_then(|url| add_query_params(&url, &[("updateMask", &mask.to_string())]))
                .or_report(diags, &summary)?;
            let body = serde_json::to_value(state.expand()).or_report(diags, &summary)?;

            debug!("Updating OrganizationSccBigQueryExport {:?}: {body}", state.id);
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
                diags.root_error_short("OrganizationSccBigQueryExport disappeared during its update");
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
        let url = replace_vars(&client.config, EXPORT_URL, &state)
            .or_report(diags, "Error deleting OrganizationSccBigQueryExport")?;

        debug!("Deleting OrganizationSccBigQueryExport {:?}", state.id);
        let result = client
            .send_request(
                ApiRequest::delete(url)
                    .with_billing_project(client.config.billing_project.clone())
                    .with_timeout(TIMEOUTS.delete(&state.timeouts)),
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => {
                warn!("{} was already deleted", state.display_id());
            }
            result => {
                result.or_report(diags, "Error deleting OrganizationSccBigQueryExport")?;
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
            .or_report(diags, "Error importing OrganizationSccBigQueryExport")?;

        let mut state = BigQueryExportState {
            organization: string(fields.take("organization")),
            location: string(fields.take("location")),
            big_query_export_id: string(fields.take("big_query_export_id")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, EXPORT_ID, &state).or_report(diags, "Error constructing id")?,
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

    const EXPORT: &str = "https://securitycenter.googleapis.com/v2/organizations/123456789/locations/global/bigQueryExports/my-export";

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn planned_export() -> BigQueryExportState<'static> {
        BigQueryExportState {
            organization: string("123456789"),
            big_query_export_id: string("my-export"),
            dataset: string("projects/my-project/datasets/my_dataset"),
            description: string("Cloud Security Command Center Findings Big Query Export Config"),
            filter: string("state=\"ACTIVE\" AND NOT mute=\"MUTED\""),
            ..Default::default()
        }
    }

    fn export_json() -> serde_json::Value {
        json!({
            "name": "organizations/123456789/locations/global/bigQueryExports/my-export",
            "dataset": "projects/my-project/datasets/my_dataset",
            "description": "Cloud Security Command Center Findings Big Query Export Config",
            "filter": "state=\"ACTIVE\" AND NOT mute=\"MUTED\"",
            "principal": "service-123@gcp-sa-scc-notification.iam.gserviceaccount.com",
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn create_defaults_to_global() {
        let resource = BigQueryExportResource::new(
            test_handle(FakeTransport::default().respond(export_json()).respond(export_json())).await,
        );
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned_export()),
                Value::Value(planned_export()),
                Default::default(),
            )
            .await
            .unwrap();
        let Value::Value(planned_state) = &planned else {
            panic!("planned state should be known");
        };
        assert_eq!(planned_state.location, string("global"));
        assert_eq!(planned_state.name, Value::Unknown);

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
            string("organizations/123456789/locations/global/bigQueryExports/my-export")
        );
        assert_eq!(
            state.principal,
            string("service-123@gcp-sa-scc-notification.iam.gserviceaccount.com")
        );

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].url,
            "https://securitycenter.googleapis.com/v2/organizations/123456789/locations/global/bigQueryExports?bigQueryExportId=my-export"
        );
        assert_eq!(requests[0].body.as_ref().unwrap().get("name"), None);
        assert_eq!(requests[1].url, EXPORT);
    }

    #[tokio::test]
    async fn update_masks_changed_fields() {
        let resource = BigQueryExportResource::new(
            test_handle(FakeTransport::default().respond(export_json()).respond(export_json())).await,
        );
        let mut prior = planned_export();
        prior.location = string("global");
        let mut planned = prior.clone();
        planned.dataset = string("projects/my-project/datasets/other_dataset");
        planned.filter = Value::Null;

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
        assert_eq!(requests[0].url, format!("{EXPORT}?updateMask=dataset%2Cfilter"));
    }

    #[tokio::test]
    async fn location_change_forces_replacement() {
        let resource = BigQueryExportResource::new(test_handle(FakeTransport::default()).await);
        let mut prior = planned_export();
        prior.location = string("global");
        let mut proposed = prior.clone();
        proposed.location = string("eu");
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
    async fn import_ids() {
        let resource = BigQueryExportResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .import(&mut diags, "123456789/global/my-export".to_owned())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(state.big_query_export_id, string("my-export"));
        assert_eq!(
            state.id,
            string("organizations/123456789/locations/global/bigQueryExports/my-export")
        );
    }
}
