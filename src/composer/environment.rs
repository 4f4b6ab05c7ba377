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
use serde_json::json;
use tracing::{debug, info, warn};

use tf_provider::schema::Attribute;
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueMap, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::labels::{self, FlattenedLabels};
use crate::tpgresource::schema::{self as attr, OptionalComputed, Required};
use crate::tpgresource::self_link::name_from_self_link;
use crate::tpgresource::validation::{gcp_name_regex, validate_max_items, validate_regex};
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock,
};
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, GoogleClient, ProviderHandle, Service, Transport};
use crate::utils::{
    block, known, non_empty, owned, string, string_map_of, to_block, tracked, with_default,
    ResultExt, WithNormalize, WithSchema, WithValidate,
};

use super::config::{self, ApiEnvironmentConfig, EnvironmentConfig, Location, SoftwareConfig};

const ENVIRONMENT_URL: &str =
    "{{ComposerBasePath}}projects/{{project}}/locations/{{region}}/environments/{{name}}";
const ENVIRONMENT_ID: &str = "projects/{{project}}/locations/{{region}}/environments/{{name}}";
const IMPORT_FORMATS: &[&str] = &[
    "projects/(?P<project>[^/]+)/locations/(?P<region>[^/]+)/environments/(?P<name>[^/]+)",
    "(?P<project>[^/]+)/(?P<region>[^/]+)/(?P<name>[^/]+)",
    "(?P<name>[^/]+)",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(60, 60, 15);

#[derive(Debug)]
pub struct ComposerEnvironmentResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> ComposerEnvironmentResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub region: ValueString<'a>,
    pub project: ValueString<'a>,
    pub labels: ValueMap<'a, ValueString<'a>>,
    pub terraform_labels: ValueMap<'a, ValueString<'a>>,
    pub effective_labels: ValueMap<'a, ValueString<'a>>,
    pub config: ValueList<Value<EnvironmentConfig<'a>>>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Environment {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<ApiEnvironmentConfig>,
    #[serde(skip_serializing)]
    state: Option<String>,
}

impl ResourceVars for EnvironmentState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "name" => owned(&self.name),
            "project" => owned(&self.project),
            "region" => owned(&self.region),
            _ => None,
        }
    }
}

impl WithSchema for EnvironmentState<'_> {
    fn schema() -> Schema {
        let mut attributes: HashMap<String, Attribute> = map! {
            "id" => attr::id(),
            "name" => attr::string(Required, "Name of the environment."),
            "region" => attr::string(OptionalComputed, "The location or Compute Engine region for the environment."),
            "project" => attr::project(),
        };
        attributes.extend(labels::schema());

        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "config" => config::config_block(),
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("An environment for running orchestration tasks."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for EnvironmentState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_regex(diags, &self.name, gcp_name_regex(), attr_path.clone().attribute("name"));
        validate_max_items(diags, &self.config, 1, attr_path.clone().attribute("config"));
        if let Some(config) = block(&self.config) {
            config::validate(diags, config, attr_path.attribute("config").index(0));
        }
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for EnvironmentState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.effective_labels = Value::Unknown;
    }
}

impl<'a> EnvironmentState<'a> {
    fn config_mut(&mut self) -> Option<&mut EnvironmentConfig<'a>> {
        match &mut self.config {
            Value::Value(items) => match items.first_mut() {
                Some(Value::Value(config)) => Some(config),
                _ => None,
            },
            _ => None,
        }
    }

    fn software_config(&self) -> Option<&SoftwareConfig<'a>> {
        block(&self.config).and_then(|config| block(&config.software_config))
    }

    fn expand(&self) -> Result<Environment, String> {
        let location = Location {
            project: non_empty(&self.project).unwrap_or_default(),
            region: non_empty(&self.region).unwrap_or_default(),
        };
        Ok(Environment {
            name: Some(format!(
                "projects/{}/locations/{}/environments/{}",
                location.project,
                location.region,
                non_empty(&self.name).unwrap_or_default()
            )),
            labels: labels::expand(&self.terraform_labels),
            config: block(&self.config)
                .map(|config| config::expand(config, &location))
                .transpose()?,
            ..Default::default()
        })
    }

    fn flatten(&mut self, environment: Environment) {
        let FlattenedLabels {
            labels,
            terraform_labels,
            effective_labels,
        } = labels::flatten(environment.labels, &self.labels, &self.terraform_labels);

        if let Some(name) = environment.name.as_deref() {
            self.name = Value::Value(Cow::Owned(name_from_self_link(name).to_owned()));
        }
        self.labels = labels;
        self.terraform_labels = terraform_labels;
        self.effective_labels = effective_labels;
        if tracked(&self.config) {
            let prior = block(&self.config).cloned().unwrap_or_default();
            self.config = to_block(
                environment
                    .config
                    .map(|api| config::flatten(&prior, api)),
            );
        }
    }

    fn display_id(&self) -> String {
        format!("ComposerEnvironment {:?}", non_empty(&self.id).unwrap_or_default())
    }
}

/// Fields updated one PATCH at a time, in this order
fn changes(prior: &EnvironmentState, planned: &EnvironmentState) -> Vec<(&'static str, serde_json::Value)> {
    let mut changes = vec![];
    let prior_software = prior.software_config().cloned().unwrap_or_default();
    let software = planned.software_config().cloned().unwrap_or_default();

    if prior_software.image_version != software.image_version {
        if let Some(image_version) = owned(&software.image_version) {
            changes.push((
                "config.softwareConfig.imageVersion",
                json!({"config": {"softwareConfig": {"imageVersion": image_version}}}),
            ));
        }
    }
    for (mask, field, prior_map, planned_map) in [
        (
            "config.softwareConfig.airflowConfigOverrides",
            "airflowConfigOverrides",
            &prior_software.airflow_config_overrides,
            &software.airflow_config_overrides,
        ),
        (
            "config.softwareConfig.envVariables",
            "envVariables",
            &prior_software.env_variables,
            &software.env_variables,
        ),
        (
            "config.softwareConfig.pypiPackages",
            "pypiPackages",
            &prior_software.pypi_packages,
            &software.pypi_packages,
        ),
    ] {
        if string_map_of(prior_map).unwrap_or_default() != string_map_of(planned_map).unwrap_or_default() {
            let values = string_map_of(planned_map).unwrap_or_default();
            changes.push((mask, json!({"config": {"softwareConfig": {field: values}}})));
        }
    }

    let node_count = |state: &EnvironmentState| block(&state.config).and_then(|config| known(&config.node_count));
    if let (Some(old), Some(new)) = (node_count(prior), node_count(planned)) {
        if old != new {
            changes.push(("config.nodeCount", json!({"config": {"nodeCount": new}})));
        }
    }

    if prior.terraform_labels != planned.terraform_labels {
        changes.push((
            "labels",
            json!({"labels": labels::expand(&planned.terraform_labels).unwrap_or_default()}),
        ));
    }
    changes
}

impl<T: Transport> ComposerEnvironmentResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: EnvironmentState<'a>,
    ) -> Option<Option<EnvironmentState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, ENVIRONMENT_URL, &state)
            .or_report(diags, "Error reading Environment")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        let environment = handle_not_found(
            client
                .fetch::<Environment>(ApiRequest::get(url).with_billing_project(billing_project))
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(environment.map(|environment| {
            state.flatten(environment);
            state
        }))
    }

    /// PATCH a single field of the environment and wait for it
    async fn patch(
        &self,
        client: &GoogleClient<T>,
        state: &EnvironmentState<'_>,
        mask: &str,
        body: serde_json::Value,
        activity: &str,
        timeout: std::time::Duration,
    ) -> Result<(), crate::transport::ApiError> {
        let url = replace_vars(&client.config, ENVIRONMENT_URL, state)
            .and_then(|url| add_query_params(&url, &[("updateMask", mask)]))?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));

        debug!("Updating Environment {:?} ({mask}): {body}", state.id);
        client
            .send_and_wait(
                ApiRequest::patch(url, body)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::Composer,
                    billing_project,
                    activity,
                    timeout,
                },
            )
            .await?;
        Ok(())
    }

    /// The creation failed while waiting: an environment left in an error
    /// state is deleted so that the next apply can create it again.
    async fn clean_up_failed_create(
        &self,
        diags: &mut Diagnostics,
        client: &GoogleClient<T>,
        state: &EnvironmentState<'_>,
    ) {
        let Ok(url) = replace_vars(&client.config, ENVIRONMENT_URL, state) else {
            return;
        };
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let environment = client
            .fetch::<Environment>(ApiRequest::get(&url).with_billing_project(billing_project.clone()))
            .await;
        match environment {
            Err(err) if err.is_not_found() => {
                info!("{} was not created, nothing to clean up", state.display_id());
            }
            Err(err) => {
                diags.root_error(
                    "Error checking the created Environment",
                    format!(
                        "Unable to check whether {} was created, it may have to be deleted manually: {err}",
                        state.display_id()
                    ),
                );
            }
            Ok(environment) if environment.state.as_deref() == Some("CREATING") => {
                diags.root_error(
                    "Environment still creating",
                    format!(
                        "Getting creation operation state failed while waiting for environment to finish creating, but environment seems to still be in 'CREATING' state. Wait for operation to finish and either manually delete environment or import {:?} into your state",
                        non_empty(&state.id).unwrap_or_default()
                    ),
                );
            }
            Ok(_) => {
                warn!("Deleting invalid created {}", state.display_id());
                let timeout = TIMEOUTS.delete(&state.timeouts);
                let result = client
                    .send_and_wait(
                        ApiRequest::delete(url)
                            .with_billing_project(billing_project.clone())
                            .with_timeout(timeout),
                        OperationWait {
                            service: Service::Composer,
                            billing_project,
                            activity: "Deleting invalid created Environment",
                            timeout,
                        },
                    )
                    .await;
                if let Err(err) = result {
                    diags.root_error(
                        "Error deleting invalid created Environment",
                        format!("{} may have to be deleted manually: {err}", state.display_id()),
                    );
                }
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Resource for ComposerEnvironmentResource<T> {
    type State<'a> = Value<EnvironmentState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EnvironmentState::schema())
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
        state.region = with_default(&state.region, client.config.region.as_deref());
        state.terraform_labels = labels::terraform_labels(&client.config, &state.labels);
        if let Some(config) = state.config_mut() {
            config::plan(config, None, &mut vec![]);
        }

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
        if state.region.is_null() {
            state.region = prior.region.clone();
        }
        state.terraform_labels = labels::terraform_labels(&client.config, &state.labels);
        state.effective_labels = labels::effective_labels(
            &prior.terraform_labels,
            &state.terraform_labels,
            &prior.effective_labels,
        );

        let mut replace = vec![];
        force_new(&mut replace, "name", &prior.name, &state.name);
        force_new(&mut replace, "region", &prior.region, &state.region);
        force_new(&mut replace, "project", &prior.project, &state.project);
        if let Some(config) = state.config_mut() {
            config::plan(config, block(&prior.config), &mut replace);
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
        state.region = with_default(&state.region, client.config.region.as_deref());

        let mut environment = state.expand().or_report(diags, "Error creating Environment")?;
        // Packages are installed once the environment runs
        let pypi_packages = environment
            .config
            .as_mut()
            .and_then(|config| config.software_config.as_mut())
            .and_then(|software| software.pypi_packages.take())
            .filter(|packages| !packages.is_empty());

        let url = replace_vars(
            &client.config,
            "{{ComposerBasePath}}projects/{{project}}/locations/{{region}}/environments",
            &state,
        )
        .or_report(diags, "Error creating Environment")?;
        let body = serde_json::to_value(&environment).or_report(diags, "Error creating Environment")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.create(&state.timeouts);

        debug!("Creating new Environment: {body}");
        let operation = client
            .send_request(
                ApiRequest::post(url, body)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
            )
            .await
            .or_report(diags, "Error creating Environment")?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, ENVIRONMENT_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));

        let waited = client
            .wait_for_operation(
                operation,
                OperationWait {
                    service: Service::Composer,
                    billing_project,
                    activity: "Creating Environment",
                    timeout,
                },
            )
            .await;
        if let Err(err) = waited {
            diags.root_error("Error waiting to create Environment", err.to_string());
            self.clean_up_failed_create(diags, &client, &state).await;
            return None;
        }
        debug!("Finished creating Environment {:?}", state.id);

        if let Some(pypi_packages) = pypi_packages {
            let result = self
                .patch(
                    &client,
                    &state,
                    "config.softwareConfig.pypiPackages",
                    json!({"config": {"softwareConfig": {"pypiPackages": pypi_packages}}}),
                    "Updating newly created Environment",
                    timeout,
                )
                .await;
            if let Err(err) = result {
                diags.root_error(
                    "Error installing PyPI packages",
                    format!("{} was created but its packages could not be installed: {err}", state.display_id()),
                );
            }
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("Environment disappeared right after its creation");
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
        let timeout = TIMEOUTS.update(&state.timeouts);

        for (mask, body) in changes(&prior, &state) {
            self.patch(&client, &state, mask, body, "Updating Environment", timeout)
                .await
                .or_report(diags, "Error updating Environment")?;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("Environment disappeared during its update");
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
        let url = replace_vars(&client.config, ENVIRONMENT_URL, &state)
            .or_report(diags, "Error deleting Environment")?;
        let billing_project = client.config.billing_project_for(non_empty(&state.project));
        let timeout = TIMEOUTS.delete(&state.timeouts);

        debug!("Deleting Environment {:?}", state.id);
        let result = client
            .send_and_wait(
                ApiRequest::delete(url)
                    .with_billing_project(billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::Composer,
                    billing_project,
                    activity: "Deleting Environment",
                    timeout,
                },
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => {
                warn!("{} was already deleted", state.display_id());
            }
            result => {
                result.or_report(diags, "Error deleting Environment")?;
            }
        }
        debug!("Finished deleting Environment {:?}", state.id);
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.provider.client(diags).await?;
        let mut fields = parse_import_id(IMPORT_FORMATS, &id, &client.config)
            .or_report(diags, "Error importing Environment")?;

        let mut state = EnvironmentState {
            name: string(fields.take("name")),
            region: string(fields.take("region")),
            project: string(fields.take("project")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, ENVIRONMENT_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));
        Some((Value::Value(state), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reqwest::Method;

    use super::*;
    use crate::transport::testing::{test_handle, FakeTransport};
    use crate::utils::string_map;

    const ENVIRONMENT: &str =
        "https://composer.googleapis.com/v1/projects/my-project/locations/us-central1/environments/env-1";

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn planned_environment() -> EnvironmentState<'static> {
        EnvironmentState {
            name: string("env-1"),
            config: to_block(Some(EnvironmentConfig {
                node_count: Value::Value(3),
                software_config: to_block(Some(SoftwareConfig {
                    image_version: string("composer-1-airflow-2"),
                    pypi_packages: string_map(Some([("numpy".to_owned(), String::new())].into())),
                    ..Default::default()
                })),
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    fn environment_json(state: &str) -> serde_json::Value {
        json!({
            "name": "projects/my-project/locations/us-central1/environments/env-1",
            "state": state,
            "config": {
                "nodeCount": 3,
                "airflowUri": "https://example.composer.googleusercontent.com",
                "dagGcsPrefix": "gs://us-central1-env-1-bucket/dags",
                "gkeCluster": "projects/my-project/zones/us-central1-a/clusters/us-central1-env-1-gke",
                "softwareConfig": {
                    "imageVersion": "composer-1.20.12-airflow-2.4.3",
                    "pythonVersion": "3",
                    "pypiPackages": {"numpy": ""}
                }
            }
        })
    }

    fn done() -> serde_json::Value {
        json!({"name": "projects/my-project/locations/us-central1/operations/op-1", "done": true})
    }

    fn failed() -> serde_json::Value {
        json!({
            "name": "projects/my-project/locations/us-central1/operations/op-1",
            "done": true,
            "error": {"code": 13, "message": "GKE cluster creation failed"}
        })
    }

    async fn planned(resource: &ComposerEnvironmentResource<FakeTransport>) -> Value<EnvironmentState<'static>> {
        let mut diags = Diagnostics::default();
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                Value::Value(planned_environment()),
                Value::Value(planned_environment()),
                Default::default(),
            )
            .await
            .unwrap();
        planned
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let resource = ComposerEnvironmentResource::new(test_handle(FakeTransport::default()).await);
        let mut environment = planned_environment();
        environment.name = string("Env_1");
        let mut diags = Diagnostics::default();
        assert!(resource
            .validate(&mut diags, Value::Value(environment))
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn packages_are_installed_after_creation() {
        let resource = ComposerEnvironmentResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(done())
                    .respond(done())
                    .respond(environment_json("RUNNING")),
            )
            .await,
        );
        let planned = planned(&resource).await;
        let mut diags = Diagnostics::default();
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
            string("projects/my-project/locations/us-central1/environments/env-1")
        );
        let config = block(&state.config).unwrap();
        assert_eq!(config.airflow_uri, string("https://example.composer.googleusercontent.com"));
        let software = block(&config.software_config).unwrap();
        assert_eq!(software.image_version, string("composer-1-airflow-2"));
        assert_eq!(software.python_version, string("3"));

        let client = resource.provider.client(&mut diags).await.unwrap();
        let requests = client.transport().requests();
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(
            requests[0].body,
            Some(json!({
                "name": "projects/my-project/locations/us-central1/environments/env-1",
                "config": {
                    "nodeCount": 3,
                    "softwareConfig": {"imageVersion": "composer-1-airflow-2"}
                }
            }))
        );
        assert_eq!(requests[1].method, Method::PATCH);
        assert_eq!(
            requests[1].url,
            format!("{ENVIRONMENT}?updateMask=config.softwareConfig.pypiPackages")
        );
        assert_eq!(
            requests[1].body,
            Some(json!({"config": {"softwareConfig": {"pypiPackages": {"numpy": ""}}}}))
        );
    }

    #[tokio::test]
    async fn failed_creation_is_cleaned_up() {
        let resource = ComposerEnvironmentResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(failed())
                    .respond(environment_json("ERROR"))
                    .respond(done()),
            )
            .await,
        );
        let planned = planned(&resource).await;
        let mut diags = Diagnostics::default();
        let created = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(created.is_none());
        assert_eq!(diags.errors.len(), 1);

        let client = resource.provider.client(&mut diags).await.unwrap();
        assert_eq!(
            client.transport().calls()[1..].to_vec(),
            vec![
                (Method::GET, ENVIRONMENT.to_owned()),
                (Method::DELETE, ENVIRONMENT.to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn environment_still_creating_is_left_alone() {
        let resource = ComposerEnvironmentResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(failed())
                    .respond(environment_json("CREATING")),
            )
            .await,
        );
        let planned = planned(&resource).await;
        let mut diags = Diagnostics::default();
        let created = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(created.is_none());
        assert_eq!(diags.errors.len(), 2);

        let client = resource.provider.client(&mut diags).await.unwrap();
        assert_eq!(client.transport().calls().len(), 2);
    }

    #[tokio::test]
    async fn update_patches_one_field_at_a_time() {
        let resource = ComposerEnvironmentResource::new(
            test_handle(
                FakeTransport::default()
                    .respond(done())
                    .respond(done())
                    .respond(done())
                    .respond(environment_json("RUNNING")),
            )
            .await,
        );
        let mut prior = planned_environment();
        prior.project = string("my-project");
        prior.region = string("us-central1");
        let mut planned = prior.clone();
        {
            let config = planned.config_mut().unwrap();
            config.node_count = Value::Value(5);
            let Value::Value(software) = &mut config.software_config else {
                unreachable!()
            };
            software[0] = Value::Value(SoftwareConfig {
                image_version: string("composer-2-airflow-2"),
                env_variables: string_map(Some([("FOO".to_owned(), "bar".to_owned())].into())),
                ..block(&prior.config).and_then(|c| block(&c.software_config)).cloned().unwrap()
            });
        }

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
        let urls: Vec<String> = client
            .transport()
            .requests()
            .into_iter()
            .take(3)
            .map(|request| request.url)
            .collect();
        assert_eq!(
            urls,
            [
                format!("{ENVIRONMENT}?updateMask=config.softwareConfig.imageVersion"),
                format!("{ENVIRONMENT}?updateMask=config.softwareConfig.envVariables"),
                format!("{ENVIRONMENT}?updateMask=config.nodeCount"),
            ]
        );
    }

    #[tokio::test]
    async fn python_version_forces_replacement() {
        let resource = ComposerEnvironmentResource::new(test_handle(FakeTransport::default()).await);
        let mut prior = planned_environment();
        prior.project = string("my-project");
        prior.region = string("us-central1");
        let mut proposed = prior.clone();
        if let Value::Value(software) = &mut proposed.config_mut().unwrap().software_config {
            if let Value::Value(software) = &mut software[0] {
                software.python_version = string("2");
            }
        }

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
    async fn import_accepts_short_ids() {
        let resource = ComposerEnvironmentResource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .import(&mut diags, "env-1".to_owned())
            .await
            .unwrap();
        let state = state.unwrap_or_default();
        assert_eq!(
            state.id,
            string("projects/my-project/locations/us-central1/environments/env-1")
        );
        assert_eq!(state.config, Value::Null);
    }
}
