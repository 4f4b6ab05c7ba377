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

use crate::tpgresource::schema::{self as attr, Computed, Optional, Required};
use crate::tpgresource::self_link::name_from_self_link;
use crate::tpgresource::validation::{validate_enum, validate_json};
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::mutex::MUTEX_STORE;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Transport};
use crate::utils::{
    api_string, as_str, non_empty, non_empty_string, owned, string, ResultExt, WithNormalize,
    WithSchema, WithValidate,
};

const MODULES_URL: &str =
    "{{SecurityCenterBasePath}}organizations/{{organization}}/eventThreatDetectionSettings/customModules";
const MODULE_URL: &str = "{{SecurityCenterBasePath}}organizations/{{organization}}/eventThreatDetectionSettings/customModules/{{name}}";
const MODULE_ID: &str =
    "organizations/{{organization}}/eventThreatDetectionSettings/customModules/{{name}}";
const LOCK_NAME: &str = "organizations/{{organization}}/eventThreatDetectionSettings/customModules";
const IMPORT_FORMATS: &[&str] = &[
    "^organizations/(?P<organization>[^/]+)/eventThreatDetectionSettings/customModules/(?P<name>[^/]+)$",
    "^(?P<organization>[^/]+)/(?P<name>[^/]+)$",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const ENABLEMENT_STATES: &[&str] = &["ENABLED", "DISABLED"];

#[derive(Debug)]
pub struct EventThreatDetectionCustomModuleResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> EventThreatDetectionCustomModuleResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomModuleState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub organization: ValueString<'a>,
    #[serde(rename = "type")]
    pub module_type: ValueString<'a>,
    pub config: ValueString<'a>,
    pub enablement_state: ValueString<'a>,
    pub display_name: ValueString<'a>,
    pub last_editor: ValueString<'a>,
    pub update_time: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CustomModule {
    #[serde(skip_serializing)]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enablement_state: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    module_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing)]
    last_editor: Option<String>,
    #[serde(skip_serializing)]
    update_time: Option<String>,
}

impl ResourceVars for CustomModuleState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "organization" => owned(&self.organization),
            "name" => owned(&self.name),
            _ => None,
        }
    }
}

impl WithSchema for CustomModuleState<'_> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => attr::id(),
                    "organization" => attr::string(Required, "Numerical ID of the parent organization."),
                    "type" => attr::string(Required, "Immutable. Type for the module. e.g. CONFIGURABLE_BAD_IP."),
                    "config" => attr::string(Required, "Config for the module. For the resident module, its config value is defined at this level. For the inherited module, its config value is inherited from the ancestor module."),
                    "enablement_state" => attr::string(Required, "The state of enablement for the module at the given level of the hierarchy. Possible values: [\"ENABLED\", \"DISABLED\"]"),
                    "display_name" => attr::string(Optional, "The human readable name to be displayed for the module."),
                    "name" => attr::string(Computed, "The resource name of the Event Threat Detection custom module. Its format is \"organizations/{organization}/eventThreatDetectionSettings/customModules/{module}\"."),
                    "last_editor" => attr::string(Computed, "The editor that last updated the custom module"),
                    "update_time" => attr::string(Computed, "The time at which the custom module was last updated. A timestamp in RFC3339 UTC \"Zulu\" format, with nanosecond resolution and up to nine fractional digits. Examples: \"2014-10-02T15:01:23Z\" and \"2014-10-02T15:01:23.045123456Z\"."),
                },
                blocks: map! {
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("Represents an instance of an Event Threat Detection custom module, including its full module name, display name, enablement state, and last updated time. You can create a custom module at the organization level only."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for CustomModuleState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_json(diags, &self.config, attr_path.clone().attribute("config"));
        validate_enum(
            diags,
            &self.enablement_state,
            ENABLEMENT_STATES,
            attr_path.attribute("enablement_state"),
        );
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for CustomModuleState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.name = Value::Unknown;
        self.last_editor = Value::Unknown;
        self.update_time = Value::Unknown;
    }
}

fn parse_config(config: &ValueString) -> Option<serde_json::Value> {
    serde_json::from_str(as_str(config)?).ok()
}

/// Both configurations hold the same JSON document, whatever their layout
fn same_config(a: &ValueString, b: &ValueString) -> bool {
    match (parse_config(a), parse_config(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

impl<'a> CustomModuleState<'a> {
    fn expand(&self) -> Result<CustomModule, serde_json::Error> {
        let config = match as_str(&self.config) {
            Some(config) if !config.is_empty() => Some(serde_json::from_str(config)?),
            _ => None,
        };
        Ok(CustomModule {
            config,
            enablement_state: owned(&self.enablement_state),
            module_type: owned(&self.module_type),
            display_name: owned(&self.display_name),
            ..Default::default()
        })
    }

    fn flatten(&mut self, module: CustomModule) {
        self.name = non_empty_string(
            module
                .name
                .map(|name| name_from_self_link(&name).to_owned()),
        );
        self.config = match module.config {
            Some(config) if parse_config(&self.config).as_ref() == Some(&config) => {
                self.config.clone()
            }
            Some(config) => Value::Value(Cow::Owned(config.to_string())),
            None => Value::Null,
        };
        self.enablement_state = non_empty_string(module.enablement_state);
        self.module_type = non_empty_string(module.module_type);
        self.display_name = api_string(&self.display_name, module.display_name);
        self.last_editor = non_empty_string(module.last_editor);
        self.update_time = non_empty_string(module.update_time);
    }

    fn display_id(&self) -> String {
        format!(
            "SecurityCenterEventThreatDetectionCustomModule {:?}",
            non_empty(&self.id).unwrap_or_default()
        )
    }
}

impl<T: Transport> EventThreatDetectionCustomModuleResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: CustomModuleState<'a>,
    ) -> Option<Option<CustomModuleState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, MODULE_URL, &state)
            .or_report(diags, "Error reading EventThreatDetectionCustomModule")?;

        let module = handle_not_found(
            client
                .fetch::<CustomModule>(
                    ApiRequest::get(url).with_billing_project(client.config.billing_project.clone()),
                )
                .await,
            diags,
            &state.display_id(),
        )?;
        Some(module.map(|module| {
            state.flatten(module);
            state
        }))
    }
}

#[async_trait]
impl<T: Transport> Resource for EventThreatDetectionCustomModuleResource<T> {
    type State<'a> = Value<CustomModuleState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(CustomModuleState::schema())
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
        let Value::Value(mut state) = proposed_state else {
            return Some((proposed_state, prior_private_state, vec![]));
        };
        if same_config(&prior.config, &state.config) {
            state.config = prior.config.clone();
        }
        if state != prior {
            state.last_editor = Value::Unknown;
            state.update_time = Value::Unknown;
        }

        let mut replace = vec![];
        force_new(&mut replace, "organization", &prior.organization, &state.organization);
        force_new(&mut replace, "type", &prior.module_type, &state.module_type);

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

        let body = state
            .expand()
            .and_then(serde_json::to_value)
            .or_report(diags, "Error creating EventThreatDetectionCustomModule")?;
        let lock_name = replace_vars(&client.config, LOCK_NAME, &state)
            .or_report(diags, "Error constructing lock name")?;
        let _guard = MUTEX_STORE.lock(&lock_name).await;
        let url = replace_vars(&client.config, MODULES_URL, &state)
            .or_report(diags, "Error creating EventThreatDetectionCustomModule")?;

        debug!("Creating new EventThreatDetectionCustomModule: {body}");
        let module: CustomModule = client
            .fetch(
                ApiRequest::post(url, body)
                    .with_billing_project(client.config.billing_project.clone())
                    .with_timeout(TIMEOUTS.create(&state.timeouts)),
            )
            .await
            .or_report(diags, "Error creating EventThreatDetectionCustomModule")?;

        state.name = non_empty_string(
            module
                .name
                .map(|name| name_from_self_link(&name).to_owned()),
        );
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, MODULE_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));
        debug!("Finished creating EventThreatDetectionCustomModule {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short(
                    "EventThreatDetectionCustomModule disappeared right after its creation",
                );
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
        if !same_config(&prior.config, &state.config) {
            mask.push("config");
        }
        mask.push_if_changed("enablementState", &prior.enablement_state, &state.enablement_state);
        mask.push_if_changed("displayName", &prior.display_name, &state.display_name);

        if !mask.is_empty() {
            let summary = format!("Error updating EventThreatDetectionCustomModule {:?}", state.id);
            let body = state
                .expand()
                .and_then(serde_json::to_value)
                .or_report(diags, &summary)?;
            let lock_name = replace_vars(&client.config, LOCK_NAME, &state)
                .or_report(diags, "Error constructing lock name")?;
            let _guard = MUTEX_STORE.lock(&lock_name).await;
            let url = replace_vars(&client.config, MODULE_URL, &state)
                .and_then(|url| add_query_params(&url, &[("updateMask", &mask.to_string())]))
                .or_report(diags, &summary)?;

            debug!("Updating EventThreatDetectionCustomModule {:?}: {body}", state.id);
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
                diags.root_error_short("EventThreatDetectionCustomModule disappeared during its update");
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
        let lock_name = replace_vars(&client.config, LOCK_NAME, &state)
            .or_report(diags, "Error constructing lock name")?;
        let _guard = MUTEX_STORE.lock(&lock_name).await;
        let url = replace_vars(&client.config, MODULE_URL, &state)
            .or_report(diags, "Error deleting EventThreatDetectionCustomModule")?;

        debug!("Deleting EventThreatDetectionCustomModule {:?}", state.id);
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
                result.or_report(diags, "Error deleting EventThreatDetectionCustomModule")?;
            }
        }
        debug!("Finished deleting EventThreatDetectionCustomModule {:?}", state.id);
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.provider.client(diags).await?;
        let mut fields = parse_import_id(IMPORT_FORMATS, &id, &client.config)
            .or_report(diags, "Error importing EventThreatDetectionCustomModule")?;

        let mut state = CustomModuleState {
            organization: string(fields.take("organization")),
            name: string(fields.take("name")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, MODULE_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));
        Some((Value::Value(state), Default::default()))
    }
}
