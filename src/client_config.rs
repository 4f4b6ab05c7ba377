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

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType};
use tf_provider::value::{Value, ValueMap, ValueString};
use tf_provider::{map, Block, DataSource, Description, Diagnostics, Schema, ValueEmpty};

use crate::transport::{ProviderHandle, Transport};
use crate::utils::{string, string_map, ResultExt, WithSchema};

/// Exposes the resolved provider configuration
#[derive(Debug)]
pub struct ClientConfigDataSource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> ClientConfigDataSource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigState<'a> {
    pub id: ValueString<'a>,
    pub project: ValueString<'a>,
    pub region: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub access_token: ValueString<'a>,
    pub default_labels: ValueMap<'a, ValueString<'a>>,
}

impl WithSchema for ClientConfigState<'_> {
    fn schema() -> Schema {
        let computed = |description: &'static str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Computed,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => computed("projects/{project}/regions/{region}/zones/{zone}"),
                    "project" => computed("Default project of the provider"),
                    "region" => computed("Default region of the provider"),
                    "zone" => computed("Default zone of the provider"),
                    "access_token" => Attribute {
                        sensitive: true,
                        ..computed("OAuth2 access token used by the provider")
                    },
                    "default_labels" => Attribute {
                        attr_type: AttributeType::Map(Box::new(AttributeType::String)),
                        description: Description::plain("Default labels of the provider"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Configuration of the google provider"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<T: Transport> DataSource for ClientConfigDataSource<T> {
    type State<'a> = ClientConfigState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ClientConfigState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, _config: Self::State<'a>) -> Option<()> {
        // Every attribute is computed: nothing to check in the configuration
        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        _config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.provider.client(diags).await?;
        let access_token = client
            .transport()
            .access_token()
            .await
            .or_report(diags, "Error setting access_token")?;

        let config = &client.config;
        let id = format!(
            "projects/{}/regions/{}/zones/{}",
            config.project.as_deref().unwrap_or_default(),
            config.region.as_deref().unwrap_or_default(),
            config.zone.as_deref().unwrap_or_default(),
        );
        Some(ClientConfigState {
            id: Value::Value(Cow::Owned(id)),
            project: string(config.project.clone()),
            region: string(config.region.clone()),
            zone: string(config.zone.clone()),
            access_token: Value::Value(Cow::Owned(access_token)),
            default_labels: string_map(Some(config.default_labels.clone())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{test_handle, FakeTransport};

    #[tokio::test]
    async fn exposes_provider_defaults() {
        let data_source = ClientConfigDataSource::new(test_handle(FakeTransport::default()).await);
        let mut diags = Diagnostics::default();
        let state = data_source
            .read(&mut diags, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(
            state.id,
            Value::Value(Cow::Borrowed(
                "projects/my-project/regions/us-central1/zones/us-central1-a"
            ))
        );
        assert_eq!(state.access_token, Value::Value(Cow::Borrowed("ya29.fake-token")));
        assert_eq!(state.default_labels, Value::Value(Default::default()));
    }

    #[tokio::test]
    async fn empty_configuration_is_valid() {
        let data_source = ClientConfigDataSource::<FakeTransport>::new(ProviderHandle::new());
        let mut diags = Diagnostics::default();
        assert_eq!(
            data_source.validate(&mut diags, Default::default()).await,
            Some(())
        );
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn requires_configuration() {
        let data_source = ClientConfigDataSource::<FakeTransport>::new(ProviderHandle::new());
        let mut diags = Diagnostics::default();
        assert!(data_source
            .read(&mut diags, Default::default(), Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
