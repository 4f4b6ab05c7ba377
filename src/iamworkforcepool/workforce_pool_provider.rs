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
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tf_provider::schema::NestedBlock;
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueMap, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics, Resource, Schema};

use crate::tpgresource::schema::{self as attr, Computed, Optional, Required};
use crate::tpgresource::validation::{
    validate_conflict, validate_enum, validate_json, validate_length, validate_max_items,
};
use crate::tpgresource::{
    add_query_params, force_new, parse_import_id, replace_vars, timeouts, ResourceTimeouts,
    ResourceVars, TimeoutsBlock, UpdateMask,
};
use crate::transport::operation::OperationWait;
use crate::transport::{handle_not_found, ApiRequest, ProviderHandle, Service, Transport};
use crate::utils::{
    api_bool, api_string, block, known, non_empty, non_empty_string, owned, string, string_list,
    string_map, string_map_of, strings, to_block, tracked, ResultExt, ValueBool, WithNormalize,
    WithSchema, WithValidate,
};

use super::{validate_id, DELETED};

const PROVIDER_URL: &str = "{{IAMWorkforcePoolBasePath}}locations/{{location}}/workforcePools/{{workforce_pool_id}}/providers/{{provider_id}}";
const PROVIDER_ID: &str =
    "locations/{{location}}/workforcePools/{{workforce_pool_id}}/providers/{{provider_id}}";
const IMPORT_FORMATS: &[&str] = &[
    "^locations/(?P<location>[^/]+)/workforcePools/(?P<workforce_pool_id>[^/]+)/providers/(?P<provider_id>[^/]+)$",
    "^(?P<location>[^/]+)/(?P<workforce_pool_id>[^/]+)/(?P<provider_id>[^/]+)$",
];
const TIMEOUTS: ResourceTimeouts = ResourceTimeouts::minutes(20, 20, 20);
const RESPONSE_TYPES: &[&str] = &["CODE", "ID_TOKEN"];
const ASSERTION_CLAIMS_BEHAVIORS: &[&str] = &[
    "MERGE_USER_INFO_OVER_ID_TOKEN_CLAIMS",
    "ONLY_ID_TOKEN_CLAIMS",
];

lazy_static! {
    static ref PROVIDER_ID_REGEX: Regex =
        Regex::new(r"^[a-z0-9-]{6,32}$").expect("provider id regex is valid");
}

#[derive(Debug)]
pub struct WorkforcePoolProviderResource<T: Transport> {
    provider: ProviderHandle<T>,
}

impl<T: Transport> WorkforcePoolProviderResource<T> {
    pub fn new(provider: ProviderHandle<T>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub location: ValueString<'a>,
    pub workforce_pool_id: ValueString<'a>,
    pub provider_id: ValueString<'a>,
    pub display_name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub disabled: ValueBool,
    pub attribute_mapping: ValueMap<'a, ValueString<'a>>,
    pub attribute_condition: ValueString<'a>,
    pub saml: ValueList<Value<Saml<'a>>>,
    pub oidc: ValueList<Value<Oidc<'a>>>,
    pub state: ValueString<'a>,
    pub timeouts: TimeoutsBlock<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Saml<'a> {
    pub idp_metadata_xml: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oidc<'a> {
    pub issuer_uri: ValueString<'a>,
    pub client_id: ValueString<'a>,
    pub client_secret: ValueList<Value<ClientSecret<'a>>>,
    pub web_sso_config: ValueList<Value<WebSsoConfig<'a>>>,
    pub jwks_json: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSecret<'a> {
    pub value: ValueList<Value<ClientSecretValue<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSecretValue<'a> {
    pub plain_text: ValueString<'a>,
    pub thumbprint: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSsoConfig<'a> {
    pub response_type: ValueString<'a>,
    pub assertion_claims_behavior: ValueString<'a>,
    pub additional_scopes: ValueList<ValueString<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WorkforcePoolProvider {
    #[serde(skip_serializing)]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribute_mapping: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attribute_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saml: Option<ApiSaml>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oidc: Option<ApiOidc>,
    #[serde(skip_serializing)]
    state: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiSaml {
    idp_metadata_xml: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiOidc {
    #[serde(skip_serializing_if = "Option::is_none")]
    issuer_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<ApiClientSecret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_sso_config: Option<ApiWebSsoConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwks_json: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ApiClientSecret {
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<ApiClientSecretValue>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiClientSecretValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    plain_text: Option<String>,
    #[serde(skip_serializing)]
    thumbprint: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApiWebSsoConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assertion_claims_behavior: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_scopes: Option<Vec<String>>,
}

impl ResourceVars for ProviderState<'_> {
    fn var(&self, name: &str) -> Option<String> {
        match name {
            "location" => owned(&self.location),
            "workforce_pool_id" => owned(&self.workforce_pool_id),
            "provider_id" => owned(&self.provider_id),
            _ => None,
        }
    }
}

fn oidc_block() -> NestedBlock {
    NestedBlock::List(Block {
        attributes: map! {
            "issuer_uri" => attr::string(Required, "The OIDC issuer URI. Must be a valid URI using the 'https' scheme."),
            "client_id" => attr::string(Required, "The client ID. Must match the audience claim of the JWT issued by the identity provider."),
            "jwks_json" => attr::string(Optional, "OIDC JWKs in JSON String format. For details on definition of a JWK, see https:tools.ietf.org/html/rfc7517. If not set, then we use the `jwks_uri` from the discovery document fetched from the .well-known path for the `issuer_uri`. Currently, RSA and EC asymmetric keys are supported. The JWK must use following format and include only the following fields: ```{\"keys\": [{\"kty\": \"RSA/EC\", \"alg\": \"<algorithm>\", \"use\": \"sig\", \"kid\": \"<key-id>\", \"n\": \"\", \"e\": \"\", \"x\": \"\", \"y\": \"\", \"crv\": \"\"}]}```"),
        },
        blocks: map! {
            "client_secret" => NestedBlock::List(Block {
                blocks: map! {
                    "value" => NestedBlock::List(Block {
                        attributes: map! {
                            "plain_text" => attr::sensitive(attr::string(Required, "The plain text of the client secret value.")),
                            "thumbprint" => attr::string(Computed, "A thumbprint to represent the current client secret value."),
                        },
                        description: Description::plain("The value of the client secret."),
                        ..Default::default()
                    }),
                },
                description: Description::plain("The optional client secret. Required to enable Authorization Code flow for web sign-in."),
                ..Default::default()
            }),
            "web_sso_config" => NestedBlock::List(Block {
                attributes: map! {
                    "response_type" => attr::string(Required, "The Response Type to request for in the OIDC Authorization Request for web sign-in. The `CODE` Response Type is recommended to avoid the Implicit Flow, for security reasons. * CODE: The `response_type=code` selection uses the Authorization Code Flow for web sign-in. Requires a configured client secret. * ID_TOKEN: The `response_type=id_token` selection uses the Implicit Flow for web sign-in. Possible values: [\"CODE\", \"ID_TOKEN\"]"),
                    "assertion_claims_behavior" => attr::string(Required, "The behavior for how OIDC Claims are included in the `assertion` object used for attribute mapping and attribute condition. * MERGE_USER_INFO_OVER_ID_TOKEN_CLAIMS: Merge the UserInfo Endpoint Claims with ID Token Claims, preferring UserInfo Claim Values for the same Claim Name. This option is available only for the Authorization Code Flow. * ONLY_ID_TOKEN_CLAIMS: Only include ID Token Claims. Possible values: [\"MERGE_USER_INFO_OVER_ID_TOKEN_CLAIMS\", \"ONLY_ID_TOKEN_CLAIMS\"]"),
                    "additional_scopes" => attr::string_list(Optional, "Additional scopes to request for in the OIDC authentication request on top of scopes requested by default. By default, the `openid`, `profile` and `email` scopes that are supported by the identity provider are requested. Each additional scope may be at most 256 characters. A maximum of 10 additional scopes may be configured."),
                },
                description: Description::plain("Configuration for web single sign-on for the OIDC provider. Here, web sign-in refers to console sign-in and gcloud sign-in through the browser."),
                ..Default::default()
            }),
        },
        description: Description::plain("Represents an OpenId Connect 1.0 identity provider."),
        ..Default::default()
    })
}

impl WithSchema for ProviderState<'_> {
    fn schema() -> Schema {
        let attributes: HashMap<String, _> = map! {
            "id" => attr::id(),
            "name" => attr::string(Computed, "Output only. The resource name of the provider. Format: `locations/{location}/workforcePools/{workforcePoolId}/providers/{providerId}`"),
            "location" => attr::string(Required, "The location for the resource."),
            "workforce_pool_id" => attr::string(Required, "The ID to use for the pool, which becomes the final component of the resource name."),
            "provider_id" => attr::string(Required, "The ID for the provider, which becomes the final component of the resource name. This value must be 6-32 characters, and may contain the characters [a-z0-9-]. The prefix `gcp-` is reserved for use by Google, and may not be specified."),
            "display_name" => attr::string(Optional, "A user-specified display name for the provider. Cannot exceed 32 characters."),
            "description" => attr::string(Optional, "A user-specified description of the provider. Cannot exceed 256 characters."),
            "disabled" => attr::bool(Optional, "Whether the provider is disabled. You cannot use a disabled provider to exchange tokens. However, existing tokens still grant access."),
            "attribute_mapping" => attr::string_map(Optional, "Maps attributes from the authentication credentials issued by an external identity provider to Google Cloud attributes, such as `subject` and `segment`. Each key must be a string specifying the Google Cloud IAM attribute to map to."),
            "attribute_condition" => attr::string(Optional, "A Common Expression Language expression, in plain text, to restrict what otherwise valid authentication credentials issued by the provider should not be accepted."),
            "state" => attr::string(Computed, "The current state of the provider. * STATE_UNSPECIFIED: State unspecified. * ACTIVE: The provider is active and may be used to validate authentication credentials. * DELETED: The provider is soft-deleted. Soft-deleted providers are permanently deleted after approximately 30 days. You can restore a soft-deleted provider using UndeleteWorkforcePoolProvider."),
        };

        Schema {
            version: 1,
            block: Block {
                attributes,
                blocks: map! {
                    "saml" => NestedBlock::List(Block {
                        attributes: map! {
                            "idp_metadata_xml" => attr::string(Required, "SAML Identity provider configuration metadata xml doc. The xml document should comply with [SAML 2.0 specification](https://docs.oasis-open.org/security/saml/v2.0/saml-metadata-2.0-os.pdf)."),
                        },
                        description: Description::plain("Represents a SAML identity provider."),
                        ..Default::default()
                    }),
                    "oidc" => oidc_block(),
                    "timeouts" => TIMEOUTS.block(),
                },
                description: Description::plain("A configuration for an external identity provider."),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl WithValidate for ProviderState<'_> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validate_id(
            diags,
            &self.provider_id,
            &PROVIDER_ID_REGEX,
            "must contain only lowercase letters [a-z], digits [0-9], and hyphens [-], and be 6-32 characters in length",
            attr_path.clone().attribute("provider_id"),
        );
        validate_length(diags, &self.display_name, 0, 32, attr_path.clone().attribute("display_name"));
        validate_length(diags, &self.description, 0, 256, attr_path.clone().attribute("description"));
        validate_max_items(diags, &self.saml, 1, attr_path.clone().attribute("saml"));
        validate_max_items(diags, &self.oidc, 1, attr_path.clone().attribute("oidc"));
        validate_conflict(
            diags,
            ("saml", block(&self.saml).is_some()),
            ("oidc", block(&self.oidc).is_some()),
            attr_path.clone().attribute("saml"),
        );
        if let Some(oidc) = block(&self.oidc) {
            let path = attr_path.attribute("oidc").index(0);
            validate_json(diags, &oidc.jwks_json, path.clone().attribute("jwks_json"));
            validate_max_items(diags, &oidc.client_secret, 1, path.clone().attribute("client_secret"));
            validate_max_items(diags, &oidc.web_sso_config, 1, path.clone().attribute("web_sso_config"));
            if let Some(web_sso) = block(&oidc.web_sso_config) {
                let path = path.attribute("web_sso_config").index(0);
                validate_enum(
                    diags,
                    &web_sso.response_type,
                    RESPONSE_TYPES,
                    path.clone().attribute("response_type"),
                );
                validate_enum(
                    diags,
                    &web_sso.assertion_claims_behavior,
                    ASSERTION_CLAIMS_BEHAVIORS,
                    path.clone().attribute("assertion_claims_behavior"),
                );
                if let Value::Value(scopes) = &web_sso.additional_scopes {
                    if scopes.len() > 10 {
                        diags.error(
                            "Too many additional scopes",
                            format!("at most 10 additional scopes can be configured, got {}", scopes.len()),
                            path.attribute("additional_scopes"),
                        );
                    }
                }
            }
        }
        timeouts::validate(diags, &self.timeouts);
    }
}

impl WithNormalize for ProviderState<'_> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        self.id = Value::Unknown;
        self.name = Value::Unknown;
        self.state = Value::Unknown;
    }
}

fn secret_value<'b, 'a>(oidc: Option<&'b Oidc<'a>>) -> Option<&'b ClientSecretValue<'a>> {
    oidc.and_then(|oidc| block(&oidc.client_secret))
        .and_then(|secret| block(&secret.value))
}

impl<'a> ProviderState<'a> {
    /// The thumbprint is kept while the secret does not change
    fn plan_thumbprint(&mut self, prior: Option<&ProviderState<'a>>) {
        let prior = secret_value(prior.and_then(|prior| block(&prior.oidc))).cloned();
        let Value::Value(oidcs) = &mut self.oidc else {
            return;
        };
        for oidc in oidcs.iter_mut() {
            let Value::Value(oidc) = oidc else { continue };
            let Value::Value(secrets) = &mut oidc.client_secret else { continue };
            for secret in secrets.iter_mut() {
                let Value::Value(secret) = secret else { continue };
                let Value::Value(values) = &mut secret.value else { continue };
                for value in values.iter_mut() {
                    let Value::Value(value) = value else { continue };
                    value.thumbprint = match &prior {
                        Some(prior) if prior.plain_text == value.plain_text => prior.thumbprint.clone(),
                        _ => Value::Unknown,
                    };
                }
            }
        }
    }

    fn expand(&self) -> WorkforcePoolProvider {
        WorkforcePoolProvider {
            display_name: owned(&self.display_name),
            description: owned(&self.description),
            disabled: known(&self.disabled),
            attribute_mapping: string_map_of(&self.attribute_mapping),
            attribute_condition: owned(&self.attribute_condition),
            saml: block(&self.saml).map(|saml| ApiSaml {
                idp_metadata_xml: owned(&saml.idp_metadata_xml),
            }),
            oidc: block(&self.oidc).map(|oidc| ApiOidc {
                issuer_uri: owned(&oidc.issuer_uri),
                client_id: owned(&oidc.client_id),
                client_secret: block(&oidc.client_secret).map(|secret| ApiClientSecret {
                    value: block(&secret.value).map(|value| ApiClientSecretValue {
                        plain_text: owned(&value.plain_text),
                        thumbprint: None,
                    }),
                }),
                web_sso_config: block(&oidc.web_sso_config).map(|web_sso| ApiWebSsoConfig {
                    response_type: owned(&web_sso.response_type),
                    assertion_claims_behavior: owned(&web_sso.assertion_claims_behavior),
                    additional_scopes: strings(&web_sso.additional_scopes),
                }),
                jwks_json: owned(&oidc.jwks_json),
            }),
            ..Default::default()
        }
    }

    fn flatten(&mut self, provider: WorkforcePoolProvider) {
        self.name = non_empty_string(provider.name);
        self.display_name = api_string(&self.display_name, provider.display_name);
        self.description = api_string(&self.description, provider.description);
        self.disabled = api_bool(&self.disabled, provider.disabled);
        self.attribute_mapping = match (&self.attribute_mapping, provider.attribute_mapping) {
            (Value::Null, None) => Value::Null,
            (_, mapping) => string_map(Some(mapping.unwrap_or_default())),
        };
        self.attribute_condition = api_string(&self.attribute_condition, provider.attribute_condition);
        if tracked(&self.saml) {
            self.saml = to_block(provider.saml.map(|saml| Saml {
                idp_metadata_xml: non_empty_string(saml.idp_metadata_xml),
            }));
        }
        if tracked(&self.oidc) {
            let prior = block(&self.oidc).cloned().unwrap_or_default();
            self.oidc = to_block(provider.oidc.map(|oidc| flatten_oidc(&prior, oidc)));
        }
        self.state = non_empty_string(provider.state);
    }

    fn display_id(&self) -> String {
        format!(
            "IAMWorkforcePoolWorkforcePoolProvider {:?}",
            non_empty(&self.id).unwrap_or_default()
        )
    }
}

/// The API never returns the secret in plain text: it is kept from the state
fn flatten_oidc<'a>(prior: &Oidc<'a>, oidc: ApiOidc) -> Oidc<'a> {
    let prior_secret = secret_value(Some(prior)).cloned().unwrap_or_default();
    let prior_scopes = block(&prior.web_sso_config)
        .map(|web_sso| web_sso.additional_scopes.clone())
        .unwrap_or_default();
    Oidc {
        issuer_uri: non_empty_string(oidc.issuer_uri),
        client_id: non_empty_string(oidc.client_id),
        client_secret: to_block(oidc.client_secret.map(|secret| ClientSecret {
            value: to_block(secret.value.map(|value| ClientSecretValue {
                plain_text: prior_secret.plain_text.clone(),
                thumbprint: non_empty_string(value.thumbprint),
            })),
        })),
        web_sso_config: to_block(oidc.web_sso_config.map(|web_sso| WebSsoConfig {
            response_type: non_empty_string(web_sso.response_type),
            assertion_claims_behavior: non_empty_string(web_sso.assertion_claims_behavior),
            additional_scopes: match (&prior_scopes, web_sso.additional_scopes) {
                (Value::Null, None) => Value::Null,
                (_, scopes) => string_list(Some(scopes.unwrap_or_default())),
            },
        })),
        jwks_json: api_string(&prior.jwks_json, oidc.jwks_json),
    }
}

impl<T: Transport> WorkforcePoolProviderResource<T> {
    async fn refresh<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: ProviderState<'a>,
    ) -> Option<Option<ProviderState<'a>>> {
        let client = self.provider.client(diags).await?;
        let url = replace_vars(&client.config, PROVIDER_URL, &state)
            .or_report(diags, "Error reading WorkforcePoolProvider")?;

        let provider = handle_not_found(
            client
                .fetch::<WorkforcePoolProvider>(
                    ApiRequest::get(url).with_billing_project(client.config.billing_project.clone()),
                )
                .await,
            diags,
            &state.display_id(),
        )?;
        let provider = provider.filter(|provider| provider.state.as_deref() != Some(DELETED));
        if provider.is_none() {
            debug!("Removing {} because it no longer exists", state.display_id());
        }
        Some(provider.map(|provider| {
            state.flatten(provider);
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
impl<T: Transport> Resource for WorkforcePoolProviderResource<T> {
    type State<'a> = Value<ProviderState<'a>>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderState::schema())
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
        state.plan_thumbprint(None);
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
        state.plan_thumbprint(Some(&prior));

        let mut replace = vec![];
        force_new(&mut replace, "location", &prior.location, &state.location);
        force_new(&mut replace, "workforce_pool_id", &prior.workforce_pool_id, &state.workforce_pool_id);
        force_new(&mut replace, "provider_id", &prior.provider_id, &state.provider_id);

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
            "{{IAMWorkforcePoolBasePath}}locations/{{location}}/workforcePools/{{workforce_pool_id}}/providers?workforcePoolProviderId={{provider_id}}",
            &state,
        )
        .or_report(diags, "Error creating WorkforcePoolProvider")?;
        let body = serde_json::to_value(state.expand())
            .or_report(diags, "Error creating WorkforcePoolProvider")?;

        debug!("Creating new WorkforcePoolProvider {:?}", state.provider_id);
        self.wait_on(
            diags,
            ApiRequest::post(url, body),
            "creating WorkforcePoolProvider",
            TIMEOUTS.create(&state.timeouts),
        )
        .await?;

        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, PROVIDER_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));
        debug!("Finished creating WorkforcePoolProvider {:?}", state.id);

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("WorkforcePoolProvider disappeared right after its creation");
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
        mask.push_if_changed("attributeMapping", &prior.attribute_mapping, &state.attribute_mapping);
        mask.push_if_changed(
            "attributeCondition",
            &prior.attribute_condition,
            &state.attribute_condition,
        );
        mask.push_if_changed("saml", &prior.saml, &state.saml);
        mask.push_if_changed("oidc", &prior.oidc, &state.oidc);

        if !mask.is_empty() {
            let url = replace_vars(&client.config, PROVIDER_URL, &state)
                .and_then(|url| add_query_params(&url, &[("updateMask", &mask.to_string())]))
                .or_report(diags, "Error updating WorkforcePoolProvider")?;
            let body = serde_json::to_value(state.expand())
                .or_report(diags, "Error updating WorkforcePoolProvider")?;

            debug!("Updating WorkforcePoolProvider {:?} ({mask})", state.id);
            self.wait_on(
                diags,
                ApiRequest::patch(url, body),
                "updating WorkforcePoolProvider",
                TIMEOUTS.update(&state.timeouts),
            )
            .await?;
        }

        match self.refresh(diags, state).await? {
            Some(state) => Some((Value::Value(state), private_state)),
            None => {
                diags.root_error_short("WorkforcePoolProvider disappeared during its update");
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
        let url = replace_vars(&client.config, PROVIDER_URL, &state)
            .or_report(diags, "Error deleting WorkforcePoolProvider")?;
        let timeout = TIMEOUTS.delete(&state.timeouts);

        debug!("Deleting WorkforcePoolProvider {:?}", state.id);
        let result = client
            .send_and_wait(
                ApiRequest::delete(url)
                    .with_billing_project(client.config.billing_project.clone())
                    .with_timeout(timeout),
                OperationWait {
                    service: Service::IamWorkforcePool,
                    billing_project: client.config.billing_project.clone(),
                    activity: "Deleting WorkforcePoolProvider",
                    timeout,
                },
            )
            .await;
        match result {
            Err(err) if err.is_not_found() => {
                warn!("{} was already deleted", state.display_id());
            }
            result => {
                result.or_report(diags, "Error deleting WorkforcePoolProvider")?;
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
            .or_report(diags, "Error importing WorkforcePoolProvider")?;

        let mut state = ProviderState {
            location: string(fields.take("location")),
            workforce_pool_id: string(fields.take("workforce_pool_id")),
            provider_id: string(fields.take("provider_id")),
            ..Default::default()
        };
        state.id = Value::Value(Cow::Owned(
            replace_vars(&client.config, PROVIDER_ID, &state)
                .or_report(diags, "Error constructing id")?,
        ));
        Some((Value::Value(state), Default::default()))
    }
}
