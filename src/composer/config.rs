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

//! `config` block of an environment

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tf_provider::schema::NestedBlock;
use tf_provider::value::{Value, ValueList, ValueMap, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Block, Description, Diagnostics};

use crate::tpgresource::schema::{self as attr, Computed, Optional, OptionalComputed, Required};
use crate::tpgresource::self_link::{
    compare_self_link_or_resource_name, keep_equivalent, name_from_self_link, relative_path,
};
use crate::tpgresource::validation::{is_set, validate_conflict, validate_max_items, validate_regex};
use crate::utils::{
    as_str, block, known, non_empty, non_empty_string, owned, set_strings, string_map,
    string_map_of, string_set, to_block, tracked, ValueBool, ValueStringSet,
};

use super::image_version::{image_versions_equivalent, IMAGE_VERSION};

const DEFAULT_MASTER_IPV4_CIDR_BLOCK: &str = "172.16.0.0/28";
const SCOPE_PREFIX: &str = "https://www.googleapis.com/auth/";
const RESERVED_ENV_VARIABLES: &[&str] = &[
    "AIRFLOW_HOME",
    "C_FORCE_ROOT",
    "CONTAINER_NAME",
    "DAGS_FOLDER",
    "GCP_PROJECT",
    "GCS_BUCKET",
    "GKE_CLUSTER_NAME",
    "SQL_DATABASE",
    "SQL_INSTANCE",
    "SQL_PASSWORD",
    "SQL_PROJECT",
    "SQL_REGION",
    "SQL_USER",
];

lazy_static! {
    static ref ENV_VARIABLE_NAME: Regex =
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("env variable regex is valid");
    static ref AIRFLOW_CONFIG_ENV_VARIABLE: Regex =
        Regex::new(r"^AIRFLOW__[A-Z0-9_]+__[A-Z0-9_]+$").expect("airflow config regex is valid");
    static ref SERVICE_ACCOUNT: Regex = Regex::new(
        r"^(?:[^@/\s]+@[^@/\s]+|projects/[^/]+/serviceAccounts/[^/]+)$"
    )
    .expect("service account regex is valid");
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig<'a> {
    pub node_count: ValueNumber,
    pub node_config: ValueList<Value<NodeConfig<'a>>>,
    pub software_config: ValueList<Value<SoftwareConfig<'a>>>,
    pub private_environment_config: ValueList<Value<PrivateEnvironmentConfig<'a>>>,
    pub airflow_uri: ValueString<'a>,
    pub dag_gcs_prefix: ValueString<'a>,
    pub gke_cluster: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig<'a> {
    pub zone: ValueString<'a>,
    pub machine_type: ValueString<'a>,
    pub network: ValueString<'a>,
    pub subnetwork: ValueString<'a>,
    pub disk_size_gb: ValueNumber,
    pub oauth_scopes: ValueStringSet<'a>,
    pub service_account: ValueString<'a>,
    pub tags: ValueStringSet<'a>,
    pub ip_allocation_policy: ValueList<Value<IpAllocationPolicy<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAllocationPolicy<'a> {
    pub use_ip_aliases: ValueBool,
    pub cluster_secondary_range_name: ValueString<'a>,
    pub services_secondary_range_name: ValueString<'a>,
    pub cluster_ipv4_cidr_block: ValueString<'a>,
    pub services_ipv4_cidr_block: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftwareConfig<'a> {
    pub airflow_config_overrides: ValueMap<'a, ValueString<'a>>,
    pub pypi_packages: ValueMap<'a, ValueString<'a>>,
    pub env_variables: ValueMap<'a, ValueString<'a>>,
    pub image_version: ValueString<'a>,
    pub python_version: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateEnvironmentConfig<'a> {
    pub enable_private_endpoint: ValueBool,
    pub master_ipv4_cidr_block: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct ApiEnvironmentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_config: Option<ApiNodeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_config: Option<ApiSoftwareConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_environment_config: Option<ApiPrivateEnvironmentConfig>,
    #[serde(skip_serializing)]
    pub airflow_uri: Option<String>,
    #[serde(skip_serializing)]
    pub dag_gcs_prefix: Option<String>,
    #[serde(skip_serializing)]
    pub gke_cluster: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct ApiNodeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_allocation_policy: Option<ApiIpAllocationPolicy>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct ApiIpAllocationPolicy {
    pub use_ip_aliases: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_secondary_range_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services_secondary_range_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_ipv4_cidr_block: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services_ipv4_cidr_block: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct ApiSoftwareConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airflow_config_overrides: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pypi_packages: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_variables: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct ApiPrivateEnvironmentConfig {
    pub enable_private_endpoint: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_ipv4_cidr_block: Option<String>,
}

pub(super) fn config_block() -> NestedBlock {
    NestedBlock::List(Block {
        attributes: map! {
            "node_count" => attr::number(OptionalComputed, "The number of nodes in the Kubernetes Engine cluster that will be used to run this environment. At least 3."),
            "airflow_uri" => attr::string(Computed, "The URI of the Apache Airflow Web UI hosted within this environment."),
            "dag_gcs_prefix" => attr::string(Computed, "The Cloud Storage prefix of the DAGs for this environment."),
            "gke_cluster" => attr::string(Computed, "The Kubernetes Engine cluster used to run this environment."),
        },
        blocks: map! {
            "node_config" => NestedBlock::List(Block {
                attributes: map! {
                    "zone" => attr::string(Required, "The Compute Engine zone in which to deploy the VMs running the Apache Airflow software, specified as the zone name or relative resource name (e.g. \"projects/{project}/zones/{zone}\"). Must belong to the enclosing environment's project and region."),
                    "machine_type" => attr::string(OptionalComputed, "The Compute Engine machine type used for cluster instances, specified as a name or relative resource name."),
                    "network" => attr::string(OptionalComputed, "The Compute Engine network to be used for machine communications, specified as a self-link, relative resource name (e.g. \"projects/{project}/global/networks/{network}\"), or by name."),
                    "subnetwork" => attr::string(OptionalComputed, "The Compute Engine subnetwork to be used for machine communications, specified as a self-link, relative resource name (e.g. \"projects/{project}/regions/{region}/subnetworks/{subnetwork}\"), or by name. If subnetwork is provided, network must also be provided and the subnetwork must belong to the enclosing environment's project and region."),
                    "disk_size_gb" => attr::number(OptionalComputed, "The disk size in GB used for node VMs. Minimum size is 20GB."),
                    "oauth_scopes" => attr::string_set(OptionalComputed, "The set of Google API scopes to be made available on all node VMs. Cannot be updated."),
                    "service_account" => attr::string(OptionalComputed, "The Google Cloud Platform Service Account to be used by the node VMs. If a service account is not specified, the \"default\" Compute Engine service account is used."),
                    "tags" => attr::string_set(Optional, "The list of instance tags applied to all node VMs. Tags are used to identify valid sources or targets for network firewalls."),
                },
                blocks: map! {
                    "ip_allocation_policy" => NestedBlock::List(Block {
                        attributes: map! {
                            "use_ip_aliases" => attr::bool(Required, "Whether or not to enable Alias IPs in the GKE cluster. If true, a VPC-native cluster is created."),
                            "cluster_secondary_range_name" => attr::string(Optional, "The name of the cluster's secondary range used to allocate IP addresses to pods."),
                            "services_secondary_range_name" => attr::string(Optional, "The name of the services' secondary range used to allocate IP addresses to the cluster."),
                            "cluster_ipv4_cidr_block" => attr::string(Optional, "The IP address range used to allocate IP addresses to pods in the cluster."),
                            "services_ipv4_cidr_block" => attr::string(Optional, "The IP address range used to allocate IP addresses in this cluster."),
                        },
                        description: Description::plain("Configuration for controlling how IPs are allocated in the GKE cluster."),
                        ..Default::default()
                    }),
                },
                description: Description::plain("The configuration used for the Kubernetes Engine cluster."),
                ..Default::default()
            }),
            "software_config" => NestedBlock::List(Block {
                attributes: map! {
                    "airflow_config_overrides" => attr::string_map(Optional, "Apache Airflow configuration properties to override. Property keys contain the section and property names, separated by a hyphen, for example \"core-dags_are_paused_at_creation\"."),
                    "pypi_packages" => attr::string_map(Optional, "Custom Python Package Index (PyPI) packages to be installed in the environment. Keys refer to the lowercase package name (e.g. \"numpy\")."),
                    "env_variables" => attr::string_map(Optional, "Additional environment variables to provide to the Apache Airflow scheduler, worker, and webserver processes."),
                    "image_version" => attr::string(OptionalComputed, "The version of the software running in the environment. This encapsulates both the version of Cloud Composer functionality and the version of Apache Airflow. It must match the regular expression composer-([0-9]+(\\.[0-9]+\\.[0-9]+(-preview\\.[0-9]+)?)?|latest)-airflow-([0-9]+(\\.[0-9]+(\\.[0-9]+)?)?)."),
                    "python_version" => attr::string(OptionalComputed, "The major version of Python used to run the Apache Airflow scheduler, worker, and webserver processes. Can be set to '2' or '3'. Cannot be updated."),
                },
                description: Description::plain("The configuration settings for software inside the environment."),
                ..Default::default()
            }),
            "private_environment_config" => NestedBlock::List(Block {
                attributes: map! {
                    "enable_private_endpoint" => attr::bool(OptionalComputed, "If true, access to the public endpoint of the GKE cluster is denied. Defaults to true."),
                    "master_ipv4_cidr_block" => attr::string(OptionalComputed, "The IP range in CIDR notation to use for the hosted master network. Defaults to 172.16.0.0/28."),
                },
                description: Description::plain("The configuration used for the Private IP Cloud Composer environment."),
                ..Default::default()
            }),
        },
        description: Description::plain("Configuration parameters for this environment."),
        ..Default::default()
    })
}

pub(super) fn validate(diags: &mut Diagnostics, config: &EnvironmentConfig, path: AttributePath) {
    if let Value::Value(node_count) = config.node_count {
        if node_count < 3 {
            diags.error(
                "Invalid node_count",
                format!("expected node_count to be at least (3), got {node_count}"),
                path.clone().attribute("node_count"),
            );
        }
    }
    validate_max_items(diags, &config.node_config, 1, path.clone().attribute("node_config"));
    validate_max_items(diags, &config.software_config, 1, path.clone().attribute("software_config"));
    validate_max_items(
        diags,
        &config.private_environment_config,
        1,
        path.clone().attribute("private_environment_config"),
    );

    if let Some(node_config) = block(&config.node_config) {
        let path = path.clone().attribute("node_config").index(0);
        validate_regex(
            diags,
            &node_config.service_account,
            &SERVICE_ACCOUNT,
            path.clone().attribute("service_account"),
        );
        validate_max_items(
            diags,
            &node_config.ip_allocation_policy,
            1,
            path.clone().attribute("ip_allocation_policy"),
        );
        if let Some(policy) = block(&node_config.ip_allocation_policy) {
            let path = path.attribute("ip_allocation_policy").index(0);
            validate_conflict(
                diags,
                ("cluster_secondary_range_name", is_set(&policy.cluster_secondary_range_name)),
                ("cluster_ipv4_cidr_block", is_set(&policy.cluster_ipv4_cidr_block)),
                path.clone().attribute("cluster_secondary_range_name"),
            );
            validate_conflict(
                diags,
                ("services_secondary_range_name", is_set(&policy.services_secondary_range_name)),
                ("services_ipv4_cidr_block", is_set(&policy.services_ipv4_cidr_block)),
                path.attribute("services_secondary_range_name"),
            );
        }
    }

    if let Some(software_config) = block(&config.software_config) {
        let path = path.attribute("software_config").index(0);
        validate_regex(
            diags,
            &software_config.image_version,
            &IMAGE_VERSION,
            path.clone().attribute("image_version"),
        );
        if let Value::Value(packages) = &software_config.pypi_packages {
            for name in packages.keys() {
                if name.to_lowercase() != **name {
                    diags.error(
                        "Invalid PyPI package name",
                        format!("PyPI package {name:?} can only contain lowercase characters."),
                        path.clone().attribute("pypi_packages").key(name.to_string()),
                    );
                }
            }
        }
        if let Value::Value(variables) = &software_config.env_variables {
            for name in variables.keys() {
                if let Err(err) = validate_env_variable(name) {
                    diags.error(
                        "Invalid environment variable",
                        err,
                        path.clone().attribute("env_variables").key(name.to_string()),
                    );
                }
            }
        }
    }
}

fn validate_env_variable(name: &str) -> Result<(), String> {
    if !ENV_VARIABLE_NAME.is_match(name) {
        return Err(format!(
            "env_variable {name:?} must match regex {:?}",
            ENV_VARIABLE_NAME.as_str()
        ));
    }
    if RESERVED_ENV_VARIABLES.contains(&name) {
        return Err(format!("env_variable {name:?} is a reserved name and cannot be used"));
    }
    if AIRFLOW_CONFIG_ENV_VARIABLE.is_match(name) {
        return Err(format!(
            "env_variable {name:?} cannot be used: Airflow configuration properties are set through airflow_config_overrides"
        ));
    }
    Ok(())
}

/// `planned` takes the prior value when it is not configured, or becomes
/// unknown when there is none.
fn inherit<T: Clone>(planned: &mut Value<T>, prior: Option<&Value<T>>) {
    if planned.is_null() {
        *planned = prior.cloned().unwrap_or(Value::Unknown);
    }
}

fn plan_block<T, F>(planned: &mut ValueList<Value<T>>, prior: Option<&ValueList<Value<T>>>, plan: F)
where
    F: Fn(&mut T, Option<&T>),
{
    let prior = prior.and_then(block);
    if let Value::Value(items) = planned {
        for item in items.iter_mut() {
            if let Value::Value(item) = item {
                plan(item, prior);
            }
        }
    }
}

fn plan_node_config<'a>(planned: &mut NodeConfig<'a>, prior: Option<&NodeConfig<'a>>) {
    inherit(&mut planned.machine_type, prior.map(|prior| &prior.machine_type));
    inherit(&mut planned.network, prior.map(|prior| &prior.network));
    inherit(&mut planned.subnetwork, prior.map(|prior| &prior.subnetwork));
    inherit(&mut planned.disk_size_gb, prior.map(|prior| &prior.disk_size_gb));
    inherit(&mut planned.oauth_scopes, prior.map(|prior| &prior.oauth_scopes));
    inherit(&mut planned.service_account, prior.map(|prior| &prior.service_account));
}

fn plan_software_config<'a>(planned: &mut SoftwareConfig<'a>, prior: Option<&SoftwareConfig<'a>>) {
    inherit(&mut planned.image_version, prior.map(|prior| &prior.image_version));
    inherit(&mut planned.python_version, prior.map(|prior| &prior.python_version));
    if let (Some(prior), Value::Value(new)) = (prior, &planned.image_version) {
        if let Value::Value(old) = &prior.image_version {
            if image_versions_equivalent(old, new) {
                planned.image_version = prior.image_version.clone();
            }
        }
    }
}

fn plan_private_environment_config<'a>(
    planned: &mut PrivateEnvironmentConfig<'a>,
    _prior: Option<&PrivateEnvironmentConfig<'a>>,
) {
    if planned.enable_private_endpoint.is_null() {
        planned.enable_private_endpoint = Value::Value(true);
    }
    if planned.master_ipv4_cidr_block.is_null() {
        planned.master_ipv4_cidr_block = Value::Value(DEFAULT_MASTER_IPV4_CIDR_BLOCK.into());
    }
}

/// Complete a planned config from the prior one (`None` at creation), and
/// record the attributes forcing a replacement.
pub(super) fn plan<'a>(
    planned: &mut EnvironmentConfig<'a>,
    prior: Option<&EnvironmentConfig<'a>>,
    replace: &mut Vec<AttributePath>,
) {
    inherit(&mut planned.node_count, prior.map(|prior| &prior.node_count));
    inherit(&mut planned.airflow_uri, prior.map(|prior| &prior.airflow_uri));
    inherit(&mut planned.dag_gcs_prefix, prior.map(|prior| &prior.dag_gcs_prefix));
    inherit(&mut planned.gke_cluster, prior.map(|prior| &prior.gke_cluster));
    plan_block(
        &mut planned.node_config,
        prior.map(|prior| &prior.node_config),
        plan_node_config,
    );
    plan_block(
        &mut planned.software_config,
        prior.map(|prior| &prior.software_config),
        plan_software_config,
    );
    plan_block(
        &mut planned.private_environment_config,
        prior.map(|prior| &prior.private_environment_config),
        plan_private_environment_config,
    );

    let Some(prior) = prior else {
        return;
    };
    let path = AttributePath::new("config").index(0);
    if prior.node_config != planned.node_config {
        replace.push(path.clone().attribute("node_config"));
    }
    if prior.private_environment_config != planned.private_environment_config {
        replace.push(path.clone().attribute("private_environment_config"));
    }
    let python_version = |config: &EnvironmentConfig<'a>| {
        block(&config.software_config).map(|software| software.python_version.clone())
    };
    if python_version(prior) != python_version(&*planned) {
        replace.push(
            path.attribute("software_config")
                .index(0)
                .attribute("python_version"),
        );
    }
}

/// Scopes may be given without the `https://www.googleapis.com/auth/` prefix
fn canonical_scope(scope: &str) -> String {
    if scope.contains("://") {
        scope.to_owned()
    } else {
        format!("{SCOPE_PREFIX}{scope}")
    }
}

/// Project, region and zone where relative names are resolved
pub(super) struct Location<'l> {
    pub project: &'l str,
    pub region: &'l str,
}

fn expand_zone(zone: &str, location: &Location) -> String {
    format!("projects/{}/zones/{}", location.project, name_from_self_link(zone))
}

fn expand_machine_type(machine_type: &str, zone: &str, location: &Location) -> Result<String, String> {
    let zone = name_from_self_link(zone);
    if let Some(start) = machine_type.find("zones/") {
        let machine_zone = machine_type[start + "zones/".len()..]
            .split('/')
            .next()
            .unwrap_or_default();
        if machine_zone != zone {
            return Err(format!(
                "node_config machine_type {machine_type:?} must be in the same zone {zone:?} as the nodes"
            ));
        }
    }
    Ok(format!(
        "projects/{}/zones/{zone}/machineTypes/{}",
        location.project,
        name_from_self_link(machine_type)
    ))
}

fn expand_network(network: &str, location: &Location) -> String {
    match relative_path(network) {
        Some(path) => path.to_owned(),
        None => format!("projects/{}/global/networks/{network}", location.project),
    }
}

fn expand_subnetwork(subnetwork: &str, location: &Location) -> String {
    match relative_path(subnetwork) {
        Some(path) => path.to_owned(),
        None => format!(
            "projects/{}/regions/{}/subnetworks/{subnetwork}",
            location.project, location.region
        ),
    }
}

fn expand_node_config(node_config: &NodeConfig, location: &Location) -> Result<ApiNodeConfig, String> {
    let zone = non_empty(&node_config.zone).unwrap_or_default();
    Ok(ApiNodeConfig {
        location: non_empty(&node_config.zone).map(|zone| expand_zone(zone, location)),
        machine_type: non_empty(&node_config.machine_type)
            .map(|machine_type| expand_machine_type(machine_type, zone, location))
            .transpose()?,
        network: non_empty(&node_config.network).map(|network| expand_network(network, location)),
        subnetwork: non_empty(&node_config.subnetwork)
            .map(|subnetwork| expand_subnetwork(subnetwork, location)),
        disk_size_gb: known(&node_config.disk_size_gb),
        oauth_scopes: set_strings(&node_config.oauth_scopes)
            .map(|scopes| scopes.iter().map(|scope| canonical_scope(scope)).collect()),
        service_account: owned(&node_config.service_account),
        tags: set_strings(&node_config.tags),
        ip_allocation_policy: block(&node_config.ip_allocation_policy).map(|policy| {
            ApiIpAllocationPolicy {
                use_ip_aliases: known(&policy.use_ip_aliases).unwrap_or_default(),
                cluster_secondary_range_name: owned(&policy.cluster_secondary_range_name),
                services_secondary_range_name: owned(&policy.services_secondary_range_name),
                cluster_ipv4_cidr_block: owned(&policy.cluster_ipv4_cidr_block),
                services_ipv4_cidr_block: owned(&policy.services_ipv4_cidr_block),
            }
        }),
    })
}

pub(super) fn expand_software_config(software_config: &SoftwareConfig) -> ApiSoftwareConfig {
    ApiSoftwareConfig {
        image_version: owned(&software_config.image_version),
        airflow_config_overrides: string_map_of(&software_config.airflow_config_overrides),
        pypi_packages: string_map_of(&software_config.pypi_packages),
        env_variables: string_map_of(&software_config.env_variables),
        python_version: owned(&software_config.python_version),
    }
}

pub(super) fn expand(
    config: &EnvironmentConfig,
    location: &Location,
) -> Result<ApiEnvironmentConfig, String> {
    Ok(ApiEnvironmentConfig {
        node_count: known(&config.node_count),
        node_config: block(&config.node_config)
            .map(|node_config| expand_node_config(node_config, location))
            .transpose()?,
        software_config: block(&config.software_config).map(expand_software_config),
        private_environment_config: block(&config.private_environment_config).map(|private| {
            ApiPrivateEnvironmentConfig {
                enable_private_endpoint: known(&private.enable_private_endpoint).unwrap_or(true),
                master_ipv4_cidr_block: owned(&private.master_ipv4_cidr_block),
            }
        }),
        ..Default::default()
    })
}

/// Scopes read back, in the configured spelling when the sets match
fn flatten_scopes<'a>(prior: &ValueStringSet<'a>, api: Option<Vec<String>>) -> ValueStringSet<'a> {
    if let (Some(configured), Some(api)) = (set_strings(prior), api.as_ref()) {
        let mut configured: Vec<String> = configured.iter().map(|s| canonical_scope(s)).collect();
        let mut api = api.clone();
        configured.sort();
        api.sort();
        if configured == api {
            return prior.clone();
        }
    }
    string_set(api)
}

fn flatten_node_config<'a>(prior: &NodeConfig<'a>, api: ApiNodeConfig) -> NodeConfig<'a> {
    NodeConfig {
        zone: keep_equivalent(&prior.zone, api.location, compare_self_link_or_resource_name),
        machine_type: keep_equivalent(
            &prior.machine_type,
            api.machine_type,
            compare_self_link_or_resource_name,
        ),
        network: keep_equivalent(&prior.network, api.network, compare_self_link_or_resource_name),
        subnetwork: keep_equivalent(
            &prior.subnetwork,
            api.subnetwork,
            compare_self_link_or_resource_name,
        ),
        disk_size_gb: api.disk_size_gb.map_or(Value::Null, Value::Value),
        oauth_scopes: flatten_scopes(&prior.oauth_scopes, api.oauth_scopes),
        service_account: keep_equivalent(
            &prior.service_account,
            api.service_account,
            compare_self_link_or_resource_name,
        ),
        tags: match (&prior.tags, api.tags) {
            (Value::Null, None) => Value::Null,
            (Value::Null, Some(tags)) if tags.is_empty() => Value::Null,
            (_, tags) => string_set(Some(tags.unwrap_or_default())),
        },
        ip_allocation_policy: if tracked(&prior.ip_allocation_policy) {
            to_block(api.ip_allocation_policy.map(|policy| IpAllocationPolicy {
                use_ip_aliases: Value::Value(policy.use_ip_aliases),
                cluster_secondary_range_name: non_empty_string(policy.cluster_secondary_range_name),
                services_secondary_range_name: non_empty_string(policy.services_secondary_range_name),
                cluster_ipv4_cidr_block: non_empty_string(policy.cluster_ipv4_cidr_block),
                services_ipv4_cidr_block: non_empty_string(policy.services_ipv4_cidr_block),
            }))
        } else {
            prior.ip_allocation_policy.clone()
        },
    }
}

/// Maps are non-authoritative when unset in the configuration
fn flatten_map<'a>(
    prior: &ValueMap<'a, ValueString<'a>>,
    api: Option<BTreeMap<String, String>>,
) -> ValueMap<'a, ValueString<'a>> {
    match (prior, api) {
        (Value::Null, None) => Value::Null,
        (Value::Null, Some(api)) if api.is_empty() => Value::Null,
        (_, api) => string_map(Some(api.unwrap_or_default())),
    }
}

fn flatten_software_config<'a>(prior: &SoftwareConfig<'a>, api: ApiSoftwareConfig) -> SoftwareConfig<'a> {
    let image_version = match (as_str(&prior.image_version), api.image_version) {
        (Some(old), Some(new)) if image_versions_equivalent(old, &new) => prior.image_version.clone(),
        (_, new) => non_empty_string(new),
    };
    SoftwareConfig {
        airflow_config_overrides: flatten_map(
            &prior.airflow_config_overrides,
            api.airflow_config_overrides,
        ),
        pypi_packages: flatten_map(&prior.pypi_packages, api.pypi_packages),
        env_variables: flatten_map(&prior.env_variables, api.env_variables),
        image_version,
        python_version: non_empty_string(api.python_version),
    }
}

pub(super) fn flatten<'a>(prior: &EnvironmentConfig<'a>, api: ApiEnvironmentConfig) -> EnvironmentConfig<'a> {
    let prior_node_config = block(&prior.node_config).cloned().unwrap_or_default();
    let prior_software_config = block(&prior.software_config).cloned().unwrap_or_default();

    EnvironmentConfig {
        node_count: api.node_count.map_or(Value::Null, Value::Value),
        node_config: if tracked(&prior.node_config) {
            to_block(
                api.node_config
                    .map(|node_config| flatten_node_config(&prior_node_config, node_config)),
            )
        } else {
            prior.node_config.clone()
        },
        software_config: if tracked(&prior.software_config) {
            to_block(
                api.software_config
                    .map(|software| flatten_software_config(&prior_software_config, software)),
            )
        } else {
            prior.software_config.clone()
        },
        private_environment_config: if tracked(&prior.private_environment_config) {
            to_block(api.private_environment_config.map(|private| PrivateEnvironmentConfig {
                enable_private_endpoint: Value::Value(private.enable_private_endpoint),
                master_ipv4_cidr_block: non_empty_string(private.master_ipv4_cidr_block),
            }))
        } else {
            prior.private_environment_config.clone()
        },
        airflow_uri: non_empty_string(api.airflow_uri),
        dag_gcs_prefix: non_empty_string(api.dag_gcs_prefix),
        gke_cluster: non_empty_string(api.gke_cluster),
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use pretty_assertions::assert_eq;

    use super::*;

    fn string(value: &str) -> ValueString<'static> {
        Value::Value(Cow::Owned(value.to_owned()))
    }

    fn location() -> Location<'static> {
        Location {
            project: "my-project",
            region: "us-central1",
        }
    }

    #[test]
    fn env_variables() {
        assert!(validate_env_variable("MY_VAR").is_ok());
        assert!(validate_env_variable("1VAR").is_err());
        assert!(validate_env_variable("SQL_USER").is_err());
        assert!(validate_env_variable("AIRFLOW__CORE__PARALLELISM").is_err());
    }

    #[test]
    fn validation_reports_every_problem() {
        let config = EnvironmentConfig {
            node_count: Value::Value(2),
            software_config: to_block(Some(SoftwareConfig {
                pypi_packages: string_map(Some([("NumPy".to_owned(), "".to_owned())].into())),
                image_version: string("airflow-2"),
                ..Default::default()
            })),
            node_config: to_block(Some(NodeConfig {
                zone: string("us-central1-a"),
                ip_allocation_policy: to_block(Some(IpAllocationPolicy {
                    use_ip_aliases: Value::Value(true),
                    cluster_secondary_range_name: string("pods"),
                    cluster_ipv4_cidr_block: string("10.0.0.0/16"),
                    ..Default::default()
                })),
                ..Default::default()
            })),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        validate(&mut diags, &config, AttributePath::new("config").index(0));
        assert_eq!(diags.errors.len(), 4);
    }

    #[test]
    fn node_config_links() {
        let node_config = NodeConfig {
            zone: string("us-central1-a"),
            machine_type: string("n1-standard-1"),
            network: string("default"),
            subnetwork: string("projects/my-project/regions/us-central1/subnetworks/composer"),
            oauth_scopes: string_set(Some(vec!["cloud-platform".to_owned()])),
            ..Default::default()
        };
        let api = expand_node_config(&node_config, &location()).unwrap();
        assert_eq!(api.location.as_deref(), Some("projects/my-project/zones/us-central1-a"));
        assert_eq!(
            api.machine_type.as_deref(),
            Some("projects/my-project/zones/us-central1-a/machineTypes/n1-standard-1")
        );
        assert_eq!(api.network.as_deref(), Some("projects/my-project/global/networks/default"));
        assert_eq!(
            api.subnetwork.as_deref(),
            Some("projects/my-project/regions/us-central1/subnetworks/composer")
        );
        assert_eq!(
            api.oauth_scopes,
            Some(vec!["https://www.googleapis.com/auth/cloud-platform".to_owned()])
        );

        let flattened = flatten_node_config(&node_config, api);
        assert_eq!(flattened.zone, node_config.zone);
        assert_eq!(flattened.machine_type, node_config.machine_type);
        assert_eq!(flattened.network, node_config.network);
        assert_eq!(flattened.oauth_scopes, node_config.oauth_scopes);
    }

    #[test]
    fn machine_type_zone_must_match() {
        let err = expand_machine_type(
            "projects/my-project/zones/us-east1-b/machineTypes/n1-standard-1",
            "us-central1-a",
            &location(),
        )
        .unwrap_err();
        assert!(err.contains("same zone"));
    }

    #[test]
    fn plan_fills_defaults_and_detects_replacements() {
        let mut planned = EnvironmentConfig {
            private_environment_config: to_block(Some(PrivateEnvironmentConfig::default())),
            software_config: to_block(Some(SoftwareConfig {
                image_version: string("composer-1-airflow-2"),
                ..Default::default()
            })),
            ..Default::default()
        };
        let mut replace = vec![];
        plan(&mut planned, None, &mut replace);
        assert_eq!(planned.node_count, Value::Unknown);
        assert_eq!(planned.airflow_uri, Value::Unknown);
        let private = block(&planned.private_environment_config).unwrap();
        assert_eq!(private.enable_private_endpoint, Value::Value(true));
        assert_eq!(private.master_ipv4_cidr_block, string("172.16.0.0/28"));

        let mut prior = planned.clone();
        prior.node_count = Value::Value(3);
        prior.software_config = to_block(Some(SoftwareConfig {
            image_version: string("composer-1.20.12-airflow-2.4.3"),
            python_version: string("3"),
            ..Default::default()
        }));
        let mut proposed = prior.clone();
        proposed.software_config = to_block(Some(SoftwareConfig {
            image_version: string("composer-1-airflow-2"),
            python_version: string("2"),
            ..Default::default()
        }));
        plan(&mut proposed, Some(&prior), &mut replace);
        let software = block(&proposed.software_config).unwrap();
        assert_eq!(software.image_version, string("composer-1.20.12-airflow-2.4.3"));
        assert_eq!(replace.len(), 1);
    }

    #[test]
    fn unconfigured_maps_stay_null() {
        assert_eq!(flatten_map(&Value::Null, Some(BTreeMap::new())), Value::Null);
        assert_eq!(
            flatten_map(&Value::Value(Default::default()), None),
            Value::Value(Default::default())
        );
    }
}
