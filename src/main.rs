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

use anyhow::Result;
use tf_provider::serve;
use tracing_subscriber::EnvFilter;

use crate::google_provider::GoogleProvider;

mod appengine;
mod client_config;
mod composer;
mod google_provider;
mod iamworkforcepool;
mod networkconnectivity;
mod securitycenter;
mod securitycenterv2;
mod tpgresource;
mod transport;
mod utils;

/// Terraform log levels are mapped onto tracing directives.
/// stdout carries the plugin handshake, so logs go to stderr.
fn init_logging() {
    let filter = match std::env::var("TF_LOG_PROVIDER") {
        Ok(level) if !level.is_empty() => EnvFilter::new(level.to_lowercase()),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    serve("google", GoogleProvider::default()).await
}
