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

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use super::auth::{Credentials, TokenSource};
use super::{ApiError, ApiRequest, Config, Transport};

/// Transport sending requests to Google APIs over HTTPS
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    tokens: TokenSource,
    user_agent: String,
    user_project_override: bool,
    request_reason: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            tokens: TokenSource::new(credentials, config.scopes.clone(), http.clone()),
            http,
            user_agent: config.user_agent.clone(),
            user_project_override: config.user_project_override,
            request_reason: config.request_reason.clone(),
        })
    }
}

fn network_error(err: reqwest::Error) -> ApiError {
    ApiError::Network {
        retryable: err.is_timeout() || err.is_connect(),
        message: err.to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<serde_json::Value, ApiError> {
        let token = self.tokens.token().await?;

        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .bearer_auth(token)
            .header(USER_AGENT, &self.user_agent)
            .header(CONTENT_TYPE, "application/json");
        if self.user_project_override {
            if let Some(project) = &request.billing_project {
                builder = builder.header("X-Goog-User-Project", project);
            }
        }
        if let Some(reason) = &self.request_reason {
            builder = builder.header("X-Goog-Request-Reason", reason);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!("{} {}", request.method, request.url);
        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        let text = response.text().await.map_err(network_error)?;
        debug!("{} {} -> {}", request.method, request.url, status);

        if !status.is_success() {
            return Err(ApiError::from_response(status.as_u16(), text));
        }
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        self.tokens.token().await
    }
}
