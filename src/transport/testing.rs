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

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;

use super::{ApiError, ApiRequest, Config, GoogleClient, ProviderHandle, Transport};

/// Transport replaying scripted responses in order and recording requests
#[derive(Debug, Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<serde_json::Value, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn respond(self, response: serde_json::Value) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, code: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ApiError::from_response(code, body.to_owned())));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// `(method, url)` of every request sent so far
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.requests()
            .into_iter()
            .map(|request| (request.method, request.url))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<serde_json::Value, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ApiError::Network {
                    message: format!("no scripted response for {} {}", request.method, request.url),
                    retryable: false,
                })
            })
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        Ok("ya29.fake-token".to_owned())
    }
}

pub fn test_config() -> Config {
    Config {
        project: Some("my-project".to_owned()),
        region: Some("us-central1".to_owned()),
        zone: Some("us-central1-a".to_owned()),
        ..Default::default()
    }
}

pub fn test_client(transport: FakeTransport) -> Arc<GoogleClient<FakeTransport>> {
    Arc::new(GoogleClient::new(test_config(), transport))
}

pub async fn test_handle(transport: FakeTransport) -> ProviderHandle<FakeTransport> {
    test_handle_with(test_config(), transport).await
}

pub async fn test_handle_with(
    config: Config,
    transport: FakeTransport,
) -> ProviderHandle<FakeTransport> {
    let handle = ProviderHandle::new();
    handle.set(GoogleClient::new(config, transport)).await;
    handle
}
