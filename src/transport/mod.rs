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

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::{thread_rng, Rng};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tf_provider::Diagnostics;
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

pub mod auth;
pub mod config;
mod error;
pub mod http;
pub mod mutex;
pub mod operation;
#[cfg(test)]
pub mod testing;

pub use config::{Config, Service};
pub use error::ApiError;
pub use http::HttpTransport;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// One HTTP call to a Google API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    pub billing_project: Option<String>,
    /// Bound of the whole retry loop, not of a single attempt
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            billing_project: None,
            timeout: config::DEFAULT_RETRY_TIMEOUT,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn patch(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PATCH, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_billing_project(mut self, project: Option<String>) -> Self {
        self.billing_project = project;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A single attempt at sending a request.
/// Retries, polling and locking are layered on top by [`GoogleClient`].
#[async_trait]
pub trait Transport: Send + Sync + Debug + 'static {
    /// Send the request and decode the JSON response.
    /// An empty body is returned as an empty object.
    async fn execute(&self, request: &ApiRequest) -> Result<serde_json::Value, ApiError>;

    /// Access token used to authenticate requests
    async fn access_token(&self) -> Result<String, ApiError>;
}

#[derive(Debug)]
pub struct GoogleClient<T: Transport> {
    pub config: Config,
    transport: T,
}

impl<T: Transport> GoogleClient<T> {
    pub fn new(config: Config, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a request, retrying with exponential backoff while the error is
    /// retryable and the request timeout is not exhausted.
    pub async fn send_request(&self, request: ApiRequest) -> Result<serde_json::Value, ApiError> {
        let deadline = Instant::now() + request.timeout;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let err = match self.transport.execute(&request).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };
            let Some(reason) = err.retry_reason() else {
                return Err(err);
            };

            let delay = jittered(backoff);
            if Instant::now() + delay >= deadline {
                warn!(
                    "Giving up on {} {} after retries: {err}",
                    request.method, request.url
                );
                return Err(err);
            }
            debug!(
                "Retrying {} {} in {delay:?}: {reason}",
                request.method, request.url
            );
            sleep(delay).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Send a request and decode its response into `R`
    pub async fn fetch<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, ApiError> {
        let response = self.send_request(request).await?;
        Ok(serde_json::from_value(response)?)
    }
}

fn jittered(backoff: Duration) -> Duration {
    let max_jitter = (backoff.as_millis() / 4) as u64;
    backoff + Duration::from_millis(thread_rng().gen_range(0..=max_jitter))
}

/// Turn the result of a read into the resource, or `None` when it is gone.
///
/// A 404 means the resource was deleted outside of Terraform: it is removed
/// from the state with a warning in the logs. Other errors are reported.
pub fn handle_not_found<R>(
    result: Result<R, ApiError>,
    diags: &mut Diagnostics,
    resource: &str,
) -> Option<Option<R>> {
    match result {
        Ok(value) => Some(Some(value)),
        Err(err) if err.is_not_found() => {
            warn!("Removing {resource} because it's gone");
            Some(None)
        }
        Err(err) => {
            diags.root_error(format!("Error reading {resource}"), err.to_string());
            None
        }
    }
}

/// Client shared between the provider and its resources.
/// It only exists once the provider has been configured.
pub struct ProviderHandle<T: Transport> {
    client: Arc<RwLock<Option<Arc<GoogleClient<T>>>>>,
}

impl<T: Transport> ProviderHandle<T> {
    pub fn new() -> Self {
        Self {
            client: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set(&self, client: GoogleClient<T>) {
        *self.client.write().await = Some(Arc::new(client));
    }

    pub async fn client(&self, diags: &mut Diagnostics) -> Option<Arc<GoogleClient<T>>> {
        let client = self.client.read().await.clone();
        if client.is_none() {
            diags.root_error(
                "Provider not configured",
                "The google provider must be configured before its resources can be used.",
            );
        }
        client
    }
}

impl<T: Transport> Default for ProviderHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Clone for ProviderHandle<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<T: Transport> Debug for ProviderHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::{test_client, FakeTransport};
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let client = test_client(
            FakeTransport::default()
                .fail(503, "backend unavailable")
                .fail(429, "rate limited")
                .respond(json!({"name": "hub"})),
        );

        let start = Instant::now();
        let response = client
            .send_request(ApiRequest::get("https://example.com/hub"))
            .await
            .unwrap();
        assert_eq!(response, json!({"name": "hub"}));
        assert_eq!(client.transport().requests().len(), 3);
        assert!(start.elapsed() >= INITIAL_BACKOFF * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_client_errors() {
        let client = test_client(FakeTransport::default().fail(400, "bad request"));
        let err = client
            .send_request(ApiRequest::get("https://example.com/hub"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(400));
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_the_timeout() {
        let mut transport = FakeTransport::default();
        for _ in 0..100 {
            transport = transport.fail(500, "internal");
        }
        let client = test_client(transport);
        let err = client
            .send_request(
                ApiRequest::get("https://example.com/hub").with_timeout(Duration::from_secs(10)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(500));
        let attempts = client.transport().requests().len();
        assert!((2..10).contains(&attempts), "{attempts} attempts");
    }

    #[test]
    fn not_found_removes() {
        let mut diags = Diagnostics::default();
        let gone = handle_not_found::<()>(
            Err(ApiError::from_response(404, String::new())),
            &mut diags,
            "NetworkConnectivityHub \"projects/p/locations/global/hubs/h\"",
        );
        assert_eq!(gone, Some(None));
        assert!(diags.errors.is_empty());

        let failed = handle_not_found::<()>(
            Err(ApiError::from_response(403, "denied".to_owned())),
            &mut diags,
            "NetworkConnectivityHub \"h\"",
        );
        assert_eq!(failed, None);
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_handle_reports() {
        let handle = ProviderHandle::<FakeTransport>::new();
        let mut diags = Diagnostics::default();
        assert!(handle.client(&mut diags).await.is_none());
        assert_eq!(diags.errors.len(), 1);

        handle
            .set(GoogleClient::new(Config::default(), FakeTransport::default()))
            .await;
        let mut diags = Diagnostics::default();
        assert!(handle.clone().client(&mut diags).await.is_some());
        assert!(diags.errors.is_empty());
    }
}
