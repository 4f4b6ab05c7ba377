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

//! Waiting on long-running operations.
//!
//! Mutating calls of most Google APIs answer with an operation resource.
//! The operation is fetched again until it reports `done`, then its `error`
//! or `response` is returned to the caller.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{ApiError, ApiRequest, GoogleClient, Service, Transport};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Where and how long an operation is waited for
#[derive(Debug, Clone)]
pub struct OperationWait<'a> {
    pub service: Service,
    pub billing_project: Option<String>,
    pub activity: &'a str,
    pub timeout: Duration,
}

impl<T: Transport> GoogleClient<T> {
    /// Poll `operation` until it is done, and return its `response`.
    ///
    /// The poll interval starts at 2s and doubles up to 10s. Retryable errors
    /// while refreshing the operation do not interrupt the wait.
    pub async fn wait_for_operation(
        &self,
        operation: serde_json::Value,
        wait: OperationWait<'_>,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        let mut operation: Operation = serde_json::from_value(operation)?;
        let deadline = Instant::now() + wait.timeout;
        let mut interval = MIN_POLL_INTERVAL;

        while !operation.done {
            let now = Instant::now();
            if now >= deadline {
                return Err(ApiError::Timeout {
                    activity: wait.activity.to_owned(),
                    timeout: wait.timeout,
                });
            }
            sleep(interval.min(deadline - now)).await;
            interval = (interval * 2).min(MAX_POLL_INTERVAL);

            let url = format!(
                "{}{}",
                self.config.base_path(wait.service),
                operation.name
            );
            let request = ApiRequest::get(url)
                .with_billing_project(wait.billing_project.clone())
                .with_timeout(deadline.saturating_duration_since(Instant::now()));
            match self.transport().execute(&request).await {
                Ok(refreshed) => {
                    operation = serde_json::from_value(refreshed)?;
                    debug!(
                        "Operation {} for {}: done = {}",
                        operation.name, wait.activity, operation.done
                    );
                }
                Err(err) => match err.retry_reason() {
                    Some(reason) => debug!(
                        "Ignoring error while waiting for {}: {reason}",
                        wait.activity
                    ),
                    None => return Err(err),
                },
            }
        }

        if let Some(error) = operation.error {
            return Err(ApiError::Operation {
                activity: wait.activity.to_owned(),
                code: error.code,
                message: error.message,
            });
        }
        info!("Finished {}", wait.activity);
        Ok(operation.response)
    }

    /// Send a request answered by an operation, and wait for it
    pub async fn send_and_wait(
        &self,
        request: ApiRequest,
        wait: OperationWait<'_>,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        let operation = self.send_request(request).await?;
        self.wait_for_operation(operation, wait).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::testing::{test_client, FakeTransport};
    use super::*;

    fn wait(timeout: Duration) -> OperationWait<'static> {
        OperationWait {
            service: Service::NetworkConnectivity,
            billing_project: Some("my-project".to_owned()),
            activity: "Creating Hub",
            timeout,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn done_operation_is_not_polled() {
        let client = test_client(FakeTransport::default());
        let response = client
            .wait_for_operation(
                json!({"name": "operations/op-1", "done": true, "response": {"name": "hub"}}),
                wait(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        assert_eq!(response, Some(json!({"name": "hub"})));
        assert!(client.transport().requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_done() {
        let client = test_client(
            FakeTransport::default()
                .respond(json!({"name": "projects/p/locations/global/operations/op-1"}))
                .fail(503, "unavailable")
                .respond(json!({
                    "name": "projects/p/locations/global/operations/op-1",
                    "done": true,
                    "response": {"uniqueId": "1234"}
                })),
        );
        let start = Instant::now();
        let response = client
            .wait_for_operation(
                json!({"name": "projects/p/locations/global/operations/op-1"}),
                wait(Duration::from_secs(600)),
            )
            .await
            .unwrap();
        assert_eq!(response, Some(json!({"uniqueId": "1234"})));

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests[0].url,
            "https://networkconnectivity.googleapis.com/v1/projects/p/locations/global/operations/op-1"
        );
        assert_eq!(requests[0].billing_project.as_deref(), Some("my-project"));
        // 2s, 4s then 8s between polls
        assert_eq!(start.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn operation_error_is_reported() {
        let client = test_client(FakeTransport::default().respond(json!({
            "name": "operations/op-1",
            "done": true,
            "error": {"code": 9, "message": "Hub already exists"}
        })));
        let err = client
            .wait_for_operation(
                json!({"name": "operations/op-1"}),
                wait(Duration::from_secs(60)),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error waiting for Creating Hub: Error code 9, message: Hub already exists"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_refresh_error_stops_waiting() {
        let client = test_client(FakeTransport::default().fail(403, "denied"));
        let err = client
            .wait_for_operation(
                json!({"name": "operations/op-1"}),
                wait(Duration::from_secs(60)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(403));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let mut transport = FakeTransport::default();
        for _ in 0..20 {
            transport = transport.respond(json!({"name": "operations/op-1"}));
        }
        let client = test_client(transport);
        let start = Instant::now();
        let err = client
            .wait_for_operation(
                json!({"name": "operations/op-1"}),
                wait(Duration::from_secs(30)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }
}
