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

use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response from a Google API
    #[error("googleapi: Error {code}: {message}")]
    Google {
        code: u16,
        status: String,
        message: String,
        body: String,
    },
    #[error("request failed: {message}")]
    Network { message: String, retryable: bool },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to obtain access token: {0}")]
    Auth(String),
    #[error("Error waiting for {activity}: Error code {code}, message: {message}")]
    Operation {
        activity: String,
        code: i64,
        message: String,
    },
    #[error("timeout while waiting for {activity} after {timeout:?}")]
    Timeout { activity: String, timeout: Duration },
    #[error("{0}")]
    Vars(String),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl ApiError {
    /// Builds the error for an unsuccessful HTTP response.
    /// The Google error envelope is used when the body carries one.
    pub fn from_response(code: u16, body: String) -> Self {
        let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
        let message = if envelope.error.message.is_empty() {
            body.trim().to_owned()
        } else {
            envelope.error.message
        };
        ApiError::Google {
            code,
            status: envelope.error.status,
            message,
            body,
        }
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            ApiError::Google { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }

    /// Why the request that produced this error may be sent again, if it may.
    pub fn retry_reason(&self) -> Option<String> {
        RETRY_PREDICATES
            .iter()
            .find_map(|predicate| predicate(self))
    }
}

type RetryPredicate = fn(&ApiError) -> Option<String>;

const RETRY_PREDICATES: &[RetryPredicate] = &[
    is_retryable_network_error,
    is_common_retryable_code,
    is_operation_in_progress,
    is_app_engine_conflict,
    is_quota_exceeded_per_minute,
];

lazy_static! {
    static ref QUOTA_PER_MINUTE: Regex = Regex::new(
        r"Quota exceeded for quota metric '(?P<metric>.*)' and limit '(?P<limit>.* per minute)' of service"
    )
    .expect("quota regex is valid");
}

fn is_retryable_network_error(err: &ApiError) -> Option<String> {
    match err {
        ApiError::Network {
            retryable: true,
            message,
        } => Some(format!("Retryable network error: {message}")),
        ApiError::Network { message, .. }
            if message.contains("connection reset by peer")
                || message.contains("unexpected EOF") =>
        {
            Some(format!("Retryable network error: {message}"))
        }
        _ => None,
    }
}

fn is_common_retryable_code(err: &ApiError) -> Option<String> {
    match err.code() {
        Some(code @ (429 | 500 | 502 | 503)) => Some(format!("Retryable error code {code}")),
        _ => None,
    }
}

fn is_operation_in_progress(err: &ApiError) -> Option<String> {
    match err {
        ApiError::Google { code: 409, body, .. } if body.contains("operationInProgress") => {
            Some("Operation still in progress".to_owned())
        }
        _ => None,
    }
}

fn is_app_engine_conflict(err: &ApiError) -> Option<String> {
    match err {
        ApiError::Google { code: 409, body, .. }
            if body
                .to_lowercase()
                .contains("operation is already in progress") =>
        {
            Some("Waiting for other concurrent App Engine changes to finish".to_owned())
        }
        _ => None,
    }
}

fn is_quota_exceeded_per_minute(err: &ApiError) -> Option<String> {
    let ApiError::Google { code: 403, body, .. } = err else {
        return None;
    };
    let captures = QUOTA_PER_MINUTE.captures(body)?;
    Some(format!(
        "Waiting for quota limit {} to refresh",
        captures.name("limit").map_or("", |m| m.as_str())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_google_envelope() {
        let err = ApiError::from_response(
            404,
            r#"{"error": {"code": 404, "message": "Hub not found", "status": "NOT_FOUND"}}"#
                .to_owned(),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "googleapi: Error 404: Hub not found");
        let ApiError::Google { status, .. } = err else {
            panic!("expected a google error");
        };
        assert_eq!(status, "NOT_FOUND");
    }

    #[test]
    fn plain_body_becomes_message() {
        let err = ApiError::from_response(502, "Bad Gateway\n".to_owned());
        assert_eq!(err.to_string(), "googleapi: Error 502: Bad Gateway");
    }

    #[test]
    fn retryable_codes() {
        for code in [429, 500, 502, 503] {
            let err = ApiError::from_response(code, String::new());
            assert!(err.retry_reason().is_some(), "{code} should be retried");
        }
        for code in [400, 401, 403, 404, 409, 412] {
            let err = ApiError::from_response(code, String::new());
            assert!(err.retry_reason().is_none(), "{code} should not be retried");
        }
    }

    #[test]
    fn retryable_conflicts() {
        let err = ApiError::from_response(
            409,
            r#"{"error": {"code": 409, "message": "operationInProgress"}}"#.to_owned(),
        );
        assert!(err.retry_reason().is_some());

        let err = ApiError::from_response(
            409,
            "An Operation is already in progress for this app".to_owned(),
        );
        assert_eq!(
            err.retry_reason().as_deref(),
            Some("Waiting for other concurrent App Engine changes to finish")
        );
    }

    #[test]
    fn quota_per_minute() {
        let err = ApiError::from_response(
            403,
            "Quota exceeded for quota metric 'Write requests' and limit 'Write requests per minute' of service 'iam.googleapis.com'".to_owned(),
        );
        assert_eq!(
            err.retry_reason().as_deref(),
            Some("Waiting for quota limit Write requests per minute to refresh")
        );

        let err = ApiError::from_response(403, "Permission denied".to_owned());
        assert!(err.retry_reason().is_none());
    }

    #[test]
    fn network_errors() {
        let err = ApiError::Network {
            message: "read: connection reset by peer".to_owned(),
            retryable: false,
        };
        assert!(err.retry_reason().is_some());

        let err = ApiError::Network {
            message: "invalid certificate".to_owned(),
            retryable: false,
        };
        assert!(err.retry_reason().is_none());
    }
}
