//! HTTP client for the remote identity service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tirumala_core::performance::measure_async;
use tirumala_core::{
    validation_error, ApiConfig, ErrorContext, IdentityService, SignInResponse, TirumalaError,
    TirumalaResult, UserRecord,
};
use tracing::{debug, info};

/// Identity service reached over HTTP
pub struct HttpIdentityService {
    client: reqwest::Client,
    config: ApiConfig,
    token_header: reqwest::header::HeaderName,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Error body shape used by the backend
#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
}

impl HttpIdentityService {
    /// Create a new identity client
    pub fn new(config: ApiConfig) -> TirumalaResult<Self> {
        let client = create_http_client(&config)?;
        let token_header = reqwest::header::HeaderName::from_bytes(config.token_header.as_bytes())
            .map_err(|e| TirumalaError::Config {
                message: format!("Invalid token header name '{}': {}", config.token_header, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("identity_client").with_operation("new"),
            })?;

        info!("Created identity client for {}", config.normalized_base_url());

        Ok(Self {
            client,
            config,
            token_header,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn fetch_current_user(&self, token: &str) -> TirumalaResult<UserRecord> {
        let url = self.config.endpoint(&self.config.identity_path);
        debug!("Requesting current user from: {}", url);

        let token_value = reqwest::header::HeaderValue::from_str(token).map_err(|e| {
            TirumalaError::Validation {
                message: format!("Token contains characters not allowed in a header: {}", e),
                field: Some("token".to_string()),
                context: ErrorContext::new("identity_client").with_operation("current_user"),
            }
        })?;

        let response = self
            .client
            .get(&url)
            .header(self.token_header.clone(), token_value)
            .send()
            .await
            .map_err(|e| transport_error(e, "current_user", self.config.timeout_seconds))?;

        let response = check_status(response, "current_user").await?;
        let body = read_json(response, "current_user").await?;
        UserRecord::from_value(body)
    }

    async fn exchange_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> TirumalaResult<SignInResponse> {
        let url = self.config.endpoint(&self.config.login_path);
        info!(email, "Attempting sign in");

        let response = self
            .client
            .post(&url)
            .json(&SignInRequest { email, password })
            .send()
            .await
            .map_err(|e| transport_error(e, "sign_in", self.config.timeout_seconds))?;

        let response = check_status(response, "sign_in").await?;
        let body = read_json(response, "sign_in").await?;

        serde_json::from_value::<SignInResponse>(body).map_err(|e| {
            TirumalaError::MalformedResponse {
                message: format!("Sign-in response is missing token or user: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("identity_client").with_operation("sign_in"),
            }
        })
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn current_user(&self, token: &str) -> TirumalaResult<UserRecord> {
        measure_async("identity.current_user", self.fetch_current_user(token)).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> TirumalaResult<SignInResponse> {
        if email.trim().is_empty() {
            return Err(validation_error!("Email is required", "email", "identity_client"));
        }
        if password.is_empty() {
            return Err(validation_error!("Password is required", "password", "identity_client"));
        }

        let response = measure_async(
            "identity.sign_in",
            self.exchange_credentials(email.trim(), password),
        )
        .await?;

        if response.token.is_empty() {
            return Err(TirumalaError::MalformedResponse {
                message: "Sign-in response carried an empty token".to_string(),
                source: None,
                context: ErrorContext::new("identity_client").with_operation("sign_in"),
            });
        }
        Ok(response)
    }
}

/// Create an HTTP client with common configuration
pub(crate) fn create_http_client(config: &ApiConfig) -> TirumalaResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            TirumalaError::Config {
                message: format!("Invalid user agent: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            }
        })?,
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| TirumalaError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

fn transport_error(error: reqwest::Error, operation: &str, timeout_seconds: u64) -> TirumalaError {
    let context = ErrorContext::new("identity_client").with_operation(operation);
    if error.is_timeout() {
        return TirumalaError::Timeout {
            operation: operation.to_string(),
            duration_ms: timeout_seconds * 1000,
            context,
        };
    }

    TirumalaError::Network {
        message: format!("Request failed: {}", error),
        status: None,
        source: Some(Box::new(error)),
        context: context.with_suggestion("Check network connectivity"),
    }
}

/// Map non-success statuses to errors; 401 is the only authentication failure
async fn check_status(
    response: reqwest::Response,
    operation: &str,
) -> TirumalaResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let error_body = response.text().await.unwrap_or_default();
    let server_message = serde_json::from_str::<ErrorBody>(&error_body)
        .ok()
        .and_then(|b| b.msg.or(b.message))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    let context = ErrorContext::new("identity_client")
        .with_operation(operation)
        .with_metadata("status", status.as_str())
        .with_metadata("url", url.as_str());

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(TirumalaError::Authentication {
            message: server_message,
            context: context.with_suggestion("Log in again"),
        });
    }

    Err(TirumalaError::Network {
        message: format!("HTTP {} from {}: {}", status.as_u16(), url, server_message),
        status: Some(status.as_u16()),
        source: None,
        context: context.with_suggestion(match status.as_u16() {
            400 => "Check the submitted fields",
            403 => "The account is not allowed to perform this action",
            404 => "Check api paths in the configuration",
            _ => "Check network connectivity and backend status",
        }),
    })
}

async fn read_json(response: reqwest::Response, operation: &str) -> TirumalaResult<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| TirumalaError::Network {
            message: format!("Failed to read response body: {}", e),
            status: None,
            source: Some(Box::new(e)),
            context: ErrorContext::new("identity_client").with_operation(operation),
        })?;

    serde_json::from_str(&text).map_err(|e| TirumalaError::MalformedResponse {
        message: format!("Response body is not valid JSON: {}", e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("identity_client").with_operation(operation),
    })
}
