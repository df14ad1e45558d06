use log::{error, info};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::settings::OpenWrtConfig;

/// How long a LuCI auth token stays usable after login
const TOKEN_VALIDITY: Duration = Duration::from_secs(60 * 60);

/// Sub-endpoints of the LuCI JSON-RPC surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// System operations (uptime, reboot, init.d, shell)
    Sys,
    /// Filesystem reads
    Fs,
    /// UCI configuration
    Uci,
}

impl Endpoint {
    fn path(&self) -> &'static str {
        match self {
            Endpoint::Sys => "sys",
            Endpoint::Fs => "fs",
            Endpoint::Uci => "uci",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LuciError {
    #[error("Auth request failed: {0}")]
    AuthFailed(String),
    #[error("Auth rejected by device: {0}")]
    AuthError(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Unexpected error during RPC call: {0}")]
    Unknown(String),
}

impl LuciError {
    /// Stable machine-readable code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            LuciError::AuthFailed(_) => "AUTH_FAILED",
            LuciError::AuthError(_) => "AUTH_ERROR",
            LuciError::Http { .. } => "HTTP_ERROR",
            LuciError::Rpc(_) => "RPC_ERROR",
            LuciError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: &'a [JsonValue],
    id: u32,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[allow(dead_code)]
    id: Option<i64>,
    // LuCI sends `result: null` for void calls; keep it as a plain value so
    // null survives instead of collapsing into a missing field.
    #[serde(default)]
    result: JsonValue,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    #[allow(dead_code)]
    code: Option<i64>,
    message: String,
}

struct SessionToken {
    value: String,
    expires_at: Instant,
}

impl SessionToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Authenticated client for the OpenWRT LuCI JSON-RPC endpoint.
///
/// Owns the session token exclusively. A token is fetched lazily on the first
/// call, reused until its expiry, and replaced after an authorization-denied
/// response. Concurrent calls may race to refresh; the worst case is a
/// duplicate login exchange, each call carries its own token snapshot.
pub struct LuciClient {
    http: Client,
    config: OpenWrtConfig,
    token: RwLock<Option<SessionToken>>,
}

impl LuciClient {
    pub fn new(config: OpenWrtConfig, http: Client) -> Self {
        Self {
            http,
            config,
            token: RwLock::new(None),
        }
    }

    /// Perform an authenticated RPC call against a sub-endpoint.
    ///
    /// On an authorization-denied response the token is invalidated, a fresh
    /// login is performed and the call is retried exactly once. A second
    /// denial is surfaced as an error so repeated 403s cannot loop.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        method: &str,
        params: Vec<JsonValue>,
    ) -> Result<T, LuciError> {
        let mut refreshed = false;
        loop {
            let token = self.token().await.map_err(|e| self.log_failure(endpoint, method, e))?;
            let url = format!("{}/{}?auth={}", self.config.base_url, endpoint.path(), token);

            let res = self
                .http
                .post(&url)
                .json(&RpcRequest {
                    method,
                    params: &params,
                    id: 1,
                })
                .send()
                .await
                .map_err(|e| self.log_failure(endpoint, method, LuciError::Unknown(e.to_string())))?;

            if res.status() == StatusCode::FORBIDDEN && !refreshed {
                info!("Token rejected for {}.{}, refreshing and retrying", endpoint, method);
                self.invalidate_token();
                refreshed = true;
                continue;
            }

            if !res.status().is_success() {
                let status = res.status();
                let err = LuciError::Http {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("unknown status").to_string(),
                };
                return Err(self.log_failure(endpoint, method, err));
            }

            let body: RpcResponse = res
                .json()
                .await
                .map_err(|e| self.log_failure(endpoint, method, LuciError::Unknown(e.to_string())))?;

            if let Some(err) = body.error {
                return Err(self.log_failure(endpoint, method, LuciError::Rpc(err.message)));
            }

            return serde_json::from_value(body.result).map_err(|e| {
                self.log_failure(
                    endpoint,
                    method,
                    LuciError::Unknown(format!("failed to decode result: {}", e)),
                )
            });
        }
    }

    /// Return the held token if still valid, otherwise log in for a new one
    async fn token(&self) -> Result<String, LuciError> {
        if let Some(token) = self.current_token() {
            return Ok(token);
        }
        self.fetch_auth_token().await
    }

    fn current_token(&self) -> Option<String> {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().filter(|t| t.is_valid()).map(|t| t.value.clone())
    }

    fn invalidate_token(&self) {
        let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Exchange username/password for a fresh session token
    async fn fetch_auth_token(&self) -> Result<String, LuciError> {
        let url = format!("{}/auth", self.config.base_url);
        let params = [json!(self.config.username), json!(self.config.password)];

        let res = self
            .http
            .post(&url)
            .json(&RpcRequest {
                method: "login",
                params: &params,
                id: 1,
            })
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch auth token: {}", e);
                LuciError::AuthFailed(e.to_string())
            })?;

        if !res.status().is_success() {
            let status = res.status();
            error!("Failed to fetch auth token: HTTP {}", status);
            return Err(LuciError::AuthFailed(format!("HTTP {}", status)));
        }

        let body: RpcResponse = res.json().await.map_err(|e| {
            error!("Failed to decode auth response: {}", e);
            LuciError::AuthFailed(e.to_string())
        })?;

        if let Some(err) = body.error {
            error!("Login rejected by device: {}", err.message);
            return Err(LuciError::AuthError(err.message));
        }

        let value: String = serde_json::from_value(body.result)
            .map_err(|_| LuciError::AuthError("login response carried no token".to_string()))?;

        {
            let mut guard = self.token.write().unwrap_or_else(PoisonError::into_inner);
            *guard = Some(SessionToken {
                value: value.clone(),
                expires_at: Instant::now() + TOKEN_VALIDITY,
            });
        }

        info!("Successfully fetched auth token");
        Ok(value)
    }

    fn log_failure(&self, endpoint: Endpoint, method: &str, err: LuciError) -> LuciError {
        error!("RPC call failed: {}.{}: [{}] {}", endpoint, method, err.code(), err);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_client(base_url: String) -> LuciClient {
        LuciClient::new(
            OpenWrtConfig {
                base_url,
                username: "root".to_string(),
                password: "secret".to_string(),
            },
            Client::new(),
        )
    }

    fn seed_token(client: &LuciClient, value: &str, valid: bool) {
        let expires_at = if valid {
            Instant::now() + Duration::from_secs(60)
        } else {
            Instant::now() - Duration::from_secs(1)
        };
        let mut guard = client.token.write().unwrap();
        *guard = Some(SessionToken {
            value: value.to_string(),
            expires_at,
        });
    }

    #[tokio::test]
    async fn valid_token_is_reused_without_auth_exchange() {
        let mut server = mockito::Server::new_async().await;
        let auth = server
            .mock("POST", "/auth")
            .expect(0)
            .create_async()
            .await;
        let call = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::UrlEncoded("auth".into(), "cached".into()))
            .with_body(r#"{"id":1,"result":12345,"error":null}"#)
            .expect(2)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "cached", true);

        let first: u64 = client.call(Endpoint::Sys, "uptime", vec![]).await.unwrap();
        let second: u64 = client.call(Endpoint::Sys, "uptime", vec![]).await.unwrap();
        assert_eq!(first, 12345);
        assert_eq!(second, 12345);

        auth.assert_async().await;
        call.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_auth_exchange() {
        let mut server = mockito::Server::new_async().await;
        let auth = server
            .mock("POST", "/auth")
            .with_body(r#"{"id":1,"result":"fresh"}"#)
            .expect(1)
            .create_async()
            .await;
        let call = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::UrlEncoded("auth".into(), "fresh".into()))
            .with_body(r#"{"id":1,"result":"ok"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "stale", false);

        let result: String = client.call(Endpoint::Sys, "uptime", vec![]).await.unwrap();
        assert_eq!(result, "ok");

        auth.assert_async().await;
        call.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_response_reauthenticates_and_retries_once() {
        let mut server = mockito::Server::new_async().await;
        let denied = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::UrlEncoded("auth".into(), "revoked".into()))
            .with_status(403)
            .expect(1)
            .create_async()
            .await;
        let auth = server
            .mock("POST", "/auth")
            .with_body(r#"{"id":1,"result":"renewed"}"#)
            .expect(1)
            .create_async()
            .await;
        let retried = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::UrlEncoded("auth".into(), "renewed".into()))
            .with_body(r#"{"id":1,"result":0}"#)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "revoked", true);

        let result: i64 = client
            .call(Endpoint::Sys, "call", vec![json!("pgrep dnsmasq")])
            .await
            .unwrap();
        assert_eq!(result, 0);

        denied.assert_async().await;
        auth.assert_async().await;
        retried.assert_async().await;
    }

    #[tokio::test]
    async fn second_forbidden_response_fails_without_third_attempt() {
        let mut server = mockito::Server::new_async().await;
        let first_denied = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::UrlEncoded("auth".into(), "revoked".into()))
            .with_status(403)
            .expect(1)
            .create_async()
            .await;
        let auth = server
            .mock("POST", "/auth")
            .with_body(r#"{"id":1,"result":"renewed"}"#)
            .expect(1)
            .create_async()
            .await;
        let second_denied = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::UrlEncoded("auth".into(), "renewed".into()))
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "revoked", true);

        let err = client
            .call::<JsonValue>(Endpoint::Sys, "uptime", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "HTTP_ERROR");

        first_denied.assert_async().await;
        auth.assert_async().await;
        second_denied.assert_async().await;
    }

    #[tokio::test]
    async fn envelope_error_maps_to_rpc_error() {
        let mut server = mockito::Server::new_async().await;
        let _m1 = server
            .mock("POST", "/uci")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"id":1,"result":null,"error":{"code":-32601,"message":"Method not found"}}"#)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "valid", true);

        let err = client
            .call::<JsonValue>(Endpoint::Uci, "bogus", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "RPC_ERROR");
        assert!(err.to_string().contains("Method not found"));
    }

    #[tokio::test]
    async fn non_success_status_maps_to_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m2 = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "valid", true);

        let err = client
            .call::<JsonValue>(Endpoint::Sys, "uptime", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "HTTP_ERROR");
    }

    #[tokio::test]
    async fn failed_login_maps_to_auth_failed() {
        let mut server = mockito::Server::new_async().await;
        let _m3 = server
            .mock("POST", "/auth")
            .with_status(500)
            .create_async()
            .await;

        let client = test_client(server.url());
        let err = client
            .call::<JsonValue>(Endpoint::Sys, "uptime", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");
    }

    #[tokio::test]
    async fn rejected_login_maps_to_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _m4 = server
            .mock("POST", "/auth")
            .with_body(r#"{"id":1,"result":null,"error":{"code":1,"message":"Invalid credentials"}}"#)
            .create_async()
            .await;

        let client = test_client(server.url());
        let err = client
            .call::<JsonValue>(Endpoint::Sys, "uptime", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "AUTH_ERROR");
    }

    #[tokio::test]
    async fn null_result_decodes_for_void_calls() {
        let mut server = mockito::Server::new_async().await;
        let _m5 = server
            .mock("POST", "/sys")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"id":1,"result":null}"#)
            .create_async()
            .await;

        let client = test_client(server.url());
        seed_token(&client, "valid", true);

        let result: JsonValue = client.call(Endpoint::Sys, "reboot", vec![]).await.unwrap();
        assert_eq!(result, JsonValue::Null);
    }
}
