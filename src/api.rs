//! # REST API Client
//!
//! Typed access to the affiliate REST API. Every request except the auth
//! allow-list carries the session's bearer token. A 401 triggers one token
//! refresh and one retry; if either fails the session is cleared.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Method, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::AppConfig;
use crate::error::ClientError;
use crate::models::UserProfile;
use crate::mutation::{MutationOp, MutationRequest};
use crate::query::{Collection, ListQuery, ListResult};
use crate::session::{AuthTokens, Session};
use crate::telemetry;

const USER_AGENT: &str = concat!("affiliate-console/", env!("CARGO_PKG_VERSION"));

/// Endpoints called without a bearer token and never retried on 401.
pub const AUTH_ALLOW_LIST: &[&str] = &[
    "auth/login",
    "auth/register",
    "auth/refresh-token",
    "auth/forgot-password",
    "auth/reset-password",
    "auth/verify-email",
];

/// The operations the list layer needs from the API.
#[async_trait]
pub trait CollectionApi: Send + Sync {
    /// One page of `query.collection`, items left as raw JSON.
    async fn fetch_page(&self, query: &ListQuery) -> Result<ListResult<Value>, ClientError>;

    /// Aggregate stats paired with `collection`.
    async fn fetch_stats(&self, collection: Collection) -> Result<Value, ClientError>;

    async fn apply_mutation(&self, request: &MutationRequest) -> Result<(), ClientError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(flatten)]
    tokens: AuthTokens,
    #[serde(default)]
    user: Option<UserProfile>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Arc<Session>,
    /// Serializes token refreshes so concurrent 401s share one refresh.
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(config: &AppConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        let mut base = config
            .api_base()
            .map_err(|err| ClientError::InvalidRequest {
                message: err.to_string(),
            })?;
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base,
            session,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    fn requires_auth(path: &str) -> bool {
        let path = path.trim_start_matches('/');
        !AUTH_ALLOW_LIST.contains(&path)
    }

    /// `POST auth/login`; stores the issued tokens and profile in the session.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, ClientError> {
        let body = json!({ "email": email, "password": password });
        let text = self
            .send(Method::POST, "auth/login", &[], Some(&body))
            .await?;
        let response: LoginResponse = serde_json::from_str(&text)?;
        let user = response.user.clone();
        self.session.sign_in(response.tokens, response.user);
        info!(user_id = user.as_ref().map(|u| u.id.as_str()), "signed in");
        Ok(user)
    }

    /// Clear the session. The server call is best-effort.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.session.is_authenticated()
            && let Err(err) = self.send(Method::POST, "auth/logout", &[], None).await
        {
            debug!(error = %err, "logout request failed; clearing session locally");
        }
        self.session.sign_out();
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let text = self.send(Method::GET, path, query, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Send a request and return the body of a 2xx response.
    #[instrument(skip(self, query, body), fields(method = %method, path = %path))]
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<String, ClientError> {
        let url = self.endpoint(path)?;
        let trace_id = telemetry::trace_id_or_generate();
        let authed = Self::requires_auth(path);
        let started = Instant::now();

        let token = if authed {
            self.session.access_token()
        } else {
            None
        };
        let response = self
            .dispatch(&method, &url, query, body, token.as_deref(), &trace_id)
            .await?;

        let response = if response.status().as_u16() == 401 && authed {
            counter!("api_unauthorized_total").increment(1);
            self.refresh_session(token.as_deref(), &trace_id).await?;
            let token = self.session.access_token();
            let retry = self
                .dispatch(&method, &url, query, body, token.as_deref(), &trace_id)
                .await?;
            if retry.status().as_u16() == 401 {
                warn!("request rejected after token refresh; signing out");
                self.session.sign_out();
                return Err(ClientError::Unauthorized {
                    message: "request rejected after token refresh".to_string(),
                });
            }
            retry
        } else {
            response
        };

        let status = response.status();
        let text = response.text().await?;
        histogram!("api_request_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        if status.is_success() {
            Ok(text)
        } else {
            let err = ClientError::from_status(status.as_u16(), &text);
            warn!(status = status.as_u16(), error = %err, "API request failed");
            Err(err)
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: Option<&str>,
        trace_id: &str,
    ) -> Result<Response, ClientError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header("Accept", "application/json")
            .header(telemetry::REQUEST_ID_HEADER, trace_id);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// `failed_token` is the token the 401 was issued for; when the session
    /// already holds a different one, another request refreshed first.
    async fn refresh_session(
        &self,
        failed_token: Option<&str>,
        trace_id: &str,
    ) -> Result<(), ClientError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.session.access_token()
            && Some(current.as_str()) != failed_token
        {
            debug!("token already refreshed by a concurrent request");
            return Ok(());
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            self.session.sign_out();
            return Err(ClientError::Unauthorized {
                message: "no refresh token available".to_string(),
            });
        };

        let url = self.endpoint("auth/refresh-token")?;
        let body = json!({ "refreshToken": refresh_token });
        let response = self
            .dispatch(&Method::POST, &url, &[], Some(&body), None, trace_id)
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            counter!("api_token_refresh_failure_total").increment(1);
            warn!(status = status.as_u16(), "token refresh rejected; signing out");
            self.session.sign_out();
            return Err(ClientError::Unauthorized {
                message: format!("token refresh rejected with status {}", status.as_u16()),
            });
        }

        let tokens: AuthTokens = serde_json::from_str(&text)?;
        self.session.update_tokens(tokens);
        counter!("api_token_refresh_success_total").increment(1);
        info!("access token refreshed");
        Ok(())
    }
}

#[async_trait]
impl CollectionApi for ApiClient {
    async fn fetch_page(&self, query: &ListQuery) -> Result<ListResult<Value>, ClientError> {
        self.get_json(query.collection.path(), &query.query_pairs())
            .await
    }

    async fn fetch_stats(&self, collection: Collection) -> Result<Value, ClientError> {
        let path = collection
            .stats_path()
            .ok_or_else(|| ClientError::InvalidRequest {
                message: format!("{collection} has no stats endpoint"),
            })?;
        self.get_json(path, &[]).await
    }

    async fn apply_mutation(&self, request: &MutationRequest) -> Result<(), ClientError> {
        let method = match request.op {
            MutationOp::Create => Method::POST,
            MutationOp::Update => Method::PATCH,
            MutationOp::Delete => Method::DELETE,
        };
        let path = request.path()?;
        self.send(method, &path, &[], request.payload.as_ref())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_skips_auth() {
        assert!(!ApiClient::requires_auth("auth/login"));
        assert!(!ApiClient::requires_auth("/auth/refresh-token"));
        assert!(ApiClient::requires_auth("auth/logout"));
        assert!(ApiClient::requires_auth("admin/payments"));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = AppConfig {
            api_base_url: "https://api.example.com/v1".to_string(),
            ..AppConfig::default()
        };
        let client = ApiClient::new(&config, Arc::new(Session::new())).unwrap();
        assert_eq!(client.base_url().as_str(), "https://api.example.com/v1/");
        assert_eq!(
            client.endpoint("/admin/users").unwrap().as_str(),
            "https://api.example.com/v1/admin/users"
        );
    }
}
