//! Session-aware HTTP gateway for the property-management REST API.
//!
//! Every outbound request goes through `SessionGateway::send`, which attaches
//! the stored bearer token and clears the session when the server answers 401.
//! Redirecting to a login surface is left to the caller.

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::auth::Session;
use crate::config::Config;

use super::GatewayError;

/// JWT obtain-pair endpoint; answers with `access`/`refresh` plus the user profile
const LOGIN_PATH: &str = "token/";
const LOGOUT_PATH: &str = "users/auth/logout/";

/// Credentials for the login endpoint. Either `username` or `phone` identifies the account.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn with_username(username: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            password: password.to_string(),
            ..Default::default()
        }
    }

    pub fn with_phone(phone: &str, password: &str) -> Self {
        Self {
            phone: Some(phone.to_string()),
            password: password.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct LoginResponse {
    /// Access token, sent by the backend as `access`
    #[serde(alias = "access")]
    pub token: String,
    #[serde(default)]
    pub refresh: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role_id: Option<i64>,
}

/// Gateway for authenticated API calls.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct SessionGateway {
    client: Client,
    base_url: String,
    session: Session,
}

impl SessionGateway {
    pub fn new(config: &Config, session: Session) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(GatewayError::Network)?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Session lifecycle =====

    /// Log in and store the returned token
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, GatewayError> {
        let response: LoginResponse = self.post(LOGIN_PATH, credentials).await?;
        self.session.login(&response.token)?;
        Ok(response)
    }

    /// Tell the server we are leaving, then always drop the local token.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        let request = self.client.post(self.url(LOGOUT_PATH));
        if let Err(e) = self.send(request).await {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.session.logout()?;
        Ok(())
    }

    // ===== Requests =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// DELETE ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        let request = self.client.delete(self.url(path));
        self.send(request).await?;
        Ok(())
    }

    async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(request).await?;
        response.json().await.map_err(GatewayError::from_transport)
    }

    /// Attach credentials, send, and apply the status policy.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let request = match self.session.token()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let request = request.build().map_err(GatewayError::Network)?;
        debug!(method = %request.method(), url = %request.url(), "Sending request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(GatewayError::from_transport)?;

        self.check_response(response).await
    }

    async fn check_response(&self, response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            debug!(url = %response.url(), status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Authentication rejected, clearing session");
            if let Err(e) = self.session.store().clear() {
                error!(error = %e, "Failed to clear token after rejection");
            }
            return Err(GatewayError::Unauthorized);
        }

        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        warn!(url = %url, status = status.as_u16(), "Request failed");
        Err(GatewayError::from_status(status, &body))
    }
}
