//! HTTP implementation of the backend gateway.

use reqwest::{Client, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};

use super::error::{ApiError, ApiResult};
use super::types::*;
use super::{BoxFuture, Gateway};
use crate::config::ClientConfig;
use papertrade_core::{
    History, Leaderboard, LeaderboardWindow, Portfolio, Quote, TradeRequest, Transaction, User,
    UserUpdate,
};

/// HTTP client for the paper trading backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    /// Create a new client with the given base URL (API prefix included)
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a client from configuration, applying the request timeout
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url: config.api_url(),
            client: builder.build()?,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL under the base URL.
    ///
    /// Every segment is percent-encoded on its own, so a `/` inside a symbol
    /// or id stays part of that segment. An empty trailing segment gives the
    /// trailing slash some routes expect.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            ApiError::InvalidRequest(format!("bad base URL {}: {}", self.base_url, err))
        })?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(format!("bad base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ========================================================================
    // Internal HTTP Methods
    // ========================================================================

    fn authorized(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and decode a successful JSON body
    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> ApiResult<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::rejected(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), "Request rejected: {}", err);
            return Err(err);
        }

        Ok(response.json().await?)
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &[&str], token: Option<&str>) -> ApiResult<T> {
        let url = self.url(path)?;
        tracing::debug!("GET {}", url.path());
        let request = self.client.get(url);
        Self::send(Self::authorized(request, token)).await
    }

    /// Make a POST request with a JSON body
    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &[&str],
        token: Option<&str>,
        body: &B,
    ) -> ApiResult<T> {
        let url = self.url(path)?;
        tracing::debug!("POST {}", url.path());
        let request = self.client.post(url).json(body);
        Self::send(Self::authorized(request, token)).await
    }

    /// Make a PATCH request with a JSON body
    async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &[&str],
        token: Option<&str>,
        body: &B,
    ) -> ApiResult<T> {
        let url = self.url(path)?;
        tracing::debug!("PATCH {}", url.path());
        let request = self.client.patch(url).json(body);
        Self::send(Self::authorized(request, token)).await
    }

    // ========================================================================
    // Users API
    // ========================================================================

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<User> {
        self.post(&["users", "register"], None, request).await
    }

    /// Exchange credentials for a token. The email goes in the `username` form field.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<TokenResponse> {
        let url = self.url(&["users", "login"])?;
        tracing::debug!("POST {}", url.path());
        let request = self
            .client
            .post(url)
            .form(&[("username", email), ("password", password)]);
        Self::send(request).await
    }

    pub async fn me(&self, token: &str) -> ApiResult<User> {
        self.get(&["users", "me"], Some(token)).await
    }

    pub async fn update_me(&self, token: &str, update: &UserUpdate) -> ApiResult<User> {
        self.patch(&["users", "me"], Some(token), update).await
    }

    // ========================================================================
    // Portfolio & Trading API
    // ========================================================================

    pub async fn portfolio(&self, token: &str) -> ApiResult<Portfolio> {
        self.get(&["portfolios", "me"], Some(token)).await
    }

    pub async fn trade(&self, token: &str, request: &TradeRequest) -> ApiResult<Transaction> {
        self.post(&["trade", ""], Some(token), request).await
    }

    pub async fn transactions(&self, token: &str) -> ApiResult<Vec<Transaction>> {
        self.get(&["transactions", ""], Some(token)).await
    }

    pub async fn cancel_transaction(&self, token: &str, id: &str) -> ApiResult<CancelResponse> {
        let id = segment(id)?;
        self.post(
            &["transactions", id, "cancel"],
            Some(token),
            &serde_json::json!({}),
        )
        .await
    }

    // ========================================================================
    // Market API
    // ========================================================================

    pub async fn quote(&self, token: Option<&str>, symbol: &str) -> ApiResult<Quote> {
        let symbol = segment(symbol)?;
        self.get(&["market", "quote", symbol], token).await
    }

    pub async fn history(&self, token: Option<&str>, query: &HistoryQuery) -> ApiResult<History> {
        let url = self.url(&["market", "history", segment(&query.symbol)?])?;
        tracing::debug!("GET {}", url.path());
        let request = self.client.get(url).query(&[
            ("resolution", query.resolution.clone()),
            ("limit", query.limit.to_string()),
        ]);
        Self::send(Self::authorized(request, token)).await
    }

    // ========================================================================
    // Leaderboard API
    // ========================================================================

    pub async fn leaderboard(
        &self,
        token: &str,
        window: LeaderboardWindow,
    ) -> ApiResult<Leaderboard> {
        self.get(&["leaderboard", window.as_str()], Some(token))
            .await
    }
}

/// Check a caller-supplied path segment.
///
/// Empty and dot segments would be dropped or resolved by URL handling and
/// change which route is hit.
fn segment(value: &str) -> ApiResult<&str> {
    match value {
        "" | "." | ".." => Err(ApiError::InvalidRequest(format!(
            "invalid path segment {:?}",
            value
        ))),
        _ => Ok(value),
    }
}

impl Gateway for BackendClient {
    fn register(&self, request: RegisterRequest) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move { BackendClient::register(self, &request).await })
    }

    fn login(&self, email: String, password: String) -> BoxFuture<'_, ApiResult<TokenResponse>> {
        Box::pin(async move { BackendClient::login(self, &email, &password).await })
    }

    fn me(&self, token: String) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move { BackendClient::me(self, &token).await })
    }

    fn update_me(&self, token: String, update: UserUpdate) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move { BackendClient::update_me(self, &token, &update).await })
    }

    fn portfolio(&self, token: String) -> BoxFuture<'_, ApiResult<Portfolio>> {
        Box::pin(async move { BackendClient::portfolio(self, &token).await })
    }

    fn trade(
        &self,
        token: String,
        request: TradeRequest,
    ) -> BoxFuture<'_, ApiResult<Transaction>> {
        Box::pin(async move { BackendClient::trade(self, &token, &request).await })
    }

    fn transactions(&self, token: String) -> BoxFuture<'_, ApiResult<Vec<Transaction>>> {
        Box::pin(async move { BackendClient::transactions(self, &token).await })
    }

    fn cancel_transaction(
        &self,
        token: String,
        id: String,
    ) -> BoxFuture<'_, ApiResult<CancelResponse>> {
        Box::pin(async move { BackendClient::cancel_transaction(self, &token, &id).await })
    }

    fn quote(&self, token: Option<String>, symbol: String) -> BoxFuture<'_, ApiResult<Quote>> {
        Box::pin(async move { BackendClient::quote(self, token.as_deref(), &symbol).await })
    }

    fn history(
        &self,
        token: Option<String>,
        query: HistoryQuery,
    ) -> BoxFuture<'_, ApiResult<History>> {
        Box::pin(async move { BackendClient::history(self, token.as_deref(), &query).await })
    }

    fn leaderboard(
        &self,
        token: String,
        window: LeaderboardWindow,
    ) -> BoxFuture<'_, ApiResult<Leaderboard>> {
        Box::pin(async move { BackendClient::leaderboard(self, &token, window).await })
    }
}
