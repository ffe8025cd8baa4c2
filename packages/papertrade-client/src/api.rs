//! Backend gateway for the paper trading API.
//!
//! [`Gateway`] is the seam between the client core and the network. The
//! session store and trade controller only ever talk to a `dyn Gateway`, so
//! the HTTP implementation in [`client`] can be swapped for a scripted one.

pub mod client;
pub mod error;
pub mod types;

pub use client::BackendClient;
pub use error::{ApiError, ApiResult};
pub use futures::future::BoxFuture;
pub use types::*;

use papertrade_core::{
    History, Leaderboard, LeaderboardWindow, Portfolio, Quote, TradeRequest, Transaction, User,
    UserUpdate,
};

/// Operations exposed by the backend.
///
/// Authenticated calls take the bearer token explicitly. Market data calls
/// take it optionally and attach it when present.
pub trait Gateway: Send + Sync {
    fn register(&self, request: RegisterRequest) -> BoxFuture<'_, ApiResult<User>>;
    fn login(&self, email: String, password: String) -> BoxFuture<'_, ApiResult<TokenResponse>>;
    fn me(&self, token: String) -> BoxFuture<'_, ApiResult<User>>;
    fn update_me(&self, token: String, update: UserUpdate) -> BoxFuture<'_, ApiResult<User>>;

    fn portfolio(&self, token: String) -> BoxFuture<'_, ApiResult<Portfolio>>;
    fn trade(&self, token: String, request: TradeRequest)
        -> BoxFuture<'_, ApiResult<Transaction>>;
    fn transactions(&self, token: String) -> BoxFuture<'_, ApiResult<Vec<Transaction>>>;
    fn cancel_transaction(
        &self,
        token: String,
        id: String,
    ) -> BoxFuture<'_, ApiResult<CancelResponse>>;

    fn quote(&self, token: Option<String>, symbol: String) -> BoxFuture<'_, ApiResult<Quote>>;
    fn history(
        &self,
        token: Option<String>,
        query: HistoryQuery,
    ) -> BoxFuture<'_, ApiResult<History>>;

    fn leaderboard(
        &self,
        token: String,
        window: LeaderboardWindow,
    ) -> BoxFuture<'_, ApiResult<Leaderboard>>;
}
