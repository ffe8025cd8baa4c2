//! Scripted in-memory gateway for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Notify;

use crate::api::{
    ApiError, ApiResult, BoxFuture, CancelResponse, Gateway, HistoryQuery, RegisterRequest,
    TokenResponse,
};
use crate::lock;
use papertrade_core::{
    Candle, History, Holding, Leaderboard, LeaderboardWindow, Portfolio, Quote, Role,
    TradeRequest, Transaction, TransactionStatus, User, UserUpdate,
};

/// In-memory backend.
///
/// Calls are recorded as `"op:arg"` strings. A call whose key has a gate
/// waits until [`FakeGateway::release`] is called for it. A failure queued
/// with [`FakeGateway::fail_next`] is returned by the next call of that op.
#[derive(Default)]
pub struct FakeGateway {
    accounts: Mutex<HashMap<String, (String, User)>>,
    tokens: Mutex<HashMap<String, User>>,
    quotes: Mutex<HashMap<String, Quote>>,
    portfolio: Mutex<Portfolio>,
    transactions: Mutex<Vec<Transaction>>,
    failures: Mutex<HashMap<&'static str, ApiError>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

pub const PASSWORD: &str = "StrongP@ss1";

pub fn user(username: &str, role: Role) -> User {
    User {
        id: format!("id-{}", username),
        email: format!("{}@example.com", username),
        username: username.to_string(),
        role,
    }
}

pub fn quote(symbol: &str, price: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price,
        change: 1.0,
        percent_change: 0.5,
        company_name: None,
    }
}

pub fn holding(symbol: &str, quantity: u64) -> Holding {
    Holding {
        symbol: symbol.to_string(),
        quantity,
        average_price: 100.0,
        current_price: None,
    }
}

pub fn transaction(id: &str, status: TransactionStatus) -> Transaction {
    Transaction {
        id: id.to_string(),
        timestamp: Utc::now(),
        side: papertrade_core::TradeSide::Buy,
        symbol: "AAPL".to_string(),
        quantity: 1,
        price_per_share: Some(100.0),
        total_amount: Some(110.0),
        status,
        order_type: papertrade_core::OrderType::Market,
        limit_price: None,
        commission: Some(10.0),
    }
}

pub fn rejected(status: u16, detail: &str) -> ApiError {
    ApiError::Rejected {
        status,
        detail: Some(detail.to_string()),
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an account that can log in with [`PASSWORD`].
    pub fn with_account(self: &Arc<Self>, user: User) -> &Arc<Self> {
        lock(&self.accounts).insert(user.email.clone(), (PASSWORD.to_string(), user));
        self
    }

    /// Make `token` valid for `user` without going through login.
    pub fn with_token(self: &Arc<Self>, token: &str, user: User) -> &Arc<Self> {
        lock(&self.tokens).insert(token.to_string(), user);
        self
    }

    pub fn with_quote(self: &Arc<Self>, symbol: &str, price: f64) -> &Arc<Self> {
        lock(&self.quotes).insert(symbol.to_string(), quote(symbol, price));
        self
    }

    pub fn with_holding(self: &Arc<Self>, holding: Holding) -> &Arc<Self> {
        lock(&self.portfolio).holdings.push(holding);
        self
    }

    pub fn with_transaction(self: &Arc<Self>, transaction: Transaction) -> &Arc<Self> {
        lock(&self.transactions).push(transaction);
        self
    }

    pub fn fail_next(&self, op: &'static str, err: ApiError) {
        lock(&self.failures).insert(op, err);
    }

    /// Hold calls for `key` (e.g. `"quote:AAPL"`) until released.
    pub fn gate(&self, key: &str) {
        lock(&self.gates).insert(key.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, key: &str) {
        if let Some(gate) = lock(&self.gates).get(key) {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<String> {
        let prefix = format!("{}:", op);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    pub fn transaction_status(&self, id: &str) -> Option<TransactionStatus> {
        lock(&self.transactions)
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status)
    }

    async fn enter(&self, op: &'static str, arg: &str) -> ApiResult<()> {
        let key = format!("{}:{}", op, arg);
        lock(&self.calls).push(key.clone());

        let gate = lock(&self.gates).get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match lock(&self.failures).remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn user_for(&self, token: &str) -> ApiResult<User> {
        lock(&self.tokens)
            .get(token)
            .cloned()
            .ok_or_else(|| rejected(401, "Could not validate credentials"))
    }
}

impl Gateway for FakeGateway {
    fn register(&self, request: RegisterRequest) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move {
            self.enter("register", &request.email).await?;
            let mut accounts = lock(&self.accounts);
            if accounts.contains_key(&request.email) {
                return Err(rejected(400, "Email already registered"));
            }
            let user = User {
                id: format!("id-{}", request.username),
                email: request.email.clone(),
                username: request.username,
                role: Role::User,
            };
            accounts.insert(request.email, (request.password, user.clone()));
            Ok(user)
        })
    }

    fn login(&self, email: String, password: String) -> BoxFuture<'_, ApiResult<TokenResponse>> {
        Box::pin(async move {
            self.enter("login", &email).await?;
            let account = lock(&self.accounts).get(&email).cloned();
            match account {
                Some((expected, user)) if expected == password => {
                    let token = format!("token-{}", user.username);
                    lock(&self.tokens).insert(token.clone(), user);
                    Ok(TokenResponse {
                        access_token: token,
                        token_type: "bearer".to_string(),
                    })
                }
                _ => Err(rejected(401, "Incorrect email or password")),
            }
        })
    }

    fn me(&self, token: String) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move {
            self.enter("me", &token).await?;
            self.user_for(&token)
        })
    }

    fn update_me(&self, token: String, update: UserUpdate) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move {
            let body = serde_json::to_string(&update).unwrap_or_default();
            self.enter("update_me", &body).await?;
            let mut user = self.user_for(&token)?;
            if let Some(email) = update.email {
                user.email = email;
            }
            if let Some(username) = update.username {
                user.username = username;
            }
            lock(&self.tokens).insert(token, user.clone());
            Ok(user)
        })
    }

    fn portfolio(&self, token: String) -> BoxFuture<'_, ApiResult<Portfolio>> {
        Box::pin(async move {
            self.enter("portfolio", &token).await?;
            self.user_for(&token)?;
            Ok(lock(&self.portfolio).clone())
        })
    }

    fn trade(
        &self,
        token: String,
        request: TradeRequest,
    ) -> BoxFuture<'_, ApiResult<Transaction>> {
        Box::pin(async move {
            self.enter("trade", &request.symbol).await?;
            self.user_for(&token)?;
            let mut transactions = lock(&self.transactions);
            let status = match request.order_type {
                papertrade_core::OrderType::Market => TransactionStatus::Completed,
                papertrade_core::OrderType::Limit => TransactionStatus::Pending,
            };
            let tx = Transaction {
                id: format!("tx{}", transactions.len() + 1),
                timestamp: Utc::now(),
                side: request.side,
                symbol: request.symbol,
                quantity: request.quantity,
                price_per_share: Some(100.0),
                total_amount: Some(100.0 * request.quantity as f64),
                status,
                order_type: request.order_type,
                limit_price: request.limit_price,
                commission: Some(10.0),
            };
            transactions.insert(0, tx.clone());
            Ok(tx)
        })
    }

    fn transactions(&self, token: String) -> BoxFuture<'_, ApiResult<Vec<Transaction>>> {
        Box::pin(async move {
            self.enter("transactions", &token).await?;
            self.user_for(&token)?;
            Ok(lock(&self.transactions).clone())
        })
    }

    fn cancel_transaction(
        &self,
        token: String,
        id: String,
    ) -> BoxFuture<'_, ApiResult<CancelResponse>> {
        Box::pin(async move {
            self.enter("cancel", &id).await?;
            self.user_for(&token)?;
            let mut transactions = lock(&self.transactions);
            let tx = transactions
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| rejected(404, "Transaction not found"))?;
            if !tx.status.is_cancellable() {
                return Err(rejected(400, "Only PENDING transactions can be cancelled"));
            }
            tx.status = TransactionStatus::Cancelled;
            Ok(CancelResponse {
                message: "Transaction cancelled successfully".to_string(),
            })
        })
    }

    fn quote(&self, token: Option<String>, symbol: String) -> BoxFuture<'_, ApiResult<Quote>> {
        Box::pin(async move {
            self.enter("quote", &symbol).await?;
            if let Some(token) = token {
                self.user_for(&token)?;
            }
            lock(&self.quotes)
                .get(&symbol)
                .cloned()
                .ok_or_else(|| rejected(404, "Symbol not found"))
        })
    }

    fn history(
        &self,
        token: Option<String>,
        query: HistoryQuery,
    ) -> BoxFuture<'_, ApiResult<History>> {
        Box::pin(async move {
            self.enter("history", &query.symbol).await?;
            if let Some(token) = token {
                self.user_for(&token)?;
            }
            let price = lock(&self.quotes)
                .get(&query.symbol)
                .map(|q| q.price)
                .ok_or_else(|| rejected(404, "Symbol not found"))?;
            // Newest first, so callers must sort
            let candles = vec![
                Candle {
                    time: 2,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: 10,
                },
                Candle {
                    time: 1,
                    open: price - 1.0,
                    high: price,
                    low: price - 1.0,
                    close: price - 1.0,
                    volume: 10,
                },
            ];
            Ok(History {
                symbol: query.symbol,
                candles,
            })
        })
    }

    fn leaderboard(
        &self,
        token: String,
        window: LeaderboardWindow,
    ) -> BoxFuture<'_, ApiResult<Leaderboard>> {
        Box::pin(async move {
            self.enter("leaderboard", window.as_str()).await?;
            self.user_for(&token)?;
            Ok(Leaderboard {
                id: window.as_str().to_string(),
                updated_at: Utc::now(),
                entries: Vec::new(),
            })
        })
    }
}
