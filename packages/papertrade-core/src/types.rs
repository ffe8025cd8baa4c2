//! Core data types shared by the session and trading components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Users
// ============================================================================

/// Server-assigned role. Read-only on the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// An authenticated account as returned by the identity endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Partial profile update. Only populated fields are sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserUpdate {
    /// Drop every field whose value already matches `current`.
    ///
    /// Passwords are never known client-side, so a password is always kept.
    pub fn changed_from(&self, current: &User) -> UserUpdate {
        UserUpdate {
            email: self.email.clone().filter(|e| e != &current.email),
            username: self.username.clone().filter(|u| u != &current.username),
            password: self.password.clone(),
        }
    }

    /// True when no field would be sent.
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.username.is_none() && self.password.is_none()
    }
}

// ============================================================================
// Portfolio
// ============================================================================

/// A position in a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Holding {
    /// Stock ticker symbol (uppercase)
    pub symbol: String,
    /// Whole shares owned
    pub quantity: u64,
    /// Average cost per share
    #[serde(default)]
    pub average_price: f64,
    /// Last known market price (if the backend supplied one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

impl Holding {
    /// Zero-quantity placeholder for a symbol the user does not own.
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            quantity: 0,
            average_price: 0.0,
            current_price: None,
        }
    }

    /// Total cost of the position.
    pub fn total_cost(&self) -> f64 {
        self.quantity as f64 * self.average_price
    }

    /// Market value at the given price.
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }
}

/// Portfolio snapshot returned by `/portfolios/me`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Portfolio {
    pub cash_balance: f64,
    pub total_value: f64,
    #[serde(default)]
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    /// Holding for `symbol`, or a zero-quantity placeholder when none exists.
    pub fn holding_for(&self, symbol: &str) -> Holding {
        let symbol_upper = symbol.to_uppercase();
        self.holdings
            .iter()
            .find(|h| h.symbol.to_uppercase() == symbol_upper)
            .cloned()
            .unwrap_or_else(|| Holding::empty(&symbol_upper))
    }

    /// Total cost basis across all holdings.
    pub fn total_cost(&self) -> f64 {
        self.holdings.iter().map(|h| h.total_cost()).sum()
    }
}

// ============================================================================
// Market Data
// ============================================================================

/// Latest quote for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// A single OHLC bar. `time` is a unix timestamp in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

/// Price history for charting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct History {
    pub symbol: String,
    #[serde(default)]
    pub candles: Vec<Candle>,
}

impl History {
    /// Ensure candles are ordered by time ascending.
    pub fn sorted(mut self) -> Self {
        self.candles.sort_by_key(|c| c.time);
        self
    }

    /// Close of the most recent candle.
    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Buy or sell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Market or limit order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            other => Err(format!("unknown order type: {other}")),
        }
    }
}

/// How long an unfilled limit order stays open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Day,
    Gtc,
}

/// Order body sent to `/trade/`.
///
/// Only produced from a [`crate::order::ValidatedOrder`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRequest {
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub order_type: OrderType,
    pub quantity: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

// ============================================================================
// Transactions
// ============================================================================

/// Lifecycle of a recorded transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "COMPLETED", alias = "EXECUTED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl TransactionStatus {
    pub fn is_cancellable(&self) -> bool {
        matches!(self, TransactionStatus::Pending)
    }
}

/// A recorded order, executed or pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub symbol: String,
    pub quantity: u64,
    #[serde(default)]
    pub price_per_share: Option<f64>,
    #[serde(default)]
    pub total_amount: Option<f64>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission: Option<f64>,
}

// ============================================================================
// Leaderboard
// ============================================================================

/// Ranking window supported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardWindow {
    OneDay,
    SevenDays,
    ThirtyDays,
    NinetyDays,
}

impl LeaderboardWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardWindow::OneDay => "1d",
            LeaderboardWindow::SevenDays => "7d",
            LeaderboardWindow::ThirtyDays => "30d",
            LeaderboardWindow::NinetyDays => "90d",
        }
    }
}

impl FromStr for LeaderboardWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "1d" => Ok(LeaderboardWindow::OneDay),
            "7d" => Ok(LeaderboardWindow::SevenDays),
            "30d" => Ok(LeaderboardWindow::ThirtyDays),
            "90d" => Ok(LeaderboardWindow::NinetyDays),
            other => Err(format!("invalid leaderboard window: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    /// Percentage points gained over the window
    pub ppg: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Leaderboard {
    /// The window this board covers, e.g. "7d"
    pub id: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<LeaderboardEntry>,
}
