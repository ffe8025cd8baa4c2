//! Papertrade Core - Domain library for the paper trading client.
//!
//! This crate holds everything in the client that does not touch the network:
//!
//! - **Data model**: users, holdings, quotes, candles, trade requests, transactions
//! - **Validation**: registration/login forms and order drafts
//! - **Order lifecycle**: the confirm-before-execute state machine
//! - **Credentials**: durable token and user persistence
//! - **Routes**: view identifiers and their access requirements
//!
//! # Example
//!
//! ```rust
//! use papertrade_core::order::{OrderDraft, OrderWorkflow};
//! use papertrade_core::types::{Holding, TradeSide};
//!
//! let mut workflow = OrderWorkflow::new();
//! let holding = Holding::empty("AAPL");
//! let draft = OrderDraft::market("AAPL", TradeSide::Buy, 10.0);
//!
//! // Validation never touches the network; it only stages the order locally.
//! let order = workflow.validate(&draft, &holding).unwrap();
//! workflow.request_confirmation(order).unwrap();
//! assert!(workflow.stage().is_confirmation_pending());
//! ```

pub mod credentials;
pub mod order;
pub mod routes;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use credentials::CredentialStore;
pub use order::{OrderDraft, OrderStage, OrderWorkflow, ValidatedOrder, COMMISSION_FEE};
pub use routes::Route;
pub use types::{
    Candle, History, Holding, Leaderboard, LeaderboardEntry, LeaderboardWindow, OrderType,
    Portfolio, Quote, Role, TimeInForce, TradeRequest, TradeSide, Transaction,
    TransactionStatus, User, UserUpdate,
};
pub use validation::{FieldError, ValidationErrors};

/// Error types for papertrade-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid transition: cannot {action} while {stage}")]
    InvalidTransition { action: &'static str, stage: &'static str },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
}

/// Result type for papertrade-core operations.
pub type Result<T> = std::result::Result<T, Error>;
