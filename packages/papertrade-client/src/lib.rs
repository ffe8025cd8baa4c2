//! Papertrade Client - session and trading core for the paper trading simulator.
//!
//! The presentation layer talks to two components:
//!
//! - [`SessionStore`]: login, registration, logout, identity checks and
//!   profile updates, with the token and user persisted between runs
//! - [`TradeController`]: symbol selection with concurrent market data
//!   fetches, order validation and the confirm-before-execute flow
//!
//! Both sit on top of a [`Gateway`](api::Gateway) to the backend and publish
//! [`StateEvent`](events::StateEvent)s after every committed change.

pub mod api;
pub mod app;
pub mod config;
pub mod events;
pub mod session;
pub mod state;
pub mod trade;

#[cfg(test)]
mod testing;

pub use api::{ApiError, BackendClient, Gateway};
pub use app::App;
pub use config::ClientConfig;
pub use events::{EventBus, StateEvent};
pub use session::SessionStore;
pub use state::{AuthPhase, Loadable, MarketState, SessionState};
pub use trade::TradeController;

use papertrade_core::ValidationErrors;
use std::sync::{Mutex, MutexGuard};

/// Message shown when an error carries no backend detail.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred.";

/// Error types for papertrade-client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(papertrade_core::Error),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Superseded by a newer session operation")]
    Superseded,

    #[error("Transaction {0} is not pending")]
    NotCancellable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<papertrade_core::Error> for Error {
    fn from(err: papertrade_core::Error) -> Self {
        match err {
            papertrade_core::Error::Validation(errors) => Error::Validation(errors),
            other => Error::Core(other),
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

impl Error {
    /// Text for the error slot in the UI.
    ///
    /// Backend details and client-side validation messages are shown as-is;
    /// everything else collapses to [`FALLBACK_MESSAGE`].
    pub fn user_message(&self) -> String {
        match self {
            Error::Api(api) => api
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            Error::Validation(errors) => errors
                .errors
                .first()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            Error::NotAuthenticated => "Please log in to continue.".to_string(),
            Error::NotCancellable(_) => "Only PENDING transactions can be cancelled".to_string(),
            _ => FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Result type for papertrade-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
