//! Observable state snapshots
//!
//! These are the values the presentation layer renders. They are owned by
//! the session store and trade controller and handed out as clones.

use papertrade_core::{History, Holding, Quote, User};

// ============================================================================
// Session State
// ============================================================================

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Authentication state
///
/// `token` and `user` are only ever set together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub phase: AuthPhase,
    pub token: Option<String>,
    pub user: Option<User>,
}

impl SessionState {
    /// True once the token has been checked against the backend.
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated && self.token.is_some() && self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.user.as_ref().is_some_and(User::is_admin)
    }

    pub(crate) fn authenticated(token: String, user: User) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            token: Some(token),
            user: Some(user),
        }
    }
}

// ============================================================================
// Market State
// ============================================================================

/// A value fetched from the backend, with its own loading and error slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Empty,
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Default for Loadable<T> {
    fn default() -> Self {
        Loadable::Empty
    }
}

impl<T> Loadable<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Loadable::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }
}

/// Market data for the selected symbol
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarketState {
    pub symbol: Option<String>,
    pub quote: Loadable<Quote>,
    pub history: Loadable<History>,
    pub holding: Loadable<Holding>,
}

impl MarketState {
    /// Fresh state for a newly selected symbol, every slot loading.
    pub(crate) fn loading(symbol: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            quote: Loadable::Loading,
            history: Loadable::Loading,
            holding: Loadable::Loading,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.quote.is_loading() || self.history.is_loading() || self.holding.is_loading()
    }

    /// Price used for order estimates.
    pub fn price(&self) -> Option<f64> {
        self.quote
            .value()
            .map(|q| q.price)
            .or_else(|| self.history.value().and_then(History::last_close))
    }
}
