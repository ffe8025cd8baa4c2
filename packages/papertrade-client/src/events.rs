//! State change notifications
//!
//! Components publish a [`StateEvent`] after committing a change, never
//! while holding a lock. Any number of renderers may subscribe.

use tokio::sync::broadcast;

use crate::state::{MarketState, SessionState};
use papertrade_core::{OrderStage, Portfolio, Route, Transaction};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum StateEvent {
    SessionChanged(SessionState),
    /// The view to show after a session transition
    Navigate(Route),
    MarketChanged(MarketState),
    OrderStageChanged(OrderStage),
    /// An order executed; holdings and cash are out of date
    PortfolioRefreshRequired,
    PortfolioChanged(Portfolio),
    TransactionsChanged(Vec<Transaction>),
}

/// Broadcast channel for [`StateEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: StateEvent) {
        tracing::trace!(?event, "publish");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
