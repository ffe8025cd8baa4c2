//! Trade controller: market data for the selected symbol and the order flow
//!
//! Selecting a symbol fires the quote, history and holding fetches together.
//! Each selection carries a request id; a response is applied only if its id
//! is still the latest, so a slow fetch for an old symbol never overwrites a
//! newer one.
//!
//! Orders go through [`OrderWorkflow`]: nothing reaches the trade endpoint
//! without first being validated and then explicitly confirmed.
//!
//! The staged order, portfolio, transactions and market holding belong to
//! the signed-in user. When the session epoch moves on they are dropped
//! before the next read or operation, and responses fetched for the previous
//! identity are discarded.

use std::sync::{Arc, Mutex};

use crate::api::{Gateway, HistoryQuery};
use crate::config::ClientConfig;
use crate::events::{EventBus, StateEvent};
use crate::session::SessionStore;
use crate::state::{Loadable, MarketState};
use crate::{lock, Error, Result};
use papertrade_core::{
    Holding, Leaderboard, LeaderboardWindow, OrderDraft, OrderStage, OrderWorkflow, Portfolio,
    Transaction, TransactionStatus, ValidatedOrder,
};

/// History request parameters used by symbol selection.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    pub resolution: String,
    pub limit: u32,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for MarketSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            resolution: config.history_resolution.clone(),
            limit: config.history_limit,
        }
    }
}

struct MarketCell {
    state: MarketState,
    request_id: u64,
}

struct TradeInner {
    gateway: Arc<dyn Gateway>,
    session: SessionStore,
    events: EventBus,
    settings: MarketSettings,
    market: Mutex<MarketCell>,
    workflow: Mutex<OrderWorkflow>,
    portfolio: Mutex<Option<Portfolio>>,
    transactions: Mutex<Vec<Transaction>>,
    epoch: Mutex<u64>,
}

/// Owns market state, the order workflow and the transaction list.
#[derive(Clone)]
pub struct TradeController {
    inner: Arc<TradeInner>,
}

impl TradeController {
    /// Create a controller bound to `session`'s current identity.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        session: SessionStore,
        events: EventBus,
        settings: MarketSettings,
    ) -> Self {
        let epoch = session.epoch();
        Self {
            inner: Arc::new(TradeInner {
                gateway,
                session,
                events,
                settings,
                market: Mutex::new(MarketCell {
                    state: MarketState::default(),
                    request_id: 0,
                }),
                workflow: Mutex::new(OrderWorkflow::new()),
                portfolio: Mutex::new(None),
                transactions: Mutex::new(Vec::new()),
                epoch: Mutex::new(epoch),
            }),
        }
    }

    /// Market data for the selected symbol.
    pub fn market(&self) -> MarketState {
        self.sync_session();
        lock(&self.inner.market).state.clone()
    }

    /// Current stage of the order workflow.
    pub fn stage(&self) -> OrderStage {
        self.sync_session();
        lock(&self.inner.workflow).stage().clone()
    }

    /// Last portfolio snapshot loaded for the signed-in user.
    pub fn portfolio(&self) -> Option<Portfolio> {
        self.sync_session();
        lock(&self.inner.portfolio).clone()
    }

    /// Transactions of the signed-in user, newest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.sync_session();
        lock(&self.inner.transactions).clone()
    }

    // ========================================================================
    // Session Tracking
    // ========================================================================

    /// Drop per-user state if the session identity changed since the last
    /// call. Returns the epoch now in effect.
    fn sync_session(&self) -> u64 {
        let current = self.inner.session.epoch();
        {
            let mut seen = lock(&self.inner.epoch);
            if *seen == current {
                return current;
            }
            *seen = current;

            *lock(&self.inner.workflow) = OrderWorkflow::new();
            *lock(&self.inner.portfolio) = None;
            lock(&self.inner.transactions).clear();
            lock(&self.inner.market).state.holding = Loadable::Empty;
        }

        tracing::debug!(epoch = current, "Session changed, dropping user state");
        self.publish_stage();
        self.publish_market();
        self.publish_transactions();
        current
    }

    fn same_session(&self, epoch: u64) -> bool {
        self.inner.session.epoch() == epoch
    }

    /// Token of the session `epoch` was taken from.
    fn token_for(&self, epoch: u64) -> Result<String> {
        let token = self.inner.session.token().ok_or(Error::NotAuthenticated)?;
        if !self.same_session(epoch) {
            return Err(Error::Superseded);
        }
        Ok(token)
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// Select a symbol and load its quote, history and holding concurrently.
    ///
    /// Returns `false` if another selection superseded this one before all
    /// fetches settled. Fetch failures land in the matching slot of
    /// [`MarketState`].
    pub async fn select_symbol(&self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_uppercase();
        let epoch = self.sync_session();
        let request_id = {
            let mut cell = lock(&self.inner.market);
            cell.request_id += 1;
            cell.state = MarketState::loading(&symbol);
            cell.request_id
        };
        tracing::debug!(request_id, "Selecting {}", symbol);
        self.publish_market();

        let token = self.inner.session.token();
        let gateway = &self.inner.gateway;

        let quote = async {
            let result = gateway.quote(token.clone(), symbol.clone()).await;
            self.apply_market(request_id, |market| market.quote = loadable(result))
        };

        let history = async {
            let query = HistoryQuery::new(
                &symbol,
                &self.inner.settings.resolution,
                self.inner.settings.limit,
            );
            let result = gateway
                .history(token.clone(), query)
                .await
                .map(|h| h.sorted());
            self.apply_market(request_id, |market| market.history = loadable(result))
        };

        let holding = async {
            let Some(token) = token.clone() else {
                // Nothing owned without a session
                let placeholder = Holding::empty(&symbol);
                return self.apply_market(request_id, |market| {
                    market.holding = Loadable::Ready(placeholder)
                });
            };

            let result = gateway.portfolio(token).await;
            if !self.same_session(epoch) {
                tracing::debug!(request_id, "Discarding holding for previous session");
                return false;
            }
            match result {
                Ok(portfolio) => {
                    let current = portfolio.holding_for(&symbol);
                    let applied = self.apply_market(request_id, |market| {
                        market.holding = Loadable::Ready(current)
                    });
                    if applied {
                        self.store_portfolio(portfolio);
                    }
                    applied
                }
                Err(err) => {
                    let message = Error::from(err).user_message();
                    self.apply_market(request_id, |market| {
                        market.holding = Loadable::Failed(message)
                    })
                }
            }
        };

        let (quote, history, holding) = tokio::join!(quote, history, holding);
        quote && history && holding
    }

    /// Apply a fetch result if `request_id` is still the latest selection.
    fn apply_market<F>(&self, request_id: u64, update: F) -> bool
    where
        F: FnOnce(&mut MarketState),
    {
        {
            let mut cell = lock(&self.inner.market);
            if cell.request_id != request_id {
                tracing::debug!(request_id, "Discarding stale market response");
                return false;
            }
            update(&mut cell.state);
        }
        self.publish_market();
        true
    }

    fn publish_market(&self) {
        let state = lock(&self.inner.market).state.clone();
        self.inner.events.publish(StateEvent::MarketChanged(state));
    }

    /// Reload the portfolio snapshot and the selected symbol's holding.
    pub async fn refresh_portfolio(&self) -> Result<Portfolio> {
        let epoch = self.sync_session();
        let token = self.token_for(epoch)?;
        let (request_id, symbol) = {
            let cell = lock(&self.inner.market);
            (cell.request_id, cell.state.symbol.clone())
        };

        let portfolio = self.inner.gateway.portfolio(token).await?;
        if !self.same_session(epoch) {
            return Err(Error::Superseded);
        }
        if let Some(symbol) = symbol {
            let current = portfolio.holding_for(&symbol);
            self.apply_market(request_id, |market| {
                market.holding = Loadable::Ready(current)
            });
        }
        self.store_portfolio(portfolio.clone());
        Ok(portfolio)
    }

    fn store_portfolio(&self, portfolio: Portfolio) {
        *lock(&self.inner.portfolio) = Some(portfolio.clone());
        self.inner
            .events
            .publish(StateEvent::PortfolioChanged(portfolio));
    }

    /// Best known holding for `symbol`.
    fn holding_for(&self, symbol: &str) -> Holding {
        let symbol = symbol.trim().to_uppercase();
        {
            let cell = lock(&self.inner.market);
            if cell.state.symbol.as_deref() == Some(symbol.as_str()) {
                if let Some(holding) = cell.state.holding.value() {
                    return holding.clone();
                }
            }
        }
        lock(&self.inner.portfolio)
            .as_ref()
            .map(|p| p.holding_for(&symbol))
            .unwrap_or_else(|| Holding::empty(&symbol))
    }

    // ========================================================================
    // Order Workflow
    // ========================================================================

    /// Validate a draft against the current holding. Never touches the network.
    pub fn validate_order(&self, draft: &OrderDraft) -> Result<ValidatedOrder> {
        self.sync_session();
        let holding = self.holding_for(&draft.symbol);
        let result = lock(&self.inner.workflow).validate(draft, &holding);
        self.publish_stage();
        result.map_err(Error::from)
    }

    /// Stage a validated order and wait for the user to confirm it.
    pub fn request_confirmation(&self, order: ValidatedOrder) -> Result<()> {
        self.sync_session();
        lock(&self.inner.workflow).request_confirmation(order)?;
        self.publish_stage();
        Ok(())
    }

    /// Send the confirmed order to the trade endpoint.
    ///
    /// On failure the order stays staged in `Failed` so it can be retried or
    /// cancelled. Only an order staged under the current identity is sent.
    pub async fn confirm_and_execute(&self) -> Result<Transaction> {
        let epoch = self.sync_session();
        let token = self.token_for(epoch)?;
        let order = lock(&self.inner.workflow).begin_execution()?;
        self.publish_stage();

        tracing::info!(
            side = %order.request().side,
            quantity = order.request().quantity,
            "Executing order for {}",
            order.symbol()
        );

        let result = self.inner.gateway.trade(token, order.into_request()).await;
        if !self.same_session(epoch) {
            tracing::warn!("Session changed while the order was executing");
            self.sync_session();
            return result.map_err(Error::from);
        }

        match result {
            Ok(transaction) => {
                lock(&self.inner.workflow).complete(transaction.clone())?;
                self.publish_stage();
                self.record_transaction(transaction.clone());
                self.inner
                    .events
                    .publish(StateEvent::PortfolioRefreshRequired);
                Ok(transaction)
            }
            Err(err) => {
                let err = Error::from(err);
                tracing::warn!("Order failed: {}", err);
                lock(&self.inner.workflow).fail(err.user_message())?;
                self.publish_stage();
                Err(err)
            }
        }
    }

    /// Return a failed order to confirmation.
    pub fn retry(&self) -> Result<()> {
        self.sync_session();
        lock(&self.inner.workflow).retry()?;
        self.publish_stage();
        Ok(())
    }

    /// Discard the staged order without any request.
    pub fn cancel_confirmation(&self) -> Result<()> {
        self.sync_session();
        lock(&self.inner.workflow).cancel()?;
        self.publish_stage();
        Ok(())
    }

    fn publish_stage(&self) {
        let stage = lock(&self.inner.workflow).stage().clone();
        self.inner.events.publish(StateEvent::OrderStageChanged(stage));
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Load the signed-in user's transactions.
    pub async fn load_transactions(&self) -> Result<Vec<Transaction>> {
        let epoch = self.sync_session();
        let token = self.token_for(epoch)?;
        let transactions = self.inner.gateway.transactions(token).await?;
        if !self.same_session(epoch) {
            return Err(Error::Superseded);
        }
        *lock(&self.inner.transactions) = transactions.clone();
        self.publish_transactions();
        Ok(transactions)
    }

    /// Cancel a pending transaction.
    ///
    /// Only `id` changes locally, and only once the backend accepts. A
    /// transaction already known not to be pending is refused without a
    /// request.
    pub async fn cancel_transaction(&self, id: &str) -> Result<()> {
        let epoch = self.sync_session();
        let known = lock(&self.inner.transactions)
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status);
        if let Some(status) = known {
            if !status.is_cancellable() {
                return Err(Error::NotCancellable(id.to_string()));
            }
        }

        let token = self.token_for(epoch)?;
        self.inner
            .gateway
            .cancel_transaction(token, id.to_string())
            .await?;

        tracing::info!("Cancelled transaction {}", id);
        self.sync_session();
        if let Some(tx) = lock(&self.inner.transactions)
            .iter_mut()
            .find(|t| t.id == id)
        {
            tx.status = TransactionStatus::Cancelled;
        }
        self.publish_transactions();
        Ok(())
    }

    fn record_transaction(&self, transaction: Transaction) {
        {
            let mut transactions = lock(&self.inner.transactions);
            transactions.retain(|t| t.id != transaction.id);
            transactions.insert(0, transaction);
        }
        self.publish_transactions();
    }

    fn publish_transactions(&self) {
        let transactions = lock(&self.inner.transactions).clone();
        self.inner
            .events
            .publish(StateEvent::TransactionsChanged(transactions));
    }

    // ========================================================================
    // Leaderboard
    // ========================================================================

    /// Fetch the ranking for `window`.
    pub async fn leaderboard(&self, window: LeaderboardWindow) -> Result<Leaderboard> {
        let token = self.inner.session.token().ok_or(Error::NotAuthenticated)?;
        Ok(self.inner.gateway.leaderboard(token, window).await?)
    }
}

fn loadable<T>(result: crate::api::ApiResult<T>) -> Loadable<T> {
    match result {
        Ok(value) => Loadable::Ready(value),
        Err(err) => {
            tracing::warn!("Market fetch failed: {}", err);
            Loadable::Failed(Error::from(err).user_message())
        }
    }
}
