//! Application root: wires the gateway, session store and trade controller.

use std::sync::Arc;

use crate::api::{BackendClient, Gateway};
use crate::config::ClientConfig;
use crate::events::EventBus;
use crate::session::SessionStore;
use crate::trade::{MarketSettings, TradeController};
use crate::Result;
use papertrade_core::{CredentialStore, Route};

/// Root of the client core
pub struct App {
    pub session: SessionStore,
    pub trade: TradeController,
    pub events: EventBus,
}

impl App {
    /// Build against the HTTP backend described by `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let gateway = BackendClient::from_config(config)?;
        tracing::debug!("Backend at {}", gateway.base_url());

        let credentials = CredentialStore::with_path(config.credentials_path());
        Ok(Self::with_gateway(
            Arc::new(gateway),
            credentials,
            MarketSettings::from(config),
        ))
    }

    pub fn with_gateway(
        gateway: Arc<dyn Gateway>,
        credentials: CredentialStore,
        settings: MarketSettings,
    ) -> Self {
        let events = EventBus::new();
        let session = SessionStore::new(gateway.clone(), credentials, events.clone());
        let trade = TradeController::new(gateway, session.clone(), events.clone(), settings);
        Self {
            session,
            trade,
            events,
        }
    }

    /// Restore any persisted session and return the landing view.
    ///
    /// A rejected persisted token is logged and leaves the session anonymous.
    pub async fn start(&self) -> Route {
        match self.session.check_auth().await {
            Ok(true) => tracing::info!("Restored persisted session"),
            Ok(false) => {}
            Err(err) => tracing::warn!("Could not restore session: {}", err),
        }
        self.session.navigate(Route::Dashboard)
    }
}
