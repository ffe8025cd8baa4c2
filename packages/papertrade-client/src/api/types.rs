//! Request and response bodies that exist only on the wire.
//!
//! Domain types shared with the rest of the client live in `papertrade_core`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Types
// ============================================================================

/// Body for `POST /users/register`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Response from `POST /users/login`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

// ============================================================================
// Market Types
// ============================================================================

/// Query for `GET /market/history/{symbol}`
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryQuery {
    pub symbol: String,
    pub resolution: String,
    pub limit: u32,
}

impl HistoryQuery {
    pub fn new(symbol: &str, resolution: &str, limit: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            resolution: resolution.to_string(),
            limit,
        }
    }
}

// ============================================================================
// Transaction Types
// ============================================================================

/// Response from `POST /transactions/{id}/cancel`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CancelResponse {
    #[serde(default)]
    pub message: String,
}
