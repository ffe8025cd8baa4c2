//! Order drafts and validation.

use crate::types::{Holding, OrderType, TimeInForce, TradeRequest, TradeSide};
use crate::validation::ValidationErrors;

/// Flat commission the backend charges per executed order.
pub const COMMISSION_FEE: f64 = 10.0;

/// Raw order input as entered in the trade form.
///
/// `quantity` is kept as a float so fractional or negative input can be
/// reported instead of silently truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub symbol: String,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub limit_price: Option<f64>,
    pub time_in_force: TimeInForce,
}

impl OrderDraft {
    /// Market order draft.
    pub fn market(symbol: &str, side: TradeSide, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            time_in_force: TimeInForce::Day,
        }
    }

    /// Limit order draft.
    pub fn limit(symbol: &str, side: TradeSide, quantity: f64, limit_price: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Limit,
            quantity,
            limit_price: Some(limit_price),
            time_in_force: TimeInForce::Day,
        }
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }
}

/// A trade request that passed validation.
///
/// The inner request is private: the only way to obtain one is
/// [`validate_order`], so nothing can reach the trade endpoint from raw input.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder(TradeRequest);

impl ValidatedOrder {
    pub fn request(&self) -> &TradeRequest {
        &self.0
    }

    pub fn into_request(self) -> TradeRequest {
        self.0
    }

    pub fn symbol(&self) -> &str {
        &self.0.symbol
    }

    /// Estimated cash impact at `price`, including commission.
    ///
    /// Buys cost `price * qty + fee`; sells return `price * qty - fee`.
    pub fn estimated_total(&self, price: f64) -> f64 {
        let gross = price * self.0.quantity as f64;
        match self.0.side {
            TradeSide::Buy => gross + COMMISSION_FEE,
            TradeSide::Sell => gross - COMMISSION_FEE,
        }
    }

    /// Price used for the estimate: the limit price when set, else `market`.
    pub fn reference_price(&self, market: f64) -> f64 {
        self.0.limit_price.unwrap_or(market)
    }
}

/// Validate a draft against the current holding for its symbol.
///
/// - quantity must be a positive whole number
/// - sells cannot exceed the held quantity
/// - limit orders need a positive limit price
pub fn validate_order(
    draft: &OrderDraft,
    holding: &Holding,
) -> Result<ValidatedOrder, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let symbol = draft.symbol.trim().to_uppercase();

    if symbol.is_empty() {
        errors.push("symbol", "Symbol is required");
    }

    let quantity_ok =
        draft.quantity.is_finite() && draft.quantity > 0.0 && draft.quantity.fract() == 0.0;
    if !quantity_ok {
        errors.push("quantity", "Quantity must be a positive whole number");
    }
    let quantity = if quantity_ok { draft.quantity as u64 } else { 0 };

    if quantity_ok && draft.side == TradeSide::Sell {
        // A holding for a different symbol counts as no position.
        let held = if holding.symbol.eq_ignore_ascii_case(&symbol) {
            holding.quantity
        } else {
            0
        };
        if quantity > held {
            errors.push(
                "quantity",
                format!("Cannot sell {} shares, only {} held", quantity, held),
            );
        }
    }

    let limit_price = match draft.order_type {
        OrderType::Limit => match draft.limit_price {
            Some(price) if price.is_finite() && price > 0.0 => Some(price),
            Some(_) => {
                errors.push("limit_price", "Limit price must be greater than 0");
                None
            }
            None => {
                errors.push("limit_price", "Limit price is required for LIMIT orders");
                None
            }
        },
        OrderType::Market => None,
    };

    errors.into_result()?;

    Ok(ValidatedOrder(TradeRequest {
        symbol,
        side: draft.side,
        order_type: draft.order_type,
        quantity,
        limit_price,
        time_in_force: draft.time_in_force,
    }))
}
