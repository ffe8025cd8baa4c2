//! Order entry and the confirm-before-execute lifecycle.
//!
//! Drafts come from the trade form, become [`ValidatedOrder`]s after local
//! validation, and only a validated order can be staged for confirmation and
//! handed to the trade endpoint.

mod draft;
mod workflow;

pub use draft::{validate_order, OrderDraft, ValidatedOrder, COMMISSION_FEE};
pub use workflow::{OrderStage, OrderWorkflow};
