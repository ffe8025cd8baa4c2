//! Order lifecycle state machine.

use super::draft::{validate_order, OrderDraft, ValidatedOrder};
use crate::types::{Holding, Transaction};
use crate::{Error, Result};

/// Where a single order is in its lifecycle.
///
/// ```text
/// Idle -> Validated -> ConfirmationPending -> Executing -> Executed
///                             ^                   |
///                             +---- Failed <------+
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OrderStage {
    #[default]
    Idle,
    Validated(ValidatedOrder),
    ConfirmationPending(ValidatedOrder),
    Executing(ValidatedOrder),
    Executed(Transaction),
    Failed { order: ValidatedOrder, error: String },
}

impl OrderStage {
    pub fn name(&self) -> &'static str {
        match self {
            OrderStage::Idle => "idle",
            OrderStage::Validated(_) => "validated",
            OrderStage::ConfirmationPending(_) => "confirmation pending",
            OrderStage::Executing(_) => "executing",
            OrderStage::Executed(_) => "executed",
            OrderStage::Failed { .. } => "failed",
        }
    }

    pub fn is_confirmation_pending(&self) -> bool {
        matches!(self, OrderStage::ConfirmationPending(_))
    }

    pub fn is_executing(&self) -> bool {
        matches!(self, OrderStage::Executing(_))
    }
}

/// Drives one order at a time through [`OrderStage`].
///
/// Every mutating method either performs its transition or returns
/// [`Error::InvalidTransition`] and leaves the stage untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderWorkflow {
    stage: OrderStage,
}

impl OrderWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> &OrderStage {
        &self.stage
    }

    /// The order awaiting confirmation, executing, or available for retry.
    pub fn staged(&self) -> Option<&ValidatedOrder> {
        match &self.stage {
            OrderStage::ConfirmationPending(order)
            | OrderStage::Executing(order)
            | OrderStage::Failed { order, .. } => Some(order),
            _ => None,
        }
    }

    /// Error retained from the last failed execution.
    pub fn last_error(&self) -> Option<&str> {
        match &self.stage {
            OrderStage::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Validate a draft and move to `Validated`.
    ///
    /// Allowed from `Idle`, `Validated` and `Executed`. An invalid draft
    /// returns to `Idle` with the field errors.
    pub fn validate(&mut self, draft: &OrderDraft, holding: &Holding) -> Result<ValidatedOrder> {
        match &self.stage {
            OrderStage::Idle | OrderStage::Validated(_) | OrderStage::Executed(_) => {}
            other => {
                return Err(Error::InvalidTransition {
                    action: "validate a new order",
                    stage: other.name(),
                })
            }
        }

        match validate_order(draft, holding) {
            Ok(order) => {
                self.stage = OrderStage::Validated(order.clone());
                Ok(order)
            }
            Err(errors) => {
                self.stage = OrderStage::Idle;
                Err(Error::Validation(errors))
            }
        }
    }

    /// Stage the validated order for user confirmation.
    pub fn request_confirmation(&mut self, order: ValidatedOrder) -> Result<()> {
        match std::mem::take(&mut self.stage) {
            OrderStage::Validated(validated) if validated == order => {
                self.stage = OrderStage::ConfirmationPending(order);
                Ok(())
            }
            OrderStage::Validated(validated) => {
                self.stage = OrderStage::Validated(validated);
                Err(Error::InvalidTransition {
                    action: "confirm an order other than the one validated",
                    stage: "validated",
                })
            }
            other => Err(self.restore("request confirmation", other)),
        }
    }

    /// Move the confirmed order to `Executing` and hand it to the caller.
    pub fn begin_execution(&mut self) -> Result<ValidatedOrder> {
        match std::mem::take(&mut self.stage) {
            OrderStage::ConfirmationPending(order) => {
                self.stage = OrderStage::Executing(order.clone());
                Ok(order)
            }
            other => Err(self.restore("execute", other)),
        }
    }

    /// Record a successful execution. The staged order is cleared.
    pub fn complete(&mut self, transaction: Transaction) -> Result<()> {
        match std::mem::take(&mut self.stage) {
            OrderStage::Executing(_) => {
                self.stage = OrderStage::Executed(transaction);
                Ok(())
            }
            other => Err(self.restore("complete execution", other)),
        }
    }

    /// Record a failed execution, keeping the order for retry.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        match std::mem::take(&mut self.stage) {
            OrderStage::Executing(order) => {
                self.stage = OrderStage::Failed {
                    order,
                    error: error.into(),
                };
                Ok(())
            }
            other => Err(self.restore("fail execution", other)),
        }
    }

    /// Return a failed order to `ConfirmationPending`.
    pub fn retry(&mut self) -> Result<()> {
        match std::mem::take(&mut self.stage) {
            OrderStage::Failed { order, .. } => {
                self.stage = OrderStage::ConfirmationPending(order);
                Ok(())
            }
            other => Err(self.restore("retry", other)),
        }
    }

    /// Discard whatever is staged and return to `Idle`.
    ///
    /// Not allowed while a request is in flight.
    pub fn cancel(&mut self) -> Result<()> {
        if self.stage.is_executing() {
            return Err(Error::InvalidTransition {
                action: "cancel",
                stage: self.stage.name(),
            });
        }
        self.stage = OrderStage::Idle;
        Ok(())
    }

    fn restore(&mut self, action: &'static str, previous: OrderStage) -> Error {
        let stage = previous.name();
        self.stage = previous;
        Error::InvalidTransition { action, stage }
    }
}
