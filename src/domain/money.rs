use {super::error::PipelineError, serde::Serialize};

/// Non-negative amount in minor units (cents). Invoice arithmetic goes
/// through the checked operations; an overflow is a validation error at
/// the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(cents: i64) -> Result<Self, PipelineError> {
        if cents < 0 {
            return Err(PipelineError::Validation(format!(
                "amount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    /// Line total for `quantity` units.
    pub fn checked_mul(self, quantity: i64) -> Option<MoneyAmount> {
        if quantity < 0 {
            return None;
        }
        self.0.checked_mul(quantity).map(MoneyAmount)
    }
}
