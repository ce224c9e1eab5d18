use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::TaskStatus;

/// Changes of the aggregated USD value not larger than this are treated as noise.
pub const DEAD_BAND: Decimal = dec!(0.01);

/// Result of reconciling freshly aggregated activity with the stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    /// The status to store.
    pub status: TaskStatus,
    /// Whether the threshold was reached for the first time.
    ///
    /// Side effects that must happen exactly once (awarding XP) are keyed
    /// on this flag.
    pub threshold_reached: bool,
}

impl Reconciled {
    /// Returns whether the status differs from `prior`.
    pub fn is_changed(&self, prior: Option<TaskStatus>) -> bool {
        prior != Some(self.status)
    }
}

/// Map the current aggregated USD value and the prior status to a new status.
///
/// The mapping is monotonic on status: a regression of `current_usd` (reorgs,
/// indexer lag, withdrawals) never demotes a task that has already reached
/// its threshold.
pub fn reconcile(
    current_usd: &Decimal,
    threshold: &Decimal,
    prior: Option<TaskStatus>,
) -> Reconciled {
    let prior_status = prior.unwrap_or_default();
    let reached = *current_usd >= *threshold;
    let status = match prior_status {
        TaskStatus::InProgress if reached => TaskStatus::Eligible,
        status => status,
    };
    Reconciled {
        status,
        threshold_reached: !prior_status.is_qualified() && status.is_qualified(),
    }
}

/// The status after a reward claim has been requested for the task.
pub fn complete(prior: Option<TaskStatus>) -> Reconciled {
    let prior_status = prior.unwrap_or_default();
    Reconciled {
        status: TaskStatus::Completed,
        threshold_reached: !prior_status.is_qualified(),
    }
}

/// Returns whether `current` differs from `stored` by more than [`DEAD_BAND`].
pub fn is_significant_change(stored: &Decimal, current: &Decimal) -> bool {
    (*current - *stored).abs() > DEAD_BAND
}

/// Progress towards `target` in percent, capped at 100 and rounded to 2 decimals.
pub fn progress_percent(total: &Decimal, target: &Decimal) -> Decimal {
    if target.is_zero() || total >= target {
        return dec!(100);
    }
    if total.is_sign_negative() {
        return Decimal::ZERO;
    }
    (*total * dec!(100) / *target).round_dp_with_strategy(2, RoundingStrategy::ToZero)
}
