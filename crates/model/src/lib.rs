#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Domain model of the task progress and reward claim engine.
//!
//! Everything in this crate is pure: no I/O, no clocks, no storage.

/// Identifiers and addresses.
pub mod id;

/// Tasks and their progress status.
pub mod task;

/// Progress reconciliation.
pub mod reconcile;

/// Reward claims and their state machine.
pub mod claim;

/// Referral codes.
pub mod referral;

/// Error type.
pub mod error;

pub use claim::{AdminAction, ClaimKind, ClaimStatus, Decision, Transition};
pub use error::Error;
pub use id::{Address, ClaimId, UserId};
pub use reconcile::{progress_percent, reconcile, Reconciled, DEAD_BAND};
pub use referral::{CustomCode, ReferralCode};
pub use task::{TaskKind, TaskStatus};

pub use rust_decimal::Decimal;

/// Alias for result.
pub type Result<T> = std::result::Result<T, Error>;
