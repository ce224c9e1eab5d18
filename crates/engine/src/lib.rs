#![deny(missing_docs)]

//! Task progress and reward claim engine.
//!
//! The [`Engine`] aggregates on-chain activity through a [`ChainActivityReader`],
//! reconciles it into per-task progress, runs the reward claim state machine
//! and the referral program on top of a [`Store`], and reports to admins
//! through a [`Notifier`]. [`Poller`]s keep progress up to date in the
//! background.

/// Error type.
pub mod error;

/// Engine options.
pub mod options;

/// Record store.
pub mod store;

/// Chain activity.
pub mod chain;

/// Notifications.
pub mod notify;

/// Rate limiting.
pub mod rate_limit;

/// The engine.
pub mod engine;

/// Progress tracking.
pub mod progress;

/// Claim ledger operations.
pub mod ledger;

/// Referral program.
pub mod referral;

/// Background pollers.
pub mod poller;


pub use chain::{ChainActivityReader, Network};
pub use engine::Engine;
pub use error::{Error, ErrorKind};
pub use notify::Notifier;
pub use options::EngineOptions;
pub use poller::{Poller, PollerHandle};
pub use rate_limit::{Clock, RateLimiter, SystemClock};
pub use store::{Store, StoreError};

pub use quest_model as model;

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
