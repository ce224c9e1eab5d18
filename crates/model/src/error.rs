use crate::ClaimStatus;

/// Error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid address.
    #[error("invalid address")]
    InvalidAddress,
    /// Invalid referral code.
    #[error("invalid referral code: {0}")]
    InvalidCode(&'static str),
    /// Invalid claim status transition.
    #[error("invalid claim transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: ClaimStatus,
        /// Requested status.
        to: ClaimStatus,
    },
    /// Invalid Argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
