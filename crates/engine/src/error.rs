use quest_model::{ClaimStatus, Decimal};

use crate::{chain::Network, store::StoreError};

/// Engine Error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed address.
    #[error("invalid address")]
    InvalidAddress,
    /// Malformed or unknown referral code.
    #[error("invalid code: {0}")]
    InvalidCode(String),
    /// Malformed custom code.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// User not found.
    #[error("user not found")]
    UserNotFound,
    /// The user has no wallet.
    #[error("wallet not found")]
    WalletNotFound,
    /// The user is banned.
    #[error("user is banned")]
    Banned,
    /// The task threshold has not been reached.
    #[error("not eligible: {total_usd} of {target} USD")]
    NotEligible {
        /// Current aggregated value.
        total_usd: Decimal,
        /// Target value.
        target: Decimal,
    },
    /// An active claim already exists.
    #[error("already claimed")]
    AlreadyClaimed,
    /// Claim not found.
    #[error("claim not found")]
    ClaimNotFound,
    /// The claim has already been decided the other way.
    #[error("claim has been finalized as `{0}`")]
    ClaimFinalized(ClaimStatus),
    /// The user has already been linked to a referrer.
    #[error("already referred")]
    AlreadyReferred,
    /// The code belongs to the user itself.
    #[error("self referral is not allowed")]
    SelfReferral,
    /// The referrer was referred by the user.
    #[error("mutual referral is not allowed")]
    MutualReferral,
    /// The user has already registered a custom code.
    #[error("custom code has been set")]
    AlreadyHasCode,
    /// The custom code is owned by another user.
    #[error("code taken")]
    CodeTaken,
    /// Rate limited.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited {
        /// Seconds to wait.
        retry_after: u64,
    },
    /// The network is not supported by the reader.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(Network),
    /// Timeout.
    #[error("timeout")]
    Timeout,
    /// Activity could not be aggregated and no previous value exists.
    #[error("activity unavailable")]
    Unavailable,
    /// Transport error.
    #[error("transport: {0}")]
    Transport(String),
    /// Store error.
    #[error("store: {0}")]
    Store(#[from] StoreError),
    /// Reqwest error.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Parse url error.
    #[error("parse url: {0}")]
    ParseUrl(#[from] url::ParseError),
    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// Unknown error.
    #[error("unknown: {0}")]
    Unknown(String),
}

/// Classification of [`Error`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input. No state has changed.
    Validation,
    /// A precondition does not hold. No state has changed.
    Precondition,
    /// Rate limited. Retrying later may succeed.
    RateLimited,
    /// An external collaborator failed.
    Collaborator,
    /// The record store failed.
    Storage,
    /// Anything else.
    Internal,
}

impl Error {
    /// Create an unknown error.
    pub fn unknown(msg: impl ToString) -> Self {
        Self::Unknown(msg.to_string())
    }

    /// Create an "invalid argument" error.
    pub fn invalid_argument(msg: impl ToString) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    /// Create a transport error.
    pub fn transport(msg: impl ToString) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddress
            | Self::InvalidCode(_)
            | Self::InvalidFormat(_)
            | Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::UserNotFound
            | Self::WalletNotFound
            | Self::Banned
            | Self::NotEligible { .. }
            | Self::AlreadyClaimed
            | Self::ClaimNotFound
            | Self::ClaimFinalized(_)
            | Self::AlreadyReferred
            | Self::SelfReferral
            | Self::MutualReferral
            | Self::AlreadyHasCode
            | Self::CodeTaken => ErrorKind::Precondition,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::UnsupportedNetwork(_)
            | Self::Timeout
            | Self::Unavailable
            | Self::Transport(_)
            | Self::Reqwest(_) => ErrorKind::Collaborator,
            Self::Store(_) => ErrorKind::Storage,
            Self::ParseUrl(_) | Self::Json(_) | Self::Unknown(_) => ErrorKind::Internal,
        }
    }

    /// Returns whether the message of this error may be shown to end users.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Precondition | ErrorKind::RateLimited
        )
    }
}

impl From<quest_model::Error> for Error {
    fn from(err: quest_model::Error) -> Self {
        match err {
            quest_model::Error::InvalidAddress => Self::InvalidAddress,
            quest_model::Error::InvalidCode(msg) => Self::InvalidCode(msg.to_string()),
            quest_model::Error::InvalidTransition { from, .. } => Self::ClaimFinalized(from),
            quest_model::Error::InvalidArgument(msg) => Self::InvalidArgument(msg.to_string()),
        }
    }
}
