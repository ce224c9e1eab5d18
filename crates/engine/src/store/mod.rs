/// In-memory store.
pub mod memory;

use std::future::Future;

use quest_model::{
    Address, ClaimId, ClaimKind, ClaimStatus, CustomCode, Decimal, TaskKind, TaskStatus, UserId,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use memory::{MemoryStore, Snapshot};

/// Uniqueness constraints enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Constraint {
    /// One user per id.
    User,
    /// One wallet per user.
    WalletUser,
    /// One user per wallet address.
    WalletAddress,
    /// One custom code per owner, one owner per custom code.
    CustomCode,
    /// One referral row per referred user.
    ReferredUser,
    /// No referral in both directions between two users.
    MutualReferral,
    /// One active task claim per (user, kind).
    ActiveClaim,
    /// One referral claim per (referrer, referred user).
    ReferralClaim,
}

/// Write-once fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    /// The referrer of a user.
    ReferredBy,
    /// The custom code of a user.
    CustomCode,
}

/// Store Error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint would be violated.
    #[error("unique violation: {0}")]
    UniqueViolation(Constraint),
    /// A write-once field has already been written.
    #[error("`{0}` has been set")]
    AlreadySet(Field),
    /// Record not found.
    #[error("not found")]
    NotFound,
    /// Backend failure.
    #[error("backend: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a backend error.
    pub fn backend(msg: impl ToString) -> Self {
        Self::Backend(msg.to_string())
    }

    /// Returns whether this is a violation of the given constraint.
    pub fn is_unique_violation(&self, constraint: Constraint) -> bool {
        matches!(self, Self::UniqueViolation(c) if *c == constraint)
    }
}

/// Result type of store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// User.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Id.
    pub id: UserId,
    /// The referrer. Written at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<UserId>,
    /// Custom referral code. Written at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_code: Option<CustomCode>,
    /// Banned flag.
    #[serde(default)]
    pub banned: bool,
    /// Experience points.
    #[serde(default)]
    pub xp: u64,
}

impl User {
    /// Create a new user.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            referred_by: None,
            custom_code: None,
            banned: false,
            xp: 0,
        }
    }
}

/// Wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owner.
    pub user: UserId,
    /// Address used for all on-chain aggregation.
    pub address: Address,
}

/// Progress of a user on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignProgress {
    /// User.
    pub user: UserId,
    /// Task.
    pub task: TaskKind,
    /// Aggregated USD value.
    pub total_usd: Decimal,
    /// Status.
    pub status: TaskStatus,
    /// Last update.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Structured details of a claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDetails {
    /// The referred user of a referral claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referred_id: Option<UserId>,
    /// Aggregated USD value of the task at request time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_usd: Option<Decimal>,
}

/// A claim to be inserted.
#[derive(Debug, Clone)]
pub struct NewClaim {
    /// Claimant.
    pub user: UserId,
    /// Kind.
    pub kind: ClaimKind,
    /// Reward amount in USDT.
    pub amount: Decimal,
    /// Address snapshot.
    pub address: Option<Address>,
    /// Details.
    pub details: ClaimDetails,
}

/// Reward claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Id.
    pub id: ClaimId,
    /// Claimant.
    pub user: UserId,
    /// Kind.
    pub kind: ClaimKind,
    /// Status.
    pub status: ClaimStatus,
    /// Reward amount in USDT.
    pub amount: Decimal,
    /// Address snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Details.
    #[serde(default)]
    pub details: ClaimDetails,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last update.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Referral link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    /// Referrer.
    pub referrer: UserId,
    /// Referred user.
    pub referred: UserId,
    /// The code used.
    pub code: String,
    /// Link time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Reward quota of a task.
///
/// The counters are informational and never block a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardQuota {
    /// Task.
    pub task: TaskKind,
    /// Total rewards.
    pub total: u64,
    /// Remaining rewards.
    pub remaining: u64,
}

/// Users, owned by the user management collaborator.
pub trait UserDirectory: Send + Sync {
    /// Get user by id.
    fn user(&self, id: UserId) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Find the owner of a custom code.
    fn find_by_custom_code(
        &self,
        code: &CustomCode,
    ) -> impl Future<Output = StoreResult<Option<User>>> + Send;

    /// Returns whether the custom code is not owned by anyone.
    fn is_custom_code_available(
        &self,
        code: &CustomCode,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Set the referrer of a user.
    ///
    /// # Errors
    /// - [`StoreError::AlreadySet`] if the referrer has been set.
    fn set_referred_by(
        &self,
        id: UserId,
        referrer: UserId,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Set the custom code of a user.
    ///
    /// # Errors
    /// - [`StoreError::AlreadySet`] if the user has a custom code.
    /// - [`StoreError::UniqueViolation`] if the code is owned by another user.
    fn set_custom_code(
        &self,
        id: UserId,
        code: &CustomCode,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Add experience points to a user.
    fn add_xp(&self, id: UserId, amount: u64) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Wallets, owned by the user management collaborator.
pub trait WalletDirectory: Send + Sync {
    /// Get the wallet of a user.
    fn wallet_by_user(&self, user: UserId)
        -> impl Future<Output = StoreResult<Option<Wallet>>> + Send;

    /// Get all wallets.
    fn all_wallets(&self) -> impl Future<Output = StoreResult<Vec<Wallet>>> + Send;
}

/// Task progress records.
pub trait ProgressStore: Send + Sync {
    /// Get the progress of a user on a task.
    fn progress(
        &self,
        user: UserId,
        task: TaskKind,
    ) -> impl Future<Output = StoreResult<Option<CampaignProgress>>> + Send;

    /// Insert or replace the progress keyed by (user, task).
    ///
    /// The stored status never moves backwards: it becomes the greater of the
    /// existing and the given one. When the stored status becomes qualified
    /// for the first time, `xp` is added to the user in the same write.
    /// Returns the previous status.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] without writing anything if XP is due and
    ///   the user does not exist.
    fn upsert_progress(
        &self,
        progress: CampaignProgress,
        xp: u64,
    ) -> impl Future<Output = StoreResult<Option<TaskStatus>>> + Send;
}

/// Claim records.
pub trait ClaimStore: Send + Sync {
    /// Insert a claim with its initial status.
    ///
    /// # Errors
    /// - [`StoreError::UniqueViolation`] with [`Constraint::ActiveClaim`] if an active
    ///   claim of the same (user, kind) exists.
    /// - [`StoreError::UniqueViolation`] with [`Constraint::ReferralClaim`] if a referral
    ///   claim of the same (referrer, referred user) exists.
    fn insert_claim(&self, claim: NewClaim) -> impl Future<Output = StoreResult<Claim>> + Send;

    /// Get claim by id.
    fn claim(&self, id: ClaimId) -> impl Future<Output = StoreResult<Option<Claim>>> + Send;

    /// Get the latest claim of a user of the given kind.
    fn latest_claim(
        &self,
        user: UserId,
        kind: ClaimKind,
    ) -> impl Future<Output = StoreResult<Option<Claim>>> + Send;

    /// Get all claims of a user.
    fn claims_by_user(&self, user: UserId) -> impl Future<Output = StoreResult<Vec<Claim>>> + Send;

    /// Get all claims with the given status.
    fn claims_with_status(
        &self,
        status: ClaimStatus,
    ) -> impl Future<Output = StoreResult<Vec<Claim>>> + Send;

    /// Move a claim from `from` to `to`.
    ///
    /// Returns `None` without writing if the current status is not `from`.
    fn compare_and_set_status(
        &self,
        id: ClaimId,
        from: ClaimStatus,
        to: ClaimStatus,
    ) -> impl Future<Output = StoreResult<Option<Claim>>> + Send;
}

/// Referral records.
pub trait ReferralStore: Send + Sync {
    /// Insert a referral and set the referrer of the referred user in one write.
    ///
    /// # Errors
    /// - [`StoreError::NotFound`] if the referred user does not exist.
    /// - [`StoreError::UniqueViolation`] with [`Constraint::ReferredUser`] or
    ///   [`StoreError::AlreadySet`] with [`Field::ReferredBy`] if the referred
    ///   user has been linked.
    /// - [`StoreError::UniqueViolation`] with [`Constraint::MutualReferral`] if
    ///   the referrer was referred by the referred user.
    fn link(&self, referral: Referral) -> impl Future<Output = StoreResult<()>> + Send;

    /// Get the referral of a referred user.
    fn referral_of(
        &self,
        referred: UserId,
    ) -> impl Future<Output = StoreResult<Option<Referral>>> + Send;

    /// Get all referrals of a referrer.
    fn referrals_by(
        &self,
        referrer: UserId,
    ) -> impl Future<Output = StoreResult<Vec<Referral>>> + Send;
}

/// Reward quota counters.
pub trait QuotaStore: Send + Sync {
    /// Get all quotas.
    fn quotas(&self) -> impl Future<Output = StoreResult<Vec<RewardQuota>>> + Send;

    /// Decrease the remaining counter of a task, saturating at zero.
    fn consume_quota(
        &self,
        task: TaskKind,
    ) -> impl Future<Output = StoreResult<Option<RewardQuota>>> + Send;
}

/// All the records the engine works with.
pub trait Store:
    UserDirectory + WalletDirectory + ProgressStore + ClaimStore + ReferralStore + QuotaStore
{
}

impl<T> Store for T where
    T: UserDirectory + WalletDirectory + ProgressStore + ClaimStore + ReferralStore + QuotaStore
{
}
