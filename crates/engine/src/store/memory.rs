use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use quest_model::{
    Address, ClaimId, ClaimKind, ClaimStatus, CustomCode, TaskKind, TaskStatus, UserId,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{
    CampaignProgress, Claim, ClaimStore, Constraint, Field, NewClaim, ProgressStore, QuotaStore,
    Referral, ReferralStore, RewardQuota, StoreError, StoreResult, User, UserDirectory, Wallet,
    WalletDirectory,
};

/// Serializable content of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Users.
    #[serde(default)]
    pub users: Vec<User>,
    /// Wallets.
    #[serde(default)]
    pub wallets: Vec<Wallet>,
    /// Task progress.
    #[serde(default)]
    pub progress: Vec<CampaignProgress>,
    /// Claims.
    #[serde(default)]
    pub claims: Vec<Claim>,
    /// Referrals.
    #[serde(default)]
    pub referrals: Vec<Referral>,
    /// Reward quotas.
    #[serde(default)]
    pub quotas: Vec<RewardQuota>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    custom_codes: HashMap<CustomCode, UserId>,
    wallets: BTreeMap<UserId, Wallet>,
    addresses: HashMap<Address, UserId>,
    progress: BTreeMap<(UserId, TaskKind), CampaignProgress>,
    claims: BTreeMap<ClaimId, Claim>,
    next_claim_id: u64,
    referrals: BTreeMap<UserId, Referral>,
    quotas: BTreeMap<TaskKind, RewardQuota>,
}

impl Tables {
    fn insert_user(&mut self, user: User) -> StoreResult<()> {
        if self.users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation(Constraint::User));
        }
        if let Some(code) = user.custom_code.as_ref() {
            if self.custom_codes.contains_key(code) {
                return Err(StoreError::UniqueViolation(Constraint::CustomCode));
            }
            self.custom_codes.insert(code.clone(), user.id);
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    fn check_wallet(&self, wallet: &Wallet) -> StoreResult<()> {
        if self.wallets.contains_key(&wallet.user) {
            return Err(StoreError::UniqueViolation(Constraint::WalletUser));
        }
        if self.addresses.contains_key(&wallet.address) {
            return Err(StoreError::UniqueViolation(Constraint::WalletAddress));
        }
        Ok(())
    }

    fn insert_wallet(&mut self, wallet: Wallet) -> StoreResult<()> {
        self.check_wallet(&wallet)?;
        self.addresses.insert(wallet.address.clone(), wallet.user);
        self.wallets.insert(wallet.user, wallet);
        Ok(())
    }

    fn check_claim(
        &self,
        user: UserId,
        kind: ClaimKind,
        referred: Option<UserId>,
    ) -> StoreResult<()> {
        match kind {
            ClaimKind::Referral => {
                if referred.is_none() {
                    return Err(StoreError::backend("referral claim without referred user"));
                }
                let exists = self.claims.values().any(|claim| {
                    claim.kind == ClaimKind::Referral
                        && claim.user == user
                        && claim.details.referred_id == referred
                });
                if exists {
                    return Err(StoreError::UniqueViolation(Constraint::ReferralClaim));
                }
            }
            ClaimKind::Swap | ClaimKind::Deposit => {
                let exists = self.claims.values().any(|claim| {
                    claim.kind == kind && claim.user == user && claim.status.is_active()
                });
                if exists {
                    return Err(StoreError::UniqueViolation(Constraint::ActiveClaim));
                }
            }
        }
        Ok(())
    }

    fn insert_existing_claim(&mut self, claim: Claim) -> StoreResult<()> {
        if claim.status.is_active() || claim.kind == ClaimKind::Referral {
            self.check_claim(claim.user, claim.kind, claim.details.referred_id)?;
        }
        self.next_claim_id = self.next_claim_id.max(claim.id.0.saturating_add(1));
        self.claims.insert(claim.id, claim);
        Ok(())
    }

    fn insert_referral(&mut self, referral: Referral) -> StoreResult<()> {
        if self.referrals.contains_key(&referral.referred) {
            return Err(StoreError::UniqueViolation(Constraint::ReferredUser));
        }
        self.referrals.insert(referral.referred, referral);
        Ok(())
    }
}

/// A [`Store`](super::Store) keeping every record in memory.
///
/// Uniqueness constraints and write-once fields are enforced under a single
/// lock, so every write is atomic. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore(Arc<RwLock<Tables>>);

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from a snapshot, checking every constraint.
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let mut tables = Tables {
            next_claim_id: 1,
            ..Default::default()
        };
        for user in snapshot.users {
            tables.insert_user(user)?;
        }
        for wallet in snapshot.wallets {
            tables.insert_wallet(wallet)?;
        }
        for progress in snapshot.progress {
            tables
                .progress
                .insert((progress.user, progress.task), progress);
        }
        for claim in snapshot.claims {
            tables.insert_existing_claim(claim)?;
        }
        for referral in snapshot.referrals {
            tables.insert_referral(referral)?;
        }
        for quota in snapshot.quotas {
            tables.quotas.insert(quota.task, quota);
        }
        Ok(Self(Arc::new(RwLock::new(tables))))
    }

    /// Take a snapshot of all records.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        let tables = self.read()?;
        Ok(Snapshot {
            users: tables.users.values().cloned().collect(),
            wallets: tables.wallets.values().cloned().collect(),
            progress: tables.progress.values().cloned().collect(),
            claims: tables.claims.values().cloned().collect(),
            referrals: tables.referrals.values().cloned().collect(),
            quotas: tables.quotas.values().cloned().collect(),
        })
    }

    /// Insert a user.
    ///
    /// # Errors
    /// - [`StoreError::UniqueViolation`] with [`Constraint::User`] if the id
    ///   exists, or with [`Constraint::CustomCode`] if the code is owned.
    pub fn insert_user(&self, user: User) -> StoreResult<()> {
        self.write()?.insert_user(user)
    }

    /// Create a user, or update the banned flag of an existing one, and
    /// attach its wallet in the same write.
    ///
    /// Nothing is written if the wallet conflicts with an existing one.
    pub fn register(
        &self,
        id: UserId,
        banned: bool,
        address: Option<Address>,
    ) -> StoreResult<()> {
        let mut tables = self.write()?;
        let wallet = address.map(|address| Wallet { user: id, address });
        if let Some(wallet) = wallet.as_ref() {
            tables.check_wallet(wallet)?;
        }
        tables
            .users
            .entry(id)
            .or_insert_with(|| User::new(id))
            .banned = banned;
        if let Some(wallet) = wallet {
            tables.insert_wallet(wallet)?;
        }
        Ok(())
    }

    /// Insert a wallet.
    pub fn insert_wallet(&self, wallet: Wallet) -> StoreResult<()> {
        self.write()?.insert_wallet(wallet)
    }

    /// Set the banned flag of a user.
    pub fn set_banned(&self, id: UserId, banned: bool) -> StoreResult<()> {
        let mut tables = self.write()?;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.banned = banned;
        Ok(())
    }

    /// Reset the quota of a task.
    pub fn set_quota(&self, task: TaskKind, total: u64) -> StoreResult<()> {
        self.write()?.quotas.insert(
            task,
            RewardQuota {
                task,
                total,
                remaining: total,
            },
        );
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.0
            .read()
            .map_err(|_| StoreError::backend("memory store poisoned"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.0
            .write()
            .map_err(|_| StoreError::backend("memory store poisoned"))
    }
}

impl UserDirectory for MemoryStore {
    async fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_by_custom_code(&self, code: &CustomCode) -> StoreResult<Option<User>> {
        let tables = self.read()?;
        Ok(tables
            .custom_codes
            .get(code)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn is_custom_code_available(&self, code: &CustomCode) -> StoreResult<bool> {
        Ok(!self.read()?.custom_codes.contains_key(code))
    }

    async fn set_referred_by(&self, id: UserId, referrer: UserId) -> StoreResult<()> {
        let mut tables = self.write()?;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if user.referred_by.is_some() {
            return Err(StoreError::AlreadySet(Field::ReferredBy));
        }
        user.referred_by = Some(referrer);
        Ok(())
    }

    async fn set_custom_code(&self, id: UserId, code: &CustomCode) -> StoreResult<()> {
        let mut tables = self.write()?;
        let Tables {
            users,
            custom_codes,
            ..
        } = &mut *tables;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if user.custom_code.is_some() {
            return Err(StoreError::AlreadySet(Field::CustomCode));
        }
        if custom_codes.contains_key(code) {
            return Err(StoreError::UniqueViolation(Constraint::CustomCode));
        }
        custom_codes.insert(code.clone(), id);
        user.custom_code = Some(code.clone());
        Ok(())
    }

    async fn add_xp(&self, id: UserId, amount: u64) -> StoreResult<()> {
        let mut tables = self.write()?;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.xp = user.xp.saturating_add(amount);
        Ok(())
    }
}

impl WalletDirectory for MemoryStore {
    async fn wallet_by_user(&self, user: UserId) -> StoreResult<Option<Wallet>> {
        Ok(self.read()?.wallets.get(&user).cloned())
    }

    async fn all_wallets(&self) -> StoreResult<Vec<Wallet>> {
        Ok(self.read()?.wallets.values().cloned().collect())
    }
}

impl ProgressStore for MemoryStore {
    async fn progress(
        &self,
        user: UserId,
        task: TaskKind,
    ) -> StoreResult<Option<CampaignProgress>> {
        Ok(self.read()?.progress.get(&(user, task)).cloned())
    }

    async fn upsert_progress(
        &self,
        mut progress: CampaignProgress,
        xp: u64,
    ) -> StoreResult<Option<TaskStatus>> {
        let mut tables = self.write()?;
        let key = (progress.user, progress.task);
        let previous = tables.progress.get(&key).map(|stored| stored.status);
        if let Some(status) = previous {
            progress.status = progress.status.max(status);
        }
        let reached =
            !previous.unwrap_or_default().is_qualified() && progress.status.is_qualified();
        if reached {
            let user = tables
                .users
                .get_mut(&progress.user)
                .ok_or(StoreError::NotFound)?;
            user.xp = user.xp.saturating_add(xp);
        }
        tables.progress.insert(key, progress);
        Ok(previous)
    }
}

impl ClaimStore for MemoryStore {
    async fn insert_claim(&self, claim: NewClaim) -> StoreResult<Claim> {
        let mut tables = self.write()?;
        tables.check_claim(claim.user, claim.kind, claim.details.referred_id)?;
        let id = ClaimId(tables.next_claim_id.max(1));
        tables.next_claim_id = id.0.saturating_add(1);
        let now = OffsetDateTime::now_utc();
        let claim = Claim {
            id,
            user: claim.user,
            kind: claim.kind,
            status: ClaimStatus::initial(claim.kind),
            amount: claim.amount,
            address: claim.address,
            details: claim.details,
            created_at: now,
            updated_at: now,
        };
        tables.claims.insert(id, claim.clone());
        Ok(claim)
    }

    async fn claim(&self, id: ClaimId) -> StoreResult<Option<Claim>> {
        Ok(self.read()?.claims.get(&id).cloned())
    }

    async fn latest_claim(&self, user: UserId, kind: ClaimKind) -> StoreResult<Option<Claim>> {
        Ok(self
            .read()?
            .claims
            .values()
            .rev()
            .find(|claim| claim.user == user && claim.kind == kind)
            .cloned())
    }

    async fn claims_by_user(&self, user: UserId) -> StoreResult<Vec<Claim>> {
        Ok(self
            .read()?
            .claims
            .values()
            .filter(|claim| claim.user == user)
            .cloned()
            .collect())
    }

    async fn claims_with_status(&self, status: ClaimStatus) -> StoreResult<Vec<Claim>> {
        Ok(self
            .read()?
            .claims
            .values()
            .filter(|claim| claim.status == status)
            .cloned()
            .collect())
    }

    async fn compare_and_set_status(
        &self,
        id: ClaimId,
        from: ClaimStatus,
        to: ClaimStatus,
    ) -> StoreResult<Option<Claim>> {
        let mut tables = self.write()?;
        let claim = tables.claims.get_mut(&id).ok_or(StoreError::NotFound)?;
        if claim.status != from {
            return Ok(None);
        }
        claim.status = to;
        claim.updated_at = OffsetDateTime::now_utc();
        Ok(Some(claim.clone()))
    }
}

impl ReferralStore for MemoryStore {
    async fn link(&self, referral: Referral) -> StoreResult<()> {
        let mut tables = self.write()?;
        let reverse = tables
            .referrals
            .get(&referral.referrer)
            .is_some_and(|existing| existing.referrer == referral.referred);
        if reverse {
            return Err(StoreError::UniqueViolation(Constraint::MutualReferral));
        }
        let user = tables
            .users
            .get(&referral.referred)
            .ok_or(StoreError::NotFound)?;
        if user.referred_by.is_some() {
            return Err(StoreError::AlreadySet(Field::ReferredBy));
        }
        let (referred, referrer) = (referral.referred, referral.referrer);
        tables.insert_referral(referral)?;
        if let Some(user) = tables.users.get_mut(&referred) {
            user.referred_by = Some(referrer);
        }
        Ok(())
    }

    async fn referral_of(&self, referred: UserId) -> StoreResult<Option<Referral>> {
        Ok(self.read()?.referrals.get(&referred).cloned())
    }

    async fn referrals_by(&self, referrer: UserId) -> StoreResult<Vec<Referral>> {
        Ok(self
            .read()?
            .referrals
            .values()
            .filter(|referral| referral.referrer == referrer)
            .cloned()
            .collect())
    }
}

impl QuotaStore for MemoryStore {
    async fn quotas(&self) -> StoreResult<Vec<RewardQuota>> {
        Ok(self.read()?.quotas.values().cloned().collect())
    }

    async fn consume_quota(&self, task: TaskKind) -> StoreResult<Option<RewardQuota>> {
        let mut tables = self.write()?;
        Ok(tables.quotas.get_mut(&task).map(|quota| {
            quota.remaining = quota.remaining.saturating_sub(1);
            quota.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use quest_model::Decimal;

    use super::*;
    use crate::store::ClaimDetails;

    fn address(n: u8) -> Address {
        format!("0x{:040x}", n).parse().unwrap()
    }

    fn new_claim(user: u64, kind: ClaimKind, referred: Option<u64>) -> NewClaim {
        NewClaim {
            user: UserId(user),
            kind,
            amount: Decimal::ONE,
            address: None,
            details: ClaimDetails {
                referred_id: referred.map(UserId),
                total_usd: None,
            },
        }
    }

    #[tokio::test]
    async fn wallet_is_one_to_one() {
        let store = MemoryStore::new();
        store
            .insert_wallet(Wallet {
                user: UserId(1),
                address: address(1),
            })
            .unwrap();
        assert_eq!(
            store.insert_wallet(Wallet {
                user: UserId(1),
                address: address(2),
            }),
            Err(StoreError::UniqueViolation(Constraint::WalletUser))
        );
        assert_eq!(
            store.insert_wallet(Wallet {
                user: UserId(2),
                address: address(1),
            }),
            Err(StoreError::UniqueViolation(Constraint::WalletAddress))
        );
        assert_eq!(store.all_wallets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn write_once_fields() {
        let store = MemoryStore::new();
        store.insert_user(User::new(UserId(1))).unwrap();
        store.insert_user(User::new(UserId(2))).unwrap();
        let code: CustomCode = "alpha".parse().unwrap();

        store.set_referred_by(UserId(1), UserId(2)).await.unwrap();
        assert_eq!(
            store.set_referred_by(UserId(1), UserId(3)).await,
            Err(StoreError::AlreadySet(Field::ReferredBy))
        );

        store.set_custom_code(UserId(1), &code).await.unwrap();
        assert_eq!(
            store.set_custom_code(UserId(1), &"beta".parse().unwrap()).await,
            Err(StoreError::AlreadySet(Field::CustomCode))
        );
        assert_eq!(
            store.set_custom_code(UserId(2), &code).await,
            Err(StoreError::UniqueViolation(Constraint::CustomCode))
        );
        assert!(!store.is_custom_code_available(&code).await.unwrap());
        assert_eq!(
            store.find_by_custom_code(&code).await.unwrap().map(|u| u.id),
            Some(UserId(1))
        );
    }

    #[tokio::test]
    async fn rejected_claims_do_not_block() {
        let store = MemoryStore::new();
        let claim = store
            .insert_claim(new_claim(1, ClaimKind::Swap, None))
            .await
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::Processing);
        assert_eq!(
            store
                .insert_claim(new_claim(1, ClaimKind::Swap, None))
                .await
                .unwrap_err(),
            StoreError::UniqueViolation(Constraint::ActiveClaim)
        );
        // Other kinds and users are independent.
        store
            .insert_claim(new_claim(1, ClaimKind::Deposit, None))
            .await
            .unwrap();
        store
            .insert_claim(new_claim(2, ClaimKind::Swap, None))
            .await
            .unwrap();

        store
            .compare_and_set_status(claim.id, ClaimStatus::Processing, ClaimStatus::Rejected)
            .await
            .unwrap()
            .unwrap();
        let retry = store
            .insert_claim(new_claim(1, ClaimKind::Swap, None))
            .await
            .unwrap();
        assert!(retry.id > claim.id);
        assert_eq!(
            store.latest_claim(UserId(1), ClaimKind::Swap).await.unwrap(),
            Some(retry)
        );
    }

    #[tokio::test]
    async fn referral_claims_are_keyed_by_referred_user() {
        let store = MemoryStore::new();
        let claim = store
            .insert_claim(new_claim(1, ClaimKind::Referral, Some(2)))
            .await
            .unwrap();
        assert_eq!(claim.status, ClaimStatus::Eligible);
        store
            .insert_claim(new_claim(1, ClaimKind::Referral, Some(3)))
            .await
            .unwrap();
        assert_eq!(
            store
                .insert_claim(new_claim(1, ClaimKind::Referral, Some(2)))
                .await
                .unwrap_err(),
            StoreError::UniqueViolation(Constraint::ReferralClaim)
        );
    }

    #[tokio::test]
    async fn compare_and_set_checks_current_status() {
        let store = MemoryStore::new();
        let claim = store
            .insert_claim(new_claim(1, ClaimKind::Deposit, None))
            .await
            .unwrap();
        assert!(store
            .compare_and_set_status(claim.id, ClaimStatus::Eligible, ClaimStatus::Claimed)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store
                .compare_and_set_status(ClaimId(99), ClaimStatus::Processing, ClaimStatus::Claimed)
                .await,
            Err(StoreError::NotFound)
        );
    }

    fn progress_record(user: u64, status: TaskStatus) -> CampaignProgress {
        CampaignProgress {
            user: UserId(user),
            task: TaskKind::Swap,
            total_usd: Decimal::TEN,
            status,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn progress_status_never_moves_backwards() {
        let store = MemoryStore::new();
        store.insert_user(User::new(UserId(1))).unwrap();
        assert_eq!(
            store
                .upsert_progress(progress_record(1, TaskStatus::Completed), 0)
                .await,
            Ok(None)
        );
        assert_eq!(
            store
                .upsert_progress(progress_record(1, TaskStatus::Eligible), 0)
                .await,
            Ok(Some(TaskStatus::Completed))
        );
        let stored = store.progress(UserId(1), TaskKind::Swap).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn xp_is_written_with_the_first_qualified_status() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .upsert_progress(progress_record(1, TaskStatus::Eligible), 100)
                .await,
            Err(StoreError::NotFound)
        );
        assert_eq!(store.progress(UserId(1), TaskKind::Swap).await, Ok(None));

        store.insert_user(User::new(UserId(1))).unwrap();
        store
            .upsert_progress(progress_record(1, TaskStatus::InProgress), 100)
            .await
            .unwrap();
        assert_eq!(store.user(UserId(1)).await.unwrap().unwrap().xp, 0);
        for status in [TaskStatus::Eligible, TaskStatus::Completed, TaskStatus::Eligible] {
            store
                .upsert_progress(progress_record(1, status), 100)
                .await
                .unwrap();
        }
        assert_eq!(store.user(UserId(1)).await.unwrap().unwrap().xp, 100);
    }

    #[tokio::test]
    async fn existing_users_are_not_replaced() {
        let store = MemoryStore::new();
        store.insert_user(User::new(UserId(1))).unwrap();
        store.set_referred_by(UserId(1), UserId(3)).await.unwrap();
        store.add_xp(UserId(1), 50).await.unwrap();

        let mut replacement = User::new(UserId(1));
        replacement.referred_by = Some(UserId(9));
        assert_eq!(
            store.insert_user(replacement),
            Err(StoreError::UniqueViolation(Constraint::User))
        );
        let user = store.user(UserId(1)).await.unwrap().unwrap();
        assert_eq!(user.referred_by, Some(UserId(3)));
        assert_eq!(user.xp, 50);

        let mut other = User::new(UserId(2));
        other.custom_code = Some("alpha".parse().unwrap());
        store.insert_user(other).unwrap();
        let mut thief = User::new(UserId(4));
        thief.custom_code = Some("ALPHA".parse().unwrap());
        assert_eq!(
            store.insert_user(thief),
            Err(StoreError::UniqueViolation(Constraint::CustomCode))
        );
        assert_eq!(store.user(UserId(4)).await, Ok(None));
    }

    #[tokio::test]
    async fn register_writes_nothing_on_wallet_conflict() {
        let store = MemoryStore::new();
        store.register(UserId(1), false, Some(address(1))).unwrap();
        assert_eq!(
            store.register(UserId(2), true, Some(address(1))),
            Err(StoreError::UniqueViolation(Constraint::WalletAddress))
        );
        assert_eq!(store.user(UserId(2)).await, Ok(None));

        assert_eq!(
            store.register(UserId(1), true, Some(address(2))),
            Err(StoreError::UniqueViolation(Constraint::WalletUser))
        );
        assert!(!store.user(UserId(1)).await.unwrap().unwrap().banned);

        store.register(UserId(1), true, None).unwrap();
        assert!(store.user(UserId(1)).await.unwrap().unwrap().banned);
        assert_eq!(store.all_wallets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn link_is_one_write() {
        let store = MemoryStore::new();
        for id in 1..=3 {
            store.insert_user(User::new(UserId(id))).unwrap();
        }
        let referral = |referrer: u64, referred: u64| Referral {
            referrer: UserId(referrer),
            referred: UserId(referred),
            code: referrer.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };

        store.link(referral(1, 2)).await.unwrap();
        assert_eq!(
            store.user(UserId(2)).await.unwrap().unwrap().referred_by,
            Some(UserId(1))
        );
        assert_eq!(
            store.referral_of(UserId(2)).await.unwrap().map(|r| r.referrer),
            Some(UserId(1))
        );

        assert_eq!(
            store.link(referral(2, 1)).await,
            Err(StoreError::UniqueViolation(Constraint::MutualReferral))
        );
        assert_eq!(store.user(UserId(1)).await.unwrap().unwrap().referred_by, None);
        assert_eq!(store.referral_of(UserId(1)).await, Ok(None));

        assert_eq!(
            store.link(referral(3, 2)).await,
            Err(StoreError::AlreadySet(Field::ReferredBy))
        );
        assert_eq!(store.link(referral(1, 7)).await, Err(StoreError::NotFound));
        assert_eq!(store.referrals_by(UserId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_restores_constraints() {
        let store = MemoryStore::new();
        store.insert_user(User::new(UserId(1))).unwrap();
        store
            .insert_wallet(Wallet {
                user: UserId(1),
                address: address(1),
            })
            .unwrap();
        store.set_quota(TaskKind::Swap, 10).unwrap();
        let claim = store
            .insert_claim(new_claim(1, ClaimKind::Swap, None))
            .await
            .unwrap();

        let snapshot = store.snapshot().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot().unwrap(), snapshot);
        assert_eq!(
            restored
                .insert_claim(new_claim(1, ClaimKind::Swap, None))
                .await
                .unwrap_err(),
            StoreError::UniqueViolation(Constraint::ActiveClaim)
        );
        let next = restored
            .insert_claim(new_claim(1, ClaimKind::Deposit, None))
            .await
            .unwrap();
        assert!(next.id > claim.id);
        assert_eq!(
            restored.consume_quota(TaskKind::Swap).await.unwrap(),
            Some(RewardQuota {
                task: TaskKind::Swap,
                total: 10,
                remaining: 9
            })
        );
    }
}
