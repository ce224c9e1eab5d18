use quest_model::{
    Address, ClaimKind, ClaimStatus, CustomCode, Decimal, ReferralCode, TaskKind, UserId,
};
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};
use strum::IntoEnumIterator;
use time::OffsetDateTime;

use crate::{
    chain::ChainActivityReader,
    notify::Notifier,
    store::{Claim, ClaimDetails, Constraint, Field, NewClaim, Referral, Store, StoreError, User},
    Engine,
};

/// Referral summary of a user.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralStats {
    /// User.
    pub user: UserId,
    /// The code to share: the custom code if registered, the default code otherwise.
    #[serde_as(as = "DisplayFromStr")]
    pub code: ReferralCode,
    /// The referrer of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<UserId>,
    /// Number of referred users.
    pub referred: usize,
    /// Number of referral rewards.
    pub rewards: usize,
    /// Total amount of referral rewards that have not been rejected.
    pub earned: Decimal,
}

impl<S, R, N> Engine<S, R, N>
where
    S: Store,
    R: ChainActivityReader,
    N: Notifier,
{
    /// Link `user` to the owner of `code`.
    ///
    /// `address` and `client_ip` key the rate limiter.
    ///
    /// # Errors
    /// - [`Error::InvalidAddress`](crate::Error::InvalidAddress) or
    ///   [`Error::InvalidCode`](crate::Error::InvalidCode) for malformed input,
    ///   and `InvalidCode` for codes nobody owns.
    /// - [`Error::RateLimited`](crate::Error::RateLimited).
    /// - [`Error::SelfReferral`](crate::Error::SelfReferral),
    ///   [`Error::AlreadyReferred`](crate::Error::AlreadyReferred),
    ///   [`Error::MutualReferral`](crate::Error::MutualReferral).
    pub async fn link_referral(
        &self,
        user: UserId,
        address: &str,
        code: &str,
        client_ip: &str,
    ) -> crate::Result<UserId> {
        let address: Address = address.parse()?;
        let code: ReferralCode = code.parse()?;
        self.link_limiter.check(address.as_str(), client_ip)?;

        let account = self.require_user(user).await?;
        let referrer = self.resolve_code(&code).await?;
        if referrer.id == user {
            return Err(crate::Error::SelfReferral);
        }
        if account.referred_by.is_some() {
            return Err(crate::Error::AlreadyReferred);
        }
        if referrer.referred_by == Some(user) {
            return Err(crate::Error::MutualReferral);
        }

        self.store
            .link(Referral {
                referrer: referrer.id,
                referred: user,
                code: code.to_string(),
                created_at: OffsetDateTime::now_utc(),
            })
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation(Constraint::ReferredUser)
                | StoreError::AlreadySet(Field::ReferredBy) => crate::Error::AlreadyReferred,
                StoreError::UniqueViolation(Constraint::MutualReferral) => {
                    crate::Error::MutualReferral
                }
                err => err.into(),
            })?;
        tracing::info!(%user, referrer = %referrer.id, %code, "referral linked");

        if let Err(err) = self.trigger_referral_reward(user).await {
            tracing::warn!(%user, %err, "referral trigger failed");
        }
        Ok(referrer.id)
    }

    /// Register the custom referral code of `user`.
    ///
    /// # Errors
    /// - [`Error::InvalidAddress`](crate::Error::InvalidAddress),
    ///   [`Error::InvalidFormat`](crate::Error::InvalidFormat).
    /// - [`Error::RateLimited`](crate::Error::RateLimited).
    /// - [`Error::AlreadyHasCode`](crate::Error::AlreadyHasCode),
    ///   [`Error::CodeTaken`](crate::Error::CodeTaken).
    pub async fn set_custom_code(
        &self,
        user: UserId,
        address: &str,
        code: &str,
        client_ip: &str,
    ) -> crate::Result<CustomCode> {
        let address: Address = address.parse()?;
        let code: CustomCode = code.parse().map_err(|err| match err {
            quest_model::Error::InvalidCode(msg) => crate::Error::InvalidFormat(msg.to_string()),
            err => err.into(),
        })?;
        self.code_limiter.check(address.as_str(), client_ip)?;

        let account = self.require_user(user).await?;
        if account.custom_code.is_some() {
            return Err(crate::Error::AlreadyHasCode);
        }
        if !self.store.is_custom_code_available(&code).await? {
            return Err(crate::Error::CodeTaken);
        }
        self.store
            .set_custom_code(user, &code)
            .await
            .map_err(|err| match err {
                StoreError::AlreadySet(Field::CustomCode) => crate::Error::AlreadyHasCode,
                StoreError::UniqueViolation(Constraint::CustomCode) => crate::Error::CodeTaken,
                err => err.into(),
            })?;
        tracing::info!(%user, %code, "custom code registered");
        Ok(code)
    }

    /// Create the referral claim of the referrer of `referred` once the
    /// referred user has reached the threshold of every task.
    ///
    /// Returns the created claim. A claim that already exists is not an error.
    pub async fn trigger_referral_reward(&self, referred: UserId) -> crate::Result<Option<Claim>> {
        let Some(referral) = self.store.referral_of(referred).await? else {
            return Ok(None);
        };
        for task in TaskKind::iter() {
            let qualified = self
                .store
                .progress(referred, task)
                .await?
                .is_some_and(|progress| progress.status.is_qualified());
            if !qualified {
                return Ok(None);
            }
        }

        let address = self
            .store
            .wallet_by_user(referral.referrer)
            .await?
            .map(|wallet| wallet.address);
        let claim = match self
            .store
            .insert_claim(NewClaim {
                user: referral.referrer,
                kind: ClaimKind::Referral,
                amount: self.options.referral_reward,
                address,
                details: ClaimDetails {
                    referred_id: Some(referred),
                    total_usd: None,
                },
            })
            .await
        {
            Ok(claim) => claim,
            Err(StoreError::UniqueViolation(Constraint::ReferralClaim)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(referrer = %claim.user, %referred, claim = %claim.id, "referral reward created");
        self.notify_new_claim(&claim);
        Ok(Some(claim))
    }

    /// Get the referral summary of a user.
    pub async fn referral_stats(&self, user: UserId) -> crate::Result<ReferralStats> {
        let account = self.require_user(user).await?;
        let referred = self.store.referrals_by(user).await?.len();
        let rewards = self
            .store
            .claims_by_user(user)
            .await?
            .into_iter()
            .filter(|claim| claim.kind == ClaimKind::Referral)
            .collect::<Vec<_>>();
        let earned = rewards
            .iter()
            .filter(|claim| claim.status != ClaimStatus::Rejected)
            .map(|claim| claim.amount)
            .sum();
        let code = match account.custom_code {
            Some(code) => ReferralCode::Custom(code),
            None => ReferralCode::default_for(user),
        };
        Ok(ReferralStats {
            user,
            code,
            referred_by: account.referred_by,
            referred,
            rewards: rewards.len(),
            earned,
        })
    }

    async fn resolve_code(&self, code: &ReferralCode) -> crate::Result<User> {
        let owner = match code {
            ReferralCode::Default(id) => self.store.user(*id).await?,
            ReferralCode::Custom(code) => self.store.find_by_custom_code(code).await?,
        };
        owner
            .filter(|owner| !owner.banned)
            .ok_or_else(|| crate::Error::InvalidCode("unknown referral code".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test::Fixture;

    const ADDRESS: &str = "0x00000000000000000000000000000000000000AA";

    #[tokio::test]
    async fn link_with_default_and_custom_codes() -> crate::Result<()> {
        let fixture = Fixture::new();
        fixture.user(1);
        fixture.user(2);
        fixture.user(3);

        assert_eq!(
            fixture
                .engine
                .link_referral(UserId(2), ADDRESS, "1", "ip")
                .await?,
            UserId(1)
        );

        let code = fixture
            .engine
            .set_custom_code(UserId(1), ADDRESS, "moon_1", "ip")
            .await?;
        assert_eq!(code.as_str(), "MOON_1");
        assert_eq!(
            fixture
                .engine
                .link_referral(UserId(3), "0x00000000000000000000000000000000000000bb", "Moon_1", "ip")
                .await?,
            UserId(1)
        );

        let stats = fixture.engine.referral_stats(UserId(1)).await?;
        assert_eq!(stats.code, ReferralCode::Custom(code));
        assert_eq!(stats.referred, 2);
        assert_eq!(stats.rewards, 0);
        let stats = fixture.engine.referral_stats(UserId(2)).await?;
        assert_eq!(stats.code.to_string(), "2");
        assert_eq!(stats.referred_by, Some(UserId(1)));
        Ok(())
    }

    #[tokio::test]
    async fn link_preconditions() -> crate::Result<()> {
        let fixture = Fixture::new();
        fixture.user(1);
        fixture.user(2);
        fixture.user(3);

        let err = fixture
            .engine
            .link_referral(UserId(1), "0x12", "2", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidAddress));
        let err = fixture
            .engine
            .link_referral(UserId(1), ADDRESS, "no", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidCode(_)));

        let err = fixture
            .engine
            .link_referral(UserId(1), ADDRESS, "1", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::SelfReferral));

        fixture.clock.advance(Duration::from_secs(30));
        let err = fixture
            .engine
            .link_referral(UserId(1), ADDRESS, "404", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidCode(_)));

        fixture.clock.advance(Duration::from_secs(30));
        fixture.engine.link_referral(UserId(1), ADDRESS, "2", "ip").await?;

        fixture.clock.advance(Duration::from_secs(30));
        let err = fixture
            .engine
            .link_referral(UserId(1), ADDRESS, "3", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::AlreadyReferred));

        fixture.clock.advance(Duration::from_secs(30));
        let err = fixture
            .engine
            .link_referral(UserId(2), ADDRESS, "1", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::MutualReferral));

        fixture.store.set_banned(UserId(3), true)?;
        fixture.user(4);
        fixture.clock.advance(Duration::from_secs(30));
        let err = fixture
            .engine
            .link_referral(UserId(4), ADDRESS, "3", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidCode(_)));
        Ok(())
    }

    #[tokio::test]
    async fn custom_code_preconditions() -> crate::Result<()> {
        let fixture = Fixture::new();
        fixture.user(1);
        fixture.user(2);

        let err = fixture
            .engine
            .set_custom_code(UserId(1), ADDRESS, "12345", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidFormat(_)));

        fixture
            .engine
            .set_custom_code(UserId(1), ADDRESS, "alpha", "ip")
            .await?;
        fixture.clock.advance(Duration::from_secs(10));
        let err = fixture
            .engine
            .set_custom_code(UserId(1), ADDRESS, "beta", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::AlreadyHasCode));

        let err = fixture
            .engine
            .set_custom_code(UserId(2), "0x00000000000000000000000000000000000000bb", "ALPHA", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::CodeTaken));

        let err = fixture
            .engine
            .set_custom_code(UserId(2), "0x00000000000000000000000000000000000000bb", "gamma", "ip")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::RateLimited { retry_after: 10 }));
        Ok(())
    }
}
