use quest_model::{
    AdminAction, ClaimId, ClaimKind, ClaimStatus, Decision, TaskKind, TaskStatus, Transition,
    UserId,
};

use crate::{
    chain::ChainActivityReader,
    notify::{Message, Notifier, Recipient},
    store::{Claim, ClaimDetails, Constraint, NewClaim, RewardQuota, Store, StoreError},
    Engine,
};

fn admin_message(claim: &Claim) -> Message {
    let mut text = format!(
        "New {} reward claim #{}\nUser: {}\nAmount: {} USDT",
        claim.kind, claim.id, claim.user, claim.amount
    );
    if let Some(address) = claim.address.as_ref() {
        text.push_str(&format!("\nAddress: {address}"));
    }
    if let Some(total) = claim.details.total_usd {
        text.push_str(&format!("\nVolume: {total} USD"));
    }
    if let Some(referred) = claim.details.referred_id {
        text.push_str(&format!("\nReferred user: {referred}"));
    }
    Message::new(text)
        .with_button(
            "Approve",
            AdminAction {
                decision: Decision::Approve,
                claim: claim.id,
            },
        )
        .with_button(
            "Reject",
            AdminAction {
                decision: Decision::Reject,
                claim: claim.id,
            },
        )
}

fn user_message(claim: &Claim) -> Message {
    match claim.status {
        ClaimStatus::Claimed => Message::new(format!(
            "Your {} reward of {} USDT has been approved.",
            claim.kind, claim.amount
        )),
        _ => Message::new(format!(
            "Your {} reward claim #{} has been rejected.",
            claim.kind, claim.id
        )),
    }
}

impl<S, R, N> Engine<S, R, N>
where
    S: Store,
    R: ChainActivityReader,
    N: Notifier,
{
    /// Request the reward of a task.
    ///
    /// The activity is re-aggregated at request time. On success a
    /// `processing` claim is created, the task is marked completed and the
    /// admins are notified.
    ///
    /// # Errors
    /// - [`Error::UserNotFound`](crate::Error::UserNotFound),
    ///   [`Error::Banned`](crate::Error::Banned),
    ///   [`Error::WalletNotFound`](crate::Error::WalletNotFound).
    /// - [`Error::AlreadyClaimed`](crate::Error::AlreadyClaimed) if an active claim exists,
    ///   including when a concurrent request won the race.
    /// - [`Error::NotEligible`](crate::Error::NotEligible) if the threshold has not been reached.
    pub async fn request_claim(&self, user: UserId, task: TaskKind) -> crate::Result<Claim> {
        let account = self.require_user(user).await?;
        if account.banned {
            return Err(crate::Error::Banned);
        }
        let wallet = self
            .store
            .wallet_by_user(user)
            .await?
            .ok_or(crate::Error::WalletNotFound)?;

        let kind = ClaimKind::from(task);
        if let Some(claim) = self.store.latest_claim(user, kind).await? {
            if claim.status.is_active() {
                return Err(crate::Error::AlreadyClaimed);
            }
        }

        let (progress, _) = self.refresh_interactive(&wallet, task).await?;
        if !progress.status.is_qualified() {
            return Err(crate::Error::NotEligible {
                total_usd: progress.total_usd,
                target: task.threshold(),
            });
        }

        let claim = self
            .store
            .insert_claim(NewClaim {
                user,
                kind,
                amount: self.options.task_reward(task),
                address: Some(wallet.address),
                details: ClaimDetails {
                    referred_id: None,
                    total_usd: Some(progress.total_usd),
                },
            })
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation(Constraint::ActiveClaim) => {
                    crate::Error::AlreadyClaimed
                }
                err => err.into(),
            })?;
        tracing::info!(%user, claim = %claim.id, %task, amount = %claim.amount, "claim requested");

        if let Err(err) = self
            .write_progress(user, task, progress.total_usd, TaskStatus::Completed)
            .await
        {
            tracing::warn!(%user, %task, %err, "failed to mark task as completed");
        }

        self.notify_detached(Recipient::Admin, admin_message(&claim));
        Ok(claim)
    }

    /// Approve a claim. Approving a claimed claim is a no-op.
    pub async fn approve_claim(&self, id: ClaimId) -> crate::Result<Claim> {
        self.decide(id, Decision::Approve).await
    }

    /// Reject a claim. Rejecting a rejected claim is a no-op.
    pub async fn reject_claim(&self, id: ClaimId) -> crate::Result<Claim> {
        self.decide(id, Decision::Reject).await
    }

    /// Apply the action carried by an admin callback, e.g. `approve_claim:7`.
    pub async fn handle_admin_action(&self, data: &str) -> crate::Result<Claim> {
        let action: AdminAction = data.parse()?;
        self.decide(action.claim, action.decision).await
    }

    /// Apply an admin decision to a claim.
    ///
    /// # Errors
    /// - [`Error::ClaimNotFound`](crate::Error::ClaimNotFound) if the claim does not exist.
    /// - [`Error::ClaimFinalized`](crate::Error::ClaimFinalized) if the opposite decision
    ///   has been made.
    pub async fn decide(&self, id: ClaimId, decision: Decision) -> crate::Result<Claim> {
        loop {
            let claim = self
                .store
                .claim(id)
                .await?
                .ok_or(crate::Error::ClaimNotFound)?;
            let to = match claim.status.decide(decision)? {
                Transition::Unchanged => return Ok(claim),
                Transition::Changed(to) => to,
            };
            match self.store.compare_and_set_status(id, claim.status, to).await {
                Ok(Some(updated)) => {
                    tracing::info!(claim = %id, user = %updated.user, status = %updated.status, "claim decided");
                    self.after_decision(&updated).await;
                    return Ok(updated);
                }
                // Decided concurrently, re-evaluate against the new status.
                Ok(None) => continue,
                Err(StoreError::NotFound) => return Err(crate::Error::ClaimNotFound),
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn after_decision(&self, claim: &Claim) {
        if claim.status == ClaimStatus::Claimed {
            if let Some(task) = claim.kind.task() {
                match self.store.consume_quota(task).await {
                    Ok(Some(quota)) => {
                        tracing::debug!(%task, remaining = quota.remaining, "quota consumed");
                        if quota.remaining == 0 {
                            tracing::warn!(%task, "reward quota exhausted");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => tracing::warn!(%task, %err, "failed to consume quota"),
                }
            }
        }
        self.notify_detached(Recipient::User(claim.user), user_message(claim));
    }

    /// Get all claims of a user.
    pub async fn claims(&self, user: UserId) -> crate::Result<Vec<Claim>> {
        Ok(self.store.claims_by_user(user).await?)
    }

    /// Get all claims waiting for an admin decision, oldest first.
    pub async fn pending_claims(&self) -> crate::Result<Vec<Claim>> {
        let mut claims = self
            .store
            .claims_with_status(ClaimStatus::Processing)
            .await?;
        claims.extend(self.store.claims_with_status(ClaimStatus::Eligible).await?);
        claims.sort_by_key(|claim| claim.id);
        Ok(claims)
    }

    /// Get reward quotas.
    pub async fn quotas(&self) -> crate::Result<Vec<RewardQuota>> {
        Ok(self.store.quotas().await?)
    }

    pub(crate) fn notify_new_claim(&self, claim: &Claim) {
        self.notify_detached(Recipient::Admin, admin_message(claim));
    }
}
