use std::{fmt, str::FromStr};

use crate::{ClaimId, TaskKind};

/// Kind of a reward claim.
#[derive(
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClaimKind {
    /// Reward for the swap task.
    Swap,
    /// Reward for the deposit task.
    Deposit,
    /// Reward paid to a referrer once the referred user completed both tasks.
    Referral,
}

impl ClaimKind {
    /// Get the task this claim rewards, if any.
    pub fn task(&self) -> Option<TaskKind> {
        match self {
            Self::Swap => Some(TaskKind::Swap),
            Self::Deposit => Some(TaskKind::Deposit),
            Self::Referral => None,
        }
    }
}

impl From<TaskKind> for ClaimKind {
    fn from(task: TaskKind) -> Self {
        match task {
            TaskKind::Swap => Self::Swap,
            TaskKind::Deposit => Self::Deposit,
        }
    }
}

/// Status of a reward claim.
#[derive(
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClaimStatus {
    /// Waiting for admin sign-off.
    Processing,
    /// Pre-approved, pending payout. Only referral claims start here.
    Eligible,
    /// Approved.
    Claimed,
    /// Rejected. Does not block a new attempt.
    Rejected,
}

impl ClaimStatus {
    /// The status a freshly created claim of the given kind starts with.
    pub fn initial(kind: ClaimKind) -> Self {
        match kind {
            ClaimKind::Referral => Self::Eligible,
            ClaimKind::Swap | ClaimKind::Deposit => Self::Processing,
        }
    }

    /// Returns whether the claim blocks another claim with the same key.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Rejected)
    }

    /// Returns whether an admin decision has been made.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Claimed | Self::Rejected)
    }

    /// Apply an admin decision.
    ///
    /// Repeating the decision that produced the current status is a no-op.
    pub fn decide(self, decision: Decision) -> crate::Result<Transition> {
        let target = decision.target();
        match self {
            Self::Processing | Self::Eligible => Ok(Transition::Changed(target)),
            current if current == target => Ok(Transition::Unchanged),
            from => Err(crate::Error::InvalidTransition { from, to: target }),
        }
    }
}

/// Result of applying a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status moves to the given one.
    Changed(ClaimStatus),
    /// The decision has already been applied.
    Unchanged,
}

/// Admin decision on a claim.
#[derive(
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Decision {
    /// Approve.
    #[strum(serialize = "approve_claim")]
    Approve,
    /// Reject.
    #[strum(serialize = "reject_claim")]
    Reject,
}

impl Decision {
    fn target(&self) -> ClaimStatus {
        match self {
            Self::Approve => ClaimStatus::Claimed,
            Self::Reject => ClaimStatus::Rejected,
        }
    }
}

/// An actionable admin command, as carried by an approval button.
///
/// The string form is `<decision>:<claim id>`, e.g. `approve_claim:42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminAction {
    /// Decision.
    pub decision: Decision,
    /// Target claim.
    pub claim: ClaimId,
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.decision, self.claim)
    }
}

impl FromStr for AdminAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (decision, claim) = s
            .trim()
            .split_once(':')
            .ok_or(crate::Error::InvalidArgument("malformed admin action"))?;
        let decision = decision
            .parse()
            .map_err(|_| crate::Error::InvalidArgument("unknown admin decision"))?;
        Ok(Self {
            decision,
            claim: claim.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_status() {
        assert_eq!(
            ClaimStatus::initial(ClaimKind::Swap),
            ClaimStatus::Processing
        );
        assert_eq!(
            ClaimStatus::initial(ClaimKind::Deposit),
            ClaimStatus::Processing
        );
        assert_eq!(
            ClaimStatus::initial(ClaimKind::Referral),
            ClaimStatus::Eligible
        );
    }

    #[test]
    fn decisions_are_idempotent() -> crate::Result<()> {
        let status = ClaimStatus::Processing;
        let Transition::Changed(status) = status.decide(Decision::Approve)? else {
            panic!("processing claim must move");
        };
        assert_eq!(status, ClaimStatus::Claimed);
        assert_eq!(status.decide(Decision::Approve)?, Transition::Unchanged);

        let rejected = ClaimStatus::Eligible.decide(Decision::Reject)?;
        assert_eq!(rejected, Transition::Changed(ClaimStatus::Rejected));
        assert_eq!(
            ClaimStatus::Rejected.decide(Decision::Reject)?,
            Transition::Unchanged
        );
        Ok(())
    }

    #[test]
    fn final_decisions_cannot_be_contradicted() {
        assert_eq!(
            ClaimStatus::Claimed.decide(Decision::Reject),
            Err(crate::Error::InvalidTransition {
                from: ClaimStatus::Claimed,
                to: ClaimStatus::Rejected,
            })
        );
        assert!(ClaimStatus::Rejected.decide(Decision::Approve).is_err());
    }

    #[test]
    fn active_claims() {
        assert!(ClaimStatus::Processing.is_active());
        assert!(ClaimStatus::Eligible.is_active());
        assert!(ClaimStatus::Claimed.is_active());
        assert!(!ClaimStatus::Rejected.is_active());
    }

    #[test]
    fn admin_action_round_trip() -> crate::Result<()> {
        let action = AdminAction {
            decision: Decision::Approve,
            claim: ClaimId(42),
        };
        assert_eq!(action.to_string(), "approve_claim:42");
        assert_eq!("reject_claim:7".parse::<AdminAction>()?.claim, ClaimId(7));
        assert!("approve:7".parse::<AdminAction>().is_err());
        assert!("approve_claim:x".parse::<AdminAction>().is_err());
        assert!("approve_claim".parse::<AdminAction>().is_err());
        Ok(())
    }
}
