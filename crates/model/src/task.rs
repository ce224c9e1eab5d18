use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Qualifying on-chain activity a user must accumulate to unlock a reward.
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
pub enum TaskKind {
    /// Deposits received by the wallet.
    Deposit,
    /// Swaps executed by the wallet.
    Swap,
}

impl TaskKind {
    /// USD value of activity required to complete the task.
    pub fn threshold(&self) -> Decimal {
        match self {
            Self::Deposit => dec!(20),
            Self::Swap => dec!(10),
        }
    }
}

/// Progress status of a task.
///
/// The variants are ordered: a status only ever moves forward.
#[derive(
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
)]
#[strum(serialize_all = "snake_case")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TaskStatus {
    /// Threshold not reached yet.
    #[default]
    InProgress,
    /// Threshold reached, no claim requested yet.
    Eligible,
    /// A reward claim has been requested for the task.
    Completed,
}

impl TaskStatus {
    /// Returns whether the threshold of the task has been reached.
    pub fn is_qualified(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}
