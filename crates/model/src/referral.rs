use std::{fmt, str::FromStr};

use crate::UserId;

/// Min length of a custom code.
pub const MIN_CUSTOM_CODE_LEN: usize = 4;

/// Max length of a custom code.
pub const MAX_CUSTOM_CODE_LEN: usize = 16;

/// A custom referral code chosen by its owner.
///
/// Custom codes are 4 to 16 characters of `[A-Za-z0-9_]` containing at least
/// one non-digit, so they can never be mistaken for a default code. They are
/// case-insensitive and stored uppercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde_with::SerializeDisplay, serde_with::DeserializeFromStr)
)]
pub struct CustomCode(String);

impl CustomCode {
    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CustomCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < MIN_CUSTOM_CODE_LEN || s.len() > MAX_CUSTOM_CODE_LEN {
            return Err(crate::Error::InvalidCode("length must be between 4 and 16"));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(crate::Error::InvalidCode(
                "only letters, digits and `_` are allowed",
            ));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(crate::Error::InvalidCode("must contain a non-digit"));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }
}

/// A referral code as entered by a referred user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferralCode {
    /// The default code of a user: the decimal form of its id.
    Default(UserId),
    /// A custom code.
    Custom(CustomCode),
}

impl ReferralCode {
    /// The code every user owns without registering anything.
    pub fn default_for(user: UserId) -> Self {
        Self::Default(user)
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default(user) => user.fmt(f),
            Self::Custom(code) => code.fmt(f),
        }
    }
}

impl FromStr for ReferralCode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let id = s
                .parse()
                .map_err(|_| crate::Error::InvalidCode("default code out of range"))?;
            return Ok(Self::Default(UserId(id)));
        }
        Ok(Self::Custom(s.parse()?))
    }
}
