//! Permission registry
//!
//! One enumerated registry of delegable actions. The default grant list
//! and every execute-time check derive from this enum, so they cannot
//! silently drift apart. Permissions form an allow-list: an action absent
//! from a grant is denied, always.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DelegationError;
use crate::grant::DelegationGrant;

/// Actions a delegation grant can authorize the relayer to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Mint a travel passport NFT to the user's account
    MintPassport,
    /// Transfer TOUR reward tokens
    SendTours,
    /// Update a passport's profile metadata
    UpdateProfile,
    /// Burn a passport token (destructive)
    BurnPassport,
    /// Transfer a passport to another wallet (destructive)
    TransferPassport,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MintPassport => "mint_passport",
            Self::SendTours => "send_tours",
            Self::UpdateProfile => "update_profile",
            Self::BurnPassport => "burn_passport",
            Self::TransferPassport => "transfer_passport",
        }
    }

    /// All registered permissions.
    pub fn all() -> &'static [Permission] {
        &[
            Self::MintPassport,
            Self::SendTours,
            Self::UpdateProfile,
            Self::BurnPassport,
            Self::TransferPassport,
        ]
    }

    /// Destructive or ownership-moving actions. Never part of the default
    /// grant; honored only when a user lists them explicitly in the
    /// signed delegation request.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, Self::BurnPassport | Self::TransferPassport)
    }

    /// The permission list a delegation receives when the request does
    /// not name one.
    pub fn default_grant() -> Vec<Permission> {
        Self::all()
            .iter()
            .copied()
            .filter(|p| !p.is_high_risk())
            .collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DelegationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| DelegationError::UnknownPermission(s.to_string()))
    }
}

/// Fail-closed permission check.
///
/// Absent grant: denied. Expired grant: the store already presents it as
/// absent, denied. Action not in the grant's set: denied.
pub fn permission_allows(grant: Option<&DelegationGrant>, action: Permission) -> bool {
    grant
        .map(|grant| grant.permissions.contains(&action))
        .unwrap_or(false)
}
