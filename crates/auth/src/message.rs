//! Canonical signing messages
//!
//! Every signed operation has a registered [`Purpose`] with one canonical
//! human-readable message. The message embeds the wallet address, server
//! timestamp, nonce and the operation's parameters verbatim, so a wallet
//! popup shows the user exactly what they are authorizing. The server
//! rebuilds the same message from the submitted parameters at verify
//! time; any drift invalidates the signature.

use std::fmt;
use std::str::FromStr;

/// Platform banner on every signed message.
const MESSAGE_HEADER: &str = "Atlas Passport";

/// What a signature is for.
///
/// The purpose scopes the nonce: a nonce issued for delegation creation
/// can never satisfy a permission update or a revocation, so a stale
/// creation signature cannot be replayed against another operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Create a time-boxed delegation grant
    DelegationCreate,
    /// Add permissions to an existing grant
    DelegationUpdate,
    /// Revoke a grant
    DelegationRevoke,
    /// Burn a passport token
    PassportBurn,
}

impl Purpose {
    /// Stable key used in store keys and the nonce endpoint query.
    pub fn key(&self) -> &'static str {
        match self {
            Self::DelegationCreate => "delegation-create",
            Self::DelegationUpdate => "delegation-update",
            Self::DelegationRevoke => "delegation-revoke",
            Self::PassportBurn => "passport-burn",
        }
    }

    /// All registered purposes.
    pub fn all() -> &'static [Purpose] {
        &[
            Self::DelegationCreate,
            Self::DelegationUpdate,
            Self::DelegationRevoke,
            Self::PassportBurn,
        ]
    }

    fn intent(&self) -> &'static str {
        match self {
            Self::DelegationCreate => "Create travel delegation",
            Self::DelegationUpdate => "Update delegation permissions",
            Self::DelegationRevoke => "Revoke travel delegation",
            Self::PassportBurn => "Burn passport token",
        }
    }

    /// Parameter section with `{placeholder}` markers, returned from the
    /// nonce endpoint so clients know what the final message will contain
    /// before they have chosen the parameters.
    pub fn action_template(&self) -> &'static str {
        match self {
            Self::DelegationCreate => {
                "Duration: {duration_hours} hours\nMax transactions: {max_transactions}\nPermissions: {permissions}"
            }
            Self::DelegationUpdate => "Add permissions: {add_permissions}",
            Self::DelegationRevoke => "",
            Self::PassportBurn => "Token: #{token_id}",
        }
    }

    /// Message template handed out with a freshly issued nonce. Parameter
    /// placeholders remain for the client to fill; address, nonce and
    /// timestamp are already bound.
    pub fn message_template(&self, address: &str, timestamp: i64, nonce: &str) -> String {
        assemble(self.intent(), self.action_template(), address, timestamp, nonce)
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delegation-create" => Ok(Self::DelegationCreate),
            "delegation-update" => Ok(Self::DelegationUpdate),
            "delegation-revoke" => Ok(Self::DelegationRevoke),
            "passport-burn" => Ok(Self::PassportBurn),
            other => Err(format!("unknown purpose '{}'", other)),
        }
    }
}

/// Operation parameters embedded verbatim in the signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageParams {
    DelegationCreate {
        duration_hours: u32,
        max_transactions: u32,
        permissions: Vec<String>,
    },
    DelegationUpdate {
        add_permissions: Vec<String>,
    },
    DelegationRevoke,
    PassportBurn {
        token_id: u64,
    },
}

impl MessageParams {
    pub fn purpose(&self) -> Purpose {
        match self {
            Self::DelegationCreate { .. } => Purpose::DelegationCreate,
            Self::DelegationUpdate { .. } => Purpose::DelegationUpdate,
            Self::DelegationRevoke => Purpose::DelegationRevoke,
            Self::PassportBurn { .. } => Purpose::PassportBurn,
        }
    }

    fn action_section(&self) -> String {
        match self {
            Self::DelegationCreate {
                duration_hours,
                max_transactions,
                permissions,
            } => format!(
                "Duration: {} hours\nMax transactions: {}\nPermissions: {}",
                duration_hours,
                max_transactions,
                permissions.join(", ")
            ),
            Self::DelegationUpdate { add_permissions } => {
                format!("Add permissions: {}", add_permissions.join(", "))
            }
            Self::DelegationRevoke => String::new(),
            Self::PassportBurn { token_id } => format!("Token: #{}", token_id),
        }
    }
}

/// Build the exact message a wallet must sign for this operation.
pub fn canonical_message(
    params: &MessageParams,
    address: &str,
    timestamp: i64,
    nonce: &str,
) -> String {
    assemble(
        params.purpose().intent(),
        &params.action_section(),
        address,
        timestamp,
        nonce,
    )
}

fn assemble(intent: &str, action: &str, address: &str, timestamp: i64, nonce: &str) -> String {
    let mut message = format!("{}\n\n{}\n", MESSAGE_HEADER, intent);
    if !action.is_empty() {
        message.push_str(action);
        message.push('\n');
    }
    message.push_str(&format!(
        "\nWallet: {}\nNonce: {}\nIssued at: {}",
        address.to_lowercase(),
        nonce,
        timestamp
    ));
    message
}
