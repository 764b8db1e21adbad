//! Authentication account types.

use crate::db::{Account, AccountSummary};
use crate::jwt::AccessClaims;

/// An account resolved from a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    /// Claims from the access token
    pub claims: AccessClaims,
    /// The account as currently stored. Its admin flag is authoritative.
    pub account: Account,
}

impl AuthenticatedAccount {
    pub fn id(&self) -> i64 {
        self.account.id
    }

    pub fn is_admin(&self) -> bool {
        self.account.is_admin
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary::from(&self.account)
    }
}
