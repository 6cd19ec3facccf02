//! Admin authorization gate.
//!
//! The caller's account is read from the store on every call. Admin status is
//! never cached, so a revoked administrator loses access on the next request.

use ledgerdesk_shared::types::UserId;
use tracing::warn;

use super::error::LedgerError;
use crate::store::LedgerStore;

/// A caller confirmed to be an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    id: UserId,
}

impl AdminIdentity {
    /// The administrator's user id.
    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }
}

/// Confirms that `caller` names an existing administrator account.
///
/// # Errors
///
/// - `MissingCaller` if `caller` is absent or blank
/// - `NotAdmin` if no account exists or it lacks the admin flag
/// - `Store` if the lookup fails
pub async fn authorize_admin(
    store: &dyn LedgerStore,
    caller: Option<&str>,
) -> Result<AdminIdentity, LedgerError> {
    let id = caller
        .and_then(UserId::parse)
        .ok_or(LedgerError::MissingCaller)?;

    match store.account(&id).await? {
        Some(row) if row.value.is_admin => Ok(AdminIdentity { id }),
        Some(_) => {
            warn!(caller = %id, "Non-admin caller rejected");
            Err(LedgerError::NotAdmin)
        }
        None => {
            warn!(caller = %id, "Unknown caller rejected");
            Err(LedgerError::NotAdmin)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::Account;
    use crate::store::MemoryStore;

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_account(Account::admin(UserId::parse("boss").unwrap(), None))
            .await;
        store
            .insert_account(Account::new(UserId::parse("user").unwrap(), None))
            .await;
        store
    }

    #[tokio::test]
    async fn test_admin_passes() {
        let store = store().await;
        let identity = authorize_admin(&store, Some("boss")).await.unwrap();
        assert_eq!(identity.id().as_str(), "boss");
    }

    #[tokio::test]
    async fn test_missing_or_blank_caller() {
        let store = store().await;
        assert!(matches!(
            authorize_admin(&store, None).await,
            Err(LedgerError::MissingCaller)
        ));
        assert!(matches!(
            authorize_admin(&store, Some("   ")).await,
            Err(LedgerError::MissingCaller)
        ));
    }

    #[tokio::test]
    async fn test_non_admin_and_unknown_are_denied() {
        let store = store().await;
        assert!(matches!(
            authorize_admin(&store, Some("user")).await,
            Err(LedgerError::NotAdmin)
        ));
        assert!(matches!(
            authorize_admin(&store, Some("nobody")).await,
            Err(LedgerError::NotAdmin)
        ));
    }

    #[tokio::test]
    async fn test_revocation_is_seen_immediately() {
        let store = store().await;
        authorize_admin(&store, Some("boss")).await.unwrap();

        store
            .insert_account(Account::new(UserId::parse("boss").unwrap(), None))
            .await;
        assert!(matches!(
            authorize_admin(&store, Some("boss")).await,
            Err(LedgerError::NotAdmin)
        ));
    }
}
