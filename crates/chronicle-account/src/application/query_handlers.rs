//! Query handlers for the Account context.
//!
//! This module contains query handlers that reconstitute aggregates
//! from stored events and return read-only view DTOs.

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::repository::EventRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::application::command_handlers;

/// Read-only view of an account aggregate.
#[derive(Debug, Serialize)]
pub struct AccountView {
    /// The account identifier.
    pub account_id: Uuid,
    /// Name of the account holder.
    pub account_holder: String,
    /// Current balance.
    pub balance: i64,
    /// Whether the account accepts transactions.
    pub is_active: bool,
    /// Sequence number of the last applied event.
    pub version: i64,
}

/// Retrieves an account by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_account_by_id(
    account_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<AccountView, DomainError> {
    let account = command_handlers::load_account(account_id, repo).await?;
    Ok(AccountView {
        account_id,
        account_holder: account.account_holder().to_owned(),
        balance: account.balance(),
        is_active: account.is_active(),
        version: account.version(),
    })
}
