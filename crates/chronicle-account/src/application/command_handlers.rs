//! Command handlers for the Account context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: load aggregate, execute command, persist events,
//! and only then mark the aggregate's changes as committed.

use chronicle_core::aggregate::{AggregateRoot, AggregateState};
use chronicle_core::clock::Clock;
use chronicle_core::command::Command;
use chronicle_core::error::DomainError;
use chronicle_core::event::{DomainEvent, EventMetadata};
use chronicle_core::repository::{EventRepository, StoredEvent};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Account, AccountState};
use crate::domain::commands::{CloseAccount, DepositFunds, OpenAccount, WithdrawFunds};
use crate::domain::events::{AccountEvent, AccountEventKind};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct AccountCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: Uuid,
    /// The aggregate version after the command.
    pub version: i64,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

fn to_stored_event(event: &AccountEvent) -> Result<StoredEvent, DomainError> {
    let meta = event.metadata();
    let payload = event
        .to_payload()
        .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))?;
    Ok(StoredEvent {
        event_id: meta.event_id,
        aggregate_id: meta.aggregate_id,
        event_type: event.event_type().to_owned(),
        payload,
        sequence_number: meta.sequence_number,
        correlation_id: meta.correlation_id,
        causation_id: meta.causation_id,
        occurred_at: meta.occurred_at,
    })
}

fn from_stored_event(stored: &StoredEvent) -> Result<AccountEvent, DomainError> {
    if !AccountState::handlers().handles(&stored.event_type) {
        return Err(DomainError::HandlerNotFound {
            aggregate_type: AccountState::AGGREGATE_TYPE,
            event_type: stored.event_type.clone(),
        });
    }
    let kind: AccountEventKind = serde_json::from_value(stored.payload.clone())
        .map_err(|e| DomainError::Infrastructure(format!("event deserialization failed: {e}")))?;
    if kind.event_type() != stored.event_type {
        return Err(DomainError::Infrastructure(format!(
            "event {} is stored as {} but carries a {} payload",
            stored.event_id,
            stored.event_type,
            kind.event_type()
        )));
    }
    Ok(AccountEvent {
        metadata: EventMetadata {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate_id: stored.aggregate_id,
            sequence_number: stored.sequence_number,
            correlation_id: stored.correlation_id,
            causation_id: stored.causation_id,
            occurred_at: stored.occurred_at,
        },
        kind,
    })
}

/// Reconstitutes an `Account` from stored events.
///
/// # Errors
///
/// Returns `DomainError::HandlerNotFound` if a stored event type has no
/// handler, `DomainError::Infrastructure` if a payload cannot be decoded or does
/// not match its stored type, or any error raised while replaying the history.
fn reconstitute(
    account_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Account, DomainError> {
    let events = existing_events
        .iter()
        .map(from_stored_event)
        .collect::<Result<Vec<_>, _>>()?;
    let mut account = Account::new(account_id);
    account.replay(&events)?;
    Ok(account)
}

/// Loads an existing account by replaying its stream.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the stream is empty, or any
/// error from loading or replaying the events.
pub async fn load_account(
    account_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Account, DomainError> {
    let existing_events = repo.load_events(account_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(account_id));
    }
    reconstitute(account_id, &existing_events)
}

/// Appends the account's uncommitted events at its expected version and marks
/// them committed once the store accepted them.
///
/// On failure the uncommitted events stay buffered.
///
/// # Errors
///
/// Returns `DomainError::ConcurrencyConflict` if the stream moved on since the
/// account was loaded, or any other error from serialization or the store.
pub async fn save_account(
    account: &mut Account,
    repo: &dyn EventRepository,
) -> Result<AccountCommandResult, DomainError> {
    let stored_events = account
        .uncommitted_events()
        .iter()
        .map(to_stored_event)
        .collect::<Result<Vec<_>, _>>()?;

    repo.append_events(account.id(), account.expected_version(), &stored_events)
        .await
        .inspect_err(|err| {
            warn!(
                aggregate_id = %account.id(),
                expected_version = account.expected_version(),
                retryable = err.is_retryable(),
                error = %err,
                "failed to append account events"
            );
        })?;

    account.mark_changes_as_committed();
    info!(
        aggregate_id = %account.id(),
        version = account.version(),
        count = stored_events.len(),
        "persisted account events"
    );

    Ok(AccountCommandResult {
        aggregate_id: account.id(),
        version: account.version(),
        stored_events,
    })
}

/// Handles the `OpenAccount` command: checks the stream is new, opens the
/// account, and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the account already exists or the
/// command is invalid, or any error from the store.
#[instrument(skip_all, fields(
    command_type = command.command_type(),
    account_id = %command.aggregate_id(),
    correlation_id = %command.correlation_id(),
))]
pub async fn handle_open_account(
    command: &OpenAccount,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<AccountCommandResult, DomainError> {
    info!("handling open_account command");
    let existing_events = repo.load_events(command.account_id).await?;
    let mut account = reconstitute(command.account_id, &existing_events)?;

    account.open(
        &command.account_holder,
        command.opening_balance,
        command.correlation_id(),
        clock,
    )?;

    save_account(&mut account, repo).await
}

/// Handles the `DepositFunds` command: loads the account, deposits the funds,
/// and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError` if loading, validation or appending fails.
#[instrument(skip_all, fields(
    command_type = command.command_type(),
    account_id = %command.aggregate_id(),
    correlation_id = %command.correlation_id(),
))]
pub async fn handle_deposit_funds(
    command: &DepositFunds,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<AccountCommandResult, DomainError> {
    info!("handling deposit_funds command");
    let mut account = load_account(command.account_id, repo).await?;

    account.deposit(command.amount, command.correlation_id(), clock)?;

    save_account(&mut account, repo).await
}

/// Handles the `WithdrawFunds` command: loads the account, withdraws the
/// funds, and persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError` if loading, validation or appending fails.
#[instrument(skip_all, fields(
    command_type = command.command_type(),
    account_id = %command.aggregate_id(),
    correlation_id = %command.correlation_id(),
))]
pub async fn handle_withdraw_funds(
    command: &WithdrawFunds,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<AccountCommandResult, DomainError> {
    info!("handling withdraw_funds command");
    let mut account = load_account(command.account_id, repo).await?;

    account.withdraw(command.amount, command.correlation_id(), clock)?;

    save_account(&mut account, repo).await
}

/// Handles the `CloseAccount` command: loads the account, closes it, and
/// persists the resulting event.
///
/// # Errors
///
/// Returns `DomainError` if loading, validation or appending fails.
#[instrument(skip_all, fields(
    command_type = command.command_type(),
    account_id = %command.aggregate_id(),
    correlation_id = %command.correlation_id(),
))]
pub async fn handle_close_account(
    command: &CloseAccount,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<AccountCommandResult, DomainError> {
    info!("handling close_account command");
    let mut account = load_account(command.account_id, repo).await?;

    account.close(command.correlation_id(), clock)?;

    save_account(&mut account, repo).await
}
