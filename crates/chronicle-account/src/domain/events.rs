//! Domain events for the Account context.

use chronicle_core::event::{DomainEvent, EventMetadata};
use serde::{Deserialize, Serialize};

/// Event type tag for `AccountOpened`.
pub const ACCOUNT_OPENED_EVENT_TYPE: &str = "account.opened";
/// Event type tag for `FundsDeposited`.
pub const FUNDS_DEPOSITED_EVENT_TYPE: &str = "account.funds_deposited";
/// Event type tag for `FundsWithdrawn`.
pub const FUNDS_WITHDRAWN_EVENT_TYPE: &str = "account.funds_withdrawn";
/// Event type tag for `AccountClosed`.
pub const ACCOUNT_CLOSED_EVENT_TYPE: &str = "account.closed";

/// Emitted when an account is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOpened {
    /// Name of the account holder.
    pub account_holder: String,
    /// Balance the account starts with.
    pub opening_balance: i64,
}

/// Emitted when funds are deposited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsDeposited {
    /// Amount deposited, in minor units.
    pub amount: i64,
}

/// Emitted when funds are withdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsWithdrawn {
    /// Amount withdrawn, in minor units.
    pub amount: i64,
}

/// Emitted when an account is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClosed;

/// Event payload variants for the Account context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountEventKind {
    /// The account has been opened.
    AccountOpened(AccountOpened),
    /// Funds have been deposited.
    FundsDeposited(FundsDeposited),
    /// Funds have been withdrawn.
    FundsWithdrawn(FundsWithdrawn),
    /// The account has been closed.
    AccountClosed(AccountClosed),
}

impl AccountEventKind {
    /// Returns the event type tag this payload is stored and dispatched under.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AccountOpened(_) => ACCOUNT_OPENED_EVENT_TYPE,
            Self::FundsDeposited(_) => FUNDS_DEPOSITED_EVENT_TYPE,
            Self::FundsWithdrawn(_) => FUNDS_WITHDRAWN_EVENT_TYPE,
            Self::AccountClosed(_) => ACCOUNT_CLOSED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Account context.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AccountEventKind,
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.kind)
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
