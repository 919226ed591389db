//! Aggregate roots for the Account context.

use std::sync::LazyLock;

use chronicle_core::aggregate::{Aggregate, AggregateRoot, AggregateState, UNPERSISTED_VERSION};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::{DomainEvent, EventMetadata};
use chronicle_core::handlers::EventHandlers;
use uuid::Uuid;

use super::events::{
    ACCOUNT_CLOSED_EVENT_TYPE, ACCOUNT_OPENED_EVENT_TYPE, AccountClosed, AccountEvent,
    AccountEventKind, AccountOpened, FUNDS_DEPOSITED_EVENT_TYPE, FUNDS_WITHDRAWN_EVENT_TYPE,
    FundsDeposited, FundsWithdrawn,
};

/// State derived from an account's event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    /// Name of the account holder.
    pub account_holder: String,
    /// Current balance, in minor units.
    pub balance: i64,
    /// Whether the account is open for transactions.
    pub is_active: bool,
}

static ACCOUNT_HANDLERS: LazyLock<EventHandlers<AccountState>> = LazyLock::new(|| {
    EventHandlers::new()
        .on(ACCOUNT_OPENED_EVENT_TYPE, on_account_opened)
        .on(FUNDS_DEPOSITED_EVENT_TYPE, on_funds_deposited)
        .on(FUNDS_WITHDRAWN_EVENT_TYPE, on_funds_withdrawn)
        .on(ACCOUNT_CLOSED_EVENT_TYPE, on_account_closed)
});

impl AggregateState for AccountState {
    const AGGREGATE_TYPE: &'static str = "account";
    type Event = AccountEvent;

    fn handlers() -> &'static EventHandlers<Self> {
        &ACCOUNT_HANDLERS
    }
}

fn unexpected_kind(event: &AccountEvent) -> DomainError {
    DomainError::HandlerNotFound {
        aggregate_type: AccountState::AGGREGATE_TYPE,
        event_type: event.event_type().to_owned(),
    }
}

fn on_account_opened(state: &mut AccountState, event: &AccountEvent) -> Result<(), DomainError> {
    let AccountEventKind::AccountOpened(payload) = &event.kind else {
        return Err(unexpected_kind(event));
    };
    state.account_holder.clone_from(&payload.account_holder);
    state.balance = payload.opening_balance;
    state.is_active = true;
    Ok(())
}

fn on_funds_deposited(state: &mut AccountState, event: &AccountEvent) -> Result<(), DomainError> {
    let AccountEventKind::FundsDeposited(payload) = &event.kind else {
        return Err(unexpected_kind(event));
    };
    state.balance = state.balance.checked_add(payload.amount).ok_or_else(|| {
        DomainError::Validation(format!("deposit of {} overflows the balance", payload.amount))
    })?;
    Ok(())
}

fn on_funds_withdrawn(state: &mut AccountState, event: &AccountEvent) -> Result<(), DomainError> {
    let AccountEventKind::FundsWithdrawn(payload) = &event.kind else {
        return Err(unexpected_kind(event));
    };
    state.balance = state.balance.checked_sub(payload.amount).ok_or_else(|| {
        DomainError::Validation(format!(
            "withdrawal of {} overflows the balance",
            payload.amount
        ))
    })?;
    Ok(())
}

fn on_account_closed(state: &mut AccountState, event: &AccountEvent) -> Result<(), DomainError> {
    if !matches!(event.kind, AccountEventKind::AccountClosed(_)) {
        return Err(unexpected_kind(event));
    }
    state.is_active = false;
    Ok(())
}

/// The aggregate root for a bank account.
#[derive(Debug, Clone)]
pub struct Account {
    id: Uuid,
    root: Aggregate<AccountState>,
}

impl Account {
    /// Creates a new, unpersisted account.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            root: Aggregate::new(id),
        }
    }

    /// Returns the account identifier, fixed at construction.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the account holder's name.
    #[must_use]
    pub fn account_holder(&self) -> &str {
        &self.root.state().account_holder
    }

    /// Returns the current balance.
    #[must_use]
    pub fn balance(&self) -> i64 {
        self.root.state().balance
    }

    /// Returns whether the account accepts transactions.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.root.state().is_active
    }

    fn new_event(
        &self,
        correlation_id: Uuid,
        clock: &dyn Clock,
        kind: AccountEventKind,
    ) -> AccountEvent {
        AccountEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.root.next_version(),
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        }
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "account {} is not open",
                self.id
            )))
        }
    }

    fn ensure_positive(amount: i64) -> Result<(), DomainError> {
        if amount > 0 {
            Ok(())
        } else {
            Err(DomainError::Validation(format!(
                "amount must be positive, got {amount}"
            )))
        }
    }

    /// Opens the account, producing an `AccountOpened` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the account already has history,
    /// the holder name is blank, or the opening balance is negative.
    pub fn open(
        &mut self,
        account_holder: &str,
        opening_balance: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.root.version() != UNPERSISTED_VERSION {
            return Err(DomainError::Validation(format!(
                "account {} already exists",
                self.id
            )));
        }
        if account_holder.trim().is_empty() {
            return Err(DomainError::Validation(
                "account holder must not be blank".to_owned(),
            ));
        }
        if opening_balance < 0 {
            return Err(DomainError::Validation(format!(
                "opening balance must not be negative, got {opening_balance}"
            )));
        }

        let event = self.new_event(
            correlation_id,
            clock,
            AccountEventKind::AccountOpened(AccountOpened {
                account_holder: account_holder.to_owned(),
                opening_balance,
            }),
        );
        self.root.raise(event)
    }

    /// Deposits funds, producing a `FundsDeposited` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the account is not open, the
    /// amount is not positive, or the balance would overflow.
    pub fn deposit(
        &mut self,
        amount: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        Self::ensure_positive(amount)?;

        let event = self.new_event(
            correlation_id,
            clock,
            AccountEventKind::FundsDeposited(FundsDeposited { amount }),
        );
        self.root.raise(event)
    }

    /// Withdraws funds, producing a `FundsWithdrawn` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the account is not open, the
    /// amount is not positive, or it exceeds the balance.
    pub fn withdraw(
        &mut self,
        amount: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        Self::ensure_positive(amount)?;
        if amount > self.balance() {
            return Err(DomainError::Validation(format!(
                "insufficient funds in account {}: balance {}, requested {amount}",
                self.id,
                self.balance()
            )));
        }

        let event = self.new_event(
            correlation_id,
            clock,
            AccountEventKind::FundsWithdrawn(FundsWithdrawn { amount }),
        );
        self.root.raise(event)
    }

    /// Closes the account, producing an `AccountClosed` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the account is not open.
    pub fn close(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_active()?;

        let event = self.new_event(
            correlation_id,
            clock,
            AccountEventKind::AccountClosed(AccountClosed),
        );
        self.root.raise(event)
    }
}

impl AggregateRoot for Account {
    type State = AccountState;

    fn root(&self) -> &Aggregate<AccountState> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Aggregate<AccountState> {
        &mut self.root
    }
}
