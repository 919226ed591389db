//! Commands for the Account context.

use chronicle_core::command::Command;
use uuid::Uuid;

/// Command to open a new account.
#[derive(Debug, Clone)]
pub struct OpenAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
    /// Name of the account holder.
    pub account_holder: String,
    /// Balance the account starts with.
    pub opening_balance: i64,
}

impl Command for OpenAccount {
    fn command_type(&self) -> &'static str {
        "account.open_account"
    }

    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to deposit funds into an account.
#[derive(Debug, Clone)]
pub struct DepositFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
    /// Amount to deposit.
    pub amount: i64,
}

impl Command for DepositFunds {
    fn command_type(&self) -> &'static str {
        "account.deposit_funds"
    }

    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to withdraw funds from an account.
#[derive(Debug, Clone)]
pub struct WithdrawFunds {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
    /// Amount to withdraw.
    pub amount: i64,
}

impl Command for WithdrawFunds {
    fn command_type(&self) -> &'static str {
        "account.withdraw_funds"
    }

    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to close an account.
#[derive(Debug, Clone)]
pub struct CloseAccount {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The account identifier.
    pub account_id: Uuid,
}

impl Command for CloseAccount {
    fn command_type(&self) -> &'static str {
        "account.close_account"
    }

    fn aggregate_id(&self) -> Uuid {
        self.account_id
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
