//! Command abstractions.

use uuid::Uuid;

/// A request to change one aggregate.
///
/// Command handlers load the aggregate named by
/// [`aggregate_id`](Command::aggregate_id), invoke a domain operation and
/// stamp the resulting events with [`correlation_id`](Command::correlation_id).
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// The aggregate stream this command targets.
    fn aggregate_id(&self) -> Uuid;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;
}
