//! Command abstractions shared by the registry and trigger handlers.

use uuid::Uuid;

/// A mutation request entering the core from the command/API layer.
///
/// The core performs no permission checks; whoever builds the command is
/// responsible for that.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted command name, e.g. `instances.create_dungeon`.
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the logs.
    fn correlation_id(&self) -> Uuid;

    /// The instance, trigger, or actor this command addresses.
    fn target(&self) -> String;
}
