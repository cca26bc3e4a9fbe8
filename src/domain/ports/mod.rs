pub mod notifier;
pub mod store;
pub mod supervisor;

pub use notifier::{NotificationSeverity, Notifier, NullNotifier};
pub use store::*;
pub use supervisor::{OutputEvent, ProcessHandle, ProcessTransport};
