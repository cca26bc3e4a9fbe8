//! Adapters: concrete implementations of `domain::ports` traits.

pub mod notifier;
pub mod process;
pub mod sqlite;
