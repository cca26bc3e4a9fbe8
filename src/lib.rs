pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;
