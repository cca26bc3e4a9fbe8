//! SQLite adapter: the production implementation of `domain::ports::Store`
//! (spec §4.A, §6 "Persistent state layout").

mod blackboard;
mod chats;
mod checkpoints;
mod credits;
mod mail;
mod migrations;
mod pool;
mod schedules;
mod spawn_queue;
mod store;
mod tldr_beliefs;
mod users;
mod work_items;
mod workers;

pub use pool::DatabaseConnection;
pub use store::SqliteStore;

#[cfg(test)]
pub mod tests {
    use super::store::SqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;

    /// An in-memory store with migrations applied, for adapter unit tests.
    pub async fn test_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite pool");
        super::migrations::run(&pool).await.expect("run migrations");
        SqliteStore::new(pool)
    }
}
