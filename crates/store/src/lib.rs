pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, open_pool, DbPool};
pub use repositories::{
    HandledPostRepository, InMemoryHandledPostRepository, RepositoryError,
    SqlHandledPostRepository,
};
