pub mod db;
pub mod error;
pub mod types;

pub use db::DatabaseManager;
pub use error::{DbError, DbResult};
pub use types::*;

pub use sqlx;
