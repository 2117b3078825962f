//! Error types for the remote database system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found{}", .id.as_ref().map(|id| format!(": {}", id)).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    #[error("Column does not exist: {0}")]
    UndefinedColumn(String),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl DbError {
    pub fn not_found_with_id(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.into()),
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// True when the statement referenced a column this deployment's schema lacks.
    pub fn is_undefined_column(&self) -> bool {
        matches!(self, Self::UndefinedColumn(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record",
                id: None,
            },
            sqlx::Error::Database(db_err) => {
                // 42703 = undefined_column
                if db_err.code().as_deref() == Some("42703") {
                    Self::UndefinedColumn(db_err.message().to_string())
                } else {
                    Self::Database(sqlx::Error::Database(db_err))
                }
            }
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            other => Self::Database(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = DbError::not_found_with_id("user email", "a@example.com");
        assert!(matches!(err, DbError::NotFound { entity: "user email", .. }));
        assert_eq!(err.to_string(), "user email not found: a@example.com");
    }

    #[test]
    fn test_undefined_column_error() {
        let err = DbError::UndefinedColumn("column \"plan_type\" does not exist".into());
        assert!(err.is_undefined_column());
        assert!(!DbError::connection("refused").is_undefined_column());
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let db_err: DbError = sqlx::Error::RowNotFound.into();
        assert_eq!(db_err.to_string(), "record not found");
    }

    #[test]
    fn test_from_sqlx_pool_timeout() {
        let db_err: DbError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(
            db_err.to_string(),
            "Connection pool error: Connection pool timed out"
        );
    }
}
