pub mod db_pool;
pub mod duckdb_database;
pub mod rows;
pub mod schema;
pub mod schema_cache;
pub mod schema_manager;

use async_trait::async_trait;
use std::error::Error;
use std::fmt;

use self::rows::QueryResult;
use self::schema::SchemaMetadata;

#[derive(Debug)]
pub enum DatabaseError {
    /// Could not reach or open the database
    ConnectionError(String),
    /// The engine rejected the statement
    StatementError(String),
    TimeoutError(u64),
    /// The worker running the call died
    TaskError(String),
    /// Introspection found no user tables
    EmptySchema,
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::ConnectionError(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::StatementError(msg) => write!(f, "Database rejected statement: {}", msg),
            DatabaseError::TimeoutError(secs) => write!(f, "Database call timed out after {}s", secs),
            DatabaseError::TaskError(msg) => write!(f, "Database task failed: {}", msg),
            DatabaseError::EmptySchema => write!(f, "the database has no tables"),
        }
    }
}

impl Error for DatabaseError {}

/// The relational database the pipeline talks to.
#[async_trait]
pub trait Database: Send + Sync {
    /// Connection target, used to key the durable schema cache
    fn target(&self) -> &str;

    /// Runs one statement on a scoped connection and materializes every row.
    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError>;

    /// Reads tables, columns and foreign keys from the catalog views.
    async fn introspect(&self) -> Result<SchemaMetadata, DatabaseError>;
}
