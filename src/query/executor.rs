use crate::db::rows::QueryResult;
use crate::db::{Database, DatabaseError};
use crate::query::models::ApprovedSql;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct QueryExecutor {
    database: Arc<dyn Database>,
}

impl QueryExecutor {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Runs validator-approved SQL and returns every row.
    pub async fn execute(&self, sql: ApprovedSql<'_>) -> Result<QueryResult, DatabaseError> {
        let start_time = Instant::now();
        info!("Executing SQL query: {}", sql.as_str());

        let result = self.database.execute(sql.as_str()).await?;

        info!(
            "Query executed successfully. Row count: {}, Execution time: {}ms",
            result.row_count(),
            start_time.elapsed().as_millis()
        );
        Ok(result)
    }
}
