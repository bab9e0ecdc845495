use crate::config::DatabaseConfig;
use crate::db::db_pool::DuckDBConnectionManager;
use crate::db::rows::QueryResult;
use crate::db::schema::{qualified_name, ColumnInfo, ForeignKeyEdge, SchemaMetadata};
use crate::db::{Database, DatabaseError};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::Connection;
use r2d2::Pool;
use std::time::Duration;
use tracing::{debug, info, warn};

const COLUMNS_QUERY: &str = "
    SELECT c.table_schema, c.table_name, c.column_name, c.data_type, c.is_nullable
    FROM information_schema.columns c
    JOIN information_schema.tables t
      ON t.table_catalog = c.table_catalog
     AND t.table_schema = c.table_schema
     AND t.table_name = c.table_name
    WHERE t.table_schema NOT IN ('information_schema', 'pg_catalog')
      AND t.table_type IN ('BASE TABLE', 'VIEW')
    ORDER BY c.table_schema, c.table_name, c.ordinal_position
";

const PRIMARY_KEYS_QUERY: &str = "
    SELECT kcu.table_schema, kcu.table_name, kcu.column_name
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_schema = tc.constraint_schema
     AND kcu.constraint_name = tc.constraint_name
     AND kcu.table_name = tc.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
";

const FOREIGN_KEYS_QUERY: &str = "
    SELECT kcu.table_schema, kcu.table_name, kcu.column_name,
           ref.table_schema, ref.table_name, ref.column_name
    FROM information_schema.referential_constraints rc
    JOIN information_schema.key_column_usage kcu
      ON kcu.constraint_schema = rc.constraint_schema
     AND kcu.constraint_name = rc.constraint_name
    JOIN information_schema.key_column_usage ref
      ON ref.constraint_schema = rc.unique_constraint_schema
     AND ref.constraint_name = rc.unique_constraint_name
     AND ref.ordinal_position = kcu.position_in_unique_constraint
";

/// DuckDB-backed [`Database`]. Every call borrows a pooled connection on a
/// blocking worker; the connection goes back to the pool when the call ends,
/// whether it succeeded or not.
pub struct DuckDbDatabase {
    pool: Pool<DuckDBConnectionManager>,
    target: String,
    query_timeout: Duration,
}

impl DuckDbDatabase {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        info!("Initializing DuckDB connection pool for {}", config.connection_string);
        let manager = DuckDBConnectionManager::new(config.connection_string.clone(), config.read_only)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size as u32)
            .build(manager)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool,
            target: config.connection_string.clone(),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    async fn run_blocking<T, F>(&self, work: F) -> Result<T, DatabaseError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let task = tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
            work(&conn)
        });

        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DatabaseError::TaskError(join_err.to_string())),
            Err(_) => Err(DatabaseError::TimeoutError(self.query_timeout.as_secs())),
        }
    }
}

#[async_trait]
impl Database for DuckDbDatabase {
    fn target(&self) -> &str {
        &self.target
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, DatabaseError> {
        let sql = sql.to_string();
        self.run_blocking(move |conn| run_query(conn, &sql)).await
    }

    async fn introspect(&self) -> Result<SchemaMetadata, DatabaseError> {
        self.run_blocking(read_catalog).await
    }
}

fn statement_error(e: duckdb::Error) -> DatabaseError {
    DatabaseError::StatementError(e.to_string())
}

fn run_query(conn: &Connection, sql: &str) -> Result<QueryResult, DatabaseError> {
    let mut stmt = conn.prepare(sql).map_err(statement_error)?;
    let arrow = stmt.query_arrow([]).map_err(statement_error)?;

    let schema = arrow.get_schema();
    let columns = schema
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect::<Vec<String>>();

    let batches: Vec<RecordBatch> = arrow.collect();
    let result = QueryResult::from_batches(columns, &batches)
        .map_err(|e| DatabaseError::StatementError(format!("Failed to read result: {}", e)))?;

    debug!("Query returned {} rows", result.row_count());
    Ok(result)
}

fn read_catalog(conn: &Connection) -> Result<SchemaMetadata, DatabaseError> {
    let mut schema = SchemaMetadata::default();

    let mut stmt = conn.prepare(COLUMNS_QUERY).map_err(statement_error)?;
    let columns = stmt
        .query_map([], |row| {
            Ok((
                qualified_name(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?),
                ColumnInfo {
                    name: row.get(2)?,
                    data_type: row.get(3)?,
                    nullable: row.get::<_, String>(4)? == "YES",
                },
            ))
        })
        .map_err(statement_error)?;

    for column in columns {
        let (table, column) = column.map_err(statement_error)?;
        schema.table_mut(&table).push_column(column);
    }

    // Key constraints only enrich the prompt; a catalog without them still yields a usable schema
    match read_primary_keys(conn) {
        Ok(keys) => {
            for (table, column) in keys {
                if let Some(info) = schema.tables.get_mut(&table) {
                    info.primary_key.insert(column);
                }
            }
        }
        Err(e) => warn!("Could not read primary keys: {}", e),
    }

    match read_foreign_keys(conn) {
        Ok(edges) => schema.foreign_keys.extend(
            edges
                .into_iter()
                .filter(|fk| schema.tables.contains_key(&fk.from_table) && schema.tables.contains_key(&fk.to_table)),
        ),
        Err(e) => warn!("Could not read foreign keys: {}", e),
    }

    info!(
        "Introspected {} tables and {} foreign keys",
        schema.table_count(),
        schema.foreign_keys.len()
    );
    Ok(schema)
}

fn read_primary_keys(conn: &Connection) -> Result<Vec<(String, String)>, duckdb::Error> {
    let mut stmt = conn.prepare(PRIMARY_KEYS_QUERY)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            qualified_name(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?),
            row.get::<_, String>(2)?,
        ))
    })?;
    rows.collect()
}

fn read_foreign_keys(conn: &Connection) -> Result<Vec<ForeignKeyEdge>, duckdb::Error> {
    let mut stmt = conn.prepare(FOREIGN_KEYS_QUERY)?;
    let rows = stmt.query_map([], |row| {
        Ok(ForeignKeyEdge {
            from_table: qualified_name(&row.get::<_, String>(0)?, &row.get::<_, String>(1)?),
            from_column: row.get(2)?,
            to_table: qualified_name(&row.get::<_, String>(3)?, &row.get::<_, String>(4)?),
            to_column: row.get(5)?,
        })
    })?;
    rows.collect()
}
