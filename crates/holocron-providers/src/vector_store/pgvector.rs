//! SQL + pgvector backend.
//!
//! Primary search path is the server-side `match_documents` function; on
//! any RPC failure the provider falls back to a direct parameterized
//! query against the table. Both paths produce identically shaped
//! results. Upserts are `INSERT ... ON CONFLICT (id) DO UPDATE`, so
//! re-processing an item converges to the same index state.

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, warn};

use holocron_domain::ports::VectorStoreProvider;
use holocron_domain::{
    Error, FilterValue, MetadataFilter, Result, SearchResult, VectorRecord,
};

use crate::constants::{SQL_DEFAULT_TABLE, SQL_MATCH_FUNCTION, SQL_MAX_CONNECTIONS};
use crate::retry::RetryPolicy;

/// Configuration for [`PgVectorProvider`].
#[derive(Clone)]
pub struct PgVectorConfig {
    /// Postgres connection string
    pub database_url: String,
    /// Table holding the vectors
    pub table: String,
    /// Vector dimension of the `embedding` column
    pub dimensions: usize,
}

impl std::fmt::Debug for PgVectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgVectorConfig")
            .field("database_url", &"REDACTED")
            .field("table", &self.table)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl PgVectorConfig {
    /// Config with the default table name.
    #[must_use]
    pub fn new(database_url: String, dimensions: usize) -> Self {
        Self {
            database_url,
            table: SQL_DEFAULT_TABLE.to_owned(),
            dimensions,
        }
    }
}

/// Vector store in Postgres with the pgvector extension.
pub struct PgVectorProvider {
    pool: PgPool,
    table: String,
    dimensions: usize,
    retry: RetryPolicy,
}

/// Table names are interpolated into DDL/DML, so they must stay plain
/// identifiers.
fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(Error::ConfigInvalid {
            key: "vector_store.table".to_owned(),
            message: format!("'{table}' is not a plain lowercase identifier"),
        })
    }
}

/// Equality-only filters become a jsonb containment document evaluated
/// server-side; any-of filters are applied client-side after the query.
fn eq_filter_json(filters: Option<&MetadataFilter>) -> Option<Value> {
    let filters = filters?;
    let mut doc = serde_json::Map::new();
    for (field, value) in &filters.fields {
        if let FilterValue::One(v) = value {
            doc.insert(field.clone(), v.clone());
        }
    }
    if doc.is_empty() {
        None
    } else {
        Some(Value::Object(doc))
    }
}

impl PgVectorProvider {
    /// Connect a bounded pool and validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid configuration or connection failure.
    pub async fn connect(config: PgVectorConfig) -> Result<Self> {
        validate_table_name(&config.table)?;
        if config.dimensions == 0 {
            return Err(Error::ConfigInvalid {
                key: "embedding.dimensions".to_owned(),
                message: "must be positive".to_owned(),
            });
        }
        let pool = PgPoolOptions::new()
            .max_connections(SQL_MAX_CONNECTIONS)
            .connect(&config.database_url)
            .await
            .map_err(|e| Error::vector_db_with_source("connecting to Postgres", e))?;
        Ok(Self {
            pool,
            table: config.table,
            dimensions: config.dimensions,
            retry: RetryPolicy::network(),
        })
    }

    /// Wrap an existing pool (tests, shared pools).
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid table name.
    pub fn with_pool(pool: PgPool, table: String, dimensions: usize) -> Result<Self> {
        validate_table_name(&table)?;
        Ok(Self {
            pool,
            table,
            dimensions,
            retry: RetryPolicy::network(),
        })
    }

    /// Create the extension and table when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if DDL execution fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::vector_db_with_source("creating pgvector extension", e))?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             id text PRIMARY KEY, \
             content text NOT NULL, \
             metadata jsonb NOT NULL DEFAULT '{{}}'::jsonb, \
             embedding vector({dims}) NOT NULL)",
            table = self.table,
            dims = self.dimensions,
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::vector_db_with_source("creating vector table", e))?;
        Ok(())
    }

    /// Server-side function path.
    async fn search_rpc(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: f64,
        eq_filter: Option<&Value>,
    ) -> Result<Vec<SearchResult>> {
        let sql = format!(
            "SELECT id, content, metadata, similarity \
             FROM {SQL_MATCH_FUNCTION}($1, $2, $3, $4)"
        );
        let rows = sqlx::query(&sql)
            .bind(Vector::from(vector.to_vec()))
            .bind(threshold)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(eq_filter)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::vector_db_with_source("match_documents RPC", e))?;
        rows.iter().map(row_to_search_result).collect()
    }

    /// Direct query path, used when the RPC fails.
    async fn search_direct(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: f64,
        eq_filter: Option<&Value>,
    ) -> Result<Vec<SearchResult>> {
        let sql = format!(
            "SELECT id, content, metadata, 1 - (embedding <=> $1) AS similarity \
             FROM {table} \
             WHERE 1 - (embedding <=> $1) >= $2 \
             AND ($4::jsonb IS NULL OR metadata @> $4) \
             ORDER BY embedding <=> $1, id \
             LIMIT $3",
            table = self.table,
        );
        let rows = sqlx::query(&sql)
            .bind(Vector::from(vector.to_vec()))
            .bind(threshold)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(eq_filter)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::vector_db_with_source("direct vector query", e))?;
        rows.iter().map(row_to_search_result).collect()
    }
}

/// One transactional upsert batch; a failure rolls the whole batch back
/// so the retry re-runs it from a clean slate.
async fn upsert_batch(
    pool: &PgPool,
    sql: &str,
    dimensions: usize,
    batch: &[VectorRecord],
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::network_with_source("begin transaction", e))?;
    for record in batch {
        if record.values.len() != dimensions {
            return Err(Error::vector_db(format!(
                "record {} has dimension {}, table expects {}",
                record.id,
                record.values.len(),
                dimensions
            )));
        }
        let content = record
            .metadata
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        sqlx::query(sql)
            .bind(&record.id)
            .bind(content)
            .bind(Value::Object(record.metadata.clone()))
            .bind(Vector::from(record.values.clone()))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::network_with_source("upsert row", e))?;
    }
    tx.commit()
        .await
        .map_err(|e| Error::network_with_source("commit upsert batch", e))
}

fn row_to_search_result(row: &sqlx::postgres::PgRow) -> Result<SearchResult> {
    let id: String = row
        .try_get("id")
        .map_err(|e| Error::vector_db_with_source("row missing id", e))?;
    let content: String = row
        .try_get("content")
        .map_err(|e| Error::vector_db_with_source("row missing content", e))?;
    let metadata: Value = row
        .try_get("metadata")
        .map_err(|e| Error::vector_db_with_source("row missing metadata", e))?;
    let similarity: f64 = row
        .try_get("similarity")
        .map_err(|e| Error::vector_db_with_source("row missing similarity", e))?;
    let metadata = match metadata {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    Ok(SearchResult {
        id,
        content,
        metadata,
        similarity,
    })
}

#[async_trait]
impl VectorStoreProvider for PgVectorProvider {
    async fn upsert(&self, records: &[VectorRecord], batch_size: usize) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "INSERT INTO {table} (id, content, metadata, embedding) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
             content = EXCLUDED.content, \
             metadata = EXCLUDED.metadata, \
             embedding = EXCLUDED.embedding",
            table = self.table,
        );

        for batch in records.chunks(batch_size.max(1)) {
            self.retry
                .run_transient("pgvector upsert", || {
                    upsert_batch(&self.pool, &sql, self.dimensions, batch)
                })
                .await?;
            debug!(batch = batch.len(), "pgvector upsert batch done");
        }
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        threshold: f64,
        filters: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let eq_filter = eq_filter_json(filters);

        let mut results = match self
            .search_rpc(vector, limit, threshold, eq_filter.as_ref())
            .await
        {
            Ok(results) => results,
            Err(rpc_error) => {
                // Both paths return identically shaped rows; the direct
                // query is the safety net when the function is missing
                // or times out.
                warn!(error = %rpc_error, "match_documents RPC failed, falling back to direct query");
                self.search_direct(vector, limit, threshold, eq_filter.as_ref())
                    .await?
            }
        };

        // Any-of filters are not expressible as jsonb containment; finish
        // them here.
        if let Some(filters) = filters {
            results.retain(|r| filters.matches(&r.metadata));
        }
        SearchResult::sort_ranked(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!("DELETE FROM {table} WHERE id = ANY($1)", table = self.table);
        sqlx::query(&sql)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::vector_db_with_source("deleting vectors", e))?;
        Ok(())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "sql"
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::vector_db_with_source("health check", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_names_are_validated() {
        assert!(validate_table_name("holocron_knowledge").is_ok());
        assert!(validate_table_name("t2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("Robert'); DROP TABLE").is_err());
        assert!(validate_table_name("Mixed_Case").is_err());
    }

    #[test]
    fn eq_filter_keeps_only_exact_matches() {
        let filter = MetadataFilter::new()
            .with_field("canonicity", "canon")
            .with_any_of("priority", vec![json!("high"), json!("low")]);
        let doc = eq_filter_json(Some(&filter)).unwrap_or_else(|| panic!("expected doc"));
        assert_eq!(doc, json!({ "canonicity": "canon" }));
    }

    #[test]
    fn all_any_of_filter_produces_no_server_side_doc() {
        let filter =
            MetadataFilter::new().with_any_of("priority", vec![json!("high"), json!("low")]);
        assert!(eq_filter_json(Some(&filter)).is_none());
        assert!(eq_filter_json(None).is_none());
    }

    #[test]
    fn config_debug_redacts_the_url() {
        let config = PgVectorConfig::new("postgres://user:secret@db/holocron".to_owned(), 1536);
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(config.table, "holocron_knowledge");
    }
}

// Integration coverage for the live paths (`ensure_schema`, upsert,
// RPC-with-fallback search, delete) lives in
// `tests/pgvector_integration.rs` and needs a running Postgres with the
// pgvector extension; those tests are `#[ignore]`d by default.
