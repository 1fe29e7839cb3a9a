//! Provider-level constants: endpoints, headers and field names.

/// OpenAI-compatible embeddings endpoint path.
pub const EMBEDDING_API_ENDPOINT: &str = "/embeddings";

/// Default OpenAI API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Managed index API key header name.
pub const MANAGED_API_KEY_HEADER: &str = "Api-Key";

/// Managed index upsert endpoint path.
pub const MANAGED_UPSERT_ENDPOINT: &str = "/vectors/upsert";

/// Managed index query endpoint path.
pub const MANAGED_QUERY_ENDPOINT: &str = "/query";

/// Managed index delete endpoint path.
pub const MANAGED_DELETE_ENDPOINT: &str = "/vectors/delete";

/// Managed index stats endpoint path, used as the health probe.
pub const MANAGED_STATS_ENDPOINT: &str = "/describe_index_stats";

/// Default table name for the SQL backend.
pub const SQL_DEFAULT_TABLE: &str = "holocron_knowledge";

/// Server-side similarity search function for the SQL backend.
pub const SQL_MATCH_FUNCTION: &str = "match_documents";

/// Max connections in the SQL backend pool.
pub const SQL_MAX_CONNECTIONS: u32 = 5;

/// Columns of the progress status CSV, in order.
pub const PROGRESS_CSV_COLUMNS: [&str; 5] = ["url", "is_processed", "processed_at", "priority", "id"];

/// Filename prefix for parquet staging shards.
pub const STAGING_FILE_PREFIX: &str = "batch_";
