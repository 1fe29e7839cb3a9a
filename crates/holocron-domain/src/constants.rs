//! Domain constants shared across the pipeline.
//!
//! Each value documents the default behavior of a component; all of them
//! can be overridden through `AppConfig`.

/// Target token count per chunk (cl100k tokens).
pub const MAX_CHUNK_TOKENS: usize = 1000;

/// Maximum total tokens per embedding API request.
pub const BATCH_TOKEN_LIMIT: usize = 8000;

/// Maximum concurrent embedding API requests.
pub const MAX_PARALLEL_REQUESTS: usize = 5;

/// Embedding dimension of the default model (text-embedding-ada-002).
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Default embedding model identifier.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Vector records accumulated before an upsert flush.
pub const UPLOAD_BATCH_SIZE: usize = 25;

/// Upsert batch size for the managed index backend.
pub const MANAGED_UPSERT_BATCH_SIZE: usize = 100;

/// Worker tasks pulling from the ingest queue.
pub const NUM_WORKERS: usize = 3;

/// Outbound requests allowed per sliding 60-second window.
pub const REQUESTS_PER_MINUTE: usize = 60;

/// Completions between progress store checkpoints.
pub const CHECKPOINT_BATCH_SIZE: usize = 10;

/// Attempts before a failing work item is marked done with its error.
pub const MAX_ITEM_RETRIES: u32 = 3;

/// Default similarity floor for the SQL (pgvector) backend.
pub const SQL_SIMILARITY_THRESHOLD: f64 = 0.3;

/// Default similarity floor for the managed index backend. The managed
/// service reports lower absolute scores, so the recall floor sits lower.
pub const MANAGED_SIMILARITY_THRESHOLD: f64 = 0.01;

/// Default top-k for retrieval.
pub const MAX_RESULTS: usize = 5;

/// Hard timeout for outbound network calls, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Retry attempts for transient network failures.
pub const RETRY_ATTEMPTS: usize = 3;

/// Base delay for exponential backoff, in milliseconds (1s, 2s, 4s).
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Fallback wait when a rate-limited response carries no Retry-After.
pub const RATE_LIMITED_DEFAULT_WAIT_SECS: u64 = 60;

/// MediaWiki namespaces retained by the dump processor (main + category).
pub const RETAINED_NAMESPACES: [i32; 2] = [0, 14];

/// Articles per on-disk batch directory in dump mode.
pub const ARTICLES_PER_BATCH: usize = 1000;

/// Pages between progress log lines while streaming a dump.
pub const DUMP_LOG_INTERVAL: usize = 10_000;

/// Rows per parquet staging shard.
pub const STAGING_ROWS_PER_FILE: usize = 5000;

/// Ratio of non-important templates to content length above which a page
/// counts as meta/utility.
pub const TEMPLATE_RATIO_THRESHOLD: f64 = 0.35;

/// Cleaned-text length below which an unmarked page counts as a stub.
pub const MIN_CONTENT_LENGTH: usize = 150;

/// Metadata key carrying the chunk text in vector records.
pub const METADATA_KEY_CONTENT: &str = "content";

/// Metadata key marking zero-vector substitutes for later re-embedding.
pub const METADATA_KEY_FLAGGED: &str = "flagged";

/// Crawler User-Agent, fixed for polite identification.
pub const CRAWLER_USER_AGENT: &str =
    "DJ-R3X-Holocron/0.3 (+https://github.com/makeorbreakshop/holocron)";
