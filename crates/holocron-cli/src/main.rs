//! Holocron command line interface.
//!
//! Subcommands: `ingest-dump` (stream a MediaWiki export), `ingest-urls`
//! (process the URL backlog via the live wiki), `search` (semantic
//! retrieval) and `stats` (progress overview).
//!
//! Exit codes: 0 success, 1 interrupted or non-fatal failure with the
//! checkpoint saved, 2 configuration error.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use holocron_domain::ports::{ProgressStore, VectorStoreProvider};
use holocron_domain::{Error, MetadataFilter, Priority};
use holocron_infrastructure::{AppConfig, init_tracing};
use holocron_providers::CsvProgressStore;
use holocron_wiki::DumpProcessor;

/// Semantic knowledge base builder for Star Wars lore.
#[derive(Parser)]
#[command(name = "holocron")]
#[command(about = "Build and search the Holocron knowledge base")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/holocron.yaml or $HOLOCRON_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a MediaWiki XML export into normalized article batches
    IngestDump {
        /// Path to the XML export
        #[arg(long)]
        dump: PathBuf,

        /// Output directory for batch_NNNN article directories
        #[arg(long, default_value = "data/articles")]
        output: PathBuf,

        /// Articles per batch directory
        #[arg(long, default_value_t = 1000)]
        articles_per_batch: usize,

        /// Stop after this many accepted articles
        #[arg(long)]
        max_articles: Option<usize>,

        /// Stream articles straight into the embedding/upsert pipeline
        /// instead of writing batch directories
        #[arg(long)]
        online: bool,
    },

    /// Process unprocessed URLs from the backlog via the live wiki
    IngestUrls {
        /// Source URL list CSV (columns: id,url,priority)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Progress status CSV
        #[arg(long, default_value = "data/processing_status.csv")]
        status: PathBuf,

        /// Maximum items to process this run
        #[arg(long)]
        limit: Option<usize>,

        /// Only process one priority band
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,

        /// Worker task count override
        #[arg(long)]
        workers: Option<usize>,

        /// Requests-per-minute override
        #[arg(long)]
        rpm: Option<usize>,

        /// Write a run checkpoint JSON here at every progress checkpoint
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Write a source URL list from a dump's article titles
    CollectUrls {
        /// Path to the XML export
        #[arg(long)]
        dump: PathBuf,

        /// Output CSV (columns: id,url,priority)
        #[arg(long, default_value = "data/urls.csv")]
        output: PathBuf,
    },

    /// Reset all progress: every work item back to unprocessed
    Reset {
        /// Progress status CSV
        #[arg(long, default_value = "data/processing_status.csv")]
        status: PathBuf,

        /// Actually do it
        #[arg(long)]
        yes: bool,
    },

    /// Semantic search over the indexed knowledge base
    Search {
        /// Query text
        query: String,

        /// Maximum results
        #[arg(long)]
        limit: Option<usize>,

        /// Similarity floor in [0, 1]
        #[arg(long)]
        threshold: Option<f64>,

        /// Only Canon continuity passages
        #[arg(long, conflicts_with = "legends")]
        canon: bool,

        /// Only Legends continuity passages
        #[arg(long)]
        legends: bool,

        /// Print one assembled context block instead of ranked hits
        #[arg(long)]
        assemble: bool,
    },

    /// Progress and backend status overview
    Stats {
        /// Progress status CSV
        #[arg(long, default_value = "data/processing_status.csv")]
        status: PathBuf,
    },
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    match value.to_ascii_lowercase().as_str() {
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => Err(format!("'{other}' is not one of high|medium|low")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    // Commands that touch a backend load configuration; the offline ones
    // (dump to disk, URL collection, reset) run without it.
    let config_path = cli.config.clone();
    let load_config = move || AppConfig::load(config_path.as_deref());

    let result = match cli.command {
        Commands::IngestDump {
            ref dump,
            ref output,
            articles_per_batch,
            max_articles,
            online,
        } => {
            if online {
                match load_config() {
                    Ok(config) => ingest_dump_online(&config, dump, max_articles).await,
                    Err(e) => Err(e),
                }
            } else {
                ingest_dump(dump, output, articles_per_batch, max_articles)
            }
        }
        Commands::IngestUrls {
            ref source,
            ref status,
            limit,
            priority,
            workers,
            rpm,
            ref checkpoint,
        } => match load_config() {
            Ok(config) => {
                ingest_urls(
                    &config,
                    source.clone(),
                    status,
                    limit,
                    priority,
                    workers,
                    rpm,
                    checkpoint.clone(),
                )
                .await
            }
            Err(e) => Err(e),
        },
        Commands::CollectUrls { ref dump, ref output } => collect_urls(dump, output),
        Commands::Reset { ref status, yes } => reset(status, yes).await,
        Commands::Search {
            ref query,
            limit,
            threshold,
            canon,
            legends,
            assemble,
        } => match load_config() {
            Ok(config) => search(&config, query, limit, threshold, canon, legends, assemble).await,
            Err(e) => Err(e),
        },
        Commands::Stats { ref status } => match load_config() {
            Ok(config) => stats(&config, status).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            let code = if matches!(
                e,
                Error::Config { .. } | Error::ConfigMissing(_) | Error::ConfigInvalid { .. }
            ) {
                2
            } else {
                1
            };
            ExitCode::from(code)
        }
    }
}

fn ingest_dump(
    dump: &std::path::Path,
    output: &std::path::Path,
    articles_per_batch: usize,
    max_articles: Option<usize>,
) -> Result<(), Error> {
    let processor = DumpProcessor::new()
        .with_articles_per_batch(articles_per_batch)
        .with_max_articles(max_articles);
    let report = processor.process_file(dump, output)?;
    println!("Dump processing complete");
    println!("  batches written: {}", report.batches_written);
    println!("  {}", report.counters.summary());
    Ok(())
}

/// Online dump mode: stream normalized articles from the export straight
/// through chunk -> embed -> upsert, no progress store involved (the dump
/// itself is the work list and re-runs converge via idempotent upserts).
async fn ingest_dump_online(
    config: &AppConfig,
    dump: &std::path::Path,
    max_articles: Option<usize>,
) -> Result<(), Error> {
    use holocron_application::pipeline::RateLimiter;
    use holocron_application::{IngestOptions, IngestService};
    use holocron_wiki::{Chunker, ChunkerOptions, TokenCounter};

    let embedding = holocron_infrastructure::build_embedding_provider(config)?;
    let vector_store = holocron_infrastructure::build_vector_store(config).await?;
    let counter = TokenCounter::new()?;
    let chunker = Arc::new(Chunker::with_options(
        counter,
        ChunkerOptions {
            max_chunk_tokens: config.ingest.max_chunk_tokens,
            repeat_section_header: true,
        },
    ));
    let service = Arc::new(IngestService::new(
        Arc::new(support::NoFetch),
        embedding,
        vector_store,
        Arc::new(support::NoProgress),
        Some(Arc::new(holocron_providers::ParquetStager::new(
            config.ingest.staging_dir.clone(),
        ))),
        chunker,
        Arc::new(RateLimiter::new(config.ingest.requests_per_minute)),
        IngestOptions {
            upload_batch_size: config.ingest.upload_batch_size,
            upsert_batch_size: config.vector_store.upsert_batch_size,
            ..IngestOptions::default()
        },
    ));

    // The XML walk is synchronous; bridge it into the async pipeline
    // through a bounded channel.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<holocron_domain::NormalizedArticle>(64);
    let dump_path = dump.to_path_buf();
    let walker = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&dump_path)
            .map_err(|e| Error::config(format!("cannot open dump {}: {e}", dump_path.display())))?;
        DumpProcessor::new()
            .with_max_articles(max_articles)
            .process(std::io::BufReader::new(file), |article| {
                tx.blocking_send(article)
                    .map_err(|_| Error::internal("article channel closed"))
            })
    });

    let mut articles = 0usize;
    let mut chunks = 0usize;
    while let Some(article) = rx.recv().await {
        let article_id = article.title.replace(' ', "_");
        chunks += service
            .ingest_article(&article, &article_id, Priority::Low)
            .await?;
        articles += 1;
    }
    service.finalize().await?;

    let counters = walker
        .await
        .map_err(|e| Error::internal(format!("dump walker failed: {e}")))??;

    println!("Online dump ingest complete");
    println!("  articles embedded: {articles}, chunks upserted: {chunks}");
    println!("  {}", counters.summary());
    Ok(())
}

/// No-op collaborators for the dump-streaming mode.
mod support {
    use async_trait::async_trait;
    use holocron_domain::ports::{PageFetcher, ProgressStore};
    use holocron_domain::{Priority, RawPage, Result, WorkItem};

    /// Fetcher that is never called: articles come from the dump stream.
    pub struct NoFetch;

    #[async_trait]
    impl PageFetcher for NoFetch {
        async fn fetch(&self, _item: &WorkItem) -> Result<Option<RawPage>> {
            Ok(None)
        }
    }

    /// Progress sink for runs whose work list is the dump itself.
    pub struct NoProgress;

    #[async_trait]
    impl ProgressStore for NoProgress {
        async fn unprocessed(
            &self,
            _limit: Option<usize>,
            _priority: Option<Priority>,
        ) -> Result<Vec<WorkItem>> {
            Ok(Vec::new())
        }
        async fn mark_processed(&self, _ids: &[String]) -> Result<()> {
            Ok(())
        }
        async fn record_failure(&self, _id: &str, _error: &str) -> Result<()> {
            Ok(())
        }
        async fn processed_count(&self) -> Result<usize> {
            Ok(0)
        }
        async fn total_count(&self) -> Result<usize> {
            Ok(0)
        }
        async fn flush(&self) -> Result<()> {
            Ok(())
        }
        async fn reset(&self) -> Result<()> {
            Ok(())
        }
    }
}

fn collect_urls(dump: &std::path::Path, output: &std::path::Path) -> Result<(), Error> {
    let file = std::fs::File::open(dump)
        .map_err(|e| Error::config(format!("cannot open dump {}: {e}", dump.display())))?;
    let titles = holocron_wiki::collect_titles(std::io::BufReader::new(file))?;

    if let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let mut content = String::from("id,url,priority\n");
    for (i, title) in titles.iter().enumerate() {
        content.push_str(&format!(
            "{},{},low\n",
            i + 1,
            holocron_wiki::article_url(title)
        ));
    }
    std::fs::write(output, content)?;
    println!("Collected {} article URLs into {}", titles.len(), output.display());
    Ok(())
}

async fn reset(status: &std::path::Path, yes: bool) -> Result<(), Error> {
    if !yes {
        println!("This clears every processed flag in {}.", status.display());
        println!("Re-run with --yes to confirm.");
        return Err(Error::invalid_argument("reset not confirmed"));
    }
    let store = CsvProgressStore::open(status, None)?;
    store.reset().await?;
    let total = store.total_count().await?;
    println!("Reset {total} items to unprocessed.");
    Ok(())
}

#[expect(clippy::too_many_arguments, reason = "flat CLI surface")]
async fn ingest_urls(
    config: &AppConfig,
    source: Option<PathBuf>,
    status: &std::path::Path,
    limit: Option<usize>,
    priority: Option<Priority>,
    workers: Option<usize>,
    rpm: Option<usize>,
    checkpoint: Option<PathBuf>,
) -> Result<(), Error> {
    let service = holocron_infrastructure::build_ingest_service(
        config,
        status,
        source.as_deref(),
        workers,
        rpm,
        checkpoint,
    )
    .await?;

    // SIGINT/SIGTERM stop intake; in-flight items drain to a checkpoint.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, draining in-flight items");
                shutdown.cancel();
            }
        });
    }

    let interrupted = shutdown.clone();
    let counters = Arc::clone(&service).run(limit, priority, shutdown).await?;

    println!("Ingest run complete");
    println!("  {}", counters.summary());
    if interrupted.is_cancelled() {
        info!("run was interrupted; checkpoint saved");
        return Err(Error::internal("interrupted, checkpoint saved"));
    }
    Ok(())
}

#[expect(clippy::too_many_arguments, reason = "flat CLI surface")]
async fn search(
    config: &AppConfig,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f64>,
    canon: bool,
    legends: bool,
    assemble: bool,
) -> Result<(), Error> {
    let retriever = holocron_infrastructure::build_retrieval_service(config).await?;

    let mut filters = MetadataFilter::new();
    if canon {
        filters = filters.with_field("canonicity", "canon");
    } else if legends {
        filters = filters.with_field("canonicity", "legends");
    }
    let filters = (!filters.is_empty()).then_some(filters);

    if assemble {
        let context = retriever
            .search_context(query, limit, threshold, filters.as_ref())
            .await?;
        if context.is_empty() {
            println!("No passages matched.");
        } else {
            println!("{context}");
        }
        return Ok(());
    }

    let results = retriever
        .search(query, limit, threshold, filters.as_ref())
        .await?;

    if results.is_empty() {
        println!("No passages matched.");
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        let title = result
            .metadata
            .get("title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("(untitled)");
        let section = result
            .metadata
            .get("section")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        println!(
            "{:>2}. [{:.3}] {title} / {section} ({})",
            rank + 1,
            result.similarity,
            result.id
        );
        for line in result.content.lines().take(3) {
            println!("      {line}");
        }
    }
    Ok(())
}

async fn stats(config: &AppConfig, status: &std::path::Path) -> Result<(), Error> {
    if status.exists() {
        let store = CsvProgressStore::open(status, None)?;
        let processed = store.processed_count().await?;
        let total = store.total_count().await?;
        let completion = if total > 0 {
            (processed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("Progress: {processed} of {total} items processed ({completion:.2}%)");
    } else {
        println!("No progress file at {}", status.display());
    }

    match holocron_infrastructure::build_vector_store(config).await {
        Ok(store) => match store.health_check().await {
            Ok(()) => println!("Vector backend '{}': healthy", store.provider_name()),
            Err(e) => println!("Vector backend '{}': unavailable ({e})", store.provider_name()),
        },
        Err(e) => println!("Vector backend not configured: {e}"),
    }
    Ok(())
}
