//! Brocha application binary - composition root.
//!
//! 1. Load configuration from TOML, apply CLI and environment overrides
//! 2. Open the SQLite database (catalog + knowledge chunks)
//! 3. Run the requested command: serve the API, ingest guides, import or
//!    index products

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use brocha_api::{start_server, AppState};
use brocha_chat::{ConversationMemory, DialogueOrchestrator};
use brocha_core::config::BrochaConfig;
use brocha_core::error::BrochaError;
use brocha_llm::{CohereClient, EmbeddingProvider, HashEmbedding};
use brocha_storage::{Catalog, Database};
use brocha_vector::{DocumentIngester, TextSplitter, VectorStore};

use cli::{CliArgs, Command, EmbeddingArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = BrochaConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }

    // Tracing: RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Brocha v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let data_dir = config.general.data_path();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = config.general.database_path();
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    match args.command() {
        Command::Serve => serve(config, db).await?,
        Command::IngestDocs {
            paths,
            collection,
            embedding,
        } => {
            let collection = collection.unwrap_or_else(|| config.retrieval.collection.clone());
            ingest_docs(&config, db, &paths, &collection, &embedding).await?
        }
        Command::ImportProducts { file } => import_products(db, &file)?,
        Command::IndexProducts { embedding } => index_products(&config, db, &embedding).await?,
    }

    Ok(())
}

async fn serve(config: BrochaConfig, db: Arc<Database>) -> Result<(), BrochaError> {
    let cohere = Arc::new(CohereClient::from_config(&config.llm)?);
    let vectors = Arc::new(VectorStore::load(Arc::clone(&db))?);
    let catalog = Arc::new(Catalog::new(Arc::clone(&db)));
    tracing::info!(
        guides = vectors.collection_len(&config.retrieval.collection),
        products = catalog.count()?,
        "Knowledge sources ready"
    );

    let memory = Arc::new(ConversationMemory::new(
        config.chat.history_limit,
        Duration::from_secs(config.chat.cleanup_interval_secs),
    ));
    let orchestrator = DialogueOrchestrator::from_config(
        &config,
        Arc::clone(&memory),
        cohere.clone(),
        cohere,
        vectors,
        catalog,
    );

    memory
        .start()
        .map_err(|e| BrochaError::Api(format!("Failed to start memory cleanup: {}", e)))?;

    let state = AppState::new(config, Arc::new(orchestrator));
    let served = start_server(state, shutdown_signal()).await;

    if let Err(e) = memory.stop().await {
        tracing::warn!(error = %e, "Memory cleanup did not stop cleanly");
    }
    tracing::info!("Brocha stopped");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

fn embedder(config: &BrochaConfig, args: &EmbeddingArgs) -> Result<Arc<dyn EmbeddingProvider>, BrochaError> {
    if args.offline {
        tracing::warn!("Using the offline hash embedder; vectors will not match the provider's");
        return Ok(Arc::new(HashEmbedding::new()));
    }
    Ok(Arc::new(CohereClient::from_config(&config.llm)?))
}

async fn ingest_docs(
    config: &BrochaConfig,
    db: Arc<Database>,
    paths: &[PathBuf],
    collection: &str,
    embedding: &EmbeddingArgs,
) -> Result<(), BrochaError> {
    let files = expand_paths(paths)?;
    if files.is_empty() {
        return Err(BrochaError::Ingestion(
            "no .txt or .md files found in the given paths".to_string(),
        ));
    }

    let splitter = TextSplitter::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
    let store = Arc::new(VectorStore::load(db)?);
    let ingester = DocumentIngester::new(embedder(config, embedding)?, Arc::clone(&store), splitter);

    let report = ingester.ingest_files(files.as_slice(), collection).await?;
    tracing::info!(
        files = files.len(),
        chunks = report.chunks,
        skipped = report.skipped,
        collection,
        total = store.collection_len(collection),
        "Guides ingested"
    );
    Ok(())
}

fn import_products(db: Arc<Database>, file: &Path) -> Result<(), BrochaError> {
    let catalog = Catalog::new(db);
    let report = catalog.import_json(file)?;
    tracing::info!(
        file = %file.display(),
        products = report.products,
        categories_created = report.categories_created,
        total = catalog.count()?,
        "Products imported"
    );
    Ok(())
}

async fn index_products(
    config: &BrochaConfig,
    db: Arc<Database>,
    embedding: &EmbeddingArgs,
) -> Result<(), BrochaError> {
    let catalog = Catalog::new(Arc::clone(&db));
    let documents = catalog.product_documents()?;
    let store = Arc::new(VectorStore::load(db)?);
    let collection = &config.catalog.collection;

    let removed = store.delete_collection(collection)?;
    tracing::info!(collection = %collection, removed, "Previous product vectors dropped");

    // Chunking settings are irrelevant here: records are stored whole.
    let splitter = TextSplitter::new(config.retrieval.chunk_size, config.retrieval.chunk_overlap)?;
    let ingester = DocumentIngester::new(embedder(config, embedding)?, Arc::clone(&store), splitter);
    let report = ingester
        .index_records(documents.iter().map(|d| d.text.as_str()), "catalog", collection)
        .await?;

    tracing::info!(
        collection = %collection,
        indexed = report.chunks,
        skipped = report.skipped,
        "Products indexed"
    );
    Ok(())
}

/// Files are taken as given; directories contribute their `.txt` and `.md`
/// entries (not recursive), sorted by name.
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, BrochaError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "txt" | "md" | "markdown"))
            })
            .collect();
        entries.sort();
        files.extend(entries);
    }
    Ok(files)
}
