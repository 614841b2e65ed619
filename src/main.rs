//! # LexRAG CLI
//!
//! The `lexrag` binary drives the legal research engine: corpus ingestion,
//! similarity search, case analysis, interactive chat, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! lexrag --config ./lexrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexrag ingest` | Parse, chunk, embed, and index the PDF corpus |
//! | `lexrag search "<query>"` | Find similar cases, chunks, or case bundles |
//! | `lexrag analyze --text "<case>"` | Full grounded analysis of a case |
//! | `lexrag analyze --pdf case.pdf` | Analysis from a judgment PDF |
//! | `lexrag chat` | Interactive chat session about a case |
//! | `lexrag serve` | Start the JSON HTTP server |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use lexrag::analysis::CaseAnalyzer;
use lexrag::chat::{create_store, ChatEngine};
use lexrag::config::{load_config, Config};
use lexrag::enforcer::SecurityEnforcer;
use lexrag::excerpt::ExcerptReader;
use lexrag::hallucination::HallucinationDetector;
use lexrag::object_store::ObjectStoreClient;
use lexrag::retriever::Retriever;
use lexrag::server::{run_server, AppState};
use lexrag::similarity::SimilarityEngine;
use lexrag::{embedding, ingest, llm};

/// LexRAG — legal precedent retrieval and grounded case analysis.
#[derive(Parser)]
#[command(
    name = "lexrag",
    about = "Legal research engine: precedent retrieval, grounded analysis, and guarded chat",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./lexrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the PDF corpus into the vector index.
    ///
    /// Parses every PDF under the configured corpus directory, optionally
    /// uploads sources to the object store, chunks and embeds the text,
    /// and atomically replaces the index. Individual PDF failures are
    /// skipped and reported in the summary.
    Ingest,

    /// Search the corpus for similar cases.
    Search {
        /// The case description or legal question to search with.
        query: String,
        /// Search mode: `cases` (deduplicated), `chunks` (raw), or `grouped`.
        #[arg(long, default_value = "cases")]
        mode: String,
        /// Number of results (cases or chunks).
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Chunks per case in grouped mode.
        #[arg(long, default_value_t = 3)]
        chunks_per_case: usize,
    },

    /// Analyze a case and produce a grounded Markdown report.
    Analyze {
        /// Case description text.
        #[arg(long, conflicts_with = "pdf")]
        text: Option<String>,
        /// Path to a judgment PDF to analyze.
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Number of precedents to ground on.
        #[arg(long, default_value_t = 5)]
        k: usize,
    },

    /// Interactive chat about a case.
    Chat {
        /// Case description the session is grounded on.
        #[arg(long)]
        case: String,
        /// Session title.
        #[arg(long, default_value = "CLI session")]
        title: String,
    },

    /// Start the JSON HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexrag=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => cmd_ingest(&config).await,
        Commands::Search {
            query,
            mode,
            k,
            chunks_per_case,
        } => cmd_search(&config, &query, &mode, k, chunks_per_case).await,
        Commands::Analyze { text, pdf, k } => cmd_analyze(&config, text, pdf, k).await,
        Commands::Chat { case, title } => cmd_chat(&config, &case, &title).await,
        Commands::Serve => cmd_serve(&config).await,
    }
}

async fn cmd_ingest(config: &Config) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let store = if config.object_store.enabled {
        Some(ObjectStoreClient::new(&config.object_store)?)
    } else {
        None
    };

    let summary = ingest::run_ingest(config, provider.as_ref(), store.as_ref()).await?;

    println!("ingest");
    println!("  PDFs processed: {}", summary.pdfs_processed);
    println!("  chunks indexed: {}", summary.chunks_indexed);
    if config.object_store.enabled {
        println!("  uploads: {}", summary.uploads);
    }
    if !summary.failures.is_empty() {
        println!("  failures:");
        for (file, error) in &summary.failures {
            println!("    {}: {}", file, error);
        }
    }
    println!("ok");
    Ok(())
}

async fn cmd_search(
    config: &Config,
    query: &str,
    mode: &str,
    k: usize,
    chunks_per_case: usize,
) -> Result<()> {
    let engine = build_similarity(config)?;

    match mode {
        "cases" => {
            let matches = engine.find_similar_cases(query, k).await?;
            if matches.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, m) in matches.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} ({})",
                    i + 1,
                    m.similarity_score,
                    m.case_title,
                    if m.citation.is_empty() { "no citation" } else { &m.citation }
                );
                println!("    section: {} | page {}", m.section, m.page_number);
                if !m.document_url.is_empty() {
                    println!("    {}", m.document_url);
                }
            }
        }
        "chunks" => {
            let hits = engine.find_similar_chunks(query, k).await?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} — {} (chunk {})",
                    i + 1,
                    hit.distance,
                    hit.record.case_title,
                    hit.record.section,
                    hit.record.chunk_ordinal
                );
            }
        }
        "grouped" => {
            let groups = engine.find_grouped(query, k, chunks_per_case).await?;
            if groups.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, group) in groups.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} ({})",
                    i + 1,
                    group.best_distance,
                    group.case_title,
                    if group.citation.is_empty() { "no citation" } else { &group.citation }
                );
                for chunk in &group.chunks {
                    println!(
                        "    [{:.4}] {} — page {}",
                        chunk.distance, chunk.record.section, chunk.record.page_number
                    );
                }
            }
        }
        other => bail!("Unknown search mode: {}. Use cases, chunks, or grouped.", other),
    }

    Ok(())
}

async fn cmd_analyze(
    config: &Config,
    text: Option<String>,
    pdf: Option<PathBuf>,
    k: usize,
) -> Result<()> {
    let analyzer = build_analyzer(config)?;

    let result = match (text, pdf) {
        (Some(text), None) => analyzer.analyze_text(&text, k, None).await?,
        (None, Some(path)) => analyzer.analyze_pdf(&path, k, None).await?,
        _ => bail!("Provide exactly one of --text or --pdf"),
    };

    if !result.success {
        println!("Input rejected: {}", result.violations.join(", "));
        return Ok(());
    }

    println!("{}", result.analysis);

    if let Some(report) = &result.hallucination {
        if report.has_hallucinations {
            println!("\n---\nWARNING: {}", report.summary);
            for fake in &report.suspected_fake_refs {
                println!("  - {} ({})", fake.text, fake.reason);
            }
        }
    }
    Ok(())
}

async fn cmd_chat(config: &Config, case: &str, title: &str) -> Result<()> {
    let engine = build_chat(config)?;

    let session_id = engine.start_session("cli", case, title).await?;
    println!("Session {} started. Type questions; empty line exits.", session_id);

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        match engine.send_message(&session_id, message, true).await {
            Ok(response) if response.success => {
                println!("\n{}\n", response.response);
                if let Some(report) = &response.hallucination {
                    if report.has_hallucinations {
                        println!("WARNING: {}", report.summary);
                    }
                }
                if !response.suggested_questions.is_empty() {
                    println!("Suggested follow-ups:");
                    for q in &response.suggested_questions {
                        println!("  - {}", q);
                    }
                }
            }
            Ok(response) => {
                println!("Message rejected: {}", response.violations.join(", "));
            }
            Err(e) => {
                println!("Error: {}", e);
            }
        }
    }

    engine.delete_session(&session_id, "cli").await?;
    println!("Session terminated.");
    Ok(())
}

async fn cmd_serve(config: &Config) -> Result<()> {
    let state = build_app_state(config)?;
    run_server(state).await
}

// ============ Component wiring ============

fn build_retriever(config: &Config) -> Result<Arc<Retriever>> {
    let provider = embedding::create_provider(&config.embedding)?;
    let mut retriever = Retriever::new(provider);
    retriever
        .load(&config.index.dir)
        .with_context(|| format!("loading vector index from {}", config.index.dir.display()))?;
    Ok(Arc::new(retriever))
}

fn build_similarity(config: &Config) -> Result<Arc<SimilarityEngine>> {
    Ok(Arc::new(SimilarityEngine::new(build_retriever(config)?)))
}

fn build_analyzer(config: &Config) -> Result<Arc<CaseAnalyzer>> {
    let retriever = build_retriever(config)?;
    let similarity = Arc::new(SimilarityEngine::new(retriever.clone()));
    let enforcer = Arc::new(SecurityEnforcer::new(&config.security)?);
    let detector = Arc::new(HallucinationDetector::new(
        Some(retriever),
        Some(&config.security.audit_dir),
    )?);
    let llm_provider = llm::create_provider(&config.llm)?;

    Ok(Arc::new(CaseAnalyzer::new(
        enforcer,
        similarity,
        llm_provider,
        detector,
        config.llm.clone(),
    )))
}

fn build_chat(config: &Config) -> Result<Arc<ChatEngine>> {
    let retriever = build_retriever(config)?;
    let similarity = Arc::new(SimilarityEngine::new(retriever.clone()));
    let enforcer = Arc::new(SecurityEnforcer::new(&config.security)?);
    let detector = Arc::new(HallucinationDetector::new(
        Some(retriever),
        Some(&config.security.audit_dir),
    )?);
    let llm_provider = llm::create_provider(&config.llm)?;

    let excerpts = if config.object_store.enabled {
        let store = ObjectStoreClient::new(&config.object_store)?;
        Some(Arc::new(ExcerptReader::new(
            Some(Arc::new(store)),
            config.object_store.timeout_secs,
        )))
    } else {
        None
    };

    Ok(Arc::new(ChatEngine::new(
        create_store(&config.chat),
        similarity,
        excerpts,
        llm_provider,
        enforcer,
        detector,
        config.chat.clone(),
    )))
}

fn build_app_state(config: &Config) -> Result<AppState> {
    let retriever = build_retriever(config)?;
    let similarity = Arc::new(SimilarityEngine::new(retriever.clone()));
    let enforcer = Arc::new(SecurityEnforcer::new(&config.security)?);
    let detector = Arc::new(HallucinationDetector::new(
        Some(retriever),
        Some(&config.security.audit_dir),
    )?);
    let llm_provider = llm::create_provider(&config.llm)?;

    let analyzer = Arc::new(CaseAnalyzer::new(
        enforcer.clone(),
        similarity.clone(),
        llm_provider.clone(),
        detector.clone(),
        config.llm.clone(),
    ));

    let excerpts = if config.object_store.enabled {
        let store = ObjectStoreClient::new(&config.object_store)?;
        Some(Arc::new(ExcerptReader::new(
            Some(Arc::new(store)),
            config.object_store.timeout_secs,
        )))
    } else {
        None
    };

    let chat = Arc::new(ChatEngine::new(
        create_store(&config.chat),
        similarity.clone(),
        excerpts,
        llm_provider,
        enforcer,
        detector,
        config.chat.clone(),
    ));

    Ok(AppState {
        analyzer,
        similarity,
        chat,
        config: Arc::new(config.clone()),
    })
}
