//! `tabletalk`: ask questions of spreadsheet reports.
//!
//! # Usage
//!
//! ```text
//! tabletalk ingest report.xlsx --store q3-ads
//! tabletalk ask --store q3-ads "Which SKUs had the best ROAS?"
//! tabletalk serve
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use settings::Settings;
use tabletalk_agent::{Orchestrator, openai::OpenAiChatModel};
use tabletalk_core::{query::QueryOutcome, store::ConversationStore};
use tabletalk_datastore::{Reports, SkipReason, Source};
use tabletalk_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tabletalk", author, version, about = "Ask questions of spreadsheet reports")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tabletalk.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Serve the JSON API.
  Serve,

  /// Build (or rebuild) a report store from a workbook.
  Ingest {
    file:  PathBuf,
    #[arg(long)]
    store: String,
  },

  /// Print the tables and columns of a store.
  Schema {
    #[arg(long)]
    store: String,
  },

  /// Run one read-only SQL statement.
  Query {
    #[arg(long)]
    store: String,
    sql:   String,
  },

  /// Ask a question; pass --thread to continue a conversation.
  Ask {
    #[arg(long)]
    store:    String,
    #[arg(long)]
    thread:   Option<String>,
    question: String,
  },

  /// List conversation threads, most recent first.
  Threads,

  /// Print the turns of a thread.
  History {
    thread: String,
    #[arg(long)]
    limit:  Option<usize>,
  },

  /// Most frequently asked questions.
  Popular {
    #[arg(long, default_value_t = 10)]
    limit: usize,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  match cli.command {
    Command::Serve => serve(&settings).await,
    Command::Ingest { file, store } => ingest(&settings, file, &store).await,
    Command::Schema { store } => {
      let schema = reports(&settings).schema(&store).await?;
      println!("{}", schema.describe());
      Ok(())
    }
    Command::Query { store, sql } => query(&settings, &store, &sql).await,
    Command::Ask { store, thread, question } => ask(&settings, &store, thread, &question).await,
    Command::Threads => {
      for t in conversations(&settings).await?.list_threads().await? {
        let last = t.last_activity.map(|at| at.to_rfc3339()).unwrap_or_else(|| "-".to_owned());
        println!("{}\t{}\t{}\t{}", t.thread_id, t.store_id, t.message_count, last);
      }
      Ok(())
    }
    Command::History { thread, limit } => {
      let store = conversations(&settings).await?;
      if store.get_thread(&thread).await?.is_none() {
        bail!("thread {thread} not found");
      }
      for turn in store.history(&thread, limit).await? {
        println!("[{}] {}: {}", turn.created_at.to_rfc3339(), turn.role, turn.content);
      }
      Ok(())
    }
    Command::Popular { limit } => {
      for q in conversations(&settings).await?.popular_questions(limit).await? {
        println!("{}\t{}", q.count, q.question);
      }
      Ok(())
    }
  }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

fn reports(settings: &Settings) -> Reports {
  Reports::new(settings.data_dir.clone(), settings.ingest.clone())
}

async fn conversations(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let path = &settings.conversations_path;
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open conversation store at {}", path.display()))
}

async fn orchestrator(settings: &Settings) -> anyhow::Result<Orchestrator<SqliteStore, OpenAiChatModel>> {
  let template = settings.prompt()?;
  let model = OpenAiChatModel::new(settings.llm.clone()).context("failed to build model client")?;
  let store = conversations(settings).await?;
  Ok(Orchestrator::new(
    Arc::new(store),
    model,
    Arc::new(reports(settings)),
    template,
    settings.orchestrator(),
  ))
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn serve(settings: &Settings) -> anyhow::Result<()> {
  std::fs::create_dir_all(&settings.data_dir)
    .with_context(|| format!("failed to create {}", settings.data_dir.display()))?;
  let orchestrator = Arc::new(orchestrator(settings).await?);
  let app = tabletalk_api::router(orchestrator, settings.upload_limit_bytes);

  let address = format!("{}:{}", settings.host, settings.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
    })
    .await
    .context("server error")?;
  Ok(())
}

async fn ingest(settings: &Settings, file: PathBuf, store_id: &str) -> anyhow::Result<()> {
  let report = reports(settings)
    .ingest(store_id, Source::Path(file.clone()))
    .await
    .with_context(|| format!("failed to ingest {}", file.display()))?;

  println!("store: {}", report.store_path.display());
  for t in &report.tables {
    println!("  {} -> {} ({} rows, {} columns)", t.sheet_name, t.table_name, t.rows, t.columns.len());
  }
  for s in &report.skipped {
    match &s.reason {
      SkipReason::Unmatched => println!("  {} skipped (no rule)", s.sheet_name),
      SkipReason::Failed(why) => println!("  {} skipped: {why}", s.sheet_name),
    }
  }
  Ok(())
}

async fn query(settings: &Settings, store_id: &str, sql: &str) -> anyhow::Result<()> {
  match reports(settings).execute(store_id, sql).await {
    QueryOutcome::Rows(rows) => {
      println!("{}", rows.columns.join("\t"));
      for row in &rows.rows {
        let cells: Vec<String> = row
          .iter()
          .map(|c| serde_json::to_string(c).unwrap_or_default())
          .collect();
        println!("{}", cells.join("\t"));
      }
      Ok(())
    }
    QueryOutcome::Error { message } => bail!(message),
  }
}

async fn ask(settings: &Settings, store_id: &str, thread: Option<String>, question: &str) -> anyhow::Result<()> {
  let orchestrator = orchestrator(settings).await?;
  let thread_id = thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
  let answer = orchestrator.respond_default(store_id, question, &thread_id).await?;
  eprintln!("thread: {thread_id}");
  println!("{answer}");
  Ok(())
}
