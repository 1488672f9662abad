use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use synaptic_core::store::{migrate, HISTORY_LIMIT};
use synaptic_core::{FetchBackend, ResearchScore};
use synaptic_local::classify::{extract_title, toggle_bookmark};
use synaptic_local::pipeline::Pipeline;
use synaptic_local::rest_store::RestStore;
use synaptic_local::{now_epoch_s, report, LocalFetcher};
use synaptic_server::config::{
    load_env_file_from_env, rest_store_configured, AnalysisArgs, Provider, StoreArgs,
};
use synaptic_server::server::{serve, AppState};

#[derive(Parser, Debug)]
#[command(name = "synaptic")]
#[command(about = "URL → extracted text → AI research analysis (HTTP server + CLI)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (`POST /analyze`).
    Serve(ServeCmd),
    /// Analyze one URL and print the result.
    Analyze(AnalyzeCmd),
    /// List saved analyses, newest first.
    History(HistoryCmd),
    /// Toggle the bookmark for a saved analysis.
    Bookmark(BookmarkCmd),
    /// Move local history and bookmarks into the configured remote store.
    Migrate(MigrateCmd),
    /// Diagnose configuration issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    /// Listen address.
    #[arg(long, env = "SYNAPTIC_BIND", default_value = "127.0.0.1:3000")]
    bind: String,
    /// Save each successful analysis to history.
    #[arg(long, env = "SYNAPTIC_SAVE_HISTORY", action = clap::ArgAction::Set, default_value_t = false)]
    save_history: bool,
    #[command(flatten)]
    analysis: AnalysisArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
    Csv,
    Blueprint,
}

#[derive(clap::Args, Debug)]
struct AnalyzeCmd {
    url: String,
    /// Output format.
    #[arg(long, value_enum, default_value = "json")]
    format: Format,
    /// Also save the result to history.
    #[arg(long, default_value_t = false)]
    save: bool,
    #[command(flatten)]
    analysis: AnalysisArgs,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct HistoryCmd {
    #[arg(long, default_value_t = 20)]
    limit: usize,
    /// Output format: json|text
    #[arg(long = "output", default_value = "json")]
    output: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct BookmarkCmd {
    /// URL of a saved analysis.
    url: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct MigrateCmd {
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fetcher() -> Result<Arc<dyn FetchBackend>> {
    Ok(Arc::new(LocalFetcher::new()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = load_env_file_from_env();
    init_tracing();
    if let Some((p, n)) = env_file {
        tracing::debug!(path = %p.display(), vars = n, "loaded env file");
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => {
            let completion = match args.analysis.completion_backend() {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!(error = %e, "completion backend unavailable; /analyze will return a configuration error");
                    None
                }
            };
            let store = args.save_history.then(|| args.store.open());
            let state = Arc::new(AppState {
                pipeline_cfg: args.analysis.pipeline_config(),
                fetcher: fetcher()?,
                completion,
                store,
            });
            serve(&args.bind, state).await?;
        }
        Commands::Analyze(args) => {
            let completion = args.analysis.completion_backend()?;
            let pipeline = Pipeline::new(fetcher()?, completion, args.analysis.pipeline_config());
            let run = pipeline.run(&args.url).await?;
            if args.save {
                let saved = args
                    .store
                    .open()
                    .save_analysis(&run.to_history_entry(now_epoch_s()))
                    .await?;
                tracing::info!(id = %saved.id, "saved analysis");
            }

            let out = &run.output;
            let score = ResearchScore::calculate(&out.analysis);
            let title = extract_title(&out.structured_data, &out.source_text);
            match args.format {
                Format::Json => println!(
                    "{}",
                    report::to_json(&run.requested_url, &title, out, &score, now_epoch_s())?
                ),
                Format::Csv => print!("{}", report::to_csv(&out.analysis, &score)),
                Format::Text => print!(
                    "{}",
                    report::render_text(&run.requested_url, &title, &out.analysis, &score)
                ),
                Format::Blueprint => println!("{}", report::blueprint(&out.analysis)),
            }
        }
        Commands::History(args) => {
            let store = args.store.open();
            let entries = store.list_analyses(args.limit.min(HISTORY_LIMIT)).await?;
            let bookmarks = store.list_bookmarks().await?;
            let rows: Vec<serde_json::Value> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "id": e.id,
                        "url": e.url,
                        "title": e.title,
                        "overall_score": e.overall_score,
                        "created_at_epoch_s": e.created_at_epoch_s,
                        "bookmarked": bookmarks.iter().any(|b| b.url == e.url),
                    })
                })
                .collect();
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    for r in &rows {
                        println!(
                            "{}{:>4}  {}  {}",
                            if r["bookmarked"].as_bool().unwrap_or(false) { "*" } else { " " },
                            r["overall_score"].as_u64().unwrap_or(0),
                            r["title"].as_str().unwrap_or(""),
                            r["url"].as_str().unwrap_or(""),
                        );
                    }
                }
                _ => println!(
                    "{}",
                    serde_json::json!({
                        "schema_version": 1,
                        "kind": "history",
                        "ok": true,
                        "store": store.name(),
                        "entries": rows,
                    })
                ),
            }
        }
        Commands::Bookmark(args) => {
            let store = args.store.open();
            let entry = store
                .list_analyses(HISTORY_LIMIT)
                .await?
                .into_iter()
                .find(|e| e.url == args.url)
                .with_context(|| {
                    format!("no saved analysis for {}; run `synaptic analyze --save` first", args.url)
                })?;
            let bookmarked = toggle_bookmark(store.as_ref(), &entry).await?;
            println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "kind": "bookmark",
                    "ok": true,
                    "url": entry.url,
                    "bookmarked": bookmarked,
                })
            );
        }
        Commands::Migrate(args) => {
            let from = args.store.local_store();
            let to = RestStore::from_env(reqwest::Client::new())?;
            let n = migrate(&from, &to).await?;
            tracing::info!(migrated = n, from = %from.root().display(), "migration finished");
            println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "kind": "migrate",
                    "ok": true,
                    "migrated": n,
                })
            );
        }
        Commands::Doctor(args) => {
            let t0 = std::time::Instant::now();
            let data_dir = args.store.data_dir();
            let mut checks: Vec<serde_json::Value> = Vec::new();

            let data_ok = (|| -> anyhow::Result<()> {
                std::fs::create_dir_all(&data_dir)?;
                let marker = data_dir.join(format!(".synaptic-doctor-{}", std::process::id()));
                std::fs::write(&marker, b"ok")?;
                std::fs::remove_file(&marker)?;
                Ok(())
            })();
            checks.push(serde_json::json!({
                "name": "data_dir_writable",
                "ok": data_ok.is_ok(),
                "error": data_ok.err().map(|e| e.to_string()),
            }));

            let gemini = Provider::Gemini.configured();
            let openai_compat = Provider::OpenaiCompat.configured();
            checks.push(serde_json::json!({
                "name": "completion_credentials",
                "ok": gemini || openai_compat,
                "hint": if gemini || openai_compat { "" } else { "set GEMINI_API_KEY (or SYNAPTIC_ENV_FILE pointing at a file that does)" },
            }));

            let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
            let payload = serde_json::json!({
                "schema_version": 1,
                "kind": "doctor",
                "ok": ok,
                "name": "synaptic",
                "version": env!("CARGO_PKG_VERSION"),
                "platform": {
                    "os": std::env::consts::OS,
                    "arch": std::env::consts::ARCH,
                },
                "elapsed_ms": t0.elapsed().as_millis(),
                "configured": {
                    "llm": {
                        "gemini": gemini,
                        "openai_compat": openai_compat,
                    },
                    "store": {
                        "rest": rest_store_configured(),
                    },
                    "data_dir": data_dir.to_string_lossy().to_string(),
                },
                "checks": checks,
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => {
                    println!("synaptic {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
                    println!("data_dir: {}", data_dir.display());
                    println!("llm: gemini={gemini} openai_compat={openai_compat}");
                    println!("store: rest={}", rest_store_configured());
                    println!("checks:");
                    if let Some(arr) = payload["checks"].as_array() {
                        for c in arr {
                            let name = c["name"].as_str().unwrap_or("?");
                            let ok = c["ok"].as_bool().unwrap_or(false);
                            println!("- {}: {}", name, if ok { "ok" } else { "fail" });
                        }
                    }
                }
                _ => println!("{payload}"),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "synaptic",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("synaptic {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
