use anyhow::Result;
use clap::{Parser, Subcommand};
use delve::config::{self, Services};
use delve::server::{self, AppState, DEFAULT_QUESTIONS};
use delve_core::capability::REASONING_MODEL;
use delve_core::{ResearchRequest, SlotPolicy, StreamLine};
use delve_local::{http_client, OpenAiCompatClient};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(about = "Recursive breadth/depth-bounded web research", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API (`/api/research`, `/api/feedback`, `/api/models`).
    Serve(ServeCmd),
    /// Run one research task and write the LEARNING:/REPORT: stream to stdout.
    Research(ResearchCmd),
    /// Print clarifying questions for a query (json array).
    Feedback(FeedbackCmd),
    /// List models available on the current plan (json array).
    Models(ModelsCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct EngineArgs {
    /// Model id used for every generation call.
    #[arg(long, env = "DELVE_MODEL", default_value = REASONING_MODEL)]
    model: String,
    /// Concurrency slot handling across recursion levels. Allowed: release, hold
    #[arg(long, default_value = "release")]
    slot_policy: SlotPolicy,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    #[command(flatten)]
    engine: EngineArgs,
    /// Listen address (default: 0.0.0.0:$PORT, else 0.0.0.0:3000).
    #[arg(long, env = "DELVE_BIND")]
    bind: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ResearchCmd {
    query: String,
    #[command(flatten)]
    engine: EngineArgs,
    /// Queries generated at the top level.
    #[arg(long, default_value_t = server::DEFAULT_BREADTH)]
    breadth: usize,
    /// Recursion levels.
    #[arg(long, default_value_t = server::DEFAULT_DEPTH)]
    depth: usize,
    /// Requested parallel branches (capped per model).
    #[arg(long, default_value_t = server::DEFAULT_CONCURRENCY)]
    concurrency: usize,
}

#[derive(clap::Args, Debug)]
struct FeedbackCmd {
    query: String,
    #[arg(long, env = "DELVE_MODEL", default_value = REASONING_MODEL)]
    model: String,
    #[arg(long, default_value_t = DEFAULT_QUESTIONS)]
    num_questions: usize,
}

#[derive(clap::Args, Debug)]
struct ModelsCmd {
    /// Drop models with a smaller context window.
    #[arg(long, default_value_t = 0)]
    min_context_length: u64,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    // stdout carries the research stream; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env_file()?;
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve(args) => {
            let services = Services::from_env(args.engine.slot_policy)?;
            let bind = config::resolve_bind(args.bind);
            let state = Arc::new(AppState {
                services,
                default_model: args.engine.model,
            });
            server::serve(state, &bind).await?;
        }
        Commands::Research(args) => {
            let services = Services::from_env(args.engine.slot_policy)?;
            let req = ResearchRequest::new(args.query, args.breadth, args.depth, args.engine.model)
                .with_concurrency(args.concurrency);
            let mut lines = server::research_stream(services.engine, req);
            let mut failed = None;
            let mut stdout = std::io::stdout().lock();
            while let Some(line) = lines.recv().await {
                stdout.write_all(line.encode().as_bytes())?;
                stdout.flush()?;
                if let StreamLine::Error(msg) = line {
                    failed = Some(msg);
                }
            }
            if let Some(msg) = failed {
                anyhow::bail!(msg);
            }
        }
        Commands::Feedback(args) => {
            let services = Services::from_env(SlotPolicy::default())?;
            let questions = services
                .engine
                .clarifying_questions(&args.query, args.num_questions, &args.model)
                .await;
            println!("{}", serde_json::to_string_pretty(&questions)?);
        }
        Commands::Models(args) => {
            let catalog = OpenAiCompatClient::from_env(http_client()?)?;
            let models = config::list_models(&catalog, args.min_context_length).await?;
            println!("{}", serde_json::to_string_pretty(&models)?);
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "delve",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("delve {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
