//! Nuggit page agent: entry point.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::mpsc;
use url::Url;

use nuggit_agent::backend::http::fetch_page;
use nuggit_agent::transport::framing;
use nuggit_agent::{
    offline, run_agent, AgentConfig, Backend, ConfigOverrides, HttpBackend, Page, StdioTransport,
};

/// Host messages buffered between stdin and the page loop.
const HOST_CHANNEL_CAPACITY: usize = 64;

#[derive(Parser)]
#[command(
    name = "nuggit-agent",
    about = "Nuggit page agent: runs backend-issued extraction plans against live pages",
    version
)]
struct Cli {
    /// Backend base address. Also reads NUGGIT_BACKEND.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Debounce window for mutation batches, in milliseconds.
    /// Also reads NUGGIT_DEBOUNCE_MS.
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    /// Network timeout in milliseconds. Also reads NUGGIT_TIMEOUT_MS.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a page, negotiate its plan and watch host messages on stdin.
    ///
    /// Each stdin line is a JSON message:
    ///   {"type":"mutations","records":[{"target":"#list","html":"<li>..</li>"}]}
    ///   {"type":"navigate","url":"https://..."}
    ///   {"type":"trigger"}
    Run {
        /// Page address.
        url: Url,

        /// Read the page from this file instead of fetching it.
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Run a plan file against a saved page and print the report.
    Extract {
        /// Plan JSON, either a bare plan or a saved trigger response.
        #[arg(long)]
        plan: PathBuf,

        /// Saved page markup.
        #[arg(long)]
        html: PathBuf,

        /// Page address to stamp on the report.
        #[arg(long, default_value = "")]
        url: String,
    },

    /// Check that the backend is reachable.
    Status,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   nuggit-agent completions bash > ~/.local/share/bash-completion/completions/nuggit-agent
    ///   nuggit-agent completions zsh > ~/.zfunc/_nuggit-agent
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = ConfigOverrides {
        backend: cli.backend,
        debounce_ms: cli.debounce_ms,
        timeout_ms: cli.timeout_ms,
    };

    match cli.command {
        Commands::Run { url, html } => {
            let config = AgentConfig::resolve(&overrides)?;
            let backend = Arc::new(HttpBackend::new(&config)?);
            let html = match html {
                Some(path) => tokio::fs::read_to_string(&path).await?,
                None => fetch_page(&url, config.timeout).await?,
            };
            tracing::info!("Nuggit agent");
            tracing::info!("Backend: {}", config.backend);

            let (tx, mut rx) = mpsc::channel(HOST_CHANNEL_CAPACITY);
            let reader = StdioTransport::spawn(tx);
            let first = Page {
                url: url.to_string(),
                html,
            };
            let summary = run_agent(backend, &config, first, &mut rx).await;
            reader.abort();
            tracing::info!("Served {} page(s), {} pass(es)", summary.pages, summary.passes);
        }

        Commands::Extract { plan, html, url } => {
            match offline::extract_files(&plan, &html, &url).await? {
                Some(report) => {
                    let line = framing::encode_report(&report)?;
                    std::io::stdout().write_all(line.as_bytes())?;
                }
                None => tracing::info!("No non-empty results to report"),
            }
        }

        Commands::Status => {
            let config = AgentConfig::resolve(&overrides)?;
            let backend = HttpBackend::new(&config)?;
            match backend.status().await {
                Ok(()) => println!("Backend reachable: {}", config.backend),
                Err(e) => {
                    eprintln!("Backend unreachable at {}: {e}", config.backend);
                    std::process::exit(1);
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "nuggit-agent", &mut std::io::stdout());
        }
    }

    Ok(())
}
