//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use siteagent_core::{Services, analyze_site, chat_with_site};
use siteagent_shared::{AppConfig, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// siteagent — website analysis and grounded chat from the terminal.
#[derive(Parser)]
#[command(
    name = "siteagent",
    version,
    about = "Crawl a website, extract business insights, and chat about its content.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a website and print its structured business insights.
    Analyze {
        /// Website URL to analyze.
        url: String,

        /// Additional questions for the model (repeatable).
        #[arg(short, long = "question")]
        questions: Vec<String>,
    },

    /// Ask a question about a previously analyzed website.
    Chat {
        /// Website URL the question is about.
        url: String,

        /// The question to ask.
        query: String,

        /// Conversation thread to continue.
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "siteagent=info",
        1 => "siteagent=debug",
        _ => "siteagent=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Analyze { url, questions } => cmd_analyze(&url, &questions).await,
        Command::Chat { url, query, thread } => {
            cmd_chat(&url, &query, thread.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(url: &str, questions: &[String]) -> Result<()> {
    let parsed_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let config = load_config()?;
    let services = Arc::new(Services::from_config(&config).await?);

    info!(url, questions = questions.len(), "analyzing website");

    let spinner = progress_spinner();
    spinner.set_message(format!("Analyzing {url}"));

    let outcome = analyze_site(&services, &parsed_url, questions).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    println!();
    println!("  Analysis of {}", outcome.url);
    println!("  Pages crawled:  {}", outcome.pages_crawled);
    println!("  Chunks indexed: {}", outcome.chunks_indexed);
    println!();
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);

    Ok(())
}

async fn cmd_chat(url: &str, query: &str, thread: Option<&str>) -> Result<()> {
    let parsed_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let config = load_config()?;
    let services = Arc::new(Services::from_config(&config).await?);

    info!(url, thread = thread.unwrap_or("default"), "asking question");

    let spinner = progress_spinner();
    spinner.set_message(format!("Asking about {url}"));

    let outcome = chat_with_site(&services, &parsed_url, query, thread, None).await;
    spinner.finish_and_clear();
    let outcome = outcome?;

    println!();
    println!("  {}", outcome.reply);
    println!();
    if !outcome.sources.is_empty() {
        println!("  Sources:");
        for source in &outcome.sources {
            println!("  - {source}");
        }
        println!();
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress spinner
// ---------------------------------------------------------------------------

fn progress_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
