//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use leadflow_classifier::{OpenRouterClient, OpenRouterSettings};
use leadflow_core::{Pipeline, ProgressReporter};
use leadflow_delivery::WebhookClient;
use leadflow_shared::{
    AppConfig, Category, RunConfig, RunSummary, StoredLead, expand_home, init_config,
    load_config, resolve_api_key, validate_webhook_url,
};
use leadflow_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// leadflow: classify contact lists into personas and hand them downstream.
#[derive(Parser)]
#[command(
    name = "leadflow",
    version,
    about = "Deduplicate, classify, store, and deliver batches of sales leads.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Process a CSV file of leads end to end.
    Run(RunArgs),

    /// Inspect stored leads.
    Leads {
        #[command(subcommand)]
        action: LeadsAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct RunArgs {
    /// CSV file with a header row.
    pub file: PathBuf,

    /// Maximum concurrent classification/delivery calls.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Pause between concurrent chunks, in milliseconds.
    #[arg(long)]
    pub chunk_delay_ms: Option<u64>,

    /// Lead database path (defaults to the configured one).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Webhook receiving each classified lead.
    #[arg(long, env = "LEADFLOW_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// OpenRouter model ID used for classification.
    #[arg(long)]
    pub model: Option<String>,
}

/// Stored lead subcommands.
#[derive(Subcommand)]
pub(crate) enum LeadsAction {
    /// List stored leads, newest first.
    List {
        /// Only show leads in this category.
        #[arg(long)]
        category: Option<Category>,

        /// Maximum number of leads to show.
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Lead database path.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show stored lead counts per category.
    Stats {
        /// Lead database path.
        #[arg(long)]
        db: Option<PathBuf>,
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
        0 => "leadflow=info",
        1 => "leadflow=debug",
        _ => "leadflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Leads { action } => match action {
            LeadsAction::List {
                category,
                limit,
                json,
                db,
            } => cmd_leads_list(category, limit, json, db.as_deref()).await,
            LeadsAction::Stats { db } => cmd_leads_stats(db.as_deref()).await,
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Database path from the flag, falling back to the configured default.
fn resolve_db_path(flag: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(expand_home(&config.defaults.database_path)?),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    // Validate everything up front so a bad setup fails before any work
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;

    let webhook_raw = args
        .webhook_url
        .clone()
        .unwrap_or_else(|| config.webhook.url.clone());
    let webhook_url = validate_webhook_url(&webhook_raw)?;

    if !args.file.is_file() {
        return Err(eyre!("input file '{}' does not exist", args.file.display()));
    }

    let defaults = RunConfig::from(&config);
    let run_config = RunConfig::new(
        args.concurrency.unwrap_or(defaults.concurrency),
        args.chunk_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.chunk_delay),
    );

    let db_path = resolve_db_path(args.db.as_deref(), &config)?;
    let store = Storage::open(&db_path).await?;

    let mut settings = OpenRouterSettings::from_config(&config.openrouter, api_key);
    if let Some(model) = args.model {
        settings.model = model;
    }
    let classifier = OpenRouterClient::new(settings)?;
    let sink = WebhookClient::from_config(webhook_url, &config.webhook)?;

    info!(
        file = %args.file.display(),
        db = %db_path.display(),
        model = classifier.model(),
        webhook = %sink.url(),
        concurrency = run_config.concurrency,
        "starting lead run"
    );

    let pipeline = Pipeline::new(
        Arc::new(store),
        Arc::new(classifier),
        Arc::new(sink),
        &run_config,
    );

    let reporter = CliProgress::new()?;
    let summary = pipeline.run_file(&args.file, &reporter).await?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Run complete");
    println!("  Total:      {}", summary.total);
    println!("  Persisted:  {}", summary.persisted);
    println!("  Skipped:    {}", summary.skipped);
    println!("  Failed:     {}", summary.failed());
    println!(
        "  Delivered:  {}/{}",
        summary.delivered,
        summary.delivered + summary.delivery_failed
    );
    if summary.classification_fallbacks > 0 {
        println!(
            "  Fallbacks:  {} (classified as Other after an unusable answer)",
            summary.classification_fallbacks
        );
    }
    if summary.classified > 0 {
        println!("  Categories:");
        for category in Category::ALL {
            println!(
                "    {:<12} {}",
                category.as_str(),
                summary.categories.get(category)
            );
        }
    }
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    if summary.dedup_failed || summary.persist_failed {
        println!();
    }
    if summary.dedup_failed {
        println!("  Warning: the duplicate check failed, every record was treated as new.");
    }
    if summary.persist_failed {
        println!("  Warning: saving the batch failed, no leads from this run were stored.");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn chunk_done(&self, phase: &str, done: usize, total: usize) {
        self.spinner.set_message(format!("{phase} [{done}/{total}]"));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// leads
// ---------------------------------------------------------------------------

async fn cmd_leads_list(
    category: Option<Category>,
    limit: u32,
    json: bool,
    db: Option<&Path>,
) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db_path(db, &config)?;
    let storage = Storage::open_readonly(&db_path).await?;

    let leads = storage.list_leads(category, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&leads)?);
        return Ok(());
    }

    if leads.is_empty() {
        println!("No leads stored yet.");
        return Ok(());
    }

    println!(
        "{:<24} {:<32} {:<28} {:<12} {:<14} {}",
        "NAME", "EMAIL", "COMPANY", "CATEGORY", "STATUS", "CREATED"
    );
    for lead in &leads {
        print_lead_row(lead);
    }
    Ok(())
}

fn print_lead_row(lead: &StoredLead) {
    let name = format!("{} {}", lead.first_name, lead.last_name);
    println!(
        "{:<24} {:<32} {:<28} {:<12} {:<14} {}",
        truncate(name.trim(), 24),
        truncate(&lead.email, 32),
        truncate(&lead.company, 28),
        lead.category.as_str(),
        lead.status,
        lead.created_at
    );
}

/// Cut `s` to at most `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

async fn cmd_leads_stats(db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db_path(db, &config)?;
    let storage = Storage::open_readonly(&db_path).await?;

    let counts = storage.category_counts().await?;

    println!();
    for category in Category::ALL {
        println!("  {:<12} {}", category.as_str(), counts.get(category));
    }
    println!("  {:<12} {}", "Total", counts.total());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "leadflow",
            "-v",
            "run",
            "leads.csv",
            "--concurrency",
            "3",
            "--chunk-delay-ms",
            "250",
            "--webhook-url",
            "https://hooks.example.com/leads",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.file, PathBuf::from("leads.csv"));
                assert_eq!(args.concurrency, Some(3));
                assert_eq!(args.chunk_delay_ms, Some(250));
                assert_eq!(
                    args.webhook_url.as_deref(),
                    Some("https://hooks.example.com/leads")
                );
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn leads_list_parses_category_case_insensitively() {
        let cli = Cli::parse_from(["leadflow", "leads", "list", "--category", "procurement"]);
        match cli.command {
            Command::Leads {
                action: LeadsAction::List { category, limit, .. },
            } => {
                assert_eq!(category, Some(Category::Procurement));
                assert_eq!(limit, 50);
            }
            _ => panic!("expected leads list"),
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(Cli::try_parse_from(["leadflow", "leads", "list", "--category", "sales"]).is_err());
    }

    #[test]
    fn db_flag_overrides_config() {
        let config = AppConfig::default();
        let path = resolve_db_path(Some(Path::new("/tmp/leads.db")), &config).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/leads.db"));
        let default = resolve_db_path(None, &config).unwrap();
        assert!(default.ends_with("leads.db"));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
