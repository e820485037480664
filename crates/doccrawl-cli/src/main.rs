mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;

use doccrawl_client::{
    ChatClient, FsArtifactStore, HtmdCleaner, OpenAiExtractor, OpenAiTransformer, ReqwestFetcher,
    RobotsFetcher,
};
use doccrawl_core::config::{ApiCredentials, AppConfig, DEFAULT_LANGUAGE};
use doccrawl_core::models::{BatchResult, CrawlTarget, ExtractionSchema, FailureKind};
use doccrawl_core::pipeline::{BatchPipeline, count_crawlable_urls};
use doccrawl_core::rate_limit::{
    DEFAULT_CONCURRENCY, DelayRange, RateLimitConfig, RateLimitedCaller, RateLimitedFetcher,
};
use doccrawl_core::traits::Fetcher;
use doccrawl_core::util::{derive_schema_name, output_dir_name};
use doccrawl_core::{HttpPageFetcher, PageProcessor, UrlDiscoverer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Count the pages a run would process; writes nothing
    Count,
    /// Fetch, rewrite and save every discovered page
    Process,
}

#[derive(Debug, Parser)]
#[command(
    name = "doccrawl",
    version,
    about = "Crawl a documentation site and rewrite each page into Markdown with an LLM"
)]
struct Cli {
    /// Seed URL of the documentation site
    url: String,

    /// What to do with the discovered pages
    #[arg(value_enum)]
    mode: Mode,

    /// Documentation type; selects keywords and prompt from the config files
    #[arg(long = "doc_type", default_value = "general")]
    doc_type: String,

    /// Topic to emphasise in the rewritten pages
    #[arg(long)]
    focus: Option<String>,

    /// Name of the tool the documentation describes
    #[arg(long = "tool_name")]
    tool_name: Option<String>,

    /// Maximum number of pages to process
    #[arg(long = "max_pages", default_value_t = 20)]
    max_pages: usize,

    /// Minimum delay before each fetch, in seconds
    #[arg(long = "min_delay", default_value_t = 1.0)]
    min_delay: f64,

    /// Maximum delay before each fetch, in seconds
    #[arg(long = "max_delay", default_value_t = 3.0)]
    max_delay: f64,

    /// Do not consult robots.txt
    #[arg(long = "ignore_robots", default_value_t = false)]
    ignore_robots: bool,

    /// Only log errors to the console
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output to the console
    #[arg(short, long)]
    verbose: bool,

    /// Do not log a preview of the content sent to the model
    #[arg(long = "no-debug-content", default_value_t = false)]
    no_debug_content: bool,

    /// Pages processed at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Model name sent to the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_MODEL", default_value = doccrawl_client::llm::DEFAULT_MODEL)]
    model: String,

    /// Language of the rewritten documents
    #[arg(long, default_value = DEFAULT_LANGUAGE)]
    language: String,

    /// JSON Schema file; enables structured extraction before rewriting
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Directory holding keywords.json and prompts.json (or a data/ subdirectory)
    #[arg(long = "config_dir", default_value = ".")]
    config_dir: PathBuf,

    /// Root of the output tree
    #[arg(long = "output_root", default_value = "output")]
    output_root: PathBuf,

    /// Directory for crawler.log
    #[arg(long = "log_dir", default_value = "logs")]
    log_dir: PathBuf,

    /// API key for the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,
}

/// Everything validated before the first network request.
struct Settings {
    config: AppConfig,
    credentials: ApiCredentials,
    schema: Option<ExtractionSchema>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_path = logging::init(logging::console_level(cli.quiet, cli.verbose), &cli.log_dir)?;
    tracing::info!(url = %cli.url, mode = ?cli.mode, log = %log_path.display(), "Starting doccrawl");

    let settings = match validate(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Configuration invalid");
            return Err(e);
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            on_signal.cancel();
        }
    });

    let fetcher = ReqwestFetcher::new()
        .context("Failed to create HTTP client")?
        .allow_private_urls();
    if cli.ignore_robots {
        execute(&cli, settings, fetcher, cancel, &log_path).await
    } else {
        execute(&cli, settings, RobotsFetcher::new(fetcher), cancel, &log_path).await
    }
}

/// Load configuration and credentials; any problem here aborts the run.
fn validate(cli: &Cli) -> Result<Settings> {
    let credentials = ApiCredentials::from_values(cli.api_key.clone(), cli.api_base.clone())?;
    let config = AppConfig::load(&cli.config_dir);
    config.validate()?;

    let schema = cli.schema.as_deref().map(load_schema).transpose()?;
    Ok(Settings {
        config,
        credentials,
        schema,
    })
}

fn load_schema(path: &Path) -> Result<ExtractionSchema> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    let schema: serde_json::Value =
        serde_json::from_str(&raw).context("Invalid JSON in schema file")?;
    Ok(ExtractionSchema {
        name: derive_schema_name(path),
        schema,
    })
}

async fn execute<F: Fetcher + 'static>(
    cli: &Cli,
    settings: Settings,
    fetcher: F,
    cancel: CancellationToken,
    log_path: &Path,
) -> Result<()> {
    let limits = RateLimitConfig::default()
        .with_concurrency(cli.concurrency)
        .with_fetch_delay(DelayRange::from_secs_f64(cli.min_delay, cli.max_delay));
    let caller = RateLimitedCaller::new(limits);
    let discovery_fetcher = RateLimitedFetcher::new(fetcher.clone(), caller.clone());

    if cli.mode == Mode::Count {
        let count = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            count = count_crawlable_urls(discovery_fetcher, &cli.url) => count,
        };
        println!("{count}");
        return Ok(());
    }

    let discoverer = UrlDiscoverer::new(discovery_fetcher);
    let urls = tokio::select! {
        () = cancel.cancelled() => return Ok(()),
        urls = discoverer.discover(&cli.url, cli.max_pages) => urls,
    };
    let targets = CrawlTarget::from_urls(&urls);
    if targets.is_empty() {
        tracing::warn!(url = %cli.url, "No pages discovered, nothing to do");
        return Ok(());
    }

    let output_dir = cli.output_root.join(output_dir_name(
        &cli.doc_type,
        cli.focus.as_deref(),
        cli.tool_name.as_deref(),
    ));
    let store = FsArtifactStore::create(&output_dir)?;

    let mut pages = HttpPageFetcher::new(fetcher, HtmdCleaner::new());
    if let Some(schema) = settings.schema {
        let chat = ChatClient::new(&settings.credentials, &cli.model)?;
        let extractor = OpenAiExtractor::new(chat, &schema.name);
        pages = pages.with_structured(extractor, schema);
    }
    let transformer = OpenAiTransformer::new(ChatClient::new(&settings.credentials, &cli.model)?);
    let prompt = settings.config.prompt_config(
        &cli.doc_type,
        cli.focus.as_deref(),
        cli.tool_name.as_deref(),
        &cli.language,
    );
    let processor = PageProcessor::new(pages, transformer, store, prompt)
        .with_content_preview(!cli.no_debug_content);

    let pipeline = BatchPipeline::new(processor, caller);

    let result = pipeline.run(targets, cli.max_pages, cancel).await;
    print_summary(&result, &output_dir, log_path);
    Ok(())
}

fn print_summary(result: &BatchResult, output_dir: &Path, log_path: &Path) {
    for outcome in result.successes() {
        if let Some(path) = &outcome.output_path {
            println!("{} -> {}", outcome.url, path.display());
        }
    }

    let by_kind: Vec<String> = [
        FailureKind::Fetch,
        FailureKind::Extraction,
        FailureKind::Transform,
        FailureKind::Persistence,
        FailureKind::Other,
    ]
    .into_iter()
    .filter_map(|kind| match result.failure_count_of(kind) {
        0 => None,
        n => Some(format!("{kind}={n}")),
    })
    .collect();

    println!(
        "\nProcessed {} page(s) in {:.1}s: {} succeeded, {} failed{}, {} dropped, {} cancelled",
        result.outcomes.len() + result.dropped + result.cancelled,
        result.duration.as_secs_f64(),
        result.success_count(),
        result.failure_count(),
        if by_kind.is_empty() {
            String::new()
        } else {
            format!(" ({})", by_kind.join(", "))
        },
        result.dropped,
        result.cancelled,
    );
    println!("Output: {}", output_dir.display());
    println!("Log: {}", log_path.display());
}
