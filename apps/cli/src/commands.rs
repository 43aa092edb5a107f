//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use letterpress_core::{Generator, ProviderSet};
use letterpress_markup::{ExportFormat, export, visible_text};
use letterpress_shared::{
    AppConfig, Event, GenerationJob, GenerationMode, GenerationRequest, ImagePlacement,
    ImageSource, JobId, JobStatus, KnowledgeItem, SectionLength, init_config, load_config,
};
use letterpress_storage::Storage;
use tracing::info;
use uuid::Uuid;

/// Delay between two reads of a running job.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Letterpress: newsletters from interchangeable AI providers.
#[derive(Parser)]
#[command(
    name = "letterpress",
    version,
    about = "Generate multi-section newsletters with fallback across AI providers.",
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
    /// Create a generation job and follow it until it finishes.
    Generate(GenerateArgs),

    /// Show status, progress, and logs of a job.
    Status {
        /// Job ID.
        id: JobId,
    },

    /// Print or export the finished document of a job.
    Show {
        /// Job ID.
        id: JobId,

        /// Output format: json, html, or markdown.
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List recent jobs.
    Jobs {
        /// Maximum number of jobs to list.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Manage organization knowledge items.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Manage organization events.
    Events {
        #[command(subcommand)]
        action: EventsAction,
    },

    /// Show configured providers and whether they are usable.
    Providers,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `generate`.
#[derive(clap::Args)]
pub(crate) struct GenerateArgs {
    /// Newsletter topic.
    topic: String,

    /// Generation mode: quick, detailed, or custom.
    #[arg(short, long, default_value = "quick")]
    mode: GenerationMode,

    /// Number of sections (overrides the mode default).
    #[arg(short = 'n', long)]
    sections: Option<usize>,

    /// Section length: short, medium, or long (overrides the mode default).
    #[arg(long)]
    length: Option<SectionLength>,

    /// Extra instructions for the planner and every section.
    #[arg(short, long)]
    instructions: Option<String>,

    /// Skip the research stage.
    #[arg(long)]
    skip_research: bool,

    /// Attach images to sections.
    #[arg(long)]
    images: bool,

    /// Image source: ai or web.
    #[arg(long, requires = "images")]
    image_source: Option<ImageSource>,

    /// Image placement: all or header.
    #[arg(long, requires = "images")]
    image_placement: Option<ImagePlacement>,

    /// Promote upcoming organization events.
    #[arg(long)]
    events: bool,

    /// Draw on the organization knowledge base.
    #[arg(long)]
    knowledge: bool,

    /// Tone preset id.
    #[arg(long)]
    tone: Option<String>,

    /// Writing style preset id.
    #[arg(long)]
    style: Option<String>,

    /// Audience preset id.
    #[arg(long)]
    audience: Option<String>,

    /// Context preset id.
    #[arg(long)]
    context: Option<String>,

    /// Structure guide preset id.
    #[arg(long)]
    guide: Option<String>,

    /// Stop waiting after this many seconds.
    #[arg(long, default_value = "600")]
    timeout: u64,
}

impl From<GenerateArgs> for GenerationRequest {
    fn from(args: GenerateArgs) -> Self {
        Self {
            topic: args.topic,
            mode: args.mode,
            instructions: args.instructions,
            skip_research: args.skip_research,
            num_sections: args.sections,
            section_length: args.length,
            include_images: args.images,
            image_source: args.image_source,
            image_placement: args.image_placement,
            include_events: args.events,
            include_knowledge: args.knowledge,
            tone: args.tone,
            style: args.style,
            audience: args.audience,
            context: args.context,
            guide: args.guide,
        }
    }
}

/// Knowledge subcommands.
#[derive(Subcommand)]
pub(crate) enum KnowledgeAction {
    /// Store a knowledge item.
    Add {
        /// Item title.
        #[arg(long)]
        title: String,

        /// Item text.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        content: Option<String>,

        /// Read the item text from a file.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Search stored items by substring.
    Search {
        /// Text to look for.
        query: String,

        #[arg(short, long, default_value = "5")]
        limit: u32,
    },
}

/// Events subcommands.
#[derive(Subcommand)]
pub(crate) enum EventsAction {
    /// Store an upcoming event.
    Add {
        /// Event title.
        #[arg(long)]
        title: String,

        /// Start date (YYYY-MM-DD) or RFC 3339 timestamp.
        #[arg(long)]
        starts_at: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        url: Option<String>,
    },
    /// List upcoming events.
    List {
        #[arg(short, long, default_value = "10")]
        limit: u32,
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
        0 => "letterpress=info",
        1 => "letterpress=debug",
        _ => "letterpress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
        Command::Generate(args) => cmd_generate(args).await,
        Command::Status { id } => cmd_status(&id).await,
        Command::Show { id, format, out } => cmd_show(&id, format, out).await,
        Command::Jobs { limit } => cmd_jobs(limit).await,
        Command::Knowledge { action } => match action {
            KnowledgeAction::Add {
                title,
                content,
                file,
            } => cmd_knowledge_add(title, content, file).await,
            KnowledgeAction::Search { query, limit } => cmd_knowledge_search(&query, limit).await,
        },
        Command::Events { action } => match action {
            EventsAction::Add {
                title,
                starts_at,
                description,
                location,
                url,
            } => cmd_events_add(title, &starts_at, description, location, url).await,
            EventsAction::List { limit } => cmd_events_list(limit).await,
        },
        Command::Providers => cmd_providers(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

async fn open_storage(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open(&config.defaults.database_path()?).await?)
}

async fn open_storage_readonly(config: &AppConfig) -> Result<Storage> {
    Ok(Storage::open_readonly(&config.defaults.database_path()?).await?)
}

async fn require_job(storage: &Storage, id: &JobId) -> Result<GenerationJob> {
    storage
        .get_job(id)
        .await?
        .ok_or_else(|| eyre!("no job with id {id}"))
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(args: GenerateArgs) -> Result<()> {
    let config = load_config()?;
    let timeout = Duration::from_secs(args.timeout);
    let storage = Arc::new(open_storage(&config).await?);
    let generator = Generator::from_config(storage.clone(), config)?;

    let handle = generator.start_job(args.into()).await?;
    let id = handle.id;
    info!(job_id = %id, "job started");
    println!("Job {id} started");

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    bar.enable_steady_tick(Duration::from_millis(80));

    let start = Instant::now();
    let mut printed = 0;
    let job = loop {
        let job = require_job(&storage, &id).await?;
        for entry in job.logs.iter().skip(printed) {
            bar.println(format!("  {entry}"));
        }
        printed = job.logs.len();
        bar.set_position(u64::from(job.progress));
        if let Some(last) = job.logs.last() {
            bar.set_message(last.message.clone());
        }

        if job.status.is_terminal() {
            break job;
        }
        if start.elapsed() >= timeout {
            bar.abandon_with_message("stopped waiting");
            return Err(eyre!(
                "job {id} did not finish within {}s; it is still marked generating",
                timeout.as_secs()
            ));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    bar.finish_and_clear();

    match (job.status, job.content) {
        (JobStatus::Ready, Some(doc)) => {
            println!();
            println!("  Newsletter ready!");
            println!("  Title:    {}", doc.header.title);
            println!("  Sections: {}", doc.sections.len());
            println!("  Time:     {:.1}s", start.elapsed().as_secs_f64());
            println!();
            println!("  letterpress show {id} --format html --out newsletter.html");
            println!();
            Ok(())
        }
        _ => Err(eyre!("job {id} failed; see `letterpress status {id}`")),
    }
}

// ---------------------------------------------------------------------------
// Job inspection
// ---------------------------------------------------------------------------

async fn cmd_status(id: &JobId) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let job = require_job(&storage, id).await?;

    println!("Job:      {}", job.id);
    println!("Topic:    {}", job.topic);
    println!("Status:   {}", job.status);
    println!("Progress: {}%", job.progress);
    println!("Updated:  {}", job.updated_at.to_rfc3339());
    println!();
    for entry in &job.logs {
        println!("  {entry}");
    }
    Ok(())
}

async fn cmd_show(id: &JobId, format: ExportFormat, out: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let job = require_job(&storage, id).await?;

    let doc = job
        .content
        .ok_or_else(|| eyre!("job {id} has no document (status: {})", job.status))?;
    let rendered = export(&doc, format)?;

    match out {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn cmd_jobs(limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let jobs = storage
        .list_jobs(&config.defaults.organization_id, limit)
        .await?;

    if jobs.is_empty() {
        println!("No jobs yet.");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {:<10} {:>3}%  {}  {}",
            job.id,
            job.status.as_str(),
            job.progress,
            job.created_at.format("%Y-%m-%d %H:%M"),
            job.topic
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Knowledge and events
// ---------------------------------------------------------------------------

async fn cmd_knowledge_add(
    title: String,
    content: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let content = match (content, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| eyre!("cannot read {}: {e}", path.display()))?,
        (None, None) => return Err(eyre!("either --content or --file is required")),
    };

    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let item = KnowledgeItem {
        id: Uuid::now_v7().to_string(),
        organization_id: config.defaults.organization_id.clone(),
        title,
        content,
        created_at: Utc::now(),
    };
    storage.insert_knowledge_item(&item).await?;
    println!("Stored knowledge item {}", item.id);
    Ok(())
}

async fn cmd_knowledge_search(query: &str, limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let items = storage
        .search_knowledge(&config.defaults.organization_id, query, limit)
        .await?;

    if items.is_empty() {
        println!("No matching knowledge items.");
    }
    for item in items {
        let preview: String = visible_text(&item.content).chars().take(120).collect();
        println!("{}  {}\n    {preview}", item.id, item.title);
    }
    Ok(())
}

async fn cmd_events_add(
    title: String,
    starts_at: &str,
    description: String,
    location: Option<String>,
    url: Option<String>,
) -> Result<()> {
    let starts_at = parse_start(starts_at)?;
    let config = load_config()?;
    let storage = open_storage(&config).await?;
    let event = Event {
        id: Uuid::now_v7().to_string(),
        organization_id: config.defaults.organization_id.clone(),
        title,
        description,
        starts_at,
        location,
        url,
    };
    storage.insert_event(&event).await?;
    println!("Stored event {} on {}", event.id, event.starts_at.format("%Y-%m-%d"));
    Ok(())
}

fn parse_start(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| eyre!("invalid start '{value}': expected YYYY-MM-DD or RFC 3339"))?;
    date.and_hms_opt(9, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| eyre!("invalid start '{value}'"))
}

async fn cmd_events_list(limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage_readonly(&config).await?;
    let events = storage
        .upcoming_events(&config.defaults.organization_id, Utc::now(), limit)
        .await?;

    if events.is_empty() {
        println!("No upcoming events.");
    }
    for event in events {
        let location = event.location.as_deref().unwrap_or("-");
        println!(
            "{}  {}  ({location})",
            event.starts_at.format("%Y-%m-%d %H:%M"),
            event.title
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Providers and config
// ---------------------------------------------------------------------------

fn cmd_providers() -> Result<()> {
    let config = load_config()?;
    let set = ProviderSet::from_entries(&config.providers);

    if config.providers.is_empty() {
        println!("No providers configured. Add [[providers]] entries to the config file.");
        return Ok(());
    }

    for provider in set.generation.iter().chain(&set.research) {
        println!(
            "  ok    {:<10} {:<11} {}",
            provider.category.as_str(),
            provider.kind.as_str(),
            provider.name
        );
    }
    for skipped in &set.skipped {
        println!("  skip  {}: {}", skipped.name, skipped.reason);
    }
    if set.generation.is_empty() {
        println!();
        println!("  No usable generation provider: jobs will fail.");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
