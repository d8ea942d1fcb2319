pub mod grid;

use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

use crate::{
    config::{
        AppConfig, ConfigStore, DataSource, FileConfigStore, Rgba, Threshold, WindowLength,
        default_thresholds, source_name_from_path,
    },
    sync::{
        SyncEngine, SyncOutcome, accessor::LocalFileAccessor, detect_shutdown, run_watch,
        store::{FileUsageStore, UsageStore},
    },
    utils::{clock::DefaultClock, dir::default_app_dir, logging::enable_logging},
};

/// Practical cap carried over from the settings UI; the merge itself has no
/// limit.
const MAX_SOURCES: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "Gridtrack", version, long_about = None)]
#[command(about = "Aggregates coding-time logs into a contribution-grid usage series", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run one sync pass over the enabled sources")]
    Sync {
        #[arg(
            long = "as-of",
            help = "Reference day for the window in YYYY-MM-DD. Defaults to today"
        )]
        as_of: Option<NaiveDate>,
    },
    #[command(about = "Sync periodically until interrupted")]
    Watch {
        #[arg(long, default_value_t = 3600, help = "Seconds between passes")]
        interval: u64,
    },
    #[command(about = "Render the published series as a contribution grid")]
    Show,
    #[command(subcommand, about = "Manage tracking log sources")]
    Source(SourceCommand),
    #[command(subcommand, about = "Manage the intensity threshold table")]
    Threshold(ThresholdCommand),
    #[command(about = "Set the trailing window length")]
    Window {
        #[arg(help = "30, 60 or 90")]
        days: u32,
    },
}

#[derive(Subcommand, Debug)]
enum SourceCommand {
    #[command(about = "Register a tracking log file")]
    Add {
        path: PathBuf,
        #[arg(long, help = "Display name. Defaults to the file name")]
        name: Option<String>,
        #[arg(long, help = "Register without enabling")]
        disabled: bool,
    },
    #[command(about = "List registered sources")]
    List,
    #[command(about = "Rename a source")]
    Rename { source: String, name: String },
    #[command(about = "Include a source in sync passes")]
    Enable { source: String },
    #[command(about = "Exclude a source from sync passes")]
    Disable { source: String },
    #[command(about = "Remove a source")]
    Remove { source: String },
}

#[derive(Subcommand, Debug)]
enum ThresholdCommand {
    #[command(about = "List the threshold table")]
    List,
    #[command(about = "Add or replace a cutoff rule")]
    Set {
        #[arg(help = "Cutoff in seconds")]
        seconds: u64,
        #[arg(help = "Display color as 'r,g,b' or 'r,g,b,a' with components in 0..=1")]
        color: Rgba,
    },
    #[command(about = "Remove a cutoff rule")]
    Remove { seconds: u64 },
    #[command(about = "Restore the default table")]
    Reset,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args.dir.clone().map_or_else(default_app_dir, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&app_dir.join("logs"), logging_level, args.log)?;

    let config_store = FileConfigStore::new(app_dir.join("config.json"));
    let usage_store = FileUsageStore::new(app_dir.join("usage_series.json"));

    match args.commands {
        Commands::Sync { as_of } => {
            let engine = SyncEngine::new(
                config_store,
                LocalFileAccessor,
                usage_store,
                Box::new(DefaultClock),
            );
            let outcome = match as_of {
                Some(today) => engine.sync_as_of(today).await?,
                None => engine.sync_now().await?,
            };
            match outcome {
                SyncOutcome::Completed(report) => println!(
                    "Published {} days from {} sources ({} skipped)",
                    report.days_published, report.sources_loaded, report.sources_skipped
                ),
                SyncOutcome::Coalesced => println!("A sync pass is already running"),
            }
            Ok(())
        }
        Commands::Watch { interval } => {
            let engine = SyncEngine::new(
                config_store,
                LocalFileAccessor,
                usage_store,
                Box::new(DefaultClock),
            );
            let shutdown = CancellationToken::new();
            let (_, watch_result) = tokio::join!(
                detect_shutdown(shutdown.clone()),
                run_watch(&engine, Duration::from_secs(interval), shutdown.clone()),
            );
            watch_result
        }
        Commands::Show => {
            match usage_store.load().await? {
                Some(series) => print!("{}", grid::render(&series)),
                None => println!("No published data yet. Run `gridtrack sync` first."),
            }
            Ok(())
        }
        Commands::Source(command) => process_source_command(&config_store, command),
        Commands::Threshold(command) => process_threshold_command(&config_store, command),
        Commands::Window { days } => {
            let length = WindowLength::try_from(days)?;
            let mut config = config_store.load()?;
            config.window_length = length;
            config_store.save(&config)?;
            println!("Window length set to {} days", length.days());
            Ok(())
        }
    }
}

fn process_source_command(store: &impl ConfigStore, command: SourceCommand) -> Result<()> {
    let mut config = store.load()?;
    match command {
        SourceCommand::Add {
            path,
            name,
            disabled,
        } => {
            if config.sources.len() >= MAX_SOURCES {
                bail!("At most {MAX_SOURCES} sources are supported");
            }
            let name = name.unwrap_or_else(|| source_name_from_path(&path));
            let mut source = DataSource::new(name, path);
            source.enabled = !disabled;
            println!("Added source '{}' ({})", source.name, source.id);
            config.sources.push(source);
            config.first_launch = false;
            store.save(&config)
        }
        SourceCommand::List => {
            if config.sources.is_empty() {
                println!("No sources registered");
            }
            for source in &config.sources {
                println!(
                    "{} {}  {}  {}",
                    if source.enabled { "*" } else { " " },
                    source.id,
                    source.name,
                    source.path.display()
                );
            }
            Ok(())
        }
        SourceCommand::Rename { source, name } => {
            let index = find_source(&config, &source)?;
            config.sources[index].name = name;
            store.save(&config)
        }
        SourceCommand::Enable { source } => {
            let index = find_source(&config, &source)?;
            config.sources[index].enabled = true;
            store.save(&config)
        }
        SourceCommand::Disable { source } => {
            let index = find_source(&config, &source)?;
            config.sources[index].enabled = false;
            store.save(&config)
        }
        SourceCommand::Remove { source } => {
            let index = find_source(&config, &source)?;
            let removed = config.sources.remove(index);
            println!("Removed source '{}'", removed.name);
            store.save(&config)
        }
    }
}

fn process_threshold_command(store: &impl ConfigStore, command: ThresholdCommand) -> Result<()> {
    let mut config = store.load()?;
    match command {
        ThresholdCommand::List => {
            let mut table = config.threshold_table();
            table.sort_by_key(|t| t.seconds);
            for threshold in table {
                println!(
                    "{:>8}  {:.2},{:.2},{:.2},{:.2}{}",
                    threshold_label(threshold.seconds),
                    threshold.color.red,
                    threshold.color.green,
                    threshold.color.blue,
                    threshold.color.alpha,
                    if threshold.editable { "" } else { "  (fixed)" },
                );
            }
            Ok(())
        }
        ThresholdCommand::Set { seconds, color } => {
            if seconds == 0 {
                bail!("The no-activity rule is fixed and can't be changed");
            }
            match config.thresholds.iter_mut().find(|t| t.seconds == seconds) {
                Some(existing) => existing.color = color,
                None => config.thresholds.push(Threshold {
                    seconds,
                    color,
                    editable: true,
                }),
            }
            store.save(&config)
        }
        ThresholdCommand::Remove { seconds } => {
            if seconds == 0 {
                bail!("The no-activity rule is fixed and can't be removed");
            }
            let before = config.thresholds.len();
            config.thresholds.retain(|t| t.seconds != seconds);
            if config.thresholds.len() == before {
                bail!("No rule with a {seconds}s cutoff");
            }
            store.save(&config)
        }
        ThresholdCommand::Reset => {
            config.thresholds = default_thresholds();
            store.save(&config)
        }
    }
}

fn threshold_label(seconds: u64) -> String {
    if seconds == 0 {
        "0s".to_owned()
    } else {
        format!("{:.1}h", seconds as f64 / 3600.0)
    }
}

/// Sources can be addressed by id or by name; names are convenient but may be
/// ambiguous.
fn find_source(config: &AppConfig, needle: &str) -> Result<usize> {
    let matches = config
        .sources
        .iter()
        .enumerate()
        .filter(|(_, s)| s.id.to_string() == needle || s.name == needle)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();
    match matches.as_slice() {
        [] => bail!("No source matches '{needle}'"),
        [index] => Ok(*index),
        _ => bail!("'{needle}' matches several sources, use the id"),
    }
}
