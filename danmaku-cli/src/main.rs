//! Danmaku CLI Tool
//!
//! Command-line interface for inspecting comment files and playing them
//! through the engine on an in-memory stage.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use danmaku_core::{Comment, Mode};
use danmaku_engine::{
    CommentManager, EngineConfig, FilterRule, HeadlessStage, RenderMode, RuleOp,
};
use danmaku_formats::SourceFormat;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Categories that get a lane allocator
const MANAGED_MODES: [Mode; 5] = [
    Mode::ScrollLeft,
    Mode::ScrollBottom,
    Mode::Reverse,
    Mode::Top,
    Mode::Bottom,
];

#[derive(Parser)]
#[command(name = "danmaku")]
#[command(about = "Danmaku - timed comment overlay scheduling and playback")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Detect from the file contents
    Auto,
    Bilibili,
    Acfun,
    /// Canonical JSON records
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a comment file contains
    Inspect {
        /// Input comment file path
        input: PathBuf,

        /// Source encoding
        #[arg(long, value_enum, default_value = "auto")]
        format: FormatArg,
    },

    /// Play a comment file through the engine and report placement
    Simulate {
        /// Input comment file path
        input: PathBuf,

        /// Source encoding
        #[arg(long, value_enum, default_value = "auto")]
        format: FormatArg,

        /// Stage width in pixels
        #[arg(long, default_value = "1280")]
        width: f64,

        /// Stage height in pixels
        #[arg(long, default_value = "720")]
        height: f64,

        /// Stop the play-head here (defaults to the end of the last comment)
        #[arg(long)]
        until_ms: Option<f64>,

        /// Play-head advance per tick
        #[arg(long, default_value = "10")]
        step_ms: f64,

        /// Maximum simultaneous comments (0 = unlimited)
        #[arg(long, default_value = "0")]
        limit: usize,

        /// Reject comments of this mode code (repeatable)
        #[arg(long = "reject-mode")]
        reject_modes: Vec<u32>,

        /// Global opacity multiplier (0.0-1.0)
        #[arg(long, default_value = "1.0")]
        opacity: f64,

        /// Global lifetime multiplier
        #[arg(long, default_value = "1.0")]
        scale: f64,

        /// Vertical gap between comments in pixels
        #[arg(long, default_value = "3")]
        spacing: f64,

        /// Play-head jump treated as a seek, in ms
        #[arg(long, default_value = "2000")]
        seek_trigger: f64,

        /// Let the stage interpolate scrolling comments natively
        #[arg(long)]
        native: bool,
    },
}

/// Settings for one simulation run
struct SimulateOptions {
    width: f64,
    height: f64,
    until_ms: Option<f64>,
    step_ms: f64,
    reject_modes: Vec<u32>,
    native: bool,
    config: EngineConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "danmaku=info,warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { input, format } => inspect(&input, format)?,

        Commands::Simulate {
            input,
            format,
            width,
            height,
            until_ms,
            step_ms,
            limit,
            reject_modes,
            opacity,
            scale,
            spacing,
            seek_trigger,
            native,
        } => {
            let config = EngineConfig {
                global_opacity: opacity,
                global_scale: scale,
                concurrency_limit: limit,
                seek_trigger_ms: seek_trigger,
                lane_spacing: spacing,
                render_mode: if native {
                    RenderMode::Transition
                } else {
                    RenderMode::PerTick
                },
                ..EngineConfig::default()
            };
            let options = SimulateOptions {
                width,
                height,
                until_ms,
                step_ms,
                reject_modes,
                native,
                config,
            };
            simulate(&input, format, options)?
        }
    }

    Ok(())
}

fn load_comments(input: &Path, format: FormatArg) -> Result<(SourceFormat, Vec<Comment>)> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let format = match format {
        FormatArg::Auto => SourceFormat::detect(&raw).context("Could not detect the comment format")?,
        FormatArg::Bilibili => SourceFormat::Bilibili,
        FormatArg::Acfun => SourceFormat::Acfun,
        FormatArg::Json => SourceFormat::Common,
    };
    let comments = format
        .parse(&raw)
        .with_context(|| format!("Input is not a {format} comment document"))?;
    tracing::info!(count = comments.len(), %format, "Parsed comments");
    Ok((format, comments))
}

fn mode_label(mode: Option<Mode>) -> String {
    match mode {
        Some(mode) => mode.to_string(),
        None => "none".to_string(),
    }
}

fn inspect(input: &Path, format: FormatArg) -> Result<()> {
    let (format, mut comments) = load_comments(input, format)?;
    comments.sort_by(Comment::compare);

    println!("\n=== Comment File Information ===");
    println!("File: {}", input.display());
    println!("Format: {format}");
    println!("Comments: {}", comments.len());

    if let (Some(first), Some(end)) = (
        comments.first(),
        comments.iter().map(|c| c.stime + c.dur).reduce(f64::max),
    ) {
        println!(
            "Time span: {:.0}ms to {:.0}ms ({:.2} seconds)",
            first.stime,
            end,
            (end - first.stime) / 1000.0
        );
    }

    let mut per_mode: BTreeMap<String, usize> = BTreeMap::new();
    for comment in &comments {
        *per_mode.entry(mode_label(comment.mode)).or_default() += 1;
    }
    println!("\n=== Comments per mode ===");
    for (mode, count) in &per_mode {
        println!("  Mode {mode}: {count}");
    }

    println!("\n=== Timeline (first 10 comments) ===");
    for (i, comment) in comments.iter().take(10).enumerate() {
        println!(
            "  [{}] {}ms mode {} size {} color #{:06x} for {}ms: {}",
            i,
            comment.stime,
            mode_label(comment.mode),
            comment.size,
            comment.color,
            comment.dur,
            comment.text.replace('\n', "\\n")
        );
    }
    if comments.len() > 10 {
        println!("  ... and {} more comments", comments.len() - 10);
    }

    Ok(())
}

fn simulate(input: &Path, format: FormatArg, options: SimulateOptions) -> Result<()> {
    if !(options.step_ms.is_finite() && options.step_ms > 0.0) {
        bail!("--step-ms must be positive");
    }
    let (_, comments) = load_comments(input, format)?;

    let mut stage = HeadlessStage::new(options.width, options.height);
    if options.native {
        stage = stage.with_transitions();
    }
    let mut manager =
        CommentManager::new(stage, options.config).context("Failed to create comment manager")?;
    for code in &options.reject_modes {
        let rule = FilterRule::reject("mode", RuleOp::Equals, f64::from(*code))
            .context("Failed to build mode filter")?;
        manager.filter_mut().add_rule(rule);
    }

    let entered: Rc<RefCell<BTreeMap<String, usize>>> = Rc::default();
    let counter = Rc::clone(&entered);
    manager.events_mut().enter_comment.subscribe(move |comment| {
        *counter
            .borrow_mut()
            .entry(comment.mode().to_string())
            .or_default() += 1;
        Ok(())
    });

    manager.load(comments);
    let until = match options.until_ms {
        Some(until) => until,
        None => manager.timeline().span().map_or(0.0, |(_, end)| end),
    };
    tracing::info!(until_ms = until, step_ms = options.step_ms, "Starting simulation");

    manager.start();
    let mut now = 0.0;
    let mut activated = 0;
    let mut peak = 0;
    while now <= until {
        activated += manager
            .time(now)
            .with_context(|| format!("Failed to advance play-head to {now}ms"))?;
        peak = peak.max(manager.active_count());
        manager.stage_mut().advance(options.step_ms);
        manager.tick(options.step_ms);
        now += options.step_ms;
    }
    manager.stop();

    println!("\n=== Simulation ===");
    println!("Stage: {}x{}", options.width, options.height);
    println!("Played: 0ms to {:.0}ms in {}ms steps", until, options.step_ms);
    println!(
        "Activated: {} of {} comments",
        activated,
        manager.timeline().len()
    );
    println!("Peak concurrency: {peak}");
    println!("Still active: {}", manager.active_count());

    println!("\n=== Activations per mode ===");
    for (mode, count) in entered.borrow().iter() {
        println!("  Mode {mode}: {count}");
    }

    println!("\n=== Lane usage ===");
    for mode in MANAGED_MODES {
        if let Some(allocator) = manager.allocator(mode) {
            println!(
                "  Mode {}: {} lane(s), {} tracked",
                mode,
                allocator.lane_count(),
                allocator.len()
            );
        }
    }

    Ok(())
}
