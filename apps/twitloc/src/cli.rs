//! # CLI Module
//!
//! Command-line front end over the [`Context`] service.
//!
//! Each subcommand has a `cmd_*` function returning the text to print, so
//! commands are testable without capturing stdout.

use crate::config::{ContextConfig, DEFAULT_API_SERVER};
use crate::context::Context;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use twitloc_core::{
    ContextEvent, Localization, LocalizationBuckets, MetamodelStatus, Statistics, format_count,
};

/// How long `stats` waits for the lazy statistics load.
pub const STATISTICS_WAIT: Duration = Duration::from_secs(30);

// =============================================================================
// ARGUMENTS
// =============================================================================

/// Client for the Twitter localization backend.
#[derive(Debug, Parser)]
#[command(name = "twitloc", version, about)]
pub struct Cli {
    /// Base URL of the backend.
    #[arg(long, global = true, default_value = DEFAULT_API_SERVER)]
    pub api_server: String,

    /// Poll period of `watch`, in milliseconds.
    #[arg(long, global = true, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Per-request timeout in seconds (default: none).
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List metamodels and their status.
    Metamodels,
    /// List localization jobs.
    Localizations {
        /// Read the pending-jobs route instead.
        #[arg(long)]
        pending: bool,
    },
    /// Show dataset statistics.
    Stats,
    /// Request a metamodel build.
    Build { metamodel: String },
    /// Request the localization of a Twitter user.
    Localize {
        screen_name: String,
        metamodel: String,
    },
    /// Poll the backend and print every update until Ctrl-C.
    Watch,
}

impl Cli {
    /// Context settings derived from the global flags.
    pub fn context_config(&self) -> ContextConfig {
        let mut config = ContextConfig::new(self.api_server.clone())
            .with_poll_interval(Duration::from_millis(self.interval_ms));
        if let Some(secs) = self.timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config
    }
}

/// Run the parsed command, printing its output to stdout.
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let ctx = Context::new(cli.context_config())?;
    let mut stdout = std::io::stdout();

    let output = match cli.command {
        Command::Metamodels => cmd_metamodels(&ctx).await?,
        Command::Localizations { pending } => cmd_localizations(&ctx, pending).await?,
        Command::Stats => cmd_stats(&ctx, STATISTICS_WAIT).await?,
        Command::Build { metamodel } => cmd_build(&ctx, &metamodel).await?,
        Command::Localize {
            screen_name,
            metamodel,
        } => cmd_localize(&ctx, &screen_name, &metamodel).await?,
        Command::Watch => {
            cmd_watch(&ctx, &mut stdout, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "Unable to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            })
            .await?;
            return Ok(());
        }
    };

    stdout.write_all(output.as_bytes())?;
    Ok(())
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Fetch and render the metamodel listing.
pub async fn cmd_metamodels(ctx: &Context) -> Result<String, AppError> {
    ctx.refresh_metamodel_status().await?;
    Ok(render_metamodels(&ctx.metamodel_status()))
}

/// Fetch and render the localization buckets.
pub async fn cmd_localizations(ctx: &Context, pending: bool) -> Result<String, AppError> {
    if pending {
        let buckets = ctx.pending_localizations().await?;
        return Ok(render_localizations(&buckets));
    }
    ctx.refresh_localizations().await?;
    Ok(render_localizations(&ctx.localizations()))
}

/// Lazy-load statistics through the context and render them.
///
/// A failed load is retried on every wake-up until `wait` elapses.
pub async fn cmd_stats(ctx: &Context, wait: Duration) -> Result<String, AppError> {
    let mut events = ctx.subscribe();
    let deadline = tokio::time::Instant::now() + wait;

    loop {
        if let Some(statistics) = ctx.statistics() {
            return Ok(render_statistics(&statistics));
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return Err(AppError::Timeout("statistics"));
        }
        // Wake up on the load event, or after a second to retry a failed load.
        let nap = (deadline - now).min(Duration::from_secs(1));
        match tokio::time::timeout(nap, events.recv()).await {
            Ok(Ok(_) | Err(RecvError::Lagged(_))) | Err(_) => {}
            Ok(Err(RecvError::Closed)) => return Err(AppError::Timeout("statistics")),
        }
    }
}

pub async fn cmd_build(ctx: &Context, metamodel: &str) -> Result<String, AppError> {
    ctx.build_metamodel(metamodel).await?;
    info!(%metamodel, "build requested");
    Ok(format!(
        "Build of '{}' requested. Run `twitloc metamodels` to follow it.\n",
        metamodel
    ))
}

pub async fn cmd_localize(
    ctx: &Context,
    screen_name: &str,
    metamodel: &str,
) -> Result<String, AppError> {
    ctx.localize_user(screen_name, metamodel).await?;
    info!(%screen_name, %metamodel, "localization requested");
    Ok(format!(
        "Localization of @{} with '{}' requested.\n",
        screen_name, metamodel
    ))
}

/// Start the poller and write one line per event until `shutdown` resolves.
pub async fn cmd_watch<W, F>(ctx: &Context, out: &mut W, shutdown: F) -> Result<(), AppError>
where
    W: Write,
    F: Future<Output = ()>,
{
    let mut events = ctx.subscribe();
    let poller = ctx.start();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            () = &mut shutdown => break Ok(()),
            received = events.recv() => match received {
                Ok(event) => {
                    if let Err(err) = writeln!(out, "{}", render_event(ctx, event)) {
                        break Err(AppError::from(err));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch output lagging"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    poller.stop().await;
    result
}

// =============================================================================
// RENDERING
// =============================================================================

pub fn render_metamodels(status: &MetamodelStatus) -> String {
    if status.is_empty() {
        return "No metamodels reported.\n".to_string();
    }
    let width = status.names().map(str::len).max().unwrap_or(0);
    let mut out = String::new();
    for (name, state) in status.iter() {
        out.push_str(&format!("{:<width$}  {:<8}", name, state.status, width = width));
        if let Some(error) = &state.error {
            out.push_str(&format!("  {}", error));
        }
        out.push('\n');
    }
    out
}

pub fn render_localizations(buckets: &LocalizationBuckets) -> String {
    let mut out = String::new();
    for (title, jobs) in [
        ("Complete", &buckets.complete),
        ("Pending", &buckets.pending),
        ("Failed", &buckets.failed),
    ] {
        out.push_str(&format!("{} ({})\n", title, jobs.len()));
        for job in jobs {
            out.push_str(&format!("  {}\n", render_job(job)));
        }
    }
    out
}

fn render_job(job: &Localization) -> String {
    let mut line = format!("@{} via {}", job.screen_name, job.metamodel_name);
    if let Some(is_swiss) = job.is_swiss {
        line.push_str(if is_swiss { ": swiss" } else { ": not swiss" });
    }
    if let Some(confidence) = job.confidence {
        line.push_str(&format!(" (confidence {:.2})", confidence));
    }
    line
}

pub fn render_statistics(statistics: &Statistics) -> String {
    let mut out = String::new();
    for (label, value) in statistics.counters() {
        out.push_str(&format!("{:<22} {}\n", label, format_count(value)));
    }
    out
}

/// One-line summary of an event and the state it announces.
pub fn render_event(ctx: &Context, event: ContextEvent) -> String {
    match event {
        ContextEvent::MetamodelsUpdated => format!(
            "{}: {} metamodels, {} online",
            event,
            ctx.all_metamodels().len(),
            ctx.available_metamodels().len()
        ),
        ContextEvent::LocalizationsUpdated => {
            let buckets = ctx.localizations();
            format!(
                "{}: {} complete, {} pending, {} failed",
                event,
                buckets.complete.len(),
                buckets.pending.len(),
                buckets.failed.len()
            )
        }
        ContextEvent::StatisticsLoaded => event.to_string(),
    }
}
