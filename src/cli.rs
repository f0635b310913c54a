use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::Term;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, OutputFormat};
use crate::engine::{AggregationScheduler, CycleOutcome, EngineState};
use crate::output::{LoadingIndicator, Renderer};
use crate::source::{HttpTransport, PipelineDataSource, RequestSequencer};

#[derive(Parser)]
#[command(name = "pipedash")]
#[command(author, version, about = "Pipeline status dashboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./pipedash.toml and friends)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the pipeline-status API
    #[arg(short, long, global = true, env = "PIPEDASH_URL")]
    url: Option<String>,

    /// Page parameters, e.g. "refresh=30" or "static"
    #[arg(short, long, global = true)]
    query: Option<String>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every pipeline, most recently changed first
    Grid {
        /// Refresh once, print, and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Show every action of one pipeline
    Show {
        name: String,

        /// Load once, print, and exit
        #[arg(long, default_value_t = false)]
        once: bool,
    },
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(url) = &self.url {
            config.server.base_url.clone_from(url);
        }
        if let Some(query) = &self.query {
            config.dashboard.query.clone_from(query);
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        config.output.pretty |= self.pretty;

        Ok(config)
    }

    pub async fn execute(&self) -> Result<()> {
        let config = self.resolve_config()?;

        let transport = HttpTransport::new(
            &config.server.base_url,
            &config.server.user_agent,
            config.server.timeout(),
        )
        .context("Failed to set up the pipeline API client")?;

        let scheduler = AggregationScheduler::new(
            PipelineDataSource::new(RequestSequencer::new(Arc::new(transport))),
            config.dashboard.refresh(),
        );

        let renderer = Renderer {
            format: config.output.format,
            pretty: config.output.pretty,
            rules: config.dashboard.needs_human_interaction.clone(),
        };

        info!(
            "Watching {} (refresh every {} ms)",
            config.server.base_url,
            scheduler.policy().interval_millis
        );

        match &self.command {
            Commands::Grid { once: true } => grid_once(&scheduler, &renderer).await,
            Commands::Grid { once: false } => watch_grid(&scheduler, &renderer).await,
            Commands::Show { name, once } => watch_detail(&scheduler, &renderer, name, *once).await,
        }
    }
}

async fn grid_once(scheduler: &AggregationScheduler, renderer: &Renderer) -> Result<()> {
    match scheduler.refresh_all().await {
        CycleOutcome::ListFailed(reason) => bail!("Failed to list pipelines: {reason}"),
        outcome => info!("Refresh finished: {outcome:?}"),
    }

    println!("{}", renderer.render_grid(&scheduler.snapshot())?);
    Ok(())
}

async fn watch_grid(scheduler: &AggregationScheduler, renderer: &Renderer) -> Result<()> {
    let mut rx = scheduler.subscribe();
    let mut indicator = LoadingIndicator::new();
    let mut printed_cycle = 0;

    scheduler.on_enter_grid();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state: EngineState = rx.borrow_and_update().clone();
                indicator.update(state.loading);

                if state.cycles != printed_cycle {
                    printed_cycle = state.cycles;
                    show(renderer, renderer.render_grid(&state)?)?;
                }
            }
        }
    }

    indicator.update(false);
    scheduler.on_leave_grid();
    scheduler.shutdown();
    Ok(())
}

async fn watch_detail(
    scheduler: &AggregationScheduler,
    renderer: &Renderer,
    name: &str,
    once: bool,
) -> Result<()> {
    let mut rx = scheduler.subscribe();
    let mut indicator = LoadingIndicator::new();
    let mut printed = None;

    scheduler.on_enter_detail(name);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                indicator.update(state.loading);

                let Some(detail) = state.detail else {
                    warn!("Detail view closed unexpectedly");
                    break;
                };
                if detail.entry.is_none() || printed.as_ref() == Some(&detail) {
                    continue;
                }

                show(renderer, renderer.render_detail(&detail)?)?;
                printed = Some(detail);
                if once {
                    break;
                }
            }
        }
    }

    indicator.update(false);
    scheduler.on_leave_detail();
    scheduler.shutdown();
    Ok(())
}

/// Tables redraw in place on a terminal; JSON is emitted as a stream of documents.
fn show(renderer: &Renderer, rendered: String) -> Result<()> {
    let term = Term::stdout();
    if renderer.format == OutputFormat::Table && term.is_term() {
        term.clear_screen()?;
    }
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_overrides() {
        let cli = Cli::try_parse_from([
            "pipedash",
            "--url",
            "http://ci.example.com",
            "--query",
            "refresh=5",
            "--format",
            "json",
            "grid",
            "--once",
        ])
        .unwrap();

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.server.base_url, "http://ci.example.com");
        assert_eq!(config.dashboard.refresh().interval_millis, 5_000);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Grid { once: true }));
    }

    #[test]
    fn test_cli_show_requires_name() {
        assert!(Cli::try_parse_from(["pipedash", "show"]).is_err());

        let cli = Cli::try_parse_from(["pipedash", "show", "api", "--query", "static"]).unwrap();
        match &cli.command {
            Commands::Show { name, once } => {
                assert_eq!(name, "api");
                assert!(!once);
            }
            Commands::Grid { .. } => panic!("expected show command"),
        }
    }
}
