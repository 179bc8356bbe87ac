//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::SessionConfig;
use crate::engine::{SyncConfig, SyncEngine, SyncEvent};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpTransport};
use crate::shape::Shape;
use crate::state::StateManager;
use crate::transport::{MemoryTransport, Transport};
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Follow {
                url,
                table,
                where_clause,
                live,
                from_scratch,
                max_events,
                show_controls,
            } => {
                let mut config = self.load_config()?;
                if let Some(url) = url {
                    config.source.url = Some(url.clone());
                }
                if let Some(table) = table {
                    config.source.table = Some(table.clone());
                }
                if let Some(clause) = where_clause {
                    config.source.where_clause = Some(clause.clone());
                }
                config.source.live |= *live;
                config.sync.surface_unknown_controls |= *show_controls;
                if let Some(max) = max_events {
                    config.sync.max_events = *max;
                }
                self.follow(&config, *from_scratch).await
            }
            Commands::Replay {
                input,
                materialize,
                show_controls,
            } => self.replay(input, *materialize, *show_controls).await,
            Commands::Checkpoint { shape, clear } => {
                self.checkpoint(shape.as_deref(), *clear).await
            }
        }
    }

    /// Load the session config, or defaults when no file was given
    fn load_config(&self) -> Result<SessionConfig> {
        match &self.cli.config {
            Some(path) => SessionConfig::load(path)
                .with_context(|| format!("Loading {}", path.display())),
            None => Ok(SessionConfig::default()),
        }
    }

    /// Open the checkpoint store named on the command line or in the config
    fn state_manager(&self, config: &SessionConfig) -> Result<Option<StateManager>> {
        let path = self.cli.state.as_ref().or(config.state.path.as_ref());
        path.map(StateManager::from_file).transpose()
    }

    /// Follow a shape over HTTP
    async fn follow(&self, config: &SessionConfig, from_scratch: bool) -> Result<()> {
        config.validate()?;

        let client = HttpClient::with_config(config.http_config()?)?;
        let transport = HttpTransport::new(client, &config.source.path, config.shape_request()?);
        let mut engine = SyncEngine::new(transport).with_config(config.sync_config());

        let shape = config.shape_name();
        if let Some(state) = self.state_manager(config)? {
            if from_scratch {
                state.clear_shape(&shape).await?;
            }
            engine = engine.with_checkpoint(state, &shape);
            if let Some(offset) = engine.resume().await? {
                info!(shape = %shape, %offset, "Resumed");
            }
        }

        info!(shape = %shape, live = config.source.live, "Following shape");
        let result = drain(&mut engine, |event| self.print_event(event)).await;
        engine.flush_checkpoint().await;

        let stats = engine.stats();
        info!(
            changes = stats.changes,
            resyncs = stats.resyncs,
            rejected = stats.rejected,
            "Session ended"
        );
        result
    }

    /// Replay a file of raw messages
    async fn replay(&self, input: &Path, materialize: bool, show_controls: bool) -> Result<()> {
        let transport = MemoryTransport::from_jsonl(input)
            .with_context(|| format!("Reading {}", input.display()))?;
        let config = SyncConfig::new()
            .with_unknown_controls(show_controls)
            .with_restart_on_resync(false);
        let mut engine = SyncEngine::new(transport).with_config(config);
        let mut shape = Shape::new();

        let result = drain(&mut engine, |event| {
            shape.apply(event);
            if materialize {
                Ok(())
            } else {
                self.print_event(event)
            }
        })
        .await;

        if materialize {
            let mut keys: Vec<_> = shape.rows().keys().collect();
            keys.sort();
            for key in keys {
                let line = json!({"key": key, "value": shape.get(key)});
                println!("{line}");
            }
        }

        let stats = engine.stats();
        eprintln!(
            "Replayed {} changes, {} up-to-date, {} resyncs, {} rejected",
            stats.changes, stats.up_to_date, stats.resyncs, stats.rejected
        );
        result
    }

    /// Show or clear checkpoints
    async fn checkpoint(&self, shape: Option<&str>, clear: bool) -> Result<()> {
        let config = self.load_config()?;
        let state = self
            .state_manager(&config)?
            .ok_or_else(|| Error::config("No checkpoint file (use -s flag or state.path)"))?;

        match (shape, clear) {
            (Some(shape), true) => {
                state.clear_shape(shape).await?;
                println!("Cleared checkpoint for {shape}");
            }
            (None, true) => {
                state.clear().await?;
                println!("Cleared all checkpoints");
            }
            (Some(shape), false) => match state.get_offset(shape).await {
                Some(offset) => println!("{offset}"),
                None => println!("No checkpoint for {shape}"),
            },
            (None, false) => println!("{}", state.to_json_pretty().await?),
        }
        Ok(())
    }

    /// Print one event in the selected format
    fn print_event(&self, event: &SyncEvent) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(event)?),
            OutputFormat::Pretty => println!("{}", pretty_event(event)),
        }
        Ok(())
    }
}

/// Consume every event of a session
///
/// Recoverable errors are logged and skipped; a session-fatal error is
/// returned once the stream has ended.
async fn drain<T, F>(engine: &mut SyncEngine<T>, mut on_event: F) -> Result<()>
where
    T: Transport,
    F: FnMut(&SyncEvent) -> Result<()>,
{
    while let Some(item) = engine.next_event().await {
        match item {
            Ok(event) => on_event(&event)?,
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => warn!("Skipped message: {e}"),
        }
    }
    Ok(())
}

fn pretty_event(event: &SyncEvent) -> String {
    let at = |offset: &Option<crate::offset::Offset>| {
        offset.map_or_else(|| "-".to_string(), |o| o.to_string())
    };

    match event {
        SyncEvent::RowChange { change, offset } => format!(
            "{:<7} {} @ {}  {}",
            format!("{:?}", change.operation).to_lowercase(),
            change.key,
            at(offset),
            serde_json::Value::Object(change.value.clone())
        ),
        SyncEvent::UpToDate { offset } => format!("up-to-date @ {}", at(offset)),
        SyncEvent::MustResync => "must-resync".to_string(),
        SyncEvent::Control { control } => format!("control {control}"),
    }
}
