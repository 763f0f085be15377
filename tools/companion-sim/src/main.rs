//! Companion Simulator
//!
//! Replays a JSON-lines script through one companion and prints one JSON
//! result per line. Each script line is one of:
//!
//! - an interaction event: `{"source": "alice", "type": "play", "intensity": 1.0, "timestamp": "..."}`
//! - a time step: `{"tick": 2.5}`
//! - a behavior outcome: `{"outcome": "play", "success": true}`

use anyhow::{bail, Context};
use clap::Parser;
use companion_evolution::{
    EvolutionConfig, EvolutionEngine, EvolutionResult, InteractionEvent, SeedStrategy,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Script file (reads stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Archetype preset used to seed traits
    #[arg(short, long)]
    archetype: Option<String>,

    /// Fixed random seed for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON configuration file (environment defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Restore this snapshot instead of creating a new companion
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Write the final snapshot here
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Environment file to load instead of searching for `.env`
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG and COMPANION_LOG_LEVEL are unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Load the environment file named on the command line, or search for `.env`
fn load_environment(cli: &Cli) -> anyhow::Result<Option<PathBuf>> {
    match &cli.env_file {
        Some(path) => {
            companion_core::load_env_from_path(path)?;
            Ok(Some(path.clone()))
        }
        None => Ok(companion_core::load_env()?),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    Tick { tick: f64 },
    Outcome { outcome: String, success: bool },
    Event(InteractionEvent),
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Output {
    Event(EvolutionResult),
    Tick {
        tick: f64,
        attention: f64,
        energy: f64,
        active_behaviors: Vec<String>,
    },
    Outcome {
        outcome: String,
        recorded: bool,
        energy: f64,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Arc<EvolutionConfig>> {
    let config: EvolutionConfig = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EvolutionConfig::from_env(),
    };
    config.validate()?;
    Ok(Arc::new(config))
}

fn build_engine(cli: &Cli, config: Arc<EvolutionConfig>) -> anyhow::Result<EvolutionEngine> {
    if let Some(path) = &cli.restore {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        return Ok(EvolutionEngine::deserialize(&json, config)?);
    }

    let strategy = match &cli.archetype {
        Some(name) => SeedStrategy::archetype(name.clone()),
        None => SeedStrategy::random(),
    };
    let engine = match cli.seed {
        Some(seed) => EvolutionEngine::with_rng_seed(config, &strategy, seed)?,
        None => EvolutionEngine::new(config, &strategy)?,
    };
    Ok(engine)
}

fn run_line(engine: &mut EvolutionEngine, line: ScriptLine) -> Output {
    match line {
        ScriptLine::Event(event) => Output::Event(engine.process(&event)),
        ScriptLine::Tick { tick } => {
            engine.tick(tick);
            Output::Tick {
                tick,
                attention: engine.attention().level(),
                energy: engine.energy(),
                active_behaviors: engine.active_behaviors(),
            }
        }
        ScriptLine::Outcome { outcome, success } => {
            let recorded = engine.record_outcome(&outcome, success);
            Output::Outcome {
                outcome,
                recorded,
                energy: engine.energy(),
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Environment first so it can set the log filter; report it once tracing is up.
    let env_file = load_environment(&cli)?;
    companion_core::init_tracing(&cli.log_level);
    match env_file {
        Some(path) => tracing::info!("Loaded environment from: {}", path.display()),
        None => tracing::debug!("No .env file found - using process environment only"),
    }

    if cli.restore.is_some() && (cli.archetype.is_some() || cli.seed.is_some()) {
        bail!("--restore cannot be combined with --archetype or --seed");
    }

    let config = load_config(&cli)?;
    let mut engine = build_engine(&cli, config)?;

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(io::BufReader::new(
            fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let mut out = BufWriter::new(io::stdout().lock());

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let parsed: ScriptLine = serde_json::from_str(trimmed)
            .with_context(|| format!("line {}: not an event, tick or outcome", number + 1))?;
        let output = run_line(&mut engine, parsed);
        serde_json::to_writer(&mut out, &output)?;
        writeln!(out)?;
    }
    out.flush()?;

    tracing::info!(
        entity_id = %engine.entity_id(),
        events = engine.processed_events(),
        personality = %engine.traits().describe(),
        attention = %engine.attention().band().description(),
        "simulation finished"
    );

    if let Some(path) = &cli.snapshot_out {
        fs::write(path, engine.serialize()?)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        tracing::info!("Snapshot written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> EvolutionEngine {
        EvolutionEngine::with_rng_seed(
            Arc::new(EvolutionConfig::default()),
            &SeedStrategy::archetype("balanced"),
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_script_line_parsing() {
        let tick: ScriptLine = serde_json::from_str(r#"{"tick": 1.5}"#).unwrap();
        assert!(matches!(tick, ScriptLine::Tick { tick } if tick == 1.5));

        let outcome: ScriptLine =
            serde_json::from_str(r#"{"outcome": "play", "success": false}"#).unwrap();
        assert!(matches!(outcome, ScriptLine::Outcome { success: false, .. }));

        let event: ScriptLine = serde_json::from_str(
            r#"{"source": "alice", "type": "feed", "timestamp": "2024-03-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert!(matches!(event, ScriptLine::Event(ref e) if e.event_type == "feed"));
    }

    #[test]
    fn test_env_file_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.env");
        std::fs::write(&path, "COMPANION_SIM_TEST_RATE=0.3\n").unwrap();

        let cli = Cli::parse_from(["companion-sim", "--env-file", path.to_str().unwrap()]);
        assert_eq!(load_environment(&cli).unwrap(), Some(path));
        assert_eq!(companion_core::get_env_float("COMPANION_SIM_TEST_RATE", 0.0), 0.3);
        std::env::remove_var("COMPANION_SIM_TEST_RATE");

        let cli = Cli::parse_from(["companion-sim", "--env-file", "/nonexistent/sim.env"]);
        assert!(load_environment(&cli).is_err());
    }

    #[test]
    fn test_run_line_outputs() {
        let mut engine = engine();
        let line: ScriptLine = serde_json::from_str(
            r#"{"source": "alice", "type": "play", "intensity": 1.0, "timestamp": "2024-03-01T08:00:00Z"}"#,
        )
        .unwrap();
        let output = serde_json::to_value(run_line(&mut engine, line)).unwrap();
        assert!(output.get("trait_deltas").is_some());

        let output = run_line(
            &mut engine,
            ScriptLine::Outcome {
                outcome: "fly".to_string(),
                success: true,
            },
        );
        assert!(matches!(output, Output::Outcome { recorded: false, .. }));
    }
}
