use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{info, warn};

use brainstem_core::app::{BrainBuilder, BrainConfig, SharedBrain, init_tracing};
use brainstem_core::domain::{
    AgentBatch, AgentId, AgentRecord, ObservationSpec, TickOutcome, VisualObservation,
};
use brainstem_core::impls::{DenseModelDef, DenseModelLoader};
use brainstem_core::ports::{IdGenerator, SystemClock, UlidGenerator};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run description read from the file given on the command line.
#[derive(Debug, Deserialize)]
struct RunFile {
    #[serde(default)]
    brain: BrainConfig,
    observation: ObservationSpec,
    #[serde(default = "default_agents")]
    agents: usize,
    #[serde(default = "default_ticks")]
    ticks: u64,
    #[serde(default = "default_interval_ms")]
    interval_ms: u64,
    /// Inline model definitions, looked up by `brain.model` before the filesystem.
    #[serde(default)]
    models: HashMap<String, DenseModelDef>,
}

fn default_agents() -> usize {
    4
}

fn default_ticks() -> u64 {
    10
}

fn default_interval_ms() -> u64 {
    100
}

/// Random observations for a simulated environment.
fn observe(spec: &ObservationSpec, agents: &[AgentId], step: u64) -> AgentBatch {
    let mut rng = rand::thread_rng();
    let records = agents
        .iter()
        .map(|&id| {
            let vector = (0..spec.vector_observation_size)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect();
            spec.visual_observation_shapes
                .iter()
                .fold(AgentRecord::new(id, vector), |record, &shape| {
                    let pixels = (0..shape.len()).map(|_| rng.r#gen::<f32>()).collect();
                    record.with_visual(VisualObservation::new(shape, pixels))
                })
        })
        .collect();
    AgentBatch::new(records).at_step(step)
}

async fn run(path: &str) -> Result<(), BoxError> {
    let raw = std::fs::read_to_string(path)?;
    let file: RunFile = serde_json::from_str(&raw)?;

    let loader = file
        .models
        .into_iter()
        .fold(DenseModelLoader::new(), |loader, (name, def)| loader.with_model(name, def));
    let spec = file.observation.clone();
    let brain = BrainBuilder::new(file.observation, Arc::new(loader))
        .config(file.brain)
        .build()?;
    let brain = SharedBrain::new(brain);

    let state = match brain.initialize() {
        Ok(state) => state,
        Err(e) => {
            warn!("{e}");
            brain.state()
        }
    };
    info!(?state, agents = file.agents, ticks = file.ticks, "brain ready");

    let ids = UlidGenerator::new(SystemClock);
    let agents: Vec<AgentId> = (0..file.agents).map(|_| ids.generate_agent_id()).collect();

    let mut ticker = interval(Duration::from_millis(file.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    for step in 0..file.ticks {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!(step, "interrupted");
                break;
            }
        }

        let batch = observe(&spec, &agents, step);
        match brain.decide_blocking(batch).await {
            Ok(TickOutcome::Decided(actions)) => {
                for action in actions {
                    println!("{}", serde_json::to_string(&action)?);
                }
            }
            Ok(other) => info!(step, outcome = ?other, "no local decision"),
            Err(e) => warn!(step, "tick failed: {e}"),
        }
    }

    brain.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("{e}");
    }

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: brainstem-cli <run.json>");
        std::process::exit(2);
    };

    if let Err(e) = run(&path).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
