use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use blackjack_dqn::agent::{evaluate, persistence, run_training, Architecture, QNetwork, StrategyTable, Trainer};
use blackjack_dqn::config::TrainerConfig;
use blackjack_dqn::service::EnvState;

const EVALUATION_EPISODES: usize = 10_000;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(author, version, about = "Train a Double-DQN Blackjack agent", long_about = None)]
struct Args {
    /// JSON training config; missing fields take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    episodes: Option<usize>,

    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(long)]
    model_dir: Option<String>,

    #[arg(long)]
    model_name: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    architecture: Option<Architecture>,

    /// Write the learned strategy table here as JSON
    #[arg(long)]
    strategy_out: Option<PathBuf>,

    /// Continue from a saved model instead of a fresh network
    #[arg(long)]
    resume: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(TrainerConfig, Option<PathBuf>, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => TrainerConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => TrainerConfig::default(),
        };
        if let Some(episodes) = self.episodes {
            config.episodes = episodes;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dir) = self.model_dir {
            config.model_dir = dir;
        }
        if let Some(name) = self.model_name {
            config.model_name = name;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(architecture) = self.architecture {
            config.architecture = architecture;
        }
        config.validate().context("invalid training config")?;
        Ok((config, self.strategy_out, self.resume))
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    // Parse args
    let (config, strategy_out, resume) = Args::parse().into_config()?;

    // Create logger
    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .init();

    // Build learner
    let mut rng = StdRng::seed_from_u64(config.seed);
    let online = match &resume {
        Some(path) => persistence::load(path)
            .with_context(|| format!("failed to load model {}", path.display()))?,
        None => QNetwork::new(config.network_config(), config.optimizer_config(), &mut rng),
    };
    let mut trainer = Trainer::new(online, config.replay_capacity, config.discount_factor, rng)
        .context("failed to build trainer")?;
    let mut env = EnvState::new(config.seed.wrapping_add(1));

    info!(
        episodes = config.episodes,
        hidden_layers = ?config.hidden_layers,
        architecture = ?config.architecture,
        "training started"
    );
    let report = run_training(&config, &mut env, &mut trainer).context("training failed")?;
    info!(
        episodes = report.episodes,
        transitions = report.transitions,
        training_steps = report.training_steps,
        target_syncs = report.target_syncs,
        mean_reward = report.mean_reward,
        "training finished"
    );

    let mean = evaluate(&mut env, trainer.online(), EVALUATION_EPISODES)
        .context("evaluation failed")?;
    info!(episodes = EVALUATION_EPISODES, mean_reward = mean, "greedy evaluation");

    let path = persistence::save(
        trainer.online(),
        &PathBuf::from(&config.model_dir),
        &config.model_name,
    )
    .context("failed to save model")?;
    info!(path = %path.display(), "model written");

    let table = StrategyTable::from_q_function(trainer.online())
        .context("failed to build strategy table")?;
    println!("{table}");
    if let Some(out) = strategy_out {
        table
            .save(&out)
            .with_context(|| format!("failed to write strategy {}", out.display()))?;
        info!(path = %out.display(), "strategy table written");
    }

    Ok(())
}
