//! Training and evaluation loops
//!
//! Each episode resets the environment, plays epsilon-greedy until done and
//! stores every transition. Once the warm-up transitions are collected, a
//! training step runs every `train_every` transitions and the target network
//! is synced every `target_sync_interval` training steps.

use tracing::info;

use super::network::QFunction;
use super::replay::Transition;
use super::trainer::{greedy_action, Trainer};
use crate::config::TrainerConfig;
use crate::error::AgentError;
use crate::game::{BLACKJACK, DEALER_CARD_BINS, PLAYER_SUM_OFFSET};
use crate::service::{EnvState, ResetConstraints};

const SOFT_START_MIN: u8 = 12;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    pub episodes: usize,
    pub transitions: usize,
    pub training_steps: u64,
    pub target_syncs: u64,
    pub mean_reward: f64,
    pub final_epsilon: f64,
    pub last_loss: Option<f32>,
}

/// Every non-blackjack starting position: hard sums 4..=20 and soft sums
/// 12..=20, each against every dealer card.
pub fn sweep_starts() -> Vec<ResetConstraints> {
    let hard = (PLAYER_SUM_OFFSET..BLACKJACK).map(|sum| (sum, false));
    let soft = (SOFT_START_MIN..BLACKJACK).map(|sum| (sum, true));
    hard.chain(soft)
        .flat_map(|(sum, usable)| {
            (1..=DEALER_CARD_BINS as u8).map(move |card| {
                ResetConstraints::none()
                    .player_sum(sum)
                    .dealer_card(card)
                    .usable_ace(usable)
            })
        })
        .collect()
}

pub fn run_training<Q: QFunction>(
    config: &TrainerConfig,
    env: &mut EnvState,
    trainer: &mut Trainer<Q>,
) -> Result<TrainingReport, AgentError> {
    config.validate()?;
    let starts = if config.sweep_starts {
        sweep_starts()
    } else {
        vec![ResetConstraints::none()]
    };

    let mut report = TrainingReport::default();
    let mut total_reward = 0.0;
    let mut window_reward = 0.0;

    for episode in 0..config.episodes {
        let epsilon = config.epsilon_at(episode);
        let (mut state, mut invalid) = env.reset(starts[episode % starts.len()])?;
        let mut episode_reward = 0.0;

        loop {
            let action = trainer.select_action(&state, epsilon, invalid)?;
            let Some(result) = env.step(action) else {
                break;
            };
            trainer.add_experience(Transition {
                state,
                action,
                reward: result.reward,
                next_state: result.observation,
                done: result.done,
                next_invalid: result.invalid_actions,
            });
            report.transitions += 1;
            episode_reward += result.reward as f64;

            if report.transitions >= config.warmup_transitions
                && report.transitions % config.train_every == 0
            {
                report.last_loss = Some(trainer.training_step(config.batch_size)?);
                if trainer.training_steps() % config.target_sync_interval == 0 {
                    trainer.sync_target()?;
                    report.target_syncs += 1;
                }
            }

            if result.done {
                break;
            }
            state = result.observation;
            invalid = result.invalid_actions;
        }

        total_reward += episode_reward;
        window_reward += episode_reward;
        report.episodes = episode + 1;
        report.final_epsilon = epsilon;

        if report.episodes % config.log_every == 0 {
            info!(
                episode = report.episodes,
                epsilon,
                mean_reward = window_reward / config.log_every as f64,
                training_steps = trainer.training_steps(),
                loss = ?report.last_loss,
                "training progress"
            );
            window_reward = 0.0;
        }
    }

    report.training_steps = trainer.training_steps();
    if report.episodes > 0 {
        report.mean_reward = total_reward / report.episodes as f64;
    }
    Ok(report)
}

/// Mean reward of greedy play over `episodes` unconstrained deals.
pub fn evaluate<Q: QFunction + ?Sized>(
    env: &mut EnvState,
    q: &Q,
    episodes: usize,
) -> Result<f64, AgentError> {
    if episodes == 0 {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for _ in 0..episodes {
        let (mut state, mut invalid) = env.reset(ResetConstraints::none())?;
        loop {
            let action = greedy_action(&q.predict(&state)?, invalid)?;
            let Some(result) = env.step(action) else {
                break;
            };
            total += result.reward as f64;
            if result.done {
                break;
            }
            state = result.observation;
            invalid = result.invalid_actions;
        }
    }
    Ok(total / episodes as f64)
}
