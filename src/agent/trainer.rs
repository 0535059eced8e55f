//! Double-DQN trainer
//!
//! Owns the online and target Q-functions, the replay buffer and its own
//! random source for exploration and minibatch sampling.

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::Rng;
use tracing::{debug, trace};

use super::network::{argmax, FitBatch, QFunction, QNetwork};
use super::replay::{ReplayBuffer, Transition};
use crate::error::AgentError;
use crate::game::{Action, ActionSet};
use crate::service::Observation;

/// Copy of `q` with invalid entries set to negative infinity.
pub fn mask_invalid(q: &[f32], invalid: ActionSet) -> Vec<f32> {
    q.iter()
        .enumerate()
        .map(|(i, &v)| if invalid.contains_index(i) { f32::NEG_INFINITY } else { v })
        .collect()
}

/// `r` for terminal transitions, `r + gamma * next_best_q` otherwise.
///
/// Branches rather than multiplying by `1 - done` so a non-finite
/// `next_best_q` never leaks into terminal targets.
pub fn td_target(reward: f32, done: bool, discount_factor: f32, next_best_q: f32) -> f32 {
    if done {
        reward
    } else {
        reward + discount_factor * next_best_q
    }
}

/// Highest-valued valid action of `q`, ties to the lowest index.
pub fn greedy_action(q: &[f32], invalid: ActionSet) -> Result<Action, AgentError> {
    if invalid.complement().is_empty() {
        return Err(AgentError::NoValidAction);
    }
    let masked = mask_invalid(q, invalid);
    let index = argmax(&masked);
    Action::from_index(index).ok_or(AgentError::ActionOutOfRange {
        index,
        count: q.len(),
    })
}

pub struct Trainer<Q: QFunction = QNetwork> {
    online: Q,
    target: Q,
    replay: ReplayBuffer,
    rng: StdRng,
    discount_factor: f32,
    training_steps: u64,
}

impl<Q: QFunction + Clone> Trainer<Q> {
    /// The target starts as an exact copy of `online`.
    pub fn new(
        online: Q,
        replay_capacity: usize,
        discount_factor: f32,
        rng: StdRng,
    ) -> Result<Self, AgentError> {
        let target = online.clone();
        Ok(Self {
            online,
            target,
            replay: ReplayBuffer::new(replay_capacity)?,
            rng,
            discount_factor,
            training_steps: 0,
        })
    }
}

impl<Q: QFunction> Trainer<Q> {
    pub fn online(&self) -> &Q {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut Q {
        &mut self.online
    }

    pub fn target(&self) -> &Q {
        &self.target
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    pub fn discount_factor(&self) -> f32 {
        self.discount_factor
    }

    /// Number of completed `training_step` calls.
    pub fn training_steps(&self) -> u64 {
        self.training_steps
    }

    /// Online Q-values with invalid actions masked to negative infinity.
    pub fn q_values(&self, state: &Observation, invalid: ActionSet) -> Result<Vec<f32>, AgentError> {
        let q = self.online.predict(state)?;
        Ok(mask_invalid(&q, invalid))
    }

    /// Epsilon-greedy choice among the valid actions.
    pub fn select_action(
        &mut self,
        state: &Observation,
        epsilon: f64,
        invalid: ActionSet,
    ) -> Result<Action, AgentError> {
        let valid = invalid.complement();
        if valid.is_empty() {
            return Err(AgentError::NoValidAction);
        }
        if self.rng.gen::<f64>() < epsilon {
            return valid
                .iter()
                .choose(&mut self.rng)
                .ok_or(AgentError::NoValidAction);
        }
        let q = self.online.predict(state)?;
        greedy_action(&q, invalid)
    }

    pub fn add_experience(&mut self, transition: Transition) {
        self.replay.push(transition);
    }

    /// One Double-DQN update of the online network. The target network is
    /// left untouched. Returns the minibatch loss.
    pub fn training_step(&mut self, batch_size: usize) -> Result<f32, AgentError> {
        if batch_size == 0 {
            return Err(AgentError::EmptyBatch);
        }
        let batch = self.replay.sample(batch_size, &mut self.rng)?;

        let online_next = self.online.predict_batch(&batch.next_states)?;
        let target_next = self.target.predict_batch(&batch.next_states)?;

        let targets: Vec<f32> = (0..batch.len())
            .map(|i| {
                let masked = mask_invalid(&online_next[i], batch.invalid_masks[i]);
                let best = argmax(&masked);
                td_target(
                    batch.rewards[i],
                    batch.dones[i],
                    self.discount_factor,
                    target_next[i][best],
                )
            })
            .collect();

        let loss = self.online.fit(&FitBatch {
            states: &batch.states,
            actions: &batch.actions,
            targets: &targets,
        })?;
        self.training_steps += 1;
        trace!(step = self.training_steps, loss, "training step");
        Ok(loss)
    }

    /// Hard copy of the online parameters into the target.
    pub fn sync_target(&mut self) -> Result<(), AgentError> {
        self.target.set_parameters(&self.online.parameters()?)?;
        debug!(step = self.training_steps, "target network synced");
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
