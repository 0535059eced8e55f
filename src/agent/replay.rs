use std::collections::VecDeque;

use rand::Rng;

use crate::error::{AgentError, ConfigError};
use crate::game::{Action, ActionSet};
use crate::service::Observation;

/// One environment step. Observations are fixed-size arrays, so the buffer
/// always owns its own copy.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Observation,
    pub action: Action,
    pub reward: f32,
    pub next_state: Observation,
    pub done: bool,
    /// Invalid actions in `next_state`.
    pub next_invalid: ActionSet,
}

/// A sampled minibatch as parallel arrays.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub states: Vec<Observation>,
    pub actions: Vec<Action>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<Observation>,
    pub dones: Vec<bool>,
    pub invalid_masks: Vec<ActionSet>,
}

impl Batch {
    fn with_capacity(n: usize) -> Self {
        Self {
            states: Vec::with_capacity(n),
            actions: Vec::with_capacity(n),
            rewards: Vec::with_capacity(n),
            next_states: Vec::with_capacity(n),
            dones: Vec::with_capacity(n),
            invalid_masks: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, t: &Transition) {
        self.states.push(t.state);
        self.actions.push(t.action);
        self.rewards.push(t.reward);
        self.next_states.push(t.next_state);
        self.dones.push(t.done);
        self.invalid_masks.push(t.next_invalid);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Fixed-capacity FIFO of transitions; the oldest is evicted when full.
#[derive(Debug)]
pub struct ReplayBuffer {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    /// Fails for a zero capacity, which could never hold a transition.
    pub fn new(capacity: usize) -> Result<Self, AgentError> {
        if capacity == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "replay_capacity",
                value: 0,
            }
            .into());
        }
        Ok(Self {
            transitions: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn push(&mut self, transition: Transition) {
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Draw `batch_size` transitions uniformly, with replacement.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Batch, AgentError> {
        if self.transitions.is_empty() {
            return Err(AgentError::EmptyReplayBuffer);
        }
        let mut batch = Batch::with_capacity(batch_size);
        for _ in 0..batch_size {
            let index = rng.gen_range(0..self.transitions.len());
            batch.push(&self.transitions[index]);
        }
        Ok(batch)
    }

    /// Stored transitions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::encode_observation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transition(reward: f32) -> Transition {
        Transition {
            state: encode_observation(12, 3, false, true),
            action: Action::Hit,
            reward,
            next_state: encode_observation(15, 3, false, false),
            done: false,
            next_invalid: ActionSet::empty().with(Action::Double).with(Action::Surrender),
        }
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut buffer = ReplayBuffer::new(3).unwrap();
        for r in 1..=4 {
            buffer.push(transition(r as f32));
        }
        assert_eq!(buffer.len(), 3);
        let rewards: Vec<f32> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            ReplayBuffer::new(0),
            Err(AgentError::Config(ConfigError::InvalidNonZero {
                field: "replay_capacity",
                value: 0
            }))
        ));
        let mut buffer = ReplayBuffer::new(1).unwrap();
        buffer.push(transition(1.0));
        buffer.push(transition(2.0));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_sample_empty_fails() {
        let buffer = ReplayBuffer::new(8).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            buffer.sample(4, &mut rng),
            Err(AgentError::EmptyReplayBuffer)
        ));
    }

    #[test]
    fn test_sample_with_replacement() {
        let mut buffer = ReplayBuffer::new(8).unwrap();
        buffer.push(transition(7.0));
        let mut rng = StdRng::seed_from_u64(1);
        // One element, many draws: only possible with replacement
        let batch = buffer.sample(5, &mut rng).unwrap();
        assert_eq!(batch.len(), 5);
        assert!(batch.rewards.iter().all(|&r| r == 7.0));
        assert_eq!(batch.invalid_masks[0], transition(7.0).next_invalid);
    }

    #[test]
    fn test_sample_covers_buffer() {
        let mut buffer = ReplayBuffer::new(4).unwrap();
        for r in 0..4 {
            buffer.push(transition(r as f32));
        }
        let mut rng = StdRng::seed_from_u64(2);
        let batch = buffer.sample(200, &mut rng).unwrap();
        for r in 0..4 {
            assert!(batch.rewards.contains(&(r as f32)));
        }
    }

    #[test]
    fn test_stored_copy_is_independent() {
        let mut buffer = ReplayBuffer::new(2).unwrap();
        let mut t = transition(1.0);
        buffer.push(t.clone());
        t.state[0] = 9.0;
        assert_eq!(buffer.iter().next().unwrap().state[0], 0.0);
    }
}
