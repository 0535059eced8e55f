//! Service-layer integration tests (full episodes + learner on the environment)

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::agent::{
        Architecture, NetworkConfig, OptimizerConfig, QFunction, QNetwork, StrategyTable, Trainer,
        Transition,
    };
    use crate::game::{Action, ActionSet, BLACKJACK};
    use crate::service::{EnvState, ResetConstraints, Stage};

    #[test]
    fn test_stick_on_hard_20_against_ten() {
        let mut env = EnvState::new(21);
        let mut seen = [false; 3];
        for _ in 0..300 {
            let constraints = ResetConstraints::none()
                .player_sum(20)
                .dealer_card(10)
                .usable_ace(false);
            env.reset(constraints).unwrap();
            assert_eq!(env.player_sum, 20);
            assert!(!env.usable_ace);

            let result = env.step(Action::Stick).unwrap();
            assert!(result.done);
            let expected = match env.dealer_sum {
                17..=19 => 1.0,
                20 => 0.0,
                21 => -1.0,
                _ => {
                    assert!(env.dealer_sum > BLACKJACK);
                    1.0
                }
            };
            assert_eq!(result.reward, expected, "dealer ended on {}", env.dealer_sum);
            match env.dealer_sum {
                20 => seen[0] = true,
                21 => seen[1] = true,
                _ => seen[2] = true,
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_hit_until_done_flow() {
        let mut env = EnvState::new(22);
        for _ in 0..100 {
            let (_, mut invalid) = env.reset(ResetConstraints::none()).unwrap();
            assert_eq!(env.stage(), Stage::FirstRound);
            let mut steps = 0;
            loop {
                let action = if invalid.contains(Action::Hit) {
                    Action::Stick
                } else {
                    Action::Hit
                };
                let result = env.step(action).unwrap();
                steps += 1;
                assert!(!result.invalid_actions.contains(Action::Stick) || env.player_sum <= 11);
                assert!(result.invalid_actions.contains(Action::Double));
                if result.done {
                    assert!([-1.0, 0.0, 1.0].contains(&result.reward));
                    break;
                }
                assert_eq!(result.reward, 0.0);
                invalid = result.invalid_actions;
            }
            assert!(steps >= 1);
            assert_eq!(env.stage(), Stage::Terminal);
            assert!(env.step(Action::Stick).is_none());
        }
    }

    #[test]
    fn test_double_settles_in_one_step() {
        let mut env = EnvState::new(23);
        for _ in 0..100 {
            env.reset(ResetConstraints::none().player_sum(11)).unwrap();
            let result = env.step(Action::Double).unwrap();
            assert!(result.done);
            assert_eq!(env.player.len(), 3);
            assert!([-2.0, 0.0, 2.0].contains(&result.reward));
        }
    }

    #[test]
    fn test_trainer_learns_from_environment() {
        let mut rng = StdRng::seed_from_u64(24);
        let online = QNetwork::new(
            NetworkConfig::blackjack(vec![32], Architecture::Dueling),
            OptimizerConfig::adam(5e-3),
            &mut rng,
        );
        let mut trainer: Trainer = Trainer::new(online, 2_000, 0.95, rng).unwrap();
        let mut env = EnvState::new(25);

        for _ in 0..300 {
            let (mut state, mut invalid) = env.reset(ResetConstraints::none()).unwrap();
            loop {
                let action = trainer.select_action(&state, 1.0, invalid).unwrap();
                assert!(!invalid.contains(action));
                let result = env.step(action).unwrap();
                trainer.add_experience(Transition {
                    state,
                    action,
                    reward: result.reward,
                    next_state: result.observation,
                    done: result.done,
                    next_invalid: result.invalid_actions,
                });
                if result.done {
                    break;
                }
                state = result.observation;
                invalid = result.invalid_actions;
            }
        }

        for step in 1..=200 {
            let loss = trainer.training_step(32).unwrap();
            assert!(loss.is_finite());
            if step % 50 == 0 {
                trainer.sync_target().unwrap();
            }
        }
        assert_eq!(trainer.training_steps(), 200);

        // Hitting a hard 21 is never offered
        let table = StrategyTable::from_q_function(trainer.online()).unwrap();
        assert_eq!(table.action(21, 5, false, true), Action::Stick);

        let obs = crate::service::encode_observation(20, 6, false, true);
        let q = trainer.q_values(&obs, ActionSet::empty()).unwrap();
        assert_eq!(q.len(), trainer.online().action_count());
        assert_eq!(trainer.online().predict(&obs).unwrap(), q);
    }
}
