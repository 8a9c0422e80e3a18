// Middleware - one external action per step, termination and truncation

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::bounds;
use crate::application::engine::Engine;
use crate::domain::{ComponentTransition, Duration, Instance, Time};
use crate::error::{Result, SimError};
use crate::port::{
    Action, ActionInterpreter, BinaryActionInterpreter, IdProvider, Interpretation,
    MakespanScorer, Observation, ObservationBuilder, RewardScorer, SnapshotObservationBuilder,
    UuidProvider,
};

/// Configuration options recognized by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Invalid actions tolerated before truncation
    pub truncation_joker: u32,
    /// Whether invalid actions ever truncate
    pub truncation_active: bool,
    /// Truncation once now > lower_bound * max_time_fct
    pub max_time_fct: f64,
    /// Truncation once action count > total_operations * max_action_fct
    pub max_action_fct: f64,
    /// Offer transport pickups for jobs not yet at their buffer's head
    pub allow_early_transport: bool,
    /// RNG seed for all stochastic time sources
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            truncation_joker: 3,
            truncation_active: true,
            max_time_fct: 3.0,
            max_action_fct: 20.0,
            allow_early_transport: true,
            seed: 0,
        }
    }
}

/// What one middleware step did, as handed to the reward scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub time: Time,
    pub elapsed: Duration,
    pub applied: Vec<ComponentTransition>,
    pub invalid_action: bool,
    pub deadlock: bool,
}

/// Step metadata surfaced to the agent loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub episode: String,
    pub time: Time,
    pub makespan: Option<Time>,
    pub action_count: u64,
    pub jokers_left: u32,
    pub invalid_action: bool,
    pub deadlock: bool,
}

/// Full result of one external step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

/// Wraps the engine for an external agent loop: interpret one action,
/// advance zero or more internal steps, detect termination/truncation and
/// emit observation, reward and info.
pub struct Environment {
    engine: Engine,
    config: SimConfig,
    interpreter: Arc<dyn ActionInterpreter>,
    observer: Arc<dyn ObservationBuilder>,
    scorer: Arc<dyn RewardScorer>,
    id_provider: Arc<dyn IdProvider>,
    lower_bound: u64,
    total_operations: u64,
    episode: String,
    action_count: u64,
    jokers_left: u32,
    done: bool,
}

impl Environment {
    pub fn new(
        instance: Instance,
        config: SimConfig,
        interpreter: Arc<dyn ActionInterpreter>,
        observer: Arc<dyn ObservationBuilder>,
        scorer: Arc<dyn RewardScorer>,
        id_provider: Arc<dyn IdProvider>,
    ) -> Result<Environment> {
        let engine = Engine::new(instance, config.allow_early_transport, config.seed)?;
        let lower_bound = bounds::lower_bound(engine.instance());
        let total_operations = engine.instance().total_operations() as u64;
        let episode = id_provider.generate_id();
        Ok(Environment {
            engine,
            jokers_left: config.truncation_joker,
            config,
            interpreter,
            observer,
            scorer,
            id_provider,
            lower_bound,
            total_operations,
            episode,
            action_count: 0,
            done: false,
        })
    }

    /// Default wiring: binary interpreter, snapshot observations, makespan
    /// scoring, uuid episode ids.
    pub fn with_defaults(instance: Instance, config: SimConfig) -> Result<Environment> {
        let lower_bound = bounds::lower_bound(&instance.clone().normalized());
        Environment::new(
            instance,
            config,
            Arc::new(BinaryActionInterpreter),
            Arc::new(SnapshotObservationBuilder),
            Arc::new(MakespanScorer::new(lower_bound)),
            Arc::new(UuidProvider),
        )
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn history(&self) -> &crate::domain::History {
        self.engine.history()
    }

    pub fn is_done(&self) -> bool {
        self.engine.state().is_done()
    }

    /// Start a fresh episode.
    pub fn reset(&mut self) -> Result<(Observation, Info)> {
        self.engine.reset()?;
        self.episode = self.id_provider.generate_id();
        self.action_count = 0;
        self.jokers_left = self.config.truncation_joker;
        self.done = false;
        info!(episode = %self.episode, "Episode reset");
        let observation = self
            .observer
            .build(self.engine.state(), self.engine.instance());
        Ok((observation, self.info(false, false)))
    }

    /// Advance the environment by one external action.
    pub fn step(&mut self, action: &Action) -> Result<StepOutput> {
        if self.done {
            return Err(SimError::Validation(
                "episode finished; call reset() first".into(),
            ));
        }
        self.action_count += 1;
        let time_before = self.engine.state().time;

        let offers = self.engine.start_transitions()?;
        let interpretation = self.interpreter.interpret(
            action,
            &offers,
            self.engine.state(),
            self.engine.instance(),
        )?;

        let mut applied = vec![];
        let mut invalid_action = false;
        let mut deadlock = false;
        match interpretation {
            Interpretation::NoOp => {
                let outcome = self.engine.step(None)?;
                applied.extend(outcome.applied);
                deadlock |= outcome.deadlock;
            }
            Interpretation::Transitions(transitions) => {
                for transition in &transitions {
                    let outcome = self.engine.step(Some(transition))?;
                    applied.extend(outcome.applied);
                    deadlock |= outcome.deadlock;
                    if outcome.rejected.is_some() {
                        invalid_action = true;
                    }
                }
            }
        }

        let joker_exhausted = invalid_action && self.jokers_left == 0;
        if invalid_action && self.jokers_left > 0 {
            self.jokers_left -= 1;
            warn!(
                episode = %self.episode,
                jokers_left = self.jokers_left,
                "Invalid action, joker consumed"
            );
        }

        let state = self.engine.state();
        let terminated = state.is_done();
        let mut truncated = false;
        if !terminated {
            if deadlock {
                truncated = true;
            }
            if (state.time.0 as f64) > self.lower_bound as f64 * self.config.max_time_fct {
                truncated = true;
            }
            if (self.action_count as f64) > self.total_operations as f64 * self.config.max_action_fct
            {
                truncated = true;
            }
            if joker_exhausted && self.config.truncation_active {
                truncated = true;
            }
        }
        self.done = terminated || truncated;

        let report = StepReport {
            time: state.time,
            elapsed: state.time.0 - time_before.0,
            applied,
            invalid_action,
            deadlock,
        };
        let reward = self.scorer.score(&report, terminated, truncated);
        let observation = self.observer.build(state, self.engine.instance());
        let info = self.info(invalid_action, deadlock);

        if self.done {
            info!(
                episode = %self.episode,
                terminated,
                truncated,
                time = state.time.0,
                actions = self.action_count,
                "Episode finished"
            );
        }

        Ok(StepOutput {
            observation,
            reward,
            terminated,
            truncated,
            info,
        })
    }

    fn info(&self, invalid_action: bool, deadlock: bool) -> Info {
        Info {
            episode: self.episode.clone(),
            time: self.engine.state().time,
            makespan: self.engine.makespan(),
            action_count: self.action_count,
            jokers_left: self.jokers_left,
            invalid_action,
            deadlock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;
    use crate::port::id_provider::SequenceProvider;
    use crate::port::observation::mocks::MockObservationBuilder;
    use crate::port::reward::mocks::MockScorer;

    fn environment(config: SimConfig) -> Environment {
        let (instance, _) = testkit::two_machine_shop();
        Environment::new(
            instance,
            config,
            Arc::new(BinaryActionInterpreter),
            Arc::new(MockObservationBuilder),
            Arc::new(MockScorer),
            Arc::new(SequenceProvider::new()),
        )
        .unwrap()
    }

    #[test]
    fn reset_assigns_fresh_episode_ids() {
        let mut env = environment(SimConfig::default());
        assert_eq!(env.info(false, false).episode, "ep-1");
        env.reset().unwrap();
        assert_eq!(env.info(false, false).episode, "ep-2");
    }

    #[test]
    fn greedy_accepts_until_terminated() {
        let mut env = environment(SimConfig {
            max_action_fct: 100.0,
            max_time_fct: 100.0,
            ..SimConfig::default()
        });
        let mut terminated = false;
        for _ in 0..200 {
            let out = env.step(&Action::Accept).unwrap();
            assert!(!out.truncated, "greedy run must not truncate: {:?}", out.info);
            if out.terminated {
                terminated = true;
                assert!(out.info.makespan.is_some());
                break;
            }
        }
        assert!(terminated, "greedy accept policy must finish the 2x2 shop");
    }

    #[test]
    fn invalid_actions_burn_jokers_then_truncate() {
        let mut env = environment(SimConfig {
            truncation_joker: 1,
            max_action_fct: 100.0,
            ..SimConfig::default()
        });
        let bogus = Action::Direct(ComponentTransition::machine(
            "m-0",
            crate::domain::MachinePhase::Working,
            Some("j-0".into()),
        ));
        let first = env.step(&bogus).unwrap();
        assert!(first.info.invalid_action);
        assert!(!first.truncated, "joker absorbs the first invalid action");
        assert_eq!(first.info.jokers_left, 0);

        let second = env.step(&bogus).unwrap();
        assert!(second.truncated, "joker exhausted, truncation forced");
    }

    #[test]
    fn step_after_episode_end_is_rejected() {
        let mut env = environment(SimConfig {
            truncation_joker: 0,
            ..SimConfig::default()
        });
        let bogus = Action::Direct(ComponentTransition::machine(
            "m-0",
            crate::domain::MachinePhase::Working,
            Some("j-0".into()),
        ));
        let out = env.step(&bogus).unwrap();
        assert!(out.truncated);
        assert!(env.step(&Action::Skip).is_err());
    }
}
