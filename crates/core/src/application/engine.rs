// Core Engine - collects, applies and orders transitions, advances time

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info};

use crate::application::{handlers, possible, time_machine, validators};
use crate::domain::error::DomainError;
use crate::domain::{ComponentTransition, History, HistoryRecord, Instance, State, Time};
use crate::error::{Result, SimError};

/// Result of one internal step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Transitions applied this tick, in application order
    pub applied: Vec<ComponentTransition>,
    /// A chosen transition that failed validation and was discarded
    pub rejected: Option<String>,
    /// No transition remains and no time dependency can resolve
    pub deadlock: bool,
}

impl StepOutcome {
    fn empty() -> Self {
        StepOutcome {
            applied: vec![],
            rejected: None,
            deadlock: false,
        }
    }
}

/// The deterministic event-driven engine.
///
/// Cooperatively stepped and single-threaded; every `step` produces a new
/// immutable state value and appends it to the history. Two runs with the
/// same instance, seed and chosen transitions are bit-identical.
pub struct Engine {
    instance: Instance,
    state: State,
    history: History,
    rng: StdRng,
    seed: u64,
    allow_early_transport: bool,
    completed_at: Option<Time>,
}

impl Engine {
    pub fn new(instance: Instance, allow_early_transport: bool, seed: u64) -> Result<Engine> {
        let instance = instance.normalized();
        instance.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let state = State::initial(&instance, &mut rng)?;
        validators::validate_state(None, &state, &instance)?;
        info!(
            machines = instance.machines.len(),
            transports = instance.transports.len(),
            jobs = instance.jobs.len(),
            seed,
            "Engine initialized"
        );
        Ok(Engine {
            history: History::new(state.clone()),
            instance,
            state,
            rng,
            seed,
            allow_early_transport,
            completed_at: None,
        })
    }

    /// Rebuild the initial state from the stored seed.
    pub fn reset(&mut self) -> Result<()> {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.state = State::initial(&self.instance, &mut self.rng)?;
        self.history = History::new(self.state.clone());
        self.completed_at = None;
        Ok(())
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Time at which the last job reached an output buffer, if the run is
    /// complete.
    pub fn makespan(&self) -> Option<Time> {
        self.completed_at
    }

    /// All transitions that may fire right now, priority-ordered.
    pub fn possible_transitions(&self) -> Result<Vec<ComponentTransition>> {
        possible::possible_transitions(&self.state, &self.instance, self.allow_early_transport)
            .map_err(SimError::from)
    }

    /// Agent-facing start candidates only.
    pub fn start_transitions(&self) -> Result<Vec<ComponentTransition>> {
        possible::start_transitions(&self.state, &self.instance, self.allow_early_transport)
            .map_err(SimError::from)
    }

    /// One internal step: advance to the next event, fire resolved time
    /// dependencies, due outages and completions, then apply at most one
    /// agent-chosen start transition.
    pub fn step(&mut self, chosen: Option<&ComponentTransition>) -> Result<StepOutcome> {
        let now = self.state.time;
        let mut outcome = StepOutcome::empty();

        let target_time = if chosen.is_some() {
            now
        } else {
            match time_machine::next_event_time(&self.state) {
                Some(t) => t.max(now),
                None => {
                    if !time_machine::resolved_dependencies(&self.state).is_empty() {
                        now
                    } else {
                        let starts = possible::start_transitions(
                            &self.state,
                            &self.instance,
                            self.allow_early_transport,
                        )?;
                        if starts.is_empty() {
                            debug!(%now, "No event, no resolvable dependency: deadlock");
                            outcome.deadlock = !self.state.is_done();
                        }
                        return Ok(outcome);
                    }
                }
            }
        };

        let mut state = self.state.clone();
        state.time = target_time;

        // Deferred transitions fire first; each may re-park on a new blocker
        for deferred in time_machine::resolved_dependencies(&state) {
            state = handlers::apply(&state, &self.instance, &deferred, &mut self.rng)?;
            outcome.applied.push(deferred);
        }

        // Due outage entries and completions, re-derived after every apply
        // so a preempting outage invalidates the completion it raced
        loop {
            let forced = possible::forced_transitions(&state);
            let mut progressed = false;
            for transition in forced {
                match validators::validate_transition(&state, &self.instance, &transition) {
                    Ok(()) => {
                        state = handlers::apply(&state, &self.instance, &transition, &mut self.rng)?;
                        outcome.applied.push(transition);
                        progressed = true;
                        break;
                    }
                    Err(DomainError::InvalidTransition { .. }) => continue,
                    Err(e) => {
                        error!(
                            transition = %transition,
                            time = state.time.0,
                            last_record = self.history.records.last().map(|r| r.message.as_str()),
                            "Fatal error while applying forced transition"
                        );
                        return Err(e.into());
                    }
                }
            }
            if !progressed {
                break;
            }
        }

        if let Some(transition) = chosen {
            match validators::validate_transition(&state, &self.instance, transition) {
                Ok(()) => {
                    state = handlers::apply(&state, &self.instance, transition, &mut self.rng)?;
                    outcome.applied.push(transition.clone());
                }
                Err(DomainError::InvalidTransition { reason, .. }) => {
                    debug!(transition = %transition, %reason, "Chosen transition rejected");
                    outcome.rejected = Some(reason);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if outcome.applied.is_empty() && state.time == now {
            // Nothing moved; do not pollute the history
            return Ok(outcome);
        }

        if let Err(e) = validators::validate_state(Some(&self.state), &state, &self.instance) {
            error!(
                time = state.time.0,
                applied = ?outcome.applied,
                "State validation failed after apply"
            );
            return Err(e.into());
        }

        let message = if outcome.applied.is_empty() {
            format!("advanced to {}", state.time)
        } else {
            outcome
                .applied
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        };
        self.history.push(HistoryRecord {
            time: state.time,
            transitions: outcome.applied.clone(),
            message,
            state: state.clone(),
        });
        self.state = state;

        if self.completed_at.is_none() && self.state.is_done() {
            self.completed_at = Some(self.state.time);
            info!(makespan = self.state.time.0, "All jobs delivered");
        }

        Ok(outcome)
    }

    /// Re-apply the recorded transition sequence to a fresh initial state.
    /// With the engine's own seed this reproduces the final state exactly.
    pub fn replay(&self) -> Result<State> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut state = State::initial(&self.instance, &mut rng)?;
        for record in &self.history.records {
            state.time = record.time;
            for transition in &record.transitions {
                state = handlers::apply(&state, &self.instance, transition, &mut rng)?;
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testkit;
    use crate::domain::{MachinePhase, TransportPhase};
    use pretty_assertions::assert_eq;

    fn engine() -> Engine {
        let (instance, _) = testkit::two_machine_shop();
        Engine::new(instance, true, 0).unwrap()
    }

    #[test]
    fn noop_on_fresh_shop_is_not_deadlock() {
        let mut engine = engine();
        let outcome = engine.step(None).unwrap();
        assert!(!outcome.deadlock, "pickup offers remain");
        assert!(outcome.applied.is_empty());
    }

    #[test]
    fn chosen_pickup_cascades_through_forced_completions() {
        let mut engine = engine();
        let pickup =
            ComponentTransition::transport("t-0", TransportPhase::Pickup, Some("j-0".into()));
        engine.step(Some(&pickup)).unwrap();

        // zero travel: empty leg, loaded leg and delivery all complete at t=0
        let mut guard = 0;
        while engine
            .state()
            .jobs
            .iter()
            .find(|j| j.id == "j-0")
            .unwrap()
            .location
            != "m-0-pre"
        {
            let outcome = engine.step(None).unwrap();
            assert!(!outcome.deadlock);
            guard += 1;
            assert!(guard < 10, "delivery must converge in a few steps");
        }
        assert_eq!(engine.state().time, Time(0));
    }

    #[test]
    fn rejected_choice_keeps_state_intact() {
        let mut engine = engine();
        let bogus = ComponentTransition::machine("m-0", MachinePhase::Working, Some("j-0".into()));
        let before = engine.state().clone();
        let outcome = engine.step(Some(&bogus)).unwrap();
        assert!(outcome.rejected.is_some());
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn replay_reproduces_final_state() {
        let mut engine = engine();
        let pickup =
            ComponentTransition::transport("t-0", TransportPhase::Pickup, Some("j-0".into()));
        engine.step(Some(&pickup)).unwrap();
        for _ in 0..6 {
            engine.step(None).unwrap();
        }
        let replayed = engine.replay().unwrap();
        assert_eq!(&replayed, engine.state());
    }
}
