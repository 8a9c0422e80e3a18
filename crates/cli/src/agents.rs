// Built-in headless agents

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use shopfloor_core::port::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AgentKind {
    /// Accept every offered pairing
    Greedy,
    /// Flip a seeded coin between accept and skip
    Random,
}

pub enum Agent {
    Greedy,
    Random(StdRng),
}

impl Agent {
    pub fn new(kind: AgentKind, seed: u64) -> Agent {
        match kind {
            AgentKind::Greedy => Agent::Greedy,
            AgentKind::Random => Agent::Random(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn decide(&mut self) -> Action {
        match self {
            Agent::Greedy => Action::Accept,
            Agent::Random(rng) => {
                if rng.gen_bool(0.8) {
                    Action::Accept
                } else {
                    Action::Skip
                }
            }
        }
    }
}
