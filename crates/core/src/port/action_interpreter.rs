// Action Interpreter Port

use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::domain::{ComponentTransition, Instance, State};

/// Raw agent action. The canonical form is the binary decision: schedule
/// the offered pairing or skip it. `Direct` bypasses the offer and names a
/// transition outright (dispatch rules, tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Accept,
    Skip,
    Direct(ComponentTransition),
}

/// What an action translates to: nothing, or component transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    NoOp,
    Transitions(Vec<ComponentTransition>),
}

/// Maps one raw action onto zero or more component transitions.
///
/// `offers` is the priority-ordered list of start candidates at the
/// current state; interpreters may use it or ignore it.
pub trait ActionInterpreter: Send + Sync {
    fn interpret(
        &self,
        action: &Action,
        offers: &[ComponentTransition],
        state: &State,
        instance: &Instance,
    ) -> Result<Interpretation>;
}

/// Canonical binary interpreter: accept the first offered start candidate
/// or do nothing.
pub struct BinaryActionInterpreter;

impl ActionInterpreter for BinaryActionInterpreter {
    fn interpret(
        &self,
        action: &Action,
        offers: &[ComponentTransition],
        _state: &State,
        _instance: &Instance,
    ) -> Result<Interpretation> {
        Ok(match action {
            Action::Accept => match offers.first() {
                Some(first) => Interpretation::Transitions(vec![first.clone()]),
                None => Interpretation::NoOp,
            },
            Action::Skip => Interpretation::NoOp,
            Action::Direct(transition) => Interpretation::Transitions(vec![transition.clone()]),
        })
    }
}

pub mod mocks {
    use super::*;

    /// Returns a fixed interpretation regardless of the action.
    pub struct MockInterpreter {
        pub interpretation: Interpretation,
    }

    impl MockInterpreter {
        pub fn noop() -> Self {
            MockInterpreter {
                interpretation: Interpretation::NoOp,
            }
        }
    }

    impl ActionInterpreter for MockInterpreter {
        fn interpret(
            &self,
            _action: &Action,
            _offers: &[ComponentTransition],
            _state: &State,
            _instance: &Instance,
        ) -> Result<Interpretation> {
            Ok(self.interpretation.clone())
        }
    }
}
