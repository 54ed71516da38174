use domain::error::{BoxError, DomainError};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

use crate::tag::TagStore;

/// Closed set of states of one machine type, usually a fieldless enum.
pub trait MachineState: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every state the machine can be in.
    fn states() -> &'static [Self];

    fn name(&self) -> &'static str;
}

/// Handler run while the machine sits in a state. Returning `Some(next)`
/// moves the machine; any state may follow any other.
pub type StateHandler<S, C> =
    Box<dyn FnMut(&mut C, &TagStore) -> Result<Option<S>, BoxError> + Send>;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("no handler for state {state}")]
    MissingHandler { state: &'static str },

    #[error("handler for state {state} failed: {source}")]
    Handler {
        state: &'static str,
        #[source]
        source: BoxError,
    },
}

/// Object-safe view of a machine, what the driver ticks.
pub trait ManagedMachine: Send {
    fn name(&self) -> &str;

    fn state_name(&self) -> &'static str;

    /// Runs the handler of the current state once.
    fn tick(&mut self, tags: &TagStore) -> Result<(), MachineError>;
}

pub struct StateMachine<S: MachineState, C> {
    name: String,
    current: S,
    context: C,
    handlers: HashMap<S, StateHandler<S, C>>,
}

impl<S: MachineState, C: Send + 'static> StateMachine<S, C> {
    pub fn builder(name: impl Into<String>, initial: S, context: C) -> StateMachineBuilder<S, C> {
        StateMachineBuilder {
            name: name.into(),
            initial,
            context,
            handlers: HashMap::new(),
        }
    }

    pub fn current_state(&self) -> S {
        self.current
    }

    pub fn context(&self) -> &C {
        &self.context
    }
}

impl<S: MachineState, C: Send + 'static> ManagedMachine for StateMachine<S, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_name(&self) -> &'static str {
        self.current.name()
    }

    fn tick(&mut self, tags: &TagStore) -> Result<(), MachineError> {
        let state = self.current;
        let handler = self
            .handlers
            .get_mut(&state)
            .ok_or(MachineError::MissingHandler { state: state.name() })?;

        match handler(&mut self.context, tags) {
            Ok(Some(next)) => {
                if next != state {
                    tracing::debug!(machine = %self.name, from = state.name(), to = next.name(), "Machine transition");
                }
                self.current = next;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(source) => Err(MachineError::Handler {
                state: state.name(),
                source,
            }),
        }
    }
}

pub struct StateMachineBuilder<S: MachineState, C> {
    name: String,
    initial: S,
    context: C,
    handlers: HashMap<S, StateHandler<S, C>>,
}

impl<S: MachineState, C: Send + 'static> StateMachineBuilder<S, C> {
    pub fn on<F>(mut self, state: S, handler: F) -> Self
    where
        F: FnMut(&mut C, &TagStore) -> Result<Option<S>, BoxError> + Send + 'static,
    {
        self.handlers.insert(state, Box::new(handler));
        self
    }

    /// Fails when any state of `S` has no handler.
    pub fn build(self) -> Result<StateMachine<S, C>, DomainError> {
        let missing: Vec<&'static str> = S::states()
            .iter()
            .filter(|s| !self.handlers.contains_key(s))
            .map(|s| s.name())
            .collect();

        if !missing.is_empty() {
            return Err(DomainError::InvalidConfiguration(format!(
                "state machine {} has no handler for: {}",
                self.name,
                missing.join(", ")
            )));
        }

        Ok(StateMachine {
            name: self.name,
            current: self.initial,
            context: self.context,
            handlers: self.handlers,
        })
    }
}
