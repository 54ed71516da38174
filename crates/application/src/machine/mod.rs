pub mod driver;
pub mod state_machine;

pub use driver::{MachineView, StateMachineDriver};
pub use state_machine::{
    MachineError, MachineState, ManagedMachine, StateHandler, StateMachine, StateMachineBuilder,
};
