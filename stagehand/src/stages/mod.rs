//! The three task phases that touch the outside world.
//!
//! - [`ObjectStager`] downloads inputs and uploads outputs
//! - [`TaskRunner`] runs the executable, [`ProcessExecutor`] being the real one
//! - [`FailFastGroup`] fans transfers out and reports the first failure

mod executor;
mod fanout;
mod stager;

pub use executor::{ExecutionOutcome, ExecutorState, LaunchStrategy, ProcessExecutor, TaskRunner};
pub use fanout::FailFastGroup;
pub use stager::{ObjectStager, EXECUTABLE_MODE};

#[cfg(test)]
pub use executor::MockTaskRunner;
