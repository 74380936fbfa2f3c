//! Task pipeline execution.
//!
//! A [`Pipeline`] runs stage-in, execute and stage-out strictly in order,
//! records the timing of each phase, and reports the completion record of
//! every successful run.

mod coordinator;

#[cfg(test)]
mod integration_tests;

pub use coordinator::Pipeline;
