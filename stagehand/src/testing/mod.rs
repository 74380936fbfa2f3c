//! Test doubles for the worker's ports.
//!
//! This module provides:
//! - An in-memory object store with latency and failure injection
//! - A scripted resource probe
//! - A loopback HTTP endpoint recording what reporters send
//! - Canned requests, labels and readings

mod endpoint;
mod fixtures;
mod probe;
mod store;

pub use endpoint::{RecordedRequest, RecordingEndpoint};
pub use fixtures::{sample_metric, sample_readings, sample_request, sample_request_json, test_labels};
pub use probe::ScriptedProbe;
pub use store::MemoryObjectStore;
