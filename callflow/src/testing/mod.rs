//! Test doubles for writing pipeline tests against the transport and log
//! boundaries without a network.

mod mocks;

pub use mocks::{MockTransport, RecordingLogSink, SeenRequest};
