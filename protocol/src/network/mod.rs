//! # Network Module
//!
//! HTTP clients for the two services the pipeline talks to.
//!
//! ```text
//! uploader.rs   — single-shot POST of a signed envelope
//! validation.rs — validation requests and cancellable result polling
//! ```
//!
//! Both sit behind a trait ([`Submitter`], [`StatusProbe`]) so the pipeline
//! and the poller can be exercised without a live service.

pub mod uploader;
pub mod validation;

pub use uploader::{Submitter, UploadResult, Uploader};
pub use validation::{
    poll_until_ready, spawn_poll, PollHandle, PollPolicy, StatusProbe, ValidateCircumstance,
    ValidationClient, ValidationCommand, ValidationOutcome, ValidationTicket,
};
