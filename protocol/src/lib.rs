// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quill Protocol — Core Library
//!
//! Quill takes an arbitrary JSON record, signs it with a secp256k1 key, wraps
//! it in a proof envelope, and hands it to a data L1 ingestion endpoint:
//!
//! ```text
//! KeyProvider ─► SigningKeypair ─► canonical::encode ─► sign + self-verify
//!                                                            │
//!                     Uploader::submit ◄── Envelope { value, proofs }
//! ```
//!
//! ## Modules
//!
//! - **crypto** — secp256k1 keys, SHA-256, ECDSA signing and verification.
//! - **identity** — how a public key becomes the `id` of a proof.
//! - **canonical** — deterministic JSON bytes, the thing that actually gets signed.
//! - **envelope** — proofs, envelopes, and the sign-a-payload step.
//! - **network** — the ingestion uploader and the validation service client.
//! - **pipeline** — one submission run as an explicit state machine.
//! - **config** — defaults and environment variable names.
//! - **error** — the error taxonomy shared by all of the above.
//!
//! ## Ground rules
//!
//! 1. The bytes that were hashed are the bytes that go on the wire.
//! 2. Private keys come from a [`crypto::KeyProvider`], never from a literal.
//! 3. Nothing leaves the process unless it verified locally first.

pub mod canonical;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod network;
pub mod pipeline;

pub use canonical::CanonicalBytes;
pub use envelope::{Envelope, EnvelopeBuilder, Proof};
pub use error::{SubmitError, ValidationError};
pub use identity::{Identity, IdentityStrategy};
pub use pipeline::{PipelineState, SubmissionPipeline};
