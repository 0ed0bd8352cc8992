//! # Envelope Module
//!
//! Proofs, envelopes, and the step that turns a payload into both.
//!
//! ```text
//! builder.rs      — Proof, Envelope, EnvelopeBuilder
//! signing.rs      — canonicalize + sign + self-verify, co-signing
//! verification.rs — offline re-verification with a key resolver
//! ```
//!
//! ## Wire format
//!
//! ```text
//! {"value": <canonical payload>, "proofs": [{"id": "<hex>", "signature": "<DER hex>"}]}
//! ```

pub mod builder;
pub mod signing;
pub mod verification;

pub use builder::{Envelope, EnvelopeBuilder, Proof};
pub use signing::{co_sign, sign_bytes, sign_envelope, sign_payload};
pub use verification::{verify_envelope, KeyRegistry, KeyResolver, RawIdentityResolver};
