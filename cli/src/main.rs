// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Quill
//!
//! Entry point for the `quill` binary. Parses CLI arguments, initializes
//! logging, and runs one command:
//!
//! - `sign`      — sign a template and print the envelope
//! - `submit`    — sign a template and POST it to the ingestion endpoint
//! - `identity`  — print the public key and proof id for the configured key
//! - `verify`    — check the proofs of an envelope file offline
//! - `validate`  — request a validation and poll for its result
//! - `providers` — list providers known to the validation service
//!
//! Diagnostics go to stderr through `tracing`; results go to stdout. Any
//! failure exits non-zero.

mod cli;
mod logging;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use quill_protocol::crypto::{derive_public_key, PublicKey};
use quill_protocol::envelope::{verify_envelope, KeyRegistry, KeyResolver, RawIdentityResolver};
use quill_protocol::identity::{derive_identity, IdentityStrategy};
use quill_protocol::network::{Uploader, ValidationClient};
use quill_protocol::{Envelope, SubmissionPipeline};

use cli::{Commands, QuillCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = QuillCli::parse();
    logging::init_logging(
        "quill=info,quill_protocol=info",
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Sign(args) => sign(args),
        Commands::Submit(args) => submit(args).await,
        Commands::Identity(args) => identity(args),
        Commands::Verify(args) => verify(args),
        Commands::Validate(args) => validate(args).await,
        Commands::Providers(args) => providers(args).await,
    }
}

/// Reads and parses a JSON template.
fn read_template(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("template {} is not valid JSON", path.display()))
}

/// Signs a template and prints the envelope. Nothing is sent.
fn sign(args: cli::SignArgs) -> Result<()> {
    let payload = read_template(&args.template)?;
    let mut pipeline = SubmissionPipeline::new(
        args.key.provider(),
        Arc::new(Uploader::new()),
        String::new(),
    )
    .with_strategy(args.key.strategy);

    let envelope = pipeline.sign_only(payload).context("signing failed")?;
    let mut stdout = std::io::stdout().lock();
    if args.pretty {
        writeln!(stdout, "{}", envelope.to_json_pretty()?)?;
    } else {
        stdout.write_all(&envelope.to_json_bytes()?)?;
        writeln!(stdout)?;
    }
    Ok(())
}

/// Signs a template and submits it to the ingestion endpoint.
async fn submit(args: cli::SubmitArgs) -> Result<()> {
    let payload = read_template(&args.template)?;
    tracing::info!(
        template = %args.template.display(),
        endpoint = %args.endpoint,
        identity = %args.key.strategy,
        "starting submission"
    );

    let mut pipeline = SubmissionPipeline::new(
        args.key.provider(),
        Arc::new(Uploader::new()),
        args.endpoint.clone(),
    )
    .with_strategy(args.key.strategy);

    let result = pipeline
        .run(payload)
        .await
        .with_context(|| format!("submission to {} failed", args.endpoint))?;

    println!("accepted (HTTP {})", result.status);
    if !result.body.is_empty() {
        println!("{}", result.body);
    }
    Ok(())
}

/// Prints the public key and the proof id it produces under each strategy.
fn identity(args: cli::IdentityArgs) -> Result<()> {
    let keypair = args.key.provider().load()?;
    let public_key = derive_public_key(&keypair);

    println!("public key : {}", public_key.to_hex());
    for strategy in [IdentityStrategy::RawUncompressed, IdentityStrategy::SpkiSha256] {
        let marker = if strategy == args.key.strategy { "*" } else { " " };
        println!(
            "{marker} {:<17}: {}",
            strategy.as_str(),
            derive_identity(&public_key, strategy)?
        );
    }
    Ok(())
}

/// Verifies every proof of an envelope file.
fn verify(args: cli::VerifyArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.envelope)
        .with_context(|| format!("failed to read envelope {}", args.envelope.display()))?;
    let envelope = Envelope::from_json(&text)?;

    let registry;
    let resolver: &dyn KeyResolver = if args.signers.is_empty() {
        &RawIdentityResolver
    } else {
        let mut keys = KeyRegistry::new();
        for signer in &args.signers {
            let public_key = PublicKey::from_hex(signer)
                .with_context(|| format!("invalid signer key {signer}"))?;
            keys.register(public_key, args.strategy)?;
        }
        registry = keys;
        &registry
    };

    let checked = verify_envelope(&envelope, resolver)?;
    println!("{checked} proof(s) verified");
    Ok(())
}

/// Requests a validation and waits for the outcome. Ctrl+C cancels the wait.
async fn validate(args: cli::ValidateArgs) -> Result<()> {
    let client = ValidationClient::new(args.api.clone());
    let policy = args.poll_policy();
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    let watcher = tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("interrupt received, cancelling validation");
        on_signal.cancel();
    });

    let outcome = client
        .validate(&args.provider, &args.circumstance, policy, &cancel)
        .await;
    watcher.abort();
    let outcome = outcome.with_context(|| format!("validation via {} failed", args.api))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Lists providers registered with the validation service.
async fn providers(args: cli::ProvidersArgs) -> Result<()> {
    let providers = ValidationClient::new(args.api.clone())
        .providers()
        .await
        .with_context(|| format!("failed to list providers from {}", args.api))?;
    println!("{}", serde_json::to_string_pretty(&providers)?);
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed, that source simply never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
