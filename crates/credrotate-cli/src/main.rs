//! CLI entry point for credrotate.
//!
//! This binary provides the `credrotate` command with subcommands for a full
//! rotation, revoking tokens, and offline encryption/decryption of gateway
//! credential blobs.

mod cli;
mod config;
mod rotation;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use credrotate_adapters::{DatabricksTokenClient, PowerBiClient};
use credrotate_crypto::{
    CredentialPlaintext, GatewayPublicKey, OaepHash, RecipientKey, decode_credentials,
    encode_credentials, load_private_key_pem,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, EncryptArgs};
use crate::config::RotationConfig;
use crate::rotation::RotationJob;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Rotate { config } => cmd_rotate(&config).await,
        Commands::Encrypt(args) => cmd_encrypt(args),
        Commands::Decrypt {
            private_key,
            blob,
            oaep_hash,
        } => cmd_decrypt(&private_key, &blob, oaep_hash),
        Commands::RevokeTokens { config } => cmd_revoke_tokens(&config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: rotate
// ---------------------------------------------------------------------------

async fn cmd_rotate(config_path: &Path) -> Result<()> {
    let config = RotationConfig::load(config_path)?;
    config.validate(true)?;
    info!(path = %config_path.display(), flow = ?config.identity.flow, "configuration loaded");

    let job = build_job(&config)?;
    let report = job.run(&config).await.context("rotation failed")?;

    info!(token_id = %report.token_id, "rotation complete");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: revoke-tokens
// ---------------------------------------------------------------------------

async fn cmd_revoke_tokens(config_path: &Path) -> Result<()> {
    let config = RotationConfig::load(config_path)?;
    config.validate(false)?;

    let job = build_job(&config)?;
    let revoked = job.revoke_tokens(None).await?;

    for token_id in &revoked {
        println!("{token_id}");
    }
    Ok(())
}

fn build_job(config: &RotationConfig) -> Result<RotationJob> {
    let provider = config.build_provider()?;
    let reporting = PowerBiClient::with_base_url(provider.clone(), &config.powerbi.api_base);
    let tokens = DatabricksTokenClient::new(provider, &config.warehouse.host);
    Ok(RotationJob::new(
        Arc::new(reporting),
        Arc::new(tokens),
        config.powerbi.oaep_hash,
    ))
}

// ---------------------------------------------------------------------------
// Subcommands: encrypt / decrypt
// ---------------------------------------------------------------------------

fn cmd_encrypt(args: EncryptArgs) -> Result<()> {
    let published = GatewayPublicKey {
        exponent: args.exponent,
        modulus: args.modulus,
    };
    let recipient = RecipientKey::from_gateway(&published).context("invalid public key")?;

    let plaintext = match (args.token, args.plaintext) {
        (Some(token), _) => CredentialPlaintext::key(&token),
        (None, Some(document)) => CredentialPlaintext::raw(document),
        (None, None) => anyhow::bail!("either --token or --plaintext is required"),
    };

    let blob = encode_credentials(&recipient, plaintext.as_str(), args.oaep_hash)
        .context("encryption failed")?;
    println!("{}", blob.as_str());
    Ok(())
}

fn cmd_decrypt(private_key: &Path, blob: &str, oaep_hash: OaepHash) -> Result<()> {
    let pem = std::fs::read_to_string(private_key)
        .with_context(|| format!("failed to read {}", private_key.display()))?;
    let key = load_private_key_pem(&pem).context("invalid private key")?;

    let plaintext = decode_credentials(&key, blob.trim(), oaep_hash).context("decryption failed")?;
    println!("{plaintext}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
