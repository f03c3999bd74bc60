//! CLI argument definitions for credrotate.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use credrotate_crypto::OaepHash;

use crate::config::DEFAULT_CONFIG_PATH;

/// credrotate -- rotate warehouse tokens behind Power BI datasources.
#[derive(Parser)]
#[command(
    name = "credrotate",
    version,
    about = "Rotate Databricks access tokens used by Power BI gateways and datasets",
    long_about = "Mints a fresh Databricks personal access token, encrypts it for an \
                  on-premises Power BI gateway and installs it on the gateway datasource \
                  and/or the dataset's cloud datasource."
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a full rotation as described by the configuration file.
    Rotate {
        /// Path to the configuration file.
        #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// Encrypt a credential for a gateway public key and print the blob.
    Encrypt(EncryptArgs),

    /// Decrypt a blob with a private key (test key pairs only).
    Decrypt {
        /// PEM file holding the RSA private key (PKCS#8 or PKCS#1).
        #[arg(long)]
        private_key: PathBuf,

        /// Base64 blob as produced by `encrypt`.
        #[arg(long)]
        blob: String,

        /// OAEP digest the blob was produced with.
        #[arg(long, default_value_t = OaepHash::Sha256)]
        oaep_hash: OaepHash,
    },

    /// Revoke every warehouse token of the configured principal.
    RevokeTokens {
        /// Path to the configuration file.
        #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[derive(Args)]
pub struct EncryptArgs {
    /// Base64 RSA modulus, as in the gateway's `publicKey.modulus`.
    #[arg(long)]
    pub modulus: String,

    /// Base64 RSA exponent, as in the gateway's `publicKey.exponent`.
    #[arg(long)]
    pub exponent: String,

    /// Access token to wrap in a key credential document.
    #[arg(long, conflicts_with = "plaintext", required_unless_present = "plaintext")]
    pub token: Option<String>,

    /// Credential document to encrypt verbatim.
    #[arg(long)]
    pub plaintext: Option<String>,

    /// OAEP digest for the key wrap.
    #[arg(long, default_value_t = OaepHash::Sha256)]
    pub oaep_hash: OaepHash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn rotate_defaults_config_path() {
        let cli = Cli::try_parse_from(["credrotate", "rotate"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Rotate { config } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
            }
            _ => panic!("expected rotate"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["credrotate", "revoke-tokens", "--verbose"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn encrypt_requires_token_or_plaintext() {
        let missing =
            Cli::try_parse_from(["credrotate", "encrypt", "--modulus", "m", "--exponent", "AQAB"]);
        assert!(missing.is_err());

        let both = Cli::try_parse_from([
            "credrotate",
            "encrypt",
            "--modulus",
            "m",
            "--exponent",
            "AQAB",
            "--token",
            "dapi",
            "--plaintext",
            "{}",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn encrypt_parses_oaep_hash() {
        let cli = Cli::try_parse_from([
            "credrotate",
            "encrypt",
            "--modulus",
            "m",
            "--exponent",
            "AQAB",
            "--token",
            "dapi",
            "--oaep-hash",
            "sha1",
        ])
        .unwrap();
        match cli.command {
            Commands::Encrypt(args) => {
                assert_eq!(args.oaep_hash, OaepHash::Sha1);
                assert_eq!(args.token.as_deref(), Some("dapi"));
            }
            _ => panic!("expected encrypt"),
        }
    }
}
