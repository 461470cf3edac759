use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use blockio_signer::crypto::passphrase::{stretch_with, KdfParams};
use blockio_signer::utils::config::ENV_PIN;
use blockio_signer::utils::logging;
use blockio_signer::{
    create_and_sign_transaction, create_and_sign_with_user_key, log_info, summarize_prepared_transaction,
    KeyMaterial, PreparedTransaction,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "blockio-signer",
    version,
    about = "Sign and inspect prepared transactions locally"
)]
struct Cli {
    /// Print debug logs to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a prepared transaction
    Sign {
        /// JSON file with the prepared transaction (full response or its data)
        #[arg(long)]
        prepared: PathBuf,

        /// Hex secret scalar; repeatable
        #[arg(long = "key")]
        keys: Vec<String>,

        /// WIF secret; repeatable
        #[arg(long = "wif")]
        wifs: Vec<String>,
    },

    /// Fee and amount summary of a prepared transaction
    Summarize {
        #[arg(long)]
        prepared: PathBuf,
    },

    /// Stretch a PIN into an AES-256 key
    Stretch {
        #[arg(long)]
        pin: String,

        #[arg(long, default_value = "")]
        salt: String,

        #[arg(long, default_value_t = 1024)]
        iterations: u32,
    },

    /// Public key for a secret
    Pubkey {
        /// Hex secret scalar
        #[arg(long)]
        secret: Option<String>,

        /// WIF secret
        #[arg(long)]
        wif: Option<String>,

        /// Hex passphrase bytes
        #[arg(long)]
        passphrase: Option<String>,

        #[arg(long)]
        uncompressed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    match cli.command {
        Command::Sign { prepared, keys, wifs } => sign(&prepared, &keys, &wifs),
        Command::Summarize { prepared } => {
            let prepared = load_prepared(&prepared)?;
            let summary = summarize_prepared_transaction(&prepared)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Stretch { pin, salt, iterations } => {
            let key = stretch_with(&pin, &KdfParams::new(salt, iterations))?;
            println!("{}", json!({ "key": key.to_hex().as_str() }));
            Ok(())
        }
        Command::Pubkey {
            secret,
            wif,
            passphrase,
            uncompressed,
        } => {
            let key = match (secret, wif, passphrase) {
                (Some(secret), None, None) => KeyMaterial::from_hex_secret(&secret)?,
                (None, Some(wif), None) => KeyMaterial::from_encoded_secret(&wif)?,
                (None, None, Some(passphrase)) => {
                    let bytes = hex::decode(passphrase.trim()).context("--passphrase must be hex")?;
                    KeyMaterial::from_passphrase(&bytes)?
                }
                _ => bail!("pass exactly one of --secret, --wif or --passphrase"),
            };
            println!("{}", json!({ "public_key": key.public_key_hex_as(!uncompressed) }));
            Ok(())
        }
    }
}

fn sign(path: &Path, keys: &[String], wifs: &[String]) -> Result<()> {
    let prepared = load_prepared(path)?;

    let mut material = Vec::with_capacity(keys.len() + wifs.len());
    for key in keys {
        material.push(KeyMaterial::from_hex_secret(key)?);
    }
    for wif in wifs {
        material.push(KeyMaterial::from_encoded_secret(wif)?);
    }

    let pin = std::env::var(ENV_PIN).ok().filter(|p| !p.is_empty());
    let payload = match (&prepared.user_key, pin) {
        (Some(user_key), Some(pin)) => {
            let params = user_key.algorithm_or_legacy().kdf_params();
            let encryption_key = stretch_with(&pin, &params)?;
            create_and_sign_with_user_key(&prepared, material, &encryption_key)?
        }
        (Some(_), None) if material.is_empty() => {
            bail!("{} must be set to sign with the prepared transaction's user key", ENV_PIN)
        }
        _ => create_and_sign_transaction(&prepared, &material)?,
    };

    log_info!(
        "cli",
        "Signing finished",
        state = format!("{:?}", payload.state())
    );
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn load_prepared(path: &Path) -> Result<PreparedTransaction> {
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(PreparedTransaction::from_json(&body)?)
}
