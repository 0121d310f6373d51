//! taskdesk CLI - Operator command-line interface
//!
//! Usage:
//!   taskdesk secret generate [--bytes N]
//!   taskdesk password hash <password>
//!   taskdesk token issue <username> [--ttl-secs N]
//!   taskdesk token inspect <token>
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use clap::{Parser, Subcommand};
use rand::RngCore;
use std::time::Duration;
use taskdesk_api::auth::{hash_password, TokenCodec};
use taskdesk_core::config::{AuthConfig, Secret, MIN_SECRET_LEN};

#[derive(Parser)]
#[command(name = "taskdesk")]
#[command(about = "taskdesk operator tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Signing secret management
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
    /// Password hashing
    Password {
        #[command(subcommand)]
        action: PasswordAction,
    },
    /// Session token tools
    Token {
        /// Token signing secret
        #[arg(long, env = "TASKDESK_JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Token issuer
        #[arg(long, env = "TASKDESK_JWT_ISSUER", default_value = "taskdesk")]
        issuer: String,

        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum SecretAction {
    /// Generate a random base64url signing secret
    Generate {
        /// Number of random bytes
        #[arg(long, default_value_t = 48)]
        bytes: usize,
    },
}

#[derive(Subcommand)]
enum PasswordAction {
    /// Print the Argon2id PHC string for a password
    Hash { password: String },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a session token for a user
    Issue {
        username: String,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
    /// Verify a token and print its claims
    Inspect { token: String },
}

fn generate_secret(bytes: usize) -> anyhow::Result<String> {
    if bytes < MIN_SECRET_LEN {
        anyhow::bail!("secret must be at least {MIN_SECRET_LEN} bytes, got {bytes}");
    }
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

fn codec(secret: String, issuer: String, ttl: Duration) -> anyhow::Result<TokenCodec> {
    let config = AuthConfig {
        jwt_secret: Some(Secret::new(secret)),
        issuer,
        token_ttl_secs: ttl.as_secs(),
        ..AuthConfig::default()
    };
    TokenCodec::from_config(&config).context("Invalid signing configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Secret { action } => match action {
            SecretAction::Generate { bytes } => {
                println!("{}", generate_secret(bytes)?);
            }
        },
        Commands::Password { action } => match action {
            PasswordAction::Hash { password } => {
                let hash = hash_password(&password)?;
                println!("{hash}");
            }
        },
        Commands::Token {
            secret,
            issuer,
            action,
        } => match action {
            TokenAction::Issue { username, ttl_secs } => {
                let ttl = Duration::from_secs(ttl_secs);
                let token = codec(secret, issuer, ttl)?.issue(&username, ttl)?;
                tracing::debug!(%username, ttl_secs, "Issued token");
                println!("{token}");
            }
            TokenAction::Inspect { token } => {
                let codec = codec(secret, issuer, Duration::from_secs(3600))?;
                match codec.verify(&token) {
                    Ok(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
                    Err(e) => {
                        if let Some(exp) = codec.signed_expiry(&token) {
                            eprintln!("expires at {exp} (unix seconds)");
                        }
                        anyhow::bail!("{e}");
                    }
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_secret_length() {
        let secret = generate_secret(48).unwrap();
        assert_eq!(URL_SAFE_NO_PAD.decode(&secret).unwrap().len(), 48);
        assert_ne!(secret, generate_secret(48).unwrap());
    }

    #[test]
    fn test_generate_secret_rejects_short() {
        assert!(generate_secret(16).is_err());
    }

    #[test]
    fn test_issue_and_inspect_round_trip() {
        let codec = codec(
            "cli-test-secret-that-is-long-enough-123".to_string(),
            "taskdesk".to_string(),
            Duration::from_secs(60),
        )
        .unwrap();
        let token = codec.issue("alice", Duration::from_secs(60)).unwrap();
        assert_eq!(codec.verify(&token).unwrap().sub, "alice");
    }

    #[test]
    fn test_codec_rejects_short_secret() {
        assert!(codec(
            "short".to_string(),
            "taskdesk".to_string(),
            Duration::from_secs(60)
        )
        .is_err());
    }
}
