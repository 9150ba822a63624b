use anyhow::Context;
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use typed_data_signer::eip712::{
    encode_type, get_pre_image, sign_typed_data, type_hash, HttpWalletProvider, LocalKeySigner,
    TypedData, TypedDataSigner,
};
use typed_data_signer::error::{SignerError, SignerResult};
use typed_data_signer::utils::config::{SignerConfig, SignerMode};
use typed_data_signer::utils::logging;
use typed_data_signer::{log_error, log_info};

#[derive(Parser, Debug)]
#[command(name = "typed-sign", version, about = "Hash and sign EIP-712 typed data")]
struct Cli {
    /// Print debug log lines to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the canonical type string and type hash of the primary type
    EncodeType {
        /// Typed data JSON file (`-` for stdin)
        file: PathBuf,
    },

    /// Print the domain separator, struct hash and digest
    Hash {
        /// Typed data JSON file (`-` for stdin)
        file: PathBuf,
    },

    /// Sign with a local key or a remote wallet
    Sign {
        /// Typed data JSON file (`-` for stdin)
        file: PathBuf,

        /// Read the private key from this environment variable
        #[arg(long, value_name = "VAR")]
        private_key_env: Option<String>,

        /// Wallet JSON-RPC endpoint
        #[arg(long, value_name = "URL")]
        rpc_url: Option<String>,

        /// Account to sign with on the wallet
        #[arg(long, value_name = "ADDRESS")]
        account: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    match run(cli.command).await {
        Ok(output) => {
            println!("{}", render(&output));
            ExitCode::SUCCESS
        }
        Err(err) => {
            log_error!("cli", "command failed", reason = err);
            println!("{}", render(&serde_json::to_value(&err).unwrap_or(Value::Null)));
            ExitCode::FAILURE
        }
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

async fn run(command: Command) -> SignerResult<Value> {
    match command {
        Command::EncodeType { file } => {
            let typed_data = load_typed_data(&file)?;
            typed_data.validate()?;

            let encoded = encode_type(&typed_data.primary_type, &typed_data.types)?;
            let hash = type_hash(&typed_data.primary_type, &typed_data.types)?;

            Ok(json!({
                "primaryType": typed_data.primary_type,
                "encodedType": encoded,
                "typeHash": hex_word(&hash),
            }))
        }
        Command::Hash { file } => {
            let typed_data = load_typed_data(&file)?;
            let pre_image = get_pre_image(&typed_data)?;

            Ok(json!({
                "domainSeparator": hex_word(&pre_image.domain_separator),
                "structHash": hex_word(&pre_image.struct_hash),
                "digest": hex_word(&pre_image.final_hash),
            }))
        }
        Command::Sign {
            file,
            private_key_env,
            rpc_url,
            account,
        } => {
            let typed_data = load_typed_data(&file)?;
            let config = signer_config(private_key_env, rpc_url, account)?;
            sign_command(&typed_data, &config).await
        }
    }
}

fn signer_config(
    private_key_env: Option<String>,
    rpc_url: Option<String>,
    account: Option<String>,
) -> SignerResult<SignerConfig> {
    let mut config = SignerConfig::from_env()?;

    if let Some(var) = private_key_env {
        let key = std::env::var(&var)
            .map_err(|_| SignerError::config(format!("environment variable {} is not set", var)))?;
        config = config.with_private_key(key);
    }
    if let Some(url) = rpc_url {
        config = config.with_rpc_url(url);
    }
    if let Some(account) = account {
        config = config.with_account(account);
    }

    config.validate()?;
    config.apply_logging();
    Ok(config)
}

async fn sign_command(typed_data: &TypedData, config: &SignerConfig) -> SignerResult<Value> {
    let (signature, signer) = match config.signer_mode()? {
        SignerMode::LocalKey => {
            let secret = config
                .private_key
                .as_ref()
                .ok_or_else(|| SignerError::internal("local key mode without a key"))?;
            let key = LocalKeySigner::from_hex(secret.expose_secret())?;
            let signature = sign_typed_data(typed_data, TypedDataSigner::LocalKey(&key)).await?;
            (signature, Some(key.address()))
        }
        SignerMode::Wallet => {
            let provider = HttpWalletProvider::from_config(config)?;
            log_info!("cli", "signing through wallet", rpc_url = provider.url());
            let signature =
                sign_typed_data(typed_data, TypedDataSigner::Wallet(&provider)).await?;
            (signature, config.account.clone())
        }
    };

    let mut output = serde_json::to_value(&signature)?;
    if let Some(fields) = output.as_object_mut() {
        fields.insert("signature".to_string(), Value::String(signature.to_hex()));
        if let Some(address) = signer {
            fields.insert("signer".to_string(), Value::String(address));
        }
    }
    Ok(output)
}

fn load_typed_data(path: &Path) -> SignerResult<TypedData> {
    let payload = read_payload(path)
        .map_err(|e| SignerError::invalid_input(format!("{:#}", e)))?;
    Ok(TypedData::from_json(&payload)?)
}

fn read_payload(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read typed data from stdin")?;
        return Ok(buffer);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read typed data from {}", path.display()))
}

fn hex_word(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
