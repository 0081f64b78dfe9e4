use crate::domain::reconciliation::PollPolicy;
use crate::error::{ClientError, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_STORE_PATH: &str = "quizpay-storage.json";

/// Connection and persistence settings, read from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Base URL of the quiz backend API
    #[arg(long, env = "QUIZPAY_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// JSON file holding the local session (token, answers, pending payment)
    #[arg(long, env = "QUIZPAY_STORE", default_value = DEFAULT_STORE_PATH, global = true)]
    pub store: PathBuf,

    /// Path to a RocksDB database used instead of the JSON file (requires 'storage-rocksdb')
    #[arg(long, env = "QUIZPAY_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Backend status checks before a payment is reported as still processing
    #[arg(long, default_value_t = PollPolicy::DEFAULT_MAX_ATTEMPTS, global = true)]
    pub poll_attempts: u32,

    /// Delay between backend status checks, in milliseconds
    #[arg(long, default_value_t = 2000, global = true)]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub store_path: PathBuf,
    pub db_path: Option<PathBuf>,
    pub poll: PollPolicy,
}

impl TryFrom<ConfigArgs> for Config {
    type Error = ClientError;

    fn try_from(args: ConfigArgs) -> Result<Self> {
        if args.poll_attempts == 0 {
            return Err(ClientError::ValidationError(
                "--poll-attempts must be at least 1".to_string(),
            ));
        }
        if !args.api_url.starts_with("http://") && !args.api_url.starts_with("https://") {
            return Err(ClientError::ValidationError(format!(
                "API URL must be http(s): {}",
                args.api_url
            )));
        }

        Ok(Self {
            api_url: args.api_url,
            store_path: args.store,
            db_path: args.db_path,
            poll: PollPolicy::new(
                args.poll_attempts,
                Duration::from_millis(args.poll_interval_ms),
            ),
        })
    }
}
