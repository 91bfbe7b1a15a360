//! # CLI Interface
//!
//! Defines the command-line argument structure for `wepay` using `clap`
//! derive. Merchant and client settings are global flags (each with an
//! environment fallback) so they can sit before or after the subcommand.

use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

/// WePay v3 merchant API client.
///
/// Signs every request with the merchant key, verifies every response
/// against the platform certificates, and keeps those certificates cached
/// locally.
#[derive(Parser, Debug)]
#[command(
    name = "wepay",
    about = "WePay v3 merchant API client",
    version,
    propagate_version = true
)]
pub struct WepayCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every subcommand. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// JSON config file with `merchant` and `client` sections.
    #[arg(long, short = 'c', env = "WEPAY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Merchant id.
    #[arg(long, env = "WEPAY_MCH_ID", global = true)]
    pub mch_id: Option<String>,

    /// App id bound to the merchant; filled into transfer batches that
    /// don't name one.
    #[arg(long, env = "WEPAY_APPID", global = true)]
    pub appid: Option<String>,

    /// The 32-character API v3 key.
    #[arg(long, env = "WEPAY_API_V3_KEY", global = true, hide_env_values = true)]
    pub api_v3_key: Option<String>,

    /// Merchant certificate: PEM content or a path to a PEM file.
    #[arg(long, env = "WEPAY_CERT_PUBLIC", global = true)]
    pub cert_public: Option<String>,

    /// Merchant private key: PEM content or a path to a PEM file.
    #[arg(long, env = "WEPAY_CERT_PRIVATE", global = true, hide_env_values = true)]
    pub cert_private: Option<String>,

    /// Directory for cached platform certificates.
    #[arg(long, env = "WEPAY_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// API base URL.
    #[arg(long, env = "WEPAY_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "WEPAY_LOG_FORMAT", global = true, default_value = "pretty")]
    pub log_format: String,
}

/// Top-level subcommands for the `wepay` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, decrypt and cache the current platform certificates.
    Certificates,
    /// Batch transfers to users.
    Transfer {
        #[command(subcommand)]
        command: TransferCommands,
    },
    /// Print version information and exit.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum TransferCommands {
    /// Create a batch from a JSON file.
    Create(CreateArgs),
    /// Query a batch and its details.
    Query(QueryArgs),
    /// Query a single transfer detail.
    Detail(DetailArgs),
}

/// Arguments for `transfer create`.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// JSON file holding the batch request body.
    #[arg(long, short = 'f')]
    pub file: PathBuf,
}

/// Arguments for `transfer query`.
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("batch").required(true).args(["batch_id", "out_batch_no"])))]
pub struct QueryArgs {
    /// Platform batch id.
    #[arg(long)]
    pub batch_id: Option<String>,

    /// Merchant batch number.
    #[arg(long)]
    pub out_batch_no: Option<String>,

    /// First detail to return.
    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// Maximum number of details to return.
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Detail filter: ALL, SUCCESS or FAIL.
    #[arg(long, default_value = "ALL")]
    pub detail_status: String,

    /// Only return the batch summary.
    #[arg(long)]
    pub no_details: bool,
}

/// Arguments for `transfer detail`. Either platform ids or merchant numbers.
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("batch").required(true).args(["batch_id", "out_batch_no"])))]
pub struct DetailArgs {
    /// Platform batch id; requires `--detail-id`.
    #[arg(long, requires = "detail_id")]
    pub batch_id: Option<String>,

    /// Platform detail id.
    #[arg(long)]
    pub detail_id: Option<String>,

    /// Merchant batch number; requires `--out-detail-no`.
    #[arg(long, requires = "out_detail_no")]
    pub out_batch_no: Option<String>,

    /// Merchant detail number.
    #[arg(long)]
    pub out_detail_no: Option<String>,
}
