//! # Batch Transfer Payloads
//!
//! Wire types for the merchant batch-transfer endpoints. Amounts are integer
//! fen (1/100 CNY). Nothing here validates business rules such as batch size
//! limits or when a recipient name is required; the platform answers with a
//! `PARAM_ERROR` and the caller sees it as an upstream error.
//!
//! Response types are lenient: every field the platform may omit is an
//! `Option` or defaults, so a new field or a missing one never turns a
//! verified response into a decode error.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Create batch
// ---------------------------------------------------------------------------

/// Body of `POST /v3/transfer/batches`.
///
/// Field order is the order sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBatchRequest {
    /// App id the recipients' openids belong to. Left empty, the client
    /// fills in the credential's app id.
    #[serde(default)]
    pub appid: String,
    /// Merchant-side batch number, unique per merchant.
    pub out_batch_no: String,
    pub batch_name: String,
    pub batch_remark: String,
    /// Sum of all detail amounts, in fen.
    pub total_amount: u64,
    pub total_num: u32,
    pub transfer_detail_list: Vec<TransferDetailInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_scene_id: Option<String>,
}

/// One payee line in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetailInput {
    /// Merchant-side detail number, unique within the batch.
    pub out_detail_no: String,
    /// In fen.
    pub transfer_amount: u64,
    pub transfer_remark: String,
    pub openid: String,
    /// Recipient's real name, encrypted by the caller with the platform
    /// certificate when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Response to a created batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub out_batch_no: String,
    /// Platform-side batch id.
    pub batch_id: String,
    /// RFC 3339.
    pub create_time: String,
}

// ---------------------------------------------------------------------------
// Query batch
// ---------------------------------------------------------------------------

/// Which details to list when querying a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailStatus {
    #[default]
    All,
    Success,
    Fail,
}

impl DetailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailStatus::All => "ALL",
            DetailStatus::Success => "SUCCESS",
            DetailStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for DetailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(DetailStatus::All),
            "SUCCESS" => Ok(DetailStatus::Success),
            "FAIL" => Ok(DetailStatus::Fail),
            other => Err(format!("unknown detail status {:?}", other)),
        }
    }
}

/// Paging and filtering for a batch query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchQuery {
    pub need_query_detail: bool,
    pub offset: u32,
    pub limit: u32,
    pub detail_status: DetailStatus,
}

impl Default for BatchQuery {
    fn default() -> Self {
        Self {
            need_query_detail: true,
            offset: 0,
            limit: 20,
            detail_status: DetailStatus::All,
        }
    }
}

/// Response to a batch query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRecord {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub transfer_batch: TransferBatch,
    pub transfer_detail_list: Vec<DetailSummary>,
}

/// Batch-level state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferBatch {
    pub mchid: String,
    pub out_batch_no: String,
    pub batch_id: String,
    pub appid: Option<String>,
    /// `WAIT_PAY`, `ACCEPTED`, `PROCESSING`, `FINISHED` or `CLOSED`.
    pub batch_status: String,
    pub batch_type: Option<String>,
    pub batch_name: Option<String>,
    pub batch_remark: Option<String>,
    pub close_reason: Option<String>,
    pub total_amount: Option<u64>,
    pub total_num: Option<u32>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    pub success_amount: Option<u64>,
    pub success_num: Option<u32>,
    pub fail_amount: Option<u64>,
    pub fail_num: Option<u32>,
    pub transfer_scene_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSummary {
    pub detail_id: String,
    pub out_detail_no: String,
    /// `INIT`, `WAIT_PAY`, `PROCESSING`, `SUCCESS` or `FAIL`.
    pub detail_status: String,
}

// ---------------------------------------------------------------------------
// Query detail
// ---------------------------------------------------------------------------

/// One transfer detail, as returned by the detail endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferDetail {
    pub mchid: String,
    pub out_batch_no: String,
    pub batch_id: String,
    pub appid: Option<String>,
    pub out_detail_no: String,
    pub detail_id: String,
    pub detail_status: String,
    pub transfer_amount: Option<u64>,
    pub transfer_remark: Option<String>,
    pub fail_reason: Option<String>,
    pub openid: Option<String>,
    pub user_name: Option<String>,
    pub initiate_time: Option<String>,
    pub update_time: Option<String>,
}
