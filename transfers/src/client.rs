//! # Transfer Client
//!
//! Thin typed wrapper over the batch-transfer endpoints. Every call goes
//! through the shared [`AuthenticatedDispatcher`] with response verification
//! on: a transfer result nobody can prove came from the platform is worth
//! nothing.

use std::sync::Arc;

use thiserror::Error;
use url::form_urlencoded;

use wepay_protocol::{AuthenticatedDispatcher, ClientError, Method};

use crate::types::{BatchCreated, BatchQuery, BatchRecord, TransferBatchRequest, TransferDetail};

pub const BATCHES_PATH: &str = "/v3/transfer/batches";

/// Errors from the transfer client.
#[derive(Debug, Error)]
pub enum TransferError {
    /// An id that would be spliced into the request path is empty or would
    /// change the path's shape.
    #[error("invalid {field}: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub type Result<T> = std::result::Result<T, TransferError>;

/// Batch-transfer operations for one merchant.
#[derive(Debug, Clone)]
pub struct TransferClient {
    dispatcher: Arc<AuthenticatedDispatcher>,
}

impl TransferClient {
    pub fn new(dispatcher: Arc<AuthenticatedDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &AuthenticatedDispatcher {
        &self.dispatcher
    }

    /// Start a batch. An empty `appid` is filled from the credential.
    pub async fn create_batch(&self, batch: &TransferBatchRequest) -> Result<BatchCreated> {
        let mut batch = batch.clone();
        if batch.appid.is_empty() {
            if let Some(appid) = self.dispatcher.credential().appid() {
                batch.appid = appid.to_string();
            }
        }

        tracing::info!(
            out_batch_no = %batch.out_batch_no,
            total_num = batch.total_num,
            total_amount = batch.total_amount,
            "creating transfer batch"
        );
        let response = self
            .dispatcher
            .call_json(Method::POST, BATCHES_PATH, &batch, true)
            .await?;
        Ok(response.json()?)
    }

    /// Query a batch by platform batch id.
    pub async fn query_by_batch_id(&self, batch_id: &str, query: &BatchQuery) -> Result<BatchRecord> {
        let path = batch_path("batch-id", "batch_id", batch_id, query)?;
        self.get(&path).await
    }

    /// Query a batch by merchant batch number.
    pub async fn query_by_out_batch_no(
        &self,
        out_batch_no: &str,
        query: &BatchQuery,
    ) -> Result<BatchRecord> {
        let path = batch_path("out-batch-no", "out_batch_no", out_batch_no, query)?;
        self.get(&path).await
    }

    /// One detail, by platform ids.
    pub async fn detail_by_batch_id(&self, batch_id: &str, detail_id: &str) -> Result<TransferDetail> {
        let path = format!(
            "{}/batch-id/{}/details/detail-id/{}",
            BATCHES_PATH,
            segment("batch_id", batch_id)?,
            segment("detail_id", detail_id)?
        );
        self.get(&path).await
    }

    /// One detail, by merchant numbers.
    pub async fn detail_by_out_batch_no(
        &self,
        out_batch_no: &str,
        out_detail_no: &str,
    ) -> Result<TransferDetail> {
        let path = format!(
            "{}/out-batch-no/{}/details/out-detail-no/{}",
            BATCHES_PATH,
            segment("out_batch_no", out_batch_no)?,
            segment("out_detail_no", out_detail_no)?
        );
        self.get(&path).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.dispatcher.call(Method::GET, path, "", true).await?;
        Ok(response.json()?)
    }
}

fn batch_path(kind: &str, field: &'static str, id: &str, query: &BatchQuery) -> Result<String> {
    Ok(format!(
        "{}/{}/{}?{}",
        BATCHES_PATH,
        kind,
        segment(field, id)?,
        query_string(query)
    ))
}

/// `limit`, `offset`, `detail_status`, `need_query_detail`, in that order.
pub fn query_string(query: &BatchQuery) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("limit", &query.limit.to_string())
        .append_pair("offset", &query.offset.to_string())
        .append_pair("detail_status", query.detail_status.as_str())
        .append_pair(
            "need_query_detail",
            if query.need_query_detail { "true" } else { "false" },
        )
        .finish()
}

/// Identifiers are alphanumeric on the platform. Anything that would add a
/// path segment or start a query is refused rather than escaped, since the
/// signed path must match the one the platform sees.
fn segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let ok = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if ok {
        Ok(value)
    } else {
        Err(TransferError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}
