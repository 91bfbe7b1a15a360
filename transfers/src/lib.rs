//! # WePay v3 Batch Transfers
//!
//! Merchant-to-user batch transfers on top of the authenticated dispatcher
//! from `wepay-protocol`:
//!
//! - **Create** a batch of up to a thousand payee lines.
//! - **Query** a batch by platform batch id or merchant batch number, with
//!   paging over its details.
//! - **Detail** lookup for a single payee line, by either pair of ids.
//!
//! Every response is signature-verified before it is decoded.

pub mod client;
pub mod types;

pub use client::{TransferClient, TransferError};
pub use types::{
    BatchCreated, BatchQuery, BatchRecord, DetailStatus, DetailSummary, TransferBatch,
    TransferBatchRequest, TransferDetail, TransferDetailInput,
};
