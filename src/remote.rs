//! Wire contract with the remote sheet-backed endpoint.
//!
//! Reads are one GET returning the full dataset; writes are POSTs carrying
//! an `action` discriminator. The endpoint answers every write with a
//! `{status, message}` envelope and HTTP 200, so only the envelope decides
//! success.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::images::ImagePayload;
use crate::model::{Booking, BorrowSession, ItemReturnDetail, ReturnedCondition, TransferLog};

// ── Requests ─────────────────────────────────────────────────────

/// One write to the remote. Serializes to the POST body, `action` first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum Request {
    #[serde(rename = "bookVenue")]
    BookVenue {
        #[serde(flatten)]
        booking: Booking,
    },
    #[serde(rename = "cancelBooking", rename_all = "camelCase")]
    CancelBooking {
        id: String,
        password: String,
        dates_to_remove: Vec<NaiveDate>,
    },
    #[serde(rename = "borrowResource")]
    BorrowItems {
        #[serde(flatten)]
        session: BorrowSession,
    },
    #[serde(rename = "transferResource", rename_all = "camelCase")]
    TransferItems {
        session_id: String,
        from: String,
        to: String,
        time: String,
    },
    #[serde(rename = "returnResource", rename_all = "camelCase")]
    ReturnItems {
        session_id: String,
        returner: String,
        return_time: String,
        item_details: BTreeMap<String, ReturnedCondition>,
        notes: String,
        images: Vec<ImagePayload>,
    },
    #[serde(rename = "uploadImage")]
    UploadImage {
        #[serde(flatten)]
        image: ImagePayload,
    },
}

impl Request {
    /// Short label for logs and metrics.
    pub fn op(&self) -> &'static str {
        match self {
            Request::BookVenue { .. } => "book_venue",
            Request::CancelBooking { .. } => "cancel_booking",
            Request::BorrowItems { .. } => "borrow_items",
            Request::TransferItems { .. } => "transfer_items",
            Request::ReturnItems { .. } => "return_items",
            Request::UploadImage { .. } => "upload_image",
        }
    }
}

/// Write acknowledgement envelope. Always HTTP 200; `status` carries the
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success {
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

// ── Raw dataset ──────────────────────────────────────────────────

/// Full-dataset read, as the remote sends it. Field values come out of
/// spreadsheet rows, so dates and times arrive in whatever shape the sheet
/// last wrote; `normalize` turns this into an `AppState`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDataset {
    #[serde(default)]
    pub venues: Vec<RawBooking>,
    #[serde(default)]
    pub resource_sessions: Vec<RawSession>,
    #[serde(default)]
    pub resource_history: Vec<RawHistory>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBooking {
    pub id: String,
    pub venue: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub applicant: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub car_model: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub excluded_dates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    pub id: String,
    pub items: Vec<String>,
    pub borrower: String,
    #[serde(default)]
    pub dept: String,
    #[serde(default)]
    pub borrow_time: String,
    #[serde(default)]
    pub transfer_logs: Vec<TransferLog>,
    #[serde(default)]
    pub returned_items: BTreeMap<String, ItemReturnDetail>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistory {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub borrower: String,
    #[serde(default)]
    pub borrow_time: String,
    #[serde(default)]
    pub returner: String,
    #[serde(default)]
    pub return_time: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub transfer_logs: Vec<TransferLog>,
    /// Per-item conditions as a JSON blob in one sheet cell. May be absent
    /// or malformed on old rows.
    #[serde(default, rename = "status_json")]
    pub status_json: Option<String>,
}

// ── Transport ────────────────────────────────────────────────────

/// The remote endpoint, seam for tests.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// GET the full dataset.
    async fn fetch_all(&self) -> Result<RawDataset, EngineError>;

    /// POST one write; `Ok` iff the envelope says success.
    async fn execute(&self, request: Request) -> Result<(), EngineError>;
}

pub struct HttpRemote {
    client: reqwest::Client,
    url: String,
}

impl HttpRemote {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn fetch_all(&self) -> Result<RawDataset, EngineError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| EngineError::Remote(e.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Remote(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| EngineError::Parse(e.to_string()))
    }

    async fn execute(&self, request: Request) -> Result<(), EngineError> {
        let body =
            serde_json::to_string(&request).map_err(|e| EngineError::Parse(e.to_string()))?;
        let response = self
            .client
            .post(&self.url)
            // text/plain sidesteps the endpoint's CORS preflight handling.
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::Remote(e.to_string()))?;
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Remote(e.to_string()))?;
        let envelope: Response =
            serde_json::from_str(&text).map_err(|e| EngineError::Parse(e.to_string()))?;
        match envelope {
            Response::Success { .. } => Ok(()),
            Response::Error { message } => Err(EngineError::Remote(
                message.unwrap_or_else(|| "unspecified remote error".into()),
            )),
        }
    }
}
