//! # sheets — Spreadsheet port and Google Sheets v4 adapter
//!
//! | Call           | REST                                              |
//! |----------------|---------------------------------------------------|
//! | `read_range`   | `GET  /v4/spreadsheets/{id}/values/{range}`       |
//! | `batch_update` | `POST /v4/spreadsheets/{id}/values:batchUpdate`   |
//! | `update_cell`  | `PUT  /v4/spreadsheets/{id}/values/{range}`       |
//!
//! All writes use `USER_ENTERED`, so numbers typed as text become numbers.
//! Authentication is a bearer token obtained out of band.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SyncError;
use crate::fetch::ensure_success;
use crate::models::CellUpdate;

pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com";

#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Rows of display strings; trailing empty cells and rows are absent.
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError>;

    /// Write many single cells in one request. Returns cells updated.
    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<usize, SyncError>;

    async fn update_cell(&self, update: &CellUpdate) -> Result<(), SyncError>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateResponse {
    #[serde(default)]
    total_updated_cells: usize,
}

#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    client:         reqwest::Client,
    base_url:       String,
    spreadsheet_id: String,
    access_token:   String,
}

impl GoogleSheetsClient {
    pub fn new(
        base_url: Option<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token:   access_token.into(),
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/v4/spreadsheets/{}", self.base_url, self.spreadsheet_id)
    }

    /// `…/values/{range}` with the range percent-encoded as one segment.
    fn values_url(&self, range: &str) -> Result<Url, SyncError> {
        let mut url = Url::parse(&format!("{}/values", self.spreadsheet_url()))
            .map_err(|e| SyncError::Parse(format!("Bad Sheets URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Parse("Sheets URL cannot take a path".into()))?
            .push(range);
        Ok(url)
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, SyncError> {
        debug!(range, "Sheets read");
        let response = self
            .client
            .get(self.values_url(range)?)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let body: ValueRange = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("Sheets values response: {e}")))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<usize, SyncError> {
        debug!(cells = updates.len(), "Sheets batch write");
        let data: Vec<Value> = updates
            .iter()
            .map(|u| json!({ "range": u.cell, "values": [[u.value]] }))
            .collect();

        let response = self
            .client
            .post(format!("{}/values:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(&self.access_token)
            .json(&json!({ "valueInputOption": "USER_ENTERED", "data": data }))
            .send()
            .await?;
        let body: BatchUpdateResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::Parse(format!("Sheets batchUpdate response: {e}")))?;
        Ok(body.total_updated_cells)
    }

    async fn update_cell(&self, update: &CellUpdate) -> Result<(), SyncError> {
        debug!(cell = %update.cell, "Sheets single-cell write");
        let response = self
            .client
            .put(self.values_url(&update.cell)?)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .bearer_auth(&self.access_token)
            .json(&json!({ "range": update.cell, "values": [[update.value]] }))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
