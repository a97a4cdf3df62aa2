//! Google Sheets v4 values client.

use serde::Deserialize;
use tender_core::CellValue;

use crate::auth::Credential;
use crate::error::SheetsError;

/// Raw table: rows of cells, header first.
pub type Table = Vec<Vec<CellValue>>;

/// Reads a named range from a spreadsheet.
#[async_trait::async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetch every row of `range`.
    ///
    /// Returns `Ok(None)` when the range holds no rows.
    async fn fetch_range(
        &self,
        credential: &Credential,
        sheet_id: &str,
        range: &str,
    ) -> Result<Option<Table>, SheetsError>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Table>,
}

/// `GET {base}/v4/spreadsheets/{id}/values/{range}` over reqwest.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    base_url: String,
    client: reqwest::Client,
}

impl GoogleSheetsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn values_url(&self, sheet_id: &str, range: &str) -> Result<url::Url, SheetsError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| SheetsError::Config(format!("invalid Sheets API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Config(format!("Sheets API base URL cannot hold a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", sheet_id, "values", range]);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl SheetSource for GoogleSheetsClient {
    async fn fetch_range(
        &self,
        credential: &Credential,
        sheet_id: &str,
        range: &str,
    ) -> Result<Option<Table>, SheetsError> {
        let url = self.values_url(sheet_id, range)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(credential.access_token())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SheetsError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value_range: ValueRange = response.json().await?;
        match value_range.values {
            Some(rows) if !rows.is_empty() => {
                tracing::debug!(sheet_id, range, rows = rows.len(), "Fetched sheet range");
                Ok(Some(rows))
            }
            _ => {
                tracing::warn!(sheet_id, range, "No data found");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};

    async fn values(
        Path((sheet_id, range)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer tok") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        match (sheet_id.as_str(), range.as_str()) {
            ("tenders", "Tender Sheet") => Ok(Json(serde_json::json!({
                "range": "Tender!A1:J2",
                "majorDimension": "ROWS",
                "values": [["name", "location"], ["TenderA", "Pune,Maharashtra", "desc", "", "", "", 100]],
            }))),
            ("empty", _) => Ok(Json(serde_json::json!({ "range": "User!A1:J1" }))),
            _ => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn spawn_sheets_api() -> String {
        let app = Router::new().route("/v4/spreadsheets/{sheet_id}/values/{range}", get(values));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn values_url_encodes_range() {
        let client = GoogleSheetsClient::new("https://sheets.googleapis.com/");
        let url = client.values_url("abc", "Tender!A1:J").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Tender!A1:J"
        );
        let url = client.values_url("abc", "My Range").unwrap();
        assert!(url.as_str().ends_with("/values/My%20Range"));
    }

    #[test]
    fn bad_base_url_is_config_error() {
        let client = GoogleSheetsClient::new("not a url");
        assert!(matches!(client.values_url("a", "b"), Err(SheetsError::Config(_))));
    }

    #[tokio::test]
    async fn fetch_range_returns_rows() {
        let client = GoogleSheetsClient::new(spawn_sheets_api().await);
        let rows = client
            .fetch_range(&Credential::new("tok"), "tenders", "Tender Sheet")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], CellValue::Text("TenderA".into()));
        assert_eq!(rows[1][6].to_string(), "100");
    }

    #[tokio::test]
    async fn fetch_range_without_values_is_none() {
        let client = GoogleSheetsClient::new(spawn_sheets_api().await);
        let rows = client
            .fetch_range(&Credential::new("tok"), "empty", "User")
            .await
            .unwrap();
        assert!(rows.is_none());
    }

    #[tokio::test]
    async fn fetch_range_surfaces_http_status() {
        let client = GoogleSheetsClient::new(spawn_sheets_api().await);
        match client
            .fetch_range(&Credential::new("wrong"), "tenders", "Tender Sheet")
            .await
            .unwrap_err()
        {
            SheetsError::Status { status, .. } => assert_eq!(status, 401),
            other => panic!("expected Status error, got: {other:?}"),
        }
    }
}
