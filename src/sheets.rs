#![cfg(feature = "web")]
//! Worksheet backend talking to the Google Sheets v4 REST API.
//!
//! Authentication uses a service account (`gcp_auth`); every call fetches a
//! cached bearer token and issues one HTTP request with `reqwest`.

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use log::{error, info, warn};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FicoreError, Result};
use crate::store::TableStore;
use crate::worksheet::column_letter;

const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// Initial row count of a freshly created worksheet
const NEW_SHEET_ROWS: usize = 100;

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsStore {
    http: reqwest::Client,
    spreadsheet_id: String,
    auth: Arc<CustomServiceAccount>,
}

impl SheetsStore {
    /// Connect to a spreadsheet, retrying transient failures with exponential backoff
    ///
    /// Malformed credentials and API error responses are not retried.
    pub async fn connect(credentials_json: &str, spreadsheet_id: &str) -> Result<Self> {
        const MAX_RETRIES: u32 = 3;
        const BACKOFF_FACTOR: u64 = 2;

        let auth = CustomServiceAccount::from_json(credentials_json).map_err(|e| {
            FicoreError::Auth(format!("Invalid GOOGLE_CREDENTIALS_JSON format: {}", e))
        })?;
        let store = SheetsStore {
            http: reqwest::Client::builder().build()?,
            spreadsheet_id: spreadsheet_id.to_string(),
            auth: Arc::new(auth),
        };

        let mut attempt = 0;
        loop {
            match store.sheet_properties().await {
                Ok(sheets) => {
                    info!(
                        "Successfully initialized Google Sheets ({} worksheets)",
                        sheets.len()
                    );
                    return Ok(store);
                }
                Err(e @ FicoreError::SheetsApi { .. }) => {
                    error!("Google Sheets API error: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        error!("Max retries exceeded");
                        return Err(e);
                    }
                    warn!("Attempt {} failed: {}", attempt, e);
                    tokio::time::sleep(Duration::from_secs(BACKOFF_FACTOR.pow(attempt - 1)))
                        .await;
                }
            }
        }
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.auth.token(SHEETS_SCOPES).await?;
        Ok(self.http.request(method, url).bearer_auth(token.as_str()))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FicoreError::SheetsApi {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            SHEETS_ENDPOINT,
            self.spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    async fn sheet_properties(&self) -> Result<Vec<SheetProperties>> {
        let url = format!(
            "{}/{}?fields=sheets.properties",
            SHEETS_ENDPOINT, self.spreadsheet_id
        );
        let body = self.send(self.request(Method::GET, &url).await?).await?;
        let meta: SpreadsheetMeta = serde_json::from_value(body)?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn sheet_id(&self, sheet: &str) -> Result<i64> {
        self.sheet_properties()
            .await?
            .into_iter()
            .find(|p| p.title == sheet)
            .map(|p| p.sheet_id)
            .ok_or_else(|| FicoreError::Store(format!("Worksheet {} not found", sheet)))
    }

    async fn batch_update(&self, requests: Value) -> Result<Value> {
        let url = format!("{}/{}:batchUpdate", SHEETS_ENDPOINT, self.spreadsheet_id);
        let builder = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "requests": requests }));
        self.send(builder).await
    }
}

fn quoted(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableStore for SheetsStore {
    async fn rows(&self, sheet: &str) -> Result<Option<Vec<Vec<String>>>> {
        if !self.sheet_properties().await?.iter().any(|p| p.title == sheet) {
            return Ok(None);
        }
        let url = self.values_url(&quoted(sheet), "");
        let body = self.send(self.request(Method::GET, &url).await?).await?;
        let range: ValueRange = serde_json::from_value(body)?;
        Ok(Some(
            range
                .values
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
        ))
    }

    async fn create_sheet(&self, sheet: &str, headers: &[&str]) -> Result<()> {
        self.batch_update(json!([{
            "addSheet": {
                "properties": {
                    "title": sheet,
                    "gridProperties": {
                        "rowCount": NEW_SHEET_ROWS,
                        "columnCount": headers.len(),
                    }
                }
            }
        }]))
        .await?;
        self.append_row(sheet, headers.iter().map(|h| h.to_string()).collect())
            .await
    }

    async fn clear(&self, sheet: &str) -> Result<()> {
        let url = self.values_url(&quoted(sheet), ":clear");
        let builder = self.request(Method::POST, &url).await?.json(&json!({}));
        self.send(builder).await?;
        Ok(())
    }

    async fn update_row(&self, sheet: &str, row: usize, values: Vec<String>) -> Result<()> {
        let range = format!(
            "{}!A{}:{}{}",
            quoted(sheet),
            row,
            column_letter(values.len()),
            row
        );
        let url = self.values_url(&range, "?valueInputOption=RAW");
        let builder = self
            .request(Method::PUT, &url)
            .await?
            .json(&json!({ "range": range, "values": [values] }));
        self.send(builder).await?;
        Ok(())
    }

    async fn append_row(&self, sheet: &str, values: Vec<String>) -> Result<()> {
        let range = format!("{}!A1", quoted(sheet));
        let url = self.values_url(
            &range,
            ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        );
        let builder = self
            .request(Method::POST, &url)
            .await?
            .json(&json!({ "values": [values] }));
        self.send(builder).await?;
        Ok(())
    }

    async fn delete_row(&self, sheet: &str, row: usize) -> Result<()> {
        if row == 0 {
            return Err(FicoreError::Store(format!("Row 0 out of range in {}", sheet)));
        }
        let sheet_id = self.sheet_id(sheet).await?;
        self.batch_update(json!([{
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": row - 1,
                    "endIndex": row,
                }
            }
        }]))
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_names_are_quoted() {
        assert_eq!(quoted("BudgetSheet"), "'BudgetSheet'");
        assert_eq!(quoted("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_cells_become_text() {
        assert_eq!(cell_text(&json!("abc")), "abc");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_value_range_without_values() {
        let range: ValueRange = serde_json::from_value(json!({ "range": "A1:B2" })).unwrap();
        assert!(range.values.is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials_fail_fast() {
        let result = SheetsStore::connect("not json", "sheet").await;
        assert!(matches!(result, Err(FicoreError::Auth(_))));
    }
}
