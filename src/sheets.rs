//! Google Sheets access for the journal spreadsheet.
//!
//! Only three operations are needed: append a row, read every row, and write
//! one cell. The spreadsheet is located once (by id, or by exact name through
//! the Drive files search) and the result is reused for the life of the
//! process.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::entry::cell_name;
use crate::error::{JournalError, Result};
use crate::google_auth::{GoogleCredentials, TokenProvider};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// A single tab of a spreadsheet, addressed with 1-based rows and columns.
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Append `cells` as a new row after the last non-empty row.
    async fn append_row(&self, cells: &[String]) -> Result<()>;

    /// Every row, header included. Trailing empty cells may be missing.
    async fn get_all_values(&self) -> Result<Vec<Vec<String>>>;

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()>;
}

/// How the spreadsheet is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetLocator {
    Id(String),
    Name(String),
}

impl SpreadsheetLocator {
    pub fn from_config(config: &Config) -> Self {
        match &config.spreadsheet_id {
            Some(id) => SpreadsheetLocator::Id(id.clone()),
            None => SpreadsheetLocator::Name(config.spreadsheet_name.clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct ResolvedSheet {
    spreadsheet_id: String,
    title: String,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

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
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Escape a value for a single-quoted Drive query literal.
fn drive_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// A1 sheet prefix: `'Hoja 1'`, with embedded quotes doubled.
fn quoted_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn worksheet_title(meta: SpreadsheetMeta, index: usize) -> Result<String> {
    meta.sheets
        .into_iter()
        .nth(index)
        .map(|s| s.properties.title)
        .ok_or(JournalError::WorksheetNotFound(index))
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(JournalError::from_api_body(status.as_u16(), &body))
}

pub struct GoogleWorksheet {
    http: reqwest::Client,
    tokens: TokenProvider,
    locator: SpreadsheetLocator,
    worksheet_index: usize,
    sheets_api: String,
    drive_api: String,
    resolved: OnceCell<ResolvedSheet>,
}

impl GoogleWorksheet {
    pub fn new(
        credentials: GoogleCredentials,
        locator: SpreadsheetLocator,
        worksheet_index: usize,
    ) -> Self {
        let http = reqwest::Client::new();
        Self {
            tokens: TokenProvider::new(http.clone(), credentials),
            http,
            locator,
            worksheet_index,
            sheets_api: SHEETS_API.to_string(),
            drive_api: DRIVE_API.to_string(),
            resolved: OnceCell::new(),
        }
    }

    /// Build the worksheet handle described by `config`. No network call is
    /// made until the first operation.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials = GoogleCredentials::from_json(&config.credentials_json()?)?;
        Ok(Self::new(
            credentials,
            SpreadsheetLocator::from_config(config),
            config.worksheet_index,
        ))
    }

    async fn resolved(&self) -> Result<&ResolvedSheet> {
        self.resolved.get_or_try_init(|| self.resolve()).await
    }

    async fn resolve(&self) -> Result<ResolvedSheet> {
        let spreadsheet_id = match &self.locator {
            SpreadsheetLocator::Id(id) => id.clone(),
            SpreadsheetLocator::Name(name) => self.find_by_name(name).await?,
        };

        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/spreadsheets/{}", self.sheets_api, spreadsheet_id))
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties(sheetId,title,index)")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(resp).await?.json().await?;
        let title = worksheet_title(meta, self.worksheet_index)?;

        log::info!("Connected to worksheet '{}'", title);
        Ok(ResolvedSheet {
            spreadsheet_id,
            title,
        })
    }

    async fn find_by_name(&self, name: &str) -> Result<String> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            drive_query_literal(name),
            SPREADSHEET_MIME
        );
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/files", self.drive_api))
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: DriveFileList = check(resp).await?.json().await?;
        list.files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| JournalError::SpreadsheetNotFound(name.to_string()))
    }

    fn values_url(&self, sheet: &ResolvedSheet, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.sheets_api,
            sheet.spreadsheet_id,
            urlencoding::encode(range)
        )
    }
}

#[async_trait]
impl Worksheet for GoogleWorksheet {
    async fn append_row(&self, cells: &[String]) -> Result<()> {
        let sheet = self.resolved().await?;
        let token = self.tokens.access_token().await?;
        let url = format!("{}:append", self.values_url(sheet, &quoted_title(&sheet.title)));
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&serde_json::json!({ "values": [cells] }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        let sheet = self.resolved().await?;
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(self.values_url(sheet, &quoted_title(&sheet.title)))
            .bearer_auth(token)
            .send()
            .await?;
        let range: ValueRange = check(resp).await?.json().await?;
        Ok(range.values)
    }

    async fn update_cell(&self, row: usize, col: usize, value: &str) -> Result<()> {
        let sheet = self.resolved().await?;
        let token = self.tokens.access_token().await?;
        let range = format!("{}!{}", quoted_title(&sheet.title), cell_name(row, col));
        let resp = self
            .http
            .put(self.values_url(sheet, &range))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&serde_json::json!({ "values": [[value]] }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}
