//! JSON-over-HTTP sink client
//!
//! Every call is a `POST {server}/{endpoint}` with a JSON body:
//!
//! | endpoint          | request                                   | response                       |
//! |-------------------|-------------------------------------------|--------------------------------|
//! | `/has/table`      | `table_name`                              | `table_exists`                 |
//! | `/show/table`     | `table_name`                              | `columns`                      |
//! | `/create/table`   | `table_name`, `columns`, `options`        | any JSON                       |
//! | `/insert/records` | `table_name`, `records`, `options`        | `count_inserted`, `count_updated` |
//!
//! Non-2xx answers become [`SinkError::Rejected`] carrying the server's
//! `message` field when there is one.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{CreateTableOptions, InsertOptions, InsertResponse, Sink};
use crate::error::SinkError;
use crate::record::TypedRecord;
use crate::schema::{ColumnDefinition, SchemaDefinition};

#[derive(Serialize)]
struct TableRequest<'a> {
    table_name: &'a str,
}

#[derive(Deserialize)]
struct HasTableResponse {
    table_exists: bool,
}

#[derive(Deserialize)]
struct ShowTableResponse {
    columns: Vec<ColumnDefinition>,
}

#[derive(Serialize)]
struct CreateTableRequest<'a> {
    table_name: &'a str,
    columns: &'a [ColumnDefinition],
    options: &'a CreateTableOptions,
}

#[derive(Serialize)]
struct InsertRecordsRequest<'a> {
    table_name: &'a str,
    records: &'a [TypedRecord],
    options: &'a InsertOptions,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Sink reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl HttpSink {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Authenticate every request with HTTP basic auth
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, SinkError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.client.post(&url).json(body);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), "Sink responded");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| SinkError::InvalidResponse(format!("{} from {}", e, endpoint)))
    }
}

#[async_trait]
impl Sink for HttpSink {
    #[instrument(skip(self))]
    async fn has_table(&self, table: &str) -> Result<bool, SinkError> {
        let response: HasTableResponse = self
            .post("/has/table", &TableRequest { table_name: table })
            .await?;
        Ok(response.table_exists)
    }

    #[instrument(skip(self))]
    async fn table_schema(&self, table: &str) -> Result<SchemaDefinition, SinkError> {
        let response: ShowTableResponse = self
            .post("/show/table", &TableRequest { table_name: table })
            .await
            .map_err(|e| match e {
                SinkError::Rejected { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
                    SinkError::TableNotFound(table.to_string())
                },
                other => other,
            })?;
        Ok(SchemaDefinition::new(response.columns))
    }

    #[instrument(skip(self, schema))]
    async fn create_table(
        &self,
        table: &str,
        schema: &SchemaDefinition,
        options: &CreateTableOptions,
    ) -> Result<(), SinkError> {
        let _: serde_json::Value = self
            .post(
                "/create/table",
                &CreateTableRequest {
                    table_name: table,
                    columns: schema.columns(),
                    options,
                },
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn insert_records(
        &self,
        table: &str,
        records: &[TypedRecord],
        options: &InsertOptions,
    ) -> Result<InsertResponse, SinkError> {
        self.post(
            "/insert/records",
            &InsertRecordsRequest {
                table_name: table,
                records,
                options,
            },
        )
        .await
    }
}
