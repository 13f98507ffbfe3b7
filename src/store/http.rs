//! HTTP-backed list store.
//!
//! Speaks a small JSON protocol: the rendered view document goes up in the
//! request body, one page of records and the continuation token come back.
//! Store-side rejections arrive as a fault body and are surfaced as
//! received; this layer never retries.

use crate::core::{Cursor, FetchError, Page, Record, Result, StoreFault};
use crate::query::Element;
use crate::store::ListStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn list_url(&self, list: &str, tail: &str) -> String {
        format!("{}/lists/{}/items{}", self.base_url, list, tail)
    }
}

#[derive(Serialize)]
struct QueryBody<'a> {
    view: String,
    cursor: Option<&'a str>,
}

#[derive(Deserialize)]
struct PageBody {
    records: Vec<JsonValue>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
}

/// Decode a non-success response: a well-formed fault body is carried as
/// received, anything else degrades to a transport error.
async fn decode_failure(response: reqwest::Response) -> FetchError {
    let status = response.status();
    match response.json::<StoreFault>().await {
        Ok(fault) => FetchError::Remote(fault),
        Err(_) => FetchError::Transport(format!("store returned HTTP {}", status)),
    }
}

#[async_trait]
impl ListStore for HttpStore {
    async fn fetch_page(
        &self,
        list: &str,
        view: &Element,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        let body = QueryBody {
            view: view.render(),
            cursor: cursor.map(Cursor::as_str),
        };
        let response = self
            .client
            .post(self.list_url(list, "/query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(decode_failure(response).await);
        }

        let page: PageBody = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Page::new(
            page.records.iter().map(Record::from_json).collect(),
            page.next_cursor.map(Cursor::new),
        ))
    }

    async fn item_by_id(&self, list: &str, id: i64) -> Result<Record> {
        let response = self
            .client
            .get(self.list_url(list, &format!("/{}", id)))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::ItemNotFound(list.to_string(), id.to_string()));
        }
        if !response.status().is_success() {
            return Err(decode_failure(response).await);
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Record::from_json(&body))
    }

    async fn item_by_unique_id(&self, list: &str, unique_id: Uuid) -> Result<Record> {
        let response = self
            .client
            .get(self.list_url(list, &format!("/unique/{}", unique_id)))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::ItemNotFound(
                list.to_string(),
                unique_id.to_string(),
            ));
        }
        if !response.status().is_success() {
            return Err(decode_failure(response).await);
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Record::from_json(&body))
    }
}
