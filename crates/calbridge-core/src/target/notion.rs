//! Notion API client: one database, one page per source event.
//!
//! Pages carry the event as properties (`Name` title, `Due` date,
//! `Last Modify` date, `UID` rich text) and the description as the first
//! paragraph block, followed by a divider that fences off anything the
//! user adds below. Deleting archives the page; Notion has no hard
//! delete over the API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::TargetStore;
use crate::error::TargetError;
use crate::model::SourceEvent;

const NOTION_API_BASE: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";

/// Written as the first block when the feed event has no description, so
/// the block the sync owns is always present and addressable.
const PLACEHOLDER_DESCRIPTION: &str = "Auto-generated by the calbridge sync service.\n\
Use blocks below the divider only.\n\
Do NOT edit or delete this block.";

/// Client for the Notion pages/databases API.
pub struct NotionClient {
    http_client: Client,
    base_url: String,
    api_token: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(api_token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: NOTION_API_BASE.to_string(),
            api_token: api_token.into(),
            database_id: database_id.into(),
        }
    }

    /// Point the client at a different API host. Used by mock-server
    /// tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_token)
            .header("Notion-Version", NOTION_VERSION)
    }

    /// Turn a response into its JSON body, mapping non-2xx to
    /// [`TargetError::Api`].
    async fn into_json(resp: reqwest::Response) -> Result<Value, TargetError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TargetError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    /// Sync the description into the page's first paragraph block,
    /// skipping the PATCH when the content already matches.
    async fn update_description(
        &self,
        target_ref: &str,
        description: &str,
    ) -> Result<(), TargetError> {
        let desired = if description.is_empty() {
            PLACEHOLDER_DESCRIPTION
        } else {
            description
        };

        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/v1/blocks/{target_ref}/children"),
            )
            .send()
            .await?;
        let blocks = Self::into_json(resp).await?;

        let first = blocks["results"]
            .as_array()
            .and_then(|r| r.first())
            .ok_or_else(|| {
                TargetError::UnexpectedResponse("page has no blocks".to_string())
            })?;
        let block_id = first["id"]
            .as_str()
            .ok_or_else(|| TargetError::UnexpectedResponse("block without id".to_string()))?;

        let current = first["paragraph"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap_or_default();
        if current == desired {
            return Ok(());
        }

        let resp = self
            .request(reqwest::Method::PATCH, &format!("/v1/blocks/{block_id}"))
            .json(&json!({ "paragraph": { "rich_text": rich_text(desired) } }))
            .send()
            .await?;
        Self::into_json(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetStore for NotionClient {
    async fn create(&self, event: &SourceEvent) -> Result<String, TargetError> {
        let body = json!({
            "parent": {
                "type": "database_id",
                "database_id": self.database_id,
            },
            "properties": page_properties(event),
            "children": page_children(&event.description),
        });

        let resp = self
            .request(reqwest::Method::POST, "/v1/pages")
            .json(&body)
            .send()
            .await?;
        let page = Self::into_json(resp).await?;

        page["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| TargetError::UnexpectedResponse("missing page id".to_string()))
    }

    async fn update(&self, target_ref: &str, event: &SourceEvent) -> Result<(), TargetError> {
        let resp = self
            .request(reqwest::Method::PATCH, &format!("/v1/pages/{target_ref}"))
            .json(&json!({ "properties": page_properties(event) }))
            .send()
            .await?;
        Self::into_json(resp).await?;

        self.update_description(target_ref, &event.description).await
    }

    async fn delete(&self, target_ref: &str) -> Result<(), TargetError> {
        let resp = self
            .request(reqwest::Method::PATCH, &format!("/v1/pages/{target_ref}"))
            .json(&json!({ "archived": true }))
            .send()
            .await?;
        Self::into_json(resp).await?;
        Ok(())
    }

    async fn find_by_source_id(&self, source_id: &str) -> Result<Option<String>, TargetError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/v1/databases/{}/query", self.database_id),
            )
            .json(&uid_filter(source_id))
            .send()
            .await?;
        let results = Self::into_json(resp).await?;

        Ok(results["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|page| page["id"].as_str())
            .map(|s| s.to_string()))
    }
}

/// Notion rich-text array for a plain string.
fn rich_text(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

/// Property payload shared by create and update.
fn page_properties(event: &SourceEvent) -> Value {
    json!({
        "Name": {
            "type": "title",
            "title": rich_text(&event.title),
        },
        "Due": {
            "type": "date",
            "date": { "start": event.start.format("%Y-%m-%d").to_string() },
        },
        "Last Modify": {
            "type": "date",
            "date": { "start": event.modified_at.to_rfc3339() },
        },
        "UID": {
            "rich_text": rich_text(&event.id),
        },
    })
}

/// Initial page body: the owned description block plus the divider.
fn page_children(description: &str) -> Value {
    let first_block = if description.is_empty() {
        PLACEHOLDER_DESCRIPTION
    } else {
        description
    };

    json!([
        {
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text(first_block) },
        },
        {
            "type": "divider",
            "divider": {},
        },
    ])
}

/// Database query filter matching a page by its UID property.
fn uid_filter(source_id: &str) -> Value {
    json!({
        "filter": {
            "property": "UID",
            "rich_text": { "equals": source_id },
        }
    })
}
