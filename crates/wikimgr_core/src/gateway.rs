use std::thread::sleep;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ResolvedUpstream;
use crate::error::{WikiError, WikiResult};

/// Total attempts per upstream call, counting the first.
pub const MAX_ATTEMPTS: usize = 4;
/// First retry delay; doubled on every subsequent retry.
pub const INITIAL_BACKOFF_MS: u64 = 500;

const QUERY_LIST: &str = "{ pages { list(orderBy: TITLE) { id path title } } }";

const QUERY_SINGLE: &str = r#"
query One($id: Int!) {
  pages {
    single(id: $id) {
      id path title description isPrivate createdAt updatedAt
      content
    }
  }
}
"#;

// Some upstream versions expose contentRaw instead of content.
const QUERY_SINGLE_RAW: &str = r#"
query One($id: Int!) {
  pages {
    single(id: $id) {
      id path title description isPrivate createdAt updatedAt
      contentRaw
    }
  }
}
"#;

const QUERY_SEARCH: &str = r#"
query Find($q: String!) {
  pages { search(query: $q) { id path title } }
}
"#;

const MUTATION_CREATE: &str = r#"
mutation ($path: String!, $title: String!, $content: String!, $desc: String!, $isPrivate: Boolean!, $locale: String!, $tags: [String]!) {
  pages {
    create(
      path: $path,
      title: $title,
      content: $content,
      description: $desc,
      editor: "markdown",
      isPrivate: $isPrivate,
      isPublished: true,
      locale: $locale,
      tags: $tags
    ) {
      responseResult { succeeded message errorCode }
      page { id path title }
    }
  }
}
"#;

const MUTATION_UPDATE: &str = r#"
mutation ($id: Int!, $title: String!, $content: String!, $desc: String!, $isPrivate: Boolean!, $tags: [String]!) {
  pages {
    update(
      id: $id,
      title: $title,
      content: $content,
      description: $desc,
      editor: "markdown",
      isPrivate: $isPrivate,
      isPublished: true,
      tags: $tags
    ) {
      responseResult { succeeded message errorCode }
      page { id path title }
    }
  }
}
"#;

const MUTATION_DELETE: &str = r#"
mutation Del($id: Int!) {
  pages { delete(id: $id) { responseResult { succeeded } } }
}
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSummary {
    pub id: i64,
    pub path: String,
    pub title: String,
}

/// Full page record as the upstream returns it. `path` is stored in the
/// slash-stripped wire form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRecord {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub description: String,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
    pub content: String,
}

/// Write-side payload for create/update mutations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagePayload {
    pub path: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// The upstream content store, seen as a small set of page operations.
/// `GraphQlGateway` is the production implementation; tests substitute an
/// in-memory store.
pub trait PageStore {
    fn list_pages(&mut self) -> WikiResult<Vec<PageSummary>>;
    fn fetch_page(&mut self, id: i64) -> WikiResult<PageRecord>;
    fn search_pages(&mut self, term: &str) -> WikiResult<Vec<PageSummary>>;
    fn create_page(&mut self, payload: &PagePayload) -> WikiResult<PageSummary>;
    fn update_page(&mut self, id: i64, payload: &PagePayload) -> WikiResult<PageSummary>;
    /// Returns the upstream success flag. An upstream that refuses or does
    /// not support deletion yields `Ok(false)` so callers can fall back to
    /// stub-based soft deletion; transport failure still propagates.
    fn delete_page(&mut self, id: i64) -> WikiResult<bool>;
    fn request_count(&self) -> usize;
}

pub struct GraphQlGateway {
    client: Client,
    upstream: ResolvedUpstream,
    request_count: usize,
}

impl GraphQlGateway {
    pub fn new(upstream: ResolvedUpstream) -> WikiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(upstream.timeout_ms))
            .build()
            .map_err(|error| {
                WikiError::Configuration(format!("failed to build upstream HTTP client: {error}"))
            })?;
        Ok(Self {
            client,
            upstream,
            request_count: 0,
        })
    }

    pub fn locale(&self) -> &str {
        &self.upstream.locale
    }

    /// POST one GraphQL document, retrying transport errors and 5xx
    /// responses with exponential backoff. An error payload on a 200
    /// envelope is an application-level rejection and is never retried.
    fn graphql(&mut self, query: &str, variables: Value) -> WikiResult<Value> {
        let url = self.upstream.graphql_url();
        let body = json!({ "query": query, "variables": variables });

        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut last_transport_error: Option<String> = None;
        let mut last_server_status = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                sleep(backoff);
                backoff *= 2;
            }
            self.request_count += 1;
            tracing::debug!(attempt, url = %url, "posting GraphQL request");

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.upstream.api_token)
                .json(&body)
                .send();

            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(attempt, %error, "transport error talking to upstream");
                    last_transport_error = Some(error.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                tracing::warn!(attempt, %status, "upstream returned a server error");
                last_server_status = Some(status);
                last_transport_error = None;
                continue;
            }
            if !status.is_success() {
                return Err(WikiError::Upstream(format!(
                    "upstream rejected the request with HTTP {status}"
                )));
            }

            let envelope: Value = response.json().map_err(|error| {
                WikiError::Upstream(format!("failed to decode upstream response: {error}"))
            })?;
            if let Some(errors) = envelope.get("errors").and_then(Value::as_array)
                && !errors.is_empty()
            {
                let message = errors[0]
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("GraphQL error");
                return Err(WikiError::Upstream(format!(
                    "upstream GraphQL error: {message}"
                )));
            }
            return envelope.get("data").cloned().ok_or_else(|| {
                WikiError::Upstream("upstream response has no data payload".to_string())
            });
        }

        match (last_transport_error, last_server_status) {
            (Some(error), _) => Err(WikiError::Network(format!(
                "upstream unreachable after {MAX_ATTEMPTS} attempts: {error}"
            ))),
            (None, Some(status)) => Err(WikiError::Upstream(format!(
                "upstream kept returning HTTP {status} after {MAX_ATTEMPTS} attempts"
            ))),
            (None, None) => Err(WikiError::Network(format!(
                "upstream unreachable after {MAX_ATTEMPTS} attempts"
            ))),
        }
    }

    fn fetch_with_query(&mut self, id: i64, query: &str) -> WikiResult<PageRecord> {
        let data = self.graphql(query, json!({ "id": id }))?;
        let parsed: SingleEnvelope = serde_json::from_value(data)
            .map_err(|error| WikiError::Upstream(format!("failed to decode page {id}: {error}")))?;
        let record = parsed
            .pages
            .single
            .ok_or_else(|| WikiError::NotFound(format!("Page not found: id {id}")))?;
        Ok(record.into_page_record())
    }
}

impl PageStore for GraphQlGateway {
    fn list_pages(&mut self) -> WikiResult<Vec<PageSummary>> {
        let data = self.graphql(QUERY_LIST, Value::Null)?;
        let parsed: ListEnvelope = serde_json::from_value(data).map_err(|error| {
            WikiError::Upstream(format!("failed to decode page listing: {error}"))
        })?;
        Ok(parsed
            .pages
            .list
            .into_iter()
            .map(strip_summary_path)
            .collect())
    }

    fn fetch_page(&mut self, id: i64) -> WikiResult<PageRecord> {
        // Two-variant read: fall back to the contentRaw selection only when
        // the upstream specifically cannot serve the content field.
        match self.fetch_with_query(id, QUERY_SINGLE) {
            Ok(record) => Ok(record),
            Err(WikiError::Upstream(message)) if is_missing_field_error(&message) => {
                tracing::debug!(id, "content field unavailable; retrying with contentRaw");
                self.fetch_with_query(id, QUERY_SINGLE_RAW)
            }
            Err(error) => Err(error),
        }
    }

    fn search_pages(&mut self, term: &str) -> WikiResult<Vec<PageSummary>> {
        let data = self.graphql(QUERY_SEARCH, json!({ "q": term }))?;
        let parsed: SearchEnvelope = serde_json::from_value(data).map_err(|error| {
            WikiError::Upstream(format!("failed to decode search response: {error}"))
        })?;
        Ok(parsed
            .pages
            .search
            .into_iter()
            .map(strip_summary_path)
            .collect())
    }

    fn create_page(&mut self, payload: &PagePayload) -> WikiResult<PageSummary> {
        let variables = json!({
            "path": payload.path,
            "title": payload.title,
            "content": payload.content,
            "desc": payload.description,
            "isPrivate": payload.is_private,
            "locale": self.upstream.locale,
            "tags": payload.tags,
        });
        let data = self.graphql(MUTATION_CREATE, variables)?;
        let parsed: CreateEnvelope = serde_json::from_value(data).map_err(|error| {
            WikiError::Upstream(format!("failed to decode create response: {error}"))
        })?;
        let result = parsed
            .pages
            .create
            .ok_or_else(|| WikiError::Upstream("create mutation returned no result".to_string()))?;
        mutation_page(result, "Create")
    }

    fn update_page(&mut self, id: i64, payload: &PagePayload) -> WikiResult<PageSummary> {
        let variables = json!({
            "id": id,
            "title": payload.title,
            "content": payload.content,
            "desc": payload.description,
            "isPrivate": payload.is_private,
            "tags": payload.tags,
        });
        let data = self.graphql(MUTATION_UPDATE, variables)?;
        let parsed: UpdateEnvelope = serde_json::from_value(data).map_err(|error| {
            WikiError::Upstream(format!("failed to decode update response: {error}"))
        })?;
        let result = parsed
            .pages
            .update
            .ok_or_else(|| WikiError::Upstream("update mutation returned no result".to_string()))?;
        mutation_page(result, "Update")
    }

    fn delete_page(&mut self, id: i64) -> WikiResult<bool> {
        match self.graphql(MUTATION_DELETE, json!({ "id": id })) {
            Ok(data) => {
                let parsed: DeleteEnvelope = serde_json::from_value(data).map_err(|error| {
                    WikiError::Upstream(format!("failed to decode delete response: {error}"))
                })?;
                Ok(parsed
                    .pages
                    .delete
                    .map(|result| result.response_result.succeeded)
                    .unwrap_or(false))
            }
            // Some upstream versions or roles do not expose delete at all;
            // report a soft failure so callers can fall back to a stub.
            Err(WikiError::Upstream(message)) => {
                tracing::warn!(id, %message, "upstream refused delete");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn strip_summary_path(summary: PageSummary) -> PageSummary {
    PageSummary {
        path: summary.path.trim_matches('/').to_string(),
        ..summary
    }
}

fn mutation_page(result: MutationResult, action: &str) -> WikiResult<PageSummary> {
    if !result.response_result.succeeded {
        let detail = result
            .response_result
            .message
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| {
                result
                    .response_result
                    .error_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "unknown error".to_string())
            });
        return Err(WikiError::Upstream(format!("{action} failed: {detail}")));
    }
    result
        .page
        .map(strip_summary_path)
        .ok_or_else(|| WikiError::Upstream(format!("{action} succeeded but returned no page")))
}

fn is_missing_field_error(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("cannot query field") || lowered.contains("unknown field")
}

#[derive(Debug, Deserialize, Default)]
struct ListEnvelope {
    #[serde(default)]
    pages: ListPages,
}

#[derive(Debug, Deserialize, Default)]
struct ListPages {
    #[serde(default)]
    list: Vec<PageSummary>,
}

#[derive(Debug, Deserialize, Default)]
struct SearchEnvelope {
    #[serde(default)]
    pages: SearchPages,
}

#[derive(Debug, Deserialize, Default)]
struct SearchPages {
    #[serde(default)]
    search: Vec<PageSummary>,
}

#[derive(Debug, Deserialize, Default)]
struct SingleEnvelope {
    #[serde(default)]
    pages: SinglePages,
}

#[derive(Debug, Deserialize, Default)]
struct SinglePages {
    single: Option<SingleRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SingleRecord {
    id: i64,
    path: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_private: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_raw: Option<String>,
}

impl SingleRecord {
    fn into_page_record(self) -> PageRecord {
        PageRecord {
            id: self.id,
            path: self.path.trim_matches('/').to_string(),
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            is_private: self.is_private.unwrap_or(false),
            created_at: self.created_at.unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_default(),
            content: self.content.or(self.content_raw).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct CreateEnvelope {
    #[serde(default)]
    pages: CreatePages,
}

#[derive(Debug, Deserialize, Default)]
struct CreatePages {
    create: Option<MutationResult>,
}

#[derive(Debug, Deserialize, Default)]
struct UpdateEnvelope {
    #[serde(default)]
    pages: UpdatePages,
}

#[derive(Debug, Deserialize, Default)]
struct UpdatePages {
    update: Option<MutationResult>,
}

#[derive(Debug, Deserialize, Default)]
struct DeleteEnvelope {
    #[serde(default)]
    pages: DeletePages,
}

#[derive(Debug, Deserialize, Default)]
struct DeletePages {
    delete: Option<DeleteResult>,
}

#[derive(Debug, Deserialize)]
struct MutationResult {
    #[serde(rename = "responseResult")]
    response_result: ResponseResult,
    page: Option<PageSummary>,
}

#[derive(Debug, Deserialize)]
struct DeleteResult {
    #[serde(rename = "responseResult")]
    response_result: ResponseResult,
}

#[derive(Debug, Deserialize, Default)]
struct ResponseResult {
    #[serde(default)]
    succeeded: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "errorCode")]
    error_code: Option<i64>,
}
