use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::WikiConfig;
use crate::error::{WikiError, WikiResult};
use crate::gateway::{GraphQlGateway, PagePayload, PageRecord, PageStore, PageSummary};
use crate::idempotency::derive_idempotency_key;
use crate::index::PathIndex;
use crate::paths::{enforce_path_policy, wire_path};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetPageRequest {
    pub path: Option<String>,
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpsertPageRequest {
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

#[derive(Debug, Clone, Serialize)]
pub struct UpsertPageResponse {
    pub id: i64,
    pub path: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeletePageRequest {
    pub path: Option<String>,
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletePageResponse {
    pub ok: bool,
    pub hard_deleted: bool,
    pub id: i64,
}

/// Rebuild the whole path index from a full upstream listing. The new
/// mapping is assembled before the index is touched, then swapped in
/// atomically.
pub fn refresh_path_index<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
) -> WikiResult<usize> {
    let pages = api.list_pages()?;
    let mut mapping = BTreeMap::new();
    for page in pages {
        mapping.insert(page.path.trim_matches('/').to_string(), page.id);
    }
    let count = mapping.len();
    index.replace_all(mapping);
    Ok(count)
}

/// Resolve a path to an upstream page id: index hit, then a targeted
/// search by the final segment, then a full index refresh. A search
/// failure is treated as a miss, never as a fatal error.
pub fn resolve_page_id<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    path: &str,
) -> WikiResult<Option<i64>> {
    let wire = wire_path(path);
    if wire.is_empty() {
        return Ok(None);
    }
    if let Some(id) = index.get(&wire) {
        return Ok(Some(id));
    }

    let term = wire.rsplit('/').next().unwrap_or(&wire);
    match api.search_pages(term) {
        Ok(hits) => {
            for hit in hits {
                if hit.path.trim_matches('/') == wire {
                    index.insert(&wire, hit.id);
                    return Ok(Some(hit.id));
                }
            }
        }
        Err(error) => {
            tracing::debug!(%error, path = %wire, "search lookup failed; falling back to refresh");
        }
    }

    refresh_path_index(api, index)?;
    Ok(index.get(&wire))
}

/// Effective idempotency key: current header wins, legacy alias second,
/// content-derived fingerprint last. Caller-supplied keys pass through
/// unchanged.
pub fn resolve_idempotency_key(
    request: &UpsertPageRequest,
    idempotency_key: Option<&str>,
    legacy_idempotency_key: Option<&str>,
) -> String {
    if let Some(key) = non_empty(idempotency_key) {
        return key;
    }
    if let Some(key) = non_empty(legacy_idempotency_key) {
        return key;
    }
    derive_idempotency_key(&request.path, &request.title, &request.content)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

pub fn get_page_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    request: &GetPageRequest,
) -> WikiResult<PageRecord> {
    let id = resolve_request_id(api, index, request.path.as_deref(), request.id)?;
    api.fetch_page(id)
}

/// Resolve an existing page and update it, or create it when absent.
///
/// The idempotency key is accepted and echoed for caller-side
/// deduplication; the upstream has no native idempotency support, so a
/// duplicate call with the same key still performs a fresh
/// resolve-then-write round trip.
pub fn upsert_page_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    request: &UpsertPageRequest,
    idempotency_key: Option<&str>,
    legacy_idempotency_key: Option<&str>,
) -> WikiResult<UpsertPageResponse> {
    let enforced = enforce_path_policy(&request.path)?;
    if enforced == "/" {
        return Err(WikiError::BadRequest(
            "path must contain at least one segment".to_string(),
        ));
    }
    let wire = enforced.trim_start_matches('/').to_string();
    let key = resolve_idempotency_key(request, idempotency_key, legacy_idempotency_key);

    let payload = PagePayload {
        path: wire.clone(),
        title: request.title.clone(),
        content: request.content.clone(),
        description: request.description.clone(),
        tags: request.tags.clone(),
        is_private: request.is_private,
    };

    let summary: PageSummary = match resolve_page_id(api, index, &wire)? {
        Some(id) => api.update_page(id, &payload)?,
        None => api.create_page(&payload)?,
    };

    let path = summary.path.trim_matches('/').to_string();
    index.insert(&path, summary.id);

    Ok(UpsertPageResponse {
        id: summary.id,
        path,
        idempotency_key: key,
    })
}

pub fn delete_page_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    request: &DeletePageRequest,
) -> WikiResult<DeletePageResponse> {
    let id = resolve_request_id(api, index, request.path.as_deref(), request.id)?;
    let ok = api.delete_page(id)?;
    if ok {
        index.remove_id(id);
    }
    Ok(DeletePageResponse {
        ok,
        hard_deleted: ok,
        id,
    })
}

fn resolve_request_id<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    path: Option<&str>,
    id: Option<i64>,
) -> WikiResult<i64> {
    if let Some(id) = id {
        return Ok(id);
    }
    let Some(path) = path else {
        return Err(WikiError::BadRequest("path or id is required".to_string()));
    };
    let wire = wire_path(path);
    if wire.is_empty() {
        return Err(WikiError::BadRequest(
            "path must contain at least one segment".to_string(),
        ));
    }
    match resolve_page_id(api, index, &wire)? {
        Some(id) => Ok(id),
        None => Err(WikiError::NotFound(format!("Page not found: {wire}"))),
    }
}

/// Config-driven wrappers: build a gateway from resolved settings and run
/// the operation against it.
pub fn get_page(
    config: &WikiConfig,
    index: &PathIndex,
    request: &GetPageRequest,
) -> WikiResult<PageRecord> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    get_page_with_api(&mut gateway, index, request)
}

pub fn upsert_page(
    config: &WikiConfig,
    index: &PathIndex,
    request: &UpsertPageRequest,
    idempotency_key: Option<&str>,
    legacy_idempotency_key: Option<&str>,
) -> WikiResult<UpsertPageResponse> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    upsert_page_with_api(
        &mut gateway,
        index,
        request,
        idempotency_key,
        legacy_idempotency_key,
    )
}

pub fn delete_page(
    config: &WikiConfig,
    index: &PathIndex,
    request: &DeletePageRequest,
) -> WikiResult<DeletePageResponse> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    delete_page_with_api(&mut gateway, index, request)
}
