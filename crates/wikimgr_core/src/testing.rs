use std::collections::{BTreeMap, BTreeSet};

use crate::error::{WikiError, WikiResult};
use crate::gateway::{PagePayload, PageRecord, PageStore, PageSummary};

const FIXED_TIMESTAMP: &str = "2026-03-01T00:00:00Z";

/// In-memory stand-in for the upstream store, with switches for the
/// failure modes the orchestrators have to survive.
#[derive(Default)]
pub struct MockStore {
    pub pages: BTreeMap<i64, PageRecord>,
    pub next_id: i64,
    pub search_enabled: bool,
    pub delete_supported: bool,
    pub fail_writes_at: BTreeSet<String>,
    pub fail_fetch_ids: BTreeSet<i64>,
    pub created_paths: Vec<String>,
    pub updated_paths: Vec<String>,
    pub deleted_ids: Vec<i64>,
    pub list_calls: usize,
    pub request_count: usize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            next_id: 1000,
            search_enabled: true,
            delete_supported: true,
            ..Self::default()
        }
    }

    pub fn seed(&mut self, id: i64, path: &str, title: &str, content: &str) {
        self.pages.insert(
            id,
            PageRecord {
                id,
                path: path.to_string(),
                title: title.to_string(),
                description: String::new(),
                is_private: false,
                created_at: FIXED_TIMESTAMP.to_string(),
                updated_at: FIXED_TIMESTAMP.to_string(),
                content: content.to_string(),
            },
        );
    }

    pub fn page_by_path(&self, path: &str) -> Option<&PageRecord> {
        self.pages.values().find(|page| page.path == path)
    }

    pub fn write_calls(&self) -> usize {
        self.created_paths.len() + self.updated_paths.len() + self.deleted_ids.len()
    }

    fn summary(page: &PageRecord) -> PageSummary {
        PageSummary {
            id: page.id,
            path: page.path.clone(),
            title: page.title.clone(),
        }
    }
}

impl PageStore for MockStore {
    fn list_pages(&mut self) -> WikiResult<Vec<PageSummary>> {
        self.request_count += 1;
        self.list_calls += 1;
        Ok(self.pages.values().map(MockStore::summary).collect())
    }

    fn fetch_page(&mut self, id: i64) -> WikiResult<PageRecord> {
        self.request_count += 1;
        if self.fail_fetch_ids.contains(&id) {
            return Err(WikiError::Upstream(format!("fetch failed for id {id}")));
        }
        self.pages
            .get(&id)
            .cloned()
            .ok_or_else(|| WikiError::NotFound(format!("Page not found: id {id}")))
    }

    fn search_pages(&mut self, term: &str) -> WikiResult<Vec<PageSummary>> {
        self.request_count += 1;
        if !self.search_enabled {
            return Err(WikiError::Upstream("search is disabled".to_string()));
        }
        Ok(self
            .pages
            .values()
            .filter(|page| page.path.rsplit('/').next() == Some(term))
            .map(MockStore::summary)
            .collect())
    }

    fn create_page(&mut self, payload: &PagePayload) -> WikiResult<PageSummary> {
        self.request_count += 1;
        if self.fail_writes_at.contains(&payload.path) {
            return Err(WikiError::Upstream("Create failed: write rejected".to_string()));
        }
        self.next_id += 1;
        let id = self.next_id;
        let record = PageRecord {
            id,
            path: payload.path.clone(),
            title: payload.title.clone(),
            description: payload.description.clone(),
            is_private: payload.is_private,
            created_at: FIXED_TIMESTAMP.to_string(),
            updated_at: FIXED_TIMESTAMP.to_string(),
            content: payload.content.clone(),
        };
        let summary = MockStore::summary(&record);
        self.pages.insert(id, record);
        self.created_paths.push(payload.path.clone());
        Ok(summary)
    }

    fn update_page(&mut self, id: i64, payload: &PagePayload) -> WikiResult<PageSummary> {
        self.request_count += 1;
        if self.fail_writes_at.contains(&payload.path) {
            return Err(WikiError::Upstream("Update failed: write rejected".to_string()));
        }
        let record = self
            .pages
            .get_mut(&id)
            .ok_or_else(|| WikiError::Upstream(format!("Update failed: unknown id {id}")))?;
        record.title = payload.title.clone();
        record.description = payload.description.clone();
        record.is_private = payload.is_private;
        record.content = payload.content.clone();
        record.updated_at = FIXED_TIMESTAMP.to_string();
        let summary = MockStore::summary(record);
        self.updated_paths.push(record.path.clone());
        Ok(summary)
    }

    fn delete_page(&mut self, id: i64) -> WikiResult<bool> {
        self.request_count += 1;
        if !self.delete_supported {
            return Ok(false);
        }
        if self.pages.remove(&id).is_none() {
            return Ok(false);
        }
        self.deleted_ids.push(id);
        Ok(true)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}
