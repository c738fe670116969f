use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::config::WikiConfig;
use crate::error::{WikiError, WikiResult};
use crate::gateway::{GraphQlGateway, PageStore};
use crate::index::PathIndex;
use crate::pages::{
    DeletePageRequest, GetPageRequest, UpsertPageRequest, delete_page_with_api, get_page_with_api,
    refresh_path_index, upsert_page_with_api,
};

/// Markdown link targets of the form `](/some/path)`.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\((/[^\s)]+)\)").expect("markdown link regex"));

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoveItem {
    pub from_path: String,
    pub to_path: String,
    #[serde(default)]
    pub merge: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkMoveRequest {
    pub moves: Vec<MoveItem>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    #[serde(rename = "from")]
    pub from_path: String,
    #[serde(rename = "to")]
    pub to_path: String,
    pub dry: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedItem {
    #[serde(rename = "from")]
    pub from_path: String,
    #[serde(rename = "to")]
    pub to_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveError {
    #[serde(rename = "from")]
    pub from_path: String,
    #[serde(rename = "to")]
    pub to_path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkMoveReport {
    pub dry_run: bool,
    pub applied: Vec<MoveOutcome>,
    pub skipped: Vec<SkippedItem>,
    pub errors: Vec<MoveError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectItem {
    pub from_path: String,
    pub to_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkRedirectRequest {
    pub redirects: Vec<RedirectItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedirectOutcome {
    #[serde(rename = "from")]
    pub from_path: String,
    #[serde(rename = "to")]
    pub to_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkRedirectReport {
    pub applied: Vec<RedirectOutcome>,
    pub errors: Vec<MoveError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkRelinkRequest {
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelinkError {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkRelinkReport {
    pub updated: Vec<String>,
    pub errors: Vec<RelinkError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryPage {
    pub id: i64,
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryReport {
    pub count: usize,
    pub pages: Vec<InventoryPage>,
}

/// Placeholder body left behind at a moved page's old path. Deterministic
/// given only the destination path.
pub fn moved_stub(to_path: &str) -> String {
    let stripped = to_path.trim_matches('/');
    format!(
        "# Moved\n\nThis page has moved to **[{to_path}](/{stripped})**.\n\n\
         > If you followed a bookmark, please update it."
    )
}

/// Rewrite every markdown link whose target exactly matches a mapping key.
/// Non-matching links are left byte-identical.
pub fn rewrite_links(content: &str, mapping: &BTreeMap<String, String>) -> String {
    LINK_RE
        .replace_all(content, |caps: &Captures<'_>| {
            let target = caps[1].trim().trim_matches('/');
            match mapping.get(target) {
                Some(new_path) => format!("](/{})", new_path.trim_matches('/')),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn bulk_move_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    request: &BulkMoveRequest,
) -> WikiResult<BulkMoveReport> {
    if request.moves.is_empty() {
        return Err(WikiError::BadRequest("No moves provided".to_string()));
    }

    let mut report = BulkMoveReport {
        dry_run: request.dry_run,
        applied: Vec::new(),
        skipped: Vec::new(),
        errors: Vec::new(),
    };

    for item in &request.moves {
        let src = item.from_path.trim_matches('/').to_string();
        let dst = item.to_path.trim_matches('/').to_string();
        if src.is_empty() || dst.is_empty() || src == dst {
            report.skipped.push(SkippedItem {
                from_path: src,
                to_path: dst,
                reason: "noop/invalid".to_string(),
            });
            continue;
        }

        match move_one(api, index, &src, &dst, item.merge, request.dry_run) {
            Ok(outcome) => report.applied.push(outcome),
            Err(error) => report.errors.push(MoveError {
                from_path: src,
                to_path: dst,
                error: item_error(&error),
            }),
        }
    }

    tracing::info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        errors = report.errors.len(),
        dry_run = report.dry_run,
        "bulk move finished"
    );
    Ok(report)
}

fn move_one<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    src: &str,
    dst: &str,
    merge: bool,
    dry_run: bool,
) -> WikiResult<MoveOutcome> {
    let source = get_page_with_api(
        api,
        index,
        &GetPageRequest {
            path: Some(src.to_string()),
            id: None,
        },
    )
    .map_err(|error| match error {
        WikiError::NotFound(_) => WikiError::NotFound("source not found".to_string()),
        other => other,
    })?;

    let title = if source.title.is_empty() {
        title_from_slug(last_segment(dst))
    } else {
        source.title.clone()
    };

    if dry_run {
        return Ok(MoveOutcome {
            from_path: src.to_string(),
            to_path: dst.to_string(),
            dry: true,
        });
    }

    upsert_page_with_api(
        api,
        index,
        &UpsertPageRequest {
            path: dst.to_string(),
            title: title.clone(),
            content: source.content.clone(),
            description: source.description.clone(),
            ..UpsertPageRequest::default()
        },
        None,
        None,
    )?;

    if merge {
        leave_moved_stub(api, index, src, dst, &title)?;
    } else {
        let hard_deleted = matches!(
            delete_page_with_api(
                api,
                index,
                &DeletePageRequest {
                    path: Some(src.to_string()),
                    id: None,
                },
            ),
            Ok(response) if response.ok
        );
        if !hard_deleted {
            leave_moved_stub(api, index, src, dst, &title)?;
        }
    }

    Ok(MoveOutcome {
        from_path: src.to_string(),
        to_path: dst.to_string(),
        dry: false,
    })
}

fn leave_moved_stub<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    src: &str,
    dst: &str,
    title: &str,
) -> WikiResult<()> {
    upsert_page_with_api(
        api,
        index,
        &UpsertPageRequest {
            path: src.to_string(),
            title: title.to_string(),
            content: moved_stub(dst),
            description: "Moved".to_string(),
            ..UpsertPageRequest::default()
        },
        None,
        None,
    )?;
    Ok(())
}

pub fn bulk_redirect_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    request: &BulkRedirectRequest,
) -> WikiResult<BulkRedirectReport> {
    if request.redirects.is_empty() {
        return Err(WikiError::BadRequest("No redirects provided".to_string()));
    }

    let mut report = BulkRedirectReport {
        applied: Vec::new(),
        errors: Vec::new(),
    };

    for item in &request.redirects {
        let src = item.from_path.trim_matches('/').to_string();
        let dst = item.to_path.trim_matches('/').to_string();
        if src.is_empty() || dst.is_empty() || src == dst {
            continue;
        }

        let title_guess = title_from_slug(last_segment(&src));
        let result = upsert_page_with_api(
            api,
            index,
            &UpsertPageRequest {
                path: src.clone(),
                title: title_guess,
                content: moved_stub(&dst),
                description: "Moved".to_string(),
                ..UpsertPageRequest::default()
            },
            None,
            None,
        );
        match result {
            Ok(_) => report.applied.push(RedirectOutcome {
                from_path: src,
                to_path: dst,
            }),
            Err(error) => report.errors.push(MoveError {
                from_path: src,
                to_path: dst,
                error: item_error(&error),
            }),
        }
    }

    Ok(report)
}

pub fn bulk_relink_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    request: &BulkRelinkRequest,
) -> WikiResult<BulkRelinkReport> {
    let mut mapping = BTreeMap::new();
    for (key, value) in &request.mapping {
        let key = key.trim_matches('/').to_string();
        let value = value.trim_matches('/').to_string();
        if !key.is_empty() && !value.is_empty() {
            mapping.insert(key, value);
        }
    }

    let scope: Vec<String> = request
        .scope
        .iter()
        .flatten()
        .map(|path| path.trim_matches('/').to_string())
        .filter(|path| !path.is_empty())
        .collect();

    refresh_path_index(api, index)?;

    let mut report = BulkRelinkReport {
        updated: Vec::new(),
        errors: Vec::new(),
    };

    for (path, id) in index.entries() {
        if !scope.is_empty() && !scope.contains(&path) {
            continue;
        }
        match relink_one(api, index, &path, id, &mapping) {
            Ok(true) => report.updated.push(path),
            Ok(false) => {}
            Err(error) => report.errors.push(RelinkError {
                path,
                error: item_error(&error),
            }),
        }
    }

    Ok(report)
}

/// Returns whether the page's content changed and was re-upserted.
fn relink_one<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    path: &str,
    id: i64,
    mapping: &BTreeMap<String, String>,
) -> WikiResult<bool> {
    let page = api.fetch_page(id)?;
    let rewritten = rewrite_links(&page.content, mapping);
    if rewritten == page.content {
        return Ok(false);
    }

    let title = if page.title.is_empty() {
        last_segment(path).to_string()
    } else {
        page.title.clone()
    };
    upsert_page_with_api(
        api,
        index,
        &UpsertPageRequest {
            path: path.to_string(),
            title,
            content: rewritten,
            description: page.description.clone(),
            ..UpsertPageRequest::default()
        },
        None,
        None,
    )?;
    Ok(true)
}

/// Full listing of every page the upstream knows about. A page whose fetch
/// fails degrades to a thin entry instead of aborting the listing.
pub fn inventory_with_api<A: PageStore + ?Sized>(
    api: &mut A,
    index: &PathIndex,
    include_content: bool,
) -> WikiResult<InventoryReport> {
    refresh_path_index(api, index)?;

    let mut pages = Vec::new();
    for (path, id) in index.entries() {
        match api.fetch_page(id) {
            Ok(page) => pages.push(InventoryPage {
                id: page.id,
                path: page.path,
                title: page.title,
                description: Some(page.description),
                is_private: Some(page.is_private),
                created_at: Some(page.created_at),
                updated_at: Some(page.updated_at),
                content: include_content.then_some(page.content),
                error: None,
            }),
            Err(error) => pages.push(InventoryPage {
                id,
                path: path.clone(),
                title: last_segment(&path).to_string(),
                description: None,
                is_private: None,
                created_at: None,
                updated_at: None,
                content: None,
                error: Some(error.to_string()),
            }),
        }
    }

    Ok(InventoryReport {
        count: pages.len(),
        pages,
    })
}

/// Config-driven wrappers mirroring the single-page entry points.
pub fn bulk_move(
    config: &WikiConfig,
    index: &PathIndex,
    request: &BulkMoveRequest,
) -> WikiResult<BulkMoveReport> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    bulk_move_with_api(&mut gateway, index, request)
}

pub fn bulk_redirect(
    config: &WikiConfig,
    index: &PathIndex,
    request: &BulkRedirectRequest,
) -> WikiResult<BulkRedirectReport> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    bulk_redirect_with_api(&mut gateway, index, request)
}

pub fn bulk_relink(
    config: &WikiConfig,
    index: &PathIndex,
    request: &BulkRelinkRequest,
) -> WikiResult<BulkRelinkReport> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    bulk_relink_with_api(&mut gateway, index, request)
}

pub fn inventory(
    config: &WikiConfig,
    index: &PathIndex,
    include_content: bool,
) -> WikiResult<InventoryReport> {
    let mut gateway = GraphQlGateway::new(config.resolved()?)?;
    inventory_with_api(&mut gateway, index, include_content)
}

fn item_error(error: &WikiError) -> String {
    match error {
        WikiError::NotFound(message) if message == "source not found" => message.clone(),
        other => format!("{}: {}", other.code(), other),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStore;

    fn move_request(moves: Vec<(&str, &str, bool)>, dry_run: bool) -> BulkMoveRequest {
        BulkMoveRequest {
            moves: moves
                .into_iter()
                .map(|(from, to, merge)| MoveItem {
                    from_path: from.to_string(),
                    to_path: to.to_string(),
                    merge,
                })
                .collect(),
            dry_run,
        }
    }

    fn redirect_request(redirects: Vec<(&str, &str)>) -> BulkRedirectRequest {
        BulkRedirectRequest {
            redirects: redirects
                .into_iter()
                .map(|(from, to)| RedirectItem {
                    from_path: from.to_string(),
                    to_path: to.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn empty_move_batch_is_bad_request() {
        let mut api = MockStore::new();
        let index = PathIndex::new();
        let error = bulk_move_with_api(&mut api, &index, &BulkMoveRequest::default())
            .expect_err("must fail");
        assert!(matches!(error, WikiError::BadRequest(_)));
    }

    #[test]
    fn move_skips_noop_items() {
        let mut api = MockStore::new();
        api.seed(1, "homelab/old", "Old", "# body");
        let index = PathIndex::new();

        let report = bulk_move_with_api(
            &mut api,
            &index,
            &move_request(vec![("", "homelab/new", false), ("same/path", "/same/path/", false)], false),
        )
        .expect("report");

        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].reason, "noop/invalid");
        assert!(report.applied.is_empty());
        assert_eq!(api.write_calls(), 0);
    }

    #[test]
    fn move_dry_run_issues_zero_writes() {
        let mut api = MockStore::new();
        api.seed(1, "homelab/old-page", "Old Page", "# body");
        let index = PathIndex::new();

        let report = bulk_move_with_api(
            &mut api,
            &index,
            &move_request(vec![("homelab/old-page", "projects/new-page", false)], true),
        )
        .expect("report");

        assert!(report.dry_run);
        assert_eq!(report.applied.len(), 1);
        assert!(report.applied[0].dry);
        assert_eq!(api.write_calls(), 0);
        assert!(api.page_by_path("homelab/old-page").is_some());
    }

    #[test]
    fn move_with_merge_leaves_stub_at_source() {
        let mut api = MockStore::new();
        api.seed(1, "homelab/old-page", "Old Page", "# original body");
        let index = PathIndex::new();

        let report = bulk_move_with_api(
            &mut api,
            &index,
            &move_request(vec![("homelab/old-page", "projects/new-page", true)], false),
        )
        .expect("report");

        assert_eq!(report.applied.len(), 1);
        let destination = api.page_by_path("projects/new-page").expect("destination");
        assert_eq!(destination.content, "# original body");
        assert_eq!(destination.title, "Old Page");
        let stub = api.page_by_path("homelab/old-page").expect("stub");
        assert_eq!(stub.content, moved_stub("projects/new-page"));
        assert_eq!(stub.description, "Moved");
    }

    #[test]
    fn move_without_merge_hard_deletes_source() {
        let mut api = MockStore::new();
        api.seed(1, "homelab/old-page", "Old Page", "# original body");
        let index = PathIndex::new();

        let report = bulk_move_with_api(
            &mut api,
            &index,
            &move_request(vec![("homelab/old-page", "projects/new-page", false)], false),
        )
        .expect("report");

        assert_eq!(report.applied.len(), 1);
        assert!(api.page_by_path("projects/new-page").is_some());
        assert!(api.page_by_path("homelab/old-page").is_none());
        assert_eq!(api.deleted_ids, vec![1]);
    }

    #[test]
    fn move_falls_back_to_stub_when_delete_is_refused() {
        let mut api = MockStore::new();
        api.delete_supported = false;
        api.seed(1, "homelab/old-page", "Old Page", "# original body");
        let index = PathIndex::new();

        let report = bulk_move_with_api(
            &mut api,
            &index,
            &move_request(vec![("homelab/old-page", "projects/new-page", false)], false),
        )
        .expect("report");

        assert_eq!(report.applied.len(), 1);
        let stub = api.page_by_path("homelab/old-page").expect("stub survives");
        assert_eq!(stub.content, moved_stub("projects/new-page"));
    }

    #[test]
    fn move_missing_source_is_an_isolated_item_error() {
        let mut api = MockStore::new();
        api.seed(1, "homelab/present", "Present", "# body");
        let index = PathIndex::new();

        let report = bulk_move_with_api(
            &mut api,
            &index,
            &move_request(
                vec![
                    ("homelab/missing", "projects/somewhere", false),
                    ("homelab/present", "projects/present", false),
                ],
                false,
            ),
        )
        .expect("report");

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].error, "source not found");
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].to_path, "projects/present");
    }

    #[test]
    fn redirect_creates_stub_with_guessed_title() {
        let mut api = MockStore::new();
        let index = PathIndex::new();

        let report = bulk_redirect_with_api(
            &mut api,
            &index,
            &redirect_request(vec![("old/gpu-vm", "homelab/gpu-vm")]),
        )
        .expect("report");

        assert_eq!(report.applied.len(), 1);
        let stub = api.page_by_path("old/gpu-vm").expect("stub");
        assert_eq!(stub.title, "Gpu Vm");
        assert_eq!(stub.content, moved_stub("homelab/gpu-vm"));
    }

    #[test]
    fn redirect_skips_noops_silently() {
        let mut api = MockStore::new();
        let index = PathIndex::new();

        let report = bulk_redirect_with_api(
            &mut api,
            &index,
            &redirect_request(vec![("", "homelab/target"), ("same/page", "same/page")]),
        )
        .expect("report");

        assert!(report.applied.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(api.write_calls(), 0);
    }

    #[test]
    fn redirect_batch_isolates_item_failures() {
        let mut api = MockStore::new();
        api.fail_writes_at.insert("old/second".to_string());
        let index = PathIndex::new();

        let report = bulk_redirect_with_api(
            &mut api,
            &index,
            &redirect_request(vec![
                ("old/first", "new/first"),
                ("old/second", "new/second"),
                ("old/third", "new/third"),
            ]),
        )
        .expect("report");

        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.applied[0].from_path, "old/first");
        assert_eq!(report.applied[1].from_path, "old/third");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].from_path, "old/second");
        assert!(report.errors[0].error.contains("upstream_error"));
    }

    #[test]
    fn rewrite_links_touches_only_mapped_targets() {
        let mut mapping = BTreeMap::new();
        mapping.insert("old/a".to_string(), "new/a".to_string());

        let content = "See [a](/old/a) and [b](/other/b).";
        let rewritten = rewrite_links(content, &mapping);
        assert_eq!(rewritten, "See [a](/new/a) and [b](/other/b).");

        let untouched = "No links worth [rewriting](/other/b).";
        assert_eq!(rewrite_links(untouched, &mapping), untouched);
    }

    #[test]
    fn relink_reupserts_only_changed_pages() {
        let mut api = MockStore::new();
        api.seed(1, "docs/guide", "Guide", "Read [a](/old/a) and [b](/other/b).");
        api.seed(2, "docs/other", "Other", "Nothing mapped here: [b](/other/b).");
        let index = PathIndex::new();

        let mut mapping = BTreeMap::new();
        mapping.insert("old/a".to_string(), "new/a".to_string());
        let report = bulk_relink_with_api(
            &mut api,
            &index,
            &BulkRelinkRequest {
                mapping,
                scope: None,
            },
        )
        .expect("report");

        assert_eq!(report.updated, vec!["docs/guide"]);
        assert!(report.errors.is_empty());
        assert_eq!(
            api.page_by_path("docs/guide").expect("page").content,
            "Read [a](/new/a) and [b](/other/b)."
        );
        // The unmapped page is left alone.
        assert_eq!(api.updated_paths, vec!["docs/guide"]);
    }

    #[test]
    fn relink_honors_scope_filter() {
        let mut api = MockStore::new();
        api.seed(1, "docs/guide", "Guide", "[a](/old/a)");
        api.seed(2, "docs/other", "Other", "[a](/old/a)");
        let index = PathIndex::new();

        let mut mapping = BTreeMap::new();
        mapping.insert("old/a".to_string(), "new/a".to_string());
        let report = bulk_relink_with_api(
            &mut api,
            &index,
            &BulkRelinkRequest {
                mapping,
                scope: Some(vec!["/docs/other/".to_string()]),
            },
        )
        .expect("report");

        assert_eq!(report.updated, vec!["docs/other"]);
        assert_eq!(
            api.page_by_path("docs/guide").expect("page").content,
            "[a](/old/a)"
        );
    }

    #[test]
    fn relink_drops_empty_mapping_pairs() {
        let mut api = MockStore::new();
        api.seed(1, "docs/guide", "Guide", "[a](/old/a)");
        let index = PathIndex::new();

        let mut mapping = BTreeMap::new();
        mapping.insert("//".to_string(), "new/a".to_string());
        mapping.insert("old/a".to_string(), "//".to_string());
        let report = bulk_relink_with_api(
            &mut api,
            &index,
            &BulkRelinkRequest {
                mapping,
                scope: None,
            },
        )
        .expect("report");

        assert!(report.updated.is_empty());
    }

    #[test]
    fn relink_records_per_page_errors() {
        let mut api = MockStore::new();
        api.seed(1, "docs/guide", "Guide", "[a](/old/a)");
        api.seed(2, "docs/broken", "Broken", "[a](/old/a)");
        api.fail_fetch_ids.insert(2);
        let index = PathIndex::new();

        let mut mapping = BTreeMap::new();
        mapping.insert("old/a".to_string(), "new/a".to_string());
        let report = bulk_relink_with_api(
            &mut api,
            &index,
            &BulkRelinkRequest {
                mapping,
                scope: None,
            },
        )
        .expect("report");

        assert_eq!(report.updated, vec!["docs/guide"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].path, "docs/broken");
    }

    #[test]
    fn inventory_degrades_failed_fetches() {
        let mut api = MockStore::new();
        api.seed(1, "docs/guide", "Guide", "# body");
        api.seed(2, "docs/broken-page", "Broken", "# body");
        api.fail_fetch_ids.insert(2);
        let index = PathIndex::new();

        let report = inventory_with_api(&mut api, &index, false).expect("report");
        assert_eq!(report.count, 2);

        let healthy = report
            .pages
            .iter()
            .find(|page| page.path == "docs/guide")
            .expect("healthy entry");
        assert!(healthy.error.is_none());
        assert!(healthy.content.is_none());
        assert_eq!(healthy.description.as_deref(), Some(""));

        let degraded = report
            .pages
            .iter()
            .find(|page| page.path == "docs/broken-page")
            .expect("degraded entry");
        assert_eq!(degraded.title, "broken-page");
        assert!(degraded.error.as_deref().is_some_and(|e| e.contains("fetch failed")));
    }

    #[test]
    fn inventory_includes_content_on_request() {
        let mut api = MockStore::new();
        api.seed(1, "docs/guide", "Guide", "# body");
        let index = PathIndex::new();

        let report = inventory_with_api(&mut api, &index, true).expect("report");
        assert_eq!(report.pages[0].content.as_deref(), Some("# body"));
    }

    #[test]
    fn moved_stub_is_deterministic() {
        let stub = moved_stub("projects/new-page");
        assert!(stub.starts_with("# Moved\n\n"));
        assert!(stub.contains("**[projects/new-page](/projects/new-page)**"));
        assert!(stub.contains("> If you followed a bookmark"));
        assert_eq!(stub, moved_stub("projects/new-page"));
    }

    #[test]
    fn title_from_slug_title_cases_words() {
        assert_eq!(title_from_slug("gpu-vm"), "Gpu Vm");
        assert_eq!(title_from_slug("ollama"), "Ollama");
        assert_eq!(title_from_slug("multi--dash"), "Multi Dash");
    }
}
