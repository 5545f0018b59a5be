//! SearchEngine — evaluates [`SearchQuery`]s against the repository.

use edgegrid_core::EdgeCluster;
use edgegrid_state::TenantRepository;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SearchResult;
use crate::page::{Edge, Page, PageInfo};
use crate::query::SearchQuery;

/// Read-only query front of a [`TenantRepository`].
#[derive(Clone)]
pub struct SearchEngine {
    repo: TenantRepository,
}

impl SearchEngine {
    pub fn new(repo: TenantRepository) -> Self {
        Self { repo }
    }

    /// Run `query` against a snapshot of the tenant's partition.
    pub async fn search(&self, query: &SearchQuery, cancel: &CancellationToken) -> SearchResult<Page> {
        query.validate()?;
        let snapshot = self.repo.list(&query.tenant_id, cancel).await?;
        let page = paginate(snapshot, query);
        debug!(
            tenant_id = %query.tenant_id,
            total = page.total_count,
            returned = page.edges.len(),
            "search evaluated"
        );
        Ok(page)
    }
}

/// Evaluate `query` over an in-memory snapshot.
///
/// The query must already be validated. Bounds are positions in the
/// ID-ordered match list:
///
/// ```text
///   matching:  [0 ........ lower ..... start ===== end ..... upper ........ total)
///                 excluded    in bounds   window     in bounds   excluded
///                 by after                           by before
/// ```
///
/// A forward page (`first`) has a next page when records remain between
/// `end` and `upper`; a backward page (`last`) has a previous page when
/// records remain between `lower` and `start`. A cursor that excluded
/// records on its own side also reports a page on that side.
pub fn paginate(records: Vec<EdgeCluster>, query: &SearchQuery) -> Page {
    let mut matching: Vec<EdgeCluster> = records.into_iter().filter(|r| query.matches(r)).collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));
    let total = matching.len();

    let pagination = &query.pagination;
    let lower = pagination
        .after
        .as_deref()
        .map(|after| matching.partition_point(|r| r.id.as_str() <= after))
        .unwrap_or(0);
    let upper = pagination
        .before
        .as_deref()
        .map(|before| matching.partition_point(|r| r.id.as_str() < before))
        .unwrap_or(total)
        .max(lower);

    let (start, end) = match (pagination.first, pagination.last) {
        (Some(first), _) => (lower, lower.saturating_add(first).min(upper)),
        (None, Some(last)) => (upper.saturating_sub(last).max(lower), upper),
        (None, None) => (lower, upper),
    };

    let has_next_page =
        (pagination.first.is_some() && end < upper) || (pagination.before.is_some() && upper < total);
    let has_previous_page =
        (pagination.last.is_some() && start > lower) || (pagination.after.is_some() && lower > 0);

    let mut window: Vec<EdgeCluster> = matching.drain(start..end).collect();
    if !query.sort.is_empty() {
        window.sort_by(|a, b| query.compare(a, b));
    }

    let edges: Vec<Edge> = window.into_iter().map(Edge::from).collect();
    let page_info = PageInfo {
        has_next_page,
        has_previous_page,
        start_cursor: edges.first().map(|e| e.cursor.clone()),
        end_cursor: edges.last().map(|e| e.cursor.clone()),
    };

    Page {
        edges,
        total_count: total,
        page_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Pagination, SortField, SortKey};
    use edgegrid_core::{ClusterType, NewEdgeCluster};
    use edgegrid_state::MemoryStore;
    use std::sync::Arc;

    fn spec(name: &str) -> NewEdgeCluster {
        NewEdgeCluster {
            name: name.to_string(),
            cluster_secret: "secret".to_string(),
            cluster_type: ClusterType::K3s,
        }
    }

    /// Ten records `Name0..Name9` under tenant "x", IDs in creation order.
    async fn seeded() -> (SearchEngine, Vec<String>) {
        let repo = TenantRepository::new(Arc::new(MemoryStore::new()));
        let cancel = CancellationToken::new();
        let mut ids = Vec::new();
        for i in 0..10 {
            ids.push(repo.create("x", spec(&format!("Name{i}")), &cancel).await.unwrap());
        }
        (SearchEngine::new(repo), ids)
    }

    fn names(page: &Page) -> Vec<String> {
        page.nodes().map(|c| c.name.clone()).collect()
    }

    async fn run(engine: &SearchEngine, query: SearchQuery) -> Page {
        engine.search(&query, &CancellationToken::new()).await.unwrap()
    }

    #[tokio::test]
    async fn after_first_cursor_returns_remaining_nine() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::forward(Some(ids[0].clone()), 9));

        let page = run(&engine, query).await;

        let expected: Vec<String> = (1..10).map(|i| format!("Name{i}")).collect();
        assert_eq!(names(&page), expected);
        assert_eq!(page.total_count, 10);
        assert!(!page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);
        assert_eq!(page.page_info.start_cursor.as_deref(), Some(ids[1].as_str()));
        assert_eq!(page.page_info.end_cursor.as_deref(), Some(ids[9].as_str()));
    }

    #[tokio::test]
    async fn no_sort_key_is_creation_order() {
        let (engine, ids) = seeded().await;
        let page = run(&engine, SearchQuery::for_tenant("x")).await;

        let cursors: Vec<_> = page.edges.iter().map(|e| e.cursor.clone()).collect();
        assert_eq!(cursors, ids);
        assert!(page.edges.iter().all(|e| e.cursor == e.node.id));
        assert!(!page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn total_count_ignores_cursors_and_limits() {
        let (engine, ids) = seeded().await;
        let paginations = [
            Pagination::default(),
            Pagination::forward(None, 3),
            Pagination::forward(Some(ids[4].clone()), 2),
            Pagination::backward(None, 4),
            Pagination::backward(Some(ids[7].clone()), 100),
            Pagination::forward(Some(ids[9].clone()), 5),
        ];

        for pagination in paginations {
            let page = run(&engine, SearchQuery::for_tenant("x").with_pagination(pagination)).await;
            assert_eq!(page.total_count, 10);
        }
    }

    #[tokio::test]
    async fn forward_pages_walk_the_whole_set() {
        let (engine, ids) = seeded().await;
        let mut after = None;
        let mut seen = Vec::new();

        loop {
            let query = SearchQuery::for_tenant("x").with_pagination(Pagination::forward(after.clone(), 4));
            let page = run(&engine, query).await;
            seen.extend(page.edges.iter().map(|e| e.cursor.clone()));
            if !page.page_info.has_next_page {
                break;
            }
            after = page.page_info.end_cursor.clone();
        }

        assert_eq!(seen, ids);
    }

    #[tokio::test]
    async fn first_larger_than_remaining_has_no_next_page() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::forward(Some(ids[6].clone()), 50));

        let page = run(&engine, query).await;
        assert_eq!(names(&page), vec!["Name7", "Name8", "Name9"]);
        assert!(!page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn first_exactly_remaining_has_no_next_page() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::forward(Some(ids[6].clone()), 3));

        let page = run(&engine, query).await;
        assert_eq!(page.edges.len(), 3);
        assert!(!page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn first_short_of_remaining_has_next_page() {
        let (engine, _) = seeded().await;
        let page = run(&engine, SearchQuery::for_tenant("x").with_pagination(Pagination::forward(None, 3))).await;
        assert_eq!(names(&page), vec!["Name0", "Name1", "Name2"]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn backward_page_before_cursor() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::backward(Some(ids[5].clone()), 2));

        let page = run(&engine, query).await;
        assert_eq!(names(&page), vec!["Name3", "Name4"]);
        assert!(page.page_info.has_previous_page);
        assert!(page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn last_larger_than_preceding_has_no_previous_page() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::backward(Some(ids[3].clone()), 50));

        let page = run(&engine, query).await;
        assert_eq!(names(&page), vec!["Name0", "Name1", "Name2"]);
        assert!(!page.page_info.has_previous_page);
        assert!(page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn last_exactly_preceding_has_no_previous_page() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::backward(Some(ids[3].clone()), 3));

        let page = run(&engine, query).await;
        assert_eq!(page.edges.len(), 3);
        assert!(!page.page_info.has_previous_page);
        assert_eq!(page.page_info.start_cursor.as_deref(), Some(ids[0].as_str()));
    }

    #[tokio::test]
    async fn last_without_cursor_takes_the_tail() {
        let (engine, _) = seeded().await;
        let page = run(&engine, SearchQuery::for_tenant("x").with_pagination(Pagination::backward(None, 2))).await;
        assert_eq!(names(&page), vec!["Name8", "Name9"]);
        assert!(page.page_info.has_previous_page);
        assert!(!page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn descending_is_reverse_of_ascending() {
        let (engine, _) = seeded().await;
        let asc = run(&engine, SearchQuery::for_tenant("x").sorted_by(SortKey::asc(SortField::Name))).await;
        let desc = run(&engine, SearchQuery::for_tenant("x").sorted_by(SortKey::desc(SortField::Name))).await;

        let mut reversed = names(&asc);
        reversed.reverse();
        assert_eq!(names(&desc), reversed);
        assert_eq!(names(&desc)[0], "Name9");
    }

    #[tokio::test]
    async fn sort_applies_to_the_selected_window() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::forward(Some(ids[1].clone()), 3))
            .sorted_by(SortKey::desc(SortField::Id));

        let page = run(&engine, query).await;
        assert_eq!(names(&page), vec!["Name4", "Name3", "Name2"]);
        assert!(page.page_info.has_next_page);
    }

    #[tokio::test]
    async fn id_filter_restricts_results_and_count() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x").with_ids([ids[2].clone(), ids[8].clone(), "unknown".to_string()]);

        let page = run(&engine, query).await;
        assert_eq!(names(&page), vec!["Name2", "Name8"]);
        assert_eq!(page.total_count, 2);
    }

    #[tokio::test]
    async fn owner_filter_excluding_tenant_matches_nothing() {
        let (engine, _) = seeded().await;
        let page = run(&engine, SearchQuery::for_tenant("x").with_owners(["y"])).await;
        assert!(page.edges.is_empty());
        assert_eq!(page.total_count, 0);
        assert_eq!(page.page_info, PageInfo::default());
    }

    #[tokio::test]
    async fn unknown_tenant_yields_empty_page() {
        let (engine, _) = seeded().await;
        let page = run(&engine, SearchQuery::for_tenant("nobody")).await;
        assert_eq!(page, Page::default());
    }

    #[tokio::test]
    async fn repeated_searches_are_deterministic() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x")
            .with_pagination(Pagination::forward(Some(ids[2].clone()), 5))
            .sorted_by(SortKey::desc(SortField::Name));

        let first = run(&engine, query.clone()).await;
        let second = run(&engine, query).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn conflicting_cursors_rejected() {
        let (engine, ids) = seeded().await;
        let query = SearchQuery::for_tenant("x").with_pagination(Pagination {
            after: Some(ids[1].clone()),
            before: Some(ids[5].clone()),
            ..Default::default()
        });
        assert!(engine.search(&query, &CancellationToken::new()).await.is_err());
    }
}
