//! Query execution against the Remote Item Service.

use crate::batch::{self, BatchReport};
use crate::domain::{BacklogItem, WorkItem, WorkItemLink};
use crate::error::Result;
use crate::remote::{WiqlResponse, WorkItemService};
use crate::wiql;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs WIQL and resolves the references it returns.
///
/// Cloning is cheap; clones share the underlying service handle.
#[derive(Clone)]
pub struct QueryExecutor {
    service: Arc<dyn WorkItemService>,
}

impl QueryExecutor {
    /// Wrap a service handle.
    pub fn new(service: Arc<dyn WorkItemService>) -> Self {
        Self { service }
    }

    /// Execute a query and return the raw response.
    ///
    /// # Errors
    ///
    /// Propagates any remote failure.
    pub async fn run(&self, query: &str, project: Option<&str>) -> Result<WiqlResponse> {
        self.service.execute_wiql(query, project).await
    }

    /// Resolve ids into items through the batch fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error only when a single-request fetch fails.
    pub async fn fetch_items(&self, ids: &[u32], project: Option<&str>) -> Result<Vec<WorkItem>> {
        batch::fetch_items(self.service.as_ref(), ids, project).await
    }

    /// Resolve ids into items, reporting failed chunks alongside the items
    /// that were fetched.
    ///
    /// # Errors
    ///
    /// Returns an error only when a single-request fetch fails.
    pub async fn fetch_items_report(
        &self,
        ids: &[u32],
        project: Option<&str>,
    ) -> Result<BatchReport> {
        batch::fetch_items_report(self.service.as_ref(), ids, project).await
    }

    /// Execute a flat query and resolve every referenced item.
    ///
    /// # Errors
    ///
    /// Propagates query failures and single-request fetch failures.
    pub async fn items_by_query(
        &self,
        query: &str,
        project: Option<&str>,
    ) -> Result<Vec<WorkItem>> {
        self.items_by_query_top(query, project, None).await
    }

    /// Execute a flat query and resolve at most `limit` of the referenced
    /// items, keeping the query's order.
    ///
    /// Ids beyond the limit are never fetched.
    ///
    /// # Errors
    ///
    /// Propagates query failures and single-request fetch failures.
    pub async fn items_by_query_top(
        &self,
        query: &str,
        project: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        let response = self.run(query, project).await?;
        let mut ids: Vec<u32> = response.work_items.iter().map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(limit) = limit {
            ids.truncate(limit);
        }
        debug!(count = ids.len(), "Resolving query results");
        self.fetch_items(&ids, project).await
    }

    /// Execute a link query and return its relations unresolved.
    ///
    /// Rows without a link type, source or target (such as the root row of a
    /// one-hop query) are skipped.
    ///
    /// # Errors
    ///
    /// Propagates any remote failure.
    pub async fn links_by_query(
        &self,
        query: &str,
        project: Option<&str>,
    ) -> Result<Vec<WorkItemLink>> {
        let response = self.run(query, project).await?;
        let links = response
            .work_item_relations
            .into_iter()
            .filter_map(|relation| {
                Some(WorkItemLink {
                    source_id: relation.source?.id,
                    target_id: relation.target?.id,
                    link_type: relation.rel.filter(|r| !r.is_empty())?,
                    comment: relation.attributes.and_then(|a| a.comment),
                })
            })
            .collect();
        Ok(links)
    }

    /// Items on the first backlog level of a team.
    ///
    /// Any failure of the backlog endpoints falls back to a WIQL query over
    /// backlog item types ordered by priority.
    ///
    /// # Errors
    ///
    /// Returns an error only when the fallback query fails too.
    pub async fn backlog_items(
        &self,
        team: Option<&str>,
        project: Option<&str>,
    ) -> Result<Vec<BacklogItem>> {
        match self.backlog_from_endpoints(team, project).await {
            Ok(items) => Ok(items),
            Err(error) => {
                warn!(%error, "Backlog endpoints failed; falling back to WIQL");
                let items = self
                    .items_by_query(&wiql::backlog_fallback_query(), project)
                    .await?;
                Ok(items.into_iter().map(BacklogItem::from).collect())
            }
        }
    }

    async fn backlog_from_endpoints(
        &self,
        team: Option<&str>,
        project: Option<&str>,
    ) -> Result<Vec<BacklogItem>> {
        let levels = self.service.list_backlogs(project, team).await?;
        let Some(level) = levels.first() else {
            debug!("No backlog levels configured");
            return Ok(Vec::new());
        };

        let refs = self
            .service
            .backlog_work_items(&level.id, project, team)
            .await?;
        let ids: Vec<u32> = refs.iter().map(|r| r.target.id).collect();
        let items = self.fetch_items(&ids, project).await?;
        Ok(items.into_iter().map(BacklogItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::remote::MockWorkItemService;
    use crate::wiql::{HIERARCHY_FORWARD, child_links_query};

    fn executor(mock: MockWorkItemService) -> (QueryExecutor, Arc<MockWorkItemService>) {
        let mock = Arc::new(mock);
        (QueryExecutor::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_empty_reference_list_skips_fetch() {
        let (executor, mock) = executor(MockWorkItemService::new());
        let items = executor.items_by_query("SELECT ...", None).await.unwrap();

        assert!(items.is_empty());
        assert_eq!(mock.executed_queries().len(), 1);
        assert!(mock.batch_requests().is_empty());
    }

    #[tokio::test]
    async fn test_items_by_query_preserves_query_order() {
        let (executor, _) = executor(
            MockWorkItemService::new()
                .with_item(1, "Bug", "a")
                .with_item(2, "Bug", "b")
                .with_item(3, "Bug", "c")
                .with_query_result([3, 1, 2]),
        );
        let items = executor.items_by_query("SELECT ...", None).await.unwrap();
        let ids: Vec<u32> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_limit_truncates_before_fetch() {
        let (executor, mock) = executor(
            MockWorkItemService::new()
                .with_item(1, "Bug", "a")
                .with_item(2, "Bug", "b")
                .with_item(3, "Bug", "c")
                .with_query_result([1, 2, 3]),
        );
        let items = executor
            .items_by_query_top("SELECT ...", None, Some(2))
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(mock.batch_requests(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn test_links_skip_root_row() {
        let (executor, _) = executor(
            MockWorkItemService::new()
                .with_item(1, "Epic", "e")
                .with_item(2, "Feature", "f")
                .with_child(1, 2),
        );
        let links = executor
            .links_by_query(&child_links_query(1, "Feature"), None)
            .await
            .unwrap();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].source_id, 1);
        assert_eq!(links[0].target_id, 2);
        assert_eq!(links[0].link_type, HIERARCHY_FORWARD);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let (executor, _) = executor(MockWorkItemService::new().failing_queries());
        let result = executor.items_by_query("SELECT ...", None).await;
        assert!(matches!(result, Err(Error::RemoteService { .. })));
    }

    #[tokio::test]
    async fn test_backlog_from_endpoints() {
        let (executor, mock) = executor(
            MockWorkItemService::new()
                .with_item(5, "User Story", "s")
                .with_item(6, "User Story", "t")
                .with_backlog("Microsoft.RequirementCategory", [6, 5]),
        );
        let items = executor.backlog_items(Some("Web"), None).await.unwrap();

        let ids: Vec<u32> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![6, 5]);
        assert!(items.iter().all(|i| i.priority.is_none()));
        assert!(mock.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_backlog_without_levels_is_empty() {
        let (executor, mock) = executor(MockWorkItemService::new());
        let items = executor.backlog_items(None, None).await.unwrap();

        assert!(items.is_empty());
        assert!(mock.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_backlog_falls_back_to_wiql() {
        let (executor, mock) = executor(
            MockWorkItemService::new()
                .with_item(8, "Feature", "f")
                .with_query_result([8])
                .failing_backlogs(),
        );
        let items = executor.backlog_items(None, None).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 8);
        let queries = mock.executed_queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("[Microsoft.VSTS.Common.Priority] ASC"));
    }
}
