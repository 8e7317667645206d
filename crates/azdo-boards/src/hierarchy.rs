//! Epic hierarchy discovery.
//!
//! Walks Epic → Features → User Stories → Tasks and Bugs by running one
//! forward-hierarchy link query per parent and resolving the returned ids.
//! Only the root lookup can fail the walk. A failing child lookup leaves that
//! parent without the affected children and is recorded on the result.

use crate::batch::BatchReport;
use crate::domain::{
    BUG, EPIC, EpicHierarchy, FEATURE, FailedLookup, FeatureNode, TASK, USER_STORY,
    UserStoryNode, WorkItem,
};
use crate::error::{Error, Result};
use crate::executor::QueryExecutor;
use crate::wiql::{self, HIERARCHY_FORWARD};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

/// Sibling subtrees walked at the same time.
pub const DEFAULT_CONCURRENCY: usize = 4;

type Lookup = (Vec<WorkItem>, Vec<FailedLookup>);

/// Builds [`EpicHierarchy`] trees.
#[derive(Clone)]
pub struct HierarchyWalker {
    executor: QueryExecutor,
    project: Option<String>,
    concurrency: usize,
}

impl HierarchyWalker {
    /// A walker over the configured project.
    #[must_use]
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            project: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Target another project.
    #[must_use]
    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project.filter(|p| !p.is_empty());
        self
    }

    /// Limit how many sibling subtrees are walked at once (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Build the full tree under an Epic.
    ///
    /// Children keep the order the service returned them in.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if no item has this id
    /// - `Error::TypeMismatch` if the item is not an Epic
    /// - any other root lookup failure
    pub async fn walk_epic(&self, epic_id: u32) -> Result<EpicHierarchy> {
        let epic = self.root(epic_id).await?;
        info!(epic_id, title = %epic.title, "Walking epic hierarchy");

        let mut failed_lookups = Vec::new();
        let (features, failures) = self.children(epic_id, FEATURE).await;
        failed_lookups.extend(failures);

        let pending: Vec<_> = features.into_iter().map(|f| self.walk_feature(f)).collect();
        let walked: Vec<(FeatureNode, Vec<FailedLookup>)> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut feature_nodes = Vec::with_capacity(walked.len());
        for (node, failures) in walked {
            feature_nodes.push(node);
            failed_lookups.extend(failures);
        }

        let hierarchy = EpicHierarchy {
            epic,
            features: feature_nodes,
            failed_lookups,
        };
        if !hierarchy.failed_lookups.is_empty() {
            warn!(
                failed = hierarchy.failed_lookups.len(),
                "Hierarchy is incomplete; some child lookups failed"
            );
        }
        debug!(items = hierarchy.item_count(), "Hierarchy walk finished");
        Ok(hierarchy)
    }

    async fn root(&self, epic_id: u32) -> Result<WorkItem> {
        let items = match self.executor.fetch_items(&[epic_id], self.project()).await {
            Ok(items) => items,
            Err(Error::RemoteService { status: 404, .. }) => return Err(Error::NotFound(epic_id)),
            Err(e) => return Err(e),
        };

        let epic = items
            .into_iter()
            .find(|item| item.id == epic_id)
            .ok_or(Error::NotFound(epic_id))?;
        if !epic.is_type(EPIC) {
            return Err(Error::TypeMismatch {
                id: epic_id,
                expected: EPIC,
                actual: epic.work_item_type,
            });
        }
        Ok(epic)
    }

    async fn walk_feature(&self, feature: WorkItem) -> (FeatureNode, Vec<FailedLookup>) {
        let (stories, mut failures) = self.children(feature.id, USER_STORY).await;

        let pending: Vec<_> = stories.into_iter().map(|s| self.walk_story(s)).collect();
        let walked: Vec<(UserStoryNode, Vec<FailedLookup>)> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut user_stories = Vec::with_capacity(walked.len());
        for (node, story_failures) in walked {
            user_stories.push(node);
            failures.extend(story_failures);
        }

        let node = FeatureNode {
            work_item: feature,
            user_stories,
        };
        (node, failures)
    }

    async fn walk_story(&self, story: WorkItem) -> (UserStoryNode, Vec<FailedLookup>) {
        let ((tasks, task_failures), (bugs, bug_failures)) =
            futures::join!(self.children(story.id, TASK), self.children(story.id, BUG));

        let node = UserStoryNode {
            work_item: story,
            tasks,
            bugs,
        };
        let failures = task_failures.into_iter().chain(bug_failures).collect();
        (node, failures)
    }

    /// Children lookup with failure containment.
    ///
    /// A failed query leaves the parent without children; failed item chunks
    /// drop only their own children. Each failure is recorded.
    async fn children(&self, parent_id: u32, target_type: &str) -> Lookup {
        let failed = |message: String| FailedLookup {
            parent_id,
            target_type: target_type.to_string(),
            message,
        };

        match self.child_report(parent_id, target_type).await {
            Ok(report) => {
                let failures = report
                    .failures
                    .iter()
                    .map(|chunk| {
                        warn!(parent_id, target_type, error = %chunk.error, "Child chunk failed");
                        failed(format!(
                            "{} of the children could not be fetched: {}",
                            chunk.size, chunk.error
                        ))
                    })
                    .collect();
                (report.items, failures)
            }
            Err(error) => {
                warn!(parent_id, target_type, %error, "Child lookup failed");
                (Vec::new(), vec![failed(error.to_string())])
            }
        }
    }

    /// Direct children of `parent_id` with the given type, in link order,
    /// along with any item chunks that could not be fetched.
    ///
    /// # Errors
    ///
    /// Propagates the link query failure or a single-request fetch failure.
    pub async fn child_report(&self, parent_id: u32, target_type: &str) -> Result<BatchReport> {
        let query = wiql::child_links_query(parent_id, target_type);
        let links = self.executor.links_by_query(&query, self.project()).await?;

        let ids: Vec<u32> = links
            .iter()
            .filter(|link| link.source_id == parent_id && link.link_type == HIERARCHY_FORWARD)
            .map(|link| link.target_id)
            .collect();
        debug!(parent_id, target_type, children = ids.len(), "Resolved child links");

        let mut report = self.executor.fetch_items_report(&ids, self.project()).await?;
        report.items.retain(|item| item.is_type(target_type));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockWorkItemService;
    use std::sync::Arc;

    fn walker(mock: MockWorkItemService) -> (HierarchyWalker, Arc<MockWorkItemService>) {
        let mock = Arc::new(mock);
        (HierarchyWalker::new(QueryExecutor::new(mock.clone())), mock)
    }

    fn sample_tree() -> MockWorkItemService {
        MockWorkItemService::new()
            .with_item(1, EPIC, "Checkout")
            .with_item(2, FEATURE, "Payments")
            .with_item(3, USER_STORY, "Pay by card")
            .with_item(4, TASK, "Wire up gateway")
            .with_item(5, BUG, "Declined cards crash")
            .with_child(1, 2)
            .with_child(2, 3)
            .with_child(3, 4)
            .with_child(3, 5)
    }

    #[tokio::test]
    async fn test_walk_epic_builds_four_levels() {
        let (walker, _) = walker(sample_tree());
        let tree = walker.walk_epic(1).await.unwrap();

        assert_eq!(tree.epic.id, 1);
        assert_eq!(tree.features.len(), 1);
        let feature = &tree.features[0];
        assert_eq!(feature.work_item.id, 2);
        assert_eq!(feature.user_stories.len(), 1);
        let story = &feature.user_stories[0];
        assert_eq!(story.work_item.id, 3);
        assert_eq!(story.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![4]);
        assert_eq!(story.bugs.iter().map(|b| b.id).collect::<Vec<_>>(), vec![5]);
        assert!(tree.failed_lookups.is_empty());
        assert_eq!(tree.item_count(), 5);
    }

    #[tokio::test]
    async fn test_walk_epic_issues_one_query_per_parent() {
        let (walker, mock) = walker(sample_tree());
        walker.walk_epic(1).await.unwrap();

        // Epic -> Features, Feature -> Stories, Story -> Tasks and Bugs.
        assert_eq!(mock.executed_queries().len(), 4);
    }

    #[tokio::test]
    async fn test_walk_epic_rejects_non_epic_root() {
        let (walker, _) = walker(sample_tree());
        let result = walker.walk_epic(5).await;

        match result {
            Err(Error::TypeMismatch {
                id,
                expected,
                actual,
            }) => {
                assert_eq!(id, 5);
                assert_eq!(expected, "Epic");
                assert_eq!(actual, "Bug");
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_walk_epic_missing_root() {
        let (walker, mock) = walker(sample_tree());
        let result = walker.walk_epic(99).await;

        assert!(matches!(result, Err(Error::NotFound(99))));
        assert!(mock.executed_queries().is_empty());
    }

    #[tokio::test]
    async fn test_walk_epic_without_features() {
        let (walker, _) = walker(MockWorkItemService::new().with_item(1, EPIC, "Lonely"));
        let tree = walker.walk_epic(1).await.unwrap();

        assert!(tree.features.is_empty());
        assert_eq!(tree.item_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_child_lookup_is_contained() {
        let mock = sample_tree()
            .with_item(6, FEATURE, "Refunds")
            .with_item(7, USER_STORY, "Refund to card")
            .with_child(1, 6)
            .with_child(6, 7)
            .fail_children_of(2);
        let (walker, _) = walker(mock);
        let tree = walker.walk_epic(1).await.unwrap();

        let ids: Vec<u32> = tree.features.iter().map(|f| f.work_item.id).collect();
        assert_eq!(ids, vec![2, 6]);
        assert!(tree.features[0].user_stories.is_empty());
        assert_eq!(tree.features[1].user_stories.len(), 1);

        assert_eq!(tree.failed_lookups.len(), 1);
        assert_eq!(tree.failed_lookups[0].parent_id, 2);
        assert_eq!(tree.failed_lookups[0].target_type, USER_STORY);
    }

    #[tokio::test]
    async fn test_failed_child_chunk_is_reported() {
        let mock = (100..=300)
            .fold(
                MockWorkItemService::new()
                    .with_item(1, EPIC, "Checkout")
                    .with_item(2, FEATURE, "Payments")
                    .with_child(1, 2),
                |mock, id| mock.with_item(id, USER_STORY, "Story").with_child(2, id),
            )
            .fail_batches_containing(300);
        let (walker, _) = walker(mock);
        let tree = walker.walk_epic(1).await.unwrap();

        let stories = &tree.features[0].user_stories;
        assert_eq!(stories.len(), 200);
        assert_eq!(stories.last().map(|s| s.work_item.id), Some(299));

        assert_eq!(tree.failed_lookups.len(), 1);
        let failure = &tree.failed_lookups[0];
        assert_eq!(failure.parent_id, 2);
        assert_eq!(failure.target_type, USER_STORY);
        assert!(failure.message.starts_with("1 of the children"), "{}", failure.message);
        assert!(crate::render::render_markdown(&tree).contains("## Incomplete Results"));
    }

    #[tokio::test]
    async fn test_children_keep_link_order() {
        let mock = MockWorkItemService::new()
            .with_item(1, EPIC, "e")
            .with_item(30, FEATURE, "c")
            .with_item(10, FEATURE, "a")
            .with_item(20, FEATURE, "b")
            .with_child(1, 30)
            .with_child(1, 10)
            .with_child(1, 20);
        let (walker, _) = walker(mock);
        let tree = walker.with_concurrency(1).walk_epic(1).await.unwrap();

        let ids: Vec<u32> = tree.features.iter().map(|f| f.work_item.id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }
}
