//! In-memory [`WorkItemService`] for tests.

use super::{
    BacklogLevel, BacklogWorkItemRef, RawWorkItem, RelationAttributes, WiqlResponse,
    WorkItemReference, WorkItemRelation, WorkItemService,
};
use crate::error::{Error, Result};
use crate::wiql::HIERARCHY_FORWARD;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A scripted Azure DevOps stand-in.
///
/// Items and forward-hierarchy links are held in memory. Link queries built by
/// [`child_links_query`](crate::wiql::child_links_query) are answered from the
/// link table (root row first, like the real service); every other WIQL query
/// answers with the ids given to [`with_query_result`](Self::with_query_result).
///
/// Every call is recorded so tests can assert on the requests issued.
///
/// # Example
///
/// ```rust,ignore
/// let mock = MockWorkItemService::new()
///     .with_item(1, "Epic", "Checkout")
///     .with_item(2, "Feature", "Payments")
///     .with_child(1, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockWorkItemService {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    items: BTreeMap<u32, RawWorkItem>,
    links: Vec<(u32, u32)>,
    query_result: Vec<u32>,
    backlog: Option<(BacklogLevel, Vec<u32>)>,
    failing_ids: HashSet<u32>,
    failing_parents: HashSet<u32>,
    fail_queries: bool,
    fail_backlogs: bool,
    batch_requests: Vec<Vec<u32>>,
    queries: Vec<String>,
    backlog_requests: usize,
    close_calls: usize,
}

impl MockWorkItemService {
    /// An empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state());
        self
    }

    /// Add an item in state `New`.
    #[must_use]
    pub fn with_item(self, id: u32, work_item_type: &str, title: &str) -> Self {
        self.with_item_in_state(id, work_item_type, title, "New")
    }

    /// Add an item in the given state.
    #[must_use]
    pub fn with_item_in_state(
        self,
        id: u32,
        work_item_type: &str,
        title: &str,
        state: &str,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert("System.Title".into(), json!(title));
        fields.insert("System.WorkItemType".into(), json!(work_item_type));
        fields.insert("System.State".into(), json!(state));
        fields.insert("System.CreatedDate".into(), json!("2024-01-01T00:00:00Z"));
        fields.insert("System.ChangedDate".into(), json!("2024-01-02T00:00:00Z"));
        self.with_raw_item(RawWorkItem {
            id: Some(id),
            fields,
        })
    }

    /// Add an item exactly as the service would return it.
    ///
    /// Records without an id are ignored.
    #[must_use]
    pub fn with_raw_item(self, raw: RawWorkItem) -> Self {
        self.with_state(|s| {
            if let Some(id) = raw.id {
                s.items.insert(id, raw);
            }
        })
    }

    /// Link `child` under `parent` with a forward-hierarchy link.
    #[must_use]
    pub fn with_child(self, parent: u32, child: u32) -> Self {
        self.with_state(|s| s.links.push((parent, child)))
    }

    /// Ids returned by any flat WIQL query.
    #[must_use]
    pub fn with_query_result(self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.with_state(|s| s.query_result = ids.into_iter().collect())
    }

    /// A single backlog level holding the given item ids.
    #[must_use]
    pub fn with_backlog(self, level_id: &str, ids: impl IntoIterator<Item = u32>) -> Self {
        let level = BacklogLevel {
            id: level_id.to_string(),
            name: Some(level_id.to_string()),
        };
        self.with_state(|s| s.backlog = Some((level, ids.into_iter().collect())))
    }

    /// Fail any item batch that contains `id`.
    #[must_use]
    pub fn fail_batches_containing(self, id: u32) -> Self {
        self.with_state(|s| {
            s.failing_ids.insert(id);
        })
    }

    /// Fail link queries whose source is `parent`.
    #[must_use]
    pub fn fail_children_of(self, parent: u32) -> Self {
        self.with_state(|s| {
            s.failing_parents.insert(parent);
        })
    }

    /// Fail every WIQL query.
    #[must_use]
    pub fn failing_queries(self) -> Self {
        self.with_state(|s| s.fail_queries = true)
    }

    /// Fail the backlog endpoints.
    #[must_use]
    pub fn failing_backlogs(self) -> Self {
        self.with_state(|s| s.fail_backlogs = true)
    }

    /// Id lists of every item batch requested, in call order.
    #[must_use]
    pub fn batch_requests(&self) -> Vec<Vec<u32>> {
        self.state().batch_requests.clone()
    }

    /// Text of every WIQL query executed, in call order.
    #[must_use]
    pub fn executed_queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    /// Total number of remote calls of any kind.
    #[must_use]
    pub fn request_count(&self) -> usize {
        let state = self.state();
        state.batch_requests.len() + state.queries.len() + state.backlog_requests
    }

    /// How many times `close` was called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }
}

fn mock_failure(what: &str) -> Error {
    Error::RemoteService {
        status: 500,
        url: format!("mock://{what}"),
        body: "injected failure".to_string(),
    }
}

/// Extract `(parent id, target type)` from a child link query.
fn parse_link_query(query: &str) -> Option<(u32, String)> {
    let source = query.split("[Source].[System.Id] = ").nth(1)?;
    let parent = source.split_whitespace().next()?.parse().ok()?;
    let target = query
        .split("[Target].[System.WorkItemType] = '")
        .nth(1)?
        .split('\'')
        .next()?;
    Some((parent, target.to_string()))
}

fn item_type(item: &RawWorkItem) -> Option<&str> {
    item.fields.get("System.WorkItemType").and_then(Value::as_str)
}

impl MockState {
    fn link_response(&self, parent: u32, target_type: &str) -> WiqlResponse {
        let mut rows = vec![WorkItemRelation {
            target: Some(WorkItemReference::new(parent)),
            ..WorkItemRelation::default()
        }];
        rows.extend(
            self.links
                .iter()
                .filter(|(source, child)| {
                    *source == parent
                        && self.items.get(child).and_then(item_type) == Some(target_type)
                })
                .map(|(source, child)| WorkItemRelation {
                    rel: Some(HIERARCHY_FORWARD.to_string()),
                    source: Some(WorkItemReference::new(*source)),
                    target: Some(WorkItemReference::new(*child)),
                    attributes: Some(RelationAttributes::default()),
                }),
        );
        WiqlResponse {
            work_items: Vec::new(),
            work_item_relations: rows,
        }
    }
}

#[async_trait]
impl WorkItemService for MockWorkItemService {
    async fn get_work_items_batch(
        &self,
        ids: &[u32],
        _project: Option<&str>,
    ) -> Result<Vec<RawWorkItem>> {
        let mut state = self.state();
        state.batch_requests.push(ids.to_vec());

        if ids.iter().any(|id| state.failing_ids.contains(id)) {
            return Err(mock_failure("wit/workitems"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.items.get(id).cloned())
            .collect())
    }

    async fn execute_wiql(&self, query: &str, _project: Option<&str>) -> Result<WiqlResponse> {
        let mut state = self.state();
        state.queries.push(query.to_string());

        if state.fail_queries {
            return Err(mock_failure("wit/wiql"));
        }

        if query.contains("FROM WorkItemLinks") {
            let Some((parent, target_type)) = parse_link_query(query) else {
                return Ok(WiqlResponse::default());
            };
            if state.failing_parents.contains(&parent) {
                return Err(mock_failure("wit/wiql"));
            }
            return Ok(state.link_response(parent, &target_type));
        }

        Ok(WiqlResponse {
            work_items: state
                .query_result
                .iter()
                .copied()
                .map(WorkItemReference::new)
                .collect(),
            work_item_relations: Vec::new(),
        })
    }

    async fn list_backlogs(
        &self,
        _project: Option<&str>,
        _team: Option<&str>,
    ) -> Result<Vec<BacklogLevel>> {
        let mut state = self.state();
        state.backlog_requests += 1;

        if state.fail_backlogs {
            return Err(mock_failure("work/backlogs"));
        }
        Ok(state
            .backlog
            .as_ref()
            .map(|(level, _)| vec![level.clone()])
            .unwrap_or_default())
    }

    async fn backlog_work_items(
        &self,
        backlog_id: &str,
        _project: Option<&str>,
        _team: Option<&str>,
    ) -> Result<Vec<BacklogWorkItemRef>> {
        let mut state = self.state();
        state.backlog_requests += 1;

        if state.fail_backlogs {
            return Err(mock_failure("work/backlogs/workItems"));
        }
        Ok(state
            .backlog
            .iter()
            .filter(|(level, _)| level.id == backlog_id)
            .flat_map(|(_, ids)| ids.iter())
            .map(|id| BacklogWorkItemRef {
                target: WorkItemReference::new(*id),
            })
            .collect())
    }

    async fn close(&self) {
        self.state().close_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wiql::child_links_query;

    #[test]
    fn test_parse_link_query_roundtrips_builder_output() {
        assert_eq!(
            parse_link_query(&child_links_query(17, "User Story")),
            Some((17, "User Story".to_string()))
        );
        assert_eq!(parse_link_query("SELECT [System.Id] FROM WorkItems"), None);
    }

    #[tokio::test]
    async fn test_link_response_filters_by_type() {
        let mock = MockWorkItemService::new()
            .with_item(1, "Epic", "E")
            .with_item(2, "Feature", "F")
            .with_item(3, "Bug", "B")
            .with_child(1, 2)
            .with_child(1, 3);

        let response = mock
            .execute_wiql(&child_links_query(1, "Feature"), None)
            .await
            .unwrap();
        let targets: Vec<u32> = response
            .work_item_relations
            .iter()
            .filter_map(|r| r.target.as_ref().map(|t| t.id))
            .collect();

        assert_eq!(targets, vec![1, 2]);
        assert_eq!(mock.request_count(), 1);
    }
}
