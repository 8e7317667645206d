//! Remote Item Service abstraction.
//!
//! The [`WorkItemService`] trait is the only seam between the query core and
//! Azure DevOps. [`AzureDevOpsClient`] implements it over HTTPS; tests use
//! [`MockWorkItemService`], which is available to downstream crates through the
//! `test-util` feature:
//!
//! ```toml
//! [dev-dependencies]
//! azdo-boards = { path = "...", features = ["test-util"] }
//! ```
//!
//! The trait is object-safe so callers can hold an `Arc<dyn WorkItemService>`.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod http;
#[cfg(any(test, feature = "test-util"))]
mod mock;

pub use http::AzureDevOpsClient;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockWorkItemService;

/// Operations the query core needs from Azure DevOps.
///
/// `project` and `team` arguments of `None` mean "the configured default".
#[async_trait]
pub trait WorkItemService: Send + Sync {
    /// Fetch up to 200 work items by id with all fields expanded.
    ///
    /// Records come back in the order the service returns them.
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteService` for a non-2xx answer, or a transport or
    /// decoding error.
    async fn get_work_items_batch(
        &self,
        ids: &[u32],
        project: Option<&str>,
    ) -> Result<Vec<RawWorkItem>>;

    /// Execute a WIQL query.
    ///
    /// # Errors
    ///
    /// Returns `Error::RemoteService` for a non-2xx answer, or a transport or
    /// decoding error.
    async fn execute_wiql(&self, query: &str, project: Option<&str>) -> Result<WiqlResponse>;

    /// List the backlog levels of a project, optionally scoped to a team.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_backlogs(
        &self,
        project: Option<&str>,
        team: Option<&str>,
    ) -> Result<Vec<BacklogLevel>>;

    /// List the item references of one backlog level.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn backlog_work_items(
        &self,
        backlog_id: &str,
        project: Option<&str>,
        team: Option<&str>,
    ) -> Result<Vec<BacklogWorkItemRef>>;

    /// Release the shared connection. Later calls reopen it.
    async fn close(&self) {}
}

/// A work item as returned by the items endpoint: an id and a field bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWorkItem {
    /// Identifier.
    pub id: Option<u32>,
    /// Field values keyed by reference name, e.g. `System.Title`.
    pub fields: Map<String, Value>,
}

/// Envelope of the items endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkItemsResponse {
    /// The returned items.
    pub value: Vec<RawWorkItem>,
}

/// Result of a WIQL query.
///
/// Flat queries fill `work_items`; link queries fill `work_item_relations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WiqlResponse {
    /// Flat item references.
    pub work_items: Vec<WorkItemReference>,
    /// Relation rows of a link query.
    pub work_item_relations: Vec<WorkItemRelation>,
}

/// A reference to a work item by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemReference {
    /// Identifier.
    pub id: u32,
    /// REST URL of the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl WorkItemReference {
    /// A reference without URL.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, url: None }
    }
}

/// One row of a link query.
///
/// The root row of a link query has no `source` and no `rel`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItemRelation {
    /// Link type reference name.
    pub rel: Option<String>,
    /// Link source.
    pub source: Option<WorkItemReference>,
    /// Link target.
    pub target: Option<WorkItemReference>,
    /// Link attributes.
    pub attributes: Option<RelationAttributes>,
}

/// Attributes attached to a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationAttributes {
    /// Free-text comment.
    pub comment: Option<String>,
}

/// A backlog level of a team, e.g. "Stories".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogLevel {
    /// Level identifier, e.g. `Microsoft.RequirementCategory`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// An entry of a backlog level listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogWorkItemRef {
    /// The referenced item.
    pub target: WorkItemReference,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wiql_response_flat_shape() {
        let response: WiqlResponse = serde_json::from_value(json!({
            "queryType": "flat",
            "workItems": [{"id": 1, "url": "https://x/1"}, {"id": 2}]
        }))
        .unwrap();

        assert_eq!(response.work_items.len(), 2);
        assert_eq!(response.work_items[1].id, 2);
        assert!(response.work_item_relations.is_empty());
    }

    #[test]
    fn test_wiql_response_link_shape() {
        let response: WiqlResponse = serde_json::from_value(json!({
            "queryType": "oneHop",
            "workItemRelations": [
                {"rel": null, "source": null, "target": {"id": 1}},
                {
                    "rel": "System.LinkTypes.Hierarchy-Forward",
                    "source": {"id": 1},
                    "target": {"id": 2},
                    "attributes": {"comment": "split out", "isLocked": false}
                }
            ]
        }))
        .unwrap();

        let rows = &response.work_item_relations;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].rel.is_none());
        assert!(rows[0].source.is_none());
        assert_eq!(rows[1].target.as_ref().map(|t| t.id), Some(2));
        assert_eq!(
            rows[1].attributes.as_ref().and_then(|a| a.comment.as_deref()),
            Some("split out")
        );
    }

    #[test]
    fn test_raw_work_item_without_fields() {
        let raw: RawWorkItem = serde_json::from_value(json!({"id": 9})).unwrap();
        assert_eq!(raw.id, Some(9));
        assert!(raw.fields.is_empty());
    }
}
