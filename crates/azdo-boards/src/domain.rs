//! Domain types for Azure DevOps Boards.
//!
//! Work items are read-only snapshots fetched on demand; nothing here is
//! persisted or mutated after construction.

use crate::remote::RawWorkItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Work item type tag for epics.
pub const EPIC: &str = "Epic";
/// Work item type tag for features.
pub const FEATURE: &str = "Feature";
/// Work item type tag for user stories.
pub const USER_STORY: &str = "User Story";
/// Work item type tag for tasks.
pub const TASK: &str = "Task";
/// Work item type tag for bugs.
pub const BUG: &str = "Bug";

/// A snapshot of a single work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Service-assigned identifier (always positive).
    pub id: u32,

    /// Work item title.
    pub title: String,

    /// Type tag, e.g. "Epic" or "User Story".
    pub work_item_type: String,

    /// Current state, e.g. "Active".
    pub state: String,

    /// Display name of the assignee.
    pub assigned_to: Option<String>,

    /// Creation timestamp as reported by the service.
    pub created_date: String,

    /// Last-changed timestamp as reported by the service.
    pub changed_date: String,

    /// Description (HTML as stored by the service).
    pub description: Option<String>,

    /// Raw tag string (`;`-separated by the service).
    pub tags: Option<String>,
}

impl WorkItem {
    /// Map a raw `{id, fields}` record.
    ///
    /// Missing fields degrade to empty strings or `None`; a record without a
    /// positive id yields `None`.
    #[must_use]
    pub fn from_raw(raw: &RawWorkItem) -> Option<Self> {
        let id = raw.id.filter(|id| *id > 0)?;
        let text = |name: &str| raw.fields.get(name).and_then(Value::as_str);
        let owned = |name: &str| text(name).unwrap_or_default().to_string();

        Some(Self {
            id,
            title: owned("System.Title"),
            work_item_type: owned("System.WorkItemType"),
            state: owned("System.State"),
            assigned_to: raw
                .fields
                .get("System.AssignedTo")
                .and_then(|a| a.get("displayName"))
                .and_then(Value::as_str)
                .map(str::to_string),
            created_date: owned("System.CreatedDate"),
            changed_date: owned("System.ChangedDate"),
            description: text("System.Description").map(str::to_string),
            tags: text("System.Tags").map(str::to_string),
        })
    }

    /// Whether this item carries the given type tag.
    #[must_use]
    pub fn is_type(&self, work_item_type: &str) -> bool {
        self.work_item_type == work_item_type
    }
}

/// A backlog-scoped projection of a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogItem {
    /// Work item identifier.
    pub id: u32,
    /// Work item title.
    pub title: String,
    /// Type tag.
    pub work_item_type: String,
    /// Current state.
    pub state: String,
    /// Backlog priority. Not yet extracted from the service response.
    pub priority: Option<i64>,
    /// Story points. Not yet extracted from the service response.
    pub story_points: Option<f64>,
    /// Display name of the assignee.
    pub assigned_to: Option<String>,
}

impl From<WorkItem> for BacklogItem {
    fn from(item: WorkItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            work_item_type: item.work_item_type,
            state: item.state,
            priority: None,
            story_points: None,
            assigned_to: item.assigned_to,
        }
    }
}

/// A directed relation between two work items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemLink {
    /// Identifier of the source item.
    pub source_id: u32,
    /// Identifier of the target item.
    pub target_id: u32,
    /// Relation type, e.g. `System.LinkTypes.Hierarchy-Forward`.
    pub link_type: String,
    /// Optional relation comment.
    pub comment: Option<String>,
}

/// An Epic and everything beneath it, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct EpicHierarchy {
    /// The root Epic.
    pub epic: WorkItem,
    /// Features under the Epic.
    pub features: Vec<FeatureNode>,
    /// Child lookups that failed and contributed no children.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_lookups: Vec<FailedLookup>,
}

impl EpicHierarchy {
    /// Total number of items in the tree, the Epic included.
    #[must_use]
    pub fn item_count(&self) -> usize {
        1 + self
            .features
            .iter()
            .map(|f| {
                1 + f
                    .user_stories
                    .iter()
                    .map(|s| 1 + s.tasks.len() + s.bugs.len())
                    .sum::<usize>()
            })
            .sum::<usize>()
    }
}

/// A Feature and its User Stories.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureNode {
    /// The Feature.
    pub work_item: WorkItem,
    /// User Stories under the Feature.
    pub user_stories: Vec<UserStoryNode>,
}

/// A User Story and its Tasks and Bugs.
#[derive(Debug, Clone, Serialize)]
pub struct UserStoryNode {
    /// The User Story.
    pub work_item: WorkItem,
    /// Tasks under the story.
    pub tasks: Vec<WorkItem>,
    /// Bugs under the story.
    pub bugs: Vec<WorkItem>,
}

/// A child lookup that failed during a hierarchy walk.
#[derive(Debug, Clone, Serialize)]
pub struct FailedLookup {
    /// The parent whose children were being discovered.
    pub parent_id: u32,
    /// The child type being looked up.
    pub target_type: String,
    /// Rendered error.
    pub message: String,
}

/// Caller-supplied filter for listing queries.
///
/// Unset fields fall back to [`ConfigDefaults`](crate::config::ConfigDefaults)
/// at query construction time; the defaults themselves are never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Exact states to match; when empty the exclusion flags apply instead.
    pub states: Vec<String>,
    /// Types to match; when empty the default types apply.
    pub work_item_types: Vec<String>,
    /// Assignee display name or email.
    pub assigned_to: Option<String>,
    /// Iteration path scope.
    pub iteration_path: Option<String>,
    /// Area path scope.
    pub area_path: Option<String>,
    /// Target project, overriding the configured one.
    pub project: Option<String>,
    /// Force project scoping on or off for this call.
    pub include_project_filter: Option<bool>,
    /// Result cap.
    pub max_results: Option<usize>,
    /// Exclude `Closed` items when no explicit states are given.
    pub exclude_closed: Option<bool>,
    /// Exclude `Removed` items when no explicit states are given.
    pub exclude_removed: Option<bool>,
}

impl FilterSpec {
    /// An empty filter: every field falls back to the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match exactly these states.
    #[must_use]
    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = states.into_iter().map(Into::into).collect();
        self
    }

    /// Match these work item types.
    #[must_use]
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.work_item_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Match this assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assigned_to = Some(assignee.into());
        self
    }

    /// Scope to an iteration path.
    #[must_use]
    pub fn with_iteration_path(mut self, path: impl Into<String>) -> Self {
        self.iteration_path = Some(path.into());
        self
    }

    /// Scope to an area path.
    #[must_use]
    pub fn with_area_path(mut self, path: impl Into<String>) -> Self {
        self.area_path = Some(path.into());
        self
    }

    /// Target a different project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Force project scoping on or off.
    #[must_use]
    pub fn with_project_filter(mut self, enabled: bool) -> Self {
        self.include_project_filter = Some(enabled);
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Override the closed-state exclusion.
    #[must_use]
    pub fn with_exclude_closed(mut self, exclude: bool) -> Self {
        self.exclude_closed = Some(exclude);
        self
    }

    /// Override the removed-state exclusion.
    #[must_use]
    pub fn with_exclude_removed(mut self, exclude: bool) -> Self {
        self.exclude_removed = Some(exclude);
        self
    }
}

/// Named groups of states configured per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateCategory {
    /// Work in flight.
    Active,
    /// Finished work.
    Completed,
    /// Work awaiting review or test.
    Review,
}

impl StateCategory {
    /// Accepted category names, for error messages.
    pub const VALID_VALUES: &'static str = "active, completed, review";

    /// Parse a category name, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Review => "review",
        };
        write!(f, "{name}")
    }
}

/// A commonly used work item state and what it means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownState {
    /// State name.
    pub state: &'static str,
    /// Human-readable meaning.
    pub description: &'static str,
}

/// Catalog of common states across the built-in process templates.
pub const KNOWN_STATES: &[KnownState] = &[
    KnownState {
        state: "New",
        description: "Newly created work items",
    },
    KnownState {
        state: "Active",
        description: "Work items being actively worked on",
    },
    KnownState {
        state: "In Progress",
        description: "Work items currently in progress",
    },
    KnownState {
        state: "Resolved",
        description: "Work items that have been resolved",
    },
    KnownState {
        state: "Closed",
        description: "Completed work items",
    },
    KnownState {
        state: "Removed",
        description: "Work items that have been removed",
    },
    KnownState {
        state: "Done",
        description: "Completed work items (alternative to Closed)",
    },
    KnownState {
        state: "To Do",
        description: "Work items ready to be started",
    },
    KnownState {
        state: "Doing",
        description: "Work items currently being worked on",
    },
    KnownState {
        state: "Code Review",
        description: "Work items in code review",
    },
    KnownState {
        state: "Testing",
        description: "Work items being tested",
    },
    KnownState {
        state: "Approved",
        description: "Work items that have been approved",
    },
    KnownState {
        state: "Committed",
        description: "Work items that have been committed to",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawWorkItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_from_raw_maps_all_fields() {
        let item = WorkItem::from_raw(&raw(json!({
            "id": 42,
            "fields": {
                "System.Title": "Checkout flow",
                "System.WorkItemType": "User Story",
                "System.State": "Active",
                "System.AssignedTo": {
                    "displayName": "Ada Lovelace",
                    "uniqueName": "ada@contoso.com"
                },
                "System.CreatedDate": "2024-01-02T03:04:05Z",
                "System.ChangedDate": "2024-02-03T04:05:06Z",
                "System.Description": "<p>Pay</p>",
                "System.Tags": "web; payments"
            }
        })))
        .unwrap();

        assert_eq!(item.id, 42);
        assert_eq!(item.title, "Checkout flow");
        assert_eq!(item.work_item_type, "User Story");
        assert_eq!(item.state, "Active");
        assert_eq!(item.assigned_to.as_deref(), Some("Ada Lovelace"));
        assert_eq!(item.created_date, "2024-01-02T03:04:05Z");
        assert_eq!(item.changed_date, "2024-02-03T04:05:06Z");
        assert_eq!(item.description.as_deref(), Some("<p>Pay</p>"));
        assert_eq!(item.tags.as_deref(), Some("web; payments"));
    }

    #[test]
    fn test_from_raw_degrades_missing_fields() {
        let item = WorkItem::from_raw(&raw(json!({"id": 7, "fields": {
            "System.AssignedTo": {"uniqueName": "nobody@contoso.com"}
        }})))
        .unwrap();

        assert_eq!(item.title, "");
        assert_eq!(item.state, "");
        assert_eq!(item.assigned_to, None);
        assert_eq!(item.description, None);
    }

    #[rstest]
    #[case::missing_id(json!({"fields": {"System.Title": "x"}}))]
    #[case::zero_id(json!({"id": 0, "fields": {}}))]
    fn test_from_raw_rejects_records_without_positive_id(#[case] value: serde_json::Value) {
        assert!(WorkItem::from_raw(&raw(value)).is_none());
    }

    #[test]
    fn test_backlog_item_placeholders_unset() {
        let item = WorkItem::from_raw(&raw(json!({"id": 3, "fields": {
            "System.Title": "Story", "System.WorkItemType": "User Story"
        }})))
        .unwrap();
        let backlog: BacklogItem = item.into();

        assert_eq!(backlog.id, 3);
        assert_eq!(backlog.priority, None);
        assert_eq!(backlog.story_points, None);
    }

    #[rstest]
    #[case::active("active", Some(StateCategory::Active))]
    #[case::completed_upper("COMPLETED", Some(StateCategory::Completed))]
    #[case::review_padded(" Review ", Some(StateCategory::Review))]
    #[case::unknown("unknown", None)]
    #[case::empty("", None)]
    fn test_parse_state_category(#[case] input: &str, #[case] expected: Option<StateCategory>) {
        assert_eq!(StateCategory::parse(input), expected);
    }

    #[test]
    fn test_known_states_catalog() {
        assert_eq!(KNOWN_STATES.len(), 13);
        assert!(KNOWN_STATES.iter().any(|s| s.state == "Code Review"));
    }

    #[test]
    fn test_filter_spec_builder() {
        let spec = FilterSpec::new()
            .with_states(["Active"])
            .with_types(["Bug", "Task"])
            .with_assignee("ada")
            .with_project_filter(false)
            .with_max_results(5);

        assert_eq!(spec.states, vec!["Active"]);
        assert_eq!(spec.work_item_types, vec!["Bug", "Task"]);
        assert_eq!(spec.assigned_to.as_deref(), Some("ada"));
        assert_eq!(spec.include_project_filter, Some(false));
        assert_eq!(spec.max_results, Some(5));
        assert_eq!(spec.exclude_closed, None);
    }
}
