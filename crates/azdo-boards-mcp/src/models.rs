//! MCP request and response models.
//!
//! Request structs double as the JSON schema advertised for each tool, so
//! their doc comments are what clients see as parameter descriptions.

use azdo_boards::config::Settings;
use azdo_boards::domain::{FilterSpec, KnownState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ========== Requests ==========

/// Parameters of `get_work_items`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetWorkItemsParams {
    /// Work item ids to fetch.
    pub ids: Vec<u32>,

    /// Project to read from (defaults to the configured project).
    #[serde(default)]
    pub project: Option<String>,
}

/// Parameters of the raw WIQL tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WiqlParams {
    /// WIQL query text.
    pub wiql: String,

    /// Project to run the query in (defaults to the configured project).
    #[serde(default)]
    pub project: Option<String>,

    /// Maximum number of items to return (no limit when omitted).
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Parameters of `get_backlog_items`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct BacklogParams {
    /// Team whose backlog to read (defaults to the configured team).
    #[serde(default)]
    pub team_name: Option<String>,

    /// Project to read from (defaults to the configured project).
    #[serde(default)]
    pub project: Option<String>,
}

/// Parameters of `get_my_work_items`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct MyWorkItemsParams {
    /// Display name or email of the user (defaults to the configured user).
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// States to match, e.g. ["Active", "New"]. Closed and removed items are
    /// excluded when omitted.
    #[serde(default)]
    pub states: Option<Vec<String>>,

    /// Maximum number of items to return.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Parameters of `get_work_items_by_type`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ByTypeParams {
    /// Work item type, e.g. "Bug" or "User Story".
    pub work_item_type: String,

    /// States to match. Closed and removed items are excluded when omitted.
    #[serde(default)]
    pub states: Option<Vec<String>>,

    /// Maximum number of items to return.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Parameters of `get_work_items_by_state`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ByStateParams {
    /// State to match, e.g. "Active".
    pub state: String,

    /// Work item type (defaults to the configured types).
    #[serde(default)]
    pub work_item_type: Option<String>,

    /// Assignee display name or email.
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// Maximum number of items to return.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Parameters of `get_work_items_with_filters`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct FilterParams {
    /// States to match. When omitted the closed/removed exclusions apply.
    #[serde(default)]
    pub states: Option<Vec<String>>,

    /// Work item types to match (defaults to the configured types).
    #[serde(default)]
    pub work_item_types: Option<Vec<String>>,

    /// Assignee display name or email.
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// Iteration path to search under (defaults to the configured path).
    #[serde(default)]
    pub iteration_path: Option<String>,

    /// Area path to search under (defaults to the configured path).
    #[serde(default)]
    pub area_path: Option<String>,

    /// Project to query (defaults to the configured project).
    #[serde(default)]
    pub project: Option<String>,

    /// Restrict results to the project, overriding the server setting.
    #[serde(default)]
    pub include_project_filter: Option<bool>,

    /// Maximum number of items to return.
    #[serde(default)]
    pub max_results: Option<usize>,

    /// Exclude Closed items (defaults to the server setting).
    #[serde(default)]
    pub exclude_closed: Option<bool>,

    /// Exclude Removed items (defaults to the server setting).
    #[serde(default)]
    pub exclude_removed: Option<bool>,
}

impl From<FilterParams> for FilterSpec {
    fn from(params: FilterParams) -> Self {
        Self {
            states: params.states.unwrap_or_default(),
            work_item_types: params.work_item_types.unwrap_or_default(),
            assigned_to: params.assigned_to,
            iteration_path: params.iteration_path,
            area_path: params.area_path,
            project: params.project,
            include_project_filter: params.include_project_filter,
            max_results: params.max_results,
            exclude_closed: params.exclude_closed,
            exclude_removed: params.exclude_removed,
        }
    }
}

/// Parameters of `get_closed_work_items`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ClosedParams {
    /// Work item type (defaults to the configured types).
    #[serde(default)]
    pub work_item_type: Option<String>,

    /// Assignee display name or email.
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// Maximum number of items to return.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Parameters of `get_work_items_by_state_category`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StateCategoryParams {
    /// One of "active", "completed" or "review".
    pub category: String,

    /// Maximum number of items to return.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Parameters of `export_epic_hierarchy`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportEpicParams {
    /// Id of the Epic to export.
    pub epic_id: u32,

    /// Project to read from (defaults to the configured project).
    #[serde(default)]
    pub project: Option<String>,
}

// ========== Responses ==========

/// In-band failure record returned instead of a result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    /// What went wrong.
    pub error: String,
}

/// Response of `get_project_info`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProjectInfo {
    /// Organization name.
    pub organization: String,
    /// Default project.
    pub project: String,
    /// REST API version.
    pub api_version: String,
    /// Service root.
    pub base_url: String,
    /// Query defaults.
    pub default_settings: DefaultSettings,
}

/// Query defaults reported by `get_project_info`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DefaultSettings {
    /// Team used for backlog queries.
    pub default_team: Option<String>,
    /// User used for "my work items".
    pub default_user: Option<String>,
    /// Types applied when a call names none.
    pub default_work_item_types: Vec<String>,
    /// Result cap applied when a call gives none.
    pub default_max_results: usize,
    /// Whether Closed items are excluded by default.
    pub exclude_closed: bool,
    /// Whether Removed items are excluded by default.
    pub exclude_removed: bool,
    /// Iteration path scope.
    pub default_iteration_path: Option<String>,
    /// Area path scope.
    pub default_area_path: Option<String>,
    /// Whether queries are scoped to the project by default.
    pub enable_project_filtering: bool,
}

impl From<&Settings> for ProjectInfo {
    fn from(settings: &Settings) -> Self {
        let defaults = &settings.defaults;
        Self {
            organization: settings.organization.clone(),
            project: settings.project.clone(),
            api_version: settings.api_version.clone(),
            base_url: settings.base_url.clone(),
            default_settings: DefaultSettings {
                default_team: defaults.team.clone(),
                default_user: defaults.user.clone(),
                default_work_item_types: defaults.work_item_types.clone(),
                default_max_results: defaults.max_results,
                exclude_closed: defaults.exclude_closed,
                exclude_removed: defaults.exclude_removed,
                default_iteration_path: defaults.iteration_path.clone(),
                default_area_path: defaults.area_path.clone(),
                enable_project_filtering: defaults.enable_project_filtering,
            },
        }
    }
}

/// One entry of `get_available_states`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StateDescription {
    /// State name.
    pub state: String,
    /// What the state means.
    pub description: String,
}

impl From<&KnownState> for StateDescription {
    fn from(known: &KnownState) -> Self {
        Self {
            state: known.state.to_string(),
            description: known.description.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_params_from_empty_object() {
        let params: FilterParams = serde_json::from_value(json!({})).unwrap();
        let spec = FilterSpec::from(params);
        assert_eq!(spec, FilterSpec::default());
    }

    #[test]
    fn test_filter_params_conversion() {
        let params: FilterParams = serde_json::from_value(json!({
            "states": ["Active"],
            "work_item_types": ["Bug"],
            "exclude_closed": false,
            "include_project_filter": true,
            "max_results": 5
        }))
        .unwrap();
        let spec = FilterSpec::from(params);

        assert_eq!(spec.states, vec!["Active"]);
        assert_eq!(spec.work_item_types, vec!["Bug"]);
        assert_eq!(spec.exclude_closed, Some(false));
        assert_eq!(spec.exclude_removed, None);
        assert_eq!(spec.include_project_filter, Some(true));
        assert_eq!(spec.max_results, Some(5));
    }

    #[test]
    fn test_project_info_omits_token() {
        let settings = Settings::new("contoso", "Fabrikam", "very-secret");
        let info = ProjectInfo::from(&settings);
        let rendered = serde_json::to_string(&info).unwrap();

        assert_eq!(info.organization, "contoso");
        assert_eq!(info.default_settings.default_max_results, 100);
        assert!(!rendered.contains("very-secret"));
    }
}
