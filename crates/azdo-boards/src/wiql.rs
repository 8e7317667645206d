//! WIQL (Work Item Query Language) construction.
//!
//! Everything in this module is pure string composition: no I/O, no ambient
//! configuration. [`build_filter`] turns a [`FilterSpec`] plus the process
//! [`ConfigDefaults`] into a `WHERE` clause whose predicates always appear in
//! the same order:
//!
//! 1. state (explicit states, otherwise the closed/removed exclusions)
//! 2. work item type (explicit types, otherwise the default types)
//! 3. assignee
//! 4. iteration path, then area path
//! 5. project scope
//!
//! # Quoting
//!
//! Values are interpolated verbatim between single quotes. A value containing
//! `'` therefore produces an invalid or altered query.

use crate::config::ConfigDefaults;
use crate::domain::FilterSpec;

/// Columns selected by flat listing queries.
pub const SELECT_FIELDS: &str =
    "[System.Id], [System.Title], [System.WorkItemType], [System.State], [System.AssignedTo]";

/// Link type of a parent-to-child hierarchy relation.
pub const HIERARCHY_FORWARD: &str = "System.LinkTypes.Hierarchy-Forward";

/// Predicate used when no clause applies, keeping the grammar valid.
pub const ALWAYS_TRUE: &str = "1 = 1";

const STATE: &str = "[System.State]";
const WORK_ITEM_TYPE: &str = "[System.WorkItemType]";
const ASSIGNED_TO: &str = "[System.AssignedTo]";
const ITERATION_PATH: &str = "[System.IterationPath]";
const AREA_PATH: &str = "[System.AreaPath]";
const TEAM_PROJECT: &str = "[System.TeamProject]";

/// Types listed by the backlog fallback query.
const BACKLOG_TYPES: [&str; 3] = ["Product Backlog Item", "User Story", "Feature"];

/// Result ordering of a flat query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    /// Most recently changed first.
    #[default]
    ChangedDateDesc,
    /// Highest backlog priority first.
    PriorityAsc,
}

impl OrderBy {
    /// The `ORDER BY` expression.
    #[must_use]
    pub fn as_wiql(self) -> &'static str {
        match self {
            Self::ChangedDateDesc => "[System.ChangedDate] DESC",
            Self::PriorityAsc => "[Microsoft.VSTS.Common.Priority] ASC",
        }
    }
}

/// `[field] = 'value'`
#[must_use]
pub fn equals(field: &str, value: &str) -> String {
    format!("{field} = '{value}'")
}

/// `[field] <> 'value'`
#[must_use]
pub fn not_equals(field: &str, value: &str) -> String {
    format!("{field} <> '{value}'")
}

/// `[field] UNDER 'path'`
#[must_use]
pub fn under(field: &str, path: &str) -> String {
    format!("{field} UNDER '{path}'")
}

/// `([field] = 'a' OR [field] = 'b')`, or `None` for an empty value list.
#[must_use]
pub fn equals_any<S: AsRef<str>>(field: &str, values: &[S]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = values.iter().map(|v| equals(field, v.as_ref())).collect();
    Some(format!("({})", alternatives.join(" OR ")))
}

/// State predicates: the explicit states OR-combined, otherwise one
/// inequality per active exclusion.
#[must_use]
pub fn state_clauses(spec: &FilterSpec, defaults: &ConfigDefaults) -> Vec<String> {
    if let Some(clause) = equals_any(STATE, &spec.states) {
        return vec![clause];
    }

    let mut clauses = Vec::new();
    if spec.exclude_closed.unwrap_or(defaults.exclude_closed) {
        clauses.push(not_equals(STATE, "Closed"));
    }
    if spec.exclude_removed.unwrap_or(defaults.exclude_removed) {
        clauses.push(not_equals(STATE, "Removed"));
    }
    clauses
}

/// Type predicate over the explicit types, otherwise the default types.
#[must_use]
pub fn type_clause(spec: &FilterSpec, defaults: &ConfigDefaults) -> Option<String> {
    if spec.work_item_types.is_empty() {
        equals_any(WORK_ITEM_TYPE, &defaults.work_item_types)
    } else {
        equals_any(WORK_ITEM_TYPE, &spec.work_item_types)
    }
}

/// Project-scope predicate.
///
/// The per-call override wins over the process-wide flag; the target is the
/// per-call project, otherwise the configured one.
#[must_use]
pub fn project_clause(spec: &FilterSpec, defaults: &ConfigDefaults) -> Option<String> {
    let enabled = spec
        .include_project_filter
        .unwrap_or(defaults.enable_project_filtering);
    if !enabled {
        return None;
    }
    let project = spec
        .project
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(&defaults.project);
    (!project.is_empty()).then(|| equals(TEAM_PROJECT, project))
}

/// Compose the `WHERE` clause for a filter.
#[must_use]
pub fn build_filter(spec: &FilterSpec, defaults: &ConfigDefaults) -> String {
    let mut clauses = state_clauses(spec, defaults);

    clauses.extend(type_clause(spec, defaults));

    if let Some(assignee) = non_empty(spec.assigned_to.as_deref()) {
        clauses.push(equals(ASSIGNED_TO, assignee));
    }

    let iteration = non_empty(spec.iteration_path.as_deref())
        .or_else(|| non_empty(defaults.iteration_path.as_deref()));
    if let Some(path) = iteration {
        clauses.push(under(ITERATION_PATH, path));
    }

    let area =
        non_empty(spec.area_path.as_deref()).or_else(|| non_empty(defaults.area_path.as_deref()));
    if let Some(path) = area {
        clauses.push(under(AREA_PATH, path));
    }

    clauses.extend(project_clause(spec, defaults));

    if clauses.is_empty() {
        ALWAYS_TRUE.to_string()
    } else {
        clauses.join(" AND ")
    }
}

/// A flat `SELECT ... FROM WorkItems` query.
#[must_use]
pub fn select_work_items(where_clause: &str, order: OrderBy) -> String {
    format!(
        "SELECT {SELECT_FIELDS}\nFROM WorkItems\nWHERE {where_clause}\nORDER BY {}",
        order.as_wiql()
    )
}

/// The flat listing query for a filter, newest changes first.
#[must_use]
pub fn listing_query(spec: &FilterSpec, defaults: &ConfigDefaults) -> String {
    select_work_items(&build_filter(spec, defaults), OrderBy::ChangedDateDesc)
}

/// A link query for the direct hierarchy children of `parent_id` with the
/// given type.
#[must_use]
pub fn child_links_query(parent_id: u32, target_type: &str) -> String {
    format!(
        "SELECT [System.Id]\n\
         FROM WorkItemLinks\n\
         WHERE [Source].[System.Id] = {parent_id}\n\
         AND [Target].{}\n\
         AND [System.Links.LinkType] = '{HIERARCHY_FORWARD}'\n\
         MODE (MustContain)",
        equals(WORK_ITEM_TYPE, target_type)
    )
}

/// Query used when the backlog endpoints are unavailable.
#[must_use]
pub fn backlog_fallback_query() -> String {
    let types: Vec<String> = BACKLOG_TYPES.iter().map(|t| format!("'{t}'")).collect();
    let where_clause = format!(
        "{WORK_ITEM_TYPE} IN ({}) AND {}",
        types.join(", "),
        not_equals(STATE, "Removed")
    );
    select_work_items(&where_clause, OrderBy::PriorityAsc)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
