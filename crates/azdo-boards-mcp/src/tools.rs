//! MCP tool implementations.
//!
//! Every tool returns a plain `Result`; conversion to the in-band
//! `{"error": ...}` payload happens in the server.

use crate::error::{Error, Result};
use crate::models::{ProjectInfo, StateDescription};
use azdo_boards::config::{ConfigDefaults, Settings};
use azdo_boards::domain::{
    BacklogItem, FilterSpec, KNOWN_STATES, StateCategory, WorkItem, WorkItemLink,
};
use azdo_boards::executor::QueryExecutor;
use azdo_boards::hierarchy::HierarchyWalker;
use azdo_boards::remote::WorkItemService;
use azdo_boards::render::render_markdown;
use azdo_boards::wiql;
use std::sync::Arc;
use tracing::debug;

/// Tool implementations for the boards MCP server.
pub struct Tools {
    settings: Arc<Settings>,
    executor: QueryExecutor,
}

impl Tools {
    /// Create the tool set over a service handle.
    pub fn new(settings: Arc<Settings>, service: Arc<dyn WorkItemService>) -> Self {
        Self {
            settings,
            executor: QueryExecutor::new(service),
        }
    }

    fn defaults(&self) -> &ConfigDefaults {
        &self.settings.defaults
    }

    /// Run a filter as a listing query, capped at the call's or the
    /// configured result limit.
    async fn list(&self, spec: FilterSpec) -> Result<Vec<WorkItem>> {
        let query = wiql::listing_query(&spec, self.defaults());
        let limit = spec.max_results.unwrap_or(self.defaults().max_results);
        debug!(%query, limit, "Running listing query");

        let items = self
            .executor
            .items_by_query_top(&query, spec.project.as_deref(), Some(limit))
            .await?;
        Ok(items)
    }

    /// Fetch work items by id.
    ///
    /// # Errors
    ///
    /// Returns an error if a single-request fetch fails.
    pub async fn get_work_items(
        &self,
        ids: &[u32],
        project: Option<&str>,
    ) -> Result<Vec<WorkItem>> {
        Ok(self.executor.fetch_items(ids, project).await?)
    }

    /// Run caller-supplied WIQL and resolve the results.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_work_items_by_query(
        &self,
        query: &str,
        project: Option<&str>,
        max_results: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        Ok(self
            .executor
            .items_by_query_top(query, project, max_results)
            .await?)
    }

    /// Run caller-supplied link WIQL and return the relations.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_work_item_links_by_query(
        &self,
        query: &str,
        project: Option<&str>,
    ) -> Result<Vec<WorkItemLink>> {
        Ok(self.executor.links_by_query(query, project).await?)
    }

    /// Backlog of a team, defaulting to the configured team.
    ///
    /// # Errors
    ///
    /// Returns an error if both the backlog endpoints and the fallback fail.
    pub async fn get_backlog_items(
        &self,
        team_name: Option<&str>,
        project: Option<&str>,
    ) -> Result<Vec<BacklogItem>> {
        let team = team_name
            .filter(|t| !t.is_empty())
            .or(self.defaults().team.as_deref());
        Ok(self.executor.backlog_items(team, project).await?)
    }

    /// Open items of the default types.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_active_work_items(&self) -> Result<Vec<WorkItem>> {
        self.list(FilterSpec::new()).await
    }

    /// Items assigned to a user, defaulting to the configured user.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoDefaultUser` without contacting the service when no
    /// user is known, or an error if the query fails.
    pub async fn get_my_work_items(
        &self,
        assigned_to: Option<String>,
        states: Option<Vec<String>>,
        max_results: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        let user = assigned_to
            .filter(|u| !u.is_empty())
            .or_else(|| self.defaults().user.clone())
            .ok_or(Error::NoDefaultUser)?;

        let spec = FilterSpec {
            states: states.unwrap_or_default(),
            assigned_to: Some(user),
            max_results,
            ..FilterSpec::default()
        };
        self.list(spec).await
    }

    /// Items of one type; an empty type falls back to the configured types.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_work_items_by_type(
        &self,
        work_item_type: String,
        states: Option<Vec<String>>,
        max_results: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        let spec = FilterSpec {
            states: states.unwrap_or_default(),
            work_item_types: std::iter::once(work_item_type)
                .filter(|t| !t.is_empty())
                .collect(),
            max_results,
            ..FilterSpec::default()
        };
        self.list(spec).await
    }

    /// Configuration snapshot, without the access token.
    #[must_use]
    pub fn get_project_info(&self) -> ProjectInfo {
        ProjectInfo::from(self.settings.as_ref())
    }

    /// The configured user's items, or open items when no user is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_default_work_items(&self) -> Result<Vec<WorkItem>> {
        if self.defaults().user.is_some() {
            self.get_my_work_items(None, None, None).await
        } else {
            self.get_active_work_items().await
        }
    }

    /// Backlog of the configured team.
    ///
    /// # Errors
    ///
    /// Returns an error if both the backlog endpoints and the fallback fail.
    pub async fn get_default_backlog(&self) -> Result<Vec<BacklogItem>> {
        self.get_backlog_items(None, None).await
    }

    /// Items in one state. An empty type means the configured default types.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_work_items_by_state(
        &self,
        state: String,
        work_item_type: Option<String>,
        assigned_to: Option<String>,
        max_results: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        let spec = FilterSpec {
            states: vec![state],
            work_item_types: work_item_type
                .into_iter()
                .filter(|t| !t.is_empty())
                .collect(),
            assigned_to,
            max_results,
            ..FilterSpec::default()
        };
        self.list(spec).await
    }

    /// Items matching an arbitrary filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_work_items_with_filters(&self, spec: FilterSpec) -> Result<Vec<WorkItem>> {
        self.list(spec).await
    }

    /// Closed items.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_closed_work_items(
        &self,
        work_item_type: Option<String>,
        assigned_to: Option<String>,
        max_results: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        self.get_work_items_by_state("Closed".to_string(), work_item_type, assigned_to, max_results)
            .await
    }

    /// Catalog of common states.
    #[must_use]
    pub fn get_available_states(&self) -> Vec<StateDescription> {
        KNOWN_STATES.iter().map(StateDescription::from).collect()
    }

    /// Items whose state belongs to a configured category.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` without contacting the service for an
    /// unknown category, or an error if the query fails.
    pub async fn get_work_items_by_state_category(
        &self,
        category: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<WorkItem>> {
        let category = StateCategory::parse(category).ok_or_else(|| Error::InvalidArgument {
            field: "category",
            value: category.to_string(),
            valid_values: StateCategory::VALID_VALUES,
        })?;

        let spec = FilterSpec {
            states: self.defaults().states_for(category).to_vec(),
            max_results,
            ..FilterSpec::default()
        };
        self.list(spec).await
    }

    /// Markdown export of an Epic and everything beneath it.
    ///
    /// # Errors
    ///
    /// Returns an error if the Epic does not exist, is not an Epic, or cannot
    /// be fetched.
    pub async fn export_epic_hierarchy(
        &self,
        epic_id: u32,
        project: Option<String>,
    ) -> Result<String> {
        let walker = HierarchyWalker::new(self.executor.clone()).with_project(project);
        let tree = walker.walk_epic(epic_id).await?;
        Ok(render_markdown(&tree))
    }
}
