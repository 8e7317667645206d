//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp. Tool failures are
//! never surfaced as protocol errors: each tool answers with its result list
//! or with `[{"error": "<context>: <reason>"}]`.

use crate::error::{Error as ToolError, Result as ToolResult};
use crate::models::{
    BacklogParams, ByStateParams, ByTypeParams, ClosedParams, ErrorPayload, ExportEpicParams,
    FilterParams, GetWorkItemsParams, MyWorkItemsParams, StateCategoryParams, WiqlParams,
};
use crate::tools::Tools;
use azdo_boards::config::Settings;
use azdo_boards::remote::{AzureDevOpsClient, WorkItemService};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router, transport::stdio,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Convert a tool result into the JSON payload sent to the client.
///
/// Failures become a single-element list holding an `error` record. Requests
/// rejected before reaching Azure DevOps keep their message unprefixed.
pub fn into_payload<T: Serialize>(result: ToolResult<T>, context: &str) -> Value {
    match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
        Ok(value) => value,
        Err(error) => error_payload(context, &error),
    }
}

fn error_payload(context: &str, error: &ToolError) -> Value {
    let message = if error.is_invalid_request() {
        error.to_string()
    } else {
        format!("{context}: {error}")
    };
    warn!(%message, "Tool call failed");
    let payload = ErrorPayload { error: message };
    json!([payload])
}

fn respond(payload: Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::json(payload)?]))
}

/// The Azure DevOps Boards MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct AzdoBoardsMcpServer {
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Shared Azure DevOps connection, released on shutdown.
    service: Arc<dyn WorkItemService>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AzdoBoardsMcpServer {
    /// Get work items by id.
    #[tool(description = "Get work items by their IDs. Handles any number of IDs.")]
    async fn get_work_items(
        &self,
        Parameters(params): Parameters<GetWorkItemsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_work_items(&params.ids, params.project.as_deref())
            .await;
        respond(into_payload(result, "Failed to fetch work items"))
    }

    /// Run a WIQL query.
    #[tool(description = "Get work items using a WIQL (Work Item Query Language) query.")]
    async fn get_work_items_by_query(
        &self,
        Parameters(params): Parameters<WiqlParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_work_items_by_query(&params.wiql, params.project.as_deref(), params.max_results)
            .await;
        respond(into_payload(result, "Failed to execute WIQL query"))
    }

    /// Run a WIQL link query.
    #[tool(
        description = "Get work item links (source, target, link type) using a WIQL query over WorkItemLinks."
    )]
    async fn get_work_item_links_by_query(
        &self,
        Parameters(params): Parameters<WiqlParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_work_item_links_by_query(&params.wiql, params.project.as_deref())
            .await;
        respond(into_payload(result, "Failed to execute WIQL link query"))
    }

    /// Get backlog items.
    #[tool(
        description = "Get backlog items for a team (uses the default team if not specified)."
    )]
    async fn get_backlog_items(
        &self,
        Parameters(params): Parameters<BacklogParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_backlog_items(params.team_name.as_deref(), params.project.as_deref())
            .await;
        respond(into_payload(result, "Failed to fetch backlog items"))
    }

    /// Get active work items.
    #[tool(description = "Get all active work items in the project using default filters.")]
    async fn get_active_work_items(&self) -> Result<CallToolResult, McpError> {
        let result = self.tools.get_active_work_items().await;
        respond(into_payload(result, "Failed to fetch active work items"))
    }

    /// Get work items assigned to a user.
    #[tool(
        description = "Get work items assigned to a user (uses the default user if not specified)."
    )]
    async fn get_my_work_items(
        &self,
        Parameters(params): Parameters<MyWorkItemsParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_my_work_items(params.assigned_to, params.states, params.max_results)
            .await;
        respond(into_payload(result, "Failed to fetch work items for user"))
    }

    /// Get work items of one type.
    #[tool(description = "Get work items by their type (e.g., Bug, Task, User Story).")]
    async fn get_work_items_by_type(
        &self,
        Parameters(params): Parameters<ByTypeParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_work_items_by_type(params.work_item_type, params.states, params.max_results)
            .await;
        respond(into_payload(result, "Failed to fetch work items by type"))
    }

    /// Get the configuration snapshot.
    #[tool(description = "Get basic project information and default search settings.")]
    async fn get_project_info(&self) -> Result<CallToolResult, McpError> {
        let info = self.tools.get_project_info();
        Ok(CallToolResult::success(vec![Content::json(info)?]))
    }

    /// Get work items using every default.
    #[tool(
        description = "Get work items using all default search settings: the default user's items if one is configured, otherwise active items."
    )]
    async fn get_default_work_items(&self) -> Result<CallToolResult, McpError> {
        let result = self.tools.get_default_work_items().await;
        respond(into_payload(result, "Failed to fetch default work items"))
    }

    /// Get the default team's backlog.
    #[tool(description = "Get backlog items for the default team.")]
    async fn get_default_backlog(&self) -> Result<CallToolResult, McpError> {
        let result = self.tools.get_default_backlog().await;
        respond(into_payload(result, "Failed to fetch backlog items"))
    }

    /// Get work items in one state.
    #[tool(description = "Get work items by their state (e.g., Active, New, In Progress, Closed).")]
    async fn get_work_items_by_state(
        &self,
        Parameters(params): Parameters<ByStateParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_work_items_by_state(
                params.state,
                params.work_item_type,
                params.assigned_to,
                params.max_results,
            )
            .await;
        respond(into_payload(result, "Failed to fetch work items by state"))
    }

    /// Get work items matching a filter.
    #[tool(
        description = "Get work items with comprehensive filters: states, types, assignee, iteration and area paths, project scope, closed/removed exclusions."
    )]
    async fn get_work_items_with_filters(
        &self,
        Parameters(params): Parameters<FilterParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.tools.get_work_items_with_filters(params.into()).await;
        respond(into_payload(result, "Failed to fetch work items with filters"))
    }

    /// Get closed work items.
    #[tool(description = "Get closed work items, optionally filtered by type and assignee.")]
    async fn get_closed_work_items(
        &self,
        Parameters(params): Parameters<ClosedParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_closed_work_items(params.work_item_type, params.assigned_to, params.max_results)
            .await;
        respond(into_payload(result, "Failed to fetch closed work items"))
    }

    /// List common states.
    #[tool(description = "Get a list of common work item states and what they mean.")]
    async fn get_available_states(&self) -> Result<CallToolResult, McpError> {
        let states = self.tools.get_available_states();
        Ok(CallToolResult::success(vec![Content::json(states)?]))
    }

    /// Get work items by state category.
    #[tool(
        description = "Get work items by state category: 'active', 'completed' or 'review'. Each category maps to a configured list of states."
    )]
    async fn get_work_items_by_state_category(
        &self,
        Parameters(params): Parameters<StateCategoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .tools
            .get_work_items_by_state_category(&params.category, params.max_results)
            .await;
        respond(into_payload(
            result,
            "Failed to fetch work items by state category",
        ))
    }

    /// Export an Epic hierarchy as markdown.
    #[tool(
        description = "Export an Epic with its Features, User Stories, Tasks and Bugs as a markdown document."
    )]
    async fn export_epic_hierarchy(
        &self,
        Parameters(params): Parameters<ExportEpicParams>,
    ) -> Result<CallToolResult, McpError> {
        match self
            .tools
            .export_epic_hierarchy(params.epic_id, params.project)
            .await
        {
            Ok(markdown) => Ok(CallToolResult::success(vec![Content::text(markdown)])),
            Err(e) => respond(error_payload("Failed to export epic hierarchy", &e)),
        }
    }
}

impl AzdoBoardsMcpServer {
    /// Create a server over an existing service handle.
    #[must_use]
    pub fn new(settings: Arc<Settings>, service: Arc<dyn WorkItemService>) -> Self {
        let tools = Arc::new(Tools::new(settings, Arc::clone(&service)));
        Self {
            tools,
            service,
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server talking to Azure DevOps with the given settings.
    #[must_use]
    pub fn from_settings(settings: Arc<Settings>) -> Self {
        let client: Arc<dyn WorkItemService> =
            Arc::new(AzureDevOpsClient::new(Arc::clone(&settings)));
        Self::new(settings, client)
    }

    /// Serve MCP over stdio until the client disconnects or Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be set up or fails.
    pub async fn run(self) -> ToolResult<()> {
        let running = match self.clone().serve(stdio()).await {
            Ok(running) => running,
            Err(e) => return self.finish(Err(ToolError::Mcp(e.to_string()))).await,
        };
        info!("Serving MCP over stdio");

        let outcome = tokio::select! {
            quit = running.waiting() => match quit {
                Ok(reason) => {
                    info!(?reason, "Client disconnected");
                    Ok(())
                }
                Err(e) => Err(ToolError::Mcp(e.to_string())),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                Ok(())
            }
        };

        self.finish(outcome).await
    }

    /// Release the shared Azure DevOps connection.
    pub async fn shutdown(&self) {
        self.service.close().await;
    }

    /// Release the connection, then hand back how serving ended.
    async fn finish(&self, outcome: ToolResult<()>) -> ToolResult<()> {
        self.shutdown().await;
        outcome
    }
}

#[tool_handler]
impl ServerHandler for AzdoBoardsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "azdo-boards-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Azure DevOps Boards server. Query work items and backlogs, or export an \
                 Epic hierarchy as markdown. Failures are returned as [{\"error\": ...}]."
                    .into(),
            ),
        }
    }
}
