//! MCP server for Azure DevOps Boards.
//!
//! This crate exposes Azure DevOps work item queries and the Epic hierarchy
//! export from [`azdo_boards`] as MCP tools served over stdio.
//!
//! # Architecture
//!
//! [`tools::Tools`] holds the tool logic and returns plain `Result`s.
//! [`server::AzdoBoardsMcpServer`] registers the tools with `rmcp` and turns
//! failures into in-band `[{"error": "..."}]` payloads.
//!
//! # Tools
//!
//! ## Lookups
//! - `get_work_items` - Fetch work items by id
//! - `get_work_items_by_query` - Run a WIQL query
//! - `get_work_item_links_by_query` - Run a WIQL link query
//! - `get_backlog_items` / `get_default_backlog` - Read a team backlog
//!
//! ## Listings
//! - `get_active_work_items` - Open items of the default types
//! - `get_my_work_items` - Items assigned to a user
//! - `get_default_work_items` - The default user's items, or open items
//! - `get_work_items_by_type` / `get_work_items_by_state`
//! - `get_work_items_with_filters` - Every filter at once
//! - `get_closed_work_items`
//! - `get_work_items_by_state_category` - active, completed or review
//!
//! ## Reference
//! - `get_project_info` - Connection and default settings
//! - `get_available_states` - Common states and their meaning
//!
//! ## Export
//! - `export_epic_hierarchy` - Epic, Features, User Stories, Tasks and Bugs as markdown

pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::AzdoBoardsMcpServer;
