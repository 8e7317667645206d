//! Azure DevOps Boards queries and Epic hierarchy export.
//!
//! The crate composes WIQL filters ([`wiql`]), resolves work item ids in
//! batches of 200 ([`batch`]), runs queries against a
//! [`WorkItemService`](remote::WorkItemService) ([`executor`]) and walks
//! Epic → Feature → User Story → Task/Bug trees ([`hierarchy`]) that
//! [`render`] turns into markdown.
//!
//! # Example
//!
//! ```no_run
//! use azdo_boards::config::Settings;
//! use azdo_boards::executor::QueryExecutor;
//! use azdo_boards::hierarchy::HierarchyWalker;
//! use azdo_boards::remote::{AzureDevOpsClient, WorkItemService};
//! use azdo_boards::render::render_markdown;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Arc::new(Settings::load(None).await?);
//!     let client = Arc::new(AzureDevOpsClient::new(settings));
//!
//!     let walker = HierarchyWalker::new(QueryExecutor::new(client.clone()));
//!     let tree = walker.walk_epic(1234).await?;
//!     println!("{}", render_markdown(&tree));
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod hierarchy;
pub mod remote;
pub mod render;
pub mod wiql;

// Public CLI module (needed by binary)
pub mod cli;

pub use error::{ConfigError, Error, Result};
