//! Command-line interface of the `epic-export` binary.
//!
//! ```bash
//! epic-export 1234 -o checkout.md
//! epic-export 1234 --json --project Tailspin
//! ```
//!
//! The document goes to stdout unless `--output` is given; progress and
//! warnings go to stderr.

use crate::config::Settings;
use crate::domain::EpicHierarchy;
use crate::executor::QueryExecutor;
use crate::hierarchy::{DEFAULT_CONCURRENCY, HierarchyWalker};
use crate::remote::{AzureDevOpsClient, WorkItemService};
use crate::render::render_markdown;
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Export an Azure DevOps Epic with its Features, User Stories, Tasks and Bugs.
///
/// Connection settings come from the environment (ORGANIZATION, PROJECT,
/// AZURE_DEVOPS_PAT), a `.env` file, or a YAML settings file.
#[derive(Parser, Debug, Clone)]
#[command(name = "epic-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Id of the Epic to export
    pub epic_id: u32,

    /// Write the document to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Emit the hierarchy as JSON instead of markdown
    #[arg(long)]
    pub json: bool,

    /// Project to read from (defaults to the configured project)
    #[arg(short, long)]
    pub project: Option<String>,

    /// YAML settings file
    #[arg(short, long, env = crate::config::CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Sibling subtrees fetched at the same time
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Disable colored status output
    #[arg(long)]
    pub no_color: bool,
}

/// What an export produced.
#[derive(Debug)]
pub struct ExportSummary {
    /// Items in the exported tree.
    pub items: usize,
    /// Child lookups that failed.
    pub failed_lookups: usize,
    /// Where the document was written, if not stdout.
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Parse arguments from the process command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Load settings, export, and release the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if settings cannot be loaded, the Epic cannot be
    /// resolved, or the document cannot be written.
    pub async fn execute(&self) -> Result<()> {
        if self.no_color {
            colored::control::set_override(false);
        }

        let settings = Settings::load(self.config.as_deref())
            .await
            .context("Failed to load settings")?;
        let client = Arc::new(AzureDevOpsClient::new(Arc::new(settings)));

        let result = self.export(client.clone()).await;
        client.close().await;

        let summary = result?;
        if summary.failed_lookups > 0 {
            eprintln!(
                "{} {} child lookups failed; the export is incomplete",
                "warning:".yellow().bold(),
                summary.failed_lookups
            );
        }
        if let Some(path) = &summary.output {
            eprintln!(
                "{} {} items written to {}",
                "done:".green().bold(),
                summary.items,
                path.display()
            );
        }
        Ok(())
    }

    /// Walk the Epic through `service` and write the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the Epic cannot be resolved or the document cannot
    /// be written.
    pub async fn export(&self, service: Arc<dyn WorkItemService>) -> Result<ExportSummary> {
        eprintln!(
            "{} Epic {}...",
            "Fetching hierarchy for".cyan(),
            self.epic_id
        );

        let walker = HierarchyWalker::new(QueryExecutor::new(service))
            .with_project(self.project.clone())
            .with_concurrency(self.concurrency);
        let tree = walker.walk_epic(self.epic_id).await?;
        let document = self.format(&tree)?;

        match &self.output {
            Some(path) => tokio::fs::write(path, document)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => print!("{document}"),
        }

        Ok(ExportSummary {
            items: tree.item_count(),
            failed_lookups: tree.failed_lookups.len(),
            output: self.output.clone(),
        })
    }

    fn format(&self, tree: &EpicHierarchy) -> Result<String> {
        if self.json {
            Ok(serde_json::to_string_pretty(tree)?)
        } else {
            Ok(render_markdown(tree))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::remote::MockWorkItemService;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn mock_tree() -> Arc<MockWorkItemService> {
        Arc::new(
            MockWorkItemService::new()
                .with_item(1, "Epic", "Checkout")
                .with_item(2, "Feature", "Payments")
                .with_item(3, "User Story", "Pay by card")
                .with_child(1, 2)
                .with_child(2, 3),
        )
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_arguments() {
        let cli = Cli::try_parse_from([
            "epic-export",
            "42",
            "-o",
            "out.md",
            "--json",
            "--project",
            "Tailspin",
        ])
        .unwrap();

        assert_eq!(cli.epic_id, 42);
        assert_eq!(cli.output, Some(PathBuf::from("out.md")));
        assert!(cli.json);
        assert_eq!(cli.project.as_deref(), Some("Tailspin"));
        assert_eq!(cli.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_epic_id_must_be_numeric() {
        assert!(Cli::try_parse_from(["epic-export", "abc"]).is_err());
    }

    #[tokio::test]
    async fn test_export_writes_markdown_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("epic.md");
        let cli = Cli::try_parse_from(["epic-export", "1", "-o", path.to_str().unwrap()]).unwrap();

        let summary = cli.export(mock_tree()).await.unwrap();
        assert_eq!(summary.items, 3);
        assert_eq!(summary.failed_lookups, 0);

        let document = std::fs::read_to_string(&path).unwrap();
        assert!(document.starts_with("# Epic: Checkout"));
        assert!(document.contains("## 1. Feature: Payments"));
        assert!(document.contains("### 1.1 User Story: Pay by card"));
    }

    #[tokio::test]
    async fn test_export_writes_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("epic.json");
        let cli = Cli::try_parse_from(["epic-export", "1", "--json", "-o", path.to_str().unwrap()])
            .unwrap();

        cli.export(mock_tree()).await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["epic"]["id"], 1);
        assert_eq!(value["features"][0]["work_item"]["id"], 2);
        assert!(value.get("failed_lookups").is_none());
    }

    #[tokio::test]
    async fn test_export_of_non_epic_fails() {
        let cli = Cli::try_parse_from(["epic-export", "2"]).unwrap();
        let err = cli.export(mock_tree()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::TypeMismatch { id: 2, .. })
        ));
    }
}
