//! Markdown rendering of an Epic hierarchy.
//!
//! Sections are numbered by position: features `1.`, `2.`, stories `1.1`,
//! tasks `1.1.T1` and bugs `1.1.B1`.

use crate::domain::{EpicHierarchy, FeatureNode, UserStoryNode, WorkItem};
use std::fmt::{self, Write};

const UNASSIGNED: &str = "Unassigned";

/// Render a hierarchy as a markdown document.
#[must_use]
pub fn render_markdown(hierarchy: &EpicHierarchy) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_markdown(&mut out, hierarchy);
    out
}

/// Write a hierarchy as markdown.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_markdown<W: Write>(w: &mut W, hierarchy: &EpicHierarchy) -> fmt::Result {
    let epic = &hierarchy.epic;
    writeln!(w, "# Epic: {}", epic.title)?;
    writeln!(w, "**ID:** {}", epic.id)?;
    writeln!(w, "**State:** {}", epic.state)?;
    writeln!(w, "**Assigned To:** {}", assignee(epic))?;
    writeln!(w, "**Created:** {}", epic.created_date)?;
    write_description(w, epic)?;
    writeln!(w)?;

    if hierarchy.features.is_empty() {
        writeln!(w, "*No Features found for this Epic*")?;
        writeln!(w)?;
    }

    for (i, feature) in hierarchy.features.iter().enumerate() {
        write_feature(w, i + 1, feature)?;
    }

    if !hierarchy.failed_lookups.is_empty() {
        writeln!(w, "## Incomplete Results")?;
        for failure in &hierarchy.failed_lookups {
            writeln!(
                w,
                "- {} children of {} could not be loaded: {}",
                failure.target_type, failure.parent_id, failure.message
            )?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn write_feature<W: Write>(w: &mut W, i: usize, feature: &FeatureNode) -> fmt::Result {
    let item = &feature.work_item;
    writeln!(w, "## {i}. Feature: {}", item.title)?;
    write_summary(w, item)?;
    write_description(w, item)?;
    writeln!(w)?;

    if feature.user_stories.is_empty() {
        writeln!(w, "*No User Stories found for this Feature*")?;
        writeln!(w)?;
        return Ok(());
    }

    for (j, story) in feature.user_stories.iter().enumerate() {
        write_story(w, i, j + 1, story)?;
    }
    Ok(())
}

fn write_story<W: Write>(w: &mut W, i: usize, j: usize, story: &UserStoryNode) -> fmt::Result {
    let item = &story.work_item;
    writeln!(w, "### {i}.{j} User Story: {}", item.title)?;
    write_summary(w, item)?;
    write_description(w, item)?;
    writeln!(w)?;

    write_leaves(w, "Tasks", &format!("{i}.{j}.T"), "Task", &story.tasks)?;
    write_leaves(w, "Bugs", &format!("{i}.{j}.B"), "Bug", &story.bugs)
}

fn write_leaves<W: Write>(
    w: &mut W,
    heading: &str,
    prefix: &str,
    label: &str,
    items: &[WorkItem],
) -> fmt::Result {
    if items.is_empty() {
        return Ok(());
    }

    writeln!(w, "#### {heading}:")?;
    for (k, item) in items.iter().enumerate() {
        writeln!(w, "- **{prefix}{} {label}:** {}", k + 1, item.title)?;
        writeln!(w, "  - **ID:** {}", item.id)?;
        writeln!(w, "  - **State:** {}", item.state)?;
        writeln!(w, "  - **Assigned To:** {}", assignee(item))?;
    }
    writeln!(w)
}

fn write_summary<W: Write>(w: &mut W, item: &WorkItem) -> fmt::Result {
    writeln!(w, "**ID:** {}", item.id)?;
    writeln!(w, "**State:** {}", item.state)?;
    writeln!(w, "**Assigned To:** {}", assignee(item))
}

fn write_description<W: Write>(w: &mut W, item: &WorkItem) -> fmt::Result {
    match item.description.as_deref() {
        Some(description) if !description.is_empty() => {
            writeln!(w, "**Description:** {description}")
        }
        _ => Ok(()),
    }
}

fn assignee(item: &WorkItem) -> &str {
    item.assigned_to.as_deref().unwrap_or(UNASSIGNED)
}
