// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command implementations for the `flowgraph` binary.

use egui::Vec2;
use flowgraph_graph::persistence::{load_graph, save_graph};
use flowgraph_graph::{
    EditorSettings, Graph, InvariantViolation, LoadReport, PersistenceError, SettingsError,
};
use std::fmt::Write as _;
use std::path::Path;

/// Errors surfaced by a command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Reading or writing a graph document failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Reading or writing the settings file failed
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// A loaded graph broke a structural invariant
    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Some edges of a document could not be recreated
    #[error("{0} connection(s) could not be restored")]
    IncompleteLoad(usize),
}

/// Load a document into a fresh graph
fn open(path: &Path, settings: &EditorSettings) -> Result<(Graph, LoadReport), CommandError> {
    let name = path
        .file_stem()
        .map_or_else(|| "Untitled".to_string(), |stem| stem.to_string_lossy().into_owned());
    let mut graph = Graph::with_settings(name, settings.clone());
    let report = load_graph(&mut graph, path, Vec2::ZERO)?;
    Ok((graph, report))
}

/// Describe the nodes, ports and connections of a document
pub fn inspect(path: &Path, settings: &EditorSettings) -> Result<String, CommandError> {
    let (graph, report) = open(path, settings)?;
    Ok(describe(&graph, &report))
}

fn describe(graph: &Graph, report: &LoadReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {} node(s), {} connection(s)",
        graph.name,
        graph.node_count(),
        graph.connection_count()
    );
    for node in graph.nodes() {
        let pos = node.position();
        let _ = writeln!(out, "  {} at ({}, {})", node.name(), pos.x, pos.y);
        for port in node.ports() {
            let _ = writeln!(
                out,
                "    {} [{} {}]",
                port.name(),
                port.kind().as_str(),
                port.data_type()
            );
        }
    }
    for connection in graph.connections() {
        if let Some(summary) = graph.connection_summary(connection.id) {
            let _ = writeln!(out, "  {summary}");
        }
    }
    for failure in &report.failures {
        let _ = writeln!(out, "  ! {failure}");
    }
    out
}

/// Merge `other` into `base` at `offset` and write the result to `output`
pub fn merge(
    base: &Path,
    other: &Path,
    offset: Vec2,
    output: &Path,
    settings: &EditorSettings,
) -> Result<LoadReport, CommandError> {
    let (mut graph, base_report) = open(base, settings)?;
    if !base_report.is_complete() {
        return Err(CommandError::IncompleteLoad(base_report.failures.len()));
    }
    let report = load_graph(&mut graph, other, offset)?;
    for (old, new) in &report.renamed {
        tracing::info!("Renamed '{}' to '{}'", old, new);
    }
    graph.check_invariants()?;
    save_graph(&graph, output)?;
    Ok(report)
}

/// Load a document and verify it restores completely and consistently
pub fn check(path: &Path, settings: &EditorSettings) -> Result<(), CommandError> {
    let (graph, report) = open(path, settings)?;
    for failure in &report.failures {
        tracing::warn!("{}", failure);
    }
    graph.check_invariants()?;
    if report.is_complete() {
        Ok(())
    } else {
        Err(CommandError::IncompleteLoad(report.failures.len()))
    }
}

/// Write the default settings file
pub fn init_settings(path: &Path) -> Result<(), CommandError> {
    EditorSettings::default().save(path)?;
    Ok(())
}
