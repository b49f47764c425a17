//! External drawing renderer
//!
//! Runs the configured render command with the drawing path appended and
//! parses its stdout as the render result.

use std::io;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render command is empty")]
    EmptyCommand,

    #[error("Render command not found: {0}")]
    NotFound(String),

    #[error("Failed to run render command {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("Render command exited with {status}: {details}")]
    Failed { status: String, details: String },

    #[error("Render command printed invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// The renderer itself is unavailable (as opposed to failing on input)
    pub fn is_missing_dependency(&self) -> bool {
        matches!(self, RenderError::EmptyCommand | RenderError::NotFound(_))
    }
}

/// Render `drawing` with `command` and return the parsed result
pub fn render(command: &[String], drawing: &Path) -> Result<Value, RenderError> {
    let (program, args) = command.split_first().ok_or(RenderError::EmptyCommand)?;

    info!(program = %program, drawing = %drawing.display(), "running render command");
    let output = Command::new(program)
        .args(args)
        .arg(drawing)
        .output()
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => RenderError::NotFound(program.clone()),
            _ => RenderError::Spawn {
                program: program.clone(),
                source,
            },
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let details = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(RenderError::Failed {
            status: output.status.to_string(),
            details,
        });
    }

    debug!(bytes = output.stdout.len(), "render command finished");
    Ok(notetex_core::parse_render_result(&output.stdout)?)
}
