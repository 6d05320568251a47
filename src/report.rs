//! Report rendering.
//!
//! Two output shapes: a machine-readable JSON document and a
//! human-readable summary. Message text is whitespace-normalized on the
//! way out so that multi-line string literals in checks render cleanly;
//! list-valued descriptions stay lists in JSON and join with newlines for
//! display.

use std::fmt::Write as _;

use serde::Serialize;

use crate::bundle::{Description, ErrorBundle, Message, MessageNode, Severity};
use crate::detect::PackageType;
use crate::error::Result;

/// A finished validation run in serializable form.
#[derive(Serialize)]
pub struct Report {
    /// Detected package type.
    pub detected_type: PackageType,
    /// Tier the run ended on.
    pub ending_tier: u8,
    /// Whether the package passed validation.
    pub success: bool,
    /// Whether the package was rejected outright.
    pub rejected: bool,
    /// Whether the run was cut short by tier short-circuiting.
    pub unfinished: bool,
    /// Error count.
    pub errors: usize,
    /// Warning count.
    pub warnings: usize,
    /// Notice count.
    pub notices: usize,
    /// All messages, errors first, with normalized text.
    pub messages: Vec<Message>,
    /// The derived message-count tree.
    pub message_tree: MessageNode,
}

/// Collapses runs of whitespace, including newlines, to single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_description(description: &Description) -> Description {
    match description {
        Description::Text(text) => Description::Text(clean_text(text)),
        Description::Lines(lines) => {
            Description::Lines(lines.iter().map(|line| clean_text(line)).collect())
        }
    }
}

fn clean_message(message: &Message) -> Message {
    let mut message = message.clone();
    message.message = clean_text(&message.message);
    message.description = clean_description(&message.description);
    message
}

/// Joins a description into display text.
fn description_for_display(description: &Description) -> String {
    match description {
        Description::Text(text) => text.clone(),
        Description::Lines(lines) => lines.join("\n"),
    }
}

impl Report {
    /// Snapshots a bundle into a report.
    #[must_use]
    pub fn from_bundle(bundle: &ErrorBundle, fail_on_warnings: bool) -> Self {
        let messages: Vec<Message> = bundle
            .errors()
            .iter()
            .chain(bundle.warnings())
            .chain(bundle.notices())
            .map(clean_message)
            .collect();
        Self {
            detected_type: bundle.detected_type(),
            ending_tier: bundle.tier(),
            success: !bundle.failed(fail_on_warnings),
            rejected: bundle.rejected(),
            unfinished: bundle.unfinished(),
            errors: bundle.errors().len(),
            warnings: bundle.warnings().len(),
            notices: bundle.notices().len(),
            messages,
            message_tree: bundle.message_tree().clone(),
        }
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Serialize`](crate::error::ValidationError::Serialize)
    /// when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Renders the human-readable summary.
    #[must_use]
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Detected type: {}", self.detected_type.label());
        if self.success {
            out.push_str("Validation succeeded!\n");
        } else {
            out.push_str("Validation failed!\n");
        }

        for message in &self.messages {
            out.push('\n');
            let label = match message.severity {
                Severity::Error => "Error",
                Severity::Warning => "Warning",
                Severity::Notice => "Notice",
            };
            let _ = writeln!(out, "{label}: {}", message.message);
            if !message.description.is_empty() {
                let _ = writeln!(
                    out,
                    "    Description: {}",
                    description_for_display(&message.description)
                );
            }
            let _ = writeln!(out, "    Tier: {}", message.tier);
            if !message.file.is_empty() {
                let _ = writeln!(out, "    File: {}", message.file);
            }
            if message.line > 0 {
                let _ = writeln!(out, "    Line: {}", message.line);
            }
            if message.column > 0 {
                let _ = writeln!(out, "    Column: {}", message.column);
            }
            if let Some(context) = &message.context {
                out.push_str("    Context:\n");
                for line in context {
                    match line {
                        Some(text) => {
                            let _ = writeln!(out, "        {text}");
                        }
                        None => out.push_str("        (gap)\n"),
                    }
                }
            }
        }

        if self.unfinished {
            out.push_str("\nValidation was terminated before completion.\n");
        }
        out
    }
}
