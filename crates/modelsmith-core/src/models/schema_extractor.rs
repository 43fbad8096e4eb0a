//! Promotes Mermaid diagrams written by the AI into the project's schema field.
//!
//! Matching is substring based rather than a grammar parse: any fenced
//! `mermaid` block whose body mentions `erDiagram` or `classDiagram` is
//! accepted, even when the keyword appears outside actual diagram syntax.

use lazy_static::lazy_static;
use regex::Regex;

use super::message::{Message, Sender};

pub const DIAGRAM_MARKERS: &[&str] = &["erDiagram", "classDiagram"];

lazy_static! {
    // First fenced block tagged `mermaid`; the body ends at the next closing fence
    static ref MERMAID_BLOCK_REGEX: Regex =
        Regex::new(r"```mermaid\n([\s\S]*?)```").expect("MERMAID_BLOCK_REGEX pattern is valid");
}

/// Decide whether the most recent message should replace the schema artifact.
///
/// Returns the diagram body to store, or `None` to leave the schema unchanged.
/// Only settled AI messages are considered.
pub fn extract_schema(last: Option<&Message>) -> Option<String> {
    let message = last?;
    if message.sender != Sender::Ai || message.is_thinking() {
        return None;
    }

    let body = MERMAID_BLOCK_REGEX
        .captures(&message.content)?
        .get(1)?
        .as_str();

    if DIAGRAM_MARKERS.iter().any(|marker| body.contains(marker)) {
        Some(body.to_string())
    } else {
        None
    }
}
