//! Stand-in chat agent. It echoes the message and, when the text reads like a
//! request for documents, calls the document index as a tool.

use docsim_core::{Hit, IndexHandle, DEFAULT_TOP_K};
use std::sync::Arc;

const DOC_HINTS: &[&str] = &[
    "attachment", "attachments", "doc", "docs", "document", "documents", "documentation",
    "file", "files", "manual", "pdf", "report", "reports", "spreadsheet",
];

/// The document index exposed as a callable tool.
#[derive(Clone)]
pub struct DocumentSearchTool {
    index: Arc<IndexHandle>,
}

impl DocumentSearchTool {
    pub fn new(index: Arc<IndexHandle>) -> Self { Self { index } }

    /// Top hits that share at least one term with `query`.
    pub fn call(&self, query: &str) -> Vec<Hit> {
        self.index
            .query(query, DEFAULT_TOP_K)
            .into_iter()
            .filter(|h| h.score > 0.0)
            .collect()
    }
}

#[derive(Clone)]
pub struct EchoAgent {
    tool: DocumentSearchTool,
}

impl EchoAgent {
    pub fn new(tool: DocumentSearchTool) -> Self { Self { tool } }

    pub fn respond(&self, message: &str) -> String {
        let mut reply = format!("Hello, you said: '{message}'");
        if !wants_documents(message) {
            return reply;
        }
        let hits = self.tool.call(message);
        tracing::debug!(hits = hits.len(), "document tool invoked");
        if hits.is_empty() {
            reply.push_str("\n\nI could not find any related documents.");
        } else {
            reply.push_str("\n\nRelated documents:");
            for h in &hits {
                reply.push_str(&format!("\n- {} (similarity {:.2})", h.document.name, h.score));
            }
        }
        reply
    }
}

fn wants_documents(message: &str) -> bool {
    message
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| DOC_HINTS.contains(&w.to_lowercase().as_str()))
}
