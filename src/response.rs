//! The uniform response envelope and the normalizer that produces it.

use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::process::runner::ExecutionResult;

/// Prefix of every failed command's envelope text.
pub const ERROR_PREFIX: &str = "Error executing command: ";

/// One entry of an envelope's content list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
}

impl ContentItem {
    pub fn text(&self) -> &str {
        match self {
            ContentItem::Text { text } => text,
        }
    }
}

/// Response envelope returned for every invocation, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Text of the first content entry.
    pub fn first_text(&self) -> &str {
        self.content.first().map(ContentItem::text).unwrap_or_default()
    }
}

impl From<ToolResult> for CallToolResult {
    fn from(result: ToolResult) -> Self {
        CallToolResult {
            content: result
                .content
                .into_iter()
                .map(|item| match item {
                    ContentItem::Text { text } => Content::text(text),
                })
                .collect(),
            is_error: Some(result.is_error),
            structured_content: None,
            meta: None,
        }
    }
}

/// Shape a runner outcome into the response envelope.
pub fn normalize(result: ExecutionResult) -> ToolResult {
    if result.success {
        ToolResult::success(result.output)
    } else {
        let message = result.error_message.as_deref().unwrap_or("unknown error");
        ToolResult::error(format!("{}{}", ERROR_PREFIX, message))
    }
}
