//! Typed document body.
//!
//! The workflow treats content as opaque, but it is still strongly typed so
//! that snapshots decode into the same shapes that were stored. Annex payloads
//! are a sum type keyed by `type`, one concrete payload per annex kind.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata, process groups and annexes of a procedure document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub process_groups: Vec<ProcessGroup>,
    #[serde(default)]
    pub annexes: Vec<Annex>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub implicated_actors: Vec<String>,
    #[serde(default)]
    pub management_rules: Vec<String>,
    #[serde(default)]
    pub terminology: Vec<Term>,
}

/// One glossary entry of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessGroup {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub steps: Vec<ProcessStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessStep {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub descriptions: Vec<ProcessDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescription {
    pub title: String,
    pub instructions: String,
    pub order: u32,
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annex {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub content: AnnexContent,
}

/// Annex payload, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnexContent {
    /// Diagram shapes as produced by the external diagram editor.
    Diagram {
        #[serde(default)]
        shapes: Vec<Value>,
    },
    Table {
        columns: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<String>>,
    },
    Text { body: String },
    File {
        #[serde(default)]
        attachments: Vec<FileAttachment>,
    },
}

impl AnnexContent {
    pub fn kind(&self) -> &'static str {
        match self {
            AnnexContent::Diagram { .. } => "diagram",
            AnnexContent::Table { .. } => "table",
            AnnexContent::Text { .. } => "text",
            AnnexContent::File { .. } => "file",
        }
    }
}

/// Reference to a file held by the object store; only the pointer lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub storage_key: String,
}
