use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// The resource managed by the target API.
///
/// Servers may attach extra fields (timestamps and the like); those are ignored. Ids are opaque:
/// numeric ids are accepted and kept in their decimal string form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Request body for create and update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
}

impl NotePayload {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

fn opaque_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Unsigned(id) => id.to_string(),
        RawId::Signed(id) => id.to_string(),
    })
}

/// One of the five calls a virtual user makes per iteration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateNote,
    GetNote,
    UpdateNote,
    ListNotes,
    DeleteNote,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::CreateNote,
        Operation::GetNote,
        Operation::UpdateNote,
        Operation::ListNotes,
        Operation::DeleteNote,
    ];

    /// Metric name under which the operation's requests are recorded.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateNote => "create_note",
            Operation::GetNote => "get_note",
            Operation::UpdateNote => "update_note",
            Operation::ListNotes => "list_notes",
            Operation::DeleteNote => "delete_note",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
