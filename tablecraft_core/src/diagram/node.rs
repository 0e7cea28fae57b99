use crate::schema::{Field, Layout, Table};
use serde::{Deserialize, Serialize};

pub const TABLE_NODE_TYPE: &str = "table";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl From<Layout> for Position {
    fn from(layout: Layout) -> Self {
        Self {
            x: layout.x,
            y: layout.y,
        }
    }
}

impl From<Position> for Layout {
    fn from(position: Position) -> Self {
        Layout::new(position.x, position.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNodeData {
    pub id: String,
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Position,
    pub data: TableNodeData,
}

impl From<&Table> for TableNode {
    fn from(table: &Table) -> Self {
        Self {
            id: table.id.clone(),
            node_type: TABLE_NODE_TYPE.to_string(),
            position: table.layout.into(),
            data: TableNodeData {
                id: table.id.clone(),
                name: table.name.clone(),
                fields: table.fields.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameEditState {
    Viewing,
    Editing { buffer: String },
}

/// Inline table-name editing.
///
/// viewing -(double-click)-> editing -(blur/Enter)-> viewing, committing;
/// editing -(Escape)-> viewing, reverting to the committed name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameEditor {
    committed: String,
    state: NameEditState,
}

impl NameEditor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            committed: name.into(),
            state: NameEditState::Viewing,
        }
    }

    pub fn state(&self) -> &NameEditState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, NameEditState::Editing { .. })
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// What the node shows right now
    pub fn display(&self) -> &str {
        match &self.state {
            NameEditState::Viewing => &self.committed,
            NameEditState::Editing { buffer } => buffer,
        }
    }

    pub fn begin(&mut self) {
        if !self.is_editing() {
            self.state = NameEditState::Editing {
                buffer: self.committed.clone(),
            };
        }
    }

    pub fn input(&mut self, text: impl Into<String>) {
        if let NameEditState::Editing { buffer } = &mut self.state {
            *buffer = text.into();
        }
    }

    /// Leave editing. Returns the new name when it differs from the committed one.
    /// A blank buffer reverts.
    pub fn commit(&mut self) -> Option<String> {
        let NameEditState::Editing { buffer } =
            std::mem::replace(&mut self.state, NameEditState::Viewing)
        else {
            return None;
        };
        let candidate = buffer.trim();
        if candidate.is_empty() || candidate == self.committed {
            return None;
        }
        self.committed = candidate.to_string();
        Some(self.committed.clone())
    }

    pub fn cancel(&mut self) {
        self.state = NameEditState::Viewing;
    }

    /// Adopt a name coming from the store; ignored mid-edit
    pub fn sync(&mut self, name: &str) {
        if !self.is_editing() {
            self.committed = name.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_commits_the_buffer() {
        let mut editor = NameEditor::new("users");
        editor.begin();
        assert_eq!(editor.display(), "users");
        editor.input("customers ");
        assert_eq!(editor.commit(), Some("customers".to_string()));
        assert_eq!(editor.state(), &NameEditState::Viewing);
        assert_eq!(editor.display(), "customers");
    }

    #[test]
    fn escape_reverts() {
        let mut editor = NameEditor::new("users");
        editor.begin();
        editor.input("oops");
        assert_eq!(editor.display(), "oops");
        editor.cancel();
        assert_eq!(editor.display(), "users");
        assert_eq!(editor.commit(), None);
    }

    #[test]
    fn unchanged_or_blank_commit_is_silent() {
        let mut editor = NameEditor::new("users");
        editor.begin();
        assert_eq!(editor.commit(), None);

        editor.begin();
        editor.input("   ");
        assert_eq!(editor.commit(), None);
        assert_eq!(editor.committed(), "users");
    }

    #[test]
    fn input_outside_editing_is_ignored() {
        let mut editor = NameEditor::new("users");
        editor.input("nope");
        assert_eq!(editor.display(), "users");

        editor.begin();
        editor.sync("renamed elsewhere");
        assert_eq!(editor.committed(), "users");
    }
}
