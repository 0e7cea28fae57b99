use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Canvas position of a table node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
    pub x: f64,
    pub y: f64,
}

impl Layout {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The server stores whole-pixel coordinates
    pub fn rounded(self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub is_primary_key: bool,
    /// Mirrors relation membership; maintained by the schema store
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub via_faker: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faker_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Field {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type: field_type.into(),
            ..Default::default()
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary_key = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Table {
    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn field_mut(&mut self, field_id: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }

    pub fn has_field(&self, field_id: &str) -> bool {
        self.field(field_id).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    OneToOne,
    #[default]
    OneToMany,
    ManyToMany,
    ManyToOne,
}

impl RelationType {
    /// Short cardinality label drawn on diagram edges
    pub fn label(self) -> &'static str {
        match self {
            RelationType::OneToOne => "1:1",
            RelationType::OneToMany => "1:N",
            RelationType::ManyToMany => "N:M",
            RelationType::ManyToOne => "N:1",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::OneToOne => "one-to-one",
            RelationType::OneToMany => "one-to-many",
            RelationType::ManyToMany => "many-to-many",
            RelationType::ManyToOne => "many-to-one",
        }
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "one-to-one" | "1:1" => Ok(RelationType::OneToOne),
            "one-to-many" | "1:n" => Ok(RelationType::OneToMany),
            "many-to-many" | "n:m" => Ok(RelationType::ManyToMany),
            "many-to-one" | "n:1" => Ok(RelationType::ManyToOne),
            _ => Err(format!("Invalid relation type: {}", s)),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed association from `from_table.from_field` to the foreign-key
/// bearing `to_table.to_field`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: String,
    pub from_table: String,
    pub to_table: String,
    pub from_field: String,
    pub to_field: String,
    #[serde(rename = "type", default)]
    pub relation_type: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_handle: Option<String>,
}

impl Relation {
    pub fn touches_table(&self, table_id: &str) -> bool {
        self.from_table == table_id || self.to_table == table_id
    }

    pub fn touches_field(&self, table_id: &str, field_id: &str) -> bool {
        (self.from_table == table_id && self.from_field == field_id)
            || (self.to_table == table_id && self.to_field == field_id)
    }

    pub fn targets(&self, table_id: &str, field_id: &str) -> bool {
        self.to_table == table_id && self.to_field == field_id
    }
}

/// Full schema as returned by the backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Regular,
    Primary,
    Foreign,
}

/// Source endpoint of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedInfo {
    pub referenced_table_id: String,
    pub referenced_field_id: String,
}

/// Shallow partial update of a table; absent members are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Field>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl TableUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn move_to(layout: Layout) -> Self {
        Self {
            layout: Some(layout),
            ..Default::default()
        }
    }

    pub fn with_fields(fields: Vec<Field>) -> Self {
        Self {
            fields: Some(fields),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.fields.is_none()
            && self.layout.is_none()
            && self.meta.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldUpdate {
    pub name: Option<String>,
    pub field_type: Option<String>,
    pub is_primary_key: Option<bool>,
    pub unique: Option<bool>,
    pub auto_increment: Option<bool>,
    pub via_faker: Option<bool>,
    /// `Some(None)` clears the value
    pub faker_type: Option<Option<String>>,
    pub locale: Option<Option<String>>,
}

impl FieldUpdate {
    pub fn apply(&self, field: &mut Field) {
        if let Some(name) = &self.name {
            field.name = name.clone();
        }
        if let Some(field_type) = &self.field_type {
            field.field_type = field_type.clone();
        }
        if let Some(pk) = self.is_primary_key {
            field.is_primary_key = pk;
        }
        if let Some(unique) = self.unique {
            field.unique = unique;
        }
        if let Some(auto_increment) = self.auto_increment {
            field.auto_increment = auto_increment;
        }
        if let Some(via_faker) = self.via_faker {
            field.via_faker = via_faker;
        }
        if let Some(faker_type) = &self.faker_type {
            field.faker_type = faker_type.clone();
        }
        if let Some(locale) = &self.locale {
            field.locale = locale.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationUpdate {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<RelationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn relation_wire_format() {
        let relation: Relation = serde_json::from_value(json!({
            "id": "r1",
            "fromTable": "users",
            "toTable": "orders",
            "fromField": "id",
            "toField": "user_id",
            "type": "many-to-one",
        }))
        .unwrap();
        assert_eq!(relation.relation_type, RelationType::ManyToOne);
        assert_eq!(relation.from_handle, None);

        let out = serde_json::to_value(&relation).unwrap();
        assert_eq!(out["type"], "many-to-one");
        assert!(out.get("fromHandle").is_none());
    }

    #[test]
    fn field_flags_default_to_false() {
        let field: Field =
            serde_json::from_value(json!({"id": "f", "name": "email", "type": "varchar"})).unwrap();
        assert!(!field.is_primary_key && !field.is_foreign_key && !field.unique);
    }

    #[test]
    fn field_update_sets_and_clears_faker_options() {
        let mut field = Field::new("f", "email", "varchar");
        FieldUpdate {
            via_faker: Some(true),
            faker_type: Some(Some("email".to_string())),
            locale: Some(Some("de_DE".to_string())),
            ..Default::default()
        }
        .apply(&mut field);
        assert_eq!(field.faker_type.as_deref(), Some("email"));
        assert_eq!(field.locale.as_deref(), Some("de_DE"));

        FieldUpdate {
            name: Some("contact".to_string()),
            ..Default::default()
        }
        .apply(&mut field);
        assert_eq!(field.locale.as_deref(), Some("de_DE"));

        FieldUpdate {
            faker_type: Some(None),
            locale: Some(None),
            ..Default::default()
        }
        .apply(&mut field);
        assert_eq!(field.faker_type, None);
        assert_eq!(field.locale, None);
        assert!(field.via_faker);
    }

    #[test]
    fn labels_cover_every_relation_type() {
        assert_eq!(RelationType::OneToOne.label(), "1:1");
        assert_eq!(RelationType::OneToMany.label(), "1:N");
        assert_eq!(RelationType::ManyToMany.label(), "N:M");
        assert_eq!(RelationType::ManyToOne.label(), "N:1");
        assert_eq!("N:M".parse::<RelationType>(), Ok(RelationType::ManyToMany));
    }

    #[test]
    fn layout_rounding() {
        assert_eq!(Layout::new(10.6, -3.4).rounded(), Layout::new(11.0, -3.0));
    }
}
