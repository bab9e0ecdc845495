use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single column as reported by the database catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
    pub primary_key: BTreeSet<String>,
}

impl TableInfo {
    /// Appends a column unless one with the same name already exists.
    /// Returns whether the column was added.
    pub fn push_column(&mut self, column: ColumnInfo) -> bool {
        if self.columns.iter().any(|c| c.name == column.name) {
            return false;
        }
        self.columns.push(column);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// Snapshot of the database structure: tables keyed by their fully
/// qualified name (`schema.table`) plus the foreign-key graph between them.
///
/// Ordered collections keep the rendered prompt stable for identical snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub tables: BTreeMap<String, TableInfo>,
    pub foreign_keys: BTreeSet<ForeignKeyEdge>,
}

impl SchemaMetadata {
    /// Returns the table entry, creating it on first use
    pub fn table_mut(&mut self, name: &str) -> &mut TableInfo {
        self.tables.entry(name.to_string()).or_default()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Edges leaving `table`, in sorted order
    pub fn foreign_keys_from<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKeyEdge> {
        self.foreign_keys.iter().filter(move |fk| fk.from_table == table)
    }
}

/// Joins a schema and table name into the key used by [`SchemaMetadata`].
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_schema;
    use super::*;

    #[test]
    fn test_push_column_keeps_names_unique() {
        let mut table = TableInfo::default();
        let column = ColumnInfo {
            name: "id".to_string(),
            data_type: "INTEGER".to_string(),
            nullable: false,
        };
        assert!(table.push_column(column.clone()));
        assert!(!table.push_column(column));
        assert_eq!(table.columns.len(), 1);
    }

    #[test]
    fn test_foreign_keys_from() {
        let schema = sample_schema();
        let edges: Vec<_> = schema.foreign_keys_from("dbo.Orders").collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to_table, "dbo.Users");
        assert_eq!(schema.foreign_keys_from("dbo.Users").count(), 0);
    }

    #[test]
    fn test_column_order_preserved() {
        let schema = sample_schema();
        let names: Vec<_> = schema.tables["dbo.Users"].columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["UserId", "Name", "RegistrationDate"]);
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("main", "orders"), "main.orders");
    }
}
