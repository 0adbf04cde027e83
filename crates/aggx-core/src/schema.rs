//! # Row Types
//!
//! Every relational node produces rows of a fixed shape: an ordered list of named, typed
//! fields. Aggregate lowering is positional, so field *order* is part of the contract:
//! an aggregate's row type is always the group-by fields (ascending input position)
//! followed by one field per aggregate call (declaration order).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// SQL value types known to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    Varchar,
    Timestamp,
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, DataType::Float | DataType::Decimal)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "BOOLEAN",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Float => "FLOAT",
            DataType::Decimal => "DECIMAL",
            DataType::Varchar => "VARCHAR",
            DataType::Timestamp => "TIMESTAMP",
        };
        f.write_str(name)
    }
}

/// A single named column of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Ordered list of fields produced by a relational node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowType {
    fields: Vec<Field>,
}

impl RowType {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

impl FromIterator<Field> for RowType {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", field.name, field.data_type)?;
            if !field.nullable {
                write!(f, " NOT NULL")?;
            }
        }
        write!(f, ")")
    }
}

/// Make field names unique, keeping the first occurrence and suffixing later ones with a
/// counter (`sum`, `sum0`, `sum1`, ...).
pub(crate) fn uniquify_names(fields: &mut [Field]) {
    let mut used: HashSet<String> = HashSet::new();
    for field in fields.iter_mut() {
        if used.insert(field.name.clone()) {
            continue;
        }
        let mut counter = 0usize;
        let unique = loop {
            let candidate = format!("{}{}", field.name, counter);
            if !used.contains(&candidate) {
                break candidate;
            }
            counter += 1;
        };
        used.insert(unique.clone());
        field.name = unique;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniquify_names() {
        let mut fields = vec![
            Field::new("a", DataType::Integer, true),
            Field::new("a", DataType::Integer, true),
            Field::new("a0", DataType::Integer, true),
            Field::new("a", DataType::Integer, true),
        ];
        uniquify_names(&mut fields);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a0", "a00", "a1"]);
    }

    #[test]
    fn test_row_type_display() {
        let row: RowType = vec![
            Field::new("k", DataType::Integer, false),
            Field::new("v", DataType::Varchar, true),
        ]
        .into_iter()
        .collect();
        assert_eq!(row.to_string(), "(k INTEGER NOT NULL, v VARCHAR)");
    }
}
