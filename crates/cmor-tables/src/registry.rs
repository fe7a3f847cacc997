//! Registry of loaded CMOR tables.

use std::collections::BTreeMap;

use crate::error::TableError;
use crate::spec::VariableSpec;
use crate::table::CmorTable;

/// Name of the user-extensible fallback table consulted when the primary
/// table has no entry for a variable.
pub const CUSTOM_TABLE: &str = "custom";

#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, CmorTable>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: CmorTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get(&self, name: &str) -> Option<&CmorTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn known_tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Look a variable up in the named table, falling back to the custom
    /// table when the primary one has no entry.
    pub fn resolve_variable(
        &self,
        table: &str,
        mip: &str,
        short_name: &str,
    ) -> Result<&VariableSpec, TableError> {
        let primary = self.get(table).ok_or_else(|| TableError::UnknownTable {
            table: table.to_string(),
            known: self.known_tables().join(", "),
        })?;
        primary
            .get_variable(mip, short_name)
            .or_else(|| {
                self.get(CUSTOM_TABLE)
                    .and_then(|custom| custom.get_variable(mip, short_name))
            })
            .ok_or_else(|| TableError::UnknownVariable {
                table: table.to_string(),
                mip: mip.to_string(),
                short_name: short_name.to_string(),
            })
    }
}
