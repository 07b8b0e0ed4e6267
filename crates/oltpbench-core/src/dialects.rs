//! Per-statement SQL dialect map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::database::DatabaseType;

/// Statement text keyed by procedure, then by statement name, for one database type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectMap {
    pub database: Option<DatabaseType>,
    pub procedures: BTreeMap<String, BTreeMap<String, String>>,
}

impl DialectMap {
    #[must_use]
    pub fn new(database: DatabaseType) -> Self {
        Self {
            database: Some(database),
            procedures: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) one statement.
    pub fn insert(
        &mut self,
        procedure: impl Into<String>,
        statement: impl Into<String>,
        sql: impl Into<String>,
    ) {
        self.procedures
            .entry(procedure.into())
            .or_default()
            .insert(statement.into(), sql.into());
    }

    #[must_use]
    pub fn statement(&self, procedure: &str, statement: &str) -> Option<&str> {
        self.procedures
            .get(procedure)
            .and_then(|stmts| stmts.get(statement))
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// Pretty JSON export.
    pub fn export(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
