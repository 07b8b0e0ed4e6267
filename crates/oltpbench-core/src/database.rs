//! Target database descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Database systems the driver knows how to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatabaseType {
    Db2,
    Mysql,
    Myrocks,
    Postgres,
    Oracle,
    Sqlserver,
    Sqlite,
    Hsqldb,
    H2,
    Monetdb,
    Nuodb,
    Timesten,
    Cassandra,
    Memsql,
    Cockroachdb,
}

impl DatabaseType {
    pub const ALL: [DatabaseType; 15] = [
        Self::Db2,
        Self::Mysql,
        Self::Myrocks,
        Self::Postgres,
        Self::Oracle,
        Self::Sqlserver,
        Self::Sqlite,
        Self::Hsqldb,
        Self::H2,
        Self::Monetdb,
        Self::Nuodb,
        Self::Timesten,
        Self::Cassandra,
        Self::Memsql,
        Self::Cockroachdb,
    ];

    /// Upper-case canonical name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Db2 => "DB2",
            Self::Mysql => "MYSQL",
            Self::Myrocks => "MYROCKS",
            Self::Postgres => "POSTGRES",
            Self::Oracle => "ORACLE",
            Self::Sqlserver => "SQLSERVER",
            Self::Sqlite => "SQLITE",
            Self::Hsqldb => "HSQLDB",
            Self::H2 => "H2",
            Self::Monetdb => "MONETDB",
            Self::Nuodb => "NUODB",
            Self::Timesten => "TIMESTEN",
            Self::Cassandra => "CASSANDRA",
            Self::Memsql => "MEMSQL",
            Self::Cockroachdb => "COCKROACHDB",
        }
    }

    /// Whether generated load statements should quote table and column names.
    #[must_use]
    pub fn should_escape_names(&self) -> bool {
        !matches!(
            self,
            Self::Postgres | Self::Hsqldb | Self::Monetdb | Self::Cockroachdb
        )
    }

    /// Whether generated INSERT statements should list column names.
    #[must_use]
    pub fn should_include_column_names(&self) -> bool {
        matches!(self, Self::Cassandra)
    }
}

impl FromStr for DatabaseType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| CoreError::config(format!("unknown database type '{s}'")))
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction isolation requested from the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "TRANSACTION_READ_UNCOMMITTED",
            Self::ReadCommitted => "TRANSACTION_READ_COMMITTED",
            Self::RepeatableRead => "TRANSACTION_REPEATABLE_READ",
            Self::Serializable => "TRANSACTION_SERIALIZABLE",
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRANSACTION_READ_UNCOMMITTED" => Ok(Self::ReadUncommitted),
            "TRANSACTION_READ_COMMITTED" => Ok(Self::ReadCommitted),
            "TRANSACTION_REPEATABLE_READ" => Ok(Self::RepeatableRead),
            "TRANSACTION_SERIALIZABLE" => Ok(Self::Serializable),
            _ => Err(CoreError::config(format!("unknown isolation level '{s}'"))),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters handed to benchmark modules.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub db_type: DatabaseType,
    pub driver: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub batch_size: usize,
    /// Size of the module's connection pool, independent of terminal count.
    pub pool_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_lookup_is_case_insensitive() {
        assert_eq!("postgres".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
        assert_eq!("CockroachDB".parse::<DatabaseType>().unwrap(), DatabaseType::Cockroachdb);
        assert!("mongo".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn test_loader_flags() {
        assert!(DatabaseType::Mysql.should_escape_names());
        assert!(!DatabaseType::Postgres.should_escape_names());
        assert!(DatabaseType::Cassandra.should_include_column_names());
        assert!(!DatabaseType::Sqlite.should_include_column_names());
    }

    #[test]
    fn test_isolation_round_trip() {
        for level in [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
        ] {
            assert_eq!(level.as_str().parse::<IsolationLevel>().unwrap(), level);
        }
        assert!("SNAPSHOT".parse::<IsolationLevel>().is_err());
    }
}
