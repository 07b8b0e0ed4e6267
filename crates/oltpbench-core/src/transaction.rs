//! Transaction type catalog.
//!
//! The registry is built once per benchmark, in declaration order, and never
//! changes afterwards. Positions in the registry line up with the entries of
//! every phase weight vector.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier reserved for the "no transaction" sentinel.
pub const INVALID_TRANSACTION_ID: u32 = 0;

/// One kind of transaction a benchmark can issue.
///
/// Cloning is cheap: names are reference counted so that every outcome record
/// can carry its type without copying strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionType {
    id: u32,
    name: Arc<str>,
    benchmark: Arc<str>,
}

impl TransactionType {
    /// Creates a transaction type. Identifiers must be at least 1.
    pub fn new(
        id: u32,
        name: impl Into<Arc<str>>,
        benchmark: impl Into<Arc<str>>,
    ) -> CoreResult<Self> {
        if id == INVALID_TRANSACTION_ID {
            return Err(CoreError::config(
                "transaction type id 0 is reserved for the INVALID sentinel",
            ));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::config("transaction type name cannot be empty"));
        }
        Ok(Self {
            id,
            name,
            benchmark: benchmark.into(),
        })
    }

    /// The sentinel marking "no transaction".
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            id: INVALID_TRANSACTION_ID,
            name: Arc::from("INVALID"),
            benchmark: Arc::from(""),
        }
    }

    /// Globally unique identifier.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Benchmark that declared this type.
    #[must_use]
    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    /// Returns true for the sentinel.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.id == INVALID_TRANSACTION_ID
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.name, self.id)
    }
}

/// A transaction type as it appears in the workload file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransactionTypeDecl {
    /// Transaction name.
    pub name: String,

    /// Explicit identifier; the declaration position is used when absent.
    #[serde(default)]
    pub id: Option<u32>,
}

impl TransactionTypeDecl {
    /// Declaration without an explicit id.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

/// Ordered, immutable catalog of transaction types.
#[derive(Debug, Clone, Default)]
pub struct TransactionTypes {
    types: Vec<TransactionType>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl TransactionTypes {
    /// Builds a registry from already-constructed types, preserving order.
    pub fn new(types: Vec<TransactionType>) -> CoreResult<Self> {
        let mut by_id = HashMap::with_capacity(types.len());
        let mut by_name = HashMap::with_capacity(types.len());

        for (position, txn) in types.iter().enumerate() {
            if txn.is_invalid() {
                return Err(CoreError::config(
                    "the INVALID sentinel cannot be registered as a transaction type",
                ));
            }
            if by_id.insert(txn.id(), position).is_some() {
                return Err(CoreError::already_exists("transaction type id", txn.id().to_string()));
            }
            if by_name.insert(txn.name().to_uppercase(), position).is_some() {
                return Err(CoreError::already_exists("transaction type", txn.name()));
            }
        }

        Ok(Self {
            types,
            by_id,
            by_name,
        })
    }

    /// Builds the registry for one benchmark from its declarations.
    ///
    /// A declaration's id defaults to its one-based position; `id_offset` is
    /// added to every id so that benchmarks run side by side never collide.
    pub fn from_declarations(
        benchmark: &str,
        decls: &[TransactionTypeDecl],
        id_offset: u32,
    ) -> CoreResult<Self> {
        let benchmark: Arc<str> = Arc::from(benchmark);
        let types = decls
            .iter()
            .enumerate()
            .map(|(position, decl)| {
                let local_id = decl.id.unwrap_or(position as u32 + 1);
                let id = local_id.checked_add(id_offset).ok_or_else(|| {
                    CoreError::config(format!(
                        "transaction type `{}` id {local_id} overflows with offset {id_offset}",
                        decl.name
                    ))
                })?;
                TransactionType::new(id, decl.name.as_str(), Arc::clone(&benchmark))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Self::new(types)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Type at a registry position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&TransactionType> {
        self.types.get(position)
    }

    /// Lookup by identifier.
    #[must_use]
    pub fn by_id(&self, id: u32) -> Option<&TransactionType> {
        self.by_id.get(&id).map(|&position| &self.types[position])
    }

    /// Case-insensitive lookup by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&TransactionType> {
        self.by_name
            .get(&name.to_uppercase())
            .map(|&position| &self.types[position])
    }

    /// Registry position of a type.
    #[must_use]
    pub fn position(&self, txn: &TransactionType) -> Option<usize> {
        self.by_id.get(&txn.id()).copied()
    }

    /// Largest identifier in the registry (0 when empty).
    #[must_use]
    pub fn max_id(&self) -> u32 {
        self.types.iter().map(TransactionType::id).max().unwrap_or(0)
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TransactionType> {
        self.types.iter()
    }
}

impl<'a> IntoIterator for &'a TransactionTypes {
    type Item = &'a TransactionType;
    type IntoIter = std::slice::Iter<'a, TransactionType>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.iter()
    }
}

impl fmt::Display for TransactionTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.types.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(names: &[&str]) -> Vec<TransactionTypeDecl> {
        names.iter().map(|n| TransactionTypeDecl::named(*n)).collect()
    }

    #[test]
    fn test_declaration_order_and_ids() {
        let types =
            TransactionTypes::from_declarations(
                "tpcc",
                &decls(&["NewOrder", "Payment", "Delivery"]),
                0,
            )
                .unwrap();

        assert_eq!(types.len(), 3);
        let names: Vec<&str> = types.iter().map(TransactionType::name).collect();
        assert_eq!(names, vec!["NewOrder", "Payment", "Delivery"]);
        assert_eq!(types.get(1).unwrap().id(), 2);
        assert_eq!(types.by_id(3).unwrap().name(), "Delivery");
    }

    #[test]
    fn test_offset_and_explicit_ids() {
        let mut list = decls(&["A", "B"]);
        list[1].id = Some(7);
        let types = TransactionTypes::from_declarations("second", &list, 5).unwrap();

        assert_eq!(types.by_name("a").unwrap().id(), 6);
        assert_eq!(types.by_name("B").unwrap().id(), 12);
        assert_eq!(types.max_id(), 12);
        assert_eq!(types.by_name("b").unwrap().benchmark(), "second");
    }

    #[test]
    fn test_id_overflow_is_a_configuration_error() {
        let decls = [TransactionTypeDecl {
            name: "Huge".into(),
            id: Some(u32::MAX),
        }];
        assert!(TransactionTypes::from_declarations("kv", &decls, 0).is_ok());
        let err = TransactionTypes::from_declarations("kv", &decls, 1).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err =
            TransactionTypes::from_declarations("x", &decls(&["Read", "read"]), 0).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
    }

    #[test]
    fn test_invalid_sentinel() {
        let invalid = TransactionType::invalid();
        assert!(invalid.is_invalid());
        assert!(TransactionType::new(0, "Zero", "x").is_err());
        assert!(TransactionTypes::new(vec![invalid]).is_err());
    }
}
