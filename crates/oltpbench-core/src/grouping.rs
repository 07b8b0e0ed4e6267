//! Named transaction groupings used only for reporting.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::transaction::{TransactionType, TransactionTypes};

/// Name reserved for the implicit grouping of every transaction type.
pub const RESERVED_GROUPING: &str = "all";

/// Grouping as it appears in the workload file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GroupingDecl {
    pub name: String,
    pub weights: Vec<f64>,
}

/// A validated grouping: a label plus one weight per transaction type.
///
/// Groupings never influence selection; they only define an alternate slice
/// of the results.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    name: String,
    weights: Vec<f64>,
}

impl Grouping {
    /// Validates the name (lower-cased first) and the weight count.
    pub fn new(name: &str, weights: Vec<f64>, transaction_count: usize) -> CoreResult<Self> {
        let name = name.to_lowercase();
        validate_grouping_name(&name)?;
        if weights.len() != transaction_count {
            return Err(CoreError::invalid_grouping(
                &name,
                format!(
                    "has {} weights, but there are {transaction_count} transactions \
                     in this benchmark",
                    weights.len()
                ),
            ));
        }
        Ok(Self { name, weights })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Transaction types carrying a positive weight in this grouping.
    pub fn members<'a>(
        &'a self,
        types: &'a TransactionTypes,
    ) -> impl Iterator<Item = &'a TransactionType> + 'a {
        types
            .iter()
            .zip(self.weights.iter())
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(txn, _)| txn)
    }
}

/// Names must match `^[a-z][a-zA-Z0-9_]*$` and must not be `all`.
pub fn validate_grouping_name(name: &str) -> CoreResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(CoreError::invalid_grouping(
            name,
            "must begin with a letter and contain only alphanumeric characters",
        ));
    }
    if name == RESERVED_GROUPING {
        return Err(CoreError::invalid_grouping(
            name,
            "\"all\" is reserved, please pick a different name",
        ));
    }
    Ok(())
}
