use std::collections::BTreeSet;

use rust_decimal::Decimal;

/// Flags debits whose description names one of a configured set of parties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkingRule {
    names: BTreeSet<String>,
}

impl MarkingRule {
    /// Builds a rule from names; surrounding whitespace is trimmed and empty
    /// entries are dropped so that blank descriptions never match.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Parses a comma-separated list, e.g. `"Alice,Bob"`.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True iff `text` exactly equals a configured name and `amount` is negative.
    pub fn is_marked(&self, text: &str, amount: Decimal) -> bool {
        amount < Decimal::ZERO && self.names.contains(text)
    }
}
