//! Record module - one row of the source catalogue

use std::fmt;

/// A catalogue record extracted from a tabular source
///
/// Records are immutable once extracted. The category is inherited from the
/// closest preceding header row of the source table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// Category inherited from the preceding header row ("" if none)
    pub category: String,

    /// Scientific (Latin) name
    pub latin: String,

    /// German name
    pub german: String,

    /// Russian name
    pub russian: String,
}

impl Record {
    /// Create a new record
    ///
    /// # Examples
    ///
    /// ```
    /// use bestiary_domain::Record;
    ///
    /// let record = Record::new("Affen", "Pan troglodytes", "Schimpanse", "Шимпанзе");
    /// assert_eq!(record.latin, "Pan troglodytes");
    /// ```
    pub fn new(
        category: impl Into<String>,
        latin: impl Into<String>,
        german: impl Into<String>,
        russian: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            latin: latin.into(),
            german: german.into(),
            russian: russian.into(),
        }
    }

    /// Natural key of this record
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.latin, &self.russian, &self.german)
    }

    /// Check whether every name column is blank
    pub fn is_blank(&self) -> bool {
        self.latin.trim().is_empty()
            && self.german.trim().is_empty()
            && self.russian.trim().is_empty()
    }
}

/// Composite key identifying a logical record across batches and retries
///
/// Built from `(latin, russian, german)`, each trimmed. Comparison is
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NaturalKey {
    /// Trimmed Latin name
    pub latin: String,
    /// Trimmed Russian name
    pub russian: String,
    /// Trimmed German name
    pub german: String,
}

impl NaturalKey {
    /// Build a key, trimming each component
    pub fn new(latin: &str, russian: &str, german: &str) -> Self {
        Self {
            latin: latin.trim().to_string(),
            russian: russian.trim().to_string(),
            german: german.trim().to_string(),
        }
    }

    /// Check whether any component is blank
    pub fn has_blank(&self) -> bool {
        self.latin.is_empty() || self.russian.is_empty() || self.german.is_empty()
    }

    /// Check whether this key is satisfied by `other`
    ///
    /// A blank component matches anything; non-blank components must be
    /// equal. For keys without blank components this is plain equality.
    ///
    /// # Examples
    ///
    /// ```
    /// use bestiary_domain::NaturalKey;
    ///
    /// let input = NaturalKey::new("Pan troglodytes", "Шимпанзе", "");
    /// let answer = NaturalKey::new("Pan troglodytes", "Шимпанзе", "Schimpanse");
    /// assert!(input.covers(&answer));
    /// assert!(!answer.covers(&input));
    /// ```
    pub fn covers(&self, other: &NaturalKey) -> bool {
        fn component(mine: &str, theirs: &str) -> bool {
            mine.is_empty() || mine == theirs
        }

        component(&self.latin, &other.latin)
            && component(&self.russian, &other.russian)
            && component(&self.german, &other.german)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} | {} | {})", self.latin, self.russian, self.german)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_trims_components() {
        let record = Record::new("", "  Panthera leo ", "Löwe\t", " Лев");
        let key = record.key();
        assert_eq!(key.latin, "Panthera leo");
        assert_eq!(key.russian, "Лев");
        assert_eq!(key.german, "Löwe");
    }

    #[test]
    fn test_key_is_case_sensitive() {
        let a = NaturalKey::new("Panthera leo", "Лев", "Löwe");
        let b = NaturalKey::new("panthera leo", "Лев", "Löwe");
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_ignores_category() {
        let a = Record::new("Raubtiere", "Panthera leo", "Löwe", "Лев");
        let b = Record::new("Katzen", "Panthera leo", "Löwe", "Лев");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_covers_is_equality_without_blanks() {
        let a = NaturalKey::new("X", "Y", "Z");
        assert!(a.covers(&NaturalKey::new("X", "Y", "Z")));
        assert!(!a.covers(&NaturalKey::new("X", "Y", "W")));
    }

    #[test]
    fn test_covers_blank_component() {
        let input = NaturalKey::new("X", "", "Z");
        assert!(input.has_blank());
        assert!(input.covers(&NaturalKey::new("X", "Y", "Z")));
        assert!(!input.covers(&NaturalKey::new("Q", "Y", "Z")));
    }

    #[test]
    fn test_blank_record() {
        assert!(Record::new("Affen", " ", "", "").is_blank());
        assert!(!Record::new("", "", "", "Лев").is_blank());
    }

    #[test]
    fn test_display() {
        let key = NaturalKey::new("X", "Y", "Z");
        assert_eq!(key.to_string(), "(X | Y | Z)");
    }

    proptest::proptest! {
        #[test]
        fn prop_covers_is_reflexive(l in ".{0,12}", r in ".{0,12}", g in ".{0,12}") {
            let key = NaturalKey::new(&l, &r, &g);
            proptest::prop_assert!(key.covers(&key));
        }

        #[test]
        fn prop_filled_key_covers_only_itself(
            a in "[a-z]{1,6}",
            b in "[a-z]{1,6}",
        ) {
            let key = NaturalKey::new(&a, &a, &a);
            let other = NaturalKey::new(&b, &b, &b);
            proptest::prop_assert_eq!(key.covers(&other), a == b);
        }
    }
}
