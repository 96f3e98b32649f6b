use std::collections::BTreeMap;

/// Static mapping between category names and marketplace category numbers
///
/// Loaded once per session and never mutated while a session runs.
#[derive(Debug, Clone, Default)]
pub struct CategoryDict {
    by_name: BTreeMap<String, i64>,
}

impl CategoryDict {
    pub fn new(by_name: BTreeMap<String, i64>) -> Self {
        Self { by_name }
    }

    /// Reverse lookup of a category number
    pub fn name_of(&self, category_num: i64) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, num)| **num == category_num)
            .map(|(name, _)| name.as_str())
    }

    pub fn num_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(name).copied()
    }

    /// Every number from the smallest to the largest known category
    ///
    /// Numbers without a name are included; the marketplace leaves gaps and
    /// the orchestrator skips them.
    pub fn full_range(&self) -> Vec<i64> {
        let min = self.by_name.values().min();
        let max = self.by_name.values().max();
        match (min, max) {
            (Some(min), Some(max)) => (*min..=*max).collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.by_name.iter().map(|(name, num)| (name.as_str(), *num))
    }
}
