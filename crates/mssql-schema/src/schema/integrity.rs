//! Base-table cache for constraint toggling.

use std::collections::HashMap;

/// Base tables per schema filter, scoped to one batch of
/// [`check_integrity`](super::SchemaProvider::check_integrity) calls.
///
/// Create one per batch and drop it afterwards; it is never invalidated.
#[derive(Debug, Default)]
pub struct IntegrityCache {
    tables: HashMap<String, Vec<String>>,
}

impl IntegrityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(schema: Option<&str>) -> String {
        schema.map(str::to_lowercase).unwrap_or_default()
    }

    /// Cached quoted table names for a schema filter.
    pub fn get(&self, schema: Option<&str>) -> Option<&[String]> {
        self.tables.get(&Self::key(schema)).map(Vec::as_slice)
    }

    pub fn insert(&mut self, schema: Option<&str>, tables: Vec<String>) {
        self.tables.insert(Self::key(schema), tables);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_by_schema_filter() {
        let mut cache = IntegrityCache::new();
        cache.insert(Some("Sales"), vec!["[sales].[orders]".into()]);
        cache.insert(None, vec![]);
        assert_eq!(cache.get(Some("sales")).map(<[String]>::len), Some(1));
        assert_eq!(cache.get(None).map(<[String]>::len), Some(0));
        assert!(cache.get(Some("hr")).is_none());
        assert_eq!(cache.len(), 2);
    }
}
