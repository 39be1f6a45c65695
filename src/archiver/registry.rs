use std::collections::BTreeMap;

use super::{Archiver, ZipArchiver};
use crate::error::{ArchiverError, Result};

/// Constructs a fresh archiver instance.
pub type ArchiverFactory = fn() -> Box<dyn Archiver>;

/// Maps archiver names to their factories.
#[derive(Debug, Clone, Default)]
pub struct ArchiverRegistry {
    factories: BTreeMap<&'static str, ArchiverFactory>,
}

impl ArchiverRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every archiver built into the crate
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ZipArchiver::NAME, || Box::new(ZipArchiver::new()));
        registry
    }

    /// Register `factory` under `name`, returning any factory it replaces.
    pub fn register(&mut self, name: &'static str, factory: ArchiverFactory) -> Option<ArchiverFactory> {
        self.factories.insert(name, factory)
    }

    /// Registered names, sorted
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Archiver>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ArchiverError::UnsupportedArchiver(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_include_zip() {
        let registry = ArchiverRegistry::with_defaults();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["zip"]);
        assert_eq!(registry.create("zip").unwrap().name(), "zip");
    }

    #[test]
    fn unknown_names_are_unsupported() {
        let registry = ArchiverRegistry::with_defaults();
        let err = registry.create("rar").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedArchiver);
        assert!(ArchiverRegistry::new().create("zip").is_err());
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = ArchiverRegistry::new();
        assert!(registry.register("zip", || Box::new(ZipArchiver::new())).is_none());
        assert!(registry.register("zip", || Box::new(ZipArchiver::new())).is_some());
    }
}
