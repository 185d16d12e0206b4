//! The immutable source registry.
//!
//! Sources are registered once through [`RegistryBuilder`] and frozen into
//! a [`SourceRegistry`], which every component receives explicitly at
//! construction (typically behind an `Arc`). Registration order defines
//! [`SourceId`]s and the canonical source order of every task.

use indexmap::IndexMap;

use crate::error::RegistryError;
use crate::id::SourceId;
use crate::source::ObservationSource;

/// Frozen, ordered set of observation sources.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRegistry {
    sources: IndexMap<SourceId, ObservationSource>,
}

impl SourceRegistry {
    /// Start registering sources.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            sources: IndexMap::new(),
        }
    }

    /// Look up a source.
    pub fn get(&self, id: SourceId) -> Option<&ObservationSource> {
        self.sources.get(&id)
    }

    /// Look up a source id by name.
    pub fn id_of(&self, name: &str) -> Option<SourceId> {
        self.sources
            .iter()
            .find(|(_, s)| s.schema().name == name)
            .map(|(id, _)| *id)
    }

    /// Sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &ObservationSource)> {
        self.sources.iter().map(|(id, s)| (*id, s))
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns `true` if no sources are registered.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Builder for [`SourceRegistry`].
pub struct RegistryBuilder {
    sources: IndexMap<SourceId, ObservationSource>,
}

impl RegistryBuilder {
    /// Register a source and return its id.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateSource`] if the name is taken.
    pub fn register(&mut self, source: ObservationSource) -> Result<SourceId, RegistryError> {
        let name = &source.schema().name;
        if self.sources.values().any(|s| &s.schema().name == name) {
            return Err(RegistryError::DuplicateSource { name: name.clone() });
        }
        let id = SourceId(self.sources.len() as u32);
        self.sources.insert(id, source);
        Ok(id)
    }

    /// Freeze the registry.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Empty`] if nothing was registered.
    pub fn build(self) -> Result<SourceRegistry, RegistryError> {
        if self.sources.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(SourceRegistry {
            sources: self.sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Timestamp;
    use crate::source::{
        CoordinateReference, Domain, MissingValue, PointRecord, Resolution, SourceData,
        SourceSchema,
    };

    fn source(name: &str) -> ObservationSource {
        ObservationSource::new(
            SourceSchema {
                name: name.into(),
                variable: "t2m".into(),
                reference: CoordinateReference::Geographic,
                resolution: Resolution::Irregular,
                missing: MissingValue::Nan,
                domain: Domain::new_2d([0.0, 0.0], [10.0, 10.0]),
            },
            SourceData::Points(vec![PointRecord::new([1.0, 1.0], Timestamp(0), 1.0)]),
        )
        .unwrap()
    }

    #[test]
    fn ids_follow_registration_order() {
        let mut b = SourceRegistry::builder();
        assert_eq!(b.register(source("a")).unwrap(), SourceId(0));
        assert_eq!(b.register(source("b")).unwrap(), SourceId(1));
        let reg = b.build().unwrap();
        assert_eq!(reg.id_of("b"), Some(SourceId(1)));
        let names: Vec<&str> = reg.iter().map(|(_, s)| s.schema().name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut b = SourceRegistry::builder();
        b.register(source("a")).unwrap();
        assert_eq!(
            b.register(source("a")).unwrap_err(),
            RegistryError::DuplicateSource { name: "a".into() }
        );
    }

    #[test]
    fn empty_registry_rejected() {
        assert_eq!(
            SourceRegistry::builder().build().unwrap_err(),
            RegistryError::Empty
        );
    }
}
