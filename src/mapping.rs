use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::image_id::ImageId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub old_id: ImageId,
    pub new_id: ImageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingConflict {
    SelfMapping(ImageId),
    DuplicateSource(ImageId),
    DuplicateTarget(ImageId),
}

impl std::fmt::Display for MappingConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfMapping(id) => write!(f, "image {id} would map to itself"),
            Self::DuplicateSource(id) => write!(f, "image {id} is already mapped"),
            Self::DuplicateTarget(id) => {
                write!(f, "id mapping is not one-to-one: multiple images map to {id}")
            }
        }
    }
}

impl std::error::Error for MappingConflict {}

/// Old->new image id map, kept one-to-one and in insertion order.
#[derive(Debug, Clone, Default)]
pub struct IdMapping {
    entries: Vec<MappingEntry>,
    index: HashMap<String, usize>,
    targets: HashSet<ImageId>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old_id: ImageId, new_id: ImageId) -> Result<(), MappingConflict> {
        if old_id == new_id {
            return Err(MappingConflict::SelfMapping(old_id));
        }
        if self.index.contains_key(old_id.as_str()) {
            return Err(MappingConflict::DuplicateSource(old_id));
        }
        if self.targets.contains(&new_id) {
            return Err(MappingConflict::DuplicateTarget(new_id));
        }

        self.index
            .insert(old_id.as_str().to_string(), self.entries.len());
        self.targets.insert(new_id.clone());
        self.entries.push(MappingEntry { old_id, new_id });
        Ok(())
    }

    /// Look up the replacement for a raw identifier payload.
    pub fn get(&self, old_id: &str) -> Option<&ImageId> {
        self.index.get(old_id).map(|&i| &self.entries[i].new_id)
    }

    pub fn contains_target(&self, id: &ImageId) -> bool {
        self.targets.contains(id)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(c: char) -> ImageId {
        c.to_string().repeat(64).parse().unwrap()
    }

    #[test]
    fn insert_and_lookup() {
        let mut mapping = IdMapping::new();
        mapping.insert(id('a'), id('b')).unwrap();
        assert_eq!(mapping.get(&"a".repeat(64)), Some(&id('b')));
        assert_eq!(mapping.get(&"b".repeat(64)), None);
        assert_eq!(mapping.len(), 1);
        assert!(mapping.contains_target(&id('b')));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let mut mapping = IdMapping::new();
        mapping.insert(id('a'), id('b')).unwrap();
        assert_eq!(mapping.get(&"A".repeat(64)), None);
    }

    #[test]
    fn rejects_self_mapping() {
        let mut mapping = IdMapping::new();
        let err = mapping.insert(id('a'), id('a')).unwrap_err();
        assert_eq!(err, MappingConflict::SelfMapping(id('a')));
        assert!(mapping.is_empty());
    }

    #[test]
    fn rejects_duplicate_source_and_target() {
        let mut mapping = IdMapping::new();
        mapping.insert(id('a'), id('b')).unwrap();

        let err = mapping.insert(id('a'), id('c')).unwrap_err();
        assert_eq!(err, MappingConflict::DuplicateSource(id('a')));

        let err = mapping.insert(id('d'), id('b')).unwrap_err();
        assert_eq!(err, MappingConflict::DuplicateTarget(id('b')));

        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let mut mapping = IdMapping::new();
        mapping.insert(id('c'), id('d')).unwrap();
        mapping.insert(id('a'), id('b')).unwrap();
        let olds: Vec<_> = mapping.entries().iter().map(|e| e.old_id.clone()).collect();
        assert_eq!(olds, vec![id('c'), id('a')]);
    }
}
