use std::collections::BTreeMap;

use crate::catalog::types::{ObjectSummary, OrbitalObject};

/// Read-only snapshot of every tracked object, keyed by catalog number.
#[derive(Default)]
pub struct Catalog {
    objects: BTreeMap<u32, OrbitalObject>,
}

impl Catalog {
    pub fn from_objects(objects: impl IntoIterator<Item = OrbitalObject>) -> Self {
        Self {
            objects: objects.into_iter().map(|o| (o.id, o)).collect(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&OrbitalObject> {
        self.objects.get(&id)
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.objects.get(&id).map(|o| o.name.as_str())
    }

    /// `(id, object)` pairs in ascending id order, the shape screening consumes.
    pub fn tracked(&self) -> impl Iterator<Item = (u32, &OrbitalObject)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    /// Objects whose name contains `query`, ignoring ASCII case, ordered by
    /// name. An empty query matches everything.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ObjectSummary> {
        let needle = query.trim().to_ascii_lowercase();
        let mut matches: Vec<&OrbitalObject> = self
            .objects
            .values()
            .filter(|o| o.name.to_ascii_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        matches
            .into_iter()
            .take(limit)
            .map(OrbitalObject::summary)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
