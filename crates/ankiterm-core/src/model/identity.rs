//! Ordered identity maps for models and decks.

use std::collections::HashMap;

/// An entity addressable by numeric ID and by name.
pub trait Identified {
    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

/// Entities keyed by ID, iterated in insertion order.
///
/// Insertion order is the order the entities appeared in the collection's
/// JSON blob, which is also the order they are written back in.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMap<V> {
    items: Vec<V>,
    index: HashMap<i64, usize>,
}

impl<V> Default for IdentityMap<V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V: Identified> IdentityMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity. Returns false (and drops nothing) if the ID is taken.
    pub fn insert(&mut self, value: V) -> bool {
        let id = value.id();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.items.len());
        self.items.push(value);
        true
    }

    pub fn get(&self, id: i64) -> Option<&V> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: i64) -> Option<&mut V> {
        match self.index.get(&id) {
            Some(&i) => self.items.get_mut(i),
            None => None,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    /// All entities with exactly this name (case-sensitive).
    pub fn by_name(&self, name: &str) -> Vec<&V> {
        self.items.iter().filter(|v| v.name() == name).collect()
    }

    pub fn remove(&mut self, id: i64) -> Option<V> {
        let position = self.index.remove(&id)?;
        let removed = self.items.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.items.iter().map(|v| v.id())
    }

    pub fn first(&self) -> Option<&V> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_id(&self) -> Option<i64> {
        self.index.keys().copied().max()
    }
}

impl<'a, V> IntoIterator for &'a IdentityMap<V> {
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64, &'static str);

    impl Identified for Item {
        fn id(&self) -> i64 {
            self.0
        }
        fn name(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_insertion_order_and_lookup() {
        let mut map = IdentityMap::new();
        assert!(map.insert(Item(30, "c")));
        assert!(map.insert(Item(10, "a")));
        assert!(!map.insert(Item(10, "dup")));

        let ids: Vec<_> = map.ids().collect();
        assert_eq!(ids, vec![30, 10]);
        assert_eq!(map.get(10).map(|i| i.1), Some("a"));
        assert_eq!(map.by_name("c").len(), 1);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut map = IdentityMap::new();
        map.insert(Item(1, "a"));
        map.insert(Item(2, "b"));
        map.insert(Item(3, "c"));

        assert_eq!(map.remove(1), Some(Item(1, "a")));
        assert_eq!(map.get(3).map(|i| i.1), Some("c"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.max_id(), Some(3));
    }
}
