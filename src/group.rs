use std::collections::HashMap;

use tracing::{info, warn};

use crate::error::SpeadResult;
use crate::heap::{Heap, MAX_RESERVED_ID};
use crate::item::Item;

/// A registry of items keyed by both numeric id and textual name.
///
/// The group owns its items. Both key spaces are unique at any instant:
/// installing an item whose id or name is already present replaces the
/// prior entry under both keys.
///
/// Groups are single-threaded; concurrent mutation of one group must be
/// serialized externally.
#[derive(Debug, Default)]
pub struct ItemGroup {
    by_name: HashMap<String, Item>,
    ids: HashMap<u64, String>,
}

impl ItemGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an item, replacing any existing entry under its id or name.
    pub fn add_item(&mut self, item: Item) -> &Item {
        let id = item.id();
        let name = item.name().to_owned();
        if self.ids.contains_key(&id) || self.by_name.contains_key(&name) {
            info!(id, name = %name, "descriptor replacement");
        }
        if let Some(old_name) = self.ids.insert(id, name.clone()) {
            if old_name != name {
                self.by_name.remove(&old_name);
            }
        }
        if let Some(old_item) = self.by_name.insert(name.clone(), item) {
            if old_item.id() != id {
                self.ids.remove(&old_item.id());
            }
        }
        &self.by_name[name.as_str()]
    }

    /// Look up an item by its wire id.
    pub fn by_id(&self, id: u64) -> Option<&Item> {
        self.ids.get(&id).and_then(|name| self.by_name.get(name))
    }

    /// Look up an item by its wire id, mutably.
    pub fn by_id_mut(&mut self, id: u64) -> Option<&mut Item> {
        let name = self.ids.get(&id)?;
        self.by_name.get_mut(name.as_str())
    }

    /// Look up an item by name.
    pub fn by_name(&self, name: &str) -> Option<&Item> {
        self.by_name.get(name)
    }

    /// Look up an item by name, mutably.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.by_name.get_mut(name)
    }

    /// Whether an item with this id is present.
    pub fn contains_id(&self, id: u64) -> bool {
        self.ids.contains_key(&id)
    }

    /// Whether an item with this name is present.
    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// All item ids.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.keys().copied()
    }

    /// All item names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// All `(name, item)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.by_name.iter().map(|(name, item)| (name.as_str(), item))
    }

    /// Number of items in the group.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Apply one inbound heap: install the descriptors it carries, then
    /// decode each addressed item.
    ///
    /// Raw items at reserved ids are skipped silently; items with no known
    /// descriptor are logged and skipped. Every updated item gets the
    /// heap's sequence number as its version and appears in the returned
    /// mapping under its name.
    pub fn update(&mut self, heap: &Heap) -> SpeadResult<HashMap<String, &Item>> {
        for raw_descriptor in heap.get_descriptors() {
            let item = Item::from_raw(raw_descriptor, heap.bug_compat())?;
            self.add_item(item);
        }
        let mut updated_names = Vec::new();
        for raw_item in heap.get_items() {
            if raw_item.id <= MAX_RESERVED_ID {
                continue; // Special fields, not real items.
            }
            let Some(name) = self.ids.get(&raw_item.id).cloned() else {
                warn!(id = raw_item.id, "item received but there is no descriptor");
                continue;
            };
            let Some(item) = self.by_name.get_mut(name.as_str()) else {
                continue;
            };
            item.set_from_raw(raw_item)?;
            item.set_version(heap.cnt());
            updated_names.push(name);
        }
        let mut updated = HashMap::with_capacity(updated_names.len());
        for name in updated_names {
            if let Some(item) = self.by_name.get(name.as_str()) {
                updated.insert(name, item);
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayOrder;
    use crate::data_type::{DType, DataType};
    use crate::descriptor::Descriptor;

    fn item(id: u64, name: &str) -> Item {
        Item::new(Descriptor::with_dtype(
            id,
            name,
            "",
            vec![-1],
            DType::native(DataType::UInt8),
            ArrayOrder::C,
        ))
    }

    #[test]
    fn test_lookup_by_either_key() {
        let mut group = ItemGroup::new();
        group.add_item(item(10, "gain"));
        assert_eq!(group.len(), 1);
        assert!(group.contains_id(10));
        assert!(group.contains_name("gain"));
        assert_eq!(group.by_id(10).map(Item::name), Some("gain"));
        assert_eq!(group.by_name("gain").map(Item::id), Some(10));
        assert!(group.by_id(11).is_none());
    }

    #[test]
    fn test_replacement_updates_both_keys() {
        let mut group = ItemGroup::new();
        group.add_item(item(10, "gain"));
        group.add_item(item(11, "phase"));

        // Takes over id 10 and the name "phase" at once.
        group.add_item(item(10, "phase"));
        assert_eq!(group.len(), 1);
        assert_eq!(group.by_id(10).map(Item::name), Some("phase"));
        assert!(!group.contains_name("gain"));
        assert!(!group.contains_id(11));
    }

    #[test]
    fn test_replacement_same_name_new_id() {
        let mut group = ItemGroup::new();
        group.add_item(item(10, "gain"));
        group.add_item(item(12, "gain"));
        assert_eq!(group.len(), 1);
        assert!(!group.contains_id(10));
        assert_eq!(group.by_name("gain").map(Item::id), Some(12));
    }
}
