use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// String-keyed sequence that serializes as a map, in insertion order.
///
/// Keys are not deduplicated: pushing the same key twice emits it twice.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSlice<V> {
    items: Vec<(String, V)>,
}

impl<V> Default for MapSlice<V> {
    fn default() -> Self {
        MapSlice { items: Vec::new() }
    }
}

impl<V> MapSlice<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: V) {
        self.items.push((key.into(), value));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for MapSlice<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapSlice {
            items: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<V: Serialize> Serialize for MapSlice<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (key, value) in &self.items {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
