use std::collections::HashMap;

/// Maps raw camera ids to human-friendly names for notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraDirectory {
    names: HashMap<String, String>,
}

impl CameraDirectory {
    pub fn insert(&mut self, entity_key: &str, name: &str) {
        self.names
            .insert(entity_key.trim().to_string(), name.trim().to_string());
    }

    /// Friendly name, or the key itself when none is configured.
    pub fn display_name<'a>(&'a self, entity_key: &'a str) -> &'a str {
        self.names
            .get(entity_key)
            .map(String::as_str)
            .unwrap_or(entity_key)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for CameraDirectory {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut dir = Self::default();
        for (k, v) in iter {
            dir.insert(k.as_ref(), v.as_ref());
        }
        dir
    }
}
