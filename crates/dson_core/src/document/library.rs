//! Id-keyed asset libraries.

use std::collections::HashMap;
use std::rc::Rc;

/// Anything stored in a [`Library`].
pub trait LibraryEntry {
    fn id(&self) -> &str;
}

/// Ordered map from asset id to a shared template.
///
/// Entries keep their first-seen position. A later entry with the same id
/// replaces the earlier one in place.
#[derive(Debug)]
pub struct Library<T> {
    entries: Vec<Rc<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for Library<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: LibraryEntry> Library<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: T) {
        let entry = Rc::new(entry);
        match self.index.get(entry.id()) {
            Some(&i) => {
                log::debug!("Replacing duplicate library entry {}", entry.id());
                self.entries[i] = entry;
            }
            None => {
                self.index.insert(entry.id().to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<Rc<T>> {
        self.index.get(id).map(|&i| Rc::clone(&self.entries[i]))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<T>> {
        self.entries.iter()
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

    struct Entry(&'static str, u32);

    impl LibraryEntry for Entry {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_last_duplicate_wins_in_place() {
        let mut lib = Library::new();
        lib.insert(Entry("a", 1));
        lib.insert(Entry("b", 2));
        lib.insert(Entry("a", 3));

        assert_eq!(lib.len(), 2);
        assert_eq!(lib.find("a").unwrap().1, 3);
        let order: Vec<_> = lib.iter().map(|e| e.0).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_entry() {
        let lib: Library<Entry> = Library::new();
        assert!(lib.find("nope").is_none());
        assert!(lib.is_empty());
    }
}
