use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    pub level: u8,
    pub destination: String,
}

pub trait OutlineSink {
    fn add_entry(&mut self, entry: OutlineEntry);
}

// Collecting sink. Clones share storage, so a caller can keep one handle
// and give another to the builder.
#[derive(Debug, Clone, Default)]
pub struct OutlineCollector {
    entries: Rc<RefCell<Vec<OutlineEntry>>>,
}

impl OutlineCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<OutlineEntry> {
        self.entries.borrow().clone()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl OutlineSink for OutlineCollector {
    fn add_entry(&mut self, entry: OutlineEntry) {
        self.entries.borrow_mut().push(entry);
    }
}

#[derive(Debug, Clone)]
pub struct DestinationNamer {
    prefix: String,
    next: usize,
}

impl DestinationNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next_name(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_clones_share_entries() {
        let handle = OutlineCollector::new();
        let mut sink = handle.clone();
        sink.add_entry(OutlineEntry {
            title: "Intro".to_string(),
            level: 1,
            destination: "d0".to_string(),
        });
        assert_eq!(handle.entries().len(), 1);
        handle.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn destination_names_count_per_prefix() {
        let mut namer = DestinationNamer::new("pagemill-dest-");
        assert_eq!(namer.next_name(), "pagemill-dest-0");
        assert_eq!(namer.next_name(), "pagemill-dest-1");
        namer.reset();
        assert_eq!(namer.next_name(), "pagemill-dest-0");
    }
}
