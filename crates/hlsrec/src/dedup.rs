use std::collections::HashMap;

const NIL: usize = usize::MAX;

struct Slot {
    key: String,
    prev: usize,
    next: usize,
}

/// Bounded set of recently seen chunk locators.
///
/// Entries are kept in recency order. Once `capacity` is exceeded the least
/// recently used locator is dropped, so a very old chunk could be enqueued
/// again if a playlist ever re-listed it. Live playlists only expose a short
/// sliding window, so any capacity well above that window is enough.
pub struct DedupCache {
    capacity: usize,
    index: HashMap<String, usize>,
    slots: Vec<Slot>,
    /// Most recently used
    head: usize,
    /// Least recently used
    tail: usize,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns whether `locator` has been recorded. A hit refreshes its recency.
    pub fn contains(&mut self, locator: &str) -> bool {
        match self.index.get(locator) {
            Some(&slot) => {
                self.touch(slot);
                true
            }
            None => false,
        }
    }

    /// Marks `locator` as seen, evicting the least recently used entry if the
    /// cache is full.
    pub fn record(&mut self, locator: impl Into<String>) {
        let locator = locator.into();
        if let Some(&slot) = self.index.get(&locator) {
            self.touch(slot);
            return;
        }

        let slot = if self.index.len() >= self.capacity {
            // reuse the slot of the evicted entry
            let slot = self.tail;
            self.unlink(slot);
            let evicted = std::mem::replace(&mut self.slots[slot].key, locator.clone());
            self.index.remove(&evicted);
            log::debug!("Evicted {evicted} from dedup cache");
            slot
        } else {
            self.slots.push(Slot {
                key: locator.clone(),
                prev: NIL,
                next: NIL,
            });
            self.slots.len() - 1
        };

        self.push_front(slot);
        self.index.insert(locator, slot);
    }

    fn touch(&mut self, slot: usize) {
        if self.head != slot {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[slot].prev = NIL;
        self.slots[slot].next = NIL;
    }

    fn push_front(&mut self, slot: usize) {
        self.slots[slot].prev = NIL;
        self.slots[slot].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }
}
