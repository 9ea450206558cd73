//! Concurrent slot table mapping dense integer handles to owned values.
//!
//! Freed slot indices go onto a LIFO free list, so the most recently freed
//! index is the next one handed out before the table grows. Every operation
//! takes the table lock for the duration of the slot access only; values
//! removed from the table are dropped after the lock is released.

use parking_lot::Mutex;

enum Slot<T> {
    Occupied(T),
    Empty,
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
}

impl<T> Slots<T> {
    fn occupied(&self, index: usize) -> Option<&T> {
        match self.entries.get(index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    fn occupied_mut(&mut self, index: usize) -> Option<&mut T> {
        match self.entries.get_mut(index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    fn vacate(&mut self, index: usize) -> Option<T> {
        let slot = self.entries.get_mut(index)?;
        match std::mem::replace(slot, Slot::Empty) {
            Slot::Occupied(value) => {
                self.free.push(index);
                self.live -= 1;
                Some(value)
            }
            Slot::Empty => None,
        }
    }
}

/// Slot table with free-slot recycling, guarded by a single lock.
pub struct HandleTable<T> {
    name: &'static str,
    slots: Mutex<Slots<T>>,
}

impl<T> HandleTable<T> {
    /// Create an empty table. `name` only shows up in log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Store `value` and return its slot index. Never fails.
    pub fn allocate(&self, value: T) -> usize {
        let mut slots = self.slots.lock();
        slots.live += 1;
        let index = match slots.free.pop() {
            Some(index) => {
                slots.entries[index] = Slot::Occupied(value);
                index
            }
            None => {
                slots.entries.push(Slot::Occupied(value));
                slots.entries.len() - 1
            }
        };
        log::debug!("{}: allocated slot {} ({} live)", self.name, index, slots.live);
        index
    }

    /// Run `f` against the value at `index` while holding the lock.
    pub fn with<R>(&self, index: usize, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slots = self.slots.lock();
        slots.occupied(index).map(f)
    }

    /// Mutable counterpart of [`HandleTable::with`]. Part of the table API
    /// for owners that update entries in place; the stores in this crate only
    /// replace whole entries.
    pub fn with_mut<R>(&self, index: usize, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut slots = self.slots.lock();
        slots.occupied_mut(index).map(f)
    }

    /// Copy of the value at `index`, if the slot is occupied.
    pub fn get_clone(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.with(index, T::clone)
    }

    /// Whether `index` currently names an occupied slot.
    pub fn contains(&self, index: usize) -> bool {
        self.slots.lock().occupied(index).is_some()
    }

    /// Empty the slot and hand its value back.
    pub fn take(&self, index: usize) -> Option<T> {
        let taken = self.slots.lock().vacate(index);
        if taken.is_some() {
            log::debug!("{}: released slot {}", self.name, index);
        }
        taken
    }

    /// Empty the slot, dropping its value. Returns `false` if the slot was
    /// already empty or out of range.
    pub fn release(&self, index: usize) -> bool {
        self.take(index).is_some()
    }

    /// Atomically check the value at `index` with `pred` and, if it holds,
    /// run `then` and release the slot before anyone else can observe it.
    pub fn release_if(
        &self,
        index: usize,
        pred: impl FnOnce(&T) -> bool,
        then: impl FnOnce(&T),
    ) -> bool {
        let released = {
            let mut slots = self.slots.lock();
            let matched = match slots.occupied(index) {
                Some(value) if pred(value) => {
                    then(value);
                    true
                }
                _ => false,
            };
            if matched {
                slots.vacate(index)
            } else {
                None
            }
        };
        match released {
            Some(_) => {
                log::debug!("{}: released slot {}", self.name, index);
                true
            }
            None => false,
        }
    }

    /// Number of occupied slots.
    pub fn live(&self) -> usize {
        self.slots.lock().live
    }

    /// Number of slots ever created, occupied or not.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().entries.len()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new("table")
    }
}
