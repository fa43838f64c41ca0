/// Fixed-capacity circular storage addressed by how many pushes ago a value
/// was written.
///
/// Offset 0 is the most recent value. Once full, each push overwrites the
/// oldest value and hands it back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    values: Vec<T>,
    capacity: usize,
    /// Slot the next push writes to.
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Appends `value`, returning the value it displaced if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let displaced = if self.is_full() {
            self.values
                .get_mut(self.head)
                .map(|slot| std::mem::replace(slot, value))
        } else {
            self.values.push(value);
            None
        };
        self.head = (self.head + 1) % self.capacity;
        displaced
    }

    /// The value written `offset_back` pushes before the latest one.
    pub fn at(&self, offset_back: usize) -> Option<&T> {
        if offset_back >= self.values.len() {
            return None;
        }
        let slot = (self.head + self.capacity - 1 - offset_back) % self.capacity;
        self.values.get(slot)
    }

    pub fn at_mut(&mut self, offset_back: usize) -> Option<&mut T> {
        if offset_back >= self.values.len() {
            return None;
        }
        let slot = (self.head + self.capacity - 1 - offset_back) % self.capacity;
        self.values.get_mut(slot)
    }

    pub fn latest(&self) -> Option<&T> {
        self.at(0)
    }

    /// Iterates from the latest value back to the oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.values.len()).filter_map(|offset| self.at(offset))
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.head = 0;
    }
}
