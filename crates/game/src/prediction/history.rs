use std::collections::VecDeque;

/// Tick-keyed ring with a hard capacity. Ticks are pushed in ascending order;
/// the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct TickRing<T> {
    entries: VecDeque<(u32, T)>,
    capacity: usize,
}

impl<T> TickRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `value` at `tick`. Anything at or after `tick` is discarded
    /// first, so a rewound clock never leaves the ring out of order.
    pub fn push(&mut self, tick: u32, value: T) {
        while self.entries.back().is_some_and(|(t, _)| *t >= tick) {
            self.entries.pop_back();
        }

        self.entries.push_back((tick, value));
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn position(&self, tick: u32) -> Option<usize> {
        self.entries.binary_search_by_key(&tick, |(t, _)| *t).ok()
    }

    pub fn get(&self, tick: u32) -> Option<&T> {
        self.position(tick).map(|index| &self.entries[index].1)
    }

    pub fn at(&self, index: usize) -> Option<(u32, &T)> {
        self.entries.get(index).map(|(t, v)| (*t, v))
    }

    pub fn at_mut(&mut self, index: usize) -> Option<(u32, &mut T)> {
        self.entries.get_mut(index).map(|(t, v)| (*t, v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
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

    #[test]
    fn evicts_oldest_first() {
        let mut ring = TickRing::new(3);
        for tick in 1..=5 {
            ring.push(tick, tick * 10);
        }

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.at(0), Some((3, &30)));
        assert_eq!(ring.get(2), None);
        assert_eq!(ring.get(5), Some(&50));
    }

    #[test]
    fn rewinding_truncates_newer_entries() {
        let mut ring = TickRing::new(8);
        for tick in 0..5 {
            ring.push(tick, tick);
        }
        ring.push(2, 99);

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.at(2), Some((2, &99)));
        assert_eq!(ring.get(2), Some(&99));
        assert_eq!(ring.get(3), None);
    }

    #[test]
    fn lookup_by_tick_survives_gaps() {
        let mut ring = TickRing::new(8);
        ring.push(10, 'a');
        ring.push(12, 'b');
        ring.push(15, 'c');

        assert_eq!(ring.position(12), Some(1));
        assert_eq!(ring.get(11), None);
        if let Some((_, value)) = ring.at_mut(2) {
            *value = 'd';
        }
        assert_eq!(ring.at(2), Some((15, &'d')));
    }
}
