//! Reverse-step history ring
//!
//! Before each instruction the CPU captures the flags, the bus latch and R
//! into the current record, then advances to the next slot. Opcode-specific
//! reverse handlers may stash up to two extra values in the record of the
//! instruction being executed. This is enough to undo the side effects those
//! handlers know about; it is not a full register snapshot.

/// Number of records kept
pub const HISTORY_SIZE: usize = 512;

/// State captured for one executed instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseRecord {
    pub flags: u8,
    pub bus: u8,
    pub r: u8,
    pub data1: u16,
    pub data2: u16,
}

/// Fixed-size ring of reverse records
#[derive(Debug, Clone)]
pub struct History {
    records: Box<[ReverseRecord; HISTORY_SIZE]>,
    /// Slot receiving the next capture
    index: usize,
    /// Number of records written (max HISTORY_SIZE)
    count: usize,
}

impl History {
    pub fn new() -> Self {
        Self {
            records: Box::new([ReverseRecord::default(); HISTORY_SIZE]),
            index: 0,
            count: 0,
        }
    }

    /// Fill the current record and advance the ring
    pub fn record(&mut self, flags: u8, bus: u8, r: u8) {
        self.records[self.index] = ReverseRecord {
            flags,
            bus,
            r,
            ..ReverseRecord::default()
        };
        self.index = (self.index + 1) % HISTORY_SIZE;
        if self.count < HISTORY_SIZE {
            self.count += 1;
        }
    }

    /// Record for the instruction now executing, for reverse handlers
    pub fn current_mut(&mut self) -> &mut ReverseRecord {
        &mut self.records[(self.index + HISTORY_SIZE - 1) % HISTORY_SIZE]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Up to `n` captured records, newest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ReverseRecord> {
        (1..=n.min(self.count))
            .map(move |back| &self.records[(self.index + HISTORY_SIZE - back) % HISTORY_SIZE])
    }

    pub fn clear(&mut self) {
        self.records.fill(ReverseRecord::default());
        self.index = 0;
        self.count = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_wraps() {
        let mut history = History::new();
        for i in 0..(HISTORY_SIZE + 3) {
            history.record(i as u8, 0, 0);
        }
        assert_eq!(history.index(), 3);
        assert_eq!(history.len(), HISTORY_SIZE);

        let newest: Vec<u8> = history.recent(4).map(|r| r.flags).collect();
        let last = HISTORY_SIZE + 2;
        assert_eq!(
            newest,
            vec![last as u8, (last - 1) as u8, (last - 2) as u8, (last - 3) as u8]
        );
    }

    #[test]
    fn test_recent_bounded_by_count() {
        let mut history = History::new();
        history.record(1, 2, 3);
        history.current_mut().data1 = 0xBEEF;
        assert_eq!(history.recent(10).count(), 1);
        assert_eq!(
            history.recent(1).next(),
            Some(&ReverseRecord { flags: 1, bus: 2, r: 3, data1: 0xBEEF, data2: 0 })
        );

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.current_mut().data1, 0);
    }
}
