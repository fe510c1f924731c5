use crate::boxes::prelude::*;

def_box! {
    /// 8.6.1.2 Decoding Time to Sample Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TimeToSampleBox {
        entries:        ArraySized32<TimeToSampleEntry>,
    },
    fourcc => b"stts",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_struct! {
    /// Entry in TimeToSampleBox.
    #[derive(Copy, PartialEq, Eq)]
    TimeToSampleEntry,
        count: u32,
        delta: u32,
}

impl TimeToSampleBox {
    /// Total number of samples covered by the table.
    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }

    /// Sum over all entries of count * delta.
    pub fn total_duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| (e.count as u64) * (e.delta as u64))
            .sum()
    }

    /// Iterate over the per-sample deltas.
    pub fn iter(&self) -> TimeToSampleIterator<'_> {
        TimeToSampleIterator {
            entries: &self.entries,
            index:   0,
            left:    self.entries.first().map(|e| e.count).unwrap_or(0),
        }
    }
}

/// Iterator that returns the delta of every sample in order.
pub struct TimeToSampleIterator<'a> {
    entries: &'a [TimeToSampleEntry],
    index:   usize,
    left:    u32,
}

impl<'a> Iterator for TimeToSampleIterator<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        while self.left == 0 {
            self.index += 1;
            if self.index >= self.entries.len() {
                return None;
            }
            self.left = self.entries[self.index].count;
        }
        if self.index >= self.entries.len() {
            return None;
        }
        self.left -= 1;
        Some(self.entries[self.index].delta)
    }
}
