use crate::boxes::prelude::*;

def_box! {
    /// 8.7.4 Sample To Chunk Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SampleToChunkBox {
        entries:        ArraySized32<SampleToChunkEntry>,
    },
    fourcc => b"stsc",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_struct! {
    /// Entry in SampleToChunkBox.
    #[derive(Copy, PartialEq, Eq)]
    SampleToChunkEntry,
        first_chunk:                u32,
        samples_per_chunk:          u32,
        sample_description_index:   u32,
}

impl SampleToChunkBox {
    /// Record that chunk `chunk` (1-based) holds `samples_per_chunk`
    /// samples of description `sdi`. Consecutive chunks that share the
    /// tuple merge into one run.
    pub fn add_chunk(&mut self, chunk: u32, samples_per_chunk: u32, sdi: u32) {
        if let Some(last) = self.entries.last() {
            if last.samples_per_chunk == samples_per_chunk && last.sample_description_index == sdi {
                return;
            }
        }
        self.entries.push(SampleToChunkEntry {
            first_chunk: chunk,
            samples_per_chunk,
            sample_description_index: sdi,
        });
    }

    /// Number of samples in the table, given the total chunk count.
    pub fn sample_count(&self, num_chunks: u32) -> u64 {
        let mut total = 0u64;
        for (i, entry) in self.entries.iter().enumerate() {
            let end = (*self.entries)
                .get(i + 1)
                .map(|e| e.first_chunk)
                .unwrap_or(num_chunks + 1);
            total += ((end - entry.first_chunk) as u64) * (entry.samples_per_chunk as u64);
        }
        total
    }

    /// Return an iterator that iterates over every sample.
    pub fn iter(&self, num_chunks: u32) -> SampleToChunkIterator<'_> {
        SampleToChunkIterator {
            entries: &self.entries,
            num_chunks,
            index: 0,
            chunk: 0,
            left: 0,
        }
    }
}

/// Value returned by SampleToChunkIterator.
///
/// `chunk` and `sample_description_index` are 1-based, as per
/// the ISO/IEC 14496-12 spec.
#[derive(Clone, Debug)]
pub struct SampleToChunkIterEntry {
    pub chunk: u32,
    pub sample_description_index: u32,
}

/// Iterator over the SampleToChunk table, one item per sample.
pub struct SampleToChunkIterator<'a> {
    entries:    &'a [SampleToChunkEntry],
    num_chunks: u32,
    index:      usize,
    chunk:      u32,
    left:       u32,
}

impl<'a> Iterator for SampleToChunkIterator<'a> {
    type Item = SampleToChunkIterEntry;

    fn next(&mut self) -> Option<Self::Item> {
        while self.left == 0 {
            // move to the next chunk.
            if self.chunk >= self.num_chunks {
                return None;
            }
            self.chunk += 1;
            if self.index + 1 < self.entries.len()
                && self.chunk >= self.entries[self.index + 1].first_chunk
            {
                self.index += 1;
            }
            self.left = self.entries.get(self.index)?.samples_per_chunk;
        }
        self.left -= 1;
        Some(SampleToChunkIterEntry {
            chunk: self.chunk,
            sample_description_index: self.entries[self.index].sample_description_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_merge() {
        let mut stsc = SampleToChunkBox::default();
        stsc.add_chunk(1, 21, 1);
        stsc.add_chunk(2, 21, 1);
        stsc.add_chunk(3, 21, 1);
        stsc.add_chunk(4, 16, 1);
        assert_eq!(stsc.entries.len(), 2);
        assert_eq!(stsc.entries[0].first_chunk, 1);
        assert_eq!(stsc.entries[1].first_chunk, 4);
        assert_eq!(stsc.sample_count(4), 3 * 21 + 16);
    }

    #[test]
    fn iterates_per_sample() {
        let mut stsc = SampleToChunkBox::default();
        stsc.add_chunk(1, 2, 1);
        stsc.add_chunk(2, 3, 2);
        let chunks: Vec<u32> = stsc.iter(2).map(|e| e.chunk).collect();
        assert_eq!(chunks, vec![1, 1, 2, 2, 2]);
    }
}
