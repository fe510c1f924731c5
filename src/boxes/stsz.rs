use crate::boxes::prelude::*;

/// 8.7.3.2 Sample Size Box (ISO/IEC 14496-12:2015(E))
///
/// If all samples have the same size, `size` is that size and the
/// entries list stays empty. On the first divergence the list is
/// materialized and `size` drops to 0 (see the compactor).
#[derive(Clone, Debug, Default)]
pub struct SampleSizeBox {
    pub size:    u32,
    pub count:   u32,
    pub entries: Vec<u32>,
}

impl FromBytes for SampleSizeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleSizeBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let size = u32::from_bytes(stream)?;
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        if size == 0 {
            entries.reserve(std::cmp::min(count as usize, 65536));
            for _ in 0..count {
                entries.push(u32::from_bytes(stream)?);
            }
        }
        Ok(SampleSizeBox {
            size,
            count,
            entries,
        })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for SampleSizeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        self.size.to_bytes(stream)?;
        self.count.to_bytes(stream)?;
        if self.size == 0 {
            for sz in &self.entries {
                sz.to_bytes(stream)?;
            }
        }
        writer.finalize()
    }
}

impl BoxInfo for SampleSizeBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"stsz")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleSizeBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

impl SampleSizeBox {
    /// Size of sample `index` (1-based).
    pub fn sample_size(&self, index: u32) -> u32 {
        if self.size > 0 {
            self.size
        } else {
            self.entries.get(index as usize - 1).copied().unwrap_or(0)
        }
    }

    /// Append the size of a new sample, materializing the per-sample
    /// list when the constant-size assumption breaks.
    pub fn push(&mut self, size: u32) {
        if self.count == 0 {
            self.size = size;
            self.count = 1;
            return;
        }
        if self.size > 0 && self.size == size {
            self.count += 1;
            return;
        }
        if self.size > 0 {
            // First divergence: copy the scalar to every historical entry.
            self.entries = vec![self.size; self.count as usize];
            self.size = 0;
        }
        self.entries.push(size);
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_size_stays_scalar() {
        let mut stsz = SampleSizeBox::default();
        for _ in 0..10 {
            stsz.push(128);
        }
        assert_eq!(stsz.size, 128);
        assert_eq!(stsz.count, 10);
        assert!(stsz.entries.is_empty());
    }

    #[test]
    fn divergence_materializes_list() {
        let mut stsz = SampleSizeBox::default();
        stsz.push(100);
        stsz.push(100);
        stsz.push(99);
        assert_eq!(stsz.size, 0);
        assert_eq!(stsz.count, 3);
        assert_eq!(stsz.entries, vec![100, 100, 99]);
    }
}
