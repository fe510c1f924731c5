use crate::boxes::prelude::*;

/// 8.7.5 Chunk Offset Box (ISO/IEC 14496-12:2015(E))
///
/// Implements both "stco" and "co64". Offsets are kept as 64-bit
/// values internally; the box serializes as `stco` until any offset
/// (after applying the global move offset) no longer fits in 32 bits,
/// at which point it is promoted to `co64`.
#[derive(Clone, Debug)]
pub struct ChunkOffsetBox {
    pub fourcc:  FourCC,
    pub entries: Vec<u64>,
    offset:      i64,
    large:       bool,
}
pub type ChunkLargeOffsetBox = ChunkOffsetBox;

impl FromBytes for ChunkOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ChunkOffsetBox> {
        let mut reader = BoxReader::new(stream)?;
        let fourcc = reader.header.fourcc;
        let stream = &mut reader;

        let large = fourcc == b"co64";
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::with_capacity(std::cmp::min(count as usize, 65536));
        for _ in 0..count {
            let entry = if large {
                u64::from_bytes(stream)?
            } else {
                u32::from_bytes(stream)? as u64
            };
            entries.push(entry);
        }

        Ok(ChunkOffsetBox {
            fourcc,
            entries,
            offset: 0,
            large,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ChunkOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        (self.entries.len() as u32).to_bytes(stream)?;
        for &entry in &self.entries {
            let entry = (entry as i64 + self.offset) as u64;
            if self.large {
                entry.to_bytes(stream)?;
            } else {
                (entry as u32).to_bytes(stream)?;
            }
        }
        writer.finalize()
    }
}

impl Default for ChunkOffsetBox {
    fn default() -> Self {
        ChunkOffsetBox {
            fourcc:  FourCC::new(b"stco"),
            entries: Vec::new(),
            offset:  0,
            large:   false,
        }
    }
}

impl BoxInfo for ChunkOffsetBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for ChunkOffsetBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

impl ChunkOffsetBox {
    /// Is this serialized as a 64-bit `co64` box?
    pub fn is_large(&self) -> bool {
        self.large
    }

    /// Add an offset to the list. Promotes to `co64` if it doesn't fit
    /// in 32 bits.
    pub fn push(&mut self, offset: u64) {
        if offset as i64 + self.offset > u32::MAX as i64 {
            self.promote();
        }
        self.entries.push(offset);
    }

    /// Largest offset in the table, with the move offset applied.
    pub fn last_offset(&self) -> u64 {
        self.entries
            .last()
            .map(|&e| (e as i64 + self.offset) as u64)
            .unwrap_or(0)
    }

    /// Add a global extra offset to all entries in this box.
    ///
    /// The offset is applied when serializing the box. If after
    /// applying the offset any entry is larger than 2^32 - 1, the box
    /// will be serialized as a ChunkLargeOffsetBox (`co64`).
    pub fn add_offset(&mut self, move_offset: i64) {
        self.offset += move_offset;
        self.check_offsets();
    }

    /// Switch to the 64-bit `co64` form.
    pub fn promote(&mut self) {
        self.fourcc = FourCC::new(b"co64");
        self.large = true;
    }

    /// Would any offset overflow 32 bits if `extra` were added on top?
    pub fn needs_promotion(&self, extra: u64) -> bool {
        !self.large
            && self
                .entries
                .iter()
                .any(|&e| e as i64 + self.offset + extra as i64 > u32::MAX as i64)
    }

    // Check all the offsets and decide whether to write stco or co64.
    fn check_offsets(&mut self) {
        let offset = self.offset;
        if self
            .entries
            .iter()
            .any(|&e| (e as i64 + offset) > u32::MAX as i64)
        {
            self.promote();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_promotes_past_4g() {
        let mut stco = ChunkOffsetBox::default();
        stco.push(1024);
        assert!(!stco.is_large());
        stco.push(5 * 1024 * 1024 * 1024);
        assert!(stco.is_large());
        assert_eq!(stco.fourcc(), b"co64");
    }

    #[test]
    fn add_offset_promotes() {
        let mut stco = ChunkOffsetBox::default();
        stco.push(u32::MAX as u64 - 100);
        assert!(!stco.is_large());
        assert!(stco.needs_promotion(200));
        stco.add_offset(200);
        assert!(stco.is_large());
        assert_eq!(stco.last_offset(), u32::MAX as u64 + 100);
    }
}
