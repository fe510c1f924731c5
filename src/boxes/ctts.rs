use crate::boxes::prelude::*;

def_box! {
    /// 8.6.1.3 Composition Time to Sample Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Version 0 stores unsigned offsets, version 1 signed ones. The
    /// version is derived from the entries: as soon as one offset is
    /// negative, the box serializes as version 1.
    #[derive(Default)]
    CompositionOffsetBox {
        entries:        ArraySized32<CompositionOffsetEntry>,
    },
    fourcc => b"ctts",
    version => [1, entries],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Entry in CompositionOffsetBox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositionOffsetEntry {
    pub count:  u32,
    pub offset: i32,
}

impl FromBytes for CompositionOffsetEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let count = u32::from_bytes(stream)?;
        let offset = match stream.version() {
            1 => i32::from_bytes(stream)?,
            _ => u32::from_bytes(stream)? as i32,
        };
        Ok(CompositionOffsetEntry { count, offset })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for CompositionOffsetEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.count.to_bytes(stream)?;
        match stream.version() {
            1 => self.offset.to_bytes(stream),
            _ => (self.offset as u32).to_bytes(stream),
        }
    }
}

impl FullBox for CompositionOffsetEntry {
    fn version(&self) -> Option<u8> {
        if self.offset < 0 {
            Some(1)
        } else {
            None
        }
    }
}

impl CompositionOffsetBox {
    /// Total number of samples covered by the table.
    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }
}

def_box! {
    /// 8.6.1.4 Composition to Decode Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    CompositionToDecodeBox {
        composition_to_dts_shift:           i32,
        least_decode_to_display_delta:      i32,
        greatest_decode_to_display_delta:   i32,
        composition_start_time:             i32,
        composition_end_time:               i32,
    },
    fourcc => b"cslg",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}
