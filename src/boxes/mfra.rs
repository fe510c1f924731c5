use crate::boxes::prelude::*;

def_box! {
    /// 8.8.9 Movie Fragment Random Access Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieFragmentRandomAccessBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"mfra",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

/// 8.8.10 Track Fragment Random Access Box (ISO/IEC 14496-12:2015(E))
///
/// The traf/trun/sample numbers use the smallest field width that
/// holds the largest value in the table.
#[derive(Clone, Debug, Default)]
pub struct TrackFragmentRandomAccessBox {
    pub track_id: u32,
    pub entries:  Vec<TfraEntry>,
}

/// Entry in TrackFragmentRandomAccessBox.
#[derive(Clone, Debug, Default)]
pub struct TfraEntry {
    pub time:          u64,
    pub moof_offset:   u64,
    pub traf_number:   u32,
    pub trun_number:   u32,
    pub sample_number: u32,
}

// Minimum `ceil(log256(max_value)) - 1`, i.e. the number of extra
// bytes needed beyond one.
fn length_size(max_value: u32) -> u8 {
    match max_value {
        0..=0xff => 0,
        0x100..=0xffff => 1,
        0x10000..=0xffffff => 2,
        _ => 3,
    }
}

fn read_varsized<R: ReadBytes>(stream: &mut R, length_size: u8) -> io::Result<u32> {
    let mut value = 0;
    for _ in 0..=length_size {
        value = (value << 8) | u8::from_bytes(stream)? as u32;
    }
    Ok(value)
}

fn write_varsized<W: WriteBytes>(stream: &mut W, length_size: u8, value: u32) -> io::Result<()> {
    for i in (0..=length_size).rev() {
        ((value >> (8 * i as u32)) as u8).to_bytes(stream)?;
    }
    Ok(())
}

impl TrackFragmentRandomAccessBox {
    /// Field widths for the traf / trun / sample numbers.
    pub fn length_sizes(&self) -> (u8, u8, u8) {
        let mut max = (0, 0, 0);
        for e in &self.entries {
            max.0 = std::cmp::max(max.0, e.traf_number);
            max.1 = std::cmp::max(max.1, e.trun_number);
            max.2 = std::cmp::max(max.2, e.sample_number);
        }
        (length_size(max.0), length_size(max.1), length_size(max.2))
    }
}

impl FromBytes for TrackFragmentRandomAccessBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackFragmentRandomAccessBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let version = stream.version();
        let track_id = u32::from_bytes(stream)?;
        let sizes = u32::from_bytes(stream)?;
        let traf_size = ((sizes >> 4) & 0x3) as u8;
        let trun_size = ((sizes >> 2) & 0x3) as u8;
        let sample_size = (sizes & 0x3) as u8;
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::with_capacity(std::cmp::min(count as usize, 65536));
        for _ in 0..count {
            let (time, moof_offset) = match version {
                1 => (u64::from_bytes(stream)?, u64::from_bytes(stream)?),
                _ => (
                    u32::from_bytes(stream)? as u64,
                    u32::from_bytes(stream)? as u64,
                ),
            };
            entries.push(TfraEntry {
                time,
                moof_offset,
                traf_number: read_varsized(stream, traf_size)?,
                trun_number: read_varsized(stream, trun_size)?,
                sample_number: read_varsized(stream, sample_size)?,
            });
        }
        Ok(TrackFragmentRandomAccessBox { track_id, entries })
    }
    fn min_size() -> usize {
        24
    }
}

impl ToBytes for TrackFragmentRandomAccessBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        let version = stream.version();
        let (traf_size, trun_size, sample_size) = self.length_sizes();
        self.track_id.to_bytes(stream)?;
        let sizes = ((traf_size as u32) << 4) | ((trun_size as u32) << 2) | sample_size as u32;
        sizes.to_bytes(stream)?;
        (self.entries.len() as u32).to_bytes(stream)?;
        for e in &self.entries {
            match version {
                1 => {
                    e.time.to_bytes(stream)?;
                    e.moof_offset.to_bytes(stream)?;
                },
                _ => {
                    (e.time as u32).to_bytes(stream)?;
                    (e.moof_offset as u32).to_bytes(stream)?;
                },
            }
            write_varsized(stream, traf_size, e.traf_number)?;
            write_varsized(stream, trun_size, e.trun_number)?;
            write_varsized(stream, sample_size, e.sample_number)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for TrackFragmentRandomAccessBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"tfra")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for TrackFragmentRandomAccessBox {
    fn version(&self) -> Option<u8> {
        let large = self
            .entries
            .iter()
            .any(|e| e.time > u32::MAX as u64 || e.moof_offset > u32::MAX as u64);
        Some(large as u8)
    }
}

def_box! {
    /// 8.8.11 Movie Fragment Random Access Offset Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieFragmentRandomAccessOffsetBox {
        length:     u32,
    },
    fourcc => b"mfro",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Membuf;

    #[test]
    fn minimal_length_sizes() {
        let mut tfra = TrackFragmentRandomAccessBox::default();
        tfra.track_id = 1;
        for i in 0..2 {
            tfra.entries.push(TfraEntry {
                time: i * 1000,
                moof_offset: 4096 + i * 8192,
                traf_number: 1,
                trun_number: 1,
                sample_number: 1,
            });
        }
        assert_eq!(tfra.length_sizes(), (0, 0, 0));

        let mut buf = Membuf::new();
        tfra.to_bytes(&mut buf).unwrap();
        buf.rewind();
        let tfra2 = TrackFragmentRandomAccessBox::from_bytes(&mut buf).unwrap();
        assert_eq!(tfra2.entries.len(), 2);
        assert_eq!(tfra2.entries[1].moof_offset, 4096 + 8192);
    }
}
