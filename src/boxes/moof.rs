use crate::boxes::prelude::*;
use crate::boxes::MovieFragmentHeaderBox;

def_box! {
    /// 8.8.4 Movie Fragment Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieFragmentBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"moof",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MovieFragmentBox {
    declare_box_methods!(MovieFragmentHeaderBox, movie_fragment_header, movie_fragment_header_mut);

    /// Get a list of all track fragments.
    pub fn track_fragments(&self) -> Vec<&TrackFragmentBox> {
        iter_box!(self, TrackFragmentBox).collect()
    }
}

def_box! {
    /// 8.8.6 Track Fragment Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TrackFragmentBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"traf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl TrackFragmentBox {
    declare_box_methods!(TrackFragmentHeaderBox, track_fragment_header, track_fragment_header_mut);

    /// Get a list of all track runs.
    pub fn track_runs(&self) -> Vec<&TrackRunBox> {
        iter_box!(self, TrackRunBox).collect()
    }
}

// tf_flags of the TrackFragmentHeaderBox.
const TF_FLAG_BASE_DATA_OFFSET: u32 = 0x000001;
const TF_FLAG_SAMPLE_DESCRIPTION_INDEX: u32 = 0x000002;
const TF_FLAG_DEFAULT_SAMPLE_DURATION: u32 = 0x000008;
const TF_FLAG_DEFAULT_SAMPLE_SIZE: u32 = 0x000010;
const TF_FLAG_DEFAULT_SAMPLE_FLAGS: u32 = 0x000020;
const TF_FLAG_DURATION_IS_EMPTY: u32 = 0x010000;
const TF_FLAG_DEFAULT_BASE_IS_MOOF: u32 = 0x020000;

/// 8.8.7 Track Fragment Header Box (ISO/IEC 14496-12:2015(E))
///
/// The optional fields drive the tf_flags on the wire.
#[derive(Clone, Debug, Default)]
pub struct TrackFragmentHeaderBox {
    pub track_id:                 u32,
    pub base_data_offset:         Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration:  Option<u32>,
    pub default_sample_size:      Option<u32>,
    pub default_sample_flags:     Option<SampleFlags>,
    pub duration_is_empty:        bool,
    pub default_base_is_moof:     bool,
}

impl FromBytes for TrackFragmentHeaderBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackFragmentHeaderBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let flags = stream.flags();
        let track_id = u32::from_bytes(stream)?;
        let mut tfhd = TrackFragmentHeaderBox {
            track_id,
            duration_is_empty: flags & TF_FLAG_DURATION_IS_EMPTY > 0,
            default_base_is_moof: flags & TF_FLAG_DEFAULT_BASE_IS_MOOF > 0,
            ..TrackFragmentHeaderBox::default()
        };
        if flags & TF_FLAG_BASE_DATA_OFFSET > 0 {
            tfhd.base_data_offset = Some(u64::from_bytes(stream)?);
        }
        if flags & TF_FLAG_SAMPLE_DESCRIPTION_INDEX > 0 {
            tfhd.sample_description_index = Some(u32::from_bytes(stream)?);
        }
        if flags & TF_FLAG_DEFAULT_SAMPLE_DURATION > 0 {
            tfhd.default_sample_duration = Some(u32::from_bytes(stream)?);
        }
        if flags & TF_FLAG_DEFAULT_SAMPLE_SIZE > 0 {
            tfhd.default_sample_size = Some(u32::from_bytes(stream)?);
        }
        if flags & TF_FLAG_DEFAULT_SAMPLE_FLAGS > 0 {
            tfhd.default_sample_flags = Some(SampleFlags::from_bytes(stream)?);
        }
        Ok(tfhd)
    }
    fn min_size() -> usize {
        16
    }
}

impl ToBytes for TrackFragmentHeaderBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        self.track_id.to_bytes(stream)?;
        if let Some(offset) = self.base_data_offset {
            offset.to_bytes(stream)?;
        }
        if let Some(sdi) = self.sample_description_index {
            sdi.to_bytes(stream)?;
        }
        if let Some(duration) = self.default_sample_duration {
            duration.to_bytes(stream)?;
        }
        if let Some(size) = self.default_sample_size {
            size.to_bytes(stream)?;
        }
        if let Some(flags) = &self.default_sample_flags {
            flags.to_bytes(stream)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for TrackFragmentHeaderBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"tfhd")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for TrackFragmentHeaderBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.base_data_offset.is_some() {
            flags |= TF_FLAG_BASE_DATA_OFFSET;
        }
        if self.sample_description_index.is_some() {
            flags |= TF_FLAG_SAMPLE_DESCRIPTION_INDEX;
        }
        if self.default_sample_duration.is_some() {
            flags |= TF_FLAG_DEFAULT_SAMPLE_DURATION;
        }
        if self.default_sample_size.is_some() {
            flags |= TF_FLAG_DEFAULT_SAMPLE_SIZE;
        }
        if self.default_sample_flags.is_some() {
            flags |= TF_FLAG_DEFAULT_SAMPLE_FLAGS;
        }
        if self.duration_is_empty {
            flags |= TF_FLAG_DURATION_IS_EMPTY;
        }
        if self.default_base_is_moof {
            flags |= TF_FLAG_DEFAULT_BASE_IS_MOOF;
        }
        flags
    }
}

// tr_flags of the TrackRunBox.
const TR_FLAG_DATA_OFFSET: u32 = 0x000001;
const TR_FLAG_FIRST_SAMPLE_FLAGS: u32 = 0x000004;
const TR_FLAG_SAMPLE_DURATION: u32 = 0x000100;
const TR_FLAG_SAMPLE_SIZE: u32 = 0x000200;
const TR_FLAG_SAMPLE_FLAGS: u32 = 0x000400;
const TR_FLAG_SAMPLE_CTS_OFFSET: u32 = 0x000800;

/// 8.8.8 Track Run Box (ISO/IEC 14496-12:2015(E))
///
/// All entries must be uniform in which optional fields they carry;
/// the per-sample flags on the wire come from the first entry.
/// Version 1 is used when a composition offset is negative.
#[derive(Clone, Debug, Default)]
pub struct TrackRunBox {
    pub data_offset:        Option<i32>,
    pub first_sample_flags: Option<SampleFlags>,
    pub entries:            Vec<TrackRunEntry>,
}

/// Entry in TrackRunBox.
#[derive(Clone, Debug, Default)]
pub struct TrackRunEntry {
    pub sample_duration:                Option<u32>,
    pub sample_size:                    Option<u32>,
    pub sample_flags:                   Option<SampleFlags>,
    pub sample_composition_time_offset: Option<i32>,
}

impl TrackRunBox {
    fn entry_flags(&self) -> u32 {
        let mut flags = 0;
        if let Some(first) = self.entries.first() {
            if first.sample_duration.is_some() {
                flags |= TR_FLAG_SAMPLE_DURATION;
            }
            if first.sample_size.is_some() {
                flags |= TR_FLAG_SAMPLE_SIZE;
            }
            if first.sample_flags.is_some() {
                flags |= TR_FLAG_SAMPLE_FLAGS;
            }
            if first.sample_composition_time_offset.is_some() {
                flags |= TR_FLAG_SAMPLE_CTS_OFFSET;
            }
        }
        flags
    }
}

impl FromBytes for TrackRunBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackRunBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let version = stream.version();
        let flags = stream.flags();
        let sample_count = u32::from_bytes(stream)?;
        let data_offset = if flags & TR_FLAG_DATA_OFFSET > 0 {
            Some(i32::from_bytes(stream)?)
        } else {
            None
        };
        let first_sample_flags = if flags & TR_FLAG_FIRST_SAMPLE_FLAGS > 0 {
            Some(SampleFlags::from_bytes(stream)?)
        } else {
            None
        };
        let mut entries = Vec::with_capacity(std::cmp::min(sample_count as usize, 65536));
        for _ in 0..sample_count {
            let mut entry = TrackRunEntry::default();
            if flags & TR_FLAG_SAMPLE_DURATION > 0 {
                entry.sample_duration = Some(u32::from_bytes(stream)?);
            }
            if flags & TR_FLAG_SAMPLE_SIZE > 0 {
                entry.sample_size = Some(u32::from_bytes(stream)?);
            }
            if flags & TR_FLAG_SAMPLE_FLAGS > 0 {
                entry.sample_flags = Some(SampleFlags::from_bytes(stream)?);
            }
            if flags & TR_FLAG_SAMPLE_CTS_OFFSET > 0 {
                entry.sample_composition_time_offset = Some(match version {
                    1 => i32::from_bytes(stream)?,
                    _ => u32::from_bytes(stream)? as i32,
                });
            }
            entries.push(entry);
        }
        Ok(TrackRunBox {
            data_offset,
            first_sample_flags,
            entries,
        })
    }
    fn min_size() -> usize {
        16
    }
}

impl ToBytes for TrackRunBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        let version = stream.version();
        (self.entries.len() as u32).to_bytes(stream)?;
        if let Some(offset) = self.data_offset {
            offset.to_bytes(stream)?;
        }
        if let Some(flags) = &self.first_sample_flags {
            flags.to_bytes(stream)?;
        }
        for entry in &self.entries {
            if let Some(duration) = entry.sample_duration {
                duration.to_bytes(stream)?;
            }
            if let Some(size) = entry.sample_size {
                size.to_bytes(stream)?;
            }
            if let Some(flags) = &entry.sample_flags {
                flags.to_bytes(stream)?;
            }
            if let Some(offset) = entry.sample_composition_time_offset {
                match version {
                    1 => offset.to_bytes(stream)?,
                    _ => (offset as u32).to_bytes(stream)?,
                }
            }
        }
        writer.finalize()
    }
}

impl BoxInfo for TrackRunBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"trun")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for TrackRunBox {
    fn version(&self) -> Option<u8> {
        let negative = self.entries.iter().any(|e| {
            e.sample_composition_time_offset
                .map(|o| o < 0)
                .unwrap_or(false)
        });
        Some(negative as u8)
    }
    fn flags(&self) -> u32 {
        let mut flags = self.entry_flags();
        if self.data_offset.is_some() {
            flags |= TR_FLAG_DATA_OFFSET;
        }
        if self.first_sample_flags.is_some() {
            flags |= TR_FLAG_FIRST_SAMPLE_FLAGS;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Membuf;

    #[test]
    fn trun_round_trip() {
        let mut trun = TrackRunBox::default();
        trun.data_offset = Some(120);
        for i in 0..4 {
            trun.entries.push(TrackRunEntry {
                sample_duration: Some(1024),
                sample_size: Some(100 + i),
                sample_flags: None,
                sample_composition_time_offset: Some(-(i as i32)),
            });
        }
        let mut buf = Membuf::new();
        trun.to_bytes(&mut buf).unwrap();
        buf.rewind();
        let trun2 = TrackRunBox::from_bytes(&mut buf).unwrap();
        assert_eq!(trun2.entries.len(), 4);
        assert_eq!(trun2.data_offset, Some(120));
        assert_eq!(trun2.entries[3].sample_composition_time_offset, Some(-3));
        assert_eq!(trun2.entries[3].sample_size, Some(103));
    }
}
