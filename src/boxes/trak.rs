use crate::boxes::prelude::*;
use crate::boxes::{MediaBox, MediaHeaderBox, SampleTableBox, UserDataBox};

def_box! {
    /// 8.3.1 Track Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TrackBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"trak",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl TrackBox {
    declare_box_methods!(TrackHeaderBox, track_header, track_header_mut);
    declare_box_methods!(MediaBox, media, media_mut);
    declare_box_methods_opt!(EditBox, edit_box, edit_box_mut);
    declare_box_methods_opt!(TrackReferenceBox, track_reference, track_reference_mut);
    declare_box_methods_opt!(UserDataBox, user_data, user_data_mut);

    /// Get the track id.
    pub fn track_id(&self) -> u32 {
        self.track_header().track_id
    }

    /// Get the edit list, if it is present and has at least one entry.
    pub fn edit_list(&self) -> Option<&EditListBox> {
        let edts = self.edit_box()?;
        let elst = first_box!(&edts.boxes, EditListBox)?;
        if elst.entries.is_empty() {
            None
        } else {
            Some(elst)
        }
    }

    /// Shortcut to this track's MediaHeaderBox.
    pub fn media_header(&self) -> &MediaHeaderBox {
        self.media().media_header()
    }

    /// Shortcut to this track's SampleTableBox.
    pub fn sample_table(&self) -> &SampleTableBox {
        self.media().media_info().sample_table()
    }

    /// Shortcut to this track's SampleTableBox, mutable.
    pub fn sample_table_mut(&mut self) -> &mut SampleTableBox {
        self.media_mut().media_info_mut().sample_table_mut()
    }

    /// Check if this track is valid (has header and media boxes).
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        let track_id = match first_box!(&self.boxes, TrackHeaderBox) {
            Some(th) => th.track_id,
            None => {
                log::error!("TrackBox: no TrackHeaderBox present");
                return false;
            },
        };

        match first_box!(&self.boxes, MediaBox) {
            Some(m) => {
                if !m.is_valid() {
                    valid = false;
                }
            },
            None => {
                log::error!("TrackBox(id {}): no MediaBox present", track_id);
                valid = false;
            },
        }

        valid
    }
}

def_box! {
    /// 8.3.2 Track Header Box (ISO/IEC 14496-12:2015(E))
    TrackHeaderBox {
        flags:      TrackFlags,
        cr_time:    Time,
        mod_time:   Time,
        track_id:   u32,
        skip:       4,
        duration:   Duration_,
        skip:       8,
        layer:      u16,
        alternate_group:    u16,
        volume:     FixedFloat8_8,
        skip:       2,
        matrix:     Matrix,
        width:      FixedFloat16_16,
        height:     FixedFloat16_16,
    },
    fourcc => b"tkhd",
    version => [1, cr_time, mod_time, duration, flags],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for TrackHeaderBox {
    fn default() -> TrackHeaderBox {
        let mut flags = TrackFlags::default();
        flags.set_enabled(true);
        flags.set_in_movie(true);
        flags.set_in_preview(true);
        TrackHeaderBox {
            flags,
            cr_time: Time::default(),
            mod_time: Time::default(),
            track_id: 0,
            duration: Duration_::default(),
            layer: 0,
            alternate_group: 0,
            volume: FixedFloat8_8::default(),
            matrix: Matrix::unity(),
            width: FixedFloat16_16::default(),
            height: FixedFloat16_16::default(),
        }
    }
}

def_box! {
    /// Track Aperture Mode Dimensions Atom (Apple/QuickTime)
    #[derive(Default)]
    TrackApertureModeDimensionsBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"tapt",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Clean Aperture Dimensions Atom (Apple/QuickTime)
    #[derive(Default)]
    CleanApertureDimensionsBox {
        width:      FixedFloat16_16,
        height:     FixedFloat16_16,
    },
    fourcc => b"clef",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// Production Aperture Dimensions Atom (Apple/QuickTime)
    #[derive(Default)]
    ProductionApertureDimensionsBox {
        width:      FixedFloat16_16,
        height:     FixedFloat16_16,
    },
    fourcc => b"prof",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// Encoded Pixels Dimensions Atom (Apple/QuickTime)
    #[derive(Default)]
    EncodedPixelsDimensionsBox {
        width:      FixedFloat16_16,
        height:     FixedFloat16_16,
    },
    fourcc => b"enof",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.6.5 Edit Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    EditBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"edts",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.6.6 Edit List Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    EditListBox {
        entries:        ArraySized32<EditListEntry>,
    },
    fourcc => b"elst",
    version => [1, entries],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Entry in EditListBox.
///
/// `media_time == -1` means an empty edit. Version 1 is used when the
/// duration outgrows 32 bits or the media time doesn't fit in an i32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditListEntry {
    pub segment_duration:    u64,
    pub media_time:          i64,
    pub media_rate_integer:  i16,
    pub media_rate_fraction: i16,
}

impl FromBytes for EditListEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let (segment_duration, media_time) = match stream.version() {
            1 => (u64::from_bytes(stream)?, i64::from_bytes(stream)?),
            _ => (
                u32::from_bytes(stream)? as u64,
                i32::from_bytes(stream)? as i64,
            ),
        };
        Ok(EditListEntry {
            segment_duration,
            media_time,
            media_rate_integer: i16::from_bytes(stream)?,
            media_rate_fraction: i16::from_bytes(stream)?,
        })
    }
    fn min_size() -> usize {
        12
    }
}

impl ToBytes for EditListEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match stream.version() {
            1 => {
                self.segment_duration.to_bytes(stream)?;
                self.media_time.to_bytes(stream)?;
            },
            _ => {
                (self.segment_duration as u32).to_bytes(stream)?;
                (self.media_time as i32).to_bytes(stream)?;
            },
        }
        self.media_rate_integer.to_bytes(stream)?;
        self.media_rate_fraction.to_bytes(stream)?;
        Ok(())
    }
}

impl FullBox for EditListEntry {
    fn version(&self) -> Option<u8> {
        if self.segment_duration > u32::MAX as u64
            || self.media_time > i32::MAX as i64
            || self.media_time < i32::MIN as i64
        {
            Some(1)
        } else {
            None
        }
    }
}

/// 8.3.3 Track Reference Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct TrackReferenceBox {
    pub refs: Vec<TrackReferenceTypeBox>,
}

/// A reference of a specific type ('chap', 'hint', 'cdsc', ..) to a
/// list of track ids.
#[derive(Clone, Debug)]
pub struct TrackReferenceTypeBox {
    pub ref_type:  FourCC,
    pub track_ids: Vec<u32>,
}

impl FromBytes for TrackReferenceBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackReferenceBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let mut refs = Vec::new();
        while stream.left() >= 8 {
            let mut sub = BoxReader::new(stream)?;
            let ref_type = sub.header.fourcc;
            let mut track_ids = Vec::new();
            while sub.left() >= 4 {
                track_ids.push(u32::from_bytes(&mut sub)?);
            }
            refs.push(TrackReferenceTypeBox {
                ref_type,
                track_ids,
            });
        }
        Ok(TrackReferenceBox { refs })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for TrackReferenceBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        for r in &self.refs {
            let mut sub = BoxWriter::new(&mut *stream, r)?;
            for id in &r.track_ids {
                id.to_bytes(&mut sub)?;
            }
            sub.finalize()?;
        }
        writer.finalize()
    }
}

impl BoxInfo for TrackReferenceBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"tref")
    }
}

impl FullBox for TrackReferenceBox {}

impl BoxInfo for TrackReferenceTypeBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        self.ref_type
    }
}

impl FullBox for TrackReferenceTypeBox {}
