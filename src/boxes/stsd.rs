use crate::boxes::prelude::*;
use crate::mp4box::BoxHeader;

def_box! {
    /// 8.5.2 Sample Description Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SampleDescriptionBox {
        entries:    ArraySized32<SampleEntry>,
    },
    fourcc => b"stsd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Visual sample entry types we recognize.
const VISUAL_TYPES: &[&[u8; 4]] = &[
    b"vc-1", b"avc1", b"avc2", b"avc3", b"avc4", b"hvc1", b"hev1", b"mp4v", b"s263", b"encv",
    b"raw ", b"yuv2", b"2vuy", b"v210", b"v216", b"v308", b"v408", b"v410",
];

/// Audio sample entry types we recognize.
const AUDIO_TYPES: &[&[u8; 4]] = &[
    b"mp4a", b"ac-3", b"ec-3", b"alac", b"dtsc", b"dtse", b"dtsh", b"dtsl", b"samr", b"sawb",
    b"enca", b"lpcm", b"sowt", b"twos", b"fl32", b"fl64", b"in24", b"in32", b"alaw", b"ulaw",
    b"NONE", b"none",
];

/// Uncompressed PCM audio types (the "LPCM" family in QTFF terms).
const LPCM_TYPES: &[&[u8; 4]] = &[
    b"lpcm", b"sowt", b"twos", b"fl32", b"fl64", b"in24", b"in32", b"NONE", b"none",
];

/// Uncompressed YCbCr video types.
const UNCOMPRESSED_YCBCR_TYPES: &[&[u8; 4]] = &[
    b"raw ", b"yuv2", b"2vuy", b"v210", b"v216", b"v308", b"v408", b"v410",
];

fn in_table(fourcc: FourCC, table: &[&[u8; 4]]) -> bool {
    let b = fourcc.to_be_bytes();
    table.iter().any(|&t| *t == b)
}

/// One entry in the SampleDescriptionBox.
#[derive(Clone, Debug)]
pub enum SampleEntry {
    Visual(VisualSampleEntry),
    Audio(AudioSampleEntry),
    Unknown(GenericBox),
}

impl SampleEntry {
    pub fn fourcc(&self) -> FourCC {
        match self {
            SampleEntry::Visual(e) => e.fourcc,
            SampleEntry::Audio(e) => e.fourcc,
            SampleEntry::Unknown(e) => e.fourcc,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioSampleEntry> {
        match self {
            SampleEntry::Audio(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_visual(&self) -> Option<&VisualSampleEntry> {
        match self {
            SampleEntry::Visual(e) => Some(e),
            _ => None,
        }
    }
}

impl FromBytes for SampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleEntry> {
        let header = BoxHeader::peek(stream)?;
        let e = if in_table(header.fourcc, VISUAL_TYPES) {
            SampleEntry::Visual(VisualSampleEntry::from_bytes(stream)?)
        } else if in_table(header.fourcc, AUDIO_TYPES) {
            SampleEntry::Audio(AudioSampleEntry::from_bytes(stream)?)
        } else {
            SampleEntry::Unknown(GenericBox::from_bytes(stream)?)
        };
        Ok(e)
    }
    fn min_size() -> usize {
        16
    }
}

impl ToBytes for SampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match self {
            SampleEntry::Visual(e) => e.to_bytes(stream),
            SampleEntry::Audio(e) => e.to_bytes(stream),
            SampleEntry::Unknown(e) => e.to_bytes(stream),
        }
    }
}

/// 12.1.3 Visual Sample Entry (ISO/IEC 14496-12:2015(E))
///
/// Codec-specific configuration, `btrt`, and `colr`/`clap`/`pasp`
/// live in `extensions`, in that order.
#[derive(Clone, Debug)]
pub struct VisualSampleEntry {
    pub fourcc:               FourCC,
    pub data_reference_index: u16,
    pub width:                u16,
    pub height:               u16,
    pub horiz_resolution:     FixedFloat16_16,
    pub vert_resolution:      FixedFloat16_16,
    pub frame_count:          u16,
    pub compressor_name:      String,
    pub depth:                u16,
    pub extensions:           Vec<MP4Box>,
}

impl VisualSampleEntry {
    pub fn new(fourcc: FourCC) -> VisualSampleEntry {
        VisualSampleEntry {
            fourcc,
            data_reference_index: 1,
            width: 0,
            height: 0,
            horiz_resolution: FixedFloat16_16::from_f64(72.0),
            vert_resolution: FixedFloat16_16::from_f64(72.0),
            frame_count: 1,
            compressor_name: String::new(),
            depth: 24,
            extensions: Vec::new(),
        }
    }

    /// Is this an uncompressed YCbCr format?
    pub fn is_uncompressed_ycbcr(&self) -> bool {
        in_table(self.fourcc, UNCOMPRESSED_YCBCR_TYPES)
    }
}

impl FromBytes for VisualSampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<VisualSampleEntry> {
        let mut reader = BoxReader::new(stream)?;
        let fourcc = reader.header.fourcc;
        let stream = &mut reader;
        ReadBytes::skip(stream, 6)?; // reserved
        let data_reference_index = u16::from_bytes(stream)?;
        ReadBytes::skip(stream, 16)?; // pre_defined / reserved
        let width = u16::from_bytes(stream)?;
        let height = u16::from_bytes(stream)?;
        let horiz_resolution = FixedFloat16_16::from_bytes(stream)?;
        let vert_resolution = FixedFloat16_16::from_bytes(stream)?;
        ReadBytes::skip(stream, 4)?; // reserved
        let frame_count = u16::from_bytes(stream)?;
        let name = stream.read(32)?;
        let len = std::cmp::min(name[0] as usize, 31);
        let compressor_name = String::from_utf8_lossy(&name[1..1 + len]).to_string();
        let depth = u16::from_bytes(stream)?;
        ReadBytes::skip(stream, 2)?; // pre_defined (-1)
        let mut extensions = Vec::new();
        while stream.left() >= 8 {
            extensions.push(MP4Box::from_bytes(stream)?);
        }
        Ok(VisualSampleEntry {
            fourcc,
            data_reference_index,
            width,
            height,
            horiz_resolution,
            vert_resolution,
            frame_count,
            compressor_name,
            depth,
            extensions,
        })
    }

    fn min_size() -> usize {
        86
    }
}

impl ToBytes for VisualSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        WriteBytes::skip(stream, 6)?;
        self.data_reference_index.to_bytes(stream)?;
        WriteBytes::skip(stream, 16)?;
        self.width.to_bytes(stream)?;
        self.height.to_bytes(stream)?;
        self.horiz_resolution.to_bytes(stream)?;
        self.vert_resolution.to_bytes(stream)?;
        WriteBytes::skip(stream, 4)?;
        self.frame_count.to_bytes(stream)?;
        let mut name = [0u8; 32];
        let b = self.compressor_name.as_bytes();
        let len = std::cmp::min(b.len(), 31);
        name[0] = len as u8;
        name[1..1 + len].copy_from_slice(&b[..len]);
        stream.write(&name)?;
        self.depth.to_bytes(stream)?;
        (-1i16).to_bytes(stream)?;
        for ext in &self.extensions {
            ext.to_bytes(stream)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for VisualSampleEntry {
    #[inline]
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl FullBox for VisualSampleEntry {}

/// 12.2.3 Audio Sample Entry (ISO/IEC 14496-12:2015(E)), including the
/// QTFF version 1 sound description extension.
///
/// A QT sound entry wraps codec-specific children in a `wave` atom
/// terminated by a zero-type terminator atom; `chan` goes after the
/// decoder-specific info.
#[derive(Clone, Debug)]
pub struct AudioSampleEntry {
    pub fourcc:               FourCC,
    pub data_reference_index: u16,
    pub qt_version:           u16,
    pub channel_count:        u16,
    pub sample_size:          u16,
    pub compression_id:       i16,
    pub sample_rate:          FixedFloat16_16,
    // QTFF version 1 only.
    pub samples_per_packet:   u32,
    pub bytes_per_packet:     u32,
    pub bytes_per_frame:      u32,
    pub bytes_per_sample:     u32,
    pub extensions:           Vec<MP4Box>,
}

impl AudioSampleEntry {
    pub fn new(fourcc: FourCC) -> AudioSampleEntry {
        AudioSampleEntry {
            fourcc,
            data_reference_index: 1,
            qt_version: 0,
            channel_count: 2,
            sample_size: 16,
            compression_id: 0,
            sample_rate: FixedFloat16_16::default(),
            samples_per_packet: 0,
            bytes_per_packet: 0,
            bytes_per_frame: 0,
            bytes_per_sample: 0,
            extensions: Vec::new(),
        }
    }

    /// Is this an uncompressed PCM audio description?
    pub fn is_lpcm(&self) -> bool {
        in_table(self.fourcc, LPCM_TYPES)
    }

    /// Size in bytes of one PCM audio frame (all channels).
    pub fn pcm_frame_size(&self) -> u32 {
        if self.bytes_per_frame > 0 {
            self.bytes_per_frame
        } else {
            (self.channel_count as u32) * (self.sample_size as u32) / 8
        }
    }
}

impl FromBytes for AudioSampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<AudioSampleEntry> {
        let mut reader = BoxReader::new(stream)?;
        let fourcc = reader.header.fourcc;
        let stream = &mut reader;
        ReadBytes::skip(stream, 6)?; // reserved
        let data_reference_index = u16::from_bytes(stream)?;
        let qt_version = u16::from_bytes(stream)?;
        ReadBytes::skip(stream, 6)?; // revision, vendor
        let channel_count = u16::from_bytes(stream)?;
        let sample_size = u16::from_bytes(stream)?;
        let compression_id = i16::from_bytes(stream)?;
        ReadBytes::skip(stream, 2)?; // packet size
        let sample_rate = FixedFloat16_16::from_bytes(stream)?;
        let (samples_per_packet, bytes_per_packet, bytes_per_frame, bytes_per_sample) =
            if qt_version == 1 {
                (
                    u32::from_bytes(stream)?,
                    u32::from_bytes(stream)?,
                    u32::from_bytes(stream)?,
                    u32::from_bytes(stream)?,
                )
            } else {
                (0, 0, 0, 0)
            };
        let mut extensions = Vec::new();
        while stream.left() >= 8 {
            extensions.push(MP4Box::from_bytes(stream)?);
        }
        Ok(AudioSampleEntry {
            fourcc,
            data_reference_index,
            qt_version,
            channel_count,
            sample_size,
            compression_id,
            sample_rate,
            samples_per_packet,
            bytes_per_packet,
            bytes_per_frame,
            bytes_per_sample,
            extensions,
        })
    }

    fn min_size() -> usize {
        36
    }
}

impl ToBytes for AudioSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        WriteBytes::skip(stream, 6)?;
        self.data_reference_index.to_bytes(stream)?;
        self.qt_version.to_bytes(stream)?;
        WriteBytes::skip(stream, 6)?;
        self.channel_count.to_bytes(stream)?;
        self.sample_size.to_bytes(stream)?;
        self.compression_id.to_bytes(stream)?;
        WriteBytes::skip(stream, 2)?;
        self.sample_rate.to_bytes(stream)?;
        if self.qt_version == 1 {
            self.samples_per_packet.to_bytes(stream)?;
            self.bytes_per_packet.to_bytes(stream)?;
            self.bytes_per_frame.to_bytes(stream)?;
            self.bytes_per_sample.to_bytes(stream)?;
        }
        for ext in &self.extensions {
            ext.to_bytes(stream)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for AudioSampleEntry {
    #[inline]
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl FullBox for AudioSampleEntry {}

def_box! {
    /// Sound sample description extension wrapper (Apple/QuickTime).
    #[derive(Default)]
    WaveBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"wave",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Format atom inside `wave` (Apple/QuickTime).
    #[derive(Default)]
    FormatBox {
        data_format:    FourCC,
    },
    fourcc => b"frma",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Endianness atom inside `wave` (Apple/QuickTime).
    #[derive(Default)]
    EndianBox {
        little_endian:  u16,
    },
    fourcc => b"enda",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Terminator atom: closes a `wave` wrapper (Apple/QuickTime).
    #[derive(Default)]
    TerminatorBox {
    },
    fourcc => b"\0\0\0\0",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Audio Channel Layout atom (Apple/QuickTime).
    #[derive(Default)]
    ChannelLayoutBox {
        channel_layout_tag: u32,
        channel_bitmap:     u32,
        descriptions:       ArraySized32<ChannelDescription>,
    },
    fourcc => b"chan",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_struct! {
    /// Channel description in ChannelLayoutBox.
    #[derive(Default)]
    ChannelDescription,
        channel_label:  u32,
        channel_flags:  u32,
        coordinates_0:  u32,
        coordinates_1:  u32,
        coordinates_2:  u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpcm_predicate() {
        assert!(AudioSampleEntry::new(FourCC::new(b"lpcm")).is_lpcm());
        assert!(AudioSampleEntry::new(FourCC::new(b"sowt")).is_lpcm());
        assert!(!AudioSampleEntry::new(FourCC::new(b"mp4a")).is_lpcm());
    }

    #[test]
    fn pcm_frame_size_from_layout() {
        let mut entry = AudioSampleEntry::new(FourCC::new(b"sowt"));
        entry.channel_count = 2;
        entry.sample_size = 16;
        assert_eq!(entry.pcm_frame_size(), 4);
    }
}
