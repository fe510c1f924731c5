//! The contract between elementary-stream importers and the muxer.
//!
//! An importer probes its input once, hands out one summary per
//! embedded track, and then yields access units in decode order until
//! end of stream.
use crate::boxes::MP4Box;
use crate::error::Result;
use crate::sample::Sample;
use crate::types::FourCC;

/// One access-unit read.
pub enum ImportEvent {
    /// A complete access unit.
    Sample(Sample),
    /// A complete access unit, but the stream parameters changed.
    /// Callers that can't re-emit a sample description treat this as
    /// end of stream.
    SummaryChanged(Sample),
    /// End of stream.
    Eof,
}

/// An elementary-stream importer.
pub trait Importer {
    /// Analyze the stream. Returns one summary per track found.
    fn probe(&mut self) -> Result<Vec<Summary>>;

    /// Get the next access unit of a track (1-based).
    fn get_access_unit(&mut self, track_number: u32) -> Result<ImportEvent>;

    /// Delta of the last sample, in media timescale units. Only valid
    /// after the stream hit EOF.
    fn last_sample_delta(&self, track_number: u32) -> u32;
}

/// Codec-specific configuration carried by a summary, either as an
/// opaque payload that serializes into a box of the given type, or as
/// an already-structured box.
#[derive(Clone, Debug)]
pub enum CodecSpecific {
    Binary { fourcc: FourCC, data: Vec<u8> },
    Structured(MP4Box),
}

/// Stream parameters of one track.
#[derive(Clone, Debug)]
pub enum Summary {
    Audio(AudioSummary),
    Video(VideoSummary),
}

impl Summary {
    pub fn max_au_length(&self) -> u32 {
        match self {
            Summary::Audio(a) => a.max_au_length,
            Summary::Video(v) => v.max_au_length,
        }
    }
}

/// Parameters of an audio elementary stream.
#[derive(Clone, Debug)]
pub struct AudioSummary {
    /// Sample entry type ('mp4a', 'ac-3', 'sowt', ..).
    pub codec:            FourCC,
    /// Sampling frequency in Hz; also the media timescale.
    pub frequency:        u32,
    pub channels:         u16,
    pub sample_size:      u16,
    /// PCM/coded samples per access unit (1024 for AAC).
    pub samples_in_frame: u32,
    pub max_au_length:    u32,
    pub specific:         Vec<CodecSpecific>,
}

/// Parameters of a video elementary stream.
#[derive(Clone, Debug)]
pub struct VideoSummary {
    /// Sample entry type ('vc-1', 'avc1', ..).
    pub codec:           FourCC,
    pub width:           u16,
    pub height:          u16,
    /// Pixel aspect ratio; (0, 0) or (1, 1) writes no pasp.
    pub par:             (u32, u32),
    /// Colour primaries / transfer / matrix, if signalled.
    pub color:           Option<(u16, u16, u16)>,
    /// Media timescale, e.g. the framerate numerator.
    pub timescale:       u32,
    /// Ticks per frame, e.g. the framerate denominator.
    pub timebase:        u32,
    /// Variable frame rate.
    pub vfr:             bool,
    pub max_au_length:   u32,
    pub compressor_name: String,
    pub specific:        Vec<CodecSpecific>,
}
