//! Write MP4 / ISOBMFF containers.
//!
//! This crate is a multiplexer for the ISO Base Media File Format
//! (ISO/IEC 14496-12) and its QuickTime / 3GPP / iTunes variants:
//!
//! - a typed box tree with bit-exact serialization and parsing
//! - append-time sample-table compaction (stts/ctts/stsc/stsz runs,
//!   stco to co64 promotion)
//! - a chunk/pool scheduler that interleaves tracks
//! - 'rap ' and 'roll' sample grouping
//! - a progressive finalizer that rewrites the file to put the moov
//!   in front of the media data, and a fragmented writer (moof/mdat
//!   pairs plus the mfra random access index)
//! - a VC-1 Advanced Profile (SMPTE 421M-2006) importer
//!
//! A movie is written by creating a [`Muxer`], adding tracks and
//! sample descriptions, appending [`Sample`]s in decode order, and
//! calling [`Muxer::finish`]:
//!
//! ```no_run
//! use mp4mux::{handlers, MovieParameters, Muxer, Sample};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut mux = Muxer::create("out.mp4", MovieParameters::default())?;
//!     let track_id = mux.create_track(handlers::HANDLER_AUDIO);
//!     // .. add_sample_entry, set_media_parameters ..
//!     let mut sample = Sample::new(1024);
//!     sample.prop = mp4mux::SampleProperty::sync();
//!     mux.append_sample(track_id, sample)?;
//!     mux.finish(None)?;
//!     Ok(())
//! }
//! ```
#![allow(semicolon_in_expressions_from_macros)]
#[macro_use]
mod ioerr;
#[macro_use]
#[doc(hidden)]
pub mod macros;
#[macro_use]
pub mod serialize;
#[macro_use]
pub mod types;
mod bitio;
pub mod boxes;
pub mod brand;
pub mod chapter;
pub mod error;
mod fragment;
mod groups;
pub mod importer;
pub mod io;
pub mod mp4box;
pub mod muxer;
mod rewrite;
pub mod sample;
pub(crate) mod track;
pub mod vc1;

pub use crate::error::{Error, Result};
pub use crate::io::Mp4File;
pub use crate::muxer::{MediaParameters, MovieParameters, Muxer, RemuxConfig, TrackParameters};
pub use crate::sample::{LeadingType, RandomAccessType, Sample, SampleProperty};

/// Handler types, re-exported for track creation.
pub mod handlers {
    pub use crate::track::{HANDLER_AUDIO, HANDLER_HINT, HANDLER_TEXT, HANDLER_VIDEO};
}
