//! The muxer root: movie-level state, the append path, the chunk/pool
//! scheduler arbitration, and the non-fragmented finalizer.
use std::path::Path;

use crate::boxes::*;
use crate::brand::{Brands, Compatibility};
use crate::chapter::{self, ChapterPoint};
use crate::error::{Error, Result};
use crate::fragment::FragmentManager;
use crate::groups::{RapEngine, RollEngine};
use crate::importer::{CodecSpecific, Summary};
use crate::io::Sink;
use crate::mp4box::GenericBox;
use crate::rewrite;
use crate::sample::Sample;
use crate::serialize::{BoxBytes, ToBytes, WriteBytes};
use crate::track::{Track, HANDLER_TEXT};
use crate::types::*;

const DEFAULT_MAX_CHUNK_DURATION: f64 = 0.5;
const DEFAULT_MAX_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Movie-level muxing parameters.
#[derive(Clone, Debug)]
pub struct MovieParameters {
    /// Movie timescale (mvhd).
    pub timescale:           u32,
    /// Close a chunk when it spans more than this many seconds.
    pub max_chunk_duration:  f64,
    /// Close a chunk when it holds more than this many bytes.
    pub max_chunk_size:      u64,
    /// Force-flush another track's chunk when it lags the appending
    /// track by more than this many seconds.
    pub max_async_tolerance: f64,
    pub brands:              Brands,
}

impl Default for MovieParameters {
    fn default() -> MovieParameters {
        MovieParameters {
            timescale: 600,
            max_chunk_duration: DEFAULT_MAX_CHUNK_DURATION,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_async_tolerance: 2.0 * DEFAULT_MAX_CHUNK_DURATION.max(1.0),
            brands: Brands::mp4(),
        }
    }
}

/// Per-track presentation parameters.
#[derive(Clone, Debug, Default)]
pub struct TrackParameters {
    pub enabled:        bool,
    pub in_movie:       bool,
    pub in_preview:     bool,
    pub layer:          u16,
    pub alternate_group: u16,
    pub volume:         f64,
    pub matrix:         Option<[u32; 9]>,
    pub display_width:  f64,
    pub display_height: f64,
    /// Add the QT aperture mode boxes (clean/production/encoded).
    pub aperture_modes: bool,
}

impl TrackParameters {
    pub fn movie_default() -> TrackParameters {
        TrackParameters {
            enabled: true,
            in_movie: true,
            in_preview: true,
            volume: 1.0,
            ..TrackParameters::default()
        }
    }
}

/// Per-track media parameters.
#[derive(Clone, Debug)]
pub struct MediaParameters {
    pub timescale:     u32,
    /// ISO 639-2/T code such as "eng"; None keeps "und".
    pub language:      Option<String>,
    pub handler_name:  String,
    pub rap_grouping:  bool,
    pub roll_grouping: bool,
}

impl Default for MediaParameters {
    fn default() -> MediaParameters {
        MediaParameters {
            timescale: 600,
            language: None,
            handler_name: String::new(),
            rap_grouping: false,
            roll_grouping: false,
        }
    }
}

/// Configuration of the in-place moov-first rewrite.
#[derive(Clone, Debug)]
pub struct RemuxConfig {
    /// Size of the rolling copy buffer. Clamped up to twice the size
    /// of the box being inserted.
    pub buffer_size: usize,
}

impl Default for RemuxConfig {
    fn default() -> RemuxConfig {
        RemuxConfig {
            buffer_size: 4 * 1024 * 1024,
        }
    }
}

/// The muxer root. Owns the byte sink and every track.
pub struct Muxer {
    pub(crate) sink:       Sink,
    pub(crate) params:     MovieParameters,
    pub(crate) compat:     Compatibility,
    pub(crate) tracks:     Vec<Track>,
    pub(crate) started:    bool,
    /// File position of the mdat largesize placeholder ('free' box).
    pub(crate) mdat_placeholder: u64,
    /// Bytes of media data written so far.
    pub(crate) mdat_size:  u64,
    pub(crate) fragments:  Option<FragmentManager>,
    chapters:              Vec<ChapterPoint>,
    chapter_bom:           bool,
    chapter_track:         Option<u32>,
    finished:              bool,
}

impl Muxer {
    /// Create a non-fragmented movie file.
    pub fn create(path: impl AsRef<Path>, params: MovieParameters) -> Result<Muxer> {
        let sink = Sink::create(path)?;
        Ok(Muxer::new(sink, params, false))
    }

    /// Create a fragmented movie file.
    pub fn create_fragmented(path: impl AsRef<Path>, params: MovieParameters) -> Result<Muxer> {
        let sink = Sink::create(path)?;
        Ok(Muxer::new(sink, params, true))
    }

    /// Write a fragmented movie to stdout. Non-fragmented writing
    /// needs a seekable sink.
    pub fn stdout_fragmented(params: MovieParameters) -> Muxer {
        Muxer::new(Sink::stdout(), params, true)
    }

    fn new(sink: Sink, params: MovieParameters, fragmented: bool) -> Muxer {
        let compat = Compatibility::compute(&params.brands);
        Muxer {
            sink,
            params,
            compat,
            tracks: Vec::new(),
            started: false,
            mdat_placeholder: 0,
            mdat_size: 0,
            fragments: if fragmented {
                Some(FragmentManager::default())
            } else {
                None
            },
            chapters: Vec::new(),
            chapter_bom: false,
            chapter_track: None,
            finished: false,
        }
    }

    /// The computed brand compatibility flags (read-only).
    pub fn compatibility(&self) -> &Compatibility {
        &self.compat
    }

    /// Replace the movie parameters. Only allowed before the first
    /// sample is appended.
    pub fn set_movie_parameters(&mut self, params: MovieParameters) -> Result<()> {
        if self.started {
            return Err(Error::param("movie parameters must be set before muxing starts"));
        }
        self.compat = Compatibility::compute(&params.brands);
        self.params = params;
        Ok(())
    }

    /// Create a new track. Returns the track id.
    pub fn create_track(&mut self, handler: FourCC) -> u32 {
        let track_id = self.tracks.len() as u32 + 1;
        self.tracks.push(Track::new(track_id, handler));
        track_id
    }

    fn track_mut(&mut self, track_id: u32) -> Result<&mut Track> {
        let index = (track_id as usize)
            .checked_sub(1)
            .filter(|&i| i < self.tracks.len())
            .ok_or_else(|| Error::param(format!("no such track: {}", track_id)))?;
        Ok(&mut self.tracks[index])
    }

    pub fn set_track_parameters(&mut self, track_id: u32, params: TrackParameters) -> Result<()> {
        let track = self.track_mut(track_id)?;
        let tkhd = &mut track.tkhd;
        tkhd.flags.set_enabled(params.enabled);
        tkhd.flags.set_in_movie(params.in_movie);
        tkhd.flags.set_in_preview(params.in_preview);
        tkhd.layer = params.layer;
        tkhd.alternate_group = params.alternate_group;
        tkhd.volume = FixedFloat8_8::from_f64(params.volume);
        if let Some(matrix) = params.matrix {
            tkhd.matrix = Matrix(matrix);
        }
        if params.display_width > 0.0 {
            tkhd.width = FixedFloat16_16::from_f64(params.display_width);
        }
        if params.display_height > 0.0 {
            tkhd.height = FixedFloat16_16::from_f64(params.display_height);
        }
        if params.aperture_modes {
            track.aperture = Some((params.display_width, params.display_height));
        }
        Ok(())
    }

    pub fn set_media_parameters(&mut self, track_id: u32, params: MediaParameters) -> Result<()> {
        let rap_ok = self.compat.rap_grouping();
        let roll_ok = self.compat.roll_grouping();
        let track = self.track_mut(track_id)?;
        track.media_timescale = params.timescale;
        if let Some(code) = params.language.as_deref() {
            track.language = IsoLanguageCode::from_code(code)
                .ok_or_else(|| Error::param(format!("bad language code: {}", code)))?;
        }
        track.handler_name = params.handler_name;
        if params.rap_grouping {
            if !rap_ok {
                return Err(Error::param("'rap ' grouping needs an iso6 brand"));
            }
            track.rap = Some(RapEngine::new());
        }
        if params.roll_grouping {
            if !roll_ok {
                return Err(Error::param("'roll' grouping needs avc1/qt compatibility"));
            }
            track.roll = Some(RollEngine::new());
        }
        Ok(())
    }

    /// Add a sample description built from an importer summary.
    /// Returns the 1-based sample description index.
    pub fn add_sample_entry(&mut self, track_id: u32, summary: &Summary) -> Result<u32> {
        let compat = self.compat;
        match summary {
            Summary::Audio(audio) => {
                if !compat.check_3gpp_audio(audio.frequency, audio.channels) {
                    return Err(Error::invalid_data(
                        "3GPP: audio must be <= 48 kHz and <= 2 channels",
                    ));
                }
            },
            Summary::Video(_) => {},
        }
        let track = self.track_mut(track_id)?;
        let entry = match summary {
            Summary::Audio(audio) => {
                let mut e = AudioSampleEntry::new(audio.codec);
                e.channel_count = audio.channels;
                e.sample_size = audio.sample_size;
                e.sample_rate = FixedFloat16_16::from_f64(audio.frequency as f64);
                let specific: Vec<MP4Box> =
                    audio.specific.iter().map(build_codec_specific).collect();
                if compat.qt_compatible {
                    // QT wraps the codec config in a 'wave' atom,
                    // closed by a terminator.
                    let mut wave = WaveBox::default();
                    wave.boxes.push(
                        FormatBox {
                            data_format: audio.codec,
                        }
                        .to_mp4box(),
                    );
                    wave.boxes.extend(specific);
                    wave.boxes.push(TerminatorBox::default().to_mp4box());
                    e.extensions.push(wave.to_mp4box());
                    // Channel layout goes after the decoder config.
                    e.extensions.push(
                        ChannelLayoutBox {
                            channel_layout_tag: (100 << 16) | audio.channels as u32,
                            channel_bitmap: 0,
                            descriptions: ArraySized32::new(),
                        }
                        .to_mp4box(),
                    );
                } else {
                    e.extensions.extend(specific);
                }
                SampleEntry::Audio(e)
            },
            Summary::Video(video) => {
                let mut e = VisualSampleEntry::new(video.codec);
                e.width = video.width;
                e.height = video.height;
                e.compressor_name = video.compressor_name.clone();
                for specific in &video.specific {
                    e.extensions.push(build_codec_specific(specific));
                }
                e.extensions.push(BtrtBox::default().to_mp4box());
                if let Some((primaries, transfer, matrix)) = video.color {
                    e.extensions.push(
                        ColorParameterBox {
                            colour_type:     FourCC::new(b"nclc"),
                            primaries_index: primaries,
                            transfer_index:  transfer,
                            matrix_index:    matrix,
                        }
                        .to_mp4box(),
                    );
                }
                let (par_h, par_v) = video.par;
                if par_h > 0 && par_v > 0 && par_h != par_v {
                    e.extensions.push(
                        PixelAspectRatioBox {
                            h_spacing: par_h,
                            v_spacing: par_v,
                        }
                        .to_mp4box(),
                    );
                }
                if track.tkhd.width.0 == 0 {
                    track.tkhd.width = FixedFloat16_16::from_f64(video.width as f64);
                    track.tkhd.height = FixedFloat16_16::from_f64(video.height as f64);
                }
                SampleEntry::Visual(e)
            },
        };
        track.stsd.entries.push(entry);
        Ok(track.stsd.entries.len() as u32)
    }

    /// Append a sample to a track. The sample is consumed.
    ///
    /// Samples must be appended in decode order per track; the chunk
    /// scheduler interleaves across tracks.
    pub fn append_sample(&mut self, track_id: u32, sample: Sample) -> Result<()> {
        if self.finished {
            return Err(Error::param("movie already finished"));
        }
        let index = self.track_index(track_id)?;
        if self.tracks[index].sample_entry(sample.index).is_none() {
            return Err(Error::param(format!(
                "track {}: no sample description with index {}",
                track_id, sample.index
            )));
        }
        if self.fragments.is_some() && self.fragments.as_ref().unwrap().in_fragment() {
            return self.append_fragment_sample(index, sample);
        }
        self.ensure_started()?;

        // The LPCM exception: uncompressed audio is split into whole
        // PCM frames before pooling.
        let frame_size = match self.tracks[index].sample_entry(sample.index) {
            Some(SampleEntry::Audio(audio)) if audio.is_lpcm() => audio.pcm_frame_size() as usize,
            _ => 0,
        };
        if frame_size > 0 && sample.data.len() > frame_size {
            if sample.data.len() % frame_size != 0 {
                return Err(Error::invalid_data(
                    "PCM sample is not a whole number of frames",
                ));
            }
            let Sample {
                dts,
                cts,
                data,
                index: sdi,
                prop,
            } = sample;
            for (i, frame) in data.chunks(frame_size).enumerate() {
                let sub = Sample {
                    dts: dts + i as u64,
                    cts: cts + i as u64,
                    data: frame.to_vec(),
                    index: sdi,
                    prop: prop.clone(),
                };
                self.append_one(index, sub)?;
            }
            Ok(())
        } else {
            self.append_one(index, sample)
        }
    }

    pub(crate) fn track_index(&self, track_id: u32) -> Result<usize> {
        (track_id as usize)
            .checked_sub(1)
            .filter(|&i| i < self.tracks.len())
            .ok_or_else(|| Error::param(format!("no such track: {}", track_id)))
    }

    fn append_one(&mut self, index: usize, sample: Sample) -> Result<()> {
        let signed = self.compat.signed_cts_offsets();
        let max_chunk_duration = self.params.max_chunk_duration;
        let max_chunk_size = self.params.max_chunk_size;

        if self.tracks[index].wants_new_chunk(&sample, max_chunk_duration, max_chunk_size) {
            self.flush_chunk(index)?;
        }
        {
            let track = &mut self.tracks[index];
            if track.chunk.samples == 0 {
                track.chunk.first_dts = sample.dts;
                track.chunk.sdi = sample.index;
            }
            track.update_sample_tables(&sample, signed)?;
            track.chunk.data.extend_from_slice(&sample.data);
            track.chunk.samples += 1;
        }

        // Inter-track arbitration: a track whose open chunk lags too
        // far behind would stall interleave, so force-flush it.
        let now = sample.dts as f64 / self.tracks[index].media_timescale as f64;
        let tolerance = self.params.max_async_tolerance;
        for other in 0..self.tracks.len() {
            if other == index {
                continue;
            }
            if let Some(start) = self.tracks[other].chunk_start_seconds() {
                if now - start > tolerance {
                    self.flush_chunk(other)?;
                }
            }
        }
        Ok(())
    }

    /// Close the current chunk of a track: record stsc/stco entries
    /// and move the pooled bytes into the media data box.
    pub(crate) fn flush_chunk(&mut self, index: usize) -> Result<()> {
        let Muxer {
            sink,
            tracks,
            mdat_size,
            ..
        } = self;
        let track = &mut tracks[index];
        if track.chunk.samples == 0 {
            return Ok(());
        }
        let chunk_number = track.chunk.chunk_number + 1;
        track
            .stsc
            .add_chunk(chunk_number, track.chunk.samples, track.chunk.sdi);
        track.stco.push(sink.pos());
        sink.write(&track.chunk.data)?;
        *mdat_size += track.chunk.data.len() as u64;
        track.chunk.chunk_number = chunk_number;
        track.chunk.data.clear();
        track.chunk.samples = 0;
        Ok(())
    }

    /// Flush the pooled chunk of a track and record the delta of its
    /// final sample.
    pub fn flush_pooled_samples(&mut self, track_id: u32, last_sample_delta: u32) -> Result<()> {
        let index = self.track_index(track_id)?;
        if self.fragments.is_some() && self.fragments.as_ref().unwrap().in_fragment() {
            self.tracks[index].explicit_last_delta = Some(last_sample_delta);
            self.tracks[index].fragment.last_duration = last_sample_delta;
            return Ok(());
        }
        self.flush_chunk(index)?;
        let track = &mut self.tracks[index];
        track.explicit_last_delta = Some(last_sample_delta);
        track.add_last_sample_delta(last_sample_delta);
        Ok(())
    }

    /// Create an explicit timeline map (an edit-list entry).
    pub fn create_edit(
        &mut self,
        track_id: u32,
        duration: u64,
        start_time: i64,
        rate: f64,
    ) -> Result<u32> {
        let track = self.track_mut(track_id)?;
        let elst = track.edits.get_or_insert_with(EditListBox::default);
        elst.entries.push(EditListEntry {
            segment_duration: duration,
            media_time: start_time,
            media_rate_integer: rate as i16,
            media_rate_fraction: ((rate.fract()) * 65536.0) as i16,
        });
        Ok(elst.entries.len() as u32)
    }

    /// Modify an existing timeline map entry (1-based).
    pub fn modify_edit(
        &mut self,
        track_id: u32,
        edit_number: u32,
        duration: u64,
        start_time: i64,
        rate: f64,
    ) -> Result<()> {
        let track = self.track_mut(track_id)?;
        let elst = track
            .edits
            .as_mut()
            .ok_or_else(|| Error::param("no edit list"))?;
        let entry = (edit_number as usize)
            .checked_sub(1)
            .and_then(|i| elst.entries.get_mut(i))
            .ok_or_else(|| Error::param(format!("no such edit: {}", edit_number)))?;
        entry.segment_duration = duration;
        entry.media_time = start_time;
        entry.media_rate_integer = rate as i16;
        entry.media_rate_fraction = ((rate.fract()) * 65536.0) as i16;
        Ok(())
    }

    /// Attach a chapter list ("tyrant" / Nero chpl) parsed from a
    /// chapter text file.
    pub fn set_chapter_list(&mut self, path: impl AsRef<Path>, add_bom: bool) -> Result<()> {
        self.chapters = chapter::parse_chapter_file(path)?;
        self.chapter_bom = add_bom;
        Ok(())
    }

    /// Create a QT reference chapter track for `target_track_id` from
    /// a chapter text file.
    pub fn create_reference_chapter_track(
        &mut self,
        target_track_id: u32,
        path: impl AsRef<Path>,
    ) -> Result<u32> {
        let points = chapter::parse_chapter_file(path)?;
        if points.is_empty() {
            return Err(Error::invalid_data("no chapters in file"));
        }
        // The chapter track runs on the target track's media timescale.
        let timescale = {
            let index = self.track_index(target_track_id)?;
            self.tracks[index].media_timescale
        };
        let chapter_track_id = self.create_track(HANDLER_TEXT);

        // The chapter track itself is not enabled.
        self.set_track_parameters(
            chapter_track_id,
            TrackParameters {
                enabled: false,
                in_movie: true,
                in_preview: true,
                ..TrackParameters::movie_default()
            },
        )?;
        self.set_media_parameters(
            chapter_track_id,
            MediaParameters {
                timescale,
                handler_name: "Chapter Handler".to_string(),
                ..MediaParameters::default()
            },
        )?;

        // Text sample description.
        {
            let track = self.track_mut(chapter_track_id)?;
            track.stsd.entries.push(SampleEntry::Unknown(GenericBox {
                fourcc: FourCC::new(b"text"),
                data:   chapter::text_sample_description(),
            }));
        }

        // One text sample per chapter.
        for point in &points {
            let sample = Sample {
                dts: point.start_in_timescale(timescale),
                cts: point.start_in_timescale(timescale),
                data: chapter::text_sample(&point.name),
                index: 1,
                prop: crate::sample::SampleProperty::sync(),
            };
            self.append_sample(chapter_track_id, sample)?;
        }

        // Reference the chapter track from the target.
        let target = self.track_mut(target_track_id)?;
        let tref = target.trefs.get_or_insert_with(TrackReferenceBox::default);
        tref.refs.push(TrackReferenceTypeBox {
            ref_type:  FourCC::new(b"chap"),
            track_ids: vec![chapter_track_id],
        });

        self.chapter_track = Some(chapter_track_id);
        Ok(chapter_track_id)
    }

    /// Write ftyp plus the mdat largesize placeholder.
    pub(crate) fn ensure_started(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        let ftyp = self.params.brands.to_ftyp();
        write_box_buffered(&mut self.sink, &ftyp)?;
        self.write_mdat_placeholder()?;
        self.started = true;
        Ok(())
    }

    // An 8-byte 'free' box right before the 8-byte mdat header; if the
    // media outgrows 32 bits the pair is rewritten as one 16-byte
    // largesize mdat header.
    fn write_mdat_placeholder(&mut self) -> Result<()> {
        self.mdat_placeholder = self.sink.pos();
        8u32.to_bytes(&mut self.sink)?;
        FourCC::new(b"free").to_bytes(&mut self.sink)?;
        8u32.to_bytes(&mut self.sink)?;
        FourCC::new(b"mdat").to_bytes(&mut self.sink)?;
        Ok(())
    }

    /// Rewrite the mdat header with the final payload size.
    pub(crate) fn write_mdat_size(&mut self) -> Result<()> {
        if self.mdat_size == 0 {
            return Ok(());
        }
        let end = self.sink.pos();
        if self.mdat_size + 8 > u32::MAX as u64 {
            // Largesize form absorbs the free box.
            self.sink.seek(self.mdat_placeholder)?;
            1u32.to_bytes(&mut self.sink)?;
            FourCC::new(b"mdat").to_bytes(&mut self.sink)?;
            (self.mdat_size + 16).to_bytes(&mut self.sink)?;
        } else {
            self.sink.seek(self.mdat_placeholder + 8)?;
            ((self.mdat_size + 8) as u32).to_bytes(&mut self.sink)?;
            FourCC::new(b"mdat").to_bytes(&mut self.sink)?;
        }
        self.sink.seek(end)?;
        Ok(())
    }

    /// Build the chpl box, truncating chapters that start past the
    /// movie duration.
    fn build_chpl(&self, movie_duration: u64) -> Option<ChapterListBox> {
        if self.chapters.is_empty() {
            return None;
        }
        let mut chpl = ChapterListBox::default();
        let duration_100ns =
            movie_duration.saturating_mul(10_000_000) / self.params.timescale.max(1) as u64;
        for point in &self.chapters {
            if point.start_100ns() > duration_100ns {
                log::warn!("chapter '{}' starts past movie end, truncating list", point.name);
                break;
            }
            chpl.chapters.push(ChapterEntry {
                start_time:   point.start_100ns(),
                chapter_name: chapter::chpl_name(&point.name, self.chapter_bom),
            });
        }
        Some(chpl)
    }

    /// Assemble the finished MovieBox.
    pub(crate) fn build_moov(&mut self) -> Result<MovieBox> {
        let compat = self.compat;
        let movie_timescale = self.params.timescale;

        // The chapter track's final sample lasts until movie end.
        if let Some(chapter_track_id) = self.chapter_track {
            let index = self.track_index(chapter_track_id)?;
            let chapter_timescale = self.tracks[index].media_timescale.max(1) as u64;
            // Movie end expressed in the chapter track's timescale.
            let movie_end = self
                .tracks
                .iter()
                .filter(|t| t.track_id != chapter_track_id)
                .map(|t| t.media_duration() * chapter_timescale / t.media_timescale.max(1) as u64)
                .max()
                .unwrap_or(0);
            let track = &mut self.tracks[index];
            if track.explicit_last_delta.is_none() && track.sample_count > 0 {
                let delta = movie_end.saturating_sub(track.last_dts) as u32;
                track.explicit_last_delta = Some(delta.max(1));
                track.add_last_sample_delta(delta.max(1));
            }
        }

        for track in self.tracks.iter_mut() {
            track.update_bitrate_info();
        }

        let movie_duration = self
            .tracks
            .iter()
            .map(|t| t.media_duration() * movie_timescale as u64 / t.media_timescale.max(1) as u64)
            .max()
            .unwrap_or(0);

        let mut mvhd = MovieHeaderBox::default();
        mvhd.timescale = movie_timescale;
        mvhd.duration = Duration_(movie_duration);
        mvhd.next_track_id = self.tracks.len() as u32 + 1;

        let mut boxes: Vec<MP4Box> = Vec::new();
        boxes.push(mvhd.to_mp4box());

        // iods is MP4 version 1 legacy.
        if compat.mp4_version1 {
            let audio_profile = if self
                .tracks
                .iter()
                .any(|t| t.handler == crate::track::HANDLER_AUDIO)
            {
                0xfe
            } else {
                0xff
            };
            let visual_profile = if self
                .tracks
                .iter()
                .any(|t| t.handler == crate::track::HANDLER_VIDEO)
            {
                0xfe
            } else {
                0xff
            };
            boxes.push(InitialObjectDescriptionBox::new(audio_profile, visual_profile).to_mp4box());
        }

        for track in self.tracks.iter_mut() {
            boxes.push(track.build_trak(&compat, movie_timescale).to_mp4box());
        }

        if let Some(chpl) = self.build_chpl(movie_duration) {
            let udta = UserDataBox {
                boxes: vec![chpl.to_mp4box()],
            };
            boxes.push(udta.to_mp4box());
        }

        let moov = MovieBox { boxes };
        if !moov.is_valid() {
            return Err(Error::invalid_data("mandatory boxes missing"));
        }
        Ok(moov)
    }

    /// Finalize a non-fragmented movie: flush pools, assemble moov,
    /// promote stco to co64 where needed, and rewrite the file so that
    /// moov sits in front of mdat.
    pub fn finish(mut self, remux: Option<RemuxConfig>) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.fragments.is_some() {
            return self.finish_fragmented();
        }
        self.ensure_started()?;

        for index in 0..self.tracks.len() {
            if let Err(err) = self.flush_chunk(index) {
                log::warn!("flush_pooled_samples failed: {}", err);
            }
        }

        let mut moov = self.build_moov()?;

        // moov-size / co64 fixpoint: promoting a table grows moov,
        // which can push another table over the edge.
        let mut moov_size = crate::mp4box::box_size(&moov);
        loop {
            let mut changed = false;
            for stco in stco_iter_mut(&mut moov) {
                if stco.needs_promotion(moov_size) {
                    stco.promote();
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            moov_size = crate::mp4box::box_size(&moov);
        }

        // Media moves up by the size of the inserted moov.
        for stco in stco_iter_mut(&mut moov) {
            stco.add_offset(moov_size as i64);
        }

        self.write_mdat_size()?;

        let remux = remux.unwrap_or_default();
        rewrite::insert_box_at(
            &mut self.sink,
            &moov.to_mp4box(),
            self.mdat_placeholder,
            remux.buffer_size,
        )?;

        self.sink.flush()?;
        self.finished = true;
        Ok(())
    }
}

// All chunk offset tables in the movie.
fn stco_iter_mut(moov: &mut MovieBox) -> Vec<&mut ChunkOffsetBox> {
    let mut out = Vec::new();
    for trak in iter_box_mut!(moov, TrackBox) {
        for mdia in iter_box_mut!(trak, MediaBox) {
            for minf in iter_box_mut!(mdia, MediaInformationBox) {
                for stbl in iter_box_mut!(minf, SampleTableBox) {
                    out.push(stbl.chunk_offset_mut());
                }
            }
        }
    }
    out
}

// Serialize a box into memory, then hand the bytes to the sink in one
// write. Keeps the sink free of seeks, so stdout works.
pub(crate) fn write_box_buffered<B: ToBytes>(sink: &mut Sink, b: &B) -> std::io::Result<()> {
    let mut buf = crate::io::Membuf::new();
    b.to_bytes(&mut buf)?;
    sink.write(buf.bytes())
}

fn build_codec_specific(specific: &CodecSpecific) -> MP4Box {
    match specific {
        CodecSpecific::Binary { fourcc, data } => MP4Box::GenericBox(GenericBox {
            fourcc: *fourcc,
            data:   data.clone(),
        }),
        CodecSpecific::Structured(mp4box) => mp4box.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::AudioSummary;
    use crate::mp4box::{read_boxes, BoxInfo};
    use crate::sample::SampleProperty;
    use crate::track::HANDLER_AUDIO;
    use pretty_assertions::assert_eq;

    fn audio_summary(frequency: u32, channels: u16) -> Summary {
        Summary::Audio(AudioSummary {
            codec: FourCC::new(b"mp4a"),
            frequency,
            channels,
            sample_size: 16,
            samples_in_frame: 1024,
            max_au_length: 1024,
            specific: vec![CodecSpecific::Binary {
                fourcc: FourCC::new(b"esds"),
                data:   vec![0x03, 0x19, 0x00, 0x01, 0x00],
            }],
        })
    }

    // One AAC-LC-like track, 100 frames of 1024 samples, every frame a
    // sync sample, frame sizes varying.
    fn mux_audio_movie(path: &std::path::Path) -> Vec<MP4Box> {
        let mut mux = Muxer::create(path, MovieParameters::default()).unwrap();
        let track_id = mux.create_track(HANDLER_AUDIO);
        mux.set_media_parameters(
            track_id,
            MediaParameters {
                timescale: 44100,
                language: Some("eng".to_string()),
                handler_name: "SoundHandler".to_string(),
                ..MediaParameters::default()
            },
        )
        .unwrap();
        let sdi = mux.add_sample_entry(track_id, &audio_summary(44100, 1)).unwrap();
        assert_eq!(sdi, 1);

        for i in 0..100u64 {
            let sample = Sample {
                dts: i * 1024,
                cts: i * 1024,
                data: vec![0xaa; 200 + (i % 7) as usize],
                index: 1,
                prop: SampleProperty::sync(),
            };
            mux.append_sample(track_id, sample).unwrap();
        }
        mux.flush_pooled_samples(track_id, 1024).unwrap();
        mux.finish(None).unwrap();

        let file = crate::io::Mp4File::open(path).unwrap();
        read_boxes(file).unwrap()
    }

    #[test]
    fn audio_movie_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.mp4");
        let boxes = mux_audio_movie(&path);

        // Top-level ordering: ftyp, moov, then the media data.
        assert_eq!(boxes[0].fourcc(), b"ftyp");
        assert_eq!(boxes[1].fourcc(), b"moov");

        let moov = first_box!(&boxes, MovieBox).unwrap();
        assert!(moov.is_valid());
        let trak = first_box!(&moov.boxes, TrackBox).unwrap();
        let mdhd = trak.media_header();
        assert_eq!(mdhd.timescale, 44100);
        assert_eq!(mdhd.duration.0, 102400);
        assert_eq!(mdhd.language.to_string(), "eng");

        let stbl = trak.sample_table();
        // stts: one run.
        let stts = stbl.time_to_sample();
        assert_eq!(stts.entries.len(), 1);
        assert_eq!(stts.entries[0].count, 100);
        assert_eq!(stts.entries[0].delta, 1024);
        // ctts and stss absent.
        assert!(stbl.composition_time_to_sample().is_none());
        assert!(stbl.sync_samples().is_none());
        // stsz: materialized list.
        let stsz = stbl.sample_size();
        assert_eq!(stsz.size, 0);
        assert_eq!(stsz.count, 100);
        assert_eq!(stsz.entries.len(), 100);
        // stsc per the 0.5 s chunk cap: 22 frames per chunk, short tail.
        let stsc = stbl.sample_to_chunk();
        assert_eq!(stsc.entries.len(), 2);
        assert_eq!(
            (stsc.entries[0].first_chunk, stsc.entries[0].samples_per_chunk),
            (1, 22)
        );
        assert_eq!(
            (stsc.entries[1].first_chunk, stsc.entries[1].samples_per_chunk),
            (5, 12)
        );
        // Consistency: stsz count == sum(stts) == sum(stsc).
        let stco = stbl.chunk_offset();
        assert_eq!(stts.sample_count(), 100);
        assert_eq!(stsc.sample_count(stco.entries.len() as u32), 100);
        assert!(!stco.is_large());
    }

    #[test]
    fn moov_ends_before_mdat_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.mp4");
        let boxes = mux_audio_movie(&path);

        // moov must come strictly before the mdat payload.
        let fourccs: Vec<FourCC> = boxes.iter().map(|b| b.fourcc()).collect();
        let moov_pos = fourccs.iter().position(|f| *f == b"moov").unwrap();
        let mdat_pos = fourccs.iter().position(|f| *f == b"mdat").unwrap();
        assert!(moov_pos < mdat_pos);

        // All chunk offsets must point into the mdat payload.
        let mut offset = 0u64;
        let mut mdat_range = (0u64, 0u64);
        for b in &boxes {
            let size = b.size();
            if b.fourcc() == b"mdat" {
                mdat_range = (offset + 8, offset + size);
            }
            offset += size;
        }
        let moov = first_box!(&boxes, MovieBox).unwrap();
        let stco = moov.tracks()[0].sample_table().chunk_offset();
        for &entry in &stco.entries {
            assert!(entry >= mdat_range.0 && entry < mdat_range.1);
        }
    }

    #[test]
    fn file_round_trips_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.mp4");
        let boxes = mux_audio_movie(&path);

        // Re-serializing the parsed tree must reproduce the file.
        let original = std::fs::read(&path).unwrap();
        let mut membuf = crate::io::Membuf::new();
        crate::mp4box::write_boxes(&mut membuf, &boxes).unwrap();
        assert_eq!(membuf.bytes().len(), original.len());
        assert_eq!(membuf.bytes(), &original[..]);
    }

    #[test]
    fn mdat_switches_to_largesize_form() {
        use std::convert::TryInto;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.mp4");
        let mut mux = Muxer::create(&path, MovieParameters::default()).unwrap();
        mux.ensure_started().unwrap();
        // Pretend we wrote 5 GiB of media.
        mux.mdat_size = 5 * 1024 * 1024 * 1024;
        mux.write_mdat_size().unwrap();
        mux.sink.flush().unwrap();

        let data = std::fs::read(&path).unwrap();
        let placeholder = mux.mdat_placeholder as usize;
        // size == 1, then 'mdat', then the 64-bit largesize.
        assert_eq!(&data[placeholder..placeholder + 4], &[0, 0, 0, 1]);
        assert_eq!(&data[placeholder + 4..placeholder + 8], b"mdat");
        let largesize = u64::from_be_bytes(
            data[placeholder + 8..placeholder + 16].try_into().unwrap(),
        );
        assert_eq!(largesize, 5 * 1024 * 1024 * 1024 + 16);
    }

    #[test]
    fn threegpp_brand_and_audio_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3gp.mp4");
        let params = MovieParameters {
            brands: crate::brand::Brands::threegpp(),
            ..MovieParameters::default()
        };
        let mut mux = Muxer::create(&path, params).unwrap();
        let track_id = mux.create_track(HANDLER_AUDIO);
        // 96 kHz is above the 3GPP limit.
        assert!(mux.add_sample_entry(track_id, &audio_summary(96000, 2)).is_err());
        mux.set_media_parameters(
            track_id,
            MediaParameters {
                timescale: 44100,
                handler_name: "SoundHandler".to_string(),
                ..MediaParameters::default()
            },
        )
        .unwrap();
        mux.add_sample_entry(track_id, &audio_summary(44100, 2)).unwrap();
        mux.append_sample(
            track_id,
            Sample {
                dts: 0,
                cts: 0,
                data: vec![0; 64],
                index: 1,
                prop: SampleProperty::sync(),
            },
        )
        .unwrap();
        mux.flush_pooled_samples(track_id, 1024).unwrap();
        mux.finish(None).unwrap();

        let file = crate::io::Mp4File::open(&path).unwrap();
        let boxes = read_boxes(file).unwrap();
        let ftyp = first_box!(&boxes, FileTypeBox).unwrap();
        assert_eq!(ftyp.major_brand, b"3gp6");
        assert_eq!(ftyp.minor_version, 0);
        for brand in [b"isom", b"mp42", b"3gp6"] {
            assert!(ftyp.compatible_brands.iter().any(|b| b == &brand));
        }
    }

    #[test]
    fn chapter_list_written_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapters.mp4");
        let chapter_path = dir.path().join("chapters.txt");
        std::fs::write(
            &chapter_path,
            "CHAPTER01=00:00:10.500\nCHAPTER01NAME=Intro\nCHAPTER02=01:00:00.000\nCHAPTER02NAME=Too far\n",
        )
        .unwrap();

        let mut mux = Muxer::create(&path, MovieParameters::default()).unwrap();
        let track_id = mux.create_track(HANDLER_AUDIO);
        mux.set_media_parameters(
            track_id,
            MediaParameters {
                timescale: 1000,
                handler_name: "SoundHandler".to_string(),
                ..MediaParameters::default()
            },
        )
        .unwrap();
        mux.add_sample_entry(track_id, &audio_summary(44100, 2)).unwrap();
        // 20 seconds of samples, one per second.
        for i in 0..20u64 {
            mux.append_sample(
                track_id,
                Sample {
                    dts: i * 1000,
                    cts: i * 1000,
                    data: vec![0; 16],
                    index: 1,
                    prop: SampleProperty::sync(),
                },
            )
            .unwrap();
        }
        mux.flush_pooled_samples(track_id, 1000).unwrap();
        mux.set_chapter_list(&chapter_path, false).unwrap();
        mux.finish(None).unwrap();

        let file = crate::io::Mp4File::open(&path).unwrap();
        let boxes = read_boxes(file).unwrap();
        let moov = first_box!(&boxes, MovieBox).unwrap();
        let udta = moov.user_data().unwrap();
        let chpl = first_box!(&udta.boxes, ChapterListBox).unwrap();
        // The second chapter starts past the movie end and is cut off.
        assert_eq!(chpl.chapters.len(), 1);
        assert_eq!(chpl.chapters[0].start_time, 105_000_000);
        assert_eq!(chpl.chapters[0].chapter_name.0, "Intro");
    }

    #[test]
    fn reference_chapter_track() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapref.mp4");
        let chapter_path = dir.path().join("chapters.txt");
        std::fs::write(&chapter_path, "00:00:00.000 One\n00:00:05.000 Two\n").unwrap();

        let mut mux = Muxer::create(&path, MovieParameters::default()).unwrap();
        let track_id = mux.create_track(HANDLER_AUDIO);
        mux.set_media_parameters(
            track_id,
            MediaParameters {
                timescale: 1000,
                handler_name: "SoundHandler".to_string(),
                ..MediaParameters::default()
            },
        )
        .unwrap();
        mux.add_sample_entry(track_id, &audio_summary(44100, 2)).unwrap();
        for i in 0..10u64 {
            mux.append_sample(
                track_id,
                Sample {
                    dts: i * 1000,
                    cts: i * 1000,
                    data: vec![0; 16],
                    index: 1,
                    prop: SampleProperty::sync(),
                },
            )
            .unwrap();
        }
        mux.flush_pooled_samples(track_id, 1000).unwrap();
        let chapter_track_id = mux
            .create_reference_chapter_track(track_id, &chapter_path)
            .unwrap();
        assert_eq!(chapter_track_id, 2);
        mux.finish(None).unwrap();

        let file = crate::io::Mp4File::open(&path).unwrap();
        let boxes = read_boxes(file).unwrap();
        let moov = first_box!(&boxes, MovieBox).unwrap();
        assert_eq!(moov.track_count(), 2);

        // The main track references the chapter track.
        let main = moov.track_by_id(track_id).unwrap();
        let tref = main.track_reference().unwrap();
        assert_eq!(tref.refs.len(), 1);
        assert_eq!(tref.refs[0].ref_type, b"chap");
        assert_eq!(tref.refs[0].track_ids, vec![chapter_track_id]);

        // The chapter track is not enabled and holds one sample per
        // chapter.
        let chap = moov.track_by_id(chapter_track_id).unwrap();
        assert!(!chap.track_header().flags.get_enabled());
        assert_eq!(chap.sample_table().sample_size().count, 2);
    }
}
