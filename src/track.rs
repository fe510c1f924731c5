//! Muxer-side per-track state.
//!
//! A `Track` owns the sample tables being built, the chunk pool, the
//! timestamp caches and the sample-group engines. The finished
//! `TrackBox` is assembled from all of that when the movie finalizes.
use std::io;

use crate::boxes::*;
use crate::brand::Compatibility;
use crate::groups::{RapEngine, RollEngine};
use crate::sample::{RandomAccessType, Sample};
use crate::types::*;

const DEFAULT_LAST_DELTA: u32 = 1;

/// Handler types.
pub const HANDLER_VIDEO: FourCC = FourCC::new(b"vide");
pub const HANDLER_AUDIO: FourCC = FourCC::new(b"soun");
pub const HANDLER_HINT: FourCC = FourCC::new(b"hint");
pub const HANDLER_TEXT: FourCC = FourCC::new(b"text");

/// The pool of samples belonging to the chunk currently being filled.
#[derive(Default)]
pub(crate) struct ChunkPool {
    /// Number of chunks already closed.
    pub chunk_number: u32,
    /// DTS of the first pooled sample.
    pub first_dts:    u64,
    /// Sample description the pooled samples belong to.
    pub sdi:          u32,
    pub data:         Vec<u8>,
    pub samples:      u32,
}

/// Per-track movie-fragment cache.
#[derive(Default)]
pub(crate) struct FragmentCache {
    pub fragment_count: u32,
    pub last_duration:  u32,
    pub largest_cts:    u64,
    pub has_samples:    bool,
    pub traf_number:    u32,
    /// Samples pooled for the fragment being built.
    pub pool:           Vec<Sample>,
}

pub(crate) struct Track {
    pub track_id: u32,
    pub handler:  FourCC,
    pub handler_name: String,

    // Header-level configuration.
    pub tkhd: TrackHeaderBox,
    pub media_timescale: u32,
    pub language: IsoLanguageCode,
    pub aperture: Option<(f64, f64)>,
    pub edits: Option<EditListBox>,
    pub trefs: Option<TrackReferenceBox>,

    // Sample tables under construction.
    pub stsd: SampleDescriptionBox,
    pub stts: TimeToSampleBox,
    pub ctts: Option<CompositionOffsetBox>,
    pub stsc: SampleToChunkBox,
    pub stsz: SampleSizeBox,
    pub stco: ChunkOffsetBox,
    sync_samples: Vec<u32>,
    partial_sync_samples: Vec<u32>,
    sdtp: Vec<SampleDependencyEntry>,
    sdtp_nondefault: bool,

    // Sample group engines.
    pub rap: Option<RapEngine>,
    pub roll: Option<RollEngine>,

    // Timestamp caches.
    pub sample_count: u32,
    pub last_dts: u64,
    pub min_cts: u64,
    pub max_cts: u64,
    max2_cts: u64,
    pub last_delta: u32,
    pub explicit_last_delta: Option<u32>,
    pub ctd_shift: u32,
    all_sync: bool,

    // Chunk scheduling.
    pub chunk: ChunkPool,

    // Fragmented mode.
    pub fragment: FragmentCache,
}

impl Track {
    pub fn new(track_id: u32, handler: FourCC) -> Track {
        let mut tkhd = TrackHeaderBox::default();
        tkhd.track_id = track_id;
        Track {
            track_id,
            handler,
            handler_name: String::new(),
            tkhd,
            media_timescale: 600,
            language: IsoLanguageCode::default(),
            aperture: None,
            edits: None,
            trefs: None,
            stsd: SampleDescriptionBox::default(),
            stts: TimeToSampleBox::default(),
            ctts: None,
            stsc: SampleToChunkBox::default(),
            stsz: SampleSizeBox::default(),
            stco: ChunkOffsetBox::default(),
            sync_samples: Vec::new(),
            partial_sync_samples: Vec::new(),
            sdtp: Vec::new(),
            sdtp_nondefault: false,
            rap: None,
            roll: None,
            sample_count: 0,
            last_dts: 0,
            min_cts: u64::MAX,
            max_cts: 0,
            max2_cts: 0,
            last_delta: 0,
            explicit_last_delta: None,
            ctd_shift: 0,
            all_sync: true,
            chunk: ChunkPool::default(),
            fragment: FragmentCache::default(),
        }
    }

    /// Look up a sample entry by 1-based index.
    pub fn sample_entry(&self, index: u32) -> Option<&SampleEntry> {
        let index = (index as usize).checked_sub(1)?;
        (*self.stsd.entries).get(index)
    }

    /// Media duration in the media timescale, per the cached extremes:
    /// `max_cts - min_cts + last_delta`.
    pub fn media_duration(&self) -> u64 {
        if self.sample_count == 0 {
            return 0;
        }
        let last_delta = self.effective_last_delta() as u64;
        if self.min_cts == u64::MAX {
            return last_delta;
        }
        self.max_cts - self.min_cts + last_delta
    }

    /// The delta of the final sample: explicit if given, else the
    /// difference between the two largest composition times, else the
    /// previous decode delta.
    pub fn effective_last_delta(&self) -> u32 {
        if let Some(delta) = self.explicit_last_delta {
            return delta;
        }
        if self.max_cts > self.max2_cts && self.max2_cts > 0 {
            return (self.max_cts - self.max2_cts) as u32;
        }
        if self.last_delta > 0 {
            self.last_delta
        } else {
            DEFAULT_LAST_DELTA
        }
    }

    //
    // The sample-table compactor: called once per appended sample,
    // before the sample is pooled. All stbl invariants hold again when
    // this returns.
    //
    pub fn update_sample_tables(&mut self, sample: &Sample, signed_cts: bool) -> io::Result<()> {
        let number = self.sample_count + 1;

        // S1: stsz.
        if sample.data.len() > u32::MAX as usize {
            return Err(ioerr!(InvalidData, "sample too large"));
        }
        self.stsz.push(sample.data.len() as u32);

        // S2: stts. The first sample contributes nothing; its delta
        // materializes when the next sample (or the finalizer) shows up.
        if self.sample_count > 0 {
            if sample.dts < self.last_dts {
                return Err(ioerr!(
                    InvalidData,
                    "track {}: dts going backwards ({} < {})",
                    self.track_id,
                    sample.dts,
                    self.last_dts
                ));
            }
            let delta = (sample.dts - self.last_dts) as u32;
            self.push_stts_delta(delta);
            self.last_delta = delta;
        }

        // S3: ctts.
        self.update_composition_offset(sample.dts, sample.cts, signed_cts)?;

        // S6/S7: sync and partial sync tables. A partial sync sample
        // is not a full sync sample; it goes to stps only.
        match sample.prop.random_access_type {
            RandomAccessType::None | RandomAccessType::PostRoll => self.all_sync = false,
            RandomAccessType::PartialSync => {
                self.partial_sync_samples.push(number);
                self.all_sync = false;
            },
            _ => self.sync_samples.push(number),
        }

        // sdtp.
        let dep = sample.prop.dependency_entry();
        if !dep.is_default() {
            self.sdtp_nondefault = true;
        }
        self.sdtp.push(dep);

        // Sample groups.
        if let Some(rap) = self.rap.as_mut() {
            rap.add_sample(&sample.prop);
        }
        if let Some(roll) = self.roll.as_mut() {
            roll.add_sample(&sample.prop);
        }

        // Timestamp caches.
        self.last_dts = sample.dts;
        self.min_cts = std::cmp::min(self.min_cts, sample.cts);
        if sample.cts > self.max_cts {
            self.max2_cts = self.max_cts;
            self.max_cts = sample.cts;
        } else if sample.cts > self.max2_cts {
            self.max2_cts = sample.cts;
        }
        self.sample_count = number;
        Ok(())
    }

    fn push_stts_delta(&mut self, delta: u32) {
        if let Some(last) = self.stts.entries.last_mut() {
            if last.delta == delta {
                last.count += 1;
                return;
            }
        }
        self.stts.entries.push(TimeToSampleEntry { count: 1, delta });
    }

    fn update_composition_offset(&mut self, dts: u64, cts: u64, signed: bool) -> io::Result<()> {
        let raw_offset = cts as i64 - dts as i64;
        if self.ctts.is_none() {
            if raw_offset == 0 {
                return Ok(());
            }
            // First divergence: materialize with a 0-offset run for
            // all prior samples.
            let mut ctts = CompositionOffsetBox::default();
            if self.sample_count > 0 {
                ctts.entries.push(CompositionOffsetEntry {
                    count:  self.sample_count,
                    offset: 0,
                });
            }
            self.ctts = Some(ctts);
        }

        let mut offset = raw_offset + self.ctd_shift as i64;
        if offset < 0 {
            if !signed {
                // Unsigned offsets only: shift the whole composition
                // timeline up so this offset becomes zero.
                let extra = (-offset) as u32;
                let ctts = self.ctts.as_mut().unwrap();
                for entry in ctts.entries.iter_mut() {
                    entry.offset = entry
                        .offset
                        .checked_add(extra as i32)
                        .ok_or_else(|| ioerr!(InvalidData, "composition offset overflow"))?;
                }
                self.ctd_shift += extra;
                offset = 0;
            } else if offset < i32::MIN as i64 {
                return Err(ioerr!(InvalidData, "composition offset out of range"));
            }
        }
        if offset > i32::MAX as i64 {
            return Err(ioerr!(InvalidData, "composition offset out of range"));
        }

        let offset = offset as i32;
        let ctts = self.ctts.as_mut().unwrap();
        if let Some(last) = ctts.entries.last_mut() {
            if last.offset == offset {
                last.count += 1;
                return Ok(());
            }
        }
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset });
        Ok(())
    }

    /// Record the delta of the very last sample (spec: the sum of all
    /// stts runs must equal the media duration).
    pub fn add_last_sample_delta(&mut self, delta: u32) {
        if self.sample_count == 0 {
            return;
        }
        self.push_stts_delta(delta);
    }

    /// Replace the delta that was recorded for the last sample.
    pub fn update_last_sample_delta(&mut self, delta: u32) {
        let entries = &mut self.stts.entries;
        if let Some(last) = entries.last_mut() {
            if last.delta == delta {
                return;
            }
            if last.count == 1 {
                // Shrink the run to zero and reuse or replace.
                entries.pop();
                if let Some(prev) = entries.last_mut() {
                    if prev.delta == delta {
                        prev.count += 1;
                        return;
                    }
                }
            } else {
                last.count -= 1;
            }
        }
        self.stts.entries.push(TimeToSampleEntry { count: 1, delta });
    }

    //
    // Chunk/pool decisions (the scheduler state; the muxer drives it
    // because flushing needs the byte sink).
    //

    /// Should the current chunk be closed before pooling this sample?
    pub fn wants_new_chunk(
        &self,
        sample: &Sample,
        max_chunk_duration: f64,
        max_chunk_size: u64,
    ) -> bool {
        if self.chunk.samples == 0 {
            return false;
        }
        let elapsed = (sample.dts.saturating_sub(self.chunk.first_dts)) as f64
            / self.media_timescale as f64;
        elapsed > max_chunk_duration
            || (self.chunk.data.len() as u64 + sample.data.len() as u64) > max_chunk_size
            || sample.index != self.chunk.sdi
    }

    /// First DTS of the chunk in progress, in seconds.
    pub fn chunk_start_seconds(&self) -> Option<f64> {
        if self.chunk.samples == 0 {
            None
        } else {
            Some(self.chunk.first_dts as f64 / self.media_timescale as f64)
        }
    }

    //
    // Finalization.
    //

    /// Close the sample tables: final stts delta, stss omission rule,
    /// cslg, group commits. Returns the finished sample table box.
    pub fn finish_sample_tables(&mut self, compat: &Compatibility) -> SampleTableBox {
        // Final stts entry for the last sample.
        let last_delta = self.effective_last_delta();
        if self.explicit_last_delta.is_none() {
            self.add_last_sample_delta(last_delta);
        }

        let mut boxes: Vec<MP4Box> = Vec::new();
        boxes.push(std::mem::take(&mut self.stsd).to_mp4box());
        boxes.push(std::mem::take(&mut self.stts).to_mp4box());

        if let Some(ctts) = self.ctts.take() {
            // cslg: only when all four derived fields fit an i32.
            if let Some(cslg) = self.derive_cslg(&ctts, last_delta) {
                boxes.push(ctts.to_mp4box());
                boxes.push(cslg.to_mp4box());
            } else {
                boxes.push(ctts.to_mp4box());
            }
        }

        // S6: no stss when every sample is sync.
        if !self.all_sync {
            let mut stss = SyncSampleBox::default();
            for &number in &self.sync_samples {
                stss.entries.push(number);
            }
            boxes.push(stss.to_mp4box());
        }
        if compat.qt_compatible && !self.partial_sync_samples.is_empty() {
            let mut stps = PartialSyncSampleBox::default();
            for &number in &self.partial_sync_samples {
                stps.entries.push(number);
            }
            boxes.push(stps.to_mp4box());
        }
        if self.sdtp_nondefault {
            boxes.push(
                SampleDependencyBox {
                    entries: std::mem::take(&mut self.sdtp),
                }
                .to_mp4box(),
            );
        }

        boxes.push(std::mem::take(&mut self.stsc).to_mp4box());
        boxes.push(std::mem::take(&mut self.stsz).to_mp4box());
        boxes.push(std::mem::take(&mut self.stco).to_mp4box());

        // sgpd[] then sbgp[].
        let mut sgpds = Vec::new();
        let mut sbgps = Vec::new();
        if let Some(rap) = self.rap.take() {
            if let Some((sgpd, sbgp)) = rap.finish() {
                sgpds.push(sgpd);
                sbgps.push(sbgp);
            }
        }
        if let Some(roll) = self.roll.take() {
            if let Some((sgpd, sbgp)) = roll.finish() {
                sgpds.push(sgpd);
                sbgps.push(sbgp);
            }
        }
        for sgpd in sgpds {
            boxes.push(sgpd.to_mp4box());
        }
        for sbgp in sbgps {
            boxes.push(sbgp.to_mp4box());
        }

        SampleTableBox { boxes }
    }

    fn derive_cslg(
        &self,
        ctts: &CompositionOffsetBox,
        last_delta: u32,
    ) -> Option<CompositionToDecodeBox> {
        let mut least = i64::MAX;
        let mut greatest = i64::MIN;
        for entry in ctts.entries.iter() {
            let raw = entry.offset as i64 - self.ctd_shift as i64;
            least = std::cmp::min(least, raw);
            greatest = std::cmp::max(greatest, raw);
        }
        let shift = self.ctd_shift as i64;
        let start = self.min_cts as i64;
        let end = self.max_cts as i64 + last_delta as i64;
        let fits = |v: i64| v >= i32::MIN as i64 && v <= i32::MAX as i64;
        if !(fits(shift) && fits(least) && fits(greatest) && fits(start) && fits(end)) {
            return None;
        }
        Some(CompositionToDecodeBox {
            composition_to_dts_shift: shift as i32,
            least_decode_to_display_delta: least as i32,
            greatest_decode_to_display_delta: greatest as i32,
            composition_start_time: start as i32,
            composition_end_time: end as i32,
        })
    }

    /// Walk stts + stsz against the media timescale, producing
    /// (decoding buffer size, max bitrate, average bitrate) in
    /// bytes / bits-per-second.
    pub fn calc_bitrate(&self) -> (u32, u32, u32) {
        let mut bufsize = 0u32;
        let mut maxrate = 0u32;
        let mut rate = 0u64;
        let mut window = 0u64;
        let timescale = self.media_timescale as u64;
        let mut total_bytes = 0u64;

        let mut deltas = self.stts.iter();
        for number in 1..=self.sample_count {
            let size = self.stsz.sample_size(number);
            let delta = deltas.next().unwrap_or(self.last_delta) as u64;
            bufsize = std::cmp::max(bufsize, size);
            total_bytes += size as u64;
            rate += size as u64 * 8;
            window += delta;
            if window >= timescale {
                maxrate = std::cmp::max(maxrate, rate as u32);
                rate = 0;
                window = 0;
            }
        }
        maxrate = std::cmp::max(maxrate, rate as u32);

        let duration = self.stts.total_duration();
        let avgrate = if duration > 0 {
            (total_bytes * 8 * timescale / duration) as u32
        } else {
            0
        };
        (bufsize, maxrate, avgrate)
    }

    /// Update bitrate info in the sample entries from the tables.
    pub fn update_bitrate_info(&mut self) {
        if self.sample_count == 0 {
            return;
        }
        let (bufsize, maxrate, avgrate) = self.calc_bitrate();
        for entry in self.stsd.entries.iter_mut() {
            if let SampleEntry::Visual(visual) = entry {
                if let Some(btrt) = first_box_mut!(&mut visual.extensions, BtrtBox) {
                    btrt.decoding_buffer_size = bufsize;
                    btrt.max_bitrate = maxrate;
                    btrt.avg_bitrate = avgrate;
                }
            }
        }
    }

    /// Build the finished TrackBox.
    pub fn build_trak(&mut self, compat: &Compatibility, movie_timescale: u32) -> TrackBox {
        let media_duration = self.media_duration();
        let track_duration =
            media_duration * movie_timescale as u64 / self.media_timescale as u64;

        // If presentation is reordered and the caller didn't install an
        // explicit timeline map, add one that maps the whole track.
        if self.edits.is_none() && self.ctts.is_some() {
            let media_time = if self.min_cts == u64::MAX {
                0
            } else {
                self.min_cts as i64
            };
            let mut elst = EditListBox::default();
            elst.entries.push(EditListEntry {
                segment_duration: track_duration,
                media_time,
                media_rate_integer: 1,
                media_rate_fraction: 0,
            });
            self.edits = Some(elst);
        }

        let mut tkhd = self.tkhd.clone();
        tkhd.duration = Duration_(track_duration);

        let mut trak_boxes: Vec<MP4Box> = Vec::new();
        trak_boxes.push(tkhd.to_mp4box());

        if let Some((width, height)) = self.aperture {
            let tapt = TrackApertureModeDimensionsBox {
                boxes: vec![
                    CleanApertureDimensionsBox {
                        width:  FixedFloat16_16::from_f64(width),
                        height: FixedFloat16_16::from_f64(height),
                    }
                    .to_mp4box(),
                    ProductionApertureDimensionsBox {
                        width:  FixedFloat16_16::from_f64(width),
                        height: FixedFloat16_16::from_f64(height),
                    }
                    .to_mp4box(),
                    EncodedPixelsDimensionsBox {
                        width:  FixedFloat16_16::from_f64(width),
                        height: FixedFloat16_16::from_f64(height),
                    }
                    .to_mp4box(),
                ],
            };
            trak_boxes.push(tapt.to_mp4box());
        }

        if let Some(elst) = self.edits.take() {
            let edts = EditBox {
                boxes: vec![elst.to_mp4box()],
            };
            trak_boxes.push(edts.to_mp4box());
        }

        if let Some(tref) = self.trefs.take() {
            trak_boxes.push(tref.to_mp4box());
        }

        // Media box.
        let mdhd = MediaHeaderBox {
            cr_time: Time::default(),
            mod_time: Time::default(),
            timescale: self.media_timescale,
            duration: Duration_(media_duration),
            language: self.language,
            quality: 0,
        };
        let hdlr = HandlerBox {
            component_type: if compat.qt_compatible {
                FourCC::new(b"mhlr")
            } else {
                FourCC::default()
            },
            handler_type: self.handler,
            name: ZString(self.handler_name.clone()),
        };

        let mut minf_boxes: Vec<MP4Box> = Vec::new();
        minf_boxes.push(self.media_type_header());
        if compat.qt_compatible {
            minf_boxes.push(
                HandlerBox {
                    component_type: FourCC::new(b"dhlr"),
                    handler_type: FourCC::new(b"url "),
                    name: ZString::default(),
                }
                .to_mp4box(),
            );
        }
        minf_boxes.push(DataInformationBox::self_contained().to_mp4box());
        minf_boxes.push(self.finish_sample_tables(compat).to_mp4box());

        let mdia = MediaBox {
            boxes: vec![
                mdhd.to_mp4box(),
                hdlr.to_mp4box(),
                MediaInformationBox { boxes: minf_boxes }.to_mp4box(),
            ],
        };
        trak_boxes.push(mdia.to_mp4box());

        TrackBox { boxes: trak_boxes }
    }

    fn media_type_header(&self) -> MP4Box {
        match &self.handler.to_be_bytes() {
            b"vide" => VideoMediaHeaderBox::default().to_mp4box(),
            b"soun" => SoundMediaHeaderBox::default().to_mp4box(),
            b"hint" => HintMediaHeaderBox::default().to_mp4box(),
            b"text" => BaseMediaInformationHeaderBox {
                boxes: vec![BaseMediaInformationBox::default().to_mp4box()],
            }
            .to_mp4box(),
            _ => NullMediaHeaderBox::default().to_mp4box(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleProperty;
    use pretty_assertions::assert_eq;

    fn sample(dts: u64, cts: u64, len: usize, sync: bool) -> Sample {
        Sample {
            dts,
            cts,
            data: vec![0u8; len],
            index: 1,
            prop: if sync {
                SampleProperty::sync()
            } else {
                SampleProperty::default()
            },
        }
    }

    #[test]
    fn stts_runs_merge() {
        let mut track = Track::new(1, HANDLER_AUDIO);
        track.media_timescale = 44100;
        for i in 0..100 {
            track
                .update_sample_tables(&sample(i * 1024, i * 1024, 200, true), false)
                .unwrap();
        }
        track.add_last_sample_delta(1024);
        // one run of (100, 1024): 99 deltas plus the final one.
        assert_eq!(track.stts.entries.len(), 1);
        assert_eq!(track.stts.entries[0].count, 100);
        assert_eq!(track.stts.entries[0].delta, 1024);
        assert_eq!(track.media_duration(), 102400);
        // all sync: no ctts, stss omitted at finish.
        assert!(track.ctts.is_none());
    }

    #[test]
    fn ctts_materializes_on_divergence() {
        let mut track = Track::new(1, HANDLER_VIDEO);
        track.update_sample_tables(&sample(0, 0, 10, true), true).unwrap();
        track.update_sample_tables(&sample(1, 1, 10, false), true).unwrap();
        track.update_sample_tables(&sample(2, 4, 10, false), true).unwrap();
        let ctts = track.ctts.as_ref().unwrap();
        // two zero-offset samples, then offset 2.
        assert_eq!(ctts.entries.len(), 2);
        assert_eq!(ctts.entries[0].count, 2);
        assert_eq!(ctts.entries[0].offset, 0);
        assert_eq!(ctts.entries[1].offset, 2);
    }

    #[test]
    fn negative_offset_shifts_when_unsigned() {
        let mut track = Track::new(1, HANDLER_VIDEO);
        track.update_sample_tables(&sample(0, 1, 10, true), false).unwrap();
        track.update_sample_tables(&sample(1, 0, 10, false), false).unwrap();
        // cts 0 at dts 1 implies offset -1; with unsigned ctts the
        // whole timeline shifts up by one instead.
        assert_eq!(track.ctd_shift, 1);
        let ctts = track.ctts.as_ref().unwrap();
        assert!(ctts.entries.iter().all(|e| e.offset >= 0));
    }

    #[test]
    fn negative_offset_signed_allowed() {
        let mut track = Track::new(1, HANDLER_VIDEO);
        track.update_sample_tables(&sample(0, 1, 10, true), true).unwrap();
        track.update_sample_tables(&sample(1, 0, 10, false), true).unwrap();
        assert_eq!(track.ctd_shift, 0);
        let ctts = track.ctts.as_ref().unwrap();
        assert_eq!(ctts.entries[1].offset, -1);
        use crate::mp4box::FullBox;
        assert_eq!(ctts.version(), Some(1));
    }

    #[test]
    fn update_last_sample_delta_shrinks_single_run() {
        let mut track = Track::new(1, HANDLER_AUDIO);
        for i in 0..3 {
            track
                .update_sample_tables(&sample(i * 100, i * 100, 10, true), false)
                .unwrap();
        }
        // deltas so far: (2, 100). Appending delta 50 then fixing it
        // up to 100 must merge back into one run.
        track.add_last_sample_delta(50);
        assert_eq!(track.stts.entries.len(), 2);
        track.update_last_sample_delta(100);
        assert_eq!(track.stts.entries.len(), 1);
        assert_eq!(track.stts.entries[0].count, 3);
    }

    #[test]
    fn stss_omitted_when_all_sync() {
        let mut track = Track::new(1, HANDLER_AUDIO);
        for i in 0..5 {
            track
                .update_sample_tables(&sample(i, i, 10, true), false)
                .unwrap();
        }
        let stbl = track.finish_sample_tables(&Compatibility::default());
        assert!(first_box!(&stbl.boxes, SyncSampleBox).is_none());
    }

    #[test]
    fn stss_present_with_non_sync() {
        let mut track = Track::new(1, HANDLER_VIDEO);
        for i in 0..5 {
            track
                .update_sample_tables(&sample(i, i, 10, i % 2 == 0), false)
                .unwrap();
        }
        let stbl = track.finish_sample_tables(&Compatibility::default());
        let stss = first_box!(&stbl.boxes, SyncSampleBox).unwrap();
        assert_eq!(&stss.entries[..], &[1, 3, 5]);
    }
}
