//! Movie fragments: pooling samples per fragment, closing each
//! fragment as a moof + mdat pair, the random-access index (mfra),
//! and the Movie Extends Header placeholder rewrite.
use crate::boxes::*;
use crate::error::{Error, Result};
use crate::muxer::Muxer;
use crate::sample::{Sample, SampleProperty};
use crate::serialize::{BoxBytes, ToBytes, WriteBytes};
use crate::types::*;

/// Fragment bookkeeping of the whole movie.
#[derive(Default)]
pub(crate) struct FragmentManager {
    pub sequence_number: u32,
    /// Set after the first `create_fragment()`; from then on samples
    /// pool into fragments instead of the progressive mdat.
    pub active:          bool,
    /// File position of the mehd placeholder inside the written moov,
    /// 0 when the sink can't seek.
    pub mehd_pos:        u64,
    /// One random-access table per track.
    pub tfra:            Vec<TrackFragmentRandomAccessBox>,
}

impl FragmentManager {
    pub fn in_fragment(&self) -> bool {
        self.active
    }
}

// SampleFlags for a fragment sample, from its properties.
fn fragment_sample_flags(prop: &SampleProperty) -> SampleFlags {
    let dep = prop.dependency_entry();
    let sync = prop.random_access_type.is_sync();
    let mut flags = SampleFlags {
        is_leading: dep.is_leading,
        sample_depends_on: dep.sample_depends_on,
        sample_is_depended_on: dep.sample_is_depended_on,
        sample_has_redundancy: dep.sample_has_redundancy,
        sample_padding_value: 0,
        sample_is_non_sync_sample: !sync,
        sample_degradation_priority: 0,
    };
    if sync && flags.sample_depends_on == 0 {
        flags.sample_depends_on = 2;
    }
    flags
}

// The most frequent value in a list.
fn histogram_mode<T: PartialEq + Clone>(values: &[T]) -> Option<T> {
    let mut best: Option<(usize, &T)> = None;
    for v in values {
        let count = values.iter().filter(|&w| w == v).count();
        if best.map(|(c, _)| count > c).unwrap_or(true) {
            best = Some((count, v));
        }
    }
    best.map(|(_, v)| v.clone())
}

impl Muxer {
    /// Close the fragment in flight (if any) and open a new one. The
    /// first call finalizes and writes the initial movie.
    pub fn create_fragment(&mut self) -> Result<()> {
        if self.fragments.is_none() {
            return Err(Error::param("not a fragmented movie"));
        }
        if !self.fragments.as_ref().unwrap().active {
            self.write_initial_moov()?;
        } else {
            self.close_fragment()?;
        }
        Ok(())
    }

    /// Finalize the initial movie: moov with an mvex (trex defaults
    /// plus the mehd placeholder).
    fn write_initial_moov(&mut self) -> Result<()> {
        self.ensure_started()?;
        for index in 0..self.tracks.len() {
            if let Err(err) = self.flush_chunk(index) {
                log::warn!("flush_pooled_samples failed: {}", err);
            }
        }
        self.write_mdat_size()?;

        let mut moov = self.build_moov()?;

        // mvex: the mehd placeholder goes first so its position is
        // computable, then one trex per track.
        let mut mvex = MovieExtendsBox::default();
        let seekable = self.sink.seekable();
        if seekable {
            // A version 1 mehd is 20 bytes; park a free box there.
            mvex.boxes.push(
                FreeBox {
                    data: Data(vec![0u8; 12]),
                }
                .to_mp4box(),
            );
        }
        for track in &self.tracks {
            let mut trex = TrackExtendsBox::default();
            trex.track_id = track.track_id;
            mvex.boxes.push(trex.to_mp4box());
        }
        let mvex_size = crate::mp4box::box_size(&mvex.clone().to_mp4box());
        moov.boxes.push(mvex.to_mp4box());

        let moov_offset = self.sink.pos();
        let moov_size = crate::mp4box::box_size(&moov.clone().to_mp4box());
        crate::muxer::write_box_buffered(&mut self.sink, &moov.to_mp4box())?;

        let fragments = self.fragments.as_mut().unwrap();
        if seekable {
            // moov ends with mvex; the placeholder is mvex's first child.
            fragments.mehd_pos = moov_offset + moov_size - mvex_size + 8;
        }
        fragments.tfra = self
            .tracks
            .iter()
            .map(|t| TrackFragmentRandomAccessBox {
                track_id: t.track_id,
                entries:  Vec::new(),
            })
            .collect();
        fragments.active = true;
        Ok(())
    }

    /// Pool a sample into the fragment being built.
    pub(crate) fn append_fragment_sample(&mut self, index: usize, sample: Sample) -> Result<()> {
        let track = &mut self.tracks[index];
        if let Some(last) = track.fragment.pool.last() {
            if sample.dts < last.dts {
                return Err(Error::invalid_data(format!(
                    "track {}: dts going backwards in fragment",
                    track.track_id
                )));
            }
        }
        track.fragment.has_samples = true;
        track.fragment.pool.push(sample);
        Ok(())
    }

    /// Serialize the pending fragment as a moof + mdat pair.
    pub(crate) fn close_fragment(&mut self) -> Result<()> {
        if self.tracks.iter().all(|t| t.fragment.pool.is_empty()) {
            return Ok(());
        }
        let sequence_number = self.fragments.as_ref().unwrap().sequence_number + 1;
        let root_size = self.sink.pos();

        let mut moof = MovieFragmentBox::default();
        moof.boxes
            .push(MovieFragmentHeaderBox { sequence_number }.to_mp4box());

        let mut mdat_payload: Vec<u8> = Vec::new();
        let mut tfra_adds: Vec<(usize, TfraEntry)> = Vec::new();
        let mut traf_number = 0u32;

        for (index, track) in self.tracks.iter_mut().enumerate() {
            if !track.fragment.has_samples {
                continue;
            }
            traf_number += 1;
            track.fragment.traf_number = traf_number;
            let pool = &track.fragment.pool;

            // Per-sample values.
            let mut durations: Vec<u32> = Vec::with_capacity(pool.len());
            for i in 0..pool.len() {
                let delta = if i + 1 < pool.len() {
                    (pool[i + 1].dts - pool[i].dts) as u32
                } else if track.fragment.last_duration > 0 {
                    track.fragment.last_duration
                } else if i > 0 {
                    (pool[i].dts - pool[i - 1].dts) as u32
                } else {
                    1
                };
                durations.push(delta);
            }
            let sizes: Vec<u32> = pool.iter().map(|s| s.data.len() as u32).collect();
            let flags: Vec<SampleFlags> =
                pool.iter().map(|s| fragment_sample_flags(&s.prop)).collect();
            let cts_offsets: Vec<i32> = pool
                .iter()
                .map(|s| (s.cts as i64 - s.dts as i64) as i32)
                .collect();

            // Histogram the values; a default is only advertised in the
            // tfhd when the majority differs from the trex default.
            let trex_default = TrackExtendsBox::default();
            let default_duration = histogram_mode(&durations).unwrap_or(0);
            let default_size = histogram_mode(&sizes).unwrap_or(0);
            let default_flags = histogram_mode(&flags).unwrap_or_default();

            let mut tfhd = TrackFragmentHeaderBox::default();
            tfhd.track_id = track.track_id;
            tfhd.base_data_offset = Some(0); // patched below
            if default_duration != trex_default.default_sample_duration {
                tfhd.default_sample_duration = Some(default_duration);
            }
            if default_size != trex_default.default_sample_size {
                tfhd.default_sample_size = Some(default_size);
            }
            if default_flags != trex_default.default_sample_flags {
                tfhd.default_sample_flags = Some(default_flags.clone());
            }
            let eff_duration = tfhd
                .default_sample_duration
                .unwrap_or(trex_default.default_sample_duration);
            let eff_size = tfhd
                .default_sample_size
                .unwrap_or(trex_default.default_sample_size);
            let eff_flags = tfhd
                .default_sample_flags
                .clone()
                .unwrap_or(trex_default.default_sample_flags);

            let mut traf = TrackFragmentBox::default();

            // Which per-sample fields does the run need?
            let need_duration = durations.iter().any(|&d| d != eff_duration);
            let need_size = sizes.iter().any(|&s| s != eff_size);
            let need_cts = cts_offsets.iter().any(|&o| o != 0);
            // Common case: only the first sample (a sync point) differs
            // from the default flags; use first_sample_flags for it.
            let tail_uniform = flags[1..].iter().all(|f| *f == eff_flags);
            let (need_flags, first_sample_flags) = if flags[0] != eff_flags && tail_uniform {
                (false, Some(flags[0].clone()))
            } else {
                (flags.iter().any(|f| *f != eff_flags), None)
            };

            let mut trun = TrackRunBox {
                data_offset: Some(mdat_payload.len() as i32),
                first_sample_flags,
                entries: Vec::with_capacity(pool.len()),
            };
            for i in 0..pool.len() {
                trun.entries.push(TrackRunEntry {
                    sample_duration: if need_duration { Some(durations[i]) } else { None },
                    sample_size: if need_size { Some(sizes[i]) } else { None },
                    sample_flags: if need_flags { Some(flags[i].clone()) } else { None },
                    sample_composition_time_offset: if need_cts {
                        Some(cts_offsets[i])
                    } else {
                        None
                    },
                });
                mdat_payload.extend_from_slice(&pool[i].data);
            }

            // Random access info: the first sample of the fragment, if
            // it is a sync point.
            if pool[0].prop.random_access_type.is_sync() {
                tfra_adds.push((
                    index,
                    TfraEntry {
                        time: pool[0].cts,
                        moof_offset: root_size,
                        traf_number: track.fragment.traf_number,
                        trun_number: 1,
                        sample_number: 1,
                    },
                ));
            }

            let tfdt = TrackFragmentBaseMediaDecodeTimeBox {
                base_media_decode_time: VersionSizedUint(pool[0].dts),
            };

            traf.boxes.push(tfhd.to_mp4box());
            traf.boxes.push(tfdt.to_mp4box());
            traf.boxes.push(trun.to_mp4box());
            moof.boxes.push(traf.to_mp4box());

            // Update the per-track fragment cache.
            let last_duration = *durations.last().unwrap();
            track.fragment.largest_cts = std::cmp::max(
                track.fragment.largest_cts,
                pool.iter().map(|s| s.cts).max().unwrap_or(0),
            );
            track.fragment.last_duration = last_duration;
            track.fragment.fragment_count += 1;
            track.fragment.has_samples = false;
            track.fragment.pool.clear();
            log::debug!(
                "track {}: fragment {} closed",
                track.track_id,
                track.fragment.fragment_count
            );
        }

        // Now that the moof is complete, patch every tfhd's
        // base_data_offset to point at the mdat payload.
        let moof_size = crate::mp4box::box_size(&moof.clone().to_mp4box());
        let base_data_offset = root_size + moof_size + 8;
        for traf in iter_box_mut!(moof, TrackFragmentBox) {
            for tfhd in iter_box_mut!(traf, TrackFragmentHeaderBox) {
                tfhd.base_data_offset = Some(base_data_offset);
            }
        }

        crate::muxer::write_box_buffered(&mut self.sink, &moof.to_mp4box())?;
        let mdat_size = mdat_payload.len() as u64 + 8;
        if mdat_size > u32::MAX as u64 {
            return Err(Error::invalid_data("fragment mdat too large"));
        }
        (mdat_size as u32).to_bytes(&mut self.sink)?;
        FourCC::new(b"mdat").to_bytes(&mut self.sink)?;
        self.sink.write(&mdat_payload)?;

        let fragments = self.fragments.as_mut().unwrap();
        fragments.sequence_number = sequence_number;
        for (index, entry) in tfra_adds {
            fragments.tfra[index].entries.push(entry);
        }
        Ok(())
    }

    /// Finalize a fragmented movie: close the last fragment, append
    /// the mfra index and rewrite the mehd placeholder.
    pub(crate) fn finish_fragmented(mut self) -> Result<()> {
        if !self.fragments.as_ref().unwrap().active {
            self.write_initial_moov()?;
        }
        self.close_fragment()?;

        // mfra with one tfra per track that has entries, plus mfro.
        let fragments = self.fragments.take().unwrap();
        let mut mfra = MovieFragmentRandomAccessBox::default();
        for tfra in fragments.tfra.iter().filter(|t| !t.entries.is_empty()) {
            mfra.boxes.push(tfra.clone().to_mp4box());
        }
        if !mfra.boxes.is_empty() {
            mfra.boxes
                .push(MovieFragmentRandomAccessOffsetBox { length: 0 }.to_mp4box());
            let length = crate::mp4box::box_size(&mfra.clone().to_mp4box()) as u32;
            if let Some(mfro) =
                first_box_mut!(&mut mfra.boxes, MovieFragmentRandomAccessOffsetBox)
            {
                mfro.length = length;
            }
            crate::muxer::write_box_buffered(&mut self.sink, &mfra.to_mp4box())?;
        }

        // Overall fragment duration into the mehd placeholder.
        if fragments.mehd_pos > 0 {
            let movie_timescale = self.params.timescale as u64;
            let mut duration = 0u64;
            for track in &self.tracks {
                let media_end = std::cmp::max(
                    track.fragment.largest_cts + track.fragment.last_duration as u64,
                    track.media_duration(),
                );
                let scaled = media_end * movie_timescale / track.media_timescale.max(1) as u64;
                duration = std::cmp::max(duration, scaled);
            }
            let end = self.sink.pos();
            self.sink.seek(fragments.mehd_pos)?;
            20u32.to_bytes(&mut self.sink)?;
            FourCC::new(b"mehd").to_bytes(&mut self.sink)?;
            1u8.to_bytes(&mut self.sink)?;
            self.sink.write(&[0u8; 3])?;
            duration.to_bytes(&mut self.sink)?;
            self.sink.seek(end)?;
        }

        self.sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::{AudioSummary, CodecSpecific, Summary};
    use crate::mp4box::{read_boxes, BoxInfo};
    use crate::muxer::{MediaParameters, MovieParameters, Muxer};
    use crate::track::HANDLER_AUDIO;
    use pretty_assertions::assert_eq;

    fn summary() -> Summary {
        Summary::Audio(AudioSummary {
            codec: FourCC::new(b"mp4a"),
            frequency: 48000,
            channels: 2,
            sample_size: 16,
            samples_in_frame: 1024,
            max_au_length: 1024,
            specific: vec![CodecSpecific::Binary {
                fourcc: FourCC::new(b"esds"),
                data:   vec![0x03, 0x19, 0x00, 0x01, 0x00],
            }],
        })
    }

    fn sample(i: u64, sync: bool) -> Sample {
        Sample {
            dts: i * 1024,
            cts: i * 1024,
            data: vec![0x55; 128],
            index: 1,
            prop: if sync {
                SampleProperty::sync()
            } else {
                SampleProperty::default()
            },
        }
    }

    // Two fragments with 30 samples each, the first sample of each
    // fragment a sync sample.
    fn mux_two_fragments(path: &std::path::Path) -> Vec<MP4Box> {
        let mut mux = Muxer::create_fragmented(path, MovieParameters::default()).unwrap();
        let track_id = mux.create_track(HANDLER_AUDIO);
        mux.set_media_parameters(
            track_id,
            MediaParameters {
                timescale: 48000,
                handler_name: "SoundHandler".to_string(),
                ..MediaParameters::default()
            },
        )
        .unwrap();
        mux.add_sample_entry(track_id, &summary()).unwrap();

        mux.create_fragment().unwrap();
        for i in 0..30 {
            mux.append_sample(track_id, sample(i, i == 0)).unwrap();
        }
        mux.create_fragment().unwrap();
        for i in 30..60 {
            mux.append_sample(track_id, sample(i, i == 30)).unwrap();
        }
        mux.flush_pooled_samples(track_id, 1024).unwrap();
        mux.finish(None).unwrap();

        let file = crate::io::Mp4File::open(path).unwrap();
        read_boxes(file).unwrap()
    }

    #[test]
    fn fragmented_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frag.mp4");
        let boxes = mux_two_fragments(&path);

        let fourccs: Vec<String> = boxes.iter().map(|b| b.fourcc().to_string()).collect();
        let moov_pos = fourccs.iter().position(|f| f == "moov").unwrap();
        let first_moof = fourccs.iter().position(|f| f == "moof").unwrap();
        assert!(moov_pos < first_moof);
        assert_eq!(fourccs.iter().filter(|f| *f == "moof").count(), 2);
        assert_eq!(fourccs.last().unwrap(), "mfra");

        // moov carries the mvex with a trex for the track and the
        // rewritten mehd.
        let moov = first_box!(&boxes, MovieBox).unwrap();
        let mvex = moov.movie_extends().unwrap();
        let trex = first_box!(&mvex.boxes, TrackExtendsBox).unwrap();
        assert_eq!(trex.track_id, 1);
        let mehd = first_box!(&mvex.boxes, MovieExtendsHeaderBox).unwrap();
        // 60 samples of 1024 ticks at 48 kHz, in movie timescale 600.
        assert_eq!(mehd.fragment_duration.0, 60 * 1024 * 600 / 48000);

        // Sequence numbers and decode times.
        let moofs: Vec<&MovieFragmentBox> = iter_box!(&boxes, MovieFragmentBox).collect();
        assert_eq!(moofs[0].movie_fragment_header().sequence_number, 1);
        assert_eq!(moofs[1].movie_fragment_header().sequence_number, 2);
        let traf = &moofs[1].track_fragments()[0];
        let tfdt = first_box!(&traf.boxes, TrackFragmentBaseMediaDecodeTimeBox).unwrap();
        assert_eq!(tfdt.base_media_decode_time.0, 30 * 1024);
        let trun = &traf.track_runs()[0];
        assert_eq!(trun.entries.len(), 30);
    }

    #[test]
    fn random_access_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mfra.mp4");
        let boxes = mux_two_fragments(&path);

        let mfra = first_box!(&boxes, MovieFragmentRandomAccessBox).unwrap();
        let tfra = first_box!(&mfra.boxes, TrackFragmentRandomAccessBox).unwrap();
        assert_eq!(tfra.track_id, 1);
        assert_eq!(tfra.entries.len(), 2);
        assert_eq!(tfra.length_sizes(), (0, 0, 0));
        assert_eq!(tfra.entries[0].time, 0);
        assert_eq!(tfra.entries[1].time, 30 * 1024);
        assert_eq!(tfra.entries[0].traf_number, 1);
        assert_eq!(tfra.entries[0].trun_number, 1);
        assert_eq!(tfra.entries[0].sample_number, 1);
        // The moof offsets point at the two moof boxes.
        let mut offset = 0u64;
        let mut moof_offsets = Vec::new();
        for b in &boxes {
            if b.fourcc() == b"moof" {
                moof_offsets.push(offset);
            }
            offset += b.size();
        }
        assert_eq!(tfra.entries[0].moof_offset, moof_offsets[0]);
        assert_eq!(tfra.entries[1].moof_offset, moof_offsets[1]);

        // mfro closes the mfra and records its total size.
        let mfro = first_box!(&mfra.boxes, MovieFragmentRandomAccessOffsetBox).unwrap();
        assert_eq!(mfro.length as u64, crate::mp4box::box_size(&mfra.clone().to_mp4box()));
    }

    #[test]
    fn tfhd_defaults_from_histogram() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("defaults.mp4");
        let boxes = mux_two_fragments(&path);

        let moofs: Vec<&MovieFragmentBox> = iter_box!(&boxes, MovieFragmentBox).collect();
        let traf = &moofs[0].track_fragments()[0];
        let tfhd = traf.track_fragment_header();
        // Uniform durations and sizes: advertised as defaults, not
        // repeated per sample.
        assert_eq!(tfhd.default_sample_duration, Some(1024));
        assert_eq!(tfhd.default_sample_size, Some(128));
        assert!(tfhd.base_data_offset.is_some());
        let trun = &traf.track_runs()[0];
        assert!(trun.entries[0].sample_duration.is_none());
        assert!(trun.entries[0].sample_size.is_none());
        // The non-sync majority is the default; the sync first sample
        // is carried in first_sample_flags.
        let default_flags = tfhd.default_sample_flags.as_ref().unwrap();
        assert!(default_flags.sample_is_non_sync_sample);
        let first_flags = trun.first_sample_flags.as_ref().unwrap();
        assert!(!first_flags.sample_is_non_sync_sample);
        assert_eq!(first_flags.sample_depends_on, 2);

        // The run's data offset relative to the base points at the
        // start of the mdat payload.
        assert_eq!(trun.data_offset, Some(0));
    }
}
