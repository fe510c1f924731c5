//! Sample grouping: builds `sgpd` description / `sbgp` assignment pairs
//! for the 'rap ' (visual random access) and 'roll' (recovery point)
//! grouping types while samples stream in.
//!
//! Descriptions are deduplicated on commit, and consecutive assignment
//! runs that point at the same description are merged.
use crate::boxes::{
    RollRecoveryEntry, SampleGroupDescriptionBox, SampleGroupEntry, SampleToGroupBox,
    VisualRandomAccessEntry, GROUPING_TYPE_RAP, GROUPING_TYPE_ROLL,
};
use crate::sample::{RandomAccessType, SampleProperty};

// Description index of an assignment run whose description is not
// known yet.
const PENDING: u32 = u32::MAX;

// Raw assignment runs. Merging happens when the runs are built into
// the SampleToGroupBox, after all pending descriptions are resolved.
#[derive(Default)]
struct Runs(Vec<(u32, u32)>);

impl Runs {
    fn add(&mut self, index: u32) {
        if index != PENDING {
            if let Some(last) = self.0.last_mut() {
                if last.1 == index {
                    last.0 += 1;
                    return;
                }
            }
        }
        self.0.push((1, index));
    }

    // Add a run whose description is resolved later; returns its position.
    fn add_pending(&mut self) -> usize {
        self.0.push((1, PENDING));
        self.0.len() - 1
    }

    fn build(
        self,
        sgpd: SampleGroupDescriptionBox,
    ) -> Option<(SampleGroupDescriptionBox, SampleToGroupBox)> {
        if sgpd.entries.is_empty() {
            return None;
        }
        let mut sbgp = SampleToGroupBox::new(sgpd.grouping_type);
        for (count, index) in self.0 {
            debug_assert!(index != PENDING);
            let index = if index == PENDING { 0 } else { index };
            sbgp.add_assignment(count, index);
        }
        Some((sgpd, sbgp))
    }
}

struct OpenRap {
    run_index: usize,
    desc:      VisualRandomAccessEntry,
}

/// Incremental 'rap ' grouping (ISO version 6 and up).
pub(crate) struct RapEngine {
    sgpd: SampleGroupDescriptionBox,
    runs: Runs,
    open: Option<OpenRap>,
}

impl RapEngine {
    pub fn new() -> RapEngine {
        RapEngine {
            sgpd: SampleGroupDescriptionBox::new(GROUPING_TYPE_RAP),
            runs: Runs::default(),
            open: None,
        }
    }

    fn commit(&mut self, mut open: OpenRap) {
        open.desc.num_leading_samples_known = true;
        let index = self.sgpd.find_or_insert(SampleGroupEntry::Rap(open.desc));
        self.runs.0[open.run_index].1 = index;
    }

    pub fn add_sample(&mut self, prop: &SampleProperty) {
        let ra = prop.random_access_type;
        if ra.is_rap() {
            if let Some(open) = self.open.take() {
                self.commit(open);
            }
            let run_index = self.runs.add_pending();
            let open = OpenRap {
                run_index,
                desc: VisualRandomAccessEntry::default(),
            };
            if matches!(ra, RandomAccessType::Sync | RandomAccessType::ClosedRap) {
                // Closed RAP: no leading samples can follow.
                self.commit(open);
            } else {
                self.open = Some(open);
            }
            return;
        }
        if let Some(open) = self.open.as_mut() {
            if prop.leading.is_leading() {
                if open.desc.num_leading_samples < 0x7f {
                    open.desc.num_leading_samples += 1;
                }
            } else {
                // First non-leading sample freezes the count.
                let open = self.open.take().unwrap();
                self.commit(open);
            }
        }
        self.runs.add(0);
    }

    pub fn finish(mut self) -> Option<(SampleGroupDescriptionBox, SampleToGroupBox)> {
        if let Some(open) = self.open.take() {
            self.commit(open);
        }
        self.runs.build(self.sgpd)
    }
}

struct PendingRoll {
    run_index:    usize,
    first_sample: u32,
    identifier:   u32,
}

/// Incremental 'roll' grouping (audio pre-roll and video recovery
/// points).
///
/// Pre-roll groups are described immediately. A post-roll group stays
/// undescribed until a sample arrives whose `post_roll_complete`
/// matches the recovery identifier; the roll distance is the sample
/// distance between the two.
pub(crate) struct RollEngine {
    sgpd:          SampleGroupDescriptionBox,
    runs:          Runs,
    pending:       Vec<PendingRoll>,
    sample_number: u32,
}

impl RollEngine {
    pub fn new() -> RollEngine {
        RollEngine {
            sgpd: SampleGroupDescriptionBox::new(GROUPING_TYPE_ROLL),
            runs: Runs::default(),
            pending: Vec::new(),
            sample_number: 0,
        }
    }

    pub fn add_sample(&mut self, prop: &SampleProperty) {
        self.sample_number += 1;

        // A sample may complete an earlier recovery.
        if prop.post_roll_complete != 0 {
            if let Some(pos) = self
                .pending
                .iter()
                .position(|p| p.identifier == prop.post_roll_complete)
            {
                let pending = self.pending.remove(pos);
                let distance = (self.sample_number - pending.first_sample) as i16;
                let index = self.sgpd.find_or_insert(SampleGroupEntry::Roll(
                    RollRecoveryEntry {
                        roll_distance: distance,
                    },
                ));
                self.runs.0[pending.run_index].1 = index;
            }
        }

        if prop.pre_roll_distance > 0 {
            let distance = -(std::cmp::min(prop.pre_roll_distance, i16::MAX as u32) as i16);
            let index = self.sgpd.find_or_insert(SampleGroupEntry::Roll(
                RollRecoveryEntry {
                    roll_distance: distance,
                },
            ));
            self.runs.add(index);
        } else if prop.random_access_type == RandomAccessType::PostRoll {
            let run_index = self.runs.add_pending();
            self.pending.push(PendingRoll {
                run_index,
                first_sample: self.sample_number,
                identifier: prop.post_roll_identifier,
            });
        } else {
            self.runs.add(0);
        }
    }

    pub fn finish(mut self) -> Option<(SampleGroupDescriptionBox, SampleToGroupBox)> {
        for pending in self.pending.drain(..) {
            // Recovery never completed; drop the group.
            log::warn!(
                "roll group at sample {} never completed, dropping",
                pending.first_sample
            );
            self.runs.0[pending.run_index].1 = 0;
        }
        self.runs.build(self.sgpd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::LeadingType;

    fn prop(ra: RandomAccessType) -> SampleProperty {
        SampleProperty {
            random_access_type: ra,
            ..SampleProperty::default()
        }
    }

    #[test]
    fn rap_leading_count() {
        let mut engine = RapEngine::new();
        // open rap followed by two leading samples, then regular ones.
        engine.add_sample(&prop(RandomAccessType::OpenRap));
        let mut leading = prop(RandomAccessType::None);
        leading.leading = LeadingType::UndecodableLeading;
        engine.add_sample(&leading);
        engine.add_sample(&leading);
        engine.add_sample(&prop(RandomAccessType::None));
        engine.add_sample(&prop(RandomAccessType::None));
        let (sgpd, sbgp) = engine.finish().unwrap();
        assert_eq!(sgpd.entries.len(), 1);
        match &sgpd.entries[0] {
            SampleGroupEntry::Rap(rap) => {
                assert!(rap.num_leading_samples_known);
                assert_eq!(rap.num_leading_samples, 2);
            },
            other => panic!("unexpected entry {:?}", other),
        }
        // runs: [rap sample -> desc 1] [4 samples -> 0]
        assert_eq!(sbgp.entries.len(), 2);
        assert_eq!(sbgp.entries[0].sample_count, 1);
        assert_eq!(sbgp.entries[0].group_description_index, 1);
        assert_eq!(sbgp.entries[1].sample_count, 4);
        assert_eq!(sbgp.sample_count(), 5);
    }

    #[test]
    fn identical_rap_descriptions_share_index() {
        let mut engine = RapEngine::new();
        for _ in 0..3 {
            engine.add_sample(&prop(RandomAccessType::ClosedRap));
            engine.add_sample(&prop(RandomAccessType::None));
        }
        let (sgpd, sbgp) = engine.finish().unwrap();
        assert_eq!(sgpd.entries.len(), 1);
        // assignment runs alternate between description 1 and no-group.
        assert_eq!(sbgp.entries.len(), 6);
    }

    #[test]
    fn post_roll_distance() {
        let mut engine = RollEngine::new();
        let mut recovery = prop(RandomAccessType::PostRoll);
        recovery.post_roll_identifier = 7;
        engine.add_sample(&recovery);

        engine.add_sample(&prop(RandomAccessType::None));
        engine.add_sample(&prop(RandomAccessType::None));

        let mut complete = prop(RandomAccessType::None);
        complete.post_roll_complete = 7;
        engine.add_sample(&complete);

        let (sgpd, sbgp) = engine.finish().unwrap();
        match &sgpd.entries[0] {
            SampleGroupEntry::Roll(roll) => assert_eq!(roll.roll_distance, 3),
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(sbgp.sample_count(), 4);
    }

    #[test]
    fn pre_roll_described_immediately() {
        let mut engine = RollEngine::new();
        let mut pre = prop(RandomAccessType::Sync);
        pre.pre_roll_distance = 2;
        engine.add_sample(&pre);
        engine.add_sample(&pre);
        let (sgpd, sbgp) = engine.finish().unwrap();
        assert_eq!(sgpd.entries.len(), 1);
        match &sgpd.entries[0] {
            SampleGroupEntry::Roll(roll) => assert_eq!(roll.roll_distance, -2),
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(sbgp.entries.len(), 1);
        assert_eq!(sbgp.entries[0].sample_count, 2);
    }
}
