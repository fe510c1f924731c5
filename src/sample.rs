//! Samples and their properties, as handed to the muxer by importers.
use crate::boxes::SampleDependencyEntry;

/// How (and whether) decoding can start at a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomAccessType {
    /// Not a random access point.
    None,
    /// A plain sync sample.
    Sync,
    /// QTFF partial sync (e.g. an open GOP I-frame).
    PartialSync,
    /// Closed RAP: no leading samples can follow.
    ClosedRap,
    /// Open RAP: undecodable leading samples may follow.
    OpenRap,
    /// RAP of unknown openness.
    UnknownRap,
    /// Recovery starts here, completes `post_roll` samples later.
    PostRoll,
}

impl RandomAccessType {
    /// Does this sample go into the sync sample table?
    pub fn is_sync(&self) -> bool {
        matches!(
            self,
            RandomAccessType::Sync
                | RandomAccessType::ClosedRap
                | RandomAccessType::OpenRap
                | RandomAccessType::UnknownRap
        )
    }

    /// Is this a visual random access point ('rap ' grouping)?
    pub fn is_rap(&self) -> bool {
        self.is_sync() || *self == RandomAccessType::PartialSync
    }
}

impl Default for RandomAccessType {
    fn default() -> RandomAccessType {
        RandomAccessType::None
    }
}

/// Leading status of a sample relative to the preceding RAP.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeadingType {
    Unknown,
    NotLeading,
    UndecodableLeading,
    DecodableLeading,
}

impl LeadingType {
    pub fn is_leading(&self) -> bool {
        matches!(
            self,
            LeadingType::UndecodableLeading | LeadingType::DecodableLeading
        )
    }
}

impl Default for LeadingType {
    fn default() -> LeadingType {
        LeadingType::Unknown
    }
}

/// Per-sample metadata. `None` in the tri-state fields means "unknown".
#[derive(Clone, Debug, Default)]
pub struct SampleProperty {
    pub random_access_type: RandomAccessType,
    pub leading:            LeadingType,
    pub independent:        Option<bool>,
    pub disposable:         Option<bool>,
    pub redundant:          Option<bool>,
    /// An earlier presentation time is allowed (QTFF).
    pub allow_earlier:      bool,
    /// 'roll' pre-roll: number of samples needed before this one.
    pub pre_roll_distance:  u32,
    /// 'roll' post-roll: identifier of the recovery this sample starts.
    pub post_roll_identifier: u32,
    /// 'roll' post-roll: identifier of the recovery this sample completes.
    pub post_roll_complete: u32,
}

impl SampleProperty {
    /// A sync sample with no other metadata.
    pub fn sync() -> SampleProperty {
        SampleProperty {
            random_access_type: RandomAccessType::Sync,
            ..SampleProperty::default()
        }
    }

    /// The 2-bit fields of the `sdtp` entry for this sample.
    pub fn dependency_entry(&self) -> SampleDependencyEntry {
        fn tri(v: Option<bool>, yes: u8, no: u8) -> u8 {
            match v {
                Some(true) => yes,
                Some(false) => no,
                None => 0,
            }
        }
        SampleDependencyEntry {
            is_leading: match self.leading {
                LeadingType::Unknown => 0,
                LeadingType::UndecodableLeading => 1,
                LeadingType::NotLeading => 2,
                LeadingType::DecodableLeading => 3,
            },
            // sample_depends_on: 1 = depends on others, 2 = independent.
            sample_depends_on: tri(self.independent, 2, 1),
            // sample_is_depended_on: 1 = others depend on it, 2 = disposable.
            sample_is_depended_on: tri(self.disposable, 2, 1),
            // sample_has_redundancy: 1 = redundant coding, 2 = none.
            sample_has_redundancy: tri(self.redundant, 1, 2),
        }
    }
}

/// A media sample: payload plus timing and properties.
///
/// `index` is the 1-based sample description index this sample was
/// encoded against.
#[derive(Clone, Debug, Default)]
pub struct Sample {
    pub dts:   u64,
    pub cts:   u64,
    pub data:  Vec<u8>,
    pub index: u32,
    pub prop:  SampleProperty,
}

impl Sample {
    /// Create a sample with an allocated payload buffer.
    pub fn new(length: usize) -> Sample {
        Sample {
            dts: 0,
            cts: 0,
            data: vec![0; length],
            index: 1,
            prop: SampleProperty::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_entry_mapping() {
        let mut prop = SampleProperty::default();
        assert!(prop.dependency_entry().is_default());

        prop.independent = Some(true);
        prop.disposable = Some(true);
        prop.redundant = Some(false);
        prop.leading = LeadingType::NotLeading;
        let e = prop.dependency_entry();
        assert_eq!(e.sample_depends_on, 2);
        assert_eq!(e.sample_is_depended_on, 2);
        assert_eq!(e.sample_has_redundancy, 2);
        assert_eq!(e.is_leading, 2);
    }
}
