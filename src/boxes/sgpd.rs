use crate::boxes::prelude::*;

/// Grouping types we know how to describe.
pub const GROUPING_TYPE_RAP: FourCC = FourCC::new(b"rap ");
pub const GROUPING_TYPE_ROLL: FourCC = FourCC::new(b"roll");

/// 8.9.3 Sample Group Description Box (ISO/IEC 14496-12:2015(E))
///
/// Always written as version 1, with a default_length per grouping
/// type ('rap ' entries are 1 byte, 'roll' entries 2 bytes).
#[derive(Clone, Debug)]
pub struct SampleGroupDescriptionBox {
    pub grouping_type: FourCC,
    pub entries:       Vec<SampleGroupEntry>,
}

impl SampleGroupDescriptionBox {
    pub fn new(grouping_type: FourCC) -> SampleGroupDescriptionBox {
        SampleGroupDescriptionBox {
            grouping_type,
            entries: Vec::new(),
        }
    }

    fn default_length(&self) -> u32 {
        match &self.grouping_type.to_be_bytes() {
            b"rap " => 1,
            b"roll" => 2,
            _ => 0,
        }
    }

    /// Find a byte-identical description, or append the candidate.
    /// Returns the 1-based description index either way.
    pub fn find_or_insert(&mut self, entry: SampleGroupEntry) -> u32 {
        for (i, e) in self.entries.iter().enumerate() {
            if *e == entry {
                return (i + 1) as u32;
            }
        }
        self.entries.push(entry);
        self.entries.len() as u32
    }
}

/// A single sample group description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleGroupEntry {
    Rap(VisualRandomAccessEntry),
    Roll(RollRecoveryEntry),
    Unknown(Vec<u8>),
}

/// 10.4 'rap ' Visual random access entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisualRandomAccessEntry {
    pub num_leading_samples_known: bool,
    pub num_leading_samples:       u8,
}

/// 10.1 'roll' Roll recovery entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RollRecoveryEntry {
    pub roll_distance: i16,
}

impl FromBytes for SampleGroupDescriptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleGroupDescriptionBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let grouping_type = FourCC::from_bytes(stream)?;
        let default_length = if stream.version() >= 1 {
            u32::from_bytes(stream)?
        } else {
            0
        };
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        for _ in 0..count {
            let entry = match &grouping_type.to_be_bytes() {
                b"rap " => {
                    let b = u8::from_bytes(stream)?;
                    SampleGroupEntry::Rap(VisualRandomAccessEntry {
                        num_leading_samples_known: (b & 0x80) != 0,
                        num_leading_samples: b & 0x7f,
                    })
                },
                b"roll" => SampleGroupEntry::Roll(RollRecoveryEntry {
                    roll_distance: i16::from_bytes(stream)?,
                }),
                _ => {
                    let data = stream.read(default_length as u64)?.to_vec();
                    SampleGroupEntry::Unknown(data)
                },
            };
            entries.push(entry);
        }
        Ok(SampleGroupDescriptionBox {
            grouping_type,
            entries,
        })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for SampleGroupDescriptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        self.grouping_type.to_bytes(stream)?;
        self.default_length().to_bytes(stream)?;
        (self.entries.len() as u32).to_bytes(stream)?;
        for entry in &self.entries {
            match entry {
                SampleGroupEntry::Rap(rap) => {
                    let b = ((rap.num_leading_samples_known as u8) << 7)
                        | (rap.num_leading_samples & 0x7f);
                    b.to_bytes(stream)?;
                },
                SampleGroupEntry::Roll(roll) => roll.roll_distance.to_bytes(stream)?,
                SampleGroupEntry::Unknown(data) => stream.write(data)?,
            }
        }
        writer.finalize()
    }
}

impl BoxInfo for SampleGroupDescriptionBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"sgpd")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(2)
    }
}

impl FullBox for SampleGroupDescriptionBox {
    fn version(&self) -> Option<u8> {
        Some(1)
    }
}

def_box! {
    /// 8.9.2 Sample to Group Box (ISO/IEC 14496-12:2015(E))
    SampleToGroupBox {
        grouping_type:  FourCC,
        entries:        ArraySized32<SampleToGroupEntry>,
    },
    fourcc => b"sbgp",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_struct! {
    /// Entry in SampleToGroupBox.
    #[derive(Copy, PartialEq, Eq)]
    SampleToGroupEntry,
        sample_count:               u32,
        group_description_index:    u32,
}

impl SampleToGroupBox {
    pub fn new(grouping_type: FourCC) -> SampleToGroupBox {
        SampleToGroupBox {
            grouping_type,
            entries: ArraySized32::new(),
        }
    }

    /// Total number of samples covered by the assignments.
    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| e.sample_count as u64).sum()
    }

    /// Append an assignment run, merging with the previous run when it
    /// points at the same description.
    pub fn add_assignment(&mut self, sample_count: u32, group_description_index: u32) {
        if let Some(last) = self.entries.last_mut() {
            if last.group_description_index == group_description_index {
                last.sample_count += sample_count;
                return;
            }
        }
        self.entries.push(SampleToGroupEntry {
            sample_count,
            group_description_index,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_deduplicate() {
        let mut sgpd = SampleGroupDescriptionBox::new(GROUPING_TYPE_ROLL);
        let a = sgpd.find_or_insert(SampleGroupEntry::Roll(RollRecoveryEntry {
            roll_distance: -2,
        }));
        let b = sgpd.find_or_insert(SampleGroupEntry::Roll(RollRecoveryEntry {
            roll_distance: -2,
        }));
        let c = sgpd.find_or_insert(SampleGroupEntry::Roll(RollRecoveryEntry {
            roll_distance: 3,
        }));
        assert_eq!((a, b, c), (1, 1, 2));
        assert_eq!(sgpd.entries.len(), 2);
    }

    #[test]
    fn assignments_merge() {
        let mut sbgp = SampleToGroupBox::new(GROUPING_TYPE_RAP);
        sbgp.add_assignment(3, 0);
        sbgp.add_assignment(2, 0);
        sbgp.add_assignment(1, 1);
        assert_eq!(sbgp.entries.len(), 2);
        assert_eq!(sbgp.sample_count(), 6);
    }
}
