use crate::boxes::prelude::*;

def_box! {
    /// 8.6.2 Sync Sample Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Absent when every sample is a sync sample.
    #[derive(Default)]
    SyncSampleBox {
        entries:        ArraySized32<u32>,
    },
    fourcc => b"stss",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// Partial Sync Sample Atom (Apple/QuickTime)
    #[derive(Default)]
    PartialSyncSampleBox {
        entries:        ArraySized32<u32>,
    },
    fourcc => b"stps",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.6.4 Independent and Disposable Samples Box (ISO/IEC 14496-12:2015(E))
    ///
    /// One byte per sample; the sample count is implied by `stsz`.
    #[derive(Default)]
    SampleDependencyBox {
        entries:        Vec<SampleDependencyEntry>,
    },
    fourcc => b"sdtp",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// One byte of sample dependency info, four 2-bit fields.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleDependencyEntry {
    pub is_leading:            u8,
    pub sample_depends_on:     u8,
    pub sample_is_depended_on: u8,
    pub sample_has_redundancy: u8,
}

impl SampleDependencyEntry {
    /// All four fields zero means "no information".
    pub fn is_default(&self) -> bool {
        self.is_leading == 0
            && self.sample_depends_on == 0
            && self.sample_is_depended_on == 0
            && self.sample_has_redundancy == 0
    }
}

impl FromBytes for SampleDependencyEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let b = u8::from_bytes(stream)?;
        Ok(SampleDependencyEntry {
            is_leading: (b >> 6) & 0x3,
            sample_depends_on: (b >> 4) & 0x3,
            sample_is_depended_on: (b >> 2) & 0x3,
            sample_has_redundancy: b & 0x3,
        })
    }
    fn min_size() -> usize {
        1
    }
}

impl ToBytes for SampleDependencyEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let b = ((self.is_leading & 0x3) << 6)
            | ((self.sample_depends_on & 0x3) << 4)
            | ((self.sample_is_depended_on & 0x3) << 2)
            | (self.sample_has_redundancy & 0x3);
        b.to_bytes(stream)
    }
}
