use crate::boxes::prelude::*;
use crate::boxes::{
    ChunkLargeOffsetBox, ChunkOffsetBox, CompositionOffsetBox, CompositionToDecodeBox,
    PartialSyncSampleBox, SampleDependencyBox, SampleDescriptionBox, SampleSizeBox,
    SampleToChunkBox, SyncSampleBox, TimeToSampleBox,
};

def_box! {
    /// 8.1.1 Sample Table Box (ISO/IEC 14496-12:2015(E))
    ///
    /// It usually contains:
    ///
    /// - SampleDescriptionBox, stsd
    /// - TimeToSampleBox, stts
    /// - SampleSizeBox, stsz
    /// - SampleToChunkBox, stsc
    /// - ChunkOffsetBox, stco, or ChunkLargeOffsetBox, co64
    ///
    /// Optionally:
    ///
    /// - CompositionOffsetBox, ctts
    /// - CompositionToDecodeBox, cslg
    /// - SyncSampleBox, stss
    /// - PartialSyncSampleBox, stps (QTFF)
    /// - SampleDependencyBox, sdtp
    /// - SampleGroupDescriptionBox, sgpd + SampleToGroupBox, sbgp
    #[derive(Default)]
    SampleTableBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"stbl",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl SampleTableBox {
    declare_box_methods!(SampleDescriptionBox, sample_description, sample_description_mut);
    declare_box_methods!(SampleSizeBox, sample_size, sample_size_mut);
    declare_box_methods!(TimeToSampleBox, time_to_sample, time_to_sample_mut);
    declare_box_methods!(SampleToChunkBox, sample_to_chunk, sample_to_chunk_mut);
    declare_box_methods_opt!(CompositionOffsetBox, composition_time_to_sample, composition_time_to_sample_mut);
    declare_box_methods_opt!(CompositionToDecodeBox, composition_to_decode, composition_to_decode_mut);
    declare_box_methods_opt!(SyncSampleBox, sync_samples, sync_samples_mut);
    declare_box_methods_opt!(PartialSyncSampleBox, partial_sync_samples, partial_sync_samples_mut);
    declare_box_methods_opt!(SampleDependencyBox, sample_dependencies, sample_dependencies_mut);

    /// Get a reference to the ChunkOffsetBox (stco or co64).
    pub fn chunk_offset(&self) -> &ChunkOffsetBox {
        first_box!(&self.boxes, ChunkOffsetBox)
            .or_else(|| first_box!(&self.boxes, ChunkLargeOffsetBox))
            .unwrap()
    }

    /// Get a mutable reference to the ChunkOffsetBox (stco or co64).
    pub fn chunk_offset_mut(&mut self) -> &mut ChunkOffsetBox {
        for box_ in &mut self.boxes {
            match box_ {
                &mut MP4Box::ChunkOffsetBox(ref mut stco) => return stco,
                &mut MP4Box::ChunkLargeOffsetBox(ref mut co64) => return co64,
                _ => {},
            }
        }
        unreachable!()
    }

    /// Check if this SampleTableBox is valid (has stsd, stts, stsz, stsc, stco).
    pub fn is_valid(&self) -> bool {
        let mut valid = true;

        match first_box!(&self.boxes, SampleDescriptionBox) {
            Some(stsd) => {
                if stsd.entries.is_empty() {
                    log::error!("SampleTableBox: SampleDescriptionBox: no entries");
                    valid = false;
                }
            },
            None => {
                log::error!("SampleTableBox: no SampleDescriptionBox present");
                valid = false;
            },
        }
        if first_box!(&self.boxes, TimeToSampleBox).is_none() {
            log::error!("SampleTableBox: no TimeToSampleBox present");
            valid = false;
        }
        if first_box!(&self.boxes, SampleToChunkBox).is_none() {
            log::error!("SampleTableBox: no SampleToChunkBox present");
            valid = false;
        }
        if first_box!(&self.boxes, SampleSizeBox).is_none() {
            log::error!("SampleTableBox: no SampleSizeBox present");
            valid = false;
        }
        if first_box!(&self.boxes, ChunkOffsetBox).is_none()
            && first_box!(&self.boxes, ChunkLargeOffsetBox).is_none()
        {
            log::error!("SampleTableBox: no ChunkOffsetBox present");
            valid = false;
        }

        valid
    }
}
