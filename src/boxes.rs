//! All the boxes we know.
//!
//! This module does not only contain boxes, but also the types that are
//! used in the boxes, and helper types like iterators.
//!
use std::fmt::Debug;
use std::io;

pub(crate) mod chpl;
pub(crate) mod ctts;
pub(crate) mod mdat;
pub(crate) mod mdia;
pub(crate) mod mfra;
pub(crate) mod misc;
pub(crate) mod moof;
pub(crate) mod moov;
pub(crate) mod prelude;
pub(crate) mod sgpd;
pub(crate) mod stbl;
pub(crate) mod stco;
pub(crate) mod stsc;
pub(crate) mod stsd;
pub(crate) mod stss;
pub(crate) mod stsz;
pub(crate) mod stts;
pub(crate) mod trak;

pub use self::chpl::*;
pub use self::ctts::*;
pub use self::mdat::*;
pub use self::mdia::*;
pub use self::mfra::*;
pub use self::misc::*;
pub use self::moof::*;
pub use self::moov::*;
pub use self::sgpd::*;
pub use self::stbl::*;
pub use self::stco::*;
pub use self::stsc::*;
pub use self::stsd::*;
pub use self::stss::*;
pub use self::stsz::*;
pub use self::stts::*;
pub use self::trak::*;

use self::prelude::*;

use crate::mp4box::{BoxHeader, GenericBox};

def_boxes! {
    FileTypeBox, b"ftyp";
    MovieBox, b"moov";
    MovieHeaderBox, b"mvhd";
    InitialObjectDescriptionBox, b"iods";
    TrackBox, b"trak";
    TrackHeaderBox, b"tkhd";
    TrackApertureModeDimensionsBox, b"tapt";
    CleanApertureDimensionsBox, b"clef";
    ProductionApertureDimensionsBox, b"prof";
    EncodedPixelsDimensionsBox, b"enof";
    EditBox, b"edts";
    EditListBox, b"elst";
    TrackReferenceBox, b"tref";

    MediaBox, b"mdia";
    MediaHeaderBox, b"mdhd";
    HandlerBox, b"hdlr";
    MediaInformationBox, b"minf";
    VideoMediaHeaderBox, b"vmhd";
    SoundMediaHeaderBox, b"smhd";
    HintMediaHeaderBox, b"hmhd";
    NullMediaHeaderBox, b"nmhd";
    BaseMediaInformationHeaderBox, b"gmhd";
    BaseMediaInformationBox, b"gmin";
    DataInformationBox, b"dinf";
    DataReferenceBox, b"dref";
    DataEntryUrlBox, b"url ";

    SampleTableBox, b"stbl";
    SampleDescriptionBox, b"stsd";
    TimeToSampleBox, b"stts";
    CompositionOffsetBox, b"ctts";
    CompositionToDecodeBox, b"cslg";
    SyncSampleBox, b"stss";
    PartialSyncSampleBox, b"stps";
    SampleDependencyBox, b"sdtp";
    SampleToChunkBox, b"stsc";
    SampleSizeBox, b"stsz";
    ChunkOffsetBox, b"stco";
    ChunkLargeOffsetBox, b"co64";
    SampleGroupDescriptionBox, b"sgpd";
    SampleToGroupBox, b"sbgp";

    UserDataBox, b"udta";
    CopyrightBox, b"cprt";
    ChapterListBox, b"chpl";
    MetaBox, b"meta";

    MovieExtendsBox, b"mvex";
    MovieExtendsHeaderBox, b"mehd";
    TrackExtendsBox, b"trex";
    MovieFragmentBox, b"moof";
    MovieFragmentHeaderBox, b"mfhd";
    TrackFragmentBox, b"traf";
    TrackFragmentHeaderBox, b"tfhd";
    TrackFragmentBaseMediaDecodeTimeBox, b"tfdt";
    TrackRunBox, b"trun";
    MovieFragmentRandomAccessBox, b"mfra";
    TrackFragmentRandomAccessBox, b"tfra";
    MovieFragmentRandomAccessOffsetBox, b"mfro";

    MediaDataBox, b"mdat";
    FreeBox, b"free";

    WaveBox, b"wave";
    FormatBox, b"frma";
    EndianBox, b"enda";
    ChannelLayoutBox, b"chan";
    TerminatorBox, b"\0\0\0\0";
    BtrtBox, b"btrt";
    PixelAspectRatioBox, b"pasp";
    CleanApertureBox, b"clap";
    ColorParameterBox, b"colr";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Membuf;
    use crate::mp4box::FullBox;
    use crate::serialize::{FromBytes, ToBytes};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn marshal(b: &MP4Box) -> Vec<u8> {
        let mut buf = Membuf::new();
        b.to_bytes(&mut buf).unwrap();
        buf.into_vec()
    }

    #[test_case(
        FileTypeBox {
            major_brand: FourCC::new(b"mp42"),
            minor_version: 1,
            compatible_brands: vec![FourCC::new(b"isom"), FourCC::new(b"mp42")],
        }.to_mp4box(),
        &[
            0x00, 0x00, 0x00, 0x18, // size
            b'f', b't', b'y', b'p', // type
            b'm', b'p', b'4', b'2', // major brand
            0x00, 0x00, 0x00, 0x01, // minor version
            b'i', b's', b'o', b'm', // compatible brand
            b'm', b'p', b'4', b'2', // compatible brand
        ]; "ftyp"
    )]
    #[test_case(
        BtrtBox {
            decoding_buffer_size: 0x1234_5678,
            max_bitrate: 0x3456_789a,
            avg_bitrate: 0x5678_9abc,
        }.to_mp4box(),
        &[
            0x00, 0x00, 0x00, 0x14, // size
            b'b', b't', b'r', b't', // type
            0x12, 0x34, 0x56, 0x78, // decoding buffer size
            0x34, 0x56, 0x78, 0x9a, // max bitrate
            0x56, 0x78, 0x9a, 0xbc, // avg bitrate
        ]; "btrt"
    )]
    #[test_case(
        {
            let mut stts = TimeToSampleBox::default();
            stts.entries.push(TimeToSampleEntry { count: 100, delta: 1024 });
            stts.to_mp4box()
        },
        &[
            0x00, 0x00, 0x00, 0x18, // size
            b's', b't', b't', b's', // type
            0x00, 0x00, 0x00, 0x00, // version/flags
            0x00, 0x00, 0x00, 0x01, // entry count
            0x00, 0x00, 0x00, 0x64, // sample count
            0x00, 0x00, 0x04, 0x00, // sample delta
        ]; "stts"
    )]
    #[test_case(
        {
            let mut sgpd = SampleGroupDescriptionBox::new(GROUPING_TYPE_ROLL);
            sgpd.find_or_insert(SampleGroupEntry::Roll(RollRecoveryEntry { roll_distance: -1 }));
            sgpd.to_mp4box()
        },
        &[
            0x00, 0x00, 0x00, 0x1a, // size
            b's', b'g', b'p', b'd', // type
            0x01, 0x00, 0x00, 0x00, // version 1, flags
            b'r', b'o', b'l', b'l', // grouping type
            0x00, 0x00, 0x00, 0x02, // default length
            0x00, 0x00, 0x00, 0x01, // entry count
            0xff, 0xff,             // roll distance -1
        ]; "sgpd roll"
    )]
    #[test_case(
        {
            let mut sbgp = SampleToGroupBox::new(GROUPING_TYPE_RAP);
            sbgp.add_assignment(1, 1);
            sbgp.add_assignment(4, 0);
            sbgp.to_mp4box()
        },
        &[
            0x00, 0x00, 0x00, 0x24, // size
            b's', b'b', b'g', b'p', // type
            0x00, 0x00, 0x00, 0x00, // version/flags
            b'r', b'a', b'p', b' ', // grouping type
            0x00, 0x00, 0x00, 0x02, // entry count
            0x00, 0x00, 0x00, 0x01, // sample count
            0x00, 0x00, 0x00, 0x01, // group description index
            0x00, 0x00, 0x00, 0x04, // sample count
            0x00, 0x00, 0x00, 0x00, // no group
        ]; "sbgp"
    )]
    fn box_marshal(mp4box: MP4Box, expect: &[u8]) {
        assert_eq!(marshal(&mp4box), expect);
    }

    #[test]
    fn mvhd_version_promotion() {
        let mut mvhd = MovieHeaderBox::default();
        mvhd.duration = Duration_(u32::MAX as u64 + 1);
        assert_eq!(mvhd.version(), Some(1));
        let bytes = marshal(&mvhd.clone().to_mp4box());
        // version 1 mvhd: 120 bytes total, 12 more than version 0.
        assert_eq!(bytes.len(), 8 + 4 + 108);
        assert_eq!(bytes[8], 1);

        let mut buf = Membuf::from_vec(bytes);
        let parsed = MP4Box::from_bytes(&mut buf).unwrap();
        match parsed {
            MP4Box::MovieHeaderBox(parsed) => {
                assert_eq!(parsed.duration.0, u32::MAX as u64 + 1)
            },
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn elst_version_promotion() {
        let mut elst = EditListBox::default();
        elst.entries.push(EditListEntry {
            segment_duration: 1000,
            media_time: -1,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        assert_eq!(elst.version(), Some(0));
        elst.entries.push(EditListEntry {
            segment_duration: u32::MAX as u64 + 1,
            media_time: 0,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        assert_eq!(elst.version(), Some(1));

        let bytes = marshal(&elst.clone().to_mp4box());
        let mut buf = Membuf::from_vec(bytes);
        match MP4Box::from_bytes(&mut buf).unwrap() {
            MP4Box::EditListBox(parsed) => {
                assert_eq!(parsed.entries.len(), 2);
                assert_eq!(parsed.entries[0].media_time, -1);
                assert_eq!(parsed.entries[1].segment_duration, u32::MAX as u64 + 1);
            },
            other => panic!("parsed {:?}", other),
        }
    }

    #[test]
    fn unknown_box_is_generic() {
        let data = vec![
            0x00, 0x00, 0x00, 0x0c, // size
            b'x', b'y', b'z', b'w', // unknown type
            0xde, 0xad, 0xbe, 0xef,
        ];
        let mut buf = Membuf::from_vec(data.clone());
        let parsed = MP4Box::from_bytes(&mut buf).unwrap();
        assert_eq!(parsed.fourcc().to_string(), "xyzw");
        assert_eq!(marshal(&parsed), data);
    }

    #[test]
    fn wave_wrapper_terminates() {
        let mut wave = WaveBox::default();
        wave.boxes.push(
            FormatBox {
                data_format: FourCC::new(b"sowt"),
            }
            .to_mp4box(),
        );
        wave.boxes.push(TerminatorBox::default().to_mp4box());
        let bytes = marshal(&wave.clone().to_mp4box());
        // terminator atom: 8 bytes, type 0.
        assert_eq!(&bytes[bytes.len() - 8..], &[0, 0, 0, 8, 0, 0, 0, 0]);
    }
}
