use crate::boxes::prelude::*;
use crate::boxes::{MediaHeaderBox, SampleTableBox};

def_box! {
    /// 8.4.1 Media Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MediaBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"mdia",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MediaBox {
    declare_box_methods!(MediaHeaderBox, media_header, media_header_mut);
    declare_box_methods!(HandlerBox, handler, handler_mut);
    declare_box_methods!(MediaInformationBox, media_info, media_info_mut);

    /// Check if this box is valid.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if first_box!(&self.boxes, MediaHeaderBox).is_none() {
            log::error!("MediaBox: no MediaHeaderBox present");
            valid = false;
        }
        if first_box!(&self.boxes, HandlerBox).is_none() {
            log::error!("MediaBox: no HandlerBox present");
            valid = false;
        }
        match first_box!(&self.boxes, MediaInformationBox) {
            Some(m) => {
                if !m.is_valid() {
                    valid = false;
                }
            },
            None => {
                log::error!("MediaBox: no MediaInformationBox present");
                valid = false;
            },
        }
        valid
    }
}

def_box! {
    /// 8.4.3 Handler Reference Box (ISO/IEC 14496-12:2015(E))
    ///
    /// `component_type` is QTFF: 'mhlr' in mdia, 'dhlr' in minf;
    /// zero for plain ISO files.
    #[derive(Default)]
    HandlerBox {
        component_type: FourCC,
        handler_type:   FourCC,
        skip:           12,
        name:           ZString,
    },
    fourcc => b"hdlr",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.4.4 Media Information Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MediaInformationBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"minf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MediaInformationBox {
    declare_box_methods!(SampleTableBox, sample_table, sample_table_mut);
    declare_box_methods_opt!(DataInformationBox, data_information, data_information_mut);

    /// Check if this box is valid.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        match first_box!(&self.boxes, DataInformationBox) {
            Some(dinf) => match first_box!(&dinf.boxes, DataReferenceBox) {
                Some(dref) => {
                    if dref.entries.is_empty() {
                        log::error!("DataReferenceBox: no entries");
                        valid = false;
                    }
                },
                None => {
                    log::error!("DataInformationBox: no DataReferenceBox present");
                    valid = false;
                },
            },
            None => {
                log::error!("MediaInformationBox: no DataInformationBox present");
                valid = false;
            },
        }
        match first_box!(&self.boxes, SampleTableBox) {
            Some(stbl) => {
                if !stbl.is_valid() {
                    valid = false;
                }
            },
            None => {
                log::error!("MediaInformationBox: no SampleTableBox present");
                valid = false;
            },
        }
        valid
    }
}

def_box! {
    /// 8.7.1 Data Information Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    DataInformationBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"dinf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl DataInformationBox {
    /// A dinf with a dref with one self-contained url entry, which is
    /// what a muxed file always has.
    pub fn self_contained() -> DataInformationBox {
        let url = DataEntryUrlBox::self_contained();
        let mut dref = DataReferenceBox::default();
        dref.entries.push(url.to_mp4box());
        DataInformationBox {
            boxes: vec![dref.to_mp4box()],
        }
    }
}

def_box! {
    /// 8.7.2 Data Reference Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    DataReferenceBox {
        entries:    ArraySized32<MP4Box>,
    },
    fourcc => b"dref",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// 8.7.2 Data Entry Url Box (ISO/IEC 14496-12:2015(E))
///
/// Flag bit 0 means "media data is in the same file"; in that case
/// there is no location string at all.
#[derive(Clone, Debug, Default)]
pub struct DataEntryUrlBox {
    pub flags:    u32,
    pub location: ZString,
}

impl DataEntryUrlBox {
    pub fn self_contained() -> DataEntryUrlBox {
        DataEntryUrlBox {
            flags:    0x000001,
            location: ZString::default(),
        }
    }
}

impl FromBytes for DataEntryUrlBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<DataEntryUrlBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let flags = stream.flags();
        let location = if flags & 1 == 0 {
            ZString::from_bytes(stream)?
        } else {
            ZString::default()
        };
        Ok(DataEntryUrlBox { flags, location })
    }
    fn min_size() -> usize {
        12
    }
}

impl ToBytes for DataEntryUrlBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        if self.flags & 1 == 0 {
            self.location.to_bytes(&mut writer)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for DataEntryUrlBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"url ")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for DataEntryUrlBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        self.flags
    }
}
