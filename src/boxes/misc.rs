use crate::boxes::prelude::*;

def_box! {
    /// 4.3 File Type Box (ISO/IEC 14496-12:2015(E))
    FileTypeBox {
        major_brand:        FourCC,
        minor_version:      u32,
        compatible_brands:  Vec<FourCC>,
    },
    fourcc => b"ftyp",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.2.2 Movie Header Box (ISO/IEC 14496-12:2015(E))
    MovieHeaderBox {
        cr_time:    Time,
        mod_time:   Time,
        timescale:  u32,
        duration:   Duration_,
        pref_rate:  FixedFloat16_16,
        pref_vol:   FixedFloat8_8,
        skip:       10,
        matrix:     Matrix,
        preview_time:       u32,
        preview_duration:   u32,
        poster_time:        u32,
        selection_time:     u32,
        selection_duration: u32,
        current_time:       u32,
        next_track_id:      u32,
    },
    fourcc => b"mvhd",
    version => [1, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for MovieHeaderBox {
    fn default() -> MovieHeaderBox {
        MovieHeaderBox {
            cr_time: Time::default(),
            mod_time: Time::default(),
            timescale: 600,
            duration: Duration_::default(),
            pref_rate: FixedFloat16_16::from_f64(1.0),
            pref_vol: FixedFloat8_8::from_f64(1.0),
            matrix: Matrix::unity(),
            preview_time: 0,
            preview_duration: 0,
            poster_time: 0,
            selection_time: 0,
            selection_duration: 0,
            current_time: 0,
            next_track_id: 1,
        }
    }
}

def_box! {
    /// Initial Object Descriptor (MP4 version 1 only).
    InitialObjectDescriptionBox {
        descriptor: Data,
    },
    fourcc => b"iods",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl InitialObjectDescriptionBox {
    /// Build the MP4_IOD with the given profile-level indications.
    /// `0xff` means "no capability required".
    pub fn new(audio_profile: u8, visual_profile: u8) -> InitialObjectDescriptionBox {
        let descriptor = vec![
            0x10, // MP4_IOD_Tag
            0x07, // size
            0x00, 0x4f, // ObjectDescriptorID 1, no URL, no inline profiles
            0xff, // OD profile
            0xff, // scene profile
            audio_profile,
            visual_profile,
            0xff, // graphics profile
        ];
        InitialObjectDescriptionBox {
            descriptor: Data(descriptor),
        }
    }
}

def_box! {
    /// 8.4.2 Media Header Box (ISO/IEC 14496-12:2015(E))
    MediaHeaderBox {
        cr_time:    Time,
        mod_time:   Time,
        timescale:  u32,
        duration:   Duration_,
        language:   IsoLanguageCode,
        quality:    u16,
    },
    fourcc => b"mdhd",
    version => [1, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for MediaHeaderBox {
    fn default() -> MediaHeaderBox {
        MediaHeaderBox {
            cr_time: Time::default(),
            mod_time: Time::default(),
            timescale: 600,
            duration: Duration_::default(),
            language: IsoLanguageCode::default(),
            quality: 0,
        }
    }
}

def_box! {
    /// 12.1.2 Video Media Header Box (ISO/IEC 14496-12:2015(E))
    ///
    /// The flags field is always 1.
    VideoMediaHeaderBox {
        flags:          Flags,
        graphics_mode:  u16,
        opcolor_red:    u16,
        opcolor_green:  u16,
        opcolor_blue:   u16,
    },
    fourcc => b"vmhd",
    version => [0, flags],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for VideoMediaHeaderBox {
    fn default() -> VideoMediaHeaderBox {
        VideoMediaHeaderBox {
            flags: Flags(1),
            graphics_mode: 0,
            opcolor_red: 0,
            opcolor_green: 0,
            opcolor_blue: 0,
        }
    }
}

def_box! {
    /// 12.2.2 Sound Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SoundMediaHeaderBox {
        balance:    u16,
        skip:       2,
    },
    fourcc => b"smhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 12.4.2 Hint Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    HintMediaHeaderBox {
        max_pdu_size: u16,
        avg_pdu_size: u16,
        max_bitrate:  u32,
        avg_bitrate:  u32,
        skip:         4,
    },
    fourcc => b"hmhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.4.5.2 Null Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    NullMediaHeaderBox {
    },
    fourcc => b"nmhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// Base Media Information Header Atom (Apple/QuickTime)
    #[derive(Default)]
    BaseMediaInformationHeaderBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"gmhd",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Base Media Info Atom (Apple/QuickTime)
    #[derive(Default)]
    BaseMediaInformationBox {
        graphics_mode:  u16,
        opcolor_red:    u16,
        opcolor_green:  u16,
        opcolor_blue:   u16,
        balance:        u16,
        skip:           2,
    },
    fourcc => b"gmin",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.10.1 User Data Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    UserDataBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"udta",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.10.2 Copyright Box (ISO/IEC 14496-12:2015(E))
    CopyrightBox {
        language:   IsoLanguageCode,
        notice:     ZString,
    },
    fourcc => b"cprt",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.11.1 Meta Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MetaBox {
        boxes:  Vec<MP4Box>,
    },
    fourcc => b"meta",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.8.1 Movie Extends Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieExtendsBox {
        boxes:      Vec<MP4Box>,
    },
    fourcc => b"mvex",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.8.2 Movie Extends Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieExtendsHeaderBox {
        fragment_duration:  Duration_,
    },
    fourcc => b"mehd",
    version => [1, fragment_duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.8.3 Track Extends Box (ISO/IEC 14496-12:2015(E))
    TrackExtendsBox {
        track_id:       u32,
        default_sample_description_index:   u32,
        default_sample_duration:    u32,
        default_sample_size:        u32,
        default_sample_flags:       SampleFlags,
    },
    fourcc => b"trex",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

// Default needs to set sample_description_index to 1.
impl Default for TrackExtendsBox {
    fn default() -> TrackExtendsBox {
        TrackExtendsBox {
            track_id: 0,
            default_sample_description_index: 1,
            default_sample_duration: 0,
            default_sample_size: 0,
            default_sample_flags: SampleFlags::default(),
        }
    }
}

def_box! {
    /// 8.8.5 Movie Fragment Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieFragmentHeaderBox {
        sequence_number:    u32,
    },
    fourcc => b"mfhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.8.12 Track Fragment Base Media Decode Time Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TrackFragmentBaseMediaDecodeTimeBox {
        base_media_decode_time: VersionSizedUint,
    },
    fourcc => b"tfdt",
    version => [1, base_media_decode_time],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 8.5.2.2 BitRateBox (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    BtrtBox {
        decoding_buffer_size: u32,
        max_bitrate: u32,
        avg_bitrate: u32,
    },
    fourcc => b"btrt",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 12.1.4.2 Pixel Aspect Ratio Box (ISO/IEC 14496-12:2015(E))
    PixelAspectRatioBox {
        h_spacing:  u32,
        v_spacing:  u32,
    },
    fourcc => b"pasp",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 12.1.4.2 Clean Aperture Box (ISO/IEC 14496-12:2015(E))
    CleanApertureBox {
        clean_aperture_width_n:  u32,
        clean_aperture_width_d:  u32,
        clean_aperture_height_n: u32,
        clean_aperture_height_d: u32,
        horiz_off_n: u32,
        horiz_off_d: u32,
        vert_off_n:  u32,
        vert_off_d:  u32,
    },
    fourcc => b"clap",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Colour information ('nclc' / 'nclx').
    ColorParameterBox {
        colour_type:        FourCC,
        primaries_index:    u16,
        transfer_index:     u16,
        matrix_index:       u16,
    },
    fourcc => b"colr",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.1.2 Free Space Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    FreeBox {
        data:   Data,
    },
    fourcc => b"free",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}
