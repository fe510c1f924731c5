//! SMPTE 421M-2006 (VC-1) Advanced Profile elementary streams.
//!
//! The importer analyzes the stream twice. The first pass walks every
//! EBDU, counts access units and synthesizes composition timestamps
//! from the B-picture pattern; the second pass re-scans the stream and
//! emits one sample per access unit with its derived properties.
use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::importer::{CodecSpecific, ImportEvent, Importer, Summary, VideoSummary};
use crate::sample::{LeadingType, RandomAccessType, Sample, SampleProperty};
use crate::types::FourCC;

pub const CODEC_VC1: FourCC = FourCC::new(b"vc-1");

const START_CODE_PREFIX_LENGTH: usize = 3;
const START_CODE_LENGTH: usize = 4;

// BDU types with a defined meaning for Advanced Profile.
const BDU_END_OF_SEQUENCE: u8 = 0x0a;
const BDU_SLICE: u8 = 0x0b;
const BDU_FIELD: u8 = 0x0c;
const BDU_FRAME: u8 = 0x0d;
const BDU_ENTRY_POINT: u8 = 0x0e;
const BDU_SEQUENCE: u8 = 0x0f;
// 0xFF is a forbidden value, used as "none".
const BDU_NONE: u8 = 0xff;

// ptype VLC values.
const PICTURE_TYPE_P: u8 = 0x0; /* 0b0 */
const PICTURE_TYPE_B: u8 = 0x2; /* 0b10 */
const PICTURE_TYPE_I: u8 = 0x6; /* 0b110 */
const PICTURE_TYPE_BI: u8 = 0xe; /* 0b1110 */
#[allow(dead_code)]
const PICTURE_TYPE_SKIPPED: u8 = 0xf; /* 0b1111 */

// fptype fixed 3-bit values.
const FIELD_PICTURE_TYPE_II: u8 = 0x0;
const FIELD_PICTURE_TYPE_BB: u8 = 0x4;
const FIELD_PICTURE_TYPE_BIBI: u8 = 0x7;

// Frame coding modes.
const FRAME_CODING_MODE_FIELD_INTERLACE: u8 = 0x3;

/// Sequence header fields we keep (SMPTE 421M-2006, 6.1).
#[derive(Clone, Debug, Default)]
pub struct SequenceHeader {
    pub present:               bool,
    pub profile:               u8,
    pub level:                 u8,
    pub colordiff_format:      u8,
    pub max_coded_width:       u16,
    pub max_coded_height:      u16,
    pub interlace:             bool,
    pub disp_horiz_size:       u16,
    pub disp_vert_size:        u16,
    pub aspect_width:          u32,
    pub aspect_height:         u32,
    pub framerate_flag:        bool,
    pub framerate_numerator:   u32,
    pub framerate_denominator: u32,
    pub color_prim:            u16,
    pub transfer_char:         u16,
    pub matrix_coef:           u16,
    pub color_present:         bool,
    pub hrd_param_flag:        bool,
    pub hrd_num_leaky_buckets: u8,
}

/// Entry-point header fields we keep (SMPTE 421M-2006, 6.2).
#[derive(Clone, Debug, Default)]
struct EntryPoint {
    present:            bool,
    closed_entry_point: bool,
}

#[derive(Clone, Debug, Default)]
struct PictureInfo {
    present:           bool,
    frame_coding_mode: u8,
    picture_type:      u8,
    start_of_sequence: bool,
    closed_gop:        bool,
    random_accessible: bool,
}

#[derive(Clone, Debug, Default)]
struct AccessUnit {
    data:              Vec<u8>,
    incomplete_data:   Vec<u8>,
    data_length:       usize,
    incomplete_length: usize,
    number:            u32,
    independent:       bool,
    disposable:        bool,
    non_bipredictive:  bool,
    closed_gop:        bool,
    random_accessible: bool,
}

/// The fields of the VC1SpecificBox ('dvc1').
#[derive(Clone, Debug, Default)]
pub struct Vc1SpecificParameters {
    pub profile:           u8,
    pub level:             u8,
    pub cbr:               bool,
    pub interlaced:        bool,
    pub multiple_sequence: bool,
    pub multiple_entry:    bool,
    pub slice_present:     bool,
    pub bframe_present:    bool,
    /// Rounded frames per second; 0xffffffff means unknown.
    pub framerate:         u32,
    pub seqhdr:            Option<Vec<u8>>,
    pub ephdr:             Option<Vec<u8>>,
}

impl Vc1SpecificParameters {
    /// Serialize the VC1AdvDecSpecStruc payload of the 'dvc1' box.
    pub fn specific_info(&self) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.put_bits(4, self.profile as u32);
        bits.put_bits(3, self.level as u32);
        bits.put_bits(1, 0); // reserved
        bits.put_bits(3, self.level as u32);
        bits.put_bits(1, self.cbr as u32);
        bits.put_bits(6, 0); // reserved
        bits.put_bits(1, !self.interlaced as u32);
        bits.put_bits(1, !self.multiple_sequence as u32);
        bits.put_bits(1, !self.multiple_entry as u32);
        bits.put_bits(1, !self.slice_present as u32);
        bits.put_bits(1, !self.bframe_present as u32);
        bits.put_bits(1, 0); // reserved
        bits.put_bits(32, self.framerate);
        if let Some(seqhdr) = &self.seqhdr {
            bits.put_bytes(seqhdr);
        }
        if let Some(ephdr) = &self.ephdr {
            bits.put_bytes(ephdr);
        }
        bits.into_vec()
    }
}

/// Convert an EBDU body to an RBDU: drop every emulation prevention
/// byte (`0x00 0x00 0x03` becomes `0x00 0x00`).
pub fn remove_emulation_prevention(src: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        if i + 2 < src.len() && src[i] == 0 && src[i + 1] == 0 && src[i + 2] == 0x03 {
            dst.push(src[i]);
            dst.push(src[i + 1]);
            i += 3; // skip emulation_prevention_three_byte
        } else {
            dst.push(src[i]);
            i += 1;
        }
    }
    dst
}

/// Insert emulation prevention bytes: any `0x00 0x00` followed by a
/// byte `<= 0x03` gets a `0x03` in between.
pub fn insert_emulation_prevention(src: &[u8]) -> Vec<u8> {
    let mut dst = Vec::with_capacity(src.len() + src.len() / 3);
    let mut zeros = 0;
    for &b in src {
        if zeros >= 2 && b <= 0x03 {
            dst.push(0x03);
            zeros = 0;
        }
        dst.push(b);
        if b == 0 {
            zeros += 1;
        } else {
            zeros = 0;
        }
    }
    dst
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ImporterState {
    Ok,
    Eof,
    Error,
}

/// VC-1 Advanced Profile importer.
pub struct Vc1Importer {
    data: Vec<u8>,
    pos: usize,
    ebdu_head_pos: usize,
    first_ebdu_head_pos: usize,
    prev_bdu_type: u8,

    sequence:    SequenceHeader,
    entry_point: EntryPoint,
    picture:     PictureInfo,
    access_unit: AccessUnit,
    param:       Vc1SpecificParameters,

    first_sequence: SequenceHeader,
    timestamps: Vec<(u64, u64)>,
    composition_reordering_present: bool,
    max_au_length: u32,
    last_ref_intra_cts: u64,
    state: ImporterState,
}

impl Vc1Importer {
    pub fn new(data: Vec<u8>) -> Vc1Importer {
        Vc1Importer {
            data,
            pos: 0,
            ebdu_head_pos: 0,
            first_ebdu_head_pos: 0,
            prev_bdu_type: BDU_NONE,
            sequence: SequenceHeader::default(),
            entry_point: EntryPoint::default(),
            picture: PictureInfo::default(),
            access_unit: AccessUnit::default(),
            param: Vc1SpecificParameters::default(),
            first_sequence: SequenceHeader::default(),
            timestamps: Vec::new(),
            composition_reordering_present: false,
            max_au_length: 0,
            last_ref_intra_cts: 0,
            state: ImporterState::Ok,
        }
    }

    /// The probed stream parameters (valid after `probe`).
    pub fn specific_parameters(&self) -> &Vc1SpecificParameters {
        &self.param
    }

    /// Present B and BI pictures in decode order?
    pub fn composition_reordering_present(&self) -> bool {
        self.composition_reordering_present
    }

    //
    // Byte-stream scanning.
    //

    fn is_end(&self, offset: usize) -> bool {
        self.pos + offset >= self.data.len()
    }

    fn show_byte(&self, offset: usize) -> u8 {
        self.data.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn show_be24(&self, offset: usize) -> u32 {
        ((self.show_byte(offset) as u32) << 16)
            | ((self.show_byte(offset + 1) as u32) << 8)
            | self.show_byte(offset + 2) as u32
    }

    /// Locate the EBDU at the current position: its length (start code
    /// included, trailing zero padding excluded), its BDU type, and the
    /// number of trailing zero bytes after it.
    fn find_next_start_code_prefix(&self) -> (usize, u8, usize) {
        let mut count = 0;
        if !self.is_end(START_CODE_LENGTH - 1) && self.show_be24(0) == 0x000001 {
            let bdu_type = self.show_byte(START_CODE_PREFIX_LENGTH);
            let mut length = START_CODE_LENGTH;
            // Find the start code of the next EBDU.
            let mut no_more = self.is_end(length + START_CODE_LENGTH - 1);
            while !no_more && self.show_be24(length) != 0x000001 {
                length += 1;
                no_more = self.is_end(length + START_CODE_LENGTH - 1);
            }
            if no_more {
                length = self.data.len() - self.pos;
            }
            // Any EBDU has no consecutive zero bytes at the end.
            while length > 0 && self.show_byte(length - 1) == 0x00 {
                length -= 1;
                count += 1;
            }
            (length, bdu_type, count)
        } else {
            (0, BDU_NONE, count)
        }
    }

    //
    // Header parsing.
    //

    fn parse_sequence_header(&mut self, ebdu: &[u8], try_append: bool) -> Result<()> {
        let rbdu = remove_emulation_prevention(&ebdu[START_CODE_LENGTH..]);
        let mut bits = BitReader::new(&rbdu);
        let mut sequence = SequenceHeader::default();
        sequence.profile = bits.read_bits(2)? as u8;
        if sequence.profile != 3 {
            return Err(Error::unsupported("VC-1: only Advanced Profile"));
        }
        sequence.level = bits.read_bits(3)? as u8;
        if sequence.level > 4 {
            return Err(Error::unsupported("VC-1: reserved level"));
        }
        sequence.colordiff_format = bits.read_bits(2)? as u8;
        if sequence.colordiff_format != 1 {
            return Err(Error::unsupported("VC-1: only 4:2:0"));
        }
        bits.read_bits(9)?; // frmrtq_postproc, bitrtq_postproc, postproc_flag
        sequence.max_coded_width = bits.read_bits(12)? as u16;
        sequence.max_coded_height = bits.read_bits(12)? as u16;
        bits.read_bits(1)?; // pulldown
        sequence.interlace = bits.read_bits(1)? == 1;
        bits.read_bits(4)?; // tfcntrflag, finterpflag, reserved, psf
        if bits.read_bits(1)? == 1 {
            // display_ext
            sequence.disp_horiz_size = bits.read_bits(14)? as u16 + 1;
            sequence.disp_vert_size = bits.read_bits(14)? as u16 + 1;
            if bits.read_bits(1)? == 1 {
                // aspect_ratio_flag
                let aspect_ratio = bits.read_bits(4)?;
                if aspect_ratio == 15 {
                    sequence.aspect_width = bits.read_bits(8)? + 1;
                    sequence.aspect_height = bits.read_bits(8)? + 1;
                } else {
                    static ASPECT_RATIO: [(u32, u32); 15] = [
                        (0, 0),
                        (1, 1),
                        (12, 11),
                        (10, 11),
                        (16, 11),
                        (40, 33),
                        (24, 11),
                        (20, 11),
                        (32, 11),
                        (80, 33),
                        (18, 11),
                        (15, 11),
                        (64, 33),
                        (160, 99),
                        (0, 0), // SMPTE reserved
                    ];
                    let (w, h) = ASPECT_RATIO[aspect_ratio as usize];
                    sequence.aspect_width = w;
                    sequence.aspect_height = h;
                }
            }
            sequence.framerate_flag = bits.read_bits(1)? == 1;
            if sequence.framerate_flag {
                if bits.read_bits(1)? == 1 {
                    // framerateind
                    sequence.framerate_numerator = bits.read_bits(16)? + 1;
                    sequence.framerate_denominator = 32;
                } else {
                    static FRAMERATE_NR: [u32; 8] = [0, 24, 25, 30, 50, 60, 48, 72];
                    let frameratenr = bits.read_bits(8)?;
                    if frameratenr == 0 {
                        return Err(Error::invalid_data("VC-1: forbidden framerate"));
                    }
                    if frameratenr > 7 {
                        return Err(Error::unsupported("VC-1: reserved framerate"));
                    }
                    let frameratedr = bits.read_bits(4)?;
                    match frameratedr {
                        1 => {
                            sequence.framerate_numerator = FRAMERATE_NR[frameratenr as usize];
                            sequence.framerate_denominator = 1;
                        },
                        2 => {
                            sequence.framerate_numerator =
                                FRAMERATE_NR[frameratenr as usize] * 1000;
                            sequence.framerate_denominator = 1001;
                        },
                        0 => return Err(Error::invalid_data("VC-1: forbidden framerate")),
                        _ => return Err(Error::unsupported("VC-1: reserved framerate")),
                    }
                }
            }
            if bits.read_bits(1)? == 1 {
                // color_format_flag
                sequence.color_prim = bits.read_bits(8)? as u16;
                sequence.transfer_char = bits.read_bits(8)? as u16;
                sequence.matrix_coef = bits.read_bits(8)? as u16;
                sequence.color_present = true;
            }
            sequence.hrd_param_flag = bits.read_bits(1)? == 1;
            if sequence.hrd_param_flag {
                sequence.hrd_num_leaky_buckets = self::parse_hrd_param(&mut bits)?;
            }
        }
        // '1' and stuffing bits ('0's).
        if bits.read_bits(1)? != 1 {
            return Err(Error::invalid_data("VC-1: bad sequence header stuffing"));
        }
        if try_append {
            // Update the parameters for the VC1SpecificBox.
            match &self.param.seqhdr {
                None => self.param.seqhdr = Some(ebdu.to_vec()),
                Some(seqhdr) => {
                    self.param.multiple_sequence |= seqhdr[..] != ebdu[..];
                },
            }
            self.param.profile = sequence.profile << 2;
            self.param.level = std::cmp::max(self.param.level, sequence.level);
            self.param.interlaced |= sequence.interlace;
            let framerate = if sequence.framerate_flag {
                (sequence.framerate_numerator as f64 / sequence.framerate_denominator as f64 + 0.5)
                    as u32
            } else {
                0xffffffff // framerate is unknown or unspecified
            };
            if self.param.framerate == 0 {
                self.param.framerate = framerate;
            } else if self.param.framerate != framerate {
                self.param.framerate = 0xffffffff;
            }
        }
        sequence.present = true;
        self.sequence = sequence;
        Ok(())
    }

    fn parse_entry_point_header(&mut self, ebdu: &[u8], try_append: bool) -> Result<()> {
        let rbdu = remove_emulation_prevention(&ebdu[START_CODE_LENGTH..]);
        let mut bits = BitReader::new(&rbdu);
        let mut entry_point = EntryPoint::default();
        let broken_link_flag = bits.read_bits(1)? == 1;
        entry_point.closed_entry_point = bits.read_bits(1)? == 1;
        if broken_link_flag && entry_point.closed_entry_point {
            return Err(Error::invalid_data(
                "VC-1: broken_link with closed_entry_point",
            ));
        }
        bits.read_bits(4)?; // panscan_flag, refdist_flag, loopfilter, fastuvmc
        let extended_mv = bits.read_bits(1)? == 1;
        bits.read_bits(6)?; // dquant, vstransform, overlap, quantizer
        if self.sequence.hrd_param_flag {
            for _ in 0..self.sequence.hrd_num_leaky_buckets {
                bits.read_bits(8)?; // hrd_full
            }
        }
        // Coded size per Amendment 2:2011 to SMPTE ST 421M:2006.
        let (coded_width, coded_height) = if bits.read_bits(1)? == 1 {
            (bits.read_bits(12)? as u16, bits.read_bits(12)? as u16)
        } else {
            (self.sequence.max_coded_width, self.sequence.max_coded_height)
        };
        let coded_width = 2 * (coded_width + 1);
        let coded_height = 2 * (coded_height + 1);
        if self.sequence.disp_horiz_size == 0 || self.sequence.disp_vert_size == 0 {
            self.sequence.disp_horiz_size = coded_width;
            self.sequence.disp_vert_size = coded_height;
        }
        if extended_mv {
            bits.read_bits(1)?; // extended_dmv
        }
        if bits.read_bits(1)? == 1 {
            bits.read_bits(3)?; // range_mapy
        }
        if bits.read_bits(1)? == 1 {
            bits.read_bits(3)?; // range_mapuv
        }
        // '1' and stuffing bits ('0's).
        if bits.read_bits(1)? != 1 {
            return Err(Error::invalid_data("VC-1: bad entry point stuffing"));
        }
        if try_append {
            match &self.param.ephdr {
                None => self.param.ephdr = Some(ebdu.to_vec()),
                Some(ephdr) => {
                    self.param.multiple_entry |= ephdr[..] != ebdu[..];
                },
            }
        }
        entry_point.present = true;
        self.entry_point = entry_point;
        Ok(())
    }

    fn parse_advanced_picture(&mut self, ebdu: &[u8]) -> Result<()> {
        let rbdu = remove_emulation_prevention(&ebdu[START_CODE_LENGTH..]);
        let mut bits = BitReader::new(&rbdu);
        self.picture.frame_coding_mode = if self.sequence.interlace {
            bits.read_vlc(2)? as u8
        } else {
            0
        };
        self.picture.picture_type = if self.picture.frame_coding_mode != FRAME_CODING_MODE_FIELD_INTERLACE {
            bits.read_vlc(4)? as u8 // ptype (variable length)
        } else {
            bits.read_bits(3)? as u8 // fptype
        };
        self.picture.present = true;
        Ok(())
    }

    // Move the picture info into the completed access unit's
    // independence/disposability flags.
    fn update_au_property(&mut self) {
        let access_unit = &mut self.access_unit;
        let picture = &mut self.picture;
        access_unit.random_accessible = picture.random_accessible;
        access_unit.closed_gop = picture.closed_gop;
        if picture.frame_coding_mode == FRAME_CODING_MODE_FIELD_INTERLACE {
            // Field interlace.
            access_unit.independent = picture.picture_type == FIELD_PICTURE_TYPE_II
                || picture.picture_type == FIELD_PICTURE_TYPE_BIBI;
            access_unit.non_bipredictive = picture.picture_type < FIELD_PICTURE_TYPE_BB
                || picture.picture_type == FIELD_PICTURE_TYPE_BIBI;
            access_unit.disposable = picture.picture_type >= FIELD_PICTURE_TYPE_BB;
        } else {
            // Frame progressive / interlace.
            access_unit.independent = picture.picture_type == PICTURE_TYPE_I
                || picture.picture_type == PICTURE_TYPE_BI;
            access_unit.non_bipredictive = picture.picture_type != PICTURE_TYPE_B;
            access_unit.disposable = picture.picture_type == PICTURE_TYPE_B
                || picture.picture_type == PICTURE_TYPE_BI;
        }
        picture.present = false;
        picture.picture_type = 0;
        picture.closed_gop = false;
        picture.start_of_sequence = false;
        picture.random_accessible = false;
    }

    fn complete_au(&mut self, probe: bool) -> bool {
        if !self.picture.present {
            return false;
        }
        if !probe {
            self.access_unit.data = self.access_unit.incomplete_data.clone();
        }
        self.access_unit.data_length = self.access_unit.incomplete_length;
        self.access_unit.incomplete_data.clear();
        self.access_unit.incomplete_length = 0;
        self.update_au_property();
        true
    }

    fn append_ebdu_to_au(&mut self, ebdu: &[u8], probe: bool) {
        if !probe {
            self.access_unit.incomplete_data.extend_from_slice(ebdu);
        }
        self.access_unit.incomplete_length += ebdu.len();
    }

    // In any access unit, an EBDU with a smaller BDU type never
    // precedes an EBDU with a larger one, and no two frame start codes
    // share an access unit.
    fn is_au_delimiter(bdu_type: u8, prev_bdu_type: u8) -> bool {
        bdu_type > prev_bdu_type || (bdu_type == BDU_FRAME && prev_bdu_type == BDU_FRAME)
    }

    /// Advance to the next complete access unit. Returns true when an
    /// access unit was produced.
    fn get_access_unit_internal(&mut self, probe: bool) -> Result<bool> {
        self.access_unit.data_length = 0;
        loop {
            let (ebdu_length, bdu_type, trailing_zero_bytes) = self.find_next_start_code_prefix();
            if ebdu_length <= START_CODE_LENGTH && self.is_end(ebdu_length) {
                // The last EBDU already has been appended and parsed.
                self.complete_au(probe);
                self.access_unit.number += 1;
                return Ok(true);
            }
            if bdu_type == BDU_NONE {
                return Err(Error::invalid_data("VC-1: forbidden BDU type"));
            }
            let next_ebdu_head_pos = self.ebdu_head_pos + ebdu_length + trailing_zero_bytes;
            let mut complete_au = false;
            match bdu_type {
                BDU_END_OF_SEQUENCE..=BDU_SEQUENCE => {
                    // Complete the current access unit if this EBDU
                    // delimits it.
                    if Self::is_au_delimiter(bdu_type, self.prev_bdu_type) {
                        complete_au = self.complete_au(probe);
                    }
                    let ebdu = self.data[self.pos..self.pos + ebdu_length].to_vec();
                    match bdu_type {
                        BDU_FRAME => {
                            // A frame starts a new video frame, or for
                            // field interlace, a pair of fields.
                            self.parse_advanced_picture(&ebdu)?;
                            self.param.bframe_present |= if self.picture.frame_coding_mode
                                == FRAME_CODING_MODE_FIELD_INTERLACE
                            {
                                self.picture.picture_type >= FIELD_PICTURE_TYPE_BB
                            } else {
                                self.picture.picture_type == PICTURE_TYPE_B
                                    || self.picture.picture_type == PICTURE_TYPE_BI
                            };
                        },
                        BDU_FIELD => {
                            // Second field of a field-interlaced frame;
                            // carries no picture type of its own.
                        },
                        BDU_SLICE => {
                            // Slice layer may repeat the frame header.
                            // We just note its presence.
                            self.param.slice_present = true;
                        },
                        BDU_ENTRY_POINT => {
                            self.parse_entry_point_header(&ebdu, probe)?;
                            // The frame that follows this entry point is
                            // random accessible, unless multiple sequence
                            // headers make that undecidable.
                            self.picture.closed_gop = self.entry_point.closed_entry_point;
                            self.picture.random_accessible = if self.param.multiple_sequence {
                                self.picture.start_of_sequence
                            } else {
                                true
                            };
                        },
                        BDU_SEQUENCE => {
                            self.parse_sequence_header(&ebdu, probe)?;
                            // The first frame after a sequence header is
                            // a random access point.
                            self.picture.start_of_sequence = true;
                            if probe && !self.first_sequence.present {
                                self.first_sequence = self.sequence.clone();
                            }
                        },
                        _ => {
                            // End-of-sequence.
                        },
                    }
                    self.append_ebdu_to_au(&ebdu, probe);
                },
                0x80..=0xff => {
                    return Err(Error::invalid_data("VC-1: forbidden BDU type"));
                },
                _ => {
                    // SMPTE reserved, user data and friends.
                    return Err(Error::unsupported(format!(
                        "VC-1: unsupported BDU type {:#x}",
                        bdu_type
                    )));
                },
            }
            self.prev_bdu_type = bdu_type;
            self.pos = next_ebdu_head_pos;
            if !self.is_end(START_CODE_PREFIX_LENGTH) {
                self.ebdu_head_pos = next_ebdu_head_pos;
            } else if self.access_unit.incomplete_length > 0 && self.access_unit.data_length == 0 {
                // No more data in the stream; flush the chunk of EBDUs
                // as a complete access unit.
                self.complete_au(probe);
                self.access_unit.number += 1;
                return Ok(true);
            }
            if complete_au {
                self.access_unit.number += 1;
                return Ok(true);
            }
        }
    }

    fn check_eof(&mut self) {
        if self.is_end(0) && self.access_unit.incomplete_length == 0 {
            self.state = ImporterState::Eof;
        } else {
            self.state = ImporterState::Ok;
        }
    }

    /// Pass 1: walk the whole stream, count access units and
    /// synthesize composition timestamps from the B-picture pattern.
    fn analyze_whole_stream(&mut self) -> Result<()> {
        // Decode order      I[0] P[1] P[2] B[3] B[4] P[5] ..
        // DTS                 0    1    2    3    4    5  ..
        // Composition order I[0] P[1] B[3] B[4] P[2] P[5] ..
        // CTS                 1    2    3    4    5    6  ..
        // B and BI pictures display in the order they decode; a
        // non-B picture presents after the B run that follows it.
        let mut cts: Vec<u64> = Vec::new();
        let mut num_access_units: u32 = 0;
        let mut num_consecutive_b: u32 = 0;
        self.state = ImporterState::Ok;
        while self.state != ImporterState::Eof {
            self.get_access_unit_internal(true)?;
            self.check_eof();
            cts.push(0);
            if !self.access_unit.disposable {
                // The last non-B picture presents after the B run.
                if num_access_units > num_consecutive_b {
                    cts[(num_access_units - num_consecutive_b - 1) as usize] =
                        num_access_units as u64;
                }
                num_consecutive_b = 0;
            } else {
                // B or BI picture: displayed as decoded.
                cts[num_access_units as usize] = num_access_units as u64;
                num_consecutive_b += 1;
                self.param.bframe_present = true;
            }
            self.max_au_length =
                std::cmp::max(self.max_au_length, self.access_unit.data_length as u32);
            num_access_units += 1;
        }
        if num_access_units > num_consecutive_b {
            cts[(num_access_units - num_consecutive_b - 1) as usize] = num_access_units as u64;
        } else {
            return Err(Error::invalid_data("VC-1: no non-B picture in stream"));
        }

        for i in 1..num_access_units as usize {
            if cts[i] < cts[i - 1] {
                self.composition_reordering_present = true;
                break;
            }
        }
        self.timestamps = (0..num_access_units as u64)
            .map(|i| {
                if self.composition_reordering_present {
                    (i, cts[i as usize])
                } else {
                    (i, i)
                }
            })
            .collect();
        Ok(())
    }

    fn create_summary(&self) -> Result<Summary> {
        if !self.first_sequence.present || !self.entry_point.present {
            return Err(Error::invalid_data(
                "VC-1: no sequence or entry point header",
            ));
        }
        let sequence = &self.first_sequence;
        Ok(Summary::Video(VideoSummary {
            codec: CODEC_VC1,
            width: sequence.disp_horiz_size,
            height: sequence.disp_vert_size,
            par: (sequence.aspect_width, sequence.aspect_height),
            color: if sequence.color_present {
                Some((
                    sequence.color_prim,
                    sequence.transfer_char,
                    sequence.matrix_coef,
                ))
            } else {
                None
            },
            timescale: sequence.framerate_numerator,
            timebase: sequence.framerate_denominator,
            vfr: !sequence.framerate_flag,
            max_au_length: self.max_au_length,
            compressor_name: String::new(),
            specific: vec![CodecSpecific::Binary {
                fourcc: FourCC::new(b"dvc1"),
                data:   self.param.specific_info(),
            }],
        }))
    }
}

impl Importer for Vc1Importer {
    fn probe(&mut self) -> Result<Vec<Summary>> {
        // The first EBDU in decode order shall have a start code, and
        // nothing but zero bytes may precede it.
        let mut first_ebdu_head_pos = 0;
        loop {
            if first_ebdu_head_pos + 2 < self.data.len()
                && self.data[first_ebdu_head_pos] == 0
                && self.data[first_ebdu_head_pos + 1] == 0
                && self.data[first_ebdu_head_pos + 2] == 1
            {
                break;
            }
            if self.data.get(first_ebdu_head_pos).copied().unwrap_or(1) != 0 {
                return Err(Error::invalid_data("VC-1: no start code at stream head"));
            }
            first_ebdu_head_pos += 1;
        }
        self.pos = first_ebdu_head_pos;
        self.ebdu_head_pos = first_ebdu_head_pos;
        self.first_ebdu_head_pos = first_ebdu_head_pos;

        self.analyze_whole_stream()?;
        let summary = self.create_summary()?;

        // Rewind for pass 2.
        self.state = ImporterState::Ok;
        self.pos = self.first_ebdu_head_pos;
        self.ebdu_head_pos = self.first_ebdu_head_pos;
        self.prev_bdu_type = BDU_NONE;
        self.access_unit = AccessUnit::default();
        self.picture = PictureInfo::default();
        Ok(vec![summary])
    }

    /// Pass 2: emit one sample per access unit with dts, cts and the
    /// derived sample properties.
    fn get_access_unit(&mut self, track_number: u32) -> Result<ImportEvent> {
        if track_number != 1 {
            return Err(Error::param("VC-1: only one track"));
        }
        match self.state {
            ImporterState::Error => return Err(Error::invalid_data("VC-1: importer failed")),
            ImporterState::Eof => return Ok(ImportEvent::Eof),
            ImporterState::Ok => {},
        }
        if let Err(err) = self.get_access_unit_internal(false) {
            self.state = ImporterState::Error;
            return Err(err);
        }
        self.check_eof();

        let independent = self.access_unit.independent;
        let disposable = self.access_unit.disposable;
        let non_bipredictive = self.access_unit.non_bipredictive;
        let closed_gop = self.access_unit.closed_gop;
        let random_accessible = self.access_unit.random_accessible;
        let number = self.access_unit.number as usize - 1;
        let (dts, cts) = self.timestamps[number];

        let mut prop = SampleProperty::default();
        prop.leading = if independent || non_bipredictive || cts >= self.last_ref_intra_cts {
            LeadingType::NotLeading
        } else {
            LeadingType::UndecodableLeading
        };
        if independent && !disposable {
            self.last_ref_intra_cts = cts;
        }
        if self.composition_reordering_present && !disposable && !closed_gop {
            prop.allow_earlier = true;
        }
        prop.independent = Some(independent);
        prop.disposable = Some(disposable);
        prop.redundant = Some(false);
        if random_accessible {
            // Every random access point is a sync sample, even an
            // open RAP.
            prop.random_access_type = RandomAccessType::Sync;
        }
        let sample = Sample {
            dts,
            cts,
            data: self.access_unit.data[..self.access_unit.data_length].to_vec(),
            index: 1,
            prop,
        };
        Ok(ImportEvent::Sample(sample))
    }

    fn last_sample_delta(&self, track_number: u32) -> u32 {
        if track_number != 1 || self.state != ImporterState::Eof {
            return 0;
        }
        if self.timestamps.is_empty() {
            u32::MAX // arbitrary
        } else {
            1
        }
    }
}

fn parse_hrd_param(bits: &mut BitReader) -> Result<u8> {
    let hrd_num_leaky_buckets = bits.read_bits(5)? as u8;
    bits.read_bits(4)?; // bitrate_exponent
    bits.read_bits(4)?; // buffer_size_exponent
    for _ in 0..hrd_num_leaky_buckets {
        bits.read_bits(16)?; // hrd_rate
        bits.read_bits(16)?; // hrd_buffer
    }
    Ok(hrd_num_leaky_buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Build a minimal Advanced Profile sequence header EBDU:
    // profile 3, level 2, 4:2:0, 64x64 coded size, progressive,
    // no display extension.
    fn sequence_header_ebdu() -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.put_bits(2, 3); // profile: advanced
        bits.put_bits(3, 2); // level
        bits.put_bits(2, 1); // colordiff_format: 4:2:0
        bits.put_bits(9, 0); // frmrtq/bitrtq/postproc
        bits.put_bits(12, 31); // max_coded_width
        bits.put_bits(12, 31); // max_coded_height
        bits.put_bits(1, 0); // pulldown
        bits.put_bits(1, 0); // interlace
        bits.put_bits(4, 0); // tfcntr/finterp/reserved/psf
        bits.put_bits(1, 0); // display_ext
        bits.put_bits(1, 1); // terminating '1'
        let rbdu = bits.into_vec();
        let mut ebdu = vec![0x00, 0x00, 0x01, BDU_SEQUENCE];
        ebdu.extend(insert_emulation_prevention(&rbdu));
        ebdu
    }

    fn entry_point_ebdu(closed: bool) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.put_bits(1, 0); // broken_link
        bits.put_bits(1, closed as u32); // closed_entry_point
        bits.put_bits(4, 0); // panscan/refdist/loopfilter/fastuvmc
        bits.put_bits(1, 0); // extended_mv
        bits.put_bits(6, 0); // dquant/vstransform/overlap/quantizer
        bits.put_bits(1, 0); // coded_size_flag
        bits.put_bits(1, 0); // range_mapy_flag
        bits.put_bits(1, 0); // range_mapuv_flag
        bits.put_bits(1, 1); // terminating '1'
        let rbdu = bits.into_vec();
        let mut ebdu = vec![0x00, 0x00, 0x01, BDU_ENTRY_POINT];
        ebdu.extend(insert_emulation_prevention(&rbdu));
        ebdu
    }

    fn frame_ebdu(ptype_bits: (u8, u32)) -> Vec<u8> {
        let mut bits = BitWriter::new();
        // progressive stream: no fcm, just ptype.
        bits.put_bits(ptype_bits.0, ptype_bits.1);
        // pad with a sloppy non-zero tail so trailing-zero stripping
        // doesn't eat the payload.
        bits.put_bits(8, 0xa5);
        let rbdu = bits.into_vec();
        let mut ebdu = vec![0x00, 0x00, 0x01, BDU_FRAME];
        ebdu.extend(insert_emulation_prevention(&rbdu));
        ebdu
    }

    const I_FRAME: (u8, u32) = (3, 0b110);
    const P_FRAME: (u8, u32) = (1, 0b0);
    const B_FRAME: (u8, u32) = (2, 0b10);

    fn stream(frames: &[(u8, u32)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend(sequence_header_ebdu());
        data.extend(entry_point_ebdu(true));
        for &frame in frames {
            data.extend(frame_ebdu(frame));
        }
        data
    }

    #[test]
    fn emulation_prevention_round_trip() {
        let cases: Vec<Vec<u8>> = vec![
            vec![],
            vec![0x00, 0x00, 0x00, 0x00],
            vec![0x00, 0x00, 0x03, 0x00, 0x00, 0x01],
            vec![0x12, 0x00, 0x00, 0x02, 0x00, 0x00],
            (0u8..=255).collect(),
        ];
        for case in cases {
            assert_eq!(
                remove_emulation_prevention(&insert_emulation_prevention(&case)),
                case
            );
        }
    }

    #[test]
    fn probe_ibbp_pattern() {
        // Decode order: I P B B P B B P P.
        let data = stream(&[
            I_FRAME, P_FRAME, B_FRAME, B_FRAME, P_FRAME, B_FRAME, B_FRAME, P_FRAME, P_FRAME,
        ]);
        let total = data.len();
        let mut importer = Vc1Importer::new(data);
        let summaries = importer.probe().unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(importer.composition_reordering_present());

        // CTS synthesized from the B-runs: a non-B picture presents
        // after the B cluster that follows it in decode order, B
        // pictures display as they decode.
        let cts: Vec<u64> = importer.timestamps.iter().map(|&(_, c)| c).collect();
        assert_eq!(cts, vec![1, 4, 2, 3, 7, 5, 6, 8, 9]);
        let dts: Vec<u64> = importer.timestamps.iter().map(|&(d, _)| d).collect();
        assert_eq!(dts, vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);

        // Pass 2: AU byte lengths must cover the whole input.
        let mut sum = 0;
        let mut samples = Vec::new();
        loop {
            match importer.get_access_unit(1).unwrap() {
                ImportEvent::Sample(s) | ImportEvent::SummaryChanged(s) => {
                    sum += s.data.len();
                    samples.push(s);
                },
                ImportEvent::Eof => break,
            }
        }
        assert_eq!(samples.len(), 9);
        assert_eq!(sum, total);

        // First sample is the random access point; B frames are
        // disposable and not independent.
        assert_eq!(
            samples[0].prop.random_access_type,
            RandomAccessType::Sync
        );
        assert_eq!(samples[0].prop.independent, Some(true));
        assert_eq!(samples[2].prop.disposable, Some(true));
        assert_eq!(samples[1].prop.disposable, Some(false));
        // Non-disposable, non-closed-gop samples allow earlier pts.
        assert!(samples[1].prop.allow_earlier);
    }

    #[test]
    fn all_intra_stream_has_no_reordering() {
        let data = stream(&[I_FRAME, I_FRAME, I_FRAME]);
        let mut importer = Vc1Importer::new(data);
        importer.probe().unwrap();
        assert!(!importer.composition_reordering_present());
        let cts: Vec<u64> = importer.timestamps.iter().map(|&(_, c)| c).collect();
        assert_eq!(cts, vec![0, 1, 2]);
    }

    #[test]
    fn garbage_before_start_code_rejected() {
        let mut data = vec![0x42];
        data.extend(stream(&[I_FRAME]));
        let mut importer = Vc1Importer::new(data);
        assert!(importer.probe().is_err());
    }

    #[test]
    fn specific_info_layout() {
        let param = Vc1SpecificParameters {
            profile: 12,
            level: 2,
            cbr: false,
            interlaced: false,
            multiple_sequence: false,
            multiple_entry: false,
            slice_present: false,
            bframe_present: true,
            framerate: 25,
            seqhdr: Some(vec![0x00, 0x00, 0x01, 0x0f, 0xaa]),
            ephdr: Some(vec![0x00, 0x00, 0x01, 0x0e, 0xbb]),
        };
        let info = param.specific_info();
        // profile 12 in the top nibble, level 2 next.
        assert_eq!(info[0], (12 << 4) | (2 << 1));
        // framerate at byte offset 3.
        assert_eq!(&info[3..7], &25u32.to_be_bytes());
        // headers appended verbatim.
        assert_eq!(&info[7..12], &[0x00, 0x00, 0x01, 0x0f, 0xaa]);
    }

    #[test]
    fn mux_vc1_movie() {
        use crate::boxes::*;
        use crate::mp4box::{read_boxes, BoxInfo};
        use crate::muxer::{MediaParameters, MovieParameters, Muxer};

        let data = stream(&[
            I_FRAME, P_FRAME, B_FRAME, B_FRAME, P_FRAME, B_FRAME, B_FRAME, P_FRAME, P_FRAME,
        ]);
        let mut importer = Vc1Importer::new(data);
        let summaries = importer.probe().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vc1.mp4");
        let mut mux = Muxer::create(&path, MovieParameters::default()).unwrap();
        let track_id = mux.create_track(crate::handlers::HANDLER_VIDEO);
        mux.set_media_parameters(
            track_id,
            MediaParameters {
                timescale: 25,
                handler_name: "VideoHandler".to_string(),
                ..MediaParameters::default()
            },
        )
        .unwrap();
        mux.add_sample_entry(track_id, &summaries[0]).unwrap();
        loop {
            match importer.get_access_unit(1).unwrap() {
                ImportEvent::Sample(s) | ImportEvent::SummaryChanged(s) => {
                    mux.append_sample(track_id, s).unwrap();
                },
                ImportEvent::Eof => break,
            }
        }
        mux.flush_pooled_samples(track_id, importer.last_sample_delta(1)).unwrap();
        mux.finish(None).unwrap();

        let file = crate::io::Mp4File::open(&path).unwrap();
        let boxes = read_boxes(file).unwrap();
        let moov = first_box!(&boxes, MovieBox).unwrap();
        let trak = &moov.tracks()[0];
        let stbl = trak.sample_table();

        // Composition reordering: ctts present, with the offsets the
        // two-pass analysis derived.
        let ctts = stbl.composition_time_to_sample().unwrap();
        let mut offsets = Vec::new();
        for entry in ctts.entries.iter() {
            for _ in 0..entry.count {
                offsets.push(entry.offset);
            }
        }
        assert_eq!(offsets, vec![1, 3, 0, 0, 3, 0, 0, 1, 1]);

        // Only the head of the stream is a sync sample.
        let stss = stbl.sync_samples().unwrap();
        assert_eq!(&stss.entries[..], &[1]);

        // sdtp written: B frames are disposable.
        let sdtp = stbl.sample_dependencies().unwrap();
        assert_eq!(sdtp.entries.len(), 9);
        assert_eq!(sdtp.entries[0].sample_depends_on, 2);
        assert_eq!(sdtp.entries[2].sample_is_depended_on, 2);

        // The sample description carries the dvc1 configuration.
        let stsd = stbl.sample_description();
        let visual = stsd.entries[0].as_visual().unwrap();
        let dvc1 = visual
            .extensions
            .iter()
            .find(|b| b.fourcc().to_string() == "dvc1")
            .unwrap();
        match dvc1 {
            MP4Box::GenericBox(g) => assert!(!g.data.is_empty()),
            other => panic!("unexpected {:?}", other),
        }

        // An implicit whole-track edit maps the reordered timeline.
        assert!(trak.edit_list().is_some());
    }
}
