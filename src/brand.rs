//! File brands and the feature gates they activate.
//!
//! The compatibility flags are computed once, right after the brand set
//! is configured, and are read-only from then on.
use crate::boxes::FileTypeBox;
use crate::types::FourCC;

pub const BRAND_ISOM: FourCC = FourCC::new(b"isom");
pub const BRAND_MP41: FourCC = FourCC::new(b"mp41");
pub const BRAND_MP42: FourCC = FourCC::new(b"mp42");
pub const BRAND_AVC1: FourCC = FourCC::new(b"avc1");
pub const BRAND_ISO2: FourCC = FourCC::new(b"iso2");
pub const BRAND_ISO3: FourCC = FourCC::new(b"iso3");
pub const BRAND_ISO4: FourCC = FourCC::new(b"iso4");
pub const BRAND_ISO5: FourCC = FourCC::new(b"iso5");
pub const BRAND_ISO6: FourCC = FourCC::new(b"iso6");
pub const BRAND_3GP4: FourCC = FourCC::new(b"3gp4");
pub const BRAND_3GP5: FourCC = FourCC::new(b"3gp5");
pub const BRAND_3GP6: FourCC = FourCC::new(b"3gp6");
pub const BRAND_3GE6: FourCC = FourCC::new(b"3ge6");
pub const BRAND_3GG6: FourCC = FourCC::new(b"3gg6");
pub const BRAND_3GR6: FourCC = FourCC::new(b"3gr6");
pub const BRAND_3GS6: FourCC = FourCC::new(b"3gs6");
pub const BRAND_3G2A: FourCC = FourCC::new(b"3g2a");
pub const BRAND_M4A: FourCC = FourCC::new(b"M4A ");
pub const BRAND_M4B: FourCC = FourCC::new(b"M4B ");
pub const BRAND_M4P: FourCC = FourCC::new(b"M4P ");
pub const BRAND_M4V: FourCC = FourCC::new(b"M4V ");
pub const BRAND_QT: FourCC = FourCC::new(b"qt  ");

/// A file's brand declaration.
#[derive(Clone, Debug)]
pub struct Brands {
    pub major_brand:       FourCC,
    pub minor_version:     u32,
    pub compatible_brands: Vec<FourCC>,
}

impl Brands {
    /// Plain MP4 (mp42 + isom).
    pub fn mp4() -> Brands {
        Brands {
            major_brand:       BRAND_MP42,
            minor_version:     1,
            compatible_brands: vec![BRAND_ISOM, BRAND_MP42],
        }
    }

    /// 3GPP release 6 ('3gp6', minor version 0).
    pub fn threegpp() -> Brands {
        Brands {
            major_brand:       BRAND_3GP6,
            minor_version:     0,
            compatible_brands: vec![BRAND_ISOM, BRAND_MP42, BRAND_3GP6],
        }
    }

    /// 3GPP2 ('3g2a' 1.0.0).
    pub fn threegpp2() -> Brands {
        Brands {
            major_brand:       BRAND_3G2A,
            minor_version:     0x00010000,
            compatible_brands: vec![BRAND_ISOM, BRAND_MP42, BRAND_3GP6, BRAND_3G2A],
        }
    }

    /// iTunes audio ('M4A ').
    pub fn m4a() -> Brands {
        Brands {
            major_brand:       BRAND_M4A,
            minor_version:     1,
            compatible_brands: vec![BRAND_ISOM, BRAND_MP42, BRAND_M4A],
        }
    }

    /// QuickTime movie file format.
    pub fn quicktime() -> Brands {
        Brands {
            major_brand:       BRAND_QT,
            minor_version:     0,
            compatible_brands: vec![BRAND_QT],
        }
    }

    pub fn to_ftyp(&self) -> FileTypeBox {
        FileTypeBox {
            major_brand:       self.major_brand,
            minor_version:     self.minor_version,
            compatible_brands: self.compatible_brands.clone(),
        }
    }

    fn has(&self, brand: FourCC) -> bool {
        self.major_brand == brand || self.compatible_brands.iter().any(|&b| b == brand)
    }
}

/// Feature gates derived from the brand set. Computed once.
#[derive(Clone, Copy, Debug, Default)]
pub struct Compatibility {
    pub qt_compatible:   bool,
    pub mp4_version1:    bool,
    pub mp4_version2:    bool,
    pub itunes_movie:    bool,
    /// 0 = no isoN brand, otherwise the highest ISO generation.
    pub max_iso_version: u8,
    /// 0 = not 3GPP, otherwise the 3GPP generation (4..6).
    pub max_3gpp_version: u8,
    pub brand_3g2:       bool,
    pub avc_extensions:  bool,
}

impl Compatibility {
    /// Compute the flags from a brand set.
    pub fn compute(brands: &Brands) -> Compatibility {
        let mut compat = Compatibility::default();
        compat.qt_compatible = brands.has(BRAND_QT);
        compat.mp4_version1 = brands.has(BRAND_MP41);
        compat.mp4_version2 = brands.has(BRAND_MP42);
        compat.itunes_movie = brands.has(BRAND_M4A)
            || brands.has(BRAND_M4B)
            || brands.has(BRAND_M4P)
            || brands.has(BRAND_M4V);
        compat.avc_extensions = brands.has(BRAND_AVC1);
        compat.brand_3g2 = brands.has(BRAND_3G2A);
        let iso = [
            (BRAND_ISOM, 1),
            (BRAND_ISO2, 2),
            (BRAND_ISO3, 3),
            (BRAND_ISO4, 4),
            (BRAND_ISO5, 5),
            (BRAND_ISO6, 6),
        ];
        for &(brand, version) in &iso {
            if brands.has(brand) && compat.max_iso_version < version {
                compat.max_iso_version = version;
            }
        }
        let threegpp = [
            (BRAND_3GP4, 4),
            (BRAND_3GP5, 5),
            (BRAND_3GP6, 6),
            (BRAND_3GE6, 6),
            (BRAND_3GG6, 6),
            (BRAND_3GR6, 6),
            (BRAND_3GS6, 6),
        ];
        for &(brand, version) in &threegpp {
            if brands.has(brand) && compat.max_3gpp_version < version {
                compat.max_3gpp_version = version;
            }
        }
        compat
    }

    /// A file with no ftyp at all is QTFF.
    pub fn qtff() -> Compatibility {
        Compatibility {
            qt_compatible: true,
            ..Compatibility::default()
        }
    }

    /// Are signed (version 1) composition offsets allowed?
    pub fn signed_cts_offsets(&self) -> bool {
        self.qt_compatible || self.max_iso_version >= 4
    }

    /// Is the 'rap ' sample grouping allowed?
    pub fn rap_grouping(&self) -> bool {
        self.max_iso_version >= 6
    }

    /// Is the 'roll' sample grouping allowed?
    pub fn roll_grouping(&self) -> bool {
        self.avc_extensions || self.qt_compatible
    }

    /// 3GPP restricts audio to 48 kHz / 2 channels.
    pub fn check_3gpp_audio(&self, frequency: u32, channels: u16) -> bool {
        if self.max_3gpp_version == 0 {
            return true;
        }
        frequency <= 48000 && channels <= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn threegpp_brands() {
        let brands = Brands::threegpp();
        assert_eq!(brands.major_brand, BRAND_3GP6);
        assert_eq!(brands.minor_version, 0);
        let compat = Compatibility::compute(&brands);
        assert_eq!(compat.max_3gpp_version, 6);
        assert!(compat.mp4_version2);
        assert!(!compat.check_3gpp_audio(96000, 2));
        assert!(compat.check_3gpp_audio(44100, 2));
    }

    #[test]
    fn signed_offsets_need_qt_or_iso4() {
        assert!(!Compatibility::compute(&Brands::mp4()).signed_cts_offsets());
        assert!(Compatibility::compute(&Brands::quicktime()).signed_cts_offsets());
        let mut brands = Brands::mp4();
        brands.compatible_brands.push(BRAND_ISO4);
        assert!(Compatibility::compute(&brands).signed_cts_offsets());
    }
}
