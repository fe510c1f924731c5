use crate::boxes::prelude::*;

/// Chapter List ("Nero" format).
///
/// `start_time` is in 100-nanosecond units, independent of the movie
/// timescale.
#[derive(Clone, Debug, Default)]
pub struct ChapterListBox {
    pub chapters: Vec<ChapterEntry>,
}

/// One chapter: start time plus a Pascal-string title.
#[derive(Clone, Debug, Default)]
pub struct ChapterEntry {
    pub start_time:   u64,
    pub chapter_name: PString,
}

impl FromBytes for ChapterListBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ChapterListBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let count = if stream.version() == 1 {
            ReadBytes::skip(stream, 1)?; // unknown byte
            u32::from_bytes(stream)?
        } else {
            u8::from_bytes(stream)? as u32
        };
        let mut chapters = Vec::new();
        for _ in 0..count {
            chapters.push(ChapterEntry {
                start_time:   u64::from_bytes(stream)?,
                chapter_name: PString::from_bytes(stream)?,
            });
        }
        Ok(ChapterListBox { chapters })
    }
    fn min_size() -> usize {
        5
    }
}

impl ToBytes for ChapterListBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        0u8.to_bytes(stream)?; // unknown byte
        (self.chapters.len() as u32).to_bytes(stream)?;
        for chapter in &self.chapters {
            chapter.start_time.to_bytes(stream)?;
            chapter.chapter_name.to_bytes(stream)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for ChapterListBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        FourCC::new(b"chpl")
    }
    #[inline]
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for ChapterListBox {
    fn version(&self) -> Option<u8> {
        Some(1)
    }
}
