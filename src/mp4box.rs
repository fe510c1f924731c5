//! Box header framing: BoxHeader, BoxReader, BoxWriter, GenericBox.
//!
//! Every box is `size (u32), fourcc, [largesize (u64)], payload`. Full
//! boxes prepend `version (u8), flags (u24)` to the payload; the version
//! and flags are threaded through the stream handle so that versioned
//! value types ([`Time`], [`Duration_`], signed composition offsets, ..)
//! can pick their wire width without the box having to pass them down.
use std::fmt::Debug;
use std::io;

use crate::boxes::MP4Box;
use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

/// Gets implemented for every box.
pub trait BoxInfo {
    /// The "fourcc" name of this box.
    fn fourcc(&self) -> FourCC;
    /// Highest version of this box we understand, `None` for base boxes.
    fn max_version() -> Option<u8>
    where
        Self: Sized,
    {
        None
    }
}

/// Calculate the size of a box without writing it out.
pub fn box_size<B: ToBytes + ?Sized>(b: &B) -> u64 {
    let mut cb = crate::io::CountBytes::new();
    b.to_bytes(&mut cb).unwrap();
    cb.size()
}

/// Version and flags of a full box.
///
/// Base boxes use the default implementation (no version byte at all).
/// A full box reports the lowest version that can hold its content;
/// the `def_box!` macro derives this from the versioned fields.
pub trait FullBox {
    fn version(&self) -> Option<u8> {
        None
    }
    fn flags(&self) -> u32 {
        0
    }
}

/// Full-box types per ISO/IEC 14496-12 and the QTFF/Nero extensions we
/// know about. Anything not listed here is a base box.
pub const FULL_BOX_TYPES: &[&[u8; 4]] = &[
    b"mvhd", b"tkhd", b"mdhd", b"hdlr", b"elst", b"dref", b"url ", b"urn ", b"stsd", b"stsl",
    b"chan", b"stts", b"ctts", b"cslg", b"stss", b"stps", b"sdtp", b"stsc", b"stsz", b"stco",
    b"co64", b"sgpd", b"sbgp", b"chpl", b"meta", b"keys", b"mean", b"name", b"mehd", b"trex",
    b"mfhd", b"tfhd", b"tfdt", b"trun", b"tfra", b"mfro", b"smhd", b"vmhd", b"hmhd", b"nmhd",
    b"gmin", b"iods", b"cprt", b"elng", b"tsel",
];

static FULL_BOX_SET: once_cell::sync::Lazy<std::collections::HashSet<FourCC>> =
    once_cell::sync::Lazy::new(|| FULL_BOX_TYPES.iter().map(|&t| FourCC::new(t)).collect());

/// Is this fourcc a full box (version + flags in the header)?
pub fn is_fullbox(fourcc: FourCC) -> bool {
    FULL_BOX_SET.contains(&fourcc)
}

/// The header of a box as it appears on the wire.
#[derive(Clone, Debug)]
pub struct BoxHeader {
    /// Remaining payload size (header bytes already accounted for).
    pub size:        u64,
    pub fourcc:      FourCC,
    pub version:     Option<u8>,
    pub flags:       u32,
    pub max_version: Option<u8>,
}

impl BoxHeader {
    /// Read the box header, including version/flags for full boxes.
    pub fn read<R: ReadBytes>(stream: &mut R) -> io::Result<BoxHeader> {
        let size1 = u32::from_bytes(stream)?;
        let fourcc = FourCC::from_bytes(stream)?;
        let mut size = match size1 {
            0 => stream.size().saturating_sub(stream.pos()),
            1 => u64::from_bytes(stream)?.saturating_sub(16),
            x => (x as u64).saturating_sub(8),
        };
        let max_version = MP4Box::max_version_from_fourcc(fourcc);
        let (version, flags) = if max_version.is_some() && size >= 4 {
            let b = stream.read(4)?;
            size -= 4;
            (
                Some(b[0]),
                ((b[1] as u32) << 16) | ((b[2] as u32) << 8) | (b[3] as u32),
            )
        } else {
            (None, 0)
        };
        Ok(BoxHeader {
            size,
            fourcc,
            version,
            flags,
            max_version,
        })
    }

    /// Peek at the header without consuming it.
    pub fn peek<R: ReadBytes>(stream: &mut R) -> io::Result<BoxHeader> {
        let pos = stream.pos();
        let header = BoxHeader::read(stream)?;
        stream.seek(pos)?;
        Ok(header)
    }
}

/// Reads the box header, then presents a size-limited view of the body.
pub struct BoxReader<'a> {
    pub header:   BoxHeader,
    maxsize:      u64,
    prev_version: u8,
    prev_flags:   u32,
    // Boxed, since a BoxReader might contain a BoxReader.
    inner:        Box<dyn ReadBytes + 'a>,
}

impl<'a> BoxReader<'a> {
    /// Read the box header, then return a size-limited reader.
    pub fn new(stream: &'a mut impl ReadBytes) -> io::Result<BoxReader<'a>> {
        let prev_version = stream.version();
        let prev_flags = stream.flags();
        let header = BoxHeader::read(stream)?;
        let maxsize = std::cmp::min(stream.size(), stream.pos() + header.size);
        if let Some(version) = header.version {
            stream.set_version(version);
            stream.set_flags(header.flags);
        }
        log::trace!(
            "BoxReader::new: {} size {} maxsize {}",
            header.fourcc,
            header.size,
            maxsize
        );
        Ok(BoxReader {
            header,
            maxsize,
            prev_version,
            prev_flags,
            inner: Box::new(stream),
        })
    }
}

impl<'a> Drop for BoxReader<'a> {
    fn drop(&mut self) {
        if self.pos() < self.maxsize {
            log::trace!(
                "BoxReader {} drop: skipping {}",
                self.header.fourcc,
                self.maxsize - self.pos()
            );
            let _ = ReadBytes::skip(self, self.maxsize - self.pos());
        }
        self.inner.set_version(self.prev_version);
        self.inner.set_flags(self.prev_flags);
    }
}

// Delegate ReadBytes to the inner reader.
impl<'a> ReadBytes for BoxReader<'a> {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let amount = if amount == 0 { self.left() } else { amount };
        if amount == 0 {
            return Ok(b"");
        }
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.read(amount)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.skip(amount)
    }
    fn left(&self) -> u64 {
        let pos = self.inner.pos();
        if pos > self.maxsize {
            0
        } else {
            self.maxsize - pos
        }
    }
}

// Delegate BoxBytes to the inner reader.
impl<'a> BoxBytes for BoxReader<'a> {
    fn pos(&self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.maxsize {
            return Err(ioerr!(UnexpectedEof));
        }
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.maxsize
    }
    fn version(&self) -> u8 {
        self.inner.version()
    }
    fn set_version(&mut self, version: u8) {
        self.inner.set_version(version)
    }
    fn flags(&self) -> u32 {
        self.inner.flags()
    }
    fn set_flags(&mut self, flags: u32) {
        self.inner.set_flags(flags)
    }
    fn fourcc(&self) -> FourCC {
        self.header.fourcc
    }
}

/// Writes the box header, tracks the box size.
///
/// A provisional size of 0 is written first; on `finalize()` (or drop)
/// we seek back, patch the real size in, and seek forward again.
pub struct BoxWriter<'a> {
    offset:       u64,
    prev_version: u8,
    prev_flags:   u32,
    inner:        Box<dyn WriteBytes + 'a>,
    finalized:    bool,
}

impl<'a> BoxWriter<'a> {
    /// Write a provisional box header, then return a stream that writes
    /// the body. When the stream is dropped, the box header is updated.
    pub fn new<B>(stream: impl WriteBytes + 'a, b: &B) -> io::Result<BoxWriter<'a>>
    where
        B: BoxInfo + FullBox + ?Sized,
    {
        let mut stream = stream;
        let offset = stream.pos();
        let prev_version = stream.version();
        let prev_flags = stream.flags();
        0u32.to_bytes(&mut stream)?;
        b.fourcc().to_bytes(&mut stream)?;
        if let Some(version) = b.version() {
            let flags = b.flags();
            version.to_bytes(&mut stream)?;
            stream.write(&flags.to_be_bytes()[1..])?;
            stream.set_version(version);
            stream.set_flags(flags);
        }
        Ok(BoxWriter {
            offset,
            prev_version,
            prev_flags,
            inner: Box::new(stream),
            finalized: false,
        })
    }

    /// Finalize the box: seek back to the header and write the size.
    ///
    /// If you don't call this explicitly, it is done automatically when
    /// the BoxWriter is dropped. Any I/O errors will result in panics.
    pub fn finalize(&mut self) -> io::Result<()> {
        self.finalized = true;
        let pos = self.inner.pos();
        let sz = pos - self.offset;
        // Only `mdat` can outgrow a 32-bit size, and mdat is written
        // through its own placeholder path, not through BoxWriter.
        if sz > u32::MAX as u64 {
            return Err(ioerr!(InvalidData, "box too large: {}", sz));
        }
        self.inner.seek(self.offset)?;
        (sz as u32).to_bytes(&mut self.inner)?;
        self.inner.seek(pos)?;
        self.inner.set_version(self.prev_version);
        self.inner.set_flags(self.prev_flags);
        Ok(())
    }
}

impl<'a> Drop for BoxWriter<'a> {
    fn drop(&mut self) {
        if !self.finalized {
            self.finalize().unwrap();
        }
    }
}

// Delegate WriteBytes to the inner writer.
impl<'a> WriteBytes for BoxWriter<'a> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write(data)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.inner.skip(amount)
    }
}

// Delegate BoxBytes to the inner writer.
impl<'a> BoxBytes for BoxWriter<'a> {
    fn pos(&self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(pos)
    }
    fn version(&self) -> u8 {
        self.inner.version()
    }
    fn set_version(&mut self, version: u8) {
        self.inner.set_version(version)
    }
    fn flags(&self) -> u32 {
        self.inner.flags()
    }
    fn set_flags(&mut self, flags: u32) {
        self.inner.set_flags(flags)
    }
    fn fourcc(&self) -> FourCC {
        self.inner.fourcc()
    }
    fn set_fourcc(&mut self, fourcc: FourCC) {
        self.inner.set_fourcc(fourcc)
    }
}

/// Read a collection of boxes from a stream.
pub fn read_boxes<R: ReadBytes>(mut file: R) -> io::Result<Vec<MP4Box>> {
    let mut boxes = Vec::new();
    while file.left() >= 8 {
        let b = MP4Box::from_bytes(&mut file)?;
        boxes.push(b);
    }
    Ok(boxes)
}

/// Write a collection of boxes to a stream.
pub fn write_boxes<W: WriteBytes>(mut file: W, boxes: &[MP4Box]) -> io::Result<()> {
    for b in boxes {
        b.to_bytes(&mut file)?;
    }
    Ok(())
}

/// Any box we don't know is kept as a blob of data.
#[derive(Clone)]
pub struct GenericBox {
    pub fourcc: FourCC,
    pub data:   Vec<u8>,
}

impl FromBytes for GenericBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<GenericBox> {
        let mut reader = BoxReader::new(stream)?;
        let fourcc = reader.header.fourcc;
        let size = reader.left();
        let data = reader.read(size)?.to_vec();
        Ok(GenericBox { fourcc, data })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for GenericBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        writer.write(&self.data)?;
        writer.finalize()
    }
}

impl BoxInfo for GenericBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl FullBox for GenericBox {}

struct U8Array(usize);

impl Debug for U8Array {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[u8; {}]", &self.0)
    }
}

impl Debug for GenericBox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut dbg = f.debug_struct("GenericBox");
        dbg.field("fourcc", &self.fourcc);
        dbg.field("data", &U8Array(self.data.len()));
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Membuf;

    #[test]
    fn fullbox_registry() {
        assert!(is_fullbox(FourCC::new(b"mvhd")));
        assert!(is_fullbox(FourCC::new(b"co64")));
        assert!(is_fullbox(FourCC::new(b"chpl")));
        assert!(!is_fullbox(FourCC::new(b"moov")));
        assert!(!is_fullbox(FourCC::new(b"mdat")));
        assert!(!is_fullbox(FourCC::new(b"wave")));
    }

    #[test]
    fn peek_does_not_consume() {
        let data = vec![
            0x00, 0x00, 0x00, 0x10, // size 16
            b'f', b'r', b'e', b'e', // type
            0, 0, 0, 0, 0, 0, 0, 0,
        ];
        let mut buf = Membuf::from_vec(data);
        let header = BoxHeader::peek(&mut buf).unwrap();
        assert_eq!(header.fourcc, FourCC::new(b"free"));
        assert_eq!(header.size, 8);
        assert_eq!(buf.pos(), 0);
    }

    #[test]
    fn largesize_header_parses() {
        let mut data = vec![
            0x00, 0x00, 0x00, 0x01, // size == 1: largesize follows
            b'm', b'd', b'a', b't',
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, // largesize 24
        ];
        data.extend_from_slice(&[0xaa; 8]);
        let mut buf = Membuf::from_vec(data);
        let header = BoxHeader::read(&mut buf).unwrap();
        assert_eq!(header.fourcc, FourCC::new(b"mdat"));
        assert_eq!(header.size, 8);
    }
}
