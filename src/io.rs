//! File I/O: the buffered byte sink the muxer writes to, a buffered
//! reader for parsing files back, an in-memory cursor, and a counting
//! writer used to compute box sizes without serializing.
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::serialize::{BoxBytes, ReadBytes, WriteBytes};
use crate::types::FourCC;

const WRITE_BUFSIZE: usize = 65536;

/// Buffered random-access reader over a file.
pub struct Mp4File {
    file:    File,
    pos:     u64,
    size:    u64,
    buf:     Vec<u8>,
    version: u8,
    flags:   u32,
    fourcc:  FourCC,
}

impl Mp4File {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Mp4File> {
        let file = File::open(path)?;
        Ok(Mp4File::new(file))
    }

    pub fn new(file: File) -> Mp4File {
        let mut file = file;
        let pos = file.seek(SeekFrom::Current(0)).unwrap_or(0);
        let size = file.metadata().map(|m| m.len()).unwrap_or(0);
        Mp4File {
            file,
            pos,
            size,
            buf: Vec::new(),
            version: 0,
            flags: 0,
            fourcc: FourCC::default(),
        }
    }
}

impl ReadBytes for Mp4File {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let mut amount = amount as usize;
        if amount == 0 {
            amount = std::cmp::min(1024, self.left()) as usize;
        }
        if self.buf.len() < amount {
            self.buf.resize(amount, 0);
        }
        self.file.read_exact(&mut self.buf[..amount])?;
        self.pos += amount as u64;
        Ok(&self.buf[..amount])
    }

    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.pos += amount;
        self.file.seek(SeekFrom::Start(self.pos))?;
        Ok(())
    }

    fn left(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }
}

impl BoxBytes for Mp4File {
    fn pos(&self) -> u64 {
        self.pos
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.pos = pos;
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.size
    }
    fn version(&self) -> u8 {
        self.version
    }
    fn set_version(&mut self, version: u8) {
        self.version = version;
    }
    fn flags(&self) -> u32 {
        self.flags
    }
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
    fn set_fourcc(&mut self, fourcc: FourCC) {
        self.fourcc = fourcc;
    }
}

enum SinkDest {
    File(File),
    Stdout(io::Stdout),
}

/// Buffered sequential writer: the byte sink of the muxer.
///
/// Writes to a file or to stdout. Seeking (for placeholder rewrites) is
/// only possible on files; a seek flushes the write buffer first.
pub struct Sink {
    dest:    SinkDest,
    buf:     Vec<u8>,
    flushed: u64,
    version: u8,
    flags:   u32,
    fourcc:  FourCC,
}

impl Sink {
    /// Create (truncate) a file to write to.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Sink> {
        let file = File::create(path)?;
        Ok(Sink::new(SinkDest::File(file)))
    }

    /// Write to standard output. `seek` is not available.
    pub fn stdout() -> Sink {
        Sink::new(SinkDest::Stdout(io::stdout()))
    }

    fn new(dest: SinkDest) -> Sink {
        Sink {
            dest,
            buf: Vec::with_capacity(WRITE_BUFSIZE),
            flushed: 0,
            version: 0,
            flags: 0,
            fourcc: FourCC::default(),
        }
    }

    /// Can this sink seek?
    pub fn seekable(&self) -> bool {
        matches!(self.dest, SinkDest::File(_))
    }

    /// Write the internal buffer out to the stream.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        match self.dest {
            SinkDest::File(ref mut file) => file.write_all(&self.buf)?,
            SinkDest::Stdout(ref mut out) => out.write_all(&self.buf)?,
        }
        self.flushed += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }

    /// Read bytes back at an absolute position (rewrite phase only).
    pub fn read_exact_at(&mut self, buf: &mut [u8], pos: u64) -> io::Result<()> {
        self.flush()?;
        match self.dest {
            SinkDest::File(ref mut file) => {
                let cur = self.flushed;
                file.seek(SeekFrom::Start(pos))?;
                file.read_exact(buf)?;
                file.seek(SeekFrom::Start(cur))?;
                Ok(())
            },
            SinkDest::Stdout(_) => Err(ioerr!(InvalidInput, "stdout: cannot read back")),
        }
    }

    /// Truncate the file to the current position.
    pub fn set_len_here(&mut self) -> io::Result<()> {
        self.flush()?;
        match self.dest {
            SinkDest::File(ref mut file) => file.set_len(self.flushed),
            SinkDest::Stdout(_) => Err(ioerr!(InvalidInput, "stdout: cannot truncate")),
        }
    }
}

impl WriteBytes for Sink {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= WRITE_BUFSIZE {
            self.flush()?;
        }
        Ok(())
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        let mut todo = amount;
        while todo > 0 {
            let n = std::cmp::min(todo, 4096) as usize;
            self.write(&[0u8; 4096][..n])?;
            todo -= n as u64;
        }
        Ok(())
    }
}

impl BoxBytes for Sink {
    fn pos(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.flush()?;
        match self.dest {
            SinkDest::File(ref mut file) => {
                file.seek(SeekFrom::Start(pos))?;
                self.flushed = pos;
                Ok(())
            },
            SinkDest::Stdout(_) => Err(ioerr!(InvalidInput, "stdout: cannot seek")),
        }
    }
    fn size(&self) -> u64 {
        self.pos()
    }
    fn version(&self) -> u8 {
        self.version
    }
    fn set_version(&mut self, version: u8) {
        self.version = version;
    }
    fn flags(&self) -> u32 {
        self.flags
    }
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
    fn set_fourcc(&mut self, fourcc: FourCC) {
        self.fourcc = fourcc;
    }
}

/// In-memory read/write cursor.
///
/// Used for building movie fragments before they hit the sink, for
/// codec configuration payloads, and in tests.
#[derive(Default)]
pub struct Membuf {
    data:    Vec<u8>,
    pos:     u64,
    version: u8,
    flags:   u32,
    fourcc:  FourCC,
}

impl Membuf {
    pub fn new() -> Membuf {
        Membuf::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Membuf {
        Membuf {
            data,
            ..Membuf::default()
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rewind the read/write position to the start.
    pub fn rewind(&mut self) {
        self.pos = 0;
        self.version = 0;
        self.flags = 0;
    }
}

impl ReadBytes for Membuf {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let amount = if amount == 0 { self.left() } else { amount };
        if self.pos + amount > self.data.len() as u64 {
            return Err(ioerr!(UnexpectedEof));
        }
        let start = self.pos as usize;
        self.pos += amount;
        Ok(&self.data[start..start + amount as usize])
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if self.pos + amount > self.data.len() as u64 {
            return Err(ioerr!(UnexpectedEof));
        }
        self.pos += amount;
        Ok(())
    }
    fn left(&self) -> u64 {
        (self.data.len() as u64).saturating_sub(self.pos)
    }
}

impl WriteBytes for Membuf {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let pos = self.pos as usize;
        if pos < self.data.len() {
            // overwrite, then extend.
            let overlap = std::cmp::min(self.data.len() - pos, data.len());
            self.data[pos..pos + overlap].copy_from_slice(&data[..overlap]);
            self.data.extend_from_slice(&data[overlap..]);
        } else {
            self.data.extend_from_slice(data);
        }
        self.pos += data.len() as u64;
        Ok(())
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        let zeros = vec![0u8; amount as usize];
        self.write(&zeros)
    }
}

impl BoxBytes for Membuf {
    fn pos(&self) -> u64 {
        self.pos
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.data.len() as u64 {
            return Err(ioerr!(UnexpectedEof));
        }
        self.pos = pos;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
    fn version(&self) -> u8 {
        self.version
    }
    fn set_version(&mut self, version: u8) {
        self.version = version;
    }
    fn flags(&self) -> u32 {
        self.flags
    }
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
    fn set_fourcc(&mut self, fourcc: FourCC) {
        self.fourcc = fourcc;
    }
}

/// A writer that doesn't write, it just counts the bytes that
/// it would write. Used to calculate the size of a box.
pub struct CountBytes {
    pos: u64,
    max: u64,
}

impl CountBytes {
    pub fn new() -> CountBytes {
        CountBytes { pos: 0, max: 0 }
    }

    pub fn size(&self) -> u64 {
        self.max
    }
}

impl WriteBytes for CountBytes {
    fn write(&mut self, newdata: &[u8]) -> io::Result<()> {
        self.pos += newdata.len() as u64;
        if self.max < self.pos {
            self.max = self.pos;
        }
        Ok(())
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.pos += amount;
        if self.max < self.pos {
            self.max = self.pos;
        }
        Ok(())
    }
}

impl BoxBytes for CountBytes {
    fn pos(&self) -> u64 {
        self.pos
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.pos = pos;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membuf_overwrite() {
        let mut buf = Membuf::new();
        buf.write(&[1, 2, 3, 4]).unwrap();
        buf.seek(1).unwrap();
        buf.write(&[9, 9]).unwrap();
        assert_eq!(buf.bytes(), &[1, 9, 9, 4]);
        buf.seek(3).unwrap();
        buf.write(&[7, 7]).unwrap();
        assert_eq!(buf.bytes(), &[1, 9, 9, 7, 7]);
    }

    #[test]
    fn countbytes_counts_seeked_writes() {
        let mut cb = CountBytes::new();
        cb.write(&[0u8; 16]).unwrap();
        cb.seek(4).unwrap();
        cb.write(&[0u8; 4]).unwrap();
        assert_eq!(cb.size(), 16);
    }
}
