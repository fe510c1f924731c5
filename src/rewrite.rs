//! In-place file rewriting: insert a serialized box (the finished
//! moov) in front of the media data.
//!
//! The shift uses a rolling buffer split in two halves, each at least
//! as large as the inserted box: one half is filled by reading
//! tail-of-file bytes while the previous fill is written to the region
//! those bytes just vacated. Positions advance by one half per round
//! until EOF.
use std::io;

use crate::boxes::MP4Box;
use crate::io::Sink;
use crate::serialize::{BoxBytes, ToBytes, WriteBytes};

/// Insert `box_` into the file at `pos`, shifting everything from
/// `pos` to EOF forward by the box's serialized size.
pub(crate) fn insert_box_at(
    sink: &mut Sink,
    box_: &MP4Box,
    pos: u64,
    buffer_size: usize,
) -> io::Result<()> {
    let mut contents = crate::io::Membuf::new();
    box_.to_bytes(&mut contents)?;
    let contents = contents.into_vec();
    let shift = contents.len() as u64;

    sink.flush()?;
    let end = sink.pos();
    if pos > end {
        return Err(ioerr!(InvalidInput, "insert position past EOF"));
    }
    log::debug!(
        "rewrite: inserting {} bytes at {}, moving {} bytes up",
        shift,
        pos,
        end - pos
    );

    // Each half must hold at least the inserted box, otherwise a write
    // would clobber bytes not yet read.
    let half = std::cmp::max(shift as usize, buffer_size / 2);

    // Prime: save the bytes the box will overwrite.
    let mut saved = vec![0u8; half];
    let mut read_pos = pos;
    let mut saved_len = std::cmp::min(half as u64, end - read_pos) as usize;
    sink.read_exact_at(&mut saved[..saved_len], read_pos)?;
    read_pos += saved_len as u64;

    sink.seek(pos)?;
    sink.write(&contents)?;
    let mut write_pos = pos + shift;

    let mut incoming = vec![0u8; half];
    loop {
        // Fill the other half first, then release the previous one.
        let incoming_len = std::cmp::min(half as u64, end.saturating_sub(read_pos)) as usize;
        if incoming_len > 0 {
            sink.read_exact_at(&mut incoming[..incoming_len], read_pos)?;
            read_pos += incoming_len as u64;
        }
        sink.seek(write_pos)?;
        sink.write(&saved[..saved_len])?;
        write_pos += saved_len as u64;
        if incoming_len == 0 {
            break;
        }
        std::mem::swap(&mut saved, &mut incoming);
        saved_len = incoming_len;
    }

    sink.seek(end + shift)?;
    sink.flush()?;
    Ok(())
}
