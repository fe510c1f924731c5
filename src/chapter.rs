//! Chapter text files and the boxes/samples built from them.
//!
//! Two line formats, auto-detected from the first line (after BOM
//! stripping):
//!
//! - "simple": alternating `CHAPTERnn=hh:mm:ss.ttt` and
//!   `CHAPTERnnNAME=Title` lines,
//! - "minimum": one `hh:mm:ss.ttt Title` per line.
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::PString;

const UTF8_BOM: &str = "\u{feff}";
const MAX_NAME_LENGTH: usize = 255;

/// A parsed chapter point. The start time is kept in nanoseconds.
#[derive(Clone, Debug)]
pub struct ChapterPoint {
    pub start_ns: u64,
    pub name:     String,
}

impl ChapterPoint {
    /// Start time in 100-nanosecond units (the chpl unit).
    pub fn start_100ns(&self) -> u64 {
        (self.start_ns + 50) / 100
    }

    /// Start time scaled to a media timescale.
    pub fn start_in_timescale(&self, timescale: u32) -> u64 {
        (self.start_ns as f64 * 1e-9 * timescale as f64 + 0.5) as u64
    }
}

// Parse "hh:mm:ss.fff" into nanoseconds.
// hh < 5124095 so the result fits an u64 of nanoseconds.
fn parse_start_time(s: &str) -> Option<u64> {
    let mut parts = s.splitn(3, ':');
    let hh: u64 = parts.next()?.trim().parse().ok()?;
    let mm: u64 = parts.next()?.trim().parse().ok()?;
    let ss: f64 = parts.next()?.trim().parse().ok()?;
    if hh >= 5124095 || mm >= 60 || !(0.0..60.0).contains(&ss) {
        return None;
    }
    Some((((hh * 3600 + mm * 60) as f64 + ss) * 1e9) as u64)
}

fn strip_bom(line: &str) -> &str {
    line.strip_prefix(UTF8_BOM).unwrap_or(line)
}

// "simple" format: CHAPTER01=00:00:00.000 / CHAPTER01NAME=Title pairs.
// A missing or malformed name line yields a default "Chapter N" name.
fn parse_simple(lines: &[&str]) -> Result<Vec<ChapterPoint>> {
    let mut points = Vec::new();
    let mut iter = lines.iter().peekable();
    while let Some(line) = iter.next() {
        let time = line
            .splitn(2, '=')
            .nth(1)
            .and_then(parse_start_time)
            .ok_or_else(|| Error::invalid_data(format!("bad chapter line: {}", line)))?;
        let mut name = None;
        if let Some(next) = iter.peek() {
            let upper = next.to_uppercase();
            if upper.starts_with("CHAPTER") && upper.contains("NAME=") {
                name = next.splitn(2, '=').nth(1).map(|s| s.to_string());
                iter.next();
            }
        }
        let number = points.len() + 1;
        let mut name = name.unwrap_or_else(|| format!("Chapter {}", number));
        name.truncate(MAX_NAME_LENGTH);
        points.push(ChapterPoint {
            start_ns: time,
            name,
        });
    }
    Ok(points)
}

// "minimum" format: "hh:mm:ss.ttt Title" per line.
fn parse_minimum(lines: &[&str]) -> Result<Vec<ChapterPoint>> {
    let mut points = Vec::new();
    for line in lines {
        let mut split = line.splitn(2, ' ');
        let time = split
            .next()
            .and_then(parse_start_time)
            .ok_or_else(|| Error::invalid_data(format!("bad chapter line: {}", line)))?;
        let mut name = split.next().unwrap_or("").to_string();
        if name.is_empty() {
            name = format!("Chapter {}", points.len() + 1);
        }
        name.truncate(MAX_NAME_LENGTH);
        points.push(ChapterPoint {
            start_ns: time,
            name,
        });
    }
    Ok(points)
}

/// Parse a chapter text file, auto-detecting the line format.
pub fn parse_chapter_file(path: impl AsRef<Path>) -> Result<Vec<ChapterPoint>> {
    let contents = fs::read_to_string(path)?;
    parse_chapters(&contents)
}

/// Parse chapter text, auto-detecting the line format.
pub fn parse_chapters(contents: &str) -> Result<Vec<ChapterPoint>> {
    let lines: Vec<&str> = contents
        .lines()
        .map(|l| strip_bom(l).trim_end_matches(['\r', '\n'].as_ref()))
        .filter(|l| !l.is_empty())
        .collect();
    let first = match lines.first() {
        Some(first) => *first,
        None => return Ok(Vec::new()),
    };
    if first.to_uppercase().starts_with("CHAPTER") {
        parse_simple(&lines)
    } else if first.len() >= 6
        && first.as_bytes()[0].is_ascii_digit()
        && first.as_bytes()[1].is_ascii_digit()
        && first.as_bytes()[2] == b':'
        && first.as_bytes()[3].is_ascii_digit()
        && first.as_bytes()[4].is_ascii_digit()
        && first.as_bytes()[5] == b':'
    {
        parse_minimum(&lines)
    } else {
        Err(Error::invalid_data("the chapter file is malformed"))
    }
}

/// The chpl chapter name, with an optional UTF-8 BOM in front.
pub fn chpl_name(name: &str, add_bom: bool) -> PString {
    let mut s = String::new();
    if add_bom {
        s.push_str(UTF8_BOM);
    }
    s.push_str(name);
    // keep the byte length within a Pascal string.
    while s.as_bytes().len() > MAX_NAME_LENGTH {
        s.pop();
    }
    PString(s)
}

/// A QT text sample: 16-bit big-endian length, the title, and a text
/// encoding attribute box that marks the title as Unicode.
pub fn text_sample(name: &str) -> Vec<u8> {
    let name = name.as_bytes();
    let len = std::cmp::min(name.len(), u16::MAX as usize);
    let mut data = Vec::with_capacity(2 + len + 12);
    data.extend_from_slice(&(len as u16).to_be_bytes());
    data.extend_from_slice(&name[..len]);
    // QuickTime Player requires 'encd' when the media language is
    // "undefined", and it keeps Unicode titles from garbling.
    data.extend_from_slice(&[
        0x00, 0x00, 0x00, 0x0c, // size: 12
        0x65, 0x6e, 0x63, 0x64, // type: 'encd'
        0x00, 0x00, 0x01, 0x00, // Unicode Encoding
    ]);
    data
}

/// Payload of a QT 'text' sample description (after the fourcc): the
/// defaulted display parameters of a chapter text track.
pub fn text_sample_description() -> Vec<u8> {
    let mut data = Vec::with_capacity(51);
    data.extend_from_slice(&[0u8; 6]); // reserved
    data.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    data.extend_from_slice(&0u32.to_be_bytes()); // display flags
    data.extend_from_slice(&1u32.to_be_bytes()); // text justification: center
    data.extend_from_slice(&[0u8; 6]); // background color
    data.extend_from_slice(&[0u8; 8]); // default text box
    data.extend_from_slice(&[0u8; 8]); // reserved / font number / face
    data.extend_from_slice(&[0u8; 6]); // foreground color
    data.push(0); // empty font name
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_format() {
        let points =
            parse_chapters("CHAPTER01=00:00:10.500\nCHAPTER01NAME=Intro\n").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name, "Intro");
        assert_eq!(points[0].start_100ns(), 105_000_000);
    }

    #[test]
    fn simple_format_default_name() {
        let points = parse_chapters("CHAPTER01=00:00:10.500\n").unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name, "Chapter 1");
        assert_eq!(points[0].start_100ns(), 105_000_000);
    }

    #[test]
    fn minimum_format() {
        let points = parse_chapters("00:00:00.000 One\n00:01:30.250 Two\n").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].name, "Two");
        assert_eq!(points[1].start_ns, 90_250_000_000);
    }

    #[test]
    fn bom_is_stripped() {
        let points = parse_chapters("\u{feff}00:00:01.000 Start\n").unwrap();
        assert_eq!(points[0].name, "Start");
    }

    #[test]
    fn out_of_range_times_rejected() {
        assert!(parse_chapters("00:61:00.000 Bad\n").is_err());
        assert!(parse_chapters("garbage\n").is_err());
    }

    #[test]
    fn bom_prefix_on_chpl_name() {
        let name = chpl_name("Intro", true);
        assert!(name.0.as_bytes().starts_with(&[0xef, 0xbb, 0xbf]));
    }

    #[test]
    fn text_sample_layout() {
        let data = text_sample("Hi");
        assert_eq!(&data[..4], &[0, 2, b'H', b'i']);
        assert_eq!(&data[4..8], &[0, 0, 0, 12]);
        assert_eq!(&data[8..12], b"encd");
    }
}
