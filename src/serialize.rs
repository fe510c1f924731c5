//! Basic serializer / deserializer.
//!
//! The FromBytes/ToBytes traits and the def_struct! macro are defined here,
//! together with the FromBytes/ToBytes implementations for the primitive
//! integer types.
//!
//! Everything is big-endian on the wire, as per ISO/IEC 14496-12.
use std::convert::TryInto;
use std::io::{self, ErrorKind::UnexpectedEof};

use auto_impl::auto_impl;

use crate::types::FourCC;

/// Byte reader in a stream.
#[auto_impl(&mut)]
pub trait ReadBytes: BoxBytes {
    /// Read an exact number of bytes, return a reference to the buffer.
    fn read(&mut self, amount: u64) -> io::Result<&[u8]>;
    /// Skip some bytes in the input.
    fn skip(&mut self, amount: u64) -> io::Result<()>;
    /// How much data is left?
    fn left(&self) -> u64;
}

/// Byte writer in a stream.
#[auto_impl(&mut)]
pub trait WriteBytes: BoxBytes {
    /// Write an exact number of bytes.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;
    /// Zero-fill some bytes in the output.
    fn skip(&mut self, amount: u64) -> io::Result<()>;
}

impl BoxBytes for Box<dyn WriteBytes + '_> {
    fn pos(&self) -> u64 {
        (**self).pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        (**self).seek(pos)
    }
    fn size(&self) -> u64 {
        (**self).size()
    }
    fn version(&self) -> u8 {
        (**self).version()
    }
    fn set_version(&mut self, version: u8) {
        (**self).set_version(version)
    }
    fn flags(&self) -> u32 {
        (**self).flags()
    }
    fn set_flags(&mut self, flags: u32) {
        (**self).set_flags(flags)
    }
    fn fourcc(&self) -> FourCC {
        (**self).fourcc()
    }
    fn set_fourcc(&mut self, fourcc: FourCC) {
        (**self).set_fourcc(fourcc)
    }
}

impl WriteBytes for Box<dyn WriteBytes + '_> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        (**self).skip(amount)
    }
}

/// A bunch of optional methods for reading/writing boxes rather than
/// simple structs. All the methods have defaults.
#[auto_impl(&mut)]
pub trait BoxBytes {
    /// Get current position in the stream.
    fn pos(&self) -> u64 {
        unimplemented!()
    }
    /// Seek to a position in the stream.
    fn seek(&mut self, _pos: u64) -> io::Result<()> {
        unimplemented!()
    }
    /// Size of the file / stream.
    fn size(&self) -> u64 {
        unimplemented!()
    }
    /// Version of the full box currently being (de)serialized.
    fn version(&self) -> u8 {
        0
    }
    /// Set version metadata.
    fn set_version(&mut self, _version: u8) {}
    /// Flags of the full box currently being (de)serialized.
    fn flags(&self) -> u32 {
        0
    }
    /// Set flags metadata.
    fn set_flags(&mut self, _flags: u32) {}
    /// Get last FourCC we read.
    fn fourcc(&self) -> FourCC {
        unimplemented!()
    }
    /// Set last FourCC we read.
    fn set_fourcc(&mut self, _fourcc: FourCC) {}
}

/// Implementation of ReadBytes on a byte slice.
impl ReadBytes for &[u8] {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let mut amount = amount as usize;
        if amount == 0 {
            amount = self.len();
        }
        if amount > self.len() {
            return Err(ioerr!(UnexpectedEof));
        }
        let res = &self[0..amount];
        (*self) = &self[amount..];
        Ok(res)
    }

    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if amount > self.len() as u64 {
            return Err(ioerr!(UnexpectedEof));
        }
        (*self) = &self[amount as usize..];
        Ok(())
    }

    fn left(&self) -> u64 {
        self.len() as u64
    }
}

// Uses defaults.
impl BoxBytes for &[u8] {}

/// Trait to deserialize a type.
pub trait FromBytes {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> io::Result<Self>
    where
        Self: Sized;
    fn min_size() -> usize;
}

/// Trait to serialize a type.
pub trait ToBytes {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> io::Result<()>;
}

// Convenience macro to implement FromBytes/ToBytes for integer types.
macro_rules! def_from_to_bytes {
    ($type:ident) => {
        impl FromBytes for $type {
            fn from_bytes<R: ReadBytes>(bytes: &mut R) -> io::Result<Self> {
                let sz = std::mem::size_of::<$type>();
                let data = bytes.read(sz as u64)?;
                let data = data.try_into().map_err(|_| UnexpectedEof)?;
                Ok($type::from_be_bytes(data))
            }
            fn min_size() -> usize {
                std::mem::size_of::<$type>()
            }
        }
        impl ToBytes for $type {
            fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> io::Result<()> {
                bytes.write(&self.to_be_bytes()[..])
            }
        }
    };
}

def_from_to_bytes!(u8);
def_from_to_bytes!(u16);
def_from_to_bytes!(u32);
def_from_to_bytes!(u64);
def_from_to_bytes!(u128);
def_from_to_bytes!(i8);
def_from_to_bytes!(i16);
def_from_to_bytes!(i32);
def_from_to_bytes!(i64);

/// A `Vec<T>` reads elements until the stream runs dry, and writes
/// them all back to back. This is how child-box lists and trailing
/// arrays (e.g. `ftyp` compatible brands) are expressed.
impl<T: FromBytes> FromBytes for Vec<T> {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Vec<T>> {
        let mut v = Vec::new();
        let min = std::cmp::max(T::min_size() as u64, 1);
        while stream.left() >= min {
            v.push(T::from_bytes(stream)?);
        }
        Ok(v)
    }
    fn min_size() -> usize {
        0
    }
}

impl<T: ToBytes> ToBytes for Vec<T> {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        for elem in self {
            elem.to_bytes(stream)?;
        }
        Ok(())
    }
}

/// A macro to define a struct and implement the FromBytes/ToBytes traits for it.
///
/// Usage:
///
/// ```text
/// def_struct! { Name,
///     field1:     u32,        // primitive type
///     field2:     Time,       // any type that implements FromBytes/ToBytes
///     skip:       8,          // skip 8 bytes while serializing / deserializing.
///     ....
/// }
/// ```
#[macro_export]
macro_rules! def_struct {
    // minimum size for a certain type. we hard-code the integers here.
    (@min_size u8) => { 1 };
    (@min_size u16) => { 2 };
    (@min_size u32) => { 4 };
    (@min_size u64) => { 8 };
    (@min_size i8) => { 1 };
    (@min_size i16) => { 2 };
    (@min_size i32) => { 4 };
    (@min_size i64) => { 8 };
    (@min_size $type:ident $(<$gen:ty>)?) => {
        <$type $(<$gen>)?>::min_size()
    };
    (@min_size $amount:expr) => { $amount };

    // @def_struct: Define a struct line by line using accumulation and recursion.
    (@def_struct $(#[$outer:meta])* $name:ident, $( $field:tt: $type:tt $(<$gen:ty>)? ),* $(,)?) => {
        def_struct!(@def_struct_ $(#[$outer])* $name, [ $( $field: $type $(<$gen>)?, )* ] -> []);
    };
    // During definition of the struct, we skip all the "skip" entries.
    (@def_struct_ $(#[$outer:meta])* $name:ident, [ skip: $amount:tt, $($tt:tt)*] -> [ $($res:tt)* ]) => {
        def_struct!(@def_struct_ $(#[$outer])* $name, [$($tt)*] -> [ $($res)* ]);
    };
    // Add a normal field.
    (@def_struct_ $(#[$outer:meta])* $name:ident, [ $field:ident: $type:ident $(<$gen:ty>)?, $($tt:tt)*] -> [ $($res:tt)* ]) => {
        def_struct!(@def_struct_ $(#[$outer])* $name, [$($tt)*] -> [ $($res)* pub $field: $type $(<$gen>)?, ]);
    };
    // Final.
    (@def_struct_ $(#[$outer:meta])* $name: ident, [] -> [ $($res:tt)* ]) => {
        $(#[$outer])*
        pub struct $name { $(
            $res
        )* }
    };

    // @from_bytes: Generate the from_bytes details for a struct.
    (@from_bytes $name:ident, $base:tt, $stream:tt, $( $field:tt: $type:tt $(<$gen:ty>)? ),* $(,)?) => {
        def_struct!(@from_bytes_ $name, $base, $stream, [ $( $field: $type $(<$gen>)?, )* ] -> [] []);
    };
    // Insert a skip instruction.
    (@from_bytes_ $name:ident, $base:tt, $stream:ident, [ skip: $amount:tt, $($tt:tt)*]
        -> [ $($set:tt)* ] [ $($fields:tt)* ] ) => {
        def_struct!(@from_bytes_ $name, $base, $stream, [ $($tt)* ] ->
            [ $($set)* [ $crate::serialize::ReadBytes::skip($stream, $amount as u64)?; ] ] [$($fields)*]);
    };
    // Set a field.
    (@from_bytes_ $name:ident, $base:tt, $stream:ident, [ $field:tt: $type:tt $(<$gen:ty>)?, $($tt:tt)*]
        -> [ $($set:tt)* ] [ $($fields:tt)* ]) => {
        def_struct!(@from_bytes_ $name, $base, $stream, [ $($tt)* ] ->
            [ $($set)* [ let $field = <$type $(<$gen>)?>::from_bytes($stream)?; ] ] [ $($fields)* $field ]);
    };
    // Final.
    (@from_bytes_ $name:ident, [ $($base:tt)* ], $_stream:tt, [] -> [ $([$($set:tt)*])* ] [ $($field:tt)* ]) => {
        {
        $(
            $($set)*
        )*
        Ok($name {
            $($base)*
            $(
                $field,
            )*
        }) }
    };

    // @to_bytes: Generate the to_bytes details for a struct.
    (@to_bytes $struct:expr, $stream:ident, $( $field:tt: $type:tt $(<$gen:ty>)? ),* $(,)?) => {
        def_struct!(@to_bytes_ $struct, $stream, [ $( $field: $type $(<$gen>)?, )* ] -> []);
    };
    // Insert a skip instruction.
    (@to_bytes_ $struct:expr, $stream:ident, [ skip: $amount:tt, $($tt:tt)*] -> [ $($set:tt)* ] ) => {
        def_struct!(@to_bytes_ $struct, $stream, [ $($tt)* ] ->
            [ $($set)* [ $crate::serialize::WriteBytes::skip($stream, $amount as u64)?; ] ] );
    };
    // Write a field value.
    (@to_bytes_ $struct:expr, $stream:ident, [ $field:tt: $type:tt $(<$gen:ty>)?, $($tt:tt)*] -> [ $($set:tt)* ]) => {
        def_struct!(@to_bytes_ $struct, $stream, [ $($tt)* ] ->
            [ $($set)* [ $struct.$field.to_bytes($stream)?; ] ]);
    };
    // Final.
    (@to_bytes_ $_struct:expr, $_stream:tt, [] -> [ $([$($set:tt)*])* ] ) => {
        {
            $(
                $($set)*
            )*
            Ok::<_, std::io::Error>(())
        }
    };

    // Debug helper, skips "skip" entries.
    (@check_skip $this:expr, $dbg:expr, skip) => {};
    (@check_skip $this:expr, $dbg:expr, $field:ident) => {
        $dbg.field(stringify!($field), &$this.$field);
    };

    // Main entry point to define just one struct.
    ($(#[$outer:meta])* $name:ident, $($field:tt: $type:tt $(<$gen:ty>)?),* $(,)?) => {
        def_struct!(@def_struct $(#[$outer])* #[derive(Clone)] $name,
            $(
                $field: $type $(<$gen>)?,
            )*
        );

        // Debug implementation that skips "skip".
        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                let mut dbg = f.debug_struct(stringify!($name));
                $(
                    def_struct!(@check_skip self, dbg, $field);
                )*
                dbg.finish()
            }
        }

        impl FromBytes for $name {
            fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
                def_struct!(@from_bytes $name, [], stream, $(
                    $field: $type $(<$gen>)?,
                )*)
            }

            fn min_size() -> usize {
                $( def_struct!(@min_size $type $(<$gen>)?) +)* 0
            }
        }

        impl ToBytes for $name {
            fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
                def_struct!(@to_bytes self, stream, $(
                    $field: $type $(<$gen>)?,
                )*)
            }
        }
    };
}
