//! Common imports for the box modules.
pub use std::io;

pub use crate::boxes::MP4Box;
pub use crate::mp4box::{BoxInfo, BoxReader, BoxWriter, FullBox, GenericBox};
pub use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
pub use crate::types::*;
