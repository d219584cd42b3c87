//! Shared binary read/write helpers built on top of `bytes::Buf`/`BufMut`.

pub mod error;
pub mod io;

pub use error::BinaryError;
pub use io::{BinaryReader, BinaryWriter};
