use std::error::Error;
use std::fmt;
use std::io;

use crate::mem::{BIOS_SIZE, ROM_MAX_SIZE};

#[derive(Debug)]
pub enum CoreError {
    BiosSize { len: usize },
    RomSize { len: usize },
    ThumbUnsupported { pc: u32 },
    Io(io::Error),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CoreError::BiosSize { len } => {
                write!(f, "BIOS image is {len} bytes, expected at most {BIOS_SIZE}")
            }
            CoreError::RomSize { len } => {
                write!(f, "ROM image is {len} bytes, expected 1..={ROM_MAX_SIZE}")
            }
            CoreError::ThumbUnsupported { pc } => {
                write!(f, "THUMB state entered at {pc:#010x}; only ARM code is interpreted")
            }
            CoreError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CoreError::Io(e) => Some(e),
            CoreError::BiosSize { .. } => None,
            CoreError::RomSize { .. } => None,
            CoreError::ThumbUnsupported { .. } => None,
        }
    }
}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        CoreError::Io(e)
    }
}
