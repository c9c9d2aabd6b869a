//! Compact, reversible encoding of short market-data source tags.
//!
//! A tag of up to four ASCII bytes packs into a `u32` with the first byte in
//! the low byte, so `"BBG"` becomes `0x0047_4242`. Zero is the default
//! source.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DataSrcError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataSrc(u32);

impl DataSrc {
    pub const DEFAULT: DataSrc = DataSrc(0);
    pub const MAX_LEN: usize = 4;

    pub const fn from_id(id: u32) -> Self {
        DataSrc(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }

    pub const fn is_default(self) -> bool {
        self.0 == 0
    }

    /// Packs `name` into an id. The empty string is the default source.
    pub fn encode(name: &str) -> Result<Self, DataSrcError> {
        let bytes = name.as_bytes();
        if bytes.len() > Self::MAX_LEN {
            return Err(DataSrcError::TooLong(name.to_string()));
        }
        if bytes.iter().any(|b| *b == 0 || !b.is_ascii()) {
            return Err(DataSrcError::InvalidByte(name.to_string()));
        }
        Ok(DataSrc(pack(bytes)))
    }

    /// Unpacks the id back into its tag. Stops at the first zero byte.
    pub fn name(self) -> String {
        self.to_string()
    }

    fn bytes(self) -> impl Iterator<Item = u8> {
        let mut id = self.0;
        std::iter::from_fn(move || {
            if id == 0 {
                return None;
            }
            let b = (id & 0xFF) as u8;
            id >>= 8;
            Some(b)
        })
        .take_while(|b| *b != 0)
    }
}

const fn pack(bytes: &[u8]) -> u32 {
    let mut id = 0u32;
    let mut i = bytes.len();
    while i > 0 {
        i -= 1;
        id = (id << 8) | bytes[i] as u32;
    }
    id
}

impl fmt::Display for DataSrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes() {
            write!(f, "{}", char::from(b))?;
        }
        Ok(())
    }
}

impl fmt::Debug for DataSrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataSrc({:?}, {:#x})", self.name(), self.0)
    }
}

impl FromStr for DataSrc {
    type Err = DataSrcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSrc::encode(s)
    }
}

impl TryFrom<String> for DataSrc {
    type Error = DataSrcError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DataSrc::encode(&s)
    }
}

impl From<DataSrc> for String {
    fn from(src: DataSrc) -> Self {
        src.name()
    }
}

impl From<DataSrc> for u32 {
    fn from(src: DataSrc) -> Self {
        src.0
    }
}
