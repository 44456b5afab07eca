use std::path::Path;

use crate::error::{Error, Result};

/// Bytes of addressable memory, and so of every program image.
pub const MEMORY_SIZE: usize = 256;

/// Bytes at the start of a `.mem` container that are not program.
pub const HEADER_LEN: usize = 4;

/// Header written by [`encode_container`]. Decoding ignores its content.
pub const HEADER: [u8; HEADER_LEN] = [0x03, b'A', b'H', b'M'];

/// A loadable program: exactly [`MEMORY_SIZE`] bytes.
///
/// Loading an image into a machine copies it, so the two never share
/// storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    bytes: [u8; MEMORY_SIZE],
}

impl ProgramImage {
    pub fn zeroed() -> Self {
        Self {
            bytes: [0; MEMORY_SIZE],
        }
    }

    /// Take `bytes` verbatim. Must be exactly [`MEMORY_SIZE`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = <[u8; MEMORY_SIZE]>::try_from(bytes).map_err(|_| Error::LengthMismatch {
            expected: MEMORY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Decode a persisted `.mem` container. Containers holding fewer than
    /// [`MEMORY_SIZE`] program bytes are rejected as malformed.
    pub fn from_container(raw: &[u8]) -> Result<Self> {
        let decoded = decode_container(raw);
        if decoded.len() < MEMORY_SIZE {
            return Err(Error::MalformedImage {
                decoded: decoded.len(),
            });
        }
        Self::from_bytes(&decoded)
    }

    pub fn bytes(&self) -> &[u8; MEMORY_SIZE] {
        &self.bytes
    }

    /// Replace the contents. The replacement must have the same length.
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != MEMORY_SIZE {
            return Err(Error::LengthMismatch {
                expected: MEMORY_SIZE,
                actual: bytes.len(),
            });
        }
        self.bytes.copy_from_slice(bytes);
        Ok(())
    }

    pub fn to_container(&self) -> Vec<u8> {
        encode_container(&self.bytes)
    }
}

impl From<[u8; MEMORY_SIZE]> for ProgramImage {
    fn from(bytes: [u8; MEMORY_SIZE]) -> Self {
        Self { bytes }
    }
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Extract program bytes from a container: skip the header, then keep every
/// other byte (offsets 4, 6, 8, ...) until [`MEMORY_SIZE`] bytes are taken
/// or the input runs out. The bytes in between are padding.
pub fn decode_container(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .skip(HEADER_LEN)
        .step_by(2)
        .take(MEMORY_SIZE)
        .copied()
        .collect()
}

/// Build a container: [`HEADER`], then each program byte followed by a zero.
pub fn encode_container(bytes: &[u8; MEMORY_SIZE]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 2 * MEMORY_SIZE);
    out.extend_from_slice(&HEADER);
    for &b in bytes {
        out.push(b);
        out.push(0);
    }
    out
}

/// Read a container from disk.
///
/// A missing file is not an error: it yields `Ok(None)` so callers can
/// report it however they like. Other I/O faults and short containers are
/// errors.
pub fn load(path: impl AsRef<Path>) -> Result<Option<ProgramImage>> {
    let raw = match std::fs::read(path.as_ref()) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    ProgramImage::from_container(&raw).map(Some)
}

/// Write `image` to disk as a container.
pub fn save(path: impl AsRef<Path>, image: &ProgramImage) -> Result<()> {
    std::fs::write(path, image.to_container())?;
    Ok(())
}
