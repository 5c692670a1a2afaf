use std::io::{self, Read, Write};
use crate::error::{Error, Result};

/// File magic, as the bytes appear on disk.
pub const MAGIC: &[u8; 4] = &[0x10, 0x85, 0x24, 0xBD];
pub const MAGIC_SIZE: usize = 4;

pub fn write_magic<W: Write>(mut writer: W) -> io::Result<()> {
    writer.write_all(MAGIC)
}

/// Read and verify the container magic. A stream shorter than the magic is
/// reported as `InvalidContainer`, not as an I/O error.
pub fn read_magic<R: Read>(mut reader: R) -> Result<()> {
    let mut magic = [0u8; MAGIC_SIZE];
    let mut filled = 0;
    while filled < MAGIC_SIZE {
        match reader.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled < MAGIC_SIZE || &magic != MAGIC {
        return Err(Error::InvalidContainer {
            found: hex::encode(&magic[..filled]),
        });
    }
    Ok(())
}
