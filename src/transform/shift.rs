//! Byte-at-a-time in-place rewrite

use crate::transform::{Action, BYTE_RANGE};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Add `delta` to `byte`, wrapping modulo 256
pub fn shift_byte(byte: u8, delta: u8) -> u8 {
    ((byte as u16 + delta as u16) % BYTE_RANGE) as u8
}

/// Rewrite every byte of `stream` in place
///
/// The stream must be positioned at offset 0. Each iteration reads one byte,
/// steps the cursor back over it, and writes the shifted value, which leaves
/// the cursor where the next read begins. The stream length never changes.
///
/// # Returns
/// Number of bytes rewritten
///
/// # Errors
/// The first read, seek, or write failure aborts the rewrite. Bytes before
/// the failing offset have already been replaced.
pub fn transform<S>(stream: &mut S, key: i64, action: Action) -> io::Result<u64>
where
    S: Read + Write + Seek,
{
    let delta = action.delta(key);
    let mut byte = [0u8; 1];
    let mut rewritten = 0u64;

    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Ok(rewritten),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }

        let shifted = shift_byte(byte[0], delta);
        stream.seek(SeekFrom::Current(-1))?;
        stream.write_all(&[shifted])?;
        rewritten += 1;
    }
}
