//! Binary I/O primitives shared by the container and the outer codec.
//!
//! # Endianness
//! Every multi-byte integer in the ARZIP container is big-endian.  This is
//! frozen; there is no version field and no negotiation.  The magic is five
//! ASCII bytes.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// On-disk magic prefix of every archive.
pub const MAGIC: &[u8; 5] = b"ARZIP";

/// Emit the five magic bytes.
pub fn write_magic<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)
}

/// Read five bytes and report whether they are the ARZIP magic.
///
/// An I/O failure (including a stream shorter than five bytes) is reported
/// as an error; a wrong prefix returns `Ok(false)`.
pub fn check_magic<R: Read>(r: &mut R) -> io::Result<bool> {
    let mut buf = [0u8; 5];
    r.read_exact(&mut buf)?;
    Ok(&buf == MAGIC)
}

#[inline]
pub fn write_u64<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_u64::<BigEndian>(value)
}

#[inline]
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    r.read_u64::<BigEndian>()
}

#[inline]
pub fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_u32::<BigEndian>(value)
}

#[inline]
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    r.read_u32::<BigEndian>()
}

/// Fill `buf` from `r`, retrying short reads, and return the byte count.
///
/// Returns less than `buf.len()` only at end of stream.  This is the read
/// primitive of the RS codec, which must distinguish a full super-block
/// from a trailer from a truncated tail by the byte count alone.
pub fn read_fully<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn integers_round_trip_big_endian() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0x0102_0304_0506_0708).unwrap();
        write_u32(&mut buf, 0xA1B2_C3D4).unwrap();
        assert_eq!(
            buf,
            [1, 2, 3, 4, 5, 6, 7, 8, 0xA1, 0xB2, 0xC3, 0xD4]
        );
        let mut r = Cursor::new(buf);
        assert_eq!(read_u64(&mut r).unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(read_u32(&mut r).unwrap(), 0xA1B2_C3D4);
    }

    #[test]
    fn magic_is_validated() {
        let mut r = Cursor::new(b"ARZIPxyz".to_vec());
        assert!(check_magic(&mut r).unwrap());
        let mut r = Cursor::new(b"NOTIT".to_vec());
        assert!(!check_magic(&mut r).unwrap());
        let mut r = Cursor::new(b"AR".to_vec());
        assert!(check_magic(&mut r).is_err());
    }

    #[test]
    fn read_fully_reports_short_tail() {
        let mut r = Cursor::new(vec![7u8; 10]);
        let mut buf = [0u8; 16];
        assert_eq!(read_fully(&mut r, &mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], &[7u8; 10]);
    }
}
