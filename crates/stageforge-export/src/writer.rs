//! Big-endian record emission
//!
//! A thin wrapper over any `io::Write` sink that speaks the output format's
//! conventions: big-endian integers, single-precision floats, NUL-terminated
//! names padded to 4 bytes, and explicit zero bytes for every reserved
//! region. The exporter never leaves a gap; the runtime loader expects
//! byte-exact output.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use stageforge_core::math::{UVec2, Vec2, Vec3};

use crate::offsets::name_len;

/// Big-endian record writer over an arbitrary sink
#[derive(Debug)]
pub struct BinWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> BinWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes emitted so far
    pub fn position(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn put_u16(&mut self, value: u16) -> std::io::Result<()> {
        self.written += 2;
        self.inner.write_u16::<BigEndian>(value)
    }

    pub fn put_u32(&mut self, value: u32) -> std::io::Result<()> {
        self.written += 4;
        self.inner.write_u32::<BigEndian>(value)
    }

    pub fn put_f32(&mut self, value: f32) -> std::io::Result<()> {
        self.written += 4;
        self.inner.write_f32::<BigEndian>(value)
    }

    pub fn put_vec2(&mut self, value: Vec2) -> std::io::Result<()> {
        self.put_f32(value.x)?;
        self.put_f32(value.y)
    }

    pub fn put_vec3(&mut self, value: Vec3) -> std::io::Result<()> {
        self.put_f32(value.x)?;
        self.put_f32(value.y)?;
        self.put_f32(value.z)
    }

    pub fn put_uvec2(&mut self, value: UVec2) -> std::io::Result<()> {
        self.put_u32(value.x)?;
        self.put_u32(value.y)
    }

    /// A quantized three-axis rotation: three u16s, 6 bytes
    pub fn put_rotation(&mut self, rotation: [u16; 3]) -> std::io::Result<()> {
        for axis in rotation {
            self.put_u16(axis)?;
        }
        Ok(())
    }

    /// Explicit zero bytes for reserved regions
    pub fn put_nulls(&mut self, count: usize) -> std::io::Result<()> {
        const ZEROS: [u8; 64] = [0; 64];
        let mut remaining = count;
        while remaining > 0 {
            let chunk = remaining.min(ZEROS.len());
            self.inner.write_all(&ZEROS[..chunk])?;
            remaining -= chunk;
        }
        self.written += count as u64;
        Ok(())
    }

    /// A name entry: raw bytes, one NUL terminator, zero padding to the next
    /// 4-byte boundary. Total length always matches `name_len`.
    pub fn put_name(&mut self, name: &str) -> std::io::Result<()> {
        let bytes = name.as_bytes();
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        let padding = name_len(name) as usize - bytes.len();
        self.put_nulls(padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(f: impl FnOnce(&mut BinWriter<Vec<u8>>)) -> Vec<u8> {
        let mut writer = BinWriter::new(Vec::new());
        f(&mut writer);
        writer.into_inner()
    }

    #[test]
    fn test_big_endian_integers() {
        let bytes = collect(|w| {
            w.put_u16(0x1234).expect("write");
            w.put_u32(0xAABBCCDD).expect("write");
        });
        assert_eq!(bytes, [0x12, 0x34, 0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_big_endian_float() {
        let bytes = collect(|w| w.put_f32(1.0).expect("write"));
        assert_eq!(bytes, [0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_vectors_are_componentwise() {
        let bytes = collect(|w| {
            w.put_vec3(Vec3::new(1.0, 2.0, 3.0)).expect("write");
        });
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[0..4], [0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(&bytes[4..8], [0x40, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_nulls_are_explicit_zeros() {
        let bytes = collect(|w| w.put_nulls(130).expect("write"));
        assert_eq!(bytes.len(), 130);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_name_terminator_and_padding() {
        let bytes = collect(|w| w.put_name("abc").expect("write"));
        assert_eq!(bytes, [b'a', b'b', b'c', 0]);

        let bytes = collect(|w| w.put_name("abcd").expect("write"));
        assert_eq!(bytes, [b'a', b'b', b'c', b'd', 0, 0, 0, 0]);
    }

    #[test]
    fn test_every_name_entry_is_4_byte_aligned() {
        for name in ["", "a", "ab", "abc", "abcd", "a long model name"] {
            let bytes = collect(|w| w.put_name(name).expect("write"));
            assert_eq!(bytes.len() % 4, 0, "name {name:?}");
            assert_eq!(bytes.len() as u32, name_len(name));
        }
    }

    #[test]
    fn test_position_tracks_written_bytes() {
        let mut writer = BinWriter::new(Vec::new());
        writer.put_u32(7).expect("write");
        writer.put_rotation([1, 2, 3]).expect("write");
        writer.put_nulls(2).expect("write");
        assert_eq!(writer.position(), 12);
        assert_eq!(writer.into_inner().len(), 12);
    }
}
