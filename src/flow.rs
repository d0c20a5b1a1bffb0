//! Flow identity: the tuple of header fields a sketch counts by
//!
//! A flow key is an immutable value with equality, a stable hash, and a
//! fixed-length byte encoding. The all-zero value of each variant is the
//! null sentinel meaning "no valid flow"; the capture layer never emits it.
//!
//! # Example
//!
//! ```
//! use sketchbench::flow::{FlowKey, TwoTuple};
//!
//! let key = TwoTuple::new(0x0a000001, 0x0a000002); // 10.0.0.1 -> 10.0.0.2
//! assert_eq!(key.encode().as_slice().len(), TwoTuple::ENCODED_LEN);
//! assert!(!key.is_null());
//! assert!(TwoTuple::default().is_null());
//! ```

use core::fmt;
use core::hash::Hash;

/// Encoded width of the widest variant (five-tuple: 4 + 4 + 2 + 2 + 1).
pub const MAX_ENCODED_LEN: usize = 13;

/// A flow key's fixed-length byte encoding, held inline.
///
/// Supports byte-wise XOR so invertible tables can fold keys in and out.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBytes {
    len: u8,
    buf: [u8; MAX_ENCODED_LEN],
}

impl KeyBytes {
    /// All-zero encoding of the given width.
    pub fn zeroed(len: usize) -> Self {
        debug_assert!(len <= MAX_ENCODED_LEN);
        Self {
            len: len as u8,
            buf: [0u8; MAX_ENCODED_LEN],
        }
    }

    /// Copy an encoding out of a slice.
    pub fn from_slice(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= MAX_ENCODED_LEN);
        let mut buf = [0u8; MAX_ENCODED_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            len: bytes.len() as u8,
            buf,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when every encoded byte is zero.
    pub fn is_zero(&self) -> bool {
        self.as_slice().iter().all(|&b| b == 0)
    }

    /// Fold another encoding of the same width into this one, byte-wise.
    pub fn xor_assign(&mut self, other: &KeyBytes) {
        debug_assert_eq!(self.len, other.len);
        for (a, b) in self.buf.iter_mut().zip(other.buf.iter()) {
            *a ^= *b;
        }
    }
}

impl fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_slice() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// The contract every flow-key variant satisfies.
///
/// `Default` is the null sentinel. Encodings are big-endian and exactly
/// `ENCODED_LEN` bytes, so they round-trip through [`FlowKey::decode`] and
/// can be XOR-ed as fixed-width bags.
pub trait FlowKey: Copy + Eq + Hash + fmt::Debug + Default + 'static {
    /// Width of the byte encoding.
    const ENCODED_LEN: usize;

    /// Human-readable variant name for reports.
    const NAME: &'static str;

    /// Fixed-length byte encoding.
    fn encode(&self) -> KeyBytes;

    /// Inverse of [`FlowKey::encode`]. `bytes` must be `ENCODED_LEN` long.
    fn decode(bytes: &[u8]) -> Self;

    /// Build a key from parsed header fields, keeping only the fields this
    /// variant identifies flows by.
    fn from_parts(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16, protocol: u8) -> Self;

    /// True for the null sentinel (all components zero).
    #[inline]
    fn is_null(&self) -> bool {
        *self == Self::default()
    }
}

fn ipv4(octets: u32) -> std::net::Ipv4Addr {
    std::net::Ipv4Addr::from(octets)
}

/// Source-IP flow key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct OneTuple {
    pub src_ip: u32,
}

impl OneTuple {
    pub fn new(src_ip: u32) -> Self {
        Self { src_ip }
    }
}

impl FlowKey for OneTuple {
    const ENCODED_LEN: usize = 4;
    const NAME: &'static str = "one-tuple";

    fn encode(&self) -> KeyBytes {
        KeyBytes::from_slice(&self.src_ip.to_be_bytes())
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut b = [0u8; 4];
        b.copy_from_slice(&bytes[..4]);
        Self {
            src_ip: u32::from_be_bytes(b),
        }
    }

    fn from_parts(src_ip: u32, _: u32, _: u16, _: u16, _: u8) -> Self {
        Self { src_ip }
    }
}

impl fmt::Display for OneTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ipv4(self.src_ip))
    }
}

/// Source/destination-IP flow key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct TwoTuple {
    pub src_ip: u32,
    pub dst_ip: u32,
}

impl TwoTuple {
    pub fn new(src_ip: u32, dst_ip: u32) -> Self {
        Self { src_ip, dst_ip }
    }
}

impl FlowKey for TwoTuple {
    const ENCODED_LEN: usize = 8;
    const NAME: &'static str = "two-tuple";

    fn encode(&self) -> KeyBytes {
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(&self.src_ip.to_be_bytes());
        buf[4..].copy_from_slice(&self.dst_ip.to_be_bytes());
        KeyBytes::from_slice(&buf)
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut src = [0u8; 4];
        let mut dst = [0u8; 4];
        src.copy_from_slice(&bytes[..4]);
        dst.copy_from_slice(&bytes[4..8]);
        Self {
            src_ip: u32::from_be_bytes(src),
            dst_ip: u32::from_be_bytes(dst),
        }
    }

    fn from_parts(src_ip: u32, dst_ip: u32, _: u16, _: u16, _: u8) -> Self {
        Self { src_ip, dst_ip }
    }
}

impl fmt::Display for TwoTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", ipv4(self.src_ip), ipv4(self.dst_ip))
    }
}

/// Full transport five-tuple flow key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct FiveTuple {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}

impl FiveTuple {
    pub fn new(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
        }
    }
}

impl FlowKey for FiveTuple {
    const ENCODED_LEN: usize = 13;
    const NAME: &'static str = "five-tuple";

    fn encode(&self) -> KeyBytes {
        let mut buf = [0u8; 13];
        buf[..4].copy_from_slice(&self.src_ip.to_be_bytes());
        buf[4..8].copy_from_slice(&self.dst_ip.to_be_bytes());
        buf[8..10].copy_from_slice(&self.src_port.to_be_bytes());
        buf[10..12].copy_from_slice(&self.dst_port.to_be_bytes());
        buf[12] = self.protocol;
        KeyBytes::from_slice(&buf)
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut src = [0u8; 4];
        let mut dst = [0u8; 4];
        src.copy_from_slice(&bytes[..4]);
        dst.copy_from_slice(&bytes[4..8]);
        Self {
            src_ip: u32::from_be_bytes(src),
            dst_ip: u32::from_be_bytes(dst),
            src_port: u16::from_be_bytes([bytes[8], bytes[9]]),
            dst_port: u16::from_be_bytes([bytes[10], bytes[11]]),
            protocol: bytes[12],
        }
    }

    fn from_parts(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16, protocol: u8) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            protocol,
        }
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}/{}",
            ipv4(self.src_ip),
            self.src_port,
            ipv4(self.dst_ip),
            self.dst_port,
            self.protocol
        )
    }
}

/// Run-time selector for the flow-key variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum FlowKeyKind {
    /// Source IP only.
    OneTuple,
    /// Source and destination IP.
    TwoTuple,
    /// Source/destination IP and port plus protocol.
    FiveTuple,
}

impl fmt::Display for FlowKeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowKeyKind::OneTuple => OneTuple::NAME,
            FlowKeyKind::TwoTuple => TwoTuple::NAME,
            FlowKeyKind::FiveTuple => FiveTuple::NAME,
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let k = FiveTuple::new(0xc0a80101, 0x08080808, 443, 51234, 6);
        assert_eq!(FiveTuple::decode(k.encode().as_slice()), k);

        let k = TwoTuple::new(1, u32::MAX);
        assert_eq!(TwoTuple::decode(k.encode().as_slice()), k);

        let k = OneTuple::new(0x7f000001);
        assert_eq!(OneTuple::decode(k.encode().as_slice()), k);
    }

    #[test]
    fn test_null_sentinel() {
        assert!(OneTuple::default().is_null());
        assert!(TwoTuple::default().is_null());
        assert!(FiveTuple::default().is_null());
        assert!(!FiveTuple::new(1, 2, 3, 4, 5).is_null());
        assert!(FiveTuple::default().encode().is_zero());
    }

    #[test]
    fn test_from_parts_projects_fields() {
        let one = OneTuple::from_parts(10, 20, 30, 40, 6);
        assert_eq!(one, OneTuple::new(10));

        let two = TwoTuple::from_parts(10, 20, 30, 40, 6);
        assert_eq!(two, TwoTuple::new(10, 20));

        let five = FiveTuple::from_parts(10, 20, 30, 40, 6);
        assert_eq!(five, FiveTuple::new(10, 20, 30, 40, 6));
    }

    #[test]
    fn test_xor_cancels() {
        let a = FiveTuple::new(0xc0a80101, 0x08080808, 443, 51234, 6).encode();
        let b = FiveTuple::new(0x0a000001, 0x0a000002, 80, 1024, 17).encode();

        let mut bag = KeyBytes::zeroed(FiveTuple::ENCODED_LEN);
        bag.xor_assign(&a);
        bag.xor_assign(&b);
        bag.xor_assign(&a);
        assert_eq!(bag, b);

        bag.xor_assign(&b);
        assert!(bag.is_zero());
    }

    #[test]
    fn test_display() {
        let k = FiveTuple::new(0xc0a80101, 0x08080808, 443, 51234, 6);
        assert_eq!(k.to_string(), "192.168.1.1:443 -> 8.8.8.8:51234/6");
    }
}
