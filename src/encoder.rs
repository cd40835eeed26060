//! C1: stateless binary encoding primitives shared by the coinbase builder
//! and the Stratum bridge — VarInt/CompactSize, double-SHA256, Merkle
//! accumulation, and a minimal script builder.
//!
//! Grounded on `template.py`'s `serialize_int`/`compact_size`/`merkle_branch`/
//! `merkle_root`/`Script` (MentalCollatz odo-miner) and the teacher's
//! `sha256d` helper (`miner.rs`).

use sha2::{Digest, Sha256};

/// `OP_0`: see `Script::push_int`.
pub const OP_0: u8 = 0x00;
/// Any raw push longer than this must use `push_data`'s length-prefix form;
/// the spec treats ≥`OP_PUSHDATA1` pushes as out of scope (script bodies here
/// are always short: height, extra-nonce, aux tags).
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_1: u8 = 0x51;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Double SHA-256: `SHA256(SHA256(data))`.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// The chain's minimal-encoding "script number": little-endian, minimal
/// byte count, with a trailing `0x00` appended if the high bit of the last
/// byte would otherwise be read as a sign bit. Zero encodes to the empty
/// byte string.
pub fn var_int(n: u64) -> Vec<u8> {
    let mut result = Vec::new();
    let mut n = n;
    if n == 0 {
        return result;
    }
    while n != 0 {
        result.push((n & 0xff) as u8);
        n >>= 8;
    }
    if *result.last().unwrap() & 0x80 != 0 {
        result.push(0);
    }
    result
}

/// Bitcoin-style CompactSize length prefix.
pub fn compact_size(n: u64) -> Vec<u8> {
    if n < 253 {
        vec![n as u8]
    } else if n <= 0xffff {
        let mut out = vec![0xfd];
        out.extend_from_slice(&(n as u16).to_le_bytes());
        out
    } else if n <= 0xffff_ffff {
        let mut out = vec![0xfe];
        out.extend_from_slice(&(n as u32).to_le_bytes());
        out
    } else {
        let mut out = vec![0xff];
        out.extend_from_slice(&n.to_le_bytes());
        out
    }
}

/// Computes the Merkle branch (sibling hashes) needed to combine with a
/// coinbase txid to derive the block's Merkle root. Destructive on its
/// input, mirroring the original's pop-front/duplicate-last/pairwise-hash
/// algorithm.
pub fn merkle_branch(txids: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut level: Vec<[u8; 32]> = txids.to_vec();
    let mut branch = Vec::new();
    while !level.is_empty() {
        branch.push(level.remove(0));
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&pair[0]);
                buf.extend_from_slice(&pair[1]);
                sha256d(&buf)
            })
            .collect();
    }
    branch
}

/// Folds a coinbase txid with a Merkle branch to produce the block's
/// Merkle root.
pub fn merkle_root(coinbase_txid: [u8; 32], branch: &[[u8; 32]]) -> [u8; 32] {
    let mut acc = coinbase_txid;
    for sibling in branch {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&acc);
        buf.extend_from_slice(sibling);
        acc = sha256d(&buf);
    }
    acc
}

/// A minimal append-only script builder: pushes of opcodes, raw byte
/// strings, and non-negative integers (small ints compile to `OP_0`/
/// `OP_1..16`, larger ones fall back to `var_int` pushed as data).
#[derive(Debug, Default, Clone)]
pub struct Script {
    pub data: Vec<u8>,
}

impl Script {
    pub fn new() -> Self {
        Script::default()
    }

    pub fn push_byte(mut self, b: u8) -> Self {
        self.data.push(b);
        self
    }

    /// Pushes raw bytes with a one-byte length prefix. `bytes.len()` must be
    /// `< OP_PUSHDATA1`.
    pub fn push_bytes(mut self, bytes: &[u8]) -> Self {
        assert!(
            bytes.len() < OP_PUSHDATA1 as usize,
            "long pushes are not supported"
        );
        self.data.push(bytes.len() as u8);
        self.data.extend_from_slice(bytes);
        self
    }

    /// Pushes a non-negative integer. When `use_opcode_shortcuts` is true,
    /// `0` compiles to `OP_0` and `1..=16` to `OP_1..OP_16`; otherwise (and
    /// for larger values) the integer is `var_int`-encoded and pushed as
    /// data — used for the coinbase extra-nonce push, which must change
    /// predictably byte-for-byte as the nonce increments.
    pub fn push_int(self, n: u64, use_opcode_shortcuts: bool) -> Self {
        if use_opcode_shortcuts {
            if n == 0 {
                return self.push_byte(OP_0);
            }
            if n <= 16 {
                return self.push_byte((n as u8) + OP_1 - 1);
            }
        }
        let encoded = var_int(n);
        self.push_bytes(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_int_round_trips() {
        // decoding just reverses the little-endian byte accumulation,
        // dropping a trailing 0x00 sign-guard byte if present.
        fn decode(bytes: &[u8]) -> u64 {
            let mut bytes = bytes.to_vec();
            if bytes.last() == Some(&0) && bytes.len() > 1 {
                let second_last = bytes[bytes.len() - 2];
                if second_last & 0x80 != 0 {
                    bytes.pop();
                }
            }
            let mut n: u64 = 0;
            for (i, b) in bytes.iter().enumerate() {
                n |= (*b as u64) << (8 * i);
            }
            n
        }
        for n in [
            0u64,
            1,
            252,
            253,
            0xFFFF,
            0x10000,
            0xFFFF_FFFF,
            0x1_0000_0000,
        ] {
            let encoded = var_int(n);
            assert_eq!(decode(&encoded), n, "round trip failed for {n}");
        }
    }

    #[test]
    fn compact_size_boundaries() {
        assert_eq!(compact_size(0), vec![0]);
        assert_eq!(compact_size(252), vec![252]);
        assert_eq!(compact_size(253), vec![0xfd, 253, 0]);
        assert_eq!(compact_size(0xffff), vec![0xfd, 0xff, 0xff]);
        assert_eq!(
            compact_size(0x10000),
            vec![0xfe, 0, 0, 1, 0]
        );
        assert_eq!(
            compact_size(0x1_0000_0000),
            vec![0xff, 0, 0, 0, 0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn merkle_single_element_is_identity() {
        let a = [0xaa; 32];
        let branch = merkle_branch(&[a]);
        assert_eq!(branch, vec![a]);
        assert_eq!(merkle_root(a, &branch), a);
    }

    #[test]
    fn merkle_two_elements() {
        let a = [0xaa; 32];
        let b = [0xbb; 32];
        let branch = merkle_branch(&[a, b]);
        assert_eq!(branch, vec![a]);
        let mut buf = Vec::new();
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b);
        assert_eq!(merkle_root(a, &branch), sha256d(&buf));
    }

    #[test]
    fn merkle_odd_list_duplicates_last() {
        // S2: txids [aa*32, bb*32, cc*32] -> branch = [aa*32, cc*32]
        let a = [0xaa; 32];
        let b = [0xbb; 32];
        let c = [0xcc; 32];
        let branch = merkle_branch(&[a, b, c]);
        assert_eq!(branch, vec![a, c]);
    }

    #[test]
    fn script_push_int_uses_opcode_shortcuts() {
        assert_eq!(Script::new().push_int(0, true).data, vec![OP_0]);
        assert_eq!(Script::new().push_int(1, true).data, vec![OP_1]);
        assert_eq!(Script::new().push_int(16, true).data, vec![OP_1 + 15]);
    }

    #[test]
    fn script_push_int_no_shortcuts_uses_var_int() {
        // height=1 pushed without shortcuts still pushes var_int(1) = [0x01]
        // prefixed by its length byte.
        let s = Script::new().push_int(0, false);
        assert_eq!(s.data, vec![0x00]); // length 0, empty var_int(0)
        let s = Script::new().push_int(1, false);
        assert_eq!(s.data, vec![0x01, 0x01]);
    }
}
