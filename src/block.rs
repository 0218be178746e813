//! A 128-bit [`Block`] type.
//!
//! Blocks are the unit of every OT message in this crate: base-OT secrets,
//! extension outputs and PRG seeds are all 128 bits wide. The online phase
//! only ever consumes the low 32-bit lane of a block, see [`Block::lane0`].

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitXor, BitXorAssign};

use bytemuck::{Pod, Zeroable};
use rand::distributions::{Distribution, Standard};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A 128-bit block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(transparent)]
pub struct Block(u128);

impl Block {
    /// All bits set to 0.
    pub const ZERO: Self = Self(0);
    /// All bits set to 1.
    pub const ONES: Self = Self(u128::MAX);
    /// Bytes in a block.
    pub const BYTES: usize = 16;

    /// Create a block from its little-endian byte representation.
    #[inline]
    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    /// Little-endian byte representation of the block.
    #[inline]
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// The low 32-bit lane of the block, little-endian.
    ///
    /// This is the deterministic 32-bit value that all mod-`q` and mod-`δ`
    /// arithmetic of the online phase consumes; the remaining 96 bits of OT
    /// output are discarded. Both roles use this accessor so the endianness
    /// convention is shared.
    #[inline]
    pub const fn lane0(self) -> u32 {
        self.0 as u32
    }

    /// Least significant bit of the block.
    #[inline]
    pub const fn lsb(self) -> bool {
        self.0 & 1 == 1
    }
}

impl From<u128> for Block {
    #[inline]
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<Block> for u128 {
    #[inline]
    fn from(value: Block) -> Self {
        value.0
    }
}

impl From<[u8; 16]> for Block {
    #[inline]
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_le_bytes(bytes)
    }
}

// Needed so a Block can seed an rng.
impl AsMut<[u8]> for Block {
    #[inline]
    fn as_mut(&mut self) -> &mut [u8] {
        bytemuck::bytes_of_mut(self)
    }
}

impl BitXor for Block {
    type Output = Self;

    #[inline]
    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl BitAnd for Block {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for Block {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Distribution<Block> for Standard {
    #[inline]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Block {
        Block(rng.gen())
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Block({:032x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane0_is_low_le_word() {
        let b = Block::from_le_bytes([
            0x01, 0x02, 0x03, 0x04, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0, 0, 0, 0,
        ]);
        assert_eq!(b.lane0(), u32::from_le_bytes([0x01, 0x02, 0x03, 0x04]));
    }

    #[test]
    fn byte_round_trip() {
        let b: Block = rand::random();
        assert_eq!(b, Block::from_le_bytes(b.to_le_bytes()));
    }
}
