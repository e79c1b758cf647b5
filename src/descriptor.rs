use crate::error::Error;

/// Number of bytes in a [`Descriptor`].
pub const DESCRIPTOR_BYTES: usize = 32;

/// Number of bits in a [`Descriptor`], which is also the largest possible distance.
pub const DESCRIPTOR_BITS: u32 = DESCRIPTOR_BYTES as u32 * 8;

/// A 256 bit binary feature vector summarizing the appearance around a keypoint.
///
/// Descriptors are compared with the Hamming distance, the number of bits that differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor {
    bits: [u8; DESCRIPTOR_BYTES],
}

impl Descriptor {
    pub fn new(bits: [u8; DESCRIPTOR_BYTES]) -> Self {
        Self { bits }
    }

    /// A descriptor with every bit cleared.
    pub fn zeros() -> Self {
        Self::new([0; DESCRIPTOR_BYTES])
    }

    /// Returns the Hamming distance between `self` and `other`.
    pub fn distance(&self, other: &Descriptor) -> u32 {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// Sets bit `index` where bit 0 is the least significant bit of the first byte.
    ///
    /// Panics if `index` is not below [`DESCRIPTOR_BITS`].
    pub fn set_bit(&mut self, index: usize) {
        self.bits[index / 8] |= 1 << (index % 8);
    }

    pub fn bit(&self, index: usize) -> bool {
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn as_bytes(&self) -> &[u8; DESCRIPTOR_BYTES] {
        &self.bits
    }
}

impl TryFrom<&[u8]> for Descriptor {
    type Error = Error;

    /// Fails with [`Error::DescriptorLength`] unless `bytes` holds exactly
    /// [`DESCRIPTOR_BYTES`] bytes.
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bits: [u8; DESCRIPTOR_BYTES] =
            bytes.try_into().map_err(|_| Error::DescriptorLength {
                expected: DESCRIPTOR_BYTES,
                actual: bytes.len(),
            })?;

        Ok(Self::new(bits))
    }
}

impl From<[u8; DESCRIPTOR_BYTES]> for Descriptor {
    fn from(bits: [u8; DESCRIPTOR_BYTES]) -> Self {
        Self::new(bits)
    }
}
