use crate::{Error, compression::Compressor, encoding::BuyerInput};

/// Rounds estimated sizes up so an estimate is never zero.
const BYTE_CEILING: usize = 1;

/// Ratio of compressed to uncompressed size for one buyer's input, used to
/// estimate compressed sizes without compressing again.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressionRatio(f64);

impl CompressionRatio {
    /// Ratio for data that does not shrink.
    pub const IDENTITY: Self = Self(1.);

    /// Compresses the input once and derives the ratio from the result.
    pub fn measure(compressor: &dyn Compressor, input: &BuyerInput) -> Result<Self, Error> {
        let raw = input.encode()?;
        let compressed = compressor.compress(&raw).map_err(Error::Compression)?;
        Ok(Self::from_sizes(compressed.len(), raw.len()))
    }

    /// The ratio is kept within `(0, 1]`. Compressors that inflate their
    /// input are treated as not compressing at all.
    pub fn from_sizes(compressed: usize, uncompressed: usize) -> Self {
        if uncompressed == 0 {
            return Self::IDENTITY;
        }
        let ratio = compressed as f64 / uncompressed as f64;
        Self(ratio.clamp(f64::MIN_POSITIVE, 1.))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Estimated compressed size of `uncompressed` bytes.
    pub fn estimate(self, uncompressed: usize) -> usize {
        (uncompressed as f64 * self.0) as usize + BYTE_CEILING
    }
}
