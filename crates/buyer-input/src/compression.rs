//! Versioned compressors for buyer input payloads.
//!
//! The version travels next to the compressed bytes so the remote auction
//! service knows how to decompress them.

use {
    anyhow::{Context, Result},
    flate2::{Compression, bufread::GzDecoder, bufread::GzEncoder},
    serde::{Deserialize, Serialize},
    std::{
        io::{Read, Write},
        sync::Arc,
    },
};

#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionVersion {
    #[default]
    #[display("uncompressed")]
    Uncompressed,
    #[display("gzip")]
    Gzip,
    #[display("brotli")]
    Brotli,
}

impl CompressionVersion {
    /// Numeric identifier sent alongside the payload.
    pub fn id(self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Gzip => 1,
            Self::Brotli => 2,
        }
    }
}

/// Compressed bytes tagged with the version that produced them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompressedData {
    pub version: CompressionVersion,
    pub data: Vec<u8>,
}

impl CompressedData {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Compressor: Send + Sync {
    fn version(&self) -> CompressionVersion;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Returns the compressor for the given version.
pub fn for_version(version: CompressionVersion) -> Arc<dyn Compressor> {
    match version {
        CompressionVersion::Uncompressed => Arc::new(Uncompressed),
        CompressionVersion::Gzip => Arc::new(Gzip),
        CompressionVersion::Brotli => Arc::new(Brotli),
    }
}

/// Passes data through as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncompressed;

impl Compressor for Uncompressed {
    fn version(&self) -> CompressionVersion {
        CompressionVersion::Uncompressed
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Gzip;

impl Compressor for Gzip {
    fn version(&self) -> CompressionVersion {
        CompressionVersion::Gzip
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(data, Compression::best());
        let mut encoded = Vec::with_capacity(data.len());
        encoder.read_to_end(&mut encoded).context("gzip encoding")?;
        Ok(encoded)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut decoded)
            .context("gzip decoding")?;
        Ok(decoded)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Brotli;

impl Brotli {
    const BUFFER_SIZE: usize = 4096;
    const QUALITY: u32 = 11;
    const WINDOW: u32 = 22;
}

impl Compressor for Brotli {
    fn version(&self) -> CompressionVersion {
        CompressionVersion::Brotli
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut writer = brotli::CompressorWriter::new(
            Vec::with_capacity(data.len()),
            Self::BUFFER_SIZE,
            Self::QUALITY,
            Self::WINDOW,
        );
        writer.write_all(data).context("brotli encoding")?;
        Ok(writer.into_inner())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        brotli::Decompressor::new(data, Self::BUFFER_SIZE)
            .read_to_end(&mut decoded)
            .context("brotli decoding")?;
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressors_restore_input() {
        let input = "buyer input ".repeat(100).into_bytes();
        for version in [
            CompressionVersion::Uncompressed,
            CompressionVersion::Gzip,
            CompressionVersion::Brotli,
        ] {
            let compressor = for_version(version);
            assert_eq!(compressor.version(), version);
            let compressed = compressor.compress(&input).unwrap();
            assert_eq!(compressor.decompress(&compressed).unwrap(), input);
        }
    }

    #[test]
    fn repetitive_input_shrinks() {
        let input = "a".repeat(10_000).into_bytes();
        assert!(Gzip.compress(&input).unwrap().len() < 200);
        assert!(Brotli.compress(&input).unwrap().len() < 200);
    }

    #[test]
    fn version_ids() {
        assert_eq!(CompressionVersion::Uncompressed.id(), 0);
        assert_eq!(CompressionVersion::Gzip.id(), 1);
        assert_eq!(CompressionVersion::Brotli.id(), 2);
    }
}
