//! Compression streams for volumes
//!
//! Compressed volumes are written through a streaming encoder wrapping the
//! volume's file handle. Readers decompress a whole finished volume at once.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lz4::{Decoder as Lz4Decoder, Encoder as Lz4Encoder, EncoderBuilder as Lz4EncoderBuilder};
use zstd::stream::read::Decoder as ZstdDecoder;
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::config::CompressionAlgorithm;
use crate::error::{Error, Result};

/// Streaming compressor writing into a volume file
pub enum StreamEncoder {
    /// gzip encoder
    Gzip(GzEncoder<File>),
    /// LZ4 frame encoder
    Lz4(Lz4Encoder<File>),
    /// Zstandard encoder
    Zstd(ZstdEncoder<'static, File>),
}

impl std::fmt::Debug for StreamEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StreamEncoder").field(&self.algorithm()).finish()
    }
}

impl StreamEncoder {
    /// Wrap `file` in an encoder for `algorithm`
    pub fn new(file: File, algorithm: CompressionAlgorithm, level: i32) -> io::Result<Self> {
        match algorithm {
            CompressionAlgorithm::Gzip => {
                let encoder = GzEncoder::new(file, Compression::new(level.clamp(0, 9) as u32));
                Ok(Self::Gzip(encoder))
            }
            CompressionAlgorithm::Lz4 => {
                let encoder = Lz4EncoderBuilder::new()
                    .level(level.clamp(0, 9) as u32)
                    .build(file)?;
                Ok(Self::Lz4(encoder))
            }
            CompressionAlgorithm::Zstd => {
                let encoder = ZstdEncoder::new(file, level.clamp(1, 22))?;
                Ok(Self::Zstd(encoder))
            }
        }
    }

    /// Get compression algorithm
    pub fn algorithm(&self) -> CompressionAlgorithm {
        match self {
            Self::Gzip(_) => CompressionAlgorithm::Gzip,
            Self::Lz4(_) => CompressionAlgorithm::Lz4,
            Self::Zstd(_) => CompressionAlgorithm::Zstd,
        }
    }

    /// The underlying volume file
    pub fn file(&self) -> &File {
        match self {
            Self::Gzip(encoder) => encoder.get_ref(),
            Self::Lz4(encoder) => encoder.writer(),
            Self::Zstd(encoder) => encoder.get_ref(),
        }
    }

    /// Write the end of the compressed stream and hand back the file
    pub fn finish(self) -> io::Result<File> {
        match self {
            Self::Gzip(encoder) => encoder.finish(),
            Self::Lz4(encoder) => {
                let (file, result) = encoder.finish();
                result?;
                Ok(file)
            }
            Self::Zstd(encoder) => encoder.finish(),
        }
    }
}

impl Write for StreamEncoder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Gzip(encoder) => encoder.write(buf),
            Self::Lz4(encoder) => encoder.write(buf),
            Self::Zstd(encoder) => encoder.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Gzip(encoder) => encoder.write_all(buf),
            Self::Lz4(encoder) => encoder.write_all(buf),
            Self::Zstd(encoder) => encoder.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Gzip(encoder) => encoder.flush(),
            Self::Lz4(encoder) => encoder.flush(),
            Self::Zstd(encoder) => encoder.flush(),
        }
    }
}

/// Decompress an in-memory compressed stream
pub fn decompress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    let mut decompressed = Vec::new();

    match algorithm {
        CompressionAlgorithm::Gzip => {
            GzDecoder::new(data)
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::compression(format!("gzip error: {}", e)))?;
        }
        CompressionAlgorithm::Lz4 => {
            let mut decoder = Lz4Decoder::new(data)
                .map_err(|e| Error::compression(format!("LZ4 error: {}", e)))?;
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::compression(format!("LZ4 error: {}", e)))?;
        }
        CompressionAlgorithm::Zstd => {
            let mut decoder = ZstdDecoder::new(data)
                .map_err(|e| Error::compression(format!("Zstd error: {}", e)))?;
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::compression(format!("Zstd error: {}", e)))?;
        }
    }

    Ok(decompressed)
}

/// Read a finished compressed volume back into plain bytes
pub fn decompress_file(path: &Path, algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| Error::file(path, e))?;
    decompress(&data, algorithm)
}
