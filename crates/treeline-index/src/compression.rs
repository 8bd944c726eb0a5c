use crate::error::{Error, Result};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use std::io::{Read, Write};

/// Streaming compressor for chunk payloads: push raw celled records, then
/// take the finished lz4 frame.
pub struct Compressor {
    encoder: FrameEncoder<Vec<u8>>,
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            encoder: FrameEncoder::new(Vec::new()),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.encoder.write_all(bytes)?;
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.encoder.finish()?)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

/// Inflate a chunk payload, insisting on the exact byte length the trailer
/// promised. Anything else means a corrupt blob.
pub fn decompress(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut decoder = FrameDecoder::new(compressed);
    let mut raw = Vec::with_capacity(expected_len);
    decoder.read_to_end(&mut raw)?;
    if raw.len() != expected_len {
        return Err(Error::PayloadLength {
            expected: expected_len,
            actual: raw.len(),
        });
    }
    Ok(raw)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
