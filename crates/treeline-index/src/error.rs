use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// Unrecognized storage-type marker in a chunk trailer.
    InvalidChunkType(u8),
    /// Too few trailing bytes for the fixed-size chunk trailer.
    TruncatedTrailer,
    /// Decompressed payload length disagrees with the trailer's point count.
    PayloadLength { expected: usize, actual: usize },
    /// The compression codec rejected a frame.
    Compression(String),
    /// Two records landed on the same (column, tick) slot during chunk
    /// reconstruction.
    PointCollision { column: u64, tick: u64 },
    /// A wire record named a column beyond the chunk's capacity.
    ColumnOutOfRange(u64),
    /// File-info records for different paths cannot be merged.
    MismatchedPaths(String, String),
    /// Malformed manifest JSON.
    InvalidManifest(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::InvalidChunkType(marker) => {
                write!(f, "invalid chunk type marker: {:#04x}", marker)
            }
            Error::TruncatedTrailer => write!(f, "invalid chunk data: truncated trailer"),
            Error::PayloadLength { expected, actual } => write!(
                f,
                "invalid chunk payload: expected {} bytes, got {}",
                expected, actual
            ),
            Error::Compression(msg) => write!(f, "compression error: {}", msg),
            Error::PointCollision { column, tick } => write!(
                f,
                "point collision at column {} tick {} during reconstruction",
                column, tick
            ),
            Error::ColumnOutOfRange(column) => {
                write!(f, "column {} beyond chunk capacity", column)
            }
            Error::MismatchedPaths(a, b) => {
                write!(f, "cannot merge file records for {} and {}", a, b)
            }
            Error::InvalidManifest(msg) => write!(f, "invalid manifest: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<lz4_flex::frame::Error> for Error {
    fn from(err: lz4_flex::frame::Error) -> Self {
        Error::Compression(err.to_string())
    }
}
