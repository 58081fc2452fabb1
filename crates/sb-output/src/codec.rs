//! JSONL + zstd book encoding

use sb_core::{Book, WriteError};

use crate::error::{OutputError, OutputResult};

/// Default zstd level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// zstd frame magic number (little endian 0xFD2FB528)
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// File extension for a batch or published file
pub fn book_extension(compress: bool) -> &'static str {
    if compress { "jsonl.zst" } else { "jsonl" }
}

/// Does the buffer start with a zstd frame?
pub fn is_zstd(bytes: &[u8]) -> bool {
    bytes.len() >= ZSTD_MAGIC.len() && bytes[..ZSTD_MAGIC.len()] == ZSTD_MAGIC
}

/// Encode books as JSON Lines, optionally as one zstd frame
pub fn encode_books(books: &[Book], compress: bool, level: i32) -> Result<Vec<u8>, WriteError> {
    let mut jsonl = Vec::with_capacity(books.len() * 64);
    for book in books {
        serde_json::to_writer(&mut jsonl, book)?;
        jsonl.push(b'\n');
    }

    if !compress {
        return Ok(jsonl);
    }

    zstd::encode_all(jsonl.as_slice(), level).map_err(|e| WriteError::Compression(e.to_string()))
}

/// Decode JSON Lines, transparently decompressing zstd (one or more frames)
pub fn decode_books(bytes: &[u8]) -> OutputResult<Vec<Book>> {
    let decompressed;
    let jsonl: &[u8] = if is_zstd(bytes) {
        decompressed =
            zstd::decode_all(bytes).map_err(|e| OutputError::Compression(e.to_string()))?;
        &decompressed
    } else {
        bytes
    };

    let text = std::str::from_utf8(jsonl).map_err(|e| OutputError::InvalidData(e.to_string()))?;

    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Book::from_json_line(line).map_err(OutputError::from))
        .collect()
}
