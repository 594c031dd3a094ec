//! Per-item processing.
//!
//! The engine does not know what a worker does with a file; it calls a
//! [`Processor`]. [`CharCounter`] is the processor the service ships with: it
//! counts the characters in the source and writes the count as text.

use std::future::Future;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

/// A pluggable transformation applied to each claimed work item.
///
/// `process` computes a result from the source file and `persist` stores it at
/// the destination. Either may fail; the worker logs the failure and moves on.
pub trait Processor: Send + Sync + 'static {
    type Output: Send;

    fn process(&self, source: &Path) -> impl Future<Output = Result<Self::Output>> + Send;

    fn persist(
        &self,
        destination: &Path,
        output: Self::Output,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Counts the characters of a text file and writes the decimal count.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCounter;

impl Processor for CharCounter {
    type Output = u64;

    async fn process(&self, source: &Path) -> Result<u64> {
        let file = tokio::fs::File::open(source).await?;
        Ok(count_chars(file).await?)
    }

    async fn persist(&self, destination: &Path, count: u64) -> Result<()> {
        tokio::fs::write(destination, count.to_string()).await?;
        Ok(())
    }
}

/// Size of each read from the source.
pub const BLOCK_SIZE: usize = 4096;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];
const UTF32LE_BOM: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const UTF32BE_BOM: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

/// Longest byte-order mark recognised.
const BOM_PROBE: usize = 4;

/// Text encoding of a source, chosen from its byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl Encoding {
    /// Pick the encoding from the leading bytes, returning it with the length
    /// of the mark to strip. Without a mark the text is read as UTF-8.
    fn detect(head: &[u8]) -> (Self, usize) {
        // UTF-32LE shares its first two bytes with UTF-16LE.
        if head.starts_with(UTF32LE_BOM) {
            (Encoding::Utf32Le, UTF32LE_BOM.len())
        } else if head.starts_with(UTF32BE_BOM) {
            (Encoding::Utf32Be, UTF32BE_BOM.len())
        } else if head.starts_with(UTF8_BOM) {
            (Encoding::Utf8, UTF8_BOM.len())
        } else if head.starts_with(UTF16LE_BOM) {
            (Encoding::Utf16Le, UTF16LE_BOM.len())
        } else if head.starts_with(UTF16BE_BOM) {
            (Encoding::Utf16Be, UTF16BE_BOM.len())
        } else {
            (Encoding::Utf8, 0)
        }
    }

    /// Count the characters in the longest decodable prefix of `bytes`,
    /// returning how many bytes were consumed. Stops before an incomplete
    /// trailing sequence.
    fn decode_prefix(self, bytes: &[u8], total: &mut u64) -> usize {
        match self {
            Encoding::Utf8 => decode_utf8_prefix(bytes, total),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                // Every code unit is one character; a lone surrogate becomes
                // one replacement character.
                let units = bytes.len() / 2;
                *total += units as u64;
                units * 2
            }
            Encoding::Utf32Le | Encoding::Utf32Be => {
                let mut consumed = 0;
                for unit in bytes.chunks_exact(4) {
                    let raw = [unit[0], unit[1], unit[2], unit[3]];
                    let value = if self == Encoding::Utf32Le {
                        u32::from_le_bytes(raw)
                    } else {
                        u32::from_be_bytes(raw)
                    };
                    *total += char::from_u32(value).map_or(1, |c| c.len_utf16() as u64);
                    consumed += 4;
                }
                consumed
            }
        }
    }
}

/// Count the characters in a text stream, reading it in [`BLOCK_SIZE`] blocks.
///
/// The encoding comes from the byte-order mark (UTF-8, UTF-16 or UTF-32, either
/// byte order) and defaults to UTF-8; the mark itself is not counted.
/// Characters are counted in UTF-16 code units, so one outside the Basic
/// Multilingual Plane counts as two. Each malformed byte sequence, including
/// a truncated one at the end of the stream, counts as a single replacement
/// character.
pub async fn count_chars<R>(mut reader: R) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut block = [0u8; BLOCK_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(BLOCK_SIZE + BOM_PROBE);
    let mut total = 0u64;
    let mut encoding = None;

    loop {
        let read = reader.read(&mut block).await?;
        if read == 0 {
            break;
        }
        pending.extend_from_slice(&block[..read]);

        let current = if let Some(current) = encoding {
            current
        } else if pending.len() < BOM_PROBE {
            // Wait for enough bytes to tell every mark apart.
            continue;
        } else {
            let detected = strip_bom(&mut pending);
            encoding = Some(detected);
            detected
        };

        let consumed = current.decode_prefix(&pending, &mut total);
        pending.drain(..consumed);
    }

    let current = match encoding {
        Some(current) => current,
        None => strip_bom(&mut pending),
    };
    let consumed = current.decode_prefix(&pending, &mut total);
    if consumed < pending.len() {
        total += 1;
    }
    Ok(total)
}

fn strip_bom(pending: &mut Vec<u8>) -> Encoding {
    let (encoding, bom) = Encoding::detect(pending);
    pending.drain(..bom);
    encoding
}

fn decode_utf8_prefix(bytes: &[u8], total: &mut u64) -> usize {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => {
                *total += utf16_units(&bytes[offset..]);
                return bytes.len();
            }
            Err(e) => {
                let valid = e.valid_up_to();
                *total += utf16_units(&bytes[offset..offset + valid]);
                offset += valid;
                match e.error_len() {
                    Some(len) => {
                        *total += 1;
                        offset += len;
                    }
                    None => return offset,
                }
            }
        }
    }
}

/// UTF-16 length of already-validated UTF-8: continuation bytes add nothing
/// and a four-byte lead needs a surrogate pair.
fn utf16_units(valid: &[u8]) -> u64 {
    valid
        .iter()
        .map(|&b| match b {
            0x80..=0xBF => 0,
            0xF0..=0xFF => 2,
            _ => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_ascii() {
        assert_eq!(count_chars(&b"hello world"[..]).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn empty_stream_is_zero() {
        assert_eq!(count_chars(&b""[..]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn multibyte_characters_count_once() {
        let text = "héllo wörld ✓";
        assert_eq!(count_chars(text.as_bytes()).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn sequence_split_across_blocks() {
        let mut text = "a".repeat(BLOCK_SIZE - 1);
        text.push('é');
        text.push_str("bc");
        assert_eq!(
            count_chars(text.as_bytes()).await.unwrap(),
            BLOCK_SIZE as u64 + 2
        );
    }

    #[tokio::test]
    async fn byte_order_mark_is_not_counted() {
        let bytes = [UTF8_BOM, b"abc"].concat();
        assert_eq!(count_chars(&bytes[..]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn astral_characters_count_as_two_units() {
        assert_eq!(count_chars("a😀".as_bytes()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn utf16le_with_bom() {
        let bytes = [0xFF, 0xFE, b'a', 0x00, b'b', 0x00];
        assert_eq!(count_chars(&bytes[..]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn utf16be_surrogate_pair() {
        // BOM, 'x', then U+1F600 as a surrogate pair.
        let bytes = [0xFE, 0xFF, 0x00, b'x', 0xD8, 0x3D, 0xDE, 0x00];
        assert_eq!(count_chars(&bytes[..]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn utf32_with_bom() {
        let mut le = UTF32LE_BOM.to_vec();
        for c in ['h', 'i', '😀'] {
            le.extend_from_slice(&(c as u32).to_le_bytes());
        }
        assert_eq!(count_chars(&le[..]).await.unwrap(), 4);

        let mut be = UTF32BE_BOM.to_vec();
        be.extend_from_slice(&('z' as u32).to_be_bytes());
        be.extend_from_slice(&0x11_0000u32.to_be_bytes());
        assert_eq!(count_chars(&be[..]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn short_stream_without_bom_is_utf8() {
        assert_eq!(count_chars(&b"ab"[..]).await.unwrap(), 2);
        assert_eq!(count_chars(&[0xFF, 0xFE][..]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn odd_trailing_byte_in_utf16_counts_once() {
        let bytes = [0xFF, 0xFE, b'a', 0x00, b'b'];
        assert_eq!(count_chars(&bytes[..]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn malformed_bytes_count_as_replacement() {
        // Lone continuation byte, then a truncated two-byte sequence at EOF.
        let bytes = [b'a', 0x80, b'b', 0xC3];
        assert_eq!(count_chars(&bytes[..]).await.unwrap(), 4);
    }
}
