use std::io::Read;
use std::io::Write;

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::Error;
use crate::Result;

/// Encoding style advertised in the table of contents for deflated payloads.
///
/// The stored bytes are raw deflate streams with no gzip framing; the name is
/// a format-level misnomer that has to be preserved for compatibility.
pub const GZIP_MIME_TYPE: &str = "application/x-gzip";

/// Compress the data as a raw deflate stream.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| Error::Compression(e.to_string()))
}

/// Decompress a raw deflate stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut bytes = Vec::new();
    decoder
        .read_to_end(&mut bytes)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;

    use super::*;

    #[test]
    fn compress_decompress_symmetry() {
        arbtest(|u| {
            let expected: Vec<u8> = u.arbitrary()?;
            let compressed = compress(&expected).unwrap();
            let actual = decompress(&compressed).unwrap();
            assert_eq!(expected, actual);
            Ok(())
        });
    }

    #[test]
    fn empty_input_two_byte_stream() {
        let compressed = compress(&[]).unwrap();
        assert_eq!(2, compressed.len());
        assert_eq!(Vec::<u8>::new(), decompress(&compressed).unwrap());
    }

    #[test]
    fn no_container_framing() {
        let compressed = compress(b"hello").unwrap();
        // 0x78 opens a zlib stream, 0x1f a gzip stream.
        assert_ne!(0x78, compressed[0]);
        assert_ne!(0x1f, compressed[0]);
    }

    #[test]
    fn garbage_fails() {
        assert!(decompress(&[0xde, 0xad, 0xbe, 0xef, 0xff]).is_err());
    }
}
