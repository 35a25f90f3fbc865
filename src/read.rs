use std::io::Read;

use crate::compression;
use crate::Error;
use crate::Header;
use crate::Result;
use crate::Sha1Digest;

/// Read and verify the table of contents of an existing archive.
///
/// Parses the header, checks the stored heap checksum against the compressed
/// table of contents, decompresses it and checks the length the header
/// declares. File payloads are not touched. Returns the XML text.
pub fn read_toc<R: Read>(mut reader: R) -> Result<String> {
    let header = Header::read(reader.by_ref())?;
    let mut toc_compressed = vec![0_u8; header.toc_len_compressed as usize];
    reader.read_exact(&mut toc_compressed[..])?;
    let mut stored = [0_u8; Sha1Digest::LEN];
    reader.read_exact(&mut stored[..])?;
    if Sha1Digest::compute(&toc_compressed).as_ref() != stored {
        return Err(Error::ChecksumMismatch);
    }
    let toc = compression::decompress(&toc_compressed)?;
    if toc.len() as u64 != header.toc_len_uncompressed {
        return Err(Error::TocLengthMismatch {
            expected: header.toc_len_uncompressed,
            actual: toc.len() as u64,
        });
    }
    String::from_utf8(toc).map_err(|_| Error::InvalidInput("table of contents is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::compress;
    use crate::ChecksumAlgo;

    fn sample_archive(toc_xml: &[u8], corrupt_checksum: bool, lie_about_length: u64) -> Vec<u8> {
        let toc_compressed = compress(toc_xml).unwrap();
        let header = Header {
            toc_len_compressed: toc_compressed.len() as u64,
            toc_len_uncompressed: toc_xml.len() as u64 + lie_about_length,
            checksum_algo: ChecksumAlgo::Sha1,
        };
        let mut out = Vec::new();
        header.write(&mut out).unwrap();
        out.extend_from_slice(&toc_compressed);
        let mut checksum = Sha1Digest::compute(&toc_compressed).as_ref().to_vec();
        if corrupt_checksum {
            checksum[0] ^= 0xff;
        }
        out.extend_from_slice(&checksum);
        out
    }

    #[test]
    fn toc_round_trip() {
        let out = sample_archive(b"<xar><toc/></xar>", false, 0);
        assert_eq!("<xar><toc/></xar>", read_toc(&out[..]).unwrap());
    }

    #[test]
    fn corrupted_checksum_detected() {
        let out = sample_archive(b"<xar><toc/></xar>", true, 0);
        assert!(matches!(read_toc(&out[..]), Err(Error::ChecksumMismatch)));
    }

    #[test]
    fn wrong_declared_length_detected() {
        let out = sample_archive(b"<xar><toc/></xar>", false, 3);
        assert!(matches!(
            read_toc(&out[..]),
            Err(Error::TocLengthMismatch { .. })
        ));
    }
}
