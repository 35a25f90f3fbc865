use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use log::debug;

use crate::compression;
use crate::pem::pem_section;
use crate::pem::CERTIFICATE_SECTION;
use crate::toc;
use crate::tree::FileEntry;
use crate::tree::FileNode;
use crate::tree::SignatureResources;
use crate::ChecksumAlgo;
use crate::Error;
use crate::Header;
use crate::Result;
use crate::RsaSigner;
use crate::Sha1Digest;

/// An archive under construction: a forest of file nodes and, optionally,
/// the material to sign it with.
///
/// [`generate`](Self::generate) consumes the node metadata logically: it
/// assigns ids, lays out the heap and fills in per-file offsets, lengths and
/// checksums exactly once. Generating the same instance twice without
/// resetting that state is not supported.
pub struct Archive {
    roots: Vec<FileNode>,
    signature_resources: Option<SignatureResources>,
}

impl Archive {
    pub fn new(roots: Vec<FileNode>) -> Self {
        Self {
            roots,
            signature_resources: None,
        }
    }

    pub fn roots(&self) -> &[FileNode] {
        &self.roots
    }

    /// Set the signing material. At most once, before generation.
    pub fn set_signature_resources(&mut self, resources: SignatureResources) {
        self.signature_resources = Some(resources);
    }

    /// Generate the archive into `writer`.
    ///
    /// `open` maps a node's source path to a fresh reader positioned at
    /// offset 0; it is called once per non-empty file, during heap layout.
    /// Output is written strictly sequentially: header, compressed table of
    /// contents, then the heap.
    pub fn generate<W, F, R>(&mut self, mut writer: W, mut open: F) -> Result<()>
    where
        W: Write,
        F: FnMut(&Path) -> std::io::Result<R>,
        R: Read,
    {
        self.check_nodes()?;
        self.assign_ids();
        let signer = match self.signature_resources {
            Some(ref resources) => Some(RsaSigner::from_pem(&resources.private_key)?),
            None => None,
        };
        let heap_size = self.layout_heap(signer.as_ref(), &mut open)?;
        debug!("heap layout complete: {} bytes", heap_size);
        let toc = self.build_toc(signer.as_ref())?;
        let toc_xml = toc::Xar { toc }.to_xml()?;
        let toc_compressed = compression::compress(toc_xml.as_bytes())?;
        debug!(
            "table of contents: {} bytes, {} compressed",
            toc_xml.len(),
            toc_compressed.len()
        );
        let header = Header {
            toc_len_compressed: toc_compressed.len() as u64,
            toc_len_uncompressed: toc_xml.len() as u64,
            checksum_algo: ChecksumAlgo::Sha1,
        };
        header.write(writer.by_ref())?;
        writer.write_all(&toc_compressed)?;
        // heap starts
        let checksum = Sha1Digest::compute(&toc_compressed);
        writer.write_all(checksum.as_ref())?;
        let mut heap_written = checksum.as_ref().len() as u64;
        if let Some(ref signer) = signer {
            let signature = signer.sign(&toc_compressed)?;
            writer.write_all(&signature)?;
            heap_written += signature.len() as u64;
        }
        for entry in self.entries_mut() {
            let archived = match entry.data.archived.take() {
                Some(bytes) => bytes,
                None => {
                    return Err(Error::InvalidInput(format!(
                        "{:?} has no compressed payload",
                        entry.name
                    )))
                }
            };
            // Emission must replay the planned layout byte for byte.
            assert_eq!(Some(heap_written), entry.data.offset);
            assert_eq!(archived.len() as u64, entry.data.length);
            writer.write_all(&archived)?;
            heap_written += archived.len() as u64;
        }
        Ok(())
    }

    fn check_nodes(&self) -> Result<()> {
        for root in self.roots.iter() {
            for (_, node) in root.walk() {
                if node.name().is_empty() {
                    return Err(Error::InvalidInput("file node has no name".into()));
                }
                if node.src_path().as_os_str().is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "file node {:?} has no source path",
                        node.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Give every node lacking an id the next one above the highest
    /// pre-assigned id, in depth-first traversal order.
    fn assign_ids(&mut self) {
        let mut max_id = 0;
        for root in self.roots.iter() {
            for (_, node) in root.walk() {
                max_id = max_id.max(node.id());
            }
        }
        let mut next_id = max_id + 1;
        for root in self.roots.iter_mut() {
            root.for_each_mut(&mut |node| {
                if node.id() == 0 {
                    node.set_id(next_id);
                    next_id += 1;
                }
            });
        }
    }

    /// Compress every file payload and assign heap offsets: the checksum
    /// slot first, then the signature slot when signing, then payloads in
    /// ascending id order. Returns the total heap size.
    fn layout_heap<F, R>(&mut self, signer: Option<&RsaSigner>, open: &mut F) -> Result<u64>
    where
        F: FnMut(&Path) -> std::io::Result<R>,
        R: Read,
    {
        let mut cursor = ChecksumAlgo::Sha1.hash_len() as u64;
        if let Some(signer) = signer {
            cursor += signer.signature_len() as u64;
        }
        for entry in self.entries_mut() {
            if entry.data.offset.is_some() {
                continue;
            }
            let source = if entry.data.size == 0 {
                // Empty files never touch the provider.
                Vec::new()
            } else {
                // Read exactly `size` bytes; the reader may have more.
                let mut reader = open(&entry.src_path)?;
                let mut bytes = vec![0_u8; entry.data.size as usize];
                reader.read_exact(&mut bytes[..]).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        Error::InvalidInput(format!(
                            "{}: declared {} bytes, source ended early",
                            entry.src_path.display(),
                            entry.data.size
                        ))
                    } else {
                        Error::Io(e)
                    }
                })?;
                bytes
            };
            let archived = compression::compress(&source)?;
            entry.data.length = archived.len() as u64;
            entry.data.offset = Some(cursor);
            entry.data.archived_checksum = Some(Sha1Digest::compute(&archived));
            entry.data.extracted_checksum = Some(Sha1Digest::compute(&source));
            cursor += entry.data.length;
            entry.data.archived = Some(archived);
        }
        Ok(cursor)
    }

    fn build_toc(&self, signer: Option<&RsaSigner>) -> Result<toc::Toc> {
        let checksum_len = ChecksumAlgo::Sha1.hash_len() as u64;
        let signature = match (signer, self.signature_resources.as_ref()) {
            (Some(signer), Some(resources)) => {
                let mut certificates = Vec::new();
                certificates.push(toc::X509Certificate {
                    data: pem_section(&resources.cert, CERTIFICATE_SECTION)?,
                });
                for cert in resources.additional_certs.iter() {
                    certificates.push(toc::X509Certificate {
                        data: pem_section(cert, CERTIFICATE_SECTION)?,
                    });
                }
                Some(toc::SignatureInfo {
                    style: signer.signature_style().into(),
                    offset: checksum_len,
                    size: signer.signature_len() as u64,
                    key_info: toc::KeyInfo {
                        data: toc::X509Data { certificates },
                    },
                })
            }
            _ => None,
        };
        Ok(toc::Toc {
            creation_time: toc::Timestamp(SystemTime::now()),
            checksum: toc::TocChecksum {
                algo: ChecksumAlgo::Sha1,
                size: checksum_len,
                offset: 0,
            },
            signature_creation_time: signature
                .is_some()
                .then(toc::SignatureTimestamp::now),
            signature,
            files: self
                .roots
                .iter()
                .map(toc_file)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// All file entries in the forest, ascending by id.
    fn entries_mut(&mut self) -> Vec<&mut FileEntry> {
        fn collect<'a>(nodes: &'a mut [FileNode], out: &mut Vec<&'a mut FileEntry>) {
            for node in nodes.iter_mut() {
                match node {
                    FileNode::File(entry) => out.push(entry),
                    FileNode::Directory(dir) => collect(&mut dir.children, out),
                }
            }
        }
        let mut entries = Vec::new();
        collect(&mut self.roots, &mut entries);
        entries.sort_by_key(|entry| entry.id);
        entries
    }
}

fn toc_file(node: &FileNode) -> Result<toc::TocFile> {
    match node {
        FileNode::File(entry) => {
            let data = &entry.data;
            let (offset, archived, extracted) = match (
                data.offset,
                data.archived_checksum.clone(),
                data.extracted_checksum.clone(),
            ) {
                (Some(offset), Some(archived), Some(extracted)) => (offset, archived, extracted),
                _ => {
                    return Err(Error::InvalidInput(format!(
                        "{:?} has not been laid out",
                        entry.name
                    )))
                }
            };
            Ok(toc::TocFile {
                id: entry.id,
                name: entry.name.clone(),
                kind: toc::EntryKind::File,
                children: Vec::new(),
                data: Some(toc::Data {
                    offset,
                    size: data.size,
                    length: data.length,
                    archived_checksum: archived.into(),
                    extracted_checksum: extracted.into(),
                    encoding: toc::Encoding {
                        style: compression::GZIP_MIME_TYPE.into(),
                    },
                }),
            })
        }
        FileNode::Directory(dir) => Ok(toc::TocFile {
            id: dir.id,
            name: dir.name.clone(),
            kind: toc::EntryKind::Directory,
            children: dir
                .children
                .iter()
                .map(toc_file)
                .collect::<Result<Vec<_>>>()?,
            data: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn never_open(_path: &Path) -> std::io::Result<Cursor<Vec<u8>>> {
        panic!("the data provider must not be called");
    }

    #[test]
    fn ids_fill_in_above_preassigned() {
        let mut tree = FileNode::directory(
            "root",
            "/in/root",
            vec![
                FileNode::file("a", "/in/root/a", 0),
                FileNode::file("b", "/in/root/b", 0),
            ],
        );
        if let FileNode::Directory(ref mut dir) = tree {
            dir.children[1].set_id(7);
        }
        let mut archive = Archive::new(vec![tree]);
        archive.assign_ids();
        let ids: Vec<u64> = archive.roots()[0].walk().map(|(_, node)| node.id()).collect();
        assert_eq!(vec![8, 9, 7], ids);
    }

    #[test]
    fn nameless_node_rejected() {
        let mut archive = Archive::new(vec![FileNode::file("", "/in/a", 0)]);
        let mut out = Vec::new();
        assert!(matches!(
            archive.generate(&mut out, never_open),
            Err(Error::InvalidInput(..))
        ));
    }

    #[test]
    fn pathless_node_rejected() {
        let mut archive = Archive::new(vec![FileNode::file("a", "", 0)]);
        let mut out = Vec::new();
        assert!(matches!(
            archive.generate(&mut out, never_open),
            Err(Error::InvalidInput(..))
        ));
    }

    #[test]
    fn short_source_rejected() {
        let mut archive = Archive::new(vec![FileNode::file("a", "/in/a", 5)]);
        let mut out = Vec::new();
        let result = archive.generate(&mut out, |_| Ok(Cursor::new(b"hi".to_vec())));
        assert!(matches!(result, Err(Error::InvalidInput(..))));
    }

    #[test]
    fn read_is_bounded_by_declared_size() {
        let mut archive = Archive::new(vec![FileNode::file("a", "/in/a", 2)]);
        let mut out = Vec::new();
        archive
            .generate(&mut out, |_| Ok(Cursor::new(b"hello".to_vec())))
            .unwrap();
        let toc_len_compressed = u64::from_be_bytes(out[8..16].try_into().unwrap()) as usize;
        let heap = &out[28 + toc_len_compressed..];
        assert_eq!(b"he".to_vec(), compression::decompress(&heap[20..]).unwrap());
    }

    #[test]
    fn preset_layout_is_respected() {
        let payload = compression::compress(b"hello").unwrap();
        let mut node = FileNode::file("a.txt", "/in/a.txt", 5);
        if let FileNode::File(ref mut entry) = node {
            entry.data.offset = Some(20);
            entry.data.length = payload.len() as u64;
            entry.data.archived_checksum = Some(Sha1Digest::compute(&payload));
            entry.data.extracted_checksum = Some(Sha1Digest::compute(b"hello"));
            entry.data.archived = Some(payload.clone());
        }
        let mut archive = Archive::new(vec![node]);
        let mut out = Vec::new();
        // layout is skipped for the preset entry, so the provider is unused
        archive.generate(&mut out, never_open).unwrap();
        let toc_len_compressed = u64::from_be_bytes(out[8..16].try_into().unwrap()) as usize;
        let heap = &out[28 + toc_len_compressed..];
        assert_eq!(payload[..], heap[20..20 + payload.len()]);
    }

    #[test]
    fn preset_offset_without_payload_rejected() {
        let mut node = FileNode::file("a.txt", "/in/a.txt", 5);
        if let FileNode::File(ref mut entry) = node {
            entry.data.offset = Some(20);
            entry.data.length = 7;
            entry.data.archived_checksum = Some(Sha1Digest::compute(b"x"));
            entry.data.extracted_checksum = Some(Sha1Digest::compute(b"hello"));
        }
        let mut archive = Archive::new(vec![node]);
        let mut out = Vec::new();
        assert!(matches!(
            archive.generate(&mut out, never_open),
            Err(Error::InvalidInput(..))
        ));
    }

    #[test]
    fn empty_file_skips_provider() {
        let mut archive = Archive::new(vec![FileNode::file("empty", "/in/empty", 0)]);
        let mut out = Vec::new();
        archive.generate(&mut out, never_open).unwrap();
        assert_eq!(b"xar!", &out[0..4]);
    }
}
