use log::debug;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::SignatureEncoding;
use rsa::signature::Signer;
use rsa::RsaPrivateKey;
use sha1::Sha1;

use crate::Error;
use crate::Result;

/// Signs compressed tables of contents with RSA-SHA1.
///
/// The signature slot has to be reserved in the heap before any signature
/// exists, so construction performs one probe signature over a fixed input
/// and remembers its length. That probe is the single source of truth for
/// the slot size; 2048-bit keys yield 256 bytes, other key sizes differ.
pub struct RsaSigner {
    key: SigningKey<Sha1>,
    signature_len: usize,
}

impl RsaSigner {
    /// Parse a PKCS#1 or PKCS#8 PEM-encoded RSA private key and probe the
    /// signature length.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| Error::InvalidPrivateKey(e.to_string()))?;
        Self::new(private_key)
    }

    pub fn new(private_key: RsaPrivateKey) -> Result<Self> {
        let key = SigningKey::<Sha1>::new(private_key);
        let probe = sign_with(&key, PROBE_INPUT)?;
        debug!("probe signature length: {} bytes", probe.len());
        Ok(Self {
            key,
            signature_len: probe.len(),
        })
    }

    /// Sign the data. The result always has [`signature_len`](Self::signature_len) bytes.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = sign_with(&self.key, data)?;
        if signature.len() != self.signature_len {
            return Err(Error::SignFailed(format!(
                "signature is {} bytes, probe said {}",
                signature.len(),
                self.signature_len
            )));
        }
        Ok(signature)
    }

    pub fn signature_style(&self) -> &'static str {
        "RSA"
    }

    pub fn signature_len(&self) -> usize {
        self.signature_len
    }
}

fn sign_with(key: &SigningKey<Sha1>, data: &[u8]) -> Result<Vec<u8>> {
    let signature = key
        .try_sign(data)
        .map_err(|e| Error::SignFailed(e.to_string()))?;
    Ok(signature.to_bytes().to_vec())
}

const PROBE_INPUT: &[u8] = b"signature length probe";

#[cfg(test)]
mod tests {
    use rsa::pkcs1v15::Signature;
    use rsa::pkcs1v15::VerifyingKey;
    use rsa::signature::Keypair;
    use rsa::signature::Verifier;

    use super::*;

    const RSA_2048_PEM: &str = include_str!("../tests/data/rsa2048.pem");
    const RSA_2048_PKCS8_PEM: &str = include_str!("../tests/data/rsa2048-pkcs8.pem");
    const RSA_3072_PEM: &str = include_str!("../tests/data/rsa3072.pem");

    #[test]
    fn probe_matches_key_size() {
        assert_eq!(256, RsaSigner::from_pem(RSA_2048_PEM).unwrap().signature_len());
        assert_eq!(384, RsaSigner::from_pem(RSA_3072_PEM).unwrap().signature_len());
    }

    #[test]
    fn pkcs8_keys_accepted() {
        assert_eq!(
            256,
            RsaSigner::from_pem(RSA_2048_PKCS8_PEM).unwrap().signature_len()
        );
    }

    #[test]
    fn sign_verifies() {
        let signer = RsaSigner::from_pem(RSA_2048_PEM).unwrap();
        let data = b"compressed table of contents";
        let signature = signer.sign(data).unwrap();
        assert_eq!(signer.signature_len(), signature.len());
        let verifying_key: VerifyingKey<Sha1> = signer.key.verifying_key();
        let signature = Signature::try_from(&signature[..]).unwrap();
        verifying_key.verify(data, &signature).unwrap();
    }

    #[test]
    fn garbage_key_rejected() {
        assert!(matches!(
            RsaSigner::from_pem("not a key"),
            Err(Error::InvalidPrivateKey(..))
        ));
    }
}
