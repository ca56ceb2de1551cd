use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};

use crate::crypto::Hash256;
use crate::types::PublicKeyType;
use crate::{Error, Result};

pub const R_BYTES: usize = 32;
pub const S_BYTES: usize = 32;

// header = recovery id + HEADER_OFFSET + COMPRESSED_FLAG
const HEADER_OFFSET: u8 = 27;
const COMPRESSED_FLAG: u8 = 4;

/// One signature over a transaction digest: an optional header byte, then R, then S.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSignature {
    header: Option<u8>,
    r: [u8; R_BYTES],
    s: [u8; S_BYTES],
}

impl TransactionSignature {
    pub fn new(header: Option<u8>, r: [u8; R_BYTES], s: [u8; S_BYTES]) -> Self {
        TransactionSignature { header, r, s }
    }

    pub fn get_header(&self) -> Option<u8> {
        self.header
    }

    pub fn get_r(&self) -> &[u8; R_BYTES] {
        &self.r
    }

    pub fn get_s(&self) -> &[u8; S_BYTES] {
        &self.s
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + R_BYTES + S_BYTES);
        if let Some(header) = self.header {
            bytes.push(header);
        }
        bytes.extend(&self.r);
        bytes.extend(&self.s);
        bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    ///
    /// Whether the node will accept this signature.
    ///
    /// The node's deserializer rejects a signature when any of these hold:
    ///
    /// - the header byte has its high bit set, or is zero
    /// - R's first byte has its high bit set
    /// - the byte right after R has its high bit set
    /// - S's first byte is zero, or has its high bit set
    ///
    /// The byte after R is S's first byte, so the last two high-bit checks
    /// overlap. Both are kept as the node evaluates them.
    ///
    pub fn is_canonical(&self) -> bool {
        let bytes = self.to_bytes();
        let h = self.header.map_or(0, |_| 1);
        if self.header.is_some() && (bytes[0] & 0x80 != 0 || bytes[0] == 0) {
            return false;
        }
        !(bytes[h] & 0x80 != 0
            || bytes[h + R_BYTES] & 0x80 != 0
            || bytes[h + R_BYTES] == 0
            || self.s[0] & 0x80 != 0)
    }
}

/// A private key able to sign transaction digests.
pub trait TransactionSigner: Send + Sync + fmt::Debug {
    /// Bytes in front of R, 1 for the recoverable scheme and 0 otherwise.
    fn header_size(&self) -> usize;

    fn sign_digest(&self, digest: &Hash256) -> Result<TransactionSignature>;

    fn public_key(&self) -> PublicKeyType;
}

/// An secp256k1 keypair producing compact recoverable signatures.
pub struct Secp256k1Keypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Secp256k1Keypair {
    pub fn from_secret_slice(slice: &[u8]) -> Result<Secp256k1Keypair> {
        let secret_key = SecretKey::from_slice(slice)?;
        let public_key = PublicKey::from_secret_key(&SECP256K1, &secret_key);
        Ok(Secp256k1Keypair {
            secret_key,
            public_key,
        })
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Secp256k1Keypair> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(secret_hex, &mut bytes as &mut [u8])?;
        Secp256k1Keypair::from_secret_slice(&bytes)
    }

    pub fn get_public_key(&self) -> &PublicKey {
        &self.public_key
    }

    // the recovery id whose recovered key is ours
    fn find_recovery_id(&self, message: &Message, compact: &[u8; 64]) -> Result<u8> {
        for candidate in 0..4 {
            let recovery_id = secp256k1::recovery::RecoveryId::from_i32(candidate)?;
            let signature =
                secp256k1::recovery::RecoverableSignature::from_compact(compact, recovery_id)?;
            if let Ok(recovered) = SECP256K1.recover(message, &signature) {
                if recovered == self.public_key {
                    return Ok(candidate as u8);
                }
            }
        }
        Err(Error::Signing(String::from(
            "no recovery id reproduces the signing key",
        )))
    }
}

impl TransactionSigner for Secp256k1Keypair {
    fn header_size(&self) -> usize {
        1
    }

    fn sign_digest(&self, digest: &Hash256) -> Result<TransactionSignature> {
        let message = Message::from_slice(digest)?;
        let (_, compact) = SECP256K1
            .sign_recoverable(&message, &self.secret_key)
            .serialize_compact();
        let recovery_id = self.find_recovery_id(&message, &compact)?;
        let mut r = [0u8; R_BYTES];
        let mut s = [0u8; S_BYTES];
        r.copy_from_slice(&compact[..R_BYTES]);
        s.copy_from_slice(&compact[R_BYTES..]);
        Ok(TransactionSignature::new(
            Some(recovery_id + HEADER_OFFSET + COMPRESSED_FLAG),
            r,
            s,
        ))
    }

    fn public_key(&self) -> PublicKeyType {
        PublicKeyType::new(self.public_key.serialize().to_vec())
    }
}

impl fmt::Debug for Secp256k1Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1Keypair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// An ed25519 keypair. Its signatures carry no header byte.
pub struct Ed25519Keypair {
    signing_key: SigningKey,
}

impl Ed25519Keypair {
    pub fn from_secret_slice(slice: &[u8]) -> Result<Ed25519Keypair> {
        let secret: [u8; 32] = slice.try_into().map_err(|_| {
            Error::Signing(format!("ed25519 secret must be 32 bytes, got {}", slice.len()))
        })?;
        Ok(Ed25519Keypair {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Ed25519Keypair> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(secret_hex, &mut bytes as &mut [u8])?;
        Ed25519Keypair::from_secret_slice(&bytes)
    }
}

impl TransactionSigner for Ed25519Keypair {
    fn header_size(&self) -> usize {
        0
    }

    fn sign_digest(&self, digest: &Hash256) -> Result<TransactionSignature> {
        let signature = self.signing_key.sign(digest);
        Ok(TransactionSignature::new(
            None,
            *signature.r_bytes(),
            *signature.s_bytes(),
        ))
    }

    fn public_key(&self) -> PublicKeyType {
        PublicKeyType::new(self.signing_key.verifying_key().to_bytes().to_vec())
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Keypair")
            .field("public_key", &hex::encode(self.signing_key.verifying_key().to_bytes()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::hash;
    use ed25519_dalek::{Signature, Verifier};

    const SECRET: &str = "da79fe6d86347e8f8dc71eb3dbab9ba5623eaaed6c5dd0bb257c0d631faaff16";

    #[test]
    fn canonical_predicate_test() {
        let r = [0x11u8; 32];
        let s = [0x22u8; 32];
        assert!(TransactionSignature::new(Some(31), r, s).is_canonical());
        assert!(TransactionSignature::new(None, r, s).is_canonical());

        // header
        assert!(!TransactionSignature::new(Some(0), r, s).is_canonical());
        assert!(!TransactionSignature::new(Some(0x80), r, s).is_canonical());

        // R leading byte
        let mut high_r = r;
        high_r[0] = 0x80;
        assert!(!TransactionSignature::new(Some(31), high_r, s).is_canonical());
        assert!(!TransactionSignature::new(None, high_r, s).is_canonical());

        // a high bit at the end of R is allowed
        let mut high_r_tail = r;
        high_r_tail[31] = 0xff;
        assert!(TransactionSignature::new(Some(31), high_r_tail, s).is_canonical());

        // S leading byte
        let mut zero_s = s;
        zero_s[0] = 0;
        assert!(!TransactionSignature::new(Some(31), r, zero_s).is_canonical());
        assert!(!TransactionSignature::new(None, r, zero_s).is_canonical());
        let mut high_s = s;
        high_s[0] = 0x90;
        assert!(!TransactionSignature::new(Some(31), r, high_s).is_canonical());
        assert!(!TransactionSignature::new(None, r, high_s).is_canonical());
    }

    #[test]
    fn signature_layout_test() {
        let signature = TransactionSignature::new(Some(32), [1; 32], [2; 32]);
        let bytes = signature.to_bytes();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 32);
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes[33], 2);
        assert_eq!(signature.to_hex().len(), 130);
        assert_eq!(TransactionSignature::new(None, [1; 32], [2; 32]).to_bytes().len(), 64);
    }

    #[test]
    fn secp256k1_sign_digest_test() {
        let keypair = Secp256k1Keypair::from_secret_hex(SECRET).unwrap();
        let digest = hash(b"hello world");
        let signature = keypair.sign_digest(&digest).unwrap();
        let header = signature.get_header().unwrap();
        assert!((31..=34).contains(&header));
        assert_eq!(signature.to_bytes().len(), 65);

        // the header's recovery id recovers our own key
        let recovery_id = secp256k1::recovery::RecoveryId::from_i32((header - 31) as i32).unwrap();
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(signature.get_r());
        compact[32..].copy_from_slice(signature.get_s());
        let recoverable =
            secp256k1::recovery::RecoverableSignature::from_compact(&compact, recovery_id).unwrap();
        let message = Message::from_slice(&digest).unwrap();
        assert_eq!(
            SECP256K1.recover(&message, &recoverable).unwrap(),
            *keypair.get_public_key()
        );

        // deterministic
        assert_eq!(keypair.sign_digest(&digest).unwrap(), signature);
        assert_eq!(keypair.public_key().get_key_data().len(), 33);
    }

    #[test]
    fn ed25519_sign_digest_test() {
        let keypair = Ed25519Keypair::from_secret_hex(SECRET).unwrap();
        let digest = hash(b"hello world");
        let signature = keypair.sign_digest(&digest).unwrap();
        assert_eq!(signature.get_header(), None);
        assert_eq!(keypair.header_size(), 0);

        let mut raw = [0u8; 64];
        raw.copy_from_slice(&signature.to_bytes());
        assert!(keypair
            .signing_key
            .verifying_key()
            .verify(&digest, &Signature::from_bytes(&raw))
            .is_ok());
        assert_eq!(keypair.public_key().get_key_data().len(), 32);
    }

    #[test]
    fn bad_secret_test() {
        assert!(Secp256k1Keypair::from_secret_hex("randomtext").is_err());
        assert!(Secp256k1Keypair::from_secret_hex("").is_err());
        assert!(Secp256k1Keypair::from_secret_slice(&[0u8; 32]).is_err());
        assert!(Ed25519Keypair::from_secret_slice(&[1u8; 31]).is_err());
    }

    #[test]
    fn debug_hides_secret_test() {
        let keypair = Secp256k1Keypair::from_secret_hex(SECRET).unwrap();
        assert!(!format!("{:?}", keypair).contains(SECRET));
        let keypair = Ed25519Keypair::from_secret_hex(SECRET).unwrap();
        assert!(!format!("{:?}", keypair).contains(SECRET));
    }
}
