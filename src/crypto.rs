use sha2::{Digest, Sha256};

pub type Hash256 = [u8; 32];

pub fn hash(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_slice());
    output
}

/// The digest a transaction's signatures are computed over.
pub fn double_hash(data: &[u8]) -> Hash256 {
    hash(&hash(data))
}
