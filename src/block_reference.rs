use crate::binary::ToBytes;
use crate::{Error, Result};

// hex characters of the block id holding the prefix (bytes 4..8)
const PREFIX_HEX_START: usize = 8;
const PREFIX_HEX_END: usize = 16;

/// Anchors a transaction to a recent block for expiry and replay protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    ref_block_num: u16,
    ref_block_prefix: u32,
    relative_expiration: u32,
}

impl BlockReference {
    pub fn new(ref_block_num: u16, ref_block_prefix: u32, relative_expiration: u32) -> Self {
        BlockReference {
            ref_block_num,
            ref_block_prefix,
            relative_expiration,
        }
    }

    /// Build a reference to the current head block, expiring `expiration_window`
    /// seconds after the head block time.
    pub fn from_head_block(
        head_block_number: u64,
        head_block_id: &str,
        head_block_time: u32,
        expiration_window: u32,
    ) -> Result<Self> {
        Ok(BlockReference {
            ref_block_num: (head_block_number & 0xffff) as u16,
            ref_block_prefix: BlockReference::extract_ref_block_prefix(head_block_id)?,
            relative_expiration: head_block_time.saturating_add(expiration_window),
        })
    }

    /// Read bytes 4..8 of the block id and reassemble them in reversed order.
    pub fn extract_ref_block_prefix(block_id: &str) -> Result<u32> {
        let prefix_hex = block_id.get(PREFIX_HEX_START..PREFIX_HEX_END).ok_or_else(|| {
            Error::MalformedParameter(format!("block id {:?} is too short", block_id))
        })?;
        let mut prefix_bytes = [0u8; 4];
        hex::decode_to_slice(prefix_hex, &mut prefix_bytes)?;
        Ok(u32::from_le_bytes(prefix_bytes))
    }

    pub fn get_ref_block_num(&self) -> u16 {
        self.ref_block_num
    }

    pub fn get_ref_block_prefix(&self) -> u32 {
        self.ref_block_prefix
    }

    pub fn get_relative_expiration(&self) -> u32 {
        self.relative_expiration
    }

    /// Moves the expiration one second later, which changes the transaction digest.
    pub fn increment_expiration(&mut self) {
        self.relative_expiration = self.relative_expiration.wrapping_add(1);
    }
}

impl ToBytes for BlockReference {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.ref_block_num.write_bytes(bytes);
        self.ref_block_prefix.write_bytes(bytes);
        self.relative_expiration.write_bytes(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_reference_bytes_test() {
        let block_reference = BlockReference::new(0x0102, 0x1234abcd, 0x5a82ba10);
        let bytes = block_reference.to_bytes();
        assert_eq!(bytes.len(), 10);
        assert_eq!(
            bytes,
            vec![0x02, 0x01, 0xcd, 0xab, 0x34, 0x12, 0x10, 0xba, 0x82, 0x5a]
        );
    }

    #[test]
    fn from_head_block_test() {
        let block_id = "0001000a1b2c3d4e00000000000000000000000a";
        let block_reference =
            BlockReference::from_head_block(0x1000a, block_id, 1518516752, 30).unwrap();
        // only the low 16 bits of the height survive
        assert_eq!(block_reference.get_ref_block_num(), 0x000a);
        assert_eq!(block_reference.get_ref_block_prefix(), 0x4e3d2c1b);
        assert_eq!(block_reference.get_relative_expiration(), 1518516782);
    }

    #[test]
    fn malformed_block_id_test() {
        assert!(BlockReference::extract_ref_block_prefix("0001").is_err());
        assert!(BlockReference::extract_ref_block_prefix("00010000zzzzzzzz").is_err());
    }

    #[test]
    fn increment_expiration_test() {
        let mut block_reference = BlockReference::new(1, 2, 3);
        let before = block_reference.to_bytes();
        block_reference.increment_expiration();
        assert_eq!(block_reference.get_relative_expiration(), 4);
        assert_eq!(block_reference.get_ref_block_num(), 1);
        assert_ne!(before, block_reference.to_bytes());
    }
}
