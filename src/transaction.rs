use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{event, Level};

use crate::binary::ToBytes;
use crate::block_reference::BlockReference;
use crate::crypto::{double_hash, hash};
use crate::keypair::{TransactionSignature, TransactionSigner};
use crate::operation::Operation;
use crate::time::format_timestamp;
use crate::types::Extensions;
use crate::{Error, Result};

/// Attempts before the canonical-signature loop gives up.
pub const DEFAULT_MAX_SIGNING_ATTEMPTS: u32 = 1000;

/// Most operations one transaction may carry. The count goes out as a single
/// byte, and a varint only stays one byte below 128.
pub const MAX_OPERATIONS: usize = 127;

// the transaction id is a truncated sha256
const TRANSACTION_ID_BYTES: usize = 20;

/// An unsigned transaction, ready to be signed and broadcast.
#[derive(Debug, Clone)]
pub struct Transaction {
    operations: Vec<Operation>,
    block_reference: BlockReference,
    chain_id: String,
    signers: Vec<Arc<dyn TransactionSigner>>,
}

impl Transaction {
    pub fn new(block_reference: BlockReference, chain_id: &str) -> Transaction {
        Transaction {
            operations: vec![],
            block_reference,
            chain_id: String::from(chain_id),
            signers: vec![],
        }
    }

    /// Past `MAX_OPERATIONS` the transaction can no longer be serialized or signed.
    pub fn add_operation(&mut self, operation: impl Into<Operation>) {
        self.operations.push(operation.into());
    }

    pub fn add_signer(&mut self, signer: Arc<dyn TransactionSigner>) {
        self.signers.push(signer);
    }

    pub fn get_operations(&self) -> &Vec<Operation> {
        &self.operations
    }

    pub fn get_block_reference(&self) -> &BlockReference {
        &self.block_reference
    }

    pub fn get_chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Everything but the chain id: block reference, operations, extensions.
    pub fn serialize_body(&self) -> Vec<u8> {
        let mut bytes = vec![];
        self.block_reference.write_bytes(&mut bytes);
        self.operations.write_bytes(&mut bytes);
        Extensions.write_bytes(&mut bytes);
        bytes
    }

    /// The byte stream signatures are computed over.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.operations.len() > MAX_OPERATIONS {
            return Err(Error::MalformedParameter(format!(
                "{} operations, at most {} fit in a transaction",
                self.operations.len(),
                MAX_OPERATIONS
            )));
        }
        let mut bytes = hex::decode(&self.chain_id)?;
        bytes.extend(self.serialize_body());
        Ok(bytes)
    }

    pub fn id(&self) -> String {
        hex::encode(&hash(&self.serialize_body())[..TRANSACTION_ID_BYTES])
    }

    ///
    /// Sign with every signer, in order.
    ///
    /// Signatures are deterministic, so when any one of them is not canonical
    /// the expiration is moved a second later and the whole batch is signed
    /// again over the new digest. Gives up with `Error::Signing` after
    /// `max_attempts` batches.
    ///
    pub fn sign(mut self, max_attempts: u32) -> Result<SignedTransaction> {
        if self.signers.is_empty() {
            return Err(Error::Signing(String::from("no signing key provided")));
        }

        for attempt in 1..=max_attempts {
            let digest = double_hash(&self.to_bytes()?);
            let signatures = self
                .signers
                .iter()
                .map(|signer| signer.sign_digest(&digest))
                .collect::<Result<Vec<TransactionSignature>>>()?;

            if signatures.iter().all(TransactionSignature::is_canonical) {
                event!(
                    Level::DEBUG,
                    "signed transaction after {} attempt(s), expiration {}",
                    attempt,
                    self.block_reference.get_relative_expiration()
                );
                return Ok(SignedTransaction {
                    transaction: self,
                    signatures,
                });
            }

            event!(
                Level::TRACE,
                "non-canonical signature on attempt {}, bumping expiration",
                attempt
            );
            self.block_reference.increment_expiration();
        }

        event!(
            Level::ERROR,
            "no canonical signature after {} attempts",
            max_attempts
        );
        Err(Error::Signing(format!(
            "no canonical signature after {} attempts",
            max_attempts
        )))
    }
}

/// A transaction together with its accepted signatures.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    transaction: Transaction,
    signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    pub fn get_transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn get_signatures(&self) -> &Vec<TransactionSignature> {
        &self.signatures
    }

    pub fn id(&self) -> String {
        self.transaction.id()
    }

    /// The form `broadcast_transaction` accepts.
    pub fn to_json(&self) -> Value {
        let block_reference = self.transaction.get_block_reference();
        json!({
            "expiration": format_timestamp(block_reference.get_relative_expiration()),
            "signatures": self.signatures.iter().map(TransactionSignature::to_hex).collect::<Vec<String>>(),
            "operations": self.transaction.get_operations(),
            "extensions": Extensions,
            "ref_block_num": block_reference.get_ref_block_num(),
            "ref_block_prefix": block_reference.get_ref_block_prefix(),
        })
    }
}
