use std::fmt;

use bigint::uint::U256;
use serde_json::Value;

use crate::abi::encoder::{twos_complement, Word, CONTRACT_TAG, CONTRACT_TAG_POSITION};
use crate::abi::types::{AbiType, WORD_BYTES};
use crate::types::ObjectId;
use crate::{Error, Result};

/// A value read back from contract output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    Bool(bool),
    Uint(U256),
    Int { negative: bool, magnitude: U256 },
    Address(ObjectId),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<DecodedValue>),
}

impl DecodedValue {
    /// Integers become decimal strings so no precision is lost.
    pub fn to_json(&self) -> Value {
        match self {
            DecodedValue::Bool(value) => Value::Bool(*value),
            DecodedValue::Array(items) => Value::Array(items.iter().map(DecodedValue::to_json).collect()),
            other => Value::String(other.to_string()),
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Bool(value) => write!(f, "{}", value),
            DecodedValue::Uint(value) => write!(f, "{}", value),
            DecodedValue::Int {
                negative,
                magnitude,
            } => {
                if *negative && !magnitude.is_zero() {
                    write!(f, "-")?;
                }
                write!(f, "{}", magnitude)
            }
            DecodedValue::Address(object_id) => write!(f, "{}", object_id),
            DecodedValue::FixedBytes(bytes) | DecodedValue::Bytes(bytes) => {
                write!(f, "0x{}", hex::encode(bytes))
            }
            DecodedValue::String(text) => write!(f, "{}", text),
            DecodedValue::Array(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Decode contract output holding values of the given types, in order.
pub fn decode(bytes: &[u8], types: &[AbiType]) -> Result<Vec<DecodedValue>> {
    decode_tuple(bytes, types)
}

pub fn decode_hex(output: &str, types: &[AbiType]) -> Result<Vec<DecodedValue>> {
    let bytes = hex::decode(output.trim().trim_start_matches("0x"))
        .map_err(|e| Error::Decode(format!("contract output is not hex: {}", e)))?;
    decode(&bytes, types)
}

//
// Heads are consumed left to right, `head_size` bytes per type. A dynamic
// type's head word is an offset from the start of the enclosing tuple.
//
fn decode_tuple(data: &[u8], types: &[AbiType]) -> Result<Vec<DecodedValue>> {
    let mut values = Vec::with_capacity(types.len());
    let mut remaining = data;
    for abi_type in types {
        let head = take(remaining, abi_type.head_size())?;
        remaining = &remaining[head.len()..];
        if abi_type.is_dynamic() {
            let (offset_word, _) = split_word(head)?;
            let offset = word_to_usize(offset_word)?;
            let content = data.get(offset..).ok_or_else(|| {
                Error::Decode(format!("offset {} is past the end of {} bytes", offset, data.len()))
            })?;
            values.push(decode_dynamic(content, abi_type)?);
        } else {
            values.push(decode_static(head, abi_type)?);
        }
    }
    Ok(values)
}

fn decode_static(data: &[u8], abi_type: &AbiType) -> Result<DecodedValue> {
    match abi_type {
        AbiType::Array(item, Some(length)) => {
            let item_size = item.head_size();
            let items = (0..*length)
                .map(|index| {
                    let element = data
                        .get(index * item_size..(index + 1) * item_size)
                        .ok_or_else(|| Error::Decode(format!("{} is truncated", abi_type)))?;
                    decode_static(element, item)
                })
                .collect::<Result<Vec<DecodedValue>>>()?;
            Ok(DecodedValue::Array(items))
        }
        _ => {
            let (word, _) = split_word(data)?;
            decode_word(word, abi_type)
        }
    }
}

fn decode_word(word: &Word, abi_type: &AbiType) -> Result<DecodedValue> {
    match abi_type {
        AbiType::Bool => match word_to_usize(word)? {
            0 => Ok(DecodedValue::Bool(false)),
            1 => Ok(DecodedValue::Bool(true)),
            other => Err(Error::Decode(format!("{} is not a bool", other))),
        },
        AbiType::Uint(bits) => {
            let value = U256::from_big_endian(word);
            if value.bits() > *bits {
                return Err(Error::Decode(format!("{} does not fit {}", value, abi_type)));
            }
            Ok(DecodedValue::Uint(value))
        }
        AbiType::Int(_) => {
            let negative = word[0] & 0x80 != 0;
            let magnitude = if negative {
                U256::from_big_endian(&twos_complement(*word))
            } else {
                U256::from_big_endian(word)
            };
            Ok(DecodedValue::Int {
                negative,
                magnitude,
            })
        }
        AbiType::Address => decode_address(word),
        AbiType::FixedBytes(size) => Ok(DecodedValue::FixedBytes(word[..*size].to_vec())),
        _ => Err(Error::Decode(format!("{} is not a static type", abi_type))),
    }
}

fn decode_dynamic(data: &[u8], abi_type: &AbiType) -> Result<DecodedValue> {
    match abi_type {
        AbiType::Bytes => Ok(DecodedValue::Bytes(decode_blob(data)?.to_vec())),
        AbiType::String => {
            let text = String::from_utf8(decode_blob(data)?.to_vec())
                .map_err(|e| Error::Decode(format!("string is not utf-8: {}", e)))?;
            Ok(DecodedValue::String(text))
        }
        AbiType::Array(item, None) => {
            let (count_word, content) = split_word(data)?;
            decode_elements(content, item, word_to_usize(count_word)?)
        }
        AbiType::Array(item, Some(length)) => decode_elements(data, item, *length),
        _ => Err(Error::Decode(format!("{} is not a dynamic type", abi_type))),
    }
}

fn decode_blob(data: &[u8]) -> Result<&[u8]> {
    let (length_word, content) = split_word(data)?;
    take(content, word_to_usize(length_word)?)
}

fn decode_elements(data: &[u8], item: &AbiType, count: usize) -> Result<DecodedValue> {
    // every element needs at least its head
    take(data, count.saturating_mul(item.head_size()))?;
    let item_types = vec![item.clone(); count];
    Ok(DecodedValue::Array(decode_tuple(data, &item_types)?))
}

fn decode_address(word: &Word) -> Result<DecodedValue> {
    let instance_start = WORD_BYTES - 8;
    let padding_is_clear = word[..instance_start]
        .iter()
        .enumerate()
        .all(|(position, byte)| *byte == 0 || position == CONTRACT_TAG_POSITION);
    let tag = word[CONTRACT_TAG_POSITION];
    if !padding_is_clear || (tag != 0 && tag != CONTRACT_TAG) {
        return Err(Error::Decode(format!(
            "0x{} is not an address",
            hex::encode(word)
        )));
    }
    let mut instance = [0u8; 8];
    instance.copy_from_slice(&word[instance_start..]);
    let instance = u64::from_be_bytes(instance);
    Ok(DecodedValue::Address(if tag == CONTRACT_TAG {
        ObjectId::contract(instance)
    } else {
        ObjectId::account(instance)
    }))
}

fn split_word(data: &[u8]) -> Result<(&Word, &[u8])> {
    if data.len() < WORD_BYTES {
        return Err(Error::Decode(format!(
            "expected a {} byte word, {} bytes left",
            WORD_BYTES,
            data.len()
        )));
    }
    let (word, rest) = data.split_at(WORD_BYTES);
    let word: &Word = word
        .try_into()
        .map_err(|_| Error::Decode(String::from("short word")))?;
    Ok((word, rest))
}

fn take(data: &[u8], length: usize) -> Result<&[u8]> {
    data.get(..length).ok_or_else(|| {
        Error::Decode(format!("expected {} bytes, {} bytes left", length, data.len()))
    })
}

fn word_to_usize(word: &Word) -> Result<usize> {
    if word[..WORD_BYTES - 8].iter().any(|byte| *byte != 0) {
        return Err(Error::Decode(format!("0x{} is too large", hex::encode(word))));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD_BYTES - 8..]);
    usize::try_from(u64::from_be_bytes(low))
        .map_err(|_| Error::Decode(format!("0x{} is too large", hex::encode(word))))
}
