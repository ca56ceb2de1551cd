use bigint::uint::U256;
use serde_json::Value;

use crate::abi::types::{method_signature, AbiType, InputValue, WORD_BYTES};
use crate::keccak::keccak256;
use crate::types::{ObjectId, ACCOUNT_TYPE, CONTRACT_TYPE, PROTOCOL_SPACE};
use crate::{Error, Result};

pub const SELECTOR_BYTES: usize = 4;

// contract addresses carry this tag at CONTRACT_TAG_POSITION of their word
pub const CONTRACT_TAG: u8 = 0x01;
pub const CONTRACT_TAG_POSITION: usize = 12;

pub type Word = [u8; WORD_BYTES];

/// Tracks where the next dynamic blob lands, relative to the start of the
/// argument list being encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingContext {
    dynamic_offset: usize,
}

impl EncodingContext {
    /// The dynamic section starts right after the head, which is one word
    /// per argument plus the inline elements of static fixed-size arrays.
    pub fn new(head_size: usize) -> Self {
        EncodingContext {
            dynamic_offset: head_size,
        }
    }

    pub fn get_dynamic_offset(&self) -> usize {
        self.dynamic_offset
    }

    pub fn advance(&mut self, content_length: usize) {
        self.dynamic_offset += content_length;
    }
}

/// The first four bytes of the keccak-256 of a method signature.
pub fn selector(signature: &str) -> [u8; SELECTOR_BYTES] {
    let mut selector = [0u8; SELECTOR_BYTES];
    selector.copy_from_slice(&keccak256(signature.as_bytes())[..SELECTOR_BYTES]);
    selector
}

/// Selector of `method_name(types of args)` followed by the encoded arguments.
pub fn encode_call(method_name: &str, args: &[InputValue]) -> Result<Vec<u8>> {
    let types: Vec<&AbiType> = args.iter().map(InputValue::get_type).collect();
    let mut call_data = selector(&method_signature(method_name, &types)).to_vec();
    call_data.extend(encode_arguments(args)?);
    Ok(call_data)
}

pub fn encode_call_hex(method_name: &str, args: &[InputValue]) -> Result<String> {
    Ok(hex::encode(encode_call(method_name, args)?))
}

/// Contract bytecode followed by its encoded constructor arguments, as hex.
pub fn encode_constructor(bytecode_hex: &str, args: &[InputValue]) -> Result<String> {
    let bytecode = hex::decode(strip_hex_prefix(bytecode_hex))?;
    let mut code = bytecode;
    code.extend(encode_arguments(args)?);
    Ok(hex::encode(code))
}

pub fn encode_arguments(args: &[InputValue]) -> Result<Vec<u8>> {
    let values: Vec<(&AbiType, &str)> = args
        .iter()
        .map(|arg| (arg.get_type(), arg.get_raw_value()))
        .collect();
    encode_tuple(&values)
}

//
// Static values go straight into the head. Each dynamic value leaves its
// offset in the head and its content in the tail, in argument order.
//
fn encode_tuple(values: &[(&AbiType, &str)]) -> Result<Vec<u8>> {
    let head_size = values.iter().map(|(abi_type, _)| abi_type.head_size()).sum();
    let mut context = EncodingContext::new(head_size);
    let mut head = Vec::with_capacity(head_size);
    let mut tail = vec![];

    for (abi_type, raw_value) in values {
        if abi_type.is_dynamic() {
            head.extend(usize_word(context.get_dynamic_offset()));
            let content = encode_dynamic(abi_type, raw_value)?;
            context.advance(content.len());
            tail.extend(content);
        } else {
            head.extend(encode_static(abi_type, raw_value)?);
        }
    }

    head.extend(tail);
    Ok(head)
}

// a static `item[N]` is its N elements back to back, with no count
fn encode_static(abi_type: &AbiType, raw_value: &str) -> Result<Vec<u8>> {
    match abi_type {
        AbiType::Array(item, Some(length)) => {
            let elements = parse_array(abi_type, raw_value, Some(*length))?;
            let mut content = Vec::with_capacity(abi_type.head_size());
            for element in &elements {
                content.extend(encode_static(item, element)?);
            }
            Ok(content)
        }
        _ => Ok(encode_word(abi_type, raw_value)?.to_vec()),
    }
}

fn encode_word(abi_type: &AbiType, raw_value: &str) -> Result<Word> {
    let raw_value = raw_value.trim();
    match abi_type {
        AbiType::Bool => match raw_value {
            "true" | "1" => Ok(usize_word(1)),
            "false" | "0" => Ok(usize_word(0)),
            _ => Err(malformed_value(abi_type, raw_value)),
        },
        AbiType::Uint(bits) => {
            let value = parse_unsigned(abi_type, raw_value)?;
            if value.bits() > *bits {
                return Err(malformed_value(abi_type, raw_value));
            }
            Ok(u256_word(value))
        }
        AbiType::Int(bits) => encode_int(abi_type, *bits, raw_value),
        AbiType::Address => encode_address(raw_value),
        AbiType::FixedBytes(size) => {
            let bytes = parse_hex(abi_type, raw_value)?;
            if bytes.len() > *size {
                return Err(malformed_value(abi_type, raw_value));
            }
            let mut word = [0u8; WORD_BYTES];
            word[..bytes.len()].copy_from_slice(&bytes);
            Ok(word)
        }
        _ => Err(Error::MalformedParameter(format!(
            "{} is not a static type",
            abi_type
        ))),
    }
}

fn encode_dynamic(abi_type: &AbiType, raw_value: &str) -> Result<Vec<u8>> {
    match abi_type {
        AbiType::String => Ok(encode_blob(raw_value.as_bytes())),
        AbiType::Bytes => Ok(encode_blob(&parse_hex(abi_type, raw_value.trim())?)),
        // `item[]` leads with its count; `item[N]` of a dynamic item does not
        AbiType::Array(item, length) => {
            let elements = parse_array(abi_type, raw_value, *length)?;
            let values: Vec<(&AbiType, &str)> = elements
                .iter()
                .map(|element| (&**item, element.as_str()))
                .collect();
            let mut content = match length {
                Some(_) => vec![],
                None => usize_word(elements.len()).to_vec(),
            };
            content.extend(encode_tuple(&values)?);
            Ok(content)
        }
        _ => Err(Error::MalformedParameter(format!(
            "{} is not a dynamic type",
            abi_type
        ))),
    }
}

/// A length word, then the bytes right padded to a word boundary.
fn encode_blob(bytes: &[u8]) -> Vec<u8> {
    let padded_length = (bytes.len() + WORD_BYTES - 1) / WORD_BYTES * WORD_BYTES;
    let mut content = usize_word(bytes.len()).to_vec();
    content.extend(bytes);
    content.resize(WORD_BYTES + padded_length, 0);
    content
}

// a plain account id is its instance; a contract id also sets the tag byte
fn encode_address(raw_value: &str) -> Result<Word> {
    let object_id: ObjectId = raw_value.parse()?;
    let mut word = usize_word(0);
    word[WORD_BYTES - 8..].copy_from_slice(&object_id.get_instance().to_be_bytes());
    if object_id.is_type(PROTOCOL_SPACE, CONTRACT_TYPE) {
        word[CONTRACT_TAG_POSITION] = CONTRACT_TAG;
    } else if !object_id.is_type(PROTOCOL_SPACE, ACCOUNT_TYPE) {
        return Err(Error::MalformedParameter(format!(
            "{} is neither an account nor a contract",
            raw_value
        )));
    }
    Ok(word)
}

fn encode_int(abi_type: &AbiType, bits: usize, raw_value: &str) -> Result<Word> {
    let (negative, digits) = match raw_value.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, raw_value),
    };
    let magnitude = parse_unsigned(abi_type, digits)?;
    let limit = U256::one() << (bits - 1);
    let in_range = if negative {
        magnitude <= limit
    } else {
        magnitude < limit
    };
    if !in_range {
        return Err(malformed_value(abi_type, raw_value));
    }
    let word = u256_word(magnitude);
    Ok(if negative { twos_complement(word) } else { word })
}

/// Negate a big-endian word in two's complement.
pub(crate) fn twos_complement(word: Word) -> Word {
    let mut negated = word;
    for byte in negated.iter_mut() {
        *byte = !*byte;
    }
    for byte in negated.iter_mut().rev() {
        let (sum, carry) = byte.overflowing_add(1);
        *byte = sum;
        if !carry {
            break;
        }
    }
    negated
}

fn parse_unsigned(abi_type: &AbiType, raw_value: &str) -> Result<U256> {
    if let Some(digits) = raw_value.strip_prefix("0x") {
        let bytes = parse_hex(abi_type, digits)?;
        if bytes.len() > WORD_BYTES || digits.is_empty() {
            return Err(malformed_value(abi_type, raw_value));
        }
        return Ok(U256::from_big_endian(&bytes));
    }
    if raw_value.is_empty() || !raw_value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed_value(abi_type, raw_value));
    }
    U256::from_dec_str(raw_value).map_err(|_| malformed_value(abi_type, raw_value))
}

fn parse_hex(abi_type: &AbiType, raw_value: &str) -> Result<Vec<u8>> {
    let digits = strip_hex_prefix(raw_value);
    // tolerate an odd digit count by reading it as a leading zero
    let digits = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        String::from(digits)
    };
    hex::decode(&digits).map_err(|_| malformed_value(abi_type, raw_value))
}

fn strip_hex_prefix(raw_value: &str) -> &str {
    raw_value.strip_prefix("0x").unwrap_or(raw_value)
}

// arrays are written as JSON arrays; elements that are not strings keep
// their JSON text, which is how nested arrays are passed down
fn parse_array(abi_type: &AbiType, raw_value: &str, length: Option<usize>) -> Result<Vec<String>> {
    let elements: Vec<Value> = serde_json::from_str(raw_value)
        .map_err(|e| Error::MalformedParameter(format!("{} value {:?}: {}", abi_type, raw_value, e)))?;
    if let Some(length) = length {
        if elements.len() != length {
            return Err(Error::MalformedParameter(format!(
                "{} expects {} elements, got {}",
                abi_type,
                length,
                elements.len()
            )));
        }
    }
    Ok(elements
        .into_iter()
        .map(|element| match element {
            Value::String(text) => text,
            other => other.to_string(),
        })
        .collect())
}

fn malformed_value(abi_type: &AbiType, raw_value: &str) -> Error {
    Error::MalformedParameter(format!("invalid {} value {:?}", abi_type, raw_value))
}

pub(crate) fn usize_word(value: usize) -> Word {
    let mut word = [0u8; WORD_BYTES];
    word[WORD_BYTES - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn u256_word(value: U256) -> Word {
    let mut word = [0u8; WORD_BYTES];
    value.to_big_endian(&mut word);
    word
}
