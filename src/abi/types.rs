use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

pub const WORD_BYTES: usize = 32;
pub const MAX_INTEGER_BITS: usize = 256;

/// An ABI type descriptor such as `uint256`, `string` or `address[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    Bool,
    /// Unsigned integer of the given bit width.
    Uint(usize),
    /// Two's complement integer of the given bit width.
    Int(usize),
    /// An account (`1.2.N`) or contract (`1.11.N`) id.
    Address,
    /// `bytes1` ..= `bytes32`, right padded.
    FixedBytes(usize),
    Bytes,
    String,
    /// `item[]` when the length is `None`, `item[N]` otherwise.
    Array(Box<AbiType>, Option<usize>),
}

impl AbiType {
    /// Dynamic types are written as an offset in the head and their content
    /// in the tail. `item[N]` is dynamic only when `item` is.
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_, None) => true,
            AbiType::Array(item, Some(_)) => item.is_dynamic(),
            _ => false,
        }
    }

    pub fn is_static(&self) -> bool {
        !self.is_dynamic()
    }

    /// Bytes this type takes in the head of its enclosing tuple: one word,
    /// or every element inline for a static `item[N]`.
    pub fn head_size(&self) -> usize {
        match self {
            AbiType::Array(item, Some(length)) if item.is_static() => length * item.head_size(),
            _ => WORD_BYTES,
        }
    }

    fn parse_integer_bits(type_name: &str, bits: &str) -> Result<usize> {
        if bits.is_empty() {
            return Ok(MAX_INTEGER_BITS);
        }
        match bits.parse::<usize>() {
            Ok(bits) if bits > 0 && bits <= MAX_INTEGER_BITS && bits % 8 == 0 => Ok(bits),
            _ => Err(malformed_type(type_name)),
        }
    }
}

fn malformed_type(type_name: &str) -> Error {
    Error::MalformedParameter(format!("invalid abi type {:?}", type_name))
}

impl FromStr for AbiType {
    type Err = Error;

    fn from_str(type_name: &str) -> Result<Self> {
        let type_name = type_name.trim();

        // array suffixes bind from the right: `uint8[2][]` is a list of pairs
        if let Some(open) = type_name.strip_suffix(']').and_then(|t| t.rfind('[')) {
            let item = &type_name[..open];
            let length = &type_name[open + 1..type_name.len() - 1];
            if item.is_empty() {
                return Err(malformed_type(type_name));
            }
            let length = if length.is_empty() {
                None
            } else {
                Some(length.parse::<usize>().map_err(|_| malformed_type(type_name))?)
            };
            return Ok(AbiType::Array(Box::new(item.parse()?), length));
        }

        match type_name {
            "bool" => Ok(AbiType::Bool),
            "address" => Ok(AbiType::Address),
            "string" => Ok(AbiType::String),
            "bytes" => Ok(AbiType::Bytes),
            _ => {
                if let Some(bits) = type_name.strip_prefix("uint") {
                    Ok(AbiType::Uint(AbiType::parse_integer_bits(type_name, bits)?))
                } else if let Some(bits) = type_name.strip_prefix("int") {
                    Ok(AbiType::Int(AbiType::parse_integer_bits(type_name, bits)?))
                } else if let Some(size) = type_name.strip_prefix("bytes") {
                    match size.parse::<usize>() {
                        Ok(size) if size > 0 && size <= WORD_BYTES => Ok(AbiType::FixedBytes(size)),
                        _ => Err(malformed_type(type_name)),
                    }
                } else {
                    Err(malformed_type(type_name))
                }
            }
        }
    }
}

// the canonical spelling used inside method signatures
impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Bool => write!(f, "bool"),
            AbiType::Uint(bits) => write!(f, "uint{}", bits),
            AbiType::Int(bits) => write!(f, "int{}", bits),
            AbiType::Address => write!(f, "address"),
            AbiType::FixedBytes(size) => write!(f, "bytes{}", size),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::String => write!(f, "string"),
            AbiType::Array(item, None) => write!(f, "{}[]", item),
            AbiType::Array(item, Some(length)) => write!(f, "{}[{}]", item, length),
        }
    }
}

/// One typed call argument, with its value as text.
///
/// Values are written the way a user would type them: decimal (or `0x` hex)
/// integers, `true`/`false`, object ids for addresses, hex for byte strings,
/// and JSON arrays of such values for arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputValue {
    abi_type: AbiType,
    raw_value: String,
}

impl InputValue {
    pub fn new(abi_type: AbiType, raw_value: &str) -> Self {
        InputValue {
            abi_type,
            raw_value: String::from(raw_value),
        }
    }

    /// Parse the type descriptor, e.g. `InputValue::parse("string", "name")`.
    pub fn parse(type_name: &str, raw_value: &str) -> Result<Self> {
        Ok(InputValue::new(type_name.parse()?, raw_value))
    }

    pub fn get_type(&self) -> &AbiType {
        &self.abi_type
    }

    pub fn get_raw_value(&self) -> &str {
        &self.raw_value
    }
}

/// `method(type1,type2,...)`
pub fn method_signature(method_name: &str, types: &[&AbiType]) -> String {
    let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    format!("{}({})", method_name, types.join(","))
}
