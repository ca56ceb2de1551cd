use std::fmt;
use std::str::FromStr;

use base58::{FromBase58, ToBase58};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::binary::{ToBytes, Varint};
use crate::{Error, Result};

/// Prefix of public key addresses, e.g. `GPH6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV`.
pub const ADDRESS_PREFIX: &str = "GPH";

/// A protocol object id of the form `space.type.instance`, e.g. `1.2.17`.
///
/// Only the instance travels on the wire; space and type are implied by the
/// field the id appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    space: u8,
    type_id: u8,
    instance: u64,
}

pub const PROTOCOL_SPACE: u8 = 1;
pub const IMPLEMENTATION_SPACE: u8 = 2;
pub const ACCOUNT_TYPE: u8 = 2;
pub const ASSET_TYPE: u8 = 3;
pub const CONTRACT_TYPE: u8 = 11;
pub const ACCOUNT_STATISTICS_TYPE: u8 = 6;

impl ObjectId {
    pub const fn new(space: u8, type_id: u8, instance: u64) -> Self {
        ObjectId {
            space,
            type_id,
            instance,
        }
    }

    pub const fn account(instance: u64) -> Self {
        ObjectId::new(PROTOCOL_SPACE, ACCOUNT_TYPE, instance)
    }

    pub const fn asset(instance: u64) -> Self {
        ObjectId::new(PROTOCOL_SPACE, ASSET_TYPE, instance)
    }

    pub const fn contract(instance: u64) -> Self {
        ObjectId::new(PROTOCOL_SPACE, CONTRACT_TYPE, instance)
    }

    pub fn get_space(&self) -> u8 {
        self.space
    }

    pub fn get_type_id(&self) -> u8 {
        self.type_id
    }

    pub fn get_instance(&self) -> u64 {
        self.instance
    }

    pub fn is_type(&self, space: u8, type_id: u8) -> bool {
        self.space == space && self.type_id == type_id
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.space, self.type_id, self.instance)
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::MalformedParameter(format!("invalid object id {:?}", s));
        let mut parts = s.split('.');
        let space = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        let type_id = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        let instance = parts.next().and_then(|p| p.parse().ok()).ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(ObjectId::new(space, type_id, instance))
    }
}

impl ToBytes for ObjectId {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        Varint(self.instance).write_bytes(bytes);
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Raw public key bytes as they appear inside authorities and account options.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKeyType {
    key_data: Vec<u8>,
}

impl PublicKeyType {
    pub fn new(key_data: Vec<u8>) -> Self {
        PublicKeyType { key_data }
    }

    pub fn from_address(address: &str) -> Result<Self> {
        let encoded = address.strip_prefix(ADDRESS_PREFIX).ok_or_else(|| {
            Error::MalformedParameter(format!("address {:?} lacks the {} prefix", address, ADDRESS_PREFIX))
        })?;
        let key_data = encoded.from_base58().map_err(|e| {
            Error::MalformedParameter(format!("address {:?} is not base58: {:?}", address, e))
        })?;
        Ok(PublicKeyType { key_data })
    }

    pub fn address(&self) -> String {
        format!("{}{}", ADDRESS_PREFIX, self.key_data.to_base58())
    }

    pub fn get_key_data(&self) -> &[u8] {
        &self.key_data
    }
}

// keys are fixed size for their scheme, so no length prefix
impl ToBytes for PublicKeyType {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        bytes.extend(&self.key_data);
    }
}

impl Serialize for PublicKeyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.address())
    }
}

/// The extension list every operation and transaction carries. Always empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extensions;

impl ToBytes for Extensions {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        Varint(0).write_bytes(bytes);
    }
}

impl Serialize for Extensions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(std::iter::empty::<()>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_parse_test() {
        let id: ObjectId = "1.2.17".parse().unwrap();
        assert_eq!(id, ObjectId::account(17));
        assert_eq!(id.to_string(), "1.2.17");
        assert!(id.is_type(PROTOCOL_SPACE, ACCOUNT_TYPE));
        assert_eq!(id.to_bytes(), vec![17]);
        assert_eq!(ObjectId::asset(300).to_bytes(), vec![0xac, 0x02]);

        assert!("1.2".parse::<ObjectId>().is_err());
        assert!("1.2.x".parse::<ObjectId>().is_err());
        assert!("1.2.3.4".parse::<ObjectId>().is_err());
        assert!("".parse::<ObjectId>().is_err());
    }

    #[test]
    fn object_id_json_test() {
        let id = ObjectId::contract(5);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1.11.5\"");
        let parsed: ObjectId = serde_json::from_str("\"1.3.0\"").unwrap();
        assert_eq!(parsed, ObjectId::asset(0));
    }

    #[test]
    fn public_key_address_test() {
        let key = PublicKeyType::new(vec![7; 32]);
        let address = key.address();
        assert!(address.starts_with(ADDRESS_PREFIX));
        assert_eq!(PublicKeyType::from_address(&address).unwrap(), key);
        assert_eq!(key.to_bytes(), vec![7; 32]);
        assert!(PublicKeyType::from_address("XYZabc").is_err());
        assert!(PublicKeyType::from_address("GPH0OIl").is_err());
    }

    #[test]
    fn extensions_test() {
        assert_eq!(Extensions.to_bytes(), vec![0]);
        assert_eq!(serde_json::to_string(&Extensions).unwrap(), "[]");
    }
}
