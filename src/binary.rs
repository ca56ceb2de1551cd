/*!
# Binary wire format

Serializers for the node's transaction wire format. Fixed-width integers
are always written little-endian regardless of the host, counts and object
instances are written as unsigned LEB128 varints, strings and byte blobs
carry a varint length prefix, optionals carry a one byte presence flag.
*/

use std::collections::{BTreeMap, BTreeSet};

/// Types that know their exact wire encoding.
pub trait ToBytes {
    fn write_bytes(&self, bytes: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![];
        self.write_bytes(&mut bytes);
        bytes
    }
}

/// An unsigned integer written as a LEB128 varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varint(pub u64);

impl ToBytes for Varint {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        let mut value = self.0;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                bytes.push(byte);
                break;
            }
            bytes.push(byte | 0x80);
        }
    }
}

macro_rules! fixed_width_to_bytes {
    ($($int:ty),*) => {
        $(
            impl ToBytes for $int {
                fn write_bytes(&self, bytes: &mut Vec<u8>) {
                    bytes.extend(&self.to_le_bytes());
                }
            }
        )*
    };
}

fixed_width_to_bytes!(u8, u16, u32, u64, i64);

impl ToBytes for bool {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        bytes.push(*self as u8);
    }
}

impl ToBytes for str {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        Varint(self.len() as u64).write_bytes(bytes);
        bytes.extend(self.as_bytes());
    }
}

impl ToBytes for String {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        self.as_str().write_bytes(bytes);
    }
}

impl<T: ToBytes> ToBytes for Option<T> {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        match self {
            Some(value) => {
                bytes.push(1);
                value.write_bytes(bytes);
            }
            None => bytes.push(0),
        }
    }
}

impl<T: ToBytes> ToBytes for Vec<T> {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        Varint(self.len() as u64).write_bytes(bytes);
        for item in self {
            item.write_bytes(bytes);
        }
    }
}

// flat sets and flat maps; ordered containers keep the encoding deterministic
impl<T: ToBytes> ToBytes for BTreeSet<T> {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        Varint(self.len() as u64).write_bytes(bytes);
        for item in self {
            item.write_bytes(bytes);
        }
    }
}

impl<K: ToBytes, V: ToBytes> ToBytes for BTreeMap<K, V> {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        Varint(self.len() as u64).write_bytes(bytes);
        for (key, value) in self {
            key.write_bytes(bytes);
            value.write_bytes(bytes);
        }
    }
}

impl<T: ToBytes + ?Sized> ToBytes for &T {
    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        (**self).write_bytes(bytes);
    }
}

/// A length-prefixed raw byte blob.
pub fn write_blob(bytes: &mut Vec<u8>, blob: &[u8]) {
    Varint(blob.len() as u64).write_bytes(bytes);
    bytes.extend(blob);
}
