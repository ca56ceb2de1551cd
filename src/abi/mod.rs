/*!
# Contract ABI

Encodes contract calls the way Ethereum tooling does, so that selectors and
argument layouts match a contract's published ABI, and decodes contract
output back into values.

Call data is a 4 byte selector, the keccak-256 of `method(type1,type2,...)`,
followed by the argument heads. Static arguments live in the head, one word
each; a fixed-size array of a static type is written there inline, one word
per element. Dynamic arguments (strings, byte strings, `item[]` and `item[N]`
of a dynamic item) leave an offset in the head and append their content after
the head, in argument order. Only `item[]` carries an element count.

Addresses are object ids: `1.2.N` accounts and `1.11.N` contracts. Both are
written as the instance number; contracts also set a tag byte inside the word.
*/
pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::{decode, decode_hex, DecodedValue};
pub use encoder::{
    encode_arguments, encode_call, encode_call_hex, encode_constructor, selector, EncodingContext,
};
pub use types::{method_signature, AbiType, InputValue};
