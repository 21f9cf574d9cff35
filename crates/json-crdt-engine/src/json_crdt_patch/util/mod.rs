pub mod binary;
pub mod cbor;
