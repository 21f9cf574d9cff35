//! Variable-length integer and id encodings shared by the binary patch codec
//! and the document snapshot codec.

pub mod crdt_reader;
pub mod crdt_writer;

pub use crdt_reader::CrdtReader;
pub use crdt_writer::CrdtWriter;
