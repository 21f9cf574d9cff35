use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::codec::clock::ClockTable;
use crate::json_crdt_patch::codec::{check_contiguous, EncodeError};
use crate::json_crdt_patch::enums::JsonCrdtPatchOpcode;
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::util::binary::CrdtWriter;
use crate::json_crdt_patch::util::cbor;

/// Binary patch encoder. Reusable across patches.
#[derive(Debug, Default)]
pub struct Encoder {
    writer: CrdtWriter,
    sessions: ClockTable,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, patch: &Patch) -> Result<Vec<u8>, EncodeError> {
        let id = check_contiguous(patch)?;
        self.sessions = ClockTable::new();
        self.sessions.observe(id);
        for stamp in patch.ops.iter().flat_map(Op::timestamps) {
            self.sessions.observe(stamp);
        }
        self.writer.flush();
        self.writer.vu57(self.sessions.len() as u64);
        for entry in self.sessions.iter() {
            self.writer.vu57(entry.sid);
        }
        self.writer.vu57(id.time);
        self.writer.vu57(patch.ops.len() as u64);
        for op in &patch.ops {
            self.encode_operation(op)?;
        }
        Ok(self.writer.flush())
    }

    fn id(&mut self, id: Ts) {
        let index = self.sessions.index_of(id.sid).unwrap_or_default();
        self.writer.id(index as u64, id.time);
    }

    fn tss(&mut self, span: &Tss) {
        self.id(span.ts());
        self.writer.vu57(span.span);
    }

    fn opcode(&mut self, opcode: JsonCrdtPatchOpcode, length: usize) {
        if (1..=0b111).contains(&length) {
            self.writer.u8(opcode.overlay() | length as u8);
        } else {
            self.writer.u8(opcode.overlay());
            self.writer.vu57(length as u64);
        }
    }

    fn encode_operation(&mut self, op: &Op) -> Result<(), EncodeError> {
        let opcode = op.opcode();
        match op {
            Op::NewCon { val, .. } => {
                self.writer.u8(opcode.overlay());
                cbor::write(&mut self.writer, val)?;
            }
            Op::NewVal { val, .. } => {
                self.writer.u8(opcode.overlay());
                self.id(*val);
            }
            Op::NewObj { .. } | Op::NewStr { .. } | Op::NewBin { .. } | Op::NewArr { .. } => {
                self.writer.u8(opcode.overlay());
            }
            Op::InsVal { obj, val, .. } => {
                self.writer.u8(opcode.overlay());
                self.id(*obj);
                self.id(*val);
            }
            Op::InsObj { obj, data, .. } => {
                self.opcode(opcode, data.len());
                self.id(*obj);
                for (key, val) in data {
                    self.writer.str(key);
                    self.id(*val);
                }
            }
            Op::InsStr {
                obj, after, data, ..
            } => {
                self.opcode(opcode, data.len());
                self.id(*obj);
                self.id(*after);
                self.writer.utf8(data);
            }
            Op::InsBin {
                obj, after, data, ..
            } => {
                self.opcode(opcode, data.len());
                self.id(*obj);
                self.id(*after);
                self.writer.buf(data);
            }
            Op::InsArr {
                obj, after, data, ..
            } => {
                self.opcode(opcode, data.len());
                self.id(*obj);
                self.id(*after);
                for item in data {
                    self.id(*item);
                }
            }
            Op::Del { obj, what, .. } => {
                self.opcode(opcode, what.len());
                self.id(*obj);
                for span in what {
                    self.tss(span);
                }
            }
            Op::Nop { len, .. } => {
                self.opcode(opcode, *len as usize);
            }
        }
        Ok(())
    }
}
