use crate::json_crdt_patch::clock::{ts, Ts, Tss};
use crate::json_crdt_patch::codec::{advance, DecodeError};
use crate::json_crdt_patch::enums::{JsonCrdtPatchOpcode, SESSION};
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::util::binary::CrdtReader;
use crate::json_crdt_patch::util::cbor;

/// Binary patch decoder over one input buffer.
pub struct Decoder<'a> {
    reader: CrdtReader<'a>,
    sessions: Vec<u64>,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: CrdtReader::new(data),
            sessions: Vec::new(),
        }
    }

    pub fn decode(mut self) -> Result<Patch, DecodeError> {
        let count = self.reader.length()?;
        if count == 0 {
            return Err(DecodeError::InvalidStructure("patch has no session"));
        }
        for _ in 0..count {
            let sid = self.reader.vu57()?;
            if sid > SESSION::MAX {
                return Err(DecodeError::Overflow);
            }
            self.sessions.push(sid);
        }
        let sid = self.sessions[0];
        let mut time = self.time()?;
        let op_count = self.reader.length()?;
        if op_count == 0 {
            return Err(DecodeError::InvalidStructure("patch has no operations"));
        }
        let mut ops = Vec::with_capacity(op_count);
        for _ in 0..op_count {
            let op = self.decode_operation(ts(sid, time))?;
            time = advance(time, op.span())?;
            ops.push(op);
        }
        if !self.reader.is_eof() {
            return Err(DecodeError::TrailingBytes(self.reader.remaining()));
        }
        Ok(Patch::from_ops(ops))
    }

    fn time(&mut self) -> Result<u64, DecodeError> {
        let time = self.reader.vu57()?;
        if time > SESSION::MAX {
            return Err(DecodeError::Overflow);
        }
        Ok(time)
    }

    fn id(&mut self) -> Result<Ts, DecodeError> {
        let (index, time) = self.reader.id()?;
        let sid = usize::try_from(index)
            .ok()
            .and_then(|i| self.sessions.get(i).copied())
            .ok_or(DecodeError::UnknownSession(index))?;
        if time > SESSION::MAX {
            return Err(DecodeError::Overflow);
        }
        Ok(ts(sid, time))
    }

    /// The inline length of the opcode octet, or the `vu57` that follows it.
    fn length(&mut self, octet: u8) -> Result<usize, DecodeError> {
        let inline = (octet & 0b111) as usize;
        if inline != 0 {
            return Ok(inline);
        }
        let n = self.reader.vu57()?;
        if n == 0 {
            return Err(DecodeError::InvalidStructure("zero-length operation"));
        }
        usize::try_from(n).map_err(|_| DecodeError::Overflow)
    }

    fn decode_operation(&mut self, id: Ts) -> Result<Op, DecodeError> {
        let octet = self.reader.u8()?;
        let code = octet >> 3;
        let opcode = JsonCrdtPatchOpcode::from_u8(code).ok_or(DecodeError::UnknownOpcode(code))?;
        let op = match opcode {
            JsonCrdtPatchOpcode::NewCon => Op::NewCon {
                id,
                val: cbor::read(&mut self.reader)?,
            },
            JsonCrdtPatchOpcode::NewVal => Op::NewVal { id, val: self.id()? },
            JsonCrdtPatchOpcode::NewObj => Op::NewObj { id },
            JsonCrdtPatchOpcode::NewStr => Op::NewStr { id },
            JsonCrdtPatchOpcode::NewBin => Op::NewBin { id },
            JsonCrdtPatchOpcode::NewArr => Op::NewArr { id },
            JsonCrdtPatchOpcode::InsVal => {
                let obj = self.id()?;
                let val = self.id()?;
                Op::InsVal { id, obj, val }
            }
            JsonCrdtPatchOpcode::InsObj => {
                let len = self.length(octet)?;
                let obj = self.id()?;
                let mut data = Vec::with_capacity(len.min(self.reader.remaining()));
                for _ in 0..len {
                    let key = self.reader.str()?.to_owned();
                    data.push((key, self.id()?));
                }
                Op::InsObj { id, obj, data }
            }
            JsonCrdtPatchOpcode::InsStr => {
                let len = self.length(octet)?;
                let obj = self.id()?;
                let after = self.id()?;
                let data = self.reader.utf8(len)?.to_owned();
                Op::InsStr {
                    id,
                    obj,
                    after,
                    data,
                }
            }
            JsonCrdtPatchOpcode::InsBin => {
                let len = self.length(octet)?;
                let obj = self.id()?;
                let after = self.id()?;
                let data = self.reader.buf(len)?.to_vec();
                Op::InsBin {
                    id,
                    obj,
                    after,
                    data,
                }
            }
            JsonCrdtPatchOpcode::InsArr => {
                let len = self.length(octet)?;
                let obj = self.id()?;
                let after = self.id()?;
                let mut data = Vec::with_capacity(len.min(self.reader.remaining()));
                for _ in 0..len {
                    data.push(self.id()?);
                }
                Op::InsArr {
                    id,
                    obj,
                    after,
                    data,
                }
            }
            JsonCrdtPatchOpcode::Del => {
                let len = self.length(octet)?;
                let obj = self.id()?;
                let mut what = Vec::with_capacity(len.min(self.reader.remaining()));
                for _ in 0..len {
                    let start = self.id()?;
                    let span = self.reader.vu57()?;
                    what.push(Tss::new(start.sid, start.time, span));
                }
                Op::Del { id, obj, what }
            }
            JsonCrdtPatchOpcode::Nop => Op::Nop {
                id,
                len: self.length(octet)? as u64,
            },
        };
        Ok(op)
    }
}
