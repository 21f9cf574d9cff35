//! Enumerations shared by the patch protocol and the document codecs.

/// Reserved session IDs.
#[allow(non_snake_case)]
pub mod SESSION {
    /// Reserved for system timestamps (`ORIGIN`, `UNDEFINED`).
    pub const SYSTEM: u64 = 0;
    /// The only session used by server-clock documents.
    pub const SERVER: u64 = 1;
    /// Patches applied identically on every replica (schemas, seeds).
    pub const GLOBAL: u64 = 2;
    /// Local-only patches that are never shared.
    pub const LOCAL: u64 = 3;
    /// Largest session ID (53-bit safe integer).
    pub const MAX: u64 = 9_007_199_254_740_991;
}

/// Reserved system-session time values.
#[allow(non_snake_case)]
pub mod SYSTEM_SESSION_TIME {
    pub const ORIGIN: u64 = 0;
    pub const UNDEFINED: u64 = 1;
}

/// 3-bit node data-type discriminant, used as the major type in snapshots.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCrdtDataType {
    Con = 0b000,
    Val = 0b001,
    Obj = 0b010,
    Str = 0b100,
    Bin = 0b101,
    Arr = 0b110,
}

impl JsonCrdtDataType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0b000 => Some(Self::Con),
            0b001 => Some(Self::Val),
            0b010 => Some(Self::Obj),
            0b100 => Some(Self::Str),
            0b101 => Some(Self::Bin),
            0b110 => Some(Self::Arr),
            _ => None,
        }
    }
}

/// 5-bit operation opcode. Creation opcodes equal the data type; insert
/// opcodes set bit 3.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonCrdtPatchOpcode {
    NewCon = JsonCrdtDataType::Con as u8,          // 0
    NewVal = JsonCrdtDataType::Val as u8,          // 1
    NewObj = JsonCrdtDataType::Obj as u8,          // 2
    NewStr = JsonCrdtDataType::Str as u8,          // 4
    NewBin = JsonCrdtDataType::Bin as u8,          // 5
    NewArr = JsonCrdtDataType::Arr as u8,          // 6
    InsVal = 0b01000 | JsonCrdtDataType::Val as u8, // 9
    InsObj = 0b01000 | JsonCrdtDataType::Obj as u8, // 10
    InsStr = 0b01000 | JsonCrdtDataType::Str as u8, // 12
    InsBin = 0b01000 | JsonCrdtDataType::Bin as u8, // 13
    InsArr = 0b01000 | JsonCrdtDataType::Arr as u8, // 14
    Del = 0b10000,                                  // 16
    Nop = 0b10001,                                  // 17
}

impl JsonCrdtPatchOpcode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NewCon),
            1 => Some(Self::NewVal),
            2 => Some(Self::NewObj),
            4 => Some(Self::NewStr),
            5 => Some(Self::NewBin),
            6 => Some(Self::NewArr),
            9 => Some(Self::InsVal),
            10 => Some(Self::InsObj),
            12 => Some(Self::InsStr),
            13 => Some(Self::InsBin),
            14 => Some(Self::InsArr),
            16 => Some(Self::Del),
            17 => Some(Self::Nop),
            _ => None,
        }
    }

    /// The opcode octet prefix: opcode in the top 5 bits, leaving 3 low bits
    /// for an inline length.
    pub const fn overlay(self) -> u8 {
        (self as u8) << 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_numbers_are_stable() {
        assert_eq!(JsonCrdtPatchOpcode::InsStr as u8, 12);
        assert_eq!(JsonCrdtPatchOpcode::Nop.overlay(), 17 << 3);
        assert_eq!(JsonCrdtPatchOpcode::from_u8(3), None);
        assert_eq!(JsonCrdtPatchOpcode::from_u8(16), Some(JsonCrdtPatchOpcode::Del));
    }

    #[test]
    fn data_type_from_u8() {
        assert_eq!(JsonCrdtDataType::from_u8(6), Some(JsonCrdtDataType::Arr));
        assert_eq!(JsonCrdtDataType::from_u8(3), None);
        assert_eq!(JsonCrdtDataType::from_u8(7), None);
    }
}
