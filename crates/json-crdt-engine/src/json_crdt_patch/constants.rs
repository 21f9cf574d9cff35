pub use crate::json_crdt_patch::enums::{SESSION, SYSTEM_SESSION_TIME};

use crate::json_crdt_patch::clock::Ts;

/// Address of the document root register.
pub const ORIGIN: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::ORIGIN);

/// The "no value" reference held by registers that were never written.
pub const UNDEFINED: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::UNDEFINED);
