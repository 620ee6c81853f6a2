//! Codec and bytecode editor core for a proprietary game archive (IMG)
//! format and its embedded stack-machine bytecode (SCO scripts).
//!
//! This crate has no file I/O, no CLI, and no terminal UI of its own:
//! it takes byte buffers in and hands byte buffers back out. A caller
//! supplies the host executable's bytes to [`cipher::Cipher::find_key`]
//! once, an archive's bytes to [`archive::Archive::load`], and for any
//! entry it wants to edit, that entry's payload to [`script::Script::load`]
//! and then [`disasm::Disassembler::disassemble`].

pub mod archive;
pub mod cipher;
pub mod consts;
pub mod disasm;
pub mod error;
pub mod file_kind;
pub mod instruction;
pub mod natives;
pub mod script;

pub mod prelude {
    pub use crate::archive::{Archive, ArchiveEntry, ArchiveHeader, TocEntry};
    pub use crate::cipher::Cipher;
    pub use crate::disasm::Disassembler;
    pub use crate::error::{Error, Result};
    pub use crate::file_kind::{classify, FileKind};
    pub use crate::instruction::opcode::Opcode;
    pub use crate::instruction::{Instruction, InstructionId, Operand, PushLiteral};
    pub use crate::script::{Script, ScriptHeader};
}
