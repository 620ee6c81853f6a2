//! The instruction model (spec.md §4.4): a tagged union over the four
//! ways an opcode's trailing bytes are interpreted, each with its own
//! decode/length/render contract. The disassembler in
//! [`crate::disasm`] is the only code that constructs these from a raw
//! code buffer; this module never reads past the `args` slice it is
//! handed.

pub mod opcode;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use self::opcode::{instruction_length, opcode_mnemonic, Opcode};
use crate::natives::native_name;

/// A stable identity for an instruction that survives offset changes
/// across edits and rebuilds. Branch instructions reference their
/// target by `InstructionId` rather than by a raw list index, which
/// would be invalidated by an insert or remove anywhere before it in
/// the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstructionId(u64);

fn next_id() -> InstructionId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    InstructionId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// The literal pushed by a [`Instruction::Push`] instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PushLiteral {
    U16(u16),
    U32(u32),
    F32(f32),
    Str(String),
    /// Immediate form (opcodes `0x50..=0xFF`): `opcode.wrapping_sub(96)`,
    /// stored and compared as an unsigned byte per spec.md §8's
    /// immediate-push law.
    Immediate(u8),
}

/// A generic, typed view of an instruction's operands, independent of
/// which variant produced them. Used by callers that want to inspect
/// operands without matching on [`Instruction`] itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    Literal(PushLiteral),
    BranchTarget(u32),
    NativeName(String),
    U8(u8),
}

/// One decoded instruction. `offset` and `args` are kept current by
/// [`crate::disasm::Disassembler::rebuild`] after every edit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    Generic {
        id: InstructionId,
        offset: usize,
        opcode: u8,
        args: Vec<u8>,
    },
    Push {
        id: InstructionId,
        offset: usize,
        opcode: u8,
        args: Vec<u8>,
        literal: PushLiteral,
    },
    Branch {
        id: InstructionId,
        offset: usize,
        opcode: u8,
        args: Vec<u8>,
        target_offset: u32,
        /// Resolved post-decode by the disassembler; `None` if the
        /// branch's target offset never lined up with an instruction
        /// boundary, or if that target was since removed (spec.md §9's
        /// acknowledged dangling-branch hazard).
        target: Option<InstructionId>,
    },
    Native {
        id: InstructionId,
        offset: usize,
        opcode: u8,
        args: Vec<u8>,
        native_name: String,
        in_args: u8,
        out_args: u8,
    },
}

impl Instruction {
    /// Decodes one instruction from an already correctly-sized `args`
    /// slice (the caller, normally [`crate::disasm::Disassembler`], is
    /// responsible for slicing `code[offset+1 .. offset+length]` using
    /// [`opcode::instruction_length`]).
    pub fn decode(offset: usize, raw_opcode: u8, args: Vec<u8>) -> Instruction {
        let id = next_id();
        match Opcode::from_repr(raw_opcode) {
            Some(Opcode::PushS) => Instruction::Push {
                id,
                offset,
                opcode: raw_opcode,
                literal: PushLiteral::U16(u16::from_le_bytes(read::<2>(&args))),
                args,
            },
            Some(Opcode::Push) => Instruction::Push {
                id,
                offset,
                opcode: raw_opcode,
                literal: PushLiteral::U32(u32::from_le_bytes(read::<4>(&args))),
                args,
            },
            Some(Opcode::PushF) => Instruction::Push {
                id,
                offset,
                opcode: raw_opcode,
                literal: PushLiteral::F32(f32::from_le_bytes(read::<4>(&args))),
                args,
            },
            Some(Opcode::PushString) => {
                // args[0] is the length byte; the string payload follows it.
                let text = String::from_utf8_lossy(args.get(1..).unwrap_or(&[])).into_owned();
                Instruction::Push {
                    id,
                    offset,
                    opcode: raw_opcode,
                    literal: PushLiteral::Str(text),
                    args,
                }
            }
            Some(Opcode::Jump) | Some(Opcode::JumpFalse) | Some(Opcode::JumpTrue) | Some(Opcode::Call) => {
                Instruction::Branch {
                    id,
                    offset,
                    opcode: raw_opcode,
                    target_offset: u32::from_le_bytes(read::<4>(&args)),
                    target: None,
                    args,
                }
            }
            Some(Opcode::CallNative) => {
                let in_args = args.first().copied().unwrap_or(0);
                let out_args = args.get(1).copied().unwrap_or(0);
                let native_id = u32::from_le_bytes(read::<4>(args.get(2..6).unwrap_or(&[0; 4])));
                Instruction::Native {
                    id,
                    offset,
                    opcode: raw_opcode,
                    native_name: native_name(native_id),
                    in_args,
                    out_args,
                    args,
                }
            }
            _ if raw_opcode >= opcode::IMMEDIATE_PUSH_START => Instruction::Push {
                id,
                offset,
                opcode: raw_opcode,
                literal: PushLiteral::Immediate(raw_opcode.wrapping_sub(96)),
                args,
            },
            _ => Instruction::Generic {
                id,
                offset,
                opcode: raw_opcode,
                args,
            },
        }
    }

    pub fn id(&self) -> InstructionId {
        match self {
            Instruction::Generic { id, .. }
            | Instruction::Push { id, .. }
            | Instruction::Branch { id, .. }
            | Instruction::Native { id, .. } => *id,
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            Instruction::Generic { offset, .. }
            | Instruction::Push { offset, .. }
            | Instruction::Branch { offset, .. }
            | Instruction::Native { offset, .. } => *offset,
        }
    }

    pub(crate) fn set_offset(&mut self, new_offset: usize) {
        match self {
            Instruction::Generic { offset, .. }
            | Instruction::Push { offset, .. }
            | Instruction::Branch { offset, .. }
            | Instruction::Native { offset, .. } => *offset = new_offset,
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Generic { opcode, .. }
            | Instruction::Push { opcode, .. }
            | Instruction::Branch { opcode, .. }
            | Instruction::Native { opcode, .. } => *opcode,
        }
    }

    pub fn args(&self) -> &[u8] {
        match self {
            Instruction::Generic { args, .. }
            | Instruction::Push { args, .. }
            | Instruction::Branch { args, .. }
            | Instruction::Native { args, .. } => args,
        }
    }

    /// `1 + args().len()`, and always equal to
    /// `opcode::instruction_length(opcode(), args().first())` per
    /// spec.md §8's length-identity invariant.
    pub fn length(&self) -> usize {
        1 + self.args().len()
    }

    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Instruction::Generic { .. } => Vec::new(),
            Instruction::Push { literal, .. } => vec![Operand::Literal(literal.clone())],
            Instruction::Branch { target_offset, .. } => vec![Operand::BranchTarget(*target_offset)],
            Instruction::Native {
                native_name,
                in_args,
                out_args,
                ..
            } => vec![
                Operand::NativeName(native_name.clone()),
                Operand::U8(*in_args),
                Operand::U8(*out_args),
            ],
        }
    }

    pub fn branch_target(&self) -> Option<InstructionId> {
        match self {
            Instruction::Branch { target, .. } => *target,
            _ => None,
        }
    }

    pub(crate) fn set_branch_target(&mut self, target: Option<InstructionId>) {
        if let Instruction::Branch { target: t, .. } = self {
            *t = target;
        }
    }

    /// Rewrites this branch's operand to point at `new_offset`, patching
    /// `args[0..4]` in place as a little-endian `u32`. A no-op on
    /// non-branch instructions.
    pub(crate) fn set_branch_target_offset(&mut self, new_offset: u32) {
        if let Instruction::Branch {
            target_offset, args, ..
        } = self
        {
            *target_offset = new_offset;
            args[0..4].copy_from_slice(&new_offset.to_le_bytes());
        }
    }

    /// Clones this instruction's operand bytes into a fresh, independent
    /// instance via the same opcode dispatch used at disassembly time
    /// (spec.md's `duplicate` scenario: mutating one copy's `args` must
    /// not affect the other's).
    pub fn duplicate_at(&self, offset: usize) -> Instruction {
        let mut copy = Instruction::decode(offset, self.opcode(), self.args().to_vec());
        // A duplicated branch keeps pointing at the same target as the
        // original; re-resolving happens on the next rebuild regardless.
        if let Instruction::Branch { target, .. } = self {
            copy.set_branch_target(*target);
        }
        copy
    }

    /// Case-insensitive substring match against this instruction's
    /// rendered text, used by [`crate::disasm::Disassembler::find_next`].
    pub fn matches(&self, needle: &str, subroutines: &HashMap<usize, String>) -> bool {
        self.render(None, Some(subroutines))
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }

    /// Renders this instruction as one line of text: offset, mnemonic,
    /// and operands. `highlight` wraps the whole line in the given ANSI
    /// escape/reset pair when present (a UI concern threaded through,
    /// not interpreted here); `subroutines` substitutes a branch
    /// target's offset with its label when one is known.
    pub fn render(&self, highlight: Option<&str>, subroutines: Option<&HashMap<usize, String>>) -> String {
        let body = self.render_body(subroutines);
        let line = format!("0x{:04X}: {}", self.offset(), body);
        match highlight {
            Some(color) => format!("{color}{line}\x1b[0m"),
            None => line,
        }
    }

    fn render_body(&self, subroutines: Option<&HashMap<usize, String>>) -> String {
        match self {
            Instruction::Generic { opcode, .. } => opcode_mnemonic(*opcode),
            Instruction::Push { opcode, literal, .. } => match literal {
                // opcode_mnemonic already includes the literal for an immediate push.
                PushLiteral::Immediate(_) => opcode_mnemonic(*opcode),
                _ => format!("{} {}", opcode_mnemonic(*opcode), render_literal(literal)),
            },
            Instruction::Branch {
                opcode, target_offset, ..
            } => {
                let target_str = subroutines
                    .and_then(|subs| subs.get(&(*target_offset as usize)))
                    .cloned()
                    .unwrap_or_else(|| format!("0x{target_offset:04X}"));
                format!("{} {}", opcode_mnemonic(*opcode), target_str)
            }
            Instruction::Native {
                opcode,
                native_name,
                in_args,
                out_args,
                ..
            } => {
                format!("{} {} ({} in, {} out)", opcode_mnemonic(*opcode), native_name, in_args, out_args)
            }
        }
    }
}

fn render_literal(literal: &PushLiteral) -> String {
    match literal {
        PushLiteral::U16(v) => v.to_string(),
        PushLiteral::U32(v) => v.to_string(),
        PushLiteral::F32(v) => v.to_string(),
        PushLiteral::Str(s) => format!("{s:?}"),
        PushLiteral::Immediate(v) => v.to_string(),
    }
}

fn read<const N: usize>(args: &[u8]) -> [u8; N] {
    args.get(0..N)
        .and_then(|s| s.try_into().ok())
        .expect("disassembler must slice args to the length the opcode table demands")
}

/// Returns the raw opcode used by `FN_BEGIN`, the marker the
/// disassembler labels as a subroutine entry point.
pub fn fn_begin_opcode() -> u8 {
    Opcode::FnBegin as u8
}

pub(crate) fn instruction_length_for(raw_opcode: u8, first_arg: u8) -> usize {
    instruction_length(raw_opcode, first_arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_decodes_u32_little_endian() {
        let ins = Instruction::decode(0, Opcode::Push as u8, 0xDEADBEEFu32.to_le_bytes().to_vec());
        assert_eq!(ins.operands(), vec![Operand::Literal(PushLiteral::U32(0xDEADBEEF))]);
    }

    #[test]
    fn push_string_strips_leading_length_byte() {
        let mut args = vec![5u8];
        args.extend_from_slice(b"hello");
        let ins = Instruction::decode(0, Opcode::PushString as u8, args);
        assert_eq!(
            ins.operands(),
            vec![Operand::Literal(PushLiteral::Str("hello".to_string()))]
        );
    }

    #[test]
    fn immediate_push_law_holds_across_full_range() {
        for raw in opcode::IMMEDIATE_PUSH_START..=0xFFu8 {
            let ins = Instruction::decode(0, raw, Vec::new());
            assert_eq!(
                ins.operands(),
                vec![Operand::Literal(PushLiteral::Immediate(raw.wrapping_sub(96)))]
            );
        }
    }

    #[test]
    fn immediate_push_renders_its_literal_once() {
        let ins = Instruction::decode(0, 0x50, Vec::new());
        assert_eq!(ins.render(None, None), "0x0000: PUSHD 240");
    }

    #[test]
    fn native_call_decodes_in_out_and_id() {
        let mut args = vec![2u8, 1u8];
        args.extend_from_slice(&17u32.to_le_bytes());
        let ins = Instruction::decode(0, Opcode::CallNative as u8, args);
        assert_eq!(
            ins.operands(),
            vec![
                Operand::NativeName("AMBDEALER_CREATE".to_string()),
                Operand::U8(2),
                Operand::U8(1),
            ]
        );
    }

    #[test]
    fn duplicate_copies_args_into_a_distinct_buffer() {
        let original = Instruction::decode(0, Opcode::Push as u8, 0xDEADBEEFu32.to_le_bytes().to_vec());
        let mut dup = original.duplicate_at(5);
        assert_eq!(dup.args(), original.args());
        if let Instruction::Push { args, .. } = &mut dup {
            args[0] = 0xFF;
        }
        assert_ne!(dup.args(), original.args());
    }

    #[test]
    fn render_is_case_insensitively_searchable() {
        let mut args = vec![0u8, 0u8];
        args.extend_from_slice(&17u32.to_le_bytes());
        let ins = Instruction::decode(0, Opcode::CallNative as u8, args);
        let subs = HashMap::new();
        assert!(ins.matches("ambdealer", &subs));
        assert!(ins.matches("AMBDEALER_CREATE", &subs));
        assert!(!ins.matches("nope", &subs));
    }

    #[test]
    fn set_branch_target_offset_patches_args_bytes() {
        let mut ins = Instruction::decode(0, Opcode::Jump as u8, 0u32.to_le_bytes().to_vec());
        ins.set_branch_target_offset(0x1234);
        assert_eq!(ins.branch_target(), None);
        assert_eq!(u32::from_le_bytes(ins.args()[0..4].try_into().unwrap()), 0x1234);
    }
}
