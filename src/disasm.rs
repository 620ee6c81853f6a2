//! The disassembler and editor (spec.md §4.6): decodes a [`Script`]'s
//! code buffer into an instruction list, resolves branch
//! cross-references and subroutine labels, and provides the edit
//! operations that keep both consistent across arbitrary mutations.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::instruction::opcode::instruction_length;
use crate::instruction::{fn_begin_opcode, Instruction, InstructionId};
use crate::script::Script;

/// Owns a [`Script`]'s decoded instruction list and keeps it, the
/// code buffer, and the subroutine-label map mutually consistent.
#[derive(Debug, Clone)]
pub struct Disassembler {
    script: Script,
    instructions: Vec<Instruction>,
    subroutines: HashMap<usize, String>,
}

impl Disassembler {
    /// Linearly decodes `script.code()` into an instruction list, then
    /// resolves every branch's target and labels every `FN_BEGIN` as a
    /// subroutine entry point.
    #[tracing::instrument(skip(script))]
    pub fn disassemble(script: Script) -> Disassembler {
        let mut instructions = Vec::new();
        let code = script.code();
        let mut p = 0usize;
        while p < code.len() {
            let raw_opcode = code[p];
            let first_arg = code.get(p + 1).copied().unwrap_or(0);
            let length = instruction_length(raw_opcode, first_arg).max(1);
            let end = (p + length).min(code.len());
            let args = code.get(p + 1..end).unwrap_or(&[]).to_vec();
            instructions.push(Instruction::decode(p, raw_opcode, args));
            p += length;
        }

        let mut by_offset: HashMap<usize, InstructionId> = HashMap::new();
        for ins in &instructions {
            by_offset.insert(ins.offset(), ins.id());
        }

        for ins in &mut instructions {
            if ins.branch_target().is_some() || !matches!(ins, Instruction::Branch { .. }) {
                continue;
            }
            let target_offset = match ins.operands().first() {
                Some(crate::instruction::Operand::BranchTarget(t)) => *t as usize,
                _ => continue,
            };
            if let Some(&id) = by_offset.get(&target_offset) {
                ins.set_branch_target(Some(id));
            } else {
                tracing::trace!(target_offset, "branch target does not land on an instruction boundary");
            }
        }

        let mut disasm = Disassembler {
            script,
            instructions,
            subroutines: HashMap::new(),
        };
        disasm.relabel_subroutines();
        disasm
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn subroutines(&self) -> &HashMap<usize, String> {
        &self.subroutines
    }

    fn relabel_subroutines(&mut self) {
        self.subroutines.clear();
        let fn_begin = fn_begin_opcode();
        for ins in &self.instructions {
            if ins.opcode() == fn_begin {
                self.subroutines.insert(ins.offset(), format!("sub_0x{:04X}", ins.offset()));
            }
        }
    }

    /// Inserts `ins` at `index` (`0 <= index <= len`) and rebuilds.
    pub fn insert(&mut self, index: usize, ins: Instruction) -> Result<()> {
        if index > self.instructions.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.instructions.len(),
            });
        }
        self.instructions.insert(index, ins);
        self.rebuild();
        Ok(())
    }

    /// Removes the instruction at `index` (`0 <= index < len`) and
    /// rebuilds. Any branch still pointing at the removed instruction's
    /// id is left dangling (spec.md §9's acknowledged hazard); its
    /// operand bytes are left at their last-known value.
    pub fn remove(&mut self, index: usize) -> Result<Instruction> {
        if index >= self.instructions.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.instructions.len(),
            });
        }
        let removed = self.instructions.remove(index);
        for ins in &mut self.instructions {
            if ins.branch_target() == Some(removed.id()) {
                ins.set_branch_target(None);
            }
        }
        self.rebuild();
        Ok(removed)
    }

    /// Replaces the instruction at `index` in place and rebuilds.
    pub fn edit(&mut self, index: usize, ins: Instruction) -> Result<()> {
        if index >= self.instructions.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.instructions.len(),
            });
        }
        let removed = std::mem::replace(&mut self.instructions[index], ins);
        for other in &mut self.instructions {
            if other.branch_target() == Some(removed.id()) {
                other.set_branch_target(None);
            }
        }
        self.rebuild();
        Ok(())
    }

    /// Clones the instruction at `index`'s operand bytes into a fresh
    /// buffer via the same opcode dispatch used at disassembly time,
    /// inserting the copy immediately after, and rebuilds.
    pub fn duplicate(&mut self, index: usize) -> Result<()> {
        let ins = self
            .instructions
            .get(index)
            .ok_or(Error::OutOfRange {
                index,
                len: self.instructions.len(),
            })?;
        let dup = ins.duplicate_at(ins.offset());
        self.instructions.insert(index + 1, dup);
        self.rebuild();
        Ok(())
    }

    /// Removes the instruction at `index` and reinserts it at `dest`,
    /// then rebuilds.
    pub fn r#move(&mut self, index: usize, dest: usize) -> Result<()> {
        if index >= self.instructions.len() {
            return Err(Error::OutOfRange {
                index,
                len: self.instructions.len(),
            });
        }
        if dest > self.instructions.len() {
            return Err(Error::OutOfRange {
                index: dest,
                len: self.instructions.len(),
            });
        }
        let ins = self.instructions.remove(index);
        // dest was computed against the pre-removal length; if it fell
        // after the removed slot its target position shifts left by one.
        let dest = if dest > index { dest - 1 } else { dest };
        self.instructions.insert(dest, ins);
        self.rebuild();
        Ok(())
    }

    /// Two-pass rebuild (spec.md §4.6): first reassigns every
    /// instruction's offset from list order, then patches every
    /// live branch's operand to its target's new offset, re-encodes the
    /// code buffer, rebuilds the subroutine map, and writes the new code
    /// back into the owning [`Script`].
    #[tracing::instrument(skip(self))]
    pub fn rebuild(&mut self) {
        let mut offset = 0usize;
        for ins in &mut self.instructions {
            ins.set_offset(offset);
            offset += ins.length();
        }

        let offsets_by_id: HashMap<InstructionId, usize> =
            self.instructions.iter().map(|ins| (ins.id(), ins.offset())).collect();

        let mut code = Vec::with_capacity(offset);
        for ins in &mut self.instructions {
            if let Some(target_id) = ins.branch_target() {
                if let Some(&target_offset) = offsets_by_id.get(&target_id) {
                    ins.set_branch_target_offset(target_offset as u32);
                } else {
                    tracing::trace!(id = ?target_id, "branch target id no longer present in instruction list");
                }
            }
            code.push(ins.opcode());
            code.extend_from_slice(ins.args());
        }

        self.script.set_code(code);
        self.relabel_subroutines();
    }

    /// Renders up to `count` instructions starting at `offset`, for a
    /// caller displaying a fixed-height viewport over the instruction
    /// list. The line at list index `selected`, if it falls within the
    /// window, is suffixed with `" <-"` (the original tool's own marker
    /// for the cursor row).
    pub fn render_window(&self, selected: usize, offset: usize, count: usize) -> Vec<String> {
        self.instructions
            .iter()
            .enumerate()
            .skip(offset)
            .take(count)
            .map(|(i, ins)| {
                let line = ins.render(None, Some(&self.subroutines));
                if i == selected {
                    format!("{line} <-")
                } else {
                    line
                }
            })
            .collect()
    }

    /// Case-insensitive substring search over rendered instruction text.
    /// `start_index` is `-1` to search the whole list starting from the
    /// top, matching spec's external interface. Forward search scans
    /// `(start_index, len)` then wraps `[0, start_index]`; reverse search
    /// scans `(start_index-1, 0]` then wraps `[len-1, start_index)`.
    /// Returns `None` (the crate's analogue of `-1`) when nothing
    /// matches.
    pub fn find_next(&self, search_term: &str, start_index: isize, reverse: bool) -> Option<usize> {
        let len = self.instructions.len();
        if len == 0 {
            return None;
        }
        let len_i = len as isize;
        let start = start_index.clamp(-1, len_i - 1);

        let order: Vec<usize> = if reverse {
            let before: Vec<usize> = (0..start).rev().map(|i| i as usize).collect();
            let wrap: Vec<usize> = ((start + 1)..len_i).rev().map(|i| i as usize).collect();
            before.into_iter().chain(wrap).collect()
        } else {
            let after: Vec<usize> = ((start + 1)..len_i).map(|i| i as usize).collect();
            let wrap: Vec<usize> = (0..=start.max(0)).map(|i| i as usize).collect();
            after.into_iter().chain(wrap).collect()
        };

        order.into_iter().find(|&i| self.instructions[i].matches(search_term, &self.subroutines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::Cipher;
    use crate::instruction::opcode::Opcode;

    fn script_with_code(code: Vec<u8>) -> Script {
        let cipher = Cipher::new();
        let mut header = vec![0u8; crate::consts::SCRIPT_HEADER_SIZE];
        header[0..4].copy_from_slice(&crate::consts::SCRIPT_MAGIC_PLAIN.to_le_bytes());
        header[4..8].copy_from_slice(&(code.len() as i32).to_le_bytes());
        let mut buf = header;
        buf.extend_from_slice(&code);
        Script::load(&buf, &cipher).unwrap()
    }

    fn push_s(value: u16) -> Vec<u8> {
        let mut out = vec![Opcode::PushS as u8];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    fn jump_to(target: u32) -> Vec<u8> {
        let mut out = vec![Opcode::Jump as u8];
        out.extend_from_slice(&target.to_le_bytes());
        out
    }

    #[test]
    fn disassembles_and_resolves_a_branch_target() {
        // PUSHS(5); JUMP(-> offset of POP); POP
        let mut code = push_s(5);
        let jump_offset = code.len();
        let pop_offset_placeholder = jump_offset + 5; // filled in below
        code.extend_from_slice(&jump_to(pop_offset_placeholder as u32));
        code.push(Opcode::Pop as u8);

        let script = script_with_code(code);
        let disasm = Disassembler::disassemble(script);

        assert_eq!(disasm.instructions().len(), 3);
        let jump = &disasm.instructions()[1];
        let pop = &disasm.instructions()[2];
        assert_eq!(jump.branch_target(), Some(pop.id()));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let mut code = push_s(5);
        code.extend_from_slice(&jump_to((code.len() + 5) as u32));
        code.push(Opcode::Pop as u8);
        let script = script_with_code(code);
        let mut disasm = Disassembler::disassemble(script);

        disasm.rebuild();
        let before = disasm.script().code().to_vec();
        disasm.rebuild();
        let after = disasm.script().code().to_vec();
        assert_eq!(before, after);
    }

    #[test]
    fn insert_before_target_shifts_branch_operand_to_match() {
        // PUSHS(5); JUMP(-> POP); POP
        let mut code = push_s(5);
        let jump_offset = code.len();
        code.extend_from_slice(&jump_to((jump_offset + 5) as u32));
        code.push(Opcode::Pop as u8);
        let script = script_with_code(code);
        let mut disasm = Disassembler::disassemble(script);

        let pop_index = disasm.instructions().len() - 1;
        let pop_id = disasm.instructions()[pop_index].id();

        let inserted = Instruction::decode(0, Opcode::PushS as u8, 7u16.to_le_bytes().to_vec());
        disasm.insert(pop_index, inserted).unwrap();

        let new_pop_index = disasm.instructions().iter().position(|i| i.id() == pop_id).unwrap();
        let new_pop_offset = disasm.instructions()[new_pop_index].offset();
        let jump = &disasm.instructions()[1];
        let args = jump.args();
        assert_eq!(u32::from_le_bytes(args[0..4].try_into().unwrap()), new_pop_offset as u32);
    }

    #[test]
    fn remove_of_branch_target_detaches_the_branch() {
        let mut code = push_s(5);
        let jump_offset = code.len();
        code.extend_from_slice(&jump_to((jump_offset + 5) as u32));
        code.push(Opcode::Pop as u8);
        let script = script_with_code(code);
        let mut disasm = Disassembler::disassemble(script);

        let pop_index = disasm.instructions().len() - 1;
        disasm.remove(pop_index).unwrap();

        let jump = &disasm.instructions()[1];
        assert_eq!(jump.branch_target(), None);
    }

    #[test]
    fn duplicate_inserts_a_distinct_copy_immediately_after() {
        let code = vec![Opcode::Push as u8, 0xEF, 0xBE, 0xAD, 0xDE];
        let script = script_with_code(code);
        let mut disasm = Disassembler::disassemble(script);

        disasm.duplicate(0).unwrap();
        assert_eq!(disasm.instructions().len(), 2);
        assert_eq!(disasm.instructions()[0].args(), disasm.instructions()[1].args());
    }

    #[test]
    fn find_next_wraps_forward_search() {
        let mut args = vec![0u8, 0u8];
        args.extend_from_slice(&17u32.to_le_bytes());
        let mut code = vec![Opcode::CallNative as u8];
        code.extend_from_slice(&args);
        let script = script_with_code(code);
        let disasm = Disassembler::disassemble(script);

        let found = disasm.find_next("ambdealer", -1, false).unwrap();
        assert_eq!(found, 0);
        let wrapped = disasm.find_next("ambdealer", found as isize, false).unwrap();
        assert_eq!(wrapped, 0);
    }

    #[test]
    fn render_window_flags_the_selected_line() {
        let code = vec![Opcode::Pop as u8, Opcode::Dup as u8, Opcode::Pop as u8];
        let script = script_with_code(code);
        let disasm = Disassembler::disassemble(script);

        let lines = disasm.render_window(1, 0, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(" <-"));
        assert!(!lines[0].ends_with(" <-"));
    }

    #[test]
    fn insert_out_of_range_errors() {
        let script = script_with_code(vec![Opcode::Pop as u8]);
        let mut disasm = Disassembler::disassemble(script);
        let ins = Instruction::decode(0, Opcode::Pop as u8, Vec::new());
        assert_eq!(disasm.insert(5, ins), Err(Error::OutOfRange { index: 5, len: 1 }));
    }
}
