//! Structural validation for built programs.
//!
//! The builder asserts shape at construction time; this pass re-checks the
//! finished program as a whole, catching hand-inserted instructions and
//! cross-field inconsistencies the constructors cannot see (format tags vs
//! side fields, pseudo-op width accounting, lane-mask classes, literal
//! budgets, register-bank pins, generation gates). Intended to run under
//! `debug_assertions` or behind a compiler flag between passes.

use std::fmt;

use crate::ir::{BlockId, Format, GfxLevel, InstrExt, Instruction, Program, RegClass};
use crate::opcodes::Opcode;

// ─── Error type ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Issue {
    pub block: BlockId,
    pub index: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct ValidateError {
    pub issues: Vec<Issue>,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation found {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(
                f,
                "\n  block {}, instruction {}: {}",
                issue.block.0, issue.index, issue.message
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidateError {}

// ─── Pass ───────────────────────────────────────────────────────────────────

/// Check every instruction of `program`, collecting all problems instead of
/// stopping at the first.
pub fn validate(program: &Program) -> Result<(), ValidateError> {
    let mut issues = Vec::new();
    for block in &program.blocks {
        for (index, instr) in block.instructions.iter().enumerate() {
            check_instruction(program, BlockId(block.index), index, instr, &mut issues);
        }
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidateError { issues })
    }
}

fn check_instruction(
    program: &Program,
    block: BlockId,
    index: usize,
    instr: &Instruction,
    issues: &mut Vec<Issue>,
) {
    let mut fail = |message: String| issues.push(Issue { block, index, message });

    let info = instr.opcode.info();
    let shape = (instr.defs.len() as u8, instr.ops.len() as u8);
    if !info.arities.contains(&shape) {
        fail(format!(
            "{} takes none of its legal shapes: has {} definitions and {} operands",
            info.name,
            instr.defs.len(),
            instr.ops.len()
        ));
    }

    if !instr.format.contains(info.format) {
        fail(format!("{} lost its canonical format tag", info.name));
    }

    let ext_matches = match instr.ext {
        InstrExt::None => {
            !instr.format.intersects(
                Format::SOPK
                    | Format::SOPP
                    | Format::SMEM
                    | Format::DS
                    | Format::SDWA
                    | Format::DPP,
            )
        }
        InstrExt::Sopk(_) => instr.has_format(Format::SOPK),
        InstrExt::Sopp(_) => instr.has_format(Format::SOPP),
        InstrExt::Smem(_) => instr.has_format(Format::SMEM),
        InstrExt::Ds(_) => instr.has_format(Format::DS),
        InstrExt::Sdwa(_) => instr.has_format(Format::SDWA),
        InstrExt::Dpp(_) => instr.has_format(Format::DPP),
    };
    if !ext_matches {
        fail(format!("{} carries side fields for a different format", info.name));
    }

    if instr.has_format(Format::SDWA) && program.gfx_level < GfxLevel::Gfx8 {
        fail(format!(
            "{} uses sub-dword selects, unavailable before GFX8",
            info.name
        ));
    }

    let literals = instr.ops.iter().filter(|op| op.is_literal()).count();
    if literals > 1 {
        fail(format!("{} encodes {literals} literals; one slot exists", info.name));
    }
    if literals > 0 && instr.format.intersects(Format::SDWA | Format::DPP) {
        fail(format!("{} takes no literal operands in this encoding", info.name));
    }

    match instr.opcode {
        Opcode::PCreateVector => {
            if let Some(def) = instr.defs.first() {
                let parts: u32 = instr.ops.iter().map(|op| op.bytes()).sum();
                if parts != def.bytes() {
                    fail(format!(
                        "p_create_vector gathers {parts} bytes into a {}-byte definition",
                        def.bytes()
                    ));
                }
            }
        }
        Opcode::PSplitVector => {
            if let Some(op) = instr.ops.first() {
                let parts: u32 = instr.defs.iter().map(|def| def.bytes()).sum();
                if parts != op.bytes() {
                    fail(format!(
                        "p_split_vector scatters a {}-byte operand into {parts} bytes",
                        op.bytes()
                    ));
                }
            }
        }
        Opcode::PParallelcopy => {
            for (def, op) in instr.defs.iter().zip(&instr.ops) {
                if def.bytes() != op.bytes() {
                    fail(format!(
                        "p_parallelcopy pairs a {}-byte definition with a {}-byte operand",
                        def.bytes(),
                        op.bytes()
                    ));
                }
            }
        }
        _ => {}
    }

    if instr.has_format(Format::VOPC) {
        if let Some(def) = instr.defs.first() {
            if !is_mask_class(program, def.rc()) {
                fail(format!("{} writes its compare result into {}", info.name, def.rc()));
            }
        }
    }

    if let Some(carry) = carry_definition(instr) {
        if !is_mask_class(program, carry) {
            fail(format!("{} produces its carry into {carry}", info.name));
        }
    }

    for def in &instr.defs {
        if let Some(reg) = def.fixed() {
            if def.rc().bank().is_vgpr() != reg.is_vgpr() {
                fail(format!("{} pins a {} definition to {reg}", info.name, def.rc()));
            }
        }
    }
    for op in &instr.ops {
        if let (Some(rc), Some(reg)) = (op.reg_class(), op.fixed()) {
            if rc.bank().is_vgpr() != reg.is_vgpr() {
                fail(format!("{} pins a {rc} operand to {reg}", info.name));
            }
        }
    }
}

/// Carry/borrow definitions may use the wavefront's lane-mask class or the
/// legacy 64-bit pair class.
fn is_mask_class(program: &Program, rc: RegClass) -> bool {
    rc == program.lane_mask || rc == RegClass::S2
}

fn carry_definition(instr: &Instruction) -> Option<RegClass> {
    match instr.opcode {
        Opcode::VAddCoU32
        | Opcode::VAddCoU32E64
        | Opcode::VAddcCoU32
        | Opcode::VSubCoU32
        | Opcode::VSubCoU32E64
        | Opcode::VSubrevCoU32
        | Opcode::VSubrevCoU32E64
        | Opcode::VSubbCoU32
        | Opcode::VSubbrevCoU32 => instr.defs.get(1).map(|d| d.rc()),
        _ => None,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
