//! Instruction construction: the sole sanctioned path for putting
//! instructions into a program.
//!
//! A [`Builder`] exclusively borrows its [`Program`] and owns a [`Cursor`]
//! naming where insertions land: nowhere (detached probing), the back or
//! front of a block, or a position inside one that advances past each
//! inserted instruction. Sticky `precise`/`nuw` flags are stamped onto every
//! definition created through the builder; deriving a flagged builder never
//! mutates the one it came from.
//!
//! The constructors are data-driven: one [`Builder::emit`] validating the
//! requested shape against the opcode table, plus thin wrappers for formats
//! carrying side fields and for wave-width-sensitive SALU ops.

use log::trace;
use smallvec::SmallVec;

use crate::ir::{
    BlockId, Definition, DppCtrl, DppExt, DsExt, Format, GfxLevel, InstrExt, Instruction,
    Operand, PhysReg, Program, RegClass, SdwaExt, SmemExt, SopkExt, SoppExt, Temp, WaveSize,
    EXEC, M0, SCC, VCC,
};
use crate::opcodes::{Opcode, WaveOp};

// ─── Cursor ─────────────────────────────────────────────────────────────────

/// Where a builder's insertions land.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    /// Build and return instructions without recording them.
    Detached,
    /// Push to the back of the block.
    Append(BlockId),
    /// Push to the front of the block.
    Prepend(BlockId),
    /// Insert before the index, then advance past the inserted element.
    At(BlockId, usize),
}

#[derive(Clone, Copy, Default)]
struct Flags {
    precise: bool,
    nuw: bool,
}

// ─── Result handle ──────────────────────────────────────────────────────────

/// Handle to a just-built instruction: its opcode, copies of its
/// definitions, and (when the builder was detached) the instruction itself.
#[derive(Debug)]
pub struct Ret {
    opcode: Opcode,
    defs: SmallVec<[Definition; 2]>,
    instr: Option<Instruction>,
}

impl Ret {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The first definition's temp, for chaining into the next use.
    pub fn result(&self) -> Temp {
        self.definition(0).temp()
    }

    pub fn definition(&self, i: usize) -> Definition {
        match self.defs.get(i) {
            Some(d) => *d,
            None => panic!("{} has no definition {i}", self.opcode),
        }
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    /// An operand referencing [`Ret::result`].
    pub fn operand(&self) -> Operand {
        Operand::temp(self.result())
    }

    /// The built instruction, present only for detached builders.
    pub fn into_instr(self) -> Option<Instruction> {
        self.instr
    }
}

// ─── Builder ────────────────────────────────────────────────────────────────

/// Constructs instructions into a [`Program`].
pub struct Builder<'a> {
    program: &'a mut Program,
    cursor: Cursor,
    flags: Flags,
}

impl<'a> Builder<'a> {
    /// Detached builder: instructions are built and returned, not recorded.
    pub fn new(program: &'a mut Program) -> Builder<'a> {
        Builder { program, cursor: Cursor::Detached, flags: Flags::default() }
    }

    pub fn append(program: &'a mut Program, block: BlockId) -> Builder<'a> {
        Builder { program, cursor: Cursor::Append(block), flags: Flags::default() }
    }

    pub fn prepend(program: &'a mut Program, block: BlockId) -> Builder<'a> {
        Builder { program, cursor: Cursor::Prepend(block), flags: Flags::default() }
    }

    /// Builder inserting before `index`, tracking the insert point forward.
    pub fn before(program: &'a mut Program, block: BlockId, index: usize) -> Builder<'a> {
        assert!(index <= program[block].instructions.len());
        Builder { program, cursor: Cursor::At(block, index), flags: Flags::default() }
    }

    // ── Rebinding ───────────────────────────────────────────────────

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = Cursor::Detached;
    }

    pub fn reset_append(&mut self, block: BlockId) {
        self.cursor = Cursor::Append(block);
    }

    pub fn reset_prepend(&mut self, block: BlockId) {
        self.cursor = Cursor::Prepend(block);
    }

    pub fn reset_before(&mut self, block: BlockId, index: usize) {
        assert!(index <= self.program[block].instructions.len());
        self.cursor = Cursor::At(block, index);
    }

    // ── Derived builders ────────────────────────────────────────────

    /// A builder stamping the precise flag; the original is unaffected.
    pub fn precise(&mut self) -> Builder<'_> {
        Builder {
            program: &mut *self.program,
            cursor: self.cursor,
            flags: Flags { precise: true, ..self.flags },
        }
    }

    /// A builder stamping the no-unsigned-wrap flag; the original is
    /// unaffected.
    pub fn nuw(&mut self) -> Builder<'_> {
        Builder {
            program: &mut *self.program,
            cursor: self.cursor,
            flags: Flags { nuw: true, ..self.flags },
        }
    }

    // ── Program access ──────────────────────────────────────────────

    pub fn program(&self) -> &Program {
        self.program
    }

    pub fn gfx_level(&self) -> GfxLevel {
        self.program.gfx_level
    }

    pub fn wave_size(&self) -> WaveSize {
        self.program.wave_size
    }

    /// The lane-mask class for the program's wavefront width.
    pub fn lm(&self) -> RegClass {
        self.program.lane_mask
    }

    /// Allocate a fresh temp.
    pub fn tmp(&mut self, rc: RegClass) -> Temp {
        self.program.alloc_tmp(rc)
    }

    /// Allocate a fresh temp wrapped as a definition.
    pub fn def(&mut self, rc: RegClass) -> Definition {
        Definition::new(self.program.alloc_tmp(rc))
    }

    pub fn def_fixed(&mut self, rc: RegClass, reg: PhysReg) -> Definition {
        self.def(rc).with_fixed(reg)
    }

    // ── Insertion ───────────────────────────────────────────────────

    /// Insert a fully built instruction at the cursor. Flag stamping is the
    /// constructors' job; `insert` records the instruction as-is.
    pub fn insert(&mut self, instr: Instruction) -> Ret {
        let opcode = instr.opcode;
        let defs = instr.defs.clone();
        let instr = match self.cursor {
            Cursor::Detached => Some(instr),
            Cursor::Append(block) => {
                self.program[block].instructions.push(instr);
                None
            }
            Cursor::Prepend(block) => {
                self.program[block].instructions.insert(0, instr);
                None
            }
            Cursor::At(block, index) => {
                self.program[block].instructions.insert(index, instr);
                self.cursor = Cursor::At(block, index + 1);
                None
            }
        };
        Ret { opcode, defs, instr }
    }

    // ── Constructors ────────────────────────────────────────────────

    /// Build and insert an instruction, validating the definition/operand
    /// counts against the opcode table. Formats whose side fields have no
    /// meaningful default (SOPK) must use their dedicated constructor.
    pub fn emit(&mut self, opcode: Opcode, defs: &[Definition], ops: &[Operand]) -> Ret {
        let format = opcode.info().format;
        let ext = if format == Format::SOPK {
            panic!("{opcode} carries an immediate; use Builder::sopk")
        } else if format == Format::SOPP {
            InstrExt::Sopp(SoppExt::default())
        } else if format == Format::SMEM {
            InstrExt::Smem(SmemExt::default())
        } else if format == Format::DS {
            InstrExt::Ds(DsExt::default())
        } else {
            InstrExt::None
        };
        self.emit_ext(opcode, format, defs, ops, ext)
    }

    /// Resolve a wave-specific SALU op for the program's wavefront width,
    /// then emit it.
    pub fn wave(&mut self, op: WaveOp, defs: &[Definition], ops: &[Operand]) -> Ret {
        let opcode = self.wave_opcode(op);
        self.emit(opcode, defs, ops)
    }

    /// The concrete opcode for a wave-specific op: the 64-bit form in
    /// wave64, its 32-bit counterpart in wave32.
    pub fn wave_opcode(&self, op: WaveOp) -> Opcode {
        match self.program.wave_size {
            WaveSize::W64 => op.wide(),
            WaveSize::W32 => op.narrow(),
        }
    }

    pub fn sopk(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        imm: u16,
    ) -> Ret {
        assert_eq!(opcode.info().format, Format::SOPK, "{opcode} is not SOPK");
        self.emit_ext(opcode, Format::SOPK, defs, ops, InstrExt::Sopk(SopkExt { imm }))
    }

    pub fn sopp(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        imm: u16,
    ) -> Ret {
        assert_eq!(opcode.info().format, Format::SOPP, "{opcode} is not SOPP");
        self.emit_ext(opcode, Format::SOPP, defs, ops, InstrExt::Sopp(SoppExt { imm }))
    }

    pub fn smem(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        ext: SmemExt,
    ) -> Ret {
        assert_eq!(opcode.info().format, Format::SMEM, "{opcode} is not SMEM");
        self.emit_ext(opcode, Format::SMEM, defs, ops, InstrExt::Smem(ext))
    }

    pub fn ds(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        ext: DsExt,
    ) -> Ret {
        assert_eq!(opcode.info().format, Format::DS, "{opcode} is not DS");
        self.emit_ext(opcode, Format::DS, defs, ops, InstrExt::Ds(ext))
    }

    /// A VALU op in its sub-word (SDWA) form; the format tag becomes the
    /// union of the base shape and SDWA.
    pub fn sdwa(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        ext: SdwaExt,
    ) -> Ret {
        let base = opcode.info().format;
        assert!(
            base.intersects(Format::VOP1 | Format::VOP2 | Format::VOPC),
            "{opcode} has no SDWA form"
        );
        self.emit_ext(opcode, base | Format::SDWA, defs, ops, InstrExt::Sdwa(ext))
    }

    /// A VALU op with a data-parallel-primitive lane pattern and default
    /// row/bank masks.
    pub fn dpp(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        ctrl: DppCtrl,
    ) -> Ret {
        self.dpp_ext(opcode, defs, ops, DppExt::new(ctrl))
    }

    pub fn dpp_ext(
        &mut self,
        opcode: Opcode,
        defs: &[Definition],
        ops: &[Operand],
        ext: DppExt,
    ) -> Ret {
        let base = opcode.info().format;
        assert!(
            base.intersects(Format::VOP1 | Format::VOP2 | Format::VOPC),
            "{opcode} has no DPP form"
        );
        self.emit_ext(opcode, base | Format::DPP, defs, ops, InstrExt::Dpp(ext))
    }

    pub(crate) fn emit_ext(
        &mut self,
        opcode: Opcode,
        format: Format,
        defs: &[Definition],
        ops: &[Operand],
        ext: InstrExt,
    ) -> Ret {
        let info = opcode.info();
        let shape = (defs.len() as u8, ops.len() as u8);
        assert!(
            info.arities.contains(&shape),
            "{} does not take {} definitions and {} operands",
            info.name,
            defs.len(),
            ops.len()
        );
        let mut instr = Instruction {
            opcode,
            format,
            defs: SmallVec::from_slice(defs),
            ops: SmallVec::from_slice(ops),
            ext,
        };
        for d in &mut instr.defs {
            d.stamp_flags(self.flags.precise, self.flags.nuw);
        }
        trace!("emit {instr}");
        self.insert(instr)
    }

    // ── Fixed special registers ─────────────────────────────────────
    //
    // The vcc/exec checks allow up to 8 bytes: the high half of the pair is
    // still addressable in wave32.

    pub fn m0(&self, t: Temp) -> Operand {
        Operand::temp(t).with_fixed(M0)
    }

    pub fn m0_def(&self, d: Definition) -> Definition {
        d.with_fixed(M0)
    }

    pub fn hint_m0(&mut self, rc: RegClass) -> Definition {
        self.def(rc).with_hint(M0)
    }

    pub fn vcc(&self, t: Temp) -> Operand {
        assert!(t.bank().is_sgpr() && t.bytes() <= 8);
        Operand::temp(t).with_fixed(VCC)
    }

    pub fn vcc_def(&self, d: Definition) -> Definition {
        assert!(d.rc().bank().is_sgpr() && d.bytes() <= 8);
        d.with_fixed(VCC)
    }

    pub fn hint_vcc(&mut self, rc: RegClass) -> Definition {
        assert!(rc.bank().is_sgpr() && rc.bytes() <= 8);
        self.def(rc).with_hint(VCC)
    }

    pub fn exec(&self, t: Temp) -> Operand {
        assert!(t.bank().is_sgpr() && t.bytes() <= 8);
        Operand::temp(t).with_fixed(EXEC)
    }

    pub fn exec_def(&self, d: Definition) -> Definition {
        assert!(d.rc().bank().is_sgpr() && d.bytes() <= 8);
        d.with_fixed(EXEC)
    }

    pub fn hint_exec(&mut self, rc: RegClass) -> Definition {
        assert!(rc.bank().is_sgpr() && rc.bytes() <= 8);
        self.def(rc).with_hint(EXEC)
    }

    pub fn scc(&self, t: Temp) -> Operand {
        Operand::temp(t).with_fixed(SCC)
    }

    pub fn scc_def(&self, d: Definition) -> Definition {
        d.with_fixed(SCC)
    }

    pub fn hint_scc(&mut self, rc: RegClass) -> Definition {
        self.def(rc).with_hint(SCC)
    }
}

// ─── Message encodings ──────────────────────────────────────────────────────

/// Packed `s_sendmsg` immediate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendMsg(u16);

impl SendMsg {
    pub const NONE: SendMsg = SendMsg(0);
    pub const SAVE_WAVE: SendMsg = SendMsg(4);
    pub const STALL_WAVE_GEN: SendMsg = SendMsg(5);
    pub const HALT_WAVES: SendMsg = SendMsg(6);
    pub const ORDERED_PS_DONE: SendMsg = SendMsg(7);
    pub const EARLY_PRIM_DEALLOC: SendMsg = SendMsg(8);
    pub const GS_ALLOC_REQ: SendMsg = SendMsg(9);

    pub const ID_MASK: u16 = 0xF;

    /// Geometry-stage message with cut/emit bits and the stream index.
    pub fn gs(cut: bool, emit: bool, stream: u32) -> SendMsg {
        assert!(stream < 4);
        SendMsg(2 | (cut as u16) << 4 | (emit as u16) << 5 | (stream as u16) << 8)
    }

    pub fn gs_done(cut: bool, emit: bool, stream: u32) -> SendMsg {
        assert!(stream < 4);
        SendMsg(3 | (cut as u16) << 4 | (emit as u16) << 5 | (stream as u16) << 8)
    }

    pub fn id(self) -> u16 {
        self.0 & Self::ID_MASK
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

/// Pack the three 5-bit masks of the LDS swizzle bit-mode pattern.
pub fn ds_pattern_bitmode(and_mask: u32, or_mask: u32, xor_mask: u32) -> u16 {
    assert!(and_mask < 32 && or_mask < 32 && xor_mask < 32);
    (and_mask | (or_mask << 5) | (xor_mask << 10)) as u16
}

// ─── Tests ──────────────────────────────────────────────────────────────────
