//! Machine IR for a wavefront GPU shader backend.
//!
//! Values are virtual registers (`Temp`) classed by register bank and width.
//! Instructions carry an opcode, a format tag describing the hardware
//! encoding shape (a bit union, since e.g. a sub-word move is VOP1 and SDWA
//! at once), operand/definition sequences, and format-specific side fields.
//! A `Program` owns the blocks and is the sole source of fresh temp ids.
//!
//! Construction goes through [`crate::builder::Builder`]; later passes
//! consume the records defined here.

use std::fmt;

use smallvec::SmallVec;

use crate::opcodes::Opcode;

// ─── Target description ─────────────────────────────────────────────────────

/// Hardware generation, ordered oldest to newest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GfxLevel {
    Gfx6,
    Gfx7,
    Gfx8,
    Gfx9,
    Gfx10,
    Gfx10_3,
}

/// Wavefront width the program compiles for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaveSize {
    W32,
    W64,
}

impl WaveSize {
    pub fn lanes(self) -> u32 {
        match self {
            WaveSize::W32 => 32,
            WaveSize::W64 => 64,
        }
    }

    /// Register class holding one execution-mask bit per lane.
    pub fn lane_mask(self) -> RegClass {
        match self {
            WaveSize::W32 => RegClass::S1,
            WaveSize::W64 => RegClass::S2,
        }
    }
}

// ─── Physical registers ─────────────────────────────────────────────────────

/// A physical register in the flat hardware numbering: scalar registers and
/// architectural registers below 256, vector registers at 256 and up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysReg(pub u16);

/// Vector condition code (low half).
pub const VCC: PhysReg = PhysReg(106);
/// Mode register (message/LDS addressing).
pub const M0: PhysReg = PhysReg(124);
/// Execution mask (low half).
pub const EXEC: PhysReg = PhysReg(126);
/// Source slot encoding the 1/(2*pi) inline constant, GFX8 and newer.
pub const SRC_INV_2PI: PhysReg = PhysReg(248);
/// Scalar condition code.
pub const SCC: PhysReg = PhysReg(253);

impl PhysReg {
    pub fn is_vgpr(self) -> bool {
        self.0 >= 256
    }

    pub fn is_sgpr(self) -> bool {
        self.0 < 256
    }
}

impl fmt::Display for PhysReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            VCC => write!(f, "vcc"),
            M0 => write!(f, "m0"),
            EXEC => write!(f, "exec"),
            SCC => write!(f, "scc"),
            SRC_INV_2PI => write!(f, "inv_2pi"),
            PhysReg(n) if n >= 256 => write!(f, "v{}", n - 256),
            PhysReg(n) => write!(f, "s{n}"),
        }
    }
}

// ─── Register classes ───────────────────────────────────────────────────────

/// Register bank a class allocates from.
///
/// `Linear` is the vector bank with linear (whole-wave) lifetime semantics;
/// for bank checks it counts as a vector register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegBank {
    Sgpr,
    Vgpr,
    Linear,
}

impl RegBank {
    pub fn is_sgpr(self) -> bool {
        matches!(self, RegBank::Sgpr)
    }

    pub fn is_vgpr(self) -> bool {
        matches!(self, RegBank::Vgpr | RegBank::Linear)
    }
}

/// Register class: bank plus width.
///
/// Full-width classes count in 32-bit units; sub-word classes count in bytes
/// and only exist on the vector bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegClass {
    bank: RegBank,
    size: u8,
    subdword: bool,
}

impl RegClass {
    pub const S1: RegClass = RegClass::sgpr(1);
    pub const S2: RegClass = RegClass::sgpr(2);
    pub const V1: RegClass = RegClass::vgpr(1);
    pub const V2: RegClass = RegClass::vgpr(2);

    pub const fn sgpr(dwords: u8) -> RegClass {
        assert!(dwords >= 1);
        RegClass { bank: RegBank::Sgpr, size: dwords, subdword: false }
    }

    pub const fn vgpr(dwords: u8) -> RegClass {
        assert!(dwords >= 1);
        RegClass { bank: RegBank::Vgpr, size: dwords, subdword: false }
    }

    /// Sub-word vector class, sized in bytes (1, 2, 3 or 6).
    pub const fn vgpr_bytes(bytes: u8) -> RegClass {
        assert!(matches!(bytes, 1 | 2 | 3 | 6));
        RegClass { bank: RegBank::Vgpr, size: bytes, subdword: true }
    }

    pub fn bank(self) -> RegBank {
        self.bank
    }

    /// Width in 32-bit units, rounding sub-word classes up.
    pub fn size(self) -> u32 {
        if self.subdword {
            (self.size as u32).div_ceil(4)
        } else {
            self.size as u32
        }
    }

    pub fn bytes(self) -> u32 {
        if self.subdword {
            self.size as u32
        } else {
            self.size as u32 * 4
        }
    }

    pub fn is_subdword(self) -> bool {
        self.subdword
    }

    pub fn is_linear(self) -> bool {
        matches!(self.bank, RegBank::Linear | RegBank::Sgpr)
    }

    /// The linear-lifetime variant of a vector class.
    pub fn as_linear(self) -> RegClass {
        assert!(self.bank.is_vgpr() && !self.subdword);
        RegClass { bank: RegBank::Linear, ..self }
    }
}

impl fmt::Display for RegClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bank {
            RegBank::Sgpr => write!(f, "s{}", self.size)?,
            RegBank::Vgpr => write!(f, "v{}", self.size)?,
            RegBank::Linear => write!(f, "lv{}", self.size)?,
        }
        if self.subdword {
            write!(f, "b")?;
        }
        Ok(())
    }
}

// ─── Temps ──────────────────────────────────────────────────────────────────

/// A virtual register: allocator-assigned id plus class. Ids are unique per
/// [`Program`]; allocate through [`Program::alloc_tmp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Temp {
    id: u32,
    rc: RegClass,
}

impl Temp {
    pub(crate) fn new(id: u32, rc: RegClass) -> Temp {
        Temp { id, rc }
    }

    pub fn id(self) -> u32 {
        self.id
    }

    pub fn rc(self) -> RegClass {
        self.rc
    }

    pub fn bank(self) -> RegBank {
        self.rc.bank
    }

    pub fn bytes(self) -> u32 {
        self.rc.bytes()
    }

    pub fn size(self) -> u32 {
        self.rc.size()
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}:{}", self.id, self.rc)
    }
}

// ─── Inline constants ───────────────────────────────────────────────────────

// Patterns the hardware encodes in a source slot without a literal dword:
// small non-negative integers, -16..=-1, and a handful of IEEE values. All
// other constants occupy the instruction's single literal slot.

pub fn is_inline_c16(v: u16) -> bool {
    v <= 64
        || v >= 0xFFF0
        || matches!(
            v,
            0x3800 /* 0.5 */ | 0xB800 | 0x3C00 /* 1.0 */ | 0xBC00
            | 0x4000 /* 2.0 */ | 0xC000 | 0x4400 /* 4.0 */ | 0xC400
        )
}

pub fn is_inline_c32(v: u32) -> bool {
    v <= 64
        || v >= 0xFFFF_FFF0
        || matches!(
            v,
            0x3F00_0000 /* 0.5 */ | 0xBF00_0000 | 0x3F80_0000 /* 1.0 */ | 0xBF80_0000
            | 0x4000_0000 /* 2.0 */ | 0xC000_0000 | 0x4080_0000 /* 4.0 */ | 0xC080_0000
        )
}

pub fn is_inline_c64(v: u64) -> bool {
    v <= 64
        || v >= 0xFFFF_FFFF_FFFF_FFF0
        || matches!(
            v,
            0x3FE0_0000_0000_0000 /* 0.5 */ | 0xBFE0_0000_0000_0000
            | 0x3FF0_0000_0000_0000 /* 1.0 */ | 0xBFF0_0000_0000_0000
            | 0x4000_0000_0000_0000 /* 2.0 */ | 0xC000_0000_0000_0000
            | 0x4010_0000_0000_0000 /* 4.0 */ | 0xC010_0000_0000_0000
        )
}

// ─── Operands ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
enum OperandKind {
    Temp(Temp),
    /// Constant of 1, 2, 4 or 8 bytes. `literal` means the value cannot be
    /// encoded inline and needs the instruction's literal slot.
    Const { value: u64, bytes: u8, literal: bool },
    Undef(RegClass),
}

/// A value read by an instruction: a temp, a constant, or undefined, with an
/// optional fixed physical register. Immutable; the `with_*` methods return
/// updated copies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operand {
    kind: OperandKind,
    fixed: Option<PhysReg>,
}

impl Operand {
    pub fn temp(t: Temp) -> Operand {
        Operand { kind: OperandKind::Temp(t), fixed: None }
    }

    pub fn undef(rc: RegClass) -> Operand {
        Operand { kind: OperandKind::Undef(rc), fixed: None }
    }

    /// One-byte constant. Byte constants never take the literal slot; the
    /// copy lowering synthesizes them instead.
    pub fn c8(v: u8) -> Operand {
        Operand {
            kind: OperandKind::Const { value: v as u64, bytes: 1, literal: false },
            fixed: None,
        }
    }

    pub fn c16(v: u16) -> Operand {
        Operand {
            kind: OperandKind::Const { value: v as u64, bytes: 2, literal: !is_inline_c16(v) },
            fixed: None,
        }
    }

    pub fn c32(v: u32) -> Operand {
        Operand {
            kind: OperandKind::Const { value: v as u64, bytes: 4, literal: !is_inline_c32(v) },
            fixed: None,
        }
    }

    pub fn c64(v: u64) -> Operand {
        Operand {
            kind: OperandKind::Const { value: v, bytes: 8, literal: !is_inline_c64(v) },
            fixed: None,
        }
    }

    pub fn zero() -> Operand {
        Operand::c32(0)
    }

    pub fn with_fixed(self, reg: PhysReg) -> Operand {
        Operand { fixed: Some(reg), ..self }
    }

    pub fn is_temp(&self) -> bool {
        matches!(self.kind, OperandKind::Temp(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, OperandKind::Const { .. })
    }

    /// A constant too wide for the inline encodings, spending the
    /// instruction's literal dword. Pinning a constant to a dedicated source
    /// register frees the slot again.
    pub fn is_literal(&self) -> bool {
        matches!(self.kind, OperandKind::Const { literal: true, .. }) && self.fixed.is_none()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, OperandKind::Undef(_))
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    pub fn fixed(&self) -> Option<PhysReg> {
        self.fixed
    }

    /// The referenced temp. Panics on constants and undefined operands.
    pub fn as_temp(&self) -> Temp {
        match self.kind {
            OperandKind::Temp(t) => t,
            _ => panic!("operand {self} is not a temp"),
        }
    }

    /// The constant bit pattern, zero-extended. Panics on non-constants.
    pub fn constant_value(&self) -> u64 {
        match self.kind {
            OperandKind::Const { value, .. } => value,
            _ => panic!("operand {self} is not a constant"),
        }
    }

    /// Class of a temp or undefined operand; constants have none.
    pub fn reg_class(&self) -> Option<RegClass> {
        match self.kind {
            OperandKind::Temp(t) => Some(t.rc),
            OperandKind::Undef(rc) => Some(rc),
            OperandKind::Const { .. } => None,
        }
    }

    pub fn bytes(&self) -> u32 {
        match self.kind {
            OperandKind::Temp(t) => t.bytes(),
            OperandKind::Const { bytes, .. } => bytes as u32,
            OperandKind::Undef(rc) => rc.bytes(),
        }
    }

    /// Width in 32-bit units, rounding up.
    pub fn size(&self) -> u32 {
        self.bytes().div_ceil(4)
    }
}

impl From<Temp> for Operand {
    fn from(t: Temp) -> Operand {
        Operand::temp(t)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OperandKind::Temp(t) => write!(f, "{t}")?,
            OperandKind::Const { value, .. } => write!(f, "{value:#x}")?,
            OperandKind::Undef(rc) => write!(f, "undef:{rc}")?,
        }
        if let Some(reg) = self.fixed {
            write!(f, "@{reg}")?;
        }
        Ok(())
    }
}

// ─── Definitions ────────────────────────────────────────────────────────────

/// A value produced by an instruction: destination temp, optional fixed
/// register or soft placement hint, and the precise/no-unsigned-wrap flags
/// the builder stamps at construction time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Definition {
    temp: Temp,
    fixed: Option<PhysReg>,
    hint: Option<PhysReg>,
    precise: bool,
    nuw: bool,
}

impl Definition {
    pub fn new(temp: Temp) -> Definition {
        Definition { temp, fixed: None, hint: None, precise: false, nuw: false }
    }

    pub fn with_fixed(self, reg: PhysReg) -> Definition {
        Definition { fixed: Some(reg), ..self }
    }

    pub fn with_hint(self, reg: PhysReg) -> Definition {
        Definition { hint: Some(reg), ..self }
    }

    pub(crate) fn stamp_flags(&mut self, precise: bool, nuw: bool) {
        self.precise = precise;
        self.nuw = nuw;
    }

    pub fn temp(&self) -> Temp {
        self.temp
    }

    pub fn rc(&self) -> RegClass {
        self.temp.rc
    }

    pub fn bytes(&self) -> u32 {
        self.temp.bytes()
    }

    pub fn fixed(&self) -> Option<PhysReg> {
        self.fixed
    }

    pub fn hint(&self) -> Option<PhysReg> {
        self.hint
    }

    pub fn is_precise(&self) -> bool {
        self.precise
    }

    pub fn is_nuw(&self) -> bool {
        self.nuw
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.temp)?;
        if let Some(reg) = self.fixed {
            write!(f, "@{reg}")?;
        }
        Ok(())
    }
}

// ─── Formats ────────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Hardware encoding shape. An instruction's tag is the union of every
    /// shape it occupies, e.g. `VOP1 | SDWA` for a sub-word move.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Format: u32 {
        const PSEUDO           = 1 << 0;
        const SOP1             = 1 << 1;
        const SOP2             = 1 << 2;
        const SOPK             = 1 << 3;
        const SOPP             = 1 << 4;
        const SOPC             = 1 << 5;
        const SMEM             = 1 << 6;
        const DS               = 1 << 7;
        const VOP1             = 1 << 8;
        const VOP2             = 1 << 9;
        const VOPC             = 1 << 10;
        const VOP3             = 1 << 11;
        const SDWA             = 1 << 12;
        const DPP              = 1 << 13;
        const PSEUDO_BRANCH    = 1 << 14;
        const PSEUDO_BARRIER   = 1 << 15;
        const PSEUDO_REDUCTION = 1 << 16;
    }
}

impl Format {
    pub fn is_salu(self) -> bool {
        self.intersects(
            Format::SOP1 | Format::SOP2 | Format::SOPK | Format::SOPP | Format::SOPC,
        )
    }

    pub fn is_valu(self) -> bool {
        self.intersects(Format::VOP1 | Format::VOP2 | Format::VOPC | Format::VOP3)
    }

    pub fn is_pseudo(self) -> bool {
        self.intersects(
            Format::PSEUDO
                | Format::PSEUDO_BRANCH
                | Format::PSEUDO_BARRIER
                | Format::PSEUDO_REDUCTION,
        )
    }
}

// ─── Format side fields ─────────────────────────────────────────────────────

/// Sub-word source/destination select for SDWA encodings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubdwordSel {
    Ubyte0,
    Ubyte1,
    Ubyte2,
    Ubyte3,
    Uword0,
    Uword1,
    #[default]
    Dword,
}

impl SubdwordSel {
    pub fn bytes(self) -> u32 {
        match self {
            SubdwordSel::Ubyte0 | SubdwordSel::Ubyte1 | SubdwordSel::Ubyte2
            | SubdwordSel::Ubyte3 => 1,
            SubdwordSel::Uword0 | SubdwordSel::Uword1 => 2,
            SubdwordSel::Dword => 4,
        }
    }

    /// Byte offset of the selected slice within the register.
    pub fn offset(self) -> u32 {
        match self {
            SubdwordSel::Ubyte0 | SubdwordSel::Uword0 | SubdwordSel::Dword => 0,
            SubdwordSel::Ubyte1 => 1,
            SubdwordSel::Ubyte2 | SubdwordSel::Uword1 => 2,
            SubdwordSel::Ubyte3 => 3,
        }
    }
}

/// Data-parallel-primitive lane pattern for DPP encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DppCtrl(u16);

impl DppCtrl {
    pub const WF_SL1: DppCtrl = DppCtrl(0x130);
    pub const WF_RL1: DppCtrl = DppCtrl(0x134);
    pub const WF_SR1: DppCtrl = DppCtrl(0x138);
    pub const WF_RR1: DppCtrl = DppCtrl(0x13C);
    pub const ROW_MIRROR: DppCtrl = DppCtrl(0x140);
    pub const ROW_HALF_MIRROR: DppCtrl = DppCtrl(0x141);
    pub const ROW_BCAST15: DppCtrl = DppCtrl(0x142);
    pub const ROW_BCAST31: DppCtrl = DppCtrl(0x143);

    /// Per-quad lane permutation.
    pub fn quad_perm(lane0: u32, lane1: u32, lane2: u32, lane3: u32) -> DppCtrl {
        assert!(lane0 < 4 && lane1 < 4 && lane2 < 4 && lane3 < 4);
        DppCtrl((lane0 | (lane1 << 2) | (lane2 << 4) | (lane3 << 6)) as u16)
    }

    /// Shift left within each row.
    pub fn row_sl(amount: u32) -> DppCtrl {
        assert!(amount > 0 && amount < 16);
        DppCtrl(0x100 | amount as u16)
    }

    /// Shift right within each row.
    pub fn row_sr(amount: u32) -> DppCtrl {
        assert!(amount > 0 && amount < 16);
        DppCtrl(0x110 | amount as u16)
    }

    /// Rotate right within each row.
    pub fn row_rr(amount: u32) -> DppCtrl {
        assert!(amount > 0 && amount < 16);
        DppCtrl(0x120 | amount as u16)
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SopkExt {
    pub imm: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoppExt {
    pub imm: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SmemExt {
    pub glc: bool,
    pub dlc: bool,
    pub nv: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DsExt {
    pub offset0: u16,
    pub offset1: u8,
    pub gds: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SdwaExt {
    pub sel: [SubdwordSel; 2],
    pub dst_sel: SubdwordSel,
    /// Keep the unselected destination bytes instead of zero/sign-filling.
    pub dst_preserve: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DppExt {
    pub ctrl: DppCtrl,
    pub row_mask: u8,
    pub bank_mask: u8,
    pub bound_ctrl: bool,
}

impl DppExt {
    pub fn new(ctrl: DppCtrl) -> DppExt {
        DppExt { ctrl, row_mask: 0xF, bank_mask: 0xF, bound_ctrl: false }
    }
}

/// Side fields present only for certain encoding shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum InstrExt {
    #[default]
    None,
    Sopk(SopkExt),
    Sopp(SoppExt),
    Smem(SmemExt),
    Ds(DsExt),
    Sdwa(SdwaExt),
    Dpp(DppExt),
}

// ─── Instructions ───────────────────────────────────────────────────────────

/// One machine-IR instruction. Owned by its block once inserted.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub opcode: Opcode,
    pub format: Format,
    pub defs: SmallVec<[Definition; 2]>,
    pub ops: SmallVec<[Operand; 4]>,
    pub ext: InstrExt,
}

impl Instruction {
    pub fn has_format(&self, f: Format) -> bool {
        self.format.contains(f)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        let mut sep = " ";
        for d in &self.defs {
            write!(f, "{sep}{d}")?;
            sep = ", ";
        }
        if !self.defs.is_empty() && !self.ops.is_empty() {
            write!(f, " =")?;
            sep = " ";
        }
        for op in &self.ops {
            write!(f, "{sep}{op}")?;
            sep = ", ";
        }
        Ok(())
    }
}

// ─── Blocks and programs ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

/// A straight-line instruction sequence.
#[derive(Debug, Default)]
pub struct Block {
    pub index: u32,
    pub instructions: Vec<Instruction>,
}

/// The compiling unit: target description, blocks, and the temp allocator.
#[derive(Debug)]
pub struct Program {
    pub gfx_level: GfxLevel,
    pub wave_size: WaveSize,
    pub lane_mask: RegClass,
    pub blocks: Vec<Block>,
    next_tmp_id: u32,
}

impl Program {
    pub fn new(gfx_level: GfxLevel, wave_size: WaveSize) -> Program {
        Program {
            gfx_level,
            wave_size,
            lane_mask: wave_size.lane_mask(),
            blocks: Vec::new(),
            next_tmp_id: 0,
        }
    }

    /// Allocate a fresh virtual register of the given class.
    pub fn alloc_tmp(&mut self, rc: RegClass) -> Temp {
        let id = self.next_tmp_id;
        self.next_tmp_id += 1;
        Temp::new(id, rc)
    }

    pub fn create_block(&mut self) -> BlockId {
        let index = self.blocks.len() as u32;
        self.blocks.push(Block { index, instructions: Vec::new() });
        BlockId(index)
    }

    /// Number of temp ids allocated so far.
    pub fn temp_count(&self) -> u32 {
        self.next_tmp_id
    }
}

impl std::ops::Index<BlockId> for Program {
    type Output = Block;

    fn index(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }
}

impl std::ops::IndexMut<BlockId> for Program {
    fn index_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
