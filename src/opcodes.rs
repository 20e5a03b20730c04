//! Opcode table: the instruction set slice this layer constructs, with the
//! per-opcode metadata the builder trusts (display name, canonical encoding
//! format, legal definition/operand arities).
//!
//! Counts listed here include implicit outputs the IR models explicitly,
//! e.g. the scalar condition code written by most SALU arithmetic or the
//! lane-mask carry produced by the wide-add family.

use std::fmt;

use crate::ir::Format;

/// Per-opcode metadata.
#[derive(Debug)]
pub struct OpInfo {
    pub name: &'static str,
    pub format: Format,
    /// Legal `(definitions, operands)` arities.
    pub arities: &'static [(u8, u8)],
}

// Shared arity slices. Names read (defs, ops).
const A_0_0: &[(u8, u8)] = &[(0, 0)];
const A_0_1: &[(u8, u8)] = &[(0, 1)];
const A_0_3: &[(u8, u8)] = &[(0, 3)];
const A_1_0: &[(u8, u8)] = &[(1, 0)];
const A_1_1: &[(u8, u8)] = &[(1, 1)];
const A_1_2: &[(u8, u8)] = &[(1, 2)];
const A_1_3: &[(u8, u8)] = &[(1, 3)];
const A_2_1: &[(u8, u8)] = &[(2, 1)];
const A_2_2: &[(u8, u8)] = &[(2, 2)];
const A_2_3: &[(u8, u8)] = &[(2, 3)];
const A_3_2: &[(u8, u8)] = &[(3, 2)];

const A_GATHER: &[(u8, u8)] = &[(1, 1), (1, 2), (1, 3), (1, 4), (1, 8)];
const A_SCATTER: &[(u8, u8)] = &[(2, 1), (3, 1), (4, 1), (8, 1)];
const A_COPY: &[(u8, u8)] = &[(1, 1), (2, 2), (3, 3), (4, 4)];
const A_PHI: &[(u8, u8)] = &[(1, 1), (1, 2), (1, 3), (1, 4)];
const A_DS_READ: &[(u8, u8)] = &[(1, 1), (1, 2)];

macro_rules! opcode_table {
    ($($variant:ident = ($name:literal, $fmt:ident, $arities:expr),)*) => {
        /// Opcodes constructible through the builder, hardware and
        /// compiler-internal pseudo ops alike.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            /// Every opcode, in table order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Metadata for this opcode.
            pub fn info(self) -> &'static OpInfo {
                match self {
                    $(Opcode::$variant => {
                        static INFO: OpInfo = OpInfo {
                            name: $name,
                            format: Format::$fmt,
                            arities: $arities,
                        };
                        &INFO
                    })*
                }
            }

            pub fn name(self) -> &'static str {
                self.info().name
            }
        }
    };
}

opcode_table! {
    // ── Pseudo ops ──────────────────────────────────────────────────
    PParallelcopy = ("p_parallelcopy", PSEUDO, A_COPY),
    PCreateVector = ("p_create_vector", PSEUDO, A_GATHER),
    PSplitVector = ("p_split_vector", PSEUDO, A_SCATTER),
    PExtractVector = ("p_extract_vector", PSEUDO, A_1_2),
    PAsUniform = ("p_as_uniform", PSEUDO, A_1_1),
    PPhi = ("p_phi", PSEUDO, A_PHI),
    PLinearPhi = ("p_linear_phi", PSEUDO, A_PHI),
    PBranch = ("p_branch", PSEUDO_BRANCH, A_1_0),
    PCbranchZ = ("p_cbranch_z", PSEUDO_BRANCH, A_1_1),
    PCbranchNz = ("p_cbranch_nz", PSEUDO_BRANCH, A_1_1),
    PBarrier = ("p_barrier", PSEUDO_BARRIER, A_0_0),
    PReduce = ("p_reduce", PSEUDO_REDUCTION, A_3_2),
    PInclusiveScan = ("p_inclusive_scan", PSEUDO_REDUCTION, A_3_2),
    PExclusiveScan = ("p_exclusive_scan", PSEUDO_REDUCTION, A_3_2),

    // ── SOP1 ────────────────────────────────────────────────────────
    SMovB32 = ("s_mov_b32", SOP1, A_1_1),
    SMovB64 = ("s_mov_b64", SOP1, A_1_1),
    SBrevB32 = ("s_brev_b32", SOP1, A_1_1),
    SNotB32 = ("s_not_b32", SOP1, A_2_1),
    SNotB64 = ("s_not_b64", SOP1, A_2_1),
    SWqmB32 = ("s_wqm_b32", SOP1, A_2_1),
    SWqmB64 = ("s_wqm_b64", SOP1, A_2_1),
    SAndSaveexecB32 = ("s_and_saveexec_b32", SOP1, A_3_2),
    SAndSaveexecB64 = ("s_and_saveexec_b64", SOP1, A_3_2),
    SOrSaveexecB32 = ("s_or_saveexec_b32", SOP1, A_3_2),
    SOrSaveexecB64 = ("s_or_saveexec_b64", SOP1, A_3_2),
    SFf1I32B32 = ("s_ff1_i32_b32", SOP1, A_1_1),
    SFf1I32B64 = ("s_ff1_i32_b64", SOP1, A_1_1),
    SFlbitI32B32 = ("s_flbit_i32_b32", SOP1, A_1_1),
    SFlbitI32B64 = ("s_flbit_i32_b64", SOP1, A_1_1),
    SBcnt1I32B32 = ("s_bcnt1_i32_b32", SOP1, A_2_1),
    SBcnt1I32B64 = ("s_bcnt1_i32_b64", SOP1, A_2_1),

    // ── SOP2 ────────────────────────────────────────────────────────
    SAddU32 = ("s_add_u32", SOP2, A_2_2),
    SAndB32 = ("s_and_b32", SOP2, A_2_2),
    SAndB64 = ("s_and_b64", SOP2, A_2_2),
    SOrB32 = ("s_or_b32", SOP2, A_2_2),
    SOrB64 = ("s_or_b64", SOP2, A_2_2),
    SXorB32 = ("s_xor_b32", SOP2, A_2_2),
    SXorB64 = ("s_xor_b64", SOP2, A_2_2),
    SAndn2B32 = ("s_andn2_b32", SOP2, A_2_2),
    SAndn2B64 = ("s_andn2_b64", SOP2, A_2_2),
    SOrn2B32 = ("s_orn2_b32", SOP2, A_2_2),
    SOrn2B64 = ("s_orn2_b64", SOP2, A_2_2),
    SXnorB32 = ("s_xnor_b32", SOP2, A_2_2),
    SXnorB64 = ("s_xnor_b64", SOP2, A_2_2),
    SLshlB32 = ("s_lshl_b32", SOP2, A_2_2),
    SLshlB64 = ("s_lshl_b64", SOP2, A_2_2),
    SCselectB32 = ("s_cselect_b32", SOP2, A_1_3),
    SCselectB64 = ("s_cselect_b64", SOP2, A_1_3),
    SBfmB32 = ("s_bfm_b32", SOP2, A_1_2),

    // ── SOPK / SOPP / SOPC ──────────────────────────────────────────
    SMovkI32 = ("s_movk_i32", SOPK, A_1_0),
    SNop = ("s_nop", SOPP, A_0_0),
    SEndpgm = ("s_endpgm", SOPP, A_0_0),
    SWaitcnt = ("s_waitcnt", SOPP, A_0_0),
    SSendmsg = ("s_sendmsg", SOPP, A_0_1),
    SBarrier = ("s_barrier", SOPP, A_0_0),
    SCmpLgU32 = ("s_cmp_lg_u32", SOPC, A_1_2),
    SCmpLgU64 = ("s_cmp_lg_u64", SOPC, A_1_2),
    SBitcmp1B32 = ("s_bitcmp1_b32", SOPC, A_1_2),
    SBitcmp1B64 = ("s_bitcmp1_b64", SOPC, A_1_2),

    // ── SMEM / DS ───────────────────────────────────────────────────
    SLoadDword = ("s_load_dword", SMEM, A_1_2),
    SLoadDwordx2 = ("s_load_dwordx2", SMEM, A_1_2),
    SMemtime = ("s_memtime", SMEM, A_1_0),
    SDcacheWb = ("s_dcache_wb", SMEM, A_0_0),
    DsSwizzleB32 = ("ds_swizzle_b32", DS, A_1_1),
    DsBpermuteB32 = ("ds_bpermute_b32", DS, A_1_2),
    DsReadB32 = ("ds_read_b32", DS, A_DS_READ),
    DsWriteB32 = ("ds_write_b32", DS, A_0_3),

    // ── VOP1 ────────────────────────────────────────────────────────
    VNop = ("v_nop", VOP1, A_0_0),
    VMovB32 = ("v_mov_b32", VOP1, A_1_1),
    VBfrevB32 = ("v_bfrev_b32", VOP1, A_1_1),
    VNotB32 = ("v_not_b32", VOP1, A_1_1),
    VSwapB32 = ("v_swap_b32", VOP1, A_2_2),

    // ── VOP2 ────────────────────────────────────────────────────────
    VAddU32 = ("v_add_u32", VOP2, A_1_2),
    VSubU32 = ("v_sub_u32", VOP2, A_1_2),
    VSubrevU32 = ("v_subrev_u32", VOP2, A_1_2),
    VAddCoU32 = ("v_add_co_u32", VOP2, A_2_2),
    VSubCoU32 = ("v_sub_co_u32", VOP2, A_2_2),
    VSubrevCoU32 = ("v_subrev_co_u32", VOP2, A_2_2),
    VAddcCoU32 = ("v_addc_co_u32", VOP2, A_2_3),
    VSubbCoU32 = ("v_subb_co_u32", VOP2, A_2_3),
    VSubbrevCoU32 = ("v_subbrev_co_u32", VOP2, A_2_3),
    VMulU32U24 = ("v_mul_u32_u24", VOP2, A_1_2),
    VLshlrevB32 = ("v_lshlrev_b32", VOP2, A_1_2),
    VAndB32 = ("v_and_b32", VOP2, A_1_2),
    VOrB32 = ("v_or_b32", VOP2, A_1_2),
    VXorB32 = ("v_xor_b32", VOP2, A_1_2),
    VAddF16 = ("v_add_f16", VOP2, A_1_2),
    VCndmaskB32 = ("v_cndmask_b32", VOP2, A_1_3),
    VReadlaneB32 = ("v_readlane_b32", VOP2, A_1_2),
    VWritelaneB32 = ("v_writelane_b32", VOP2, A_1_3),

    // ── VOPC ────────────────────────────────────────────────────────
    VCmpEqU32 = ("v_cmp_eq_u32", VOPC, A_1_2),
    VCmpLtU32 = ("v_cmp_lt_u32", VOPC, A_1_2),

    // ── VOP3 ────────────────────────────────────────────────────────
    VAddCoU32E64 = ("v_add_co_u32_e64", VOP3, A_2_2),
    VSubCoU32E64 = ("v_sub_co_u32_e64", VOP3, A_2_2),
    VSubrevCoU32E64 = ("v_subrev_co_u32_e64", VOP3, A_2_2),
    VMulLoU32 = ("v_mul_lo_u32", VOP3, A_1_2),
    VReadlaneB32E64 = ("v_readlane_b32_e64", VOP3, A_1_2),
    VWritelaneB32E64 = ("v_writelane_b32_e64", VOP3, A_1_3),
    VMadU32U24 = ("v_mad_u32_u24", VOP3, A_1_3),
    VBfeU32 = ("v_bfe_u32", VOP3, A_1_3),
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Wave-specific opcodes ──────────────────────────────────────────────────

/// SALU operations whose encoded width follows the wavefront width: lane
/// masks are 64-bit values in wave64 and 32-bit values in wave32. The
/// builder resolves these through [`crate::builder::Builder::wave_opcode`];
/// being a closed enum, an op without a 32-bit counterpart cannot reach
/// resolution at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaveOp {
    SCselect,
    SCmpLg,
    SAnd,
    SAndn2,
    SOr,
    SOrn2,
    SNot,
    SMov,
    SWqm,
    SAndSaveexec,
    SOrSaveexec,
    SXnor,
    SXor,
    SBcnt1I32,
    SBitcmp1,
    SFf1I32,
    SFlbitI32,
    SLshl,
}

impl WaveOp {
    pub const ALL: &'static [WaveOp] = &[
        WaveOp::SCselect,
        WaveOp::SCmpLg,
        WaveOp::SAnd,
        WaveOp::SAndn2,
        WaveOp::SOr,
        WaveOp::SOrn2,
        WaveOp::SNot,
        WaveOp::SMov,
        WaveOp::SWqm,
        WaveOp::SAndSaveexec,
        WaveOp::SOrSaveexec,
        WaveOp::SXnor,
        WaveOp::SXor,
        WaveOp::SBcnt1I32,
        WaveOp::SBitcmp1,
        WaveOp::SFf1I32,
        WaveOp::SFlbitI32,
        WaveOp::SLshl,
    ];

    /// The 64-bit encoded form, used as-is in wave64.
    pub fn wide(self) -> Opcode {
        match self {
            WaveOp::SCselect => Opcode::SCselectB64,
            WaveOp::SCmpLg => Opcode::SCmpLgU64,
            WaveOp::SAnd => Opcode::SAndB64,
            WaveOp::SAndn2 => Opcode::SAndn2B64,
            WaveOp::SOr => Opcode::SOrB64,
            WaveOp::SOrn2 => Opcode::SOrn2B64,
            WaveOp::SNot => Opcode::SNotB64,
            WaveOp::SMov => Opcode::SMovB64,
            WaveOp::SWqm => Opcode::SWqmB64,
            WaveOp::SAndSaveexec => Opcode::SAndSaveexecB64,
            WaveOp::SOrSaveexec => Opcode::SOrSaveexecB64,
            WaveOp::SXnor => Opcode::SXnorB64,
            WaveOp::SXor => Opcode::SXorB64,
            WaveOp::SBcnt1I32 => Opcode::SBcnt1I32B64,
            WaveOp::SBitcmp1 => Opcode::SBitcmp1B64,
            WaveOp::SFf1I32 => Opcode::SFf1I32B64,
            WaveOp::SFlbitI32 => Opcode::SFlbitI32B64,
            WaveOp::SLshl => Opcode::SLshlB64,
        }
    }

    /// The 32-bit encoded form, substituted in wave32.
    pub fn narrow(self) -> Opcode {
        match self {
            WaveOp::SCselect => Opcode::SCselectB32,
            WaveOp::SCmpLg => Opcode::SCmpLgU32,
            WaveOp::SAnd => Opcode::SAndB32,
            WaveOp::SAndn2 => Opcode::SAndn2B32,
            WaveOp::SOr => Opcode::SOrB32,
            WaveOp::SOrn2 => Opcode::SOrn2B32,
            WaveOp::SNot => Opcode::SNotB32,
            WaveOp::SMov => Opcode::SMovB32,
            WaveOp::SWqm => Opcode::SWqmB32,
            WaveOp::SAndSaveexec => Opcode::SAndSaveexecB32,
            WaveOp::SOrSaveexec => Opcode::SOrSaveexecB32,
            WaveOp::SXnor => Opcode::SXnorB32,
            WaveOp::SXor => Opcode::SXorB32,
            WaveOp::SBcnt1I32 => Opcode::SBcnt1I32B32,
            WaveOp::SBitcmp1 => Opcode::SBitcmp1B32,
            WaveOp::SFf1I32 => Opcode::SFf1I32B32,
            WaveOp::SFlbitI32 => Opcode::SFlbitI32B32,
            WaveOp::SLshl => Opcode::SLshlB32,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
