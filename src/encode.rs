//! Encoding selection: picks the cheapest correct instruction form for the
//! operations later passes ask for constantly.
//!
//! Constant materialization walks a fixed ladder of hardware shortcuts
//! (dedicated inline slot, short immediate, reversed-bits immediate,
//! bitfield mask) before settling on a generic move; the choice depends
//! only on the value, the destination class, and the hardware generation.
//! Wide add/sub canonicalize operand order for the asymmetric vector slot
//! and pick carry-producing/consuming forms per generation. Everything
//! here bottoms out in the plain [`Builder`] constructors.

use log::debug;

use crate::builder::{Builder, Ret};
use crate::ir::{
    Definition, Format, GfxLevel, InstrExt, Operand, RegClass, SdwaExt, SubdwordSel, Temp,
    SRC_INV_2PI, VCC,
};
use crate::opcodes::Opcode;

// ─── Byte synthesis table ───────────────────────────────────────────────────

// Factor pairs whose product's low byte is the table index. Both factors
// sign-extend to inline constants, so a single 24-bit multiply writing one
// byte of the destination materializes any byte value without a literal.
#[rustfmt::skip]
static BYTE_MUL_FACTORS: [u8; 512] = [
    0, 0, 1, 1, 1, 2, 1, 3, 1, 4, 1, 5, 1, 6, 1, 7,
    1, 8, 1, 9, 1, 10, 1, 11, 1, 12, 1, 13, 1, 14, 1, 15,
    1, 16, 1, 17, 1, 18, 1, 19, 1, 20, 1, 21, 1, 22, 1, 23,
    1, 24, 1, 25, 1, 26, 1, 27, 1, 28, 1, 29, 1, 30, 1, 31,
    1, 32, 1, 33, 1, 34, 1, 35, 1, 36, 1, 37, 1, 38, 1, 39,
    1, 40, 1, 41, 1, 42, 1, 43, 1, 44, 1, 45, 1, 46, 1, 47,
    1, 48, 1, 49, 1, 50, 1, 51, 1, 52, 1, 53, 1, 54, 1, 55,
    1, 56, 1, 57, 1, 58, 1, 59, 1, 60, 1, 61, 1, 62, 1, 63,
    1, 64, 5, 13, 2, 33, 17, 19, 2, 34, 3, 23, 2, 35, 11, 53,
    2, 36, 7, 47, 2, 37, 3, 25, 2, 38, 7, 11, 2, 39, 53, 243,
    2, 40, 3, 27, 2, 41, 17, 35, 2, 42, 5, 17, 2, 43, 3, 29,
    2, 44, 15, 23, 2, 45, 7, 13, 2, 46, 3, 31, 2, 47, 5, 19,
    2, 48, 19, 59, 2, 49, 3, 33, 2, 50, 7, 51, 2, 51, 15, 41,
    2, 52, 3, 35, 2, 53, 11, 33, 2, 54, 21, 249, 2, 55, 3, 37,
    2, 56, 9, 41, 2, 57, 5, 23, 2, 58, 3, 39, 2, 59, 7, 17,
    2, 60, 9, 241, 2, 61, 3, 41, 2, 62, 5, 25, 2, 63, 35, 245,
    2, 64, 3, 43, 5, 26, 9, 43, 3, 44, 7, 19, 10, 39, 3, 45,
    4, 34, 11, 59, 3, 46, 9, 243, 4, 35, 3, 47, 19, 250, 7, 57,
    3, 48, 5, 29, 10, 245, 3, 49, 4, 37, 9, 45, 3, 50, 7, 241,
    4, 38, 3, 51, 7, 22, 5, 31, 3, 52, 7, 59, 7, 242, 3, 53,
    4, 40, 7, 23, 3, 54, 15, 45, 4, 41, 3, 55, 6, 241, 9, 47,
    3, 56, 13, 13, 5, 34, 3, 57, 4, 43, 11, 39, 3, 58, 5, 35,
    4, 44, 3, 59, 6, 243, 7, 245, 3, 60, 5, 241, 7, 26, 3, 61,
    4, 46, 5, 37, 3, 62, 11, 17, 4, 47, 3, 63, 5, 38, 5, 243,
    3, 64, 7, 247, 9, 50, 5, 39, 4, 49, 21, 241, 6, 33, 13, 35,
    4, 50, 5, 245, 6, 247, 7, 29, 4, 51, 5, 41, 5, 246, 7, 249,
    3, 240, 11, 19, 5, 42, 3, 241, 4, 53, 23, 243, 3, 242, 5, 43,
    4, 54, 3, 243, 17, 58, 17, 43, 3, 244, 5, 249, 6, 37, 3, 245,
    2, 240, 5, 45, 2, 241, 19, 241, 2, 242, 3, 247, 2, 243, 5, 251,
    2, 244, 23, 255, 2, 245, 3, 249, 2, 246, 17, 29, 2, 247, 9, 55,
    1, 240, 1, 241, 1, 242, 1, 243, 1, 244, 1, 245, 1, 246, 1, 247,
    1, 248, 1, 249, 1, 250, 1, 251, 1, 252, 1, 253, 1, 254, 1, 255,
];

fn sign_extend_byte(v: u8) -> u32 {
    v as u32 | if v & 0x80 != 0 { 0xFFFF_FF00 } else { 0 }
}

fn byte_sdwa(dst_sel: SubdwordSel) -> InstrExt {
    InstrExt::Sdwa(SdwaExt {
        sel: [SubdwordSel::Dword; 2],
        dst_sel,
        dst_preserve: true,
    })
}

impl Builder<'_> {
    // ─── Constant and register moves ────────────────────────────────────────

    /// Move `op` into `dst`, bit pattern and width preserved, picking the
    /// cheapest encoding for the destination class and hardware generation.
    pub fn copy(&mut self, dst: Definition, op: Operand) -> Ret {
        let mut op = op;
        assert_eq!(op.bytes(), dst.bytes(), "copy width mismatch: {op} into {dst}");

        if dst.rc() == RegClass::S1 && op.size() == 1 && op.is_literal() {
            let imm = op.constant_value() as u32;
            if imm == 0x3E22_F983 {
                // 1/(2*pi) gets a dedicated source slot on GFX8+.
                if self.gfx_level() >= GfxLevel::Gfx8 {
                    op = op.with_fixed(SRC_INV_2PI);
                }
            } else if imm >= 0xFFFF_8000 || imm <= 0x7FFF {
                debug!("copy {imm:#010x}: short immediate");
                return self.sopk(Opcode::SMovkI32, &[dst], &[], (imm & 0xFFFF) as u16);
            } else if imm.reverse_bits() <= 64 || imm.reverse_bits() >= 0xFFFF_FFF0 {
                debug!("copy {imm:#010x}: reversed-bits immediate");
                return self.emit(Opcode::SBrevB32, &[dst], &[Operand::c32(imm.reverse_bits())]);
            } else {
                let start = imm.trailing_zeros() & 0x1F;
                let size = imm.count_ones() & 0x1F;
                if ((1u32 << size) - 1) << start == imm {
                    debug!("copy {imm:#010x}: bitfield mask ({size}, {start})");
                    return self.emit(
                        Opcode::SBfmB32,
                        &[dst],
                        &[Operand::c32(size), Operand::c32(start)],
                    );
                }
            }
        }

        if dst.rc() == RegClass::S1 {
            self.emit(Opcode::SMovB32, &[dst], &[op])
        } else if dst.rc() == RegClass::S2 {
            self.emit(Opcode::SMovB64, &[dst], &[op])
        } else if dst.rc() == RegClass::V1 || dst.rc() == RegClass::V1.as_linear() {
            self.emit(Opcode::VMovB32, &[dst], &[op])
        } else if op.bytes() > 2 || (op.is_literal() && dst.rc().is_subdword()) {
            self.emit(Opcode::PCreateVector, &[dst], &[op])
        } else if op.bytes() == 1 && op.is_constant() {
            let val = op.constant_value() as u8;
            let op32 = Operand::c32(sign_extend_byte(val));
            if op32.is_literal() {
                let a = BYTE_MUL_FACTORS[val as usize * 2];
                let b = BYTE_MUL_FACTORS[val as usize * 2 + 1];
                debug!("copy byte {val:#04x}: synthesized as {a:#x} * {b:#x}");
                self.emit_ext(
                    Opcode::VMulU32U24,
                    Format::VOP2 | Format::SDWA,
                    &[dst],
                    &[
                        Operand::c32(sign_extend_byte(a)),
                        Operand::c32(sign_extend_byte(b)),
                    ],
                    byte_sdwa(SubdwordSel::Ubyte0),
                )
            } else {
                self.emit_ext(
                    Opcode::VMovB32,
                    Format::VOP1 | Format::SDWA,
                    &[dst],
                    &[op32],
                    byte_sdwa(SubdwordSel::Ubyte0),
                )
            }
        } else if op.bytes() == 2 && op.is_constant() && !op.is_literal() {
            // Half-word inline constants ride the f16 add's first slot; the
            // entry width check pins the destination to two bytes.
            self.emit_ext(
                Opcode::VAddF16,
                Format::VOP2 | Format::SDWA,
                &[dst],
                &[op, Operand::zero()],
                InstrExt::Sdwa(SdwaExt {
                    sel: [SubdwordSel::Uword0, SubdwordSel::Dword],
                    dst_sel: SubdwordSel::Uword0,
                    dst_preserve: true,
                }),
            )
        } else if dst.rc().is_subdword() {
            if self.gfx_level() >= GfxLevel::Gfx8 {
                let slice = |bytes| {
                    if bytes == 1 {
                        SubdwordSel::Ubyte0
                    } else {
                        SubdwordSel::Uword0
                    }
                };
                self.emit_ext(
                    Opcode::VMovB32,
                    Format::VOP1 | Format::SDWA,
                    &[dst],
                    &[op],
                    InstrExt::Sdwa(SdwaExt {
                        sel: [slice(op.bytes()), SubdwordSel::Dword],
                        dst_sel: slice(dst.bytes()),
                        dst_preserve: true,
                    }),
                )
            } else {
                self.emit(Opcode::VMovB32, &[dst], &[op])
            }
        } else {
            panic!("no copy lowering for {op} into {dst}");
        }
    }

    /// Force a value into the scalar bank; scalar inputs pass through
    /// untouched.
    pub fn as_uniform(&mut self, op: Operand) -> Temp {
        assert!(op.is_temp(), "as_uniform needs a register value, got {op}");
        let t = op.as_temp();
        if t.bank().is_vgpr() {
            let dst = self.def(RegClass::sgpr(t.size() as u8));
            self.emit(Opcode::PAsUniform, &[dst], &[op]).result()
        } else {
            t
        }
    }

    // ─── Wide arithmetic ────────────────────────────────────────────────────

    /// 32-bit vector add, no carry in or out.
    pub fn vadd32(&mut self, dst: Definition, a: Operand, b: Operand) -> Ret {
        self.vadd32_ext(dst, a, b, false, None, false)
    }

    /// 32-bit vector add selecting among the carry-consuming, carry-out and
    /// plain encodings. The vector operand is canonicalized into the second
    /// slot; `post_ra` admits operands that no longer carry a class.
    pub fn vadd32_ext(
        &mut self,
        dst: Definition,
        a: Operand,
        b: Operand,
        carry_out: bool,
        carry_in: Option<Operand>,
        post_ra: bool,
    ) -> Ret {
        let (mut a, mut b) = (a, b);
        if !b.is_temp() || !b.as_temp().bank().is_vgpr() {
            std::mem::swap(&mut a, &mut b);
        }
        let b_rc = b.reg_class();
        assert!(
            (post_ra || b_rc.is_some()) && b_rc.map_or(post_ra, |rc| rc.bank().is_vgpr()),
            "vadd32 needs a vector register operand, got {b}"
        );

        let carry_in = carry_in.filter(|c| !c.is_undefined());
        if let Some(carry_in) = carry_in {
            let carry = self.hint_vcc(self.lm());
            self.emit(Opcode::VAddcCoU32, &[dst, carry], &[a, b, carry_in])
        } else if self.gfx_level() >= GfxLevel::Gfx10 && carry_out {
            let carry = self.def(self.lm());
            self.emit(Opcode::VAddCoU32E64, &[dst, carry], &[a, b])
        } else if self.gfx_level() < GfxLevel::Gfx9 || carry_out {
            let carry = self.hint_vcc(self.lm());
            self.emit(Opcode::VAddCoU32, &[dst, carry], &[a, b])
        } else {
            self.emit(Opcode::VAddU32, &[dst], &[a, b])
        }
    }

    /// 32-bit vector subtract, no borrow in or out.
    pub fn vsub32(&mut self, dst: Definition, a: Operand, b: Operand) -> Ret {
        self.vsub32_ext(dst, a, b, false, None)
    }

    /// 32-bit vector subtract. Subtraction is non-commutative, so a
    /// non-vector second operand selects the reverse-subtract family instead
    /// of swapping roles. A supplied borrow, or a generation without the
    /// carry-less encoding, forces borrow tracking.
    pub fn vsub32_ext(
        &mut self,
        dst: Definition,
        a: Operand,
        b: Operand,
        carry_out: bool,
        borrow: Option<Operand>,
    ) -> Ret {
        let borrow = borrow.filter(|o| !o.is_undefined());
        let carry_out = carry_out || borrow.is_some() || self.gfx_level() < GfxLevel::Gfx9;

        let (mut a, mut b) = (a, b);
        let reverse = !b.is_temp() || !b.as_temp().bank().is_vgpr();
        if reverse {
            std::mem::swap(&mut a, &mut b);
        }
        assert!(
            b.is_temp() && b.as_temp().bank().is_vgpr(),
            "vsub32 needs a vector register operand, got {b}"
        );

        let mut opcode = if carry_out {
            match (borrow.is_some(), reverse) {
                (false, true) => Opcode::VSubrevCoU32,
                (false, false) => Opcode::VSubCoU32,
                (true, true) => Opcode::VSubbrevCoU32,
                (true, false) => Opcode::VSubbCoU32,
            }
        } else if reverse {
            Opcode::VSubrevU32
        } else {
            Opcode::VSubU32
        };
        if self.gfx_level() >= GfxLevel::Gfx10 {
            if opcode == Opcode::VSubrevCoU32 {
                opcode = Opcode::VSubrevCoU32E64;
            } else if opcode == Opcode::VSubCoU32 {
                opcode = Opcode::VSubCoU32E64;
            }
        }

        if carry_out {
            // Borrow flags keep the legacy 64-bit pair class at any
            // wavefront width.
            let carry = self.def(RegClass::S2).with_hint(VCC);
            match borrow {
                Some(borrow) => self.emit(opcode, &[dst, carry], &[a, b, borrow]),
                None => self.emit(opcode, &[dst, carry], &[a, b]),
            }
        } else {
            self.emit(opcode, &[dst], &[a, b])
        }
    }

    // ─── Scaled multiply ────────────────────────────────────────────────────

    /// Multiply a vector register by an immediate, strength-reducing to a
    /// move or shift where the value allows.
    pub fn v_mul_imm(&mut self, dst: Definition, tmp: Temp, imm: u32) -> Ret {
        self.mul_imm(dst, tmp, imm, false)
    }

    /// [`Builder::v_mul_imm`] with the 24-bit multiply permitted for the
    /// generic case.
    pub fn v_mul24_imm(&mut self, dst: Definition, tmp: Temp, imm: u32) -> Ret {
        self.mul_imm(dst, tmp, imm, true)
    }

    fn mul_imm(&mut self, dst: Definition, tmp: Temp, imm: u32, bits24: bool) -> Ret {
        assert!(tmp.bank().is_vgpr(), "v_mul_imm scales a vector register, got {tmp}");
        if imm == 0 {
            self.emit(Opcode::VMovB32, &[dst], &[Operand::zero()])
        } else if imm == 1 {
            self.copy(dst, Operand::temp(tmp))
        } else if imm.is_power_of_two() {
            self.emit(
                Opcode::VLshlrevB32,
                &[dst],
                &[Operand::c32(imm.trailing_zeros()), Operand::temp(tmp)],
            )
        } else if bits24 {
            self.emit(Opcode::VMulU32U24, &[dst], &[Operand::c32(imm), Operand::temp(tmp)])
        } else {
            let imm_def = self.def(RegClass::V1);
            let imm_tmp = self.copy(imm_def, Operand::c32(imm)).result();
            self.emit(
                Opcode::VMulLoU32,
                &[dst],
                &[Operand::temp(imm_tmp), Operand::temp(tmp)],
            )
        }
    }

    // ─── Cross-lane transfer ────────────────────────────────────────────────

    pub fn readlane(&mut self, dst: Definition, vsrc: Operand, lane: Operand) -> Ret {
        if self.gfx_level() >= GfxLevel::Gfx8 {
            self.emit(Opcode::VReadlaneB32E64, &[dst], &[vsrc, lane])
        } else {
            self.emit(Opcode::VReadlaneB32, &[dst], &[vsrc, lane])
        }
    }

    pub fn writelane(&mut self, dst: Definition, val: Operand, lane: Operand, vsrc: Operand) -> Ret {
        if self.gfx_level() >= GfxLevel::Gfx8 {
            self.emit(Opcode::VWritelaneB32E64, &[dst], &[val, lane, vsrc])
        } else {
            self.emit(Opcode::VWritelaneB32, &[dst], &[val, lane, vsrc])
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Program, SopkExt, WaveSize, EXEC};

    fn built(
        gfx: GfxLevel,
        wave: WaveSize,
        f: impl FnOnce(&mut Builder<'_>),
    ) -> Vec<Instruction> {
        let mut program = Program::new(gfx, wave);
        let block = program.create_block();
        let mut bld = Builder::append(&mut program, block);
        f(&mut bld);
        std::mem::take(&mut program[block].instructions)
    }

    fn copy_s1(gfx: GfxLevel, imm: u32) -> Instruction {
        let mut instrs = built(gfx, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::S1);
            bld.copy(dst, Operand::c32(imm));
        });
        assert_eq!(instrs.len(), 1);
        instrs.pop().unwrap()
    }

    fn sdwa_of(instr: &Instruction) -> SdwaExt {
        match instr.ext {
            InstrExt::Sdwa(s) => s,
            ref other => panic!("expected SDWA side fields, got {other:?}"),
        }
    }

    // ── Scalar constant ladder ──────────────────────────────────────

    #[test]
    fn short_immediates_take_the_16_bit_move() {
        let instr = copy_s1(GfxLevel::Gfx9, 0x7FFF);
        assert_eq!(instr.opcode, Opcode::SMovkI32);
        assert_eq!(instr.ext, InstrExt::Sopk(SopkExt { imm: 0x7FFF }));

        let instr = copy_s1(GfxLevel::Gfx9, 0xFFFF_8000);
        assert_eq!(instr.opcode, Opcode::SMovkI32);
        assert_eq!(instr.ext, InstrExt::Sopk(SopkExt { imm: 0x8000 }));

        // Just past the signed 16-bit range on either side.
        assert_ne!(copy_s1(GfxLevel::Gfx9, 0x8000).opcode, Opcode::SMovkI32);
        assert_ne!(copy_s1(GfxLevel::Gfx9, 0xFFFF_7FFF).opcode, Opcode::SMovkI32);
    }

    #[test]
    fn signed_16_bit_range_never_reverses_or_masks() {
        for imm in
            [0x41u32, 0x100, 0x1234, 0x7FFF, 0xFFFF_8000, 0xFFFF_9ABC, 0xFFFF_FFEF]
        {
            let instr = copy_s1(GfxLevel::Gfx9, imm);
            assert_eq!(instr.opcode, Opcode::SMovkI32, "{imm:#x}");
        }
        // Inline values skip the ladder entirely.
        for imm in [0u32, 1, 0x40, 0xFFFF_FFF0, u32::MAX] {
            let instr = copy_s1(GfxLevel::Gfx9, imm);
            assert_eq!(instr.opcode, Opcode::SMovB32, "{imm:#x}");
            assert!(!instr.ops[0].is_literal());
        }
    }

    #[test]
    fn reversed_bits_shortcut_thresholds() {
        // reverse(0x80000000) = 1
        let instr = copy_s1(GfxLevel::Gfx9, 0x8000_0000);
        assert_eq!(instr.opcode, Opcode::SBrevB32);
        assert_eq!(instr.ops[0].constant_value(), 1);

        // reverse(0x02000000) = 64, the upper inline edge.
        let instr = copy_s1(GfxLevel::Gfx9, 0x0200_0000);
        assert_eq!(instr.opcode, Opcode::SBrevB32);
        assert_eq!(instr.ops[0].constant_value(), 64);

        // reverse(0x82000000) = 65 misses the shortcut.
        let instr = copy_s1(GfxLevel::Gfx9, 0x8200_0000);
        assert_eq!(instr.opcode, Opcode::SMovB32);
        assert!(instr.ops[0].is_literal());

        // reverse(0x0FFFFFFF) = 0xFFFFFFF0, the lower negative edge.
        let instr = copy_s1(GfxLevel::Gfx9, 0x0FFF_FFFF);
        assert_eq!(instr.opcode, Opcode::SBrevB32);
        assert_eq!(instr.ops[0].constant_value(), 0xFFFF_FFF0);
        assert!(!instr.ops[0].is_literal());
    }

    #[test]
    fn contiguous_runs_take_the_bitfield_mask() {
        let instr = copy_s1(GfxLevel::Gfx9, 0x00FF_0000);
        assert_eq!(instr.opcode, Opcode::SBfmB32);
        assert_eq!(instr.ops[0].constant_value(), 8);
        assert_eq!(instr.ops[1].constant_value(), 16);

        // One bit just past the short-immediate range.
        let instr = copy_s1(GfxLevel::Gfx9, 0x8000);
        assert_eq!(instr.opcode, Opcode::SBfmB32);
        assert_eq!(instr.ops[0].constant_value(), 1);
        assert_eq!(instr.ops[1].constant_value(), 15);

        // A hole in the run falls through to the literal move.
        let instr = copy_s1(GfxLevel::Gfx9, 0x00FF_0100);
        assert_eq!(instr.opcode, Opcode::SMovB32);
        assert!(instr.ops[0].is_literal());
    }

    #[test]
    fn inv_2pi_binds_the_dedicated_slot() {
        let instr = copy_s1(GfxLevel::Gfx8, 0x3E22_F983);
        assert_eq!(instr.opcode, Opcode::SMovB32);
        assert_eq!(instr.ops[0].fixed(), Some(SRC_INV_2PI));
        assert_eq!(instr.ops[0].constant_value(), 0x3E22_F983);
        assert!(!instr.ops[0].is_literal());

        // Older generations spend the literal.
        let instr = copy_s1(GfxLevel::Gfx7, 0x3E22_F983);
        assert_eq!(instr.opcode, Opcode::SMovB32);
        assert_eq!(instr.ops[0].fixed(), None);
        assert!(instr.ops[0].is_literal());
    }

    // ── Generic moves ───────────────────────────────────────────────

    #[test]
    fn wide_and_vector_moves() {
        let instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let s2 = bld.def(RegClass::S2);
            bld.copy(s2, Operand::c64(0x1234_5678_9ABC_DEF0));
            let v1 = bld.def(RegClass::V1);
            bld.copy(v1, Operand::c32(0xDEAD_BEEF));
            let lv1 = bld.def(RegClass::V1.as_linear());
            bld.copy(lv1, Operand::c32(7));
            let v2 = bld.def(RegClass::V2);
            bld.copy(v2, Operand::c64(42));
        });
        assert_eq!(instrs[0].opcode, Opcode::SMovB64);
        assert_eq!(instrs[1].opcode, Opcode::VMovB32);
        assert_eq!(instrs[2].opcode, Opcode::VMovB32);
        assert_eq!(instrs[3].opcode, Opcode::PCreateVector);
    }

    #[test]
    fn copy_result_keeps_the_destination_class() {
        let mut program = Program::new(GfxLevel::Gfx9, WaveSize::W64);
        let block = program.create_block();
        let mut bld = Builder::append(&mut program, block);
        for rc in [RegClass::S1, RegClass::S2, RegClass::V1, RegClass::V2] {
            let dst = bld.def(rc);
            let ret = match rc.bytes() {
                4 => bld.copy(dst, Operand::c32(0x00FF_0000)),
                _ => bld.copy(dst, Operand::c64(0x00FF_0000_0000)),
            };
            assert_eq!(ret.result().rc(), rc);
            assert_eq!(Operand::from(ret.result()).bytes(), rc.bytes());
        }
    }

    // ── Sub-word moves ──────────────────────────────────────────────

    #[test]
    fn inline_byte_constants_move_directly() {
        let mut instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::vgpr_bytes(1));
            bld.copy(dst, Operand::c8(5));
        });
        let instr = instrs.pop().unwrap();
        assert_eq!(instr.opcode, Opcode::VMovB32);
        assert_eq!(instr.format, Format::VOP1 | Format::SDWA);
        assert_eq!(instr.ops[0].constant_value(), 5);
        let sdwa = sdwa_of(&instr);
        assert_eq!(sdwa.sel, [SubdwordSel::Dword; 2]);
        assert_eq!(sdwa.dst_sel, SubdwordSel::Ubyte0);
        assert!(sdwa.dst_preserve);

        // Negative bytes sign-extend into the inline range.
        let mut instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::vgpr_bytes(1));
            bld.copy(dst, Operand::c8(0xF4));
        });
        let instr = instrs.pop().unwrap();
        assert_eq!(instr.opcode, Opcode::VMovB32);
        assert_eq!(instr.ops[0].constant_value(), 0xFFFF_FFF4);
    }

    #[test]
    fn awkward_byte_constants_are_synthesized_by_multiply() {
        for val in [0x41u8, 0x77, 0x90, 0xEF] {
            let mut instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
                let dst = bld.def(RegClass::vgpr_bytes(1));
                bld.copy(dst, Operand::c8(val));
            });
            let instr = instrs.pop().unwrap();
            assert_eq!(instr.opcode, Opcode::VMulU32U24, "{val:#x}");
            assert_eq!(instr.format, Format::VOP2 | Format::SDWA);
            let a = instr.ops[0].constant_value() as u32;
            let b = instr.ops[1].constant_value() as u32;
            assert!(!instr.ops[0].is_literal() && !instr.ops[1].is_literal(), "{val:#x}");
            assert_eq!((a.wrapping_mul(b)) & 0xFF, val as u32, "{val:#x}");
            let sdwa = sdwa_of(&instr);
            assert_eq!(sdwa.sel, [SubdwordSel::Dword; 2]);
            assert_eq!(sdwa.dst_sel, SubdwordSel::Ubyte0);
            assert!(sdwa.dst_preserve);
        }
    }

    #[test]
    fn byte_factor_table_is_total() {
        for val in 0..=255u32 {
            let a = sign_extend_byte(BYTE_MUL_FACTORS[val as usize * 2]);
            let b = sign_extend_byte(BYTE_MUL_FACTORS[val as usize * 2 + 1]);
            assert_eq!(a.wrapping_mul(b) & 0xFF, val, "{val:#x}");
            assert!(!Operand::c32(a).is_literal(), "{val:#x}");
            assert!(!Operand::c32(b).is_literal(), "{val:#x}");
        }
    }

    #[test]
    fn half_word_inline_constants_ride_the_f16_add() {
        let mut instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::vgpr_bytes(2));
            bld.copy(dst, Operand::c16(0x3C00));
        });
        let instr = instrs.pop().unwrap();
        assert_eq!(instr.opcode, Opcode::VAddF16);
        assert_eq!(instr.format, Format::VOP2 | Format::SDWA);
        assert_eq!(instr.ops[0].constant_value(), 0x3C00);
        assert_eq!(instr.ops[1].constant_value(), 0);
        let sdwa = sdwa_of(&instr);
        assert_eq!(sdwa.sel, [SubdwordSel::Uword0, SubdwordSel::Dword]);
        assert_eq!(sdwa.dst_sel, SubdwordSel::Uword0);
        assert!(sdwa.dst_preserve);
    }

    #[test]
    fn literal_half_word_constants_build_a_vector() {
        let mut instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::vgpr_bytes(2));
            bld.copy(dst, Operand::c16(0x1234));
        });
        assert_eq!(instrs.pop().unwrap().opcode, Opcode::PCreateVector);
    }

    #[test]
    fn subdword_register_moves_gate_on_generation() {
        for (bytes, sel) in [(1u8, SubdwordSel::Ubyte0), (2, SubdwordSel::Uword0)] {
            let mut instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
                let src = bld.tmp(RegClass::vgpr_bytes(bytes));
                let dst = bld.def(RegClass::vgpr_bytes(bytes));
                bld.copy(dst, Operand::temp(src));
            });
            let instr = instrs.pop().unwrap();
            assert_eq!(instr.opcode, Opcode::VMovB32);
            assert_eq!(instr.format, Format::VOP1 | Format::SDWA);
            let sdwa = sdwa_of(&instr);
            assert_eq!(sdwa.sel[0], sel);
            assert_eq!(sdwa.sel[1], SubdwordSel::Dword);
            assert_eq!(sdwa.dst_sel, sel);
        }

        // Before sub-word selects exist, the whole register moves.
        let mut instrs = built(GfxLevel::Gfx7, WaveSize::W64, |bld| {
            let src = bld.tmp(RegClass::vgpr_bytes(2));
            let dst = bld.def(RegClass::vgpr_bytes(2));
            bld.copy(dst, Operand::temp(src));
        });
        let instr = instrs.pop().unwrap();
        assert_eq!(instr.opcode, Opcode::VMovB32);
        assert_eq!(instr.format, Format::VOP1);
    }

    #[test]
    #[should_panic(expected = "copy width mismatch")]
    fn copy_rejects_width_mismatch() {
        built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::S1);
            bld.copy(dst, Operand::c64(1));
        });
    }

    // ── Wide add ────────────────────────────────────────────────────

    #[test]
    fn vadd32_selects_by_generation_and_carry() {
        let plain = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vadd32(dst, a.into(), b.into());
        });
        assert_eq!(plain[0].opcode, Opcode::VAddU32);
        assert_eq!(plain[0].defs.len(), 1);

        let legacy = built(GfxLevel::Gfx8, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vadd32(dst, a.into(), b.into());
        });
        assert_eq!(legacy[0].opcode, Opcode::VAddCoU32);
        assert_eq!(legacy[0].defs[1].hint(), Some(VCC));
        assert_eq!(legacy[0].defs[1].rc(), RegClass::S2);

        let co = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vadd32_ext(dst, a.into(), b.into(), true, None, false);
        });
        assert_eq!(co[0].opcode, Opcode::VAddCoU32);

        let e64 = built(GfxLevel::Gfx10, WaveSize::W32, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vadd32_ext(dst, a.into(), b.into(), true, None, false);
        });
        assert_eq!(e64[0].opcode, Opcode::VAddCoU32E64);
        assert_eq!(e64[0].defs[1].rc(), RegClass::S1);
        assert_eq!(e64[0].defs[1].hint(), None);
    }

    #[test]
    fn vadd32_consumes_a_carry() {
        let instrs = built(GfxLevel::Gfx10, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            let carry = bld.tmp(RegClass::S2);
            bld.vadd32_ext(dst, a.into(), b.into(), false, Some(carry.into()), false);
        });
        assert_eq!(instrs[0].opcode, Opcode::VAddcCoU32);
        assert_eq!(instrs[0].ops.len(), 3);
        assert_eq!(instrs[0].defs[1].hint(), Some(VCC));

        // An undefined carry operand means no carry at all.
        let instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vadd32_ext(
                dst,
                a.into(),
                b.into(),
                false,
                Some(Operand::undef(RegClass::S2)),
                false,
            );
        });
        assert_eq!(instrs[0].opcode, Opcode::VAddU32);
    }

    #[test]
    fn vadd32_moves_the_vector_operand_second() {
        let instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let v = bld.tmp(RegClass::V1);
            bld.vadd32(dst, v.into(), Operand::c32(0x1000));
        });
        assert!(instrs[0].ops[0].is_constant());
        assert!(instrs[0].ops[1].is_temp());
    }

    #[test]
    #[should_panic(expected = "vector register operand")]
    fn vadd32_rejects_two_scalar_operands() {
        built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::S1);
            let b = bld.tmp(RegClass::S1);
            bld.vadd32(dst, a.into(), b.into());
        });
    }

    // ── Wide subtract ───────────────────────────────────────────────

    #[test]
    fn vsub32_selects_by_generation() {
        let plain = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vsub32(dst, a.into(), b.into());
        });
        assert_eq!(plain[0].opcode, Opcode::VSubU32);
        assert_eq!(plain[0].defs.len(), 1);

        // Older generations have no borrow-less encoding.
        let forced = built(GfxLevel::Gfx7, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vsub32(dst, a.into(), b.into());
        });
        assert_eq!(forced[0].opcode, Opcode::VSubCoU32);
        assert_eq!(forced[0].defs[1].hint(), Some(VCC));

        let e64 = built(GfxLevel::Gfx10, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vsub32_ext(dst, a.into(), b.into(), true, None);
        });
        assert_eq!(e64[0].opcode, Opcode::VSubCoU32E64);
        assert_eq!(e64[0].format, Format::VOP3);
    }

    #[test]
    fn vsub32_reverses_rather_than_swapping_roles() {
        let instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let v = bld.tmp(RegClass::V1);
            bld.vsub32(dst, v.into(), Operand::c32(10));
        });
        assert_eq!(instrs[0].opcode, Opcode::VSubrevU32);
        assert!(instrs[0].ops[0].is_constant());
        assert!(instrs[0].ops[1].is_temp());

        let e64 = built(GfxLevel::Gfx10_3, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let v = bld.tmp(RegClass::V1);
            bld.vsub32_ext(dst, v.into(), Operand::c32(10), true, None);
        });
        assert_eq!(e64[0].opcode, Opcode::VSubrevCoU32E64);
    }

    #[test]
    fn vsub32_borrow_forces_tracking_on_every_generation() {
        for gfx in [GfxLevel::Gfx6, GfxLevel::Gfx8, GfxLevel::Gfx9, GfxLevel::Gfx10] {
            let instrs = built(gfx, WaveSize::W64, |bld| {
                let dst = bld.def(RegClass::V1);
                let a = bld.tmp(RegClass::V1);
                let b = bld.tmp(RegClass::V1);
                let borrow = bld.tmp(RegClass::S2);
                bld.vsub32_ext(dst, a.into(), b.into(), false, Some(borrow.into()));
            });
            // The borrow-consuming family never takes the e64 upgrade.
            assert_eq!(instrs[0].opcode, Opcode::VSubbCoU32, "{gfx:?}");
            assert_eq!(instrs[0].ops.len(), 3, "{gfx:?}");
            assert_eq!(instrs[0].defs.len(), 2, "{gfx:?}");
            assert_eq!(instrs[0].defs[1].rc(), RegClass::S2, "{gfx:?}");
            assert_eq!(instrs[0].defs[1].hint(), Some(VCC), "{gfx:?}");
        }
    }

    #[test]
    fn vsub32_carry_keeps_the_pair_class_in_wave32() {
        let instrs = built(GfxLevel::Gfx10, WaveSize::W32, |bld| {
            let dst = bld.def(RegClass::V1);
            let a = bld.tmp(RegClass::V1);
            let b = bld.tmp(RegClass::V1);
            bld.vsub32_ext(dst, a.into(), b.into(), true, None);
        });
        assert_eq!(instrs[0].defs[1].rc(), RegClass::S2);
    }

    // ── Scaled multiply ─────────────────────────────────────────────

    #[test]
    fn mul_imm_strength_reduction() {
        let zero = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let t = bld.tmp(RegClass::V1);
            bld.v_mul_imm(dst, t, 0);
        });
        assert_eq!(zero[0].opcode, Opcode::VMovB32);
        assert_eq!(zero[0].ops[0].constant_value(), 0);

        let one = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let t = bld.tmp(RegClass::V1);
            bld.v_mul_imm(dst, t, 1);
        });
        assert_eq!(one[0].opcode, Opcode::VMovB32);
        assert!(one[0].ops[0].is_temp());

        let eight = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let t = bld.tmp(RegClass::V1);
            bld.v_mul_imm(dst, t, 8);
        });
        assert_eq!(eight[0].opcode, Opcode::VLshlrevB32);
        assert_eq!(eight[0].ops[0].constant_value(), 3);
        assert!(eight[0].ops[1].is_temp());
    }

    #[test]
    fn mul_imm_generic_paths() {
        let narrow = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let t = bld.tmp(RegClass::V1);
            bld.v_mul24_imm(dst, t, 100);
        });
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].opcode, Opcode::VMulU32U24);
        assert_eq!(narrow[0].ops[0].constant_value(), 100);

        // The wide path materializes the immediate first.
        let wide = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let t = bld.tmp(RegClass::V1);
            bld.v_mul_imm(dst, t, 0x0012_3456);
        });
        assert_eq!(wide.len(), 2);
        assert_eq!(wide[0].opcode, Opcode::VMovB32);
        assert_eq!(wide[0].ops[0].constant_value(), 0x0012_3456);
        assert_eq!(wide[1].opcode, Opcode::VMulLoU32);
        assert_eq!(wide[1].ops[0].as_temp(), wide[0].defs[0].temp());
    }

    #[test]
    #[should_panic(expected = "vector register")]
    fn mul_imm_rejects_scalar_sources() {
        built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::V1);
            let t = bld.tmp(RegClass::S1);
            bld.v_mul_imm(dst, t, 3);
        });
    }

    // ── Cross-lane ──────────────────────────────────────────────────

    #[test]
    fn lane_transfer_gates_on_generation() {
        let old = built(GfxLevel::Gfx7, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::S1);
            let v = bld.tmp(RegClass::V1);
            bld.readlane(dst, v.into(), Operand::c32(3));
            let wdst = bld.def(RegClass::V1);
            let s = bld.tmp(RegClass::S1);
            bld.writelane(wdst, s.into(), Operand::c32(3), v.into());
        });
        assert_eq!(old[0].opcode, Opcode::VReadlaneB32);
        assert_eq!(old[1].opcode, Opcode::VWritelaneB32);

        let new = built(GfxLevel::Gfx8, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::S1);
            let v = bld.tmp(RegClass::V1);
            bld.readlane(dst, v.into(), Operand::c32(3));
            let wdst = bld.def(RegClass::V1);
            let s = bld.tmp(RegClass::S1);
            bld.writelane(wdst, s.into(), Operand::c32(3), v.into());
        });
        assert_eq!(new[0].opcode, Opcode::VReadlaneB32E64);
        assert_eq!(new[0].format, Format::VOP3);
        assert_eq!(new[1].opcode, Opcode::VWritelaneB32E64);
        assert_eq!(new[1].ops.len(), 3);
    }

    // ── Uniform conversion ──────────────────────────────────────────

    #[test]
    fn as_uniform_crosses_banks_once() {
        let mut program = Program::new(GfxLevel::Gfx9, WaveSize::W64);
        let block = program.create_block();
        let mut bld = Builder::append(&mut program, block);

        let v = bld.tmp(RegClass::V2);
        let s = bld.as_uniform(Operand::temp(v));
        assert_eq!(s.rc(), RegClass::S2);

        let already = bld.tmp(RegClass::S1);
        assert_eq!(bld.as_uniform(Operand::temp(already)), already);

        let instrs = &program[block].instructions;
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].opcode, Opcode::PAsUniform);
    }

    #[test]
    fn exec_pins_survive_encode_helpers() {
        let instrs = built(GfxLevel::Gfx9, WaveSize::W64, |bld| {
            let dst = bld.def(RegClass::S2);
            let mask = bld.tmp(RegClass::S2);
            let pinned = bld.exec(mask);
            bld.copy(dst, pinned);
        });
        assert_eq!(instrs[0].opcode, Opcode::SMovB64);
        assert_eq!(instrs[0].ops[0].fixed(), Some(EXEC));
    }
}
