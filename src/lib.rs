pub mod builder;
mod encode;
pub mod ir;
pub mod opcodes;
pub mod validate;

pub use builder::{ds_pattern_bitmode, Builder, Cursor, Ret, SendMsg};
pub use ir::{
    Block, BlockId, Definition, DppCtrl, DppExt, DsExt, Format, GfxLevel, InstrExt, Instruction,
    Operand, PhysReg, Program, RegBank, RegClass, SdwaExt, SmemExt, SopkExt, SoppExt,
    SubdwordSel, Temp, WaveSize, EXEC, M0, SCC, SRC_INV_2PI, VCC,
};
pub use opcodes::{OpInfo, Opcode, WaveOp};
pub use validate::{validate, ValidateError};
