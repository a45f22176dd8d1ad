extern crate strum;
#[macro_use]
extern crate strum_macros;

extern crate packed_struct;
extern crate packed_struct_codegen;
use packed_struct::prelude::*;

#[macro_use]
extern crate bitflags;

use static_assertions::const_assert_eq;

bitflags! {
    /// ALU condition flags, in the order they appear on the EEPROM's
    /// high-order address pins.
    pub struct Flags: u8 {
        const CARRY = 0b0001;
        const ZERO = 0b0010;
        const OVERFLOW = 0b0100;
        const NEGATIVE = 0b1000;
    }
}

// Control word layout. The 32 bits are split over four 8-bit EEPROM banks
// (bank n holds bits 8n..=8n+7); every signal lives at a fixed position
// because the generated images are burned into hardware.
//
//   0..=2   bus write select: 3-bit code of whatever drives the bus
//   3..=5   bus read select: 3-bit code of whatever latches from the bus
//   6       _MAW    latch bus into the memory address register
//   7       _MW     write bus to memory
//   8       _IRW    latch bus into the instruction register
//   9       _STPW   latch bus into the stack pointer
//   10      _ALW    latch the ALU output (accumulator)
//   11      PCC     increment the program counter
//   12      PGM     address program memory instead of data memory
//   13      ALC     ALU carry in
//   14      ALB     ALU "A op B" form select
//   15..=17 ALU mode select (AluMode << ALU_OFFSET)
//   18      LCD     LCD enable strobe
//   19..=20 LCD register select (command / data)
//   21      HLT     stop the clock
//   22      _TR     reset the microtime counter, ending the instruction
//   23..=31 unused, always zero

pub const BUS_WRITE_OFFSET: u32 = 0;
pub const BUS_READ_OFFSET: u32 = 3;
pub const BUS_FIELD_MASK: u32 = 0b111;

pub const _MAW: u32 = 1 << 6;
pub const _MW: u32 = 1 << 7;
pub const _IRW: u32 = 1 << 8;
pub const _STPW: u32 = 1 << 9;
pub const _ALW: u32 = 1 << 10;
pub const PCC: u32 = 1 << 11;
pub const PGM: u32 = 1 << 12;
pub const ALC: u32 = 1 << 13;
pub const ALB: u32 = 1 << 14;
pub const ALU_OFFSET: u32 = 15;
pub const LCD: u32 = 1 << 18;
pub const LCD_COMMAND: u32 = 1 << 19;
pub const LCD_DATA: u32 = 1 << 20;
pub const HLT: u32 = 1 << 21;
pub const _TR: u32 = 1 << 22;

// The three 3-bit fields and the strobe bits must not overlap.
const_assert_eq!(0, (BUS_FIELD_MASK << ALU_OFFSET) & (ALB | LCD));
const_assert_eq!(0, (BUS_FIELD_MASK << BUS_READ_OFFSET) & _MAW);
const_assert_eq!(
    0,
    (_MAW | _MW | _IRW | _STPW | _ALW | PCC | PGM | ALC | ALB | LCD | LCD_COMMAND | LCD_DATA | HLT | _TR)
        & ((BUS_FIELD_MASK << BUS_WRITE_OFFSET)
            | (BUS_FIELD_MASK << BUS_READ_OFFSET)
            | (BUS_FIELD_MASK << ALU_OFFSET))
);

/// Architectural registers by their 3-bit code.
///
/// Codes 6 and 7 are multiplexed: `StPi` doubles as the accumulator (the
/// ALU latch drives the bus when code 6 is the write select) and as the
/// stack-indirect sentinel in the LOD/STO groups, while `Imm` doubles as
/// the memory data path on the bus-write side.
#[derive(Clone, Copy, Display, Debug, PartialEq, PartialOrd)]
#[derive(EnumCount, EnumIter, EnumString)]
#[derive(PrimitiveEnum_u8)]
pub enum Register {
    PC = 0,
    Ra = 1,
    Rb = 2,
    Rc = 3,
    Rd = 4,
    StP = 5,
    StPi = 6,
    Imm = 7,
}

impl Register {
    /// The accumulator shares the StPi code point.
    pub const ACC: Register = Register::StPi;

    pub fn from_code(code: u8) -> Option<Register> {
        Register::from_primitive(code)
    }

    pub const fn write_to_bus(self) -> u32 {
        (self as u32) << BUS_WRITE_OFFSET
    }

    pub const fn read_from_bus(self) -> u32 {
        (self as u32) << BUS_READ_OFFSET
    }
}

/// Bus-write select values of the non-register bus drivers.
pub const BW_PC: u32 = Register::PC.write_to_bus();
pub const BW_ALU: u32 = Register::ACC.write_to_bus();
pub const BW_MEM: u32 = Register::Imm.write_to_bus();

#[derive(Clone, Copy, Display, Debug, PartialEq)]
#[derive(EnumCount, EnumIter, EnumString)]
#[derive(PrimitiveEnum_u8)]
#[strum(serialize_all = "lowercase")]
pub enum OpcodeGroup {
    Mov = 0,
    Lod = 1,
    Sto = 2,
    Alu = 3,
}

/// The eight ALU mode selects. The low two bits come straight from the
/// opcode's mode field; the high bit is the opcode's carry bit.
#[derive(Clone, Copy, Display, Debug, PartialEq)]
#[derive(EnumCount, EnumIter, EnumString)]
#[derive(PrimitiveEnum_u8)]
pub enum AluMode {
    IncA = 0,
    APlusB = 1,
    AMinusB = 2,
    BMinusA = 3,
    AAndB = 4,
    AOrB = 5,
    AXorB = 6,
    NotA = 7,
}

impl AluMode {
    /// This mode's contribution to the control word.
    pub const fn select(self) -> u32 {
        (self as u32) << ALU_OFFSET
    }
}

pub const ALU_INC_A: u32 = AluMode::IncA.select();
pub const ALU_A_PLUS_B: u32 = AluMode::APlusB.select();
pub const ALU_A_MINUS_B: u32 = AluMode::AMinusB.select();
pub const ALU_B_MINUS_A: u32 = AluMode::BMinusA.select();
pub const ALU_A_AND_B: u32 = AluMode::AAndB.select();
pub const ALU_A_OR_B: u32 = AluMode::AOrB.select();
pub const ALU_A_XOR_B: u32 = AluMode::AXorB.select();
pub const ALU_NOT_A: u32 = AluMode::NotA.select();

/// The 8-bit instruction word: `[group:2][dest:3][src:3]`.
#[derive(Clone, Copy, Debug, PackedStruct)]
#[packed_struct(size_bytes = "1", endian = "lsb", bit_numbering = "lsb0")]
pub struct Opcode {
    #[packed_field(bits = "0..=2", ty = "enum")]
    pub src: Register,
    #[packed_field(bits = "3..=5", ty = "enum")]
    pub dest: Register,
    #[packed_field(bits = "6..=7", ty = "enum")]
    pub group: OpcodeGroup,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Opcode {
        Opcode::unpack(&[byte]).unwrap()
    }

    pub fn to_byte(&self) -> u8 {
        self.pack().unwrap()[0]
    }

    pub fn describe(&self) -> String {
        format!("{} {}, {}", self.group, self.dest, self.src)
    }
}

/// The ALU-group view of the same byte: `[group:2][useCarry:1][mode:2][reg:3]`.
#[derive(Clone, Copy, Debug, PackedStruct)]
#[packed_struct(size_bytes = "1", endian = "lsb", bit_numbering = "lsb0")]
pub struct AluOpcode {
    #[packed_field(bits = "0..=2", ty = "enum")]
    pub reg: Register,
    #[packed_field(bits = "3..=4")]
    pub mode_bits: Integer<u8, packed_bits::Bits<2>>,
    #[packed_field(bits = "5")]
    pub use_carry: bool,
    #[packed_field(bits = "6..=7", ty = "enum")]
    pub group: OpcodeGroup,
}

impl AluOpcode {
    pub fn from_byte(byte: u8) -> AluOpcode {
        AluOpcode::unpack(&[byte]).unwrap()
    }

    /// The effective mode: the carry bit extends the 2-bit field into the
    /// 8-entry mode table.
    pub fn mode(&self) -> AluMode {
        let bits = ((self.use_carry as u8) << 2) | *self.mode_bits;
        AluMode::from_primitive(bits).unwrap()
    }

    pub fn describe(&self) -> String {
        let name = match self.mode() {
            AluMode::IncA => "inc",
            AluMode::APlusB => "add",
            AluMode::AMinusB => "sub",
            AluMode::BMinusA => "rsb",
            AluMode::AAndB => "and",
            AluMode::AOrB => "or",
            AluMode::AXorB => "xor",
            AluMode::NotA => "not",
        };
        format!("{} {}", name, self.reg)
    }
}

/// One decoder lookup address: opcode, microtime and the live condition
/// flags, packed the way the EEPROM address pins are wired.
#[derive(Clone, Copy, Debug, PackedStruct)]
#[packed_struct(size_bytes = "2", endian = "lsb", bit_numbering = "lsb0")]
pub struct EepromAddress {
    #[packed_field(bits = "0..=7")]
    pub opcode: u8,
    #[packed_field(bits = "8..=10")]
    pub microtime: Integer<u8, packed_bits::Bits<3>>,
    #[packed_field(bits = "11..=14")]
    pub flags: Integer<u8, packed_bits::Bits<4>>,
}

impl EepromAddress {
    /// Number of distinct lookup addresses.
    pub const SPACE: usize = 1 << 15;

    pub fn new(opcode: u8, microtime: u8, flags: Flags) -> EepromAddress {
        EepromAddress {
            opcode,
            microtime: microtime.into(),
            flags: flags.bits().into(),
        }
    }

    pub fn pack_lsb(&self) -> [u8; 2] {
        let bytes = self.pack().unwrap();
        [bytes[1], bytes[0]]
    }

    pub fn unpack_lsb(bytes: &[u8; 2]) -> EepromAddress {
        let bytes = [bytes[1], bytes[0]];
        EepromAddress::unpack(&bytes).unwrap()
    }

    pub fn to_index(&self) -> u16 {
        u16::from_le_bytes(self.pack_lsb())
    }

    pub fn from_index(index: u16) -> EepromAddress {
        EepromAddress::unpack_lsb(&index.to_le_bytes())
    }

    pub fn opcode(&self) -> Opcode {
        Opcode::from_byte(self.opcode)
    }

    pub fn alu_opcode(&self) -> AluOpcode {
        AluOpcode::from_byte(self.opcode)
    }

    pub fn microtime(&self) -> u8 {
        *self.microtime
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(*self.flags)
    }

    pub fn is_carry_flag_set(&self) -> bool {
        self.flags().contains(Flags::CARRY)
    }

    pub fn is_zero_flag_set(&self) -> bool {
        self.flags().contains(Flags::ZERO)
    }

    pub fn is_overflow_flag_set(&self) -> bool {
        self.flags().contains(Flags::OVERFLOW)
    }

    pub fn is_negative_flag_set(&self) -> bool {
        self.flags().contains(Flags::NEGATIVE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn pack() {
        let address = EepromAddress::new(0xCC, 0x5, Flags::CARRY | Flags::NEGATIVE);

        assert_eq!(0x4DCC, address.to_index());

        let address = EepromAddress::from_index(0x4DCC);
        assert_eq!(0xCC, address.opcode);
        assert_eq!(5, address.microtime());
        assert_eq!(Flags::CARRY | Flags::NEGATIVE, address.flags());
    }

    #[test]
    fn index_roundtrip() {
        for index in 0..EepromAddress::SPACE as u16 {
            assert_eq!(index, EepromAddress::from_index(index).to_index());
        }
    }

    #[test]
    fn opcode_fields() {
        let opcode = Opcode::from_byte(0b10_110_001);
        assert_eq!(OpcodeGroup::Sto, opcode.group);
        assert_eq!(Register::StPi, opcode.dest);
        assert_eq!(Register::Ra, opcode.src);
        assert_eq!(0b10_110_001, opcode.to_byte());
    }

    #[test]
    fn alu_opcode_fields() {
        let opcode = AluOpcode::from_byte(0b11_1_10_011);
        assert_eq!(OpcodeGroup::Alu, opcode.group);
        assert!(opcode.use_carry);
        assert_eq!(0b10, *opcode.mode_bits);
        assert_eq!(Register::Rc, opcode.reg);
        assert_eq!(AluMode::AXorB, opcode.mode());
    }

    #[test]
    fn alu_mode_table() {
        // the carry bit is the high bit of the effective mode
        for bits in 0..=0b111111u8 {
            let opcode = AluOpcode::from_byte(0b11_000000 | bits);
            let expected = ((opcode.use_carry as u8) << 2) | *opcode.mode_bits;
            assert_eq!(expected, opcode.mode() as u8);
        }
    }

    #[test]
    fn register_masks() {
        assert_eq!(0b000, Register::PC.write_to_bus());
        assert_eq!(0b001, Register::Ra.write_to_bus());
        assert_eq!(0b101, Register::StP.write_to_bus());
        assert_eq!(0b001_000, Register::Ra.read_from_bus());
        assert_eq!(0b111_000, Register::Imm.read_from_bus());

        assert_eq!(BW_ALU, Register::ACC.write_to_bus());
        assert_eq!(BW_MEM, Register::Imm.write_to_bus());
    }

    #[test]
    fn register_codes_are_total() {
        for code in 0..8u8 {
            let register = Register::from_code(code).unwrap();
            assert_eq!(code, register as u8);
        }
        assert_eq!(8, Register::iter().count());
    }
}
