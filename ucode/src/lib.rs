//! The microcode decoder: a pure function from one EEPROM lookup address
//! (opcode, microtime, condition flags) to the 32-bit control word that
//! drives the datapath for that microstep, plus the mnemonic the
//! disassembler shows for it.

use common::*;

use lazy_static::lazy_static;

lazy_static! {
    /// Every lookup address decoded once, in packed-address order.
    pub static ref UCODE: Vec<u32> = (0..EepromAddress::SPACE)
        .map(|index| control_word(EepromAddress::from_index(index as u16)).0)
        .collect();
}

/// The bytes of one EEPROM bank, in address order.
pub fn eeprom_bank(bank: usize) -> Vec<u8> {
    assert!(bank < 4);
    UCODE.iter().map(|word| (word >> (bank * 8)) as u8).collect()
}

// Microtimes 0 and 1 fetch the next instruction; these name the steps an
// opcode actually gets to use.
const STEP1: u8 = 2;
const STEP2: u8 = STEP1 + 1;
const STEP3: u8 = STEP1 + 2;
const STEP4: u8 = STEP1 + 3;
const STEP5: u8 = STEP1 + 4;
const STEP6: u8 = STEP1 + 5;

const INSTRUCTION_END: u32 = _TR;
const READ_PROGRAM_MEMORY: u32 = PGM | BW_MEM;
const SET_MAW_FROM_PC: u32 = BW_PC | _MAW;

/// Decode one lookup address.
///
/// Total over the whole address space: undefined encodings terminate with
/// `_TR` and an empty mnemonic.
pub fn control_word(address: EepromAddress) -> (u32, String) {
    // every instruction starts by fetching the next opcode into the
    // instruction register
    match address.microtime() {
        0 => return (BW_PC | _MAW, String::new()),
        1 => return (READ_PROGRAM_MEMORY | _IRW | PCC, String::new()),
        _ => {}
    }

    match address.opcode().group {
        OpcodeGroup::Mov => mov_control_word(&address),
        OpcodeGroup::Lod => lod_control_word(&address),
        OpcodeGroup::Sto => sto_control_word(&address),
        OpcodeGroup::Alu => alu_control_word(&address),
    }
}

fn immediate_mov_control_word(dest: Register, microtime: u8) -> (u32, String) {
    let desc = if dest == Register::PC {
        "jmpi Imm".to_string()
    } else {
        format!("movi {}, Imm", dest)
    };

    let word = match microtime {
        // the immediate operand sits at the next program address
        STEP1 => SET_MAW_FROM_PC,
        // a jump consumes the operand as the new PC, so only step over it
        // for a plain move
        STEP2 => {
            (if dest == Register::PC { 0 } else { PCC })
                | READ_PROGRAM_MEMORY
                | dest.read_from_bus()
                | INSTRUCTION_END
        }
        _ => INSTRUCTION_END,
    };
    (word, desc)
}

fn clear_all_control_word(microtime: u8) -> (u32, String) {
    let word = match microtime {
        // zero the accumulator; with only PC driving the bus, A AND B
        // collapses to a zero on this datapath
        STEP1 => Register::PC.write_to_bus() | ALU_A_AND_B | _ALW,
        // broadcast it to every general purpose register
        STEP2 => {
            Register::ACC.write_to_bus()
                | Register::Ra.read_from_bus()
                | Register::Rb.read_from_bus()
                | Register::Rc.read_from_bus()
                | Register::Rd.read_from_bus()
                | Register::StP.read_from_bus()
                | INSTRUCTION_END
        }
        _ => INSTRUCTION_END,
    };
    (word, "clra".to_string())
}

fn conditional_jump_control_word(address: &EepromAddress) -> (u32, String) {
    // the src field selects the flag; the bitwise complement of a selector
    // selects the negated condition. These exact codes are burned into
    // shipped programs, so they are part of the EEPROM ABI.
    const CARRY: u8 = 0b000;
    const ZERO: u8 = 0b001;
    const OFLOW: u8 = 0b010;
    const NEG: u8 = 0b100;

    const NOT_CARRY: u8 = !CARRY & 0x7;
    const NOT_ZERO: u8 = !ZERO & 0x7;
    const NOT_OFLOW: u8 = !OFLOW & 0x7;
    const NOT_NEG: u8 = !NEG & 0x7;

    let (desc, do_jump) = match address.opcode().src as u8 {
        CARRY => ("jc", address.is_carry_flag_set()),
        ZERO => ("jz", address.is_zero_flag_set()),
        OFLOW => ("jo", address.is_overflow_flag_set()),
        NEG => ("jn", address.is_negative_flag_set()),
        NOT_CARRY => ("jnc", !address.is_carry_flag_set()),
        NOT_ZERO => ("jnz", !address.is_zero_flag_set()),
        NOT_OFLOW => ("jno", !address.is_overflow_flag_set()),
        NOT_NEG => ("jnn", !address.is_negative_flag_set()),
        _ => unreachable!(),
    };

    let word = if do_jump {
        match address.microtime() {
            STEP1 => SET_MAW_FROM_PC,
            STEP2 => READ_PROGRAM_MEMORY | Register::PC.read_from_bus() | INSTRUCTION_END,
            _ => INSTRUCTION_END,
        }
    } else if address.microtime() == STEP1 {
        // step over the unused jump target
        PCC
    } else {
        INSTRUCTION_END
    };

    (word, desc.to_string())
}

fn mov_control_word(address: &EepromAddress) -> (u32, String) {
    let opcode = address.opcode();
    let dest = opcode.dest;
    let src = opcode.src;

    if dest == Register::Imm {
        conditional_jump_control_word(address)
    } else if src == Register::Imm {
        if dest == Register::ACC {
            clear_all_control_word(address.microtime())
        } else {
            immediate_mov_control_word(dest, address.microtime())
        }
    } else if dest == Register::ACC {
        if src == Register::PC {
            // set PC to zero
            let word = match address.microtime() {
                STEP1 => Register::PC.write_to_bus() | ALU_A_AND_B | _ALW,
                STEP2 => {
                    Register::ACC.write_to_bus()
                        | Register::PC.read_from_bus()
                        | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, "jmz".to_string())
        } else if src != dest {
            // run src through the ALU for the flags, with no writeback
            let word = match address.microtime() {
                STEP1 => src.write_to_bus() | ALU_A_PLUS_B | _ALW | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, format!("tst {}", src))
        } else {
            (INSTRUCTION_END, String::new())
        }
    } else if src != dest {
        let desc = if dest == Register::PC {
            format!("jmp {}", src)
        } else {
            opcode.describe()
        };
        let word = match address.microtime() {
            STEP1 => src.write_to_bus() | dest.read_from_bus() | INSTRUCTION_END,
            _ => INSTRUCTION_END,
        };
        (word, desc)
    } else if dest == Register::PC {
        (HLT, "hlt".to_string())
    } else if dest == Register::Ra {
        (INSTRUCTION_END, "nop".to_string())
    } else {
        // remaining dest == src encodings are undefined
        (INSTRUCTION_END, String::new())
    }
}

fn ret_control_word(microtime: u8) -> (u32, String) {
    let word = match microtime {
        // the accumulator survives in PC while the return address loads
        STEP1 => Register::ACC.write_to_bus() | Register::PC.read_from_bus(),
        STEP2 => Register::StP.write_to_bus() | _ALW | ALC | ALU_A_PLUS_B | _MAW,
        STEP3 => Register::StP.read_from_bus() | BW_ALU,
        // restore the accumulator
        STEP4 => Register::PC.write_to_bus() | _ALW | ALU_A_PLUS_B,
        STEP5 => Register::PC.read_from_bus() | BW_MEM | INSTRUCTION_END,
        _ => INSTRUCTION_END,
    };
    (word, "ret".to_string())
}

fn pop_control_word(dest: Register, microtime: u8, desc: String) -> (u32, String) {
    let word = match microtime {
        STEP1 => Register::StP.write_to_bus() | _ALW | ALC | ALU_A_PLUS_B | _MAW,
        STEP2 => Register::StP.read_from_bus() | BW_ALU,
        STEP3 => dest.read_from_bus() | BW_MEM | INSTRUCTION_END,
        _ => INSTRUCTION_END,
    };
    (word, desc)
}

fn lod_control_word(address: &EepromAddress) -> (u32, String) {
    let opcode = address.opcode();
    let dest = opcode.dest;
    let src = opcode.src;

    if dest == Register::StPi {
        if src < Register::StP {
            // read the cell under the stack pointer without popping
            let word = match address.microtime() {
                STEP1 => Register::StP.write_to_bus() | _MAW,
                STEP2 => src.read_from_bus() | BW_MEM | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, format!("peek {}", src))
        } else if src == Register::StP {
            // data memory byte at the immediate address to the LCD command
            // register
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | _MAW,
                STEP3 => BW_MEM | LCD_COMMAND | LCD | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, "lcc mem".to_string())
        } else if src == Register::PC {
            // shadowed by the peek arm above; kept to match the decode
            // tables shipped in programs
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | _MAW,
                STEP3 => BW_MEM | _ALW | ALU_A_PLUS_B,
                STEP4 => {
                    LCD_DATA | LCD | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, "lcd mem".to_string())
        } else if src == Register::StPi {
            // program memory byte at the immediate address to the LCD
            // command register
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | _MAW,
                STEP3 => BW_MEM | PGM | _ALW | ALU_A_PLUS_B,
                STEP4 => {
                    LCD_COMMAND | LCD | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, "lcc pgm".to_string())
        } else {
            // src == Imm: program memory byte straight to the LCD data
            // register
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | _MAW,
                STEP3 => BW_MEM | PGM | LCD_DATA | LCD | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, "lcd pgm".to_string())
        }
    } else if src == Register::StPi {
        if dest == Register::PC {
            ret_control_word(address.microtime())
        } else if dest != Register::Imm {
            pop_control_word(dest, address.microtime(), format!("pop {}", dest))
        } else {
            // immediate byte to the LCD command register
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | _ALW | ALU_A_PLUS_B,
                STEP3 => {
                    LCD_COMMAND | LCD | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, "lcc imm".to_string())
        }
    } else if src == Register::Imm {
        if dest != src {
            // load through the pointer in the immediate slot
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | _MAW,
                STEP3 => BW_MEM | dest.read_from_bus() | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, format!("{} ({} = *Imm)", opcode.describe(), dest))
        } else {
            // immediate byte to the LCD data register
            let word = match address.microtime() {
                STEP1 => _MAW | BW_PC,
                STEP2 => PCC | BW_MEM | PGM | LCD_DATA | LCD | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, "lcd imm".to_string())
        }
    } else if dest == Register::Imm {
        // clear a single register through the zeroed accumulator
        let word = match address.microtime() {
            STEP1 => Register::PC.write_to_bus() | ALU_A_AND_B | _ALW,
            STEP2 => {
                Register::ACC.write_to_bus() | src.read_from_bus() | INSTRUCTION_END
            }
            _ => INSTRUCTION_END,
        };
        (word, format!("clr {}", src))
    } else {
        // load through the address in src; Rc dereferences program memory
        let word = match address.microtime() {
            STEP1 => _MAW | src.write_to_bus(),
            STEP2 => {
                (if src == Register::Rc { PGM } else { 0 })
                    | BW_MEM
                    | dest.read_from_bus()
                    | INSTRUCTION_END
            }
            _ => INSTRUCTION_END,
        };
        let deref = if src == Register::Rc { "PGM*" } else { "*" };
        (word, format!("{} ({} = {}{})", opcode.describe(), dest, deref, src))
    }
}

fn sto_control_word(address: &EepromAddress) -> (u32, String) {
    let opcode = address.opcode();
    let dest = opcode.dest;
    let src = opcode.src;

    if dest == Register::StPi {
        if src == Register::Imm {
            // push the immediate operand
            let word = match address.microtime() {
                STEP1 => Register::StP.write_to_bus() | _ALW | ALU_A_MINUS_B,
                STEP2 => _STPW | BW_ALU,
                STEP3 => Register::PC.write_to_bus() | _MAW,
                STEP4 => PCC | PGM | BW_MEM | _ALW | ALU_A_PLUS_B,
                STEP5 => Register::StP.write_to_bus() | _MAW,
                STEP6 => _MW | Register::ACC.write_to_bus() | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, "pushi <= Imm".to_string())
        } else if src == Register::PC {
            // call through the address in Rc
            let word = match address.microtime() {
                STEP1 => Register::StP.write_to_bus() | _ALW | ALU_A_MINUS_B,
                STEP2 => _STPW | BW_ALU | _MAW,
                STEP3 => Register::PC.write_to_bus() | _MW,
                STEP4 => {
                    Register::Rc.write_to_bus()
                        | Register::PC.read_from_bus()
                        | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, "call Rc".to_string())
        } else {
            let word = match address.microtime() {
                STEP1 => Register::StP.write_to_bus() | _ALW | ALU_A_MINUS_B,
                STEP2 => _STPW | BW_ALU | _MAW,
                STEP3 => src.write_to_bus() | _MW | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, format!("push <= {}", src))
        }
    } else if dest == Register::Imm {
        if src == Register::PC {
            // call an immediate target: push PC, then fetch the target
            let word = match address.microtime() {
                STEP1 => Register::StP.write_to_bus() | _ALW | ALU_A_MINUS_B,
                STEP2 => _STPW | BW_ALU | _MAW,
                STEP3 => src.write_to_bus() | _ALW | ALU_A_PLUS_B | ALC,
                STEP4 => BW_ALU | _MW,
                STEP5 => src.write_to_bus() | _MAW,
                STEP6 => PGM | BW_MEM | src.read_from_bus() | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, "calli".to_string())
        } else if src == Register::Imm {
            // store an immediate value to an immediate program address
            let word = match address.microtime() {
                STEP1 => Register::PC.write_to_bus() | _MAW,
                STEP2 => PCC | PGM | BW_MEM | _MAW | _ALW | ALU_A_PLUS_B,
                STEP3 => Register::PC.write_to_bus() | _MAW,
                STEP4 => PCC | PGM | BW_MEM | _MAW,
                STEP5 => _MW | PGM | BW_ALU | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, "stoi (PGM*Imm2 = Imm1)".to_string())
        } else {
            // store src to an immediate address
            let word = match address.microtime() {
                STEP1 => Register::PC.write_to_bus() | _MAW,
                STEP2 => PCC | PGM | BW_MEM | _MAW,
                STEP3 => _MW | src.write_to_bus() | INSTRUCTION_END,
                _ => INSTRUCTION_END,
            };
            (word, format!("stoi {} (*Imm = {})", src, src))
        }
    } else if src == Register::StPi {
        if dest == Register::PC {
            ret_control_word(address.microtime())
        } else {
            pop_control_word(dest, address.microtime(), format!("pop => {}", dest))
        }
    } else {
        // store src through the address in dest; Rc targets program memory
        let word = match address.microtime() {
            STEP1 => dest.write_to_bus() | _MAW,
            STEP2 => {
                (if dest == Register::Rc { PGM } else { 0 })
                    | src.write_to_bus()
                    | _MW
                    | INSTRUCTION_END
            }
            _ => INSTRUCTION_END,
        };
        let deref = if dest == Register::Rc { "PGM" } else { "" };
        (word, format!("{} ({}*{} = {})", opcode.describe(), deref, dest, src))
    }
}

fn alu_control_word(address: &EepromAddress) -> (u32, String) {
    let opcode = address.alu_opcode();
    let reg = opcode.reg;
    let mode = opcode.mode();

    match mode {
        AluMode::IncA => {
            let dec = opcode.use_carry;
            let desc = format!("{} {}", if dec { "dec" } else { "inc" }, reg);
            let word = match address.microtime() {
                STEP1 => {
                    reg.write_to_bus()
                        | (if dec { ALU_A_MINUS_B } else { ALU_A_PLUS_B | ALC })
                        | _ALW
                }
                STEP2 => {
                    reg.read_from_bus() | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, desc)
        }
        AluMode::APlusB => {
            let carry_in = if opcode.use_carry && address.is_carry_flag_set() {
                ALC
            } else {
                0
            };
            let word = match address.microtime() {
                STEP1 => reg.write_to_bus() | ALB | mode.select() | _ALW | carry_in,
                STEP2 => {
                    reg.read_from_bus() | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, opcode.describe())
        }
        AluMode::AMinusB | AluMode::BMinusA => {
            // a borrow is the inverse sense of carry-in
            let carry_in = if opcode.use_carry && address.is_carry_flag_set() {
                0
            } else {
                ALC
            };
            let word = match address.microtime() {
                STEP1 => reg.write_to_bus() | ALB | mode.select() | _ALW | carry_in,
                STEP2 => {
                    reg.read_from_bus() | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, opcode.describe())
        }
        _ if opcode.use_carry => {
            // the carry bit repurposes the logical selects: the and/or
            // slots become flags-only compares on the subtract selects,
            // and the xor/not slots become the two LCD strobes
            let (mode, desc) = match mode {
                AluMode::AOrB => (AluMode::BMinusA, format!("cmp Rb, {}", reg)),
                AluMode::AAndB => (AluMode::AMinusB, format!("cmp {}, Rb", reg)),
                AluMode::AXorB => {
                    let word = match address.microtime() {
                        STEP1 => {
                            LCD_COMMAND | LCD | reg.write_to_bus() | INSTRUCTION_END
                        }
                        _ => INSTRUCTION_END,
                    };
                    return (word, format!("lcc {}", reg));
                }
                _ => {
                    let word = match address.microtime() {
                        STEP1 => LCD_DATA | LCD | reg.write_to_bus() | INSTRUCTION_END,
                        _ => INSTRUCTION_END,
                    };
                    return (word, format!("lcd {}", reg));
                }
            };
            let word = match address.microtime() {
                STEP1 => {
                    reg.write_to_bus() | ALB | ALC | mode.select() | _ALW | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, desc)
        }
        _ => {
            // and / or / xor / not writeback form; the physical ALU folds
            // the NOT_A select onto B_MINUS_A
            let select = if mode == AluMode::NotA {
                AluMode::BMinusA
            } else {
                mode
            };
            let word = match address.microtime() {
                STEP1 => reg.write_to_bus() | ALB | select.select() | _ALW,
                STEP2 => {
                    reg.read_from_bus() | Register::ACC.write_to_bus() | INSTRUCTION_END
                }
                _ => INSTRUCTION_END,
            };
            (word, opcode.describe())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(opcode: u8, flags: Flags) -> Vec<u32> {
        (0..8)
            .map(|t| control_word(EepromAddress::new(opcode, t, flags)).0)
            .collect()
    }

    fn step(opcode: u8, microtime: u8, flags: Flags) -> (u32, String) {
        control_word(EepromAddress::new(opcode, microtime, flags))
    }

    #[test]
    fn deterministic() {
        for index in 0..EepromAddress::SPACE as u16 {
            let address = EepromAddress::from_index(index);
            assert_eq!(control_word(address), control_word(address));
        }
    }

    #[test]
    fn fetch_prefix() {
        for index in 0..EepromAddress::SPACE as u16 {
            let address = EepromAddress::from_index(index);
            let (word, _) = control_word(address);
            match address.microtime() {
                0 => assert_eq!(BW_PC | _MAW, word),
                1 => assert_eq!(PGM | BW_MEM | _IRW | PCC, word),
                _ => {}
            }
        }
    }

    #[test]
    fn every_instruction_terminates() {
        for opcode in 0..=255u8 {
            for bits in 0..16u8 {
                let flags = Flags::from_bits_truncate(bits);
                let ended = (STEP1..8).any(|t| {
                    let (word, _) = step(opcode, t, flags);
                    word & (_TR | HLT) != 0
                });
                assert!(ended, "opcode {:02x} flags {:04b} never terminates", opcode, bits);
            }
        }
    }

    #[test]
    fn bus_source_is_a_single_code() {
        for index in 0..EepromAddress::SPACE as u16 {
            let (word, _) = control_word(EepromAddress::from_index(index));
            let source = (word >> BUS_WRITE_OFFSET) & BUS_FIELD_MASK;
            assert!(Register::from_code(source as u8).is_some());
        }
    }

    #[test]
    fn jmpi() {
        let opcode = 0b00_000_111;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!(BW_PC | _MAW, word);
        assert_eq!("jmpi Imm", desc);

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(PGM | BW_MEM | Register::PC.read_from_bus() | _TR, word);
        assert_eq!(0, word & PCC);
    }

    #[test]
    fn movi() {
        let opcode = 0b00_010_111;
        let (word, desc) = step(opcode, STEP2, Flags::empty());
        assert_eq!("movi Rb, Imm", desc);
        assert_eq!(
            PCC | PGM | BW_MEM | Register::Rb.read_from_bus() | _TR,
            word
        );
    }

    #[test]
    fn clra() {
        let opcode = 0b00_110_111;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("clra", desc);
        assert_eq!(Register::PC.write_to_bus() | ALU_A_AND_B | _ALW, word);

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(
            Register::ACC.write_to_bus()
                | Register::Ra.read_from_bus()
                | Register::Rb.read_from_bus()
                | Register::Rc.read_from_bus()
                | Register::Rd.read_from_bus()
                | Register::StP.read_from_bus()
                | _TR,
            word
        );
    }

    #[test]
    fn jz_taken() {
        let opcode = 0b00_111_001;
        let (word, desc) = step(opcode, STEP1, Flags::ZERO);
        assert_eq!("jz", desc);
        assert_eq!(BW_PC | _MAW, word);

        let (word, _) = step(opcode, STEP2, Flags::ZERO);
        assert_eq!(PGM | BW_MEM | Register::PC.read_from_bus() | _TR, word);
    }

    #[test]
    fn jz_not_taken() {
        let opcode = 0b00_111_001;
        let (word, _) = step(opcode, STEP1, Flags::empty());
        assert_eq!(PCC, word);

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(_TR, word);
    }

    #[test]
    fn negated_jump_selectors() {
        // complemented selector codes take the jump when the flag is clear
        let (_, desc) = step(0b00_111_111, STEP1, Flags::empty());
        assert_eq!("jnc", desc);
        assert_eq!(BW_PC | _MAW, step(0b00_111_111, STEP1, Flags::empty()).0);
        assert_eq!(PCC, step(0b00_111_111, STEP1, Flags::CARRY).0);

        let (_, desc) = step(0b00_111_011, STEP1, Flags::empty());
        assert_eq!("jnn", desc);
    }

    #[test]
    fn jmz() {
        let opcode = 0b00_110_000;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("jmz", desc);
        assert_eq!(Register::PC.write_to_bus() | ALU_A_AND_B | _ALW, word);

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(
            Register::ACC.write_to_bus() | Register::PC.read_from_bus() | _TR,
            word
        );
    }

    #[test]
    fn tst() {
        let opcode = 0b00_110_001;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("tst Ra", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | ALU_A_PLUS_B | _ALW | _TR,
            word
        );
    }

    #[test]
    fn mov_and_jmp() {
        let (word, desc) = step(0b00_010_001, STEP1, Flags::empty());
        assert_eq!("mov Rb, Ra", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | Register::Rb.read_from_bus() | _TR,
            word
        );

        let (_, desc) = step(0b00_000_001, STEP1, Flags::empty());
        assert_eq!("jmp Ra", desc);
    }

    #[test]
    fn hlt_and_nop() {
        let (word, desc) = step(0b00_000_000, STEP1, Flags::empty());
        assert_eq!("hlt", desc);
        assert_eq!(HLT, word);

        let (word, desc) = step(0b00_001_001, STEP1, Flags::empty());
        assert_eq!("nop", desc);
        assert_eq!(_TR, word);
    }

    #[test]
    fn undefined_mov_is_a_safe_end() {
        let (word, desc) = step(0b00_010_010, STEP1, Flags::empty());
        assert_eq!(_TR, word);
        assert_eq!("", desc);
    }

    #[test]
    fn peek() {
        let opcode = 0b01_110_001;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("peek Ra", desc);
        assert_eq!(Register::StP.write_to_bus() | _MAW, word);

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(Register::Ra.read_from_bus() | BW_MEM | _TR, word);
    }

    #[test]
    fn lcd_strobes_from_lod_group() {
        let (word, desc) = step(0b01_110_101, STEP3, Flags::empty());
        assert_eq!("lcc mem", desc);
        assert_eq!(BW_MEM | LCD_COMMAND | LCD | _TR, word);

        let (word, desc) = step(0b01_111_111, STEP2, Flags::empty());
        assert_eq!("lcd imm", desc);
        assert_eq!(PCC | BW_MEM | PGM | LCD_DATA | LCD | _TR, word);

        let (word, desc) = step(0b01_111_110, STEP3, Flags::empty());
        assert_eq!("lcc imm", desc);
        assert_eq!(LCD_COMMAND | LCD | Register::ACC.write_to_bus() | _TR, word);

        let (word, desc) = step(0b01_110_111, STEP3, Flags::empty());
        assert_eq!("lcd pgm", desc);
        assert_eq!(BW_MEM | PGM | LCD_DATA | LCD | _TR, word);
    }

    #[test]
    fn lod_immediate_pointer() {
        let opcode = 0b01_010_111;
        let (word, desc) = step(opcode, STEP3, Flags::empty());
        assert_eq!("lod Rb, Imm (Rb = *Imm)", desc);
        assert_eq!(BW_MEM | Register::Rb.read_from_bus() | _TR, word);
    }

    #[test]
    fn lod_register_pointer() {
        let (word, desc) = step(0b01_010_001, STEP1, Flags::empty());
        assert_eq!("lod Rb, Ra (Rb = *Ra)", desc);
        assert_eq!(_MAW | Register::Ra.write_to_bus(), word);

        // Rc dereferences program memory
        let (word, desc) = step(0b01_010_011, STEP2, Flags::empty());
        assert_eq!("lod Rb, Rc (Rb = PGM*Rc)", desc);
        assert_eq!(PGM | BW_MEM | Register::Rb.read_from_bus() | _TR, word);
    }

    #[test]
    fn clr() {
        let opcode = 0b01_111_010;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("clr Rb", desc);
        assert_eq!(Register::PC.write_to_bus() | ALU_A_AND_B | _ALW, word);

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(
            Register::ACC.write_to_bus() | Register::Rb.read_from_bus() | _TR,
            word
        );
    }

    #[test]
    fn ret_sequence() {
        for opcode in &[0b01_000_110u8, 0b10_000_110] {
            let flags = Flags::empty();
            let (word, desc) = step(*opcode, STEP1, flags);
            assert_eq!("ret", desc);
            assert_eq!(
                Register::ACC.write_to_bus() | Register::PC.read_from_bus(),
                word
            );
            assert_eq!(
                Register::StP.write_to_bus() | _ALW | ALC | ALU_A_PLUS_B | _MAW,
                step(*opcode, STEP2, flags).0
            );
            assert_eq!(
                Register::StP.read_from_bus() | BW_ALU,
                step(*opcode, STEP3, flags).0
            );
            assert_eq!(
                Register::PC.write_to_bus() | _ALW | ALU_A_PLUS_B,
                step(*opcode, STEP4, flags).0
            );
            assert_eq!(
                Register::PC.read_from_bus() | BW_MEM | _TR,
                step(*opcode, STEP5, flags).0
            );
        }
    }

    #[test]
    fn pop_sequences() {
        let (word, desc) = step(0b01_001_110, STEP1, Flags::empty());
        assert_eq!("pop Ra", desc);
        assert_eq!(
            Register::StP.write_to_bus() | _ALW | ALC | ALU_A_PLUS_B | _MAW,
            word
        );

        let (word, desc) = step(0b10_001_110, STEP3, Flags::empty());
        assert_eq!("pop => Ra", desc);
        assert_eq!(Register::Ra.read_from_bus() | BW_MEM | _TR, word);
    }

    #[test]
    fn push() {
        let opcode = 0b10_110_001;
        let flags = Flags::empty();
        let (word, desc) = step(opcode, STEP1, flags);
        assert_eq!("push <= Ra", desc);
        assert_eq!(
            Register::StP.write_to_bus() | _ALW | ALU_A_MINUS_B,
            word
        );
        assert_eq!(_STPW | BW_ALU | _MAW, step(opcode, STEP2, flags).0);
        assert_eq!(
            Register::Ra.write_to_bus() | _MW | _TR,
            step(opcode, STEP3, flags).0
        );
    }

    #[test]
    fn pushi() {
        let opcode = 0b10_110_111;
        let flags = Flags::empty();
        let (_, desc) = step(opcode, STEP1, flags);
        assert_eq!("pushi <= Imm", desc);
        assert_eq!(_STPW | BW_ALU, step(opcode, STEP2, flags).0);
        assert_eq!(
            PCC | PGM | BW_MEM | _ALW | ALU_A_PLUS_B,
            step(opcode, STEP4, flags).0
        );
        assert_eq!(
            _MW | Register::ACC.write_to_bus() | _TR,
            step(opcode, STEP6, flags).0
        );
    }

    #[test]
    fn call_and_calli() {
        let (word, desc) = step(0b10_110_000, STEP4, Flags::empty());
        assert_eq!("call Rc", desc);
        assert_eq!(
            Register::Rc.write_to_bus() | Register::PC.read_from_bus() | _TR,
            word
        );

        let opcode = 0b10_111_000;
        let (_, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("calli", desc);
        assert_eq!(
            Register::PC.write_to_bus() | _ALW | ALU_A_PLUS_B | ALC,
            step(opcode, STEP3, Flags::empty()).0
        );
        assert_eq!(
            PGM | BW_MEM | Register::PC.read_from_bus() | _TR,
            step(opcode, STEP6, Flags::empty()).0
        );
    }

    #[test]
    fn stoi() {
        let (word, desc) = step(0b10_111_001, STEP3, Flags::empty());
        assert_eq!("stoi Ra (*Imm = Ra)", desc);
        assert_eq!(_MW | Register::Ra.write_to_bus() | _TR, word);

        let (word, desc) = step(0b10_111_111, STEP5, Flags::empty());
        assert_eq!("stoi (PGM*Imm2 = Imm1)", desc);
        assert_eq!(_MW | PGM | BW_ALU | _TR, word);
    }

    #[test]
    fn sto_register_pointer() {
        let (word, desc) = step(0b10_010_001, STEP2, Flags::empty());
        assert_eq!("sto Rb, Ra (*Rb = Ra)", desc);
        assert_eq!(Register::Ra.write_to_bus() | _MW | _TR, word);

        let (word, desc) = step(0b10_011_001, STEP2, Flags::empty());
        assert_eq!("sto Rc, Ra (PGM*Rc = Ra)", desc);
        assert_eq!(PGM | Register::Ra.write_to_bus() | _MW | _TR, word);
    }

    #[test]
    fn inc() {
        let opcode = 0b11_000_010;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("inc Rb", desc);
        assert_eq!(
            Register::Rb.write_to_bus() | ALU_A_PLUS_B | ALC | _ALW,
            word
        );

        let (word, _) = step(opcode, STEP2, Flags::empty());
        assert_eq!(
            Register::Rb.read_from_bus() | Register::ACC.write_to_bus() | _TR,
            word
        );
    }

    #[test]
    fn add() {
        let opcode = 0b11_001_001;
        let (word, desc) = step(opcode, STEP1, Flags::empty());
        assert_eq!("add Ra", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | ALB | ALU_A_PLUS_B | _ALW,
            word
        );
        // the plain add ignores the live carry flag
        assert_eq!(word, step(opcode, STEP1, Flags::CARRY).0);
    }

    #[test]
    fn sub_and_rsb() {
        let (word, desc) = step(0b11_010_001, STEP1, Flags::empty());
        assert_eq!("sub Ra", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | ALB | ALU_A_MINUS_B | _ALW | ALC,
            word
        );

        let (word, desc) = step(0b11_011_001, STEP1, Flags::empty());
        assert_eq!("rsb Ra", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | ALB | ALU_B_MINUS_A | _ALW | ALC,
            word
        );
    }

    #[test]
    fn cmp_remaps_to_subtract_selects() {
        let (word, desc) = step(0b11_101_001, STEP1, Flags::empty());
        assert_eq!("cmp Rb, Ra", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | ALB | ALC | ALU_B_MINUS_A | _ALW | _TR,
            word
        );

        let (word, desc) = step(0b11_100_001, STEP1, Flags::empty());
        assert_eq!("cmp Ra, Rb", desc);
        assert_eq!(
            Register::Ra.write_to_bus() | ALB | ALC | ALU_A_MINUS_B | _ALW | _TR,
            word
        );
    }

    #[test]
    fn lcd_strobes_from_alu_group() {
        let (word, desc) = step(0b11_110_011, STEP1, Flags::empty());
        assert_eq!("lcc Rc", desc);
        assert_eq!(LCD_COMMAND | LCD | Register::Rc.write_to_bus() | _TR, word);

        let (word, desc) = step(0b11_111_100, STEP1, Flags::empty());
        assert_eq!("lcd Rd", desc);
        assert_eq!(LCD_DATA | LCD | Register::Rd.write_to_bus() | _TR, word);
    }

    #[test]
    fn flags_only_change_conditional_paths() {
        // apart from the conditional jumps and the carry-sensitive ALU
        // forms, the control words do not depend on the flags
        for opcode in 0..=255u8 {
            let group = Opcode::from_byte(opcode).group;
            if group == OpcodeGroup::Alu || Opcode::from_byte(opcode).dest == Register::Imm
            {
                continue;
            }
            let reference = words(opcode, Flags::empty());
            for bits in 1..16u8 {
                assert_eq!(reference, words(opcode, Flags::from_bits_truncate(bits)));
            }
        }
    }

    #[test]
    fn rom_table() {
        assert_eq!(EepromAddress::SPACE, UCODE.len());

        let fetch = BW_PC | _MAW;
        assert_eq!(fetch, UCODE[0]);
        assert_eq!(fetch as u8, eeprom_bank(0)[0]);
        assert_eq!((fetch >> 8) as u8, eeprom_bank(1)[0]);

        for bank in 0..4 {
            assert_eq!(EepromAddress::SPACE, eeprom_bank(bank).len());
        }
    }
}
