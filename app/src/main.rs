//! Prints the microcode listing: for every opcode, the mnemonic and the
//! control word of each microstep until the instruction terminates.

use common::*;
use ucode::control_word;

fn main() {
    let flags: Vec<Flags> = std::env::args()
        .nth(1)
        .map(|arg| {
            let bits = u8::from_str_radix(&arg, 2).unwrap_or(0);
            vec![Flags::from_bits_truncate(bits)]
        })
        .unwrap_or_else(|| vec![Flags::empty()]);

    for flags in flags {
        println!("# flags: {:?}", flags);
        for opcode in 0u8..=255 {
            let (_, desc) = control_word(EepromAddress::new(opcode, 2, flags));
            let desc = if desc.is_empty() { "(undefined)".to_string() } else { desc };
            println!("{:02x} {}", opcode, desc);

            for microtime in 0..8 {
                let address = EepromAddress::new(opcode, microtime, flags);
                let (word, _) = control_word(address);
                println!("    t{} {:08x}", microtime, word);
                if word & (_TR | HLT) != 0 {
                    break;
                }
            }
        }
    }
}
