//! Device emulation for the decoded side of the control word. The only
//! device modeled here is the character LCD; the register file and ALU
//! live with the emulator proper.

pub mod font;
pub mod lcd;

pub use crate::lcd::Lcd;

use common::*;

/// Feed one decoded control word's LCD signals to the device.
///
/// `bus` is whatever the rest of the datapath put on the bus during this
/// microstep. Words without the LCD strobe leave the device untouched.
pub fn drive_lcd(lcd: &mut Lcd, control_word: u32, bus: u8) {
    if control_word & LCD == 0 {
        return;
    }
    if control_word & LCD_DATA != 0 {
        lcd.write_byte(bus);
    } else if control_word & LCD_COMMAND != 0 {
        lcd.send_command(bus);
    }
}
