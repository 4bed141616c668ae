//! Command and sub-command bytes understood by the controller firmware.

/// Echo a short message back to the host.
pub const ECHO: u8 = b'E';
/// Write a register or trigger an action.
pub const SET: u8 = b'S';
/// Read a register.
pub const READ: u8 = b'R';

/// Write the DAC control register (linear compensation mode).
pub const INIT: u8 = b'I';
/// Software reset to power-on defaults.
pub const RESET: u8 = b'R';
/// Software LDAC update. Defined by the firmware, not used by the host driver.
pub const UPDATE: u8 = b'U';
/// Pulse CLR, loading the CLR register into the output.
pub const CLEAR: u8 = b'X';
/// DAC output register.
pub const OUTPUT: u8 = b'O';
/// CLR register.
pub const SETCLR: u8 = b'C';
/// Synchronous update of every output register.
pub const SYNC: u8 = b'S';

/// Ends addressed command frames and every reply line.
pub const TERMINATOR: u8 = b'\n';

/// Payload following [`ECHO`], so the whole frame reads `Echo\n`.
pub const ECHO_PAYLOAD: &[u8; 4] = b"cho\n";
