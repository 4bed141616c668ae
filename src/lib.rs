//! Host driver for a serial multi-channel high-voltage DAC controller.
//!
//! The controller runs one 20-bit DAC per channel behind a small binary
//! protocol: every command is a fixed-layout frame of command bytes, a channel
//! address and big-endian 32-bit DAC codes, and register reads come back as
//! big-endian words followed by a tag byte.
//!
//! The protocol core is sans-io. [`Master`] turns voltages into command frames
//! and decodes replies back into voltages, falling back to the raw reply
//! bytes when a reply doesn't have the expected shape (the serial link also
//! carries diagnostic text). [`master::io::Master`] runs it over anything
//! implementing [`master::io::Transport`], and [`Node`] emulates the device end.
//!
//! ```
//! use hvdac_proto::{Config, Master, Reading, Receiver, Reply};
//!
//! let master = Master::new(Config::default());
//! let send = master.read_voltage(1).unwrap();
//! assert_eq!(send.as_slice(), b"RO\x01\n");
//!
//! let reply = send.data_sent().receive_data(b"\x00\x0f\xff\xff\n");
//! assert_eq!(reply, Reply::Decoded(Reading::Channel(10.38)));
//! ```

mod buffer;
pub mod command;
pub mod conversion;
pub mod master;
mod nom_parser;
pub mod node;
mod types;

pub use conversion::{DacCode, Reference, MAX_CODE, VREF_N, VREF_P};
pub use master::{Master, Reading, Receiver, Reply, ReplyKind};
pub use node::Node;
pub use types::{
    Address, Config, Error, IntoAddress, LinearCompensation, DEFAULT_CHANNELS, MAX_CHANNELS,
};
