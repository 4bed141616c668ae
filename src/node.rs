//! Emulator of the controller firmware.
//!
//! [`Node`] keeps the registers of each DAC channel, parses command frames as
//! they arrive and produces the reply bytes the firmware would send. Useful as
//! a loopback peer for [`master::io::Master`](crate::master::io::Master).
//!
//! # Example
//!
//! ```
//! use hvdac_proto::{Config, Master, Node};
//!
//! let master = Master::new(Config::default());
//! let mut node = Node::new(Config::default());
//!
//! let reply = node.receive_data(master.set_voltage(0, 5.0).unwrap().as_slice());
//! assert_eq!(reply, b"OK\n");
//! assert_eq!(node.output(0), Some(505_093));
//! ```

use core::convert::TryFrom;

use arrayvec::ArrayVec;
use log::{debug, warn};

use crate::buffer::Buffer;
use crate::command::TERMINATOR;
use crate::master::MAX_FRAME_LEN;
use crate::nom_parser::node::{parse_command, CommandToken};
use crate::types::{Config, LinearCompensation, MAX_CHANNELS};

/// Reply to an accepted write.
pub const REPLY_OK: &[u8] = b"OK\n";
/// Reply to a frame that couldn't be parsed or applied.
pub const REPLY_ERR: &[u8] = b"ERR\n";
/// Reply to an echo request.
pub const REPLY_ECHO: &[u8] = b"Echo\n";

/// Registers of one DAC channel.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
struct Channel {
    output: u32,
    clear: u32,
    mode: LinearCompensation,
}

#[derive(Debug)]
pub struct Node {
    config: Config,
    channels: ArrayVec<Channel, MAX_CHANNELS>,
    input_buffer: Buffer,
}

impl Node {
    /// Create an emulated controller in its power-on state.
    pub fn new(config: Config) -> Self {
        let channels = (0..config.channels()).map(|_| Channel::default()).collect();
        Self {
            config,
            channels,
            input_buffer: Buffer::new(),
        }
    }

    /// Feed received bytes and handle every complete command frame.
    /// Returns the concatenated replies, empty if no frame is complete yet.
    pub fn receive_data(&mut self, data: &[u8]) -> Vec<u8> {
        self.input_buffer.write(data);
        let mut reply = Vec::new();
        while !self.input_buffer.is_empty() {
            match parse_command(self.input_buffer.as_ref()) {
                (0, _) => break,
                (consumed, token) => {
                    self.input_buffer.consume(consumed);
                    self.execute(token, &mut reply);
                }
            }
        }
        // no frame is this long, drop data that never got terminated
        if self.input_buffer.len() > MAX_FRAME_LEN {
            warn!("Node dropped {} unterminated bytes", self.input_buffer.len());
            self.input_buffer.clear();
            reply.extend_from_slice(REPLY_ERR);
        }
        reply
    }

    /// Output register of `channel`.
    pub fn output(&self, channel: usize) -> Option<u32> {
        self.channels.get(channel).map(|c| c.output)
    }

    /// CLR register of `channel`.
    pub fn clear_value(&self, channel: usize) -> Option<u32> {
        self.channels.get(channel).map(|c| c.clear)
    }

    /// Linear compensation mode of `channel`.
    pub fn mode(&self, channel: usize) -> Option<LinearCompensation> {
        self.channels.get(channel).map(|c| c.mode)
    }

    fn execute(&mut self, token: CommandToken, reply: &mut Vec<u8>) {
        use CommandToken::*;
        debug!("Node received {:?}", token);
        let ok = match token {
            SetOutput(addr, code) => self.update(addr, |c| c.output = code),
            SetClear(addr, code) => self.update(addr, |c| c.clear = code),
            // CLR is pulsed, the output register is left as it was
            Clear(addr) => self.update(addr, |_| ()),
            Reset(addr) => self.update(addr, |c| *c = Channel::default()),
            Initialize(addr, mode) => match LinearCompensation::try_from(mode) {
                Ok(mode) => self.update(addr, |c| c.mode = mode),
                Err(_) => false,
            },
            SetSync(codes) => {
                if codes.len() == self.channels.len() {
                    for (channel, code) in self.channels.iter_mut().zip(codes) {
                        channel.output = code;
                    }
                    true
                } else {
                    false
                }
            }
            ReadOutput(addr) => return self.read(addr, |c| c.output, reply),
            ReadClear(addr) => return self.read(addr, |c| c.clear, reply),
            Echo => {
                reply.extend_from_slice(REPLY_ECHO);
                return;
            }
            Invalid | NeedData => false,
        };
        if ok {
            reply.extend_from_slice(REPLY_OK);
        } else {
            warn!("Node rejected command");
            reply.extend_from_slice(REPLY_ERR);
        }
    }

    /// Apply `f` to the addressed channel, or to all of them at the broadcast address.
    fn update(&mut self, addr: u8, f: impl Fn(&mut Channel)) -> bool {
        match self.config.check_address(addr) {
            Ok(addr) if self.config.is_channel(addr) => {
                f(&mut self.channels[*addr as usize]);
                true
            }
            Ok(_) => {
                self.channels.iter_mut().for_each(f);
                true
            }
            Err(_) => false,
        }
    }

    fn read(&self, addr: u8, register: impl Fn(&Channel) -> u32, reply: &mut Vec<u8>) {
        match self.config.check_address(addr) {
            Ok(addr) if self.config.is_channel(addr) => {
                let code = register(&self.channels[*addr as usize]);
                reply.extend_from_slice(&code.to_be_bytes());
            }
            Ok(_) => {
                for channel in &self.channels {
                    reply.extend_from_slice(&register(channel).to_be_bytes());
                }
            }
            Err(_) => {
                warn!("Node rejected read of address {}", addr);
                reply.extend_from_slice(REPLY_ERR);
                return;
            }
        }
        reply.push(TERMINATOR);
    }
}
