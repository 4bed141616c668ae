//! Blocking driver running the protocol over a byte stream.
//!
//! ```no_run
//! use hvdac_proto::master::io::{Master, Serial};
//! use hvdac_proto::Config;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = serialport::new("/dev/ttyACM0", 9600)
//!     .timeout(std::time::Duration::from_secs(1))
//!     .open()?;
//! let mut hv = Master::new(Serial::new(port), Config::default());
//! hv.set_voltage(0, 5.0)?;
//! println!("{:?}", hv.read_all()?);
//! # Ok(()) }
//! ```

use std::io::{ErrorKind, Read, Write};

use log::{debug, trace};
use snafu::{ResultExt, Snafu};

use super::{Receiver, ReplyKind, Reply, SendData};
use crate::command::TERMINATOR;
use crate::types::{Config, Error as TypeError, IntoAddress, LinearCompensation};

/// Line replies longer than this are cut short.
pub const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Snafu)]
pub enum Error {
    /// The transport failed to read or write.
    #[snafu(display("Serial I/O error"))]
    IoError { source: std::io::Error },
    /// A command argument was rejected before anything was sent.
    #[snafu(display("Invalid argument"))]
    InvalidArgument { source: TypeError },
}

/// Byte stream the controller is attached to.
///
/// Reads return whatever arrived before the link's own timeout expired, so a
/// short or empty result is not an error.
pub trait Transport {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()>;

    /// Read up to and including a newline.
    fn read_line(&mut self) -> std::io::Result<Vec<u8>>;

    /// Read `len` bytes, or fewer on timeout.
    fn read_exact(&mut self, len: usize) -> std::io::Result<Vec<u8>>;
}

/// [`Transport`] for any `Read + Write` stream, e.g. a serial port.
///
/// Timeouts and end of stream end a read early; other I/O errors are returned.
#[derive(Debug)]
pub struct Serial<IO> {
    io: IO,
}

impl<IO: Read + Write> Serial<IO> {
    pub fn new(io: IO) -> Self {
        Self { io }
    }

    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    fn read_until(&mut self, limit: usize, stop: Option<u8>) -> std::io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(limit.min(MAX_LINE_LEN));
        let mut byte = [0; 1];
        while data.len() < limit {
            match self.io.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    data.push(byte[0]);
                    if stop == Some(byte[0]) {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    trace!("Read timed out after {} bytes", data.len());
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(data)
    }
}

impl<IO: Read + Write> Transport for Serial<IO> {
    fn write_frame(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.io.write_all(frame)?;
        self.io.flush()
    }

    fn read_line(&mut self) -> std::io::Result<Vec<u8>> {
        self.read_until(MAX_LINE_LEN, Some(TERMINATOR))
    }

    fn read_exact(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        self.read_until(len, None)
    }
}

/// Controller driver. Each call writes one frame and blocks for one reply.
pub struct Master<T> {
    proto: super::Master,
    transport: T,
}

impl<T: Transport> Master<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            proto: super::Master::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &Config {
        self.proto.config()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Set the output of one channel, or of all channels at the broadcast address.
    /// Returns the controller's acknowledgement line.
    pub fn set_voltage(&mut self, address: impl IntoAddress, volts: f64) -> Result<Vec<u8>, Error> {
        let send = self
            .proto
            .set_voltage(address, volts)
            .context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn read_voltage(&mut self, address: impl IntoAddress) -> Result<Reply, Error> {
        let send = self
            .proto
            .read_voltage(address)
            .context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn read_all(&mut self) -> Result<Reply, Error> {
        let send = self.proto.read_all();
        self.run(send)
    }

    pub fn set_sync(&mut self, voltages: &[f64]) -> Result<Vec<u8>, Error> {
        let send = self.proto.set_sync(voltages).context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn set_clear(&mut self, address: impl IntoAddress, volts: f64) -> Result<Vec<u8>, Error> {
        let send = self
            .proto
            .set_clear(address, volts)
            .context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn clear(&mut self, address: impl IntoAddress) -> Result<Vec<u8>, Error> {
        let send = self.proto.clear(address).context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn read_clear(&mut self, address: impl IntoAddress) -> Result<Reply, Error> {
        let send = self
            .proto
            .read_clear(address)
            .context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn initialize(
        &mut self,
        address: impl IntoAddress,
        mode: LinearCompensation,
    ) -> Result<Vec<u8>, Error> {
        let send = self
            .proto
            .initialize(address, mode)
            .context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn reset(&mut self, address: impl IntoAddress) -> Result<Vec<u8>, Error> {
        let send = self.proto.reset(address).context(InvalidArgumentSnafu)?;
        self.run(send)
    }

    pub fn echo(&mut self) -> Result<Vec<u8>, Error> {
        let send = self.proto.echo();
        self.run(send)
    }

    fn run<R: Receiver>(&mut self, send: SendData<R>) -> Result<R::Response, Error> {
        debug!("Sending {:02x?}", send.as_slice());
        self.transport
            .write_frame(send.as_slice())
            .context(IoSnafu)?;

        let receiver = send.data_sent();
        let data = match receiver.reply_kind() {
            ReplyKind::Line => self.transport.read_line().context(IoSnafu)?,
            ReplyKind::Exact(len) => {
                let mut data = self.transport.read_exact(len).context(IoSnafu)?;
                // A full read not ending the line is text, drain the rest of it
                if data.len() == len && data.last() != Some(&TERMINATOR) {
                    trace!("Reply isn't numeric, reading rest of line");
                    data.extend(self.transport.read_line().context(IoSnafu)?);
                }
                data
            }
        };
        debug!("Received {:02x?}", data);
        Ok(receiver.receive_data(&data))
    }
}
