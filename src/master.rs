//! Host side of the controller protocol.
//!
//! [`Master`] builds command frames without doing any I/O. Every operation
//! returns a [`SendData`] holding the frame; once it has been written to the
//! serial link, [`SendData::data_sent`] hands over a [`Receiver`] that says how
//! many reply bytes to read and decodes them.
//!
//! See [`io::Master`] for a driver that runs this over a byte stream.

use arrayvec::ArrayVec;
use log::warn;
use snafu::ensure;

use crate::command::*;
use crate::conversion::{DacCode, Reference, MAX_CODE};
use crate::nom_parser::master::parse_words;
use crate::types::{
    Address, Config, Error, IntoAddress, LinearCompensation, VoltageCountSnafu, MAX_CHANNELS,
};

pub mod io;

/// Longest frame: `SET SYNC <count>` followed by one word per channel.
pub const MAX_FRAME_LEN: usize = 3 + 4 * MAX_CHANNELS;

type Frame = ArrayVec<u8, MAX_FRAME_LEN>;

/// Sans-io command encoder for one controller.
#[derive(Debug, Clone, Default)]
pub struct Master {
    config: Config,
}

impl Master {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Convert `volts` and write it to the output register at `address`.
    /// # Errors
    /// Returns an error if the address is out of range, or if the voltage is
    /// below the reference range.
    pub fn set_voltage(
        &self,
        address: impl IntoAddress,
        volts: f64,
    ) -> Result<SendData<ReceiveLine>, Error> {
        let address = self.config.check_address(address)?;
        let code = self.code(volts)?;
        Ok(self.addressed(SET, OUTPUT, address, &code.to_bytes()))
    }

    /// Read the output register of one channel, or of all channels when
    /// `address` is the broadcast address.
    pub fn read_voltage(
        &self,
        address: impl IntoAddress,
    ) -> Result<SendData<ReceiveReading>, Error> {
        let address = self.config.check_address(address)?;
        Ok(self.reading(OUTPUT, address))
    }

    /// Read the output registers of all channels.
    pub fn read_all(&self) -> SendData<ReceiveReading> {
        self.reading(OUTPUT, self.config.broadcast())
    }

    /// Update every output register at once. `voltages` is ordered by channel
    /// and must hold exactly one voltage per channel.
    pub fn set_sync(&self, voltages: &[f64]) -> Result<SendData<ReceiveLine>, Error> {
        let channels = self.config.channels();
        ensure!(
            voltages.len() == channels as usize,
            VoltageCountSnafu {
                expected: channels as usize,
                got: voltages.len()
            }
        );
        let mut frame = Frame::new();
        frame.push(SET);
        frame.push(SYNC);
        frame.push(channels);
        for volts in voltages {
            frame
                .try_extend_from_slice(&self.code(*volts)?.to_bytes())
                .expect("BUG: Frame buffer too small.");
        }
        Ok(SendData::new(frame, ReceiveLine(())))
    }

    /// Write the CLR register, the value loaded into the output on [`clear`](Self::clear).
    pub fn set_clear(
        &self,
        address: impl IntoAddress,
        volts: f64,
    ) -> Result<SendData<ReceiveLine>, Error> {
        let address = self.config.check_address(address)?;
        let code = self.code(volts)?;
        Ok(self.addressed(SET, SETCLR, address, &code.to_bytes()))
    }

    /// Pulse CLR. The device reverts the output afterwards.
    pub fn clear(&self, address: impl IntoAddress) -> Result<SendData<ReceiveLine>, Error> {
        let address = self.config.check_address(address)?;
        Ok(self.addressed(SET, CLEAR, address, &[0]))
    }

    /// Read the CLR register, decoded the same way as [`read_voltage`](Self::read_voltage).
    pub fn read_clear(
        &self,
        address: impl IntoAddress,
    ) -> Result<SendData<ReceiveReading>, Error> {
        let address = self.config.check_address(address)?;
        Ok(self.reading(SETCLR, address))
    }

    /// Write the control register with a linear compensation mode.
    pub fn initialize(
        &self,
        address: impl IntoAddress,
        mode: LinearCompensation,
    ) -> Result<SendData<ReceiveLine>, Error> {
        let address = self.config.check_address(address)?;
        Ok(self.addressed(SET, INIT, address, &[u8::from(mode)]))
    }

    /// Return the addressed DAC to its power-on state.
    pub fn reset(&self, address: impl IntoAddress) -> Result<SendData<ReceiveLine>, Error> {
        let address = self.config.check_address(address)?;
        Ok(self.addressed(SET, RESET, address, &[0]))
    }

    /// Connectivity check, the reply is returned verbatim.
    pub fn echo(&self) -> SendData<ReceiveLine> {
        let mut frame = Frame::new();
        frame.push(ECHO);
        frame
            .try_extend_from_slice(ECHO_PAYLOAD)
            .expect("BUG: Frame buffer too small.");
        SendData::new(frame, ReceiveLine(()))
    }

    fn code(&self, volts: f64) -> Result<DacCode, Error> {
        DacCode::new(self.config.reference().volt_to_dac(volts))
    }

    fn addressed(
        &self,
        primary: u8,
        secondary: u8,
        address: Address,
        payload: &[u8],
    ) -> SendData<ReceiveLine> {
        let mut frame = Frame::new();
        frame.push(primary);
        frame.push(secondary);
        frame.push(*address);
        frame
            .try_extend_from_slice(payload)
            .expect("BUG: Frame buffer too small.");
        frame.push(TERMINATOR);
        SendData::new(frame, ReceiveLine(()))
    }

    fn reading(&self, register: u8, address: Address) -> SendData<ReceiveReading> {
        let mut frame = Frame::new();
        frame.push(READ);
        frame.push(register);
        frame.push(*address);
        frame.push(TERMINATOR);

        let shape = if self.config.is_channel(address) {
            Shape::Channel
        } else {
            Shape::All(self.config.channels() as usize)
        };
        SendData::new(
            frame,
            ReceiveReading {
                reference: self.config.reference(),
                shape,
            },
        )
    }
}

/// A command frame waiting to be written to the serial link.
#[derive(Debug)]
pub struct SendData<R: Receiver> {
    data: Frame,
    receiver: R,
}

impl<R: Receiver> SendData<R> {
    fn new(data: Frame, receiver: R) -> Self {
        Self { data, receiver }
    }

    /// The frame to transmit.
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Signals that the frame was transmitted, returns the reply decoder.
    pub fn data_sent(self) -> R {
        self.receiver
    }
}

/// How the reply to a command is delimited on the link.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// Read up to and including a newline.
    Line,
    /// Read exactly this many bytes. Binary words may contain a newline byte.
    Exact(usize),
}

/// Decodes the reply to a command.
pub trait Receiver {
    type Response;

    /// How many bytes to read from the link.
    fn reply_kind(&self) -> ReplyKind;

    /// Decode the reply. Never fails; malformed replies are passed through.
    fn receive_data(self, data: &[u8]) -> Self::Response;
}

/// Receiver for commands answered by a text line, returned to the caller as-is.
#[derive(Debug)]
pub struct ReceiveLine(());

impl Receiver for ReceiveLine {
    type Response = Vec<u8>;

    fn reply_kind(&self) -> ReplyKind {
        ReplyKind::Line
    }

    fn receive_data(self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Shape {
    Channel,
    All(usize),
}

/// Receiver for register reads, see [`Reply`].
#[derive(Debug)]
pub struct ReceiveReading {
    reference: Reference,
    shape: Shape,
}

impl ReceiveReading {
    fn words(&self) -> usize {
        match self.shape {
            Shape::Channel => 1,
            Shape::All(channels) => channels,
        }
    }
}

impl Receiver for ReceiveReading {
    type Response = Reply;

    fn reply_kind(&self) -> ReplyKind {
        ReplyKind::Exact(4 * self.words() + 1)
    }

    fn receive_data(self, data: &[u8]) -> Reply {
        // a register holds 20 bits, anything wider isn't a reading
        let codes = match parse_words(data, self.words()) {
            Some(codes) if codes.iter().all(|c| *c <= MAX_CODE) => codes,
            _ => {
                warn!(
                    "Unexpected reply, wanted {} words, got {} bytes: {:02x?}",
                    self.words(),
                    data.len(),
                    data
                );
                return Reply::Raw(data.to_vec());
            }
        };
        let mut volts = codes.into_iter().map(|c| self.reference.dac_to_volt(c));
        Reply::Decoded(match self.shape {
            Shape::Channel => Reading::Channel(volts.next().unwrap_or_default()),
            Shape::All(_) => Reading::All(volts.collect()),
        })
    }
}

/// Voltages read back from the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// One channel was addressed.
    Channel(f64),
    /// The broadcast address was used, one voltage per channel in channel order.
    All(Vec<f64>),
}

/// Decoded reply to a register read.
///
/// The link also carries human readable diagnostics, so a reply that doesn't
/// have the expected shape is handed back untouched rather than treated as an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Decoded(Reading),
    Raw(Vec<u8>),
}

impl Reply {
    /// The single-channel voltage, if that is what was received.
    pub fn voltage(&self) -> Option<f64> {
        match self {
            Self::Decoded(Reading::Channel(v)) => Some(*v),
            _ => None,
        }
    }

    /// The per-channel voltages, if that is what was received.
    pub fn voltages(&self) -> Option<&[f64]> {
        match self {
            Self::Decoded(Reading::All(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// The undecoded reply, if it didn't have the expected shape.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(data) => Some(data.as_slice()),
            Self::Decoded(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::MAX_CODE;

    fn master() -> Master {
        Master::new(Config::default())
    }

    #[test]
    fn test_set_voltage_frame() {
        let send = master().set_voltage(1, 10.0).unwrap();
        assert_eq!(
            send.as_slice(),
            &[SET, OUTPUT, 0x01, 0x00, 0x0f, 0x6a, 0x0b, TERMINATOR]
        );
        assert_eq!(send.data_sent().reply_kind(), ReplyKind::Line);
    }

    #[test]
    fn test_set_voltage_saturates() {
        let send = master().set_voltage(0, 50.0).unwrap();
        let code = MAX_CODE.to_be_bytes();
        assert_eq!(&send.as_slice()[3..7], &code);
    }

    #[test]
    fn test_set_voltage_errors() {
        let m = master();
        assert_eq!(m.set_voltage(4, 1.0).unwrap_err(), Error::InvalidAddress);
        assert_eq!(
            m.set_voltage(0, -1.0).unwrap_err(),
            Error::CodeOutOfRange { code: -101_018 }
        );
        // broadcast address is accepted for writes
        assert!(m.set_voltage(3, 0.0).is_ok());
    }

    #[test]
    fn test_set_sync_frame() {
        let send = master().set_sync(&[5.0, 2.0, 1.0]).unwrap();
        assert_eq!(
            send.as_slice(),
            &[
                SET, SYNC, 0x03, // header
                0x00, 0x07, 0xb5, 0x05, // 5 V
                0x00, 0x03, 0x15, 0x35, // 2 V
                0x00, 0x01, 0x8a, 0x9a, // 1 V
            ][..]
        );
    }

    #[test]
    fn test_set_sync_count() {
        assert_eq!(
            master().set_sync(&[1.0, 2.0]).unwrap_err(),
            Error::VoltageCount {
                expected: 3,
                got: 2
            }
        );
    }

    #[test]
    fn test_addressed_frames() {
        let m = master();
        assert_eq!(m.read_voltage(2).unwrap().as_slice(), b"RO\x02\n");
        assert_eq!(m.read_all().as_slice(), b"RO\x03\n");
        assert_eq!(m.set_clear(0, 0.0).unwrap().as_slice(), b"SC\x00\x00\x00\x00\x00\n");
        assert_eq!(m.clear(0).unwrap().as_slice(), b"SX\x00\x00\n");
        assert_eq!(m.read_clear(1).unwrap().as_slice(), b"RC\x01\n");
        assert_eq!(
            m.initialize(3, LinearCompensation::UpTo12V).unwrap().as_slice(),
            b"SI\x03\x01\n"
        );
        assert_eq!(m.reset(3).unwrap().as_slice(), b"SR\x03\x00\n");
        assert_eq!(m.echo().as_slice(), b"Echo\n");
    }

    #[test]
    fn test_frames_are_repeatable() {
        let m = master();
        let mut frames = Vec::new();
        for _ in 0..2 {
            frames.push(m.reset(3).unwrap().as_slice().to_vec());
            frames.push(
                m.initialize(3, LinearCompensation::UpTo12V)
                    .unwrap()
                    .as_slice()
                    .to_vec(),
            );
        }
        assert_eq!(frames[0], frames[2]);
        assert_eq!(frames[1], frames[3]);
    }

    #[test]
    fn test_reply_kind_follows_address() {
        let m = master();
        for addr in 0..3 {
            let recv = m.read_voltage(addr).unwrap().data_sent();
            assert_eq!(recv.reply_kind(), ReplyKind::Exact(5));
            let recv = m.read_clear(addr).unwrap().data_sent();
            assert_eq!(recv.reply_kind(), ReplyKind::Exact(5));
        }
        assert_eq!(m.read_all().data_sent().reply_kind(), ReplyKind::Exact(13));
        let recv = m.read_clear(3).unwrap().data_sent();
        assert_eq!(recv.reply_kind(), ReplyKind::Exact(13));
    }

    #[test]
    fn test_decode_channel() {
        let recv = master().read_voltage(1).unwrap().data_sent();
        let reply = recv.receive_data(b"\x00\x0f\x6a\x0b\n");
        let volts = reply.voltage().unwrap();
        assert!((volts - 10.0).abs() < 1e-5);
        assert_eq!(reply.raw(), None);
    }

    #[test]
    fn test_decode_all() {
        let recv = master().read_all().data_sent();
        let reply = recv.receive_data(b"\x00\x00\x00\x00\x00\x0f\xff\xff\x00\x00\x00\x00\n");
        assert_eq!(reply.voltages(), Some(&[0.0, 10.38, 0.0][..]));
    }

    #[test]
    fn test_decode_raw_fallback() {
        let m = master();
        let cases: [&[u8]; 4] = [b"", b"ERR\n", b"\x00\x0f\x6a\x0b", b"\x00\x0f\x6a\x0b\n\n"];
        for data in cases.iter() {
            let reply = m.read_voltage(0).unwrap().data_sent().receive_data(data);
            assert_eq!(reply, Reply::Raw(data.to_vec()));
        }
        // a single-channel sized reply to a broadcast read is not decoded
        let reply = m.read_all().data_sent().receive_data(b"\x00\x0f\x6a\x0b\n");
        assert_eq!(reply.raw(), Some(&b"\x00\x0f\x6a\x0b\n"[..]));
        assert_eq!(reply.voltages(), None);
    }

    #[test]
    fn test_decode_wide_word_is_raw() {
        let m = master();
        let cases: [&[u8]; 3] = [b"\xff\xff\xff\xff\n", b"\x00\x10\x00\x00\n", b"Oops\n"];
        for data in cases.iter() {
            let reply = m.read_voltage(2).unwrap().data_sent().receive_data(data);
            assert_eq!(reply, Reply::Raw(data.to_vec()));
        }
        let reply = m
            .read_all()
            .data_sent()
            .receive_data(b"\x00\x00\x00\x01\xff\xf0\x00\x00\x00\x00\x00\x02\n");
        assert!(reply.raw().is_some());
    }

    #[test]
    fn test_line_reply_verbatim() {
        let recv = master().echo().data_sent();
        assert_eq!(recv.receive_data(b"Echo\n"), b"Echo\n".to_vec());
    }

    #[test]
    fn test_single_channel_controller() {
        let config = Config::new(Reference::default(), 1).unwrap();
        let m = Master::new(config);
        let channel = m.read_voltage(0).unwrap().data_sent();
        assert_eq!(channel.reply_kind(), ReplyKind::Exact(5));
        let reply = channel.receive_data(b"\x00\x00\x00\x00\n");
        assert_eq!(reply, Reply::Decoded(Reading::Channel(0.0)));

        let all = m.read_all().data_sent().receive_data(b"\x00\x00\x00\x00\n");
        assert_eq!(all, Reply::Decoded(Reading::All(vec![0.0])));
    }
}
