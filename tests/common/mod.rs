#![allow(dead_code)]

use std::cell::RefCell;
use std::cmp::min;
use std::collections::VecDeque;
use std::io::{Error, ErrorKind};
use std::rc::Rc;

use hvdac_proto::{Config, Node};

/// Serial port stand-in replaying a fixed reply stream and recording writes.
pub struct SerialInterface {
    rx: Vec<u8>,
    rx_pos: usize,
    pub tx: Vec<u8>,
    do_read_error: bool,
    do_write_error: bool,
}

pub struct SerialIOPlane(Rc<RefCell<SerialInterface>>);

impl SerialIOPlane {
    pub fn new(serial_if: &Rc<RefCell<SerialInterface>>) -> SerialIOPlane {
        SerialIOPlane(serial_if.clone())
    }
}

impl SerialInterface {
    pub fn new(rx: &[u8]) -> Rc<RefCell<SerialInterface>> {
        Rc::new(RefCell::new(SerialInterface {
            rx: rx.to_vec(),
            tx: Vec::new(),
            rx_pos: 0,
            do_read_error: false,
            do_write_error: false,
        }))
    }

    pub fn trigger_write_error(&mut self) {
        self.do_write_error = true;
    }

    pub fn trigger_read_error(&mut self) {
        self.do_read_error = true;
    }
}

impl std::io::Read for SerialIOPlane {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.do_read_error {
            inner.do_read_error = false;
            Err(Error::new(ErrorKind::BrokenPipe, "read error"))
        } else if inner.rx_pos == inner.rx.len() {
            // a serial port with a read timeout reports an idle line like this
            Err(Error::new(ErrorKind::TimedOut, "read timed out"))
        } else {
            let old_pos = inner.rx_pos;
            inner.rx_pos = min(old_pos + buf.len(), inner.rx.len());
            let len = inner.rx_pos - old_pos;
            buf[..len].copy_from_slice(&inner.rx[old_pos..inner.rx_pos]);
            Ok(len)
        }
    }
}

impl std::io::Write for SerialIOPlane {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut inner = self.0.borrow_mut();
        if inner.do_write_error {
            inner.do_write_error = false;
            Err(Error::new(ErrorKind::BrokenPipe, "write error"))
        } else {
            inner.tx.extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Byte stream connected to an emulated controller.
pub struct NodeLink {
    pub node: Node,
    rx: VecDeque<u8>,
}

impl NodeLink {
    pub fn new(config: Config) -> NodeLink {
        NodeLink {
            node: Node::new(config),
            rx: VecDeque::new(),
        }
    }

    /// Queue bytes as if the controller sent them unprompted.
    pub fn inject(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }
}

impl std::io::Read for NodeLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.rx.is_empty() {
            return Err(Error::new(ErrorKind::TimedOut, "read timed out"));
        }
        let len = min(buf.len(), self.rx.len());
        for (dst, src) in buf.iter_mut().zip(self.rx.drain(..len)) {
            *dst = src;
        }
        Ok(len)
    }
}

impl std::io::Write for NodeLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let reply = self.node.receive_data(buf);
        self.rx.extend(reply);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
