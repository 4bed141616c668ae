use anyhow::{Context, Result};
use std::convert::TryFrom;
use std::io::{Read, Write};
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};

use hvdac_proto::master::io::{Master, Serial};
use hvdac_proto::{Config, LinearCompensation, Reply};

type Hv<IO> = Master<Serial<IO>>;

fn print_reply(reply: Reply) {
    match reply {
        Reply::Decoded(reading) => println!("{:?}", reading),
        Reply::Raw(data) => println!("raw: {:?}", String::from_utf8_lossy(&data)),
    }
}

fn print_line(line: Vec<u8>) {
    println!("{}", String::from_utf8_lossy(&line).trim_end());
}

fn cmd_set<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    let addr: u8 = args.parse_next()?;
    let volts: f64 = args.parse_next()?;
    print_line(hv.set_voltage(addr, volts)?);
    Ok(())
}

fn cmd_read<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    print_reply(hv.read_voltage(args.parse_next::<u8>()?)?);
    Ok(())
}

fn cmd_sync<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    let mut voltages = Vec::new();
    while args.has_next() {
        voltages.push(args.parse_next::<f64>()?);
    }
    print_line(hv.set_sync(&voltages)?);
    Ok(())
}

fn cmd_setclr<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    let addr: u8 = args.parse_next()?;
    let volts: f64 = args.parse_next()?;
    print_line(hv.set_clear(addr, volts)?);
    Ok(())
}

fn cmd_readclr<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    print_reply(hv.read_clear(args.parse_next::<u8>()?)?);
    Ok(())
}

fn cmd_clear<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    print_line(hv.clear(args.parse_next::<u8>()?)?);
    Ok(())
}

fn cmd_reset<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    print_line(hv.reset(args.parse_next::<u8>()?)?);
    Ok(())
}

fn cmd_init<IO: Read + Write>(args: &mut CmdScanner, hv: &mut Hv<IO>) -> Result<()> {
    let addr: u8 = args.parse_next()?;
    let mode = if args.has_next() {
        LinearCompensation::try_from(args.parse_next::<u8>()?)?
    } else {
        LinearCompensation::default()
    };
    print_line(hv.initialize(addr, mode)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| "/dev/ttyACM0".to_string());
    let baud = match args.next() {
        Some(baud) => baud.parse::<u32>().context("Invalid baud rate")?,
        None => 9600,
    };

    let serial = serialport::new(&port, baud)
        .timeout(std::time::Duration::from_secs(1))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;

    let mut stdout = std::io::stdout();
    let mut hv = Master::new(Serial::new(serial), Config::default());
    let mut line = String::new();
    loop {
        print!(">> ");
        stdout.flush()?;
        let mut scan = match CmdScanner::read_stdin(&mut line)? {
            Some(scan) => scan,
            None => break,
        };
        if let Err(err) = match scan.next() {
            Err(_) => continue,
            Ok("set") | Ok("s") => cmd_set(&mut scan, &mut hv),
            Ok("read") | Ok("r") => cmd_read(&mut scan, &mut hv),
            Ok("readall") => hv.read_all().map(print_reply).map_err(Into::into),
            Ok("sync") => cmd_sync(&mut scan, &mut hv),
            Ok("setclr") => cmd_setclr(&mut scan, &mut hv),
            Ok("readclr") => cmd_readclr(&mut scan, &mut hv),
            Ok("clear") => cmd_clear(&mut scan, &mut hv),
            Ok("init") => cmd_init(&mut scan, &mut hv),
            Ok("reset") => cmd_reset(&mut scan, &mut hv),
            Ok("echo") => hv.echo().map(print_line).map_err(Into::into),
            Ok("quit") | Ok("q") => break,
            Ok(cmd) => {
                println!("Unknown command {}", cmd);
                continue;
            }
        } {
            println!("{:?}", err)
        }
    }
    Ok(())
}

struct CmdScanner<'a> {
    splt: Peekable<SplitWhitespace<'a>>,
}

impl<'a> CmdScanner<'a> {
    /// `None` at end of input.
    fn read_stdin(buf: &'a mut String) -> Result<Option<Self>> {
        buf.clear();
        if std::io::stdin().read_line(buf)? == 0 {
            return Ok(None);
        }
        let splt = buf.split_whitespace().peekable();
        Ok(Some(Self { splt }))
    }
    fn next(&mut self) -> Result<&str> {
        self.splt.next().context("End of stream")
    }
    fn has_next(&mut self) -> bool {
        self.splt.peek().is_some()
    }
    fn parse_next<T: FromStr>(&mut self) -> Result<T> {
        self.next()?.parse::<T>().ok().context("Parse error")
    }
}
