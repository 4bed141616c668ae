use std::error::Error;
use std::io::{self, Read, Write};

use hvdac_proto::{Config, Node};

/// Emulated controller on stdin/stdout, e.g. behind `socat` as a fake serial port.
fn node_main_loop() -> Result<(), Box<dyn Error>> {
    let mut node = Node::new(Config::default());
    let mut stdout = io::stdout();
    let mut data_in = [0; 64];

    loop {
        let len = io::stdin().read(&mut data_in)?;
        if len == 0 {
            break;
        }
        let reply = node.receive_data(&data_in[..len]);
        if !reply.is_empty() {
            stdout.write_all(&reply)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    node_main_loop()
}
