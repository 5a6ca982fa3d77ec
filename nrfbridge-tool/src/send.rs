use std::io::Read;
use std::time::{Duration, Instant};

use nrfbridge::protocol::{CrcXModem, Decoded, PacketDecoder};
use nrfbridge::{Framed, PacketSink};

use crate::common::{describe, is_timeout, parse_hex, SerialPortArgs};

#[derive(clap::Args, Debug)]
pub struct SendOpts {
    /// Packet to send, as hex, starting with the opcode.
    packet: String,
    #[command(flatten)]
    port: SerialPortArgs,
    /// Milliseconds to wait for replies.
    #[arg(short, long, default_value_t = 500)]
    listen: u64,
}

impl crate::ToolRun for SendOpts {
    fn run(&self) -> anyhow::Result<()> {
        let payload = parse_hex(&self.packet)?;
        anyhow::ensure!(!payload.is_empty(), "packet needs at least an opcode");

        let port = self.port.open()?;
        let mut reader = port.try_clone()?;
        let mut framed = Framed::new_std(port);
        framed.send_packet(&payload)?;
        println!(">>> {} ({} bytes)", describe(&payload), payload.len());

        let crc = CrcXModem::new();
        let mut decoder: PacketDecoder = PacketDecoder::new();
        let deadline = Instant::now() + Duration::from_millis(self.listen);
        let mut buf = [0; 256];
        while Instant::now() < deadline {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => anyhow::bail!(e),
            };

            decoder.feed(&crc, &buf[..n], |res| match res {
                Decoded::Packet(p) => {
                    println!("<<< {} ({} bytes)", describe(p), p.len());
                    crate::hexdump::hexdump(p);
                }
                Decoded::CrcErr { payload, .. } => {
                    println!("!!! crc error");
                    crate::hexdump::hexdump(payload);
                }
                Decoded::EndErr(b) => println!("!!! bad end byte {:02x}", b),
                Decoded::None => {}
            });
        }
        Ok(())
    }
}
