use nrfbridge::protocol::{CrcStyle, CrcXModem, Decoded, PacketDecoder};

use crate::common::describe;

#[derive(clap::Args, Debug)]
pub struct ParseDumpOpts {
    /// Raw bytes, as captured from a serial line or written by `bridge --dump`.
    dump: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Summary {
    packets: usize,
    errors: usize,
    partial: bool,
}

fn scan<C, F>(crc: &C, data: &[u8], mut f: F) -> Summary
where
    C: CrcStyle,
    F: FnMut(Decoded<'_>),
{
    let mut summary = Summary::default();
    let mut decoder: PacketDecoder = PacketDecoder::new();
    decoder.feed(crc, data, |res| {
        if matches!(res, Decoded::Packet(_)) {
            summary.packets += 1;
        } else {
            summary.errors += 1;
        }
        f(res);
    });
    summary.partial = !decoder.is_idle();
    summary
}

impl crate::ToolRun for ParseDumpOpts {
    fn run(&self) -> anyhow::Result<()> {
        let rawdata = std::fs::read(&self.dump)?;

        let summary = scan(&CrcXModem::new(), &rawdata, |res| {
            match res {
                Decoded::Packet(p) => {
                    println!("{}, {} bytes", describe(p), p.len());
                    crate::hexdump::hexdump(p);
                }
                Decoded::CrcErr {
                    payload,
                    calculated,
                    provided,
                } => {
                    println!(
                        "CRC error: calculated {:04x}, provided {:04x}",
                        calculated, provided
                    );
                    crate::hexdump::hexdump(payload);
                }
                Decoded::EndErr(b) => println!("Bad end byte: {:02x}", b),
                Decoded::None => return,
            }
            println!();
        });

        println!("{} packets, {} errors.", summary.packets, summary.errors);
        if summary.partial {
            println!("Capture ends inside a packet.");
        }
        Ok(())
    }
}
