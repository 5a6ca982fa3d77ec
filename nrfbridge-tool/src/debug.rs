use std::sync::Mutex;

use nrfbridge::protocol::Decoded;
use nrfbridge::{FromStd, Framed, PacketSink, Route, Transport};

#[derive(clap::Args, Debug, Clone)]
pub struct DebugArgs {
    /// Log packets. Repeat for hexdumps.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub debug: u8,
    /// Append every received packet to this file, framed, for parse-dump.
    #[arg(long)]
    dump: Option<String>,
}

#[derive(Default)]
pub struct PacketLog {
    level: u8,
    dump: Option<Mutex<Framed<FromStd<std::fs::File>>>>,
}

impl DebugArgs {
    pub fn open(&self) -> anyhow::Result<PacketLog> {
        let mut dump = None;
        if let Some(ref path) = self.dump {
            let file = std::fs::File::options()
                .create(true)
                .append(true)
                .open(path)?;
            dump = Some(Mutex::new(Framed::new_std(file)));
        }

        Ok(PacketLog {
            level: self.debug,
            dump,
        })
    }
}

impl PacketLog {
    /// Record a packet that arrived on `source`, and what became of it.
    pub fn routed(&self, source: Transport, packet: &[u8], route: Route) -> anyhow::Result<()> {
        if let Some(ref dump) = self.dump {
            if !packet.is_empty() {
                dump.lock()
                    .map_err(|_| anyhow::anyhow!("dump file lock poisoned"))?
                    .send_packet(packet)?;
            }
        }

        if self.level >= 1 {
            eprintln!(
                "<<< {:?}: {} ({} bytes) => {:?}",
                source,
                crate::common::describe(packet),
                packet.len(),
                route
            );
        }
        if self.level >= 2 {
            crate::hexdump::ehexdump_prefix("<<<   ", packet);
        }
        Ok(())
    }

    /// Report a packet that the decoder threw away.
    pub fn rejected(&self, source: Transport, res: &Decoded) {
        if self.level < 1 {
            return;
        }

        match res {
            Decoded::CrcErr {
                payload,
                calculated,
                provided,
            } => {
                eprintln!(
                    "!!! {:?}: crc error, calculated {:04x}, provided {:04x}",
                    source, calculated, provided
                );
                if self.level >= 2 {
                    crate::hexdump::ehexdump_prefix("!!!   ", payload);
                }
            }
            Decoded::EndErr(b) => {
                eprintln!("!!! {:?}: bad end byte {:02x}", source, b);
            }
            Decoded::Packet(_) | Decoded::None => {}
        }
    }

    /// Report something the bridge sent on its own.
    pub fn generated(&self, what: &str, route: Route) {
        if self.level >= 3 {
            eprintln!(">>> {} => {:?}", what, route);
        }
    }
}
