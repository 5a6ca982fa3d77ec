use clap::Parser;

mod bridge;
mod common;
mod debug;
mod hexdump;
mod parsedump;
mod radioframe;
mod send;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(Parser, Debug)]
#[command(version, about = "Host tools for the nRF packet bridge.")]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Run the packet router between host transports.
    Bridge(bridge::BridgeOpts),
    /// Decode a raw byte capture into packets.
    ParseDump(parsedump::ParseDumpOpts),
    /// Send one packet and print the replies.
    Send(send::SendOpts),
    /// Show the radio framing of a payload.
    RadioFrame(radioframe::RadioFrameOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Bridge(o) => o.run(),
            ParseDump(o) => o.run(),
            Send(o) => o.run(),
            RadioFrame(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    ToolOptions::parse().command.run()
}
