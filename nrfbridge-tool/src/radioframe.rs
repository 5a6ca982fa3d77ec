use nrfbridge::protocol::serialize::SerializerVec;
use nrfbridge::protocol::{
    radio_frame, serialize_packet, CommandId, CrcXModem, RADIO_MAX_FRAME_LEN,
};

use crate::common::{hex_string, parse_hex};

#[derive(clap::Args, Debug)]
pub struct RadioFrameOpts {
    /// Radio payload, as hex.
    payload: String,
    /// Also show the serial packet that asks the bridge to send it.
    #[arg(long)]
    packet: bool,
}

impl crate::ToolRun for RadioFrameOpts {
    fn run(&self) -> anyhow::Result<()> {
        let crc = CrcXModem::new();
        let payload = parse_hex(&self.payload)?;

        let mut buffer = [0; RADIO_MAX_FRAME_LEN];
        let frame = radio_frame(&crc, &payload, &mut buffer)?;
        println!("radio frame: {}", hex_string(frame));

        if self.packet {
            let mut command = vec![CommandId::ExtNrfEsbSendData.as_u8()];
            command.extend_from_slice(&payload);

            let mut ser = SerializerVec::new();
            serialize_packet(&crc, &mut ser, &command)?;
            println!("serial packet: {}", hex_string(&ser.done()));
        }
        Ok(())
    }
}
