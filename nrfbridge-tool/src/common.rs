use nom::bytes::complete::{tag_no_case, take_while, take_while_m_n};
use nom::combinator::{all_consuming, map_res, opt};
use nom::multi::many0;
use nom::sequence::{preceded, terminated};
use nom::IResult;

#[derive(clap::Args, Debug, Clone)]
pub struct SerialPortArgs {
    /// Serial device, or host:port with --tcp.
    #[arg(default_value_t = default_serial_port())]
    port: String,
    #[arg(short, long, default_value_t = nrfbridge::protocol::BAUD_RATE)]
    baud: u32,
    /// Connect to a TCP socket instead of a serial device.
    #[arg(long)]
    tcp: bool,
}

#[derive(Debug)]
pub enum SerialPort {
    Serial(Box<dyn serialport::SerialPort>),
    Tcp(std::net::TcpStream),
}

pub fn default_serial_port() -> String {
    if let Ok(infos) = serialport::available_ports() {
        for info in infos {
            #[cfg(target_os = "macos")]
            if info.port_name.ends_with(".Bluetooth-Incoming-Port") {
                continue;
            }

            #[cfg(target_os = "macos")]
            if info.port_name.starts_with("/dev/tty.") {
                // cu. ports, without the flow control
                continue;
            }

            return info.port_name.clone();
        }
    }

    "/dev/ttyUSB0".to_owned()
}

impl SerialPort {
    /// A second handle to the same port, for reading on another thread.
    pub fn try_clone(&self) -> anyhow::Result<Self> {
        Ok(match self {
            Self::Serial(port) => Self::Serial(port.try_clone()?),
            Self::Tcp(port) => Self::Tcp(port.try_clone()?),
        })
    }

    pub fn set_timeout(&mut self, timeout: std::time::Duration) -> anyhow::Result<()> {
        match self {
            Self::Serial(port) => port.set_timeout(timeout)?,
            Self::Tcp(port) => port.set_read_timeout(Some(timeout))?,
        }
        Ok(())
    }
}

impl std::io::Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.read(buf),
            Self::Tcp(port) => port.read(buf),
        }
    }
}

impl std::io::Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::Tcp(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::Tcp(port) => port.flush(),
        }
    }
}

impl SerialPortArgs {
    #[cfg(test)]
    pub fn tcp(addr: String) -> Self {
        Self {
            port: addr,
            baud: nrfbridge::protocol::BAUD_RATE,
            tcp: true,
        }
    }

    pub fn open(&self) -> anyhow::Result<SerialPort> {
        let mut port = if self.tcp {
            SerialPort::Tcp(std::net::TcpStream::connect(&self.port)?)
        } else {
            SerialPort::Serial(serialport::new(&self.port, self.baud).open()?)
        };
        port.set_timeout(std::time::Duration::from_millis(100))?;
        Ok(port)
    }
}

/// True for read errors that just mean "nothing yet".
pub fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    let digits = take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit());
    preceded(
        opt(tag_no_case("0x")),
        map_res(digits, |s| u8::from_str_radix(s, 16)),
    )(input)
}

fn separator(input: &str) -> IResult<&str, &str> {
    take_while(|c: char| c.is_whitespace() || c == ',' || c == ':')(input)
}

/// Parse bytes written as hex, like `3401ff`, `34 01 ff` or `0x34,0x01`.
pub fn parse_hex(input: &str) -> anyhow::Result<Vec<u8>> {
    let (_, bytes) = all_consuming(preceded(separator, many0(terminated(hex_byte, separator))))(
        input,
    )
    .map_err(|e| anyhow::anyhow!("could not parse hex bytes: {}", e))?;
    Ok(bytes)
}

/// Bytes as space-separated hex.
pub fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Name of the command a packet carries, or its raw opcode.
pub fn describe(packet: &[u8]) -> String {
    match packet.first() {
        None => "(empty)".to_owned(),
        Some(&op) => match nrfbridge::protocol::CommandId::from_u8(op) {
            Some(id) => id.to_string(),
            None => format!("opcode {}", op),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_forms() {
        assert_eq!(parse_hex("3401ff").unwrap(), [0x34, 0x01, 0xff]);
        assert_eq!(parse_hex(" 34 01 FF ").unwrap(), [0x34, 0x01, 0xff]);
        assert_eq!(parse_hex("0x34,0x01").unwrap(), [0x34, 0x01]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn hex_errors() {
        assert!(parse_hex("3").is_err());
        assert!(parse_hex("zz").is_err());
        assert!(parse_hex("34 0").is_err());
    }

    #[test]
    fn describe_packets() {
        assert_eq!(describe(&[]), "(empty)");
        assert_eq!(describe(&[52]), "ExtNrfPresent");
        assert_eq!(describe(&[4, 1]), "opcode 4");
        assert_eq!(hex_string(&[0x02, 0xab]), "02 ab");
    }
}
