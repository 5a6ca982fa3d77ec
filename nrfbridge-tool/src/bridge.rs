use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use nrfbridge::protocol::serialize::PacketError;
use nrfbridge::protocol::{
    CrcXModem, Decoded, PacketDecoder, RadioLinkParams, HEARTBEAT_PERIOD_MS, RADIO_MAX_FRAME_LEN,
    TICK_PERIOD_MS,
};
use nrfbridge::{FromStd, Framed, PacketSink, RadioLink, Router, SerialSink, Transport, TxPin};

use crate::common::{is_timeout, SerialPort, SerialPortArgs};
use crate::debug::{DebugArgs, PacketLog};

#[derive(clap::Args, Debug)]
pub struct BridgeOpts {
    #[command(flatten)]
    serial: SerialPortArgs,
    /// Listen here for the wireless side (a phone app, over TCP).
    #[arg(long, default_value = "localhost:8856")]
    wireless: String,
    /// UDP address the radio receives on.
    #[arg(long, default_value = "localhost:8857")]
    radio: String,
    /// UDP address radio transmissions are sent to.
    #[arg(long)]
    radio_peer: Option<SocketAddr>,
    #[command(flatten)]
    debug: DebugArgs,
}

/// The serial link. Packets sent while the transmitter is parked on
/// the alternate pin go nowhere.
struct HostSerial {
    port: Framed<FromStd<std::io::BufWriter<SerialPort>>>,
    pin: TxPin,
}

impl HostSerial {
    fn new(port: SerialPort) -> Self {
        Self {
            port: Framed::new_std(std::io::BufWriter::new(port)),
            pin: TxPin::Default,
        }
    }

    /// Write to a freshly opened port, keeping the pin selection.
    fn reconnect(&mut self, port: SerialPort) {
        self.port = Framed::new_std(std::io::BufWriter::new(port));
    }
}

impl PacketSink for HostSerial {
    type Error = PacketError<std::io::Error>;

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        if self.pin == TxPin::Alternate {
            return Ok(());
        }
        self.port.send_packet(packet)
    }
}

impl SerialSink for HostSerial {
    fn set_tx_pin(&mut self, pin: TxPin) -> Result<(), Self::Error> {
        if pin != self.pin {
            eprintln!("Serial transmit moved to {:?} pin.", pin);
        }
        self.pin = pin;
        Ok(())
    }
}

/// The most recently connected wireless client, if any.
#[derive(Default)]
struct WirelessPipe {
    conn: Option<Framed<FromStd<TcpStream>>>,
}

impl WirelessPipe {
    /// Send to `stream` from now on. The previous client is
    /// disconnected, which also ends its reader.
    fn attach(&mut self, stream: TcpStream) {
        if let Some(old) = self.conn.replace(Framed::new_std(stream)) {
            let _ = old.port().inner().shutdown(Shutdown::Both);
        }
    }
}

impl PacketSink for WirelessPipe {
    type Error = PacketError<std::io::Error>;

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        if let Some(conn) = self.conn.as_mut() {
            let res = conn.send_packet(packet);
            if res.is_err() {
                self.conn = None;
            }
            return res;
        }
        // nobody listening
        Ok(())
    }
}

/// Radio transmissions become UDP datagrams.
struct UdpRadio {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}

impl RadioLink for UdpRadio {
    type Error = std::io::Error;

    fn set_channel_address(&mut self, params: RadioLinkParams) -> Result<(), Self::Error> {
        eprintln!(
            "Radio on channel {}, address {}.",
            params.channel,
            crate::common::hex_string(&params.address)
        );
        Ok(())
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        if let Some(peer) = self.peer {
            self.socket.send_to(frame, peer)?;
        }
        Ok(())
    }
}

type HostRouter = Router<HostSerial, WirelessPipe, UdpRadio>;

struct Bridge {
    router: HostRouter,
    log: PacketLog,
    crc: CrcXModem,
    serial_decoder: Mutex<PacketDecoder>,
    wireless_decoder: Mutex<PacketDecoder>,
}

fn lock<T>(m: &Mutex<T>) -> anyhow::Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow::anyhow!("decoder lock poisoned"))
}

fn spawn<F>(name: &str, f: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let name = name.to_owned();
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            if let Err(e) = f() {
                eprintln!("{} stopped: {}", name, e);
                std::process::exit(1);
            }
        })?;
    Ok(())
}

impl Bridge {
    fn new(port: SerialPort, socket: UdpSocket, peer: Option<SocketAddr>, log: PacketLog) -> Self {
        Self {
            router: Router::new(
                HostSerial::new(port),
                WirelessPipe::default(),
                UdpRadio { socket, peer },
            ),
            log,
            crc: CrcXModem::new(),
            serial_decoder: Mutex::new(PacketDecoder::new()),
            wireless_decoder: Mutex::new(PacketDecoder::new()),
        }
    }

    /// Feed received bytes through a decoder into the router.
    fn receive(
        &self,
        source: Transport,
        decoder: &Mutex<PacketDecoder>,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let mut decoder = lock(decoder)?;
        let mut result = Ok(());
        decoder.feed(&self.crc, data, |res| match res {
            Decoded::Packet(packet) => {
                let route = self.router.route(source, packet);
                if let Err(e) = self.log.routed(source, packet, route) {
                    result = Err(e);
                }
            }
            other => self.log.rejected(source, &other),
        });
        result
    }

    fn tick_loop(&self) -> anyhow::Result<()> {
        loop {
            std::thread::sleep(Duration::from_millis(TICK_PERIOD_MS as u64));
            self.router.tick();
            lock(&self.serial_decoder)?.tick();
            lock(&self.wireless_decoder)?.tick();
        }
    }

    fn heartbeat_loop(&self) -> anyhow::Result<()> {
        loop {
            std::thread::sleep(Duration::from_millis(HEARTBEAT_PERIOD_MS as u64));
            let route = self.router.heartbeat();
            self.log.generated("heartbeat", route);
        }
    }

    fn serial_loop(&self, args: &SerialPortArgs, mut port: SerialPort) -> anyhow::Result<()> {
        let mut buf = [0; 256];
        loop {
            match port.read(&mut buf) {
                Ok(0) => {
                    eprintln!("Serial port closed.");
                    port = self.recover_serial(args)?;
                }
                Ok(n) => self.receive(Transport::Serial, &self.serial_decoder, &buf[..n])?,
                Err(e) if is_timeout(&e) => continue,
                Err(e) => {
                    eprintln!("Serial read error: {}", e);
                    port = self.recover_serial(args)?;
                }
            }
        }
    }

    /// Throw away any partial serial packet and open the port again,
    /// retrying until it comes back. Returns the new read handle.
    fn recover_serial(&self, args: &SerialPortArgs) -> anyhow::Result<SerialPort> {
        lock(&self.serial_decoder)?.reset();
        loop {
            match args.open() {
                Ok(port) => {
                    let reader = port.try_clone()?;
                    self.router.with_serial(|serial| serial.reconnect(port));
                    eprintln!("Serial port reopened.");
                    return Ok(reader);
                }
                Err(e) => {
                    eprintln!("Could not reopen serial port: {}", e);
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    fn radio_loop(&self, socket: UdpSocket) -> anyhow::Result<()> {
        // room for one more than the largest frame, so oversize shows up
        let mut buf = [0; RADIO_MAX_FRAME_LEN + 1];
        loop {
            let (n, _from) = socket.recv_from(&mut buf)?;
            let payload = &buf[..n];
            let route = self.router.route(Transport::Radio, payload);
            self.log.routed(Transport::Radio, payload, route)?;
        }
    }

    fn wireless_loop(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, addr) = listener.accept()?;
            eprintln!("Wireless connected from {}.", addr);

            let reader = stream.try_clone()?;
            self.router.lock_wireless().attach(stream);
            lock(&self.wireless_decoder)?.reset();
            let route = self
                .router
                .print(format_args!("nrfbridge-tool {}", env!("CARGO_PKG_VERSION")));
            self.log.generated("greeting", route);

            let bridge = self.clone();
            spawn("wireless reader", move || {
                bridge.wireless_client(reader);
                eprintln!("Wireless disconnected from {}.", addr);
                Ok(())
            })?;
        }
    }

    fn wireless_client(&self, mut stream: TcpStream) {
        let mut buf = [0; 256];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => return,
                Ok(n) => {
                    let res = self.receive(Transport::Wireless, &self.wireless_decoder, &buf[..n]);
                    if let Err(e) = res {
                        eprintln!("{}", e);
                        return;
                    }
                }
                Err(e) if is_timeout(&e) => continue,
                Err(_) => return,
            }
        }
    }
}

impl crate::ToolRun for BridgeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let log = self.debug.open()?;

        let port = self.serial.open()?;
        let serial_reader = port.try_clone()?;

        let listener = TcpListener::bind(&self.wireless)?;
        eprintln!("Wireless listening on {}.", self.wireless);

        let socket = UdpSocket::bind(&self.radio)?;
        eprintln!("Radio receiving on {}.", self.radio);
        let radio_reader = socket.try_clone()?;

        let bridge = Arc::new(Bridge::new(port, socket, self.radio_peer, log));

        let b = bridge.clone();
        spawn("tick", move || b.tick_loop())?;
        let b = bridge.clone();
        spawn("heartbeat", move || b.heartbeat_loop())?;
        let b = bridge.clone();
        spawn("radio", move || b.radio_loop(radio_reader))?;
        let b = bridge.clone();
        spawn("wireless", move || b.wireless_loop(listener))?;

        bridge.serial_loop(&self.serial, serial_reader)
    }
}
