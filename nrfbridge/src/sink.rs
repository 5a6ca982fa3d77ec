//! Interfaces the router uses to reach the three transports.

use crate::protocol::crc::{CrcStyle, CrcXModem};
use crate::protocol::serialize::{serialize_packet, PacketError, SerializerWrap};
use crate::protocol::RadioLinkParams;

/// Re-export to allow using [Framed] with [std::io] streams.
#[cfg(feature = "std")]
pub use embedded_io_adapters::std::FromStd;

/// Something that accepts whole packets and puts them on a transport.
///
/// Implementations do their own framing (see [Framed]) and may block
/// or retry internally; the router never looks at the result beyond
/// logging it.
pub trait PacketSink {
    type Error: core::fmt::Debug;

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), Self::Error>;
}

impl<T> PacketSink for &mut T
where
    T: PacketSink,
{
    type Error = T::Error;

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        (**self).send_packet(packet)
    }
}

/// Which pin the serial transmitter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxPin {
    /// The usual transmit pin, wired to the motor controller.
    Default,
    /// The parking pin, used while the bridge is disabled.
    Alternate,
}

impl TxPin {
    pub const fn for_enabled(enabled: bool) -> Self {
        if enabled {
            TxPin::Default
        } else {
            TxPin::Alternate
        }
    }
}

/// The wired serial transport. Besides packets, it can move its
/// transmit output between two pins.
pub trait SerialSink: PacketSink {
    /// Reconfigure the transmitter onto `pin`, releasing the other.
    fn set_tx_pin(&mut self, pin: TxPin) -> Result<(), Self::Error>;
}

impl<T> SerialSink for &mut T
where
    T: SerialSink,
{
    fn set_tx_pin(&mut self, pin: TxPin) -> Result<(), Self::Error> {
        (**self).set_tx_pin(pin)
    }
}

/// The short-range packet radio.
pub trait RadioLink {
    type Error: core::fmt::Debug;

    /// Configure channel and address.
    fn set_channel_address(&mut self, params: RadioLinkParams) -> Result<(), Self::Error>;

    /// Queue one already-framed transmission.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error>;
}

impl<T> RadioLink for &mut T
where
    T: RadioLink,
{
    type Error = T::Error;

    fn set_channel_address(&mut self, params: RadioLinkParams) -> Result<(), Self::Error> {
        (**self).set_channel_address(params)
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        (**self).transmit(frame)
    }
}

/// A [PacketSink] that frames packets onto an [embedded_io::Write].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Framed<W, C = CrcXModem> {
    port: W,
    crc: C,
}

impl<W> Framed<W> {
    /// Frame packets with the standard CRC.
    pub const fn new(port: W) -> Self {
        Self::new_crc(CrcXModem::new(), port)
    }
}

#[cfg(feature = "std")]
impl<W> Framed<FromStd<W>> {
    /// Frame packets onto an [std::io] stream.
    pub fn new_std(port: W) -> Self {
        Self::new(FromStd::new(port))
    }
}

impl<W, C> Framed<W, C> {
    /// Frame packets with the provided [CrcStyle].
    pub const fn new_crc(crc: C, port: W) -> Self {
        Self { port, crc }
    }

    /// Release the components used to create this sink.
    pub fn free(self) -> (W, C) {
        (self.port, self.crc)
    }

    /// Get the underlying port.
    pub fn port(&self) -> &W {
        &self.port
    }

    /// Get the underlying port, mutably.
    pub fn port_mut(&mut self) -> &mut W {
        &mut self.port
    }
}

impl<W, C> PacketSink for Framed<W, C>
where
    W: embedded_io::Write,
    C: CrcStyle,
{
    type Error = PacketError<W::Error>;

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        let mut ser = SerializerWrap::new(&mut self.port);
        serialize_packet(&self.crc, &mut ser, packet)?;
        self.port.flush()?;
        Ok(())
    }
}
