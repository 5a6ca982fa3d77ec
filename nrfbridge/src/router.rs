//! The packet router, the one place where the three transports meet.
//!
//! Firmware typically keeps a single [Router] in a `static` and calls
//! into it from every receive handler and timer:
//!
//! * framers for each transport call [Router::route()] with each
//!   complete packet (radio delivers raw payloads, no framer),
//! * a 1 ms timer calls [Router::tick()],
//! * a 1 s timer calls [Router::heartbeat()].

use core::cell::RefCell;

use crate::log;
use crate::protocol::crc::{CrcStyle, CrcXModem};
use crate::protocol::serialize::{Serializer, SerializerSlice};
use crate::protocol::{
    radio_frame, CommandId, SerialCommand, WirelessCommand, PRINT_MAX_LEN, RADIO_MAX_FRAME_LEN,
    SUPPRESSION_TICKS,
};
use crate::sink::{PacketSink, RadioLink, SerialSink, TxPin};

/// Where a packet came from, or went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transport {
    /// Wired link to the motor controller.
    Serial,
    /// The phone or PC side (BLE, USB).
    Wireless,
    /// Short-range packet radio to the remote.
    Radio,
}

/// Router state shared between every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouterState {
    /// Serial to wireless forwarding is on.
    pub enabled: bool,
    /// Ticks left in the suppression window. Radio to serial traffic
    /// and heartbeats are held back while this is nonzero.
    pub suppression_ticks: u16,
}

impl RouterState {
    pub const fn new() -> Self {
        Self {
            enabled: true,
            suppression_ticks: 0,
        }
    }

    pub const fn is_suppressed(&self) -> bool {
        self.suppression_ticks > 0
    }
}

impl Default for RouterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a packet went nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DropReason {
    /// No opcode.
    Empty,
    /// Serial to wireless forwarding is turned off.
    Disabled,
    /// Inside the suppression window.
    Suppressed,
    /// A bridge command with a truncated body.
    Malformed(CommandId),
    /// Too large for the radio.
    Oversized(usize),
    /// The destination sink reported an error.
    Sink(Transport),
    /// The destination sink was in use by another context.
    Busy(Transport),
}

/// What the router did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
    /// Sent on to this transport.
    Forwarded(Transport),
    /// Consumed by the bridge itself.
    Handled,
    /// Dropped.
    Dropped(DropReason),
}

// state and the serial sink are always touched together
#[derive(Debug)]
struct Shared<S> {
    state: RouterState,
    serial: S,
}

/// Routes packets between the serial, wireless and radio transports.
///
/// The router state and the serial sink live in one critical section,
/// so that forwards from different interrupt contexts never interleave
/// on the wire.
///
/// The wireless and radio sinks each sit behind their own spin lock,
/// which the router only ever tries once. Serial forwards and
/// [Router::print()] can both reach the wireless sink, possibly with one
/// preempting the other, so a packet for a sink that is already in use
/// is dropped with [DropReason::Busy] instead of waiting on it.
pub struct Router<S, W, R, C = CrcXModem> {
    shared: critical_section::Mutex<RefCell<Shared<S>>>,
    wireless: spin::Mutex<W>,
    radio: spin::Mutex<R>,
    crc: C,
}

impl<S, W, R> Router<S, W, R> {
    /// Create a router using the standard radio checksum.
    pub const fn new(serial: S, wireless: W, radio: R) -> Self {
        Self::new_crc(CrcXModem::new(), serial, wireless, radio)
    }
}

impl<S, W, R, C> Router<S, W, R, C> {
    /// Create a router using the provided [CrcStyle] for radio frames.
    pub const fn new_crc(crc: C, serial: S, wireless: W, radio: R) -> Self {
        Self {
            shared: critical_section::Mutex::new(RefCell::new(Shared {
                state: RouterState::new(),
                serial,
            })),
            wireless: spin::Mutex::new(wireless),
            radio: spin::Mutex::new(radio),
            crc,
        }
    }

    /// Release the sinks and checksum used to create this router.
    pub fn free(self) -> (S, W, R, C) {
        let shared = self.shared.into_inner().into_inner();
        (
            shared.serial,
            self.wireless.into_inner(),
            self.radio.into_inner(),
            self.crc,
        )
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> RouterState {
        critical_section::with(|cs| self.shared.borrow_ref(cs).state)
    }

    /// Run `f` on the serial sink, inside the critical section.
    pub fn with_serial<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut S) -> T,
    {
        critical_section::with(|cs| f(&mut self.shared.borrow_ref_mut(cs).serial))
    }

    /// Lock the wireless sink, spinning until it is free.
    ///
    /// Holding this guard makes every router path into the wireless sink
    /// drop its packet, so keep it short and never hold it in a context
    /// that could preempt the router.
    pub fn lock_wireless(&self) -> spin::MutexGuard<'_, W> {
        self.wireless.lock()
    }

    /// Lock the radio, spinning until it is free.
    pub fn lock_radio(&self) -> spin::MutexGuard<'_, R> {
        self.radio.lock()
    }

    /// Advance the suppression window by one tick.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.state.suppression_ticks = shared.state.suppression_ticks.saturating_sub(1);
        });
    }
}

impl<S, W, R, C> Router<S, W, R, C>
where
    S: SerialSink,
    W: PacketSink,
    R: RadioLink,
    C: CrcStyle,
{
    /// Route one complete packet from `source`.
    pub fn route(&self, source: Transport, packet: &[u8]) -> Route {
        match source {
            Transport::Serial => self.route_from_serial(packet),
            Transport::Wireless => self.route_from_wireless(packet),
            Transport::Radio => self.route_from_radio(packet),
        }
    }

    /// Handle a packet from the motor controller. Bridge commands are
    /// acted on here, everything else goes out on wireless.
    pub fn route_from_serial(&self, packet: &[u8]) -> Route {
        match SerialCommand::classify(packet) {
            SerialCommand::SetChannelAddress(params) => {
                log::debug!("radio channel {} address {}", params.channel, params.address);
                let Some(mut radio) = self.try_radio() else {
                    return Route::Dropped(DropReason::Busy(Transport::Radio));
                };
                if let Err(_e) = radio.set_channel_address(params) {
                    log::warning!("radio config failed: {}", defmt::Debug2Format(&_e));
                    return Route::Dropped(DropReason::Sink(Transport::Radio));
                }
                Route::Handled
            }
            SerialCommand::SendRadioData(payload) => {
                let mut buffer = [0; RADIO_MAX_FRAME_LEN];
                let frame = match radio_frame(&self.crc, payload, &mut buffer) {
                    Ok(frame) => frame,
                    Err(_e) => {
                        log::warning!("radio send dropped: {}", _e);
                        return Route::Dropped(DropReason::Oversized(payload.len()));
                    }
                };
                let Some(mut radio) = self.try_radio() else {
                    return Route::Dropped(DropReason::Busy(Transport::Radio));
                };
                if let Err(_e) = radio.transmit(frame) {
                    log::warning!("radio transmit failed: {}", defmt::Debug2Format(&_e));
                    return Route::Dropped(DropReason::Sink(Transport::Radio));
                }
                Route::Forwarded(Transport::Radio)
            }
            SerialCommand::SetEnabled(enabled) => {
                self.set_enabled(enabled);
                Route::Handled
            }
            SerialCommand::Malformed(id) => {
                log::warning!("ignoring short {} command", id);
                Route::Dropped(DropReason::Malformed(id))
            }
            SerialCommand::Forward => {
                if !self.state().enabled {
                    return Route::Dropped(DropReason::Disabled);
                }
                self.send_wireless(packet)
            }
            SerialCommand::Empty => Route::Dropped(DropReason::Empty),
        }
    }

    /// Handle a packet from the phone side. Everything goes to serial;
    /// firmware-update traffic also restarts the suppression window.
    pub fn route_from_wireless(&self, packet: &[u8]) -> Route {
        let command = WirelessCommand::classify(packet);
        if command == WirelessCommand::Empty {
            return Route::Dropped(DropReason::Empty);
        }

        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if let WirelessCommand::UpdateControl(_id) = command {
                log::debug!("{} seen, suppressing radio", _id);
                shared.state.suppression_ticks = SUPPRESSION_TICKS;
            }
            Self::send_serial(&mut shared.serial, packet)
        })
    }

    /// Handle a raw payload from the radio. It is passed on to serial
    /// behind a radio-data opcode, unless suppressed.
    pub fn route_from_radio(&self, payload: &[u8]) -> Route {
        if payload.len() > RADIO_MAX_FRAME_LEN {
            log::warning!("radio payload of {} bytes dropped", payload.len());
            return Route::Dropped(DropReason::Oversized(payload.len()));
        }

        let mut buffer = [0; RADIO_MAX_FRAME_LEN + 1];
        buffer[0] = CommandId::ExtNrfEsbRxData.as_u8();
        buffer[1..payload.len() + 1].copy_from_slice(payload);
        let packet = &buffer[..payload.len() + 1];

        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if shared.state.is_suppressed() {
                return Route::Dropped(DropReason::Suppressed);
            }
            Self::send_serial(&mut shared.serial, packet)
        })
    }

    /// Turn serial to wireless forwarding on or off, and move the
    /// serial transmitter to match.
    pub fn set_enabled(&self, enabled: bool) {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            shared.state.enabled = enabled;
            if let Err(_e) = shared.serial.set_tx_pin(TxPin::for_enabled(enabled)) {
                log::warning!("tx pin swap failed: {}", defmt::Debug2Format(&_e));
            }
        });
    }

    /// Announce the radio link on serial, unless suppressed.
    pub fn heartbeat(&self) -> Route {
        critical_section::with(|cs| {
            let mut shared = self.shared.borrow_ref_mut(cs);
            if shared.state.is_suppressed() {
                return Route::Dropped(DropReason::Suppressed);
            }
            Self::send_serial(&mut shared.serial, &[CommandId::ExtNrfPresent.as_u8()])
        })
    }

    /// Send text to the wireless side as a print packet.
    ///
    /// Text past [PRINT_MAX_LEN] - 1 bytes is cut off. Nothing is sent
    /// for empty text.
    pub fn print(&self, args: core::fmt::Arguments) -> Route {
        let mut buffer = [0; PRINT_MAX_LEN];
        let mut ser = SerializerSlice::new(&mut buffer);
        if ser.write_u8(CommandId::Print.as_u8()).is_err() {
            return Route::Dropped(DropReason::Empty);
        }
        // truncation is silent, so this never fails
        let _ = core::fmt::write(&mut ser, args);

        let packet = ser.done();
        if packet.len() <= 1 {
            return Route::Dropped(DropReason::Empty);
        }
        self.send_wireless(packet)
    }

    fn try_radio(&self) -> Option<spin::MutexGuard<'_, R>> {
        let radio = self.radio.try_lock();
        if radio.is_none() {
            log::warning!("radio busy, command dropped");
        }
        radio
    }

    fn send_wireless(&self, packet: &[u8]) -> Route {
        let Some(mut wireless) = self.wireless.try_lock() else {
            log::warning!("wireless busy, packet dropped");
            return Route::Dropped(DropReason::Busy(Transport::Wireless));
        };
        match wireless.send_packet(packet) {
            Ok(()) => Route::Forwarded(Transport::Wireless),
            Err(_e) => {
                log::warning!("wireless send failed: {}", defmt::Debug2Format(&_e));
                Route::Dropped(DropReason::Sink(Transport::Wireless))
            }
        }
    }

    fn send_serial(serial: &mut S, packet: &[u8]) -> Route {
        match serial.send_packet(packet) {
            Ok(()) => Route::Forwarded(Transport::Serial),
            Err(_e) => {
                log::warning!("serial send failed: {}", defmt::Debug2Format(&_e));
                Route::Dropped(DropReason::Sink(Transport::Serial))
            }
        }
    }
}
