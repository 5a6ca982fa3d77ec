//! Reassembly of packets from a byte stream.

use super::crc::CrcStyle;
use super::{END, MAX_PAYLOAD_LEN, RX_TIMEOUT_TICKS, START_LONG, START_SHORT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    Start,
    LenHigh,
    LenLow,
    Payload,
    CrcHigh,
    CrcLow,
    End,
}

/// A possible result from [PacketDecoder::process_byte()].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decoded<'a> {
    /// A complete packet, borrowed from the decoder's buffer.
    Packet(&'a [u8]),
    /// CRC check failed, with the payload that failed.
    CrcErr {
        payload: &'a [u8],
        calculated: u16,
        provided: u16,
    },
    /// The byte where the end marker should be.
    EndErr(u8),
    /// Nothing complete yet.
    None,
}

impl<'a> Decoded<'a> {
    pub fn ok(self) -> Option<&'a [u8]> {
        match self {
            Self::Packet(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Byte-at-a-time packet decoder, one per transport.
///
/// Packets are `start, length, payload, crc, end`. Anything that is
/// not a start byte while idle is skipped. A packet that stalls for
/// longer than [RX_TIMEOUT_TICKS] calls to [Self::tick()] is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PacketDecoder<const SIZE: usize = MAX_PAYLOAD_LEN> {
    state: State,
    len: usize,
    pos: usize,
    crc: u16,
    timeout: u8,
    buffer: [u8; SIZE],
}

impl<const SIZE: usize> PacketDecoder<SIZE> {
    pub const fn new() -> Self {
        Self {
            state: State::Start,
            len: 0,
            pos: 0,
            crc: 0,
            timeout: 0,
            buffer: [0; SIZE],
        }
    }

    /// Drop any partial packet and wait for a start byte.
    pub fn reset(&mut self) {
        self.state = State::Start;
        self.len = 0;
        self.pos = 0;
        self.crc = 0;
        self.timeout = 0;
    }

    /// True if no packet is partially received.
    pub fn is_idle(&self) -> bool {
        self.state == State::Start
    }

    /// Advance the receive timeout by one tick.
    pub fn tick(&mut self) {
        if self.timeout > 0 {
            self.timeout -= 1;
        } else if !self.is_idle() {
            self.reset();
        }
    }

    /// Feed one byte. Returns a packet when this byte completes one.
    pub fn process_byte<C>(&mut self, crc: &C, byte: u8) -> Decoded<'_>
    where
        C: CrcStyle,
    {
        self.timeout = RX_TIMEOUT_TICKS;

        match self.state {
            State::Start => {
                self.len = 0;
                self.pos = 0;
                match byte {
                    START_SHORT => self.state = State::LenLow,
                    START_LONG => self.state = State::LenHigh,
                    _ => self.timeout = 0,
                }
            }
            State::LenHigh => {
                self.len = (byte as usize) << 8;
                self.state = State::LenLow;
            }
            State::LenLow => {
                self.len |= byte as usize;
                if self.len > 0 && self.len <= SIZE {
                    self.state = State::Payload;
                } else {
                    // nothing we can hold, wait for the next start
                    self.reset();
                }
            }
            State::Payload => {
                self.buffer[self.pos] = byte;
                self.pos += 1;
                if self.pos == self.len {
                    self.state = State::CrcHigh;
                }
            }
            State::CrcHigh => {
                self.crc = (byte as u16) << 8;
                self.state = State::CrcLow;
            }
            State::CrcLow => {
                self.crc |= byte as u16;
                self.state = State::End;
            }
            State::End => {
                let provided = self.crc;
                let len = self.len;
                self.reset();

                if byte != END {
                    return Decoded::EndErr(byte);
                }

                let payload = &self.buffer[..len];
                let calculated = crc.checksum(payload);
                if crc.validate(calculated, provided) {
                    return Decoded::Packet(payload);
                } else {
                    return Decoded::CrcErr {
                        payload,
                        calculated,
                        provided,
                    };
                }
            }
        }

        Decoded::None
    }

    /// Feed a slice of bytes, calling `f` for every non-empty result.
    pub fn feed<C, F>(&mut self, crc: &C, data: &[u8], mut f: F)
    where
        C: CrcStyle,
        F: FnMut(Decoded<'_>),
    {
        for b in data.iter() {
            let res = self.process_byte(crc, *b);
            if !res.is_none() {
                f(res);
            }
        }
    }
}

impl<const SIZE: usize> Default for PacketDecoder<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg(feature = "alloc")]
mod test {
    use alloc::vec::Vec;

    use super::super::crc::{CrcConstant, CrcXModem};
    use super::*;

    fn decode_all<C: CrcStyle, const SIZE: usize>(
        dec: &mut PacketDecoder<SIZE>,
        crc: &C,
        data: &[u8],
    ) -> Vec<Result<Vec<u8>, ()>> {
        let mut out = Vec::new();
        dec.feed(crc, data, |res| match res {
            Decoded::Packet(p) => out.push(Ok(p.to_vec())),
            _ => out.push(Err(())),
        });
        out
    }

    fn ok(payload: &[u8]) -> Result<Vec<u8>, ()> {
        Ok(payload.to_vec())
    }

    #[test]
    fn decode_empty() {
        let mut dec = PacketDecoder::<16>::new();
        assert!(decode_all(&mut dec, &CrcConstant(0xcafe), b"").is_empty());
        assert!(dec.is_idle());
    }

    #[test]
    fn decode_discard_garbage() {
        let mut dec = PacketDecoder::<16>::new();
        assert!(decode_all(&mut dec, &CrcConstant(0xcafe), b"abc\x00\xff").is_empty());
        assert!(dec.is_idle());
    }

    #[test]
    fn decode_short() {
        let mut dec = PacketDecoder::<16>::new();
        let res = decode_all(
            &mut dec,
            &CrcConstant(0xcafe),
            b"xx\x02\x03foo\xca\xfe\x03after",
        );
        assert_eq!(res, [ok(b"foo")]);
    }

    #[test]
    fn decode_long() {
        let mut data = b"\x03\x01\x04".to_vec();
        data.extend((0..0x104).map(|i| i as u8));
        data.extend(b"\xca\xfe\x03");

        let expected: Vec<u8> = (0..0x104).map(|i| i as u8).collect();
        let mut dec = PacketDecoder::<0x200>::new();
        let res = decode_all(&mut dec, &CrcConstant(0xcafe), &data);
        assert_eq!(res, [ok(&expected)]);
    }

    #[test]
    fn decode_xmodem() {
        // crc16 xmodem of "123456789" is 0x31c3
        let mut dec = PacketDecoder::<16>::new();
        let res = decode_all(&mut dec, &CrcXModem::new(), b"\x02\x09123456789\x31\xc3\x03");
        assert_eq!(res, [ok(b"123456789")]);
    }

    #[test]
    fn decode_back_to_back() {
        let mut dec = PacketDecoder::<16>::new();
        let res = decode_all(
            &mut dec,
            &CrcConstant(0xcafe),
            b"\x02\x01a\xca\xfe\x03\x02\x02bc\xca\xfe\x03",
        );
        assert_eq!(res, [ok(b"a"), ok(b"bc")]);
    }

    #[test]
    fn decode_crc_error() {
        let mut dec = PacketDecoder::<16>::new();
        let mut got = None;
        dec.feed(&CrcConstant(0xcafe), b"\x02\x03foo\xca\xfd\x03", |res| {
            if let Decoded::CrcErr {
                payload,
                calculated,
                provided,
            } = res
            {
                got = Some((payload.to_vec(), calculated, provided));
            }
        });
        assert_eq!(got, Some((b"foo".to_vec(), 0xcafe, 0xcafd)));
        assert!(dec.is_idle());
    }

    #[test]
    fn decode_end_error() {
        let mut dec = PacketDecoder::<16>::new();
        let mut got = Vec::new();
        dec.feed(&CrcConstant(0xcafe), b"\x02\x03foo\xca\xfe\x04", |res| {
            got.push(res == Decoded::EndErr(0x04));
        });
        assert_eq!(got, [true]);
        assert!(dec.is_idle());
    }

    #[test]
    fn decode_zero_length() {
        let mut dec = PacketDecoder::<16>::new();
        let res = decode_all(
            &mut dec,
            &CrcConstant(0xcafe),
            b"\x02\x00\x02\x01z\xca\xfe\x03",
        );
        assert_eq!(res, [ok(b"z")]);
    }

    #[test]
    fn decode_too_long_for_buffer() {
        let mut dec = PacketDecoder::<4>::new();
        let res = decode_all(&mut dec, &CrcConstant(0xcafe), b"\x02\x05hello\xca\xfe");
        assert!(res.is_empty());
        assert!(dec.is_idle());
    }

    #[test]
    fn decode_timeout() {
        let crc = CrcConstant(0xcafe);
        let mut dec = PacketDecoder::<16>::new();
        assert!(decode_all(&mut dec, &crc, b"\x02\x03fo").is_empty());
        assert!(!dec.is_idle());

        // two ticks of grace, reset on the third
        dec.tick();
        dec.tick();
        assert!(!dec.is_idle());
        dec.tick();
        assert!(dec.is_idle());

        // the tail of the stale packet is garbage, except for its end
        // byte, which reads as the start of a long packet
        assert!(decode_all(&mut dec, &crc, b"o\xca\xfe\x03").is_empty());
        assert!(!dec.is_idle());
        for _ in 0..=RX_TIMEOUT_TICKS {
            dec.tick();
        }
        assert!(dec.is_idle());

        assert_eq!(
            decode_all(&mut dec, &crc, b"\x02\x01a\xca\xfe\x03"),
            [ok(b"a")]
        );
    }

    #[test]
    fn decode_bytes_keep_timeout_alive() {
        let crc = CrcConstant(0xcafe);
        let mut dec = PacketDecoder::<16>::new();
        for b in b"\x02\x03foo\xca\xfe".iter() {
            assert!(dec.process_byte(&crc, *b).is_none());
            dec.tick();
            dec.tick();
        }
        assert_eq!(dec.process_byte(&crc, 0x03), Decoded::Packet(b"foo"));
    }

    #[test]
    fn decode_reset() {
        let crc = CrcConstant(0xcafe);
        let mut dec = PacketDecoder::<16>::new();
        assert!(decode_all(&mut dec, &crc, b"\x02\x03f").is_empty());
        dec.reset();
        assert!(dec.is_idle());
        assert_eq!(
            decode_all(&mut dec, &crc, b"\x02\x03bar\xca\xfe\x03"),
            [ok(b"bar")]
        );
    }
}
