/// Generic CRC style, for packet framing and radio framing.
pub trait CrcStyle {
    type Digest<'a>: CrcDigest
    where
        Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a>;

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        calculated == provided
    }

    /// Checksum a whole slice in one go.
    fn checksum(&self, bytes: &[u8]) -> u16 {
        let mut digest = self.digest();
        digest.update(bytes);
        digest.finalize()
    }
}

/// Interface for a CRC digest.
pub trait CrcDigest {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self) -> u16;
}

impl<C> CrcStyle for &C
where
    C: CrcStyle,
{
    type Digest<'a> = C::Digest<'a> where Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        (*self).digest()
    }

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        (*self).validate(calculated, provided)
    }
}

/// A CRC that is always a specific given value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CrcConstant(pub u16);

impl CrcStyle for CrcConstant {
    type Digest<'a> = CrcConstant;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        CrcConstant(self.0)
    }
}

impl CrcDigest for CrcConstant {
    fn update(&mut self, _bytes: &[u8]) {}

    fn finalize(self) -> u16 {
        self.0
    }
}

/// A 16-bit XModem CRC (poly 0x1021, init 0), used by the packet
/// framing on every transport and by the radio framing.
#[derive(Clone)]
pub struct CrcXModem(crc::Crc<u16>);

/// A 16-bit XModem CRC digest struct.
#[derive(Clone)]
pub struct CrcXModemDigest<'a>(crc::Digest<'a, u16, crc::Table<1>>);

impl CrcXModem {
    pub const fn new() -> Self {
        Self(crc::Crc::<u16>::new(&crc::CRC_16_XMODEM))
    }
}

impl Default for CrcXModem {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CrcXModem {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("CrcXModem")
    }
}

impl CrcStyle for CrcXModem {
    type Digest<'a> = CrcXModemDigest<'a>;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        CrcXModemDigest(self.0.digest())
    }
}

impl<'a> CrcDigest for CrcXModemDigest<'a> {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes)
    }

    fn finalize(self) -> u16 {
        self.0.finalize()
    }
}
