use super::crc::{CrcDigest, CrcStyle};
use super::{END, MAX_PAYLOAD_LEN, START_LONG, START_SHORT};

/// A trait for serializing packets.
pub trait Serializer {
    type Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error>;

    // everything else can be written in terms of write_u8
    // Note: specialize these in &mut S too, if you add one.

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        for b in val.iter() {
            self.write_u8(*b)?;
        }
        Ok(())
    }

    fn write_be_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        self.write_bytes(&val.to_be_bytes())
    }
}

impl<S> Serializer for &mut S
where
    S: Serializer,
{
    type Error = S::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        (*self).write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        (*self).write_bytes(val)
    }

    fn write_be_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        (*self).write_be_u16(val)
    }
}

/// Wrap an [embedded_io::Write] to become a Serializer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerWrap<T> {
    inner: T,
}

impl<T> SerializerWrap<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn done(self) -> T {
        self.inner
    }
}

impl<T> core::ops::Deref for SerializerWrap<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> core::ops::DerefMut for SerializerWrap<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> Serializer for SerializerWrap<T>
where
    T: embedded_io::Write,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.write_all(&[val])
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.write_all(val)
    }
}

/// The buffer behind a [SerializerSlice] is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferFull;

/// A serializer into a fixed buffer, for building packets on the stack.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SerializerSlice<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl<'a> SerializerSlice<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.len
    }

    pub fn done(self) -> &'a [u8] {
        let Self { buffer, len } = self;
        let buffer: &'a [u8] = buffer;
        &buffer[..len]
    }
}

impl<'a> Serializer for SerializerSlice<'a> {
    type Error = BufferFull;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        let slot = self.buffer.get_mut(self.len).ok_or(BufferFull)?;
        *slot = val;
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        if val.len() > self.remaining() {
            return Err(BufferFull);
        }
        self.buffer[self.len..self.len + val.len()].copy_from_slice(val);
        self.len += val.len();
        Ok(())
    }
}

/// Writes formatted text, silently truncating at the end of the buffer.
impl<'a> core::fmt::Write for SerializerSlice<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let amt = s.len().min(self.remaining());
        let _ = self.write_bytes(&s.as_bytes()[..amt]);
        Ok(())
    }
}

/// A serializer into a growable buffer.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SerializerVec {
    inner: alloc::vec::Vec<u8>,
}

#[cfg(feature = "alloc")]
impl SerializerVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done(self) -> alloc::vec::Vec<u8> {
        self.inner
    }
}

#[cfg(feature = "alloc")]
impl Serializer for SerializerVec {
    type Error = core::convert::Infallible;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.inner.push(val);
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.inner.extend_from_slice(val);
        Ok(())
    }
}

/// A serializer that also computes a CRC on the side.
pub struct SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
{
    digest: C::Digest<'a>,
    inner: T,
}

impl<'a, C, T> SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
{
    pub fn new(crc: &'a C, inner: T) -> Self {
        Self {
            digest: crc.digest(),
            inner,
        }
    }

    pub fn finalize(self) -> (u16, T) {
        (self.digest.finalize(), self.inner)
    }
}

impl<'a, C, T> Serializer for SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
    T: Serializer,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.digest.update(&[val]);
        self.inner.write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.digest.update(val);
        self.inner.write_bytes(val)
    }
}

/// An error from [serialize_packet()].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError<E> {
    /// Packets must carry at least an opcode.
    Empty,
    /// Payload longer than [MAX_PAYLOAD_LEN].
    TooLong(usize),
    /// Error in the underlying writer.
    Io(E),
}

#[cfg(feature = "std")]
impl<E> std::error::Error for PacketError<E> where E: core::fmt::Debug {}

impl<E> core::fmt::Display for PacketError<E>
where
    E: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty packet"),
            Self::TooLong(len) => write!(
                f,
                "packet of {} bytes exceeds maximum of {}",
                len, MAX_PAYLOAD_LEN
            ),
            Self::Io(e) => write!(f, "io error: {:?}", e),
        }
    }
}

impl<E> From<E> for PacketError<E> {
    fn from(other: E) -> Self {
        Self::Io(other)
    }
}

/// Serialize a payload into a full packet, with start byte, length,
/// CRC, and end byte.
pub fn serialize_packet<C, S>(
    crc: &C,
    ser: &mut S,
    payload: &[u8],
) -> Result<(), PacketError<S::Error>>
where
    C: CrcStyle,
    S: Serializer,
{
    if payload.is_empty() {
        return Err(PacketError::Empty);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(PacketError::TooLong(payload.len()));
    }

    if payload.len() <= u8::MAX as usize {
        ser.write_u8(START_SHORT)?;
        ser.write_u8(payload.len() as u8)?;
    } else {
        ser.write_u8(START_LONG)?;
        ser.write_be_u16(payload.len() as u16)?;
    }

    let mut crc_ser = SerializerCrc::new(crc, &mut *ser);
    crc_ser.write_bytes(payload)?;
    let (crc_val, ser) = crc_ser.finalize();

    ser.write_be_u16(crc_val)?;
    ser.write_u8(END)?;
    Ok(())
}
