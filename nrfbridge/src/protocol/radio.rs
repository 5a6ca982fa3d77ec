use super::crc::CrcStyle;
use super::RADIO_MAX_FRAME_LEN;

/// An error from [radio_frame()].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioFrameError {
    /// Payload plus checksum does not fit in the output.
    TooLong { len: usize, max: usize },
}

#[cfg(feature = "std")]
impl std::error::Error for RadioFrameError {}

impl core::fmt::Display for RadioFrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::TooLong { len, max } => write!(
                f,
                "radio payload of {} bytes exceeds maximum of {}",
                len, max
            ),
        }
    }
}

/// Frame a payload for the packet radio: the payload followed by its
/// checksum, most significant byte first.
///
/// Returns the used part of `buffer`.
pub fn radio_frame<'b, C>(
    crc: &C,
    payload: &[u8],
    buffer: &'b mut [u8],
) -> Result<&'b [u8], RadioFrameError>
where
    C: CrcStyle,
{
    let max = buffer.len().min(RADIO_MAX_FRAME_LEN).saturating_sub(2);
    if payload.len() > max || payload.len() + 2 > buffer.len() {
        return Err(RadioFrameError::TooLong {
            len: payload.len(),
            max,
        });
    }

    let (frame, _) = buffer.split_at_mut(payload.len() + 2);
    let (body, check) = frame.split_at_mut(payload.len());
    body.copy_from_slice(payload);
    check.copy_from_slice(&crc.checksum(payload).to_be_bytes());
    Ok(frame)
}
