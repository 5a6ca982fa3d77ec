//! Command identifiers and the classification of inbound packets.

use nom::error::Error;
use nom::IResult;

/// The command identifiers the bridge acts on. The first byte of
/// every packet is one of these, or something we pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandId {
    EraseNewApp = 2,
    WriteNewAppData = 3,
    Print = 21,
    ExtNrfPresent = 52,
    ExtNrfEsbSetChAddr = 53,
    ExtNrfEsbSendData = 54,
    ExtNrfEsbRxData = 55,
    ExtNrfSetEnabled = 56,
    EraseNewAppAllCan = 60,
    WriteNewAppDataAllCan = 61,
}

impl CommandId {
    pub const fn from_u8(val: u8) -> Option<Self> {
        Some(match val {
            2 => Self::EraseNewApp,
            3 => Self::WriteNewAppData,
            21 => Self::Print,
            52 => Self::ExtNrfPresent,
            53 => Self::ExtNrfEsbSetChAddr,
            54 => Self::ExtNrfEsbSendData,
            55 => Self::ExtNrfEsbRxData,
            56 => Self::ExtNrfSetEnabled,
            60 => Self::EraseNewAppAllCan,
            61 => Self::WriteNewAppDataAllCan,
            _ => return None,
        })
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Firmware-update commands, which arm the suppression window.
    pub const fn is_update_control(self) -> bool {
        matches!(
            self,
            Self::EraseNewApp
                | Self::WriteNewAppData
                | Self::EraseNewAppAllCan
                | Self::WriteNewAppDataAllCan
        )
    }

    /// Commands addressed to the bridge itself rather than the
    /// motor controller.
    pub const fn is_radio_control(self) -> bool {
        matches!(
            self,
            Self::ExtNrfEsbSetChAddr | Self::ExtNrfEsbSendData | Self::ExtNrfSetEnabled
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::EraseNewApp => "EraseNewApp",
            Self::WriteNewAppData => "WriteNewAppData",
            Self::Print => "Print",
            Self::ExtNrfPresent => "ExtNrfPresent",
            Self::ExtNrfEsbSetChAddr => "ExtNrfEsbSetChAddr",
            Self::ExtNrfEsbSendData => "ExtNrfEsbSendData",
            Self::ExtNrfEsbRxData => "ExtNrfEsbRxData",
            Self::ExtNrfSetEnabled => "ExtNrfSetEnabled",
            Self::EraseNewAppAllCan => "EraseNewAppAllCan",
            Self::WriteNewAppDataAllCan => "WriteNewAppDataAllCan",
        }
    }
}

impl TryFrom<u8> for CommandId {
    type Error = u8;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        Self::from_u8(val).ok_or(val)
    }
}

impl From<CommandId> for u8 {
    fn from(id: CommandId) -> u8 {
        id as u8
    }
}

impl core::fmt::Display for CommandId {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel and address for the packet radio. Passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioLinkParams {
    pub channel: u8,
    pub address: [u8; 3],
}

impl RadioLinkParams {
    pub const LEN: usize = 4;

    pub const fn to_bytes(&self) -> [u8; 4] {
        [
            self.channel,
            self.address[0],
            self.address[1],
            self.address[2],
        ]
    }
}

/// Parse the body of a set channel / address command.
pub fn radio_link_params(input: &[u8]) -> IResult<&[u8], RadioLinkParams> {
    let (input, channel) = nom::number::complete::u8::<_, Error<_>>(input)?;
    let (input, address) = nom::bytes::complete::take::<_, _, Error<_>>(3usize)(input)?;

    let mut params = RadioLinkParams {
        channel,
        address: [0; 3],
    };
    params.address.copy_from_slice(address);
    Ok((input, params))
}

/// Parse the body of a set enabled command. Any nonzero byte enables.
pub fn enabled_flag(input: &[u8]) -> IResult<&[u8], bool> {
    nom::combinator::map(nom::number::complete::u8::<_, Error<_>>, |b| b != 0)(input)
}

/// What a packet arriving on the serial transport asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialCommand<'a> {
    /// Configure the radio. Not forwarded.
    SetChannelAddress(RadioLinkParams),
    /// Checksum this payload and transmit it on the radio.
    SendRadioData(&'a [u8]),
    /// Flip the enable gate. Not forwarded.
    SetEnabled(bool),
    /// A bridge command too short to act on.
    Malformed(CommandId),
    /// Anything else, forwarded as-is (if enabled).
    Forward,
    /// No opcode at all.
    Empty,
}

impl<'a> SerialCommand<'a> {
    pub fn classify(packet: &'a [u8]) -> Self {
        let Some((&op, body)) = packet.split_first() else {
            return Self::Empty;
        };

        match CommandId::from_u8(op) {
            Some(id @ CommandId::ExtNrfEsbSetChAddr) => match radio_link_params(body) {
                Ok((_, params)) => Self::SetChannelAddress(params),
                Err(_) => Self::Malformed(id),
            },
            Some(CommandId::ExtNrfEsbSendData) => Self::SendRadioData(body),
            Some(id @ CommandId::ExtNrfSetEnabled) => match enabled_flag(body) {
                Ok((_, en)) => Self::SetEnabled(en),
                Err(_) => Self::Malformed(id),
            },
            _ => Self::Forward,
        }
    }
}

/// What a packet arriving on the wireless transport asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WirelessCommand {
    /// Firmware-update traffic: arm suppression, then forward.
    UpdateControl(CommandId),
    /// Anything else, forwarded as-is.
    Forward,
    /// No opcode at all.
    Empty,
}

impl WirelessCommand {
    pub fn classify(packet: &[u8]) -> Self {
        match packet.first().copied().and_then(CommandId::from_u8) {
            Some(id) if id.is_update_control() => Self::UpdateControl(id),
            Some(_) => Self::Forward,
            None if packet.is_empty() => Self::Empty,
            None => Self::Forward,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn command_id_roundtrip(val: u8) -> bool {
        match CommandId::from_u8(val) {
            Some(id) => id.as_u8() == val,
            None => CommandId::try_from(val) == Err(val),
        }
    }

    #[test]
    fn update_control_set() {
        let update: [u8; 4] = [2, 3, 60, 61];
        for val in 0..=255u8 {
            let is_update = CommandId::from_u8(val)
                .map(CommandId::is_update_control)
                .unwrap_or(false);
            assert_eq!(is_update, update.contains(&val), "opcode {}", val);
        }
    }

    #[test]
    fn serial_set_channel_address() {
        assert_eq!(
            SerialCommand::classify(&[53, 10, 0xc6, 0xc5, 0xc4]),
            SerialCommand::SetChannelAddress(RadioLinkParams {
                channel: 10,
                address: [0xc6, 0xc5, 0xc4],
            })
        );
    }

    #[test]
    fn serial_set_channel_address_trailing() {
        assert_eq!(
            SerialCommand::classify(&[53, 1, 2, 3, 4, 5]),
            SerialCommand::SetChannelAddress(RadioLinkParams {
                channel: 1,
                address: [2, 3, 4],
            })
        );
    }

    #[test]
    fn serial_set_channel_address_short() {
        assert_eq!(
            SerialCommand::classify(&[53, 1, 2, 3]),
            SerialCommand::Malformed(CommandId::ExtNrfEsbSetChAddr)
        );
    }

    #[test]
    fn serial_send_radio_data() {
        assert_eq!(
            SerialCommand::classify(&[54, 1, 2, 3]),
            SerialCommand::SendRadioData(&[1, 2, 3])
        );
        assert_eq!(
            SerialCommand::classify(&[54]),
            SerialCommand::SendRadioData(&[])
        );
    }

    #[test]
    fn serial_set_enabled() {
        assert_eq!(
            SerialCommand::classify(&[56, 0]),
            SerialCommand::SetEnabled(false)
        );
        assert_eq!(
            SerialCommand::classify(&[56, 1]),
            SerialCommand::SetEnabled(true)
        );
        assert_eq!(
            SerialCommand::classify(&[56, 0x80]),
            SerialCommand::SetEnabled(true)
        );
        assert_eq!(
            SerialCommand::classify(&[56]),
            SerialCommand::Malformed(CommandId::ExtNrfSetEnabled)
        );
    }

    #[test]
    fn serial_other() {
        assert_eq!(SerialCommand::classify(&[4]), SerialCommand::Forward);
        // update commands are only special coming from wireless
        assert_eq!(SerialCommand::classify(&[2, 0]), SerialCommand::Forward);
        assert_eq!(SerialCommand::classify(&[]), SerialCommand::Empty);
    }

    #[test]
    fn wireless_classify() {
        assert_eq!(
            WirelessCommand::classify(&[2, 1, 2]),
            WirelessCommand::UpdateControl(CommandId::EraseNewApp)
        );
        assert_eq!(
            WirelessCommand::classify(&[61]),
            WirelessCommand::UpdateControl(CommandId::WriteNewAppDataAllCan)
        );
        // bridge commands are only special coming from serial
        assert_eq!(
            WirelessCommand::classify(&[56, 0]),
            WirelessCommand::Forward
        );
        assert_eq!(WirelessCommand::classify(&[200]), WirelessCommand::Forward);
        assert_eq!(WirelessCommand::classify(&[]), WirelessCommand::Empty);
    }
}
