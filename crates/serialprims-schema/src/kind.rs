use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};

use crate::error::SchemaError;

/// Envelope discriminator.
///
/// Encoded on the wire as its `u8` value. `0` is reserved for "no payload"
/// and is never a valid kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageKind {
    TestInfo = 1,
    Echo = 2,
    Ping = 3,
    Error = 4,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::TestInfo,
        MessageKind::Echo,
        MessageKind::Ping,
        MessageKind::Error,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_u8() == value)
    }

    /// Snake-case name, also used for schema file names.
    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::TestInfo => "test_info",
            MessageKind::Echo => "echo",
            MessageKind::Ping => "ping",
            MessageKind::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts `test_info`, `test-info` or the numeric discriminator.
impl FromStr for MessageKind {
    type Err = SchemaError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase().replace('-', "_");
        if let Ok(value) = normalized.parse::<u8>() {
            return Self::from_u8(value).ok_or_else(|| SchemaError::UnknownKind(input.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| SchemaError::UnknownKind(input.to_string()))
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Self::from_u8(raw)
            .ok_or_else(|| de::Error::custom(format_args!("unknown message kind {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_are_stable() {
        assert_eq!(MessageKind::TestInfo.as_u8(), 1);
        assert_eq!(MessageKind::Echo.as_u8(), 2);
        assert_eq!(MessageKind::Ping.as_u8(), 3);
        assert_eq!(MessageKind::Error.as_u8(), 4);
    }

    #[test]
    fn zero_and_unassigned_values_map_to_nothing() {
        assert_eq!(MessageKind::from_u8(0), None);
        assert_eq!(MessageKind::from_u8(5), None);
        assert_eq!(MessageKind::from_u8(255), None);
    }

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("test-info".parse::<MessageKind>().unwrap(), MessageKind::TestInfo);
        assert_eq!("TEST_INFO".parse::<MessageKind>().unwrap(), MessageKind::TestInfo);
        assert_eq!("3".parse::<MessageKind>().unwrap(), MessageKind::Ping);
        assert!(matches!(
            "bogus".parse::<MessageKind>(),
            Err(SchemaError::UnknownKind(_))
        ));
        assert!("0".parse::<MessageKind>().is_err());
    }

    #[test]
    fn serde_uses_numeric_discriminator() {
        assert_eq!(serde_json::to_string(&MessageKind::Echo).unwrap(), "2");
        assert_eq!(
            serde_json::from_str::<MessageKind>("4").unwrap(),
            MessageKind::Error
        );
        assert!(serde_json::from_str::<MessageKind>("0").is_err());
        assert!(serde_json::from_str::<MessageKind>("\"echo\"").is_err());
    }
}
