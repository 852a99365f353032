//! Recipient addressing
//!
//! A JID has the shape `user[.agent][:device]@server`. Everything that
//! reaches the bridge from outside (query strings, env vars, the store) is
//! parsed through [`Jid::from_str`] before it is used.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Server for regular user accounts
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
/// Server for group chats
pub const GROUP_SERVER: &str = "g.us";
/// Server for broadcast lists and status updates
pub const BROADCAST_SERVER: &str = "broadcast";
/// Server for hidden-user (LID) addresses
pub const HIDDEN_USER_SERVER: &str = "lid";
/// Server for newsletter channels
pub const NEWSLETTER_SERVER: &str = "newsletter";

/// Errors produced while parsing a recipient string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidParseError {
    #[error("recipient is empty")]
    Empty,

    #[error("missing '@server' part in {0:?}")]
    MissingServer(String),

    #[error("unexpected number of '@' in {0:?}")]
    TooManyAts(String),

    #[error("empty user part in {0:?}")]
    EmptyUser(String),

    #[error("unexpected number of dots in {0:?}")]
    UnexpectedDots(String),

    #[error("unexpected number of colons in {0:?}")]
    UnexpectedColons(String),

    #[error("invalid agent {value:?} in {jid:?}")]
    InvalidAgent { jid: String, value: String },

    #[error("invalid device {value:?} in {jid:?}")]
    InvalidDevice { jid: String, value: String },

    #[error("user part of {0:?} must be a phone number")]
    NonNumericUser(String),
}

/// Parsed network address of a user, device, group or channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub raw_agent: u8,
    pub device: u16,
    pub server: String,
}

impl Jid {
    /// Regular (non-device) JID
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            raw_agent: 0,
            device: 0,
            server: server.into(),
        }
    }

    /// Device-specific JID on the default user server
    pub fn new_device(user: impl Into<String>, device: u16) -> Self {
        Self {
            device,
            ..Self::new(user, DEFAULT_USER_SERVER)
        }
    }

    /// Whether this address points at a specific device rather than an account
    pub fn is_device(&self) -> bool {
        self.raw_agent != 0 || self.device != 0
    }

    /// Account address with agent and device stripped
    pub fn to_non_device(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw_agent > 0 {
            write!(
                f,
                "{}.{}:{}@{}",
                self.user, self.raw_agent, self.device, self.server
            )
        } else if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else {
            write!(f, "{}@{}", self.user, self.server)
        }
    }
}

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(JidParseError::Empty);
        }

        let mut parts = raw.split('@');
        let user_part = parts.next().unwrap_or_default();
        let server = match (parts.next(), parts.next()) {
            (Some(server), None) if !server.is_empty() => server,
            (Some(_), Some(_)) => return Err(JidParseError::TooManyAts(raw.to_string())),
            _ => return Err(JidParseError::MissingServer(raw.to_string())),
        };

        let mut jid = Jid::new(user_part, server);

        if user_part.contains('.') {
            let (user, ad) = split_exactly_once(user_part, '.')
                .ok_or_else(|| JidParseError::UnexpectedDots(raw.to_string()))?;
            if ad.matches(':').count() > 1 {
                return Err(JidParseError::UnexpectedColons(raw.to_string()));
            }
            let (agent, device) = match ad.split_once(':') {
                Some((agent, device)) => (agent, Some(device)),
                None => (ad, None),
            };

            jid.user = user.to_string();
            jid.raw_agent = agent.parse::<u8>().map_err(|_| JidParseError::InvalidAgent {
                jid: raw.to_string(),
                value: agent.to_string(),
            })?;
            if let Some(device) = device {
                // Agent-form devices share the single-byte range of the agent
                jid.device = device
                    .parse::<u8>()
                    .map(u16::from)
                    .map_err(|_| JidParseError::InvalidDevice {
                        jid: raw.to_string(),
                        value: device.to_string(),
                    })?;
            }
        } else if user_part.contains(':') {
            let (user, device) = split_exactly_once(user_part, ':')
                .ok_or_else(|| JidParseError::UnexpectedColons(raw.to_string()))?;
            jid.user = user.to_string();
            jid.device = device
                .parse::<u16>()
                .map_err(|_| JidParseError::InvalidDevice {
                    jid: raw.to_string(),
                    value: device.to_string(),
                })?;
        }

        if jid.user.is_empty() {
            return Err(JidParseError::EmptyUser(raw.to_string()));
        }

        if jid.server == DEFAULT_USER_SERVER && !jid.user.bytes().all(|b| b.is_ascii_digit()) {
            return Err(JidParseError::NonNumericUser(raw.to_string()));
        }

        Ok(jid)
    }
}

fn split_exactly_once(value: &str, separator: char) -> Option<(&str, &str)> {
    if value.matches(separator).count() != 1 {
        return None;
    }
    value.split_once(separator)
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_user_jid() {
        let jid: Jid = "123456789@s.whatsapp.net".parse().unwrap();

        assert_eq!(jid.user, "123456789");
        assert_eq!(jid.server, DEFAULT_USER_SERVER);
        assert_eq!(jid.device, 0);
        assert!(!jid.is_device());
        assert_eq!(jid.to_string(), "123456789@s.whatsapp.net");
    }

    #[test]
    fn test_parse_rejects_missing_server() {
        assert_eq!(
            "not-a-jid".parse::<Jid>(),
            Err(JidParseError::MissingServer("not-a-jid".to_string()))
        );
        assert!(matches!(
            "123@".parse::<Jid>(),
            Err(JidParseError::MissingServer(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_and_blank() {
        assert_eq!("".parse::<Jid>(), Err(JidParseError::Empty));
        assert_eq!("   ".parse::<Jid>(), Err(JidParseError::Empty));
    }

    #[test]
    fn test_parse_rejects_empty_user() {
        assert!(matches!(
            "@g.us".parse::<Jid>(),
            Err(JidParseError::EmptyUser(_))
        ));
    }

    #[test]
    fn test_parse_rejects_multiple_ats() {
        assert!(matches!(
            "1@2@s.whatsapp.net".parse::<Jid>(),
            Err(JidParseError::TooManyAts(_))
        ));
    }

    #[test]
    fn test_parse_device_jid() {
        let jid: Jid = "15551234567:12@s.whatsapp.net".parse().unwrap();

        assert_eq!(jid.user, "15551234567");
        assert_eq!(jid.device, 12);
        assert!(jid.is_device());
        assert_eq!(jid.to_non_device().to_string(), "15551234567@s.whatsapp.net");
    }

    #[test]
    fn test_parse_agent_device_jid() {
        let jid: Jid = "15551234567.1:3@s.whatsapp.net".parse().unwrap();

        assert_eq!(jid.user, "15551234567");
        assert_eq!(jid.raw_agent, 1);
        assert_eq!(jid.device, 3);
        assert_eq!(jid.to_string(), "15551234567.1:3@s.whatsapp.net");
    }

    #[test]
    fn test_parse_rejects_bad_device_parts() {
        assert!(matches!(
            "1555:x@s.whatsapp.net".parse::<Jid>(),
            Err(JidParseError::InvalidDevice { .. })
        ));
        assert!(matches!(
            "1555:1:2@s.whatsapp.net".parse::<Jid>(),
            Err(JidParseError::UnexpectedColons(_))
        ));
        assert!(matches!(
            "1555.1.2@s.whatsapp.net".parse::<Jid>(),
            Err(JidParseError::UnexpectedDots(_))
        ));
        assert!(matches!(
            "1555.300@s.whatsapp.net".parse::<Jid>(),
            Err(JidParseError::InvalidAgent { .. })
        ));
    }

    #[test]
    fn test_parse_requires_phone_number_on_user_server() {
        assert!(matches!(
            "alice@s.whatsapp.net".parse::<Jid>(),
            Err(JidParseError::NonNumericUser(_))
        ));
    }

    #[test]
    fn test_group_jid() {
        let jid: Jid = "120363025246125486@g.us".parse().unwrap();
        assert!(jid.is_group());
        assert!(!jid.is_device());
    }

    #[test]
    fn test_serde_uses_string_form() {
        let jid = Jid::new_device("15550001111", 2);
        let json = serde_json::to_string(&jid).unwrap();
        assert_eq!(json, "\"15550001111:2@s.whatsapp.net\"");

        let back: Jid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, jid);

        assert!(serde_json::from_str::<Jid>("\"not-a-jid\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_phone_jids_display_canonically(user in "[0-9]{5,15}", device in 0u16..100) {
            let jid = Jid::new_device(user, device);
            let parsed: Jid = jid.to_string().parse().unwrap();
            prop_assert_eq!(parsed, jid);
        }

        #[test]
        fn prop_strings_without_at_never_parse(raw in "[^@]{0,40}") {
            prop_assert!(raw.parse::<Jid>().is_err());
        }
    }
}
