// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command names and parameter shapes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tagbridge_core::{BridgeError, BridgeResult, OperationError, TagId};
use tagbridge_da::{ChangeHandler, DataSource, Quality, TagValue};

/// Attribute selecting the read source.
pub const SOURCE_ATTRIBUTE: &str = "source";

// =============================================================================
// Command
// =============================================================================

/// Every command the gateway understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Create a session from a device document and connect it.
    InitDriver,
    /// Bulk synchronous read.
    Read,
    /// Single synchronous write.
    Write,
    /// Register the change callback.
    SubscribeCallBack,
    /// Enable change delivery.
    Subscribe,
    /// Alias of [`Command::Subscribe`].
    EnableSubscribe,
    /// Disable change delivery.
    UnSubscribe,
    /// Force a health check with recovery.
    GetStatus,
    /// Tear down the session and release its handle.
    CloseDriver,
}

impl Command {
    /// All commands, in table order.
    pub const ALL: [Command; 9] = [
        Command::InitDriver,
        Command::Read,
        Command::Write,
        Command::SubscribeCallBack,
        Command::Subscribe,
        Command::EnableSubscribe,
        Command::UnSubscribe,
        Command::GetStatus,
        Command::CloseDriver,
    ];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InitDriver => "InitDriver",
            Self::Read => "Read",
            Self::Write => "Write",
            Self::SubscribeCallBack => "SubscribeCallBack",
            Self::Subscribe => "Subscribe",
            Self::EnableSubscribe => "EnableSubscribe",
            Self::UnSubscribe => "UnSubscribe",
            Self::GetStatus => "GetStatus",
            Self::CloseDriver => "CloseDriver",
        }
    }

    /// Returns `true` for commands that create or destroy sessions.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::InitDriver | Self::CloseDriver)
    }
}

impl FromStr for Command {
    type Err = BridgeError;

    /// Names are matched exactly, case included.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.as_str() == s)
            .ok_or_else(|| BridgeError::unknown_command(s))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Property
// =============================================================================

/// A name/value pair, used for init properties and per-variable attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Name.
    pub name: String,
    /// Value.
    pub value: String,
}

impl Property {
    /// Creates a property.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// VariableSlot
// =============================================================================

/// One variable of a Read or Write request.
///
/// For reads the gateway fills `data`, `timestamp`, `ok` and `quality`;
/// `capacity` is the size of the caller's buffer. For writes `data` holds
/// the bytes to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSlot {
    /// Tag id in textual form.
    pub id: String,
    /// Per-variable attributes.
    pub attributes: Vec<Property>,
    /// Caller buffer size in bytes.
    pub capacity: usize,
    /// Payload.
    pub data: Vec<u8>,
    /// 100 ns ticks since 1970-01-01.
    pub timestamp: u64,
    /// Value status.
    pub ok: bool,
    /// Server quality word.
    pub quality: Quality,
}

impl VariableSlot {
    /// Creates an empty read slot.
    pub fn new(id: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            attributes: Vec::new(),
            capacity,
            data: Vec::new(),
            timestamp: 0,
            ok: false,
            quality: Quality::BAD,
        }
    }

    /// Creates a write slot carrying `data`.
    pub fn with_data(id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            capacity: data.len(),
            data,
            ..Self::new(id, 0)
        }
    }

    /// Adds an attribute.
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Property::new(name, value));
        self
    }

    /// Returns the value of the first attribute named `name`.
    pub fn find_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Returns the requested read source; cache unless `source=device`.
    pub fn source(&self) -> DataSource {
        self.find_attribute(SOURCE_ATTRIBUTE)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Parses the tag id.
    pub fn tag_id(&self) -> BridgeResult<TagId> {
        self.id.parse()
    }

    /// Copies a read result into the slot.
    ///
    /// Timestamp, status and quality are always stored; the payload only if
    /// it fits the caller's buffer.
    pub fn fill(&mut self, id: TagId, value: TagValue) -> BridgeResult<()> {
        self.timestamp = value.timestamp;
        self.ok = value.ok;
        self.quality = value.quality;

        if value.bytes.len() > self.capacity {
            return Err(OperationError::BufferTooSmall {
                tag_id: id,
                capacity: self.capacity,
                required: value.bytes.len(),
            }
            .into());
        }
        self.data = value.bytes;
        Ok(())
    }
}

// =============================================================================
// CommandParam
// =============================================================================

/// The opaque parameter of a command.
pub enum CommandParam<'a> {
    /// No parameter.
    None,
    /// Init properties; the first value is the device document path.
    Properties(&'a [Property]),
    /// Read slots, filled in place.
    Variables(&'a mut [VariableSlot]),
    /// A single write.
    Variable(&'a VariableSlot),
    /// Change callback.
    Callback(Arc<dyn ChangeHandler>),
}

impl CommandParam<'_> {
    /// Returns the shape name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Properties(_) => "properties",
            Self::Variables(_) => "variables",
            Self::Variable(_) => "variable",
            Self::Callback(_) => "callback",
        }
    }
}

impl fmt::Debug for CommandParam<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Properties(props) => f.debug_tuple("Properties").field(props).finish(),
            Self::Variables(slots) => write!(f, "Variables({} slots)", slots.len()),
            Self::Variable(slot) => f.debug_tuple("Variable").field(&slot.id).finish(),
            Self::Callback(_) => write!(f, "Callback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        for cmd in Command::ALL {
            assert_eq!(cmd.as_str().parse::<Command>().unwrap(), cmd);
        }
        assert!("read".parse::<Command>().is_err());
        let err = "Reboot".parse::<Command>().unwrap_err();
        assert_eq!(err.result_code(), tagbridge_core::ResultCode::UnknownCommand);
        assert!(Command::CloseDriver.is_lifecycle());
        assert!(!Command::Read.is_lifecycle());
    }

    #[test]
    fn test_slot_source() {
        assert_eq!(VariableSlot::new("1", 8).source(), DataSource::Cache);
        assert_eq!(
            VariableSlot::new("1", 8).attribute("source", "device").source(),
            DataSource::Device
        );
        assert_eq!(
            VariableSlot::new("1", 8).attribute("source", "cache").source(),
            DataSource::Cache
        );
        assert_eq!(
            VariableSlot::new("1", 8).attribute("other", "device").source(),
            DataSource::Cache
        );
    }

    #[test]
    fn test_slot_tag_id() {
        assert_eq!(VariableSlot::new(" 12 ", 0).tag_id().unwrap(), TagId(12));
        assert!(VariableSlot::new("abc", 0).tag_id().is_err());
    }

    #[test]
    fn test_slot_fill() {
        let value = TagValue {
            bytes: vec![1, 2, 3, 4],
            timestamp: 99,
            ok: true,
            quality: Quality::GOOD,
        };

        let mut slot = VariableSlot::new("1", 4);
        slot.fill(TagId(1), value.clone()).unwrap();
        assert_eq!(slot.data, vec![1, 2, 3, 4]);
        assert_eq!(slot.timestamp, 99);
        assert!(slot.ok);

        let mut small = VariableSlot::new("1", 2);
        let err = small.fill(TagId(1), value).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Operation(OperationError::BufferTooSmall { required: 4, .. })
        ));
        assert!(small.data.is_empty());
        assert_eq!(small.timestamp, 99);
    }

    #[test]
    fn test_write_slot() {
        let slot = VariableSlot::with_data("5", vec![0u8; 8]);
        assert_eq!(slot.capacity, 8);
        assert_eq!(slot.data.len(), 8);
    }
}
