//! Envelope and versioning primitives shared by every npc message

use npc_types::EndpointAddress;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a message
///
/// Request ids double as correlation ids: a response carries the id of the
/// request it answers, and an abort names the request it cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Creates a new random message ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schema version for a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Breaking changes
    pub major: u32,
    /// Backward-compatible additions
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Compatibility result for version checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    /// Sender version is older than the accepted window
    UpgradeRequired,
    /// Sender version is newer than what this side implements
    Unsupported,
}

/// Which schema versions a receiver accepts
///
/// The window is `[min_major.0, current]` by major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPolicy {
    current: SchemaVersion,
    min_major: u32,
}

impl VersionPolicy {
    /// Policy accepting only the current major version
    pub const fn current(major: u32, minor: u32) -> Self {
        Self {
            current: SchemaVersion::new(major, minor),
            min_major: major,
        }
    }

    /// Widens the window down to `min_major`
    ///
    /// A `min_major` above the current major is clamped to the current major.
    pub const fn with_min_major(mut self, min_major: u32) -> Self {
        self.min_major = if min_major > self.current.major {
            self.current.major
        } else {
            min_major
        };
        self
    }

    pub fn check_compatibility(&self, incoming: &SchemaVersion) -> Compatibility {
        if incoming.major > self.current.major {
            Compatibility::Unsupported
        } else if incoming.major < self.min_major {
            Compatibility::UpgradeRequired
        } else {
            Compatibility::Compatible
        }
    }

    /// Checks `incoming` and explains a rejection in terms of `endpoint`
    pub fn ensure_compatible(
        &self,
        endpoint: &EndpointAddress,
        incoming: SchemaVersion,
    ) -> Result<(), SchemaMismatchError> {
        match self.check_compatibility(&incoming) {
            Compatibility::Compatible => Ok(()),
            Compatibility::UpgradeRequired => Err(SchemaMismatchError::upgrade_required(
                endpoint.clone(),
                self.min_version(),
                incoming,
            )),
            Compatibility::Unsupported => Err(SchemaMismatchError::unsupported(
                endpoint.clone(),
                (self.min_version(), self.current),
                incoming,
            )),
        }
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.current
    }

    pub fn min_version(&self) -> SchemaVersion {
        SchemaVersion::new(self.min_major, 0)
    }
}

/// Error when a payload's schema version falls outside the accepted window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatchError {
    UpgradeRequired {
        endpoint: EndpointAddress,
        expected_min: SchemaVersion,
        received: SchemaVersion,
    },
    Unsupported {
        endpoint: EndpointAddress,
        supported_range: (SchemaVersion, SchemaVersion),
        received: SchemaVersion,
    },
}

impl fmt::Display for SchemaMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaMismatchError::UpgradeRequired {
                endpoint,
                expected_min,
                received,
            } => write!(
                f,
                "schema version too old for {}: received {}, expected at least {}",
                endpoint, received, expected_min
            ),
            SchemaMismatchError::Unsupported {
                endpoint,
                supported_range,
                received,
            } => write!(
                f,
                "schema version not supported by {}: received {}, supported range {}-{}",
                endpoint, received, supported_range.0, supported_range.1
            ),
        }
    }
}

impl std::error::Error for SchemaMismatchError {}

impl SchemaMismatchError {
    pub fn upgrade_required(
        endpoint: EndpointAddress,
        expected_min: SchemaVersion,
        received: SchemaVersion,
    ) -> Self {
        Self::UpgradeRequired {
            endpoint,
            expected_min,
            received,
        }
    }

    pub fn unsupported(
        endpoint: EndpointAddress,
        supported_range: (SchemaVersion, SchemaVersion),
        received: SchemaVersion,
    ) -> Self {
        Self::Unsupported {
            endpoint,
            supported_range,
            received,
        }
    }

    pub fn received(&self) -> SchemaVersion {
        match self {
            SchemaMismatchError::UpgradeRequired { received, .. }
            | SchemaMismatchError::Unsupported { received, .. } => *received,
        }
    }
}

/// Routing and metadata wrapper for everything crossing the boundary
///
/// The payload is type-erased; the `action` names which typed message it
/// holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: MessageId,
    /// Endpoint the message concerns
    pub destination: EndpointAddress,
    pub action: String,
    pub schema_version: SchemaVersion,
    /// Id of the request this message answers or aborts
    pub correlation_id: Option<MessageId>,
    pub payload: MessagePayload,
}

impl MessageEnvelope {
    pub fn new(
        destination: EndpointAddress,
        action: impl Into<String>,
        schema_version: SchemaVersion,
        payload: MessagePayload,
    ) -> Self {
        Self {
            id: MessageId::new(),
            destination,
            action: action.into(),
            schema_version,
            correlation_id: None,
            payload,
        }
    }

    pub fn with_correlation(mut self, correlation_id: MessageId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn is_response(&self) -> bool {
        self.correlation_id.is_some()
    }

    /// Serializes the whole envelope for a byte-oriented transport
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Type-erased message payload, JSON encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    data: Vec<u8>,
}

impl MessagePayload {
    pub fn new<T: Serialize>(data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: serde_json::to_vec(data)?,
        })
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
