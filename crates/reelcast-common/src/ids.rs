//! Typed ID wrappers providing compile-time safety for entity identifiers.
//!
//! Most IDs are newtypes over `Uuid`, preventing accidental misuse (e.g. passing
//! a `JobId` where a `StreamId` is expected). Stream IDs end up in client-visible
//! URLs, so they are always random v4 UUIDs and never derived from anything
//! guessable.
//!
//! [`ClientSessionId`] is the exception: it is an opaque string handed to us by
//! the transport layer (a cookie value, a socket id) and is never parsed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generate a newtype ID wrapper over `Uuid`.
///
/// The macro produces a struct with:
/// - `new()` to create a random v4 UUID
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Serialize`, `Deserialize`
/// - `Display` and `FromStr` delegating to the inner UUID
/// - `From<Uuid>` and `Into<Uuid>` conversions
/// - `Default` that generates a new random ID
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(Uuid);

            impl $name {
                /// Create a new random ID.
                #[must_use]
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }

                /// Return the inner UUID value.
                #[must_use]
                pub fn as_uuid(&self) -> &Uuid {
                    &self.0
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    Uuid::parse_str(s).map(Self)
                }
            }

            impl From<Uuid> for $name {
                fn from(uuid: Uuid) -> Self {
                    Self(uuid)
                }
            }

            impl From<$name> for Uuid {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

typed_id! {
    /// Unique identifier for a transcoded HLS stream. Embedded in manifest URLs.
    StreamId,
    /// Unique identifier for a job accepted by the job queue. Never shown to clients.
    JobId,
    /// Unique identifier for a media library.
    LibraryId,
    /// Unique identifier for a playable media item (an episode).
    MediaId,
}

/// Opaque identifier for a client's connection or browser session.
///
/// Distinct from a [`StreamId`]: one client session owns at most one live stream
/// at a time, and successive streams for the same client reuse the session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientSessionId(String);

impl ClientSessionId {
    /// Wrap a transport-provided session value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a fresh random session id for a client that does not have one yet.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the raw session value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientSessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientSessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = StreamId::new();
        let b = StreamId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn roundtrip_uuid() {
        let uuid = Uuid::new_v4();
        let id = JobId::from(uuid);
        let back: Uuid = id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn display_and_from_str() {
        let id = LibraryId::new();
        let parsed: LibraryId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_str_rejects_garbage() {
        assert!("not-a-uuid".parse::<StreamId>().is_err());
    }

    #[test]
    fn serde_is_transparent() {
        let id = MediaId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let session = ClientSessionId::new("abc");
        assert_eq!(serde_json::to_string(&session).unwrap(), "\"abc\"");
    }

    #[test]
    fn generated_client_sessions_differ() {
        let a = ClientSessionId::generate();
        let b = ClientSessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }
}
