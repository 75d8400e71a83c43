//! Wire protocol spoken between the `CompilerCache` and a `Worker`.
//!
//! Messages are newline-delimited JSON objects `{"type": 0|1|2|3, "data":
//! ...}` written to the child's stdin and read from its stdout, per
//! `spec.md` §4.6 and §6. `type` is a small integer tag rather than a
//! string so the wire format matches the spec exactly; `Message`
//! therefore implements `Serialize`/`Deserialize` by hand instead of via
//! `#[serde(tag = ...)]`, which only supports string tags.

use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Cache → Worker: request for the worker's protocol/compiler version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionQuery {}

/// Worker → Cache: the worker's reported version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionData {
    pub version: i64,
}

/// Cache → Worker: one unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Absolute path of the source file to compile.
    pub source_path: String,
    /// Target-relative path (without the resource-type extension).
    pub target_path: String,
    /// Platform the output is being built for.
    pub platform: String,
}

/// Worker → Cache: the outcome of a [`BuildRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub source_path: String,
    pub target_path: String,
    pub platform: String,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// A tagged IPC envelope exchanged over the worker's stdio.
#[derive(Debug, Clone)]
pub enum Message {
    VersionQuery(VersionQuery),
    VersionData(VersionData),
    BuildRequest(BuildRequest),
    BuildResult(BuildResult),
}

impl Message {
    fn tag(&self) -> u8 {
        match self {
            Self::VersionQuery(_) => 0,
            Self::VersionData(_) => 1,
            Self::BuildRequest(_) => 2,
            Self::BuildResult(_) => 3,
        }
    }

    /// Encodes a message as a single newline-terminated JSON line.
    pub fn encode_line(&self) -> Result<String> {
        let mut line =
            serde_json::to_string(self).map_err(|e| Error::Protocol(e.to_string()))?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes a single JSON line (without its trailing newline) into a message.
    pub fn decode_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(|e| Error::Protocol(e.to_string()))
    }
}

impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Message", 2)?;
        state.serialize_field("type", &self.tag())?;
        match self {
            Self::VersionQuery(data) => state.serialize_field("data", data)?,
            Self::VersionData(data) => state.serialize_field("data", data)?,
            Self::BuildRequest(data) => state.serialize_field("data", data)?,
            Self::BuildResult(data) => state.serialize_field("data", data)?,
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(rename = "type")]
            tag: u8,
            data: serde_json::Value,
        }

        let envelope = Envelope::deserialize(deserializer)?;
        match envelope.tag {
            0 => serde_json::from_value(envelope.data)
                .map(Message::VersionQuery)
                .map_err(D::Error::custom),
            1 => serde_json::from_value(envelope.data)
                .map(Message::VersionData)
                .map_err(D::Error::custom),
            2 => serde_json::from_value(envelope.data)
                .map(Message::BuildRequest)
                .map_err(D::Error::custom),
            3 => serde_json::from_value(envelope.data)
                .map(Message::BuildResult)
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("unknown message tag {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_build_request() {
        let msg = Message::BuildRequest(BuildRequest {
            source_path: "foo.txt".into(),
            target_path: "ab12".into(),
            platform: "generic".into(),
        });
        let line = msg.encode_line().unwrap();
        assert!(line.ends_with('\n'));
        assert!(line.trim_end().starts_with("{\"type\":2"));

        let decoded = Message::decode_line(line.trim_end()).unwrap();
        match decoded {
            Message::BuildRequest(req) => assert_eq!(req.source_path, "foo.txt"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = Message::decode_line(r#"{"type":9,"data":{}}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
