//! Message envelope crossing the sandbox boundary.
//!
//! Wire form is a flat JSON object: `{type, source, ...payload}`. Decoding
//! never fails loudly; anything malformed or unknown decodes to `None`.

use inai_markup::{scrub_class_names, ElementPath};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Render generation of a surface instance.
pub type SurfaceToken = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SurfaceToken>,
    #[serde(flatten)]
    pub message: M,
}

impl<M> Envelope<M> {
    pub fn new(source: SurfaceToken, message: M) -> Self {
        Self {
            source: Some(source),
            message,
        }
    }
}

/// Sandbox → host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxMessage {
    /// Listeners are attached; the host should re-send its select mode.
    Ready,
    Select(Selection),
    Navigate { path: String },
    Resize { height: f64 },
}

/// Host → sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    SelectMode { enabled: bool },
}

/// An element picked in selection mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(deserialize_with = "deserialize_path")]
    pub path: ElementPath,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default, deserialize_with = "deserialize_class_names")]
    pub class_names: String,
}

/// Paths arrive as a number array or as a dotted string.
fn deserialize_path<'de, D>(deserializer: D) -> Result<ElementPath, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PathWire {
        List(Vec<usize>),
        Text(String),
    }

    match PathWire::deserialize(deserializer)? {
        PathWire::List(indices) => Ok(ElementPath::new(indices)),
        PathWire::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn deserialize_class_names<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| scrub_class_names(&s)).unwrap_or_default())
}

/// Decodes one inbound message, ignoring anything that does not fit the schema.
pub fn decode_sandbox_message(raw: &str) -> Option<Envelope<SandboxMessage>> {
    match serde_json::from_str(raw) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed sandbox message");
            None
        }
    }
}

pub fn decode_sandbox_value(value: serde_json::Value) -> Option<Envelope<SandboxMessage>> {
    match serde_json::from_value(value) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            debug!(error = %e, "Ignoring malformed sandbox message");
            None
        }
    }
}

pub fn encode<M: Serialize>(envelope: &Envelope<M>) -> String {
    serde_json::to_string(envelope).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_select() {
        let env = decode_sandbox_message(
            r#"{"type":"select","source":3,"path":[0,2],"tagName":"H1","textContent":"Hi","classNames":"title inai-selected inai-hovered"}"#,
        )
        .unwrap();
        assert_eq!(env.source, Some(3));
        assert_eq!(
            env.message,
            SandboxMessage::Select(Selection {
                path: ElementPath::new(vec![0, 2]),
                tag_name: "H1".into(),
                text_content: "Hi".into(),
                class_names: "title".into(),
            })
        );
    }

    #[test]
    fn test_decode_string_path_and_missing_fields() {
        let env = decode_sandbox_value(json!({"type":"select","source":1,"path":"1.0"})).unwrap();
        match env.message {
            SandboxMessage::Select(sel) => {
                assert_eq!(sel.path, ElementPath::new(vec![1, 0]));
                assert_eq!(sel.class_names, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_is_ignored() {
        assert!(decode_sandbox_message("not json").is_none());
        assert!(decode_sandbox_value(json!({"type":"teleport","source":1})).is_none());
        assert!(decode_sandbox_value(json!({"type":"select","source":1})).is_none());
        assert!(decode_sandbox_value(json!({"type":"resize","height":"tall"})).is_none());
        assert!(decode_sandbox_value(json!(42)).is_none());
    }

    #[test]
    fn test_ready_without_source() {
        let env = decode_sandbox_value(json!({"type":"ready","source":null})).unwrap();
        assert_eq!(env.source, None);
        assert_eq!(env.message, SandboxMessage::Ready);
    }

    #[test]
    fn test_encode_host_message() {
        let out = encode(&Envelope::new(4, HostMessage::SelectMode { enabled: true }));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value, json!({"type":"select-mode","source":4,"enabled":true}));
    }
}
