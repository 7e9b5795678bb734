//! Generation stream events and the line decoder that reassembles them from
//! arbitrary transport chunks.

use serde_json::Value;
use tracing::debug;

/// One complete file delivered by the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub content: String,
    /// Type hint as sent (`html`, `css`, `javascript`, a MIME type, ...).
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Status {
        message: String,
        stage: Option<String>,
    },
    CodeChunk {
        chunk: String,
    },
    File(FileEntry),
    Complete {
        response: Value,
        is_multi_file: bool,
    },
    Error {
        error: String,
    },
}

/// A line that carried data but could not be turned into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Malformed {
    pub line: String,
    pub reason: String,
}

impl StreamEvent {
    /// `Ok(None)` for an unknown `type`; `Err` with a reason for a malformed payload.
    pub fn from_value(value: &Value) -> Result<Option<Self>, String> {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Err("missing event type".to_string());
        };
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        let event = match kind {
            "status" => StreamEvent::Status {
                message: text("message").unwrap_or_default(),
                stage: text("stage"),
            },
            "code_chunk" | "chunk" => StreamEvent::CodeChunk {
                chunk: text("chunk").or_else(|| text("content")).unwrap_or_default(),
            },
            "file" => StreamEvent::File(file_entry(value.get("file").unwrap_or(value))?),
            "complete" => StreamEvent::Complete {
                response: value.get("response").cloned().unwrap_or(Value::Null),
                is_multi_file: value
                    .get("isMultiFile")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            "error" => StreamEvent::Error {
                error: text("error")
                    .or_else(|| text("message"))
                    .unwrap_or_else(|| "generation failed".to_string()),
            },
            other => {
                debug!(kind = other, "ignoring unknown stream event");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

/// File payloads come flat on the event or nested under `file`.
fn file_entry(value: &Value) -> Result<FileEntry, String> {
    let name = ["name", "path", "filename"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| "file event without a name".to_string())?;
    let content = match value.get("content") {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(_) => return Err(format!("content of '{}' is not a string", name)),
    };
    let file_type = ["type", "fileType", "language"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|t| *t != "file")
        .map(str::to_string);
    Ok(FileEntry {
        name: name.to_string(),
        content,
        file_type,
    })
}

/// Splits a chunked byte stream into `prefix`-framed JSON events.
///
/// Lines may be split anywhere, including inside a UTF-8 sequence. Blank
/// lines, comment lines (`:`), lines without the prefix and the `[DONE]`
/// sentinel are dropped.
pub struct LineDecoder {
    prefix: String,
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            buf: Vec::new(),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, Malformed>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(nl) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=nl).collect();
            self.decode_line(&line, &mut out);
        }
        out
    }

    /// Flushes a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<Result<StreamEvent, Malformed>> {
        let mut out = Vec::new();
        if !self.buf.is_empty() {
            let line = std::mem::take(&mut self.buf);
            self.decode_line(&line, &mut out);
        }
        out
    }

    fn decode_line(&self, raw: &[u8], out: &mut Vec<Result<StreamEvent, Malformed>>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() || line.starts_with(':') {
            return;
        }
        let Some(payload) = self.strip_prefix(line) else {
            debug!(line, "ignoring line without data prefix");
            return;
        };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            return;
        }
        let malformed = |reason: String| Malformed {
            line: line.to_string(),
            reason,
        };
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => match StreamEvent::from_value(&value) {
                Ok(Some(event)) => out.push(Ok(event)),
                Ok(None) => {}
                Err(reason) => out.push(Err(malformed(reason))),
            },
            Err(e) => out.push(Err(malformed(e.to_string()))),
        }
    }

    /// Accepts the prefix with or without its trailing whitespace (`data:` vs `data: `).
    fn strip_prefix<'a>(&self, line: &'a str) -> Option<&'a str> {
        line.strip_prefix(self.prefix.as_str())
            .or_else(|| line.strip_prefix(self.prefix.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn events(results: Vec<Result<StreamEvent, Malformed>>) -> Vec<StreamEvent> {
        results.into_iter().filter_map(Result::ok).collect()
    }

    #[test]
    fn test_nested_and_flat_file_payloads() {
        let nested = json!({"type":"file","file":{"name":"a.css","content":"x","type":"css"}});
        let flat = json!({"type":"file","name":"b.js","content":"y","fileType":"javascript"});
        assert_eq!(
            StreamEvent::from_value(&nested).unwrap(),
            Some(StreamEvent::File(FileEntry {
                name: "a.css".into(),
                content: "x".into(),
                file_type: Some("css".into()),
            }))
        );
        match StreamEvent::from_value(&flat).unwrap() {
            Some(StreamEvent::File(f)) => {
                assert_eq!(f.name, "b.js");
                assert_eq!(f.file_type.as_deref(), Some("javascript"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_malformed_and_unknown() {
        assert!(StreamEvent::from_value(&json!({"type":"file","file":{"content":"x"}})).is_err());
        assert!(StreamEvent::from_value(&json!({"message":"no type"})).is_err());
        assert_eq!(StreamEvent::from_value(&json!({"type":"ping"})).unwrap(), None);
    }

    #[test]
    fn test_lines_split_across_chunks() {
        let mut d = LineDecoder::new("data: ");
        let mut got = d.push(b"data: {\"type\":\"status\",\"mess");
        assert!(got.is_empty());
        got.extend(d.push(b"age\":\"Thinking...\"}\n\ndata: {\"type\":\"code_chunk\",\"chunk\":\"<h1>\"}\n"));
        assert_eq!(
            events(got),
            vec![
                StreamEvent::Status {
                    message: "Thinking...".into(),
                    stage: None
                },
                StreamEvent::CodeChunk {
                    chunk: "<h1>".into()
                },
            ]
        );
    }

    #[test]
    fn test_multibyte_split() {
        let line = "data: {\"type\":\"code_chunk\",\"chunk\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.len() - 5;
        let mut d = LineDecoder::new("data: ");
        let mut got = d.push(&line[..split]);
        got.extend(d.push(&line[split..]));
        assert_eq!(
            events(got),
            vec![StreamEvent::CodeChunk {
                chunk: "caf\u{e9}".into()
            }]
        );
    }

    #[test]
    fn test_sentinels_comments_and_bad_json() {
        let mut d = LineDecoder::new("data: ");
        let got = d.push(b": keep-alive\r\nevent: x\r\ndata: [DONE]\r\ndata: {oops}\r\n");
        assert_eq!(got.len(), 1);
        assert!(got[0].is_err());
    }

    #[test]
    fn test_finish_flushes_tail() {
        let mut d = LineDecoder::new("data: ");
        assert!(d.push(b"data:{\"type\":\"error\",\"error\":\"boom\"}").is_empty());
        assert_eq!(
            events(d.finish()),
            vec![StreamEvent::Error {
                error: "boom".into()
            }]
        );
        assert!(d.finish().is_empty());
    }
}
