//! Host side of the sandbox message channel.

use tokio::sync::watch;
use tracing::debug;

use crate::protocol::{
    decode_sandbox_message, Envelope, HostMessage, SandboxMessage, Selection, SurfaceToken,
};

/// Bounds applied to heights reported by the sandbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeClamp {
    pub min: f64,
    pub max: f64,
}

impl Default for ResizeClamp {
    fn default() -> Self {
        Self {
            min: 100.0,
            max: 20_000.0,
        }
    }
}

impl ResizeClamp {
    pub fn clamp(&self, height: f64) -> f64 {
        if height.is_nan() {
            return self.min;
        }
        height.clamp(self.min, self.max.max(self.min))
    }
}

/// What the host should do with an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// Stale, unsourced or redundant; nothing to do.
    Ignored,
    /// Post this back to the active surface.
    Reply(HostMessage),
    Selected(Selection),
    Navigate(String),
    Resized(f64),
}

pub struct HostChannel {
    active: watch::Receiver<SurfaceToken>,
    select_mode: bool,
    clamp: ResizeClamp,
    height: Option<f64>,
}

impl HostChannel {
    /// `active` tracks the token of the surface currently loaded.
    pub fn new(active: watch::Receiver<SurfaceToken>, clamp: ResizeClamp) -> Self {
        Self {
            active,
            select_mode: false,
            clamp,
            height: None,
        }
    }

    pub fn active_token(&self) -> SurfaceToken {
        *self.active.borrow()
    }

    pub fn select_mode(&self) -> bool {
        self.select_mode
    }

    /// Last clamped content height.
    pub fn height(&self) -> Option<f64> {
        self.height
    }

    /// Records the mode and returns the message to post to the active surface.
    pub fn set_select_mode(&mut self, enabled: bool) -> HostMessage {
        self.select_mode = enabled;
        HostMessage::SelectMode { enabled }
    }

    pub fn receive_raw(&mut self, raw: &str) -> Received {
        match decode_sandbox_message(raw) {
            Some(envelope) => self.receive(envelope),
            None => Received::Ignored,
        }
    }

    pub fn receive(&mut self, envelope: Envelope<SandboxMessage>) -> Received {
        let active = self.active_token();
        if envelope.source != Some(active) {
            debug!(source = ?envelope.source, active, "Ignoring message from stale surface");
            return Received::Ignored;
        }

        match envelope.message {
            SandboxMessage::Ready => Received::Reply(HostMessage::SelectMode {
                enabled: self.select_mode,
            }),
            SandboxMessage::Select(selection) => {
                if !self.select_mode {
                    debug!(path = %selection.path, "Ignoring select outside selection mode");
                    return Received::Ignored;
                }
                Received::Selected(selection)
            }
            SandboxMessage::Navigate { path } => {
                if path.trim().is_empty() {
                    return Received::Ignored;
                }
                Received::Navigate(path)
            }
            SandboxMessage::Resize { height } => {
                let clamped = self.clamp.clamp(height);
                if self.height == Some(clamped) {
                    return Received::Ignored;
                }
                self.height = Some(clamped);
                Received::Resized(clamped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inai_markup::ElementPath;

    fn channel(token: SurfaceToken) -> (watch::Sender<SurfaceToken>, HostChannel) {
        let (tx, rx) = watch::channel(token);
        (tx, HostChannel::new(rx, ResizeClamp::default()))
    }

    #[test]
    fn test_ready_replays_select_mode() {
        let (_tx, mut ch) = channel(2);
        ch.set_select_mode(true);
        assert_eq!(
            ch.receive_raw(r#"{"type":"ready","source":2}"#),
            Received::Reply(HostMessage::SelectMode { enabled: true })
        );
    }

    #[test]
    fn test_stale_and_unsourced_messages_ignored() {
        let (tx, mut ch) = channel(1);
        tx.send(2).unwrap();
        assert_eq!(
            ch.receive_raw(r#"{"type":"navigate","source":1,"path":"about.html"}"#),
            Received::Ignored
        );
        assert_eq!(
            ch.receive_raw(r#"{"type":"navigate","path":"about.html"}"#),
            Received::Ignored
        );
        assert_eq!(
            ch.receive_raw(r#"{"type":"navigate","source":2,"path":"about.html"}"#),
            Received::Navigate("about.html".into())
        );
    }

    #[test]
    fn test_select_requires_mode() {
        let (_tx, mut ch) = channel(1);
        let raw = r#"{"type":"select","source":1,"path":[0],"tagName":"P"}"#;
        assert_eq!(ch.receive_raw(raw), Received::Ignored);
        ch.set_select_mode(true);
        match ch.receive_raw(raw) {
            Received::Selected(sel) => assert_eq!(sel.path, ElementPath::new(vec![0])),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resize_is_clamped() {
        let (_tx, mut ch) = channel(1);
        assert_eq!(
            ch.receive_raw(r#"{"type":"resize","source":1,"height":12}"#),
            Received::Resized(100.0)
        );
        assert_eq!(
            ch.receive_raw(r#"{"type":"resize","source":1,"height":5}"#),
            Received::Ignored
        );
        assert_eq!(
            ch.receive_raw(r#"{"type":"resize","source":1,"height":1e9}"#),
            Received::Resized(20_000.0)
        );
        assert_eq!(ch.height(), Some(20_000.0));
    }

    #[test]
    fn test_malformed_ignored() {
        let (_tx, mut ch) = channel(1);
        assert_eq!(ch.receive_raw("{"), Received::Ignored);
        assert_eq!(ch.receive_raw(r#"{"type":"explode","source":1}"#), Received::Ignored);
    }
}
