use crate::error::PreviewResult;
use crate::protocol::{HostMessage, SurfaceToken};

/// The isolated context a preview document is rendered into.
///
/// Implementations deliver sandbox → host envelopes out of band (for a
/// webview that is `postMessage`; the headless surface uses a channel).
pub trait RenderSurface: Send {
    /// Replace the rendered document. `token` identifies this render generation.
    fn load(&mut self, token: SurfaceToken, document: &str) -> PreviewResult<()>;

    /// Fire-and-forget delivery of a host message to the surface with `token`.
    fn post(&mut self, token: SurfaceToken, message: &HostMessage) -> PreviewResult<()>;
}
