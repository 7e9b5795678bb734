//! Sandboxed preview for generated pages.
//!
//! - [`renderer`] assembles HTML/CSS/JS into one document and injects the
//!   interaction script; it also builds the export bundle.
//! - [`protocol`] and [`channel`] define and enforce the envelope that
//!   crosses the sandbox boundary.
//! - [`scheduler`] debounces re-renders onto a [`surface::RenderSurface`].
//! - [`headless`] is an in-process surface with the interaction script's semantics.

pub mod channel;
pub mod error;
pub mod headless;
pub mod protocol;
pub mod renderer;
pub mod scheduler;
pub mod surface;

pub use channel::{HostChannel, Received, ResizeClamp};
pub use error::{PreviewError, PreviewResult};
pub use headless::{internal_link_target, HeadlessSurface};
pub use protocol::{
    decode_sandbox_message, Envelope, HostMessage, SandboxMessage, Selection, SurfaceToken,
};
pub use renderer::{assemble, srcdoc_frame, ExportBundle, PreviewSources};
pub use scheduler::{RenderScheduler, DEFAULT_DEBOUNCE};
pub use surface::RenderSurface;
