//! Debounced re-render.
//!
//! A tokio task owns the surface. Every scheduled document resets the
//! debounce timer; when it fires, the latest document is loaded unless it is
//! byte-identical to what the surface already shows. Each load starts a new
//! render generation whose token is published on a `watch` channel.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{PreviewError, PreviewResult};
use crate::protocol::{HostMessage, SurfaceToken};
use crate::surface::RenderSurface;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

enum Command {
    Schedule(String),
    Post(HostMessage),
    /// Load the pending document now, then acknowledge.
    Flush(oneshot::Sender<()>),
}

pub struct RenderScheduler {
    commands: mpsc::UnboundedSender<Command>,
    tokens: watch::Receiver<SurfaceToken>,
    task: JoinHandle<()>,
}

impl RenderScheduler {
    /// Spawns the render task on the current runtime.
    pub fn spawn<S>(surface: S, debounce: Duration) -> Self
    where
        S: RenderSurface + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let (token_tx, tokens) = watch::channel(0);
        let task = tokio::spawn(run(surface, debounce, rx, token_tx));
        Self {
            commands,
            tokens,
            task,
        }
    }

    /// Queue a document for rendering. Only the last one in a burst is loaded.
    pub fn schedule(&self, document: String) -> PreviewResult<()> {
        self.commands
            .send(Command::Schedule(document))
            .map_err(|_| PreviewError::SchedulerClosed)
    }

    /// Post a host message to the surface currently loaded.
    pub fn post(&self, message: HostMessage) -> PreviewResult<()> {
        self.commands
            .send(Command::Post(message))
            .map_err(|_| PreviewError::SchedulerClosed)
    }

    /// Skip the remaining debounce window.
    pub async fn flush(&self) -> PreviewResult<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Flush(tx))
            .map_err(|_| PreviewError::SchedulerClosed)?;
        rx.await.map_err(|_| PreviewError::SchedulerClosed)
    }

    /// Token of the most recent load (0 before the first).
    pub fn current_token(&self) -> SurfaceToken {
        *self.tokens.borrow()
    }

    pub fn tokens(&self) -> watch::Receiver<SurfaceToken> {
        self.tokens.clone()
    }

    /// Stops the task after it drains queued commands.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Render task ended abnormally");
        }
    }
}

struct RenderLoop<S> {
    surface: S,
    tokens: watch::Sender<SurfaceToken>,
    pending: Option<String>,
    loaded: Option<String>,
    token: SurfaceToken,
}

impl<S: RenderSurface> RenderLoop<S> {
    fn load_pending(&mut self) {
        let Some(document) = self.pending.take() else {
            return;
        };
        if self.loaded.as_deref() == Some(document.as_str()) {
            debug!(token = self.token, "Skipping render of identical document");
            return;
        }
        self.token += 1;
        // Publish before loading so the ready handshake is accepted.
        self.tokens.send_replace(self.token);
        match self.surface.load(self.token, &document) {
            Ok(()) => {
                debug!(token = self.token, bytes = document.len(), "Rendered document");
                self.loaded = Some(document);
            }
            Err(e) => warn!(token = self.token, error = %e, "Surface failed to load document"),
        }
    }

    fn post(&mut self, message: HostMessage) {
        if self.token == 0 {
            debug!(?message, "No surface loaded yet; dropping host message");
            return;
        }
        if let Err(e) = self.surface.post(self.token, &message) {
            warn!(token = self.token, error = %e, "Failed to post host message");
        }
    }
}

async fn run<S: RenderSurface>(
    surface: S,
    debounce: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    tokens: watch::Sender<SurfaceToken>,
) {
    let mut state = RenderLoop {
        surface,
        tokens,
        pending: None,
        loaded: None,
        token: 0,
    };
    let timer = sleep(debounce);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Schedule(document)) => {
                    state.pending = Some(document);
                    timer.as_mut().reset(Instant::now() + debounce);
                }
                Some(Command::Post(message)) => state.post(message),
                Some(Command::Flush(ack)) => {
                    state.load_pending();
                    let _ = ack.send(());
                }
                None => {
                    state.load_pending();
                    break;
                }
            },
            () = &mut timer, if state.pending.is_some() => state.load_pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessSurface;

    #[tokio::test(start_paused = true)]
    async fn test_burst_loads_once() {
        let (surface, _rx) = HeadlessSurface::new();
        let scheduler = RenderScheduler::spawn(surface.clone(), DEFAULT_DEBOUNCE);
        for i in 0..5 {
            scheduler.schedule(format!("<p>{}</p>", i)).unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(surface.load_count(), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(surface.load_count(), 1);
        assert_eq!(surface.source(), "<p>4</p>");
        assert_eq!(scheduler.current_token(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_document_skipped() {
        let (surface, _rx) = HeadlessSurface::new();
        let scheduler = RenderScheduler::spawn(surface.clone(), DEFAULT_DEBOUNCE);
        scheduler.schedule("<p>a</p>".into()).unwrap();
        scheduler.flush().await.unwrap();
        scheduler.schedule("<p>a</p>".into()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(surface.load_count(), 1);
        scheduler.schedule("<p>b</p>".into()).unwrap();
        scheduler.flush().await.unwrap();
        assert_eq!(surface.load_count(), 2);
        assert_eq!(scheduler.current_token(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_reaches_current_surface() {
        let (surface, _rx) = HeadlessSurface::new();
        let scheduler = RenderScheduler::spawn(surface.clone(), DEFAULT_DEBOUNCE);
        scheduler.post(HostMessage::SelectMode { enabled: true }).unwrap();
        scheduler.schedule("<p>a</p>".into()).unwrap();
        scheduler.flush().await.unwrap();
        scheduler.post(HostMessage::SelectMode { enabled: true }).unwrap();
        scheduler.flush().await.unwrap();
        assert!(surface.select_mode());
        assert_eq!(surface.received().len(), 1);
        scheduler.shutdown().await;
    }
}
