//! Wait-state controller: what the person sees between submit and image.
//!
//! ```text
//! Idle ──Submit──▶ Submitting ──Succeeded──▶ AwaitingRender ──Loaded─────▶ Ready
//!                      │                          └─────────LoadFailed──▶ Failed
//!                      └──ProviderFailed──▶ Idle
//! any ──Submit──▶ Submitting        any ──Clear──▶ Idle
//! ```
//!
//! [`transition`] is the only place states change. Every submission gets a
//! [`Ticket`]; results and display callbacks carrying a superseded ticket are
//! discarded. The elapsed counter ticks once per second while, and only while,
//! the state is `AwaitingRender`.

use crate::composer::ComposerClient;
use crate::display::DisplaySurface;
use crate::error::{ErrorKind, PromptCanvasError, Result};
use crate::image::ImageRef;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Typical generation time the progress bar is scaled against.
pub const EXPECTED_RENDER_WINDOW: Duration = Duration::from_secs(20);

/// Progress is held here until the image actually loads.
const MAX_PENDING_PROGRESS: f32 = 0.95;

const TICK: Duration = Duration::from_secs(1);

/// User-visible generation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Waiting on the generation boundary.
    Submitting,
    /// Reference received; the display surface is loading it.
    AwaitingRender,
    /// Image displayed.
    Ready,
    /// The display surface could not load the image.
    Failed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    /// A new, valid submission.
    Submit,
    /// The boundary returned an image reference.
    Succeeded,
    /// The boundary returned a failure.
    ProviderFailed,
    /// The display surface loaded the image.
    Loaded,
    /// The display surface failed to load the image.
    LoadFailed,
    /// Explicit reset.
    Clear,
}

/// The transition table. `None` means the event does not apply in `state`.
pub fn transition(state: WaitState, event: WaitEvent) -> Option<WaitState> {
    use WaitEvent::*;
    use WaitState::*;

    match (state, event) {
        (_, Submit) => Some(Submitting),
        (_, Clear) => Some(Idle),
        (Submitting, Succeeded) => Some(AwaitingRender),
        (Submitting, ProviderFailed) => Some(Idle),
        (AwaitingRender, Loaded) => Some(Ready),
        (AwaitingRender, LoadFailed) => Some(Failed),
        _ => None,
    }
}

/// Identifies one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ticket(u64);

impl Ticket {
    /// Returns the raw sequence number.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A message for the person waiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Failure kind, `None` for informational notices.
    pub kind: Option<ErrorKind>,
    /// Human-readable text.
    pub message: String,
    /// Diagnostic detail, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
            detail: None,
        }
    }

    fn from_error(err: &PromptCanvasError) -> Self {
        let detail = match err {
            PromptCanvasError::Render(reason) => Some(reason.clone()),
            other => other.provider_detail(),
        };
        Self {
            kind: Some(err.kind()),
            message: err.user_message().to_string(),
            detail,
        }
    }

    /// Returns true if this notice reports a failure.
    pub fn is_error(&self) -> bool {
        self.kind.is_some()
    }
}

/// Everything an observer needs to draw the waiting experience.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WaitSnapshot {
    /// Ticket of the submission this snapshot describes. 0 before any.
    pub ticket: u64,
    /// Current state.
    pub state: WaitState,
    /// Seconds spent in `AwaitingRender`; frozen once it is left.
    pub elapsed_secs: u64,
    /// Whether the elapsed counter is running.
    pub ticking: bool,
    /// Reference handed to the display surface.
    #[serde(skip)]
    pub image: Option<ImageRef>,
    /// Last notice.
    pub notice: Option<Notice>,
}

/// Running elapsed-time counter. Dropping it stops the task.
struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    fn start(snapshots: Arc<watch::Sender<WaitSnapshot>>, ticket: Ticket) -> Option<Self> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::debug!("no tokio runtime; elapsed counter disabled");
                return None;
            }
        };

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;
                let mut still_waiting = true;
                snapshots.send_modify(|s| {
                    if s.ticket == ticket.0 && s.state == WaitState::AwaitingRender {
                        s.elapsed_secs += 1;
                    } else {
                        still_waiting = false;
                    }
                });
                if !still_waiting {
                    break;
                }
            }
        });
        Some(Self { handle })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owns the single active [`WaitState`] and its elapsed counter.
///
/// Methods take `&mut self`: one task drives the controller, observers
/// follow along through [`WaitController::subscribe`].
pub struct WaitController {
    snapshots: Arc<watch::Sender<WaitSnapshot>>,
    last_ticket: u64,
    ticker: Option<Ticker>,
}

impl Default for WaitController {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitController {
    /// Creates a controller in `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(WaitSnapshot::default());
        Self {
            snapshots: Arc::new(tx),
            last_ticket: 0,
            ticker: None,
        }
    }

    /// Subscribes to snapshot updates, including elapsed ticks.
    pub fn subscribe(&self) -> watch::Receiver<WaitSnapshot> {
        self.snapshots.subscribe()
    }

    /// Returns a copy of the current snapshot.
    pub fn snapshot(&self) -> WaitSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns the current state.
    pub fn state(&self) -> WaitState {
        self.snapshots.borrow().state
    }

    /// Returns the elapsed seconds of the current or last render wait.
    pub fn elapsed_secs(&self) -> u64 {
        self.snapshots.borrow().elapsed_secs
    }

    /// Returns true while the elapsed counter runs.
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// Returns the ticket of the active submission.
    pub fn current_ticket(&self) -> Option<Ticket> {
        (self.last_ticket > 0).then_some(Ticket(self.last_ticket))
    }

    /// Returns the last notice.
    pub fn notice(&self) -> Option<Notice> {
        self.snapshots.borrow().notice.clone()
    }

    /// Returns the image handed to the display surface, if any.
    pub fn image(&self) -> Option<ImageRef> {
        self.snapshots.borrow().image.clone()
    }

    /// Progress bar fraction in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        let snapshot = self.snapshots.borrow();
        match snapshot.state {
            WaitState::Ready => 1.0,
            WaitState::AwaitingRender => {
                let fraction =
                    snapshot.elapsed_secs as f32 / EXPECTED_RENDER_WINDOW.as_secs_f32();
                fraction.min(MAX_PENDING_PROGRESS)
            }
            _ => 0.0,
        }
    }

    /// Starts a new submission, superseding any previous one.
    pub fn submit(&mut self) -> Ticket {
        self.last_ticket += 1;
        let ticket = Ticket(self.last_ticket);
        self.apply(WaitEvent::Submit, |s| {
            s.ticket = ticket.0;
            s.elapsed_secs = 0;
            s.image = None;
            s.notice = None;
        });
        tracing::debug!(ticket = ticket.0, "submission started");
        ticket
    }

    /// Surfaces a failure that happened before submission (e.g. empty prompt).
    ///
    /// No transition: the current state is left as it is.
    pub fn reject(&mut self, err: &PromptCanvasError) {
        let notice = Notice::from_error(err);
        self.snapshots.send_modify(|s| s.notice = Some(notice));
    }

    /// Applies the boundary's answer for `ticket`.
    ///
    /// Returns the reference to hand to the display surface, or `None` if the
    /// submission failed or was superseded.
    pub fn resolve(&mut self, ticket: Ticket, result: Result<ImageRef>) -> Option<ImageRef> {
        if !self.is_current(ticket) {
            tracing::debug!(ticket = ticket.0, "discarding superseded result");
            return None;
        }

        match result {
            Ok(image) => {
                let applied = self.apply(WaitEvent::Succeeded, |s| {
                    s.elapsed_secs = 0;
                    s.image = Some(image.clone());
                });
                applied.then_some(image)
            }
            Err(err) => {
                let notice = Notice::from_error(&err);
                tracing::warn!(ticket = ticket.0, kind = %err.kind(), "generation failed: {err}");
                self.apply(WaitEvent::ProviderFailed, |s| s.notice = Some(notice));
                None
            }
        }
    }

    /// Display surface reports the image loaded.
    pub fn on_load(&mut self, ticket: Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.apply(WaitEvent::Loaded, |s| {
            s.notice = Some(Notice::info("Image generated successfully!"));
        })
    }

    /// Display surface reports the image could not be loaded.
    pub fn on_error(&mut self, ticket: Ticket, reason: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let notice = Notice::from_error(&PromptCanvasError::Render(reason.into()));
        self.apply(WaitEvent::LoadFailed, |s| s.notice = Some(notice))
    }

    /// Resets to `Idle` and supersedes anything in flight.
    pub fn clear(&mut self) {
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        self.apply(WaitEvent::Clear, |s| {
            *s = WaitSnapshot {
                ticket,
                ..WaitSnapshot::default()
            };
        });
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.last_ticket && self.snapshots.borrow().ticket == ticket.0
    }

    /// Runs `event` through the table and publishes the result.
    fn apply(&mut self, event: WaitEvent, update: impl FnOnce(&mut WaitSnapshot)) -> bool {
        let from = self.state();
        let Some(to) = transition(from, event) else {
            tracing::debug!(?from, ?event, "ignored event");
            return false;
        };

        // The counter never survives a state change.
        self.ticker = None;

        let ticking = to == WaitState::AwaitingRender;
        self.snapshots.send_modify(|s| {
            update(s);
            s.state = to;
            s.ticking = ticking;
        });

        if ticking {
            let ticket = Ticket(self.last_ticket);
            self.ticker = Ticker::start(Arc::clone(&self.snapshots), ticket);
        }
        tracing::debug!(?from, ?to, ?event, "wait state changed");
        true
    }

    /// Runs one submission end to end: compose, submit, display.
    ///
    /// Returns the state the submission settled in.
    pub async fn run(
        &mut self,
        client: &ComposerClient,
        surface: &dyn DisplaySurface,
        raw_prompt: &str,
        style: &str,
    ) -> WaitState {
        let request = match client.composer().compose(raw_prompt, style) {
            Ok(request) => request,
            Err(err) => {
                self.reject(&err);
                return self.state();
            }
        };

        let ticket = self.submit();
        let result = client.boundary().submit(&request).await;
        let Some(image) = self.resolve(ticket, result) else {
            return self.state();
        };

        match surface.load(&image).await {
            Ok(()) => {
                self.on_load(ticket);
            }
            Err(err) => {
                self.on_error(ticket, err.to_string());
            }
        }
        self.state()
    }
}
