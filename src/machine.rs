/// Generation state machine: the single source of truth for whether a
/// continuation is being produced, and what the last outcome was.
///
/// States:
///   idle       : resting; accepts GENERATE
///   generating : one adapter call in flight; accepts only its outcome
///   failure    : last attempt failed; accepts RETRY and GENERATE
///
/// The user events GENERATE and RETRY are methods on a [`Ready`] handle,
/// which `ready()` hands out in `idle` and `failure` alone. The adapter outcome is only accepted
/// together with the [`InFlight`] token minted by the accepted GENERATE, so a
/// second concurrent generation cannot be expressed.
///
/// Every change of mode is reported to subscribed [`TransitionListener`]s, in
/// order, after the context update has been fully applied.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ProviderError;

static NEXT_MACHINE_ID: AtomicU64 = AtomicU64::new(1);

// ── Orchestration context ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationContext {
    /// Human-readable reason of the last failure; None once cleared.
    pub error: Option<String>,
    /// Last successful continuation. Kept for the session; the sync bridge
    /// reacts to the success edge, not to this being set.
    pub last_generated_text: Option<String>,
}

// ── Requests and events ───────────────────────────────────────────────────────

/// Snapshot of the document taken when a generation is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub current_text: String,
}

impl GenerationRequest {
    pub fn new(current_text: impl Into<String>) -> Self {
        Self { current_text: current_text.into() }
    }
}

/// Proof that a GENERATE was accepted. Consumed by [`GenerationMachine::complete`].
#[derive(Debug)]
#[must_use = "the in-flight token is the only way to report the outcome"]
pub struct InFlight {
    machine: u64,
    episode: u64,
    request: GenerationRequest,
}

impl InFlight {
    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }
}

// ── Modes and transitions ─────────────────────────────────────────────────────

enum Phase {
    Idle,
    Generating(GenerationRequest),
    /// Reason lives in `OrchestrationContext::error`.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Idle,
    Generating,
    Failure,
}

impl ModeKind {
    pub fn label(self) -> &'static str {
        match self {
            ModeKind::Idle => "idle",
            ModeKind::Generating => "generating",
            ModeKind::Failure => "failure",
        }
    }
}

impl Phase {
    fn kind(&self) -> ModeKind {
        match self {
            Phase::Idle => ModeKind::Idle,
            Phase::Generating(_) => ModeKind::Generating,
            Phase::Failure => ModeKind::Failure,
        }
    }
}

/// What drove a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    Generate,
    Retry,
    Succeeded,
    Failed,
}

/// One observed change of mode, with the context as it stands afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ModeKind,
    pub to: ModeKind,
    pub cause: Cause,
    /// Generation episode this transition belongs to (1-based).
    pub episode: u64,
    pub context: OrchestrationContext,
}

impl Transition {
    /// The one edge on which a fresh continuation is available.
    pub fn is_success_edge(&self) -> bool {
        self.from == ModeKind::Generating && self.to == ModeKind::Idle
    }
}

pub trait TransitionListener {
    fn on_transition(&mut self, transition: &Transition);
}

impl<F: FnMut(&Transition)> TransitionListener for F {
    fn on_transition(&mut self, transition: &Transition) {
        self(transition)
    }
}

// ── Machine ───────────────────────────────────────────────────────────────────

pub struct GenerationMachine {
    id: u64,
    phase: Phase,
    context: OrchestrationContext,
    episode: u64,
    listeners: Vec<Box<dyn TransitionListener>>,
}

impl Default for GenerationMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationMachine {
    pub fn new() -> Self {
        Self {
            id: NEXT_MACHINE_ID.fetch_add(1, Ordering::Relaxed),
            phase: Phase::Idle,
            context: OrchestrationContext::default(),
            episode: 0,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl TransitionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn mode(&self) -> ModeKind {
        self.phase.kind()
    }

    pub fn context(&self) -> &OrchestrationContext {
        &self.context
    }

    /// The request currently being served, if any.
    pub fn pending_request(&self) -> Option<&GenerationRequest> {
        match &self.phase {
            Phase::Generating(req) => Some(req),
            _ => None,
        }
    }

    /// Handle for sending user events. None while generating.
    pub fn ready(&mut self) -> Option<Ready<'_>> {
        match self.phase {
            Phase::Idle | Phase::Failure => Some(Ready { machine: self }),
            Phase::Generating(_) => None,
        }
    }

    /// Apply the adapter outcome for the episode `flight` was issued for.
    pub fn complete(&mut self, flight: InFlight, outcome: Result<String, ProviderError>) {
        let ours = flight.machine == self.id && flight.episode == self.episode;
        if !ours || !matches!(self.phase, Phase::Generating(_)) {
            // Only reachable with a token from another machine instance.
            tracing::warn!(
                machine = flight.machine,
                episode = flight.episode,
                current = self.episode,
                "ignoring completion for an episode that is not in flight"
            );
            return;
        }

        let outcome = outcome.and_then(|text| {
            if text.trim().is_empty() {
                Err(ProviderError::EmptyResponse)
            } else {
                Ok(text)
            }
        });

        match outcome {
            Ok(text) => {
                self.context.last_generated_text = Some(text);
                self.context.error = None;
                self.transition(Phase::Idle, Cause::Succeeded);
            }
            Err(e) => {
                self.context.error = Some(e.normalized());
                self.transition(Phase::Failure, Cause::Failed);
            }
        }
    }

    fn transition(&mut self, next: Phase, cause: Cause) {
        let from = self.phase.kind();
        self.phase = next;
        let transition = Transition {
            from,
            to: self.phase.kind(),
            cause,
            episode: self.episode,
            context: self.context.clone(),
        };
        tracing::debug!(
            from = from.label(),
            to = transition.to.label(),
            ?cause,
            episode = self.episode,
            "generation state transition"
        );
        for listener in &mut self.listeners {
            listener.on_transition(&transition);
        }
    }
}

// ── Ready handle ──────────────────────────────────────────────────────────────

/// Borrow of a machine that is able to accept user events.
pub struct Ready<'a> {
    machine: &'a mut GenerationMachine,
}

impl Ready<'_> {
    /// GENERATE: clears the error and enters `generating`; the caller must run the
    /// adapter and report back with the returned token.
    pub fn generate(self, request: GenerationRequest) -> InFlight {
        let machine = self.machine;
        machine.episode += 1;
        machine.context.error = None;
        machine.transition(Phase::Generating(request.clone()), Cause::Generate);
        InFlight { machine: machine.id, episode: machine.episode, request }
    }

    /// RETRY: dismiss the current error. A no-op from `idle`.
    pub fn retry(self) {
        let machine = self.machine;
        if let Phase::Failure = machine.phase {
            machine.context.error = None;
            machine.transition(Phase::Idle, Cause::Retry);
        }
    }
}
