/// Orchestration entry point: the user-facing trigger.
///
/// Owns the state machine (with the document sync bridge subscribed to it),
/// a handle on the document and the continuation provider. The adapter call
/// is handed out as a [`PendingGeneration`] so the caller decides where it
/// runs: the TUI spawns it and feeds the result back through its event
/// channel, headless mode just awaits it.
use std::sync::Arc;

use crate::bridge::DocumentSyncBridge;
use crate::continuation::ContinuationProvider;
use crate::error::{ProviderError, TriggerError};
use crate::machine::{GenerationMachine, GenerationRequest, InFlight, ModeKind};
use crate::surface::{DocumentSurface, SharedDocument};

// ── Pending / finished adapter calls ──────────────────────────────────────────

/// An accepted GENERATE whose adapter call has not run yet.
#[must_use = "the machine stays in `generating` until the outcome is reported"]
pub struct PendingGeneration {
    flight: InFlight,
    provider: Arc<dyn ContinuationProvider>,
}

impl PendingGeneration {
    pub fn request(&self) -> &GenerationRequest {
        self.flight.request()
    }

    /// The one suspension point of the core.
    pub async fn run(self) -> FinishedGeneration {
        let outcome = self
            .provider
            .generate(&self.flight.request().current_text)
            .await;
        if let Err(e) = &outcome {
            tracing::warn!(episode = self.flight.episode(), error = %e, "continuation failed");
        }
        FinishedGeneration { flight: self.flight, outcome }
    }
}

#[derive(Debug)]
pub struct FinishedGeneration {
    flight: InFlight,
    outcome: Result<String, ProviderError>,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Orchestrator<D: DocumentSurface + 'static> {
    machine: GenerationMachine,
    document: SharedDocument<D>,
    provider: Arc<dyn ContinuationProvider>,
}

impl<D: DocumentSurface + 'static> Orchestrator<D> {
    pub fn new(document: SharedDocument<D>, provider: Arc<dyn ContinuationProvider>) -> Self {
        let mut machine = GenerationMachine::new();
        machine.subscribe(DocumentSyncBridge::new(document.clone()));
        Self { machine, document, provider }
    }

    /// Extra observers, notified after the document bridge.
    #[cfg(test)]
    pub fn subscribe(&mut self, listener: impl crate::machine::TransitionListener + 'static) {
        self.machine.subscribe(listener);
    }

    pub fn document(&self) -> &SharedDocument<D> {
        &self.document
    }

    /// Snapshot the document and send GENERATE. Rejections leave the machine untouched.
    pub fn trigger_generation(&mut self) -> Result<PendingGeneration, TriggerError> {
        let current_text = self.document.borrow().text();
        if current_text.is_empty() {
            return Err(TriggerError::EmptyDocument);
        }
        let ready = self.machine.ready().ok_or(TriggerError::Busy)?;
        let flight = ready.generate(GenerationRequest::new(current_text));
        Ok(PendingGeneration { flight, provider: Arc::clone(&self.provider) })
    }

    /// Feed the adapter outcome back into the machine. On success the bridge
    /// appends the text to the document before this returns.
    pub fn complete(&mut self, finished: FinishedGeneration) {
        self.machine.complete(finished.flight, finished.outcome);
    }

    /// Trigger, run and complete in one go.
    pub async fn generate(&mut self) -> Result<ModeKind, TriggerError> {
        let pending = self.trigger_generation()?;
        let finished = pending.run().await;
        self.complete(finished);
        Ok(self.machine.mode())
    }

    /// Send RETRY. Ignored while a generation is in flight.
    pub fn dismiss_error(&mut self) {
        if let Some(ready) = self.machine.ready() {
            ready.retry();
        }
    }

    // ── Presentation accessors ────────────────────────────────────────────────

    pub fn mode(&self) -> ModeKind {
        self.machine.mode()
    }

    pub fn busy(&self) -> bool {
        self.machine.mode() == ModeKind::Generating
    }

    pub fn has_error(&self) -> bool {
        self.machine.context().error.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.machine.context().error.as_deref()
    }

    pub fn last_generated_text(&self) -> Option<&str> {
        self.machine.context().last_generated_text.as_deref()
    }

    /// Snapshot being continued right now, if any.
    pub fn pending_request(&self) -> Option<&GenerationRequest> {
        self.machine.pending_request()
    }
}
