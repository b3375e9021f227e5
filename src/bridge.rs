/// Document sync bridge: turns the machine's success edge into exactly one
/// append on the document.
///
/// `last_generated_text` stays set for the rest of the session once a
/// generation succeeds, so "text is present" says nothing about whether it
/// was already inserted. The bridge keys off the `generating → idle`
/// transition instead, and remembers the episode it last inserted for.
use crate::machine::{Transition, TransitionListener};
use crate::surface::{DocumentSurface, SharedDocument};

pub struct DocumentSyncBridge<D: DocumentSurface> {
    document: SharedDocument<D>,
    last_inserted_episode: Option<u64>,
}

impl<D: DocumentSurface> DocumentSyncBridge<D> {
    pub fn new(document: SharedDocument<D>) -> Self {
        Self { document, last_inserted_episode: None }
    }
}

impl<D: DocumentSurface> TransitionListener for DocumentSyncBridge<D> {
    fn on_transition(&mut self, transition: &Transition) {
        if !transition.is_success_edge() {
            return;
        }
        if self.last_inserted_episode == Some(transition.episode) {
            tracing::warn!(
                episode = transition.episode,
                "success edge seen twice; not inserting again"
            );
            return;
        }
        let Some(text) = transition.context.last_generated_text.as_deref() else {
            return;
        };

        let mut document = self.document.borrow_mut();
        document.append_text(text);
        document.focus();
        self.last_inserted_episode = Some(transition.episode);
        tracing::info!(episode = transition.episode, chars = text.len(), "continuation inserted");
    }
}
