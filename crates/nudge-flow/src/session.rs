use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use nudge_core::ConversationId;
use nudge_draft::DraftBatch;

use crate::confirmation::{ConfirmationQueue, PendingConfirmation};
use crate::error::{FlowError, Result};
use crate::flow::{ActiveFlow, FlowKind};

/// In-memory flow state, one entry per conversation.
///
/// Handlers `take` the flow out, work on it without holding the lock, and
/// `put` it back. Nothing here survives a restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    flows: Mutex<HashMap<ConversationId, ActiveFlow>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ConversationId, ActiveFlow>>> {
        self.flows
            .lock()
            .map_err(|e| FlowError::Session(format!("flow lock poisoned: {}", e)))
    }

    pub fn take(&self, conversation_id: ConversationId) -> Result<Option<ActiveFlow>> {
        Ok(self.lock()?.remove(&conversation_id))
    }

    /// Store the flow back. Finished flows are dropped.
    pub fn put(&self, conversation_id: ConversationId, flow: ActiveFlow) -> Result<()> {
        let mut flows = self.lock()?;
        if flow.is_finished() {
            debug!(conversation_id, %flow, "Flow finished");
            flows.remove(&conversation_id);
        } else {
            flows.insert(conversation_id, flow);
        }
        Ok(())
    }

    /// Start a new flow, replacing whatever the conversation had open.
    /// Returns the kind of the flow that was displaced.
    pub fn begin(&self, conversation_id: ConversationId, flow: ActiveFlow) -> Result<Option<FlowKind>> {
        let mut flows = self.lock()?;
        let replaced = flows.insert(conversation_id, flow).map(|old| {
            info!(conversation_id, replaced = %old, "Active flow replaced");
            old.kind()
        });
        Ok(replaced)
    }

    pub fn clear(&self, conversation_id: ConversationId) -> Result<Option<ActiveFlow>> {
        self.take(conversation_id)
    }

    /// Drop the conversation's flow unless it is of kind `keep`.
    pub fn clear_except(&self, conversation_id: ConversationId, keep: FlowKind) -> Result<()> {
        let mut flows = self.lock()?;
        if flows.get(&conversation_id).is_some_and(|f| f.kind() != keep) {
            if let Some(old) = flows.remove(&conversation_id) {
                info!(conversation_id, cleared = %old, "Active flow cleared");
            }
        }
        Ok(())
    }

    /// Append a candidate to the confirmation queue, opening the queue if
    /// needed. Returns `true` when the candidate became the head.
    pub fn enqueue_confirmation(&self, conversation_id: ConversationId, candidate: PendingConfirmation) -> Result<bool> {
        self.clear_except(conversation_id, FlowKind::Confirmation)?;
        let mut flows = self.lock()?;
        let flow = flows
            .entry(conversation_id)
            .or_insert_with(|| ActiveFlow::Confirmation(ConfirmationQueue::new()));
        match flow {
            ActiveFlow::Confirmation(queue) => {
                queue.push(candidate);
                Ok(queue.len() == 1)
            }
            other => Err(FlowError::Session(format!("expected a confirmation queue, found {}", other))),
        }
    }

    pub fn kind(&self, conversation_id: ConversationId) -> Option<FlowKind> {
        self.lock().ok()?.get(&conversation_id).map(ActiveFlow::kind)
    }

    pub fn pending_confirmations(&self, conversation_id: ConversationId) -> usize {
        match self.lock() {
            Ok(flows) => match flows.get(&conversation_id) {
                Some(ActiveFlow::Confirmation(queue)) => queue.len(),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    pub fn draft_batch(&self, conversation_id: ConversationId) -> Option<DraftBatch> {
        match self.lock().ok()?.get(&conversation_id) {
            Some(ActiveFlow::DraftReview(batch)) => Some(batch.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudge_core::{DueAt, Priority, SourceKind};

    use crate::wizard::{DeleteWizard, Wizard};

    fn candidate(title: &str) -> PendingConfirmation {
        PendingConfirmation {
            title: title.to_string(),
            topics: vec![],
            priority: Priority::Mid,
            due_at: DueAt::NONE,
            recurrence: None,
            link: String::new(),
            notes: String::new(),
        }
    }

    fn wizard() -> ActiveFlow {
        ActiveFlow::Wizard(Wizard::Delete(DeleteWizard::AwaitingId))
    }

    #[test]
    fn test_begin_replaces_existing_flow() {
        let sessions = SessionStore::new();
        sessions
            .begin(1, ActiveFlow::DraftReview(DraftBatch::new(1, SourceKind::Summary, vec![])))
            .unwrap();
        let replaced = sessions.begin(1, wizard()).unwrap();
        assert_eq!(replaced, Some(FlowKind::DraftReview));
        assert_eq!(sessions.kind(1), Some(FlowKind::Wizard));
        assert!(sessions.draft_batch(1).is_none());
    }

    #[test]
    fn test_take_put_and_finished_flows() {
        let sessions = SessionStore::new();
        sessions.begin(1, wizard()).unwrap();
        let flow = sessions.take(1).unwrap().unwrap();
        assert_eq!(sessions.kind(1), None);
        sessions.put(1, flow).unwrap();
        assert_eq!(sessions.kind(1), Some(FlowKind::Wizard));

        sessions.put(1, ActiveFlow::Confirmation(ConfirmationQueue::new())).unwrap();
        assert_eq!(sessions.kind(1), None);
    }

    #[test]
    fn test_enqueue_keeps_queue_and_clears_others() {
        let sessions = SessionStore::new();
        sessions.begin(3, wizard()).unwrap();
        assert!(sessions.enqueue_confirmation(3, candidate("a")).unwrap());
        assert!(!sessions.enqueue_confirmation(3, candidate("b")).unwrap());
        assert_eq!(sessions.pending_confirmations(3), 2);
        assert_eq!(sessions.pending_confirmations(4), 0);
    }

    #[test]
    fn test_clear_except_keeps_matching_kind() {
        let sessions = SessionStore::new();
        sessions.begin(2, wizard()).unwrap();
        sessions.clear_except(2, FlowKind::Wizard).unwrap();
        assert_eq!(sessions.kind(2), Some(FlowKind::Wizard));
        sessions.clear_except(2, FlowKind::DraftReview).unwrap();
        assert_eq!(sessions.kind(2), None);
    }
}
