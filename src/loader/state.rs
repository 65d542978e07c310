use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

/// Progress of a single load run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    NotStarted,
    LoadingModule,
    LoadingResource,
    Done,
    Failed,
}

impl LoadState {
    /// `Done` and `Failed` are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Done | LoadState::Failed)
    }

    pub fn can_transition_to(self, next: LoadState) -> bool {
        use LoadState::*;
        matches!(
            (self, next),
            (NotStarted, LoadingModule)
                | (LoadingModule, LoadingResource)
                | (LoadingModule, Failed)
                | (LoadingResource, Done)
                | (LoadingResource, Failed)
        )
    }
}

/// Shared record of the states a load run has passed through.
///
/// Cloning the tracker shares the underlying history, so a host can keep one
/// copy while the loader advances another.
#[derive(Debug, Default)]
pub struct LoadTracker {
    history: Arc<Mutex<Vec<LoadState>>>,
}

impl Clone for LoadTracker {
    fn clone(&self) -> Self {
        Self {
            history: Arc::clone(&self.history),
        }
    }
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recent state, `NotStarted` before the first transition.
    pub fn state(&self) -> LoadState {
        self.history
            .lock()
            .last()
            .copied()
            .unwrap_or(LoadState::NotStarted)
    }

    /// Returns every state entered so far, oldest first.
    pub fn history(&self) -> Vec<LoadState> {
        self.history.lock().clone()
    }

    /// Records a transition. Illegal transitions are ignored and return `false`.
    pub(crate) fn advance(&self, next: LoadState) -> bool {
        let mut history = self.history.lock();
        let current = history.last().copied().unwrap_or(LoadState::NotStarted);
        if !current.can_transition_to(next) {
            warn!("ignoring load transition {current:?} -> {next:?}");
            return false;
        }
        debug!("load state {current:?} -> {next:?}");
        history.push(next);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_starts_not_started() {
        let tracker = LoadTracker::new();
        assert_eq!(tracker.state(), LoadState::NotStarted);
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn happy_path_transitions_are_recorded() {
        let tracker = LoadTracker::new();
        assert!(tracker.advance(LoadState::LoadingModule));
        assert!(tracker.advance(LoadState::LoadingResource));
        assert!(tracker.advance(LoadState::Done));
        assert_eq!(
            tracker.history(),
            vec![
                LoadState::LoadingModule,
                LoadState::LoadingResource,
                LoadState::Done
            ]
        );
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let tracker = LoadTracker::new();
        tracker.advance(LoadState::LoadingModule);
        tracker.advance(LoadState::Failed);
        assert!(!tracker.advance(LoadState::LoadingResource));
        assert!(!tracker.advance(LoadState::Done));
        assert_eq!(tracker.state(), LoadState::Failed);
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn cannot_skip_module_phase() {
        let tracker = LoadTracker::new();
        assert!(!tracker.advance(LoadState::LoadingResource));
        assert!(!tracker.advance(LoadState::Done));
        assert_eq!(tracker.state(), LoadState::NotStarted);
    }

    #[test]
    fn clones_share_history() {
        let tracker = LoadTracker::new();
        let observer = tracker.clone();
        tracker.advance(LoadState::LoadingModule);
        assert_eq!(observer.state(), LoadState::LoadingModule);
    }
}
