//! Model load state machine.

use hearth_common::ResourceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    ParsingAsset,
    AwaitingDependents {
        pending: usize,
    },
    BuildingGpuState,
    Loaded,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    BytesReady,
    ReadFailed,
    ParseFailed,
    /// Shaders and images the model waits for.
    DependentsDiscovered(usize),
    DependentReady,
    DependentFailed,
    GpuStateBuilt,
    GpuBuildFailed,
}

impl LoadState {
    /// Pure transition function. Events that do not apply to the current
    /// state leave it unchanged.
    pub fn next(self, event: LoadEvent) -> LoadState {
        use LoadEvent as E;
        use LoadState as S;
        match (self, event) {
            (S::Unloaded, E::BytesReady) => S::ParsingAsset,
            (S::Unloaded, E::ReadFailed) => S::Error,
            (S::ParsingAsset, E::ParseFailed) => S::Error,
            (S::ParsingAsset, E::DependentsDiscovered(0)) => S::BuildingGpuState,
            (S::ParsingAsset, E::DependentsDiscovered(pending)) => S::AwaitingDependents { pending },
            (S::AwaitingDependents { pending: 0 | 1 }, E::DependentReady) => S::BuildingGpuState,
            (S::AwaitingDependents { pending }, E::DependentReady) => S::AwaitingDependents {
                pending: pending - 1,
            },
            (S::AwaitingDependents { .. }, E::DependentFailed) => S::Error,
            (S::BuildingGpuState, E::GpuStateBuilt) => S::Loaded,
            (S::BuildingGpuState, E::GpuBuildFailed) => S::Error,
            (state, event) => {
                tracing::trace!(?state, ?event, "ignored load event");
                state
            }
        }
    }

    pub fn resource_state(self) -> ResourceState {
        match self {
            LoadState::Unloaded => ResourceState::Unloaded,
            LoadState::ParsingAsset
            | LoadState::AwaitingDependents { .. }
            | LoadState::BuildingGpuState => ResourceState::Loading,
            LoadState::Loaded => ResourceState::Loaded,
            LoadState::Error => ResourceState::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_with_dependents() {
        let mut state = LoadState::Unloaded;
        for event in [
            LoadEvent::BytesReady,
            LoadEvent::DependentsDiscovered(2),
            LoadEvent::DependentReady,
        ] {
            state = state.next(event);
        }
        assert_eq!(state, LoadState::AwaitingDependents { pending: 1 });
        state = state.next(LoadEvent::DependentReady);
        assert_eq!(state, LoadState::BuildingGpuState);
        state = state.next(LoadEvent::GpuStateBuilt);
        assert_eq!(state, LoadState::Loaded);
        assert_eq!(state.resource_state(), ResourceState::Loaded);
    }

    #[test]
    fn zero_dependents_go_straight_to_build() {
        let state = LoadState::ParsingAsset.next(LoadEvent::DependentsDiscovered(0));
        assert_eq!(state, LoadState::BuildingGpuState);
    }

    #[test]
    fn failures_are_terminal() {
        assert_eq!(LoadState::Unloaded.next(LoadEvent::ReadFailed), LoadState::Error);
        assert_eq!(LoadState::ParsingAsset.next(LoadEvent::ParseFailed), LoadState::Error);
        let waiting = LoadState::AwaitingDependents { pending: 3 };
        assert_eq!(waiting.next(LoadEvent::DependentFailed), LoadState::Error);
        assert_eq!(
            LoadState::BuildingGpuState.next(LoadEvent::GpuBuildFailed),
            LoadState::Error
        );
        assert_eq!(LoadState::Error.next(LoadEvent::BytesReady), LoadState::Error);
        assert_eq!(LoadState::Error.next(LoadEvent::DependentReady), LoadState::Error);
    }

    #[test]
    fn stray_events_are_ignored() {
        assert_eq!(LoadState::Loaded.next(LoadEvent::DependentReady), LoadState::Loaded);
        assert_eq!(LoadState::Unloaded.next(LoadEvent::GpuStateBuilt), LoadState::Unloaded);
        assert_eq!(
            LoadState::ParsingAsset.next(LoadEvent::DependentReady),
            LoadState::ParsingAsset
        );
    }

    #[test]
    fn loading_states_report_loading() {
        for state in [
            LoadState::ParsingAsset,
            LoadState::AwaitingDependents { pending: 1 },
            LoadState::BuildingGpuState,
        ] {
            assert_eq!(state.resource_state(), ResourceState::Loading);
        }
        assert_eq!(LoadState::Unloaded.resource_state(), ResourceState::Unloaded);
        assert_eq!(LoadState::Error.resource_state(), ResourceState::Error);
    }
}
