use crate::state::{Unscored, WithState};

/// Wraps anything taking part in an auction together with its scoring state.
#[derive(Debug, Clone)]
pub struct Participant<T, State = Unscored> {
    item: T,
    state: State,
}

impl<T> Participant<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            state: Unscored,
        }
    }
}

impl<T, State> Participant<T, State> {
    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn into_item(self) -> T {
        self.item
    }
}

impl<T, State> WithState for Participant<T, State> {
    type State = State;
    type WithState<NewState> = Participant<T, NewState>;

    fn with_state<NewState>(self, state: NewState) -> Self::WithState<NewState> {
        Participant {
            item: self.item,
            state,
        }
    }

    fn state(&self) -> &Self::State {
        &self.state
    }
}
