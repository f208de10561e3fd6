//! Interaction state kept per user between a message and the button press that completes it.

use serde::{Deserialize, Serialize};

/// Where a user is in a multi-step interaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InteractionState {
    #[default]
    Idle,
    AwaitingCategory {
        message_context_id: i32,
    },
    AwaitingTransactionType {
        message_context_id: i32,
    },
    AwaitingUndoConfirmation {
        message_context_id: i32,
        transaction_id: i64,
    },
}

/// Events that move a user between states
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// A trackable expense message was stored under a new context
    ExpenseStarted {
        message_context_id: i32,
        with_transaction_type: bool,
    },
    TransactionTypeChosen {
        message_context_id: i32,
    },
    CategoryChosen {
        message_context_id: i32,
    },
    Cancelled {
        message_context_id: i32,
    },
    UndoRequested {
        message_context_id: i32,
        transaction_id: i64,
    },
    UndoConfirmed {
        transaction_id: i64,
    },
    Paginated,
}

/// Outcome of applying a trigger
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub next: InteractionState,
    /// Context that is no longer reachable and should be deleted
    pub release: Option<i32>,
}

impl Transition {
    fn to(next: InteractionState) -> Self {
        Self {
            next,
            release: None,
        }
    }

    fn releasing(next: InteractionState, release: Option<i32>) -> Self {
        Self { next, release }
    }
}

impl InteractionState {
    /// Context held open by this state, if any
    pub fn open_context(&self) -> Option<i32> {
        match self {
            InteractionState::Idle => None,
            InteractionState::AwaitingCategory { message_context_id }
            | InteractionState::AwaitingTransactionType { message_context_id }
            | InteractionState::AwaitingUndoConfirmation {
                message_context_id, ..
            } => Some(*message_context_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    /// Pure transition function. Starting a new interaction supersedes the
    /// pending one and releases its context; finishing or cancelling a
    /// context only resets the state when that context is the open one.
    pub fn apply(&self, trigger: Trigger) -> Transition {
        let superseded = |new_id: i32| self.open_context().filter(|open| *open != new_id);

        match trigger {
            Trigger::ExpenseStarted {
                message_context_id,
                with_transaction_type,
            } => {
                let next = if with_transaction_type {
                    InteractionState::AwaitingTransactionType { message_context_id }
                } else {
                    InteractionState::AwaitingCategory { message_context_id }
                };
                Transition::releasing(next, superseded(message_context_id))
            }
            Trigger::TransactionTypeChosen { message_context_id } => Transition::releasing(
                InteractionState::AwaitingCategory { message_context_id },
                superseded(message_context_id),
            ),
            Trigger::CategoryChosen { message_context_id } => {
                if self.open_context() == Some(message_context_id) {
                    Transition::to(InteractionState::Idle)
                } else {
                    Transition::to(self.clone())
                }
            }
            Trigger::Cancelled { message_context_id } => {
                let next = if self.open_context() == Some(message_context_id) {
                    InteractionState::Idle
                } else {
                    self.clone()
                };
                Transition::releasing(next, Some(message_context_id))
            }
            Trigger::UndoRequested {
                message_context_id,
                transaction_id,
            } => Transition::releasing(
                InteractionState::AwaitingUndoConfirmation {
                    message_context_id,
                    transaction_id,
                },
                superseded(message_context_id),
            ),
            Trigger::UndoConfirmed { transaction_id } => match self {
                InteractionState::AwaitingUndoConfirmation {
                    message_context_id,
                    transaction_id: pending,
                } if *pending == transaction_id => {
                    Transition::releasing(InteractionState::Idle, Some(*message_context_id))
                }
                other => Transition::to(other.clone()),
            },
            Trigger::Paginated => Transition::to(self.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_from_idle() {
        let t = InteractionState::Idle.apply(Trigger::ExpenseStarted {
            message_context_id: 5,
            with_transaction_type: false,
        });
        assert_eq!(
            t.next,
            InteractionState::AwaitingCategory {
                message_context_id: 5
            }
        );
        assert_eq!(t.release, None);
    }

    #[test]
    fn test_new_expense_supersedes_pending_one() {
        let state = InteractionState::AwaitingCategory {
            message_context_id: 5,
        };
        let t = state.apply(Trigger::ExpenseStarted {
            message_context_id: 6,
            with_transaction_type: true,
        });
        assert_eq!(
            t.next,
            InteractionState::AwaitingTransactionType {
                message_context_id: 6
            }
        );
        assert_eq!(t.release, Some(5));
    }

    #[test]
    fn test_category_completes_open_context_only() {
        let state = InteractionState::AwaitingCategory {
            message_context_id: 5,
        };
        assert_eq!(
            state
                .apply(Trigger::CategoryChosen {
                    message_context_id: 5
                })
                .next,
            InteractionState::Idle
        );
        assert_eq!(
            state
                .apply(Trigger::CategoryChosen {
                    message_context_id: 4
                })
                .next,
            state
        );
    }

    #[test]
    fn test_cancel_always_releases() {
        let state = InteractionState::AwaitingUndoConfirmation {
            message_context_id: 9,
            transaction_id: 100,
        };
        let t = state.apply(Trigger::Cancelled {
            message_context_id: 9,
        });
        assert_eq!(t.next, InteractionState::Idle);
        assert_eq!(t.release, Some(9));

        let t = InteractionState::Idle.apply(Trigger::Cancelled {
            message_context_id: 3,
        });
        assert_eq!(t.next, InteractionState::Idle);
        assert_eq!(t.release, Some(3));
    }

    #[test]
    fn test_undo_confirmation_releases_its_context() {
        let state = InteractionState::Idle.apply(Trigger::UndoRequested {
            message_context_id: 2,
            transaction_id: 40,
        });
        let t = state.next.apply(Trigger::UndoConfirmed { transaction_id: 40 });
        assert_eq!(t.next, InteractionState::Idle);
        assert_eq!(t.release, Some(2));
    }

    #[test]
    fn test_pagination_keeps_state() {
        let state = InteractionState::AwaitingCategory {
            message_context_id: 1,
        };
        assert_eq!(state.apply(Trigger::Paginated).next, state);
    }

    #[test]
    fn test_state_serialization() {
        let state = InteractionState::AwaitingCategory {
            message_context_id: 7,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"state":"awaiting_category","message_context_id":7}"#);
        let back: InteractionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
