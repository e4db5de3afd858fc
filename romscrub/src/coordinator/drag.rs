//! Drag interaction state machine.
//!
//! Tracks where the user is in a scrub gesture so the coordinator can pick
//! the right debounce window:
//!
//! ```text
//!            press_start              release_end
//!   Idle ──────────────► Dragging ──────────────► Settling
//!    ▲                      ▲                        │
//!    │    settle_timeout    │      press_start       │
//!    └──────────────────────┼────────────────────────┘
//!                           └─── (re-grab before the timeout)
//! ```
//!
//! Settling exists so a release is not mistaken for the end of interaction:
//! users often re-grab the handle within a few hundred milliseconds, and
//! treating that as a fresh interaction would double-trigger the expensive
//! post-interaction work.

use std::fmt;

/// Position in the scrub gesture lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    /// No interaction in progress.
    Idle,
    /// Pointer held down, offset changing.
    Dragging,
    /// Pointer released recently; a re-grab is still likely.
    Settling,
}

impl fmt::Display for DragState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DragState::Idle => "idle",
            DragState::Dragging => "dragging",
            DragState::Settling => "settling",
        };
        f.write_str(name)
    }
}

/// Explicit transition table for the drag lifecycle.
///
/// Each transition method returns `true` when the state actually changed,
/// so the caller can emit a state-change event exactly once per change.
#[derive(Debug)]
pub struct DragStateMachine {
    state: DragState,
}

impl DragStateMachine {
    /// Starts in [`DragState::Idle`].
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> DragState {
        self.state
    }

    /// True while a drag is actively in progress.
    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    /// The pointer went down. Valid from any state; re-grabbing during
    /// Settling resumes the interaction.
    pub fn press_start(&mut self) -> bool {
        self.transition(DragState::Dragging)
    }

    /// The pointer was released. Only meaningful while Dragging; a release
    /// in any other state is ignored.
    pub fn release_end(&mut self) -> bool {
        if self.state != DragState::Dragging {
            return false;
        }
        self.transition(DragState::Settling)
    }

    /// The settle window elapsed without a re-grab. Only meaningful while
    /// Settling.
    pub fn settle_timeout(&mut self) -> bool {
        if self.state != DragState::Settling {
            return false;
        }
        self.transition(DragState::Idle)
    }

    fn transition(&mut self, next: DragState) -> bool {
        if self.state == next {
            return false;
        }
        self.state = next;
        true
    }
}

impl Default for DragStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
