//! Shared agent state: the registered identity and the current link state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::OnceCell;

use crate::types::RegisteredIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unregistered,
    Registered,
    Active,
    Degraded,
}

impl LinkState {
    fn to_u8(self) -> u8 {
        match self {
            LinkState::Unregistered => 0,
            LinkState::Registered => 1,
            LinkState::Active => 2,
            LinkState::Degraded => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => LinkState::Registered,
            2 => LinkState::Active,
            3 => LinkState::Degraded,
            _ => LinkState::Unregistered,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Unregistered => "unregistered",
            LinkState::Registered => "registered",
            LinkState::Active => "active",
            LinkState::Degraded => "degraded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
pub struct AgentState {
    // set once, never replaced
    identity: OnceCell<RegisteredIdentity>,
    link: AtomicU8,
}

impl AgentState {
    pub fn identity(&self) -> Option<&RegisteredIdentity> {
        self.identity.get()
    }

    /// Store the identity. Returns false if one was already set.
    pub fn set_identity(&self, identity: RegisteredIdentity) -> bool {
        if self.identity.set(identity).is_err() {
            return false;
        }
        self.link
            .store(LinkState::Registered.to_u8(), Ordering::Release);
        true
    }

    pub fn link(&self) -> LinkState {
        LinkState::from_u8(self.link.load(Ordering::Acquire))
    }

    /// Swap in `next`, returning the previous state.
    pub fn transition(&self, next: LinkState) -> LinkState {
        LinkState::from_u8(self.link.swap(next.to_u8(), Ordering::AcqRel))
    }
}
