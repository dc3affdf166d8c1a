//! Engine lifecycle states.

use std::fmt;

/// Construction and teardown phases of a filter engine.
///
/// Construction walks the states in declaration order up to `Ready`. A
/// failure jumps straight to `Destroying`, releasing only what was already
/// built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Unconstructed,
    ConfigLoaded,
    RegistryPopulated,
    PipelineBuilt,
    Ready,
    Destroying,
    Destroyed,
}

impl LifecycleState {
    /// Check whether the engine may process data.
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    /// Check whether teardown has started or finished.
    pub fn is_torn_down(self) -> bool {
        matches!(self, Self::Destroying | Self::Destroyed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
