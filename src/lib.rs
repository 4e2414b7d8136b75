//! # weft
//!
//! Interruptible, priority-aware component-tree reconciliation runtime.
//!
//! Given a declarative description of a tree, weft computes the minimal set
//! of mutations against a persistent host tree — and does it under a
//! cooperative scheduler, so high-priority work (user input) preempts
//! low-priority work (background rendering) without corrupting
//! intermediate state.
//!
//! ## Architecture
//!
//! Two mutable tree generations share an arena of units, cross-linked as
//! current/work-in-progress pairs. A render pass alternates a top-down
//! begin phase (diffing, hooks) with a bottom-up completion phase (host
//! instance construction, effect-flag bubbling), may yield between units,
//! and ends in a three-stage commit that mutates the host tree:
//!
//! ```text
//! update → lane mark → schedule → begin/complete loop → commit → effects
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (Key, Value, Props)
//! - [`element`] - The element description model the reconciler consumes
//! - [`engine`] - Unit arena, node model, effect flags, lanes, update queues
//! - [`hooks`] - Hook and effect state for function components
//! - [`reconcile`] - Begin/complete phases, child diff, suspense, contexts
//! - [`pipeline`] - Work loop, scheduler bridge, commit engine
//! - [`scheduler`] - External scheduler contract + deterministic impl
//! - [`host`] - Host adapter contract
//! - [`renderer`] - In-memory host surface with inspection API
//! - [`root`] - Public entry points (create root, render, flush)
//! - [`error`] - Error taxonomy and the unwind signal

pub mod element;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod host;
pub mod pipeline;
pub mod reconcile;
pub mod renderer;
pub mod root;
pub mod scheduler;
pub(crate) mod shared;
pub mod types;

// Re-export commonly used items
pub use types::{Key, Props, Value};

pub use element::{
    fragment, host, host_with_ref, suspense, text, ComponentDef, Context, Element, RefBinding,
    Render,
};

pub use engine::{EffectFlags, Lanes};

pub use hooks::{Cleanup, HookCtx, Setter, Transition};

pub use reconcile::AsyncValue;

pub use error::ReconcileError;

pub use host::{HostAdapter, HostHandle, HostParent};

pub use scheduler::{ManualScheduler, ScheduledTask, SchedulerPriority, TaskScheduler};

pub use renderer::{MemoryHost, SnapshotNode};

pub use root::Root;
