//! Context window layer — token budgets, priority-based packing, and prompt
//! formatting.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               Context Window                 │
//! │                                              │
//! │  ┌─────────────┐  ┌──────────┐  ┌─────────┐  │
//! │  │ Budget      │  │ Window   │  │ Format  │  │
//! │  │ Allocator   │─▶│ Packer   │─▶│         │  │
//! │  │             │  │          │  │         │  │
//! │  │ ·safety 5%  │  │ ·rank    │  │ ·header │  │
//! │  │ ·reason 10% │  │ ·fit     │  │ ·number │  │
//! │  │ ·reply 15%  │  │ ·truncate│  │         │  │
//! │  └─────────────┘  └──────────┘  └─────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod budget;
pub mod format;
pub mod window;

pub use budget::{BudgetAllocator, TokenBudget, context_window_for, resolve_context_window};
pub use format::format_for_model;
pub use window::{ContextItem, ContextWindow, SourceKind, pack};
