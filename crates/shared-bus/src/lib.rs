//! # Shared Bus - Lifecycle Event Fan-Out
//!
//! In-process broadcast bus carrying transaction lifecycle events from the
//! engine to its subscribers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Orchestrator │                    │  Subscriber  │
//! │ / Reconciler │    publish()       │ (host proc)  │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Delivery is best-effort fan-out: a lagging subscriber drops events rather
//! than applying backpressure to orchestration. Terminal outcomes are also
//! persisted as receipts, so the bus is an observation surface, not the
//! system of record.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{CoreEvent, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging drops begin.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
