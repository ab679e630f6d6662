//! Payment orchestration module
//!
//! Providers sit behind the [`traits::PaymentProvider`] trait, the
//! [`router::ProviderRouter`] picks one per attempt and the
//! [`orchestrator::PaymentOrchestrator`] drives the retry loop and webhook flow.

pub mod orchestrator;
pub mod providers;
pub mod retry;
pub mod router;
pub mod signature;
pub mod traits;
pub mod types;

pub use orchestrator::PaymentOrchestrator;
pub use retry::RetryPolicy;
pub use router::{ProviderRouter, RoutingPolicy};
pub use traits::PaymentProvider;
