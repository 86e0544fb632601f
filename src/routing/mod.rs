//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, upgrade headers, method)
//!     → hosts.rs (Host header gate)
//!     → router.rs (ordered rule scan)
//!     → matcher.rs (evaluate path predicates)
//!     → fallback.rs (SPA shell for unmatched navigations)
//!     → Return: Action (Forward / Fallback / Unhandled) or RouterError
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers (exact, prefix, any-of)
//!     → Freeze as immutable RouteTable inside the Dispatcher
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Paths lower-cased before matching
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod dispatch;
pub mod fallback;
pub mod hosts;
pub mod matcher;
pub mod router;

pub use dispatch::{Action, Dispatcher};
pub use fallback::FallbackPolicy;
pub use hosts::AllowedHosts;
pub use router::{Rule, RouteTable, RuleError};
