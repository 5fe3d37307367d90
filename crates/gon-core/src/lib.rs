//! # gon-core: Pure Business Logic for the Gon Back Office
//!
//! Everything here is deterministic and free of I/O. The database layer and
//! the HTTP service build on these types and rules.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gon Back Office                                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    gon-api (axum)                               │   │
//! │  │    POST /sales, POST /returns, POST /payments, /stock ...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ gon-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌──────────┐ │   │
//! │  │   │  types  │ │  money  │ │ pricing │ │  scope  │ │validation│ │   │
//! │  │   │  Sale   │ │  Money  │ │ Totals  │ │ Access  │ │  rules   │ │   │
//! │  │   │ Movement│ │ TaxRate │ │         │ │ Scope   │ │          │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    gon-db (Database Layer)                      │   │
//! │  │           SQLite, stock ledger, repositories, migrations        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain entities and enums (Sale, StockMovement, Role, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Line pricing and sale totals
//! - [`scope`] - Access scope and capabilities derived from the caller
//! - [`dto`] - Request bodies and read models
//! - [`validation`] - Request validation
//! - [`clock`] - Injectable time source
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use gon_core::money::Money;
//! use gon_core::pricing::compute_totals;
//! use gon_core::IVA_RATE;
//!
//! let totals = compute_totals(&[(Money::from_minor(100), 3)], IVA_RATE);
//! assert_eq!(totals.total.minor_units(), 357);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod dto;
pub mod error;
pub mod money;
pub mod pricing;
pub mod scope;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::Totals;
pub use scope::{AccessScope, CallerIdentity, Capability};
pub use types::*;
