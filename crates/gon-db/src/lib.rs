//! # gon-db: Database Layer for the Gon Back Office
//!
//! SQLite storage through sqlx: connection pool, embedded migrations,
//! repositories, and the stock ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Gon Data Flow                                    │
//! │                                                                         │
//! │  HTTP handler (gon-api) → service workflow                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     gon-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ Catalog       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Sale / Return │    │ 001_initial  │  │   │
//! │  │   │ begin() → tx  │    │ Payment       │    │   _schema    │  │   │
//! │  │   │               │    │ StockLedger   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories and the stock ledger
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gon_db::{Database, DbConfig, StockLedger};
//!
//! let db = Database::new(DbConfig::new("gon.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! StockLedger::new(&mut tx, Utc::now())
//!     .reserve_and_decrement(product_id, branch_id, 2, "Sale #1", Some(user_id), Some(1))
//!     .await?;
//! tx.commit().await?;
//!
//! let view = db.sales().view(1).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::payment::PaymentRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sale::{NewSale, SaleRepository};
pub use repository::stock::{StockLedger, StockRepository, OPENING_BALANCE_REASON};
