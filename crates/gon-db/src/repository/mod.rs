//! # Repository Module
//!
//! SQL lives here and nowhere else.
//!
//! ## Two Access Styles
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Workflow (gon-api service)               Read endpoint                 │
//! │       │                                        │                        │
//! │       │  let mut tx = db.begin()               │  db.sales().view(id)   │
//! │       │  sale::insert_sale(&mut *tx, ..)       │                        │
//! │       │  StockLedger::new(&mut tx, now)        │                        │
//! │       │  tx.commit()                           │                        │
//! │       ▼                                        ▼                        │
//! │  free functions, generic over Executor    *Repository { pool }          │
//! │  (run inside the caller's transaction)    (joined read models)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Reference data lookups
//! - [`sale::SaleRepository`] - Sales and their read model
//! - [`returns::ReturnRepository`] - Returns against a sale
//! - [`payment::PaymentRepository`] - Payments against a sale
//! - [`stock::StockRepository`] - Stock reads, movement history, ledger audit
//!
//! [`stock::StockLedger`] performs every stock quantity write.

pub mod catalog;
pub mod payment;
pub mod returns;
pub mod sale;
pub mod stock;
