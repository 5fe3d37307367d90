//! # Test Fixtures
//!
//! A small, fully provisioned world for integration tests.
//!
//! ```text
//! Acme (company)                        Rival (company)
//! ├── Centro  (branch)                  └── Sur (branch)
//! │     stock: yerba 10, mate 5             stock: rival_product 4
//! │     no stock record for bombilla
//! └── Norte   (branch)
//!       stock: yerba 8
//! ```
//!
//! Enabled for this crate's own tests and, through the `test-helpers`
//! feature, for other crates' tests.

use chrono::Utc;
use gon_core::{Money, Role};

use crate::error::{DbResult, LedgerError};
use crate::pool::Database;
use crate::repository::stock::StockLedger;

/// Ids of everything [`seed_world`] created.
#[derive(Debug, Clone, Copy)]
pub struct World {
    pub company: i64,
    pub branch: i64,
    pub other_branch: i64,
    pub rival_company: i64,
    pub rival_branch: i64,

    pub global_admin: i64,
    pub company_admin: i64,
    pub branch_admin: i64,
    pub salesperson: i64,
    pub other_branch_salesperson: i64,
    pub rival_admin: i64,

    /// List price 1000, 10 units at `branch`, 8 at `other_branch`.
    pub yerba: i64,
    /// List price 2500, 5 units at `branch`.
    pub mate: i64,
    /// List price 1500, no stock record anywhere.
    pub bombilla: i64,
    pub rival_product: i64,

    pub customer: i64,
    pub cash: i64,
    pub inactive_method: i64,
    pub rival_cash: i64,

    pub yerba_stock: i64,
    pub mate_stock: i64,
    pub yerba_north_stock: i64,
}

pub async fn seed_world(db: &Database) -> Result<World, LedgerError> {
    let catalog = db.catalog();

    let company = catalog.insert_company("Acme").await?;
    let branch = catalog.insert_branch(company, "Centro").await?;
    let other_branch = catalog.insert_branch(company, "Norte").await?;
    let rival_company = catalog.insert_company("Rival").await?;
    let rival_branch = catalog.insert_branch(rival_company, "Sur").await?;

    let global_admin = catalog.insert_user(company, None, "Root", Role::GlobalAdmin).await?;
    let company_admin = catalog.insert_user(company, None, "Carla", Role::CompanyAdmin).await?;
    let branch_admin = catalog
        .insert_user(company, Some(branch), "Bruno", Role::BranchAdmin)
        .await?;
    let salesperson = catalog
        .insert_user(company, Some(branch), "Sara", Role::Salesperson)
        .await?;
    let other_branch_salesperson = catalog
        .insert_user(company, Some(other_branch), "Nico", Role::Salesperson)
        .await?;
    let rival_admin = catalog
        .insert_user(rival_company, None, "Rita", Role::CompanyAdmin)
        .await?;

    let yerba = catalog
        .insert_product(company, "Yerba 1kg", Some("7801000000011"), Money::from_minor(1000))
        .await?;
    let mate = catalog
        .insert_product(company, "Mate calabaza", None, Money::from_minor(2500))
        .await?;
    let bombilla = catalog
        .insert_product(company, "Bombilla", None, Money::from_minor(1500))
        .await?;
    let rival_product = catalog
        .insert_product(rival_company, "Galletas", None, Money::from_minor(700))
        .await?;

    let customer = catalog.insert_customer(company, "Juan Pérez", Some("12.345.678-5")).await?;
    let cash = catalog.insert_payment_method(company, "Efectivo", true).await?;
    let inactive_method = catalog.insert_payment_method(company, "Cheque", false).await?;
    let rival_cash = catalog.insert_payment_method(rival_company, "Efectivo", true).await?;

    let mut tx = db.begin().await?;
    let mut ledger = StockLedger::new(&mut tx, Utc::now());
    let yerba_stock = ledger.provision(yerba, branch, 10, 2, Some(global_admin)).await?.id;
    let mate_stock = ledger.provision(mate, branch, 5, 1, Some(global_admin)).await?.id;
    let yerba_north_stock = ledger
        .provision(yerba, other_branch, 8, 2, Some(global_admin))
        .await?
        .id;
    ledger
        .provision(rival_product, rival_branch, 4, 0, Some(rival_admin))
        .await?;
    tx.commit().await?;

    Ok(World {
        company,
        branch,
        other_branch,
        rival_company,
        rival_branch,
        global_admin,
        company_admin,
        branch_admin,
        salesperson,
        other_branch_salesperson,
        rival_admin,
        yerba,
        mate,
        bombilla,
        rival_product,
        customer,
        cash,
        inactive_method,
        rival_cash,
        yerba_stock,
        mate_stock,
        yerba_north_stock,
    })
}

/// Fresh in-memory database with [`seed_world`] applied.
pub async fn world() -> DbResult<(Database, World)> {
    let db = Database::new(crate::DbConfig::in_memory()).await?;
    let world = seed_world(&db).await.map_err(|e| match e {
        LedgerError::Db(db_err) => db_err,
        LedgerError::Rejected(core) => crate::DbError::Internal(core.to_string()),
    })?;
    Ok((db, world))
}
