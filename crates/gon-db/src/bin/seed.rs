//! # Seed Data Generator
//!
//! Populates a database with a demo company for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./gon_dev.db (default)
//! cargo run -p gon-db --bin seed
//!
//! # Specify database path and branch count
//! cargo run -p gon-db --bin seed -- --db ./data/gon.db --branches 3
//! ```
//!
//! ## Generated Data
//! - One company with `--branches` branches (default 2)
//! - A global admin, a company admin, and per branch a branch admin and a salesperson
//! - Products across a few categories, each provisioned at every branch
//! - Payment methods: cash, debit, credit
//!
//! Opening stock is booked through the ledger, so every seeded stock record
//! starts with a movement history that matches its quantity.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use gon_core::{Money, Role};
use gon_db::{Database, DbConfig, StockLedger};
use std::env;
use tracing::info;

/// Product catalog for demo data: (name, barcode prefix, list price in pesos).
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("Yerba Mate 1kg", "7801", 4590),
    ("Café Grano 500g", "7802", 8990),
    ("Té Negro 100u", "7803", 3290),
    ("Azúcar 1kg", "7804", 1290),
    ("Leche Entera 1L", "7805", 1090),
    ("Pan Molde", "7806", 2490),
    ("Galletas Avena", "7807", 1590),
    ("Aceite Maravilla 1L", "7808", 3990),
    ("Arroz Grado 1 1kg", "7809", 1690),
    ("Fideos Spaghetti 400g", "7810", 990),
];

const PAYMENT_METHODS: &[&str] = &["Efectivo", "Débito", "Crédito"];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut branches: usize = 2;
    let mut db_path = String::from("./gon_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--branches" | "-b" => {
                let value = args.get(i + 1).context("--branches needs a value")?;
                branches = value.parse().context("--branches must be a number")?;
                i += 1;
            }
            "--db" | "-d" => {
                db_path = args.get(i + 1).context("--db needs a path")?.clone();
                i += 1;
            }
            "--help" | "-h" => {
                println!("Gon Back Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --branches <N> Number of branches (default: 2)");
                println!("  -d, --db <PATH>    Database file path (default: ./gon_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }

    info!(db = %db_path, branches, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let catalog = db.catalog();

    let existing = catalog.company_count().await?;
    if existing > 0 {
        info!(existing, "Database already seeded, skipping. Delete the file to regenerate.");
        return Ok(());
    }

    let company = catalog.insert_company("Comercial Gon Ltda.").await?;
    let admin = catalog.insert_user(company, None, "Administrador", Role::GlobalAdmin).await?;
    catalog.insert_user(company, None, "Gerencia", Role::CompanyAdmin).await?;

    for method in PAYMENT_METHODS {
        catalog.insert_payment_method(company, method, true).await?;
    }
    catalog.insert_customer(company, "Cliente Ocasional", None).await?;

    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (idx, (name, prefix, price)) in PRODUCTS.iter().enumerate() {
        let barcode = format!("{}{:09}", prefix, idx);
        let id = catalog
            .insert_product(company, name, Some(&barcode), Money::from_minor(*price))
            .await?;
        product_ids.push(id);
    }

    let mut provisioned = 0;
    for n in 1..=branches {
        let branch = catalog.insert_branch(company, &format!("Sucursal {n}")).await?;
        catalog
            .insert_user(company, Some(branch), &format!("Jefe Sucursal {n}"), Role::BranchAdmin)
            .await?;
        catalog
            .insert_user(company, Some(branch), &format!("Vendedor {n}"), Role::Salesperson)
            .await?;

        let mut tx = db.begin().await?;
        let mut ledger = StockLedger::new(&mut tx, Utc::now());
        for (idx, product_id) in product_ids.iter().enumerate() {
            let opening = 20 + ((idx * 13 + n * 7) % 80) as i64;
            ledger
                .provision(*product_id, branch, opening, 5, Some(admin))
                .await?;
            provisioned += 1;
        }
        tx.commit().await?;
    }

    let audits = db.stock().audit_all().await?;
    let inconsistent = audits.iter().filter(|a| !a.consistent).count();

    info!(
        products = product_ids.len(),
        branches,
        stock_records = provisioned,
        inconsistent,
        "Seed complete"
    );
    Ok(())
}
