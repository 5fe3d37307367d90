//! # Sale Repository
//!
//! Storage for sale headers and line items, plus the joined read model.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     └── insert_sale()      → Sale { status: Completed | Pending }      │
//! │     └── insert_line() × N  → SaleLineItem                              │
//! │     └── StockLedger::reserve_and_decrement() × N                       │
//! │                                                                         │
//! │  2. UPDATE                                                             │
//! │     └── update_sale()      → status / receipt number only              │
//! │                                                                         │
//! │  3. DELETE (no payments, no returns)                                   │
//! │     └── StockLedger::release_from_sale() × N                           │
//! │     └── delete_sale()      → line items cascade                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Write functions take any executor; workflows pass `&mut *tx`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gon_core::dto::{SaleListFilter, SaleLineView, SaleView};
use gon_core::pricing::Totals;
use gon_core::{AccessScope, Money, Sale, SaleLineItem, SaleStatus, SaleType};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const SALE_COLUMNS: &str = "id, company_id, branch_id, customer_id, cashier_user_id, \
     subtotal, tax, total, sale_type, status, receipt_number, created_at, updated_at";

const LINE_COLUMNS: &str =
    "id, sale_id, product_id, quantity, unit_price, line_subtotal, created_at";

// =============================================================================
// Writes
// =============================================================================

/// Header values for a sale about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSale<'a> {
    pub company_id: i64,
    pub branch_id: i64,
    pub customer_id: Option<i64>,
    pub cashier_user_id: i64,
    pub totals: Totals,
    pub sale_type: SaleType,
    pub status: SaleStatus,
    pub receipt_number: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_sale<'e, E>(executor: E, sale: &NewSale<'_>) -> DbResult<Sale>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        INSERT INTO sales (
            company_id, branch_id, customer_id, cashier_user_id,
            subtotal, tax, total, sale_type, status, receipt_number, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        RETURNING {}
        "#,
        SALE_COLUMNS
    );
    let row = sqlx::query_as::<_, Sale>(&sql)
        .bind(sale.company_id)
        .bind(sale.branch_id)
        .bind(sale.customer_id)
        .bind(sale.cashier_user_id)
        .bind(sale.totals.subtotal)
        .bind(sale.totals.tax)
        .bind(sale.totals.total)
        .bind(sale.sale_type)
        .bind(sale.status)
        .bind(sale.receipt_number)
        .bind(sale.created_at)
        .fetch_one(executor)
        .await?;

    debug!(sale_id = row.id, total = %row.total, "Sale inserted");
    Ok(row)
}

pub async fn insert_line<'e, E>(
    executor: E,
    sale_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: Money,
    created_at: DateTime<Utc>,
) -> DbResult<SaleLineItem>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        r#"
        INSERT INTO sale_line_items (sale_id, product_id, quantity, unit_price, line_subtotal, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING {}
        "#,
        LINE_COLUMNS
    );
    let row = sqlx::query_as::<_, SaleLineItem>(&sql)
        .bind(sale_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(unit_price.multiply_quantity(quantity))
        .bind(created_at)
        .fetch_one(executor)
        .await?;
    Ok(row)
}

/// Overwrites the mutable header fields. Totals and lines never change after
/// creation.
pub async fn update_sale<'e, E>(
    executor: E,
    id: i64,
    status: SaleStatus,
    receipt_number: Option<&str>,
    updated_at: DateTime<Utc>,
) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE sales SET status = ?1, receipt_number = ?2, updated_at = ?3 WHERE id = ?4",
    )
    .bind(status)
    .bind(receipt_number)
    .bind(updated_at)
    .bind(id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", id));
    }
    Ok(())
}

pub async fn delete_sale<'e, E>(executor: E, id: i64) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Sale", id));
    }
    debug!(sale_id = id, "Sale deleted");
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

pub async fn get_sale<'e, E>(executor: E, id: i64) -> DbResult<Option<Sale>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
    let row = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn sale_lines<'e, E>(executor: E, sale_id: i64) -> DbResult<Vec<SaleLineItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM sale_line_items WHERE sale_id = ?1 ORDER BY id",
        LINE_COLUMNS
    );
    let rows = sqlx::query_as::<_, SaleLineItem>(&sql)
        .bind(sale_id)
        .fetch_all(executor)
        .await?;
    Ok(rows)
}

/// Quantity sold per product on one sale.
pub async fn sold_quantities<'e, E>(executor: E, sale_id: i64) -> DbResult<HashMap<i64, i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT product_id, SUM(quantity) FROM sale_line_items WHERE sale_id = ?1 GROUP BY product_id",
    )
    .bind(sale_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Rows that block deletion of a sale: `(payments, returns)`.
pub async fn dependent_counts<'e, E>(executor: E, sale_id: i64) -> DbResult<(i64, i64)>
where
    E: Executor<'e, Database = Sqlite>,
{
    let counts: (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM payments WHERE sale_id = ?1),
            (SELECT COUNT(*) FROM sale_returns WHERE sale_id = ?1)
        "#,
    )
    .bind(sale_id)
    .fetch_one(executor)
    .await?;
    Ok(counts)
}

// =============================================================================
// Read Model
// =============================================================================

#[derive(Debug, FromRow)]
struct SaleHeaderRow {
    id: i64,
    company_id: i64,
    company_name: String,
    branch_id: i64,
    branch_name: String,
    customer_id: Option<i64>,
    customer_name: Option<String>,
    customer_rut: Option<String>,
    cashier_user_id: i64,
    cashier_name: String,
    subtotal: Money,
    tax: Money,
    total: Money,
    sale_type: SaleType,
    status: SaleStatus,
    receipt_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl SaleHeaderRow {
    fn into_view(self, lines: Vec<SaleLineView>) -> SaleView {
        SaleView {
            id: self.id,
            company_id: self.company_id,
            company_name: self.company_name,
            branch_id: self.branch_id,
            branch_name: self.branch_name,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            customer_rut: self.customer_rut,
            cashier_user_id: self.cashier_user_id,
            cashier_name: self.cashier_name,
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            sale_type: self.sale_type,
            status: self.status,
            receipt_number: self.receipt_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
            lines,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    id: i64,
    sale_id: i64,
    product_id: i64,
    product_name: String,
    product_barcode: Option<String>,
    quantity: i64,
    unit_price: Money,
    line_subtotal: Money,
}

impl From<SaleLineRow> for SaleLineView {
    fn from(row: SaleLineRow) -> Self {
        SaleLineView {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_barcode: row.product_barcode,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_subtotal: row.line_subtotal,
        }
    }
}

const HEADER_SELECT: &str = r#"
    SELECT
        s.id, s.company_id, c.name AS company_name,
        s.branch_id, b.name AS branch_name,
        s.customer_id, cu.name AS customer_name, cu.rut AS customer_rut,
        s.cashier_user_id, u.name AS cashier_name,
        s.subtotal, s.tax, s.total, s.sale_type, s.status, s.receipt_number,
        s.created_at, s.updated_at
    FROM sales s
    JOIN companies c ON c.id = s.company_id
    JOIN branches b ON b.id = s.branch_id
    JOIN users u ON u.id = s.cashier_user_id
    LEFT JOIN customers cu ON cu.id = s.customer_id
"#;

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<Sale>> {
        get_sale(&self.pool, id).await
    }

    pub async fn lines(&self, sale_id: i64) -> DbResult<Vec<SaleLineItem>> {
        sale_lines(&self.pool, sale_id).await
    }

    /// Sale with company, branch, customer, cashier and product names joined in.
    pub async fn view(&self, id: i64) -> DbResult<Option<SaleView>> {
        let sql = format!("{} WHERE s.id = ?1", HEADER_SELECT);
        let header = sqlx::query_as::<_, SaleHeaderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let mut lines = self.line_views(&[header.id]).await?;
        let lines = lines.remove(&header.id).unwrap_or_default();
        Ok(Some(header.into_view(lines)))
    }

    /// Sales visible within `scope`, newest first.
    ///
    /// `filter.branch_id` narrows further but cannot widen a branch-bound scope:
    /// both conditions are applied.
    pub async fn list(&self, scope: &AccessScope, filter: &SaleListFilter) -> DbResult<Vec<SaleView>> {
        let mut qb = QueryBuilder::<Sqlite>::new(HEADER_SELECT);
        qb.push(" WHERE 1 = 1");

        if let Some(company_id) = scope.company_filter {
            qb.push(" AND s.company_id = ").push_bind(company_id);
        }
        if let Some(branch_id) = scope.branch_filter {
            qb.push(" AND s.branch_id = ").push_bind(branch_id);
        }
        if let Some(branch_id) = filter.branch_id {
            qb.push(" AND s.branch_id = ").push_bind(branch_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND s.status = ").push_bind(status);
        }
        if let Some(from) = filter.from {
            qb.push(" AND s.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND s.created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY s.created_at DESC, s.id DESC");

        let headers = qb
            .build_query_as::<SaleHeaderRow>()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let mut lines = self.line_views(&ids).await?;

        debug!(count = headers.len(), "Listed sales");
        Ok(headers
            .into_iter()
            .map(|h| {
                let sale_lines = lines.remove(&h.id).unwrap_or_default();
                h.into_view(sale_lines)
            })
            .collect())
    }

    async fn line_views(&self, sale_ids: &[i64]) -> DbResult<HashMap<i64, Vec<SaleLineView>>> {
        let mut grouped: HashMap<i64, Vec<SaleLineView>> = HashMap::new();
        if sale_ids.is_empty() {
            return Ok(grouped);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT
                li.id, li.sale_id, li.product_id, p.name AS product_name,
                p.barcode AS product_barcode, li.quantity, li.unit_price, li.line_subtotal
            FROM sale_line_items li
            JOIN products p ON p.id = li.product_id
            WHERE li.sale_id IN (
            "#,
        );
        let mut separated = qb.separated(", ");
        for id in sale_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY li.id");

        let rows = qb.build_query_as::<SaleLineRow>().fetch_all(&self.pool).await?;
        for row in rows {
            grouped.entry(row.sale_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use gon_core::types::IVA_RATE;
    use gon_core::pricing::compute_totals;
    use gon_core::Role;

    struct Seeded {
        db: Database,
        company: i64,
        branch: i64,
        other_branch: i64,
        cashier: i64,
        product: i64,
    }

    async fn seeded() -> Seeded {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let company = catalog.insert_company("Acme").await.unwrap();
        let branch = catalog.insert_branch(company, "Centro").await.unwrap();
        let other_branch = catalog.insert_branch(company, "Norte").await.unwrap();
        let cashier = catalog
            .insert_user(company, Some(branch), "Ana", Role::Salesperson)
            .await
            .unwrap();
        let product = catalog
            .insert_product(company, "Café 250g", Some("780123"), Money::from_minor(1000))
            .await
            .unwrap();
        Seeded { db, company, branch, other_branch, cashier, product }
    }

    async fn insert(s: &Seeded, branch_id: i64, quantity: i64) -> Sale {
        let unit = Money::from_minor(1000);
        let totals = compute_totals(&[(unit, quantity)], IVA_RATE);
        let mut tx = s.db.begin().await.unwrap();
        let sale = insert_sale(
            &mut *tx,
            &NewSale {
                company_id: s.company,
                branch_id,
                customer_id: None,
                cashier_user_id: s.cashier,
                totals,
                sale_type: SaleType::InPerson,
                status: SaleStatus::Completed,
                receipt_number: Some("B-001"),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        insert_line(&mut *tx, sale.id, s.product, quantity, unit, Utc::now())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        sale
    }

    #[tokio::test]
    async fn test_view_joins_names_and_lines() {
        let s = seeded().await;
        let sale = insert(&s, s.branch, 2).await;

        let view = s.db.sales().view(sale.id).await.unwrap().unwrap();
        assert_eq!(view.company_name, "Acme");
        assert_eq!(view.branch_name, "Centro");
        assert_eq!(view.cashier_name, "Ana");
        assert_eq!(view.subtotal, Money::from_minor(2000));
        assert_eq!(view.tax, Money::from_minor(380));
        assert_eq!(view.total, Money::from_minor(2380));
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].product_name, "Café 250g");
        assert_eq!(view.lines[0].line_subtotal, Money::from_minor(2000));

        assert!(s.db.sales().view(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_respects_branch_scope() {
        let s = seeded().await;
        insert(&s, s.branch, 1).await;
        insert(&s, s.other_branch, 1).await;

        let all = s
            .db
            .sales()
            .list(&AccessScope::unrestricted(), &SaleListFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let scope = AccessScope {
            company_filter: Some(s.company),
            branch_filter: Some(s.branch),
        };
        let scoped = s.db.sales().list(&scope, &SaleListFilter::default()).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].branch_id, s.branch);

        // a filter for another branch cannot escape the scope
        let filter = SaleListFilter {
            branch_id: Some(s.other_branch),
            ..Default::default()
        };
        assert!(s.db.sales().list(&scope, &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_delete_and_dependents() {
        let s = seeded().await;
        let sale = insert(&s, s.branch, 3).await;

        assert_eq!(dependent_counts(s.db.pool(), sale.id).await.unwrap(), (0, 0));
        assert_eq!(sold_quantities(s.db.pool(), sale.id).await.unwrap()[&s.product], 3);

        update_sale(s.db.pool(), sale.id, SaleStatus::Completed, Some("B-999"), Utc::now())
            .await
            .unwrap();
        let updated = s.db.sales().get(sale.id).await.unwrap().unwrap();
        assert_eq!(updated.receipt_number.as_deref(), Some("B-999"));
        assert!(updated.updated_at.is_some());

        delete_sale(s.db.pool(), sale.id).await.unwrap();
        assert!(s.db.sales().get(sale.id).await.unwrap().is_none());
        assert!(s.db.sales().lines(sale.id).await.unwrap().is_empty());
        assert!(matches!(
            delete_sale(s.db.pool(), sale.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
