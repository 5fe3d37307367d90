//! # Stock Ledger
//!
//! Single source of truth for on-hand quantity. Every quantity change is
//! paired with exactly one immutable movement row, in the same transaction.
//!
//! ## Invariant
//! ```text
//! stock_items.quantity == Σ (+quantity for inbound, -quantity for outbound)
//!                         over stock_movements of that item
//! ```
//!
//! ## Lost-Update Prevention
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Two sales race for the last 3 units                                    │
//! │                                                                         │
//! │  Tx A: UPDATE stock_items SET quantity = quantity - 3                   │
//! │        WHERE id = 7 AND quantity >= 3         → 1 row  ✓               │
//! │                                                                         │
//! │  Tx B: same statement, after A commits        → 0 rows                  │
//! │        re-read: quantity = 0                  → InsufficientStock       │
//! │                                                                         │
//! │  The check and the decrement are ONE statement, so no caller can act   │
//! │  on a stale read. If B's snapshot predates A's commit, SQLite refuses  │
//! │  the write with SQLITE_BUSY; the service retries the whole transaction.│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`StockLedger`] writes on a caller-owned connection (an open transaction);
//! [`StockRepository`] serves pool-backed reads.

use chrono::{DateTime, Utc};
use gon_core::dto::LedgerAudit;
use gon_core::{AccessScope, CoreError, MovementDirection, StockItem, StockMovement, ValidationError};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbResult, LedgerResult};

const STOCK_ITEM_COLUMNS: &str =
    "id, product_id, branch_id, quantity, minimum_threshold, created_at, updated_at";

const MOVEMENT_COLUMNS: &str =
    "id, stock_item_id, quantity, direction, reason, actor_user_id, sale_id, return_id, created_at";

/// Reason recorded on the movement created for a provisioned opening balance.
pub const OPENING_BALANCE_REASON: &str = "Opening balance";

// =============================================================================
// Lookups
// =============================================================================

pub async fn find_stock_item<'e, E>(executor: E, product_id: i64, branch_id: i64) -> DbResult<Option<StockItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM stock_items WHERE product_id = ?1 AND branch_id = ?2",
        STOCK_ITEM_COLUMNS
    );
    let row = sqlx::query_as::<_, StockItem>(&sql)
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn get_stock_item<'e, E>(executor: E, id: i64) -> DbResult<Option<StockItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM stock_items WHERE id = ?1", STOCK_ITEM_COLUMNS);
    let row = sqlx::query_as::<_, StockItem>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

// =============================================================================
// Ledger (write side)
// =============================================================================

/// Performs quantity changes on an open transaction.
///
/// ```rust,ignore
/// let mut tx = db.begin().await?;
/// StockLedger::new(&mut tx, now)
///     .reserve_and_decrement(product_id, branch_id, 3, "Sale #12", Some(user), Some(12))
///     .await?;
/// tx.commit().await?;
/// ```
pub struct StockLedger<'c> {
    conn: &'c mut SqliteConnection,
    at: DateTime<Utc>,
}

impl<'c> StockLedger<'c> {
    /// `at` is stamped on every movement and `updated_at` this ledger writes.
    pub fn new(conn: &'c mut SqliteConnection, at: DateTime<Utc>) -> Self {
        StockLedger { conn, at }
    }

    /// Decrements stock for a sale line and appends an outbound movement.
    ///
    /// ## Errors
    /// - `InvalidQuantity` for `quantity <= 0`, before any query runs
    /// - `StockNotFound` when (product, branch) has no stock record
    /// - `InsufficientStock` with the available and requested amounts
    pub async fn reserve_and_decrement(
        &mut self,
        product_id: i64,
        branch_id: i64,
        quantity: i64,
        reason: &str,
        actor_user_id: Option<i64>,
        sale_id: Option<i64>,
    ) -> LedgerResult<StockMovement> {
        ensure_positive(quantity)?;

        let item = find_stock_item(&mut *self.conn, product_id, branch_id)
            .await?
            .ok_or(CoreError::StockNotFound {
                product_id,
                branch_id,
            })?;

        self.debit(&item, quantity).await?;

        debug!(stock_item_id = item.id, quantity, ?sale_id, "Stock decremented");
        self.append(item.id, quantity, MovementDirection::Outbound, reason, actor_user_id, sale_id, None)
            .await
    }

    /// Increments stock for a return line and appends an inbound movement.
    ///
    /// No upper bound: returning more than was sold is accepted here and
    /// flagged by the return workflow.
    pub async fn restore_from_return(
        &mut self,
        product_id: i64,
        branch_id: i64,
        quantity: i64,
        reason: &str,
        actor_user_id: Option<i64>,
        return_id: Option<i64>,
    ) -> LedgerResult<StockMovement> {
        ensure_positive(quantity)?;

        let item = find_stock_item(&mut *self.conn, product_id, branch_id)
            .await?
            .ok_or(CoreError::StockNotFound {
                product_id,
                branch_id,
            })?;

        self.credit(item.id, quantity).await?;

        debug!(stock_item_id = item.id, quantity, ?return_id, "Stock restored");
        self.append(item.id, quantity, MovementDirection::Inbound, reason, actor_user_id, None, return_id)
            .await
    }

    /// Puts back stock taken by a sale that is being deleted.
    ///
    /// The movement references the sale; the reference becomes NULL once the
    /// sale row is gone, the reason text keeps the sale number.
    pub async fn release_from_sale(
        &mut self,
        product_id: i64,
        branch_id: i64,
        quantity: i64,
        reason: &str,
        actor_user_id: Option<i64>,
        sale_id: i64,
    ) -> LedgerResult<StockMovement> {
        ensure_positive(quantity)?;

        let item = find_stock_item(&mut *self.conn, product_id, branch_id)
            .await?
            .ok_or(CoreError::StockNotFound {
                product_id,
                branch_id,
            })?;

        self.credit(item.id, quantity).await?;
        self.append(item.id, quantity, MovementDirection::Inbound, reason, actor_user_id, Some(sale_id), None)
            .await
    }

    /// Takes back stock that a deleted return had restored.
    ///
    /// Uses the same conditional decrement as a sale: if the units were sold
    /// again in the meantime the reversal fails with `InsufficientStock`.
    pub async fn reverse_return(
        &mut self,
        product_id: i64,
        branch_id: i64,
        quantity: i64,
        reason: &str,
        actor_user_id: Option<i64>,
        return_id: i64,
    ) -> LedgerResult<StockMovement> {
        ensure_positive(quantity)?;

        let item = find_stock_item(&mut *self.conn, product_id, branch_id)
            .await?
            .ok_or(CoreError::StockNotFound {
                product_id,
                branch_id,
            })?;

        self.debit(&item, quantity).await?;
        self.append(item.id, quantity, MovementDirection::Outbound, reason, actor_user_id, None, Some(return_id))
            .await
    }

    /// Manual correction (count discrepancies, breakage, supplier deliveries).
    pub async fn adjust(
        &mut self,
        stock_id: i64,
        quantity: i64,
        direction: MovementDirection,
        reason: &str,
        actor_user_id: Option<i64>,
    ) -> LedgerResult<StockMovement> {
        ensure_positive(quantity)?;

        let item = get_stock_item(&mut *self.conn, stock_id)
            .await?
            .ok_or(CoreError::StockItemNotFound(stock_id))?;

        match direction {
            MovementDirection::Inbound => self.credit(item.id, quantity).await?,
            MovementDirection::Outbound => self.debit(&item, quantity).await?,
        }

        debug!(stock_item_id = item.id, quantity, ?direction, "Stock adjusted");
        self.append(item.id, quantity, direction, reason, actor_user_id, None, None)
            .await
    }

    /// Creates the stock record for (product, branch).
    ///
    /// The record starts at zero and a non-zero opening balance is booked as an
    /// inbound movement, so the invariant holds from the first row.
    pub async fn provision(
        &mut self,
        product_id: i64,
        branch_id: i64,
        initial_quantity: i64,
        minimum_threshold: i64,
        actor_user_id: Option<i64>,
    ) -> LedgerResult<StockItem> {
        if find_stock_item(&mut *self.conn, product_id, branch_id).await?.is_some() {
            return Err(CoreError::from(ValidationError::Duplicate {
                field: "stock".to_string(),
                value: format!("product {} at branch {}", product_id, branch_id),
            })
            .into());
        }

        let sql = format!(
            r#"
            INSERT INTO stock_items (product_id, branch_id, quantity, minimum_threshold, created_at)
            VALUES (?1, ?2, 0, ?3, ?4)
            RETURNING {}
            "#,
            STOCK_ITEM_COLUMNS
        );
        let item = sqlx::query_as::<_, StockItem>(&sql)
            .bind(product_id)
            .bind(branch_id)
            .bind(minimum_threshold)
            .bind(self.at)
            .fetch_one(&mut *self.conn)
            .await?;

        if initial_quantity <= 0 {
            return Ok(item);
        }

        self.credit(item.id, initial_quantity).await?;
        self.append(
            item.id,
            initial_quantity,
            MovementDirection::Inbound,
            OPENING_BALANCE_REASON,
            actor_user_id,
            None,
            None,
        )
        .await?;

        let item = get_stock_item(&mut *self.conn, item.id)
            .await?
            .ok_or(CoreError::StockItemNotFound(item.id))?;
        Ok(item)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Conditional decrement: the availability check and the write are one
    /// statement.
    async fn debit(&mut self, item: &StockItem, quantity: i64) -> LedgerResult<()> {
        if item.quantity < quantity {
            return Err(CoreError::InsufficientStock {
                product_id: item.product_id,
                available: item.quantity,
                requested: quantity,
            }
            .into());
        }

        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity = quantity - ?1, updated_at = ?2
            WHERE id = ?3 AND quantity >= ?1
            "#,
        )
        .bind(quantity)
        .bind(self.at)
        .bind(item.id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            let available: i64 = sqlx::query_scalar("SELECT quantity FROM stock_items WHERE id = ?1")
                .bind(item.id)
                .fetch_one(&mut *self.conn)
                .await?;
            return Err(CoreError::InsufficientStock {
                product_id: item.product_id,
                available,
                requested: quantity,
            }
            .into());
        }

        Ok(())
    }

    async fn credit(&mut self, stock_item_id: i64, quantity: i64) -> LedgerResult<()> {
        sqlx::query("UPDATE stock_items SET quantity = quantity + ?1, updated_at = ?2 WHERE id = ?3")
            .bind(quantity)
            .bind(self.at)
            .bind(stock_item_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn append(
        &mut self,
        stock_item_id: i64,
        quantity: i64,
        direction: MovementDirection,
        reason: &str,
        actor_user_id: Option<i64>,
        sale_id: Option<i64>,
        return_id: Option<i64>,
    ) -> LedgerResult<StockMovement> {
        let sql = format!(
            r#"
            INSERT INTO stock_movements (
                stock_item_id, quantity, direction, reason,
                actor_user_id, sale_id, return_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        );
        let movement = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(stock_item_id)
            .bind(quantity)
            .bind(direction)
            .bind(reason)
            .bind(actor_user_id)
            .bind(sale_id)
            .bind(return_id)
            .bind(self.at)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(movement)
    }
}

fn ensure_positive(quantity: i64) -> Result<(), CoreError> {
    if quantity <= 0 {
        return Err(CoreError::InvalidQuantity(quantity));
    }
    Ok(())
}

// =============================================================================
// Repository (read side)
// =============================================================================

#[derive(Debug, FromRow)]
struct AuditRow {
    stock_item_id: i64,
    quantity: i64,
    movement_net: i64,
    movement_count: i64,
}

impl From<AuditRow> for LedgerAudit {
    fn from(row: AuditRow) -> Self {
        LedgerAudit {
            stock_item_id: row.stock_item_id,
            quantity: row.quantity,
            movement_net: row.movement_net,
            movement_count: row.movement_count,
            consistent: row.quantity == row.movement_net,
        }
    }
}

const AUDIT_SELECT: &str = r#"
    SELECT
        s.id AS stock_item_id,
        s.quantity AS quantity,
        COALESCE(SUM(CASE m.direction WHEN 'inbound' THEN m.quantity ELSE -m.quantity END), 0) AS movement_net,
        COUNT(m.id) AS movement_count
    FROM stock_items s
    LEFT JOIN stock_movements m ON m.stock_item_id = s.id
"#;

/// Pool-backed stock reads.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<StockItem>> {
        get_stock_item(&self.pool, id).await
    }

    pub async fn find(&self, product_id: i64, branch_id: i64) -> DbResult<Option<StockItem>> {
        find_stock_item(&self.pool, product_id, branch_id).await
    }

    /// Movement history of one item, oldest first.
    pub async fn movements(&self, stock_item_id: i64) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE stock_item_id = ?1 ORDER BY id",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(stock_item_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Movements of every stock item of a product inside `scope`, oldest first.
    pub async fn movements_for_product(&self, product_id: i64, scope: &AccessScope) -> DbResult<Vec<StockMovement>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT m.id, m.stock_item_id, m.quantity, m.direction, m.reason,
                   m.actor_user_id, m.sale_id, m.return_id, m.created_at
            FROM stock_movements m
            JOIN stock_items s ON s.id = m.stock_item_id
            JOIN branches b ON b.id = s.branch_id
            WHERE s.product_id = "#,
        );
        qb.push_bind(product_id);
        if let Some(company_id) = scope.company_filter {
            qb.push(" AND b.company_id = ").push_bind(company_id);
        }
        if let Some(branch_id) = scope.branch_filter {
            qb.push(" AND s.branch_id = ").push_bind(branch_id);
        }
        qb.push(" ORDER BY m.id");

        let rows = qb.build_query_as::<StockMovement>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Movements of every stock item held at a branch, oldest first.
    pub async fn movements_for_branch(&self, branch_id: i64) -> DbResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT m.id, m.stock_item_id, m.quantity, m.direction, m.reason,
                   m.actor_user_id, m.sale_id, m.return_id, m.created_at
            FROM stock_movements m
            JOIN stock_items s ON s.id = m.stock_item_id
            WHERE s.branch_id = ?1
            ORDER BY m.id
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Movements written on behalf of a return.
    pub async fn movements_for_return(&self, return_id: i64) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE return_id = ?1 ORDER BY id",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(return_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Movements written on behalf of a sale.
    pub async fn movements_for_sale(&self, sale_id: i64) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE sale_id = ?1 ORDER BY id",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Reconciles one item's quantity against its movement history.
    pub async fn audit(&self, stock_item_id: i64) -> DbResult<Option<LedgerAudit>> {
        let sql = format!("{} WHERE s.id = ?1 GROUP BY s.id, s.quantity", AUDIT_SELECT);
        let row = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(stock_item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LedgerAudit::from))
    }

    /// Reconciles every stock item.
    pub async fn audit_all(&self) -> DbResult<Vec<LedgerAudit>> {
        let sql = format!("{} GROUP BY s.id, s.quantity ORDER BY s.id", AUDIT_SELECT);
        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(LedgerAudit::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::{Database, DbConfig};
    use gon_core::{Money, Role};

    struct Fixture {
        db: Database,
        company: i64,
        product: i64,
        branch: i64,
        user: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();
        let company = catalog.insert_company("Acme").await.unwrap();
        let branch = catalog.insert_branch(company, "Centro").await.unwrap();
        let product = catalog
            .insert_product(company, "Yerba 1kg", None, Money::from_minor(100))
            .await
            .unwrap();
        let user = catalog
            .insert_user(company, Some(branch), "Bodega", Role::BranchAdmin)
            .await
            .unwrap();
        Fixture {
            db,
            company,
            product,
            branch,
            user,
        }
    }

    async fn provision(f: &Fixture, qty: i64) -> StockItem {
        let mut tx = f.db.begin().await.unwrap();
        let item = StockLedger::new(&mut tx, Utc::now())
            .provision(f.product, f.branch, qty, 2, Some(f.user))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_provision_books_opening_balance() {
        let f = fixture().await;
        let item = provision(&f, 10).await;
        assert_eq!(item.quantity, 10);

        let movements = f.db.stock().movements(item.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].direction, MovementDirection::Inbound);
        assert_eq!(movements[0].reason, OPENING_BALANCE_REASON);

        let audit = f.db.stock().audit(item.id).await.unwrap().unwrap();
        assert!(audit.consistent);
    }

    #[tokio::test]
    async fn test_provision_rejects_duplicate() {
        let f = fixture().await;
        provision(&f, 1).await;

        let mut tx = f.db.begin().await.unwrap();
        let err = StockLedger::new(&mut tx, Utc::now())
            .provision(f.product, f.branch, 1, 0, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Rejected(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_decrement_and_restore_keep_invariant() {
        let f = fixture().await;
        let item = provision(&f, 10).await;

        let mut tx = f.db.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx, Utc::now());
        let out = ledger
            .reserve_and_decrement(f.product, f.branch, 3, "Sale #1", Some(f.user), None)
            .await
            .unwrap();
        assert_eq!(out.signed_quantity(), -3);
        let back = ledger
            .restore_from_return(f.product, f.branch, 2, "Return of sale #1", Some(f.user), None)
            .await
            .unwrap();
        assert_eq!(back.signed_quantity(), 2);
        tx.commit().await.unwrap();

        let after = f.db.stock().get(item.id).await.unwrap().unwrap();
        assert_eq!(after.quantity, 9);
        assert!(f.db.stock().audit(item.id).await.unwrap().unwrap().consistent);
    }

    #[tokio::test]
    async fn test_insufficient_stock_reports_amounts_and_writes_nothing() {
        let f = fixture().await;
        let item = provision(&f, 7).await;

        let mut tx = f.db.begin().await.unwrap();
        let err = StockLedger::new(&mut tx, Utc::now())
            .reserve_and_decrement(f.product, f.branch, 20, "Sale #2", None, None)
            .await
            .unwrap_err();
        drop(tx);

        match err {
            LedgerError::Rejected(CoreError::InsufficientStock {
                available, requested, ..
            }) => {
                assert_eq!(available, 7);
                assert_eq!(requested, 20);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(f.db.stock().get(item.id).await.unwrap().unwrap().quantity, 7);
        assert_eq!(f.db.stock().movements(item.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_later_failure_rolls_back_earlier_decrement() {
        let f = fixture().await;
        let first = provision(&f, 10).await;

        let other_product = f
            .db
            .catalog()
            .insert_product(f.company, "Mate calabaza", None, Money::from_minor(2500))
            .await
            .unwrap();
        let mut tx = f.db.begin().await.unwrap();
        let second = StockLedger::new(&mut tx, Utc::now())
            .provision(other_product, f.branch, 1, 0, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        let before = f.db.stock().audit_all().await.unwrap();

        // first line goes through, second one is short
        let mut tx = f.db.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx, Utc::now());
        ledger
            .reserve_and_decrement(f.product, f.branch, 4, "Sale #9", Some(f.user), None)
            .await
            .unwrap();
        let err = ledger
            .reserve_and_decrement(other_product, f.branch, 5, "Sale #9", Some(f.user), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::InsufficientStock { available: 1, .. })));
        drop(tx);

        assert_eq!(f.db.stock().get(first.id).await.unwrap().unwrap().quantity, 10);
        assert_eq!(f.db.stock().movements(first.id).await.unwrap().len(), 1);
        assert_eq!(f.db.stock().movements(second.id).await.unwrap().len(), 1);
        assert_eq!(f.db.stock().audit_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_reverse_return_needs_units_on_hand() {
        let f = fixture().await;
        let item = provision(&f, 2).await;

        let mut tx = f.db.begin().await.unwrap();
        let err = StockLedger::new(&mut tx, Utc::now())
            .reverse_return(f.product, f.branch, 3, "Deletion of return #1", Some(f.user), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::InsufficientStock { available: 2, .. })));
        drop(tx);

        assert_eq!(f.db.stock().get(item.id).await.unwrap().unwrap().quantity, 2);
        assert_eq!(f.db.stock().movements(item.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_by_product_and_branch() {
        let f = fixture().await;
        let item = provision(&f, 6).await;
        let north = f.db.catalog().insert_branch(f.company, "Norte").await.unwrap();

        let mut tx = f.db.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx, Utc::now());
        ledger.provision(f.product, north, 3, 0, None).await.unwrap();
        ledger
            .reserve_and_decrement(f.product, f.branch, 2, "Sale #1", Some(f.user), None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let all = f
            .db
            .stock()
            .movements_for_product(f.product, &AccessScope::unrestricted())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let scope = AccessScope {
            company_filter: Some(f.company),
            branch_filter: Some(f.branch),
        };
        let scoped = f.db.stock().movements_for_product(f.product, &scope).await.unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|m| m.stock_item_id == item.id));

        let foreign = AccessScope {
            company_filter: Some(f.company + 1),
            branch_filter: None,
        };
        assert!(f.db.stock().movements_for_product(f.product, &foreign).await.unwrap().is_empty());

        assert_eq!(f.db.stock().movements_for_branch(north).await.unwrap().len(), 1);
        assert_eq!(f.db.stock().movements_for_branch(f.branch).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let f = fixture().await;
        provision(&f, 5).await;

        let mut tx = f.db.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx, Utc::now());
        for qty in [0, -1] {
            let err = ledger
                .reserve_and_decrement(f.product, f.branch, qty, "Sale", None, None)
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::Rejected(CoreError::InvalidQuantity(_))));
        }
    }

    #[tokio::test]
    async fn test_missing_stock_record() {
        let f = fixture().await;
        let mut tx = f.db.begin().await.unwrap();
        let err = StockLedger::new(&mut tx, Utc::now())
            .restore_from_return(f.product, f.branch, 1, "Return", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::StockNotFound { .. })));
    }

    #[tokio::test]
    async fn test_adjust_outbound_respects_on_hand() {
        let f = fixture().await;
        let item = provision(&f, 4).await;

        let mut tx = f.db.begin().await.unwrap();
        let mut ledger = StockLedger::new(&mut tx, Utc::now());
        ledger
            .adjust(item.id, 1, MovementDirection::Outbound, "Breakage", Some(f.user))
            .await
            .unwrap();
        let err = ledger
            .adjust(item.id, 10, MovementDirection::Outbound, "Count correction", Some(f.user))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(CoreError::InsufficientStock { available: 3, .. })));
        ledger
            .adjust(item.id, 6, MovementDirection::Inbound, "Supplier delivery", Some(f.user))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let audits = f.db.stock().audit_all().await.unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].quantity, 9);
        assert_eq!(audits[0].movement_count, 3);
        assert!(audits[0].consistent);
    }

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let f = fixture().await;
        let item = provision(&f, 1).await;
        let result = sqlx::query("DELETE FROM stock_movements WHERE stock_item_id = ?1")
            .bind(item.id)
            .execute(f.db.pool())
            .await;
        assert!(result.is_err());
    }
}
