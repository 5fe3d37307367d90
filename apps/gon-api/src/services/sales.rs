//! # Sale Workflow
//!
//! ```text
//! create_sale(request, caller)
//!   │
//!   ├─ validate request shape                     (no I/O)
//!   ├─ caller holds CreateSale, scope permits     (Forbidden)
//!   │
//!   ├─ BEGIN ───────────────────────────────────────────────────────────┐
//!   │  ├─ branch ∈ company, customer ∈ company     (InvalidReference)   │
//!   │  ├─ products ∈ company, stock record exists  (InvalidReference)   │
//!   │  ├─ on hand ≥ Σ requested per product         (InsufficientStock)  │
//!   │  ├─ price lines, compute totals                                   │
//!   │  ├─ INSERT sale                                                   │
//!   │  └─ per line: INSERT line, conditional decrement, movement        │
//!   ├─ COMMIT ──────────────────────────────────────────────────────────┘
//!   │
//!   └─ assemble SaleView from the pool
//! ```
//!
//! Any failure between BEGIN and COMMIT drops the transaction, so no partial
//! sale and no partial decrement is ever visible.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gon_core::dto::{CreateSaleRequest, SaleListFilter, SaleView, UpdateSaleRequest};
use gon_core::pricing::{compute_totals, price_line};
use gon_core::scope::resolve_scope;
use gon_core::types::IVA_RATE;
use gon_core::validation::{validate_create_sale, validate_id, validate_update_sale};
use gon_core::{CallerIdentity, Capability, Clock, Money, Sale, SaleStatus};
use gon_db::repository::{catalog, sale, stock};
use gon_db::{Database, NewSale, StockLedger};
use tracing::{info, warn};

use super::TxPolicy;
use crate::error::{ServiceError, ServiceResult};

/// Reason recorded on the outbound movements of a sale.
pub fn sale_reason(sale_id: i64) -> String {
    format!("Sale #{}", sale_id)
}

/// Reason recorded on the compensating movements of a deleted sale.
pub fn deletion_reason(sale_id: i64) -> String {
    format!("Deletion of sale #{}", sale_id)
}

#[derive(Clone)]
pub struct SaleService {
    db: Database,
    clock: Arc<dyn Clock>,
    policy: TxPolicy,
}

impl SaleService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, policy: TxPolicy) -> Self {
        SaleService { db, clock, policy }
    }

    // =========================================================================
    // Create
    // =========================================================================

    pub async fn create_sale(&self, request: &CreateSaleRequest, caller: &CallerIdentity) -> ServiceResult<SaleView> {
        validate_create_sale(request)?;
        caller.authorize(Capability::CreateSale, request.company_id, request.branch_id)?;

        let sale = self
            .policy
            .run("create_sale", || self.create_sale_tx(request, caller))
            .await?;

        info!(
            sale_id = sale.id,
            branch_id = sale.branch_id,
            cashier_user_id = sale.cashier_user_id,
            total = %sale.total,
            lines = request.lines.len(),
            "Sale created"
        );

        self.view(sale.id).await
    }

    async fn create_sale_tx(&self, request: &CreateSaleRequest, caller: &CallerIdentity) -> ServiceResult<Sale> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        catalog::find_branch(&mut *tx, request.branch_id)
            .await?
            .filter(|b| b.company_id == request.company_id)
            .ok_or_else(|| {
                ServiceError::invalid_reference(format!(
                    "Branch {} does not exist in company {}",
                    request.branch_id, request.company_id
                ))
            })?;

        if let Some(customer_id) = request.customer_id {
            catalog::find_customer(&mut *tx, customer_id)
                .await?
                .filter(|c| c.company_id == request.company_id)
                .ok_or_else(|| {
                    ServiceError::invalid_reference(format!(
                        "Customer {} does not exist in company {}",
                        customer_id, request.company_id
                    ))
                })?;
        }

        catalog::find_user(&mut *tx, caller.user_id)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| {
                ServiceError::invalid_reference(format!("Cashier {} is unknown or inactive", caller.user_id))
            })?;

        // Σ requested per product, in first-seen order
        let mut order: Vec<i64> = Vec::new();
        let mut requested: HashMap<i64, i64> = HashMap::new();
        for line in &request.lines {
            let total = requested.entry(line.product_id).or_insert_with(|| {
                order.push(line.product_id);
                0
            });
            *total += line.quantity;
        }

        let products = catalog::products_by_ids(&mut *tx, &order).await?;

        for product_id in &order {
            let product = products
                .get(product_id)
                .filter(|p| p.company_id == request.company_id)
                .ok_or_else(|| {
                    ServiceError::invalid_reference(format!(
                        "Product {} does not exist in company {}",
                        product_id, request.company_id
                    ))
                })?;

            let item = stock::find_stock_item(&mut *tx, product.id, request.branch_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::invalid_reference(format!(
                        "Product {} ({}) has no stock record at branch {}",
                        product.id, product.name, request.branch_id
                    ))
                })?;

            let wanted = requested[product_id];
            if item.quantity < wanted {
                return Err(ServiceError::InsufficientStock {
                    product_id: product.id,
                    available: item.quantity,
                    requested: wanted,
                });
            }
        }

        let mut priced: Vec<(i64, i64, Money)> = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            // presence checked above
            let Some(product) = products.get(&line.product_id) else {
                return Err(ServiceError::invalid_reference(format!("Product {}", line.product_id)));
            };
            priced.push((line.product_id, line.quantity, price_line(product, line.unit_price)));
        }

        let amounts: Vec<(Money, i64)> = priced.iter().map(|(_, qty, unit)| (*unit, *qty)).collect();
        let totals = compute_totals(&amounts, IVA_RATE);

        let sale = sale::insert_sale(
            &mut *tx,
            &NewSale {
                company_id: request.company_id,
                branch_id: request.branch_id,
                customer_id: request.customer_id,
                cashier_user_id: caller.user_id,
                totals,
                sale_type: request.sale_type,
                status: SaleStatus::Completed,
                receipt_number: request.receipt_number.as_deref(),
                created_at: now,
            },
        )
        .await?;

        let reason = sale_reason(sale.id);
        for (product_id, quantity, unit_price) in priced {
            sale::insert_line(&mut *tx, sale.id, product_id, quantity, unit_price, now).await?;
            StockLedger::new(&mut tx, now)
                .reserve_and_decrement(
                    product_id,
                    request.branch_id,
                    quantity,
                    &reason,
                    Some(caller.user_id),
                    Some(sale.id),
                )
                .await?;
        }

        for product_id in &order {
            let Some(item) = stock::find_stock_item(&mut *tx, *product_id, request.branch_id).await? else {
                continue;
            };
            if item.is_below_threshold() {
                warn!(
                    stock_item_id = item.id,
                    product_id = item.product_id,
                    branch_id = item.branch_id,
                    quantity = item.quantity,
                    minimum = item.minimum_threshold,
                    "Stock at or below minimum threshold"
                );
            }
        }

        tx.commit().await?;
        Ok(sale)
    }

    // =========================================================================
    // Update / Delete
    // =========================================================================

    /// Changes status and/or receipt number. Totals and lines are immutable.
    pub async fn update_sale(&self, id: i64, request: &UpdateSaleRequest, caller: &CallerIdentity) -> ServiceResult<()> {
        validate_id("id", id)?;
        validate_update_sale(request)?;

        let (from, to) = self
            .policy
            .run("update_sale", || self.update_sale_tx(id, request, caller))
            .await?;

        info!(sale_id = id, ?from, ?to, "Sale updated");
        Ok(())
    }

    async fn update_sale_tx(
        &self,
        id: i64,
        request: &UpdateSaleRequest,
        caller: &CallerIdentity,
    ) -> ServiceResult<(SaleStatus, SaleStatus)> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current = sale::get_sale(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", id))?;
        caller.authorize(Capability::ModifySale, current.company_id, current.branch_id)?;

        let status = match request.status {
            Some(next) => {
                current.status.ensure_transition(next)?;
                next
            }
            None => current.status,
        };
        let receipt_number = request
            .receipt_number
            .as_deref()
            .or(current.receipt_number.as_deref());

        sale::update_sale(&mut *tx, id, status, receipt_number, now).await?;
        tx.commit().await?;
        Ok((current.status, status))
    }

    /// Deletes a sale that has neither payments nor returns, putting its
    /// stock back through compensating inbound movements.
    pub async fn delete_sale(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<()> {
        validate_id("id", id)?;

        let restored = self
            .policy
            .run("delete_sale", || self.delete_sale_tx(id, caller))
            .await?;

        warn!(sale_id = id, actor_user_id = caller.user_id, restored_lines = restored, "Sale deleted");
        Ok(())
    }

    async fn delete_sale_tx(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<usize> {
        let now: DateTime<Utc> = self.clock.now();
        let mut tx = self.db.begin().await?;

        let current = sale::get_sale(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", id))?;
        caller.authorize(Capability::DeleteSale, current.company_id, current.branch_id)?;

        let (payments, returns) = sale::dependent_counts(&mut *tx, id).await?;
        if payments > 0 || returns > 0 {
            return Err(ServiceError::Validation(format!(
                "Sale #{} has {} payment(s) and {} return(s) and cannot be deleted",
                id, payments, returns
            )));
        }

        let lines = sale::sale_lines(&mut *tx, id).await?;
        let reason = deletion_reason(id);
        for line in &lines {
            StockLedger::new(&mut tx, now)
                .release_from_sale(
                    line.product_id,
                    current.branch_id,
                    line.quantity,
                    &reason,
                    Some(caller.user_id),
                    id,
                )
                .await?;
        }

        sale::delete_sale(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(lines.len())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_sale(&self, id: i64, caller: &CallerIdentity) -> ServiceResult<SaleView> {
        let view = self.view(id).await?;
        if !caller.can_view(view.company_id, view.branch_id)? {
            return Err(ServiceError::Forbidden(format!("Sale #{} is outside the caller's scope", id)));
        }
        Ok(view)
    }

    /// Sales visible to the caller, narrowed by `filter`.
    pub async fn list_sales(&self, caller: &CallerIdentity, filter: &SaleListFilter) -> ServiceResult<Vec<SaleView>> {
        let scope = resolve_scope(caller)?;
        Ok(self.db.sales().list(&scope, filter).await?)
    }

    async fn view(&self, id: i64) -> ServiceResult<SaleView> {
        self.db
            .sales()
            .view(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Sale", id))
    }
}
