//! # Stock Services
//!
//! Provisioning and manual adjustment of stock records, plus movement
//! history and ledger audit reads. Every write goes through `StockLedger`.

use std::sync::Arc;

use gon_core::dto::{LedgerAudit, ProvisionStockRequest, StockAdjustmentRequest};
use gon_core::validation::{validate_id, validate_provision_stock, validate_stock_adjustment};
use gon_core::scope::resolve_scope;
use gon_core::{CallerIdentity, Capability, Clock, Role, StockItem, StockMovement};
use gon_db::repository::{catalog, stock};
use gon_db::{Database, StockLedger};
use tracing::{info, warn};

use super::TxPolicy;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct StockService {
    db: Database,
    clock: Arc<dyn Clock>,
    policy: TxPolicy,
}

impl StockService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, policy: TxPolicy) -> Self {
        StockService { db, clock, policy }
    }

    pub async fn provision_stock(&self, request: &ProvisionStockRequest, caller: &CallerIdentity) -> ServiceResult<StockItem> {
        validate_provision_stock(request)?;

        let item = self
            .policy
            .run("provision_stock", || self.provision_tx(request, caller))
            .await?;

        info!(
            stock_item_id = item.id,
            product_id = item.product_id,
            branch_id = item.branch_id,
            quantity = item.quantity,
            "Stock provisioned"
        );
        Ok(item)
    }

    async fn provision_tx(&self, request: &ProvisionStockRequest, caller: &CallerIdentity) -> ServiceResult<StockItem> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let branch = catalog::find_branch(&mut *tx, request.branch_id)
            .await?
            .ok_or_else(|| ServiceError::invalid_reference(format!("Branch {} does not exist", request.branch_id)))?;
        caller.authorize(Capability::ProvisionStock, branch.company_id, branch.id)?;

        catalog::find_product(&mut *tx, request.product_id)
            .await?
            .filter(|p| p.company_id == branch.company_id)
            .ok_or_else(|| {
                ServiceError::invalid_reference(format!(
                    "Product {} does not exist in company {}",
                    request.product_id, branch.company_id
                ))
            })?;

        let item = StockLedger::new(&mut tx, now)
            .provision(
                request.product_id,
                branch.id,
                request.quantity,
                request.minimum_threshold,
                Some(caller.user_id),
            )
            .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Manual correction with a mandatory reason.
    pub async fn adjust_stock(
        &self,
        stock_id: i64,
        request: &StockAdjustmentRequest,
        caller: &CallerIdentity,
    ) -> ServiceResult<StockMovement> {
        validate_id("id", stock_id)?;
        validate_stock_adjustment(request)?;

        let movement = self
            .policy
            .run("adjust_stock", || self.adjust_tx(stock_id, request, caller))
            .await?;

        warn!(
            stock_item_id = stock_id,
            quantity = movement.quantity,
            direction = ?movement.direction,
            reason = %movement.reason,
            actor_user_id = caller.user_id,
            "Stock adjusted manually"
        );
        Ok(movement)
    }

    async fn adjust_tx(
        &self,
        stock_id: i64,
        request: &StockAdjustmentRequest,
        caller: &CallerIdentity,
    ) -> ServiceResult<StockMovement> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let item = stock::get_stock_item(&mut *tx, stock_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Stock item", stock_id))?;
        let branch = catalog::find_branch(&mut *tx, item.branch_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Branch", item.branch_id))?;
        caller.authorize(Capability::AdjustStock, branch.company_id, branch.id)?;

        let movement = StockLedger::new(&mut tx, now)
            .adjust(
                item.id,
                request.quantity,
                request.direction,
                request.reason.trim(),
                Some(caller.user_id),
            )
            .await?;

        tx.commit().await?;
        Ok(movement)
    }

    pub async fn stock_movements(&self, stock_id: i64, caller: &CallerIdentity) -> ServiceResult<Vec<StockMovement>> {
        self.ensure_visible(stock_id, caller).await?;
        Ok(self.db.stock().movements(stock_id).await?)
    }

    /// Movement history of one product across the branches the caller sees.
    pub async fn product_movements(&self, product_id: i64, caller: &CallerIdentity) -> ServiceResult<Vec<StockMovement>> {
        let product = catalog::find_product(self.db.pool(), product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
        if caller.role != Role::GlobalAdmin && product.company_id != caller.company_id {
            return Err(ServiceError::Forbidden(format!(
                "Product {} belongs to another company",
                product_id
            )));
        }

        let scope = resolve_scope(caller)?;
        Ok(self.db.stock().movements_for_product(product_id, &scope).await?)
    }

    /// Movement history of every stock item held at a branch.
    pub async fn branch_movements(&self, branch_id: i64, caller: &CallerIdentity) -> ServiceResult<Vec<StockMovement>> {
        let branch = catalog::find_branch(self.db.pool(), branch_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Branch", branch_id))?;
        if !caller.can_view(branch.company_id, branch.id)? {
            return Err(ServiceError::Forbidden(format!(
                "Branch {} is outside the caller's scope",
                branch_id
            )));
        }
        Ok(self.db.stock().movements_for_branch(branch_id).await?)
    }

    pub async fn audit_stock(&self, stock_id: i64, caller: &CallerIdentity) -> ServiceResult<LedgerAudit> {
        self.ensure_visible(stock_id, caller).await?;
        let audit = self
            .db
            .stock()
            .audit(stock_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Stock item", stock_id))?;

        if !audit.consistent {
            warn!(
                stock_item_id = stock_id,
                quantity = audit.quantity,
                movement_net = audit.movement_net,
                "Stock quantity disagrees with its movements"
            );
        }
        Ok(audit)
    }

    async fn ensure_visible(&self, stock_id: i64, caller: &CallerIdentity) -> ServiceResult<()> {
        let item = self
            .db
            .stock()
            .get(stock_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Stock item", stock_id))?;
        let branch = catalog::find_branch(self.db.pool(), item.branch_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Branch", item.branch_id))?;
        if !caller.can_view(branch.company_id, branch.id)? {
            return Err(ServiceError::Forbidden(format!(
                "Stock item {} is outside the caller's scope",
                stock_id
            )));
        }
        Ok(())
    }
}
