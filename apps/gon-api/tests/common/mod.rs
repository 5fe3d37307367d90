//! Shared setup for the workflow and HTTP tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use gon_api::config::ApiConfig;
use gon_api::AppState;
use gon_core::dto::{CreateSaleRequest, SaleLineRequest};
use gon_core::{CallerIdentity, FixedClock, Money, Role, SaleType};
use gon_db::fixtures::{self, World};
use gon_db::Database;

pub struct TestApp {
    pub state: AppState,
    pub world: World,
}

impl TestApp {
    pub async fn new() -> Self {
        let (db, world) = fixtures::world().await.expect("seed world");
        Self::from_parts(db, world)
    }

    pub fn from_parts(db: Database, world: World) -> Self {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());
        let state = AppState::with_clock(db, ApiConfig::default(), Arc::new(clock));
        TestApp { state, world }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn global_admin(&self) -> CallerIdentity {
        identity(self.world.global_admin, Role::GlobalAdmin, self.world.company, None)
    }

    pub fn company_admin(&self) -> CallerIdentity {
        identity(self.world.company_admin, Role::CompanyAdmin, self.world.company, None)
    }

    pub fn branch_admin(&self) -> CallerIdentity {
        identity(
            self.world.branch_admin,
            Role::BranchAdmin,
            self.world.company,
            Some(self.world.branch),
        )
    }

    pub fn salesperson(&self) -> CallerIdentity {
        identity(
            self.world.salesperson,
            Role::Salesperson,
            self.world.company,
            Some(self.world.branch),
        )
    }

    pub fn other_branch_salesperson(&self) -> CallerIdentity {
        identity(
            self.world.other_branch_salesperson,
            Role::Salesperson,
            self.world.company,
            Some(self.world.other_branch),
        )
    }

    pub fn rival_admin(&self) -> CallerIdentity {
        identity(self.world.rival_admin, Role::CompanyAdmin, self.world.rival_company, None)
    }

    /// Sale at the main branch with the given `(product, quantity, unit price)` lines.
    pub fn sale_request(&self, lines: &[(i64, i64, Option<i64>)]) -> CreateSaleRequest {
        CreateSaleRequest {
            company_id: self.world.company,
            branch_id: self.world.branch,
            customer_id: Some(self.world.customer),
            sale_type: SaleType::InPerson,
            receipt_number: None,
            lines: lines
                .iter()
                .map(|&(product_id, quantity, price)| SaleLineRequest {
                    product_id,
                    quantity,
                    unit_price: price.map(Money::from_minor),
                })
                .collect(),
        }
    }

    pub async fn quantity(&self, stock_id: i64) -> i64 {
        self.db()
            .stock()
            .get(stock_id)
            .await
            .unwrap()
            .expect("stock item")
            .quantity
    }

    /// Every stock item's quantity equals the net of its movements.
    pub async fn assert_ledger_consistent(&self) {
        for audit in self.db().stock().audit_all().await.unwrap() {
            assert!(audit.consistent, "ledger drift: {:?}", audit);
        }
    }
}

pub fn identity(user_id: i64, role: Role, company_id: i64, branch_id: Option<i64>) -> CallerIdentity {
    CallerIdentity {
        user_id,
        role,
        company_id,
        branch_id,
    }
}
