//! # Request and Read-Model Types
//!
//! Immutable values crossing the API boundary.
//!
//! ```text
//! JSON body ──► *Request ──► validation ──► workflow ──► *View ──► JSON
//! ```
//!
//! Requests never carry totals: subtotal, tax and total are always
//! recomputed from the lines. Views are flat read models assembled after
//! commit, with the names of referenced entities resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{MovementDirection, PaymentStatus, ReturnStatus, SaleStatus, SaleType};

// =============================================================================
// Sale Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub company_id: i64,
    pub branch_id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub sale_type: SaleType,
    #[serde(default)]
    pub receipt_number: Option<String>,
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineRequest {
    pub product_id: i64,
    pub quantity: i64,
    /// Price override. Absent or zero means "charge the list price".
    #[serde(default)]
    pub unit_price: Option<Money>,
}

/// Only these two fields of a sale may change after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub receipt_number: Option<String>,
}

/// Query-string filter for sale listings. Combined with the caller's scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleListFilter {
    #[serde(default)]
    pub branch_id: Option<i64>,
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

/// Query-string filter for return and payment listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRefFilter {
    #[serde(default)]
    pub sale_id: Option<i64>,
}

// =============================================================================
// Return Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturnRequest {
    pub sale_id: i64,
    pub actor_user_id: i64,
    #[serde(default)]
    pub reason: Option<String>,
    pub refund_amount: Money,
    pub lines: Vec<ReturnLineRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReturnRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub refund_amount: Option<Money>,
    #[serde(default)]
    pub status: Option<ReturnStatus>,
}

// =============================================================================
// Payment & Stock Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub sale_id: i64,
    pub payment_method_id: i64,
    pub amount: Money,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
}

/// Creates the stock record for a product at a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionStockRequest {
    pub product_id: i64,
    pub branch_id: i64,
    /// Opening balance, recorded as an inbound movement.
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub minimum_threshold: i64,
}

/// Manual stock correction outside the sale and return flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentRequest {
    pub quantity: i64,
    pub direction: MovementDirection,
    pub reason: String,
}

// =============================================================================
// Read Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    pub id: i64,
    pub company_id: i64,
    pub company_name: String,
    pub branch_id: i64,
    pub branch_name: String,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_rut: Option<String>,
    pub cashier_user_id: i64,
    pub cashier_name: String,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub sale_type: SaleType,
    pub status: SaleStatus,
    pub receipt_number: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
    pub lines: Vec<SaleLineView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineView {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_barcode: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnView {
    pub id: i64,
    pub sale_id: i64,
    pub actor_user_id: i64,
    pub actor_name: String,
    pub reason: Option<String>,
    pub refund_amount: Money,
    pub status: ReturnStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
    pub lines: Vec<ReturnLineView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineView {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub id: i64,
    pub sale_id: i64,
    pub payment_method_id: i64,
    pub payment_method_name: String,
    pub amount: Money,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Result of reconciling a stock item against its movement history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    pub stock_item_id: i64,
    pub quantity: i64,
    pub movement_net: i64,
    pub movement_count: i64,
    pub consistent: bool,
}
