//! HTTP routes.
//!
//! Handlers are thin: extract, call the service, pick the status code.
//! Extractor rejections are folded into [`ServiceError::Validation`] so every
//! failure carries the same `{ code, message }` body.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use gon_core::dto::{
    CreatePaymentRequest, CreateReturnRequest, CreateSaleRequest, LedgerAudit, PaymentView, ProvisionStockRequest,
    ReturnView, SaleListFilter, SaleRefFilter, SaleView, StockAdjustmentRequest, UpdateReturnRequest,
    UpdateSaleRequest,
};
use gon_core::{StockItem, StockMovement};
use serde::Serialize;

use crate::auth::Caller;
use crate::error::{ServiceError, ServiceResult};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sales", post(create_sale).get(list_sales))
        .route("/sales/:id", get(get_sale).patch(update_sale).delete(delete_sale))
        .route("/sales/:id/returns", get(list_sale_returns))
        .route("/sales/:id/payments", get(list_sale_payments))
        .route("/returns", post(create_return).get(list_returns))
        .route("/returns/:id", get(get_return).patch(update_return).delete(delete_return))
        .route("/payments", post(create_payment).get(list_payments))
        .route("/payments/:id", get(get_payment).delete(delete_payment))
        .route("/stock", post(provision_stock))
        .route("/stock/:id/movements", post(adjust_stock).get(stock_movements))
        .route("/stock/:id/audit", get(audit_stock))
        .route("/movements/products/:id", get(product_movements))
        .route("/movements/branches/:id", get(branch_movements))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ServiceResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> ServiceResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ServiceResult<T> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

// =============================================================================
// Health
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let version = env!("CARGO_PKG_VERSION");
    if state.db.health_check().await {
        (StatusCode::OK, Json(HealthResponse { status: "ok", version }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                version,
            }),
        )
    }
}

// =============================================================================
// Sales
// =============================================================================

async fn create_sale(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateSaleRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<SaleView>)> {
    let request = body(payload)?;
    let view = state.sales().create_sale(&request, &caller).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_sales(
    State(state): State<AppState>,
    Caller(caller): Caller,
    filter: Result<Query<SaleListFilter>, QueryRejection>,
) -> ServiceResult<Json<Vec<SaleView>>> {
    let filter = query(filter)?;
    Ok(Json(state.sales().list_sales(&caller, &filter).await?))
}

async fn get_sale(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<SaleView>> {
    let id = path_id(id)?;
    Ok(Json(state.sales().get_sale(id, &caller).await?))
}

async fn update_sale(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateSaleRequest>, JsonRejection>,
) -> ServiceResult<StatusCode> {
    let id = path_id(id)?;
    let request = body(payload)?;
    state.sales().update_sale(id, &request, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_sale(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<StatusCode> {
    let id = path_id(id)?;
    state.sales().delete_sale(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sale_returns(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<Vec<ReturnView>>> {
    let id = path_id(id)?;
    Ok(Json(state.returns().list_returns_for_sale(id, &caller).await?))
}

async fn list_sale_payments(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<Vec<PaymentView>>> {
    let id = path_id(id)?;
    Ok(Json(state.payments().list_payments_for_sale(id, &caller).await?))
}

// =============================================================================
// Returns
// =============================================================================

async fn create_return(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<CreateReturnRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<ReturnView>)> {
    let request = body(payload)?;
    let view = state.returns().create_return(&request, &caller).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_return(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<ReturnView>> {
    let id = path_id(id)?;
    Ok(Json(state.returns().get_return(id, &caller).await?))
}

async fn list_returns(
    State(state): State<AppState>,
    Caller(caller): Caller,
    filter: Result<Query<SaleRefFilter>, QueryRejection>,
) -> ServiceResult<Json<Vec<ReturnView>>> {
    let filter = query(filter)?;
    Ok(Json(state.returns().list_returns(&caller, &filter).await?))
}

async fn delete_return(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<StatusCode> {
    let id = path_id(id)?;
    state.returns().delete_return(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_return(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateReturnRequest>, JsonRejection>,
) -> ServiceResult<Json<ReturnView>> {
    let id = path_id(id)?;
    let request = body(payload)?;
    Ok(Json(state.returns().update_return(id, &request, &caller).await?))
}

// =============================================================================
// Payments
// =============================================================================

async fn create_payment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<PaymentView>)> {
    let request = body(payload)?;
    let view = state.payments().create_payment(&request, &caller).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_payment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<PaymentView>> {
    let id = path_id(id)?;
    Ok(Json(state.payments().get_payment(id, &caller).await?))
}

async fn list_payments(
    State(state): State<AppState>,
    Caller(caller): Caller,
    filter: Result<Query<SaleRefFilter>, QueryRejection>,
) -> ServiceResult<Json<Vec<PaymentView>>> {
    let filter = query(filter)?;
    Ok(Json(state.payments().list_payments(&caller, &filter).await?))
}

async fn delete_payment(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<StatusCode> {
    let id = path_id(id)?;
    state.payments().delete_payment(id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Stock
// =============================================================================

async fn provision_stock(
    State(state): State<AppState>,
    Caller(caller): Caller,
    payload: Result<Json<ProvisionStockRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<StockItem>)> {
    let request = body(payload)?;
    let item = state.stock().provision_stock(&request, &caller).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn adjust_stock(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StockAdjustmentRequest>, JsonRejection>,
) -> ServiceResult<(StatusCode, Json<StockMovement>)> {
    let id = path_id(id)?;
    let request = body(payload)?;
    let movement = state.stock().adjust_stock(id, &request, &caller).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

async fn stock_movements(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<Vec<StockMovement>>> {
    let id = path_id(id)?;
    Ok(Json(state.stock().stock_movements(id, &caller).await?))
}

async fn audit_stock(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<LedgerAudit>> {
    let id = path_id(id)?;
    Ok(Json(state.stock().audit_stock(id, &caller).await?))
}

async fn product_movements(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<Vec<StockMovement>>> {
    let id = path_id(id)?;
    Ok(Json(state.stock().product_movements(id, &caller).await?))
}

async fn branch_movements(
    State(state): State<AppState>,
    Caller(caller): Caller,
    id: Result<Path<i64>, PathRejection>,
) -> ServiceResult<Json<Vec<StockMovement>>> {
    let id = path_id(id)?;
    Ok(Json(state.stock().branch_movements(id, &caller).await?))
}
