//! Customer handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::{CustomerId, RequestContext};
use domain_ledger::HistoryQuery;

use crate::dto::customers::*;
use crate::{error::ApiError, AppState};

/// Registers a new loyalty member
pub async fn register_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<RegisterCustomerRequest>,
) -> Result<(StatusCode, Json<CustomerResponse>), ApiError> {
    request.validate()?;
    let customer = state.engine.register_customer(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(customer.into())))
}

/// Gets a customer by ID
pub async fn get_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<CustomerId>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state.engine.customer(&ctx, id).await?;
    Ok(Json(customer.into()))
}

/// Available balance plus how much of it expires soon
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<CustomerId>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let summary = state.engine.balance_summary(&ctx, id, query.as_of).await?;
    Ok(Json(summary.into()))
}

/// Live lots expiring within the horizon, soonest first
pub async fn list_expiring_lots(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<CustomerId>,
    Query(query): Query<ExpiringLotsQuery>,
) -> Result<Json<Vec<ExpiringLotResponse>>, ApiError> {
    let lots = state
        .engine
        .expiring_lots(&ctx, id, query.as_of, query.horizon_days)
        .await?;
    Ok(Json(lots.into_iter().map(Into::into).collect()))
}

/// One page of the customer's ledger, newest first
pub async fn list_ledger(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<CustomerId>,
    Query(params): Query<LedgerHistoryParams>,
) -> Result<Json<LedgerPageResponse>, ApiError> {
    let query = HistoryQuery {
        service_id: params.service_id,
        date_from: params.date_from,
        date_to: params.date_to,
        page: params.page,
        page_size: params.page_size,
    };
    let page = state.engine.ledger_history(&ctx, id, query).await?;
    Ok(Json(page.into()))
}

/// Checks the customer's ledger against the accounting invariants
pub async fn check_consistency(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<CustomerId>,
) -> Result<Json<ConsistencyResponse>, ApiError> {
    let report = state.engine.verify_consistency(&ctx, id).await?;
    Ok(Json(ConsistencyResponse {
        customer_id: id,
        clean: report.is_clean(),
        violations: report.violations,
    }))
}
