//! Ledger command handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{EarnTransactionId, RequestContext};

use crate::auth::{has_role, roles, Claims};
use crate::dto::ledger::*;
use crate::{error::ApiError, AppState};

/// Converts a spend into points and appends the earn to the ledger
pub async fn record_earn(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<RecordEarnRequest>,
) -> Result<(StatusCode, Json<EarnReceiptResponse>), ApiError> {
    let receipt = state.engine.earn(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Spends points against the customer's live lots
pub async fn record_redemption(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<RecordRedemptionRequest>,
) -> Result<(StatusCode, Json<RedemptionReceiptResponse>), ApiError> {
    let receipt = state.engine.redeem(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Appends a manual correction to the ledger
pub async fn record_adjustment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<RecordAdjustmentRequest>,
) -> Result<(StatusCode, Json<AdjustmentReceiptResponse>), ApiError> {
    if !has_role(&claims, roles::LEDGER_ADJUST) {
        return Err(ApiError::Forbidden(
            "Manual adjustments require the ledger:adjust role".to_string(),
        ));
    }
    let receipt = state.engine.adjust(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Claws back whatever remains of an earn transaction
pub async fn reverse_earn(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(transaction_id): Path<EarnTransactionId>,
    Json(request): Json<ReverseEarnRequest>,
) -> Result<(StatusCode, Json<ReversalReceiptResponse>), ApiError> {
    let receipt = state
        .engine
        .reverse_earn(&ctx, transaction_id, request.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// Writes off every expired lot with points remaining
pub async fn sweep_expired(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<SweepRequest>,
) -> Result<Json<SweepResponse>, ApiError> {
    if !has_role(&claims, roles::LEDGER_SWEEP) {
        return Err(ApiError::Forbidden(
            "Expiration sweeps require the ledger:sweep role".to_string(),
        ));
    }
    let outcome = state.engine.sweep_expired(&ctx, request.as_of).await?;
    Ok(Json(outcome.into()))
}
