//! Service and earning rule handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::{RequestContext, ServiceId};

use crate::dto::services::*;
use crate::{error::ApiError, AppState};

/// Registers a new service
pub async fn register_service(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<RegisterServiceRequest>,
) -> Result<(StatusCode, Json<ServiceResponse>), ApiError> {
    request.validate()?;
    let service = state.engine.register_service(&ctx, request.into()).await?;
    Ok((StatusCode::CREATED, Json(service.into())))
}

/// Gets a service by ID
pub async fn get_service(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<ServiceId>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let service = state.engine.service(&ctx, id).await?;
    Ok(Json(service.into()))
}

/// Creates an earning rule for the service
pub async fn create_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<ServiceId>,
    Json(request): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), ApiError> {
    let rule = state
        .engine
        .create_rule(&ctx, request.into_new_rule(id))
        .await?;
    Ok((StatusCode::CREATED, Json(rule.into())))
}

/// Lists every rule configured for the service
pub async fn list_rules(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<ServiceId>,
) -> Result<Json<Vec<RuleResponse>>, ApiError> {
    let rules = state.engine.rules_for_service(&ctx, id).await?;
    Ok(Json(rules.into_iter().map(Into::into).collect()))
}

/// Resolves the rule in effect on a date (today by default)
pub async fn get_active_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<ServiceId>,
    Query(query): Query<ActiveRuleQuery>,
) -> Result<Json<RuleResponse>, ApiError> {
    let resolution = state.engine.resolve_active_rule(&ctx, id, query.on).await?;
    Ok(Json(resolution.rule.into()))
}

/// Dry-run earn calculation; nothing is persisted
pub async fn preview_earn(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<ServiceId>,
    Query(query): Query<EarnPreviewQuery>,
) -> Result<Json<EarnPreviewResponse>, ApiError> {
    let preview = state
        .engine
        .preview_earn(&ctx, id, query.spend_amount, query.on)
        .await?;
    Ok(Json(preview.into()))
}
