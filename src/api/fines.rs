//! Fine configuration and overdue fine endpoints

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{error::AppResult, models::fine::FineUpdate};

use super::{AdminUser, OptionalJson, ValidatedJson};

fn non_negative_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate < Decimal::ZERO {
        let mut error = ValidationError::new("range");
        error.message = Some("fineAmount must be a number greater than or equal to 0".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FineConfigRequest {
    /// Daily fine, must be zero or more
    #[validate(custom(function = "non_negative_rate"))]
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    /// Defaults to the admin's email
    pub updated_by: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FineConfigResponse {
    pub success: bool,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFinesRequest {
    /// Overrides the configured daily rate for this run
    #[schema(value_type = Option<f64>)]
    pub fine_amount: Option<Decimal>,
}

#[derive(Serialize, ToSchema)]
pub struct UpdateFinesResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<FineUpdate>,
}

/// Current daily fine rate
#[utoipa::path(
    get,
    path = "/admin/fine-config",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Daily fine rate", body = FineConfigResponse),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn get_fine_config(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<FineConfigResponse>> {
    let fine_amount = state.services.fines.current_rate().await?;
    Ok(Json(FineConfigResponse {
        success: true,
        fine_amount,
        message: "Fine configuration loaded.".to_string(),
    }))
}

/// Set the daily fine rate
#[utoipa::path(
    post,
    path = "/admin/fine-config",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = FineConfigRequest,
    responses(
        (status = 200, description = "Rate updated", body = FineConfigResponse),
        (status = 400, description = "Missing, malformed or negative rate")
    )
)]
pub async fn update_fine_config(
    State(state): State<crate::AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(request): ValidatedJson<FineConfigRequest>,
) -> AppResult<Json<FineConfigResponse>> {
    let updated_by = request
        .updated_by
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(admin.email);
    let config = state.services.fines.set_rate(request.fine_amount, &updated_by).await?;

    Ok(Json(FineConfigResponse {
        success: true,
        fine_amount: config.daily_rate,
        message: "Fine configuration updated successfully.".to_string(),
    }))
}

/// Recompute fines of all overdue loans
#[utoipa::path(
    post,
    path = "/admin/update-overdue-fines",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body(content = UpdateFinesRequest, description = "Optional rate override"),
    responses(
        (status = 200, description = "Fines updated", body = UpdateFinesResponse),
        (status = 400, description = "Malformed body or negative rate")
    )
)]
pub async fn update_overdue_fines(
    State(state): State<crate::AppState>,
    AdminUser(_admin): AdminUser,
    OptionalJson(body): OptionalJson<UpdateFinesRequest>,
) -> AppResult<Json<UpdateFinesResponse>> {
    let custom_rate = body.and_then(|request| request.fine_amount);
    let results = state.services.fines.update_overdue_fines(custom_rate).await?;

    Ok(Json(UpdateFinesResponse {
        success: true,
        message: format!("Updated fines for {} overdue record(s).", results.len()),
        results,
    }))
}
