//! File export endpoint

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::header,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    services::export::{DateRange, ExportFormat, ExportKind},
};

use super::AdminUser;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportForm {
    /// "csv" (default) or "json"
    pub format: Option<String>,
    /// First day, YYYY-MM-DD (borrows-range only)
    pub date_from: Option<String>,
    /// Last day inclusive, YYYY-MM-DD (borrows-range only)
    pub date_to: Option<String>,
}

/// Export options posted either url-encoded or as multipart form data
pub struct ExportOptions(pub ExportForm);

#[async_trait]
impl<S> FromRequest<S> for ExportOptions
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(form) = Form::<ExportForm>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(ExportOptions(form));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut form = ExportForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            match name.as_str() {
                "format" => form.format = Some(value),
                "dateFrom" => form.date_from = Some(value),
                "dateTo" => form.date_to = Some(value),
                _ => {}
            }
        }
        Ok(ExportOptions(form))
    }
}

/// Download books, users, borrows, analytics or a dated borrows range
#[utoipa::path(
    post,
    path = "/admin/export/{type}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(
        ("type" = String, Path, description = "books, users, borrows, analytics or borrows-range")
    ),
    request_body(content = ExportForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Export file attachment"),
        (status = 400, description = "Unsupported type, unreadable form or invalid date range")
    )
)]
pub async fn export_data(
    State(state): State<crate::AppState>,
    AdminUser(admin): AdminUser,
    Path(kind): Path<String>,
    ExportOptions(form): ExportOptions,
) -> AppResult<Response> {
    let kind: ExportKind = kind.parse()?;
    let format = ExportFormat::parse(form.format.as_deref());
    let range = match kind {
        ExportKind::BorrowsRange => Some(DateRange::from_form(
            form.date_from.as_deref(),
            form.date_to.as_deref(),
        )?),
        _ => None,
    };

    let file = state.services.export.export(kind, format, range).await?;
    tracing::info!(kind = kind.as_str(), requested_by = %admin.email, "Export downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        file.body,
    )
        .into_response())
}
