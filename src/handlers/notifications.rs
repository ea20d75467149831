use actix_web::{HttpResponse, get, post};
use actix_web::web::{Data, Path};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::common::ApiResponse;
use crate::state::AppState;

#[get("/user/{user_id}")]
pub async fn get_notifications(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notifications = state.store.get_notifications_by_user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(notifications)))
}

#[post("/{notification_id}/read")]
pub async fn mark_notification_read(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notification = state.store
        .mark_notification_read(&path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Notification"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        notification,
        "Notification marked as read".to_string(),
    )))
}
