use actix_web::{HttpResponse, get};
use actix_web::web::{Data, Path};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::common::ApiResponse;
use crate::state::AppState;

#[get("/user/{user_id}")]
pub async fn list_user_orders(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let orders = state.store.get_orders_by_user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

#[get("/{order_id}")]
pub async fn get_order(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order = state.store
        .get_order(&path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Order"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(order)))
}
