use actix_web::{HttpResponse, get, post};
use actix_web::web::{Data, Json, Path};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::common::ApiResponse;
use crate::models::product::{CreateProductRequest, Product};
use crate::state::AppState;

#[post("")]
pub async fn create_product(
    state: Data<AppState>,
    payload: Json<CreateProductRequest>,
) -> Result<HttpResponse, AppError> {
    let request = payload.into_inner();
    request.validate()?;

    let product = Product::new(request, state.clock.now());
    let created = state.store.create_product(&product).await?;
    log::info!("Created product {} for business {}", created.id, created.business_id);

    Ok(HttpResponse::Created().json(ApiResponse::success(created)))
}

#[get("/business/{business_id}")]
pub async fn list_business_products(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let products = state.store.get_products_by_business(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(products)))
}

#[get("/{product_id}")]
pub async fn get_product(
    state: Data<AppState>,
    path: Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product = state.store
        .get_product(&path.into_inner())
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(product)))
}
