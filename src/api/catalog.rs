use crate::auth::{AuthenticatedUser, Policy};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{CategoryResponse, CreateCategoryRequest, CreateTagRequest, TagResponse};
use crate::services::catalog;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Links to the top-level collections")
    ),
    tag = "catalog"
)]
pub async fn api_root(req: HttpRequest) -> AppResult<HttpResponse> {
    let link = |name: &str| {
        req.url_for_static(name)
            .map(|url| url.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("url for {}: {:?}", name, e)))
    };

    Ok(HttpResponse::Ok().json(json!({
        "products": link("product_list")?,
        "categories": link("category_list")?,
        "tags": link("tag_list")?,
    })))
}

#[utoipa::path(
    get,
    path = "/categories/",
    responses(
        (status = 200, description = "All categories", body = Vec<CategoryResponse>)
    ),
    tag = "catalog"
)]
pub async fn list_categories(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let categories = catalog::list_categories(pool.get_ref()).await?;
    let body: Vec<CategoryResponse> = categories.into_iter().map(CategoryResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    post,
    path = "/categories/",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Duplicate title or slug"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "catalog"
)]
pub async fn create_category(
    req: web::Json<CreateCategoryRequest>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    Policy::AdminOnly.check(user.as_ref(), None)?;
    let category = catalog::create_category(pool.get_ref(), &req).await?;
    Ok(HttpResponse::Created().json(CategoryResponse::from(category)))
}

#[utoipa::path(
    get,
    path = "/categories/{slug}/",
    params(
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Not found")
    ),
    tag = "catalog"
)]
pub async fn get_category(
    path: web::Path<String>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let category = catalog::get_category(pool.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(CategoryResponse::from(category)))
}

#[utoipa::path(
    get,
    path = "/tags/",
    responses(
        (status = 200, description = "All tags", body = Vec<TagResponse>)
    ),
    tag = "catalog"
)]
pub async fn list_tags(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let tags = catalog::list_tags(pool.get_ref()).await?;
    let body: Vec<TagResponse> = tags.into_iter().map(TagResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[utoipa::path(
    post,
    path = "/tags/",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Duplicate title or slug"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "catalog"
)]
pub async fn create_tag(
    req: web::Json<CreateTagRequest>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    Policy::AdminOnly.check(user.as_ref(), None)?;
    let tag = catalog::create_tag(pool.get_ref(), &req).await?;
    Ok(HttpResponse::Created().json(TagResponse::from(tag)))
}

#[utoipa::path(
    get,
    path = "/tags/{slug}/",
    params(
        ("slug" = String, Path, description = "Tag slug")
    ),
    responses(
        (status = 200, description = "Tag", body = TagResponse),
        (status = 404, description = "Not found")
    ),
    tag = "catalog"
)]
pub async fn get_tag(path: web::Path<String>, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let tag = catalog::get_tag(pool.get_ref(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TagResponse::from(tag)))
}
