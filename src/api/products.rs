use crate::auth::{AuthenticatedUser, Policy};
use crate::db::DbPool;
use crate::entities::product;
use crate::error::{AppError, AppResult};
use crate::models::{
    format_price, CreateProductRequest, PatchProductRequest, ProductDetailResponse,
    ProductListItem, UpdateProductRequest,
};
use crate::services::comments;
use crate::services::products::{self, ProductFilter, ProductOrdering};
use crate::services::likes;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ProductQuery {
    /// Only products carrying this tag slug.
    #[serde(rename = "tags__slug")]
    pub tag: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Author email.
    pub author: Option<String>,
    #[schema(example = "9.99")]
    pub price: Option<String>,
    /// Matched against title, text and tag titles.
    pub search: Option<String>,
    /// `created_at`, `title` or `price`; prefix with `-` for descending.
    #[schema(example = "-created_at")]
    pub ordering: Option<String>,
    #[schema(example = 1)]
    pub page: Option<u64>,
    #[schema(example = 20)]
    pub limit: Option<u64>,
}

impl TryFrom<ProductQuery> for ProductFilter {
    type Error = AppError;

    fn try_from(query: ProductQuery) -> Result<Self, Self::Error> {
        let price = match query.price.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(price) => Some(products::parse_price(price)?),
            None => None,
        };
        let ordering = match query.ordering.as_deref().filter(|o| !o.trim().is_empty()) {
            Some(ordering) => ordering.parse::<ProductOrdering>()?,
            None => ProductOrdering::default(),
        };

        Ok(ProductFilter {
            tag: query.tag,
            category: query.category,
            author: query.author,
            price,
            search: query.search,
            ordering,
            page: query.page,
            limit: query.limit,
        })
    }
}

fn list_item(req: &HttpRequest, product: product::Model) -> AppResult<ProductListItem> {
    let details = req
        .url_for("product_detail", [product.slug.as_str()])
        .map_err(|e| AppError::Internal(anyhow::anyhow!("url for product detail: {:?}", e)))?;

    Ok(ProductListItem {
        price: format_price(&product.price),
        details: details.to_string(),
        title: product.title,
        slug: product.slug,
        image: product.image,
        created_at: product.created_at,
    })
}

#[utoipa::path(
    get,
    path = "/products/",
    params(
        ("tags__slug" = Option<String>, Query, description = "Filter by tag slug"),
        ("category" = Option<String>, Query, description = "Filter by category slug"),
        ("author" = Option<String>, Query, description = "Filter by author email"),
        ("price" = Option<String>, Query, description = "Filter by exact price"),
        ("search" = Option<String>, Query, description = "Search title, text and tag titles"),
        ("ordering" = Option<String>, Query, description = "created_at, title or price, '-' for descending"),
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: all)")
    ),
    responses(
        (status = 200, description = "List of products", body = Vec<ProductListItem>),
        (status = 400, description = "Invalid filter or ordering")
    ),
    tag = "products"
)]
pub async fn list_products(
    req: HttpRequest,
    query: web::Query<ProductQuery>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let filter = ProductFilter::try_from(query.into_inner())?;
    let found = products::list_products(pool.get_ref(), &filter).await?;

    let items = found
        .into_iter()
        .map(|product| list_item(&req, product))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(HttpResponse::Ok().json(items))
}

#[utoipa::path(
    post,
    path = "/products/",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductDetailResponse),
        (status = 400, description = "Invalid input or unknown category/tag"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "products"
)]
pub async fn create_product(
    req: web::Json<CreateProductRequest>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let caller = Policy::AdminOnly
        .check(user.as_ref(), None)?
        .ok_or_else(|| AppError::authentication("Authentication credentials were not provided"))?;

    let product = products::create_product(pool.get_ref(), caller.user_id, &req).await?;
    let detail = products::describe(pool.get_ref(), product).await?;
    Ok(HttpResponse::Created().json(detail))
}

#[utoipa::path(
    get,
    path = "/products/{slug}/",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "Product detail", body = ProductDetailResponse),
        (status = 404, description = "Not found")
    ),
    tag = "products"
)]
pub async fn get_product(
    path: web::Path<String>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let product = products::get_product(pool.get_ref(), &path.into_inner()).await?;
    let detail = products::describe(pool.get_ref(), product).await?;
    Ok(HttpResponse::Ok().json(detail))
}

async fn apply_update(
    slug: String,
    changes: PatchProductRequest,
    user: Option<AuthenticatedUser>,
    pool: &DbPool,
) -> AppResult<ProductDetailResponse> {
    let product = products::get_product(pool, &slug).await?;
    Policy::AuthorOnly.check(user.as_ref(), Some(product.author_id))?;

    let product = products::update_product(pool, product, &changes).await?;
    products::describe(pool, product).await
}

#[utoipa::path(
    put,
    path = "/products/{slug}/",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product replaced", body = ProductDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the author may update"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "products"
)]
pub async fn update_product(
    path: web::Path<String>,
    req: web::Json<UpdateProductRequest>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let changes = PatchProductRequest::from(req.into_inner());
    let detail = apply_update(path.into_inner(), changes, user, pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    patch,
    path = "/products/{slug}/",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    request_body = PatchProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the author may update"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "products"
)]
pub async fn patch_product(
    path: web::Path<String>,
    req: web::Json<PatchProductRequest>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let detail = apply_update(path.into_inner(), req.into_inner(), user, pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    delete,
    path = "/products/{slug}/",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the author may delete"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "products"
)]
pub async fn delete_product(
    path: web::Path<String>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let product = products::get_product(pool.get_ref(), &path.into_inner()).await?;
    Policy::AuthorOnly.check(user.as_ref(), Some(product.author_id))?;

    products::delete_product(pool.get_ref(), product).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/products/{slug}/comments/",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "Comments, newest first", body = Vec<CommentResponse>),
        (status = 404, description = "Not found")
    ),
    tag = "products"
)]
pub async fn product_comments(
    path: web::Path<String>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let product = products::get_product(pool.get_ref(), &path.into_inner()).await?;
    let comments = comments::list_for_product(pool.get_ref(), &product.slug).await?;
    Ok(HttpResponse::Ok().json(comments))
}

#[utoipa::path(
    post,
    path = "/products/{slug}/like/",
    params(
        ("slug" = String, Path, description = "Product slug")
    ),
    responses(
        (status = 200, description = "\"liked\" or \"disliked\"", body = String),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "products"
)]
pub async fn like_product(
    path: web::Path<String>,
    user: Option<AuthenticatedUser>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    let caller = Policy::Authenticated
        .check(user.as_ref(), None)?
        .ok_or_else(|| AppError::authentication("Authentication credentials were not provided"))?;
    let product = products::get_product(pool.get_ref(), &path.into_inner()).await?;

    let state = likes::toggle_like(pool.get_ref(), &product.slug, caller.user_id).await?;
    Ok(HttpResponse::Ok().json(state.as_str()))
}
