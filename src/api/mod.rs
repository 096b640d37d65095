pub mod account;
pub mod catalog;
pub mod comments;
pub mod products;

use crate::error::AppError;
use crate::models::{
    ActivationRequest, AuthResponse, CategoryResponse, ChangePasswordRequest, CommentResponse,
    CreateCategoryRequest, CreateCommentRequest, CreateProductRequest, CreateTagRequest,
    LoginRequest, MessageResponse, PasswordResetConfirmRequest, PasswordResetRequest,
    PasswordResetValidateRequest, PatchProductRequest, ProductDetailResponse, ProductListItem,
    RegisterRequest, StatusResponse, TagResponse, UpdateProductRequest, UserResponse,
};
use actix_web::web;
use utoipa::OpenApi;

/// Register every route of the service. Shared by the server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Extractor failures get the same JSON error body as handler errors
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid request body: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid query string: {}", err)).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid path: {}", err)).into()
    }));

    cfg.route("/", web::get().to(catalog::api_root))
        .service(
            web::scope("/account")
                .route("/register/", web::post().to(account::register))
                .route("/activation/", web::post().to(account::activate))
                .route("/login/", web::post().to(account::login))
                .route("/logout/", web::post().to(account::logout))
                .route("/change-password/", web::post().to(account::change_password))
                .route("/me/", web::get().to(account::me))
                .route(
                    "/password_reset/",
                    web::post().to(account::request_password_reset),
                )
                .route(
                    "/password_reset/validate_token/",
                    web::post().to(account::validate_reset_token),
                )
                .route(
                    "/password_reset/confirm/",
                    web::post().to(account::confirm_password_reset),
                ),
        )
        .service(
            web::resource("/categories/")
                .name("category_list")
                .route(web::get().to(catalog::list_categories))
                .route(web::post().to(catalog::create_category)),
        )
        .route("/categories/{slug}/", web::get().to(catalog::get_category))
        .service(
            web::resource("/tags/")
                .name("tag_list")
                .route(web::get().to(catalog::list_tags))
                .route(web::post().to(catalog::create_tag)),
        )
        .route("/tags/{slug}/", web::get().to(catalog::get_tag))
        .service(
            web::resource("/products/")
                .name("product_list")
                .route(web::get().to(products::list_products))
                .route(web::post().to(products::create_product)),
        )
        .service(
            web::resource("/products/{slug}/")
                .name("product_detail")
                .route(web::get().to(products::get_product))
                .route(web::put().to(products::update_product))
                .route(web::patch().to(products::patch_product))
                .route(web::delete().to(products::delete_product)),
        )
        .route(
            "/products/{slug}/comments/",
            web::get().to(products::product_comments),
        )
        .route("/products/{slug}/like/", web::post().to(products::like_product))
        .route("/comments/", web::post().to(comments::create_comment));
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Account endpoints
        account::register,
        account::activate,
        account::login,
        account::logout,
        account::change_password,
        account::me,
        account::request_password_reset,
        account::validate_reset_token,
        account::confirm_password_reset,
        // Catalog endpoints
        catalog::api_root,
        catalog::list_categories,
        catalog::create_category,
        catalog::get_category,
        catalog::list_tags,
        catalog::create_tag,
        catalog::get_tag,
        // Product endpoints
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::patch_product,
        products::delete_product,
        products::product_comments,
        products::like_product,
        // Comment endpoints
        comments::create_comment,
    ),
    components(schemas(
        // Account schemas
        RegisterRequest,
        ActivationRequest,
        LoginRequest,
        ChangePasswordRequest,
        PasswordResetRequest,
        PasswordResetValidateRequest,
        PasswordResetConfirmRequest,
        AuthResponse,
        UserResponse,
        MessageResponse,
        StatusResponse,
        // Catalog schemas
        CreateCategoryRequest,
        CategoryResponse,
        CreateTagRequest,
        TagResponse,
        CreateProductRequest,
        UpdateProductRequest,
        PatchProductRequest,
        ProductDetailResponse,
        ProductListItem,
        CreateCommentRequest,
        CommentResponse,
        // Query schemas
        products::ProductQuery,
    )),
    tags(
        (name = "account", description = "Registration, activation, sessions and password reset"),
        (name = "catalog", description = "Categories and tags"),
        (name = "products", description = "Products, their comments and likes"),
        (name = "comments", description = "Comment creation"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

use utoipa::Modify;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
