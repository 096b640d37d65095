use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{
    ActivationRequest, AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse,
    PasswordResetConfirmRequest, PasswordResetRequest, PasswordResetValidateRequest,
    RegisterRequest, StatusResponse, UserResponse,
};
use crate::services::accounts;
use crate::services::mailer::Notifier;
use actix_web::{web, HttpResponse};

#[utoipa::path(
    post,
    path = "/account/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, activation code mailed", body = MessageResponse),
        (status = 400, description = "Invalid or duplicate email")
    ),
    tag = "account"
)]
pub async fn register(
    req: web::Json<RegisterRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    notifier: web::Data<dyn Notifier>,
) -> AppResult<HttpResponse> {
    accounts::register(pool.get_ref(), &config, notifier.get_ref(), &req).await?;

    Ok(HttpResponse::Created().json(MessageResponse::new(
        "Registered successfully, check your email for the activation code",
    )))
}

#[utoipa::path(
    post,
    path = "/account/activation/",
    request_body = ActivationRequest,
    responses(
        (status = 200, description = "Account activated", body = MessageResponse),
        (status = 404, description = "Unknown activation code")
    ),
    tag = "account"
)]
pub async fn activate(
    req: web::Json<ActivationRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    accounts::activate(pool.get_ref(), &req.code, req.email.as_deref()).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Account activated")))
}

#[utoipa::path(
    post,
    path = "/account/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "account"
)]
pub async fn login(
    req: web::Json<LoginRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let (token, user) = accounts::login(pool.get_ref(), &config, &req.email, &req.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

#[utoipa::path(
    post,
    path = "/account/logout/",
    responses(
        (status = 200, description = "Session closed", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "account"
)]
pub async fn logout(user: AuthenticatedUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    accounts::logout(pool.get_ref(), &user.session_id).await?;
    log::info!("User {} logged out", user.email);
    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out")))
}

#[utoipa::path(
    post,
    path = "/account/change-password/",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid new password"),
        (status = 401, description = "Unauthorized or wrong old password")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "account"
)]
pub async fn change_password(
    req: web::Json<ChangePasswordRequest>,
    user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    accounts::change_password(pool.get_ref(), &config, user.user_id, &user.session_id, &req)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed")))
}

#[utoipa::path(
    get,
    path = "/account/me/",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "account"
)]
pub async fn me(user: AuthenticatedUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let user = accounts::find_user(pool.get_ref(), user.user_id).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/account/password_reset/",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset token mailed", body = StatusResponse),
        (status = 400, description = "No active user with this email")
    ),
    tag = "account"
)]
pub async fn request_password_reset(
    req: web::Json<PasswordResetRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    notifier: web::Data<dyn Notifier>,
) -> AppResult<HttpResponse> {
    accounts::request_password_reset(pool.get_ref(), &config, notifier.get_ref(), &req.email)
        .await?;
    Ok(HttpResponse::Ok().json(StatusResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/account/password_reset/validate_token/",
    request_body = PasswordResetValidateRequest,
    responses(
        (status = 200, description = "Token is valid", body = StatusResponse),
        (status = 404, description = "Unknown or expired token")
    ),
    tag = "account"
)]
pub async fn validate_reset_token(
    req: web::Json<PasswordResetValidateRequest>,
    pool: web::Data<DbPool>,
) -> AppResult<HttpResponse> {
    accounts::validate_reset_token(pool.get_ref(), &req.token).await?;
    Ok(HttpResponse::Ok().json(StatusResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/account/password_reset/confirm/",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password replaced", body = StatusResponse),
        (status = 400, description = "Invalid password"),
        (status = 404, description = "Unknown or expired token")
    ),
    tag = "account"
)]
pub async fn confirm_password_reset(
    req: web::Json<PasswordResetConfirmRequest>,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    accounts::confirm_password_reset(pool.get_ref(), &config, &req.token, &req.password).await?;
    Ok(HttpResponse::Ok().json(StatusResponse::ok()))
}
