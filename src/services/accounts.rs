use crate::auth::{create_token, hash_password, verify_password, Claims};
use crate::config::Config;
use crate::db::DbPool;
use crate::entities::{password_reset_token, session, user};
use crate::error::{constraint_violation, AppError, AppResult, Violation};
use crate::models::{ChangePasswordRequest, RegisterRequest};
use crate::services::mailer::{dispatch, Notification, Notifier};
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use uuid::Uuid;
use validator::validate_email;

pub const ACTIVATION_CODE_LENGTH: usize = 8;
pub const RESET_TOKEN_LENGTH: usize = 32;

fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Lower-case the domain part and trim surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn check_new_password(password: &str, confirm: Option<&str>) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err(AppError::validation("Passwords do not match"));
        }
    }
    Ok(())
}

async fn find_by_email(db: &DbPool, email: &str) -> AppResult<Option<user::Model>> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await?)
}

pub async fn find_user(db: &DbPool, user_id: i32) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Pick an activation code no other account currently holds.
///
/// Collisions are retried up to `attempts` times before giving up.
pub async fn generate_activation_code(db: &DbPool, attempts: u32) -> AppResult<String> {
    for _ in 0..attempts.max(1) {
        let code = random_string(ACTIVATION_CODE_LENGTH);
        let taken = user::Entity::find()
            .filter(user::Column::ActivationCode.eq(code.as_str()))
            .one(db)
            .await?
            .is_some();
        if !taken {
            return Ok(code);
        }
        log::warn!("Activation code collision, regenerating");
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not generate a unique activation code after {} attempts",
        attempts
    )))
}

/// Create an inactive account and mail its activation code.
pub async fn register(
    db: &DbPool,
    config: &Config,
    notifier: &dyn Notifier,
    req: &RegisterRequest,
) -> AppResult<user::Model> {
    let email = normalize_email(&req.email);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    if !validate_email(&email) {
        return Err(AppError::validation("Enter a valid email address"));
    }
    check_new_password(&req.password, req.password_confirm.as_deref())?;

    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::validation("User with this email already exists"));
    }

    let password_hash = hash_password(&req.password, config.accounts.bcrypt_cost)?;
    let code = generate_activation_code(db, config.accounts.activation_code_attempts).await?;
    let now = Utc::now();

    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        is_active: Set(false),
        name: Set(req.name.clone().unwrap_or_default()),
        last_name: Set(req.last_name.clone().unwrap_or_default()),
        is_staff: Set(false),
        is_superuser: Set(false),
        activation_code: Set(code.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user = match new_user.insert(db).await {
        Ok(user) => user,
        Err(e) if constraint_violation(&e) == Some(Violation::Unique) => {
            return Err(AppError::validation("User with this email already exists"))
        }
        Err(e) => return Err(e.into()),
    };
    log::info!("Registered user {} (id={})", user.email, user.id);

    dispatch(
        notifier,
        Notification::ActivationRequested {
            email: user.email.clone(),
            code,
        },
    )
    .await;

    Ok(user)
}

/// Exchange an activation code for an active account. The code is cleared.
pub async fn activate(db: &DbPool, code: &str, email: Option<&str>) -> AppResult<user::Model> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::not_found("Activation code not found"));
    }

    let mut condition = Condition::all().add(user::Column::ActivationCode.eq(code));
    if let Some(email) = email {
        condition = condition.add(user::Column::Email.eq(normalize_email(email)));
    }

    let user = user::Entity::find()
        .filter(condition)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Activation code not found"))?;

    let mut active = user.into_active_model();
    active.is_active = Set(true);
    active.activation_code = Set(String::new());
    active.updated_at = Set(Utc::now());
    let user = active.update(db).await?;

    log::info!("Activated user {}", user.email);
    Ok(user)
}

/// Verify credentials and open a session; returns the bearer token.
pub async fn login(
    db: &DbPool,
    config: &Config,
    email: &str,
    password: &str,
) -> AppResult<(String, user::Model)> {
    let user = find_by_email(db, email)
        .await?
        .ok_or_else(|| AppError::authentication("Invalid credentials"))?;

    if !verify_password(password, &user.password_hash) {
        return Err(AppError::authentication("Invalid credentials"));
    }
    if !user.is_active {
        return Err(AppError::authentication("Account is not activated"));
    }

    let session_id = Uuid::new_v4().to_string();
    session::ActiveModel {
        id: Set(session_id.clone()),
        user_id: Set(user.id),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    let claims = Claims::new(
        user.id,
        user.email.clone(),
        session_id,
        config.jwt.expiration_hours,
    );
    let token = create_token(&claims, &config.jwt.secret)?;

    log::info!("User {} logged in", user.email);
    Ok((token, user))
}

/// Close the session; the token stops authenticating immediately.
pub async fn logout(db: &DbPool, session_id: &str) -> AppResult<()> {
    session::Entity::delete_by_id(session_id.to_string())
        .exec(db)
        .await?;
    Ok(())
}

/// Replace the password of the caller. Other sessions of the caller are closed.
pub async fn change_password(
    db: &DbPool,
    config: &Config,
    user_id: i32,
    current_session: &str,
    req: &ChangePasswordRequest,
) -> AppResult<()> {
    let user = find_user(db, user_id).await?;
    if !verify_password(&req.old_password, &user.password_hash) {
        return Err(AppError::authentication("Old password is incorrect"));
    }
    check_new_password(&req.new_password, req.new_password_confirm.as_deref())?;

    let password_hash = hash_password(&req.new_password, config.accounts.bcrypt_cost)?;
    let mut active = user.into_active_model();
    active.password_hash = Set(password_hash);
    active.updated_at = Set(Utc::now());
    let user = active.update(db).await?;

    session::Entity::delete_many()
        .filter(
            Condition::all()
                .add(session::Column::UserId.eq(user.id))
                .add(session::Column::Id.ne(current_session)),
        )
        .exec(db)
        .await?;

    log::info!("Password changed for {}", user.email);
    Ok(())
}

/// Issue (or reuse) a reset token for `email` and mail it.
///
/// Unknown or inactive addresses fail with a validation error unless
/// `password_reset_hide_unknown_email` is set, in which case they succeed silently.
pub async fn request_password_reset(
    db: &DbPool,
    config: &Config,
    notifier: &dyn Notifier,
    email: &str,
) -> AppResult<()> {
    let now = Utc::now();
    password_reset_token::Entity::delete_many()
        .filter(password_reset_token::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;

    let user = match find_by_email(db, email).await? {
        Some(user) if user.is_active => user,
        _ => {
            if config.accounts.password_reset_hide_unknown_email {
                log::info!("Password reset requested for unknown address");
                return Ok(());
            }
            return Err(AppError::validation(
                "There is no active user associated with this e-mail address",
            ));
        }
    };

    let existing = password_reset_token::Entity::find()
        .filter(password_reset_token::Column::UserId.eq(user.id))
        .one(db)
        .await?;

    let token = match existing {
        Some(token) => token.key,
        None => {
            let token = password_reset_token::ActiveModel {
                key: Set(random_string(RESET_TOKEN_LENGTH)),
                user_id: Set(user.id),
                created_at: Set(now),
                expires_at: Set(now + Duration::hours(config.accounts.password_reset_expiry_hours)),
            }
            .insert(db)
            .await?;
            token.key
        }
    };

    log::info!("Password reset token issued for {}", user.email);
    dispatch(
        notifier,
        Notification::PasswordResetRequested {
            email: user.email,
            token,
        },
    )
    .await;

    Ok(())
}

/// Look up a reset token that has not expired.
pub async fn validate_reset_token(
    db: &DbPool,
    token: &str,
) -> AppResult<password_reset_token::Model> {
    let found = password_reset_token::Entity::find_by_id(token.to_string())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("Reset token not found"))?;

    if found.expires_at <= Utc::now() {
        password_reset_token::Entity::delete_by_id(found.key)
            .exec(db)
            .await?;
        return Err(AppError::not_found("Reset token has expired"));
    }

    Ok(found)
}

/// Set a new password with a reset token. The token and every open session
/// of the user are discarded.
pub async fn confirm_password_reset(
    db: &DbPool,
    config: &Config,
    token: &str,
    password: &str,
) -> AppResult<()> {
    let reset = validate_reset_token(db, token).await?;
    check_new_password(password, None)?;

    let user = find_user(db, reset.user_id).await?;
    let mut active = user.into_active_model();
    active.password_hash = Set(hash_password(password, config.accounts.bcrypt_cost)?);
    active.updated_at = Set(Utc::now());
    let user = active.update(db).await?;

    password_reset_token::Entity::delete_many()
        .filter(password_reset_token::Column::UserId.eq(user.id))
        .exec(db)
        .await?;
    session::Entity::delete_many()
        .filter(session::Column::UserId.eq(user.id))
        .exec(db)
        .await?;

    log::info!("Password reset completed for {}", user.email);
    Ok(())
}

/// Create an active staff superuser, or promote the existing account.
pub async fn ensure_superuser(
    db: &DbPool,
    config: &Config,
    email: &str,
    password: &str,
) -> AppResult<user::Model> {
    let email = normalize_email(email);
    if !validate_email(&email) {
        return Err(AppError::validation("Enter a valid email address"));
    }
    let password_hash = hash_password(password, config.accounts.bcrypt_cost)?;
    let now = Utc::now();

    let user = match find_by_email(db, &email).await? {
        Some(existing) => {
            let mut active = existing.into_active_model();
            active.password_hash = Set(password_hash);
            active.is_active = Set(true);
            active.is_staff = Set(true);
            active.is_superuser = Set(true);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            user::ActiveModel {
                email: Set(email),
                password_hash: Set(password_hash),
                is_active: Set(true),
                name: Set(String::new()),
                last_name: Set(String::new()),
                is_staff: Set(true),
                is_superuser: Set(true),
                activation_code: Set(String::new()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };

    log::info!("Superuser {} ready", user.email);
    Ok(user)
}
