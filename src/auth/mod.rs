//! Accounts, password hashing and cookie sessions.

pub mod mailer;
pub mod middleware;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
};
use tracing::{debug, info};

pub use middleware::CurrentUser;

use crate::{
    clock::now_sec,
    config::AdminSeed,
    entities::{
        session,
        user::{self, Role},
    },
    error::{AppError, AppResult},
};

pub const SESSION_COOKIE: &str = "token";
pub const MIN_PASSWORD_LEN: usize = 6;

const VERIFICATION_TTL_SECS: i64 = 24 * 3600;
const RESET_TTL_SECS: i64 = 3600;

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| anyhow::anyhow!("salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("hash: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Six digits, as typed into the verification form.
pub fn verification_code() -> String {
    rand::rng().random_range(100_000..1_000_000).to_string()
}

pub fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        },
        None => false,
    }
}

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Creates an unverified `User` account and returns it with its verification code.
pub async fn register<C: ConnectionTrait>(db: &C, signup: Signup) -> AppResult<(user::Model, String)> {
    let email = normalize_email(&signup.email);
    let name = signup.name.trim().to_string();
    if email.is_empty() || name.is_empty() || signup.password.is_empty() {
        return Err(AppError::validation("All fields are required"));
    }
    if !looks_like_email(&email) {
        return Err(AppError::validation("Invalid email address"));
    }
    check_password(&signup.password)?;

    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::conflict("User already exists"));
    }

    let code = verification_code();
    let now = now_sec();
    let user = user::ActiveModel {
        email: Set(email),
        name: Set(name),
        password_hash: Set(hash_password(&signup.password)?),
        role: Set(Role::User),
        is_verified: Set(false),
        verification_code: Set(Some(code.clone())),
        verification_expires_at: Set(Some(now + VERIFICATION_TTL_SECS)),
        reset_token: Set(None),
        reset_expires_at: Set(None),
        last_login: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = user.id, "user registered");
    Ok((user, code))
}

pub async fn authenticate<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
) -> AppResult<user::Model> {
    let invalid = || AppError::validation("Invalid credentials");

    let user = find_by_email(db, &normalize_email(email)).await?.ok_or_else(invalid)?;
    if !verify_password(&user.password_hash, password) {
        debug!(user_id = user.id, "password mismatch");
        return Err(invalid());
    }

    let mut active = user.into_active_model();
    active.last_login = Set(Some(now_sec()));
    Ok(active.update(db).await?)
}

pub async fn verify_email<C: ConnectionTrait>(db: &C, code: &str) -> AppResult<user::Model> {
    let code = code.trim();
    let user = if code.is_empty() {
        None
    } else {
        user::Entity::find()
            .filter(user::Column::VerificationCode.eq(code))
            .filter(user::Column::VerificationExpiresAt.gt(now_sec()))
            .one(db)
            .await?
    };
    let user = user.ok_or_else(|| AppError::validation("Invalid or expired verification code"))?;

    let mut active = user.into_active_model();
    active.is_verified = Set(true);
    active.verification_code = Set(None);
    active.verification_expires_at = Set(None);
    let user = active.update(db).await?;

    info!(user_id = user.id, "email verified");
    Ok(user)
}

/// Stores a fresh reset token for the account and returns it.
pub async fn start_password_reset<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> AppResult<(user::Model, String)> {
    let user = find_by_email(db, &normalize_email(email))
        .await?
        .ok_or_else(|| AppError::validation("User not found"))?;

    let token = random_token();
    let mut active = user.into_active_model();
    active.reset_token = Set(Some(token.clone()));
    active.reset_expires_at = Set(Some(now_sec() + RESET_TTL_SECS));
    Ok((active.update(db).await?, token))
}

/// Replaces the password and signs the account out everywhere.
pub async fn reset_password<C: ConnectionTrait>(
    db: &C,
    token: &str,
    password: &str,
) -> AppResult<user::Model> {
    let user = user::Entity::find()
        .filter(user::Column::ResetToken.eq(token))
        .filter(user::Column::ResetExpiresAt.gt(now_sec()))
        .one(db)
        .await?
        .ok_or_else(|| AppError::validation("Invalid or expired reset token"))?;

    check_password(password)?;

    let mut active = user.into_active_model();
    active.password_hash = Set(hash_password(password)?);
    active.reset_token = Set(None);
    active.reset_expires_at = Set(None);
    let user = active.update(db).await?;

    session::Entity::delete_many().filter(session::Column::UserId.eq(user.id)).exec(db).await?;

    info!(user_id = user.id, "password reset");
    Ok(user)
}

pub async fn open_session<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    ttl_days: i64,
) -> AppResult<session::Model> {
    let now = now_sec();
    let session = session::ActiveModel {
        token: Set(random_token()),
        user_id: Set(user_id),
        expires_at: Set(now + ttl_days * 86_400),
        created_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(session)
}

/// Looks up the account behind a session token. Expired sessions are deleted on sight.
pub async fn resolve_session<C: ConnectionTrait>(
    db: &C,
    token: &str,
) -> AppResult<Option<user::Model>> {
    let Some(session) = session::Entity::find_by_id(token.to_string()).one(db).await? else {
        return Ok(None);
    };
    if session.expires_at <= now_sec() {
        session::Entity::delete_by_id(session.token).exec(db).await?;
        return Ok(None);
    }
    Ok(user::Entity::find_by_id(session.user_id).one(db).await?)
}

pub async fn close_session<C: ConnectionTrait>(db: &C, token: &str) -> AppResult<()> {
    session::Entity::delete_by_id(token.to_string()).exec(db).await?;
    Ok(())
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<Option<user::Model>> {
    Ok(user::Entity::find().filter(user::Column::Email.eq(email)).one(db).await?)
}

/// Makes sure the seeded account exists, is verified and holds the `Admin` role.
pub async fn ensure_admin<C: ConnectionTrait>(db: &C, seed: &AdminSeed) -> AppResult<user::Model> {
    let email = normalize_email(&seed.email);
    if let Some(existing) = find_by_email(db, &email).await? {
        if existing.role == Role::Admin && existing.is_verified {
            return Ok(existing);
        }
        let mut active = existing.into_active_model();
        active.role = Set(Role::Admin);
        active.is_verified = Set(true);
        return Ok(active.update(db).await?);
    }

    let user = user::ActiveModel {
        email: Set(email),
        name: Set("Administrator".to_string()),
        password_hash: Set(hash_password(&seed.password)?),
        role: Set(Role::Admin),
        is_verified: Set(true),
        verification_code: Set(None),
        verification_expires_at: Set(None),
        reset_token: Set(None),
        reset_expires_at: Set(None),
        last_login: Set(None),
        created_at: Set(now_sec()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = user.id, "seeded administrator");
    Ok(user)
}
