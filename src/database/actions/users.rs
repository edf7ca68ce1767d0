use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::SessionKeys,
    },
    constants::{NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH},
    error::{Error, HtmlError},
    schema::{Id, NewUser, User, UserPatch},
};

use sqlx::{Pool, Postgres};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: Option<&str>) -> Result<String, Error> {
    let email = email.map(normalize_email).unwrap_or_default();
    if email.is_empty() {
        return Err(HtmlError::InvalidRequest.new("Users must have an email address"));
    }
    if email.len() > NAME_MAX_LENGTH || !email.contains('@') {
        return Err(HtmlError::InvalidRequest.new("Enter a valid email address"));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), Error> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.chars().count() > NAME_MAX_LENGTH {
        return Err(HtmlError::InvalidRequest.new("Name is too long"));
    }
    Ok(())
}

fn hash(password: &str) -> Result<String, Error> {
    hash_password(password).map_err(|e| {
        log::error!("Failed to hash password: {e}");
        HtmlError::InternalServerError.default()
    })
}

/// Checks a registration payload and returns the normalized email.
pub fn validate_new_user(user: &NewUser) -> Result<String, Error> {
    let email = validate_email(user.email.as_deref())?;
    validate_password(&user.password)?;
    validate_name(&user.name)?;
    Ok(email)
}

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = $1")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

async fn insert_user(
    user: NewUser,
    is_superuser: bool,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    let email = validate_new_user(&user)?;
    let password = hash(&user.password)?;

    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, name, password, is_staff, is_superuser)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING *
    ",
    )
    .bind(&email)
    .bind(user.name.trim())
    .bind(password)
    .bind(is_superuser)
    .fetch_one(pool)
    .await?;

    log::info!("Registered user {} ({})", row.id, row.email);
    Ok(row)
}

/// Creates a user, storing an argon2 hash of the password.
/// Duplicate emails are rejected by the unique index on `LOWER(email)`.
pub async fn register_user(user: NewUser, pool: &Pool<Postgres>) -> Result<User, Error> {
    insert_user(user, false, pool).await
}

pub async fn register_superuser(user: NewUser, pool: &Pool<Postgres>) -> Result<User, Error> {
    insert_user(user, true, pool).await
}

pub async fn login_user(
    email: &str,
    password: &str,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let invalid = || HtmlError::InvalidRequest.new("Unable to authenticate with provided credentials");

    if email.trim().is_empty() || password.is_empty() {
        return Err(invalid());
    }

    let user = match get_user(pool, email).await? {
        Some(user) if user.is_active => user,
        _ => return Err(invalid()),
    };

    let authenticated = verify_password(password, &user.password).map_err(|e| {
        log::error!("Stored password hash for user {} is unreadable: {e}", user.id);
        HtmlError::InternalServerError.default()
    })?;
    if !authenticated {
        return Err(invalid());
    }

    keys.generate_jwt_session(&user)
}

pub fn validate_user_patch(patch: &UserPatch) -> Result<Option<String>, Error> {
    let email = match &patch.email {
        Some(email) => Some(validate_email(Some(email))?),
        None => None,
    };
    if let Some(password) = &patch.password {
        validate_password(password)?;
    }
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    Ok(email)
}

pub async fn update_user(
    user_id: Id,
    patch: UserPatch,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    let email = validate_user_patch(&patch)?;
    let password = match &patch.password {
        Some(password) => Some(hash(password)?),
        None => None,
    };

    let row: Option<User> = sqlx::query_as(
        "
        UPDATE users
        SET email = COALESCE($2, email),
            name = COALESCE($3, name),
            password = COALESCE($4, password)
        WHERE id = $1
        RETURNING *
    ",
    )
    .bind(user_id)
    .bind(email)
    .bind(patch.name.as_deref().map(str::trim))
    .bind(password)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| HtmlError::Unauthorized.new("User no longer exists"))
}
