use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter};

use crate::{
    actions::get_user_by_id,
    error::{Error, HtmlError},
    schema::User,
};

use super::jwt::{SessionData, SessionKeys};

const BEARER_PREFIX: &str = "Bearer ";

fn bearer_token(header: Option<&str>) -> Result<&str, Error> {
    match header {
        Some(value) => value
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| HtmlError::Unauthorized.new("Invalid authorization header")),
        None => Err(HtmlError::Unauthorized.default()),
    }
}

/// The caller behind a verified token, as the users table sees it now.
pub fn ensure_active(user: Option<User>) -> Result<User, Error> {
    user.filter(|user| user.is_active)
        .ok_or_else(|| HtmlError::Unauthorized.new("User inactive or deleted"))
}

fn session_of(user: &User) -> SessionData {
    SessionData {
        user_id: user.id,
        email: user.email.to_owned(),
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
    }
}

/// Resolves the bearer token to an active user, or rejects with 401.
pub fn with_session(
    keys: SessionKeys,
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let keys = keys.clone();
        let pool = pool.clone();
        async move {
            let token = bearer_token(header.as_deref())?;
            let claims = keys.verify_jwt_session(token)?;
            let user = ensure_active(get_user_by_id(&pool, claims.user_id).await?)?;

            Ok::<_, Rejection>(session_of(&user))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::postgres::PgPoolOptions;

    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"secret", chrono::Duration::hours(1))
    }

    fn offline_pool() -> Pool<Postgres> {
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://postgres@127.0.0.1:1/offline")
            .unwrap()
    }

    fn user(is_active: bool) -> User {
        User {
            id: 9,
            email: String::from("test@example.com"),
            name: String::new(),
            password: String::new(),
            is_active,
            is_staff: true,
            is_superuser: false,
        }
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("Token abc")).unwrap_err().code, 401);
        assert_eq!(bearer_token(Some("Bearer ")).unwrap_err().code, 401);
        assert_eq!(bearer_token(None).unwrap_err().code, 401);
    }

    #[test]
    fn inactive_and_deleted_users_are_unauthorized() {
        let expected = HtmlError::Unauthorized.new("User inactive or deleted");

        assert_eq!(ensure_active(Some(user(false))).unwrap_err(), expected);
        assert_eq!(ensure_active(None).unwrap_err(), expected);
    }

    #[test]
    fn session_reflects_the_stored_user() {
        let session = session_of(&ensure_active(Some(user(true))).unwrap());

        assert_eq!(session.user_id, 9);
        assert!(session.is_staff);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let rejection = warp::test::request()
            .filter(&with_session(keys(), offline_pool()))
            .await
            .unwrap_err();

        assert_eq!(rejection.find::<Error>().map(|e| e.code), Some(401));
    }

    #[tokio::test]
    async fn forged_token_is_rejected_before_lookup() {
        let token = SessionKeys::new(b"other", chrono::Duration::hours(1))
            .generate_jwt_session(&user(true))
            .unwrap();

        let rejection = warp::test::request()
            .header("authorization", format!("Bearer {token}"))
            .filter(&with_session(keys(), offline_pool()))
            .await
            .unwrap_err();

        assert_eq!(rejection.find::<Error>().map(|e| e.code), Some(401));
    }
}
