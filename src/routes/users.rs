use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::{
    actions::{get_user_by_id, login_user, register_user, update_user},
    jwt::SessionData,
    middleware::{ensure_active, with_session},
    schema::{AuthToken, Credentials, NewUser, UserPatch, UserProfile},
};

use super::{json_body, with_context, Context};

async fn create(payload: NewUser, ctx: Context) -> Result<Response, Rejection> {
    let user = register_user(payload, &ctx.pool).await?;

    Ok(reply::with_status(reply::json(&UserProfile::from(&user)), StatusCode::CREATED)
        .into_response())
}

async fn token(credentials: Credentials, ctx: Context) -> Result<Response, Rejection> {
    let token = login_user(
        &credentials.email,
        &credentials.password,
        &ctx.keys,
        &ctx.pool,
    )
    .await?;

    Ok(reply::json(&AuthToken { token }).into_response())
}

async fn me(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let user = ensure_active(get_user_by_id(&ctx.pool, session.user_id).await?)?;

    Ok(reply::json(&UserProfile::from(&user)).into_response())
}

async fn update_me(
    session: SessionData,
    patch: UserPatch,
    ctx: Context,
) -> Result<Response, Rejection> {
    let user = update_user(session.user_id, patch, &ctx.pool).await?;

    Ok(reply::json(&UserProfile::from(&user)).into_response())
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let base = warp::path("api").and(warp::path("user"));
    let session = with_session(ctx.keys.clone(), ctx.pool.clone());

    let create = base
        .clone()
        .and(warp::path("create"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<NewUser>())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let token = base
        .clone()
        .and(warp::path("token"))
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body::<Credentials>())
        .and(with_context(ctx.clone()))
        .and_then(token);

    let me = base
        .clone()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(me);

    let update_me = base
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(warp::put().or(warp::patch()).unify())
        .and(session)
        .and(json_body::<UserPatch>())
        .and(with_context(ctx))
        .and_then(update_me);

    create
        .or(token)
        .unify()
        .or(me)
        .unify()
        .or(update_me)
        .unify()
        .boxed()
}
