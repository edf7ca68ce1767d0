use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reply::{self, Reply, Response},
    Filter, Rejection,
};

use crate::{
    actions::{create_attribute, delete_attribute, list_attributes, update_attribute, Attribute},
    form::{AttributeFilter, Form, FormData},
    jwt::SessionData,
    middleware::with_session,
    permissions::OwnerScope,
    schema::{AttributePayload, Id},
};

use super::{json_body, with_context, Context};

async fn list<A: Attribute>(
    session: SessionData,
    query: FormData,
    ctx: Context,
) -> Result<Response, Rejection> {
    let filter = AttributeFilter::try_from(&Form::from_data(query))?;
    let rows: Vec<A> = list_attributes(OwnerScope::of(&session), filter, &ctx.pool).await?;

    Ok(reply::json(&rows).into_response())
}

async fn create<A: Attribute>(
    session: SessionData,
    payload: AttributePayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    let row: A = create_attribute(OwnerScope::of(&session), &payload.name, &ctx.pool).await?;

    Ok(reply::with_status(reply::json(&row), StatusCode::CREATED).into_response())
}

async fn update<A: Attribute>(
    id: Id,
    session: SessionData,
    payload: AttributePayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    let row: A = update_attribute(OwnerScope::of(&session), id, &payload.name, &ctx.pool).await?;

    Ok(reply::json(&row).into_response())
}

async fn delete<A: Attribute>(
    id: Id,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    delete_attribute::<A>(OwnerScope::of(&session), id, &ctx.pool).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// List, create, rename and delete for one owned attribute collection,
/// mounted under `/api/recipe/<A::PATH>`.
pub fn routes<A: Attribute>(ctx: Context) -> BoxedFilter<(Response,)> {
    let base = warp::path("api")
        .and(warp::path("recipe"))
        .and(warp::path(A::PATH));
    let session = with_session(ctx.keys.clone(), ctx.pool.clone());

    let list = base
        .clone()
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<FormData>())
        .and(with_context(ctx.clone()))
        .and_then(list::<A>);

    let create = base
        .clone()
        .and(warp::path::end())
        .and(warp::post())
        .and(session.clone())
        .and(json_body::<AttributePayload>())
        .and(with_context(ctx.clone()))
        .and_then(create::<A>);

    let update = base
        .clone()
        .and(warp::path::param::<Id>())
        .and(warp::path::end())
        .and(warp::put().or(warp::patch()).unify())
        .and(session.clone())
        .and(json_body::<AttributePayload>())
        .and(with_context(ctx.clone()))
        .and_then(update::<A>);

    let delete = base
        .and(warp::path::param::<Id>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(session)
        .and(with_context(ctx))
        .and_then(delete::<A>);

    list.or(create)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}
