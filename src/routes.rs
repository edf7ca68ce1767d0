use std::convert::Infallible;

use serde::de::DeserializeOwned;
use sqlx::{Pool, Postgres};
use warp::{
    filters::body::BodyDeserializeError,
    reject::{
        InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader,
        PayloadTooLarge, UnsupportedMediaType,
    },
    Filter, Rejection, Reply,
};

use crate::{
    constants::{JSON_BODY_LIMIT, MEDIA_URL_PREFIX},
    error::{Error, HtmlError},
    jwt::SessionKeys,
    schema::{Ingredient, Tag},
    storage::MediaStore,
};

pub mod attributes;
pub mod recipes;
pub mod users;

/// Shared handles every handler receives. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub pool: Pool<Postgres>,
    pub keys: SessionKeys,
    pub media: MediaStore,
    pub max_upload_bytes: u64,
}

impl Context {
    pub fn new(
        pool: Pool<Postgres>,
        keys: SessionKeys,
        media: MediaStore,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            pool,
            keys,
            media,
            max_upload_bytes,
        }
    }
}

pub(crate) fn with_context(
    ctx: Context,
) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

pub(crate) fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

/// The whole API, with rejections rendered as JSON.
pub fn routes(ctx: Context) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path(MEDIA_URL_PREFIX).and(warp::fs::dir(ctx.media.root().to_path_buf()));

    users::routes(ctx.clone())
        .or(attributes::routes::<Tag>(ctx.clone()))
        .or(attributes::routes::<Ingredient>(ctx.clone()))
        .or(recipes::routes(ctx))
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("recipe_api"))
}

fn rejection_error(err: &Rejection) -> Error {
    if let Some(error) = err.find::<Error>() {
        return error.clone();
    }
    if err.is_not_found() {
        return HtmlError::NotFound.default();
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if let Some(e) = err.find::<InvalidQuery>() {
        return HtmlError::InvalidRequest.new(&e.to_string());
    }
    if err.find::<MissingHeader>().is_some()
        || err.find::<InvalidHeader>().is_some()
        || err.find::<UnsupportedMediaType>().is_some()
        || err.find::<LengthRequired>().is_some()
    {
        return HtmlError::InvalidRequest.new("Malformed request payload");
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return HtmlError::PayloadTooLarge.default();
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return HtmlError::MethodNotAllowed.default();
    }

    log::error!("Unhandled rejection: {err:?}");
    HtmlError::InternalServerError.default()
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    Ok(rejection_error(&err))
}
