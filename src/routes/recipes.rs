use futures_util::TryStreamExt;
use warp::{
    filters::{multipart::FormData as MultipartData, BoxedFilter},
    http::StatusCode,
    reply::{Reply, Response},
    Buf, Filter, Rejection,
};

use crate::{
    actions::{
        create_recipe, delete_recipe, get_recipe, get_recipe_detail, list_recipes,
        set_recipe_image, update_recipe,
    },
    constants::RECIPE_IMAGE_FIELD,
    error::{Error, HtmlError},
    form::{Form, FormData, RecipeFilter},
    jwt::SessionData,
    middleware::with_session,
    permissions::OwnerScope,
    schema::{Id, RecipeInput, RecipeOutput, RecipePatch},
    storage::{is_image, recipe_image_file_path},
};

use super::{json_body, with_context, Context};

async fn list(session: SessionData, query: FormData, ctx: Context) -> Result<Response, Rejection> {
    let filter = RecipeFilter::try_from(&Form::from_data(query))?;
    let rows = list_recipes(OwnerScope::of(&session), &filter, &ctx.pool).await?;

    Ok(RecipeOutput::List(rows).into_response())
}

async fn detail(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let recipe = get_recipe_detail(OwnerScope::of(&session), id, &ctx.pool).await?;

    Ok(RecipeOutput::Detail(recipe).into_response())
}

async fn create(
    session: SessionData,
    input: RecipeInput,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = create_recipe(OwnerScope::of(&session), input, &ctx.pool).await?;

    Ok(RecipeOutput::Created(recipe).into_response())
}

async fn replace(
    id: Id,
    session: SessionData,
    input: RecipeInput,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = update_recipe(OwnerScope::of(&session), id, input.into(), &ctx.pool).await?;

    Ok(RecipeOutput::Updated(recipe).into_response())
}

async fn patch(
    id: Id,
    session: SessionData,
    patch: RecipePatch,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = update_recipe(OwnerScope::of(&session), id, patch, &ctx.pool).await?;

    Ok(RecipeOutput::Updated(recipe).into_response())
}

async fn delete(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let image = delete_recipe(OwnerScope::of(&session), id, &ctx.pool).await?;

    if let Some(image) = image {
        if let Err(e) = ctx.media.remove(&image).await {
            log::warn!("Failed to remove image {image} of deleted recipe {id}: {e}");
        }
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

/// Pulls the image field out of a multipart body. Other fields are ignored.
async fn read_image_field(form: MultipartData) -> Result<UploadedFile, Error> {
    let malformed = |e: warp::Error| {
        log::debug!("Malformed multipart body: {e}");
        HtmlError::InvalidRequest.new("Malformed multipart body")
    };
    let mut parts = Box::pin(form);

    while let Some(part) = parts.try_next().await.map_err(malformed)? {
        if part.name() != RECIPE_IMAGE_FIELD {
            continue;
        }
        let filename = part
            .filename()
            .map(str::to_string)
            .ok_or_else(|| HtmlError::InvalidRequest.new("The submitted data was not a file"))?;

        let mut data = Vec::new();
        let mut stream = Box::pin(part.stream());
        while let Some(mut buf) = stream.try_next().await.map_err(malformed)? {
            while buf.has_remaining() {
                let chunk = buf.chunk();
                let len = chunk.len();
                data.extend_from_slice(chunk);
                buf.advance(len);
            }
        }

        return Ok(UploadedFile { filename, data });
    }

    Err(HtmlError::InvalidRequest.new("No file was submitted"))
}

/// Stores the uploaded file first, then points the recipe at it. The file is
/// removed again when the recipe cannot be updated.
async fn upload_image(
    id: Id,
    session: SessionData,
    form: MultipartData,
    ctx: Context,
) -> Result<Response, Rejection> {
    let scope = OwnerScope::of(&session);
    get_recipe(scope, id, &ctx.pool).await?;

    let file = read_image_field(form).await?;
    let path = recipe_image_file_path(&file.filename)?;
    if file.data.is_empty() || !is_image(&file.data) {
        return Err(HtmlError::InvalidRequest
            .new("Upload a valid image. The file you uploaded was either not an image or a corrupted image")
            .into());
    }

    ctx.media.store(&path, &file.data).await.map_err(|e| {
        log::error!("Failed to store image {path}: {e}");
        HtmlError::InternalServerError.default()
    })?;

    let (image, previous) = match set_recipe_image(scope, id, &path, &ctx.pool).await {
        Ok(result) => result,
        Err(e) => {
            if let Err(e) = ctx.media.remove(&path).await {
                log::warn!("Failed to remove orphaned image {path}: {e}");
            }
            return Err(e.into());
        }
    };

    if let Some(previous) = previous {
        if let Err(e) = ctx.media.remove(&previous).await {
            log::warn!("Failed to remove replaced image {previous}: {e}");
        }
    }

    log::info!("Stored image {path} for recipe {id}");
    Ok(RecipeOutput::ImageUploaded(image).into_response())
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let base = warp::path("api")
        .and(warp::path("recipe"))
        .and(warp::path("recipes"));
    let item = base.clone().and(warp::path::param::<Id>());
    let session = with_session(ctx.keys.clone(), ctx.pool.clone());

    let list = base
        .clone()
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<FormData>())
        .and(with_context(ctx.clone()))
        .and_then(list);

    let create = base
        .and(warp::path::end())
        .and(warp::post())
        .and(session.clone())
        .and(json_body::<RecipeInput>())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let detail = item
        .clone()
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(detail);

    let replace = item
        .clone()
        .and(warp::path::end())
        .and(warp::put())
        .and(session.clone())
        .and(json_body::<RecipeInput>())
        .and(with_context(ctx.clone()))
        .and_then(replace);

    let patch = item
        .clone()
        .and(warp::path::end())
        .and(warp::patch())
        .and(session.clone())
        .and(json_body::<RecipePatch>())
        .and(with_context(ctx.clone()))
        .and_then(patch);

    let delete = item
        .clone()
        .and(warp::path::end())
        .and(warp::delete())
        .and(session.clone())
        .and(with_context(ctx.clone()))
        .and_then(delete);

    let upload_image = item
        .and(warp::path("upload-image"))
        .and(warp::path::end())
        .and(warp::post())
        .and(session)
        .and(warp::multipart::form().max_length(ctx.max_upload_bytes))
        .and(with_context(ctx))
        .and_then(upload_image);

    list.or(create)
        .unify()
        .or(detail)
        .unify()
        .or(replace)
        .unify()
        .or(patch)
        .unify()
        .or(delete)
        .unify()
        .or(upload_image)
        .unify()
        .boxed()
}
