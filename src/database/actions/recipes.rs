use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    constants::{LINK_MAX_LENGTH, PRICE_DECIMAL_PLACES, PRICE_MAX_CENTS, TITLE_MAX_LENGTH},
    error::{Error, HtmlError},
    form::RecipeFilter,
    permissions::OwnerScope,
    schema::{
        Id, Ingredient, RecipeDetail, RecipeImage, RecipeInput, RecipePatch, RecipeRow,
        RecipeSummary, Tag,
    },
};

use super::attributes::{
    ensure_owned, list_linked, list_linked_ids, set_links, Attribute,
};

/// The scalar columns of a recipe, after validation.
#[derive(Debug, Clone, PartialEq)]
struct RecipeFields {
    title: String,
    time_minutes: i32,
    price: Decimal,
    link: Option<String>,
}

impl RecipeFields {
    fn from_input(input: &RecipeInput) -> Self {
        Self {
            title: input.title.to_owned(),
            time_minutes: input.time_minutes,
            price: input.price,
            link: input.link.to_owned(),
        }
    }

    fn from_row(row: &RecipeRow) -> Self {
        Self {
            title: row.title.to_owned(),
            time_minutes: row.time_minutes,
            price: row.price,
            link: row.link.to_owned(),
        }
    }

    fn apply(mut self, patch: &RecipePatch) -> Self {
        if let Some(title) = &patch.title {
            self.title = title.to_owned();
        }
        if let Some(time_minutes) = patch.time_minutes {
            self.time_minutes = time_minutes;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(link) = &patch.link {
            self.link = Some(link.to_owned());
        }
        self
    }

    fn validate(self) -> Result<Self, Error> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(HtmlError::InvalidRequest.new("Title may not be blank"));
        }
        if title.chars().count() > TITLE_MAX_LENGTH {
            return Err(HtmlError::InvalidRequest.new("Title is too long"));
        }
        if self.time_minutes < 0 {
            return Err(HtmlError::InvalidRequest.new("time_minutes must be zero or more"));
        }

        let link = self
            .link
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty());
        if link.as_ref().is_some_and(|l| l.chars().count() > LINK_MAX_LENGTH) {
            return Err(HtmlError::InvalidRequest.new("Link is too long"));
        }

        Ok(Self {
            title,
            time_minutes: self.time_minutes,
            price: validate_price(self.price)?,
            link,
        })
    }
}

pub fn validate_price(price: Decimal) -> Result<Decimal, Error> {
    if price < Decimal::ZERO {
        return Err(HtmlError::InvalidRequest.new("Price must be zero or more"));
    }
    if price.normalize().scale() > PRICE_DECIMAL_PLACES {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Price may have at most {PRICE_DECIMAL_PLACES} decimal places"
        )));
    }
    let max = Decimal::new(PRICE_MAX_CENTS, PRICE_DECIMAL_PLACES);
    if price > max {
        return Err(HtmlError::InvalidRequest.new(&format!("Price may not exceed {max}")));
    }
    Ok(price)
}

fn push_link_filter<A: Attribute>(query: &mut QueryBuilder<'static, Postgres>, ids: &[Id]) {
    query.push(format!(
        " AND r.id IN (SELECT recipe_id FROM {} WHERE {} = ANY(",
        A::LINK_TABLE,
        A::LINK_COLUMN
    ));
    query.push_bind(ids.to_vec());
    query.push("))");
}

/// Recipes of one owner, optionally narrowed to those linking any of the
/// given tags and any of the given ingredients. `IN` keeps rows unique.
pub fn build_recipe_query(
    scope: OwnerScope,
    filter: &RecipeFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT r.* FROM recipes r WHERE ");
    scope.restrict(&mut query, "r.user_id");

    if let Some(tags) = &filter.tags {
        push_link_filter::<Tag>(&mut query, tags);
    }
    if let Some(ingredients) = &filter.ingredients {
        push_link_filter::<Ingredient>(&mut query, ingredients);
    }

    query.push(" ORDER BY r.id DESC");
    query
}

async fn summarize(
    rows: Vec<RecipeRow>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeSummary>, Error> {
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut tags = list_linked_ids::<Tag>(&ids, pool).await?;
    let mut ingredients = list_linked_ids::<Ingredient>(&ids, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let tag_ids = tags.remove(&row.id).unwrap_or_default();
            let ingredient_ids = ingredients.remove(&row.id).unwrap_or_default();
            RecipeSummary::from_row(row, tag_ids, ingredient_ids)
        })
        .collect())
}

async fn summarize_one(row: RecipeRow, pool: &Pool<Postgres>) -> Result<RecipeSummary, Error> {
    summarize(vec![row], pool)
        .await?
        .pop()
        .ok_or_else(|| HtmlError::NotFound.default())
}

pub async fn list_recipes(
    scope: OwnerScope,
    filter: &RecipeFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeSummary>, Error> {
    let mut query = build_recipe_query(scope, filter);
    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    summarize(rows, pool).await
}

pub async fn get_recipe(
    scope: OwnerScope,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeRow, Error> {
    let row: Option<RecipeRow> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    scope.check(row)
}

async fn lock_recipe(
    scope: OwnerScope,
    id: Id,
    tx: &mut Transaction<'_, Postgres>,
) -> Result<RecipeRow, Error> {
    let row: Option<RecipeRow> =
        sqlx::query_as("SELECT * FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

    scope.check(row)
}

pub async fn get_recipe_detail(
    scope: OwnerScope,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, Error> {
    let row = get_recipe(scope, id, pool).await?;
    let tags = list_linked::<Tag>(row.id, pool).await?;
    let ingredients = list_linked::<Ingredient>(row.id, pool).await?;

    Ok(RecipeDetail::from_row(row, tags, ingredients))
}

pub async fn create_recipe(
    scope: OwnerScope,
    input: RecipeInput,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    let fields = RecipeFields::from_input(&input).validate()?;

    let mut tx = pool.begin().await?;
    let tags = ensure_owned::<Tag>(scope, &input.tags, &mut tx).await?;
    let ingredients = ensure_owned::<Ingredient>(scope, &input.ingredients, &mut tx).await?;

    let row: RecipeRow = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(scope.owner_id())
    .bind(fields.title)
    .bind(fields.time_minutes)
    .bind(fields.price)
    .bind(fields.link)
    .fetch_one(&mut *tx)
    .await?;

    set_links::<Tag>(row.id, &tags, &mut tx).await?;
    set_links::<Ingredient>(row.id, &ingredients, &mut tx).await?;
    tx.commit().await?;

    log::info!("User {} created recipe {}", scope.owner_id(), row.id);
    Ok(RecipeSummary::from_row(row, tags, ingredients))
}

/// Applies a full or partial update. Absent association lists stay as they are.
pub async fn update_recipe(
    scope: OwnerScope,
    id: Id,
    patch: RecipePatch,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    let mut tx = pool.begin().await?;
    let current = lock_recipe(scope, id, &mut tx).await?;
    let fields = RecipeFields::from_row(&current).apply(&patch).validate()?;

    let tags = match &patch.tags {
        Some(ids) => Some(ensure_owned::<Tag>(scope, ids, &mut tx).await?),
        None => None,
    };
    let ingredients = match &patch.ingredients {
        Some(ids) => Some(ensure_owned::<Ingredient>(scope, ids, &mut tx).await?),
        None => None,
    };

    let row: RecipeRow = sqlx::query_as(
        "
        UPDATE recipes
        SET title = $2, time_minutes = $3, price = $4, link = $5
        WHERE id = $1
        RETURNING *
    ",
    )
    .bind(current.id)
    .bind(fields.title)
    .bind(fields.time_minutes)
    .bind(fields.price)
    .bind(fields.link)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(tags) = &tags {
        set_links::<Tag>(row.id, tags, &mut tx).await?;
    }
    if let Some(ingredients) = &ingredients {
        set_links::<Ingredient>(row.id, ingredients, &mut tx).await?;
    }
    tx.commit().await?;

    summarize_one(row, pool).await
}

/// Returns the stored image reference of the deleted recipe, if any.
pub async fn delete_recipe(
    scope: OwnerScope,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, Error> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING image")
            .bind(id)
            .bind(scope.owner_id())
            .fetch_optional(pool)
            .await?;

    match row {
        Some((image,)) => {
            log::info!("User {} deleted recipe {id}", scope.owner_id());
            Ok(image)
        }
        None => Err(HtmlError::NotFound.default()),
    }
}

/// Stores a new image reference and returns it with the one it replaced.
pub async fn set_recipe_image(
    scope: OwnerScope,
    id: Id,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<(RecipeImage, Option<String>), Error> {
    let mut tx = pool.begin().await?;
    let current = lock_recipe(scope, id, &mut tx).await?;

    let row: (Id, Option<String>) =
        sqlx::query_as("UPDATE recipes SET image = $2 WHERE id = $1 RETURNING id, image")
            .bind(current.id)
            .bind(image)
            .fetch_one(&mut *tx)
            .await?;
    tx.commit().await?;

    Ok((
        RecipeImage {
            id: row.0,
            image: row.1,
        },
        current.image,
    ))
}
