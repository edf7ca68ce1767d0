use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use sqlx::{postgres::PgRow, Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    constants::NAME_MAX_LENGTH,
    error::{Error, HtmlError},
    form::AttributeFilter,
    permissions::{Owned, OwnerScope},
    schema::{Id, Ingredient, Tag},
};

/// A user-owned label that recipes link to. Tags and ingredients share one
/// table layout, so every collection operation is written once against this.
pub trait Attribute:
    for<'r> sqlx::FromRow<'r, PgRow> + Serialize + Owned + Send + Sync + Unpin + 'static
{
    /// Route segment and human readable plural.
    const PATH: &'static str;
    const TABLE: &'static str;
    /// Join table between recipes and this attribute.
    const LINK_TABLE: &'static str;
    const LINK_COLUMN: &'static str;
}

impl Attribute for Tag {
    const PATH: &'static str = "tags";
    const TABLE: &'static str = "tags";
    const LINK_TABLE: &'static str = "recipe_tags";
    const LINK_COLUMN: &'static str = "tag_id";
}

impl Attribute for Ingredient {
    const PATH: &'static str = "ingredients";
    const TABLE: &'static str = "ingredients";
    const LINK_TABLE: &'static str = "recipe_ingredients";
    const LINK_COLUMN: &'static str = "ingredient_id";
}

pub fn validate_attribute_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(HtmlError::InvalidRequest.new("This field may not be blank"));
    }
    if name.chars().count() > NAME_MAX_LENGTH {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Ensure this field has no more than {NAME_MAX_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn build_attribute_query<A: Attribute>(
    scope: OwnerScope,
    filter: AttributeFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT a.* FROM {} a WHERE ", A::TABLE));
    scope.restrict(&mut query, "a.user_id");

    if filter.assigned_only {
        query.push(format!(
            " AND EXISTS (SELECT 1 FROM {link} l INNER JOIN recipes r ON r.id = l.recipe_id WHERE l.{column} = a.id AND ",
            link = A::LINK_TABLE,
            column = A::LINK_COLUMN,
        ));
        scope.restrict(&mut query, "r.user_id");
        query.push(")");
    }

    query.push(" ORDER BY a.name DESC, a.id DESC");
    query
}

pub async fn list_attributes<A: Attribute>(
    scope: OwnerScope,
    filter: AttributeFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<A>, Error> {
    let mut query = build_attribute_query::<A>(scope, filter);
    let rows: Vec<A> = query.build_query_as().fetch_all(pool).await?;

    Ok(rows)
}

pub async fn create_attribute<A: Attribute>(
    scope: OwnerScope,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<A, Error> {
    let name = validate_attribute_name(name)?;

    let row: A = sqlx::query_as(&format!(
        "INSERT INTO {} (name, user_id) VALUES ($1, $2) RETURNING *",
        A::TABLE
    ))
    .bind(name)
    .bind(scope.owner_id())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn update_attribute<A: Attribute>(
    scope: OwnerScope,
    id: Id,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<A, Error> {
    let name = validate_attribute_name(name)?;

    let row: Option<A> = sqlx::query_as(&format!(
        "UPDATE {} SET name = $1 WHERE id = $2 AND user_id = $3 RETURNING *",
        A::TABLE
    ))
    .bind(name)
    .bind(id)
    .bind(scope.owner_id())
    .fetch_optional(pool)
    .await?;

    scope.check(row)
}

/// Association rows go with it through `ON DELETE CASCADE`.
pub async fn delete_attribute<A: Attribute>(
    scope: OwnerScope,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE id = $1 AND user_id = $2",
        A::TABLE
    ))
    .bind(id)
    .bind(scope.owner_id())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }
    Ok(())
}

/// Linked attribute ids per recipe, in id order.
pub async fn list_linked_ids<A: Attribute>(
    recipe_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<Id>>, Error> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let links: Vec<(Id, Id)> = sqlx::query_as(&format!(
        "SELECT recipe_id, {column} FROM {link} WHERE recipe_id = ANY($1) ORDER BY {column}",
        column = A::LINK_COLUMN,
        link = A::LINK_TABLE,
    ))
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    let mut hashmap: HashMap<Id, Vec<Id>> = HashMap::new();
    links
        .into_iter()
        .for_each(|(recipe_id, id)| hashmap.entry(recipe_id).or_default().push(id));

    Ok(hashmap)
}

pub async fn list_linked<A: Attribute>(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<A>, Error> {
    let rows: Vec<A> = sqlx::query_as(&format!(
        "
        SELECT a.* FROM {table} a
        INNER JOIN {link} l ON l.{column} = a.id
        WHERE l.recipe_id = $1
        ORDER BY a.id
    ",
        table = A::TABLE,
        link = A::LINK_TABLE,
        column = A::LINK_COLUMN,
    ))
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Deduplicates `ids` and verifies every one is owned by the caller.
pub async fn ensure_owned<A: Attribute>(
    scope: OwnerScope,
    ids: &[Id],
    tx: &mut Transaction<'_, Postgres>,
) -> Result<Vec<Id>, Error> {
    let ids: Vec<Id> = ids.iter().copied().collect::<BTreeSet<Id>>().into_iter().collect();
    if ids.is_empty() {
        return Ok(ids);
    }

    let owned: Vec<(Id,)> = sqlx::query_as(&format!(
        "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
        A::TABLE
    ))
    .bind(scope.owner_id())
    .bind(&ids)
    .fetch_all(&mut **tx)
    .await?;

    if let Some(missing) = ids.iter().find(|id| !owned.iter().any(|(o,)| o == *id)) {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Invalid pk \"{missing}\" - object does not exist"
        )));
    }
    Ok(ids)
}

/// Replaces a recipe's links to this attribute.
pub async fn set_links<A: Attribute>(
    recipe_id: Id,
    ids: &[Id],
    tx: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {} WHERE recipe_id = $1", A::LINK_TABLE))
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    if ids.is_empty() {
        return Ok(());
    }

    sqlx::query(&format!(
        "INSERT INTO {link} (recipe_id, {column}) SELECT $1, UNNEST($2::INTEGER[]) ON CONFLICT DO NOTHING",
        link = A::LINK_TABLE,
        column = A::LINK_COLUMN,
    ))
    .bind(recipe_id)
    .bind(ids)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::SessionData;

    fn scope() -> OwnerScope {
        OwnerScope::of(&SessionData {
            user_id: 1,
            email: String::from("test@example.com"),
            is_staff: false,
            is_superuser: false,
        })
    }

    #[test]
    fn blank_names_are_rejected() {
        assert_eq!(validate_attribute_name("").unwrap_err().code, 400);
        assert_eq!(validate_attribute_name("   ").unwrap_err().code, 400);
        assert_eq!(validate_attribute_name(" milk ").unwrap(), "milk");
        assert!(validate_attribute_name(&"x".repeat(NAME_MAX_LENGTH + 1)).is_err());
    }

    #[test]
    fn listing_is_owner_scoped_and_ordered() {
        let query = build_attribute_query::<Tag>(scope(), AttributeFilter::default());

        assert_eq!(
            query.sql(),
            "SELECT a.* FROM tags a WHERE a.user_id = $1 ORDER BY a.name DESC, a.id DESC"
        );
    }

    #[test]
    fn assigned_only_uses_a_semi_join() {
        let query = build_attribute_query::<Ingredient>(
            scope(),
            AttributeFilter {
                assigned_only: true,
            },
        );
        let sql = query.sql();

        assert!(sql.starts_with("SELECT a.* FROM ingredients a WHERE a.user_id = $1"));
        assert!(sql.contains("EXISTS (SELECT 1 FROM recipe_ingredients l"));
        assert!(sql.contains("l.ingredient_id = a.id AND r.user_id = $2)"));
        assert!(!sql.contains("JOIN recipe_ingredients"));
    }
}
