use sqlx::{Pool, Postgres};

use crate::database::{
    error::ApiError,
    schema::{Id, RecipePreview},
};

pub async fn get_recipe_preview(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipePreview>, ApiError> {
    let row: Option<RecipePreview> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

async fn require_recipe(id: Id, pool: &Pool<Postgres>) -> Result<RecipePreview, ApiError> {
    get_recipe_preview(id, pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No recipe exists with specified id"))
}

/// Outcome of an `ON CONFLICT DO NOTHING` insert on a uniqueness relation:
/// zero affected rows means the pair already existed.
pub(crate) fn ensure_inserted(rows_affected: u64, exists: &str) -> Result<(), ApiError> {
    if rows_affected == 0 {
        return Err(ApiError::conflict(exists));
    }
    Ok(())
}

/// Outcome of a relation delete: zero affected rows means there was
/// nothing to remove.
pub(crate) fn ensure_removed(rows_affected: u64, missing: &str) -> Result<(), ApiError> {
    if rows_affected == 0 {
        return Err(ApiError::not_found(missing));
    }
    Ok(())
}

pub async fn is_favorited(recipe_id: Id, user_id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let row: Option<(Id,)> =
        sqlx::query_as("SELECT recipe_id FROM favorite_marks WHERE recipe_id = $1 AND user_id = $2")
            .bind(recipe_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

pub async fn is_in_cart(recipe_id: Id, user_id: Id, pool: &Pool<Postgres>) -> Result<bool, ApiError> {
    let row: Option<(Id,)> =
        sqlx::query_as("SELECT recipe_id FROM cart_marks WHERE recipe_id = $1 AND user_id = $2")
            .bind(recipe_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Marks the recipe as a favorite. A second add for the same pair loses to
/// the uniqueness constraint and reports a conflict.
pub async fn add_favorite(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipePreview, ApiError> {
    let recipe = require_recipe(recipe_id, pool).await?;

    let result = sqlx::query(
        "INSERT INTO favorite_marks (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    ensure_inserted(result.rows_affected(), "Recipe is already in favorites")?;
    Ok(recipe)
}

pub async fn remove_favorite(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM favorite_marks WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

    ensure_removed(result.rows_affected(), "Recipe is not in favorites")
}

/// Adds the recipe to the user's shopping cart; same uniqueness semantics
/// as favorites.
pub async fn add_to_cart(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipePreview, ApiError> {
    let recipe = require_recipe(recipe_id, pool).await?;

    let result = sqlx::query(
        "INSERT INTO cart_marks (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    ensure_inserted(result.rows_affected(), "Recipe is already in the shopping cart")?;
    Ok(recipe)
}

pub async fn remove_from_cart(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM cart_marks WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(recipe_id)
        .execute(pool)
        .await?;

    ensure_removed(result.rows_affected(), "Recipe is not in the shopping cart")
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    #[test]
    fn second_add_conflicts() {
        assert!(ensure_inserted(1, "already there").is_ok());

        let error = ensure_inserted(0, "already there").unwrap_err();
        assert_eq!(error.status(), StatusCode::CONFLICT);
        assert_eq!(error.to_string(), "already there");
    }

    #[test]
    fn second_remove_not_found() {
        assert!(ensure_removed(1, "nothing to remove").is_ok());

        let error = ensure_removed(0, "nothing to remove").unwrap_err();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }
}
