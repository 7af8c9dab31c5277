use std::fs;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use log::warn;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    config::Config,
    constants::RECIPE_COUNT_PER_PAGE,
    database::{
        error::{ApiError, ValidationError},
        form::{RecipeFilter, RecipeForm},
        pagination::PageContext,
        schema::{Id, IngredientInRecipe, Recipe, RecipeDetails, RecipeListRow, RecipePreview, Tag},
    },
};

use super::{get_user_profile, is_favorited, is_in_cart};

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fetches a recipe for mutation. Authors may edit their own recipes,
/// admins may edit any.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool).await?;
    session.authorize(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => {
            if session.authorize(ActionType::ManageAllRecipes).is_ok()
                || recipe.author_id == session.user_id
            {
                Ok(recipe)
            } else {
                Err(ApiError::unauthorized())
            }
        }
        None => Err(ApiError::not_found("No recipe exists with specified id")),
    }
}

/// Builds and persists a new recipe aggregate in one transaction: the
/// recipe row, its tag links and its ingredient lines.
pub async fn create_recipe(
    session: &SessionData,
    form: &RecipeForm,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetails, ApiError> {
    session.authorize(ActionType::CreateRecipes)?;
    form.validate()?;
    ensure_tags_exist(&form.tags, pool).await?;
    ensure_ingredients_exist(form, pool).await?;

    let image_path = store_image(&form.image, session.user_id, config)?;

    let mut tx = pool.begin().await?;

    let row: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time, pub_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&form.name)
    .bind(&image_path)
    .bind(&form.text)
    .bind(form.cooking_time)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    let recipe_id = row.0;
    LinkSets::from_form(form).insert(recipe_id, &mut tx).await?;

    tx.commit().await?;

    build_recipe_details(recipe_id, Some(session.user_id), pool).await
}

/// Replaces the aggregate wholesale: scalar columns are updated, then the
/// entire tag-link and ingredient-line sets are deleted and re-inserted
/// from the form. Line identity is not preserved across updates. The
/// replaced image file is removed once the transaction commits.
pub async fn update_recipe(
    id: Id,
    session: &SessionData,
    form: &RecipeForm,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetails, ApiError> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    form.validate()?;
    ensure_tags_exist(&form.tags, pool).await?;
    ensure_ingredients_exist(form, pool).await?;

    let image_path = store_image(&form.image, recipe.author_id, config)?;

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4 WHERE id = $5")
        .bind(&form.name)
        .bind(&image_path)
        .bind(&form.text)
        .bind(form.cooking_time)
        .bind(recipe.id)
        .execute(&mut *tx)
        .await?;

    LinkSets::clear(recipe.id, &mut tx).await?;
    LinkSets::from_form(form).insert(recipe.id, &mut tx).await?;

    tx.commit().await?;

    remove_image(&recipe.image, config);

    build_recipe_details(recipe.id, Some(session.user_id), pool).await
}

/// Deletes the aggregate and every record hanging off it.
pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    let mut tx = pool.begin().await?;
    for query in [
        "DELETE FROM favorite_marks WHERE recipe_id = $1",
        "DELETE FROM cart_marks WHERE recipe_id = $1",
        "DELETE FROM recipe_ingredients WHERE recipe_id = $1",
        "DELETE FROM recipe_tags WHERE recipe_id = $1",
        "DELETE FROM recipes WHERE id = $1",
    ] {
        sqlx::query(query).bind(recipe.id).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    Ok(())
}

pub async fn list_recipe_tags(recipe_id: Id, pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.* FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_recipe_ingredients(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<IngredientInRecipe>, ApiError> {
    let rows: Vec<IngredientInRecipe> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, l.amount AS amount
        FROM recipe_ingredients l
        INNER JOIN ingredients i ON i.id = l.ingredient_id
        WHERE l.recipe_id = $1
        ORDER BY i.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Read projection of the aggregate: flat ids expanded into catalog rows,
/// `is_favorited` / `is_in_shopping_cart` computed relative to the viewer
/// (both false for anonymous viewers).
pub async fn build_recipe_details(
    recipe_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetails, ApiError> {
    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No recipe exists with specified id"))?;

    let tags = list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_ingredients(recipe.id, pool).await?;
    let author = get_user_profile(recipe.author_id, viewer, pool).await?;

    let (favorited, in_cart) = match viewer {
        Some(viewer_id) => (
            is_favorited(recipe.id, viewer_id, pool).await?,
            is_in_cart(recipe.id, viewer_id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetails {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited: favorited,
        is_in_shopping_cart: in_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
        pub_date: recipe.pub_date,
    })
}

/// Windowed listing ordered by publication date, newest first. Filters on
/// author (`"me"` resolves to the viewer), tag slugs and the viewer's
/// favorite/cart marks.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipePreview>, ApiError> {
    let author_id: Option<Id> = match filter.author.as_deref() {
        Some("me") => match viewer {
            Some(session) => Some(session.user_id),
            None => {
                return Err(ValidationError::new(
                    "author",
                    "Filtering by author \"me\" requires authentication",
                )
                .into())
            }
        },
        Some(raw) => Some(
            raw.parse()
                .map_err(|_| ValidationError::new("author", "Author must be an id or \"me\""))?,
        ),
        None => None,
    };

    // Mark filters are viewer-relative; an anonymous viewer has no marks.
    if (filter.is_favorited || filter.is_in_shopping_cart) && viewer.is_none() {
        return Ok(PageContext::no_rows());
    }

    let mut query = QueryBuilder::<Postgres>::new(
        "SELECT r.id, r.name, r.image, r.cooking_time, COUNT(*) OVER () AS count FROM recipes r WHERE TRUE",
    );
    if let Some(author_id) = author_id {
        query.push(" AND r.author_id = ").push_bind(author_id);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(session) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorite_marks f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM cart_marks c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(session.user_id)
                .push(")");
        }
    }
    query
        .push(" ORDER BY r.pub_date DESC LIMIT ")
        .push_bind(RECIPE_COUNT_PER_PAGE)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<RecipeListRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows: Vec<RecipePreview> = rows.into_iter().map(RecipePreview::from).collect();

    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

/// Write plan for the aggregate's link tables. Built from the form alone,
/// so an update replaces the stored sets wholesale instead of diffing
/// against them; line identity does not survive an update.
#[derive(Debug, PartialEq, Eq)]
struct LinkSets {
    tags: Vec<Id>,
    lines: Vec<(Id, i32)>,
}

impl LinkSets {
    /// Statements clearing the stored sets before the plan is inserted.
    const CLEAR_STATEMENTS: [&'static str; 2] = [
        "DELETE FROM recipe_tags WHERE recipe_id = $1",
        "DELETE FROM recipe_ingredients WHERE recipe_id = $1",
    ];

    fn from_form(form: &RecipeForm) -> Self {
        Self {
            tags: form.tags.clone(),
            lines: form
                .ingredients
                .iter()
                .map(|line| (line.id, line.amount))
                .collect(),
        }
    }

    async fn clear(
        recipe_id: Id,
        tx: &mut sqlx::Transaction<'_, Postgres>,
    ) -> Result<(), ApiError> {
        for statement in Self::CLEAR_STATEMENTS {
            sqlx::query(statement)
                .bind(recipe_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn insert(
        &self,
        recipe_id: Id,
        tx: &mut sqlx::Transaction<'_, Postgres>,
    ) -> Result<(), ApiError> {
        if !self.tags.is_empty() {
            let mut query =
                QueryBuilder::<Postgres>::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
            query.push_values(&self.tags, |mut builder, tag_id| {
                builder.push_bind(recipe_id).push_bind(tag_id);
            });
            query.build().execute(&mut **tx).await?;
        }

        if !self.lines.is_empty() {
            let mut query = QueryBuilder::<Postgres>::new(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
            );
            query.push_values(&self.lines, |mut builder, (ingredient_id, amount)| {
                builder
                    .push_bind(recipe_id)
                    .push_bind(ingredient_id)
                    .push_bind(amount);
            });
            query.build().execute(&mut **tx).await?;
        }

        Ok(())
    }
}

async fn ensure_tags_exist(tags: &[Id], pool: &Pool<Postgres>) -> Result<(), ApiError> {
    if tags.is_empty() {
        return Ok(());
    }

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tags)
        .fetch_all(pool)
        .await?;

    let missing: Vec<Id> = tags
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|(found_id,)| found_id == id))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No tags exist with ids: {}",
            join_ids(&missing)
        )));
    }
    Ok(())
}

async fn ensure_ingredients_exist(form: &RecipeForm, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let ids: Vec<Id> = form.ingredients.iter().map(|line| line.id).collect();
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(pool)
        .await?;

    let missing: Vec<Id> = ids
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|(found_id,)| found_id == id))
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No ingredients exist with ids: {}",
            join_ids(&missing)
        )));
    }
    Ok(())
}

fn join_ids(ids: &[Id]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits a `data:image/<format>;base64,<payload>` URL into the decoded
/// bytes and a file extension.
fn decode_image(data_url: &str) -> Result<(Vec<u8>, String), ValidationError> {
    let invalid = || ValidationError::new("image", "Image must be a base64-encoded data URL");

    let rest = data_url.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (format, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    if format.is_empty() || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    let bytes = BASE64.decode(payload).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    Ok((bytes, format.to_string()))
}

/// Writes the decoded image beneath the media root and returns its
/// relative path, which is what gets persisted.
fn store_image(data_url: &str, author_id: Id, config: &Config) -> Result<String, ApiError> {
    let (bytes, extension) = decode_image(data_url)?;

    let relative = format!(
        "recipes/{author_id}-{}.{extension}",
        Utc::now().timestamp_micros()
    );
    let target = config.media_root.join(&relative);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, bytes)?;

    Ok(relative)
}

/// Best-effort removal of a stored image that is no longer referenced.
fn remove_image(relative: &str, config: &Config) {
    let target = config.media_root.join(relative);
    if let Err(error) = fs::remove_file(&target) {
        warn!("Failed to remove replaced image {relative}: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::form::IngredientAmountForm;

    fn form_with_lines(lines: &[(Id, i32)]) -> RecipeForm {
        RecipeForm {
            name: String::from("Pancakes"),
            image: String::from("data:image/png;base64,aGVsbG8="),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            tags: vec![1],
            ingredients: lines
                .iter()
                .map(|&(id, amount)| IngredientAmountForm { id, amount })
                .collect(),
        }
    }

    #[test]
    fn update_replaces_lines_wholesale() {
        // Whatever lines are stored, the plan clears both link tables and
        // carries only what the form names.
        let sets = LinkSets::from_form(&form_with_lines(&[(3, 50)]));
        assert_eq!(sets.lines, vec![(3, 50)]);
        assert_eq!(sets.tags, vec![1]);
        assert!(LinkSets::CLEAR_STATEMENTS[0].contains("recipe_tags"));
        assert!(LinkSets::CLEAR_STATEMENTS[1].contains("recipe_ingredients"));
    }

    #[test]
    fn replaced_image_file_is_removed() {
        let media_root = std::env::temp_dir().join(format!(
            "tastebook-media-{}",
            Utc::now().timestamp_micros()
        ));
        let config = Config {
            database_url: String::new(),
            session_secret: String::new(),
            media_root: media_root.clone(),
        };
        let relative = "recipes/1-1.png";
        fs::create_dir_all(media_root.join("recipes")).unwrap();
        fs::write(media_root.join(relative), b"old").unwrap();

        remove_image(relative, &config);

        assert!(!media_root.join(relative).exists());
        fs::remove_dir_all(media_root).unwrap();
    }

    #[test]
    fn data_url_decodes() {
        let (bytes, extension) = decode_image("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(extension, "png");
    }

    #[test]
    fn bad_data_urls_rejected() {
        assert!(decode_image("aGVsbG8=").is_err());
        assert!(decode_image("data:image/png;base64,!!!").is_err());
        assert!(decode_image("data:image/;base64,aGVsbG8=").is_err());
        assert!(decode_image("data:image/png;base64,").is_err());
    }
}
