use sqlx::{Pool, Postgres, QueryBuilder};

use crate::database::{
    error::ApiError,
    schema::{Id, Ingredient},
};

/// Catalog search. A prefix filters case-insensitively on the name, the
/// way the ingredient picker queries it.
pub async fn list_ingredients(
    name_prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = match name_prefix {
        Some(prefix) => {
            sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 || '%' ORDER BY name")
                .bind(prefix)
                .fetch_all(pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
                .fetch_all(pool)
                .await?
        }
    };

    Ok(rows)
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Seeding entry point for the (external) CSV importer. Rows are
/// (name, measurement_unit); no de-duplication is attempted.
pub async fn bulk_insert_ingredients(
    rows: &[(String, String)],
    pool: &Pool<Postgres>,
) -> Result<u64, ApiError> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut query =
        QueryBuilder::<Postgres>::new("INSERT INTO ingredients (name, measurement_unit) ");
    query.push_values(rows, |mut builder, (name, unit)| {
        builder.push_bind(name).push_bind(unit);
    });

    let result = query.build().execute(pool).await?;
    Ok(result.rows_affected())
}
