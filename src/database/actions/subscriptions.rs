use sqlx::{Pool, Postgres};

use crate::{
    constants::USER_COUNT_PER_PAGE,
    database::{
        error::{ApiError, ValidationError},
        pagination::PageContext,
        schema::{Id, RecipePreview, SubscribedAuthor, User, UserListRow},
    },
};

use super::{ensure_inserted, ensure_removed, get_user_by_id};

/// A user subscribing to themselves makes no sense; rejected before the
/// store is touched.
pub fn ensure_not_self(subscriber_id: Id, author_id: Id) -> Result<(), ValidationError> {
    if subscriber_id == author_id {
        return Err(ValidationError::new(
            "author",
            "You cannot subscribe to yourself",
        ));
    }
    Ok(())
}

pub async fn is_subscribed(
    author_id: Id,
    subscriber_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let row: Option<(Id,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE author_id = $1 AND subscriber_id = $2",
    )
    .bind(author_id)
    .bind(subscriber_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

pub async fn subscribe(
    subscriber_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, ApiError> {
    ensure_not_self(subscriber_id, author_id)?;

    let author = get_user_by_id(pool, author_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No user exists with specified id"))?;

    let result = sqlx::query(
        "INSERT INTO subscriptions (subscriber_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(subscriber_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    ensure_inserted(
        result.rows_affected(),
        "You are already subscribed to this author",
    )?;

    build_subscribed_author(&author, true, None, pool).await
}

pub async fn unsubscribe(
    subscriber_id: Id,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result =
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND author_id = $2")
            .bind(subscriber_id)
            .bind(author_id)
            .execute(pool)
            .await?;

    ensure_removed(
        result.rows_affected(),
        "You are not subscribed to this author",
    )
}

/// Paginated authors the user follows, each with a (possibly truncated)
/// recipe listing and the full recipe count.
pub async fn fetch_subscriptions(
    subscriber_id: Id,
    offset: i64,
    recipes_limit: Option<usize>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscribedAuthor>, ApiError> {
    let authors: Vec<UserListRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, COUNT(*) OVER () AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.subscriber_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(subscriber_id)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = authors.first().map(|row| row.count).unwrap_or(0);

    let mut rows: Vec<SubscribedAuthor> = Vec::with_capacity(authors.len());
    for author in &authors {
        rows.push(author_entry(author, recipes_limit, pool).await?);
    }

    Ok(PageContext::from_rows(
        rows,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}

async fn author_recipes(
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(Vec<RecipePreview>, i64), ApiError> {
    let recipes: Vec<RecipePreview> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time FROM recipes
        WHERE author_id = $1
        ORDER BY pub_date DESC
    ",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    let count = recipes.len() as i64;
    Ok((recipes, count))
}

async fn author_entry(
    author: &UserListRow,
    recipes_limit: Option<usize>,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, ApiError> {
    let (mut recipes, recipes_count) = author_recipes(author.id, pool).await?;
    if let Some(limit) = recipes_limit {
        recipes.truncate(limit);
    }

    Ok(SubscribedAuthor {
        email: author.email.clone(),
        id: author.id,
        username: author.username.clone(),
        first_name: author.first_name.clone(),
        last_name: author.last_name.clone(),
        is_subscribed: true,
        recipes,
        recipes_count,
    })
}

pub async fn build_subscribed_author(
    author: &User,
    subscribed: bool,
    recipes_limit: Option<usize>,
    pool: &Pool<Postgres>,
) -> Result<SubscribedAuthor, ApiError> {
    let (mut recipes, recipes_count) = author_recipes(author.id, pool).await?;
    if let Some(limit) = recipes_limit {
        recipes.truncate(limit);
    }

    Ok(SubscribedAuthor {
        email: author.email.clone(),
        id: author.id,
        username: author.username.clone(),
        first_name: author.first_name.clone(),
        last_name: author.last_name.clone(),
        is_subscribed: subscribed,
        recipes,
        recipes_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_subscription_rejected() {
        let error = ensure_not_self(3, 3).unwrap_err();
        assert_eq!(error.field, "author");
    }

    #[test]
    fn distinct_users_pass() {
        assert!(ensure_not_self(3, 4).is_ok());
    }
}
