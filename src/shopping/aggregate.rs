use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};

use crate::database::error::ApiError;
use crate::database::schema::{CartLine, Id, ShoppingListRow};

/// Every ingredient line of every recipe currently in the user's cart,
/// joined against the catalog. An empty cart yields an empty vector.
pub async fn fetch_cart_lines(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartLine>, ApiError> {
    let rows: Vec<CartLine> = sqlx::query_as(
        "
        SELECT i.name AS ingredient_name, i.measurement_unit AS measurement_unit, l.amount AS amount
        FROM cart_marks c
        INNER JOIN recipe_ingredients l ON l.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = l.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Groups lines by (name, measurement unit) and sums amounts. BTreeMap
/// keying keeps the output order deterministic. Duplicate catalog rows
/// with the same name and unit merge here.
pub fn aggregate_lines(lines: Vec<CartLine>) -> Vec<ShoppingListRow> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.ingredient_name, line.measurement_unit))
            .or_insert(0) += i64::from(line.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListRow {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

pub async fn shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListRow>, ApiError> {
    let lines = fetch_cart_lines(user_id, pool).await?;
    Ok(aggregate_lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, unit: &str, amount: i32) -> CartLine {
        CartLine {
            ingredient_name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn empty_cart_empty_list() {
        assert!(aggregate_lines(vec![]).is_empty());
    }

    #[test]
    fn sums_across_recipes_without_double_counting() {
        // Recipe A: flour 200 g. Recipe B: flour 100 g, salt 5 g.
        let rows = aggregate_lines(vec![
            line("flour", "g", 200),
            line("flour", "g", 100),
            line("salt", "g", 5),
        ]);

        assert_eq!(
            rows,
            vec![
                ShoppingListRow {
                    name: String::from("flour"),
                    measurement_unit: String::from("g"),
                    total_amount: 300,
                },
                ShoppingListRow {
                    name: String::from("salt"),
                    measurement_unit: String::from("g"),
                    total_amount: 5,
                },
            ]
        );
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let rows = aggregate_lines(vec![line("milk", "ml", 200), line("milk", "g", 50)]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].measurement_unit, "g");
        assert_eq!(rows[1].measurement_unit, "ml");
    }

    #[test]
    fn order_is_deterministic() {
        let a = aggregate_lines(vec![line("b", "g", 1), line("a", "g", 1)]);
        let b = aggregate_lines(vec![line("a", "g", 1), line("b", "g", 1)]);
        assert_eq!(a, b);
        assert_eq!(a[0].name, "a");
    }

    #[test]
    fn totals_widen_to_i64() {
        let rows = aggregate_lines(vec![line("rice", "g", i32::MAX), line("rice", "g", i32::MAX)]);
        assert_eq!(rows[0].total_amount, 2 * i64::from(i32::MAX));
    }
}
