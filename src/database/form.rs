use serde::Deserialize;
use serde_json::Value;

use crate::{
    constants::{
        MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MAX_USERNAME_LENGTH, MIN_INGREDIENTS_AMOUNT,
        MIN_RECIPE_COOKING_TIME, RESERVED_USERNAMES,
    },
    error::ValidationError,
    schema::Id,
};

fn join_ids(ids: &[Id]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ids that occur more than once, listed once each, in first-seen order.
fn duplicate_ids(ids: impl Iterator<Item = Id>) -> Vec<Id> {
    let mut seen: Vec<Id> = vec![];
    let mut duplicates: Vec<Id> = vec![];
    for id in ids {
        if seen.contains(&id) {
            if !duplicates.contains(&id) {
                duplicates.push(id);
            }
        } else {
            seen.push(id);
        }
    }
    duplicates
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountForm {
    pub id: Id,
    pub amount: i32,
}

/// Write shape of the recipe aggregate: flat tag ids and (ingredient id,
/// amount) lines. The read projection is assembled separately.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeForm {
    pub name: String,
    /// base64 data URL; decoded and stored on disk before persistence.
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmountForm>,
}

impl RecipeForm {
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value)
            .map_err(|e| ValidationError::new("request", format!("Malformed recipe form: {e}")))
    }

    /// Business rules, checked in a fixed order. The first failing rule
    /// class wins and reports every violation of that class.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cooking_time < MIN_RECIPE_COOKING_TIME {
            return Err(ValidationError::new(
                "cooking_time",
                format!("Cooking time must be at least {MIN_RECIPE_COOKING_TIME} minutes"),
            ));
        }

        let duplicate_tags = duplicate_ids(self.tags.iter().copied());
        if !duplicate_tags.is_empty() {
            return Err(ValidationError::new(
                "tags",
                format!("Duplicate tag ids: {}", join_ids(&duplicate_tags)),
            ));
        }

        let duplicate_ingredients = duplicate_ids(self.ingredients.iter().map(|line| line.id));
        if !duplicate_ingredients.is_empty() {
            return Err(ValidationError::new(
                "ingredients",
                format!(
                    "Duplicate ingredient ids: {}",
                    join_ids(&duplicate_ingredients)
                ),
            ));
        }

        let too_small: Vec<Id> = self
            .ingredients
            .iter()
            .filter(|line| line.amount < MIN_INGREDIENTS_AMOUNT)
            .map(|line| line.id)
            .collect();
        if !too_small.is_empty() {
            return Err(ValidationError::new(
                "ingredients",
                format!(
                    "Amount must be at least {MIN_INGREDIENTS_AMOUNT} for ingredients: {}",
                    join_ids(&too_small)
                ),
            ));
        }

        if self.name.trim().is_empty() || self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(ValidationError::new(
                "name",
                format!("Name must be 1..={MAX_NAME_LENGTH} characters"),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(ValidationError::new("text", "Description must not be empty"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserForm {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

impl UserForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        validate_username(&self.username)?;
        if self.password.is_empty() {
            return Err(ValidationError::new("password", "Password must not be empty"));
        }
        if self.first_name.chars().count() > MAX_USERNAME_LENGTH
            || self.last_name.chars().count() > MAX_USERNAME_LENGTH
        {
            return Err(ValidationError::new(
                "name",
                format!("Names are limited to {MAX_USERNAME_LENGTH} characters"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagForm {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() || self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(ValidationError::new(
                "name",
                format!("Name must be 1..={MAX_NAME_LENGTH} characters"),
            ));
        }
        validate_color(&self.color)?;
        validate_slug(&self.slug)?;
        Ok(())
    }
}

/// Recipe list filter; all fields optional. `author = "me"` resolves to
/// the requesting user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilter {
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_in_shopping_cart: bool,
}

/// Accepts `^[\w.@+-]+` in full, with reserved names rejected.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::new(
            "username",
            format!("Username must be 1..={MAX_USERNAME_LENGTH} characters"),
        ));
    }
    if RESERVED_USERNAMES.contains(&username) {
        return Err(ValidationError::new(
            "username",
            format!("Username \"{username}\" is reserved"),
        ));
    }
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !valid {
        return Err(ValidationError::new(
            "username",
            "Username may only contain letters, digits and . @ + - _",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::new(
            "email",
            format!("Email must be 1..={MAX_EMAIL_LENGTH} characters"),
        ));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };
    if !valid {
        return Err(ValidationError::new("email", "Invalid email address"));
    }
    Ok(())
}

/// Accepts `^[-a-zA-Z0-9_]+$`.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() || slug.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::new(
            "slug",
            format!("Slug must be 1..={MAX_NAME_LENGTH} characters"),
        ));
    }
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ValidationError::new(
            "slug",
            "Slug may only contain ASCII letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

/// Accepts `#RRGGBB`.
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::new(
            "color",
            "Color must be a #RRGGBB hex value",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RecipeForm {
        RecipeForm {
            name: String::from("Pancakes"),
            image: String::from("data:image/png;base64,aGVsbG8="),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmountForm { id: 1, amount: 200 },
                IngredientAmountForm { id: 2, amount: 2 },
            ],
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(form().validate().is_ok());
    }

    #[test]
    fn cooking_time_boundary() {
        let mut f = form();
        f.cooking_time = MIN_RECIPE_COOKING_TIME;
        assert!(f.validate().is_ok());

        f.cooking_time = MIN_RECIPE_COOKING_TIME - 1;
        let error = f.validate().unwrap_err();
        assert_eq!(error.field, "cooking_time");
    }

    #[test]
    fn duplicate_tags_rejected() {
        let mut f = form();
        f.tags = vec![1, 2, 1];
        let error = f.validate().unwrap_err();
        assert_eq!(error.field, "tags");
        assert!(error.message.contains('1'));
    }

    #[test]
    fn duplicate_ingredients_rejected() {
        let mut f = form();
        f.ingredients.push(IngredientAmountForm { id: 1, amount: 50 });
        let error = f.validate().unwrap_err();
        assert_eq!(error.field, "ingredients");
        assert!(error.message.contains("Duplicate"));
    }

    #[test]
    fn amount_boundary() {
        let mut f = form();
        f.ingredients[0].amount = MIN_INGREDIENTS_AMOUNT;
        assert!(f.validate().is_ok());

        f.ingredients[0].amount = MIN_INGREDIENTS_AMOUNT - 1;
        let error = f.validate().unwrap_err();
        assert_eq!(error.field, "ingredients");
        assert!(error.message.contains("at least"));
    }

    #[test]
    fn all_offending_amounts_reported() {
        let mut f = form();
        f.ingredients[0].amount = 0;
        f.ingredients[1].amount = 0;
        let error = f.validate().unwrap_err();
        assert!(error.message.contains("1, 2"));
    }

    #[test]
    fn rule_order_cooking_time_first() {
        let mut f = form();
        f.cooking_time = 0;
        f.tags = vec![3, 3];
        let error = f.validate().unwrap_err();
        assert_eq!(error.field, "cooking_time");
    }

    #[test]
    fn rule_order_tags_before_ingredients() {
        let mut f = form();
        f.tags = vec![3, 3];
        f.ingredients[0].amount = 0;
        let error = f.validate().unwrap_err();
        assert_eq!(error.field, "tags");
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("anna.karenina+1@host").is_ok());
        assert!(validate_username("me").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn slug_rules() {
        assert!(validate_slug("breakfast_2024").is_ok());
        assert!(validate_slug("bad slug").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn color_rules() {
        assert!(validate_color("#FF0000").is_ok());
        assert!(validate_color("FF0000").is_err());
        assert!(validate_color("#FF00").is_err());
        assert!(validate_color("#GG0000").is_err());
    }

    #[test]
    fn form_from_value() {
        let value = serde_json::json!({
            "name": "Toast",
            "image": "data:image/png;base64,aGVsbG8=",
            "text": "Toast the bread.",
            "cooking_time": 5,
            "tags": [1],
            "ingredients": [{"id": 7, "amount": 2}],
        });
        let f = RecipeForm::from_value(value).unwrap();
        assert_eq!(f.ingredients[0].id, 7);
        assert!(RecipeForm::from_value(serde_json::json!({"name": "x"})).is_err());
    }
}
