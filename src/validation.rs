use std::collections::BTreeSet;

use thiserror::Error;

use crate::constants::{COMMON_PASSWORDS, MIN_PASSWORD_LENGTH};
use crate::schema::{NewRecipe, Uuid};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username contains forbidden character(s): {0}")]
    UsernameCharacters(String),
    #[error("password is too weak: {}", .0.join("; "))]
    WeakPassword(Vec<String>),
    #[error("recipe must have at least one tag")]
    EmptyTagList,
    #[error("tag {0} is listed more than once")]
    DuplicateTag(Uuid),
    #[error("recipe must have at least one ingredient")]
    EmptyIngredientList,
    #[error("amount {amount} for ingredient {ingredient} must be greater than zero")]
    NonPositiveAmount { ingredient: Uuid, amount: i32 },
    #[error("ingredient {0} is listed more than once")]
    DuplicateIngredient(Uuid),
    #[error("cooking time must be at least one minute")]
    CookingTimeTooShort,
}

fn is_legal_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

/// Rejects any character outside `[A-Za-z0-9_.@+-]` and reports the
/// offending characters, deduplicated.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    let forbidden: BTreeSet<char> = value
        .chars()
        .filter(|c| !is_legal_username_char(*c))
        .collect();

    if forbidden.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::UsernameCharacters(
            forbidden.into_iter().collect(),
        ))
    }
}

fn too_similar(password: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }
    let password = password.to_lowercase();
    let username = username.to_lowercase();
    password.contains(&username) || username.contains(&password)
}

/// Runs the full strength-rule chain and aggregates every failing rule
/// into one error instead of failing fast.
pub fn validate_password(password: &str, username: &str) -> Result<(), ValidationError> {
    let mut failures = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        failures.push(format!(
            "must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        failures.push(String::from("cannot be entirely numeric"));
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        failures.push(String::from("is too common"));
    }
    if too_similar(password, username) {
        failures.push(String::from("is too similar to the username"));
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword(failures))
    }
}

/// Business rules for a candidate recipe payload. The associations are
/// checked here; referential existence is checked against the store.
pub fn validate_recipe(recipe: &NewRecipe) -> Result<(), ValidationError> {
    if recipe.cooking_time < 1 {
        return Err(ValidationError::CookingTimeTooShort);
    }

    if recipe.tags.is_empty() {
        return Err(ValidationError::EmptyTagList);
    }
    let mut seen_tags = BTreeSet::new();
    for tag in &recipe.tags {
        if !seen_tags.insert(*tag) {
            return Err(ValidationError::DuplicateTag(*tag));
        }
    }

    if recipe.ingredients.is_empty() {
        return Err(ValidationError::EmptyIngredientList);
    }
    let mut seen_ingredients = BTreeSet::new();
    for ingredient in &recipe.ingredients {
        if ingredient.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount {
                ingredient: ingredient.id,
                amount: ingredient.amount,
            });
        }
        if !seen_ingredients.insert(ingredient.id) {
            return Err(ValidationError::DuplicateIngredient(ingredient.id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NewRecipeIngredient;

    fn payload() -> NewRecipe {
        NewRecipe {
            name: String::from("Pancakes"),
            image: String::from("data:image/png;base64,xyz"),
            text: String::from("Mix and fry."),
            cooking_time: 15,
            tags: vec![1],
            ingredients: vec![NewRecipeIngredient { id: 5, amount: 2 }],
        }
    }

    #[test]
    fn accepts_valid_username() {
        assert!(validate_username("user.name_01+tag@host-x").is_ok());
    }

    #[test]
    fn reports_forbidden_username_characters() {
        let err = validate_username("an na!?").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UsernameCharacters(String::from(" !?"))
        );
    }

    #[test]
    fn aggregates_all_failing_password_rules() {
        let err = validate_password("1234", "1234").unwrap_err();
        match err {
            ValidationError::WeakPassword(failures) => assert_eq!(failures.len(), 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_common_password() {
        assert!(matches!(
            validate_password("qwertyuiop", "alice"),
            Err(ValidationError::WeakPassword(_))
        ));
        assert!(validate_password("rather-0bscure", "alice").is_ok());
    }

    #[test]
    fn accepts_valid_recipe() {
        assert!(validate_recipe(&payload()).is_ok());
    }

    #[test]
    fn rejects_zero_cooking_time() {
        let mut recipe = payload();
        recipe.cooking_time = 0;
        assert_eq!(
            validate_recipe(&recipe),
            Err(ValidationError::CookingTimeTooShort)
        );
    }

    #[test]
    fn rejects_empty_and_duplicate_tags() {
        let mut recipe = payload();
        recipe.tags = vec![];
        assert_eq!(validate_recipe(&recipe), Err(ValidationError::EmptyTagList));

        recipe.tags = vec![1, 2, 1];
        assert_eq!(
            validate_recipe(&recipe),
            Err(ValidationError::DuplicateTag(1))
        );
    }

    #[test]
    fn rejects_empty_and_duplicate_ingredients() {
        let mut recipe = payload();
        recipe.ingredients = vec![];
        assert_eq!(
            validate_recipe(&recipe),
            Err(ValidationError::EmptyIngredientList)
        );

        recipe.ingredients = vec![
            NewRecipeIngredient { id: 5, amount: 2 },
            NewRecipeIngredient { id: 5, amount: 3 },
        ];
        assert_eq!(
            validate_recipe(&recipe),
            Err(ValidationError::DuplicateIngredient(5))
        );
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut recipe = payload();
        recipe.ingredients = vec![NewRecipeIngredient { id: 5, amount: 0 }];
        assert_eq!(
            validate_recipe(&recipe),
            Err(ValidationError::NonPositiveAmount {
                ingredient: 5,
                amount: 0
            })
        );
    }
}
