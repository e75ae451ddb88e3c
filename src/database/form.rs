use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;

use super::{error::ActionError, schema::Id};
use crate::constants::{
    COLOR_MAX_LENGTH, EMAIL_MAX_LENGTH, EMAIL_PATTERN, HEX_COLOR_PATTERN, NAME_MAX_LENGTH,
    PASSWORD_MIN_LENGTH, SLUG_PATTERN, USERNAME_PATTERN, USER_NAME_MAX_LENGTH,
};

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(HEX_COLOR_PATTERN).expect("hex color regex is valid"));
static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SLUG_PATTERN).expect("slug regex is valid"));
static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(USERNAME_PATTERN).expect("username regex is valid"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email regex is valid"));

fn required(field: &str, value: &str, max_length: usize) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        return Err(ActionError::validation(field, "This field may not be blank."));
    }
    if value.chars().count() > max_length {
        return Err(ActionError::validation(
            field,
            &format!("Ensure this field has no more than {max_length} characters."),
        ));
    }
    Ok(())
}

fn positive(field: &str, value: i64) -> Result<i32, ActionError> {
    if value < 1 {
        return Err(ActionError::validation(
            field,
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    i32::try_from(value).map_err(|_| ActionError::validation(field, "Value is too large."))
}

pub fn validate_color(color: &str) -> Result<(), ActionError> {
    required("color", color, COLOR_MAX_LENGTH)?;
    if !HEX_COLOR.is_match(color) {
        return Err(ActionError::validation(
            "color",
            "Color does not match the HEX format.",
        ));
    }
    Ok(())
}

/// Reports failures against `field`, which differs between registration and password changes.
pub fn validate_password(
    field: &str,
    password: &str,
    username: &str,
    email: &str,
) -> Result<(), ActionError> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(ActionError::validation(
            field,
            &format!(
                "This password is too short. It must contain at least {PASSWORD_MIN_LENGTH} characters."
            ),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(ActionError::validation(
            field,
            "This password is entirely numeric.",
        ));
    }

    let lowered = password.to_lowercase();
    let local_part = email.split('@').next().unwrap_or_default().to_lowercase();
    if lowered == username.to_lowercase() || (!local_part.is_empty() && lowered == local_part) {
        return Err(ActionError::validation(
            field,
            "The password is too similar to the user data.",
        ));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ActionError> {
        required("email", &self.email, EMAIL_MAX_LENGTH)?;
        if !EMAIL.is_match(&self.email) {
            return Err(ActionError::validation(
                "email",
                "Enter a valid email address.",
            ));
        }

        required("username", &self.username, USER_NAME_MAX_LENGTH)?;
        if !USERNAME.is_match(&self.username) {
            return Err(ActionError::validation(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            ));
        }

        required("first_name", &self.first_name, USER_NAME_MAX_LENGTH)?;
        required("last_name", &self.last_name, USER_NAME_MAX_LENGTH)?;
        validate_password("password", &self.password, &self.username, &self.email)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetPasswordForm {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SubscriptionQuery {
    pub recipes_limit: Option<i64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TagForm {
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl TagForm {
    pub fn validate(&self) -> Result<(), ActionError> {
        required("name", &self.name, NAME_MAX_LENGTH)?;
        validate_color(&self.color)?;
        required("slug", &self.slug, NAME_MAX_LENGTH)?;
        if !SLUG.is_match(&self.slug) {
            return Err(ActionError::validation(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientForm {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientForm {
    pub fn validate(&self) -> Result<(), ActionError> {
        required("name", &self.name, NAME_MAX_LENGTH)?;
        required("measurement_unit", &self.measurement_unit, NAME_MAX_LENGTH)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientAmountForm {
    pub id: Id,
    pub amount: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RecipeForm {
    pub ingredients: Vec<IngredientAmountForm>,
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

/// A recipe payload that passed validation; ids are still unchecked against the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecipe {
    pub ingredients: Vec<(Id, i32)>,
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeForm {
    /// `require_image` is set on creation; updates may keep the stored image.
    pub fn validate(self, require_image: bool) -> Result<ValidRecipe, ActionError> {
        required("name", &self.name, NAME_MAX_LENGTH)?;
        if self.text.trim().is_empty() {
            return Err(ActionError::validation(
                "text",
                "This field may not be blank.",
            ));
        }
        let cooking_time = positive("cooking_time", self.cooking_time)?;

        let image = match self.image {
            Some(image) if image.trim().is_empty() => {
                return Err(ActionError::validation(
                    "image",
                    "This field may not be blank.",
                ))
            }
            Some(image) => Some(image),
            None if require_image => {
                return Err(ActionError::validation("image", "This field is required."))
            }
            None => None,
        };

        if self.ingredients.is_empty() {
            return Err(ActionError::validation(
                "ingredients",
                "A recipe needs at least one ingredient.",
            ));
        }
        let mut seen = HashSet::new();
        let mut ingredients = Vec::with_capacity(self.ingredients.len());
        for part in self.ingredients {
            if !seen.insert(part.id) {
                return Err(ActionError::validation(
                    "ingredients",
                    "Ingredients must not repeat.",
                ));
            }
            ingredients.push((part.id, positive("amount", part.amount)?));
        }

        if self.tags.is_empty() {
            return Err(ActionError::validation(
                "tags",
                "A recipe needs at least one tag.",
            ));
        }
        let mut seen = HashSet::new();
        if !self.tags.iter().all(|tag| seen.insert(*tag)) {
            return Err(ActionError::validation("tags", "Tags must not repeat."));
        }

        Ok(ValidRecipe {
            ingredients,
            tags: self.tags,
            image,
            name: self.name,
            text: self.text,
            cooking_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe_form() -> RecipeForm {
        RecipeForm {
            ingredients: vec![
                IngredientAmountForm { id: 1, amount: 100 },
                IngredientAmountForm { id: 2, amount: 3 },
            ],
            tags: vec![1, 2],
            image: Some(String::from("data:image/png;base64,iVBORw0KGgo=")),
            name: String::from("Pancakes"),
            text: String::from("Mix and fry."),
            cooking_time: 20,
        }
    }

    fn field_of(error: ActionError) -> String {
        match error {
            ActionError::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn hex_colors() {
        for color in ["#fff", "#FFFFFF", "#a1B2c3", "#000"] {
            assert!(validate_color(color).is_ok(), "{color} should be accepted");
        }
        for color in ["fff", "#ffff", "#gggggg", "#12345", "", "#1234567"] {
            assert!(validate_color(color).is_err(), "{color} should be rejected");
        }
    }

    #[test]
    fn tag_slug_must_be_slug() {
        let form = TagForm {
            name: String::from("Breakfast"),
            color: String::from("#E26C2D"),
            slug: String::from("break fast"),
        };

        assert_eq!(field_of(form.validate().unwrap_err()), "slug");
    }

    #[test]
    fn valid_recipe_passes() {
        let recipe = recipe_form().validate(true).unwrap();

        assert_eq!(recipe.ingredients, vec![(1, 100), (2, 3)]);
        assert_eq!(recipe.cooking_time, 20);
    }

    #[test]
    fn amounts_and_cooking_time_are_positive() {
        let mut form = recipe_form();
        form.ingredients[1].amount = 0;
        assert_eq!(field_of(form.validate(true).unwrap_err()), "amount");

        let mut form = recipe_form();
        form.cooking_time = 0;
        assert_eq!(field_of(form.validate(true).unwrap_err()), "cooking_time");
    }

    #[test]
    fn repeated_ingredients_and_tags_are_rejected() {
        let mut form = recipe_form();
        form.ingredients[1].id = 1;
        assert_eq!(field_of(form.validate(true).unwrap_err()), "ingredients");

        let mut form = recipe_form();
        form.tags = vec![3, 3];
        assert_eq!(field_of(form.validate(true).unwrap_err()), "tags");
    }

    #[test]
    fn image_is_required_only_on_create() {
        let mut form = recipe_form();
        form.image = None;
        assert_eq!(field_of(form.clone().validate(true).unwrap_err()), "image");
        assert_eq!(form.validate(false).unwrap().image, None);
    }

    #[test]
    fn passwords() {
        assert!(validate_password("password", "s3cretpass", "cook", "cook@example.com").is_ok());
        assert!(validate_password("password", "short", "cook", "cook@example.com").is_err());
        assert!(validate_password("password", "1234567890", "cook", "cook@example.com").is_err());
        assert!(validate_password("password", "chefcooker", "chefcooker", "x@e.com").is_err());

        let error = validate_password("new_password", "cook@x", "c", "cook@x.com").unwrap_err();
        assert_eq!(field_of(error), "new_password");
    }

    #[test]
    fn registration_checks_email_shape() {
        let form = RegistrationForm {
            email: String::from("not-an-email"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Baker"),
            password: String::from("s3cretpass"),
        };

        assert_eq!(field_of(form.validate().unwrap_err()), "email");
    }
}
