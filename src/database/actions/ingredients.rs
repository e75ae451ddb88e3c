use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{ActionError, QueryError},
    form::IngredientForm,
    schema::{Id, Ingredient},
};

pub async fn list_ingredients(pool: &Pool<Postgres>) -> Result<Vec<Ingredient>, ActionError> {
    let rows: Vec<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients ORDER BY name, measurement_unit")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_ingredient(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, ActionError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn create_ingredient(
    form: IngredientForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, ActionError> {
    session.authenticate(ActionType::ManageIngredients)?;
    form.validate()?;

    let row: Ingredient = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        RETURNING *
    ",
    )
    .bind(form.name)
    .bind(form.measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        ActionError::from_unique(
            QueryError::from(e),
            &[("unique_name_unit", "non_field_errors")],
            "An ingredient with this name and measurement unit already exists.",
        )
    })?;

    Ok(row)
}

pub async fn delete_ingredient(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    session.authenticate(ActionType::ManageIngredients)?;

    let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::not_found(
            "No ingredient exists with specified id",
        ));
    }
    Ok(())
}
