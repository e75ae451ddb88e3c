use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{ActionError, QueryError},
    form::TagForm,
    schema::{Id, Tag},
};

const TAG_CONSTRAINTS: &[(&str, &str)] = &[
    ("tags_name_key", "name"),
    ("tags_color_key", "color"),
    ("tags_slug_key", "slug"),
];

pub async fn create_tag(
    form: TagForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Tag, ActionError> {
    session.authenticate(ActionType::ManageTags)?;
    form.validate()?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(form.name)
    .bind(form.color)
    .bind(form.slug)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        ActionError::from_unique(
            QueryError::from(e),
            TAG_CONSTRAINTS,
            "A tag with that value already exists.",
        )
    })?;

    Ok(tag)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, ActionError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ActionError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn update_tag(
    id: Id,
    form: TagForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Tag, ActionError> {
    session.authenticate(ActionType::ManageTags)?;
    form.validate()?;

    let tag: Option<Tag> = sqlx::query_as(
        "UPDATE tags SET name = $1, color = $2, slug = $3 WHERE id = $4 RETURNING *",
    )
    .bind(form.name)
    .bind(form.color)
    .bind(form.slug)
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        ActionError::from_unique(
            QueryError::from(e),
            TAG_CONSTRAINTS,
            "A tag with that value already exists.",
        )
    })?;

    tag.ok_or_else(|| ActionError::not_found("No tag exists with specified id"))
}

pub async fn delete_tag(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    session.authenticate(ActionType::ManageTags)?;

    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::not_found("No tag exists with specified id"));
    }
    Ok(())
}
