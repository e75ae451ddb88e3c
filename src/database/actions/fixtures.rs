//! Rows inserted straight into a migrated test database.

use sqlx::{Pool, Postgres};

use crate::{
    jwt::SessionData,
    schema::{Id, UserRole},
};

pub fn session(user_id: Id, role: UserRole) -> SessionData {
    SessionData { user_id, role }
}

pub async fn insert_user(pool: &Pool<Postgres>, username: &str) -> Id {
    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, 'Test', 'User', 'unused')
        RETURNING id
    ",
    )
    .bind(format!("{username}@example.com"))
    .bind(username)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

pub async fn insert_ingredient(pool: &Pool<Postgres>, name: &str, unit: &str) -> Id {
    let (id,): (Id,) =
        sqlx::query_as("INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(unit)
            .fetch_one(pool)
            .await
            .unwrap();
    id
}

pub async fn insert_tag(pool: &Pool<Postgres>, slug: &str, color: &str) -> Id {
    let (id,): (Id,) =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $1) RETURNING id")
            .bind(slug)
            .bind(color)
            .fetch_one(pool)
            .await
            .unwrap();
    id
}

/// Inserts a recipe with the given `(ingredient, amount)` parts and tags.
pub async fn insert_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    name: &str,
    parts: &[(Id, i32)],
    tags: &[Id],
) -> Id {
    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, 'data:image/png;base64,AAAA', 'Mix and serve.', 10)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();

    for (ingredient_id, amount) in parts {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(ingredient_id)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
    }
    for tag_id in tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2)")
            .bind(id)
            .bind(tag_id)
            .execute(pool)
            .await
            .unwrap();
    }
    id
}

pub async fn count_rows(pool: &Pool<Postgres>, table: &str, column: &str, id: Id) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE {column} = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap();
    count
}
