use std::collections::HashMap;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{ActionError, QueryError},
    form::{RecipeForm, ValidRecipe},
    schema::{
        Id, LinkedRecipeIngredient, LinkedRecipeTag, Recipe, RecipeRow, RecipeShort, UserProfile,
    },
};

use super::users::PROFILE_COLUMNS;

/// Recipe columns of `recipes r`; `$1` is the viewing user's id, or NULL for anonymous viewers.
const RECIPE_COLUMNS: &str = "
    r.id, r.author_id, r.name, r.image, r.text, r.cooking_time,
    EXISTS(SELECT 1 FROM favorite_recipes f WHERE f.user_id = $1 AND f.recipe_id = r.id) AS is_favorited,
    EXISTS(SELECT 1 FROM shopping_cart c WHERE c.user_id = $1 AND c.recipe_id = r.id) AS is_in_shopping_cart
";

const RECIPE_CONSTRAINTS: &[(&str, &str)] = &[("recipes_name_key", "name")];

/// Joins recipe rows with their author profiles, tags and ingredient amounts, keeping row order.
pub fn assemble_recipes(
    rows: Vec<RecipeRow>,
    authors: Vec<UserProfile>,
    tags: Vec<LinkedRecipeTag>,
    ingredients: Vec<LinkedRecipeIngredient>,
) -> Result<Vec<Recipe>, ActionError> {
    let authors: HashMap<Id, UserProfile> = authors
        .into_iter()
        .map(|author| (author.id, author))
        .collect();

    let mut tag_map: HashMap<Id, Vec<_>> = HashMap::new();
    tags.into_iter().for_each(|row| {
        tag_map.entry(row.recipe_id).or_default().push(row.tag);
    });

    let mut ingredient_map: HashMap<Id, Vec<_>> = HashMap::new();
    ingredients.into_iter().for_each(|row| {
        ingredient_map
            .entry(row.recipe_id)
            .or_default()
            .push(row.ingredient);
    });

    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned().ok_or_else(|| {
                ActionError::Internal(format!("Recipe {} has no author", row.id))
            })?;
            let tags = tag_map.remove(&row.id).unwrap_or_default();
            let ingredients = ingredient_map.remove(&row.id).unwrap_or_default();

            Ok(Recipe::from_row(row, author, tags, ingredients))
        })
        .collect()
}

async fn hydrate_recipes(
    rows: Vec<RecipeRow>,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ActionError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut author_ids: Vec<Id> = rows.iter().map(|row| row.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors: Vec<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ANY($2)"))
            .bind(viewer)
            .bind(&author_ids)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    let tags: Vec<LinkedRecipeTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let ingredients: Vec<LinkedRecipeIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    assemble_recipes(rows, authors, tags, ingredients)
}

pub async fn list_recipes(
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ActionError> {
    let rows: Vec<RecipeRow> =
        sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r ORDER BY r.id DESC"))
            .bind(viewer)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    hydrate_recipes(rows, viewer, pool).await
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ActionError> {
    let row: Option<RecipeRow> =
        sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $2"))
            .bind(viewer)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(hydrate_recipes(vec![row], viewer, pool).await?.pop()),
        None => Ok(None),
    }
}

pub async fn get_recipe_short(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeShort>, ActionError> {
    let row: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

/// Fails unless the session may change the recipe: its author, or anyone allowed to manage all recipes.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    let author: Option<(Id,)> = sqlx::query_as("SELECT author_id FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match author {
        Some((author_id,)) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(()),
            Err(_) if author_id == session.user_id => Ok(()),
            Err(e) => Err(e),
        },
        None => Err(ActionError::not_found("No recipe exists with specified id")),
    }
}

async fn check_references(recipe: &ValidRecipe, conn: &mut PgConnection) -> Result<(), ActionError> {
    let (tag_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(&recipe.tags)
        .fetch_one(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    if tag_count != recipe.tags.len() as i64 {
        return Err(ActionError::validation(
            "tags",
            "Invalid pk - object does not exist.",
        ));
    }

    let ingredient_ids: Vec<Id> = recipe.ingredients.iter().map(|(id, _)| *id).collect();
    let (ingredient_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM ingredients WHERE id = ANY($1)")
            .bind(&ingredient_ids)
            .fetch_one(&mut *conn)
            .await
            .map_err(QueryError::from)?;
    if ingredient_count != ingredient_ids.len() as i64 {
        return Err(ActionError::validation(
            "ingredients",
            "Invalid pk - object does not exist.",
        ));
    }

    Ok(())
}

/// Replaces the recipe's tag links and ingredient amounts.
async fn write_recipe_links(
    recipe_id: Id,
    recipe: &ValidRecipe,
    conn: &mut PgConnection,
) -> Result<(), ActionError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let mut tags: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    tags.push_values(recipe.tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });
    tags.build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let mut ingredients: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    ingredients.push_values(recipe.ingredients.iter(), |mut b, (ingredient_id, amount)| {
        b.push_bind(recipe_id)
            .push_bind(*ingredient_id)
            .push_bind(*amount);
    });
    ingredients
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn create_recipe(
    form: RecipeForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ActionError> {
    session.authenticate(ActionType::CreateRecipes)?;
    let recipe = form.validate(true)?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    check_references(&recipe, &mut tx).await?;

    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&recipe.name)
    .bind(&recipe.image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        ActionError::from_unique(
            QueryError::from(e),
            RECIPE_CONSTRAINTS,
            "A recipe with this name already exists.",
        )
    })?;

    write_recipe_links(id, &recipe, &mut tx).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::info!("> User {} created recipe {id}", session.user_id);
    get_recipe(id, Some(session.user_id), pool)
        .await?
        .ok_or_else(|| ActionError::not_found("No recipe exists with specified id"))
}

pub async fn update_recipe(
    id: Id,
    form: RecipeForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ActionError> {
    get_recipe_mut(id, session, pool).await?;
    let recipe = form.validate(false)?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    check_references(&recipe, &mut tx).await?;

    let result = sqlx::query(
        "
        UPDATE recipes SET
        name = $1,
        text = $2,
        cooking_time = $3,
        image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(&recipe.image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        ActionError::from_unique(
            QueryError::from(e),
            RECIPE_CONSTRAINTS,
            "A recipe with this name already exists.",
        )
    })?;
    if result.rows_affected() == 0 {
        return Err(ActionError::not_found("No recipe exists with specified id"));
    }

    write_recipe_links(id, &recipe, &mut tx).await?;
    tx.commit().await.map_err(QueryError::from)?;

    get_recipe(id, Some(session.user_id), pool)
        .await?
        .ok_or_else(|| ActionError::not_found("No recipe exists with specified id"))
}

pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("> User {} deleted recipe {id}", session.user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::actions::{
            add_to_favorites, add_to_shopping_cart,
            fixtures::{count_rows, insert_ingredient, insert_recipe, insert_tag, insert_user, session},
        },
        form::IngredientAmountForm,
        schema::{RecipeIngredient, Tag, UserRole},
    };

    fn row(id: Id, author_id: Id) -> RecipeRow {
        RecipeRow {
            id,
            author_id,
            name: format!("Recipe {id}"),
            image: format!("recipes/images/{id}.png"),
            text: String::from("Mix and bake."),
            cooking_time: 30,
            is_favorited: id == 2,
            is_in_shopping_cart: false,
        }
    }

    fn author(id: Id) -> UserProfile {
        UserProfile {
            email: format!("user{id}@example.com"),
            id,
            username: format!("user{id}"),
            first_name: String::from("Ada"),
            last_name: String::from("Baker"),
            is_subscribed: false,
        }
    }

    fn tag(recipe_id: Id, id: Id) -> LinkedRecipeTag {
        LinkedRecipeTag {
            recipe_id,
            tag: Tag {
                id,
                name: format!("Tag {id}"),
                color: String::from("#E26C2D"),
                slug: format!("tag-{id}"),
            },
        }
    }

    fn part(recipe_id: Id, id: Id, amount: i32) -> LinkedRecipeIngredient {
        LinkedRecipeIngredient {
            recipe_id,
            ingredient: RecipeIngredient {
                id,
                name: format!("Ingredient {id}"),
                measurement_unit: String::from("g"),
                amount,
            },
        }
    }

    #[test]
    fn recipes_collect_their_own_links() {
        let recipes = assemble_recipes(
            vec![row(2, 1), row(1, 5)],
            vec![author(1), author(5)],
            vec![tag(1, 3), tag(2, 3), tag(2, 4)],
            vec![part(2, 7, 100), part(1, 8, 2)],
        )
        .unwrap();

        assert_eq!(recipes[0].id, 2);
        assert!(recipes[0].is_favorited);
        assert_eq!(recipes[0].author.id, 1);
        assert_eq!(recipes[0].tags.len(), 2);
        assert_eq!(recipes[0].ingredients[0].amount, 100);

        assert_eq!(recipes[1].author.id, 5);
        assert_eq!(recipes[1].tags[0].id, 3);
        assert_eq!(recipes[1].ingredients[0].id, 8);
    }

    #[test]
    fn recipe_without_author_is_an_error() {
        let result = assemble_recipes(vec![row(1, 9)], vec![author(1)], vec![], vec![]);

        assert!(matches!(result, Err(ActionError::Internal(_))));
    }

    #[test]
    fn recipe_serializes_with_nested_author() {
        let recipe = assemble_recipes(vec![row(1, 1)], vec![author(1)], vec![], vec![part(1, 7, 5)])
            .unwrap()
            .pop()
            .unwrap();
        let value = serde_json::to_value(&recipe).unwrap();

        assert_eq!(value["author"]["username"], "user1");
        assert_eq!(value["ingredients"][0]["measurement_unit"], "g");
        assert_eq!(value["is_in_shopping_cart"], false);
        assert_eq!(value["cooking_time"], 30);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn created_recipe_is_hydrated_for_its_author(pool: Pool<Postgres>) {
        let author = insert_user(&pool, "author").await;
        let sugar = insert_ingredient(&pool, "sugar", "g").await;
        let breakfast = insert_tag(&pool, "breakfast", "#E26C2D").await;

        let form = RecipeForm {
            ingredients: vec![IngredientAmountForm { id: sugar, amount: 40 }],
            tags: vec![breakfast],
            image: Some(String::from("data:image/png;base64,AAAA")),
            name: String::from("Porridge"),
            text: String::from("Boil oats."),
            cooking_time: 15,
        };
        let recipe = create_recipe(form, &session(author, UserRole::User), &pool)
            .await
            .unwrap();

        assert_eq!(recipe.author.id, author);
        assert_eq!(recipe.tags.len(), 1);
        assert_eq!(recipe.ingredients[0].amount, 40);
        assert!(!recipe.is_favorited);
        assert!(!recipe.is_in_shopping_cart);
    }

    #[sqlx::test]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn deleting_a_recipe_cascades_to_its_links(pool: Pool<Postgres>) {
        let author = insert_user(&pool, "author").await;
        let fan = insert_user(&pool, "fan").await;
        let sugar = insert_ingredient(&pool, "sugar", "g").await;
        let sweet = insert_tag(&pool, "sweet", "#FF00AA").await;
        let recipe = insert_recipe(&pool, author, "Jam", &[(sugar, 100)], &[sweet]).await;

        add_to_favorites(recipe, fan, &pool).await.unwrap();
        add_to_shopping_cart(recipe, fan, &pool).await.unwrap();

        assert!(matches!(
            delete_recipe(recipe, &session(fan, UserRole::User), &pool).await,
            Err(ActionError::Forbidden)
        ));
        delete_recipe(recipe, &session(author, UserRole::User), &pool)
            .await
            .unwrap();

        for table in ["favorite_recipes", "shopping_cart", "recipe_ingredients", "recipe_tags"] {
            assert_eq!(count_rows(&pool, table, "recipe_id", recipe).await, 0, "{table}");
        }
        assert_eq!(count_rows(&pool, "ingredients", "id", sugar).await, 1);
        assert_eq!(count_rows(&pool, "tags", "id", sweet).await, 1);
    }
}
