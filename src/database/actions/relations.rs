use std::future::Future;

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{ActionError, QueryError, QueryErrorKind},
    schema::{Id, RecipeShort, Subscription},
};

use super::{get_recipe_short, get_subscription};

/// A unique (user, target) link a user can add or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Favorite,
    ShoppingCart,
    Follow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Add,
    Remove,
}

impl Relation {
    fn table(self) -> &'static str {
        match self {
            Relation::Favorite => "favorite_recipes",
            Relation::ShoppingCart => "shopping_cart",
            Relation::Follow => "follows",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            Relation::Favorite | Relation::ShoppingCart => "recipe_id",
            Relation::Follow => "author_id",
        }
    }

    fn target_table(self) -> &'static str {
        match self {
            Relation::Favorite | Relation::ShoppingCart => "recipes",
            Relation::Follow => "users",
        }
    }

    fn missing_target(self) -> ActionError {
        match self {
            Relation::Favorite | Relation::ShoppingCart => {
                ActionError::not_found("No recipe exists with specified id")
            }
            Relation::Follow => ActionError::not_found("No user exists with specified id"),
        }
    }

    fn already_linked(self) -> ActionError {
        match self {
            Relation::Favorite => ActionError::conflict("Recipe is already in favorites"),
            Relation::ShoppingCart => {
                ActionError::conflict("Recipe is already in the shopping cart")
            }
            Relation::Follow => ActionError::conflict("You are already subscribed to this author"),
        }
    }

    fn not_linked(self) -> ActionError {
        match self {
            Relation::Favorite => ActionError::conflict("Recipe is not in favorites"),
            Relation::ShoppingCart => ActionError::conflict("Recipe is not in the shopping cart"),
            Relation::Follow => ActionError::conflict("You are not subscribed to this author"),
        }
    }
}

/// Storage for relation links. Implementations must make `insert_link` atomic with respect to
/// the (user, target) uniqueness of a relation.
pub trait LinkStore {
    fn target_exists(
        &mut self,
        relation: Relation,
        target_id: Id,
    ) -> impl Future<Output = Result<bool, ActionError>> + Send;

    /// Resolves to `false` when the link was already present.
    fn insert_link(
        &mut self,
        relation: Relation,
        user_id: Id,
        target_id: Id,
    ) -> impl Future<Output = Result<bool, ActionError>> + Send;

    /// Resolves to `false` when there was no link to delete.
    fn delete_link(
        &mut self,
        relation: Relation,
        user_id: Id,
        target_id: Id,
    ) -> impl Future<Output = Result<bool, ActionError>> + Send;
}

fn check_self_reference(relation: Relation, user_id: Id, target_id: Id) -> Result<(), ActionError> {
    if relation == Relation::Follow && user_id == target_id {
        return Err(ActionError::InvalidSelfReference);
    }
    Ok(())
}

pub async fn add_link<S: LinkStore>(
    store: &mut S,
    relation: Relation,
    user_id: Id,
    target_id: Id,
) -> Result<(), ActionError> {
    check_self_reference(relation, user_id, target_id)?;

    if !store.target_exists(relation, target_id).await? {
        return Err(relation.missing_target());
    }
    if !store.insert_link(relation, user_id, target_id).await? {
        return Err(relation.already_linked());
    }

    log::info!("> User {user_id} added {relation:?} link to {target_id}");
    Ok(())
}

pub async fn remove_link<S: LinkStore>(
    store: &mut S,
    relation: Relation,
    user_id: Id,
    target_id: Id,
) -> Result<(), ActionError> {
    check_self_reference(relation, user_id, target_id)?;

    if !store.target_exists(relation, target_id).await? {
        return Err(relation.missing_target());
    }
    if !store.delete_link(relation, user_id, target_id).await? {
        return Err(relation.not_linked());
    }

    log::info!("> User {user_id} removed {relation:?} link to {target_id}");
    Ok(())
}

impl LinkStore for PgConnection {
    async fn target_exists(
        &mut self,
        relation: Relation,
        target_id: Id,
    ) -> Result<bool, ActionError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
            relation.target_table()
        );
        let row: (bool,) = sqlx::query_as(&sql)
            .bind(target_id)
            .fetch_one(&mut *self)
            .await
            .map_err(QueryError::from)?;

        Ok(row.0)
    }

    async fn insert_link(
        &mut self,
        relation: Relation,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, ActionError> {
        // the unique constraint settles concurrent inserts of the same pair
        let sql = format!(
            "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            relation.table(),
            relation.target_column()
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *self)
            .await
            .map_err(QueryError::from);

        match result {
            Ok(result) => Ok(result.rows_affected() > 0),
            Err(e) if e.kind() == QueryErrorKind::ForeignKeyViolation => {
                Err(relation.missing_target())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_link(
        &mut self,
        relation: Relation,
        user_id: Id,
        target_id: Id,
    ) -> Result<bool, ActionError> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
            relation.table(),
            relation.target_column()
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(target_id)
            .execute(&mut *self)
            .await
            .map_err(QueryError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

pub async fn toggle_relation(
    relation: Relation,
    toggle: Toggle,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    match toggle {
        Toggle::Add => add_link(&mut *tx, relation, user_id, target_id).await?,
        Toggle::Remove => remove_link(&mut *tx, relation, user_id, target_id).await?,
    }

    tx.commit().await.map_err(QueryError::from)?;
    Ok(())
}

async fn linked_recipe(recipe_id: Id, pool: &Pool<Postgres>) -> Result<RecipeShort, ActionError> {
    get_recipe_short(recipe_id, pool)
        .await?
        .ok_or_else(|| Relation::Favorite.missing_target())
}

pub async fn add_to_favorites(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ActionError> {
    toggle_relation(Relation::Favorite, Toggle::Add, user_id, recipe_id, pool).await?;
    linked_recipe(recipe_id, pool).await
}

pub async fn remove_from_favorites(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    toggle_relation(Relation::Favorite, Toggle::Remove, user_id, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ActionError> {
    toggle_relation(Relation::ShoppingCart, Toggle::Add, user_id, recipe_id, pool).await?;
    linked_recipe(recipe_id, pool).await
}

pub async fn remove_from_shopping_cart(
    recipe_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    toggle_relation(Relation::ShoppingCart, Toggle::Remove, user_id, recipe_id, pool).await
}

pub async fn subscribe(
    author_id: Id,
    user_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Subscription, ActionError> {
    toggle_relation(Relation::Follow, Toggle::Add, user_id, author_id, pool).await?;

    get_subscription(author_id, user_id, recipes_limit, pool)
        .await?
        .ok_or_else(|| Relation::Follow.missing_target())
}

pub async fn unsubscribe(
    author_id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    toggle_relation(Relation::Follow, Toggle::Remove, user_id, author_id, pool).await
}
