use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
};

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{ActionError, QueryError},
    schema::{CartPart, Id},
};

/// Source of the ingredient lines of every recipe in a user's cart, ordered by name, then
/// measurement unit.
pub trait CartStore {
    fn cart_parts(
        &mut self,
        user_id: Id,
    ) -> impl Future<Output = Result<Vec<CartPart>, ActionError>> + Send;
}

impl CartStore for PgConnection {
    async fn cart_parts(&mut self, user_id: Id) -> Result<Vec<CartPart>, ActionError> {
        let parts: Vec<CartPart> = sqlx::query_as(
            "
            SELECT i.name, i.measurement_unit, SUM(ri.amount) AS amount
            FROM shopping_cart c
            INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
        ",
        )
        .bind(user_id)
        .fetch_all(&mut *self)
        .await
        .map_err(QueryError::from)?;

        Ok(parts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Summed ingredient amounts of a cart, one line per (name, measurement unit).
/// Lines keep the order the store returned them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingList {
    pub lines: Vec<ShoppingLine>,
}

impl ShoppingList {
    pub fn from_parts(parts: Vec<CartPart>) -> Result<Self, ActionError> {
        if parts.is_empty() {
            return Err(ActionError::EmptyCart);
        }

        let mut lines: Vec<ShoppingLine> = Vec::with_capacity(parts.len());
        let mut positions: HashMap<(String, String), usize> = HashMap::new();
        for part in parts {
            match positions.entry((part.name.clone(), part.measurement_unit.clone())) {
                Entry::Occupied(entry) => lines[*entry.get()].amount += part.amount,
                Entry::Vacant(entry) => {
                    entry.insert(lines.len());
                    lines.push(ShoppingLine {
                        name: part.name,
                        measurement_unit: part.measurement_unit,
                        amount: part.amount,
                    });
                }
            }
        }

        Ok(Self { lines })
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{}({})—{}", line.name, line.measurement_unit, line.amount))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn build_shopping_list<S: CartStore>(
    store: &mut S,
    user_id: Id,
) -> Result<ShoppingList, ActionError> {
    let parts = store.cart_parts(user_id).await?;
    ShoppingList::from_parts(parts)
}

pub async fn download_shopping_cart(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<String, ActionError> {
    let mut conn = pool.acquire().await.map_err(QueryError::from)?;
    let list = build_shopping_list(&mut *conn, user_id).await?;

    log::info!(
        "> User {user_id} downloaded a shopping list of {} lines",
        list.lines.len()
    );
    Ok(list.render())
}
