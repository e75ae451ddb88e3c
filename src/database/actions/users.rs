use std::collections::HashMap;

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{SessionData, SessionKeys},
        permissions::ActionType,
    },
    error::{ActionError, QueryError},
    form::{validate_password, LoginForm, RegistrationForm, SetPasswordForm},
    schema::{AuthToken, AuthoredRecipe, Id, Subscription, User, UserProfile},
};

/// Profile columns of `users u`; `$1` is the viewing user's id, or NULL for anonymous viewers.
pub(crate) const PROFILE_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    EXISTS(SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id) AS is_subscribed
";

const USER_CONSTRAINTS: &[(&str, &str)] = &[
    ("users_email_key", "email"),
    ("users_username_key", "username"),
];

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, ActionError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Option<User>, ActionError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&*pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user; the stored password is the argon2 hash of the submitted one
pub async fn register_user(
    form: RegistrationForm,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, ActionError> {
    form.validate()?;

    let password = hash_password(&form.password)
        .map_err(|e| ActionError::Internal(format!("Failed to hash password: {e}")))?;

    let profile: UserProfile = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING email, id, username, first_name, last_name, FALSE AS is_subscribed
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        ActionError::from_unique(
            QueryError::from(e),
            USER_CONSTRAINTS,
            "A user with that value already exists.",
        )
    })?;

    log::info!("> Registered user {} ({})", profile.id, profile.username);
    Ok(profile)
}

pub async fn login_user(
    form: LoginForm,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<AuthToken, ActionError> {
    let user = match get_user(pool, &form.email).await? {
        Some(user) => user,
        None => return Err(ActionError::InvalidCredentials),
    };

    let authenticated = verify_password(&form.password, &user.password)
        .map_err(|e| ActionError::Internal(format!("Stored password hash is invalid: {e}")))?;
    if !authenticated {
        return Err(ActionError::InvalidCredentials);
    }

    let token_id = Uuid::new_v4();
    sqlx::query("INSERT INTO auth_tokens (id, user_id) VALUES ($1, $2)")
        .bind(token_id)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    let auth_token = keys.generate_jwt_session(&user, token_id)?;

    log::info!("> User {} logged in", user.id);
    Ok(AuthToken { auth_token })
}

/// Resolves a bearer token into a session. The token must verify and still be on record.
pub async fn authenticate_token(
    token: &str,
    keys: &SessionKeys,
    pool: &Pool<Postgres>,
) -> Result<SessionData, ActionError> {
    let claims = keys.verify_jwt_session(token)?;
    let token_id = claims.token_id()?;

    let user: Option<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM auth_tokens t
        INNER JOIN users u ON u.id = t.user_id
        WHERE t.id = $1
    ",
    )
    .bind(token_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match user {
        Some(user) if user.id == claims.user_id => Ok(SessionData::new(&user)),
        _ => {
            log::trace!("> Rejected revoked token {token_id}");
            Err(ActionError::Unauthorized)
        }
    }
}

/// Revokes every token the user holds.
pub async fn logout_user(user_id: Id, pool: &Pool<Postgres>) -> Result<(), ActionError> {
    sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("> User {user_id} logged out");
    Ok(())
}

pub async fn set_password(
    user_id: Id,
    form: SetPasswordForm,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or(ActionError::Unauthorized)?;

    let authenticated = verify_password(&form.current_password, &user.password)
        .map_err(|e| ActionError::Internal(format!("Stored password hash is invalid: {e}")))?;
    if !authenticated {
        return Err(ActionError::validation(
            "current_password",
            "Invalid password.",
        ));
    }
    validate_password("new_password", &form.new_password, &user.username, &user.email)?;

    let password = hash_password(&form.new_password)
        .map_err(|e| ActionError::Internal(format!("Failed to hash password: {e}")))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn list_users(
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserProfile>, ActionError> {
    let rows: Vec<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u ORDER BY u.id"))
            .bind(viewer)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_profile(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<UserProfile>, ActionError> {
    let row: Option<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"))
            .bind(viewer)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn delete_user(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ActionError> {
    session.authenticate(ActionType::ManageUsers)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::not_found("No user exists with specified id"));
    }

    log::info!("> User {id} deleted by {}", session.user_id);
    Ok(())
}

/// Attaches each author's recipes, newest first, truncating to `recipes_limit` when given.
pub fn group_subscriptions(
    authors: Vec<UserProfile>,
    recipes: Vec<AuthoredRecipe>,
    recipes_limit: Option<i64>,
) -> Vec<Subscription> {
    let mut by_author: HashMap<Id, Vec<_>> = HashMap::new();
    recipes.into_iter().for_each(|row| {
        by_author.entry(row.author_id).or_default().push(row.recipe);
    });

    let limit = recipes_limit.and_then(|limit| usize::try_from(limit).ok());

    authors
        .into_iter()
        .map(|author| {
            let mut recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as i64;
            if let Some(limit) = limit {
                recipes.truncate(limit);
            }

            Subscription {
                author,
                recipes,
                recipes_count,
            }
        })
        .collect()
}

async fn list_authored_recipes(
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<Vec<AuthoredRecipe>, ActionError> {
    let rows: Vec<AuthoredRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM recipes
        WHERE author_id = ANY($1)
        ORDER BY id DESC
    ",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn list_subscriptions(
    user_id: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Subscription>, ActionError> {
    let authors: Vec<UserProfile> = sqlx::query_as(&format!(
        "
        SELECT {PROFILE_COLUMNS}
        FROM follows s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
    "
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let author_ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
    let recipes = list_authored_recipes(&author_ids, pool).await?;

    Ok(group_subscriptions(authors, recipes, recipes_limit))
}

pub async fn get_subscription(
    author_id: Id,
    viewer: Id,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Option<Subscription>, ActionError> {
    let author = match get_profile(author_id, Some(viewer), pool).await? {
        Some(author) => author,
        None => return Ok(None),
    };
    let recipes = list_authored_recipes(&[author_id], pool).await?;

    Ok(group_subscriptions(vec![author], recipes, recipes_limit).pop())
}
