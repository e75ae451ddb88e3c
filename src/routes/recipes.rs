use warp::{
    filters::BoxedFilter,
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use super::{json_body, no_content, reply_json};
use crate::{
    actions,
    constants::SHOPPING_LIST_FILENAME,
    error::ActionError,
    form::RecipeForm,
    jwt::SessionData,
    middleware::{with_context, with_possible_session, with_session},
    permissions::ActionType,
    schema::Id,
    state::Context,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(download_shopping_cart);

    let get = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(get_recipe);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(delete_recipe);

    let favorite = warp::path!("recipes" / Id / "favorite")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(add_to_favorites);

    let unfavorite = warp::path!("recipes" / Id / "favorite")
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(remove_from_favorites);

    let add_to_cart = warp::path!("recipes" / Id / "shopping_cart")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(add_to_shopping_cart);

    let remove_from_cart = warp::path!("recipes" / Id / "shopping_cart")
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(remove_from_shopping_cart);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(favorite)
        .unify()
        .or(unfavorite)
        .unify()
        .or(add_to_cart)
        .unify()
        .or(remove_from_cart)
        .unify()
        .boxed()
}

async fn list_recipes(session: Option<SessionData>, ctx: Context) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let recipes = actions::list_recipes(viewer, &ctx.pool).await?;
    Ok(reply_json(&recipes, StatusCode::OK))
}

async fn create_recipe(
    session: SessionData,
    form: RecipeForm,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = actions::create_recipe(form, &session, &ctx.pool).await?;
    Ok(reply_json(&recipe, StatusCode::CREATED))
}

async fn get_recipe(id: Id, session: Option<SessionData>, ctx: Context) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let recipe = actions::get_recipe(id, viewer, &ctx.pool)
        .await?
        .ok_or_else(|| ActionError::not_found("No recipe exists with specified id"))?;
    Ok(reply_json(&recipe, StatusCode::OK))
}

async fn update_recipe(
    id: Id,
    session: SessionData,
    form: RecipeForm,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = actions::update_recipe(id, form, &session, &ctx.pool).await?;
    Ok(reply_json(&recipe, StatusCode::OK))
}

async fn delete_recipe(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    actions::delete_recipe(id, &session, &ctx.pool).await?;
    Ok(no_content())
}

async fn add_to_favorites(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let recipe = actions::add_to_favorites(id, session.user_id, &ctx.pool).await?;
    Ok(reply_json(&recipe, StatusCode::CREATED))
}

async fn remove_from_favorites(
    id: Id,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    actions::remove_from_favorites(id, session.user_id, &ctx.pool).await?;
    Ok(no_content())
}

async fn add_to_shopping_cart(
    id: Id,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let recipe = actions::add_to_shopping_cart(id, session.user_id, &ctx.pool).await?;
    Ok(reply_json(&recipe, StatusCode::CREATED))
}

async fn remove_from_shopping_cart(
    id: Id,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    actions::remove_from_shopping_cart(id, session.user_id, &ctx.pool).await?;
    Ok(no_content())
}

async fn download_shopping_cart(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let list = actions::download_shopping_cart(session.user_id, &ctx.pool).await?;
    Ok(shopping_list_reply(list))
}

fn shopping_list_reply(list: String) -> Response {
    let reply = warp::reply::with_header(list, CONTENT_TYPE, "text/plain; charset=utf-8");
    warp::reply::with_header(
        reply,
        CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
    .into_response()
}
