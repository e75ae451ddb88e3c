use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::Response,
    Filter,
};

use super::{json_body, no_content, reply_json};
use crate::{
    actions,
    error::ActionError,
    form::IngredientForm,
    jwt::SessionData,
    middleware::{with_context, with_session},
    schema::Id,
    state::Context,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(list_ingredients);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(create_ingredient);

    let get = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(get_ingredient);

    let delete = warp::path!("ingredients" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(delete_ingredient);

    list.or(create)
        .unify()
        .or(get)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn list_ingredients(ctx: Context) -> Result<Response, Rejection> {
    let ingredients = actions::list_ingredients(&ctx.pool).await?;
    Ok(reply_json(&ingredients, StatusCode::OK))
}

async fn create_ingredient(
    session: SessionData,
    form: IngredientForm,
    ctx: Context,
) -> Result<Response, Rejection> {
    let ingredient = actions::create_ingredient(form, &session, &ctx.pool).await?;
    Ok(reply_json(&ingredient, StatusCode::CREATED))
}

async fn get_ingredient(id: Id, ctx: Context) -> Result<Response, Rejection> {
    let ingredient = actions::get_ingredient(id, &ctx.pool)
        .await?
        .ok_or_else(|| ActionError::not_found("No ingredient exists with specified id"))?;
    Ok(reply_json(&ingredient, StatusCode::OK))
}

async fn delete_ingredient(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    actions::delete_ingredient(id, &session, &ctx.pool).await?;
    Ok(no_content())
}
