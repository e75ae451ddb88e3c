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
    form::TagForm,
    jwt::SessionData,
    middleware::{with_context, with_session},
    schema::Id,
    state::Context,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(list_tags);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(create_tag);

    let get = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(get_tag);

    let update = warp::path!("tags" / Id)
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(update_tag);

    let delete = warp::path!("tags" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(delete_tag);

    list.or(create)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn list_tags(ctx: Context) -> Result<Response, Rejection> {
    let tags = actions::list_tags(&ctx.pool).await?;
    Ok(reply_json(&tags, StatusCode::OK))
}

async fn create_tag(session: SessionData, form: TagForm, ctx: Context) -> Result<Response, Rejection> {
    let tag = actions::create_tag(form, &session, &ctx.pool).await?;
    Ok(reply_json(&tag, StatusCode::CREATED))
}

async fn get_tag(id: Id, ctx: Context) -> Result<Response, Rejection> {
    let tag = actions::get_tag(id, &ctx.pool)
        .await?
        .ok_or_else(|| ActionError::not_found("No tag exists with specified id"))?;
    Ok(reply_json(&tag, StatusCode::OK))
}

async fn update_tag(
    id: Id,
    session: SessionData,
    form: TagForm,
    ctx: Context,
) -> Result<Response, Rejection> {
    let tag = actions::update_tag(id, form, &session, &ctx.pool).await?;
    Ok(reply_json(&tag, StatusCode::OK))
}

async fn delete_tag(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    actions::delete_tag(id, &session, &ctx.pool).await?;
    Ok(no_content())
}
