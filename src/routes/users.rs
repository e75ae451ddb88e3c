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
    form::{RegistrationForm, SetPasswordForm, SubscriptionQuery},
    jwt::SessionData,
    middleware::{with_context, with_possible_session, with_session},
    permissions::ActionType,
    schema::Id,
    state::Context,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(register);

    let list = warp::path!("users")
        .and(warp::get())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(list_users);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(me);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(set_password);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(warp::query::<SubscriptionQuery>())
        .and(with_context(ctx.clone()))
        .and_then(subscriptions);

    let profile = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(profile);

    let delete = warp::path!("users" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(delete_user);

    let subscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(warp::query::<SubscriptionQuery>())
        .and(with_context(ctx.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(unsubscribe);

    register
        .or(list)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(profile)
        .unify()
        .or(delete)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

async fn register(form: RegistrationForm, ctx: Context) -> Result<Response, Rejection> {
    let profile = actions::register_user(form, &ctx.pool).await?;
    Ok(reply_json(&profile, StatusCode::CREATED))
}

async fn list_users(session: Option<SessionData>, ctx: Context) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let profiles = actions::list_users(viewer, &ctx.pool).await?;
    Ok(reply_json(&profiles, StatusCode::OK))
}

async fn me(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let profile = actions::get_profile(session.user_id, Some(session.user_id), &ctx.pool)
        .await?
        .ok_or(ActionError::Unauthorized)?;
    Ok(reply_json(&profile, StatusCode::OK))
}

async fn set_password(
    session: SessionData,
    form: SetPasswordForm,
    ctx: Context,
) -> Result<Response, Rejection> {
    actions::set_password(session.user_id, form, &ctx.pool).await?;
    Ok(no_content())
}

async fn subscriptions(
    session: SessionData,
    query: SubscriptionQuery,
    ctx: Context,
) -> Result<Response, Rejection> {
    let list = actions::list_subscriptions(session.user_id, query.recipes_limit, &ctx.pool).await?;
    Ok(reply_json(&list, StatusCode::OK))
}

async fn profile(id: Id, session: Option<SessionData>, ctx: Context) -> Result<Response, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let profile = actions::get_profile(id, viewer, &ctx.pool)
        .await?
        .ok_or_else(|| ActionError::not_found("No user exists with specified id"))?;
    Ok(reply_json(&profile, StatusCode::OK))
}

async fn delete_user(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    actions::delete_user(id, &session, &ctx.pool).await?;
    Ok(no_content())
}

async fn subscribe(
    author_id: Id,
    session: SessionData,
    query: SubscriptionQuery,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let subscription =
        actions::subscribe(author_id, session.user_id, query.recipes_limit, &ctx.pool).await?;
    Ok(reply_json(&subscription, StatusCode::CREATED))
}

async fn unsubscribe(author_id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    actions::unsubscribe(author_id, session.user_id, &ctx.pool).await?;
    Ok(no_content())
}
