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
    form::LoginForm,
    jwt::SessionData,
    middleware::{with_context, with_session},
    state::Context,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(logout);

    login.or(logout).unify().boxed()
}

async fn login(form: LoginForm, ctx: Context) -> Result<Response, Rejection> {
    let token = actions::login_user(form, &ctx.sessions, &ctx.pool).await?;
    Ok(reply_json(&token, StatusCode::OK))
}

async fn logout(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    actions::logout_user(session.user_id, &ctx.pool).await?;
    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{self, tests::lazy_context};

    #[tokio::test]
    async fn login_needs_both_fields() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/auth/token/login")
            .json(&serde_json::json!({ "email": "cook@example.com" }))
            .reply(&routes::routes(lazy_context()))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_is_post_only() {
        let response = warp::test::request()
            .method("GET")
            .path("/api/auth/token/login")
            .reply(&routes::routes(lazy_context()))
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
