use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use super::jwt::{parse_authorization, SessionData};
use crate::{actions::authenticate_token, error::ActionError, state::Context};

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Anonymous requests pass as `None`; a present but invalid token is rejected.
pub fn with_possible_session(
    ctx: Context,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let ctx = ctx.clone();
        async move {
            let header = match header {
                Some(header) => header,
                None => return Ok(None),
            };
            let token = parse_authorization(&header).ok_or(ActionError::Unauthorized)?;
            let session = authenticate_token(token, &ctx.sessions, &ctx.pool).await?;

            Ok::<_, Rejection>(Some(session))
        }
    })
}

pub fn with_session(
    ctx: Context,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_possible_session(ctx).and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| Rejection::from(ActionError::Unauthorized))
    })
}
