use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::constants::TOKEN_KEYWORDS;
use crate::database::{
    error::ActionError,
    schema::{Id, User, UserRole},
};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub jti: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User, token_id: Uuid, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: user.id,
            jti: token_id.to_string(),
            iat,
            exp,
        }
    }

    pub fn token_id(&self) -> Result<Uuid, ActionError> {
        Uuid::parse_str(&self.jti).map_err(|_| ActionError::Unauthorized)
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

/// The authenticated requester, rebuilt from the database on every request.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub user_id: Id,
    pub role: UserRole,
}

impl SessionData {
    pub fn new(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
        }
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), ActionError> {
        if !action.authenticate(self) {
            return Err(ActionError::Forbidden);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, lifetime_hours: i64) -> Result<Self, ActionError> {
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|e| ActionError::Internal(format!("Invalid secret key: {e}")))?;

        Ok(Self {
            key,
            lifetime: Duration::hours(lifetime_hours),
        })
    }

    pub fn generate_jwt_session(&self, user: &User, token_id: Uuid) -> Result<String, ActionError> {
        let claims = JwtSessionData::new(user, token_id, self.lifetime);

        claims
            .sign_with_key(&self.key)
            .map_err(|e| ActionError::Internal(format!("Failed to sign session: {e}")))
    }

    pub fn verify_jwt_session(&self, token: &str) -> Result<JwtSessionData, ActionError> {
        let session: JwtSessionData = token.verify_with_key(&self.key).map_err(|_| {
            log::trace!("> Rejected token with invalid signature");
            ActionError::Unauthorized
        })?;

        if session.is_expired() {
            log::trace!("> Rejected expired token for user {}", session.user_id);
            return Err(ActionError::Unauthorized);
        }
        Ok(session)
    }
}

/// Extracts the token from an `Authorization: Token <token>` header value.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (keyword, token) = header.trim().split_once(' ')?;
    let token = token.trim();

    if !TOKEN_KEYWORDS.contains(&keyword) || token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Baker"),
            password: String::new(),
            role: UserRole::User,
        }
    }

    #[test]
    fn signed_session_verifies() {
        let keys = SessionKeys::new("secret", 1).unwrap();
        let token_id = Uuid::new_v4();
        let token = keys.generate_jwt_session(&user(), token_id).unwrap();

        let session = keys.verify_jwt_session(&token).unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.token_id().unwrap(), token_id);
    }

    #[test]
    fn claims_carry_only_identity_and_lifetime() {
        let claims = JwtSessionData::new(&user(), Uuid::new_v4(), Duration::hours(1));
        let value = serde_json::to_value(&claims).unwrap();

        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["exp", "iat", "jti", "user_id"]);
    }

    #[test]
    fn session_role_follows_the_stored_user() {
        let mut admin = user();
        admin.role = UserRole::Admin;

        assert_eq!(SessionData::new(&user()).role, UserRole::User);
        assert_eq!(SessionData::new(&admin).role, UserRole::Admin);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = SessionKeys::new("secret", 1)
            .unwrap()
            .generate_jwt_session(&user(), Uuid::new_v4())
            .unwrap();

        let other = SessionKeys::new("another secret", 1).unwrap();
        assert!(matches!(
            other.verify_jwt_session(&token),
            Err(ActionError::Unauthorized)
        ));
    }

    #[test]
    fn expired_session_is_rejected() {
        let keys = SessionKeys::new("secret", -1).unwrap();
        let token = keys.generate_jwt_session(&user(), Uuid::new_v4()).unwrap();

        assert!(matches!(
            keys.verify_jwt_session(&token),
            Err(ActionError::Unauthorized)
        ));
    }

    #[test]
    fn authorization_header() {
        assert_eq!(parse_authorization("Token abc.def"), Some("abc.def"));
        assert_eq!(parse_authorization("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_authorization("Basic abc.def"), None);
        assert_eq!(parse_authorization("Token "), None);
        assert_eq!(parse_authorization("abc.def"), None);
    }
}
