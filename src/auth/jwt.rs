use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

use crate::models::{Claims, TokenType};

/// Identity carried into both token kinds.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: u64,
    pub username: &'a str,
    pub role: u8,
    pub employee_id: Option<u64>,
}

impl<'a> TokenSubject<'a> {
    pub fn from_claims(claims: &'a Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: &claims.sub,
            role: claims.role,
            employee_id: claims.employee_id,
        }
    }
}

fn now() -> usize {
    Utc::now().timestamp().max(0) as usize
}

fn build_claims(subject: &TokenSubject<'_>, token_type: TokenType, ttl: usize) -> Claims {
    Claims {
        user_id: subject.user_id,
        sub: subject.username.to_string(),
        role: subject.role,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        employee_id: subject.employee_id,
    }
}

fn sign(claims: &Claims, secret: &str) -> Result<String, Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn generate_access_token(
    subject: &TokenSubject<'_>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    sign(&build_claims(subject, TokenType::Access, ttl), secret)
}

pub fn generate_refresh_token(
    subject: &TokenSubject<'_>,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = build_claims(subject, TokenType::Refresh, ttl);
    let token = sign(&claims, secret)?;
    Ok((token, claims))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: TokenSubject<'static> = TokenSubject {
        user_id: 42,
        username: "j.doe",
        role: 3,
        employee_id: Some(7),
    };

    #[test]
    fn access_token_round_trip() {
        let token = generate_access_token(&SUBJECT, "secret", 900).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "j.doe");
        assert_eq!(claims.employee_id, Some(7));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn refresh_tokens_get_unique_jti() {
        let (_, a) = generate_refresh_token(&SUBJECT, "secret", 3600).unwrap();
        let (_, b) = generate_refresh_token(&SUBJECT, "secret", 3600).unwrap();
        assert_eq!(a.token_type, TokenType::Refresh);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token(&SUBJECT, "secret", 900).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = build_claims(&SUBJECT, TokenType::Access, 0);
        claims.exp = now().saturating_sub(3600);
        let token = sign(&claims, "secret").unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
