use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pocketlegal_common::{AppError, JwtConfig, UserRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: UserRole, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(config.expiration_hours as i64);

        Self {
            sub: user_id.to_string(),
            email,
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| AppError::Authentication(format!("Invalid user ID in token: {}", e)))
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Fails with `Authorization` unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[UserRole]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Authorization(format!(
                "User role {} is not authorized to access this route",
                self.role
            )))
        }
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_ref()),
            decoding_key: DecodingKey::from_secret(config.secret.as_ref()),
            validation,
            config: config.clone(),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, role: UserRole) -> Result<String, AppError> {
        let claims = Claims::new(user_id, email.to_string(), role, &self.config);
        self.generate_token(&claims)
    }

    pub fn generate_token(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Authentication(format!("Not authorized, token failed: {}", e)))
    }

    pub fn extract_user_id(&self, token: &str) -> Result<Uuid, AppError> {
        self.validate_token(token)?.user_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.to_string(),
            expiration_hours: 1,
            issuer: "pocketlegal-test".to_string(),
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let jwt = JwtService::new(&config("secret"));
        let user_id = Uuid::new_v4();
        let token = jwt.issue(user_id, "ann@example.com", UserRole::Lawyer).unwrap();

        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.role, UserRole::Lawyer);
        assert_eq!(jwt.extract_user_id(&token).unwrap(), user_id);
    }

    #[test]
    fn test_rejects_foreign_secret() {
        let issuer = JwtService::new(&config("one"));
        let verifier = JwtService::new(&config("two"));
        let token = issuer.issue(Uuid::new_v4(), "a@b.c", UserRole::Customer).unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_rejects_expired_token() {
        let cfg = config("secret");
        let jwt = JwtService::new(&cfg);
        let mut claims = Claims::new(Uuid::new_v4(), "a@b.c".into(), UserRole::Customer, &cfg);
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = jwt.generate_token(&claims).unwrap();

        assert!(jwt.validate_token(&token).is_err());
    }

    #[test]
    fn test_require_role() {
        let cfg = config("secret");
        let claims = Claims::new(Uuid::new_v4(), "a@b.c".into(), UserRole::Customer, &cfg);
        assert!(claims.require_role(&[UserRole::Customer]).is_ok());
        assert!(matches!(
            claims.require_role(&[UserRole::Admin]),
            Err(AppError::Authorization(_))
        ));
    }
}
