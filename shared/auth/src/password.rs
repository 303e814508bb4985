use bcrypt::{hash, verify};
use pocketlegal_common::AppError;

const HASH_COST: u32 = 10;
pub const MIN_PASSWORD_LENGTH: usize = 6;

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        hash(password, HASH_COST)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }

    pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = PasswordService::hash_password("hunter22").unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(PasswordService::verify_password("hunter22", &hashed).unwrap());
        assert!(!PasswordService::verify_password("hunter23", &hashed).unwrap());
    }

    #[test]
    fn test_minimum_length() {
        assert!(PasswordService::validate_password_strength("12345").is_err());
        assert!(PasswordService::validate_password_strength("123456").is_ok());
    }
}
