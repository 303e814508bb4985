use std::sync::Arc;

use chrono::Utc;
use pocketlegal_auth::{Claims, JwtService, PasswordService};
use pocketlegal_common::{AppError, Page, PageRequest, UserRole};
use pocketlegal_database::{
    Lawyer, LawyerFilter, LawyerStore, LawyerUpdate, NewUser, Store, User, UserStore, UserUpdate,
};
use uuid::Uuid;

use crate::models::*;

pub struct UserService {
    store: Arc<dyn Store>,
    jwt_service: Arc<JwtService>,
}

impl UserService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
            jwt_service: state.jwt_service.clone(),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthPayload, AppError> {
        let role = request.role.unwrap_or(UserRole::Customer);
        if role == UserRole::Admin {
            return Err(AppError::Validation(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }
        PasswordService::validate_password_strength(&request.password)?;

        let email = request.email.trim().to_lowercase();
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = PasswordService::hash_password(&request.password)?;
        let user = self
            .store
            .create_user(NewUser {
                name: request.name.trim().to_string(),
                email,
                password_hash,
                role,
                phone: request.phone,
            })
            .await?;

        let token = self.jwt_service.issue(user.id, &user.email, user.role)?;
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(AuthPayload { token, user })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthPayload, AppError> {
        let invalid = || AppError::Authentication("Invalid credentials".to_string());

        let user = self
            .store
            .find_user_by_email(&request.email.trim().to_lowercase())
            .await?
            .ok_or_else(invalid)?;
        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !PasswordService::verify_password(&request.password, hash)? {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(AppError::Authentication(
                "Account has been deactivated".to_string(),
            ));
        }

        let token = self.jwt_service.issue(user.id, &user.email, user.role)?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(AuthPayload { token, user })
    }

    pub async fn profile(&self, claims: &Claims) -> Result<ProfilePayload, AppError> {
        let user = self.current_user(claims).await?;
        let lawyer = match user.role {
            UserRole::Lawyer => self.store.find_lawyer_by_user(user.id).await?,
            _ => None,
        };
        Ok(ProfilePayload { user, lawyer })
    }

    pub async fn update_profile(
        &self,
        claims: &Claims,
        request: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        let update = UserUpdate {
            name: request.name.map(|n| n.trim().to_string()),
            phone: request.phone,
            profile_picture: request.profile_picture,
        };
        self.store.update_user(claims.user_id()?, update).await
    }

    pub async fn update_password(
        &self,
        claims: &Claims,
        request: UpdatePasswordRequest,
    ) -> Result<(), AppError> {
        let user = self.current_user(claims).await?;
        let current_ok = match user.password_hash.as_deref() {
            Some(hash) => PasswordService::verify_password(&request.current_password, hash)?,
            None => false,
        };
        if !current_ok {
            return Err(AppError::Authentication(
                "Current password is incorrect".to_string(),
            ));
        }

        PasswordService::validate_password_strength(&request.new_password)?;
        let hash = PasswordService::hash_password(&request.new_password)?;
        self.store.set_password_hash(user.id, &hash).await?;

        tracing::info!(user_id = %user.id, "Password updated");
        Ok(())
    }

    pub async fn update_lawyer_profile(
        &self,
        claims: &Claims,
        request: UpdateLawyerProfileRequest,
    ) -> Result<Lawyer, AppError> {
        claims.require_role(&[UserRole::Lawyer])?;
        let lawyer = self
            .store
            .find_lawyer_by_user(claims.user_id()?)
            .await?
            .ok_or_else(|| AppError::NotFound("Lawyer profile not found".to_string()))?;

        let update = LawyerUpdate {
            qualifications: request.qualifications,
            experience: request.experience,
            areas_of_expertise: request.areas_of_expertise,
            license_number: request.license_number,
            license_issued_by: request.license_issued_by,
            license_expiry_date: request.license_expiry_date,
            bio: request.bio,
            hourly_rate: request.hourly_rate,
            languages: request.languages,
            documents_uploaded_at: None,
        };
        self.store.update_lawyer(lawyer.id, update).await
    }

    /// Records that the calling lawyer has submitted verification documents.
    pub async fn update_lawyer_documents(&self, claims: &Claims) -> Result<Lawyer, AppError> {
        claims.require_role(&[UserRole::Lawyer])?;
        let lawyer = self
            .store
            .find_lawyer_by_user(claims.user_id()?)
            .await?
            .ok_or_else(|| AppError::NotFound("Lawyer profile not found".to_string()))?;

        let update = LawyerUpdate {
            documents_uploaded_at: Some(Utc::now()),
            ..Default::default()
        };
        self.store.update_lawyer(lawyer.id, update).await
    }

    pub async fn list_lawyers(&self, query: LawyerQuery) -> Result<(Page<Lawyer>, PageRequest), AppError> {
        let page = PageRequest::new(query.page, query.limit);
        let filter = LawyerFilter {
            expertise: query.expertise.filter(|e| !e.trim().is_empty()),
        };
        Ok((self.store.list_lawyers(filter, page).await?, page))
    }

    pub async fn get_lawyer(&self, id: Uuid) -> Result<LawyerPayload, AppError> {
        let lawyer = self
            .store
            .find_lawyer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lawyer not found".to_string()))?;
        let user = self.store.find_user(lawyer.user_id).await?;
        Ok(LawyerPayload { lawyer, user })
    }

    async fn current_user(&self, claims: &Claims) -> Result<User, AppError> {
        self.store
            .find_user(claims.user_id()?)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
