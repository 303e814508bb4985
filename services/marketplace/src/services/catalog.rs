use std::sync::Arc;

use pocketlegal_auth::Claims;
use pocketlegal_common::{AppError, Page, PageRequest, UserRole};
use pocketlegal_database::{
    CatalogStore, Category, CategoryUpdate, LawyerStore, NewCategory, NewService, Service,
    ServiceFilter, ServiceUpdate, Store,
};
use uuid::Uuid;

use crate::models::*;

const DEFAULT_DURATION_MINUTES: i32 = 60;

pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(state: &super::AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        self.store.list_categories().await
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category, AppError> {
        self.store
            .find_category(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    pub async fn create_category(
        &self,
        claims: &Claims,
        request: CreateCategoryRequest,
    ) -> Result<Category, AppError> {
        claims.require_role(&[UserRole::Admin])?;
        if let Some(parent) = request.parent_category {
            self.get_category(parent).await?;
        }

        let category = self
            .store
            .create_category(NewCategory {
                name: request.name.trim().to_string(),
                description: request.description,
                icon: request.icon,
                parent_category: request.parent_category,
                order: request.order.unwrap_or(0),
            })
            .await?;
        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateCategoryRequest,
    ) -> Result<Category, AppError> {
        claims.require_role(&[UserRole::Admin])?;
        if let Some(parent) = request.parent_category {
            if parent == id {
                return Err(AppError::Validation(
                    "A category cannot be its own parent".to_string(),
                ));
            }
            self.get_category(parent).await?;
        }

        let update = CategoryUpdate {
            name: request.name.map(|n| n.trim().to_string()),
            description: request.description,
            icon: request.icon,
            parent_category: request.parent_category,
            order: request.order,
            is_active: request.is_active,
        };
        self.store.update_category(id, update).await
    }

    pub async fn delete_category(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        claims.require_role(&[UserRole::Admin])?;
        if !self.store.delete_category(id).await? {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        tracing::info!(category_id = %id, "Category deleted");
        Ok(())
    }

    pub async fn list_services(
        &self,
        query: ServiceQuery,
    ) -> Result<(Page<Service>, PageRequest), AppError> {
        if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
            if min > max {
                return Err(AppError::Validation(
                    "minPrice cannot be greater than maxPrice".to_string(),
                ));
            }
        }

        let page = PageRequest::new(query.page, query.limit);
        let filter = ServiceFilter {
            category_id: query.category,
            search: query.search.filter(|s| !s.trim().is_empty()),
            min_price: query.min_price,
            max_price: query.max_price,
            featured: query.featured,
            sort: query.sort.unwrap_or_default(),
        };
        Ok((self.store.list_services(filter, page).await?, page))
    }

    /// Fetches a service for display. Each call counts as one view.
    pub async fn view_service(&self, id: Uuid) -> Result<Service, AppError> {
        self.store
            .view_service(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Service not found".to_string()))
    }

    pub async fn create_service(
        &self,
        claims: &Claims,
        request: CreateServiceRequest,
    ) -> Result<Service, AppError> {
        claims.require_role(&[UserRole::Admin])?;
        self.get_category(request.category_id).await?;
        let lawyers = self.existing_lawyers(request.lawyers).await?;

        let service = self
            .store
            .create_service(NewService {
                name: request.name.trim().to_string(),
                description: request.description,
                short_description: request.short_description,
                category_id: request.category_id,
                base_price: request.base_price,
                duration: request.duration.unwrap_or(DEFAULT_DURATION_MINUTES),
                lawyers,
                tags: request.tags,
                featured: request.featured,
            })
            .await?;
        tracing::info!(service_id = %service.id, "Service created");
        Ok(service)
    }

    pub async fn update_service(
        &self,
        claims: &Claims,
        id: Uuid,
        request: UpdateServiceRequest,
    ) -> Result<Service, AppError> {
        claims.require_role(&[UserRole::Admin])?;
        if let Some(category_id) = request.category_id {
            self.get_category(category_id).await?;
        }

        let update = ServiceUpdate {
            name: request.name.map(|n| n.trim().to_string()),
            description: request.description,
            short_description: request.short_description,
            category_id: request.category_id,
            base_price: request.base_price,
            duration: request.duration,
            is_active: request.is_active,
            tags: request.tags,
            featured: request.featured,
        };
        self.store.update_service(id, update).await
    }

    pub async fn delete_service(&self, claims: &Claims, id: Uuid) -> Result<(), AppError> {
        claims.require_role(&[UserRole::Admin])?;
        if !self.store.delete_service(id).await? {
            return Err(AppError::NotFound("Service not found".to_string()));
        }
        tracing::info!(service_id = %id, "Service deleted");
        Ok(())
    }

    pub async fn assign_lawyers(
        &self,
        claims: &Claims,
        id: Uuid,
        request: AssignLawyersRequest,
    ) -> Result<Service, AppError> {
        claims.require_role(&[UserRole::Admin])?;
        let lawyers = self.existing_lawyers(request.lawyers).await?;
        self.store.set_service_lawyers(id, lawyers).await
    }

    /// Deduplicates `ids`, keeping order, and fails on the first unknown one.
    async fn existing_lawyers(&self, ids: Vec<Uuid>) -> Result<Vec<Uuid>, AppError> {
        let mut lawyers: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            if lawyers.contains(&id) {
                continue;
            }
            if self.store.find_lawyer(id).await?.is_none() {
                return Err(AppError::NotFound(format!("Lawyer {} not found", id)));
            }
            lawyers.push(id);
        }
        Ok(lawyers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::services::AppState;
    use pocketlegal_auth::JwtService;
    use rust_decimal::Decimal;

    fn admin(jwt: &JwtService) -> Claims {
        let token = jwt.issue(Uuid::new_v4(), "admin@example.com", UserRole::Admin).unwrap();
        jwt.validate_token(&token).unwrap()
    }

    fn service_request(category_id: Uuid, lawyers: Vec<Uuid>) -> CreateServiceRequest {
        CreateServiceRequest {
            name: "Contract review".into(),
            description: "Review of a commercial contract".into(),
            short_description: None,
            category_id,
            base_price: Decimal::new(100, 0),
            duration: None,
            lawyers,
            tags: vec!["contracts".into()],
            featured: false,
        }
    }

    #[tokio::test]
    async fn test_catalog_writes_require_admin() {
        let state = AppState::in_memory(AppConfig::in_memory());
        let token = state
            .jwt_service
            .issue(Uuid::new_v4(), "c@example.com", UserRole::Customer)
            .unwrap();
        let customer = state.jwt_service.validate_token(&token).unwrap();

        let err = CatalogService::new(&state)
            .create_category(
                &customer,
                CreateCategoryRequest {
                    name: "Tax".into(),
                    description: None,
                    icon: None,
                    parent_category: None,
                    order: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_service_requires_known_category_and_lawyers() {
        let state = AppState::in_memory(AppConfig::in_memory());
        let catalog = CatalogService::new(&state);
        let admin = admin(&state.jwt_service);

        let err = catalog
            .create_service(&admin, service_request(Uuid::new_v4(), vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let category = catalog
            .create_category(
                &admin,
                CreateCategoryRequest {
                    name: "Business".into(),
                    description: None,
                    icon: None,
                    parent_category: None,
                    order: Some(2),
                },
            )
            .await
            .unwrap();
        let err = catalog
            .create_service(&admin, service_request(category.id, vec![Uuid::new_v4()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let service = catalog
            .create_service(&admin, service_request(category.id, vec![]))
            .await
            .unwrap();
        assert_eq!(service.duration, DEFAULT_DURATION_MINUTES);

        let viewed = catalog.view_service(service.id).await.unwrap();
        let viewed_again = catalog.view_service(service.id).await.unwrap();
        assert_eq!(viewed.popularity_score + 1, viewed_again.popularity_score);
    }

    #[tokio::test]
    async fn test_inverted_price_range_is_rejected() {
        let state = AppState::in_memory(AppConfig::in_memory());
        let err = CatalogService::new(&state)
            .list_services(ServiceQuery {
                min_price: Some(Decimal::new(500, 0)),
                max_price: Some(Decimal::new(100, 0)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
