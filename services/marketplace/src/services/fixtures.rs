//! Seeded in-memory marketplace shared by the service unit tests.

use std::sync::Arc;

use pocketlegal_auth::Claims;
use pocketlegal_common::UserRole;
use pocketlegal_database::{
    CatalogStore, Lawyer, LawyerStore, LawyerUpdate, MemoryStore, NewCategory, NewService, NewUser,
    Service, UserStore,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::AppState;
use crate::config::AppConfig;

pub struct Fixture {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub customer: Claims,
    pub lawyer: Claims,
    pub lawyer_profile: Lawyer,
    pub admin: Claims,
    /// Base price 100, offered by `lawyer_profile` (hourly rate 50).
    pub service: Service,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), AppConfig::in_memory());

        let customer = sign_up(&state, &store, "cara@example.com", UserRole::Customer).await;
        let lawyer = sign_up(&state, &store, "leo@example.com", UserRole::Lawyer).await;
        let admin = sign_up(&state, &store, "ada@example.com", UserRole::Admin).await;

        let profile = store
            .find_lawyer_by_user(lawyer.user_id().unwrap())
            .await
            .unwrap()
            .unwrap();
        let lawyer_profile = store
            .update_lawyer(
                profile.id,
                LawyerUpdate {
                    hourly_rate: Some(Decimal::new(50, 0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let category = store
            .create_category(NewCategory {
                name: "Family Law".into(),
                description: None,
                icon: None,
                parent_category: None,
                order: 0,
            })
            .await
            .unwrap();
        let service = store
            .create_service(NewService {
                name: "Divorce consultation".into(),
                description: "One hour consultation on divorce proceedings".into(),
                short_description: None,
                category_id: category.id,
                base_price: Decimal::new(100, 0),
                duration: 60,
                lawyers: vec![lawyer_profile.id],
                tags: vec!["divorce".into()],
                featured: false,
            })
            .await
            .unwrap();

        Self {
            state,
            store,
            customer,
            lawyer,
            lawyer_profile,
            admin,
            service,
        }
    }

    /// Another customer with no relation to the seeded bookings.
    pub async fn stranger(&self) -> Claims {
        let email = format!("{}@example.com", Uuid::new_v4().simple());
        sign_up(&self.state, &self.store, &email, UserRole::Customer).await
    }
}

async fn sign_up(state: &AppState, store: &MemoryStore, email: &str, role: UserRole) -> Claims {
    let stored_role = if role == UserRole::Admin {
        UserRole::Customer
    } else {
        role
    };
    let user = store
        .create_user(NewUser {
            name: "Fixture User".into(),
            email: email.into(),
            password_hash: "not-a-real-hash".into(),
            role: stored_role,
            phone: None,
        })
        .await
        .unwrap();
    if role == UserRole::Admin {
        store.set_user_role(user.id, UserRole::Admin).await.unwrap();
    }

    let token = state.jwt_service.issue(user.id, &user.email, role).unwrap();
    state.jwt_service.validate_token(&token).unwrap()
}
