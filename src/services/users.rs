//! Staff account administration.

use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::hash_password;
use crate::errors::ServiceError;
use crate::models::{user, UserRole, UserStatus};
use crate::store::{NewUser, StoreError, UserPatch, UserStore};

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// `staff` or `admin`
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(max = 64))]
    pub employee_code: Option<String>,
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub phone: Option<String>,
    /// `staff` (default) or `admin`
    pub role: Option<String>,
    #[validate(length(max = 64))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub password: Option<String>,
}

/// Every field is optional. `username` set to `null` or `""` clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    /// `active` or `inactive`
    pub status: Option<String>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub username: Option<Option<String>>,
    #[validate(length(min = 1, max = 256))]
    pub password: Option<String>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn parse_role(raw: &str) -> Result<UserRole, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid role: {raw}")))
}

fn parse_user_status(raw: &str) -> Result<UserStatus, ServiceError> {
    raw.trim()
        .parse()
        .map_err(|_| ServiceError::ValidationError(format!("Invalid status: {raw}")))
}

fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn conflict_or(step: &str, err: StoreError) -> ServiceError {
    ServiceError::from_store(step, "Employee code or username already exists", err)
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, query: UserListQuery) -> Result<Vec<user::Model>, ServiceError> {
        let role = filled(query.role).as_deref().map(parse_role).transpose()?;
        self.store
            .list_users(role)
            .await
            .map_err(|e| ServiceError::dependency("Failed to fetch users", e))
    }

    #[instrument(skip(self, request))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let (Some(employee_code), Some(name)) =
            (filled(request.employee_code), filled(request.name))
        else {
            return Err(ServiceError::ValidationError(
                "Employee code and name are required".to_string(),
            ));
        };
        let role = match filled(request.role) {
            Some(raw) => parse_role(&raw)?,
            None => UserRole::Staff,
        };
        let username = filled(request.username);

        let existing = self
            .store
            .find_user_by_employee_code(&employee_code)
            .await
            .map_err(|e| ServiceError::dependency("Failed to create user", e))?;
        if existing.is_some() {
            return Err(ServiceError::conflict("Employee code already exists"));
        }

        let password_hash = request
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;

        let user = self
            .store
            .insert_user(NewUser {
                employee_code,
                name,
                phone: request.phone.unwrap_or_default(),
                role,
                username,
                password_hash,
            })
            .await
            .map_err(|e| conflict_or("Failed to create user", e))?;
        info!(employee_code = %user.employee_code, role = %user.role, "user created");
        Ok(user)
    }

    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let patch = UserPatch {
            name: filled(request.name),
            phone: filled(request.phone),
            role: filled(request.role).as_deref().map(parse_role).transpose()?,
            status: filled(request.status)
                .as_deref()
                .map(parse_user_status)
                .transpose()?,
            username: request.username.map(filled),
            password_hash: request
                .password
                .as_deref()
                .map(hash_password)
                .transpose()?,
        };

        self.store
            .update_user(id, patch)
            .await
            .map_err(|e| conflict_or("Failed to update user", e))?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), ServiceError> {
        let deleted = self
            .store
            .delete_user(id)
            .await
            .map_err(|e| match e {
                StoreError::ForeignKey(details) => ServiceError::Conflict {
                    error: "User is referenced by existing receipts".to_string(),
                    details: Some(details),
                },
                other => ServiceError::dependency("Failed to delete user", other),
            })?;
        if !deleted {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::store::InMemoryStore;
    use assert_matches::assert_matches;

    fn service() -> UserService {
        UserService::new(Arc::new(InMemoryStore::new()))
    }

    fn create(code: &str) -> CreateUserRequest {
        CreateUserRequest {
            employee_code: Some(code.into()),
            name: Some("Dana Reyes".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn defaults_to_staff_and_hashes_password() {
        let svc = service();
        let user = svc
            .create_user(CreateUserRequest {
                username: Some("dreyes".into()),
                password: Some("forklift".into()),
                ..create("E-100")
            })
            .await
            .unwrap();
        assert_eq!(user.role, UserRole::Staff);
        assert_eq!(user.status, UserStatus::Active);
        let hash = user.password_hash.as_deref().unwrap();
        assert_ne!(hash, "forklift");
        assert!(verify_password("forklift", hash));
    }

    #[tokio::test]
    async fn duplicate_employee_code_conflicts() {
        let svc = service();
        svc.create_user(create("E-100")).await.unwrap();
        assert_matches!(
            svc.create_user(create("E-100")).await,
            Err(ServiceError::Conflict { .. })
        );
    }

    #[tokio::test]
    async fn code_and_name_are_required() {
        let err = service()
            .create_user(CreateUserRequest {
                employee_code: Some("E-1".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Employee code and name are required");
    }

    #[tokio::test]
    async fn empty_username_clears_it() {
        let svc = service();
        let user = svc
            .create_user(CreateUserRequest {
                username: Some("dreyes".into()),
                ..create("E-100")
            })
            .await
            .unwrap();

        let request: UpdateUserRequest = serde_json::from_str(r#"{"username": ""}"#).unwrap();
        assert_eq!(request.username, Some(Some(String::new())));
        let updated = svc.update_user(user.id, request).await.unwrap();
        assert_eq!(updated.username, None);

        let untouched: UpdateUserRequest = serde_json::from_str(r#"{"name": "D. Reyes"}"#).unwrap();
        assert_eq!(untouched.username, None);
    }

    #[tokio::test]
    async fn update_and_delete_unknown_user_are_not_found() {
        let svc = service();
        assert_matches!(
            svc.update_user(Uuid::new_v4(), UpdateUserRequest::default()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            svc.delete_user(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn users_with_receipts_cannot_be_deleted() {
        use crate::models::{ItemStatus, ReceiptStatus};
        use crate::store::{ItemStore, NewItem, NewReceipt, ReceiptStore};

        let store = Arc::new(InMemoryStore::new());
        let svc = UserService::new(store.clone());
        let user = svc.create_user(create("E-100")).await.unwrap();
        let item = store
            .insert_item(NewItem {
                item_no: "ITM-001".into(),
                product_name: "Pallet jack".into(),
                description: None,
                category: None,
                status: ItemStatus::Active,
            })
            .await
            .unwrap();
        store
            .insert_receipt(NewReceipt {
                receipt_no: "RCV-20240101-000001".into(),
                item_id: item.id,
                user_id: user.id,
                qr_code: None,
                quantity: 1,
                defect_quantity: 0,
                status: ReceiptStatus::Completed,
                location: None,
                notes: None,
                received_at: chrono::Utc::now(),
            })
            .await
            .unwrap();

        let err = svc.delete_user(user.id).await.unwrap_err();
        assert_matches!(
            err,
            ServiceError::Conflict { ref error, details: Some(_) }
                if error == "User is referenced by existing receipts"
        );
        assert!(store.find_user(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_filters_by_role() {
        let svc = service();
        svc.create_user(create("E-1")).await.unwrap();
        svc.create_user(CreateUserRequest {
            role: Some("admin".into()),
            ..create("E-2")
        })
        .await
        .unwrap();

        let admins = svc
            .list_users(UserListQuery {
                role: Some("admin".into()),
            })
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].employee_code, "E-2");
        assert_matches!(
            svc.list_users(UserListQuery { role: Some("owner".into()) }).await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
