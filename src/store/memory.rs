//! In-process store used by tests and the `memory` backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    format_receipt_no, ItemFilter, ItemPatch, ItemStore, NewDefect, NewItem, NewPhoto,
    NewProductSubmission, NewReceipt, NewUser, Page, PageRequest, ProductSubmissionFilter,
    ProductSubmissionStore, ReceiptFilter, ReceiptGraph, ReceiptNumberGenerator, ReceiptStore,
    StoreError, UserPatch, UserStore,
};
use crate::models::{
    defect, item, photo, product_submission, receipt, user, UserRole, UserStatus,
};

#[derive(Default)]
struct Tables {
    items: HashMap<Uuid, item::Model>,
    users: HashMap<Uuid, user::Model>,
    receipts: HashMap<Uuid, receipt::Model>,
    defects: HashMap<Uuid, defect::Model>,
    photos: HashMap<Uuid, photo::Model>,
    product_submissions: HashMap<Uuid, product_submission::Model>,
}

impl Tables {
    fn item_no_taken(&self, item_no: &str, except: Option<Uuid>) -> bool {
        self.items
            .values()
            .any(|i| i.item_no == item_no && Some(i.id) != except)
    }

    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.username.as_deref() == Some(username) && Some(u.id) != except)
    }
}

/// All tables behind a single lock so uniqueness checks and writes are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    sequence: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of receipts currently stored.
    pub async fn receipt_count(&self) -> usize {
        self.tables.read().await.receipts.len()
    }

    /// Number of defects currently stored.
    pub async fn defect_count(&self) -> usize {
        self.tables.read().await.defects.len()
    }
}

fn paginate<T>(rows: Vec<T>, page: PageRequest) -> Page<T> {
    let total = rows.len() as u64;
    let rows = rows
        .into_iter()
        .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
        .collect();
    Page { rows, total }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl ReceiptStore for InMemoryStore {
    async fn insert_receipt(&self, new: NewReceipt) -> Result<receipt::Model, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .receipts
            .values()
            .any(|r| r.receipt_no == new.receipt_no)
        {
            return Err(StoreError::Conflict(format!(
                "receipt_no {} already exists",
                new.receipt_no
            )));
        }
        if !tables.items.contains_key(&new.item_id) {
            return Err(StoreError::ForeignKey(format!("item {} does not exist", new.item_id)));
        }
        if !tables.users.contains_key(&new.user_id) {
            return Err(StoreError::ForeignKey(format!("user {} does not exist", new.user_id)));
        }
        let model = receipt::Model {
            id: Uuid::new_v4(),
            receipt_no: new.receipt_no,
            item_id: new.item_id,
            user_id: new.user_id,
            qr_code: new.qr_code,
            quantity: new.quantity,
            defect_quantity: new.defect_quantity,
            status: new.status,
            location: new.location,
            notes: new.notes,
            received_at: new.received_at,
            updated_at: None,
        };
        tables.receipts.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_receipt(&self, id: Uuid) -> Result<Option<receipt::Model>, StoreError> {
        Ok(self.tables.read().await.receipts.get(&id).cloned())
    }

    async fn update_defect_quantity(
        &self,
        id: Uuid,
        defect_quantity: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let receipt = tables
            .receipts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {id}")))?;
        receipt.defect_quantity = defect_quantity;
        receipt.updated_at = Some(updated_at);
        Ok(())
    }

    async fn delete_receipt(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .receipts
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("receipt {id}")))?;
        tables.defects.retain(|_, d| d.receipt_id != id);
        tables.photos.retain(|_, p| p.receipt_id != id);
        Ok(())
    }

    async fn insert_defects(
        &self,
        defects: Vec<NewDefect>,
    ) -> Result<Vec<defect::Model>, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(orphan) = defects
            .iter()
            .find(|d| !tables.receipts.contains_key(&d.receipt_id))
        {
            return Err(StoreError::ForeignKey(format!(
                "receipt {} does not exist",
                orphan.receipt_id
            )));
        }
        let rows: Vec<defect::Model> = defects
            .into_iter()
            .map(|d| defect::Model {
                id: Uuid::new_v4(),
                receipt_id: d.receipt_id,
                defect_type: d.defect_type,
                defect_description: d.defect_description,
                quantity: d.quantity,
                severity: d.severity,
                checklist_data: d.checklist_data,
                created_at: d.created_at,
            })
            .collect();
        for row in &rows {
            tables.defects.insert(row.id, row.clone());
        }
        Ok(rows)
    }

    async fn find_defect(&self, id: Uuid) -> Result<Option<defect::Model>, StoreError> {
        Ok(self.tables.read().await.defects.get(&id).cloned())
    }

    async fn delete_defect(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .defects
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("defect {id}")))?;
        for photo in tables.photos.values_mut() {
            if photo.defect_id == Some(id) {
                photo.defect_id = None;
            }
        }
        Ok(())
    }

    async fn insert_photos(&self, photos: Vec<NewPhoto>) -> Result<Vec<photo::Model>, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(orphan) = photos
            .iter()
            .find(|p| !tables.receipts.contains_key(&p.receipt_id))
        {
            return Err(StoreError::ForeignKey(format!(
                "receipt {} does not exist",
                orphan.receipt_id
            )));
        }
        let rows: Vec<photo::Model> = photos
            .into_iter()
            .map(|p| photo::Model {
                id: Uuid::new_v4(),
                receipt_id: p.receipt_id,
                defect_id: p.defect_id,
                photo_url: p.photo_url,
                photo_type: p.photo_type,
                file_size: p.file_size,
                mime_type: p.mime_type,
                uploaded_at: p.uploaded_at,
            })
            .collect();
        for row in &rows {
            tables.photos.insert(row.id, row.clone());
        }
        Ok(rows)
    }

    async fn list_receipts(
        &self,
        filter: &ReceiptFilter,
        page: PageRequest,
    ) -> Result<Page<ReceiptGraph>, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&receipt::Model> = tables
            .receipts
            .values()
            .filter(|r| filter.matches(r))
            .collect();
        newest_first(&mut matching, |r| r.received_at);

        let page = paginate(matching, page);
        let rows = page
            .rows
            .into_iter()
            .map(|r| {
                let mut defects: Vec<defect::Model> = tables
                    .defects
                    .values()
                    .filter(|d| d.receipt_id == r.id)
                    .cloned()
                    .collect();
                defects.sort_by_key(|d| d.created_at);
                let mut photos: Vec<photo::Model> = tables
                    .photos
                    .values()
                    .filter(|p| p.receipt_id == r.id)
                    .cloned()
                    .collect();
                photos.sort_by_key(|p| p.uploaded_at);
                ReceiptGraph {
                    receipt: r.clone(),
                    item: tables.items.get(&r.item_id).cloned(),
                    user: tables.users.get(&r.user_id).cloned(),
                    defects,
                    photos,
                }
            })
            .collect();
        Ok(Page {
            rows,
            total: page.total,
        })
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn find_item(&self, id: Uuid) -> Result<Option<item::Model>, StoreError> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn find_item_by_no(&self, item_no: &str) -> Result<Option<item::Model>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .items
            .values()
            .find(|i| i.item_no == item_no)
            .cloned())
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<Page<item::Model>, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<item::Model> = tables
            .items
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        newest_first(&mut matching, |i| i.created_at);
        Ok(paginate(matching, page))
    }

    async fn insert_item(&self, new: NewItem) -> Result<item::Model, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.item_no_taken(&new.item_no, None) {
            return Err(StoreError::Conflict(format!(
                "item_no {} already exists",
                new.item_no
            )));
        }
        let model = item::Model {
            id: Uuid::new_v4(),
            item_no: new.item_no,
            product_name: new.product_name,
            description: new.description,
            category: new.category,
            status: new.status,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.items.insert(model.id, model.clone());
        Ok(model)
    }

    async fn update_item(
        &self,
        id: Uuid,
        patch: ItemPatch,
    ) -> Result<Option<item::Model>, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(item_no) = patch.item_no.as_deref() {
            if tables.item_no_taken(item_no, Some(id)) {
                return Err(StoreError::Conflict(format!(
                    "item_no {item_no} already exists"
                )));
            }
        }
        let Some(item) = tables.items.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(item_no) = patch.item_no {
            item.item_no = item_no;
        }
        if let Some(product_name) = patch.product_name {
            item.product_name = product_name;
        }
        if let Some(description) = patch.description {
            item.description = Some(description);
        }
        if let Some(category) = patch.category {
            item.category = Some(category);
        }
        if let Some(status) = patch.status {
            item.status = status;
        }
        item.updated_at = Some(Utc::now());
        Ok(Some(item.clone()))
    }

    async fn delete_item(&self, id: Uuid) -> Result<Option<item::Model>, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.receipts.values().any(|r| r.item_id == id) {
            return Err(StoreError::ForeignKey(format!("item {id} is referenced by receipts")));
        }
        Ok(tables.items.remove(&id))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_employee_code(
        &self,
        employee_code: &str,
    ) -> Result<Option<user::Model>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.employee_code == employee_code)
            .cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<user::Model>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<user::Model> = tables
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        newest_first(&mut users, |u| u.created_at);
        Ok(users)
    }

    async fn insert_user(&self, new: NewUser) -> Result<user::Model, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.employee_code == new.employee_code)
        {
            return Err(StoreError::Conflict(format!(
                "employee_code {} already exists",
                new.employee_code
            )));
        }
        if let Some(username) = new.username.as_deref() {
            if tables.username_taken(username, None) {
                return Err(StoreError::Conflict(format!(
                    "username {username} already exists"
                )));
            }
        }
        let model = user::Model {
            id: Uuid::new_v4(),
            employee_code: new.employee_code,
            name: new.name,
            phone: new.phone,
            role: new.role,
            status: UserStatus::Active,
            username: new.username,
            password_hash: new.password_hash,
            created_at: Utc::now(),
            updated_at: None,
        };
        tables.users.insert(model.id, model.clone());
        Ok(model)
    }

    async fn update_user(
        &self,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<Option<user::Model>, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(Some(username)) = patch.username.as_ref() {
            if tables.username_taken(username, Some(id)) {
                return Err(StoreError::Conflict(format!(
                    "username {username} already exists"
                )));
            }
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(phone) = patch.phone {
            user.phone = phone;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(status) = patch.status {
            user.status = status;
        }
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = Some(password_hash);
        }
        user.updated_at = Some(Utc::now());
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.receipts.values().any(|r| r.user_id == id) {
            return Err(StoreError::ForeignKey(format!("user {id} is referenced by receipts")));
        }
        Ok(tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl ProductSubmissionStore for InMemoryStore {
    async fn insert_product_submission(
        &self,
        new: NewProductSubmission,
    ) -> Result<product_submission::Model, StoreError> {
        let model = product_submission::Model {
            id: Uuid::new_v4(),
            employee_id: new.employee_id,
            item_no: new.item_no,
            product_name: new.product_name,
            quantity: new.quantity,
            notes: new.notes,
            photo_url: new.photo_url,
            created_at: new.created_at,
        };
        self.tables
            .write()
            .await
            .product_submissions
            .insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_product_submission(
        &self,
        id: Uuid,
    ) -> Result<Option<product_submission::Model>, StoreError> {
        Ok(self.tables.read().await.product_submissions.get(&id).cloned())
    }

    async fn list_product_submissions(
        &self,
        filter: &ProductSubmissionFilter,
        page: PageRequest,
    ) -> Result<Page<product_submission::Model>, StoreError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<product_submission::Model> = tables
            .product_submissions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        newest_first(&mut matching, |s| s.created_at);
        Ok(paginate(matching, page))
    }
}

#[async_trait]
impl ReceiptNumberGenerator for InMemoryStore {
    async fn next_receipt_no(&self) -> Result<String, StoreError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format_receipt_no(Utc::now().date_naive(), sequence))
    }
}
