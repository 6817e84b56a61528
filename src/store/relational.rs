//! sea-orm backed store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, Set,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    format_receipt_no, ItemFilter, ItemPatch, ItemStore, NewDefect, NewItem, NewPhoto,
    NewProductSubmission, NewReceipt, NewUser, Page, PageRequest, ProductSubmissionFilter,
    ProductSubmissionStore, ReceiptFilter, ReceiptGraph, ReceiptNumberGenerator, ReceiptStore,
    StoreError, UserPatch, UserStore,
};
use crate::db::DbPool;
use crate::models::{
    defect, item, photo, product_submission, receipt, receipt_sequence, user, UserRole,
    UserStatus,
};

/// Store backed by a sea-orm connection pool.
#[derive(Clone)]
pub struct RelationalStore {
    db: Arc<DbPool>,
}

impl RelationalStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    fn receipt_query(filter: &ReceiptFilter) -> Select<receipt::Entity> {
        let mut query = receipt::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(receipt::Column::Status.eq(status));
        }
        if let Some(item_id) = filter.item_id {
            query = query.filter(receipt::Column::ItemId.eq(item_id));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(receipt::Column::UserId.eq(user_id));
        }
        if let Some(from) = filter.received_from {
            query = query.filter(receipt::Column::ReceivedAt.gte(from));
        }
        if let Some(to) = filter.received_to {
            query = query.filter(receipt::Column::ReceivedAt.lte(to));
        }
        query
    }

    /// Loads the items, users, defects and photos for a page of receipts with
    /// one query per table.
    async fn load_graphs(
        &self,
        receipts: Vec<receipt::Model>,
    ) -> Result<Vec<ReceiptGraph>, StoreError> {
        if receipts.is_empty() {
            return Ok(Vec::new());
        }
        let db = &*self.db;
        let receipt_ids: Vec<Uuid> = receipts.iter().map(|r| r.id).collect();
        let item_ids: Vec<Uuid> = receipts.iter().map(|r| r.item_id).collect();
        let user_ids: Vec<Uuid> = receipts.iter().map(|r| r.user_id).collect();

        let items: HashMap<Uuid, item::Model> = item::Entity::find()
            .filter(item::Column::Id.is_in(item_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let users: HashMap<Uuid, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut defects: HashMap<Uuid, Vec<defect::Model>> = HashMap::new();
        for d in defect::Entity::find()
            .filter(defect::Column::ReceiptId.is_in(receipt_ids.clone()))
            .order_by_asc(defect::Column::CreatedAt)
            .all(db)
            .await?
        {
            defects.entry(d.receipt_id).or_default().push(d);
        }
        let mut photos: HashMap<Uuid, Vec<photo::Model>> = HashMap::new();
        for p in photo::Entity::find()
            .filter(photo::Column::ReceiptId.is_in(receipt_ids))
            .order_by_asc(photo::Column::UploadedAt)
            .all(db)
            .await?
        {
            photos.entry(p.receipt_id).or_default().push(p);
        }

        Ok(receipts
            .into_iter()
            .map(|r| ReceiptGraph {
                item: items.get(&r.item_id).cloned(),
                user: users.get(&r.user_id).cloned(),
                defects: defects.remove(&r.id).unwrap_or_default(),
                photos: photos.remove(&r.id).unwrap_or_default(),
                receipt: r,
            })
            .collect())
    }
}

#[async_trait]
impl ReceiptStore for RelationalStore {
    #[instrument(skip(self, new), fields(receipt_no = %new.receipt_no))]
    async fn insert_receipt(&self, new: NewReceipt) -> Result<receipt::Model, StoreError> {
        let active = receipt::ActiveModel {
            id: Set(Uuid::new_v4()),
            receipt_no: Set(new.receipt_no),
            item_id: Set(new.item_id),
            user_id: Set(new.user_id),
            qr_code: Set(new.qr_code),
            quantity: Set(new.quantity),
            defect_quantity: Set(new.defect_quantity),
            status: Set(new.status),
            location: Set(new.location),
            notes: Set(new.notes),
            received_at: Set(new.received_at),
            updated_at: Set(None),
        };
        Ok(active.insert(&*self.db).await?)
    }

    async fn find_receipt(&self, id: Uuid) -> Result<Option<receipt::Model>, StoreError> {
        Ok(receipt::Entity::find_by_id(id).one(&*self.db).await?)
    }

    #[instrument(skip(self))]
    async fn update_defect_quantity(
        &self,
        id: Uuid,
        defect_quantity: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = receipt::Entity::update_many()
            .col_expr(receipt::Column::DefectQuantity, Expr::value(defect_quantity))
            .col_expr(receipt::Column::UpdatedAt, Expr::value(updated_at))
            .filter(receipt::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("receipt {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_receipt(&self, id: Uuid) -> Result<(), StoreError> {
        let result = receipt::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("receipt {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, defects), fields(count = defects.len()))]
    async fn insert_defects(
        &self,
        defects: Vec<NewDefect>,
    ) -> Result<Vec<defect::Model>, StoreError> {
        if defects.is_empty() {
            return Ok(Vec::new());
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
        let actives = rows.iter().map(|d| defect::ActiveModel {
            id: Set(d.id),
            receipt_id: Set(d.receipt_id),
            defect_type: Set(d.defect_type.clone()),
            defect_description: Set(d.defect_description.clone()),
            quantity: Set(d.quantity),
            severity: Set(d.severity),
            checklist_data: Set(d.checklist_data.clone()),
            created_at: Set(d.created_at),
        });
        defect::Entity::insert_many(actives)
            .exec_without_returning(&*self.db)
            .await?;
        Ok(rows)
    }

    async fn find_defect(&self, id: Uuid) -> Result<Option<defect::Model>, StoreError> {
        Ok(defect::Entity::find_by_id(id).one(&*self.db).await?)
    }

    #[instrument(skip(self))]
    async fn delete_defect(&self, id: Uuid) -> Result<(), StoreError> {
        let result = defect::Entity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound(format!("defect {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, photos), fields(count = photos.len()))]
    async fn insert_photos(&self, photos: Vec<NewPhoto>) -> Result<Vec<photo::Model>, StoreError> {
        if photos.is_empty() {
            return Ok(Vec::new());
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
        let actives = rows.iter().map(|p| photo::ActiveModel {
            id: Set(p.id),
            receipt_id: Set(p.receipt_id),
            defect_id: Set(p.defect_id),
            photo_url: Set(p.photo_url.clone()),
            photo_type: Set(p.photo_type),
            file_size: Set(p.file_size),
            mime_type: Set(p.mime_type.clone()),
            uploaded_at: Set(p.uploaded_at),
        });
        photo::Entity::insert_many(actives)
            .exec_without_returning(&*self.db)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn list_receipts(
        &self,
        filter: &ReceiptFilter,
        page: PageRequest,
    ) -> Result<Page<ReceiptGraph>, StoreError> {
        let query = Self::receipt_query(filter);
        let total = query.clone().count(&*self.db).await?;
        let receipts = query
            .order_by_desc(receipt::Column::ReceivedAt)
            .offset(page.offset)
            .limit(page.limit)
            .all(&*self.db)
            .await?;
        let rows = self.load_graphs(receipts).await?;
        Ok(Page { rows, total })
    }
}

#[async_trait]
impl ItemStore for RelationalStore {
    async fn find_item(&self, id: Uuid) -> Result<Option<item::Model>, StoreError> {
        Ok(item::Entity::find_by_id(id).one(&*self.db).await?)
    }

    async fn find_item_by_no(&self, item_no: &str) -> Result<Option<item::Model>, StoreError> {
        Ok(item::Entity::find()
            .filter(item::Column::ItemNo.eq(item_no))
            .one(&*self.db)
            .await?)
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        page: PageRequest,
    ) -> Result<Page<item::Model>, StoreError> {
        let mut query = item::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(item::Column::Status.eq(status));
        }
        if let Some(category) = filter.category.as_deref() {
            query = query.filter(item::Column::Category.eq(category));
        }
        let total = query.clone().count(&*self.db).await?;
        let rows = query
            .order_by_desc(item::Column::CreatedAt)
            .offset(page.offset)
            .limit(page.limit)
            .all(&*self.db)
            .await?;
        Ok(Page { rows, total })
    }

    #[instrument(skip(self, new), fields(item_no = %new.item_no))]
    async fn insert_item(&self, new: NewItem) -> Result<item::Model, StoreError> {
        let active = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_no: Set(new.item_no),
            product_name: Set(new.product_name),
            description: Set(new.description),
            category: Set(new.category),
            status: Set(new.status),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        Ok(active.insert(&*self.db).await?)
    }

    #[instrument(skip(self, patch))]
    async fn update_item(
        &self,
        id: Uuid,
        patch: ItemPatch,
    ) -> Result<Option<item::Model>, StoreError> {
        let Some(existing) = item::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        let mut active: item::ActiveModel = existing.into();
        if let Some(item_no) = patch.item_no {
            active.item_no = Set(item_no);
        }
        if let Some(product_name) = patch.product_name {
            active.product_name = Set(product_name);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(category) = patch.category {
            active.category = Set(Some(category));
        }
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Some(Utc::now()));
        Ok(Some(active.update(&*self.db).await?))
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, id: Uuid) -> Result<Option<item::Model>, StoreError> {
        let Some(existing) = item::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        item::Entity::delete_by_id(id).exec(&*self.db).await?;
        Ok(Some(existing))
    }
}

#[async_trait]
impl UserStore for RelationalStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find_by_id(id).one(&*self.db).await?)
    }

    async fn find_user_by_employee_code(
        &self,
        employee_code: &str,
    ) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find()
            .filter(user::Column::EmployeeCode.eq(employee_code))
            .one(&*self.db)
            .await?)
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, StoreError> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&*self.db)
            .await?)
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<user::Model>, StoreError> {
        let mut query = user::Entity::find();
        if let Some(role) = role {
            query = query.filter(user::Column::Role.eq(role));
        }
        Ok(query
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, new), fields(employee_code = %new.employee_code))]
    async fn insert_user(&self, new: NewUser) -> Result<user::Model, StoreError> {
        let active = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_code: Set(new.employee_code),
            name: Set(new.name),
            phone: Set(new.phone),
            role: Set(new.role),
            status: Set(UserStatus::Active),
            username: Set(new.username),
            password_hash: Set(new.password_hash),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        Ok(active.insert(&*self.db).await?)
    }

    #[instrument(skip(self, patch))]
    async fn update_user(
        &self,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<Option<user::Model>, StoreError> {
        let Some(existing) = user::Entity::find_by_id(id).one(&*self.db).await? else {
            return Ok(None);
        };
        let mut active: user::ActiveModel = existing.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(phone) = patch.phone {
            active.phone = Set(phone);
        }
        if let Some(role) = patch.role {
            active.role = Set(role);
        }
        if let Some(status) = patch.status {
            active.status = Set(status);
        }
        if let Some(username) = patch.username {
            active.username = Set(username);
        }
        if let Some(password_hash) = patch.password_hash {
            active.password_hash = Set(Some(password_hash));
        }
        active.updated_at = Set(Some(Utc::now()));
        Ok(Some(active.update(&*self.db).await?))
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = user::Entity::delete_by_id(id).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl ProductSubmissionStore for RelationalStore {
    #[instrument(skip(self, new))]
    async fn insert_product_submission(
        &self,
        new: NewProductSubmission,
    ) -> Result<product_submission::Model, StoreError> {
        let active = product_submission::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(new.employee_id),
            item_no: Set(new.item_no),
            product_name: Set(new.product_name),
            quantity: Set(new.quantity),
            notes: Set(new.notes),
            photo_url: Set(new.photo_url),
            created_at: Set(new.created_at),
        };
        Ok(active.insert(&*self.db).await?)
    }

    async fn find_product_submission(
        &self,
        id: Uuid,
    ) -> Result<Option<product_submission::Model>, StoreError> {
        Ok(product_submission::Entity::find_by_id(id)
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_product_submissions(
        &self,
        filter: &ProductSubmissionFilter,
        page: PageRequest,
    ) -> Result<Page<product_submission::Model>, StoreError> {
        let mut query = product_submission::Entity::find();
        if let Some(employee_id) = filter.employee_id {
            query = query.filter(product_submission::Column::EmployeeId.eq(employee_id));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(product_submission::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(product_submission::Column::CreatedAt.lte(to));
        }
        let total = query.clone().count(&*self.db).await?;
        let rows = query
            .order_by_desc(product_submission::Column::CreatedAt)
            .offset(page.offset)
            .limit(page.limit)
            .all(&*self.db)
            .await?;
        Ok(Page { rows, total })
    }
}

#[async_trait]
impl ReceiptNumberGenerator for RelationalStore {
    /// Inserts into `receipt_sequences` and formats the generated id, so two
    /// concurrent requests can never be handed the same number.
    async fn next_receipt_no(&self) -> Result<String, StoreError> {
        let issued_at = Utc::now();
        let issued = receipt_sequence::ActiveModel {
            issued_at: Set(issued_at),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;
        let sequence = u64::try_from(issued.id)
            .map_err(|_| StoreError::Backend(format!("invalid sequence value {}", issued.id)))?;
        Ok(format_receipt_no(issued_at.date_naive(), sequence))
    }
}
