use entity::{contact, deal, ticket};
use platform_api::{ApiError, ApiResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::listing::{ListQuery, Page, Searchable, contains_ci, paginate};
use crate::validate::{self, Validator};
use crate::{db_error, now};

const MAX_NAME_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 32;

#[derive(Clone, Debug, Deserialize)]
pub struct ContactInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Partial update. A blank `phone` clears it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContactPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactView {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl From<contact::Model> for ContactView {
    fn from(model: contact::Model) -> Self {
        Self {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            phone: model.phone,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl Searchable for contact::Model {
    fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.first_name, needle)
            || contains_ci(&self.last_name, needle)
            || contains_ci(&format!("{} {}", self.first_name, self.last_name), needle)
            || contains_ci(&self.email, needle)
    }
}

/// Loads a contact only if `owner` owns it.
pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    owner: Uuid,
    id: Uuid,
) -> ApiResult<contact::Model> {
    contact::Entity::find_by_id(id)
        .filter(contact::Column::UserId.eq(owner))
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Contact"))
}

#[instrument(skip_all, fields(%owner))]
pub async fn list(
    db: &DatabaseConnection,
    owner: Uuid,
    query: &ListQuery,
) -> ApiResult<Page<ContactView>> {
    let window = query.window()?;
    let rows = contact::Entity::find()
        .filter(contact::Column::UserId.eq(owner))
        .order_by_asc(contact::Column::CreatedAt)
        .order_by_asc(contact::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(paginate(rows, &window).map(ContactView::from))
}

#[instrument(skip_all, fields(%owner))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    owner: Uuid,
    input: ContactInput,
) -> ApiResult<ContactView> {
    let mut v = Validator::default();
    let first_name = v.check(
        "first_name",
        validate::required_text(&input.first_name, MAX_NAME_LEN),
    );
    let last_name = v.check(
        "last_name",
        validate::required_text(&input.last_name, MAX_NAME_LEN),
    );
    let email = v.check("email", validate::email(&input.email));
    let phone = v.check(
        "phone",
        validate::optional_text(input.phone.as_deref(), MAX_PHONE_LEN),
    );
    v.finish()?;

    let ts = now();
    let created = contact::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(owner),
        first_name: Set(first_name.unwrap_or_default()),
        last_name: Set(last_name.unwrap_or_default()),
        email: Set(email.unwrap_or_default()),
        phone: Set(phone.flatten()),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(contact_id = %created.id, "contact created");
    Ok(created.into())
}

pub async fn get(db: &DatabaseConnection, owner: Uuid, id: Uuid) -> ApiResult<ContactView> {
    find_owned(db, owner, id).await.map(ContactView::from)
}

#[instrument(skip_all, fields(%owner, contact_id = %id))]
pub async fn update(
    db: &DatabaseConnection,
    owner: Uuid,
    id: Uuid,
    patch: ContactPatch,
) -> ApiResult<ContactView> {
    let mut v = Validator::default();
    let first_name = patch.first_name.as_deref().and_then(|raw| {
        v.check("first_name", validate::required_text(raw, MAX_NAME_LEN))
    });
    let last_name = patch.last_name.as_deref().and_then(|raw| {
        v.check("last_name", validate::required_text(raw, MAX_NAME_LEN))
    });
    let email = patch
        .email
        .as_deref()
        .and_then(|raw| v.check("email", validate::email(raw)));
    let phone = patch.phone.as_deref().and_then(|raw| {
        v.check("phone", validate::optional_text(Some(raw), MAX_PHONE_LEN))
    });
    v.finish()?;

    let current = find_owned(db, owner, id).await?;
    let mut active: contact::ActiveModel = current.into();
    if let Some(first_name) = first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = last_name {
        active.last_name = Set(last_name);
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(phone) = phone {
        active.phone = Set(phone);
    }
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(updated.into())
}

/// Deletes the contact along with its deals and tickets.
#[instrument(skip_all, fields(%owner, contact_id = %id))]
pub async fn delete(db: &DatabaseConnection, owner: Uuid, id: Uuid) -> ApiResult<()> {
    let txn = db.begin().await.map_err(db_error)?;
    find_owned(&txn, owner, id).await?;
    let deals = deal::Entity::delete_many()
        .filter(deal::Column::ContactId.eq(id))
        .exec(&txn)
        .await
        .map_err(db_error)?;
    let tickets = ticket::Entity::delete_many()
        .filter(ticket::Column::ContactId.eq(id))
        .exec(&txn)
        .await
        .map_err(db_error)?;
    contact::Entity::delete_by_id(id)
        .exec(&txn)
        .await
        .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;
    info!(
        deals = deals.rows_affected,
        tickets = tickets.rows_affected,
        "contact deleted"
    );
    Ok(())
}
