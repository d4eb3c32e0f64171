use entity::deal::{self, Status};
use platform_api::{ApiError, ApiResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::contacts::find_owned;
use crate::listing::{ListQuery, Page, PageNumber, Searchable, contains_ci, paginate};
use crate::validate::{self, Validator};
use crate::{db_error, now};

const MAX_TITLE_LEN: usize = 200;

/// Query string for `GET /deal`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DealListQuery {
    pub q: Option<String>,
    /// An exact status, or `all`.
    pub status: Option<String>,
    pub contact_id: Option<String>,
    pub page: Option<PageNumber>,
    pub per_page: Option<PageNumber>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DealInput {
    pub title: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    pub contact_id: String,
}

/// Partial update. An explicit `"amount": null` clears the amount.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DealPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub amount: Option<Option<f64>>,
    pub status: Option<String>,
    pub contact_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealView {
    pub id: Uuid,
    pub contact_id: Uuid,
    pub title: String,
    pub amount: Option<f64>,
    pub status: Status,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl From<deal::Model> for DealView {
    fn from(model: deal::Model) -> Self {
        Self {
            id: model.id,
            contact_id: model.contact_id,
            title: model.title,
            amount: model.amount_cents.map(|cents| cents as f64 / 100.0),
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl Searchable for deal::Model {
    fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.title, needle)
    }
}

/// Tells a field sent as `null` (`Some(None)`) apart from one left out (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn parse_status(raw: &str) -> Result<Status, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "open" => Ok(Status::Open),
        "won" => Ok(Status::Won),
        "lost" => Ok(Status::Lost),
        "closed" => Ok(Status::Closed),
        _ => Err("must be one of open, won, lost, closed".into()),
    }
}

/// `None` means no status filter.
fn status_filter(raw: Option<&str>) -> Result<Option<Status>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) if value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => parse_status(value).map(Some),
    }
}

fn id_field(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw.trim()).map_err(|_| "must be a valid id".to_string())
}

#[instrument(skip_all, fields(%owner))]
pub async fn list(
    db: &DatabaseConnection,
    owner: Uuid,
    query: &DealListQuery,
) -> ApiResult<Page<DealView>> {
    let window = ListQuery {
        q: query.q.clone(),
        page: query.page,
        per_page: query.per_page,
    }
    .window()?;
    let mut v = Validator::default();
    let status = v
        .check("status", status_filter(query.status.as_deref()))
        .flatten();
    let contact_id = query
        .contact_id
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| v.check("contact_id", id_field(raw)));
    v.finish()?;

    let mut select = deal::Entity::find().filter(deal::Column::UserId.eq(owner));
    if let Some(status) = status {
        select = select.filter(deal::Column::Status.eq(status));
    }
    if let Some(contact_id) = contact_id {
        select = select.filter(deal::Column::ContactId.eq(contact_id));
    }
    let rows = select
        .order_by_asc(deal::Column::CreatedAt)
        .order_by_asc(deal::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(paginate(rows, &window).map(DealView::from))
}

/// The inner `Err` is a field message for `contact_id`; the outer one is a database failure.
async fn owned_contact_id<C: ConnectionTrait>(
    conn: &C,
    owner: Uuid,
    raw: &str,
) -> ApiResult<Result<Uuid, String>> {
    let Ok(id) = id_field(raw) else {
        return Ok(Err("must be a valid id".into()));
    };
    match find_owned(conn, owner, id).await {
        Ok(contact) => Ok(Ok(contact.id)),
        Err(ApiError::NotFound(_)) => Ok(Err("unknown contact".into())),
        Err(err) => Err(err),
    }
}

#[instrument(skip_all, fields(%owner))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    owner: Uuid,
    input: DealInput,
) -> ApiResult<DealView> {
    let mut v = Validator::default();
    let title = v.check("title", validate::required_text(&input.title, MAX_TITLE_LEN));
    let amount_cents = v.check("amount", validate::amount_cents(input.amount));
    let status = input
        .status
        .as_deref()
        .and_then(|raw| v.check("status", parse_status(raw)));
    let contact_id = v.check(
        "contact_id",
        owned_contact_id(db, owner, &input.contact_id).await?,
    );
    v.finish()?;
    let contact_id = contact_id.unwrap_or_default();

    let ts = now();
    let created = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(owner),
        contact_id: Set(contact_id),
        title: Set(title.unwrap_or_default()),
        amount_cents: Set(amount_cents.flatten()),
        status: Set(status.unwrap_or_default()),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(deal_id = %created.id, %contact_id, "deal created");
    Ok(created.into())
}

async fn find_deal(db: &DatabaseConnection, owner: Uuid, id: Uuid) -> ApiResult<deal::Model> {
    deal::Entity::find_by_id(id)
        .filter(deal::Column::UserId.eq(owner))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Deal"))
}

pub async fn get(db: &DatabaseConnection, owner: Uuid, id: Uuid) -> ApiResult<DealView> {
    find_deal(db, owner, id).await.map(DealView::from)
}

#[instrument(skip_all, fields(%owner, deal_id = %id))]
pub async fn update(
    db: &DatabaseConnection,
    owner: Uuid,
    id: Uuid,
    patch: DealPatch,
) -> ApiResult<DealView> {
    let mut v = Validator::default();
    let title = patch
        .title
        .as_deref()
        .and_then(|raw| v.check("title", validate::required_text(raw, MAX_TITLE_LEN)));
    let amount_cents = patch
        .amount
        .and_then(|amount| v.check("amount", validate::amount_cents(amount)));
    let status = patch
        .status
        .as_deref()
        .and_then(|raw| v.check("status", parse_status(raw)));
    let contact_id = match patch.contact_id.as_deref() {
        Some(raw) => v.check("contact_id", owned_contact_id(db, owner, raw).await?),
        None => None,
    };
    v.finish()?;

    let current = find_deal(db, owner, id).await?;

    let mut active: deal::ActiveModel = current.into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(cents) = amount_cents {
        active.amount_cents = Set(cents);
    }
    if let Some(status) = status {
        active.status = Set(status);
    }
    if let Some(contact_id) = contact_id {
        active.contact_id = Set(contact_id);
    }
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(updated.into())
}

#[instrument(skip_all, fields(%owner, deal_id = %id))]
pub async fn delete(db: &DatabaseConnection, owner: Uuid, id: Uuid) -> ApiResult<()> {
    find_deal(db, owner, id).await?;
    deal::Entity::delete_by_id(id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!("deal deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::{self, ContactInput, ContactView};
    use crate::testing;

    async fn contact(db: &DatabaseConnection, owner: Uuid, first: &str) -> ContactView {
        contacts::create(
            db,
            owner,
            ContactInput {
                first_name: first.into(),
                last_name: "Example".into(),
                email: format!("{}@example.com", first.to_lowercase()),
                phone: None,
            },
        )
        .await
        .unwrap()
    }

    fn deal_input(title: &str, status: Option<&str>, contact_id: Uuid) -> DealInput {
        DealInput {
            title: title.into(),
            amount: Some(1500.5),
            status: status.map(str::to_string),
            contact_id: contact_id.to_string(),
        }
    }

    #[test]
    fn status_parsing_ignores_case() {
        assert_eq!(parse_status("Won"), Ok(Status::Won));
        assert_eq!(parse_status(" CLOSED "), Ok(Status::Closed));
        assert!(parse_status("pending").is_err());
        assert_eq!(status_filter(Some("All")), Ok(None));
        assert_eq!(status_filter(None), Ok(None));
        assert_eq!(status_filter(Some("lost")), Ok(Some(Status::Lost)));
    }

    #[tokio::test]
    async fn create_defaults_status_and_stores_cents() {
        let db = testing::db().await;
        let owner = testing::user(&db, "ada").await.id;
        let c = contact(&db, owner, "Alan").await;
        let created = create(&db, owner, deal_input("Enigma", None, c.id))
            .await
            .unwrap();
        assert_eq!(created.status, Status::Open);
        assert_eq!(created.amount, Some(1500.5));
        let row = deal::Entity::find_by_id(created.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.amount_cents, Some(150_050));
    }

    #[tokio::test]
    async fn foreign_or_unknown_contact_is_a_field_error() {
        let db = testing::db().await;
        let ada = testing::user(&db, "ada").await.id;
        let grace = testing::user(&db, "grace").await.id;
        let graces = contact(&db, grace, "Howard").await;

        for raw in [graces.id.to_string(), Uuid::new_v4().to_string(), "x".into()] {
            let err = create(
                &db,
                ada,
                DealInput {
                    title: "Steal".into(),
                    amount: None,
                    status: None,
                    contact_id: raw,
                },
            )
            .await
            .unwrap_err();
            let ApiError::Validation(fields) = err else {
                panic!("expected validation error");
            };
            assert_eq!(fields[0].field, "contact_id");
        }
    }

    #[tokio::test]
    async fn bad_contact_is_reported_with_the_other_fields() {
        let db = testing::db().await;
        let owner = testing::user(&db, "ada").await.id;
        let c = contact(&db, owner, "Alan").await;
        let err = create(
            &db,
            owner,
            DealInput {
                title: " ".into(),
                amount: None,
                status: None,
                contact_id: Uuid::new_v4().to_string(),
            },
        )
        .await
        .unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["title", "contact_id"]);

        let created = create(&db, owner, deal_input("Enigma", None, c.id))
            .await
            .unwrap();
        let err = update(
            &db,
            owner,
            created.id,
            DealPatch {
                status: Some("maybe".into()),
                contact_id: Some("not-an-id".into()),
                ..DealPatch::default()
            },
        )
        .await
        .unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].field, "contact_id");
        assert_eq!(fields[1].message, "must be a valid id");
    }

    #[test]
    fn patch_tells_null_amount_from_missing() {
        let cleared: DealPatch = serde_json::from_str(r#"{"amount":null}"#).unwrap();
        assert_eq!(cleared.amount, Some(None));
        let missing: DealPatch = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(missing.amount, None);
        let set: DealPatch = serde_json::from_str(r#"{"amount":12.5}"#).unwrap();
        assert_eq!(set.amount, Some(Some(12.5)));
    }

    #[tokio::test]
    async fn null_amount_clears_and_missing_amount_keeps() {
        let db = testing::db().await;
        let owner = testing::user(&db, "ada").await.id;
        let c = contact(&db, owner, "Alan").await;
        let created = create(&db, owner, deal_input("Enigma", None, c.id))
            .await
            .unwrap();

        let kept = update(
            &db,
            owner,
            created.id,
            DealPatch {
                title: Some("Enigma II".into()),
                ..DealPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(kept.amount, Some(1500.5));

        let cleared = update(
            &db,
            owner,
            created.id,
            DealPatch {
                amount: Some(None),
                ..DealPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.amount, None);
        assert_eq!(cleared.title, "Enigma II");
    }

    #[tokio::test]
    async fn negative_amount_and_bad_status_are_rejected() {
        let db = testing::db().await;
        let owner = testing::user(&db, "ada").await.id;
        let c = contact(&db, owner, "Alan").await;
        let err = create(
            &db,
            owner,
            DealInput {
                title: "".into(),
                amount: Some(-3.0),
                status: Some("maybe".into()),
                contact_id: c.id.to_string(),
            },
        )
        .await
        .unwrap_err();
        let ApiError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(names, ["title", "amount", "status"]);
    }

    #[tokio::test]
    async fn list_filters_by_status_contact_and_title() {
        let db = testing::db().await;
        let owner = testing::user(&db, "ada").await.id;
        let alan = contact(&db, owner, "Alan").await;
        let grace = contact(&db, owner, "Grace").await;
        create(&db, owner, deal_input("Bombe upgrade", Some("Open"), alan.id))
            .await
            .unwrap();
        create(&db, owner, deal_input("Bombe support", Some("won"), alan.id))
            .await
            .unwrap();
        create(&db, owner, deal_input("Compiler", Some("WON"), grace.id))
            .await
            .unwrap();

        let won = list(
            &db,
            owner,
            &DealListQuery {
                status: Some("won".into()),
                ..DealListQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(won.total, 2);

        let alans_bombes = list(
            &db,
            owner,
            &DealListQuery {
                q: Some("bombe".into()),
                status: Some("all".into()),
                contact_id: Some(alan.id.to_string()),
                ..DealListQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(alans_bombes.total, 2);

        let bad = list(
            &db,
            owner,
            &DealListQuery {
                status: Some("pending".into()),
                ..DealListQuery::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(bad, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn update_and_delete_are_owner_scoped() {
        let db = testing::db().await;
        let ada = testing::user(&db, "ada").await.id;
        let grace = testing::user(&db, "grace").await.id;
        let alan = contact(&db, ada, "Alan").await;
        let other = contact(&db, ada, "Alonzo").await;
        let created = create(&db, ada, deal_input("Enigma", None, alan.id))
            .await
            .unwrap();

        let updated = update(
            &db,
            ada,
            created.id,
            DealPatch {
                status: Some("Lost".into()),
                contact_id: Some(other.id.to_string()),
                ..DealPatch::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, Status::Lost);
        assert_eq!(updated.contact_id, other.id);
        assert_eq!(updated.title, "Enigma");
        assert_eq!(updated.amount, Some(1500.5));

        assert!(matches!(
            update(&db, grace, created.id, DealPatch::default())
                .await
                .unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            delete(&db, grace, created.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        delete(&db, ada, created.id).await.unwrap();
        assert!(matches!(
            get(&db, ada, created.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
