//! Support tickets. Authors manage their own; administrators manage all.

use entity::ticket::{self, Status};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Action, PolicyEngine, Subject};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Select, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::contacts::find_owned;
use crate::listing::{ListQuery, Page, PageNumber, Searchable, contains_ci, paginate};
use crate::validate::{self, Validator};
use crate::{db_error, now, parse_id};

const MAX_SUBJECT_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TicketListQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub page: Option<PageNumber>,
    pub per_page: Option<PageNumber>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TicketInput {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub contact_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TicketPatch {
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub subject: String,
    pub message: String,
    pub status: Status,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl From<ticket::Model> for TicketView {
    fn from(model: ticket::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            contact_id: model.contact_id,
            subject: model.subject,
            message: model.message,
            status: model.status,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl Searchable for ticket::Model {
    fn matches(&self, needle: &str) -> bool {
        contains_ci(&self.subject, needle) || contains_ci(&self.message, needle)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCounts {
    pub open: u64,
    pub closed: u64,
    pub total: u64,
}

impl TicketCounts {
    fn tally(rows: &[ticket::Model]) -> Self {
        let open = rows.iter().filter(|t| t.status == Status::Open).count() as u64;
        let total = rows.len() as u64;
        Self {
            open,
            closed: total - open,
            total,
        }
    }
}

/// A page of tickets plus counts over every ticket in scope, ignoring filters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketPage {
    #[serde(flatten)]
    pub page: Page<TicketView>,
    pub counts: TicketCounts,
}

pub fn parse_status(raw: &str) -> Result<Status, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "open" => Ok(Status::Open),
        "closed" => Ok(Status::Closed),
        _ => Err("must be open or closed".into()),
    }
}

async fn list_scoped(
    db: &DatabaseConnection,
    select: Select<ticket::Entity>,
    query: &TicketListQuery,
) -> ApiResult<TicketPage> {
    let window = ListQuery {
        q: query.q.clone(),
        page: query.page,
        per_page: query.per_page,
    }
    .window()?;
    let mut v = Validator::default();
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) if raw.eq_ignore_ascii_case("all") => None,
        Some(raw) => v.check("status", parse_status(raw)),
    };
    v.finish()?;

    let rows = select
        .order_by_asc(ticket::Column::CreatedAt)
        .order_by_asc(ticket::Column::Id)
        .all(db)
        .await
        .map_err(db_error)?;
    let counts = TicketCounts::tally(&rows);
    let rows = match status {
        Some(status) => rows.into_iter().filter(|t| t.status == status).collect(),
        None => rows,
    };
    Ok(TicketPage {
        page: paginate(rows, &window).map(TicketView::from),
        counts,
    })
}

/// The caller's own tickets.
pub async fn list_mine(
    db: &DatabaseConnection,
    subject: &Subject,
    query: &TicketListQuery,
) -> ApiResult<TicketPage> {
    let select = ticket::Entity::find().filter(ticket::Column::UserId.eq(subject.user_id));
    list_scoped(db, select, query).await
}

/// Every ticket in the system. Administrators only.
#[instrument(skip_all, fields(user_id = %subject.user_id))]
pub async fn list_all(
    db: &DatabaseConnection,
    subject: &Subject,
    query: &TicketListQuery,
) -> ApiResult<TicketPage> {
    PolicyEngine.check(subject, Action::ListAllTickets).map_err(|err| {
        warn!(target: "security", error = %err, "ticket listing denied");
        ApiError::Forbidden("administrator role required".into())
    })?;
    list_scoped(db, ticket::Entity::find(), query).await
}

#[instrument(skip_all, fields(user_id = %subject.user_id))]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    subject: &Subject,
    input: TicketInput,
) -> ApiResult<TicketView> {
    let mut v = Validator::default();
    let title = v.check(
        "subject",
        validate::required_text(&input.subject, MAX_SUBJECT_LEN),
    );
    let message = v.check(
        "message",
        validate::required_text(&input.message, MAX_MESSAGE_LEN),
    );
    v.finish()?;

    let contact_id = match input.contact_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let id = parse_id("contact_id", raw)?;
            match find_owned(db, subject.user_id, id).await {
                Ok(contact) => Some(contact.id),
                Err(ApiError::NotFound(_)) => {
                    return Err(ApiError::field("contact_id", "unknown contact"));
                }
                Err(err) => return Err(err),
            }
        }
    };

    let ts = now();
    let created = ticket::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(subject.user_id),
        contact_id: Set(contact_id),
        subject: Set(title.unwrap_or_default()),
        message: Set(message.unwrap_or_default()),
        status: Set(Status::Open),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(db)
    .await
    .map_err(db_error)?;
    info!(ticket_id = %created.id, "ticket opened");
    Ok(created.into())
}

/// Loads a ticket the caller may act on; anything else reads as missing.
async fn find_accessible(
    db: &DatabaseConnection,
    subject: &Subject,
    id: Uuid,
) -> ApiResult<ticket::Model> {
    let found = ticket::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(db_error)?;
    match found {
        Some(ticket) if PolicyEngine.can_touch_ticket(subject, ticket.user_id) => Ok(ticket),
        _ => Err(ApiError::not_found("Ticket")),
    }
}

pub async fn get(db: &DatabaseConnection, subject: &Subject, id: Uuid) -> ApiResult<TicketView> {
    find_accessible(db, subject, id).await.map(TicketView::from)
}

#[instrument(skip_all, fields(user_id = %subject.user_id, ticket_id = %id))]
pub async fn update(
    db: &DatabaseConnection,
    subject: &Subject,
    id: Uuid,
    patch: TicketPatch,
) -> ApiResult<TicketView> {
    let mut v = Validator::default();
    let title = patch
        .subject
        .as_deref()
        .and_then(|raw| v.check("subject", validate::required_text(raw, MAX_SUBJECT_LEN)));
    let message = patch
        .message
        .as_deref()
        .and_then(|raw| v.check("message", validate::required_text(raw, MAX_MESSAGE_LEN)));
    let status = patch
        .status
        .as_deref()
        .and_then(|raw| v.check("status", parse_status(raw)));
    v.finish()?;

    let current = find_accessible(db, subject, id).await?;
    let mut active: ticket::ActiveModel = current.into();
    if let Some(title) = title {
        active.subject = Set(title);
    }
    if let Some(message) = message {
        active.message = Set(message);
    }
    if let Some(status) = status {
        active.status = Set(status);
    }
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(updated.into())
}

pub async fn close(db: &DatabaseConnection, subject: &Subject, id: Uuid) -> ApiResult<TicketView> {
    update(
        db,
        subject,
        id,
        TicketPatch {
            status: Some("closed".into()),
            ..TicketPatch::default()
        },
    )
    .await
}

#[instrument(skip_all, fields(user_id = %subject.user_id, ticket_id = %id))]
pub async fn delete(db: &DatabaseConnection, subject: &Subject, id: Uuid) -> ApiResult<()> {
    find_accessible(db, subject, id).await?;
    ticket::Entity::delete_by_id(id)
        .exec(db)
        .await
        .map_err(db_error)?;
    info!("ticket deleted");
    Ok(())
}
