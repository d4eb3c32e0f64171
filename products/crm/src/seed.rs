//! Demo fixtures for local development.

use entity::{contact, user};
use platform_api::{ApiError, ApiResult};
use platform_authz::Subject;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::accounts::{self, RegisterInput};
use crate::contacts::{self, ContactInput};
use crate::deals::{self, DealInput};
use crate::tickets::{self, TicketInput};
use crate::{db_error, now};

pub const DEMO_USERNAME: &str = "admin";
pub const DEMO_EMAIL: &str = "admin@crm.test";
pub const DEMO_PASSWORD: &str = "adminpass";

const DEMO_CONTACTS: &[(&str, &str, &str, Option<&str>)] = &[
    ("Ada", "Lovelace", "ada@analytical.test", Some("+1-555-0100")),
    ("Grace", "Hopper", "grace@cobol.test", Some("+1-555-0200")),
    ("Alan", "Turing", "alan@bletchley.test", None),
];

const DEMO_DEALS: &[(&str, f64, &str, usize)] = &[
    ("Analytical engine retrofit", 12_500.0, "open", 0),
    ("Compiler training", 4_200.0, "won", 1),
    ("Codebreaking audit", 9_800.0, "lost", 2),
];

const DEMO_TICKETS: &[(&str, &str, Option<usize>)] = &[
    ("Invoice copy", "Please resend the March invoice.", Some(0)),
    ("Login trouble", "The dashboard logs me out after a minute.", None),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub admin_id: Uuid,
    /// `false` when the demo data was already present.
    pub created: bool,
}

/// Creates the demo administrator with sample contacts, deals and tickets.
///
/// Everything lands in one transaction. Running it again is a no-op once the
/// demo account owns its contacts; a demo account without them is completed.
pub async fn seed_demo(db: &DatabaseConnection) -> ApiResult<SeedReport> {
    let txn = db.begin().await.map_err(db_error)?;
    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(DEMO_EMAIL))
        .one(&txn)
        .await
        .map_err(db_error)?;
    let account = match existing {
        Some(account) => {
            let seeded = contact::Entity::find()
                .filter(contact::Column::UserId.eq(account.id))
                .one(&txn)
                .await
                .map_err(db_error)?
                .is_some();
            if seeded {
                info!(admin_id = %account.id, "demo data already present");
                return Ok(SeedReport {
                    admin_id: account.id,
                    created: false,
                });
            }
            account
        }
        None => {
            let registered = accounts::register(
                &txn,
                RegisterInput {
                    username: DEMO_USERNAME.into(),
                    email: DEMO_EMAIL.into(),
                    password: DEMO_PASSWORD.into(),
                    confirm_password: None,
                },
            )
            .await?;
            accounts::find_user(&txn, registered.id).await?
        }
    };
    let admin = if account.role == user::Role::Admin {
        account
    } else {
        let mut active: user::ActiveModel = account.into();
        active.role = Set(user::Role::Admin);
        active.updated_at = Set(now());
        active.update(&txn).await.map_err(db_error)?
    };

    let mut contact_ids = Vec::with_capacity(DEMO_CONTACTS.len());
    for (first, last, email, phone) in DEMO_CONTACTS {
        let contact = contacts::create(
            &txn,
            admin.id,
            ContactInput {
                first_name: (*first).into(),
                last_name: (*last).into(),
                email: (*email).into(),
                phone: phone.map(str::to_string),
            },
        )
        .await?;
        contact_ids.push(contact.id);
    }

    let contact_at = |index: usize| {
        contact_ids
            .get(index)
            .copied()
            .ok_or_else(|| ApiError::internal(anyhow::anyhow!("demo contact {index} missing")))
    };
    for (title, amount, status, contact) in DEMO_DEALS {
        deals::create(
            &txn,
            admin.id,
            DealInput {
                title: (*title).into(),
                amount: Some(*amount),
                status: Some((*status).into()),
                contact_id: contact_at(*contact)?.to_string(),
            },
        )
        .await?;
    }

    let subject = Subject {
        user_id: admin.id,
        role: admin.role,
    };
    for (title, message, contact) in DEMO_TICKETS {
        let contact_id = match contact {
            Some(index) => Some(contact_at(*index)?.to_string()),
            None => None,
        };
        tickets::create(
            &txn,
            &subject,
            TicketInput {
                subject: (*title).into(),
                message: (*message).into(),
                contact_id,
            },
        )
        .await?;
    }

    txn.commit().await.map_err(db_error)?;
    info!(
        admin_id = %admin.id,
        contacts = DEMO_CONTACTS.len(),
        deals = DEMO_DEALS.len(),
        tickets = DEMO_TICKETS.len(),
        "demo data seeded"
    );
    Ok(SeedReport {
        admin_id: admin.id,
        created: true,
    })
}
