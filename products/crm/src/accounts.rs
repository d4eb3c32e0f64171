//! Registration, cookie sessions and self-service profile management.

use entity::{admin_claim, contact, deal, ticket, user, user_secret};
use platform_api::{ApiError, ApiResult};
use platform_authn::{
    AuthConfig, AuthnError, TokenKind, decode_token, hash_password, issue_token, verify_password,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, TransactionTrait,
    prelude::DateTimeWithTimeZone, sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::validate::{self, Validator};
use crate::{db_error, now};

pub const MAX_USERNAME_LEN: usize = 64;

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: user::Role,
    pub created_at: DateTimeWithTimeZone,
}

impl From<user::Model> for UserView {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: model.role,
            created_at: model.created_at,
        }
    }
}

/// Freshly minted access and refresh tokens for a login.
#[derive(Clone, Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

fn authn_internal(err: AuthnError) -> ApiError {
    ApiError::internal(anyhow::Error::new(err))
}

pub async fn find_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> ApiResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Rejects a username or email already held by an account other than `except`.
async fn ensure_unique<C: ConnectionTrait>(
    conn: &C,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<Uuid>,
) -> ApiResult<()> {
    let taken = |found: Option<user::Model>| found.is_some_and(|u| Some(u.id) != except);
    if let Some(email) = email {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await
            .map_err(db_error)?;
        if taken(found) {
            return Err(ApiError::Conflict("email is already registered".into()));
        }
    }
    if let Some(username) = username {
        let found = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(conn)
            .await
            .map_err(db_error)?;
        if taken(found) {
            return Err(ApiError::Conflict("username is already taken".into()));
        }
    }
    Ok(())
}

const FIRST_ADMIN_SLOT: &str = "first-account";

/// Hands the administrator slot to `user_id` unless an earlier account holds it.
///
/// The slot is a primary key, so concurrent sign-ups race on one insert and
/// exactly one of them sees a row written.
async fn claim_admin_slot<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> ApiResult<bool> {
    let written = admin_claim::Entity::insert(admin_claim::ActiveModel {
        slot: Set(FIRST_ADMIN_SLOT.to_string()),
        user_id: Set(user_id),
        claimed_at: Set(now()),
    })
    .on_conflict(
        OnConflict::column(admin_claim::Column::Slot)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await
    .map_err(db_error)?;
    Ok(written == 1)
}

/// Creates an account. The very first account becomes the administrator.
#[instrument(skip_all, fields(username = %input.username))]
pub async fn register<C>(db: &C, input: RegisterInput) -> ApiResult<UserView>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut v = Validator::default();
    let username = v.check(
        "username",
        validate::required_text(&input.username, MAX_USERNAME_LEN),
    );
    let email = v.check("email", validate::email(&input.email));
    v.check("password", validate::password(&input.password));
    v.check(
        "confirm_password",
        validate::confirmation(&input.password, input.confirm_password.as_deref()),
    );
    v.finish()?;
    let username = username.unwrap_or_default();
    let email = email.unwrap_or_default();

    let password_hash = hash_password(&input.password).map_err(authn_internal)?;
    // Losing a race after this check still ends in 409 via the unique indexes.
    ensure_unique(db, Some(&username), Some(&email), None).await?;

    // Writes come first so SQLite takes the write lock when the transaction
    // starts instead of upgrading a read lock later.
    let txn = db.begin().await.map_err(db_error)?;
    let ts = now();
    let created = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username),
        email: Set(email),
        role: Set(user::Role::Member),
        is_active: Set(true),
        created_at: Set(ts),
        updated_at: Set(ts),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    user_secret::ActiveModel {
        user_id: Set(created.id),
        password_hash: Set(password_hash),
        updated_at: Set(ts),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    let created = if claim_admin_slot(&txn, created.id).await? {
        let mut active: user::ActiveModel = created.into();
        active.role = Set(user::Role::Admin);
        active.update(&txn).await.map_err(db_error)?
    } else {
        created
    };
    txn.commit().await.map_err(db_error)?;

    info!(user_id = %created.id, role = ?created.role, "account registered");
    Ok(created.into())
}

fn issue_session(user_id: Uuid, auth: &AuthConfig) -> ApiResult<SessionTokens> {
    Ok(SessionTokens {
        access_token: issue_token(user_id, TokenKind::Access, auth).map_err(authn_internal)?,
        refresh_token: issue_token(user_id, TokenKind::Refresh, auth).map_err(authn_internal)?,
    })
}

#[instrument(skip_all)]
pub async fn login(
    db: &DatabaseConnection,
    auth: &AuthConfig,
    input: LoginInput,
) -> ApiResult<(UserView, SessionTokens)> {
    let email = input.email.trim().to_lowercase();
    let rejected = || ApiError::Unauthorized("invalid email or password".into());

    let Some(user) = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(db)
        .await
        .map_err(db_error)?
    else {
        warn!(target: "security", "login attempt for unknown email");
        return Err(rejected());
    };
    let secret = user_secret::Entity::find_by_id(user.id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(rejected)?;
    if !verify_password(&input.password, &secret.password_hash).map_err(authn_internal)? {
        warn!(target: "security", user_id = %user.id, "login attempt with wrong password");
        return Err(rejected());
    }
    if !user.is_active {
        warn!(target: "security", user_id = %user.id, "login attempt for disabled account");
        return Err(ApiError::Unauthorized("account is disabled".into()));
    }

    let tokens = issue_session(user.id, auth)?;
    info!(user_id = %user.id, "login succeeded");
    Ok((user.into(), tokens))
}

/// Checks the cookie pair a browser presents.
///
/// Missing cookies are `401`, an expired access token `403`, an unreadable
/// one `400`, and a token for a deleted account `404`.
pub async fn verify_session(
    db: &DatabaseConnection,
    auth: &AuthConfig,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
) -> ApiResult<user::Model> {
    let (Some(access_token), Some(_)) = (access_token, refresh_token) else {
        return Err(ApiError::Unauthorized("session cookies are missing".into()));
    };
    let claims =
        decode_token(access_token, TokenKind::Access, auth).map_err(|err| match err {
            AuthnError::Expired => ApiError::Forbidden("access token has expired".into()),
            _ => ApiError::BadRequest("invalid access token".into()),
        })?;
    find_user(db, claims.sub).await
}

/// Resolves the caller of an authenticated route. Every failure is `401`.
pub async fn authenticate_access(
    db: &DatabaseConnection,
    auth: &AuthConfig,
    access_token: &str,
) -> ApiResult<user::Model> {
    let claims =
        decode_token(access_token, TokenKind::Access, auth).map_err(|err| match err {
            AuthnError::Expired => ApiError::Unauthorized("access token has expired".into()),
            _ => ApiError::Unauthorized("invalid access token".into()),
        })?;
    active_user(db, claims.sub).await
}

async fn active_user(db: &DatabaseConnection, id: Uuid) -> ApiResult<user::Model> {
    match user::Entity::find_by_id(id).one(db).await.map_err(db_error)? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(ApiError::Unauthorized("account is not available".into())),
    }
}

/// Trades a refresh token for a new access token.
pub async fn refresh_session(
    db: &DatabaseConnection,
    auth: &AuthConfig,
    refresh_token: Option<&str>,
) -> ApiResult<String> {
    let refresh_token = refresh_token
        .ok_or_else(|| ApiError::Unauthorized("refresh token is missing".into()))?;
    let claims = decode_token(refresh_token, TokenKind::Refresh, auth).map_err(|err| {
        warn!(target: "security", error = %err, "refresh token rejected");
        ApiError::Unauthorized("invalid refresh token".into())
    })?;
    let user = active_user(db, claims.sub).await?;
    issue_token(user.id, TokenKind::Access, auth).map_err(authn_internal)
}

#[instrument(skip_all, fields(%user_id))]
pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    patch: ProfilePatch,
) -> ApiResult<UserView> {
    let mut v = Validator::default();
    let username = patch.username.as_deref().and_then(|raw| {
        v.check(
            "username",
            validate::required_text(raw, MAX_USERNAME_LEN),
        )
    });
    let email = patch
        .email
        .as_deref()
        .and_then(|raw| v.check("email", validate::email(raw)));
    v.finish()?;

    let current = find_user(db, user_id).await?;
    ensure_unique(db, username.as_deref(), email.as_deref(), Some(user_id)).await?;

    let mut active: user::ActiveModel = current.into();
    if let Some(username) = username {
        active.username = Set(username);
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(updated.into())
}

#[instrument(skip_all, fields(%user_id))]
pub async fn change_password(
    db: &DatabaseConnection,
    user_id: Uuid,
    input: PasswordChange,
) -> ApiResult<()> {
    let mut v = Validator::default();
    v.check("new_password", validate::password(&input.new_password));
    v.check(
        "confirm_password",
        validate::confirmation(&input.new_password, input.confirm_password.as_deref()),
    );
    v.finish()?;

    let secret = user_secret::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User"))?;
    if !verify_password(&input.current_password, &secret.password_hash)
        .map_err(authn_internal)?
    {
        warn!(target: "security", %user_id, "password change with wrong current password");
        return Err(ApiError::BadRequest("current password is incorrect".into()));
    }

    let password_hash = hash_password(&input.new_password).map_err(authn_internal)?;
    let mut active: user_secret::ActiveModel = secret.into();
    active.password_hash = Set(password_hash);
    active.updated_at = Set(now());
    active.update(db).await.map_err(db_error)?;
    info!("password changed");
    Ok(())
}

/// Removes the account together with every contact, deal and ticket it owns.
#[instrument(skip_all, fields(%user_id))]
pub async fn delete_account(db: &DatabaseConnection, user_id: Uuid) -> ApiResult<()> {
    let txn = db.begin().await.map_err(db_error)?;
    find_user(&txn, user_id).await?;

    let contact_ids: Vec<Uuid> = contact::Entity::find()
        .select_only()
        .column(contact::Column::Id)
        .filter(contact::Column::UserId.eq(user_id))
        .into_tuple()
        .all(&txn)
        .await
        .map_err(db_error)?;

    let tickets = ticket::Entity::delete_many()
        .filter(
            Condition::any()
                .add(ticket::Column::UserId.eq(user_id))
                .add(ticket::Column::ContactId.is_in(contact_ids.clone())),
        )
        .exec(&txn)
        .await
        .map_err(db_error)?;
    let deals = deal::Entity::delete_many()
        .filter(
            Condition::any()
                .add(deal::Column::UserId.eq(user_id))
                .add(deal::Column::ContactId.is_in(contact_ids)),
        )
        .exec(&txn)
        .await
        .map_err(db_error)?;
    let contacts = contact::Entity::delete_many()
        .filter(contact::Column::UserId.eq(user_id))
        .exec(&txn)
        .await
        .map_err(db_error)?;
    user_secret::Entity::delete_by_id(user_id)
        .exec(&txn)
        .await
        .map_err(db_error)?;
    user::Entity::delete_by_id(user_id)
        .exec(&txn)
        .await
        .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;

    info!(
        contacts = contacts.rows_affected,
        deals = deals.rows_affected,
        tickets = tickets.rows_affected,
        "account deleted"
    );
    Ok(())
}
