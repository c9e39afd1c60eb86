use std::future::{ready, Ready};

use actix_identity::{Identity, IdentityExt};
use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use serde::{Deserialize, Serialize};

use crate::{
    db,
    errors::AppError,
    structs::User,
    utils::verify_password,
    AppState,
};

/// Identity of the logged-in user, carried in the identity cookie and
/// extracted per request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            admin: user.admin,
        }
    }
}

impl CurrentUser {
    pub fn home_path(&self) -> &'static str {
        if self.admin {
            "/admin"
        } else {
            "/dashboard"
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Unknown email and wrong password both come back as `InvalidCredentials`.
pub async fn login(state: &AppState, email: &str, password: &str) -> Result<CurrentUser, AppError> {
    let email = normalize_email(email);
    let user = db::get_user_by_email(state, &email).await.map_err(|e| {
        log::error!("Failed to look up user: {}", e);
        AppError::SqlxError(e)
    })?;

    match user {
        Some(user) => match verify_password(password, &user.pwd_hash) {
            Ok(true) => Ok(CurrentUser::from(&user)),
            Ok(false) | Err(_) => {
                log::warn!("Failed login attempt for user id {}", user.id);
                Err(AppError::InvalidCredentials)
            }
        },
        None => {
            log::warn!("Failed login attempt for unknown email");
            Err(AppError::InvalidCredentials)
        }
    }
}

pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let name = name.trim();
    let email = normalize_email(email);
    if name.is_empty() {
        return Err(AppError::MissingField("nome"));
    }
    if email.is_empty() {
        return Err(AppError::MissingField("email"));
    }
    if password.is_empty() {
        return Err(AppError::MissingField("senha"));
    }
    db::create_user(state, name.to_owned(), email, password, false).await
}

/// Attaches `user` to the client's session, replacing any previous identity.
pub fn start_session(request: &HttpRequest, user: &CurrentUser) -> Result<(), AppError> {
    let id = serde_json::to_string(user)?;
    Identity::login(&request.extensions(), id).map_err(|e| {
        log::error!("Failed to attach identity: {}", e);
        AppError::IdentityError(e.to_string())
    })?;
    Ok(())
}

pub fn end_session(identity: Option<Identity>) {
    if let Some(identity) = identity {
        identity.logout();
    }
}

pub(crate) fn current_user(req: &HttpRequest) -> Result<CurrentUser, AppError> {
    let identity = req.get_identity().map_err(|_| AppError::MissingSession)?;
    let id = identity.id().map_err(|_| AppError::MissingSession)?;
    serde_json::from_str(&id).map_err(|e| {
        log::warn!("Discarding unreadable session identity: {}", e);
        AppError::MissingSession
    })
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(current_user(req))
    }
}
