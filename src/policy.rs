//! Route capabilities. Each extractor runs before the handler body, so a
//! handler that takes one never touches data without the capability.

use std::{
    future::{ready, Ready},
    ops::Deref,
};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::{
    auth::{current_user, CurrentUser},
    errors::AppError,
};

/// Any logged-in user.
#[derive(Debug, Clone)]
pub struct AnySession(pub CurrentUser);

/// A logged-in user without the admin flag.
#[derive(Debug, Clone)]
pub struct NonAdminOwner(pub CurrentUser);

/// A logged-in administrator.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub CurrentUser);

pub fn require_session(user: Result<CurrentUser, AppError>) -> Result<AnySession, AppError> {
    user.map(AnySession)
}

pub fn require_non_admin(user: Result<CurrentUser, AppError>) -> Result<NonAdminOwner, AppError> {
    match user? {
        user if !user.admin => Ok(NonAdminOwner(user)),
        _ => Err(AppError::ForbiddenRole),
    }
}

pub fn require_admin(user: Result<CurrentUser, AppError>) -> Result<AdminOnly, AppError> {
    match user? {
        user if user.admin => Ok(AdminOnly(user)),
        _ => Err(AppError::ForbiddenRole),
    }
}

macro_rules! capability_extractor {
    ($name:ident, $check:path) => {
        impl FromRequest for $name {
            type Error = AppError;
            type Future = Ready<Result<Self, Self::Error>>;

            fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
                let outcome = $check(current_user(req));
                if let Err(e) = &outcome {
                    log::info!("{} denied for {}: {}", stringify!($name), req.path(), e);
                }
                ready(outcome)
            }
        }

        impl Deref for $name {
            type Target = CurrentUser;

            fn deref(&self) -> &CurrentUser {
                &self.0
            }
        }
    };
}

capability_extractor!(AnySession, require_session);
capability_extractor!(NonAdminOwner, require_non_admin);
capability_extractor!(AdminOnly, require_admin);
