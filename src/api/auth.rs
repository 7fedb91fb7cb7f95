/*!
Registration, login, and the username-availability probe.

Both login types run the same lookup-plus-hash check; `loginType`
"admin" just additionally requires the account's role to be `admin`.
The default admin account is seeded at startup from configuration.
*/
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AuthResult, MIN_PASSWORD_LENGTH};
use crate::config::Glob;
use crate::store::DbError;
use crate::user::Role;
use super::{ApiError, respond_ok};

/// One message for every admin-path failure; which part was wrong is
/// nobody's business.
static ADMIN_REJECT: &str = "Administrator username or password incorrect.";

#[derive(Debug, Deserialize)]
pub struct RegisterData {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "loginType")]
    pub login_type: Option<String>,
}

pub async fn register(
    Extension(glob): Extension<Arc<Glob>>,
    Json(form): Json<RegisterData>,
) -> Result<Response, ApiError> {
    log::trace!("auth::register( {:?} ) called.", &form.username);

    let uname = form.username.as_deref().map(str::trim).unwrap_or("");
    let password = form.password.as_deref().unwrap_or("");
    if uname.is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Username and password are both required.".to_owned()
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "The password must be at least {} characters.",
            MIN_PASSWORD_LENGTH
        )));
    }

    if glob.store.get_user_by_uname(uname).await?.is_some() {
        return Err(ApiError::Conflict(
            "That username is already registered.".to_owned()
        ));
    }

    // The registration gate: accounts only for enrolled students.
    if !glob.store.student_name_exists(uname).await? {
        return Err(ApiError::Forbidden(
            "No enrolled student matches that name; please see an administrator.".to_owned()
        ));
    }

    let user = glob.store.insert_user(uname, Role::User).await?;
    glob.auth.add_user(uname, password).await?;

    log::info!("Registered new user {:?}.", &user.uname);
    Ok(respond_ok(
        StatusCode::CREATED,
        Some(json!({ "username": user.uname, "role": user.role })),
        "Registration successful; you can now log in.",
    ))
}

pub async fn login(
    Extension(glob): Extension<Arc<Glob>>,
    Json(form): Json<LoginData>,
) -> Result<Response, ApiError> {
    log::trace!(
        "auth::login( {:?}, [ password ], {:?} ) called.",
        &form.username, &form.login_type
    );

    let uname = form.username.as_deref().map(str::trim).unwrap_or("");
    let password = form.password.as_deref().unwrap_or("");
    let login_type = form.login_type.as_deref().unwrap_or("");
    if uname.is_empty() || password.is_empty() || login_type.is_empty() {
        return Err(ApiError::Validation(
            "Please supply username, password, and login type.".to_owned()
        ));
    }

    let want_admin = match login_type {
        "admin" => true,
        "user" => false,
        _ => {
            return Err(ApiError::Validation(
                "Invalid login type.".to_owned()
            ));
        },
    };

    let user = match glob.store.get_user_by_uname(uname).await? {
        Some(u) => u,
        None => {
            let msg = if want_admin {
                ADMIN_REJECT.to_owned()
            } else {
                "No such user; please register first.".to_owned()
            };
            return Err(ApiError::Auth(msg));
        },
    };

    if want_admin && user.role != Role::Admin {
        return Err(ApiError::Auth(ADMIN_REJECT.to_owned()));
    }

    match glob.auth.check_password_and_issue_key(uname, password).await? {
        AuthResult::Key(key) => {
            log::info!("User {:?} ({}) logged in.", &user.uname, &user.role);
            Ok(respond_ok(
                StatusCode::OK,
                Some(json!({
                    "username": user.uname,
                    "role": user.role,
                    "key": key,
                })),
                "Login successful.",
            ))
        },
        AuthResult::BadPassword => {
            let msg = if want_admin {
                ADMIN_REJECT.to_owned()
            } else {
                "Password incorrect.".to_owned()
            };
            Err(ApiError::Auth(msg))
        },
        AuthResult::NoSuchUser => {
            // Present in the record store but missing on the auth side;
            // a seeding or registration write must have half-failed.
            log::warn!(
                "User {:?} has a profile but no auth record.", uname
            );
            Err(ApiError::Auth(
                "That account cannot log in; please see an administrator.".to_owned()
            ))
        },
        x => {
            log::warn!(
                "check_password_and_issue_key( {:?} ) returned {:?}, which shouldn't happen.",
                uname, &x
            );
            Err(ApiError::Db(DbError::from(format!(
                "Unexpected auth result: {:?}", &x
            ))))
        },
    }
}

pub async fn check_username(
    Extension(glob): Extension<Arc<Glob>>,
    Path(uname): Path<String>,
) -> Result<Response, ApiError> {
    log::trace!("auth::check_username( {:?} ) called.", &uname);

    let exists = glob.store.get_user_by_uname(uname.trim()).await?.is_some();

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "exists": exists }))
    ).into_response())
}
