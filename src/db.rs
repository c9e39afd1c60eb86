use crate::{
    errors::AppError,
    structs::{NewRequest, ReimbursementRequest, RequestStatus, RequestWithOwner, User},
    utils::hash_password,
    AppState,
};

pub const ADMIN_EMAIL: &str = "admin@reembolso.com";
const ADMIN_NAME: &str = "Admin";
const ADMIN_PASSWORD: &str = "admin";

/// Seeds the administrator account on first boot. Returns whether a row was
/// created.
pub async fn bootstrap_admin(state: &AppState) -> Result<bool, AppError> {
    if get_user_by_email(state, ADMIN_EMAIL).await?.is_some() {
        return Ok(false);
    }
    create_user(
        state,
        ADMIN_NAME.to_owned(),
        ADMIN_EMAIL.to_owned(),
        ADMIN_PASSWORD,
        true,
    )
    .await?;
    log::info!("Default admin account {} created", ADMIN_EMAIL);
    Ok(true)
}

pub async fn get_user_by_email(state: &AppState, email: &str) -> Result<Option<User>, sqlx::Error> {
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&pool)
        .await?;
    Ok(user)
}

pub async fn count_users(state: &AppState) -> Result<i64, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
}

pub async fn create_user(
    state: &AppState,
    name: String,
    email: String,
    password: &str,
    admin: bool,
) -> Result<User, AppError> {
    let created_at = chrono::Utc::now().to_rfc3339();
    let pwd_hash = hash_password(password)?;
    let pool = state.db_pool.clone();
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, pwd_hash, admin, created_at) VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(name)
    .bind(email)
    .bind(pwd_hash)
    .bind(admin)
    .bind(&created_at)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        let duplicate = e
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);
        if duplicate {
            AppError::DuplicateEmail
        } else {
            log::error!("Failed to insert user: {}", e);
            AppError::SqlxError(e)
        }
    })?;
    log::info!("User created: id={} admin={}", user.id, user.admin);
    Ok(user)
}

pub async fn insert_request(
    state: &AppState,
    owner_id: i64,
    request: &NewRequest,
    receipt_path: Option<&str>,
) -> Result<ReimbursementRequest, sqlx::Error> {
    let created_at = chrono::Utc::now().to_rfc3339();
    let pool = state.db_pool.clone();
    let row = sqlx::query_as::<_, ReimbursementRequest>(
        r#"
        INSERT INTO requests
            (owner_id, description, amount, date, category, notes, receipt_path, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(owner_id)
    .bind(&request.description)
    .bind(request.amount)
    .bind(&request.date)
    .bind(&request.category)
    .bind(&request.notes)
    .bind(receipt_path)
    .bind(RequestStatus::Pending.as_str())
    .bind(&created_at)
    .fetch_one(&pool)
    .await?;
    Ok(row)
}

pub async fn get_requests_by_owner(
    state: &AppState,
    owner_id: i64,
) -> Result<Vec<ReimbursementRequest>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, ReimbursementRequest>(
        "SELECT * FROM requests WHERE owner_id = $1 ORDER BY id",
    )
    .bind(owner_id)
    .fetch_all(&pool)
    .await
}

pub async fn get_all_requests_with_owner(
    state: &AppState,
) -> Result<Vec<RequestWithOwner>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, RequestWithOwner>(
        r#"
        SELECT r.id, r.owner_id, u.name AS owner_name, r.description, r.amount,
               r.date, r.category, r.notes, r.receipt_path, r.status
        FROM requests r
        JOIN users u ON r.owner_id = u.id
        ORDER BY r.id
        "#,
    )
    .fetch_all(&pool)
    .await
}

pub async fn get_request_by_id(
    state: &AppState,
    id: i64,
) -> Result<Option<ReimbursementRequest>, sqlx::Error> {
    let pool = state.db_pool.clone();
    sqlx::query_as::<_, ReimbursementRequest>("SELECT * FROM requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await
}

/// Overwrites the status column. Returns the number of rows touched, zero
/// when `id` does not exist.
pub async fn update_request_status(
    state: &AppState,
    id: i64,
    status: &str,
) -> Result<u64, sqlx::Error> {
    let pool = state.db_pool.clone();
    let result = sqlx::query("UPDATE requests SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(id)
        .execute(&pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn receipt_belongs_to(
    state: &AppState,
    receipt_path: &str,
    owner_id: i64,
) -> Result<bool, sqlx::Error> {
    let pool = state.db_pool.clone();
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM requests WHERE receipt_path = $1 AND owner_id = $2",
    )
    .bind(receipt_path)
    .bind(owner_id)
    .fetch_one(&pool)
    .await?;
    Ok(count > 0)
}
