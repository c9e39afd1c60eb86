use crate::{
    db,
    errors::AppError,
    structs::{NewRequest, ReimbursementRequest, RequestStatus, RequestWithOwner, StatusPolicy},
    AppState,
};

/// Uploaded receipt as received from the client.
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub filename: String,
    pub body: Vec<u8>,
}

/// Parses the submitted amount. Accepts a comma as decimal separator.
pub fn parse_amount(raw: &str) -> Result<f64, AppError> {
    let normalized = raw.trim().replace(',', ".");
    match normalized.parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(AppError::InvalidAmount(raw.to_owned())),
    }
}

/// Stores the receipt (when present and allowed) and then the request row.
/// The two writes are independent: a failed insert leaves the file behind.
pub async fn submit(
    state: &AppState,
    owner_id: i64,
    request: NewRequest,
    receipt: Option<ReceiptUpload>,
) -> Result<ReimbursementRequest, AppError> {
    let receipt_path = match receipt {
        Some(upload) if !upload.filename.is_empty() => {
            state.receipts.save(owner_id, &upload.filename, &upload.body).await?
        }
        _ => None,
    };

    let created = db::insert_request(state, owner_id, &request, receipt_path.as_deref())
        .await
        .map_err(|e| {
            log::error!("Failed to insert request for user {}: {}", owner_id, e);
            AppError::SqlxError(e)
        })?;
    log::info!(
        "Request {} submitted by user {} (receipt: {})",
        created.id,
        owner_id,
        created.receipt_path.as_deref().unwrap_or("-")
    );
    Ok(created)
}

pub async fn list_own(state: &AppState, owner_id: i64) -> Result<Vec<ReimbursementRequest>, AppError> {
    Ok(db::get_requests_by_owner(state, owner_id).await?)
}

pub async fn list_all(state: &AppState) -> Result<Vec<RequestWithOwner>, AppError> {
    Ok(db::get_all_requests_with_owner(state).await?)
}

pub async fn set_status(state: &AppState, request_id: i64, status: &str) -> Result<(), AppError> {
    match state.status_policy {
        StatusPolicy::Permissive => {
            let touched = db::update_request_status(state, request_id, status).await?;
            if touched == 0 {
                log::warn!("Status update for unknown request {}", request_id);
            } else {
                log::info!("Request {} set to {:?}", request_id, status);
            }
            Ok(())
        }
        StatusPolicy::Strict => {
            let next: RequestStatus = status.parse()?;
            let current = db::get_request_by_id(state, request_id)
                .await?
                .ok_or(AppError::NotFound)?;
            let allowed = current
                .status
                .parse::<RequestStatus>()
                .map(|from| from.can_transition_to(next))
                .unwrap_or(false);
            if !allowed {
                return Err(AppError::InvalidTransition {
                    from: current.status,
                    to: next.to_string(),
                });
            }
            db::update_request_status(state, request_id, next.as_str()).await?;
            log::info!("Request {} moved {} -> {}", request_id, current.status, next);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_state, test_state_with_policy};

    fn sample(description: &str) -> NewRequest {
        NewRequest {
            description: description.into(),
            amount: 42.5,
            date: "2025-03-14".into(),
            category: "Transporte".into(),
            notes: "táxi".into(),
        }
    }

    async fn user(state: &AppState, email: &str) -> i64 {
        db::create_user(state, "U".into(), email.into(), "pw", false)
            .await
            .unwrap()
            .id
    }

    #[test]
    fn amount_accepts_comma_and_rejects_garbage() {
        assert_eq!(parse_amount(" 12,50 ").unwrap(), 12.5);
        assert_eq!(parse_amount("100").unwrap(), 100.0);
        assert!(matches!(parse_amount("doze"), Err(AppError::InvalidAmount(_))));
        assert!(parse_amount("").is_err());
        assert!(parse_amount("NaN").is_err());
    }

    #[actix_web::test]
    async fn submit_starts_pending_and_stores_allowed_receipt() {
        let (state, dir) = test_state().await;
        let owner = user(&state, "a@x.com").await;

        let created = submit(
            &state,
            owner,
            sample("Almoço"),
            Some(ReceiptUpload {
                filename: "Recibo Almoço.JPG".into(),
                body: b"jpeg".to_vec(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(created.status, "Pendente");
        assert_eq!(created.owner_id, owner);
        assert_eq!(created.amount, 42.5);
        let stored = created.receipt_path.unwrap();
        assert_eq!(stored, format!("{}_Recibo_Almoco.JPG", owner));
        assert!(dir.path().join(stored).exists());
    }

    #[actix_web::test]
    async fn submit_with_exe_keeps_request_but_no_file() {
        let (state, dir) = test_state().await;
        let owner = user(&state, "a@x.com").await;

        let created = submit(
            &state,
            owner,
            sample("Software"),
            Some(ReceiptUpload {
                filename: "instalador.exe".into(),
                body: b"MZ".to_vec(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(created.receipt_path, None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(list_own(&state, owner).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn list_own_is_scoped_to_owner() {
        let (state, _dir) = test_state().await;
        let ana = user(&state, "ana@x.com").await;
        let bia = user(&state, "bia@x.com").await;
        for i in 0..3 {
            submit(&state, ana, sample(&format!("ana {}", i)), None).await.unwrap();
            submit(&state, bia, sample(&format!("bia {}", i)), None).await.unwrap();
        }

        let own = list_own(&state, ana).await.unwrap();
        assert_eq!(own.len(), 3);
        assert!(own.iter().all(|r| r.owner_id == ana));
        assert_eq!(own[0].description, "ana 0");
        assert_eq!(list_all(&state).await.unwrap().len(), 6);
    }

    #[actix_web::test]
    async fn permissive_policy_persists_any_string() {
        let (state, _dir) = test_state().await;
        let owner = user(&state, "a@x.com").await;
        let created = submit(&state, owner, sample("x"), None).await.unwrap();

        set_status(&state, created.id, "Aprovado").await.unwrap();
        set_status(&state, created.id, "QualquerValor").await.unwrap();
        let row = db::get_request_by_id(&state, created.id).await.unwrap().unwrap();
        assert_eq!(row.status, "QualquerValor");

        // unknown ids are silently ignored
        set_status(&state, 9_999, "Aprovado").await.unwrap();
    }

    #[actix_web::test]
    async fn strict_policy_enforces_transition_table() {
        let (state, _dir) = test_state_with_policy(StatusPolicy::Strict).await;
        let owner = user(&state, "a@x.com").await;
        let created = submit(&state, owner, sample("x"), None).await.unwrap();

        assert!(matches!(
            set_status(&state, created.id, "QualquerValor").await,
            Err(AppError::UnknownStatus(_))
        ));
        assert!(matches!(
            set_status(&state, 9_999, "Aprovado").await,
            Err(AppError::NotFound)
        ));

        set_status(&state, created.id, "Rejeitado").await.unwrap();
        assert!(matches!(
            set_status(&state, created.id, "Aprovado").await,
            Err(AppError::InvalidTransition { .. })
        ));
        let row = db::get_request_by_id(&state, created.id).await.unwrap().unwrap();
        assert_eq!(row.status, "Rejeitado");
    }
}
