use std::collections::HashMap;

use actix_files::NamedFile;
use actix_identity::Identity;
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{
    get,
    http::header,
    post,
    web::{self, Data},
    HttpRequest, HttpResponse,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use tera::Context;

use crate::{
    auth::{self, CurrentUser},
    db,
    errors::AppError,
    flash,
    lifecycle::{self, parse_amount, ReceiptUpload},
    policy::{AdminOnly, AnySession, NonAdminOwner},
    structs::NewRequest,
    AppState, TEMPLATES,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index_handler)
        .service(login_form_handler)
        .service(register_handler)
        .service(register_form_handler)
        .service(dashboard_handler)
        .service(new_request_handler)
        .service(new_request_form_handler)
        .service(receipt_handler)
        .service(admin_handler)
        .service(update_status_handler)
        .service(logout_handler);
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn page_context(title: &str, session: &Session) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("flashes", &flash::take(session));
    context.insert("version", env!("CARGO_PKG_VERSION"));
    context
}

fn render(template: &str, context: &Context) -> Result<HttpResponse, AppError> {
    let rendered = TEMPLATES.render(template, context).map_err(|e| {
        log::error!("Failed to render template: {}", e);
        AppError::TemplateError(e)
    })?;

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(rendered))
}

/// Login view, or the role's home when already logged in.
#[get("/")]
pub async fn index_handler(
    user: Option<CurrentUser>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if let Some(user) = user {
        return Ok(redirect(user.home_path()));
    }
    render("login.html", &page_context("Entrar", &session))
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    senha: String,
}

#[post("/login")]
pub async fn login_form_handler(
    web::Form(form): web::Form<LoginForm>,
    state: Data<AppState>,
    request: HttpRequest,
    session: Session,
) -> Result<HttpResponse, AppError> {
    match auth::login(&state, &form.email, &form.senha).await {
        Ok(user) => {
            auth::start_session(&request, &user)?;
            log::info!("User {} logged in (admin={})", user.id, user.admin);
            Ok(redirect(user.home_path()))
        }
        Err(AppError::InvalidCredentials) => {
            flash::push(&session, "Usuário ou senha inválidos.")?;
            Ok(redirect("/"))
        }
        Err(e) => Err(e),
    }
}

#[get("/registrar")]
pub async fn register_handler(session: Session) -> Result<HttpResponse, AppError> {
    render("registro.html", &page_context("Criar conta", &session))
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    nome: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    senha: String,
}

#[post("/registrar")]
pub async fn register_form_handler(
    web::Form(form): web::Form<RegisterForm>,
    state: Data<AppState>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    match auth::register(&state, &form.nome, &form.email, &form.senha).await {
        Ok(_) => {
            flash::push(&session, "Conta criada com sucesso! Faça login.")?;
            Ok(redirect("/"))
        }
        Err(AppError::DuplicateEmail) => {
            flash::push(
                &session,
                "Erro ao criar conta — email pode já estar cadastrado.",
            )?;
            Ok(redirect("/registrar"))
        }
        Err(AppError::MissingField(field)) => {
            flash::push(&session, format!("Preencha o campo {}.", field))?;
            Ok(redirect("/registrar"))
        }
        Err(e) => Err(e),
    }
}

#[get("/dashboard")]
pub async fn dashboard_handler(
    user: NonAdminOwner,
    state: Data<AppState>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let requests = lifecycle::list_own(&state, user.id).await?;

    let mut context = page_context("Minhas solicitações", &session);
    context.insert("usuario", &user.name);
    context.insert("solicitacoes", &requests);
    render("dashboard.html", &context)
}

#[get("/nova")]
pub async fn new_request_handler(
    _user: NonAdminOwner,
    session: Session,
) -> Result<HttpResponse, AppError> {
    render("nova_solicitacao.html", &page_context("Nova solicitação", &session))
}

struct SubmissionForm {
    fields: HashMap<String, String>,
    receipt: Option<ReceiptUpload>,
}

impl SubmissionForm {
    fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}

/// Buffers the multipart body. Text fields are decoded lossily, the
/// `comprovante` part is kept as raw bytes.
async fn read_submission(mut payload: Multipart, limit: usize) -> Result<SubmissionForm, AppError> {
    let mut fields = HashMap::new();
    let mut receipt = None;
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().map(str::to_owned).unwrap_or_default();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let mut body = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            total += chunk.len();
            if total > limit {
                log::warn!("Submission exceeds {} bytes", limit);
                return Err(AppError::UploadTooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }

        if name == "comprovante" {
            receipt = Some(ReceiptUpload {
                filename: filename.unwrap_or_default(),
                body,
            });
        } else {
            fields.insert(name, String::from_utf8_lossy(&body).into_owned());
        }
    }
    Ok(SubmissionForm { fields, receipt })
}

#[post("/nova")]
pub async fn new_request_form_handler(
    user: NonAdminOwner,
    state: Data<AppState>,
    session: Session,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let form = read_submission(payload, state.max_upload_bytes).await?;

    let amount = match parse_amount(&form.text("valor")) {
        Ok(amount) => amount,
        Err(e) => {
            log::info!("Rejected submission from user {}: {}", user.id, e);
            flash::push(&session, "Valor inválido.")?;
            return Ok(redirect("/nova"));
        }
    };
    let request = NewRequest {
        description: form.text("descricao"),
        amount,
        date: form.text("data"),
        category: form.text("categoria"),
        notes: form.text("obs"),
    };

    lifecycle::submit(&state, user.id, request, form.receipt).await?;
    flash::push(&session, "Solicitação enviada com sucesso!")?;
    Ok(redirect("/dashboard"))
}

/// Receipts are served to their owner and to admins only.
#[get("/uploads/{filename}")]
pub async fn receipt_handler(
    user: AnySession,
    path: web::Path<String>,
    state: Data<AppState>,
) -> Result<NamedFile, AppError> {
    let filename = path.into_inner();
    let file_path = state
        .receipts
        .resolve(&filename)
        .ok_or(AppError::NotFound)?;

    if !user.admin && !db::receipt_belongs_to(&state, &filename, user.id).await? {
        log::warn!("User {} denied receipt {}", user.id, filename);
        return Err(AppError::NotFound);
    }

    NamedFile::open_async(file_path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::NotFound,
        _ => AppError::IoError(e),
    })
}

#[get("/admin")]
pub async fn admin_handler(
    user: AdminOnly,
    state: Data<AppState>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let requests = lifecycle::list_all(&state).await?;

    let mut context = page_context("Painel do administrador", &session);
    context.insert("usuario", &user.name);
    context.insert("solicitacoes", &requests);
    render("admin.html", &context)
}

#[get("/atualizar_status/{id}/{status}")]
pub async fn update_status_handler(
    user: AdminOnly,
    path: web::Path<(i64, String)>,
    state: Data<AppState>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let (id, status) = path.into_inner();
    match lifecycle::set_status(&state, id, &status).await {
        Ok(()) => {
            log::info!("Admin {} updated request {}", user.id, id);
            flash::push(&session, "Status atualizado.")?;
        }
        Err(e @ (AppError::UnknownStatus(_)
        | AppError::InvalidTransition { .. }
        | AppError::NotFound)) => {
            log::warn!("Admin {} status update rejected: {}", user.id, e);
            flash::push(&session, "Não foi possível atualizar o status.")?;
        }
        Err(e) => return Err(e),
    }
    Ok(redirect("/admin"))
}

#[get("/logout")]
pub async fn logout_handler(identity: Option<Identity>) -> HttpResponse {
    auth::end_session(identity);
    redirect("/")
}
