pub mod pages;
pub mod session;

use crate::{config::ServerConfig, imagegen::ImageGenerator, logger};
use actix_web::{
    cookie::Cookie,
    http::header::{self, ContentType},
    web, App, HttpRequest, HttpResponse, HttpServer,
};
use serde::Deserialize;
use session::{FlashCategory, SessionStore, SESSION_COOKIE};
use std::sync::Arc;

pub struct AppState {
    pub generator: Arc<ImageGenerator>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(generator: ImageGenerator) -> Self {
        Self {
            generator: Arc::new(generator),
            sessions: SessionStore::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    pub prompt: String,
}

fn session_id(req: &HttpRequest, state: &AppState) -> String {
    let cookie = req.cookie(SESSION_COOKIE);
    state.sessions.resolve(cookie.as_ref().map(|c| c.value()))
}

fn session_cookie(id: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .finish()
}

fn html(body: String, sid: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .cookie(session_cookie(sid))
        .body(body)
}

fn render_index(state: &AppState, sid: &str) -> HttpResponse {
    html(pages::index(&state.sessions.take_flashes(sid)), sid)
}

async fn index(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let sid = session_id(&req, &state);
    render_index(&state, &sid)
}

async fn generate(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<PromptForm>,
) -> HttpResponse {
    let sid = session_id(&req, &state);
    let prompt = form.prompt.trim();

    if prompt.is_empty() {
        state
            .sessions
            .flash(&sid, FlashCategory::Error, "Please enter a prompt");
        return HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/"))
            .cookie(session_cookie(&sid))
            .finish();
    }

    let _timer = logger::timer("Image generation request");
    match state.generator.submit_and_wait(prompt).await {
        Ok(result) => {
            state.sessions.store_result(&sid, result);
            HttpResponse::SeeOther()
                .insert_header((header::LOCATION, "/result"))
                .cookie(session_cookie(&sid))
                .finish()
        }
        Err(e) => {
            if !e.is_user_error() {
                log::error!("Generation error: {}", e);
            }
            state
                .sessions
                .flash(&sid, FlashCategory::Error, e.to_string());
            render_index(&state, &sid)
        }
    }
}

async fn result(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let sid = session_id(&req, &state);
    match state.sessions.result(&sid) {
        Some(result) => html(pages::result(&result), &sid),
        None => {
            state
                .sessions
                .flash(&sid, FlashCategory::Error, "No generated image found");
            HttpResponse::Found()
                .insert_header((header::LOCATION, "/"))
                .cookie(session_cookie(&sid))
                .finish()
        }
    }
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type(ContentType::html())
        .body(pages::error("Page not found"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/", web::post().to(generate))
        .route("/result", web::get().to(result));
}

pub async fn run(config: ServerConfig, generator: ImageGenerator) -> std::io::Result<()> {
    let state = web::Data::new(AppState::new(generator));

    log::info!(
        "🌐 Serving image generator on http://{}:{}",
        config.host,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(configure)
            .default_service(web::route().to(not_found))
    })
    .bind(config.bind_address())?
    .run()
    .await
}
