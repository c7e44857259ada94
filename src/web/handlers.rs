use askama::Template;
use axum::Json;
use axum::extract::{Form, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use picframe::{FrameError, Rotation};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::state::{AppState, StatusResponse};
use super::templates::IndexTemplate;
use super::util::{allowed_file, secure_filename, with_panel};

pub async fn index(State(state): State<AppState>) -> Response {
    let view = match with_panel(&state, |panel| Ok(panel.view())).await {
        Ok(view) => view,
        Err(e) => {
            error!(error = %e, "Failed loading panel");
            return (StatusCode::INTERNAL_SERVER_ERROR, e).into_response();
        }
    };
    let messages = state.take_flash().await;
    match IndexTemplate::new(view, messages).render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed rendering index");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("template error: {e}")).into_response()
        }
    }
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let Ok(panel) = state.panel.try_lock() else {
        return Json(StatusResponse {
            busy: true,
            current: None,
            rotation: None,
            images: None,
        });
    };
    let view = panel.view();
    Json(StatusResponse {
        busy: false,
        current: view.current,
        rotation: Some(view.rotation.degrees()),
        images: Some(view.images.len()),
    })
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let file_name = field.file_name().map(str::to_owned).unwrap_or_default();
                match field.bytes().await {
                    Ok(b) => {
                        info!(size = b.len(), file_name = %file_name, "Received upload");
                        upload = Some((file_name, b.to_vec()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed reading upload field");
                        return (StatusCode::BAD_REQUEST, format!("read error: {e}")).into_response();
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Multipart parse error");
                return (StatusCode::BAD_REQUEST, format!("multipart parse error: {e}")).into_response();
            }
        }
    }

    let Some((raw_name, bytes)) = upload.filter(|(name, _)| allowed_file(name)) else {
        warn!("Upload missing a PNG file");
        state.flash("Select a valid PNG").await;
        return Redirect::to("/").into_response();
    };
    let name = secure_filename(&raw_name);
    if !allowed_file(&name) {
        warn!(raw_name = %raw_name, "Upload filename rejected after sanitizing");
        state.flash("Select a valid PNG").await;
        return Redirect::to("/").into_response();
    }

    let stored = name.clone();
    match with_panel(&state, move |panel| panel.upload(&stored, &bytes)).await {
        Ok(()) => state.flash(format!("Uploaded {name}")).await,
        Err(e) => {
            error!(name = %name, error = %e, "Upload failed");
            state.flash(e).await;
        }
    }
    Redirect::to("/").into_response()
}

#[derive(Deserialize)]
pub struct DisplayForm {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub rotate: Option<String>,
}

pub async fn display(State(state): State<AppState>, Form(form): Form<DisplayForm>) -> Response {
    let Some(name) = form.filename.filter(|n| !n.is_empty()) else {
        state
            .flash(FrameError::ImageNotFound("no image selected".into()).to_string())
            .await;
        return Redirect::to("/").into_response();
    };
    let rotation = match form.rotate.as_deref().map(str::parse::<Rotation>).transpose() {
        Ok(r) => r.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Rejected rotation");
            state.flash(e.to_string()).await;
            return Redirect::to("/").into_response();
        }
    };

    info!(name = %name, rotation = rotation.degrees(), "Starting display update");
    let shown = name.clone();
    match with_panel(&state, move |panel| panel.show(&shown, rotation)).await {
        Ok(()) => {
            info!("Display update complete");
            state.flash(format!("Displaying {name} at {rotation}°")).await;
        }
        Err(e) => {
            error!(error = %e, "Display update failed");
            state.flash(e).await;
        }
    }
    Redirect::to("/").into_response()
}

pub async fn purge(State(state): State<AppState>) -> Response {
    match with_panel(&state, |panel| panel.purge()).await {
        Ok(removed) => {
            info!(removed, "Purge complete");
            state.flash("All images purged").await;
        }
        Err(e) => {
            error!(error = %e, "Purge failed");
            state.flash(e).await;
        }
    }
    Redirect::to("/").into_response()
}
