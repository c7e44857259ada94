use picframe::Reconciler;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub panel: Arc<Mutex<Reconciler>>, // every display operation runs under this lock
    pub flash: Arc<Mutex<Vec<String>>>,
}

impl AppState {
    pub fn new(panel: Reconciler) -> Self {
        Self {
            panel: Arc::new(Mutex::new(panel)),
            flash: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn flash(&self, message: impl Into<String>) {
        self.flash.lock().await.push(message.into());
    }

    pub async fn take_flash(&self) -> Vec<String> {
        std::mem::take(&mut *self.flash.lock().await)
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<usize>,
}
