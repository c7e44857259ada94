use picframe::Reconciler;

use super::state::AppState;

/// Reduces an uploaded filename to ASCII alphanumerics, `.`, `_` and `-`.
/// Path separators and whitespace become `_`; leading and trailing dots and
/// underscores are stripped.
pub fn secure_filename(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

pub fn allowed_file(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("png"))
}

/// Runs `job` on the blocking pool while holding the panel lock.
pub async fn with_panel<T, F>(state: &AppState, job: F) -> Result<T, String>
where
    F: FnOnce(&mut Reconciler) -> picframe::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut panel = state.panel.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || job(&mut panel))
        .await
        .map_err(|e| format!("task join error: {e}"))
        .and_then(|r| r.map_err(|e| format!("{e}")))
}
