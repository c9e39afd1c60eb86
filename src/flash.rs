use actix_session::Session;

use crate::errors::AppError;

const FLASH_KEY: &str = "_flashes";

/// Queues a one-shot notice for the next rendered page.
pub fn push(session: &Session, message: impl Into<String>) -> Result<(), AppError> {
    let mut messages = session
        .get::<Vec<String>>(FLASH_KEY)
        .map_err(|e| AppError::SessionError(e.to_string()))?
        .unwrap_or_default();
    messages.push(message.into());
    session
        .insert(FLASH_KEY, messages)
        .map_err(|e| AppError::SessionError(e.to_string()))
}

/// Drains queued notices. An unreadable entry is dropped.
pub fn take(session: &Session) -> Vec<String> {
    match session.remove_as::<Vec<String>>(FLASH_KEY) {
        Some(Ok(messages)) => messages,
        Some(Err(raw)) => {
            log::warn!("Dropping unreadable flash entry: {}", raw);
            Vec::new()
        }
        None => Vec::new(),
    }
}
