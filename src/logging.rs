//! Thin logging helpers for call sites that build their message with `format!`.

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!(target: "scripthub", "{}", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    tracing::info!(target: "scripthub", "{}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!(target: "scripthub", "{}", message.as_ref());
}
