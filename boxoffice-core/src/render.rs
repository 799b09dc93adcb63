/// Turns a redemption code payload into an encoded image.
///
/// Implementations are pure: they must not touch ticketing state.
pub trait CodeRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn render(&self, payload: &str) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Code rendering failed: {0}")]
pub struct RenderError(pub String);
