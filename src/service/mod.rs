//! Hosted image-edit capability used by the generative runner and the upload path.

pub mod openai;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct EditRequest {
    /// PNG-encoded source image, square `size` x `size`.
    pub image_png: Vec<u8>,
    /// RGBA PNG whose transparent pixels mark the area to regenerate.
    pub mask_png: Option<Vec<u8>>,
    pub prompt: String,
    pub size: u32,
}

/// Single blocking round trip: image in, encoded image bytes out.
///
/// Implementations report backend trouble (network, quota, malformed answer)
/// as `RestorationError::Service` or `RestorationError::Transport`.
pub trait ImageEditService: Send + Sync {
    fn edit(&self, request: &EditRequest) -> Result<Vec<u8>>;
}

impl<S: ImageEditService + ?Sized> ImageEditService for &S {
    fn edit(&self, request: &EditRequest) -> Result<Vec<u8>> {
        (**self).edit(request)
    }
}

impl<S: ImageEditService + ?Sized> ImageEditService for Box<S> {
    fn edit(&self, request: &EditRequest) -> Result<Vec<u8>> {
        (**self).edit(request)
    }
}

impl<S: ImageEditService + ?Sized> ImageEditService for std::sync::Arc<S> {
    fn edit(&self, request: &EditRequest) -> Result<Vec<u8>> {
        (**self).edit(request)
    }
}
