use super::{set_content_type, Renderer, JSON_CONTENT_TYPE};
use crate::{errors::Error, Response};
use serde::Serialize;

/// Serializes the wrapped value with `serde_json`.
#[derive(Debug, Clone, Copy)]
pub struct Json<T>(pub T);

impl<T: Serialize> Renderer for Json<T> {
    fn render(&self, resp: &mut Response) -> Result<(), Error> {
        let body = serde_json::to_vec(&self.0)?;

        self.write_content_type(resp);
        resp.body(body);
        Ok(())
    }

    #[inline]
    fn write_content_type(&self, resp: &mut Response) {
        set_content_type(resp, JSON_CONTENT_TYPE);
    }
}
