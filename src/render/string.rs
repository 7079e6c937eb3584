use super::{set_content_type, Renderer, TEXT_CONTENT_TYPE};
use crate::{errors::Error, Response};
use std::fmt::{Display, Write};

/// Plain text from any [`Display`] value.
///
/// Formatted output is written straight into the body, so
/// `Text(format_args!(...))` does not allocate an intermediate `String`.
#[derive(Debug, Clone, Copy)]
pub struct Text<T>(pub T);

impl<T: Display> Renderer for Text<T> {
    fn render(&self, resp: &mut Response) -> Result<(), Error> {
        self.write_content_type(resp);

        let mut result = Ok(());
        resp.body_with(|w| result = write!(w, "{}", self.0));
        Ok(result?)
    }

    #[inline]
    fn write_content_type(&self, resp: &mut Response) {
        set_content_type(resp, TEXT_CONTENT_TYPE);
    }
}
