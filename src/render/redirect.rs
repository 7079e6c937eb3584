use super::{set_content_type, Renderer, HTML_CONTENT_TYPE};
use crate::{errors::Error, Response, StatusCode};

/// Redirect to `location`.
///
/// Only `201 Created` and the `3xx` codes up to `308` are accepted; any
/// other status is a programming error and panics in [`Redirect::new`].
#[derive(Debug, Clone)]
pub struct Redirect<'a> {
    status: StatusCode,
    location: &'a str,
    with_body: bool,
}

impl<'a> Redirect<'a> {
    /// # Panics
    ///
    /// When `status` is neither `201` nor within `300..=308`.
    #[track_caller]
    pub fn new(status: StatusCode, location: &'a str) -> Self {
        let code = status.as_u16();
        if !(300..=308).contains(&code) && code != 201 {
            panic!("cannot redirect with status code {code}");
        }

        Self {
            status,
            location,
            with_body: false,
        }
    }

    /// Adds a short HTML body linking to the target, as browsers expect
    /// for `GET` requests.
    #[inline]
    pub fn with_body(mut self, with_body: bool) -> Self {
        self.with_body = with_body;
        self
    }
}

impl Renderer for Redirect<'_> {
    fn render(&self, resp: &mut Response) -> Result<(), Error> {
        resp.set_header("location", self.location);

        if self.with_body {
            set_content_type(resp, HTML_CONTENT_TYPE);
            resp.body("<a href=\"")
                .body(escape_html(self.location).as_str())
                .body("\">")
                .body(self.status.reason())
                .body("</a>.\n");
        }

        Ok(())
    }

    /// No-op: the content type is only set together with the body.
    #[inline]
    fn write_content_type(&self, _: &mut Response) {}
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
