//! Response renderers.
//!
//! A [`Renderer`] sets its content type and writes the body; the status is
//! set beforehand by [`Context::render`](crate::Context::render).
//!
//! | Renderer     | Content type                        |
//! |--------------|-------------------------------------|
//! | [`Text`]     | `text/plain; charset=utf-8`         |
//! | [`Json`]     | `application/json; charset=utf-8`   |
//! | [`Xml`]      | `application/xml; charset=utf-8`    |
//! | [`Html`]     | `text/html; charset=utf-8`          |
//! | [`Template`] | `text/html; charset=utf-8`          |
//! | [`Redirect`] | only for GET/HEAD bodies            |

mod html;
mod json;
mod redirect;
mod string;
mod xml;

pub use self::{
    html::{Html, Template},
    json::Json,
    redirect::Redirect,
    string::Text,
    xml::Xml,
};

use crate::{errors::Error, Response};

pub(crate) const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub(crate) const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub(crate) const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
pub(crate) const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Writes a response body in some format.
///
/// # Examples
/// ```
/// use maker_route::{render::Renderer, Context, Error, Request, Response, StatusCode};
///
/// struct Csv<'a>(&'a [(&'a str, u32)]);
///
/// impl Renderer for Csv<'_> {
///     fn render(&self, resp: &mut Response) -> Result<(), Error> {
///         self.write_content_type(resp);
///         for (name, count) in self.0 {
///             resp.body(*name).body(",").body(*count).body("\n");
///         }
///         Ok(())
///     }
///
///     fn write_content_type(&self, resp: &mut Response) {
///         resp.set_header("content-type", "text/csv");
///     }
/// }
///
/// let mut ctx = Context::new(Request::default());
/// ctx.render(StatusCode::Ok, Csv(&[("a", 1), ("b", 2)])).unwrap();
/// assert_eq!(ctx.response().body_bytes(), b"a,1\nb,2\n");
/// ```
pub trait Renderer {
    /// Sets the content type and appends the body.
    fn render(&self, resp: &mut Response) -> Result<(), Error>;

    /// Sets the `content-type` header, replacing any previous value.
    fn write_content_type(&self, resp: &mut Response);
}

#[inline(always)]
pub(crate) fn set_content_type(resp: &mut Response, value: &'static str) {
    resp.set_header("content-type", value);
}
