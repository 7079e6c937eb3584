use super::{set_content_type, Renderer, HTML_CONTENT_TYPE};
use crate::{errors::Error, Response};
use minijinja::Environment;
use serde::Serialize;

/// A raw HTML string, written as is.
#[derive(Debug, Clone, Copy)]
pub struct Html<S>(pub S);

impl<S: AsRef<str>> Html<S> {
    /// Same as [`Renderer::render`], which cannot fail for raw HTML.
    #[inline]
    pub fn write(&self, resp: &mut Response) {
        self.write_content_type(resp);
        resp.body(self.0.as_ref());
    }
}

impl<S: AsRef<str>> Renderer for Html<S> {
    #[inline]
    fn render(&self, resp: &mut Response) -> Result<(), Error> {
        self.write(resp);
        Ok(())
    }

    #[inline]
    fn write_content_type(&self, resp: &mut Response) {
        set_content_type(resp, HTML_CONTENT_TYPE);
    }
}

/// A named template of a `minijinja` environment rendered with `data`.
///
/// ```
/// use maker_route::{render::{Renderer, Template}, Response};
/// use minijinja::{context, Environment};
///
/// let mut env = Environment::new();
/// env.add_template("hello.html", "<b>{{ name }}</b>").unwrap();
///
/// let mut resp = Response::default();
/// Template::new(&env, "hello.html", context! { name => "jerry" })
///     .render(&mut resp)
///     .unwrap();
/// assert_eq!(resp.body_bytes(), b"<b>jerry</b>");
/// ```
#[derive(Debug)]
pub struct Template<'a, T> {
    env: &'a Environment<'static>,
    name: &'a str,
    data: T,
}

impl<'a, T: Serialize> Template<'a, T> {
    #[inline]
    pub fn new(env: &'a Environment<'static>, name: &'a str, data: T) -> Self {
        Self { env, name, data }
    }
}

impl<T: Serialize> Renderer for Template<'_, T> {
    fn render(&self, resp: &mut Response) -> Result<(), Error> {
        let html = self.env.get_template(self.name)?.render(&self.data)?;

        self.write_content_type(resp);
        resp.body(html);
        Ok(())
    }

    #[inline]
    fn write_content_type(&self, resp: &mut Response) {
        set_content_type(resp, HTML_CONTENT_TYPE);
    }
}
