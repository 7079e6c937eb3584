//! Per-request state handed to handlers and middleware.

pub mod json;
pub mod multipart;

use crate::{
    errors::Error,
    http::query::Params,
    limits::RespLimits,
    render::{Html, Redirect, Renderer, Template, Text},
    Method, Request, Response, StatusCode,
};
use minijinja::Environment;
use multipart::{Form, UploadedFile};
use serde::Serialize;
use std::{
    cell::OnceCell,
    collections::HashMap,
    fmt::Display,
    fs,
    path::Path,
    sync::Arc,
};

/// The in-flight request and the response being built for it.
///
/// Query and form parameters are parsed on first access and cached for the
/// rest of the request. The built-in transport keeps one `Context` per
/// worker and resets it between requests; other callers create one per
/// request with [`Context::new`].
///
/// # Examples
/// ```
/// use maker_route::{Context, Method, Request, StatusCode};
///
/// let mut ctx = Context::new(Request::new(Method::Get, "/search?q=rust&tag=a&tag=b"));
///
/// assert_eq!(ctx.query("q"), "rust");
/// assert_eq!(ctx.query("missing"), "");
/// assert_eq!(ctx.default_query("page", "1"), "1");
/// assert_eq!(ctx.query_array("tag").unwrap(), ["a", "b"]);
///
/// ctx.string(StatusCode::Ok, format_args!("{} results", 0));
/// assert_eq!(ctx.response().body_bytes(), b"0 results");
/// ```
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,

    params: Vec<(String, String)>,
    wildcard: Option<String>,

    query_cache: OnceCell<Params>,
    form_cache: OnceCell<Result<Form, multipart::Error>>,

    templates: Option<Arc<Environment<'static>>>,
}

impl Context {
    /// Wraps a request with an empty `200 OK` response.
    pub fn new(request: Request) -> Self {
        let mut response = Response::default();
        response.version = request.version();
        response.keep_alive = request.is_keep_alive();

        Self {
            request,
            response,

            params: Vec::new(),
            wildcard: None,

            query_cache: OnceCell::new(),
            form_cache: OnceCell::new(),

            templates: None,
        }
    }

    /// Makes `templates` available to [`html_template`](Self::html_template).
    #[inline]
    pub fn with_templates(mut self, templates: Arc<Environment<'static>>) -> Self {
        self.templates = Some(templates);
        self
    }

    #[inline(always)]
    pub(crate) fn set_templates(&mut self, templates: Option<Arc<Environment<'static>>>) {
        self.templates = templates;
    }

    #[inline]
    pub(crate) fn reset(&mut self, resp_limits: &RespLimits) {
        self.request.reset();
        self.response.reset(resp_limits);

        self.params.clear();
        self.wildcard = None;

        self.query_cache = OnceCell::new();
        self.form_cache = OnceCell::new();
    }

    /// Copies the version and keep-alive flag of a freshly parsed request
    /// into the response.
    #[inline]
    pub(crate) fn prepare_response(&mut self) {
        self.response.version = self.request.version();
        self.response.keep_alive = self.request.is_keep_alive();
    }

    #[inline]
    pub(crate) fn set_route(&mut self, params: &[(&str, &str)], wildcard: Option<&str>) {
        self.params.clear();
        self.params
            .extend(params.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));
        self.wildcard = wildcard.map(str::to_owned);
    }

    #[inline]
    pub fn into_response(self) -> Response {
        self.response
    }
}

// Request access
impl Context {
    #[inline(always)]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[inline(always)]
    pub(crate) fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    #[inline(always)]
    pub fn response(&self) -> &Response {
        &self.response
    }

    #[inline(always)]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    #[inline(always)]
    pub fn method(&self) -> Method {
        self.request.method()
    }

    /// Request path without the query string.
    #[inline(always)]
    pub fn path(&self) -> &str {
        self.request.url().path()
    }

    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// Value bound to `:name` in the matched route.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All path parameters in route order.
    #[inline(always)]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The path absorbed by a `**` segment, e.g. `css/site.css` for
    /// `/static/**` and `/static/css/site.css`.
    #[inline(always)]
    pub fn wildcard(&self) -> Option<&str> {
        self.wildcard.as_deref()
    }
}

// Query string
impl Context {
    /// Decoded query parameters, parsed on first use.
    pub fn query_params(&self) -> &Params {
        self.query_cache.get_or_init(|| match self.request.url().query() {
            Some(query) => Params::from_urlencoded(query.as_bytes()),
            None => Params::default(),
        })
    }

    /// First value of `key`, or `""`.
    #[inline]
    pub fn query(&self, key: &str) -> &str {
        self.query_params().get(key).unwrap_or_default()
    }

    /// First value of `key`, or `default` when the key is absent.
    /// A key present with an empty value yields `""`.
    #[inline]
    pub fn default_query<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.query_params().get(key).unwrap_or(default)
    }

    #[inline]
    pub fn query_array(&self, key: &str) -> Option<&[String]> {
        self.query_params().get_all(key)
    }

    /// `?user[id]=1&user[age]=29` gives `{"id": "1", "age": "29"}` for `user`.
    #[inline]
    pub fn query_map(&self, base: &str) -> Option<HashMap<String, String>> {
        self.query_params().get_map(base)
    }
}

// Form body
impl Context {
    /// The parsed body of an url-encoded or multipart request.
    ///
    /// Other content types give an empty form. The result, error included,
    /// is cached for the rest of the request.
    pub fn form(&self) -> Result<&Form, Error> {
        self.form_cache
            .get_or_init(|| self.parse_form())
            .as_ref()
            .map_err(|err| Error::Multipart(err.clone()))
    }

    fn parse_form(&self) -> Result<Form, multipart::Error> {
        let content_type = self.header("content-type").unwrap_or_default();
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/x-www-form-urlencoded" => {
                Ok(Form::from_values(Params::from_urlencoded(self.body())))
            }
            "multipart/form-data" => {
                let boundary = multipart::boundary(content_type)?;
                multipart::parse(self.body(), boundary)
            }
            _ => Ok(Form::default()),
        }
    }

    /// The form, or `None` after logging why the body could not be parsed.
    #[inline]
    fn parsed_form(&self) -> Option<&Form> {
        match self.form() {
            Ok(form) => Some(form),
            Err(err) => {
                tracing::warn!(%err, path = self.path(), "form body could not be parsed");
                None
            }
        }
    }

    #[inline]
    fn form_values(&self) -> Option<&Params> {
        self.parsed_form().map(Form::values)
    }

    /// First value of form field `key`, or `""`.
    #[inline]
    pub fn post_form(&self, key: &str) -> &str {
        self.form_values()
            .and_then(|values| values.get(key))
            .unwrap_or_default()
    }

    /// First value of form field `key`, or `default` when absent.
    #[inline]
    pub fn default_post_form<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.form_values()
            .and_then(|values| values.get(key))
            .unwrap_or(default)
    }

    #[inline]
    pub fn post_form_array(&self, key: &str) -> Option<&[String]> {
        self.form_values()?.get_all(key)
    }

    #[inline]
    pub fn post_form_map(&self, base: &str) -> Option<HashMap<String, String>> {
        self.form_values()?.get_map(base)
    }

    /// First file uploaded under `name`.
    pub fn form_file(&self, name: &str) -> Result<&UploadedFile, Error> {
        self.form()?
            .files(name)
            .first()
            .ok_or_else(|| Error::MissingFile(name.to_owned()))
    }

    /// Every file uploaded under `name`; empty when there is none or the
    /// body is not multipart.
    pub fn form_files(&self, name: &str) -> &[UploadedFile] {
        self.parsed_form()
            .map(|form| form.files(name))
            .unwrap_or_default()
    }

    /// Writes an uploaded file to `dst`, creating missing parent directories.
    pub fn save_uploaded_file(&self, file: &UploadedFile, dst: impl AsRef<Path>) -> Result<(), Error> {
        let dst = dst.as_ref();
        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        fs::write(dst, file.content())?;
        tracing::debug!(dst = %dst.display(), size = file.content().len(), "uploaded file saved");
        Ok(())
    }
}

// Rendering
impl Context {
    /// Sets `status` and lets `renderer` write headers and body.
    #[inline]
    pub fn render<R: Renderer>(&mut self, status: StatusCode, renderer: R) -> Result<(), Error> {
        self.response.status(status);
        renderer.render(&mut self.response)
    }

    /// Plain text from anything [`Display`], including `format_args!`.
    pub fn string<T: Display>(&mut self, status: StatusCode, text: T) {
        if let Err(err) = self.render(status, Text(text)) {
            tracing::warn!(%err, "text response could not be formatted");
        }
    }

    /// A raw HTML string.
    pub fn html<S: AsRef<str>>(&mut self, status: StatusCode, html: S) {
        self.response.status(status);
        Html(html).write(&mut self.response);
    }

    #[inline]
    pub fn json<T: Serialize>(&mut self, status: StatusCode, data: &T) -> Result<(), Error> {
        self.render(status, crate::render::Json(data))
    }

    #[inline]
    pub fn xml<T: Serialize>(&mut self, status: StatusCode, data: &T) -> Result<(), Error> {
        self.render(status, crate::render::Xml(data))
    }

    /// Renders a template preloaded with
    /// [`Engine::load_templates`](crate::Engine::load_templates).
    pub fn html_template<T: Serialize>(
        &mut self,
        status: StatusCode,
        name: &str,
        data: T,
    ) -> Result<(), Error> {
        let env = self.templates.clone().ok_or(Error::TemplatesNotLoaded)?;
        self.render(status, Template::new(&env, name, data))
    }

    /// Redirects to `location`.
    ///
    /// # Panics
    ///
    /// When `status` is neither `201` nor within `300..=308`.
    #[track_caller]
    pub fn redirect(&mut self, status: StatusCode, location: &str) {
        let with_body = matches!(self.method(), Method::Get | Method::Head);
        let redirect = Redirect::new(status, location).with_body(with_body);

        if let Err(err) = self.render(status, redirect) {
            tracing::warn!(%err, "redirect could not be written");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::{io, sync::Mutex};

    fn post(content_type: &str, body: &str) -> Context {
        Context::new(
            Request::new(Method::Post, "/form")
                .with_header("Content-Type", content_type)
                .with_body(body),
        )
    }

    #[test]
    fn query_helpers() {
        let ctx = Context::new(Request::new(
            Method::Get,
            "/q?name=John+Doe&id=1&id=2&empty=&user[id]=1&user[age]=29",
        ));

        assert_eq!(ctx.query("name"), "John Doe");
        assert_eq!(ctx.query("id"), "1");
        assert_eq!(ctx.query_array("id").unwrap(), ["1", "2"]);
        assert_eq!(ctx.default_query("empty", "x"), "");
        assert_eq!(ctx.default_query("absent", "x"), "x");
        assert!(ctx.query_array("absent").is_none());

        let user = ctx.query_map("user").unwrap();
        assert_eq!(user.len(), 2);
        assert_eq!(user["id"], "1");
        assert_eq!(user["age"], "29");
    }

    #[test]
    fn no_query() {
        let ctx = Context::new(Request::new(Method::Get, "/q"));

        assert_eq!(ctx.query("a"), "");
        assert!(ctx.query_params().is_empty());
        assert!(ctx.query_map("user").is_none());
    }

    #[test]
    fn urlencoded_form() {
        let ctx = post(
            "application/x-www-form-urlencoded; charset=utf-8",
            "name=a&name=b&user[id]=7&note=hi+there",
        );

        assert_eq!(ctx.post_form("note"), "hi there");
        assert_eq!(ctx.post_form_array("name").unwrap(), ["a", "b"]);
        assert_eq!(ctx.post_form_map("user").unwrap()["id"], "7");
        assert_eq!(ctx.default_post_form("absent", "d"), "d");
        assert!(ctx.form_files("file").is_empty());
        assert!(matches!(ctx.form_file("file"), Err(Error::MissingFile(name)) if name == "file"));
    }

    #[test]
    fn form_ignores_other_content_types() {
        let ctx = post("application/json", r#"{"a":1}"#);

        assert_eq!(ctx.post_form("a"), "");
        assert!(ctx.form().unwrap().values().is_empty());
    }

    #[test]
    fn broken_multipart_is_cached_error() {
        let ctx = post("multipart/form-data", "whatever");

        assert!(matches!(ctx.form(), Err(Error::Multipart(_))));
        assert!(matches!(ctx.form(), Err(Error::Multipart(_))));
        assert_eq!(ctx.post_form("a"), "");
        assert!(ctx.form_files("a").is_empty());
    }

    #[test]
    fn broken_upload_is_logged() {
        #[derive(Clone, Default)]
        struct Logs(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Logs {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let logs = Logs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let ctx = post("multipart/form-data; boundary=XyZ", "not multipart");
        tracing::subscriber::with_default(subscriber, || {
            assert!(ctx.form_files("file").is_empty());
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("form body could not be parsed"), "{output}");
    }

    #[test]
    fn multipart_upload_and_save() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"user[name]\"\r\n\r\n\
            jerry\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            first\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"b.txt\"\r\n\r\n\
            second\r\n\
            --XyZ--\r\n";
        let ctx = post("multipart/form-data; boundary=XyZ", body);

        assert_eq!(ctx.post_form_map("user").unwrap()["name"], "jerry");

        let first = ctx.form_file("file").unwrap();
        assert_eq!(first.filename(), "a.txt");
        assert_eq!(first.content_type(), Some("text/plain"));
        assert_eq!(ctx.form_files("file").len(), 2);

        let dir = tempfile::tempdir().unwrap();
        for file in ctx.form_files("file") {
            let dst = dir.path().join("upload").join(file.filename());
            ctx.save_uploaded_file(file, &dst).unwrap();
        }

        let saved = fs::read_to_string(dir.path().join("upload/b.txt")).unwrap();
        assert_eq!(saved, "second");
    }

    #[test]
    fn reset_clears_caches() {
        let mut ctx = Context::new(Request::new(Method::Get, "/q?a=1"));
        ctx.set_route(&[("id", "5")], Some("x/y"));
        assert_eq!(ctx.query("a"), "1");

        ctx.reset(&RespLimits::default());
        *ctx.request_mut() = Request::new(Method::Get, "/q?a=2");

        assert_eq!(ctx.query("a"), "2");
        assert_eq!(ctx.param("id"), None);
        assert_eq!(ctx.wildcard(), None);
    }

    #[test]
    fn render_shortcuts() {
        #[derive(Serialize, Deserialize)]
        struct User {
            name: String,
        }
        let user = User { name: "jerry".into() };

        let mut ctx = Context::new(Request::default());
        ctx.json(StatusCode::Created, &user).unwrap();
        assert_eq!(ctx.response().status_code(), StatusCode::Created);
        assert_eq!(ctx.response().body_bytes(), br#"{"name":"jerry"}"#);
        assert_eq!(
            ctx.response().header_value("content-type"),
            Some("application/json; charset=utf-8")
        );

        let mut ctx = Context::new(Request::default());
        ctx.html(StatusCode::Ok, "<h1>Hi</h1>");
        assert_eq!(ctx.response().body_bytes(), b"<h1>Hi</h1>");
        assert_eq!(
            ctx.response().header_value("content-type"),
            Some("text/html; charset=utf-8")
        );
    }

    #[test]
    fn template_requires_environment() {
        let mut ctx = Context::new(Request::default());
        assert!(matches!(
            ctx.html_template(StatusCode::Ok, "login.html", ()),
            Err(Error::TemplatesNotLoaded)
        ));

        let mut env = Environment::new();
        env.add_template("login.html", "<p>{{ name }}</p>").unwrap();
        let mut ctx = Context::new(Request::default()).with_templates(Arc::new(env));

        ctx.html_template(StatusCode::Ok, "login.html", minijinja::context! { name => "jerry" })
            .unwrap();
        assert_eq!(ctx.response().body_bytes(), b"<p>jerry</p>");
    }

    #[test]
    fn redirect_sets_location() {
        let mut ctx = Context::new(Request::new(Method::Get, "/old"));
        ctx.redirect(StatusCode::Found, "/user/template");

        assert_eq!(ctx.response().status_code(), StatusCode::Found);
        assert_eq!(ctx.response().header_value("location"), Some("/user/template"));
    }

    #[test]
    #[should_panic(expected = "cannot redirect with status code 200")]
    fn redirect_rejects_status() {
        Context::new(Request::default()).redirect(StatusCode::Ok, "/");
    }
}
