use crate::{
    errors::Error,
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    routing::{group::RouteGroup, router::Router},
    server::server_impl::{AllTypesLimits, Server},
    Context,
};
use minijinja::Environment;
use socket2::{Domain, Socket, Type};
use std::{
    fs, io,
    net::{Ipv4Addr, SocketAddr},
    path::Path,
    sync::Arc,
};
use tokio::net::TcpListener;

/// Port used by [`Engine::new`].
pub const DEFAULT_PORT: u16 = 8321;

/// The application: route groups, templates, transport limits and the port
/// to listen on.
///
/// # Examples
///
/// ```no_run
/// use maker_route::{Context, Engine, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let mut engine = Engine::new();
///
///     let user = engine.group("user");
///     user.get("/hello", |ctx: &mut Context| ctx.string(StatusCode::Ok, "Hello!"));
///     user.get("/get/:id", |ctx: &mut Context| {
///         let id = ctx.param("id").unwrap_or_default().to_owned();
///         ctx.string(StatusCode::Ok, format_args!("user {id}"));
///     });
///
///     engine.run().await
/// }
/// ```
#[derive(Debug)]
pub struct Engine {
    port: u16,
    app: App,
    limits: AllTypesLimits,
}

/// Everything a worker needs to answer a request.
#[derive(Debug, Default)]
pub(crate) struct App {
    router: Router,
    templates: Option<Arc<Environment<'static>>>,
}

impl App {
    #[cfg(test)]
    pub(crate) fn with_router(router: Router) -> Self {
        Self {
            router,
            templates: None,
        }
    }

    #[inline]
    pub(crate) fn serve(&self, ctx: &mut Context) {
        ctx.set_templates(self.templates.clone());
        self.router.dispatch(ctx);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine listening on port `8321`.
    #[inline]
    pub fn new() -> Self {
        Self::with_port(DEFAULT_PORT)
    }

    #[inline]
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            app: App::default(),
            limits: AllTypesLimits::default(),
        }
    }

    #[inline(always)]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Creates a route group served under `/<name>`.
    ///
    /// Groups are matched in creation order and an empty name sees every
    /// path, so a root group created first shadows the groups after it.
    #[inline]
    pub fn group(&mut self, name: &str) -> &mut RouteGroup {
        self.app.router.group(name)
    }

    #[inline(always)]
    pub fn router(&self) -> &Router {
        &self.app.router
    }

    /// The template environment, e.g. to register functions and filters
    /// before [`load_templates`](Self::load_templates).
    ///
    /// ```
    /// use maker_route::Engine;
    ///
    /// let mut engine = Engine::new();
    /// engine
    ///     .templates_mut()
    ///     .add_function("year", || 2024);
    /// ```
    pub fn templates_mut(&mut self) -> &mut Environment<'static> {
        let templates = self
            .app
            .templates
            .get_or_insert_with(|| Arc::new(Environment::new()));
        Arc::make_mut(templates)
    }

    /// Loads every `*.html` file of `dir` as a template named after the
    /// file, e.g. `login.html`. Sub-directories are not searched.
    pub fn load_templates(&mut self, dir: impl AsRef<Path>) -> Result<usize, Error> {
        let dir = dir.as_ref();
        let mut loaded = 0;

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let source = fs::read_to_string(&path)?;
            self.templates_mut()
                .add_template_owned(name.to_owned(), source)?;
            loaded += 1;
        }

        // An empty directory still counts as loaded.
        self.templates_mut();
        tracing::debug!(dir = %dir.display(), loaded, "templates loaded");
        Ok(loaded)
    }

    /// Routes one request without any transport, e.g. from tests or
    /// another server.
    ///
    /// ```
    /// use maker_route::{Context, Engine, Method, Request, StatusCode};
    ///
    /// let mut engine = Engine::new();
    /// engine.group("user").get("/hello", |ctx: &mut Context| ctx.string(StatusCode::Ok, "hi"));
    ///
    /// let mut ctx = Context::new(Request::new(Method::Get, "/user/hello"));
    /// engine.serve(&mut ctx);
    /// assert_eq!(ctx.response().body_bytes(), b"hi");
    /// ```
    #[inline]
    pub fn serve(&self, ctx: &mut Context) {
        self.app.serve(ctx);
    }
}

// Transport limits
impl Engine {
    #[inline]
    pub fn server_limits(&mut self, limits: ServerLimits) -> &mut Self {
        self.limits.server = limits;
        self
    }

    #[inline]
    pub fn connection_limits(&mut self, limits: ConnLimits) -> &mut Self {
        self.limits.connection = limits;
        self
    }

    #[inline]
    pub fn request_limits(&mut self, limits: ReqLimits) -> &mut Self {
        self.limits.request = limits;
        self
    }

    #[inline]
    pub fn response_limits(&mut self, limits: RespLimits) -> &mut Self {
        self.limits.response = limits;
        self
    }
}

impl Engine {
    /// Listens on `0.0.0.0:<port>` and serves requests until the process
    /// stops. Only returns when the listener cannot be created.
    pub async fn run(self) -> io::Result<()> {
        let listener = bind(self.port)?;
        tracing::info!(port = self.port, "listening");

        Server::new(listener, Arc::new(self.app), self.limits)
            .launch()
            .await;
        Ok(())
    }
}

fn bind(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

    let socket = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    TcpListener::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, Request, StatusCode};
    use minijinja::context;

    #[test]
    fn ports() {
        assert_eq!(Engine::new().port(), 8321);
        assert_eq!(Engine::with_port(9000).port(), 9000);
    }

    #[test]
    fn serve_routes() {
        let mut engine = Engine::new();
        engine
            .group("user")
            .get("/get/:id", |ctx: &mut Context| {
                let id = ctx.param("id").unwrap_or_default().to_owned();
                ctx.string(StatusCode::Ok, id);
            });

        let mut ctx = Context::new(Request::new(Method::Get, "/user/get/9"));
        engine.serve(&mut ctx);
        assert_eq!(ctx.response().body_bytes(), b"9");

        let mut ctx = Context::new(Request::new(Method::Get, "/nope"));
        engine.serve(&mut ctx);
        assert_eq!(ctx.response().status_code(), StatusCode::NotFound);
        assert_eq!(engine.router().groups().len(), 1);
    }

    #[test]
    fn templates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("login.html"), "<p>{{ shout(name) }}</p>").unwrap();
        fs::write(dir.path().join("notes.txt"), "skipped").unwrap();

        let mut engine = Engine::new();
        engine
            .templates_mut()
            .add_function("shout", |s: String| format!("{}!", s.to_uppercase()));
        assert_eq!(engine.load_templates(dir.path()).unwrap(), 1);

        engine.group("").get("/login", |ctx: &mut Context| {
            ctx.html_template(StatusCode::Ok, "login.html", context! { name => "jerry" })
                .unwrap();
        });

        let mut ctx = Context::new(Request::new(Method::Get, "/login"));
        engine.serve(&mut ctx);
        assert_eq!(ctx.response().body_bytes(), b"<p>JERRY!</p>");
    }

    #[test]
    fn templates_not_loaded() {
        let mut engine = Engine::new();
        engine.group("").get("/", |ctx: &mut Context| {
            let err = ctx.html_template(StatusCode::Ok, "a.html", ()).unwrap_err();
            ctx.string(StatusCode::InternalServerError, err);
        });

        let mut ctx = Context::new(Request::new(Method::Get, "/"));
        engine.serve(&mut ctx);
        assert_eq!(
            ctx.response().body_bytes(),
            b"no HTML templates have been loaded into the engine"
        );
    }

    #[test]
    fn missing_template_dir() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.load_templates("/definitely/not/here"),
            Err(Error::Io(_))
        ));
    }
}
