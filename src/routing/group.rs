use crate::{
    routing::{
        handler::{compose, Handler, Middleware, RouteMethod},
        tree::PathTree,
    },
    Context, Method,
};
use std::{collections::HashMap, sync::Arc};

/// A set of routes sharing a path prefix and group-wide middleware.
///
/// Created by [`Engine::group`](crate::Engine::group) or
/// [`Router::group`](crate::Router::group). Paths are registered relative to
/// the group prefix: in group `user`, `/get/:id` answers `/user/get/42`.
///
/// # Panics
///
/// Registration panics on programming errors: binding the same path and
/// method twice, or two differently named parameters at the same position.
///
/// # Examples
/// ```
/// use maker_route::{Context, Engine, StatusCode};
///
/// let mut engine = Engine::new();
/// let user = engine.group("user");
///
/// user.get("/get/:id", |ctx: &mut Context| {
///     let id = ctx.param("id").unwrap_or_default().to_owned();
///     ctx.string(StatusCode::Ok, format_args!("user {id}"));
/// });
/// user.any("/ping", |ctx: &mut Context| ctx.string(StatusCode::Ok, "pong"));
///
/// assert_eq!(user.routes(maker_route::Method::Get.into()), ["/get/:id"]);
/// ```
pub struct RouteGroup {
    name: String,
    tree: PathTree,
    routes: HashMap<String, HashMap<RouteMethod, Route>>,
    patterns: HashMap<RouteMethod, Vec<String>>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

pub(crate) struct Route {
    pub(crate) handler: Handler,
    middlewares: Vec<Arc<dyn Middleware>>,
}

/// Returned by route registration to attach route-scoped middleware.
///
/// ```
/// use maker_route::{handler, Context, Engine, Handler, StatusCode};
///
/// fn audit(next: Handler) -> Handler {
///     handler(move |ctx: &mut Context| {
///         tracing::info!(path = ctx.path(), "audited");
///         next(ctx);
///     })
/// }
///
/// let mut engine = Engine::new();
/// engine
///     .group("admin")
///     .delete("/user/:id", |ctx: &mut Context| ctx.string(StatusCode::NoContent, ""))
///     .with(audit);
/// ```
pub struct RouteHandle<'g> {
    route: &'g mut Route,
}

impl RouteHandle<'_> {
    /// Adds middleware that only wraps this (path, method) binding.
    /// The first one added is the outermost.
    #[inline]
    pub fn with<M: Middleware>(self, middleware: M) -> Self {
        self.route.middlewares.push(Arc::new(middleware));
        self
    }
}

impl std::fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteGroup")
            .field("name", &self.name)
            .field("patterns", &self.patterns)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

impl RouteGroup {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.trim_matches('/').to_owned(),
            tree: PathTree::default(),
            routes: HashMap::new(),
            patterns: HashMap::new(),
            middlewares: Vec::new(),
        }
    }

    /// Group prefix without slashes; empty for the root group.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Patterns registered for `method`, in registration order.
    #[inline]
    pub fn routes(&self, method: RouteMethod) -> &[String] {
        self.patterns.get(&method).map(Vec::as_slice).unwrap_or_default()
    }

    /// Appends middleware wrapping every route of the group.
    ///
    /// Group middleware always runs outside route-scoped middleware, and
    /// applies to routes registered before or after this call.
    #[inline]
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Registers `handler` for `path` and `method`.
    ///
    /// # Panics
    ///
    /// When `path` is already bound for `method` in this group.
    #[track_caller]
    pub fn bind<F>(&mut self, path: &str, method: RouteMethod, handler: F) -> RouteHandle<'_>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        let methods = self.routes.entry(path.to_owned()).or_default();
        if methods.contains_key(&method) {
            panic!(
                "route `{path}` of group `{}` is already bound for method {method}",
                self.name
            );
        }

        self.tree.insert(path);
        self.patterns.entry(method).or_default().push(path.to_owned());

        tracing::debug!(group = %self.name, path, %method, "route registered");

        let route = methods.entry(method).or_insert(Route {
            handler: Arc::new(handler),
            middlewares: Vec::new(),
        });
        RouteHandle { route }
    }

    /// Composes group and route middleware around `handler` and runs it.
    pub(crate) fn process(
        &self,
        pattern: &str,
        method: RouteMethod,
        ctx: &mut Context,
        handler: Handler,
    ) {
        let route_middlewares = self
            .routes
            .get(pattern)
            .and_then(|methods| methods.get(&method))
            .map(|route| route.middlewares.as_slice())
            .unwrap_or_default();

        let chain = compose(handler, &[self.middlewares.as_slice(), route_middlewares]);
        chain(ctx);
    }

    #[inline]
    pub(crate) fn tree(&self) -> &PathTree {
        &self.tree
    }

    /// Handler for a matched pattern: an `ANY` binding wins over the
    /// exact method. `None` means the path exists with other methods only.
    #[inline]
    pub(crate) fn resolve(&self, pattern: &str, method: Method) -> Option<(RouteMethod, &Route)> {
        let methods = self.routes.get(pattern)?;

        methods
            .get(&RouteMethod::Any)
            .map(|route| (RouteMethod::Any, route))
            .or_else(|| {
                let method = RouteMethod::Only(method);
                methods.get(&method).map(|route| (method, route))
            })
    }
}

macro_rules! verbs {
    ($($(#[$doc:meta])* $name:ident => $method:expr;)*) => {
        impl RouteGroup { $(
            $(#[$doc])*
            #[inline]
            #[track_caller]
            pub fn $name<F>(&mut self, path: &str, handler: F) -> RouteHandle<'_>
            where
                F: Fn(&mut Context) + Send + Sync + 'static,
            {
                self.bind(path, $method, handler)
            }
        )* }
    };
}

verbs! {
    /// Registers a handler answering every method of `path`.
    any => RouteMethod::Any;
    get => RouteMethod::Only(Method::Get);
    post => RouteMethod::Only(Method::Post);
    put => RouteMethod::Only(Method::Put);
    delete => RouteMethod::Only(Method::Delete);
    patch => RouteMethod::Only(Method::Patch);
    head => RouteMethod::Only(Method::Head);
    options => RouteMethod::Only(Method::Options);
}
