use crate::{Context, Method};
use std::{fmt, sync::Arc};

/// A request handler: all effects go through the [`Context`].
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Wraps a closure into a [`Handler`].
///
/// Mostly useful inside middleware, where the wrapped handler is returned:
/// ```
/// use maker_route::{handler, Context, Handler};
///
/// fn timing(next: Handler) -> Handler {
///     handler(move |ctx: &mut Context| {
///         let started = std::time::Instant::now();
///         next(ctx);
///         ctx.response_mut()
///             .header("x-elapsed-us", started.elapsed().as_micros());
///     })
/// }
/// ```
#[inline]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A decorator turning one [`Handler`] into another.
///
/// Implemented for every `Fn(Handler) -> Handler`, so plain functions and
/// closures can be registered directly. Code before `next(ctx)` runs on the
/// way in, code after it on the way out.
///
/// # Examples
/// ```
/// use maker_route::{handler, Context, Engine, Handler};
///
/// fn auth(next: Handler) -> Handler {
///     handler(move |ctx: &mut Context| {
///         if ctx.header("authorization").is_some() {
///             next(ctx);
///         } else {
///             ctx.string(maker_route::StatusCode::Unauthorized, "login first");
///         }
///     })
/// }
///
/// let mut engine = Engine::new();
/// let api = engine.group("api");
/// api.use_middleware(auth);
/// api.get("/me", |ctx: &mut Context| ctx.string(maker_route::StatusCode::Ok, "me"));
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Handler) -> Handler;
}

impl<F> Middleware for F
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    #[inline]
    fn wrap(&self, next: Handler) -> Handler {
        self(next)
    }
}

/// Builds the chain around `handler`. `layers` go from outermost to
/// innermost, and within a layer the first middleware is the outermost.
#[inline]
pub(crate) fn compose(mut handler: Handler, layers: &[&[Arc<dyn Middleware>]]) -> Handler {
    for layer in layers.iter().rev() {
        for middleware in layer.iter().rev() {
            handler = middleware.wrap(handler);
        }
    }

    handler
}

/// The method a route is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// Matches every request method and wins over exact bindings.
    Any,
    Only(Method),
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::Any => f.write_str("ANY"),
            RouteMethod::Only(method) => method.fmt(f),
        }
    }
}

impl From<Method> for RouteMethod {
    #[inline]
    fn from(method: Method) -> Self {
        RouteMethod::Only(method)
    }
}
