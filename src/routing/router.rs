use crate::{routing::group::RouteGroup, Context, StatusCode};

/// Ordered route groups and the dispatch algorithm.
///
/// Groups are tried in registration order; the first one whose prefix and
/// tree both match the request path handles it.
///
/// ```text
///  path ==> strip "/<group>" ==> tree lookup ==> ANY? ==> exact method? ==> 405
///              || no               || no
///              \/                  \/
///         next group ... ==> 404
/// ```
///
/// # Examples
/// ```
/// use maker_route::{Context, Method, Request, Router, StatusCode};
///
/// let mut router = Router::default();
/// router.group("user").get("/hello", |ctx: &mut Context| ctx.string(StatusCode::Ok, "hi"));
///
/// let mut ctx = Context::new(Request::new(Method::Get, "/user/hello"));
/// router.dispatch(&mut ctx);
/// assert_eq!(ctx.response().body_bytes(), b"hi");
///
/// let mut ctx = Context::new(Request::new(Method::Post, "/user/hello?x=1"));
/// router.dispatch(&mut ctx);
/// assert_eq!(ctx.response().status_code(), StatusCode::MethodNotAllowed);
/// assert_eq!(ctx.response().body_bytes(), b"/user/hello?x=1 [POST] is not allowed\n");
/// ```
#[derive(Debug, Default)]
pub struct Router {
    groups: Vec<RouteGroup>,
}

impl Router {
    /// Appends a new group. An empty name creates a group that sees every
    /// path unchanged.
    pub fn group(&mut self, name: &str) -> &mut RouteGroup {
        self.groups.push(RouteGroup::new(name));

        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    #[inline(always)]
    pub fn groups(&self) -> &[RouteGroup] {
        &self.groups
    }

    /// Routes the request held by `ctx` and runs the matching handler chain,
    /// or writes a `404`/`405` response.
    pub fn dispatch(&self, ctx: &mut Context) {
        let method = ctx.method();
        let path = ctx.path().to_owned();

        for group in &self.groups {
            let Some(rest) = strip_group(&path, group.name()) else {
                continue;
            };
            let Some(found) = group.tree().lookup(rest) else {
                continue;
            };

            let Some((route_method, route)) = group.resolve(found.pattern, method) else {
                tracing::debug!(%method, %path, pattern = found.pattern, "method not allowed");
                return reject(ctx, StatusCode::MethodNotAllowed, "is not allowed");
            };

            tracing::debug!(
                %method,
                %path,
                group = group.name(),
                pattern = found.pattern,
                "route matched"
            );

            ctx.set_route(&found.params, found.wildcard);
            group.process(found.pattern, route_method, ctx, route.handler.clone());
            return;
        }

        tracing::debug!(%method, %path, "route not found");
        reject(ctx, StatusCode::NotFound, "is not found");
    }
}

/// The path below `/<name>`, or `None` when the group does not cover it.
#[inline]
fn strip_group<'p>(path: &'p str, name: &str) -> Option<&'p str> {
    if name.is_empty() {
        return Some(path);
    }

    let rest = path.strip_prefix('/')?.strip_prefix(name)?;
    match rest {
        "" => Some("/"),
        rest if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

#[inline]
fn reject(ctx: &mut Context, status: StatusCode, reason: &str) {
    let line = format!(
        "{} [{}] {reason}\n",
        ctx.request().url().target(),
        ctx.method()
    );
    ctx.string(status, line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{handler, tools::*, Handler, Method, Request};
    use std::sync::{Arc, Mutex};

    fn reply(text: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
        move |ctx: &mut Context| ctx.string(StatusCode::Ok, text)
    }

    fn run(router: &Router, method: Method, target: &str) -> Context {
        let mut ctx = Context::new(Request::new(method, target));
        router.dispatch(&mut ctx);
        ctx
    }

    fn body(ctx: &Context) -> &str {
        str_op(ctx.response().body_bytes())
    }

    #[test]
    fn strip() {
        #[rustfmt::skip]
        let cases = [
            ("/user/hello", "user", Some("/hello")),
            ("/user", "user", Some("/")),
            ("/user/", "user", Some("/")),
            ("/username", "user", None),
            ("/other/user", "user", None),
            ("/any/thing", "", Some("/any/thing")),
            ("/api/v1/x", "api/v1", Some("/x")),
        ];

        for (path, name, expected) in cases {
            assert_eq!(strip_group(path, name), expected, "{path} in {name}");
        }
    }

    #[test]
    fn outcomes() {
        let mut router = Router::default();
        router.group("user").get("/hello", reply("hello"));

        let ok = run(&router, Method::Get, "/user/hello");
        assert_eq!(ok.response().status_code(), StatusCode::Ok);
        assert_eq!(body(&ok), "hello");

        let not_allowed = run(&router, Method::Post, "/user/hello");
        assert_eq!(not_allowed.response().status_code(), StatusCode::MethodNotAllowed);
        assert_eq!(body(&not_allowed), "/user/hello [POST] is not allowed\n");

        let not_found = run(&router, Method::Get, "/user/missing?q=1");
        assert_eq!(not_found.response().status_code(), StatusCode::NotFound);
        assert_eq!(body(&not_found), "/user/missing?q=1 [GET] is not found\n");
        assert_eq!(
            not_found.response().header_value("content-type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn query_is_not_part_of_path() {
        let mut router = Router::default();
        router.group("user").get("/hello", reply("hello"));

        assert_eq!(body(&run(&router, Method::Get, "/user/hello?name=x")), "hello");
    }

    #[test]
    fn any_wins() {
        let mut router = Router::default();
        let group = router.group("g");
        group.get("/x", reply("get"));
        group.any("/x", reply("any"));

        for method in [Method::Get, Method::Post, Method::Delete] {
            assert_eq!(body(&run(&router, method, "/g/x")), "any");
        }
    }

    #[test]
    fn first_matching_group_wins() {
        let mut router = Router::default();
        router.group("").get("/user/info", reply("root"));
        router.group("user").get("/info", reply("user"));
        router.group("user").get("/other", reply("second user group"));

        assert_eq!(body(&run(&router, Method::Get, "/user/info")), "root");
        assert_eq!(body(&run(&router, Method::Get, "/user/other")), "second user group");
    }

    #[test]
    fn method_mismatch_stops_search() {
        let mut router = Router::default();
        router.group("a").get("/x", reply("get"));
        router.group("a").post("/x", reply("post"));

        let ctx = run(&router, Method::Post, "/a/x");
        assert_eq!(ctx.response().status_code(), StatusCode::MethodNotAllowed);
    }

    #[test]
    fn params_and_wildcard_reach_handler() {
        let mut router = Router::default();
        let group = router.group("user");
        group.get("/get/:id", |ctx: &mut Context| {
            let id = ctx.param("id").unwrap_or_default().to_owned();
            ctx.string(StatusCode::Ok, id);
        });
        group.get("/files/**", |ctx: &mut Context| {
            let rest = ctx.wildcard().unwrap_or_default().to_owned();
            ctx.string(StatusCode::Ok, rest);
        });

        assert_eq!(body(&run(&router, Method::Get, "/user/get/42")), "42");
        assert_eq!(body(&run(&router, Method::Get, "/user/files/a/b.txt")), "a/b.txt");
    }

    #[test]
    fn middleware_order() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let layer = |name: &'static str, log: &Arc<Mutex<Vec<String>>>| {
            let log = log.clone();
            move |next: Handler| {
                let log = log.clone();
                handler(move |ctx: &mut Context| {
                    log.lock().unwrap().push(format!("{name}-pre"));
                    next(ctx);
                    log.lock().unwrap().push(format!("{name}-post"));
                })
            }
        };

        let mut router = Router::default();
        let group = router.group("user");
        group.use_middleware(layer("M1", &log));
        let inner = log.clone();
        group
            .get("/hello", move |_: &mut Context| inner.lock().unwrap().push("H".into()))
            .with(layer("M2", &log));
        group.post("/hello", |_: &mut Context| {});

        run(&router, Method::Get, "/user/hello");
        assert_eq!(
            *log.lock().unwrap(),
            ["M1-pre", "M2-pre", "H", "M2-post", "M1-post"]
        );

        // route middleware is bound to (path, method)
        log.lock().unwrap().clear();
        run(&router, Method::Post, "/user/hello");
        assert_eq!(*log.lock().unwrap(), ["M1-pre", "M1-post"]);
    }

    #[test]
    fn route_middleware_for_parameterized_path() {
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();

        let mut router = Router::default();
        router
            .group("user")
            .get("/get/:id", |_: &mut Context| {})
            .with(move |next: Handler| {
                let counter = counter.clone();
                handler(move |ctx: &mut Context| {
                    *counter.lock().unwrap() += 1;
                    next(ctx);
                })
            });

        run(&router, Method::Get, "/user/get/1");
        run(&router, Method::Get, "/user/get/2");
        assert_eq!(*hits.lock().unwrap(), 2);
    }
}
