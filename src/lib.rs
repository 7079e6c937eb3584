//! maker_route - Lightweight trie-routed web framework
//!
//! Route groups with path parameters and wildcards, middleware chains scoped
//! to a group or a single route, a request [`Context`] with query, form, file
//! and JSON helpers, and pluggable response [renderers](render).
//!
//! # Routing
//!
//! Each [`RouteGroup`] owns a segment trie. Patterns are matched segment by
//! segment, literal segments first:
//!
//! - **`users`**: exactly `users`
//! - **`:id`**: any single segment, available as `ctx.param("id")`
//! - **`*`**: any single segment, not captured
//! - **`**`**: the rest of the path, available as `ctx.wildcard()`
//!
//! A path that exists with other methods only gets `405 Method Not Allowed`,
//! an unknown path `404 Not Found`.
//!
//! # Middleware
//!
//! A [`Middleware`] turns a [`Handler`] into another one. Group middleware
//! wraps route middleware, and within each list the first registered runs
//! outermost:
//!
//! ```text
//! G1-pre -> G2-pre -> R1-pre -> handler -> R1-post -> G2-post -> G1-post
//! ```
//!
//! # Transport
//!
//! [`Engine::run`] serves HTTP/1.0 and HTTP/1.1 with keep-alive and
//! pipelining from a fixed pool of workers, each reusing one [`Context`].
//! Sizes and timeouts are set through [`limits`].
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use maker_route::{Context, Engine, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut engine = Engine::new(); // port 8321
//!
//!     engine
//!         .group("user")
//!         .get("/hello", |ctx: &mut Context| ctx.string(StatusCode::Ok, "Hello World!"));
//!
//!     engine.run().await
//! }
//! ```
//! Parameters, middleware and renderers:
//! ```no_run
//! use maker_route::{handler, Context, Engine, Handler, StatusCode};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: String,
//!     name: &'static str,
//! }
//!
//! fn logger(next: Handler) -> Handler {
//!     handler(move |ctx: &mut Context| {
//!         let started = std::time::Instant::now();
//!         next(ctx);
//!         tracing::info!(
//!             path = ctx.path(),
//!             status = ctx.response().status_code().as_u16(),
//!             elapsed = ?started.elapsed(),
//!         );
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let mut engine = Engine::new();
//!     let user = engine.group("user");
//!     user.use_middleware(logger);
//!
//!     user.get("/get/:id", |ctx: &mut Context| {
//!         let user = User {
//!             id: ctx.param("id").unwrap_or_default().to_owned(),
//!             name: "jerry",
//!         };
//!         if let Err(err) = ctx.json(StatusCode::Ok, &user) {
//!             tracing::warn!(%err, "json response failed");
//!         }
//!     });
//!     user.get("/old", |ctx: &mut Context| ctx.redirect(StatusCode::MovedPermanently, "/user/get/1"));
//!
//!     engine.run().await
//! }
//! ```

pub(crate) mod http {
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod routing {
    pub(crate) mod group;
    pub(crate) mod handler;
    pub(crate) mod router;
    pub(crate) mod tree;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod context;
pub(crate) mod engine;
pub(crate) mod errors;
pub(crate) mod file;
pub mod limits;
pub mod render;

pub use crate::{
    context::{
        json::{FieldSpec, JsonFields, JsonOptions},
        multipart::{self, Form, UploadedFile},
        Context,
    },
    engine::{Engine, DEFAULT_PORT},
    errors::Error,
    http::{
        query,
        request::Request,
        response::{
            write::{BodyWriter, WriteBuffer},
            Response,
        },
        types::{Header, Method, StatusCode, Url, Version},
    },
    routing::{
        group::{RouteGroup, RouteHandle},
        handler::{handler, Handler, Middleware, RouteMethod},
        router::Router,
    },
};

#[cfg(test)]
pub mod tools {
    use std::str::from_utf8;

    #[inline]
    pub fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }

    #[inline]
    pub fn str_2<'a>(value: (&'a [u8], &'a [u8])) -> (&'a str, &'a str) {
        (from_utf8(value.0).unwrap(), from_utf8(value.1).unwrap())
    }
}
