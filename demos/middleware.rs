use maker_route::{handler, Context, Engine, Handler, StatusCode};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn timing(next: Handler) -> Handler {
    handler(move |ctx: &mut Context| {
        let started = Instant::now();
        next(ctx);
        tracing::info!(
            method = %ctx.method(),
            path = ctx.path(),
            status = ctx.response().status_code().as_u16(),
            elapsed = ?started.elapsed(),
        );
    })
}

fn require_token(next: Handler) -> Handler {
    handler(move |ctx: &mut Context| match ctx.header("authorization") {
        Some("Bearer secret") => next(ctx),
        _ => ctx.string(StatusCode::Unauthorized, "missing or invalid token\n"),
    })
}

fn powered_by(next: Handler) -> Handler {
    handler(move |ctx: &mut Context| {
        next(ctx);
        ctx.response_mut().set_header("x-powered-by", "maker_route");
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::with_port(8080);

    let admin = engine.group("admin");
    admin.use_middleware(timing).use_middleware(powered_by);

    admin.get("/status", |ctx: &mut Context| ctx.string(StatusCode::Ok, "up\n"));
    admin
        .delete("/user/:id", |ctx: &mut Context| {
            let id = ctx.param("id").unwrap_or_default().to_owned();
            ctx.string(StatusCode::Ok, format_args!("deleted {id}\n"));
        })
        .with(require_token);

    engine.run().await.unwrap();
}
