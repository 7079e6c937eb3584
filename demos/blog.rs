use maker_route::{Context, Engine, StatusCode};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Post {
    id: u32,
    title: &'static str,
}

static POSTS: [Post; 2] = [
    Post { id: 1, title: "Hello, world" },
    Post { id: 2, title: "Tries all the way down" },
];

fn list(ctx: &mut Context) {
    if let Err(err) = ctx.json(StatusCode::Ok, &POSTS) {
        tracing::warn!(%err, "posts not rendered");
    }
}

fn show(ctx: &mut Context) {
    let post = ctx
        .param("id")
        .and_then(|id| id.parse::<u32>().ok())
        .and_then(|id| POSTS.iter().find(|p| p.id == id));

    match post {
        Some(post) => {
            if let Err(err) = ctx.json(StatusCode::Ok, post) {
                tracing::warn!(%err, "post not rendered");
            }
        }
        None => ctx.string(StatusCode::NotFound, "no such post\n"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::with_port(8080);

    let blog = engine.group("blog");
    blog.get("/posts", list);
    blog.get("/posts/:id", show);
    blog.get("/posts/:id/*", |ctx: &mut Context| {
        ctx.redirect(StatusCode::Found, "/blog/posts")
    });
    blog.get("/archive/**", |ctx: &mut Context| {
        let rest = ctx.wildcard().unwrap_or_default().to_owned();
        ctx.string(StatusCode::Ok, format_args!("archive: {rest}\n"));
    });

    engine
        .group("static")
        .get("/**", |ctx: &mut Context| {
            let rel = ctx.wildcard().unwrap_or_default().to_owned();
            ctx.file_from_dir(&rel, "public");
        });

    engine.run().await.unwrap();
}
