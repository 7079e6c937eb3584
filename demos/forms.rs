use maker_route::{json_fields, Context, Engine, JsonOptions, StatusCode};
use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Login {
    name: String,
    password: String,
    remember: Option<bool>,
}

json_fields!(Login { "name" => required, "password" => required, "remember" });

fn search(ctx: &mut Context) {
    let q = ctx.query("q").to_owned();
    let page = ctx.default_query("page", "1").to_owned();
    let tags = ctx.query_array("tag").map(|t| t.join(",")).unwrap_or_default();

    ctx.string(StatusCode::Ok, format_args!("q={q} page={page} tags=[{tags}]\n"));
}

fn login(ctx: &mut Context) {
    match ctx.parse_json::<Login>(JsonOptions::strict()) {
        Ok(login) if login.password.len() < 8 => {
            ctx.string(StatusCode::BadRequest, "password too short\n")
        }
        Ok(login) => {
            let remember = login.remember.unwrap_or(false);
            tracing::info!(name = %login.name, remember, "login");
            ctx.string(StatusCode::Ok, format_args!("welcome, {}\n", login.name));
        }
        Err(err) => ctx.string(StatusCode::BadRequest, format_args!("{err}\n")),
    }
}

fn upload(ctx: &mut Context) {
    let title = ctx.default_post_form("title", "untitled").to_owned();

    let saved = match ctx.form_file("file") {
        Ok(file) => {
            let name = Path::new(file.filename()).file_name().unwrap_or_default();
            let dst = Path::new("uploads").join(name).display().to_string();
            ctx.save_uploaded_file(file, &dst).map(|()| (dst, file.len()))
        }
        Err(err) => Err(err),
    };

    match saved {
        Ok((dst, size)) => {
            ctx.string(StatusCode::Created, format_args!("{title}: {size} bytes saved to {dst}\n"))
        }
        Err(err) => ctx.string(StatusCode::BadRequest, format_args!("{err}\n")),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut engine = Engine::with_port(8080);

    let api = engine.group("api");
    api.get("/search", search);
    api.post("/login", login);
    api.post("/upload", upload);

    engine.run().await.unwrap();
}
