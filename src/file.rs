//! Serving files from disk inside a handler.
//!
//! Errors are answered directly: `404` for missing files, `400` for paths
//! with `..` components and `500` for other I/O failures.

use crate::{Context, StatusCode};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

impl Context {
    /// Writes the file at `path` as the response body.
    ///
    /// A directory is served through its `index.html`. The content type is
    /// guessed from the extension.
    ///
    /// ```no_run
    /// use maker_route::{Context, Engine};
    ///
    /// let mut engine = Engine::new();
    /// engine.group("").get("/favicon.ico", |ctx: &mut Context| ctx.file("assets/favicon.ico"));
    /// ```
    pub fn file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if has_parent_dir(path) {
            return self.file_error(path, StatusCode::BadRequest, "invalid URL path\n");
        }

        self.serve(path);
    }

    /// Like [`file`](Self::file), but asks the client to save the body as
    /// `name`.
    pub fn file_attachment(&mut self, path: impl AsRef<Path>, name: &str) {
        self.response_mut()
            .set_header("content-disposition", content_disposition(name));
        self.file(path);
    }

    /// Serves `rel_path` from under `root`.
    ///
    /// The request path reads as `rel_path` while the file is served and is
    /// restored afterwards, so `ctx.path()` is unchanged for the caller.
    ///
    /// ```no_run
    /// use maker_route::{Context, Engine};
    ///
    /// let mut engine = Engine::new();
    /// engine.group("static").get("/**", |ctx: &mut Context| {
    ///     let rel = ctx.wildcard().unwrap_or_default().to_owned();
    ///     ctx.file_from_dir(&rel, "public");
    /// });
    /// ```
    pub fn file_from_dir(&mut self, rel_path: &str, root: impl AsRef<Path>) {
        let old = self.request_mut().url_mut().replace_path(rel_path.to_owned());

        match map_path(root.as_ref(), self.path()) {
            Some(path) => self.serve(&path),
            None => {
                let path = PathBuf::from(self.path());
                self.file_error(&path, StatusCode::BadRequest, "invalid URL path\n");
            }
        }

        self.request_mut().url_mut().replace_path(old);
    }

    fn serve(&mut self, path: &Path) {
        let result = match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                let index = path.join("index.html");
                fs::read(&index).map(|body| (body, content_type(&index)))
            }
            Ok(_) => fs::read(path).map(|body| (body, content_type(path))),
            Err(err) => Err(err),
        };

        match result {
            Ok((body, content_type)) => {
                tracing::debug!(path = %path.display(), size = body.len(), "serving file");
                self.response_mut()
                    .status(StatusCode::Ok)
                    .set_header("content-type", content_type)
                    .body(body);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.file_error(path, StatusCode::NotFound, "404 page not found\n");
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "file could not be read");
                self.file_error(path, StatusCode::InternalServerError, "500 Internal Server Error\n");
            }
        }
    }

    fn file_error(&mut self, path: &Path, status: StatusCode, text: &'static str) {
        tracing::debug!(path = %path.display(), %status, "file not served");

        self.response_mut().remove_header("content-disposition");
        self.string(status, text);
    }
}

/// `root` joined with the normal components of `url_path`; `None` when the
/// path tries to leave `root`.
fn map_path(root: &Path, url_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(url_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

#[inline]
fn has_parent_dir(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

fn content_disposition(name: &str) -> String {
    if name.is_ascii() {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!("attachment; filename*=UTF-8''{}", urlencoding::encode(name))
    }
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        "zip" => "application/zip",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
