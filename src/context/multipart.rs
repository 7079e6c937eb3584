//! `multipart/form-data` bodies.
//!
//! The whole body is already buffered by the transport, so parts are cut
//! out of it with `memmem` instead of being streamed:
//!
//! ```text
//! --BOUNDARY\r\n
//! Content-Disposition: form-data; name="field"; filename="a.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! <content>\r\n
//! --BOUNDARY--\r\n
//! ```

use crate::query::{Params, MAX_PARAMS};
use memchr::memmem;
use std::{collections::HashMap, error, fmt};

/// Decoded form: text fields and uploaded files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    values: Params,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl Form {
    #[inline]
    pub(crate) fn from_values(values: Params) -> Self {
        Self {
            values,
            files: HashMap::new(),
        }
    }

    /// Text fields.
    #[inline(always)]
    pub fn values(&self) -> &Params {
        &self.values
    }

    /// Files uploaded under `name`, in arrival order.
    #[inline]
    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names of every field that carries at least one file.
    #[inline]
    pub fn file_fields(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

/// A file part of a multipart body, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    field: String,
    filename: String,
    content_type: Option<String>,
    content: Vec<u8>,
}

impl UploadedFile {
    /// Form field the file was sent under.
    #[inline(always)]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// File name as sent by the client. Never trust it as a path.
    #[inline(always)]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[inline(always)]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    #[inline(always)]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Extracts the `boundary` parameter of a `multipart/form-data` content type.
///
/// ```
/// use maker_route::multipart::boundary;
///
/// assert_eq!(boundary("multipart/form-data; boundary=abc").unwrap(), "abc");
/// assert_eq!(boundary(r#"multipart/form-data; boundary="a b""#).unwrap(), "a b");
/// assert!(boundary("multipart/form-data").is_err());
/// ```
pub fn boundary(content_type: &str) -> Result<&str, Error> {
    content_type
        .split(';')
        .skip(1)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| unquote(value.trim()))
        })
        .filter(|b| !b.is_empty() && b.len() <= 70)
        .ok_or(Error::MissingBoundary)
}

/// Splits `body` into parts delimited by `--boundary`.
pub(crate) fn parse(body: &[u8], boundary: &str) -> Result<Form, Error> {
    let delimiter = [&b"--"[..], boundary.as_bytes()].concat();
    // Every delimiter after the first is preceded by CRLF.
    let separator = [&b"\r\n"[..], delimiter.as_slice()].concat();
    let separator_finder = memmem::Finder::new(&separator);

    let start = memmem::find(body, &delimiter).ok_or(Error::MissingDelimiter)?;
    let mut rest = &body[start + delimiter.len()..];

    let mut form = Form::default();
    let mut parts = 0;

    loop {
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        rest = rest.strip_prefix(b"\r\n").ok_or(Error::UnexpectedEnd)?;

        parts += 1;
        if parts > MAX_PARAMS {
            return Err(Error::TooManyParts(MAX_PARAMS));
        }

        let head_end = memmem::find(rest, b"\r\n\r\n").ok_or(Error::UnexpectedEnd)?;
        let head = simdutf8::basic::from_utf8(&rest[..head_end]).map_err(|_| Error::InvalidHeader)?;
        let part = PartHead::parse(head)?;

        let content = &rest[head_end + 4..];
        let content_end = separator_finder.find(content).ok_or(Error::UnexpectedEnd)?;

        form.push(part, &content[..content_end]);
        rest = &content[content_end + separator.len()..];
    }
}

impl Form {
    fn push(&mut self, part: PartHead<'_>, content: &[u8]) {
        match part.filename {
            Some(filename) => {
                self.files
                    .entry(part.name.to_owned())
                    .or_default()
                    .push(UploadedFile {
                        field: part.name.to_owned(),
                        filename: filename.to_owned(),
                        content_type: part.content_type.map(str::to_owned),
                        content: content.to_vec(),
                    });
            }
            None => self.values.push(
                part.name.to_owned(),
                String::from_utf8_lossy(content).into_owned(),
            ),
        }
    }
}

#[derive(Debug, PartialEq)]
struct PartHead<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content_type: Option<&'a str>,
}

impl<'a> PartHead<'a> {
    fn parse(head: &'a str) -> Result<Self, Error> {
        let mut disposition = None;
        let mut content_type = None;

        for line in head.split("\r\n").filter(|l| !l.is_empty()) {
            let (name, value) = line.split_once(':').ok_or(Error::InvalidHeader)?;
            let value = value.trim();

            if name.eq_ignore_ascii_case("content-disposition") {
                disposition = Some(value);
            } else if name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value);
            }
        }

        let mut params = disposition.ok_or(Error::MissingName)?.split(';');
        if !params
            .next()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("form-data"))
        {
            return Err(Error::InvalidHeader);
        }

        let mut name = None;
        let mut filename = None;
        for param in params {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key.trim() {
                "name" => name = Some(unquote(value.trim())),
                "filename" => filename = Some(unquote(value.trim())),
                _ => {}
            }
        }

        Ok(Self {
            name: name.filter(|n| !n.is_empty()).ok_or(Error::MissingName)?,
            filename,
            content_type,
        })
    }
}

#[inline]
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Error types that can occur during multipart parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The content type has no usable `boundary` parameter.
    MissingBoundary,

    /// The body never contains the opening delimiter.
    MissingDelimiter,

    /// The body ends inside a part or before the closing delimiter.
    UnexpectedEnd,

    /// A part header is not UTF-8, lacks `:` or is not `form-data`.
    InvalidHeader,

    /// A part has no `Content-Disposition` name.
    MissingName,

    /// More parts than the given limit.
    TooManyParts(usize),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingBoundary => write!(f, "content type has no boundary parameter"),
            Error::MissingDelimiter => write!(f, "body contains no boundary delimiter"),
            Error::UnexpectedEnd => write!(f, "body ends before the closing delimiter"),
            Error::InvalidHeader => write!(f, "malformed part header"),
            Error::MissingName => write!(f, "part without a form field name"),
            Error::TooManyParts(limit) => write!(f, "part limit exceeded: limit={}", limit),
        }
    }
}
