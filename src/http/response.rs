//! Buffered HTTP response filled by handlers and serialized by the transport.

use crate::{
    http::types::{StatusCode, Version},
    limits::RespLimits,
    BodyWriter, WriteBuffer,
};
use std::{borrow::Cow, rc::Rc, sync::Arc};

/// HTTP response filled by handlers, renderers and middleware.
///
/// Unlike a streaming writer, every part stays editable until the handler
/// chain returns: a middleware may still change the status or add headers
/// after the inner handler wrote the body. `content-length` and `connection`
/// are computed on serialization and must not be set by hand.
///
/// # Examples
/// ```
/// use maker_route::{Response, StatusCode};
///
/// let mut resp = Response::default();
/// resp.status(StatusCode::Created)
///     .header("content-type", "text/plain")
///     .header("x-request-id", 42)
///     .body("Created");
///
/// assert_eq!(resp.status_code(), StatusCode::Created);
/// assert_eq!(resp.header_value("X-Request-Id"), Some("42"));
/// assert_eq!(resp.body_bytes(), b"Created");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,

    pub(crate) version: Version,
    pub(crate) keep_alive: bool,
    written: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(&RespLimits::default())
    }
}

impl Response {
    #[inline(always)]
    pub(crate) fn new(limits: &RespLimits) -> Self {
        Self {
            status: StatusCode::Ok,
            headers: Vec::new(),
            body: Vec::with_capacity(limits.default_capacity),

            version: Version::Http11,
            keep_alive: true,
            written: false,
        }
    }

    #[inline(always)]
    pub(crate) fn reset(&mut self, limits: &RespLimits) {
        if self.body.capacity() > limits.max_capacity {
            self.body = Vec::with_capacity(limits.default_capacity);
        } else {
            self.body.clear();
        }

        self.status = StatusCode::Ok;
        self.headers.clear();
        self.version = Version::Http11;
        self.keep_alive = true;
        self.written = false;
    }
}

// Building
impl Response {
    /// Sets the status code. The last call wins.
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.written = true;
        self
    }

    /// Forces the connection to close after this response.
    #[inline]
    pub fn close(&mut self) -> &mut Self {
        self.keep_alive = false;
        self
    }

    /// Appends a header. Existing headers with the same name are kept.
    ///
    /// ```
    /// use maker_route::Response;
    ///
    /// let mut resp = Response::default();
    /// resp.header("x-custom-id", 128)
    ///     .header("x-cache-enabled", true)
    ///     .header("set-cookie", "a=1")
    ///     .header("set-cookie", "b=2");
    ///
    /// assert_eq!(resp.header_value("x-cache-enabled"), Some("true"));
    /// assert_eq!(resp.headers().len(), 4);
    /// ```
    #[inline]
    pub fn header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Self {
        let entry = (to_string(&name), to_string(&value));
        self.headers.push(entry);
        self
    }

    /// Sets a header, replacing every previous value of that name.
    #[inline]
    pub fn set_header<N: WriteBuffer, V: WriteBuffer>(&mut self, name: N, value: V) -> &mut Self {
        let name = to_string(&name);
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, to_string(&value)));
        self
    }

    /// Appends a header whose value is `values` joined by `split`.
    ///
    /// ```
    /// use maker_route::Response;
    ///
    /// let mut resp = Response::default();
    /// resp.header_multi("allow", ", ", ["GET", "POST"])
    ///     .header_multi("x-ids", ", ", vec![123, 234, 345]);
    ///
    /// assert_eq!(resp.header_value("allow"), Some("GET, POST"));
    /// assert_eq!(resp.header_value("x-ids"), Some("123, 234, 345"));
    /// ```
    #[inline]
    pub fn header_multi<N, S, I, V>(&mut self, name: N, split: S, values: I) -> &mut Self
    where
        N: WriteBuffer,
        S: WriteBuffer,
        I: IntoIterator<Item = V>,
        V: WriteBuffer,
    {
        let mut buffer = Vec::new();

        let mut iter = values.into_iter();
        if let Some(first) = iter.next() {
            first.write_to(&mut buffer);

            for value in iter {
                split.write_to(&mut buffer);
                value.write_to(&mut buffer);
            }
        }

        self.headers
            .push((to_string(&name), String::from_utf8_lossy(&buffer).into_owned()));
        self
    }

    /// Appends a header with `key=value` parameters joined by `split`.
    ///
    /// ```
    /// use maker_route::Response;
    ///
    /// let mut resp = Response::default();
    /// resp.header_params("cache-control", ", ", [
    ///     ("max-age", Some("3600")),
    ///     ("must-revalidate", None),
    /// ]);
    ///
    /// assert_eq!(resp.header_value("cache-control"), Some("max-age=3600, must-revalidate"));
    /// ```
    #[inline]
    pub fn header_params<N, S, I, K, V>(&mut self, name: N, split: S, params: I) -> &mut Self
    where
        N: WriteBuffer,
        S: WriteBuffer,
        I: IntoIterator<Item = (K, Option<V>)>,
        K: WriteBuffer,
        V: WriteBuffer,
    {
        let mut buffer = Vec::new();

        for (i, (key, value)) in params.into_iter().enumerate() {
            if i > 0 {
                split.write_to(&mut buffer);
            }
            key.write_to(&mut buffer);
            if let Some(val) = value {
                buffer.push(b'=');
                val.write_to(&mut buffer);
            }
        }

        self.headers
            .push((to_string(&name), String::from_utf8_lossy(&buffer).into_owned()));
        self
    }

    /// Removes every value of a header, case-insensitive.
    #[inline]
    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self
    }

    /// Appends data to the body.
    #[inline]
    pub fn body<T: WriteBuffer>(&mut self, data: T) -> &mut Self {
        data.write_to(&mut self.body);
        self.written = true;
        self
    }

    /// Appends to the body through a [`BodyWriter`].
    ///
    /// ```
    /// use maker_route::Response;
    /// use std::io::Write;
    ///
    /// let mut resp = Response::default();
    /// resp.body_with(|w| {
    ///     w.write("lib: ");
    ///     let _ = write!(w, "{} {}", "maker", 1);
    /// });
    ///
    /// assert_eq!(resp.body_bytes(), b"lib: maker 1");
    /// ```
    #[inline]
    pub fn body_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> &mut Self {
        f(&mut BodyWriter(&mut self.body));
        self.written = true;
        self
    }

    /// Drops the body written so far.
    #[inline]
    pub fn clear_body(&mut self) -> &mut Self {
        self.body.clear();
        self
    }
}

// Inspection
impl Response {
    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    /// First value of a header, case-insensitive.
    #[inline]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline(always)]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[inline(always)]
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Whether a status or any body was set since the last reset.
    #[inline(always)]
    pub const fn is_written(&self) -> bool {
        self.written
    }

    #[inline(always)]
    pub const fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }
}

// Serialization
impl Response {
    /// Serializes the response into `out`; `head_only` omits the body
    /// but keeps its `content-length` (HEAD requests).
    pub(crate) fn write_into(&self, out: &mut Vec<u8>, head_only: bool) {
        out.extend_from_slice(self.status.to_first_line(self.version));

        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        if let Some(value) = self.connection_header() {
            out.extend_from_slice(b"connection: ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"content-length: ");
        self.body.len().write_to(out);
        out.extend_from_slice(b"\r\n\r\n");

        if !head_only {
            out.extend_from_slice(&self.body);
        }
    }

    #[inline(always)]
    const fn connection_header(&self) -> Option<&'static [u8]> {
        match (self.version, self.keep_alive) {
            (Version::Http11, true) => None,
            (Version::Http11, false) => Some(b"close"),
            (Version::Http10, true) => Some(b"keep-alive"),
            (Version::Http10, false) => Some(b"close"),
        }
    }

    #[inline]
    const fn number_to_bytes(mut n: u128) -> ([u8; 39], usize) {
        let mut buffer = [b'0'; 39];
        let mut i = 39;

        if n == 0 {
            return (buffer, 38);
        }

        while n > 0 {
            i -= 1;
            buffer[i] = b'0' + (n % 10) as u8;
            n /= 10;
        }

        (buffer, i)
    }
}

#[inline]
fn to_string<T: WriteBuffer>(value: &T) -> String {
    let mut buffer = Vec::new();
    value.write_to(&mut buffer);

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

pub mod write {
    use super::*;

    /// Writer for the response body, used by [`body_with`](Response::body_with).
    ///
    /// Accepts any [WriteBuffer] value and implements both [`std::io::Write`]
    /// and [`std::fmt::Write`], so `write!` works with either in scope.
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        /// Appends content to the response body.
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }
    }

    impl std::fmt::Write for BodyWriter<'_> {
        #[inline]
        fn write_str(&mut self, s: &str) -> std::fmt::Result {
            self.0.extend_from_slice(s.as_bytes());
            Ok(())
        }
    }

    impl std::io::Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Values that can be written into a [`Response`] header or body.
    ///
    /// Implemented for strings, bytes, booleans, chars and integers.
    /// Floating-point numbers are left out on purpose: format them
    /// yourself with the precision you need.
    ///
    /// # Example
    /// ```
    /// use maker_route::WriteBuffer;
    ///
    /// struct Celsius(i32);
    ///
    /// impl WriteBuffer for Celsius {
    ///     fn write_to(&self, buffer: &mut Vec<u8>) {
    ///         self.0.write_to(buffer);
    ///         buffer.extend_from_slice("°C".as_bytes());
    ///     }
    /// }
    /// ```
    pub trait WriteBuffer {
        /// Writes the value's representation directly to the buffer.
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let closure = $conn;
                    closure(self, buffer);
                }
            })*
        };
        (number($type:ty), $conn:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    $conn(*self as $type, buffer);
                }
            })*
        };
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }
    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value.as_bytes());
        } => str, String, Box<str>, Cow<'_, str>,
        Arc<str>, Rc<str>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value);
        } => [u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>,
        Arc<[u8]>, Rc<[u8]>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        number(u128), impl_write_buffer_u128 => u8, u16, u32, u64, u128, usize
    }
    impl_write_buffer! {
        number(i128), impl_write_buffer_i128 => i8, i16, i32, i64, i128, isize
    }
    impl WriteBuffer for bool {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(match self {
                true => b"true",
                false => b"false",
            });
        }
    }
    impl WriteBuffer for char {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            let mut buf = [0u8; 4];
            buffer.extend_from_slice(self.encode_utf8(&mut buf).as_bytes());
        }
    }
    impl WriteBuffer for StatusCode {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            self.as_u16().write_to(buffer);
        }
    }

    #[inline(always)]
    fn impl_write_buffer_u128(value: u128, buffer: &mut Vec<u8>) {
        let (arr, start) = Response::number_to_bytes(value);
        buffer.extend_from_slice(&arr[start..]);
    }

    #[inline(always)]
    fn impl_write_buffer_i128(value: i128, buffer: &mut Vec<u8>) {
        if value < 0 {
            buffer.push(b'-');
        }
        let abs = value.unsigned_abs();

        let (arr, start) = Response::number_to_bytes(abs);
        buffer.extend_from_slice(&arr[start..]);
    }
}

#[cfg(test)]
mod close_tests {
    use super::*;
    use crate::tools::*;

    #[test]
    fn basic() {
        let cases = [
            (Version::Http11, false, ""),
            (Version::Http11, true, "connection: close\r\n"),
            (Version::Http10, false, "connection: keep-alive\r\n"),
            (Version::Http10, true, "connection: close\r\n"),
        ];

        for (version, is_close, header) in cases {
            let mut resp = Response::default();
            resp.version = version;

            assert!(resp.keep_alive);
            if is_close {
                resp.close();
                assert!(!resp.keep_alive);
            }

            let mut out = Vec::new();
            resp.write_into(&mut out, false);
            assert_eq!(
                str_op(&out),
                format!(
                    "{}{header}content-length: 0\r\n\r\n",
                    str_op(StatusCode::Ok.to_first_line(version))
                )
            );
        }
    }
}

#[cfg(test)]
mod header_tests {
    use super::*;

    macro_rules! test_header {
        ($method:ident, $(($name:expr $(, $params:expr)*; $result:expr);)*) => {
           #[test] fn $method() {$(
            let mut resp = Response::default();

            resp.$method($name $(, $params)*);
            assert_eq!(resp.headers().last().unwrap().1, $result);
        )*}};
    }

    test_header! {header,
        ("name", "value"; "value");
        ("name", ""; "");
        ("name", 123; "123");
        ("name", vec![35, 33, 43]; "#!+");
        ("name", false; "false");
        ("name", -123; "-123");
        ("name", StatusCode::NotFound; "404");
    }

    test_header! {header_multi,
        ("name", ", ", ["q", "w", "e"]; "q, w, e");
        ("name", ",", [true, false]; "true,false");
        ("name", "; ", [-123, 123]; "-123; 123");
    }

    test_header! {header_params,
        ("name", ", ", [("name", Some("value"))]; "name=value");
        (
            "name", ", ", [("q", Some("1")), ("w", Some("2")), ("e", Some("3"))];
            "q=1, w=2, e=3"
        );
        (
            "u128", ", ", [("min", Some(u128::MIN)), ("max", Some(u128::MAX))];
            "min=0, max=340282366920938463463374607431768211455"
        );
        (
            "i128", ", ", [("min", Some(i128::MIN)), ("max", Some(i128::MAX))];
            "min=-170141183460469231731687303715884105728, max=170141183460469231731687303715884105727"
        );
        (
            "name", "; ", [("debug", None), ("text", Some("asd"))];
            "debug; text=asd"
        );
    }

    #[test]
    fn set_header_replaces() {
        let mut resp = Response::default();
        resp.header("Content-Type", "text/plain")
            .header("x-other", 1)
            .set_header("content-type", "application/json");

        assert_eq!(resp.headers().len(), 2);
        assert_eq!(resp.header_value("CONTENT-TYPE"), Some("application/json"));
    }
}

#[cfg(test)]
mod body_tests {
    use super::*;
    use crate::tools::*;
    use std::io::Write;

    #[test]
    fn appends() {
        let mut resp = Response::default();
        assert!(!resp.is_written());

        resp.body("sample").body(' ').body(true).body(-1234);
        resp.body_with(|w| {
            let _ = write!(w, " {}-{}", 6, 2);
        });

        assert!(resp.is_written());
        assert_eq!(str_op(resp.body_bytes()), "sample true-1234 6-2");

        resp.clear_body();
        assert!(resp.body_bytes().is_empty());
    }

    #[test]
    fn reset_restores_defaults() {
        let limits = RespLimits {
            max_capacity: 8,
            ..RespLimits::default()
        };
        let mut resp = Response::new(&limits);
        resp.status(StatusCode::NotFound)
            .header("a", "b")
            .close()
            .body("a body longer than eight bytes");
        resp.reset(&limits);

        assert_eq!(resp.status_code(), StatusCode::Ok);
        assert!(resp.headers().is_empty());
        assert!(resp.body_bytes().is_empty());
        assert!(resp.is_keep_alive());
        assert!(!resp.is_written());
        assert_eq!(resp.body.capacity(), limits.default_capacity);
    }
}
