use super::{set_content_type, Renderer, XML_CONTENT_TYPE};
use crate::{errors::Error, Response};
use serde::Serialize;

/// Serializes the wrapped value with the `quick-xml` serde serializer.
///
/// Structs become an element named after the type:
/// ```
/// use maker_route::{render::{Renderer, Xml}, Response};
///
/// #[derive(serde::Serialize)]
/// struct User {
///     name: String,
///     age: u32,
/// }
///
/// let mut resp = Response::default();
/// Xml(User { name: "jerry".into(), age: 23 }).render(&mut resp).unwrap();
/// assert_eq!(resp.body_bytes(), b"<User><name>jerry</name><age>23</age></User>");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Xml<T>(pub T);

impl<T: Serialize> Renderer for Xml<T> {
    fn render(&self, resp: &mut Response) -> Result<(), Error> {
        let body = quick_xml::se::to_string(&self.0).map_err(|e| Error::Xml(e.to_string()))?;

        self.write_content_type(resp);
        resp.body(body);
        Ok(())
    }

    #[inline]
    fn write_content_type(&self, resp: &mut Response) {
        set_content_type(resp, XML_CONTENT_TYPE);
    }
}
