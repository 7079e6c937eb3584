//! URL query string and `application/x-www-form-urlencoded` parsing.

use memchr::memchr;
use std::{borrow::Cow, collections::HashMap, error, fmt};

/// Upper bound of parameters kept from a single query string or form body.
pub const MAX_PARAMS: usize = 1024;

/// Zero-copy splitter for `key=value&key=value` strings.
///
/// Splits on `&` and the first `=` of every pair without decoding anything;
/// decoding is left to the [QueryCollector] (see [Params]).
///
/// # Examples
/// ```rust
/// use maker_route::query::Query;
///
/// let query = b"debug&name=&=Qwe&key=sda&&";
/// let pairs: Vec<(&[u8], &[u8])> = Query::parse(query, 10).unwrap();
///
/// assert_eq!(pairs.len(), 5);
/// assert!(pairs[0] == (b"debug", b""));
/// assert!(pairs[1] == (b"name", b""));
/// assert!(pairs[2] == (b"", b"Qwe"));
/// assert!(pairs[3] == (b"key", b"sda"));
/// assert!(pairs[4] == (b"", b""));
/// ```
pub struct Query;

impl Query {
    /// Parses a query string into a new collection.
    ///
    /// `query` may start with `?`; `?a=1` and `a=1` are equivalent.
    #[inline(always)]
    pub fn parse<'a, C: QueryCollector<'a>>(query: &'a [u8], limit: usize) -> Result<C, Error> {
        let mut result = C::with_capacity(limit.min(16));
        Self::parse_into(&mut result, query, limit)?;
        Ok(result)
    }

    /// Parses a query string into an existing collection, appending to it.
    ///
    /// # Examples
    /// ```
    /// use maker_route::query::Query;
    ///
    /// let mut collector = Vec::new();
    /// Query::parse_into(&mut collector, b"a=1&b=2", 10).unwrap();
    /// Query::parse_into(&mut collector, b"c=3", 10).unwrap();
    /// assert_eq!(collector.len(), 3);
    ///
    /// let mut collector = Vec::new();
    /// let result = Query::parse_into(&mut collector, b"a=1&b=2&c=3", 2);
    /// assert!(result.is_err());
    /// ```
    #[inline]
    pub fn parse_into<'a, C: QueryCollector<'a>>(
        result: &mut C,
        query: &'a [u8],
        limit: usize,
    ) -> Result<(), Error> {
        let data = match query.first().ok_or(Error::Empty)? {
            b'?' => &query[1..],
            _ => query,
        };

        let mut start = 0;
        while start < data.len() {
            if result.length() >= limit {
                return Err(Error::OverLimit(limit));
            }

            let end = memchr(b'&', &data[start..])
                .map(|pos| start + pos)
                .unwrap_or(data.len());

            let index = memchr(b'=', &data[start..end]).unwrap_or(end - start);
            let split_index = start + index;

            let key = &data[start..split_index];
            let value = match split_index < end {
                true => &data[split_index + 1..end],
                false => b"",
            };

            result.add_param(key, value);
            start = end + 1;
        }

        Ok(())
    }
}

/// A collection that receives split query parameters.
pub trait QueryCollector<'a>
where
    Self: Sized,
{
    fn add_param(&mut self, key: &'a [u8], value: &'a [u8]);

    // `length` instead of `len` keeps clippy from asking for `is_empty`
    fn length(&self) -> usize;

    fn with_capacity(capacity: usize) -> Self;
}

impl<'a> QueryCollector<'a> for Vec<(&'a [u8], &'a [u8])> {
    #[inline(always)]
    fn add_param(&mut self, key: &'a [u8], value: &'a [u8]) {
        self.push((key, value));
    }

    #[inline(always)]
    fn length(&self) -> usize {
        self.len()
    }

    #[inline(always)]
    fn with_capacity(capacity: usize) -> Self {
        Vec::with_capacity(capacity)
    }
}

/// Decoded parameters: every key maps to its values in arrival order.
///
/// Keys and values are percent-decoded and `+` is read as a space.
/// Invalid UTF-8 after decoding is replaced lossily.
///
/// # Examples
/// ```
/// use maker_route::query::Params;
///
/// let params = Params::from_urlencoded(b"name=John+Doe&tag=a&tag=b&user[id]=1&user[age]=29");
///
/// assert_eq!(params.get("name"), Some("John Doe"));
/// assert_eq!(params.get_all("tag").unwrap(), ["a", "b"]);
///
/// let user = params.get_map("user").unwrap();
/// assert_eq!(user["id"], "1");
/// assert_eq!(user["age"], "29");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: HashMap<String, Vec<String>>,
    count: usize,
}

impl Params {
    /// Decodes a query string or url-encoded form body.
    ///
    /// Parameters beyond [MAX_PARAMS] are dropped.
    pub fn from_urlencoded(raw: &[u8]) -> Self {
        let mut params = Params::default();

        if let Err(Error::OverLimit(limit)) = Query::parse_into(&mut params, raw, MAX_PARAMS) {
            tracing::warn!(limit, "parameter limit reached, remaining parameters ignored");
        }

        params
    }

    /// First value of `key`.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `key`, in arrival order.
    #[inline]
    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Collects `base[sub]=value` keys into `sub -> value` (first value wins).
    ///
    /// Returns `None` when no key of that shape exists. Keys with an empty
    /// `[]` subkey are ignored.
    pub fn get_map(&self, base: &str) -> Option<HashMap<String, String>> {
        if base.is_empty() {
            return None;
        }

        let mut dict = HashMap::new();
        for (key, values) in &self.entries {
            let Some(rest) = key.strip_prefix(base).and_then(|r| r.strip_prefix('[')) else {
                continue;
            };

            let Some(end) = memchr(b']', rest.as_bytes()).filter(|end| *end >= 1) else {
                continue;
            };

            if let Some(first) = values.first() {
                dict.insert(rest[..end].to_owned(), first.clone());
            }
        }

        (!dict.is_empty()).then_some(dict)
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of parameters parsed, duplicates included.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn push(&mut self, key: String, value: String) {
        self.entries.entry(key).or_default().push(value);
        self.count += 1;
    }
}

impl<'a> QueryCollector<'a> for Params {
    #[inline]
    fn add_param(&mut self, key: &'a [u8], value: &'a [u8]) {
        if key.is_empty() && value.is_empty() {
            return;
        }

        self.push(decode(key).into_owned(), decode(value).into_owned());
    }

    #[inline(always)]
    fn length(&self) -> usize {
        self.count
    }

    #[inline(always)]
    fn with_capacity(capacity: usize) -> Self {
        Params {
            entries: HashMap::with_capacity(capacity),
            count: 0,
        }
    }
}

/// Percent-decodes one form component, reading `+` as a space.
pub(crate) fn decode(src: &[u8]) -> Cow<'_, str> {
    let needs_plus = memchr(b'+', src).is_some();
    let needs_percent = memchr(b'%', src).is_some();

    match (needs_plus, needs_percent) {
        (false, false) => String::from_utf8_lossy(src),
        (true, false) => Cow::Owned(String::from_utf8_lossy(src).replace('+', " ")),
        (plus, true) => {
            let spaced: Cow<[u8]> = match plus {
                true => Cow::Owned(
                    src.iter()
                        .map(|b| if *b == b'+' { b' ' } else { *b })
                        .collect(),
                ),
                false => Cow::Borrowed(src),
            };

            let decoded = urlencoding::decode_binary(&spaced);
            Cow::Owned(String::from_utf8_lossy(&decoded).into_owned())
        }
    }
}

/// Error types that can occur during query parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// More parameters than the given limit.
    OverLimit(usize),

    /// The query string is empty or only `?`.
    Empty,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OverLimit(limit) => {
                write!(f, "Query parameter limit exceeded: limit={}", limit)
            }
            Error::Empty => {
                write!(f, "Query string is empty or contains no parameters")
            }
        }
    }
}
