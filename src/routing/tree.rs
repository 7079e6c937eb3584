//! Segment trie behind every [`RouteGroup`](crate::RouteGroup).
//!
//! Paths are split on `/` and the first (empty) piece is dropped, so
//! `/user/:id` becomes `["user", ":id"]`. No other normalization happens:
//! `/a/` and `/a` are different routes.
//!
//! Segment kinds, in lookup priority:
//!
//! | Segment  | Matches                     | Binds                         |
//! |----------|-----------------------------|-------------------------------|
//! | `users`  | exactly `users`             | nothing                       |
//! | `:id`    | any single segment          | `id -> segment`               |
//! | `*`      | any single segment          | nothing                       |
//! | `**`     | all remaining segments      | the remaining path            |

/// Result of a successful [`PathTree::lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RouteMatch<'t, 'p> {
    /// Registered pattern of the matched node, e.g. `/get/:id`.
    pub(crate) pattern: &'t str,
    pub(crate) params: Vec<(&'t str, &'p str)>,
    /// Path absorbed by a `**` segment, without its leading `/`.
    pub(crate) wildcard: Option<&'p str>,
}

#[derive(Debug, Default)]
pub(crate) struct PathTree {
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    segment: String,
    pattern: String,
    children: Vec<Node>,
    terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Literal,
    Param,
    Wildcard,
    CatchAll,
}

impl Node {
    #[inline]
    fn kind(&self) -> Kind {
        match self.segment.as_str() {
            "*" => Kind::Wildcard,
            "**" => Kind::CatchAll,
            s if s.starts_with(':') => Kind::Param,
            _ => Kind::Literal,
        }
    }

    #[inline]
    fn child_of_kind(&self, kind: Kind) -> Option<&Node> {
        self.children.iter().find(|child| child.kind() == kind)
    }
}

impl PathTree {
    /// Registers `path`, marking its last node as the end of a route.
    ///
    /// # Panics
    ///
    /// When a parameter segment would get a sibling parameter with another
    /// name (`/user/:id` next to `/user/:name`): lookups could never reach
    /// the second one.
    pub(crate) fn insert(&mut self, path: &str) {
        let mut node = &mut self.root;
        let mut walked = false;

        for segment in path.split('/').skip(1) {
            let position = node.children.iter().position(|c| c.segment == segment);

            let index = match position {
                Some(index) => index,
                None => {
                    if segment.starts_with(':') {
                        if let Some(other) = node.child_of_kind(Kind::Param) {
                            panic!(
                                "route `{path}`: parameter `{segment}` conflicts with \
                                 `{}` registered at the same position",
                                other.pattern
                            );
                        }
                    }

                    let pattern = format!("{}/{}", node.pattern, segment);
                    node.children.push(Node {
                        segment: segment.to_owned(),
                        pattern,
                        children: Vec::new(),
                        terminal: false,
                    });
                    node.children.len() - 1
                }
            };

            node = &mut node.children[index];
            walked = true;
        }

        if walked {
            node.terminal = true;
        }
    }

    /// Finds the route registered for `path`.
    ///
    /// At each level the first child of the best kind wins (literal, then
    /// `:param`, then `*`); a `**` child ends the walk. A lower-priority
    /// sibling is never retried when the chosen branch dead-ends.
    pub(crate) fn lookup<'t, 'p>(&'t self, path: &'p str) -> Option<RouteMatch<'t, 'p>> {
        let mut node = &self.root;
        let mut params = Vec::new();

        // Byte offset of the current segment within `path`.
        let mut start = path.find('/')? + 1;

        for segment in path[start..].split('/') {
            if let Some(child) = node.children.iter().find(|c| c.segment == segment) {
                node = child;
            } else if let Some(child) = node.child_of_kind(Kind::Param) {
                params.push((&child.segment[1..], segment));
                node = child;
            } else if let Some(child) = node.child_of_kind(Kind::Wildcard) {
                node = child;
            } else if let Some(child) = node.child_of_kind(Kind::CatchAll) {
                return child.terminal.then_some(RouteMatch {
                    pattern: &child.pattern,
                    params,
                    wildcard: Some(&path[start..]),
                });
            } else {
                return None;
            }

            start += segment.len() + 1;
        }

        node.terminal.then_some(RouteMatch {
            pattern: &node.pattern,
            params,
            wildcard: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(paths: &[&str]) -> PathTree {
        let mut tree = PathTree::default();
        for path in paths {
            tree.insert(path);
        }
        tree
    }

    fn pattern<'t>(tree: &'t PathTree, path: &str) -> Option<&'t str> {
        tree.lookup(path).map(|m| m.pattern)
    }

    #[test]
    fn literal_round_trip() {
        let paths = ["/", "/hello", "/hello/get", "/get/html", "/a/b/c/d"];
        let tree = tree(&paths);

        for path in paths {
            assert_eq!(pattern(&tree, path), Some(path), "{path}");
        }
    }

    #[test]
    fn only_terminal_nodes_match() {
        let tree = tree(&["/hello/get"]);

        assert_eq!(pattern(&tree, "/hello"), None);
        assert_eq!(pattern(&tree, "/hello/get/more"), None);
        assert_eq!(pattern(&tree, ""), None);
    }

    #[test]
    fn prefix_registered_later_becomes_terminal() {
        let tree = tree(&["/hello/get", "/hello"]);

        assert_eq!(pattern(&tree, "/hello"), Some("/hello"));
        assert_eq!(pattern(&tree, "/hello/get"), Some("/hello/get"));
    }

    #[test]
    fn literal_beats_param() {
        let tree = tree(&["/get/:id", "/get/html"]);

        assert_eq!(pattern(&tree, "/get/html"), Some("/get/html"));

        let found = tree.lookup("/get/42").unwrap();
        assert_eq!(found.pattern, "/get/:id");
        assert_eq!(found.params, [("id", "42")]);
    }

    #[test]
    fn single_wildcard() {
        let tree = tree(&["/hello/*/get"]);

        let found = tree.lookup("/hello/anything/get").unwrap();
        assert_eq!(found.pattern, "/hello/*/get");
        assert!(found.params.is_empty());
        assert_eq!(found.wildcard, None);

        assert_eq!(pattern(&tree, "/hello/a/b/get"), None);
    }

    #[test]
    fn double_wildcard_absorbs() {
        let tree = tree(&["/static/**", "/static/index"]);

        let found = tree.lookup("/static/css/site/main.css").unwrap();
        assert_eq!(found.pattern, "/static/**");
        assert_eq!(found.wildcard, Some("css/site/main.css"));

        assert_eq!(pattern(&tree, "/static/index"), Some("/static/index"));
        assert_eq!(tree.lookup("/static/").unwrap().wildcard, Some(""));
        assert_eq!(pattern(&tree, "/static"), None);
    }

    #[test]
    fn kind_priority() {
        let tree = tree(&["/a/**", "/a/*", "/a/:p", "/b/**", "/b/*"]);

        #[rustfmt::skip]
        let cases = [
            ("/a/x",   Some("/a/:p")),
            ("/a/x/y", None),
            ("/b/x",   Some("/b/*")),
            ("/b/x/y", None),
        ];

        for (path, expected) in cases {
            assert_eq!(pattern(&tree, path), expected, "{path}");
        }
    }

    #[test]
    fn no_backtracking() {
        let tree = tree(&["/static/**", "/static/:file/raw"]);

        // `:file` is preferred and its branch dead-ends.
        assert_eq!(pattern(&tree, "/static/css/main.css"), None);
        assert_eq!(pattern(&tree, "/static/css/raw"), Some("/static/:file/raw"));
    }

    #[test]
    fn double_wildcard_must_end_route() {
        let tree = tree(&["/a/**/b"]);

        assert_eq!(pattern(&tree, "/a/x/b"), None);
    }

    #[test]
    fn params_in_order() {
        let tree = tree(&["/user/:uid/post/:pid"]);
        let found = tree.lookup("/user/7/post/99").unwrap();

        assert_eq!(found.params, [("uid", "7"), ("pid", "99")]);
    }

    #[test]
    fn trailing_slash_is_distinct() {
        let tree = tree(&["/a"]);

        assert_eq!(pattern(&tree, "/a/"), None);
    }

    #[test]
    fn lookup_is_idempotent() {
        let tree = tree(&["/get/:id", "/files/**"]);

        for _ in 0..3 {
            assert_eq!(pattern(&tree, "/get/1"), Some("/get/:id"));
            assert_eq!(tree.lookup("/files/a/b").unwrap().wildcard, Some("a/b"));
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let tree = tree(&["/a/:id", "/a/:id"]);

        assert_eq!(tree.root.children.len(), 1);
        assert_eq!(tree.root.children[0].children.len(), 1);
    }

    #[test]
    #[should_panic(expected = "conflicts with `/user/:id`")]
    fn ambiguous_params() {
        tree(&["/user/:id", "/user/:name"]);
    }
}
