//! Route lookup.
//!
//! The kernel only consumes lookup results; path matching is delegated to a
//! [`Router`] implementation. [`MatchitRouter`] is the default, keeping one
//! `matchit` tree per method.

use crate::error::RouteError;
use http::Method;
use matchit::InsertError;
use serde::Deserialize;
use std::collections::HashMap;

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<H> {
    /// The registered value.
    pub handler: H,
    /// Captured parameters, in template order.
    pub params: Vec<(String, String)>,
}

/// Maps a method and path to a registered value.
pub trait Router<H>: Send + Sync + 'static {
    /// Register `handler` for `method` and the path template `path`.
    fn insert(&mut self, method: &Method, path: &str, handler: H) -> Result<(), RouteError>;

    /// Look up a request path. A query string, if present, is ignored.
    fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<H>>;
}

/// Path normalization applied by [`MatchitRouter`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterOptions {
    /// Match static segments case-sensitively.
    pub case_sensitive: bool,
    /// Treat `/a/` like `/a`.
    pub ignore_trailing_slash: bool,
    /// Treat `//a` like `/a`.
    pub ignore_duplicate_slashes: bool,
    /// Reject matches whose parameter values are longer than this.
    pub max_param_length: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            ignore_trailing_slash: false,
            ignore_duplicate_slashes: false,
            max_param_length: 100,
        }
    }
}

impl RouterOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set case sensitivity.
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    /// Ignore a trailing slash.
    pub fn ignore_trailing_slash(mut self, enabled: bool) -> Self {
        self.ignore_trailing_slash = enabled;
        self
    }

    /// Collapse repeated slashes.
    pub fn ignore_duplicate_slashes(mut self, enabled: bool) -> Self {
        self.ignore_duplicate_slashes = enabled;
        self
    }

    /// Limit parameter length.
    pub fn max_param_length(mut self, length: usize) -> Self {
        self.max_param_length = length;
        self
    }
}

/// Default [`Router`], backed by one `matchit` tree per method.
pub struct MatchitRouter<H> {
    trees: HashMap<Method, matchit::Router<H>>,
    options: RouterOptions,
}

impl<H> Default for MatchitRouter<H> {
    fn default() -> Self {
        Self::new(RouterOptions::default())
    }
}

impl<H> MatchitRouter<H> {
    /// An empty router.
    pub fn new(options: RouterOptions) -> Self {
        Self {
            trees: HashMap::new(),
            options,
        }
    }

    /// Normalize a path; the result has the same byte length per character
    /// as the input except for removed slashes.
    fn normalize(&self, path: &str) -> String {
        let mut out = if self.options.ignore_duplicate_slashes {
            let mut collapsed = String::with_capacity(path.len());
            for ch in path.chars() {
                if ch == '/' && collapsed.ends_with('/') {
                    continue;
                }
                collapsed.push(ch);
            }
            collapsed
        } else {
            path.to_owned()
        };
        if self.options.ignore_trailing_slash && out.len() > 1 && out.ends_with('/') {
            out.pop();
        }
        out
    }

    /// Lowercase static segments of a template, leaving `{param}` names intact.
    fn fold_template(&self, template: &str) -> String {
        if self.options.case_sensitive {
            return template.to_owned();
        }
        let mut out = String::with_capacity(template.len());
        let mut in_param = false;
        for ch in template.chars() {
            match ch {
                '{' => in_param = true,
                '}' => in_param = false,
                _ => {}
            }
            out.push(if in_param { ch } else { ch.to_ascii_lowercase() });
        }
        out
    }
}

impl<H> Router<H> for MatchitRouter<H>
where
    H: Clone + Send + Sync + 'static,
{
    fn insert(&mut self, method: &Method, path: &str, handler: H) -> Result<(), RouteError> {
        let template = self.fold_template(&self.normalize(path));
        self.trees
            .entry(method.clone())
            .or_insert_with(matchit::Router::new)
            .insert(template, handler)
            .map_err(|err| match err {
                InsertError::Conflict { .. } => RouteError::Conflict {
                    method: method.to_string(),
                    path: path.to_owned(),
                    reason: err.to_string(),
                },
                other => RouteError::InvalidPath {
                    path: path.to_owned(),
                    reason: other.to_string(),
                },
            })
    }

    fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<H>> {
        let tree = self.trees.get(method)?;
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        let normalized = self.normalize(path);
        // ASCII folding keeps byte offsets, so captured values can be read
        // back from the unfolded path.
        let lookup = if self.options.case_sensitive {
            normalized.clone()
        } else {
            normalized.to_ascii_lowercase()
        };

        let matched = tree.at(&lookup).ok()?;
        let mut params = Vec::new();
        for (key, value) in matched.params.iter() {
            if value.len() > self.options.max_param_length {
                return None;
            }
            let start = value.as_ptr() as usize - lookup.as_ptr() as usize;
            let original = normalized.get(start..start + value.len())?;
            params.push((key.to_owned(), original.to_owned()));
        }

        Some(RouteMatch {
            handler: matched.value.clone(),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_with_params_and_query() {
        let mut router = MatchitRouter::default();
        router.insert(&Method::GET, "/users/{id}", 1).unwrap();

        let found = router.find(&Method::GET, "/users/42?full=1").unwrap();
        assert_eq!(found.handler, 1);
        assert_eq!(found.params, vec![("id".to_owned(), "42".to_owned())]);
        assert!(router.find(&Method::POST, "/users/42").is_none());
    }

    #[test]
    fn test_duplicate_route_conflicts() {
        let mut router = MatchitRouter::default();
        router.insert(&Method::GET, "/a", 1).unwrap();
        assert!(matches!(
            router.insert(&Method::GET, "/a", 2),
            Err(RouteError::Conflict { .. })
        ));
        router.insert(&Method::POST, "/a", 3).unwrap();
    }

    #[test]
    fn test_case_insensitive_keeps_param_case() {
        let mut router = MatchitRouter::new(RouterOptions::new().case_sensitive(false));
        router.insert(&Method::GET, "/Files/{Name}", 1).unwrap();

        let found = router.find(&Method::GET, "/FILES/ReadMe").unwrap();
        assert_eq!(found.params, vec![("Name".to_owned(), "ReadMe".to_owned())]);
    }

    #[test]
    fn test_slash_tolerance_and_param_limit() {
        let options = RouterOptions::new()
            .ignore_trailing_slash(true)
            .ignore_duplicate_slashes(true)
            .max_param_length(3);
        let mut router = MatchitRouter::new(options);
        router.insert(&Method::GET, "/a/{id}", 1).unwrap();

        assert!(router.find(&Method::GET, "//a//abc/").is_some());
        assert!(router.find(&Method::GET, "/a/abcd").is_none());
    }
}
