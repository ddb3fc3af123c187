//! Segment trie backing one API version's routes.
//!
//! The root of a version tree has one literal child per HTTP method; below
//! that, each level is one `/`-delimited path segment. A position holds any
//! number of literal children and at most one parameter child.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};

use percent_encoding::percent_decode_str;
use regex::Regex;

use super::config::ParamMatch;
use super::error::RouteError;

/// Parameter values extracted while resolving a request path.
pub type Params = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Path and fragment parsing
// ---------------------------------------------------------------------------

/// One parsed route fragment.
#[derive(Debug, PartialEq, Eq)]
enum Fragment<'a> {
    Literal(&'a str),
    Param {
        name: &'a str,
        pattern: Option<&'a str>,
    },
}

/// Parses `:name` or `:name{pattern}`; anything else (including a bare `:`)
/// is a literal.
fn parse_fragment<'a>(fragment: &'a str, route: &str) -> Result<Fragment<'a>, RouteError> {
    if fragment.len() <= 1 || !fragment.starts_with(':') {
        return Ok(Fragment::Literal(fragment));
    }

    let malformed = || RouteError::MalformedParameter {
        fragment: fragment.to_string(),
        route: route.to_string(),
    };

    match (fragment.find('{'), fragment.rfind('}')) {
        (None, None) => Ok(Fragment::Param {
            name: &fragment[1..],
            pattern: None,
        }),
        (Some(open), Some(close)) if open < close && close == fragment.len() - 1 => {
            let name = &fragment[1..open];
            if name.is_empty() {
                return Err(malformed());
            }
            let pattern = &fragment[open + 1..close];
            Ok(Fragment::Param {
                name,
                pattern: (!pattern.is_empty()).then_some(pattern),
            })
        }
        _ => Err(malformed()),
    }
}

/// Splits a path into its non-empty segments.
pub(crate) fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Percent-decodes a request path before it is split into segments, so an
/// encoded `/` separates segments like a literal one. A path that does not
/// decode to UTF-8 is matched as sent.
pub(crate) fn decode_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path).decode_utf8().unwrap_or_else(|_| {
        tracing::debug!(path, "decoded path is not UTF-8, matching raw");
        Cow::Borrowed(path)
    })
}

/// Normalizes a registration path: leading `/` added, trailing `/` removed.
pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

// ---------------------------------------------------------------------------
// Parameter children
// ---------------------------------------------------------------------------

/// A compiled parameter constraint. `source` is the pattern as registered;
/// `regex` is what lookups run.
#[derive(Debug, Clone)]
struct ParamPattern {
    source: String,
    regex: Regex,
}

impl ParamPattern {
    fn compile(source: &str, mode: ParamMatch, route: &str) -> Result<Self, RouteError> {
        let invalid = |err| RouteError::InvalidPattern {
            pattern: source.to_string(),
            route: route.to_string(),
            source: err,
        };

        // Validate the pattern on its own first so anchoring cannot make an
        // unbalanced pattern compile.
        let raw = Regex::new(source).map_err(invalid)?;
        let regex = match mode {
            ParamMatch::Substring => raw,
            ParamMatch::Segment => Regex::new(&format!("^(?:{source})$")).map_err(invalid)?,
        };

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }
}

/// A validated route fragment ready to be inserted.
enum Step {
    Literal(String),
    Param {
        name: String,
        pattern: Option<ParamPattern>,
    },
}

#[derive(Debug)]
struct ParamChild<H> {
    name: String,
    pattern: Option<ParamPattern>,
    node: Node<H>,
}

impl<H> ParamChild<H> {
    fn same_shape(&self, name: &str, pattern: Option<&ParamPattern>) -> bool {
        self.name == name
            && self.pattern.as_ref().map(|p| p.source.as_str()) == pattern.map(|p| p.source.as_str())
    }

    /// Placeholder text used in route listings.
    fn label(&self) -> String {
        match &self.pattern {
            Some(p) => format!(":{}{{{}}}", self.name, p.source),
            None => format!(":{}", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// One trie position. A node may be a pass-through branch, a terminal with a
/// handler, or both.
#[derive(Debug)]
pub(crate) struct Node<H> {
    handler: Option<H>,
    literals: BTreeMap<String, Node<H>>,
    param: Option<Box<ParamChild<H>>>,
}

impl<H> Default for Node<H> {
    fn default() -> Self {
        Self {
            handler: None,
            literals: BTreeMap::new(),
            param: None,
        }
    }
}

impl<H> Node<H> {
    /// Register `handler` for `method` and `path` below this version root.
    ///
    /// Registration is atomic: on error the trie is left unchanged.
    pub(crate) fn insert(
        &mut self,
        method: &str,
        path: &str,
        handler: H,
        mode: ParamMatch,
    ) -> Result<(), RouteError> {
        let route = normalize_path(path);
        let steps = Self::compile_steps(&route, mode)?;
        let method = method.to_ascii_uppercase();

        self.check_insert(&method, &steps, &route)?;

        let mut node = self.literals.entry(method).or_default();
        for step in steps {
            node = match step {
                Step::Literal(segment) => node.literals.entry(segment).or_default(),
                Step::Param { name, pattern } => {
                    let child = node.param.get_or_insert_with(|| {
                        Box::new(ParamChild {
                            name,
                            pattern,
                            node: Node::default(),
                        })
                    });
                    &mut child.node
                }
            };
        }
        node.handler = Some(handler);
        Ok(())
    }

    fn compile_steps(route: &str, mode: ParamMatch) -> Result<Vec<Step>, RouteError> {
        let mut seen = HashSet::new();
        let mut steps = Vec::new();

        for segment in path_segments(route) {
            match parse_fragment(segment, route)? {
                Fragment::Literal(text) => steps.push(Step::Literal(text.to_string())),
                Fragment::Param { name, pattern } => {
                    if !seen.insert(name) {
                        return Err(RouteError::DuplicateParameter {
                            name: name.to_string(),
                            route: route.to_string(),
                        });
                    }
                    let pattern = pattern
                        .map(|p| ParamPattern::compile(p, mode, route))
                        .transpose()?;
                    steps.push(Step::Param {
                        name: name.to_string(),
                        pattern,
                    });
                }
            }
        }

        Ok(steps)
    }

    /// Walks the existing nodes along `steps` without mutating, reporting
    /// parameter conflicts and duplicate handlers.
    fn check_insert(&self, method: &str, steps: &[Step], route: &str) -> Result<(), RouteError> {
        let Some(mut node) = self.literals.get(method) else {
            return Ok(());
        };

        for step in steps {
            let next = match step {
                Step::Literal(segment) => node.literals.get(segment),
                Step::Param { name, pattern } => match &node.param {
                    Some(child) if !child.same_shape(name, pattern.as_ref()) => {
                        return Err(RouteError::ConflictingParameter {
                            existing: child.label(),
                            found: Step::label(name, pattern.as_ref()),
                            route: route.to_string(),
                        });
                    }
                    Some(child) => Some(&child.node),
                    None => None,
                },
            };
            match next {
                Some(n) => node = n,
                // Everything below is new, nothing can collide.
                None => return Ok(()),
            }
        }

        if node.handler.is_some() {
            return Err(RouteError::DuplicateRoute {
                route: route.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve `method` and `path` to a handler, collecting parameters.
    ///
    /// At each position a literal child wins over the parameter child; there
    /// is no backtracking once a literal has been taken.
    pub(crate) fn find(&self, method: &str, path: &str) -> Option<(&H, Params)> {
        let mut node = self.literals.get(&method.to_ascii_uppercase())?;
        let mut params = Params::new();

        for segment in path_segments(path) {
            if let Some(next) = node.literals.get(segment) {
                node = next;
                continue;
            }

            let child = node.param.as_ref()?;
            if let Some(pattern) = &child.pattern {
                if !pattern.regex.is_match(segment) {
                    return None;
                }
            }
            params.insert(child.name.clone(), segment.to_string());
            node = &child.node;
        }

        node.handler.as_ref().map(|h| (h, params))
    }

    /// Lists `(METHOD, path pattern)` for every handler below this version root.
    pub(crate) fn routes(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (method, node) in &self.literals {
            let mut paths = Vec::new();
            node.collect_paths(String::new(), &mut paths);
            out.extend(paths.into_iter().map(|p| (method.clone(), p)));
        }
        out
    }

    fn collect_paths(&self, prefix: String, out: &mut Vec<String>) {
        if self.handler.is_some() {
            out.push(if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.clone()
            });
        }
        for (segment, child) in &self.literals {
            child.collect_paths(format!("{prefix}/{segment}"), out);
        }
        if let Some(child) = &self.param {
            child.node.collect_paths(format!("{prefix}/{}", child.label()), out);
        }
    }
}

impl Step {
    fn label(name: &str, pattern: Option<&ParamPattern>) -> String {
        match pattern {
            Some(p) => format!(":{name}{{{}}}", p.source),
            None => format!(":{name}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
