//! Package version parsing, comparison, and range matching.
//!
//! Versions are dot-separated components with an optional pre-release
//! (after the first `-`) and optional build metadata (after `+`):
//! - Numeric components compare as numbers and rank above alphabetic ones
//! - Missing trailing components count as `0`, so `1.0 == 1.0.0`
//! - A pre-release sorts before its release: `1.0-rc1 < 1.0`
//! - Build metadata only breaks ties

use std::cmp::Ordering;
use std::fmt;

use crate::error::ParseError;

/// A parsed package version with comparable components.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    main: Vec<Component>,
    pre: Option<Vec<Component>>,
    build: Option<String>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Component {
    Numeric(u64),
    Text(String),
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let s = input.trim();
        let invalid = |reason: &str| ParseError::InvalidVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        if s.is_empty() {
            return Err(invalid("empty version"));
        }

        let (rest, build) = match s.split_once('+') {
            Some((rest, build)) if !build.is_empty() => (rest, Some(build.to_string())),
            Some(_) => return Err(invalid("empty build metadata")),
            None => (s, None),
        };
        let (main_str, pre_str) = match rest.split_once('-') {
            Some((main, pre)) if !pre.is_empty() => (main, Some(pre)),
            Some(_) => return Err(invalid("empty pre-release")),
            None => (rest, None),
        };

        let main = parse_components(main_str).ok_or_else(|| invalid("malformed component"))?;
        let pre = match pre_str {
            Some(p) => {
                Some(parse_components(p).ok_or_else(|| invalid("malformed pre-release"))?)
            }
            None => None,
        };

        Ok(Self {
            original: s.to_string(),
            main,
            pre,
            build,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// Numeric value of the component at `index`, if it is numeric.
    pub fn numeric(&self, index: usize) -> Option<u64> {
        match self.main.get(index) {
            Some(Component::Numeric(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn major(&self) -> Option<u64> {
        self.numeric(0)
    }

    /// Number of dot-separated release components.
    pub fn depth(&self) -> usize {
        self.main.len()
    }

    /// The smallest release above every version sharing the first
    /// `index + 1` components, e.g. `1.2.3` bumped at 1 is `1.3`.
    ///
    /// Returns `None` when the component at `index` is not numeric or is
    /// already `u64::MAX`.
    pub fn bump(&self, index: usize) -> Option<Version> {
        let n = self.numeric(index)?;
        let mut parts: Vec<String> = self.main[..index].iter().map(|c| c.to_string()).collect();
        parts.push(n.checked_add(1)?.to_string());
        Version::parse(&parts.join(".")).ok()
    }

    /// `true` if the release components start with `prefix`.
    fn starts_with(&self, prefix: &[Component]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, c)| compare_components(self.main.get(i), Some(c)) == Ordering::Equal)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Numeric(n) => write!(f, "{n}"),
            Component::Text(s) => f.write_str(s),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.main.len().max(other.main.len());
        for i in 0..max_len {
            let ord = compare_components(self.main.get(i), other.main.get(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }

        let pre = match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        };
        if pre != Ordering::Equal {
            return pre;
        }

        self.build.cmp(&other.build)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn parse_components(s: &str) -> Option<Vec<Component>> {
    let mut out = Vec::new();
    for token in s.split('.') {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        out.push(classify(token));
    }
    Some(out)
}

fn classify(token: &str) -> Component {
    match token.parse::<u64>() {
        Ok(n) => Component::Numeric(n),
        Err(_) => Component::Text(token.to_lowercase()),
    }
}

/// Release components: a missing component behaves like `0`.
fn compare_components(a: Option<&Component>, b: Option<&Component>) -> Ordering {
    let zero = Component::Numeric(0);
    let a = a.unwrap_or(&zero);
    let b = b.unwrap_or(&zero);
    match (a, b) {
        (Component::Numeric(a), Component::Numeric(b)) => a.cmp(b),
        (Component::Numeric(_), Component::Text(_)) => Ordering::Greater,
        (Component::Text(_), Component::Numeric(_)) => Ordering::Less,
        (Component::Text(a), Component::Text(b)) => a.cmp(b),
    }
}

/// Pre-release components: a shorter identical prefix sorts first.
fn compare_prerelease(a: &[Component], b: &[Component]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_components(Some(x), Some(y));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone)]
enum Condition {
    Any,
    Compare(Op, Version),
    Prefix(Vec<Component>),
}

impl Condition {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Condition::Any => true,
            Condition::Prefix(prefix) => version.starts_with(prefix),
            Condition::Compare(op, bound) => {
                let cmp = version.cmp(bound);
                match op {
                    Op::Eq => cmp == Ordering::Equal,
                    Op::Gt => cmp == Ordering::Greater,
                    Op::Ge => cmp != Ordering::Less,
                    Op::Lt => cmp == Ordering::Less,
                    Op::Le => cmp != Ordering::Greater,
                }
            }
        }
    }
}

/// A version range expression (the part inside `[...]`).
///
/// Supports: `>=1.0 <2.0` (all must hold), `1.0 || >=2.0` (any alternative),
/// `~1.2`, `^1.2`, `*`, `1.2.*`, a bare version for equality and the
/// `include_prerelease` token.
#[derive(Debug, Clone)]
pub struct VersionRange {
    original: String,
    alternatives: Vec<Vec<Condition>>,
    include_prerelease: bool,
}

impl VersionRange {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let invalid = |reason: String| ParseError::InvalidRange {
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty range".to_string()));
        }

        let mut include_prerelease = false;
        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let mut conditions = Vec::new();
            for token in alternative
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
            {
                if token == "include_prerelease" {
                    include_prerelease = true;
                    continue;
                }
                parse_condition(token, &mut conditions).map_err(invalid)?;
            }
            if conditions.is_empty() {
                // `[include_prerelease]` alone, or an empty alternative
                conditions.push(Condition::Any);
            }
            alternatives.push(conditions);
        }

        Ok(Self {
            original: trimmed.to_string(),
            alternatives,
            include_prerelease,
        })
    }

    /// Check if a version satisfies this range.
    ///
    /// Pre-releases never match unless the range says `include_prerelease`.
    pub fn contains(&self, version: &Version) -> bool {
        if version.is_prerelease() && !self.include_prerelease {
            return false;
        }
        self.alternatives
            .iter()
            .any(|conds| conds.iter().all(|c| c.matches(version)))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

fn parse_condition(token: &str, out: &mut Vec<Condition>) -> Result<(), String> {
    let version = |s: &str| Version::parse(s).map_err(|e| e.to_string());

    if token == "*" {
        out.push(Condition::Any);
    } else if let Some(rest) = token.strip_prefix('~') {
        let v = version(rest)?;
        let index = if v.depth() > 1 { 1 } else { 0 };
        let upper = v
            .bump(index)
            .ok_or_else(|| format!("`{token}` has no numeric upper bound"))?;
        out.push(Condition::Compare(Op::Ge, v));
        out.push(Condition::Compare(Op::Lt, upper));
    } else if let Some(rest) = token.strip_prefix('^') {
        let v = version(rest)?;
        let first_non_zero = (0..v.depth())
            .find(|&i| v.numeric(i) != Some(0))
            .unwrap_or(v.depth() - 1);
        let upper = v
            .bump(first_non_zero)
            .ok_or_else(|| format!("`{token}` has no numeric upper bound"))?;
        out.push(Condition::Compare(Op::Ge, v));
        out.push(Condition::Compare(Op::Lt, upper));
    } else if let Some(rest) = token.strip_suffix(".*") {
        let prefix = parse_components(rest).ok_or_else(|| format!("bad wildcard `{token}`"))?;
        out.push(Condition::Prefix(prefix));
    } else {
        let (op, rest) = if let Some(r) = token.strip_prefix(">=") {
            (Op::Ge, r)
        } else if let Some(r) = token.strip_prefix("<=") {
            (Op::Le, r)
        } else if let Some(r) = token.strip_prefix('>') {
            (Op::Gt, r)
        } else if let Some(r) = token.strip_prefix('<') {
            (Op::Lt, r)
        } else if let Some(r) = token.strip_prefix('=') {
            (Op::Eq, r)
        } else {
            (Op::Eq, token)
        };
        out.push(Condition::Compare(op, version(rest)?));
    }
    Ok(())
}

/// What a requirement asks for: an exact version, a range, or a named alias
/// such as `(latest)` that the recipe provider turns into a version.
#[derive(Debug, Clone)]
pub enum VersionExpr {
    Exact(Version),
    Range(VersionRange),
    Alias(String),
}

impl VersionExpr {
    /// Parse `1.2.3`, `[>=1.0 <2.0]` or `(latest)`.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let s = input.trim();
        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(|| ParseError::InvalidRange {
                input: input.to_string(),
                reason: "missing closing `]`".to_string(),
            })?;
            return Ok(VersionExpr::Range(VersionRange::parse(inner)?));
        }
        if let Some(inner) = s.strip_prefix('(') {
            let alias = inner
                .strip_suffix(')')
                .filter(|a| !a.trim().is_empty())
                .ok_or_else(|| ParseError::InvalidVersion {
                    input: input.to_string(),
                    reason: "aliases look like `(latest)`".to_string(),
                })?;
            return Ok(VersionExpr::Alias(alias.trim().to_string()));
        }
        Ok(VersionExpr::Exact(Version::parse(s)?))
    }

    /// Whether `version` satisfies this expression. Aliases must be resolved
    /// to an exact version first and never match directly.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionExpr::Exact(v) => v == version,
            VersionExpr::Range(r) => r.contains(version),
            VersionExpr::Alias(_) => false,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, VersionExpr::Range(_))
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionExpr::Exact(v) => write!(f, "{v}"),
            VersionExpr::Range(r) => write!(f, "[{r}]"),
            VersionExpr::Alias(a) => write!(f, "({a})"),
        }
    }
}

impl From<Version> for VersionExpr {
    fn from(v: Version) -> Self {
        VersionExpr::Exact(v)
    }
}
