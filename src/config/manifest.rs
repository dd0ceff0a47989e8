//! Dependency manifest parsing (one requirement specifier per line).
use std::collections::HashSet;
use std::path::Path;

use crate::error::DependencyInstallError;

/// Characters that may follow a project name in a specifier.
const SPECIFIER_STARTS: &[char] = &['[', '<', '>', '=', '!', '~', ';', '@'];

/// A single dependency specifier from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// The specifier exactly as passed to the installer (e.g. `paho-mqtt>=1.5`).
    pub spec: String,
    /// Normalised project name used for presence checks.
    pub name: String,
    /// What an installed distribution must satisfy.
    pub constraint: Constraint,
    /// One-based line number in the manifest.
    pub line: usize,
}

/// Comparison operator of a version clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `~=`
    Compatible,
    /// `===`
    Arbitrary,
}

impl Comparison {
    /// Operators by token, longest first so `===` wins over `==`.
    const TOKENS: [(&'static str, Self); 8] = [
        ("===", Self::Arbitrary),
        ("~=", Self::Compatible),
        ("==", Self::Equal),
        ("!=", Self::NotEqual),
        (">=", Self::GreaterEqual),
        ("<=", Self::LessEqual),
        (">", Self::Greater),
        ("<", Self::Less),
    ];
}

/// One `<op><version>` clause of a version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionClause {
    /// Comparison operator.
    pub op: Comparison,
    /// Version text as written.
    pub version: String,
}

impl VersionClause {
    fn admits(&self, raw: &str, installed: &[u64]) -> bool {
        if self.op == Comparison::Arbitrary {
            return raw == self.version;
        }
        let Some(target) = release(&self.version) else {
            return false;
        };
        let ord = compare_release(installed, &target);
        match self.op {
            Comparison::Equal => ord.is_eq(),
            Comparison::NotEqual => ord.is_ne(),
            Comparison::GreaterEqual => ord.is_ge(),
            Comparison::LessEqual => ord.is_le(),
            Comparison::Greater => ord.is_gt(),
            Comparison::Less => ord.is_lt(),
            Comparison::Compatible => {
                let prefix = target.len().saturating_sub(1);
                prefix > 0
                    && ord.is_ge()
                    && target
                        .iter()
                        .take(prefix)
                        .enumerate()
                        .all(|(i, t)| installed.get(i).copied().unwrap_or(0) == *t)
            }
            Comparison::Arbitrary => false,
        }
    }
}

/// What an installed distribution must satisfy to count as provisioned.
///
/// Only plain numeric release versions are compared here. Anything else
/// (extras, direct URLs, environment markers, wildcards, pre-releases) is
/// [`Deferred`](Self::Deferred): the installer is always asked, and leaves
/// an already-satisfied requirement alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Bare project name: any installed version will do.
    Any,
    /// All clauses must hold for the installed version.
    Versions(Vec<VersionClause>),
    /// Cannot be decided locally.
    Deferred,
}

impl Constraint {
    /// Parse the text after the project name.
    fn parse(rest: &str) -> Self {
        let rest = rest.trim();
        if rest.is_empty() {
            return Self::Any;
        }
        if rest.contains(['[', '@', ';', '*']) {
            return Self::Deferred;
        }
        let mut clauses = Vec::new();
        for clause in rest.split(',') {
            let clause = clause.trim();
            let Some((token, op)) = Comparison::TOKENS
                .iter()
                .find(|(token, _)| clause.starts_with(token))
            else {
                return Self::Deferred;
            };
            let version = clause.get(token.len()..).unwrap_or_default().trim();
            if version.is_empty() {
                return Self::Deferred;
            }
            clauses.push(VersionClause {
                op: *op,
                version: version.to_string(),
            });
        }
        Self::Versions(clauses)
    }

    /// Whether an installed distribution at `version` satisfies this
    /// constraint. `Deferred` is never satisfied locally.
    ///
    /// # Examples
    ///
    /// ```
    /// use aggregator_postinst::config::manifest::parse;
    ///
    /// let req = parse("paho-mqtt>=1.6,<2").unwrap().remove(0);
    /// assert!(req.constraint.admits("1.6.1"));
    /// assert!(!req.constraint.admits("1.5"));
    /// assert!(!req.constraint.admits("2.0"));
    /// ```
    #[must_use]
    pub fn admits(&self, version: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Deferred => false,
            Self::Versions(clauses) => release(version)
                .is_some_and(|installed| clauses.iter().all(|c| c.admits(version, &installed))),
        }
    }
}

/// Numeric release segments of a version (`1.6.1` → `[1, 6, 1]`); `None` for
/// anything that is not a plain dotted release.
fn release(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Compare releases, padding the shorter one with zeros (`1.0 == 1.0.0`).
fn compare_release(a: &[u64], b: &[u64]) -> std::cmp::Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(std::cmp::Ordering::Equal)
}

/// Normalise a project name the way package indexes compare them:
/// lower-case, with runs of `-`, `_` and `.` collapsed to a single `-`.
///
/// # Examples
///
/// ```
/// use aggregator_postinst::config::manifest::normalize_name;
///
/// assert_eq!(normalize_name("Paho_MQTT"), "paho-mqtt");
/// assert_eq!(normalize_name("python.dateutil"), "python-dateutil");
/// assert_eq!(normalize_name("zope__.interface"), "zope-interface");
/// ```
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Load and parse the manifest at `path`.
///
/// # Errors
///
/// Returns [`DependencyInstallError::ManifestUnreadable`] if the file cannot
/// be read, or a parse error from [`parse`].
pub fn load(path: &Path) -> Result<Vec<Requirement>, DependencyInstallError> {
    let content =
        std::fs::read_to_string(path).map_err(|source| DependencyInstallError::ManifestUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
    parse(&content)
}

/// Parse manifest text into requirements, preserving order.
///
/// Blank lines and `#` comments are ignored.
///
/// # Errors
///
/// Returns [`DependencyInstallError::InvalidSpecifier`] for a malformed line
/// and [`DependencyInstallError::DuplicateRequirement`] when a project is
/// listed twice.
pub fn parse(content: &str) -> Result<Vec<Requirement>, DependencyInstallError> {
    let mut seen = HashSet::new();
    let mut requirements = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let Some(spec) = strip_comment(raw) else {
            continue;
        };
        let (name, rest) =
            parse_name(spec).map_err(|reason| DependencyInstallError::InvalidSpecifier {
                line,
                spec: spec.to_string(),
                reason,
            })?;
        let name = normalize_name(name);
        if !seen.insert(name.clone()) {
            return Err(DependencyInstallError::DuplicateRequirement { name, line });
        }
        requirements.push(Requirement {
            spec: spec.to_string(),
            name,
            constraint: Constraint::parse(rest),
            line,
        });
    }

    Ok(requirements)
}

/// Trim a line and drop its comment; `None` if nothing is left.
fn strip_comment(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.starts_with('#') {
        return None;
    }
    let body = trimmed
        .find(" #")
        .or_else(|| trimmed.find("\t#"))
        .map_or(trimmed, |pos| trimmed.get(..pos).unwrap_or(trimmed))
        .trim_end();
    (!body.is_empty()).then_some(body)
}

/// Split a specifier into its project name and the text after it.
fn parse_name(spec: &str) -> Result<(&str, &str), &'static str> {
    if spec.starts_with('-') {
        return Err("installer options are not supported");
    }
    let end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(spec.len());
    let (name, rest) = spec.split_at(end);

    let bounded = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    if name.is_empty() {
        return Err("missing project name");
    }
    if !bounded {
        return Err("project name must start and end with a letter or digit");
    }

    let rest = rest.trim_start();
    if !rest.is_empty() && !rest.starts_with(SPECIFIER_STARTS) {
        return Err("unexpected text after project name");
    }
    Ok((name, rest))
}
