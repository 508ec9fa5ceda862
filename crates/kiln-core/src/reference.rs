use std::fmt;

use crate::error::ParseError;
use crate::version::Version;

/// A concrete package reference: `name/version[@user/channel][#revision]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReference {
    pub name: String,
    pub version: Version,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
}

impl PackageReference {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            user: None,
            channel: None,
            revision: None,
        }
    }

    /// Parse the textual form. The version part must be a concrete version.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let parts = split_reference(input)?;
        let version = Version::parse(parts.version).map_err(|e| ParseError::InvalidReference {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name: parts.name.to_string(),
            version,
            user: parts.user.map(str::to_string),
            channel: parts.channel.map(str::to_string),
            revision: parts.revision.map(str::to_string),
        })
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// `name/version` without qualifiers.
    pub fn short(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if self.user.is_some() || self.channel.is_some() {
            write!(
                f,
                "@{}/{}",
                self.user.as_deref().unwrap_or("_"),
                self.channel.as_deref().unwrap_or("_")
            )?;
        }
        if let Some(rev) = &self.revision {
            write!(f, "#{rev}")?;
        }
        Ok(())
    }
}

/// Borrowed pieces of a reference-shaped string. The version part is left
/// unparsed so requirements can reuse this for ranges and aliases.
pub(crate) struct ReferenceParts<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub user: Option<&'a str>,
    pub channel: Option<&'a str>,
    pub revision: Option<&'a str>,
}

fn non_placeholder(part: &str) -> Option<&str> {
    if part.is_empty() || part == "_" {
        None
    } else {
        Some(part)
    }
}

pub(crate) fn split_reference(input: &str) -> Result<ReferenceParts<'_>, ParseError> {
    let invalid = |reason: &str| ParseError::InvalidReference {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let s = input.trim();

    let (s, revision) = match s.split_once('#') {
        Some((rest, rev)) if !rev.is_empty() => (rest, Some(rev)),
        Some(_) => return Err(invalid("empty revision")),
        None => (s, None),
    };
    let (s, user, channel) = match s.split_once('@') {
        Some((rest, uc)) => {
            let (user, channel) = uc
                .split_once('/')
                .ok_or_else(|| invalid("expected `@user/channel`"))?;
            (rest, non_placeholder(user), non_placeholder(channel))
        }
        None => (s, None, None),
    };
    let (name, version) = s
        .split_once('/')
        .ok_or_else(|| invalid("expected `name/version`"))?;

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
    {
        return Err(invalid("package names use letters, digits and `_-.+`"));
    }
    if version.trim().is_empty() {
        return Err(invalid("missing version"));
    }

    Ok(ReferenceParts {
        name,
        version: version.trim(),
        user,
        channel,
        revision,
    })
}
