//! Structured validation failures

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step into a JSON value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// A single failing field: where it is and why it failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Path from the root of the validated value; empty means the root itself
    pub path: Vec<PathSegment>,
    /// Human-readable reason
    pub reason: String,
}

impl ValidationIssue {
    /// Creates an issue at the given path
    pub fn new<P, S>(path: P, reason: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            reason: reason.into(),
        }
    }

    /// Creates an issue about the root value
    pub fn root(reason: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            reason: reason.into(),
        }
    }

    /// Renders the path as `$.mods[0].id`
    pub fn path_string(&self) -> String {
        let mut rendered = String::from("$");
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    rendered.push('.');
                    rendered.push_str(key);
                }
                PathSegment::Index(index) => {
                    rendered.push_str(&format!("[{}]", index));
                }
            }
        }
        rendered
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path_string(), self.reason)
    }
}

/// A value failed its schema
///
/// Carries every failing field that the validator reported. A validator that
/// stops at the first failure reports exactly one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Creates an error from a list of issues
    ///
    /// An empty list is replaced by a single root issue, so a
    /// `ValidationError` always explains itself.
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        if issues.is_empty() {
            return Self::root("value failed validation");
        }
        Self { issues }
    }

    /// Creates an error with one issue about the root value
    pub fn root(reason: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue::root(reason)],
        }
    }

    /// Creates an error with one issue at the given path
    pub fn at<P, S>(path: P, reason: impl Into<String>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self {
            issues: vec![ValidationIssue::new(path, reason)],
        }
    }

    /// All reported issues, in the order the validator found them
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The first reported issue
    pub fn first(&self) -> Option<&ValidationIssue> {
        self.issues.first()
    }

    /// Nests every issue under `segment`
    ///
    /// Used when a validator for a child value is run from a parent validator.
    pub fn prefixed(mut self, segment: impl Into<PathSegment>) -> Self {
        let segment = segment.into();
        for issue in &mut self.issues {
            issue.path.insert(0, segment.clone());
        }
        self
    }

    /// Merges the issues of another error into this one
    pub fn merge(mut self, other: ValidationError) -> Self {
        self.issues.extend(other.issues);
        self
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
