//! Selection scripts — the predicates a node must satisfy to be selected.
//!
//! A script is identified by a [`ScriptDigest`]: the SHA-256 of its trimmed
//! body together with its static/dynamic classification. The same body
//! submitted once as static and once as dynamic yields two distinct
//! digests, so learned knowledge about one never leaks into the other.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a script body after trimming surrounding whitespace.
///
/// This is the digest authorized-script directories are checked against.
pub fn content_digest(body: &str) -> String {
    hex::encode(Sha256::digest(body.trim().as_bytes()))
}

/// Stable identity of a selection script, usable as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptDigest(String);

impl ScriptDigest {
    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ScriptDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// A boolean test evaluated on a candidate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ScriptSpec", into = "ScriptSpec")]
pub struct SelectionScript {
    body: String,
    dynamic: bool,
    digest: ScriptDigest,
}

impl SelectionScript {
    /// A script whose outcome may change between runs on the same node.
    pub fn dynamic(body: impl Into<String>) -> Self {
        Self::new(body, true)
    }

    /// A script whose outcome on a given node never changes.
    pub fn fixed(body: impl Into<String>) -> Self {
        Self::new(body, false)
    }

    pub fn new(body: impl Into<String>, dynamic: bool) -> Self {
        let body = body.into();
        let mut hasher = Sha256::new();
        hasher.update(body.trim().as_bytes());
        hasher.update(if dynamic { b"|dynamic" } else { b"|static " });
        let digest = ScriptDigest(hex::encode(hasher.finalize()));
        Self {
            body,
            dynamic,
            digest,
        }
    }

    pub fn digest(&self) -> &ScriptDigest {
        &self.digest
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Script source, for diagnostics and for shipping to a node.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Digest of the body alone, ignoring classification.
    pub fn content_digest(&self) -> String {
        content_digest(&self.body)
    }
}

impl fmt::Display for SelectionScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.dynamic { "dynamic" } else { "static" };
        write!(f, "{kind} script {}", self.digest)
    }
}

/// Serialized form of a script (`{ body = "...", dynamic = true }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScriptSpec {
    body: String,
    #[serde(default = "default_dynamic")]
    dynamic: bool,
}

fn default_dynamic() -> bool {
    true
}

impl From<ScriptSpec> for SelectionScript {
    fn from(spec: ScriptSpec) -> Self {
        SelectionScript::new(spec.body, spec.dynamic)
    }
}

impl From<SelectionScript> for ScriptSpec {
    fn from(script: SelectionScript) -> Self {
        ScriptSpec {
            body: script.body,
            dynamic: script.dynamic,
        }
    }
}

/// Outcome of evaluating one script on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum ScriptOutcome {
    /// The script ran and returned true.
    Pass,
    /// The script ran and returned false.
    Fail,
    /// The script could not run to a verdict.
    Error(String),
    /// No verdict arrived before the deadline.
    Timeout,
}

impl ScriptOutcome {
    /// Whether the outcome is a genuine verdict (pass or fail).
    pub fn is_conclusive(&self) -> bool {
        matches!(self, ScriptOutcome::Pass | ScriptOutcome::Fail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_ignores_surrounding_whitespace() {
        let a = SelectionScript::fixed("selected = true");
        let b = SelectionScript::fixed("  selected = true\n");
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn classification_is_part_of_identity() {
        let a = SelectionScript::fixed("selected = true");
        let b = SelectionScript::dynamic("selected = true");
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.content_digest(), b.content_digest());
    }

    #[test]
    fn content_digest_is_sha256_hex() {
        let d = content_digest("abc");
        assert_eq!(
            d,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn display_uses_short_digest() {
        let s = SelectionScript::dynamic("x");
        let shown = s.to_string();
        assert!(shown.starts_with("dynamic script "));
        assert_eq!(shown.len(), "dynamic script ".len() + 12);
    }

    #[test]
    fn parses_from_toml_with_default_dynamic() {
        #[derive(Deserialize)]
        struct Holder {
            scripts: Vec<SelectionScript>,
        }
        let holder: Holder = toml::from_str(
            r#"
scripts = [
    { body = "gpu_count > 0" },
    { body = "arch == 'x86_64'", dynamic = false },
]
"#,
        )
        .unwrap();
        assert!(holder.scripts[0].is_dynamic());
        assert!(!holder.scripts[1].is_dynamic());
        assert_eq!(holder.scripts[1].body(), "arch == 'x86_64'");
    }

    #[test]
    fn only_pass_and_fail_are_conclusive() {
        assert!(ScriptOutcome::Pass.is_conclusive());
        assert!(ScriptOutcome::Fail.is_conclusive());
        assert!(!ScriptOutcome::Timeout.is_conclusive());
        assert!(!ScriptOutcome::Error("boom".into()).is_conclusive());
    }
}
