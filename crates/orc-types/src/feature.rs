//! The feature vector the routing policy keys its aggregates on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoBucket {
    S,
    M,
    L,
}

impl RepoBucket {
    /// Bucketed by include-glob count: `s` <= 3, `m` <= 15, else `l`.
    pub fn from_include_count(n: usize) -> Self {
        if n <= 3 {
            Self::S
        } else if n <= 15 {
            Self::M
        } else {
            Self::L
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "s",
            Self::M => "m",
            Self::L => "l",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtxBucket {
    #[serde(rename = "4k")]
    Ctx4k,
    #[serde(rename = "8k")]
    Ctx8k,
    #[serde(rename = "16k+")]
    Ctx16kPlus,
}

impl CtxBucket {
    pub fn from_max_tokens(max_tokens: Option<u32>) -> Self {
        match max_tokens {
            Some(t) if t <= 4096 => Self::Ctx4k,
            Some(t) if t <= 8192 => Self::Ctx8k,
            _ => Self::Ctx16kPlus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ctx4k => "4k",
            Self::Ctx8k => "8k",
            Self::Ctx16kPlus => "16k+",
        }
    }
}

/// Derived, not persisted directly — only its stable hash is stored
/// alongside bandit aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub language: String,
    pub repo_bucket: RepoBucket,
    pub tests_present: bool,
    pub ctx_bucket: CtxBucket,
}

impl FeatureVector {
    /// Canonical string form hashed to produce the feature key. Order
    /// and separator are load-bearing: any change invalidates existing
    /// bandit aggregates keyed on the old hash.
    pub fn canonical_string(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.language,
            self.repo_bucket.as_str(),
            self.tests_present as u8,
            self.ctx_bucket.as_str()
        )
    }

    /// Stable digest of [`Self::canonical_string`], hex-encoded.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_bucket_thresholds() {
        assert_eq!(RepoBucket::from_include_count(0), RepoBucket::S);
        assert_eq!(RepoBucket::from_include_count(3), RepoBucket::S);
        assert_eq!(RepoBucket::from_include_count(4), RepoBucket::M);
        assert_eq!(RepoBucket::from_include_count(15), RepoBucket::M);
        assert_eq!(RepoBucket::from_include_count(16), RepoBucket::L);
    }

    #[test]
    fn ctx_bucket_thresholds() {
        assert_eq!(CtxBucket::from_max_tokens(None), CtxBucket::Ctx16kPlus);
        assert_eq!(CtxBucket::from_max_tokens(Some(2000)), CtxBucket::Ctx4k);
        assert_eq!(CtxBucket::from_max_tokens(Some(8192)), CtxBucket::Ctx8k);
        assert_eq!(CtxBucket::from_max_tokens(Some(32000)), CtxBucket::Ctx16kPlus);
    }

    #[test]
    fn hash_is_stable_and_order_sensitive() {
        let fv = FeatureVector {
            language: "java".into(),
            repo_bucket: RepoBucket::S,
            tests_present: true,
            ctx_bucket: CtxBucket::Ctx8k,
        };
        assert_eq!(fv.canonical_string(), "java|s|1|8k");
        assert_eq!(fv.hash(), fv.hash());
    }
}
