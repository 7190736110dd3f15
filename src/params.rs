//! `key=value` parameter sets for index construction and reconfiguration.
//!
//! Parsing only checks token shape; values stay untyped until a consumer
//! asks for them, so a bad value for a key the method never reads is not an
//! error. Keys nobody claimed are surfaced through
//! [`ParamReader::check_unclaimed`] rather than silently ignored.

use crate::error::{ProximaError, Result};

/// An ordered mapping from string keys to raw string values, parsed from
/// `key=value` tokens.
#[derive(Debug, Clone, Default)]
pub struct AnyParams {
    entries: Vec<(String, String)>,
}

impl AnyParams {
    /// An empty parameter set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a list of `key=value` tokens.
    ///
    /// Fails with `MalformedParam` on a token without `=`, an empty key, or
    /// a duplicated key.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let mut entries: Vec<(String, String)> = Vec::with_capacity(tokens.len());

        for token in tokens {
            let token = token.as_ref();
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| ProximaError::MalformedParam(format!("'{token}' has no '='")))?;
            if key.is_empty() {
                return Err(ProximaError::MalformedParam(format!(
                    "'{token}' has an empty key"
                )));
            }
            if entries.iter().any(|(k, _)| k == key) {
                return Err(ProximaError::MalformedParam(format!(
                    "duplicate key '{key}'"
                )));
            }
            entries.push((key.to_string(), value.to_string()));
        }

        Ok(Self { entries })
    }

    /// Whether the set contains `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Typed, tracked access to an [`AnyParams`].
///
/// Each `get_*`/`require_*` call claims its key; after a consumer has read
/// everything it understands, [`check_unclaimed`](Self::check_unclaimed)
/// reports any leftover key as `UnsupportedParam`.
pub struct ParamReader<'a> {
    params: &'a AnyParams,
    claimed: Vec<bool>,
}

impl<'a> ParamReader<'a> {
    /// Start reading from a parameter set.
    pub fn new(params: &'a AnyParams) -> Self {
        Self {
            claimed: vec![false; params.entries.len()],
            params,
        }
    }

    fn claim(&mut self, key: &str) -> Option<&'a str> {
        for (i, (k, v)) in self.params.entries.iter().enumerate() {
            if k == key {
                self.claimed[i] = true;
                return Some(v);
            }
        }
        None
    }

    /// Read a string value, or `default` when absent.
    pub fn get_string(&mut self, key: &str, default: &str) -> String {
        self.claim(key).unwrap_or(default).to_string()
    }

    /// Read a `usize` value, or `default` when absent.
    pub fn get_usize(&mut self, key: &str, default: usize) -> Result<usize> {
        match self.claim(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ProximaError::TypeMismatch {
                key: key.to_string(),
                expected: "integer",
                value: raw.to_string(),
            }),
        }
    }

    /// Read a `u64` value, or `default` when absent.
    pub fn get_u64(&mut self, key: &str, default: u64) -> Result<u64> {
        match self.claim(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ProximaError::TypeMismatch {
                key: key.to_string(),
                expected: "integer",
                value: raw.to_string(),
            }),
        }
    }

    /// Read an `f32` value, or `default` when absent.
    pub fn get_f32(&mut self, key: &str, default: f32) -> Result<f32> {
        match self.claim(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ProximaError::TypeMismatch {
                key: key.to_string(),
                expected: "float",
                value: raw.to_string(),
            }),
        }
    }

    /// Read a required `usize` value, failing with `MissingParam` when absent.
    pub fn require_usize(&mut self, key: &str) -> Result<usize> {
        match self.claim(key) {
            None => Err(ProximaError::MissingParam(key.to_string())),
            Some(raw) => raw.parse().map_err(|_| ProximaError::TypeMismatch {
                key: key.to_string(),
                expected: "integer",
                value: raw.to_string(),
            }),
        }
    }

    /// Read a required `f32` value, failing with `MissingParam` when absent.
    pub fn require_f32(&mut self, key: &str) -> Result<f32> {
        match self.claim(key) {
            None => Err(ProximaError::MissingParam(key.to_string())),
            Some(raw) => raw.parse().map_err(|_| ProximaError::TypeMismatch {
                key: key.to_string(),
                expected: "float",
                value: raw.to_string(),
            }),
        }
    }

    /// Fail with `UnsupportedParam` if any key was never claimed.
    pub fn check_unclaimed(&self, method: &str) -> Result<()> {
        for (i, (key, _)) in self.params.entries.iter().enumerate() {
            if !self.claimed[i] {
                return Err(ProximaError::unsupported_param(method, key));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_get() {
        let params = AnyParams::parse(&["NN=11", "dbScanFrac=0.2", "name=vptree"]).unwrap();
        assert_eq!(params.len(), 3);
        assert!(params.contains("NN"));

        let mut reader = ParamReader::new(&params);
        assert_eq!(reader.get_usize("NN", 0).unwrap(), 11);
        assert!((reader.get_f32("dbScanFrac", 0.0).unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(reader.get_string("name", ""), "vptree");
        assert!(reader.check_unclaimed("test").is_ok());
    }

    #[test]
    fn test_defaults_when_absent() {
        let params = AnyParams::empty();
        let mut reader = ParamReader::new(&params);
        assert_eq!(reader.get_usize("bucketSize", 16).unwrap(), 16);
        assert_eq!(reader.get_f32("alphaLeft", 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            AnyParams::parse(&["noequals"]).unwrap_err(),
            ProximaError::MalformedParam(_)
        ));
        assert!(matches!(
            AnyParams::parse(&["=5"]).unwrap_err(),
            ProximaError::MalformedParam(_)
        ));
        assert!(matches!(
            AnyParams::parse(&["a=1", "a=2"]).unwrap_err(),
            ProximaError::MalformedParam(_)
        ));
        // empty value is fine, typing happens at consumption
        assert!(AnyParams::parse(&["a="]).is_ok());
    }

    #[test]
    fn test_type_mismatch_at_consumption() {
        let params = AnyParams::parse(&["NN=eleven"]).unwrap();
        let mut reader = ParamReader::new(&params);
        let err = reader.get_usize("NN", 0).unwrap_err();
        assert!(matches!(err, ProximaError::TypeMismatch { .. }));
    }

    #[test]
    fn test_missing_required() {
        let params = AnyParams::empty();
        let mut reader = ParamReader::new(&params);
        assert!(matches!(
            reader.require_usize("numPivot").unwrap_err(),
            ProximaError::MissingParam(_)
        ));
        assert!(matches!(
            reader.require_f32("radius").unwrap_err(),
            ProximaError::MissingParam(_)
        ));
    }

    #[test]
    fn test_unclaimed_key_rejected() {
        let params = AnyParams::parse(&["NN=11", "typo=3"]).unwrap();
        let mut reader = ParamReader::new(&params);
        reader.get_usize("NN", 0).unwrap();
        let err = reader.check_unclaimed("small_world_rand").unwrap_err();
        match err {
            ProximaError::UnsupportedParam { method, key } => {
                assert_eq!(method, "small_world_rand");
                assert_eq!(key, "typo");
            }
            other => panic!("expected UnsupportedParam, got {other}"),
        }
    }
}
