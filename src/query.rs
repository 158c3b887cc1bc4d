use anyhow::{Context, Result, bail};
use reqwest::Url;

/// Ordered set of query parameters sent with every endpoint request.
///
/// Keys keep their insertion order. Setting an existing key replaces its value
/// in place, so overrides never reorder the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// An empty parameter set, typically used as an override list.
    pub fn new() -> Self {
        Self::default()
    }

    /// The parameters researchmap is queried with unless overridden:
    /// `format=json&limit=1000&start=1&sort=newest&from_date=2000`.
    pub fn defaults() -> Self {
        let mut params = Self::new();
        params.set("format", "json");
        params.set("limit", "1000");
        params.set("start", "1");
        params.set("sort", "newest");
        params.set("from_date", "2000");
        params
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        let key = key.into();
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((key, value)),
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns `self` with every pair of `overrides` applied on top.
    pub fn merged(&self, overrides: &QueryParams) -> QueryParams {
        let mut out = self.clone();
        for (k, v) in overrides.iter() {
            out.set(k, v);
        }
        out
    }

    /// Parses a `key=value` pair as given on the command line.
    pub fn parse_pair(raw: &str) -> Result<(String, String)> {
        let Some((k, v)) = raw.split_once('=') else {
            bail!("invalid query parameter `{}` (expected key=value)", raw);
        };
        let k = k.trim();
        if k.is_empty() {
            bail!("invalid query parameter `{}` (empty key)", raw);
        }
        Ok((k.to_string(), v.trim().to_string()))
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Joins `<base>/<permalink>/<endpoint>` and appends the form-encoded query.
pub(crate) fn build_url(
    base: &str,
    permalink: &str,
    endpoint: &str,
    params: &QueryParams,
) -> Result<Url> {
    let raw = format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        permalink.trim_matches('/'),
        endpoint
    );
    Url::parse_with_params(&raw, params.iter()).with_context(|| format!("invalid API url {}", raw))
}
