//! # Request Parameters
//!
//! A [`ParameterBag`] maps lower-cased field paths (`address.city`) to one or more raw
//! string values. Path parameters come first and hold a single value each; declared query
//! parameters append their values after them, in the order they were received.
//!
//! Headers never enter the bag: the declared ones are forwarded as call metadata instead.
use http::HeaderMap;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBag(BTreeMap<String, Vec<String>>);

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges path parameters and (already filtered) query parameters.
    ///
    /// Keys are lower-cased. For a key present in both, the path value occupies slot 0 and
    /// the query values follow it.
    pub fn merge(
        path_params: &HashMap<String, String>,
        query_params: &HashMap<String, Vec<String>>,
    ) -> Self {
        let mut bag = Self::new();

        for (key, value) in path_params {
            bag.0.insert(key.to_lowercase(), vec![value.clone()]);
        }
        for (key, values) in query_params {
            bag.append(key, values.iter().cloned());
        }

        bag
    }

    /// Builds the bag for one request, only considering the query parameters listed in
    /// `query_strings_to_pass`.
    pub fn from_request(
        path_params: &HashMap<String, String>,
        query: &HashMap<String, Vec<String>>,
        query_strings_to_pass: &[String],
    ) -> Self {
        Self::merge(path_params, &extract_query_params(query, query_strings_to_pass))
    }

    /// Appends `values` to the entry for `key` (lower-cased).
    pub fn append(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        self.0
            .entry(key.to_lowercase())
            .or_default()
            .extend(values);
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(&key.to_lowercase()).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterBag
where
    K: AsRef<str>,
    V: IntoIterator<Item = String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut bag = Self::new();
        for (key, values) in iter {
            bag.append(key.as_ref(), values);
        }
        bag
    }
}

/// Keeps the query parameters named in `keys`, with their names lower-cased.
///
/// Names are matched exactly; undeclared parameters are never forwarded.
pub fn extract_query_params(
    query: &HashMap<String, Vec<String>>,
    keys: &[String],
) -> HashMap<String, Vec<String>> {
    keys.iter()
        .filter_map(|key| {
            query
                .get(key)
                .map(|values| (key.to_lowercase(), values.clone()))
        })
        .collect()
}

/// Picks the first value of every header named in `keys`, to be sent as metadata.
///
/// Header names are matched case-insensitively and returned lower-cased. Values that are
/// not visible ASCII cannot travel as text metadata and are skipped.
pub fn extract_headers(headers: &HeaderMap, keys: &[String]) -> Vec<(String, String)> {
    keys.iter()
        .filter_map(|key| {
            let value = headers.get(key.as_str())?;
            match value.to_str() {
                Ok(value) => Some((key.to_lowercase(), value.to_string())),
                Err(_) => {
                    tracing::debug!(header = %key, "skipping non-ASCII header value");
                    None
                }
            }
        })
        .collect()
}
