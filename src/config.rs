use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use crate::error::{Error, Result};
use crate::value::{self, Value};

/// Ordered key/value mapping.
///
/// Carries model configuration, dataset constructor arguments, fit arguments
/// and the persisted attributes of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Config {
	entries: BTreeMap<String, Value>,
}

/// Learned or otherwise persisted model attributes.
pub type Attributes = Config;

impl Config {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a JSON object into a configuration.
	pub fn from_json(text: &str) -> Result<Self> {
		match serde_json::from_str::<serde_json::Value>(text)? {
			serde_json::Value::Object(map) => Ok(map
				.into_iter()
				.map(|(k, v)| (k, Value::from(v)))
				.collect()),
			other => Err(Error::invalid_argument(
				"config",
				format!("expected a JSON object, got {}", Value::from(other).type_name()),
			)),
		}
	}

	pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
		self.entries.insert(key.to_string(), value.into())
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.entries.get(key)
	}

	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.entries.remove(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.entries.iter()
	}

	/// Overwrites same-named entries with `other`'s, adds new ones and keeps
	/// the rest.
	pub fn merge(&mut self, other: Config) {
		self.entries.extend(other.entries);
	}

	pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
		match self.get(key) {
			None => Ok(None),
			Some(Value::Text(s)) => Ok(Some(s.as_str())),
			Some(other) => Err(mismatch(key, "text", other)),
		}
	}

	pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
		match self.get(key) {
			None => Ok(default),
			Some(v) => v.as_f64().ok_or_else(|| mismatch(key, "number", v)),
		}
	}

	pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
		match self.get(key) {
			None => Ok(default),
			Some(v) => v
				.as_i64()
				.and_then(|i| u64::try_from(i).ok())
				.ok_or_else(|| mismatch(key, "non-negative integer", v)),
		}
	}

	pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
		let value = self.get_u64(key, default as u64)?;
		usize::try_from(value).map_err(|_| Error::invalid_argument(key, "value out of range"))
	}

	/// Like [`Config::get_usize`] but the key must be present.
	pub fn require_usize(&self, key: &str) -> Result<usize> {
		if !self.contains(key) {
			return Err(Error::invalid_argument(key, "missing required argument"));
		}
		self.get_usize(key, 0)
	}

	pub fn get_floats(&self, key: &str) -> Result<Option<Vec<f64>>> {
		match self.get(key) {
			None => Ok(None),
			Some(v) => v.as_floats().map(Some).ok_or_else(|| mismatch(key, "list of numbers", v)),
		}
	}

	pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		value::write_map(writer, &self.entries)
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
		Ok(Self { entries: value::read_map(reader)? })
	}
}

fn mismatch(key: &str, expected: &str, got: &Value) -> Error {
	Error::invalid_argument(key, format!("expected {}, got {}", expected, got.type_name()))
}

impl FromIterator<(String, Value)> for Config {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		Self { entries: iter.into_iter().collect() }
	}
}

impl IntoIterator for Config {
	type Item = (String, Value);
	type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_object_becomes_config() -> Result<()> {
		let config = Config::from_json(r#"{"size": 10, "rate": 0.5, "name": "iris", "tags": [1, 2.5]}"#)?;

		assert_eq!(config.get_usize("size", 0)?, 10);
		assert_eq!(config.get_f64("rate", 0.0)?, 0.5);
		assert_eq!(config.get_str("name")?, Some("iris"));
		assert_eq!(config.get_floats("tags")?, Some(vec![1.0, 2.5]));
		Ok(())
	}

	#[test]
	fn json_non_object_is_rejected() {
		assert!(matches!(Config::from_json("[1, 2]"), Err(Error::InvalidArgument { .. })));
		assert!(matches!(Config::from_json("{"), Err(Error::Json(_))));
	}

	#[test]
	fn typed_getters_reject_mismatches() {
		let config = Config::new().with("size", "ten").with("neg", -1i64);

		assert!(config.get_usize("size", 0).is_err());
		assert!(config.get_u64("neg", 0).is_err());
		assert!(config.require_usize("missing").is_err());
		assert_eq!(config.get_usize("missing", 3).unwrap(), 3);
	}

	#[test]
	fn merge_overwrites_adds_and_keeps() {
		let mut config = Config::new().with("a", 1i64).with("b", 2i64);
		config.merge(Config::new().with("b", 20i64).with("c", 30i64));

		assert_eq!(config.get("a"), Some(&Value::from(1i64)));
		assert_eq!(config.get("b"), Some(&Value::from(20i64)));
		assert_eq!(config.get("c"), Some(&Value::from(30i64)));
	}
}
