use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use ordered_float::OrderedFloat;

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
enum Tag {
	Null = 0,
	Bool = 1,
	Int = 2,
	Float = 3,
	Text = 4,
	List = 5,
	Map = 6,
}

/// Deepest nesting of lists and maps a decoder accepts.
const MAX_DEPTH: usize = 128;

/// A configuration or attribute value.
///
/// Floats are totally ordered so that values (and whole configurations) can be
/// compared and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(OrderedFloat<f64>),
	Text(String),
	List(Vec<Value>),
	Map(BTreeMap<String, Value>),
}

impl Value {
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Float(x) => Some(x.into_inner()),
			Value::Int(x) => Some(*x as f64),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(x) => Some(*x),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(x) => Some(*x),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Text(x) => Some(x.as_str()),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(x) => Some(x.as_slice()),
			_ => None,
		}
	}

	/// Numeric list as floats, `None` if any element is not a number.
	pub fn as_floats(&self) -> Option<Vec<f64>> {
		self.as_list()?.iter().map(Value::as_f64).collect()
	}

	pub fn floats(values: &[f64]) -> Self {
		Value::List(values.iter().map(|&x| Value::from(x)).collect())
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Null => "null",
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Float(_) => "float",
			Value::Text(_) => "text",
			Value::List(_) => "list",
			Value::Map(_) => "map",
		}
	}

	pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		match self {
			Value::Null => write_tag(writer, Tag::Null)?,
			Value::Bool(x) => {
				write_tag(writer, Tag::Bool)?;
				writer.write_u8(*x as u8)?;
			},
			Value::Int(x) => {
				write_tag(writer, Tag::Int)?;
				writer.write_i64::<BigEndian>(*x)?;
			},
			Value::Float(x) => {
				write_tag(writer, Tag::Float)?;
				writer.write_f64::<BigEndian>(x.into_inner())?;
			},
			Value::Text(x) => {
				write_tag(writer, Tag::Text)?;
				write_str(writer, x)?;
			},
			Value::List(items) => {
				write_tag(writer, Tag::List)?;
				write_len(writer, items.len())?;
				for item in items {
					item.serialize(writer)?;
				}
			},
			Value::Map(map) => {
				write_tag(writer, Tag::Map)?;
				write_map(writer, map)?;
			},
		}

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
		Self::deserialize_at(reader, 0)
	}

	fn deserialize_at<R: Read>(reader: &mut R, depth: usize) -> io::Result<Self> {
		if depth > MAX_DEPTH {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("values nested deeper than {}", MAX_DEPTH),
			));
		}

		let raw = reader.read_u16::<BigEndian>()?;
		let tag = Tag::from_u16(raw).ok_or_else(|| io::Error::new(
			io::ErrorKind::InvalidData,
			format!("unknown value tag {:?}", raw),
		))?;

		Ok(match tag {
			Tag::Null => Value::Null,
			Tag::Bool => Value::Bool(reader.read_u8()? != 0),
			Tag::Int => Value::Int(reader.read_i64::<BigEndian>()?),
			Tag::Float => Value::Float(OrderedFloat(reader.read_f64::<BigEndian>()?)),
			Tag::Text => Value::Text(read_str(reader)?),
			Tag::List => {
				// Grown item by item, the length prefix is untrusted.
				let len = read_len(reader)?;
				let mut items = Vec::new();
				for _ in 0..len {
					items.push(Value::deserialize_at(reader, depth + 1)?);
				}
				Value::List(items)
			},
			Tag::Map => Value::Map(read_map_at(reader, depth + 1)?),
		})
	}
}

fn write_tag<W: Write>(writer: &mut W, tag: Tag) -> io::Result<()> {
	// Tag discriminants always fit in a u16.
	writer.write_u16::<BigEndian>(tag.to_u16().unwrap_or_default())
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> io::Result<()> {
	let len = u32::try_from(len).map_err(|_| io::Error::new(
		io::ErrorKind::InvalidInput,
		format!("collection of {} items is too large to serialize", len),
	))?;
	writer.write_u32::<BigEndian>(len)
}

fn read_len<R: Read>(reader: &mut R) -> io::Result<usize> {
	Ok(reader.read_u32::<BigEndian>()? as usize)
}

pub(crate) fn write_str<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
	write_len(writer, value.len())?;
	writer.write_all(value.as_bytes())
}

pub(crate) fn read_str<R: Read>(reader: &mut R) -> io::Result<String> {
	let len = read_len(reader)?;
	let mut buf = Vec::new();
	Read::take(&mut *reader, len as u64).read_to_end(&mut buf)?;

	if buf.len() != len {
		return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated string"));
	}

	String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub(crate) fn write_map<W: Write>(writer: &mut W, map: &BTreeMap<String, Value>) -> io::Result<()> {
	write_len(writer, map.len())?;
	for (key, value) in map {
		write_str(writer, key)?;
		value.serialize(writer)?;
	}

	Ok(())
}

pub(crate) fn read_map<R: Read>(reader: &mut R) -> io::Result<BTreeMap<String, Value>> {
	read_map_at(reader, 0)
}

fn read_map_at<R: Read>(reader: &mut R, depth: usize) -> io::Result<BTreeMap<String, Value>> {
	let len = read_len(reader)?;
	let mut map = BTreeMap::new();

	for _ in 0..len {
		let key = read_str(reader)?;
		let value = Value::deserialize_at(reader, depth)?;
		map.insert(key, value);
	}

	Ok(map)
}

impl From<bool> for Value {
	fn from(x: bool) -> Self {
		Value::Bool(x)
	}
}

impl From<i64> for Value {
	fn from(x: i64) -> Self {
		Value::Int(x)
	}
}

impl From<i32> for Value {
	fn from(x: i32) -> Self {
		Value::Int(x as i64)
	}
}

impl From<usize> for Value {
	fn from(x: usize) -> Self {
		Value::Int(x as i64)
	}
}

impl From<f64> for Value {
	fn from(x: f64) -> Self {
		Value::Float(OrderedFloat(x))
	}
}

impl From<&str> for Value {
	fn from(x: &str) -> Self {
		Value::Text(x.to_string())
	}
}

impl From<String> for Value {
	fn from(x: String) -> Self {
		Value::Text(x)
	}
}

impl From<Vec<Value>> for Value {
	fn from(x: Vec<Value>) -> Self {
		Value::List(x)
	}
}

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		use serde_json::Value as Json;

		match json {
			Json::Null => Value::Null,
			Json::Bool(x) => Value::Bool(x),
			Json::Number(n) => match n.as_i64() {
				Some(i) => Value::Int(i),
				None => Value::from(n.as_f64().unwrap_or(f64::NAN)),
			},
			Json::String(s) => Value::Text(s),
			Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
			Json::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	#[test]
	fn nested_value_survives_codec() -> io::Result<()> {
		let mut inner = BTreeMap::new();
		inner.insert("lr".to_string(), Value::from(0.01));
		inner.insert("name".to_string(), Value::from("adam"));

		let value = Value::List(vec![
			Value::Null,
			Value::from(true),
			Value::from(-7i64),
			Value::Map(inner),
			Value::floats(&[1.5, -2.0]),
		]);

		let mut buf = Vec::new();
		value.serialize(&mut buf)?;
		let decoded = Value::deserialize(&mut Cursor::new(buf))?;

		assert_eq!(decoded, value);
		Ok(())
	}

	#[test]
	fn unknown_tag_is_invalid_data() {
		let err = Value::deserialize(&mut Cursor::new(vec![0u8, 42])).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}

	fn nested_lists(depth: usize) -> Vec<u8> {
		let mut buf = Vec::new();
		for _ in 0..depth {
			buf.extend_from_slice(&5u16.to_be_bytes());
			buf.extend_from_slice(&1u32.to_be_bytes());
		}
		buf.extend_from_slice(&0u16.to_be_bytes());
		buf
	}

	#[test]
	fn deep_nesting_is_invalid_data() {
		let err = Value::deserialize(&mut Cursor::new(nested_lists(200_000))).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}

	#[test]
	fn nesting_within_limit_decodes() -> io::Result<()> {
		let value = Value::deserialize(&mut Cursor::new(nested_lists(MAX_DEPTH)))?;

		let mut depth = 0;
		let mut current = &value;
		while let Value::List(items) = current {
			current = &items[0];
			depth += 1;
		}
		assert_eq!(depth, MAX_DEPTH);
		assert_eq!(current, &Value::Null);
		Ok(())
	}

	#[test]
	fn truncated_text_is_eof() {
		let mut buf = Vec::new();
		Value::from("hello").serialize(&mut buf).unwrap();
		buf.truncate(buf.len() - 2);

		let err = Value::deserialize(&mut Cursor::new(buf)).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
	}

	#[test]
	fn numeric_accessors() {
		assert_eq!(Value::from(3i64).as_f64(), Some(3.0));
		assert_eq!(Value::from(3.5).as_i64(), None);
		assert_eq!(Value::floats(&[1.0, 2.0]).as_floats(), Some(vec![1.0, 2.0]));
		assert_eq!(Value::List(vec![Value::from("x")]).as_floats(), None);
	}
}
