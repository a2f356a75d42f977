use std::io::{self, Read, Write};
use std::ops::Deref;
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::error::{Error, Result};

/// Data a model is built around.
///
/// A dataset is either constructed from an argument mapping or handed to the
/// model pre-built, and must be able to write itself into a model's state file.
pub trait Dataset: Sized {
	fn from_args(args: &Config) -> Result<Self>;

	fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;
	fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// How a model holds its dataset: exclusively, or shared with the caller.
#[derive(Debug, Clone)]
pub enum DataHandle<D> {
	Owned(D),
	Shared(Arc<D>),
}

impl<D> DataHandle<D> {
	pub fn is_shared(&self) -> bool {
		matches!(self, DataHandle::Shared(_))
	}

	/// True when both handles share the same dataset allocation.
	pub fn ptr_eq(&self, other: &Arc<D>) -> bool {
		match self {
			DataHandle::Shared(arc) => Arc::ptr_eq(arc, other),
			DataHandle::Owned(_) => false,
		}
	}
}

impl<D> Deref for DataHandle<D> {
	type Target = D;

	fn deref(&self) -> &D {
		match self {
			DataHandle::Owned(data) => data,
			DataHandle::Shared(data) => data,
		}
	}
}

impl<D> From<Arc<D>> for DataHandle<D> {
	fn from(data: Arc<D>) -> Self {
		DataHandle::Shared(data)
	}
}

/// Widest table a state file may declare.
const MAX_FEATURES: usize = 1 << 16;

/// Column-major table of features with one target per row.
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
	columns: Vec<Vec<f64>>,
	targets: Vec<f64>,
}

impl Table {
	pub fn features_len(&self) -> usize {
		self.columns.len()
	}

	pub fn rows_len(&self) -> usize {
		self.targets.len()
	}

	pub fn targets(&self) -> &[f64] {
		&self.targets
	}

	pub fn column(&self, column: usize) -> &[f64] {
		&self.columns[column]
	}

	pub fn row(&self, i: usize) -> Vec<f64> {
		self.columns.iter().map(|column| column[i]).collect()
	}

	pub fn rows(&self) -> impl '_ + Iterator<Item = Vec<f64>> {
		(0..self.rows_len()).map(move |i| self.row(i))
	}

	/// Distinct target values in ascending order.
	pub fn classes(&self) -> Vec<f64> {
		let mut classes = self.targets.iter().map(|&y| OrderedFloat(y)).collect::<Vec<_>>();
		classes.sort();
		classes.dedup();
		classes.into_iter().map(OrderedFloat::into_inner).collect()
	}

	pub fn train_test_split<R: Rng + ?Sized>(&self, rng: &mut R, test_rate: f64) -> (Self, Self) {
		let mut index = (0..self.rows_len()).collect::<Vec<_>>();
		index.shuffle(rng);

		let test_num = (self.rows_len() as f64 * test_rate).round() as usize;
		let (test, train) = index.split_at(test_num.min(index.len()));

		(self.select(train), self.select(test))
	}

	fn select(&self, index: &[usize]) -> Self {
		Self {
			columns: self.columns
				.iter()
				.map(|column| index.iter().map(|&i| column[i]).collect())
				.collect(),
			targets: index.iter().map(|&i| self.targets[i]).collect(),
		}
	}
}

impl Dataset for Table {
	/// Builds a deterministic synthetic table.
	///
	/// Arguments: `size` (rows, required), `features` (default 1), `classes`
	/// (default 2) and `seed` (default 0). Each class is centred on its own
	/// index along every feature, so the classes are separable.
	fn from_args(args: &Config) -> Result<Self> {
		let size = args.require_usize("size")?;
		let features = args.get_usize("features", 1)?;
		let classes = args.get_usize("classes", 2)?;
		let seed = args.get_u64("seed", 0)?;

		if features == 0 {
			return Err(Error::invalid_argument("features", "must be at least 1"));
		}
		if classes == 0 {
			return Err(Error::invalid_argument("classes", "must be at least 1"));
		}

		let mut rng = StdRng::seed_from_u64(seed);
		let mut builder = Builder::new();

		for i in 0..size {
			let class = i % classes;
			let row = (0..features)
				.map(|_| class as f64 + rng.gen_range(-0.25, 0.25))
				.collect::<Vec<f64>>();
			builder.add(&row, class as f64);
		}

		builder.build(features)
	}

	fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		writer.write_u32::<BigEndian>(self.features_len() as u32)?;
		writer.write_u32::<BigEndian>(self.rows_len() as u32)?;

		for column in &self.columns {
			for &value in column {
				writer.write_f64::<BigEndian>(value)?;
			}
		}
		for &target in &self.targets {
			writer.write_f64::<BigEndian>(target)?;
		}

		Ok(())
	}

	fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
		let features = reader.read_u32::<BigEndian>()? as usize;
		let rows = reader.read_u32::<BigEndian>()? as usize;

		if features > MAX_FEATURES {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("table header claims {} features, at most {} are supported", features, MAX_FEATURES),
			));
		}
		if features == 0 && rows > 0 {
			return Err(io::Error::new(
				io::ErrorKind::InvalidData,
				format!("table header claims {} rows without features", rows),
			));
		}

		// Columns grow as values arrive, a short file fails with EOF
		// before the header's row count is ever allocated.
		let read_column = |reader: &mut R| -> io::Result<Vec<f64>> {
			let mut column = Vec::new();
			for _ in 0..rows {
				column.push(reader.read_f64::<BigEndian>()?);
			}
			Ok(column)
		};

		let mut columns = Vec::with_capacity(features);
		for _ in 0..features {
			columns.push(read_column(reader)?);
		}
		let targets = read_column(reader)?;

		Ok(Self { columns, targets })
	}
}

#[derive(Debug, Default)]
pub struct Builder {
	columns: Vec<Vec<f64>>,
	targets: Vec<f64>,
	ragged: bool,
}

impl Builder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a labelled row. The first row fixes the width; a row of any
	/// other width makes [`Builder::build`] fail.
	pub fn add(&mut self, x: &[f64], y: f64) {
		if self.targets.is_empty() {
			self.columns = vec![Vec::new(); x.len()];
		}

		if x.len() != self.columns.len() {
			self.ragged = true;
		}

		for (column, value) in self.columns.iter_mut().zip(x) {
			column.push(*value);
		}

		self.targets.push(y);
	}

	/// Adds an unlabelled row.
	pub fn add_x(&mut self, x: &[f64]) {
		self.add(x, 0.0)
	}

	/// Finishes the table, checking that every row had `features` values.
	pub fn build(self, features: usize) -> Result<Table> {
		if self.ragged {
			return Err(Error::Dataset("rows have differing feature counts".to_string()));
		}

		let columns = if self.targets.is_empty() {
			vec![Vec::new(); features]
		} else {
			self.columns
		};

		if columns.len() != features {
			return Err(Error::ShapeMismatch { expected: features, actual: columns.len() });
		}

		Ok(Table { columns, targets: self.targets })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	fn args(size: i64) -> Config {
		Config::new().with("size", size).with("features", 3i64).with("classes", 3i64)
	}

	#[test]
	fn synthetic_table_is_deterministic() -> Result<()> {
		let a = Table::from_args(&args(12))?;
		let b = Table::from_args(&args(12))?;

		assert_eq!(a, b);
		assert_eq!(a.rows_len(), 12);
		assert_eq!(a.features_len(), 3);
		assert_eq!(a.classes(), vec![0.0, 1.0, 2.0]);
		Ok(())
	}

	#[test]
	fn size_is_required() {
		assert!(matches!(Table::from_args(&Config::new()), Err(Error::InvalidArgument { .. })));
	}

	#[test]
	fn table_serialization_works() -> io::Result<()> {
		let table = Table::from_args(&args(7)).unwrap();

		let mut buf = Vec::new();
		table.serialize(&mut buf)?;
		let decoded = Table::deserialize(&mut Cursor::new(buf))?;

		assert_eq!(decoded, table);
		Ok(())
	}

	#[test]
	fn split_partitions_rows() {
		let table = Table::from_args(&args(20)).unwrap();
		let mut rng = StdRng::seed_from_u64(1);

		let (train, test) = table.train_test_split(&mut rng, 0.25);

		assert_eq!(test.rows_len(), 5);
		assert_eq!(train.rows_len(), 15);
		assert_eq!(train.features_len(), 3);
	}

	#[test]
	fn builder_rejects_ragged_rows() {
		let mut builder = Builder::new();
		builder.add(&[1.0, 2.0], 0.0);
		builder.add(&[1.0], 1.0);

		assert!(matches!(builder.build(2), Err(Error::Dataset(_))));
	}

	#[test]
	fn builder_rejects_wider_rows() {
		let mut builder = Builder::new();
		builder.add(&[1.0, 2.0], 0.0);
		builder.add(&[3.0, 4.0, 5.0], 1.0);

		assert!(matches!(builder.build(2), Err(Error::Dataset(_))));
	}

	#[test]
	fn builder_checks_declared_width() -> Result<()> {
		let mut builder = Builder::new();
		builder.add(&[1.0, 2.0], 0.0);
		assert!(matches!(builder.build(3), Err(Error::ShapeMismatch { expected: 3, actual: 2 })));

		let empty = Builder::new().build(3)?;
		assert_eq!(empty.features_len(), 3);
		assert_eq!(empty.rows_len(), 0);
		Ok(())
	}

	fn header(features: u32, rows: u32) -> Vec<u8> {
		let mut buf = features.to_be_bytes().to_vec();
		buf.extend_from_slice(&rows.to_be_bytes());
		buf
	}

	#[test]
	fn implausible_header_is_invalid_data() {
		for buf in vec![header(u32::MAX, 0), header(0, 3), header(MAX_FEATURES as u32 + 1, 1)] {
			let err = Table::deserialize(&mut Cursor::new(buf)).unwrap_err();
			assert_eq!(err.kind(), io::ErrorKind::InvalidData);
		}
	}

	#[test]
	fn oversized_row_count_is_eof() {
		let mut buf = header(2, u32::MAX);
		buf.extend_from_slice(&1.0f64.to_be_bytes());

		let err = Table::deserialize(&mut Cursor::new(buf)).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
	}

	#[test]
	fn shared_handle_is_not_copied() {
		let table = Arc::new(Table::from_args(&args(4)).unwrap());
		let handle = DataHandle::from(table.clone());

		assert!(handle.is_shared());
		assert!(handle.ptr_eq(&table));
		assert_eq!(handle.rows_len(), 4);
	}
}
