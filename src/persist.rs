//! Model state files.
//!
//! A state file is a big-endian record:
//!
//! ```text
//! magic   "MDLS"
//! version u16
//! loaded  u8
//! config  map
//! attrs   map
//! data    u8 presence flag, followed by the dataset when set
//! ```

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::{Attributes, Config};
use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// File extension of state files. Bare stems get it appended.
pub const EXTENSION: &str = "model";

const MAGIC: &[u8; 4] = b"MDLS";
const VERSION: u16 = 1;

/// Resolves a save/load path.
///
/// A path whose file name ends in `.model` is used as-is, a bare stem gets the
/// extension appended, and any other dotted file name is rejected.
pub fn resolve_path(path: impl AsRef<Path>) -> Result<PathBuf> {
	let path = path.as_ref();
	let name = match path.file_name() {
		Some(name) => name.to_string_lossy(),
		None => return Err(Error::InvalidPath { path: path.to_path_buf() }),
	};

	let resolved = if name.ends_with(&format!(".{}", EXTENSION)) {
		path.to_path_buf()
	} else if name.contains('.') {
		return Err(Error::InvalidPath { path: path.to_path_buf() });
	} else {
		let mut with_ext = OsString::from(path.as_os_str());
		with_ext.push(".");
		with_ext.push(EXTENSION);
		PathBuf::from(with_ext)
	};

	debug!(requested = %path.display(), resolved = %resolved.display(), "resolved state path");
	Ok(resolved)
}

/// Everything a state file holds, decoded.
#[derive(Debug)]
pub struct Record<D> {
	pub was_loaded_from_file: bool,
	pub config: Config,
	pub attributes: Attributes,
	pub data: Option<D>,
}

impl<D: Dataset> Record<D> {
	pub fn serialize<W: Write>(writer: &mut W, loaded: bool, config: &Config, attributes: &Attributes, data: Option<&D>) -> std::io::Result<()> {
		writer.write_all(MAGIC)?;
		writer.write_u16::<BigEndian>(VERSION)?;
		writer.write_u8(loaded as u8)?;
		config.serialize(writer)?;
		attributes.serialize(writer)?;

		match data {
			Some(data) => {
				writer.write_u8(1)?;
				data.serialize(writer)?;
			},
			None => writer.write_u8(0)?,
		}

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
		let mut magic = [0u8; 4];
		reader.read_exact(&mut magic)?;
		if &magic != MAGIC {
			return Err(Error::Format(format!("not a model state file (magic {:?})", magic)));
		}

		let version = reader.read_u16::<BigEndian>()?;
		if version != VERSION {
			return Err(Error::Format(format!("unsupported state version {}", version)));
		}

		let was_loaded_from_file = reader.read_u8()? != 0;
		let config = Config::deserialize(reader)?;
		let attributes = Attributes::deserialize(reader)?;
		let data = match reader.read_u8()? {
			0 => None,
			1 => Some(D::deserialize(reader)?),
			i => return Err(Error::Format(format!("unknown dataset flag {:?}", i))),
		};

		let mut rest = [0u8; 1];
		if reader.read(&mut rest)? != 0 {
			return Err(Error::Format("trailing bytes after dataset section".to_string()));
		}

		Ok(Self { was_loaded_from_file, config, attributes, data })
	}

	/// Reads and fully decodes the state file at an already resolved path.
	pub fn read(path: &Path) -> Result<Self> {
		let mut reader = BufReader::new(File::open(path)?);
		Self::deserialize(&mut reader)
	}
}

/// Writes `write` into a temporary file next to `path`, then moves it into
/// place. `path` is never left truncated.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
	F: FnOnce(&mut BufWriter<&mut File>) -> std::io::Result<()>,
{
	let dir = match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() => dir,
		_ => Path::new("."),
	};

	let mut tmp = NamedTempFile::new_in(dir)?;
	{
		let mut writer = BufWriter::new(tmp.as_file_mut());
		write(&mut writer)?;
		writer.flush()?;
	}
	tmp.as_file().sync_all()?;
	tmp.persist(path).map_err(|e| Error::Io(e.error))?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dataset::Table;
	use proptest::prelude::*;
	use std::io::Cursor;

	#[test]
	fn stem_gets_extension() -> Result<()> {
		assert_eq!(resolve_path("runs/m")?, PathBuf::from("runs/m.model"));
		assert_eq!(resolve_path("m.model")?, PathBuf::from("m.model"));
		assert_eq!(resolve_path("some.dir/m")?, PathBuf::from("some.dir/m.model"));
		Ok(())
	}

	#[test]
	fn foreign_extension_is_rejected() {
		for path in &["m.pkl", "m.model.bak", "archive.tar.gz", "m."] {
			assert!(matches!(resolve_path(path), Err(Error::InvalidPath { .. })), "{}", path);
		}
	}

	#[test]
	fn pathless_input_is_rejected() {
		assert!(matches!(resolve_path(""), Err(Error::InvalidPath { .. })));
		assert!(matches!(resolve_path("/"), Err(Error::InvalidPath { .. })));
		assert!(matches!(resolve_path(".."), Err(Error::InvalidPath { .. })));
	}

	#[test]
	fn bad_magic_is_format_error() {
		let result = Record::<Table>::deserialize(&mut Cursor::new(b"PKL\x00\x00\x01".to_vec()));
		assert!(matches!(result, Err(Error::Format(_))));
	}

	#[test]
	fn future_version_is_format_error() {
		let mut buf = MAGIC.to_vec();
		buf.extend_from_slice(&(VERSION + 1).to_be_bytes());

		let result = Record::<Table>::deserialize(&mut Cursor::new(buf));
		assert!(matches!(result, Err(Error::Format(_))));
	}

	#[test]
	fn trailing_bytes_are_format_error() -> Result<()> {
		let config = Config::new().with("k", 1i64);
		let mut buf = Vec::new();
		Record::<Table>::serialize(&mut buf, false, &config, &Attributes::new(), None)?;

		let record = Record::<Table>::deserialize(&mut Cursor::new(buf.clone()))?;
		assert_eq!(record.config, config);

		buf.push(0);
		let result = Record::<Table>::deserialize(&mut Cursor::new(buf));
		assert!(matches!(result, Err(Error::Format(_))));
		Ok(())
	}

	#[test]
	fn atomic_write_replaces_whole_file() -> Result<()> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("m.model");

		write_atomic(&path, |w| w.write_all(b"first version"))?;
		write_atomic(&path, |w| w.write_all(b"second"))?;
		assert_eq!(std::fs::read(&path)?, b"second");

		let failed = write_atomic(&path, |w| {
			w.write_all(b"partial")?;
			Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
		});
		assert!(failed.is_err());
		assert_eq!(std::fs::read(&path)?, b"second");
		Ok(())
	}

	proptest! {
		#[test]
		fn bare_stems_append_extension(stem in "[a-zA-Z0-9_-]{1,16}") {
			let resolved = resolve_path(&stem).unwrap();
			prop_assert_eq!(resolved, PathBuf::from(format!("{}.{}", stem, EXTENSION)));
		}

		#[test]
		fn other_extensions_fail(stem in "[a-z]{1,8}", ext in "[a-z]{1,4}") {
			prop_assume!(ext != EXTENSION);
			let path = format!("dir/{}.{}", stem, ext);
			let rejected = matches!(resolve_path(&path), Err(Error::InvalidPath { .. }));
			prop_assert!(rejected);
		}
	}
}
