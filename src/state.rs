use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Attributes, Config};
use crate::dataset::{DataHandle, Dataset};
use crate::error::{Error, Result};
use crate::persist::{self, Record};

/// Configuration key that redirects construction to loading a state file.
pub const LOAD_KEY: &str = "from_file";

/// Everything a model instance holds apart from implementor-specific fields.
#[derive(Debug, Clone)]
pub struct ModelState<D> {
	data: Option<DataHandle<D>>,
	config: Config,
	attributes: Attributes,
	was_loaded_from_file: bool,
}

enum Source<'a, D> {
	Args(&'a Config),
	Shared(Arc<D>),
}

impl<D: Dataset> ModelState<D> {
	/// Builds the dataset from `dataset_args` unless `config` holds [`LOAD_KEY`].
	pub fn from_args(dataset_args: &Config, config: Config) -> Result<Self> {
		Self::create(Source::Args(dataset_args), config)
	}

	/// Stores `dataset` without copying unless `config` holds [`LOAD_KEY`].
	pub fn with_dataset(dataset: Arc<D>, config: Config) -> Result<Self> {
		Self::create(Source::Shared(dataset), config)
	}

	/// Loads a state file. The path must be valid UTF-8 since it is kept
	/// under [`LOAD_KEY`] as text.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = path.to_str().ok_or_else(|| Error::InvalidPath { path: path.to_path_buf() })?;
		let config = Config::new().with(LOAD_KEY, text);
		Self::create(Source::Args(&Config::new()), config)
	}

	fn create(source: Source<'_, D>, config: Config) -> Result<Self> {
		if let Some(path) = config.get(LOAD_KEY) {
			let path = path.as_str().ok_or_else(|| Error::invalid_argument(
				LOAD_KEY,
				format!("expected a path, got {}", path.type_name()),
			))?;

			let mut state = Self::empty();
			state.load(path, None)?;
			state.was_loaded_from_file = true;
			return Ok(state);
		}

		let data = match source {
			Source::Args(args) => DataHandle::Owned(D::from_args(args)?),
			Source::Shared(data) => DataHandle::Shared(data),
		};

		Ok(Self {
			data: Some(data),
			config,
			attributes: Attributes::new(),
			was_loaded_from_file: false,
		})
	}

	fn empty() -> Self {
		Self {
			data: None,
			config: Config::new(),
			attributes: Attributes::new(),
			was_loaded_from_file: false,
		}
	}

	/// Writes the state to `path` and returns the resolved file path.
	///
	/// The dataset is written only when `include_dataset` is set.
	pub fn save(&self, path: impl AsRef<Path>, include_dataset: bool) -> Result<PathBuf> {
		let path = persist::resolve_path(path)?;

		let data = match (&self.data, include_dataset) {
			(Some(data), true) => Some(&**data),
			(None, true) => {
				warn!(path = %path.display(), "no dataset to include in saved state");
				None
			},
			(_, false) => None,
		};

		persist::write_atomic(&path, |writer| {
			Record::serialize(writer, self.was_loaded_from_file, &self.config, &self.attributes, data)
		})?;

		info!(
			path = %path.display(),
			attributes = self.attributes.len(),
			with_dataset = data.is_some(),
			"saved model state"
		);
		Ok(path)
	}

	/// Merges the state stored at `path` into this one.
	///
	/// Nothing changes unless the whole file decodes. `replacement`, when
	/// given, becomes the dataset regardless of what the file held.
	pub fn load(&mut self, path: impl AsRef<Path>, replacement: Option<DataHandle<D>>) -> Result<()> {
		let path = persist::resolve_path(path)?;
		let record = Record::<D>::read(&path)?;

		self.was_loaded_from_file = record.was_loaded_from_file;
		self.config = record.config;
		self.attributes.merge(record.attributes);
		if let Some(data) = record.data {
			self.data = Some(DataHandle::Owned(data));
		}
		if let Some(data) = replacement {
			self.data = Some(data);
		}

		info!(path = %path.display(), attributes = self.attributes.len(), "loaded model state");
		Ok(())
	}
}

impl<D> ModelState<D> {
	pub fn data(&self) -> Option<&DataHandle<D>> {
		self.data.as_ref()
	}

	pub fn set_data(&mut self, data: DataHandle<D>) {
		self.data = Some(data);
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn attributes(&self) -> &Attributes {
		&self.attributes
	}

	pub fn attributes_mut(&mut self) -> &mut Attributes {
		&mut self.attributes
	}

	pub fn was_loaded_from_file(&self) -> bool {
		self.was_loaded_from_file
	}
}
