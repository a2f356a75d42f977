use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::dataset::{DataHandle, Dataset};
use crate::error::Result;
use crate::state::ModelState;

/// Construction, persistence and fitting shared by every model.
///
/// Implementors keep their [`ModelState`] and store whatever they learn in its
/// attributes so that it survives [`BaseModel::save`].
///
/// `fit` has no default body, a model that leaves it out does not build:
///
/// ```compile_fail
/// use model_state::{BaseModel, ModelState, Result, Table};
///
/// struct Unfittable {
/// 	state: ModelState<Table>,
/// }
///
/// impl BaseModel for Unfittable {
/// 	type Data = Table;
///
/// 	fn from_state(state: ModelState<Table>) -> Result<Self> {
/// 		Ok(Self { state })
/// 	}
///
/// 	fn state(&self) -> &ModelState<Table> {
/// 		&self.state
/// 	}
///
/// 	fn state_mut(&mut self) -> &mut ModelState<Table> {
/// 		&mut self.state
/// 	}
/// }
/// ```
pub trait BaseModel: Sized {
	type Data: Dataset;

	fn from_state(state: ModelState<Self::Data>) -> Result<Self>;
	fn state(&self) -> &ModelState<Self::Data>;
	fn state_mut(&mut self) -> &mut ModelState<Self::Data>;

	fn fit(&mut self, dataset: &Self::Data, args: &Config) -> Result<()>;

	/// Builds a model whose dataset is constructed from `dataset_args`.
	///
	/// If `config` holds [`LOAD_KEY`](crate::state::LOAD_KEY) the dataset
	/// arguments are ignored and the model is loaded from that path instead.
	fn new(dataset_args: &Config, config: Config) -> Result<Self> {
		Self::from_state(ModelState::from_args(dataset_args, config)?)
	}

	/// Builds a model around an existing, shared dataset.
	fn with_dataset(dataset: Arc<Self::Data>, config: Config) -> Result<Self> {
		Self::from_state(ModelState::with_dataset(dataset, config)?)
	}

	fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		Self::from_state(ModelState::from_file(path)?)
	}

	fn save(&self, path: impl AsRef<Path>, include_dataset: bool) -> Result<PathBuf> {
		self.state().save(path, include_dataset)
	}

	fn load(&mut self, path: impl AsRef<Path>, replacement: Option<DataHandle<Self::Data>>) -> Result<()> {
		self.state_mut().load(path, replacement)
	}

	fn data(&self) -> Option<&DataHandle<Self::Data>> {
		self.state().data()
	}

	fn config(&self) -> &Config {
		self.state().config()
	}

	fn was_loaded_from_file(&self) -> bool {
		self.state().was_loaded_from_file()
	}
}

/// A model that turns raw input into features for a predictor.
///
/// ```compile_fail
/// use model_state::{BaseModel, Config, FeatureModel, ModelState, Result, Table};
///
/// struct NoFeatures {
/// 	state: ModelState<Table>,
/// }
///
/// impl BaseModel for NoFeatures {
/// 	type Data = Table;
///
/// 	fn from_state(state: ModelState<Table>) -> Result<Self> {
/// 		Ok(Self { state })
/// 	}
///
/// 	fn state(&self) -> &ModelState<Table> {
/// 		&self.state
/// 	}
///
/// 	fn state_mut(&mut self) -> &mut ModelState<Table> {
/// 		&mut self.state
/// 	}
///
/// 	fn fit(&mut self, _dataset: &Table, _args: &Config) -> Result<()> {
/// 		Ok(())
/// 	}
/// }
///
/// impl FeatureModel for NoFeatures {
/// 	type Input = Table;
/// 	type Features = Vec<Vec<f64>>;
/// }
/// ```
pub trait FeatureModel: BaseModel {
	type Input: ?Sized;
	type Features;

	fn extract_features(&self, x: &Self::Input) -> Result<Self::Features>;
}

/// A model that predicts labels and label probabilities.
///
/// A predictor without `predict_proba` is rejected at compile time:
///
/// ```compile_fail
/// use model_state::{BaseModel, Config, ModelState, PredictorModel, Result, Table};
///
/// struct Majority {
/// 	state: ModelState<Table>,
/// }
///
/// impl BaseModel for Majority {
/// 	type Data = Table;
///
/// 	fn from_state(state: ModelState<Table>) -> Result<Self> {
/// 		Ok(Self { state })
/// 	}
///
/// 	fn state(&self) -> &ModelState<Table> {
/// 		&self.state
/// 	}
///
/// 	fn state_mut(&mut self) -> &mut ModelState<Table> {
/// 		&mut self.state
/// 	}
///
/// 	fn fit(&mut self, _dataset: &Table, _args: &Config) -> Result<()> {
/// 		Ok(())
/// 	}
/// }
///
/// impl PredictorModel for Majority {
/// 	type Input = Table;
/// 	type Label = f64;
/// 	type Score = f64;
///
/// 	fn predict(&self, x: &Table) -> Result<Vec<f64>> {
/// 		Ok(vec![0.0; x.rows_len()])
/// 	}
///
/// 	fn evaluate(&self, _x: &Table, _y: &[f64]) -> Result<f64> {
/// 		Ok(1.0)
/// 	}
/// }
/// ```
pub trait PredictorModel: BaseModel {
	type Input: ?Sized;
	type Label;
	type Score;

	fn predict(&self, x: &Self::Input) -> Result<Vec<Self::Label>>;

	/// One probability distribution per input row.
	fn predict_proba(&self, x: &Self::Input) -> Result<Vec<Vec<f64>>>;

	fn evaluate(&self, x: &Self::Input, y: &[Self::Label]) -> Result<Self::Score>;
}
