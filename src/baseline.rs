//! Small reference models over [`Table`].
//!
//! Both keep their learned parameters in the model attributes, so a saved
//! model predicts the same after loading.

use ordered_float::OrderedFloat;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::Config;
use crate::dataset::Table;
use crate::error::{Error, Result};
use crate::functions::{self, accuracy, softmax, squared_distance};
use crate::model::{BaseModel, FeatureModel, PredictorModel};
use crate::state::ModelState;
use crate::value::Value;

const MEANS: &str = "means";
const SCALES: &str = "scales";

const CLASSES: &str = "classes";
const CENTROIDS: &str = "centroids";
const CLASS_COUNTS: &str = "class_counts";
const TEMPERATURE: &str = "temperature";

fn check_width(expected: usize, table: &Table) -> Result<()> {
	if table.features_len() != expected {
		return Err(Error::ShapeMismatch { expected, actual: table.features_len() });
	}
	Ok(())
}

fn check_rows(table: &Table) -> Result<()> {
	if table.rows_len() == 0 {
		return Err(Error::Dataset("cannot fit on an empty table".to_string()));
	}
	Ok(())
}

/// Scales every column to zero mean and unit variance.
///
/// Fit arguments: `ddof` (delta degrees of freedom, default 0).
#[derive(Debug)]
pub struct Standardizer {
	state: ModelState<Table>,
}

impl Standardizer {
	fn params(&self) -> Result<(Vec<f64>, Vec<f64>)> {
		let attributes = self.state.attributes();
		match (attributes.get_floats(MEANS)?, attributes.get_floats(SCALES)?) {
			(Some(means), Some(scales)) => Ok((means, scales)),
			_ => Err(Error::NotFitted),
		}
	}
}

impl BaseModel for Standardizer {
	type Data = Table;

	fn from_state(state: ModelState<Table>) -> Result<Self> {
		Ok(Self { state })
	}

	fn state(&self) -> &ModelState<Table> {
		&self.state
	}

	fn state_mut(&mut self) -> &mut ModelState<Table> {
		&mut self.state
	}

	fn fit(&mut self, dataset: &Table, args: &Config) -> Result<()> {
		check_rows(dataset)?;
		let ddof = args.get_usize("ddof", 0)?;
		if ddof >= dataset.rows_len() {
			return Err(Error::invalid_argument("ddof", "must be smaller than the number of rows"));
		}

		let n = dataset.rows_len() as f64;
		let (means, scales): (Vec<f64>, Vec<f64>) = (0..dataset.features_len())
			.map(|j| {
				let column = dataset.column(j);
				let mean = column.iter().sum::<f64>() / n;
				let var = column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - ddof as f64);
				// Constant columns are only centred.
				let scale = if var > 0.0 { var.sqrt() } else { 1.0 };
				(mean, scale)
			})
			.unzip();

		let attributes = self.state.attributes_mut();
		attributes.insert(MEANS, Value::floats(&means));
		attributes.insert(SCALES, Value::floats(&scales));

		Ok(())
	}
}

impl FeatureModel for Standardizer {
	type Input = Table;
	type Features = Vec<Vec<f64>>;

	fn extract_features(&self, x: &Table) -> Result<Vec<Vec<f64>>> {
		let (means, scales) = self.params()?;
		check_width(means.len(), x)?;

		Ok(x.rows()
			.collect::<Vec<_>>()
			.into_par_iter()
			.map(|row| row
				.iter()
				.zip(means.iter().zip(&scales))
				.map(|(v, (m, s))| (v - m) / s)
				.collect::<Vec<f64>>())
			.collect())
	}
}

/// Assigns each row the class of the nearest class centroid.
///
/// Fit arguments: `temperature` (softmax temperature for
/// [`PredictorModel::predict_proba`], default 1).
#[derive(Debug)]
pub struct NearestCentroid {
	state: ModelState<Table>,
}

struct Centroids {
	classes: Vec<f64>,
	centroids: Vec<Vec<f64>>,
	temperature: f64,
}

impl Centroids {
	fn distances(&self, row: &[f64]) -> Vec<f64> {
		self.centroids.iter().map(|c| squared_distance(row, c).sqrt()).collect()
	}

	fn nearest(&self, row: &[f64]) -> f64 {
		let distances = self.distances(row);
		let best = (0..distances.len())
			.min_by_key(|&i| OrderedFloat(distances[i]))
			.unwrap_or(0);
		self.classes[best]
	}
}

impl NearestCentroid {
	fn centroids(&self) -> Result<Centroids> {
		let attributes = self.state.attributes();

		let classes = attributes.get_floats(CLASSES)?.ok_or(Error::NotFitted)?;
		let centroids = match attributes.get(CENTROIDS) {
			Some(Value::List(rows)) => rows
				.iter()
				.map(|row| row.as_floats().ok_or_else(|| Error::Format("malformed centroid".to_string())))
				.collect::<Result<Vec<_>>>()?,
			Some(other) => return Err(Error::Format(format!("centroids stored as {}", other.type_name()))),
			None => return Err(Error::NotFitted),
		};
		let temperature = attributes.get_f64(TEMPERATURE, 1.0)?;

		if classes.is_empty() || classes.len() != centroids.len() {
			return Err(Error::Format("centroids do not match classes".to_string()));
		}

		Ok(Centroids { classes, centroids, temperature })
	}
}

impl BaseModel for NearestCentroid {
	type Data = Table;

	fn from_state(state: ModelState<Table>) -> Result<Self> {
		Ok(Self { state })
	}

	fn state(&self) -> &ModelState<Table> {
		&self.state
	}

	fn state_mut(&mut self) -> &mut ModelState<Table> {
		&mut self.state
	}

	fn fit(&mut self, dataset: &Table, args: &Config) -> Result<()> {
		check_rows(dataset)?;
		let temperature = args.get_f64(TEMPERATURE, 1.0)?;
		if !(temperature > 0.0) {
			return Err(Error::invalid_argument(TEMPERATURE, "must be positive"));
		}

		if let Some(y) = dataset.targets().iter().find(|y| !y.is_finite()) {
			return Err(Error::Dataset(format!("target {} is not a class label", y)));
		}

		let classes = dataset.classes();
		let (counts, _) = functions::histogram(dataset.targets().iter().copied());

		let centroids = classes
			.iter()
			.map(|&class| {
				let rows = (0..dataset.rows_len())
					.filter(|&i| OrderedFloat(dataset.targets()[i]) == OrderedFloat(class))
					.collect::<Vec<_>>();
				let n = rows.len() as f64;

				(0..dataset.features_len())
					.map(|j| rows.iter().map(|&i| dataset.column(j)[i]).sum::<f64>() / n)
					.collect::<Vec<f64>>()
			})
			.map(|c| Value::floats(&c))
			.collect::<Vec<_>>();

		let class_counts = classes
			.iter()
			.map(|class| Value::from(counts[&OrderedFloat(*class)]))
			.collect::<Vec<_>>();

		let attributes = self.state.attributes_mut();
		attributes.insert(CLASSES, Value::floats(&classes));
		attributes.insert(CENTROIDS, Value::List(centroids));
		attributes.insert(CLASS_COUNTS, Value::List(class_counts));
		attributes.insert(TEMPERATURE, temperature);

		Ok(())
	}
}

impl PredictorModel for NearestCentroid {
	type Input = Table;
	type Label = f64;
	type Score = f64;

	fn predict(&self, x: &Table) -> Result<Vec<f64>> {
		let model = self.centroids()?;
		check_width(model.centroids[0].len(), x)?;

		Ok(x.rows().map(|row| model.nearest(&row)).collect())
	}

	/// Columns follow the ascending class order seen during fitting.
	fn predict_proba(&self, x: &Table) -> Result<Vec<Vec<f64>>> {
		let model = self.centroids()?;
		check_width(model.centroids[0].len(), x)?;

		Ok(x.rows()
			.map(|row| {
				let scores = model.distances(&row)
					.into_iter()
					.map(|d| -d / model.temperature)
					.collect::<Vec<_>>();
				softmax(&scores)
			})
			.collect())
	}

	/// Accuracy of [`PredictorModel::predict`] against `y`. An empty table has
	/// no accuracy and is an error.
	fn evaluate(&self, x: &Table, y: &[f64]) -> Result<f64> {
		if y.len() != x.rows_len() {
			return Err(Error::invalid_argument(
				"y",
				format!("expected {} labels, got {}", x.rows_len(), y.len()),
			));
		}
		if x.rows_len() == 0 {
			return Err(Error::Dataset("cannot evaluate on an empty table".to_string()));
		}

		let predicted = self.predict(x)?;
		Ok(accuracy(&predicted, y))
	}
}
