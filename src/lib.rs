//! Base layer for model wrappers: construction from a dataset or a state
//! file, versioned save/load, and the fit / feature / predictor capabilities.
//!
//! ```no_run
//! use model_state::{BaseModel, Config, NearestCentroid, PredictorModel};
//!
//! # fn main() -> model_state::Result<()> {
//! let args = Config::new().with("size", 100i64).with("features", 4i64);
//! let mut model = NearestCentroid::new(&args, Config::new())?;
//!
//! let data = model.data().map(|d| (**d).clone()).unwrap();
//! model.fit(&data, &Config::new())?;
//! model.save("centroids", false)?;
//!
//! let restored = NearestCentroid::from_file("centroids.model")?;
//! assert_eq!(restored.predict(&data)?, model.predict(&data)?);
//! # Ok(())
//! # }
//! ```

mod baseline;
mod config;
mod dataset;
mod error;
mod functions;
mod model;
mod persist;
mod state;
mod value;

pub use baseline::{NearestCentroid, Standardizer};
pub use config::{Attributes, Config};
pub use dataset::{Builder, DataHandle, Dataset, Table};
pub use error::{Error, Result};
pub use functions::{accuracy, histogram, softmax};
pub use model::{BaseModel, FeatureModel, PredictorModel};
pub use persist::{resolve_path, EXTENSION};
pub use state::{ModelState, LOAD_KEY};
pub use value::Value;
