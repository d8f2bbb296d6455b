pub mod dataset;
pub mod synthetic;

pub use dataset::{DataSource, Dataset, DatasetInfo, DatasetProvider, Subset};
