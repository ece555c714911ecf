pub mod dataset_writer;

pub use dataset_writer::{DatasetWriter, WrittenFiles, to_dataframe};
