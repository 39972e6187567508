pub mod data;

pub use data::{
    DataType, HealthSignal, PlcStatus, ReadOutcome, StatusEvent, StorageType, TagValue,
    TagValueData, now_epoch_ms,
};
