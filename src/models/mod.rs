//! Input data model shared by every engine component.

pub mod datasets;
pub mod return_record;

pub use datasets::{ReturnCountRow, ReturnOutcome, TimeSeriesRow, TrainingDatasets};
pub use return_record::{
    parse_datetime, Condition, Disposition, MarketLevel, ProductCategory, PurchaseChannel,
    ReturnRecord, ReturnRow,
};
