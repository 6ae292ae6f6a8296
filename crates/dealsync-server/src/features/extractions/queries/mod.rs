pub mod get_results;
pub mod get_status;
pub mod list;

pub use get_results::GetScanResultsQuery;
pub use get_status::{GetScanStatusQuery, ScanStatusResponse};
pub use list::{ListScansQuery, ListScansResponse};
