pub mod procedure;
pub mod rows;
pub mod wire;

pub use procedure::Procedure;
pub use rows::{
    DispatchMeta, ItemRow, STATUS_OPEN, ScanRow, rows_from_value, rows_from_value_lossy, scalar_text,
    truthy,
};
pub use wire::{
    ActionResponse, ErrorBody, ErrorCode, FinalizeRequest, FinalizeResponse, ItemRequest,
    MessageResponse, MetaResponse, ReturnOutcome, RowsResponse, ScanOutcome, UnscanOutcome,
};
