//! Client side of a dispatch: the relay client, the local mirror and the
//! session that reconciles one against the other.

pub mod action;
pub mod api;
pub mod export;
pub mod http;
pub mod mirror;
pub mod session;

pub use action::{ActionKind, PendingAction, Phase, TransitionError};
pub use api::{ApiError, DispatchApi};
pub use export::{ExportBook, ExportError, default_file_name};
pub use http::RelayClient;
pub use mirror::{Mirror, RECENT_LIMIT, ScanEntry, SkuAggregates, UNKNOWN_SKU};
pub use session::{
    ActionReport, ActionResult, ConfirmGate, LOCKED_MSG, ReloadReport, ReloadTicket, Session,
    SessionError, SingleFlight,
};
