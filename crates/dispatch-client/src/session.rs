//! One operator's scanning session against one dispatch.
//!
//! The session owns the mirror. Accepted actions patch it optimistically and
//! then overwrite it with a full reload; rejected actions never touch the
//! aggregates. Reloads are not ordered: whichever finishes last wins, and
//! [`ReloadReport::stale`] says when that was an older request overwriting a
//! newer one.

use async_trait::async_trait;
use dispatch_core::{DispatchMeta, FinalizeResponse, ItemRow};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::action::{ActionKind, PendingAction, Phase, TransitionError};
use crate::api::{ApiError, DispatchApi};
use crate::mirror::Mirror;

/// Shown instead of calling the relay while the dispatch is not open.
pub const LOCKED_MSG: &str = "Dispatch is not open; scanning is locked";

pub const CANCELLED_MSG: &str = "Removal cancelled";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{LOCKED_MSG}")]
    Locked,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Yes/no confirmation before a destructive action.
#[async_trait]
pub trait ConfirmGate: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Lets one confirmation be outstanding at a time. A prompt raised while
/// another is open is declined without asking.
pub struct SingleFlight<G> {
    inner: G,
    open: Mutex<()>,
}

impl<G: ConfirmGate> SingleFlight<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            open: Mutex::new(()),
        }
    }
}

#[async_trait]
impl<G: ConfirmGate> ConfirmGate for SingleFlight<G> {
    async fn confirm(&self, prompt: &str) -> bool {
        let Ok(_guard) = self.open.try_lock() else {
            warn!("confirmation already pending, declining");
            return false;
        };
        self.inner.confirm(prompt).await
    }
}

/// Identifies one issued reload. Later tickets compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReloadTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    pub ticket: ReloadTicket,
    pub rows: usize,
    /// The mirror previously showed a reload issued after this one.
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// Empty input, nothing sent.
    Ignored,
    /// Read-only dispatch, nothing sent.
    Locked,
    /// Confirmation declined, nothing sent.
    Cancelled,
    Accepted { message: String, sku_code: Option<String> },
    Rejected { message: String },
}

/// What happened to one action, including every phase it went through.
#[derive(Debug)]
pub struct ActionReport {
    pub kind: ActionKind,
    pub barcode: String,
    pub phases: Vec<Phase>,
    pub result: ActionResult,
    /// Present when the action reached reconciliation.
    pub reload: Option<Result<ReloadReport, ApiError>>,
}

impl ActionReport {
    fn new(action: &PendingAction, result: ActionResult) -> Self {
        Self {
            kind: action.kind(),
            barcode: action.barcode().to_string(),
            phases: action.history().to_vec(),
            result,
            reload: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.result, ActionResult::Accepted { .. })
    }

    /// One line for the operator.
    pub fn feedback(&self) -> String {
        let barcode = &self.barcode;
        match (&self.result, self.kind) {
            (ActionResult::Ignored, _) => String::new(),
            (ActionResult::Locked, _) => LOCKED_MSG.to_string(),
            (ActionResult::Cancelled, _) => CANCELLED_MSG.to_string(),
            (ActionResult::Accepted { sku_code, .. }, ActionKind::Scan) => match sku_code {
                Some(sku) => format!("✅ {barcode} reserved · {sku}"),
                None => format!("✅ {barcode} reserved"),
            },
            (ActionResult::Accepted { message, .. }, ActionKind::Unscan) => {
                format!("🗑 {barcode} · {message}")
            }
            (ActionResult::Accepted { message, .. }, ActionKind::Return) => {
                format!("↩ {barcode} · {message}")
            }
            (ActionResult::Rejected { message }, _) => format!("❌ {barcode} · {message}"),
        }
    }
}

fn take_input(input: &mut String) -> String {
    std::mem::take(input).trim().to_string()
}

fn reason_or_default(message: &str, kind: ActionKind) -> String {
    if message.trim().is_empty() {
        format!("{kind} rejected")
    } else {
        message.to_string()
    }
}

pub struct Session<A> {
    api: A,
    dispatch_id: String,
    meta: Option<DispatchMeta>,
    mirror: Mirror,
    next_ticket: u64,
    shown: Option<ReloadTicket>,
}

impl<A: DispatchApi> Session<A> {
    /// A session with an empty mirror and unknown status. Nothing is fetched.
    pub fn new(api: A, dispatch_id: impl Into<String>) -> Self {
        Self {
            api,
            dispatch_id: dispatch_id.into(),
            meta: None,
            mirror: Mirror::default(),
            next_ticket: 0,
            shown: None,
        }
    }

    /// Fetch the dispatch status and the item list.
    pub async fn open(api: A, dispatch_id: impl Into<String>) -> Result<Self, ApiError> {
        let mut session = Self::new(api, dispatch_id);
        session.refresh_meta().await?;
        session.reload().await?;
        Ok(session)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn dispatch_id(&self) -> &str {
        &self.dispatch_id
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn meta(&self) -> Option<&DispatchMeta> {
        self.meta.as_ref()
    }

    /// Locked once a status other than `open` is known. An unknown status
    /// does not lock.
    pub fn is_read_only(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| !m.is_open())
    }

    pub fn set_meta(&mut self, meta: DispatchMeta) -> &DispatchMeta {
        if !meta.is_open() {
            info!(dispatch_id = %self.dispatch_id, status = %meta.status, "dispatch is read-only");
        }
        self.meta.insert(meta)
    }

    pub async fn refresh_meta(&mut self) -> Result<&DispatchMeta, ApiError> {
        let meta = self.api.meta(&self.dispatch_id).await?;
        Ok(self.set_meta(meta))
    }

    // ── Reconciliation ──

    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.next_ticket += 1;
        ReloadTicket(self.next_ticket)
    }

    /// Replace the mirror with `rows`, whatever was issued since.
    pub fn finish_reload(&mut self, ticket: ReloadTicket, rows: &[ItemRow]) -> ReloadReport {
        let stale = self.shown.is_some_and(|shown| shown > ticket);
        if stale {
            warn!(
                dispatch_id = %self.dispatch_id,
                ?ticket,
                shown = ?self.shown,
                "older reload overwrote a newer one"
            );
        }
        self.mirror.replace(rows);
        self.shown = Some(ticket);
        info!(dispatch_id = %self.dispatch_id, rows = rows.len(), "mirror reloaded");
        ReloadReport {
            ticket,
            rows: rows.len(),
            stale,
        }
    }

    pub async fn reload(&mut self) -> Result<ReloadReport, ApiError> {
        let ticket = self.begin_reload();
        let rows = self.api.items(&self.dispatch_id).await?;
        Ok(self.finish_reload(ticket, &rows))
    }

    /// A failed fetch keeps the optimistic state and is handed back, not raised.
    async fn reconcile(
        &mut self,
        action: &mut PendingAction,
    ) -> Result<Result<ReloadReport, ApiError>, TransitionError> {
        action.begin_reconcile()?;
        let reload = self.reload().await;
        if let Err(e) = &reload {
            warn!(error = %e, barcode = action.barcode(), "reconcile fetch failed, keeping optimistic state");
        }
        action.settle()?;
        Ok(reload)
    }

    // ── Actions ──

    /// Scan the barcode in `input`. The buffer is cleared before anything else.
    pub async fn submit_scan(
        &mut self,
        input: &mut String,
    ) -> Result<ActionReport, TransitionError> {
        let barcode = take_input(input);
        let mut action = PendingAction::new(ActionKind::Scan, &barcode);
        if let Some(report) = self.precheck(&action) {
            return Ok(report);
        }

        action.submit()?;
        let message = match self.api.scan(&self.dispatch_id, &barcode).await {
            Ok(resp) if resp.ok => {
                let sku_code = resp.sku_code().map(str::to_string);
                self.mirror
                    .apply_reserved(&barcode, sku_code.as_deref(), resp.brand(), &resp.msg);
                action.apply_optimistic()?;
                let reload = self.reconcile(&mut action).await?;
                let mut report = ActionReport::new(
                    &action,
                    ActionResult::Accepted {
                        message: resp.msg,
                        sku_code,
                    },
                );
                report.reload = Some(reload);
                return Ok(report);
            }
            Ok(resp) => reason_or_default(&resp.msg, ActionKind::Scan),
            Err(e) => e.to_string(),
        };

        info!(barcode = %barcode, reason = %message, "scan rejected");
        self.mirror.apply_failure(&barcode, &message);
        action.reject()?;
        action.settle()?;
        Ok(ActionReport::new(&action, ActionResult::Rejected { message }))
    }

    /// Release the barcode in `input` after `gate` confirms.
    pub async fn submit_unscan(
        &mut self,
        input: &mut String,
        gate: &dyn ConfirmGate,
    ) -> Result<ActionReport, TransitionError> {
        let barcode = take_input(input);
        let action = PendingAction::new(ActionKind::Unscan, &barcode);
        if let Some(report) = self.precheck(&action) {
            return Ok(report);
        }
        let prompt = format!("Remove {barcode} from dispatch {}?", self.dispatch_id);
        if !gate.confirm(&prompt).await {
            return Ok(ActionReport::new(&action, ActionResult::Cancelled));
        }
        self.release(action).await
    }

    /// Mark the barcode in `input` as returned.
    pub async fn submit_return(
        &mut self,
        input: &mut String,
    ) -> Result<ActionReport, TransitionError> {
        let barcode = take_input(input);
        let action = PendingAction::new(ActionKind::Return, &barcode);
        if let Some(report) = self.precheck(&action) {
            return Ok(report);
        }
        self.release(action).await
    }

    /// Shared path for unscan and return. A rejection is reported but not logged
    /// in the mirror.
    async fn release(
        &mut self,
        mut action: PendingAction,
    ) -> Result<ActionReport, TransitionError> {
        action.submit()?;
        let barcode = action.barcode().to_string();
        let resp = match action.kind() {
            ActionKind::Return => self.api.return_item(&self.dispatch_id, &barcode).await,
            _ => self.api.unscan(&self.dispatch_id, &barcode).await,
        };

        let message = match resp {
            Ok(resp) if resp.ok => {
                match action.kind() {
                    ActionKind::Return => self.mirror.apply_returned(&barcode),
                    _ => {
                        self.mirror.apply_removed(&barcode);
                    }
                }
                action.apply_optimistic()?;
                let reload = self.reconcile(&mut action).await?;
                let mut report = ActionReport::new(
                    &action,
                    ActionResult::Accepted {
                        message: resp.msg,
                        sku_code: None,
                    },
                );
                report.reload = Some(reload);
                return Ok(report);
            }
            Ok(resp) => reason_or_default(&resp.msg, action.kind()),
            Err(e) => e.to_string(),
        };

        info!(kind = %action.kind(), barcode = %barcode, reason = %message, "action rejected");
        action.reject()?;
        action.settle()?;
        Ok(ActionReport::new(&action, ActionResult::Rejected { message }))
    }

    fn precheck(&self, action: &PendingAction) -> Option<ActionReport> {
        if action.barcode().is_empty() {
            return Some(ActionReport::new(action, ActionResult::Ignored));
        }
        if self.is_read_only() {
            info!(kind = %action.kind(), barcode = action.barcode(), "rejected locally, read-only");
            return Some(ActionReport::new(action, ActionResult::Locked));
        }
        None
    }

    /// Close the dispatch, then pick up its new status and item list.
    pub async fn finalize(&mut self, dispatch_date: &str) -> Result<FinalizeResponse, SessionError> {
        if self.is_read_only() {
            return Err(SessionError::Locked);
        }
        let resp = self.api.finalize(&self.dispatch_id, dispatch_date).await?;
        self.refresh_meta().await?;
        self.reload().await?;
        Ok(resp)
    }
}
