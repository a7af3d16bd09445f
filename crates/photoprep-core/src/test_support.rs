//! Scripted remote authority and fixtures for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::auth::HandoffArtifact;
use crate::error::{RemoteError, RemoteResult};
use crate::images::RemoteId;
use crate::remote::{
    HistoryRecord, PlanChange, PlanReceipt, ProcessReceipt, ProfileSnapshot, RemoteAuthority,
    SessionSnapshot, UploadFile, UploadReceipt,
};
use crate::session::{Identity, PlanId, Session};

pub(crate) fn session_with(plan: &str, credits: u32) -> Session {
    Session {
        identity: Identity {
            id: "user_test".to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            avatar: None,
        },
        plan: PlanId::new(plan),
        credits_remaining: credits,
    }
}

pub(crate) fn snapshot(plan: &str, credits: i64) -> SessionSnapshot {
    SessionSnapshot {
        user_id: "user_test".to_string(),
        email: "test@example.com".to_string(),
        name: "Test User".to_string(),
        picture: None,
        credits,
        subscription: PlanId::new(plan),
    }
}

pub(crate) fn server_error(status: u16, detail: &str) -> RemoteError {
    RemoteError::http_status(status, &serde_json::json!({ "detail": detail }).to_string())
}

/// Smallest prefix `infer` recognizes as JPEG.
pub(crate) fn jpeg_bytes() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00]
}

pub(crate) fn jpeg_upload(name: &str) -> UploadFile {
    UploadFile::new(name, jpeg_bytes())
}

/// In-memory remote authority.
///
/// Every call is recorded before it suspends. Operations marked with
/// [`FakeRemote::hold`] wait until [`FakeRemote::release`], which lets a
/// test observe state while a request is in flight.
pub(crate) struct FakeRemote {
    calls: RefCell<Vec<&'static str>>,
    held: RefCell<HashSet<&'static str>>,
    gate: Notify,
    uploads: Cell<u32>,
    exchange: RefCell<RemoteResult<SessionSnapshot>>,
    validate: RefCell<RemoteResult<SessionSnapshot>>,
    logout: RefCell<RemoteResult<()>>,
    upload_failure: RefCell<Option<RemoteError>>,
    process: RefCell<VecDeque<RemoteResult<ProcessReceipt>>>,
    fetch: RefCell<RemoteResult<Bytes>>,
    delete: RefCell<RemoteResult<()>>,
    history: RefCell<RemoteResult<Vec<HistoryRecord>>>,
    profile: RefCell<RemoteResult<ProfileSnapshot>>,
    plan: RefCell<Option<RemoteResult<PlanReceipt>>>,
    plan_changes: RefCell<Vec<PlanChange>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            held: RefCell::new(HashSet::new()),
            gate: Notify::new(),
            uploads: Cell::new(0),
            exchange: RefCell::new(Err(server_error(401, "Invalid session"))),
            validate: RefCell::new(Err(server_error(401, "Not authenticated"))),
            logout: RefCell::new(Ok(())),
            upload_failure: RefCell::new(None),
            process: RefCell::new(VecDeque::new()),
            fetch: RefCell::new(Ok(Bytes::from_static(b"processed"))),
            delete: RefCell::new(Ok(())),
            history: RefCell::new(Ok(Vec::new())),
            profile: RefCell::new(Err(server_error(401, "Not authenticated"))),
            plan: RefCell::new(None),
            plan_changes: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn count(&self, op: &str) -> usize {
        self.calls.borrow().iter().filter(|c| **c == op).count()
    }

    /// Makes `op` wait for [`FakeRemote::release`] after being recorded.
    pub(crate) fn hold(&self, op: &'static str) {
        self.held.borrow_mut().insert(op);
    }

    /// Lets one held call proceed.
    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }

    pub(crate) fn set_exchange(&self, result: RemoteResult<SessionSnapshot>) {
        *self.exchange.borrow_mut() = result;
    }

    pub(crate) fn set_validate(&self, result: RemoteResult<SessionSnapshot>) {
        *self.validate.borrow_mut() = result;
    }

    pub(crate) fn set_logout(&self, result: RemoteResult<()>) {
        *self.logout.borrow_mut() = result;
    }

    pub(crate) fn fail_uploads(&self, error: RemoteError) {
        *self.upload_failure.borrow_mut() = Some(error);
    }

    /// Queues a processing response; unscripted calls succeed without an
    /// authoritative credit count.
    pub(crate) fn push_process(&self, result: RemoteResult<ProcessReceipt>) {
        self.process.borrow_mut().push_back(result);
    }

    pub(crate) fn set_fetch(&self, result: RemoteResult<Bytes>) {
        *self.fetch.borrow_mut() = result;
    }

    pub(crate) fn set_delete(&self, result: RemoteResult<()>) {
        *self.delete.borrow_mut() = result;
    }

    pub(crate) fn set_history(&self, result: RemoteResult<Vec<HistoryRecord>>) {
        *self.history.borrow_mut() = result;
    }

    pub(crate) fn set_profile(&self, result: RemoteResult<ProfileSnapshot>) {
        *self.profile.borrow_mut() = result;
    }

    pub(crate) fn set_plan(&self, result: RemoteResult<PlanReceipt>) {
        *self.plan.borrow_mut() = Some(result);
    }

    pub(crate) fn plan_changes(&self) -> Vec<PlanChange> {
        self.plan_changes.borrow().clone()
    }

    async fn enter(&self, op: &'static str) {
        self.calls.borrow_mut().push(op);
        let held = self.held.borrow().contains(op);
        if held {
            self.gate.notified().await;
        }
    }
}

impl RemoteAuthority for FakeRemote {
    async fn exchange_handoff(&self, _artifact: &HandoffArtifact) -> RemoteResult<SessionSnapshot> {
        self.enter("exchange_handoff").await;
        self.exchange.borrow().clone()
    }

    async fn validate(&self) -> RemoteResult<SessionSnapshot> {
        self.enter("validate").await;
        self.validate.borrow().clone()
    }

    async fn logout(&self) -> RemoteResult<()> {
        self.enter("logout").await;
        self.logout.borrow().clone()
    }

    async fn upload(&self, _file: &UploadFile) -> RemoteResult<UploadReceipt> {
        self.enter("upload").await;
        if let Some(err) = self.upload_failure.borrow().clone() {
            return Err(err);
        }
        let n = self.uploads.get() + 1;
        self.uploads.set(n);
        Ok(UploadReceipt {
            remote_id: RemoteId::new(format!("img_{n}")),
            preview_url: format!("/api/images/file/img_{n}/original"),
        })
    }

    async fn process(&self, remote_id: &RemoteId) -> RemoteResult<ProcessReceipt> {
        self.enter("process").await;
        let scripted = self.process.borrow_mut().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(ProcessReceipt {
                result_url: format!("/api/images/file/{remote_id}/processed"),
                credits: None,
            })
        })
    }

    async fn fetch_result(&self, _remote_id: &RemoteId) -> RemoteResult<Bytes> {
        self.enter("fetch_result").await;
        self.fetch.borrow().clone()
    }

    async fn delete(&self, _remote_id: &RemoteId) -> RemoteResult<()> {
        self.enter("delete").await;
        self.delete.borrow().clone()
    }

    async fn history(&self) -> RemoteResult<Vec<HistoryRecord>> {
        self.enter("history").await;
        self.history.borrow().clone()
    }

    async fn profile(&self) -> RemoteResult<ProfileSnapshot> {
        self.enter("profile").await;
        self.profile.borrow().clone()
    }

    async fn change_plan(&self, change: &PlanChange) -> RemoteResult<PlanReceipt> {
        self.enter("change_plan").await;
        self.plan_changes.borrow_mut().push(change.clone());
        if let Some(result) = self.plan.borrow().clone() {
            return result;
        }
        let plan = match change {
            PlanChange::Upgrade(plan) => plan.clone(),
            PlanChange::Downgrade => PlanId::new("free"),
        };
        Ok(PlanReceipt {
            plan,
            credits: None,
            message: None,
        })
    }
}
