//! Scripted Remote Session Driver
//!
//! A [`SessionFactory`] whose sessions follow a queued [`AttemptPlan`] per opened
//! session, recording every driver call in shared state so tests can assert on
//! exactly what the engine asked the portal to do.

use crate::config::PortalCredentials;
use crate::portal::{
    Confirmation, DiagnosticArtifact, DriverError, DriverResult, PortalField, RemoteSessionDriver,
    SessionFactory,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Points in a session where a plan can inject behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptStep {
    Open,
    Authenticate,
    SelectContext,
    Navigate,
    SetField(PortalField),
    AttachFile,
    Submit,
    AwaitConfirmation,
    CaptureDiagnostic,
    Close,
}

/// A driver call as observed by the scripted session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Authenticate(String),
    SelectContext(String),
    Navigate,
    SetField(PortalField, String),
    AttachFile(PathBuf),
    Submit,
    AwaitConfirmation,
    CaptureDiagnostic(String),
    Close,
}

#[derive(Debug, Clone)]
enum StepBehavior {
    Fail(DriverError),
    Hang,
    Panic,
}

/// How one session behaves
#[derive(Debug, Clone)]
pub struct AttemptPlan {
    behaviors: HashMap<ScriptStep, StepBehavior>,
    confirmation: Confirmation,
}

impl Default for AttemptPlan {
    fn default() -> Self {
        Self::succeed()
    }
}

impl AttemptPlan {
    pub fn succeed() -> Self {
        Self {
            behaviors: HashMap::new(),
            confirmation: Confirmation::Confirmed {
                reference: Some("CONF-1".to_string()),
            },
        }
    }

    pub fn fail_at(step: ScriptStep, error: DriverError) -> Self {
        Self::succeed().with_failure(step, error)
    }

    pub fn hang_at(step: ScriptStep) -> Self {
        let mut plan = Self::succeed();
        plan.behaviors.insert(step, StepBehavior::Hang);
        plan
    }

    pub fn panic_at(step: ScriptStep) -> Self {
        let mut plan = Self::succeed();
        plan.behaviors.insert(step, StepBehavior::Panic);
        plan
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            confirmation: Confirmation::Rejected {
                reason: reason.into(),
            },
            ..Self::succeed()
        }
    }

    pub fn with_failure(mut self, step: ScriptStep, error: DriverError) -> Self {
        self.behaviors.insert(step, StepBehavior::Fail(error));
        self
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    calls: Vec<DriverCall>,
    plans: VecDeque<AttemptPlan>,
    default_plan: AttemptPlan,
    opened: u32,
    closed: u32,
}

/// Session factory handing out scripted sessions; clones share state
#[derive(Debug, Clone, Default)]
pub struct ScriptedSessionFactory {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan for the next session opened; sessions beyond the queue use the default plan
    pub fn push_plan(&self, plan: AttemptPlan) {
        self.state.lock().plans.push_back(plan);
    }

    pub fn set_default_plan(&self, plan: AttemptPlan) {
        self.state.lock().default_plan = plan;
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    /// Names passed to `set_field(FirstName, ..)`, one per form filled
    pub fn submitted_first_names(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DriverCall::SetField(PortalField::FirstName, value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matcher: impl Fn(&DriverCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matcher(c)).count()
    }

    pub fn sessions_opened(&self) -> u32 {
        self.state.lock().opened
    }

    pub fn sessions_closed(&self) -> u32 {
        self.state.lock().closed
    }
}

#[async_trait]
impl SessionFactory for ScriptedSessionFactory {
    async fn open_session(&self) -> DriverResult<Box<dyn RemoteSessionDriver>> {
        let plan = {
            let mut state = self.state.lock();
            let plan = state
                .plans
                .pop_front()
                .unwrap_or_else(|| state.default_plan.clone());
            if let Some(StepBehavior::Fail(error)) = plan.behaviors.get(&ScriptStep::Open) {
                return Err(error.clone());
            }
            state.opened += 1;
            plan
        };
        Ok(Box::new(ScriptedDriver {
            plan,
            state: self.state.clone(),
        }))
    }
}

pub struct ScriptedDriver {
    plan: AttemptPlan,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
    async fn perform(&self, step: ScriptStep, call: DriverCall) -> DriverResult<()> {
        self.state.lock().calls.push(call);
        match self.plan.behaviors.get(&step) {
            None => Ok(()),
            Some(StepBehavior::Fail(error)) => Err(error.clone()),
            Some(StepBehavior::Hang) => std::future::pending().await,
            Some(StepBehavior::Panic) => panic!("scripted driver panic at {step:?}"),
        }
    }
}

#[async_trait]
impl RemoteSessionDriver for ScriptedDriver {
    async fn authenticate(&mut self, credentials: &PortalCredentials) -> DriverResult<()> {
        self.perform(
            ScriptStep::Authenticate,
            DriverCall::Authenticate(credentials.username.clone()),
        )
        .await
    }

    async fn select_context(&mut self, context_id: &str) -> DriverResult<()> {
        self.perform(
            ScriptStep::SelectContext,
            DriverCall::SelectContext(context_id.to_string()),
        )
        .await
    }

    async fn navigate_to_submission_surface(&mut self) -> DriverResult<()> {
        self.perform(ScriptStep::Navigate, DriverCall::Navigate).await
    }

    async fn set_field(&mut self, field: PortalField, value: &str) -> DriverResult<()> {
        self.perform(
            ScriptStep::SetField(field),
            DriverCall::SetField(field, value.to_string()),
        )
        .await
    }

    async fn attach_file(&mut self, path: &Path) -> DriverResult<()> {
        self.perform(ScriptStep::AttachFile, DriverCall::AttachFile(path.to_path_buf()))
            .await
    }

    async fn submit(&mut self) -> DriverResult<()> {
        self.perform(ScriptStep::Submit, DriverCall::Submit).await
    }

    async fn await_confirmation(&mut self, _timeout: Duration) -> DriverResult<Confirmation> {
        self.perform(ScriptStep::AwaitConfirmation, DriverCall::AwaitConfirmation)
            .await?;
        Ok(self.plan.confirmation.clone())
    }

    async fn capture_diagnostic(&mut self, tag: &str) -> DriverResult<DiagnosticArtifact> {
        self.perform(
            ScriptStep::CaptureDiagnostic,
            DriverCall::CaptureDiagnostic(tag.to_string()),
        )
        .await?;
        Ok(DiagnosticArtifact::new(tag).with_detail("scripted session snapshot"))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.state.lock().closed += 1;
        self.perform(ScriptStep::Close, DriverCall::Close).await
    }
}
