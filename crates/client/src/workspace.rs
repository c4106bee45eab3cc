//! The signed-in CRM: leads and tasks controllers sharing one session,
//! one event bus and one view scope.

use std::sync::Arc;

use flowline_core::metrics::{self, DashboardKpis};
use flowline_core::search::{self, SearchHit, SearchScope};
use flowline_core::{Lead, PipelineStage, Task};
use flowline_remote::{RemoteCollection, RestClient};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::controller::OptimisticController;
use crate::error::ClientResult;
use crate::events::{ClientEvent, EventBus};
use crate::session::SessionHandle;

/// Owned per-stage figures for the pipeline header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSummary {
    pub stage: PipelineStage,
    pub count: usize,
    pub total_value: f64,
}

pub struct CrmWorkspace {
    pub leads: OptimisticController<Lead>,
    pub tasks: OptimisticController<Task>,
    session: SessionHandle,
    events: Arc<EventBus>,
    scope: CancellationToken,
}

impl CrmWorkspace {
    pub fn new(
        leads: Arc<dyn RemoteCollection<Lead>>,
        tasks: Arc<dyn RemoteCollection<Task>>,
        session: SessionHandle,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        let scope = CancellationToken::new();
        Self {
            leads: OptimisticController::with_scope(
                leads,
                session.clone(),
                Arc::clone(&events),
                scope.child_token(),
            ),
            tasks: OptimisticController::with_scope(
                tasks,
                session.clone(),
                Arc::clone(&events),
                scope.child_token(),
            ),
            session,
            events,
            scope,
        }
    }

    /// Both collections backed by the hosted row API.
    pub fn over_rest(client: RestClient, session: SessionHandle) -> Self {
        let client = Arc::new(client);
        Self::new(client.clone(), client, session)
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Load leads and tasks concurrently. Returns the row counts.
    ///
    /// Both reads always run to completion. A collection whose read fails
    /// keeps its previous contents, and the first error is returned.
    pub async fn load_all(&self) -> ClientResult<(usize, usize)> {
        let (leads, tasks) = tokio::join!(self.leads.load(), self.tasks.load());
        Ok((leads?, tasks?))
    }

    pub fn dashboard(&self) -> DashboardKpis {
        metrics::dashboard_kpis(&self.leads.snapshot().items)
    }

    pub fn pipeline(&self) -> Vec<StageSummary> {
        let leads = self.leads.snapshot();
        metrics::pipeline_columns(&leads.items)
            .iter()
            .map(|column| StageSummary {
                stage: column.stage,
                count: column.count(),
                total_value: column.total_value,
            })
            .collect()
    }

    /// Quick search over the loaded collections, capped per kind.
    pub fn search(&self, query: &str, scope: SearchScope, limit: Option<usize>) -> Vec<SearchHit> {
        search::quick_search(
            &self.leads.snapshot().items,
            &self.tasks.snapshot().items,
            query,
            scope,
            search::clamp_limit(limit),
        )
    }

    /// The lead a task points at, if it is still loaded.
    pub fn related_lead(&self, task: &Task) -> Option<Lead> {
        task.related_lead(&self.leads.snapshot().items).cloned()
    }

    /// Close the view scope for both collections.
    pub fn close(&self) {
        self.scope.cancel();
    }
}
