// Archivo: service.rs
// Propósito: implementar `TrackService`, la capa orquestadora que expone
// las operaciones de alto nivel (alta de documentos, recepción, inicio y
// fin de actividades, reportes). Esta capa debe ser invocada desde
// handlers HTTP o desde una CLI.
use crate::domain::{AcceptOutcome, DerivedState, DocumentFilter, DocumentListItem, DocumentSummary, FinishOutcome,
                    FinishTarget, StartOutcome};
use crate::engine::{EngineConfig, WorkflowEngine};
use crate::errors::{Result, TrackError};
use crate::repository::TrackRepository;
use doc_domain::{ActivityScan, Admin, Decision, Document, Process, ProcessActivity, ProcessTemplate};
use std::sync::Arc;
use uuid::Uuid;

/// Servicio de alto nivel sobre el seguimiento documental.
///
/// Orquesta el repositorio y el motor. Las operaciones de reporte son
/// lecturas puras; las de transición delegan en `WorkflowEngine`.
pub struct TrackService<R>
    where R: TrackRepository
{
    repo: Arc<R>,
    engine: Arc<WorkflowEngine<R>>,
}

impl<R> TrackService<R> where R: TrackRepository + 'static
{
    /// Crea el servicio inyectando el repositorio; el motor se construye
    /// internamente y se reusa.
    pub fn new(repo: Arc<R>, engine_config: EngineConfig) -> Self {
        let engine = Arc::new(WorkflowEngine::new(repo.clone(), engine_config));
        Self { repo, engine }
    }

    /// Variante con motor ya construido (por ejemplo con reloj fijo en
    /// pruebas).
    pub fn with_engine(repo: Arc<R>, engine: Arc<WorkflowEngine<R>>) -> Self {
        Self { repo, engine }
    }

    pub fn engine(&self) -> &Arc<WorkflowEngine<R>> {
        &self.engine
    }

    /// Búsqueda simple del operador; devuelve sus datos de oficina/región.
    pub fn login(&self, admin_id: &str) -> Result<Admin> {
        self.repo
            .get_admin(admin_id)?
            .ok_or_else(|| TrackError::AdminNotFound(admin_id.to_string()))
    }

    pub fn upsert_admin(&self, admin: &Admin) -> Result<()> {
        self.repo.upsert_admin(admin)
    }

    /// Alta de un proceso con sus actividades. Valida la plantilla completa
    /// antes de persistir; el código debe ser único.
    pub fn create_process(&self, process: Process, activities: Vec<ProcessActivity>) -> Result<ProcessTemplate> {
        if self.repo.find_process(process.code())?.is_some() {
            return Err(TrackError::InvalidStateTransition(format!("Ya existe un proceso con código {}",
                                                                  process.code())));
        }
        let template =
            ProcessTemplate::new(process, activities).map_err(|e| TrackError::TemplateInconsistency(e.to_string()))?;
        self.repo.create_process(template.process(), template.activities())?;
        Ok(template)
    }

    pub fn list_processes(&self) -> Result<Vec<Process>> {
        self.repo.list_processes()
    }

    pub fn process_activities(&self, process_id: &Uuid) -> Result<Vec<ProcessActivity>> {
        self.repo.list_activities(process_id)
    }

    /// Registra un documento contra un proceso, estampando oficina y región
    /// del administrador que lo da de alta. `process_ref` admite el id del
    /// proceso o, si es `None`, se resuelve por `doc_type` como código o
    /// nombre de proceso.
    pub fn register_document(&self, admin_id: &str, doc_type: &str, process_ref: Option<Uuid>) -> Result<Document> {
        let admin = self.login(admin_id)?;
        let process = match process_ref {
            Some(id) => self.repo
                            .get_process(&id)?
                            .ok_or_else(|| TrackError::ProcessNotFound(id.to_string()))?,
            None => self.repo
                        .find_process(doc_type)?
                        .ok_or_else(|| TrackError::ProcessNotFound(doc_type.to_string()))?,
        };
        let mut document = Document::new(process.id(), doc_type, &admin.office_type, &admin.region);
        // el alta queda fechada por el reloj inyectado del motor
        document.created_at = self.engine.now();
        self.repo.create_document(&document)?;
        log::info!("documento registrado: {} ({}) proceso={}", document.id, doc_type, process.code());
        Ok(document)
    }

    /// Estado derivado del documento más la lista de actividades de su
    /// plantilla (lo que un cliente de escaneo renderiza).
    pub fn document_state(&self, document_id: &Uuid) -> Result<(DerivedState, Vec<ProcessActivity>)> {
        let state = self.engine.compute_state(document_id)?;
        let doc = self.repo
                      .get_document(document_id)?
                      .ok_or(TrackError::DocumentNotFound(*document_id))?;
        let activities = self.repo.list_activities(&doc.process_id)?;
        Ok((state, activities))
    }

    pub fn accept_document(&self, document_id: &Uuid) -> Result<AcceptOutcome> {
        self.engine.accept_document(document_id)
    }

    pub fn start_activity(&self, document_id: &Uuid, requested: Option<Uuid>) -> Result<StartOutcome> {
        self.engine.start_activity(document_id, requested)
    }

    pub fn finish_activity(&self,
                           target: FinishTarget,
                           decision: Option<Decision>,
                           next_override: Option<Uuid>)
                           -> Result<FinishOutcome> {
        self.engine.finish_activity(target, decision, next_override)
    }

    /// Detalle de un documento: historial completo y totales acumulados.
    pub fn document_summary(&self, document_id: &Uuid) -> Result<DocumentSummary> {
        let document = self.repo
                           .get_document(document_id)?
                           .ok_or(TrackError::DocumentNotFound(*document_id))?;
        let process = self.repo
                          .get_process(&document.process_id)?
                          .ok_or_else(|| TrackError::ProcessNotFound(document.process_id.to_string()))?;
        let scans = self.repo.list_scans(document_id)?;
        let (exec, wait, rest) = totals(&scans);
        let overall_seconds = scans.iter()
                                   .filter_map(|s| s.end_time)
                                   .max()
                                   .map(|last_end| (last_end - document.created_at).num_seconds());
        Ok(DocumentSummary { document,
                             process_name: process.name().to_string(),
                             scans,
                             overall_seconds,
                             total_execution_seconds: exec,
                             total_waiting_seconds: wait,
                             total_resting_seconds: rest })
    }

    /// Listado administrativo con totales y actividad actual/siguiente por
    /// documento. Lectura pura, sin mutación de estado.
    pub fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<DocumentListItem>> {
        let documents = self.repo.list_documents(filter)?;
        let mut items = Vec::with_capacity(documents.len());
        for document in documents {
            let process_name = self.repo
                                   .get_process(&document.process_id)?
                                   .map(|p| p.name().to_string())
                                   .unwrap_or_default();
            let scans = self.repo.list_scans(&document.id)?;
            let (exec, wait, rest) = totals(&scans);
            let state = self.engine.compute_state(&document.id)?;
            items.push(DocumentListItem { document,
                                          process_name,
                                          current_activity: state.current.map(|c| c.name),
                                          next_activity: state.next.map(|n| n.name),
                                          total_execution_seconds: exec,
                                          total_waiting_seconds: wait,
                                          total_resting_seconds: rest });
        }
        Ok(items)
    }

    /// Purga explícita de un documento y su historial.
    pub fn purge_document(&self, document_id: &Uuid) -> Result<()> {
        if !self.repo.delete_document(document_id)? {
            return Err(TrackError::DocumentNotFound(*document_id));
        }
        log::info!("documento purgado: {}", document_id);
        Ok(())
    }
}

fn totals(scans: &[ActivityScan]) -> (i64, i64, i64) {
    let exec = scans.iter().filter_map(|s| s.duration_seconds).sum();
    let wait = scans.iter().map(|s| s.waiting_seconds).sum();
    let rest = scans.iter().map(|s| s.resting_seconds).sum();
    (exec, wait, rest)
}
