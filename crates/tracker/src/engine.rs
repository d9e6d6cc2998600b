// Archivo: engine.rs
// Propósito: implementar `WorkflowEngine`, el núcleo que deriva el estado de
// un documento desde su historial y valida/aplica las transiciones
// accept/start/finish contra el repositorio.
use crate::domain::{AcceptOutcome, CurrentActivity, DerivedState, FinishOutcome, FinishTarget, PersistResult,
                    StartOutcome, Transition};
use crate::errors::{Result, TrackError};
use crate::repository::TrackRepository;
use chrono::{DateTime, Utc};
use doc_domain::{ActivityScan, BusinessCalendar, Decision, Document, DocumentStatus, ProcessActivity, ProcessTemplate};
use std::sync::Arc;
use uuid::Uuid;

/// Reloj inyectable: el motor nunca llama a la hora del sistema
/// directamente, así las pruebas controlan los instantes.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reloj de producción.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Configuración del motor. El calendario define qué parte de cada hueco
/// cuenta como espera imputable y qué parte como reposo.
pub struct EngineConfig {
    pub calendar: BusinessCalendar,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { calendar: BusinessCalendar::default() }
    }
}

/// Motor de flujo documental.
///
/// Responsabilidades:
/// - Derivar el estado actual y la siguiente actividad permitida a partir
///   del historial de escaneos más la plantilla del proceso.
/// - Validar precondiciones y aplicar las transiciones accept/start/finish
///   a través de `TrackRepository::apply_transition` (atómica, con versión
///   esperada).
/// - Repartir cada hueco entre actividades en espera/reposo con el
///   calendario de horas hábiles.
///
/// El motor no guarda estado propio: todo vive en el repositorio inyectado,
/// así que varias instancias sobre el mismo almacén son equivalentes.
pub struct WorkflowEngine<R>
    where R: TrackRepository
{
    repo: Arc<R>,
    calendar: BusinessCalendar,
    clock: Arc<dyn Clock>,
}

impl<R> WorkflowEngine<R> where R: TrackRepository
{
    pub fn new(repo: Arc<R>, config: EngineConfig) -> Self {
        Self::with_clock(repo, config, Arc::new(SystemClock))
    }

    /// Variante con reloj explícito, pensada para pruebas.
    pub fn with_clock(repo: Arc<R>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self { repo, calendar: config.calendar, clock }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Instante actual según el reloj inyectado.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Carga y valida la plantilla del proceso. Un defecto estructural aquí
    /// se reporta como `TemplateInconsistency`: es configuración rota, no un
    /// problema del documento.
    fn load_template(&self, process_id: &Uuid) -> Result<ProcessTemplate> {
        let process = self.repo
                          .get_process(process_id)?
                          .ok_or_else(|| TrackError::ProcessNotFound(process_id.to_string()))?;
        let activities = self.repo.list_activities(process_id)?;
        ProcessTemplate::new(process, activities).map_err(|e| TrackError::TemplateInconsistency(e.to_string()))
    }

    fn get_document(&self, document_id: &Uuid) -> Result<Document> {
        self.repo
            .get_document(document_id)?
            .ok_or(TrackError::DocumentNotFound(*document_id))
    }

    /// Resuelve la siguiente actividad según la última fila finalizada:
    /// primero el destino registrado (resultado de una decisión), si no la
    /// actividad con el menor `order_no` mayor al de la finalizada. Sin
    /// historial, la primera de la plantilla.
    fn resolve_next<'t>(&self,
                        template: &'t ProcessTemplate,
                        last: Option<&ActivityScan>)
                        -> Result<Option<&'t ProcessActivity>> {
        let Some(last) = last else {
            return Ok(template.first());
        };
        if let Some(next_id) = last.next_activity_id {
            let act = template.by_id(&next_id).ok_or_else(|| {
                          TrackError::TemplateInconsistency(format!(
                    "El destino registrado {} no existe en el proceso {}",
                    next_id,
                    template.process().code()
                ))
                      })?;
            return Ok(Some(act));
        }
        // Sin destino registrado: secuencia por defecto desde la actividad
        // de plantilla de la fila finalizada. Una actividad ad hoc no
        // participa de la secuencia.
        Ok(last.process_activity_id
               .and_then(|id| template.by_id(&id))
               .and_then(|act| template.next_after(act.order_no)))
    }

    fn current_from_scan(&self, template: &ProcessTemplate, open: &ActivityScan) -> CurrentActivity {
        let tpl_act = open.process_activity_id.and_then(|id| template.by_id(&id));
        CurrentActivity { scan_id: open.id,
                          activity_id: open.process_activity_id,
                          name: open.activity_name.clone(),
                          is_decision: tpl_act.map(|a| a.is_decision).unwrap_or(false),
                          decision_accept_label: tpl_act.and_then(|a| a.decision_accept_label.clone()),
                          decision_reject_label: tpl_act.and_then(|a| a.decision_reject_label.clone()),
                          started_at: open.start_time }
    }

    /// Deriva el estado de un documento.
    ///
    /// Orden de resolución:
    /// 1. DONE es terminal: sin actividad actual ni siguiente.
    /// 2. Una fila abierta ⇒ IN_PROGRESS con esa actividad como actual.
    /// 3. Si no, se resuelve la siguiente desde la última finalizada (o la
    ///    primera de la plantilla); sin siguiente ⇒ DONE.
    /// 4. Si hay siguiente: OPEN si el documento aún no fue recibido,
    ///    WAITING en otro caso, con el hueco ancla→ahora ya repartido.
    pub fn compute_state(&self, document_id: &Uuid) -> Result<DerivedState> {
        let doc = self.get_document(document_id)?;
        if doc.status == DocumentStatus::Done {
            return Ok(DerivedState { status: DocumentStatus::Done,
                                     current: None,
                                     next: None,
                                     waiting_now: 0,
                                     resting_now: 0 });
        }

        let template = self.load_template(&doc.process_id)?;

        if let Some(open) = self.repo.find_open_scan(&doc.id)? {
            return Ok(DerivedState { status: DocumentStatus::InProgress,
                                     current: Some(self.current_from_scan(&template, &open)),
                                     next: None,
                                     waiting_now: 0,
                                     resting_now: 0 });
        }

        let last = self.repo.find_last_finished_scan(&doc.id)?;
        let Some(next) = self.resolve_next(&template, last.as_ref())? else {
            return Ok(DerivedState { status: DocumentStatus::Done,
                                     current: None,
                                     next: None,
                                     waiting_now: 0,
                                     resting_now: 0 });
        };

        let anchor = self.gap_anchor(&doc, last.as_ref());
        let gap = self.calendar.split(anchor, self.clock.now());
        let status = if doc.status == DocumentStatus::Open { DocumentStatus::Open } else { DocumentStatus::Waiting };
        Ok(DerivedState { status,
                          current: None,
                          next: Some(next.clone()),
                          waiting_now: gap.waiting_seconds,
                          resting_now: gap.resting_seconds })
    }

    // Ancla del hueco: fin de la última actividad finalizada, si no la
    // recepción formal, si no el alta del documento.
    fn gap_anchor(&self, doc: &Document, last: Option<&ActivityScan>) -> DateTime<Utc> {
        match last.and_then(|s| s.end_time) {
            Some(end) => end,
            None => doc.gap_anchor(),
        }
    }

    /// Recepción formal del documento físico. No crea filas de escaneo.
    ///
    /// - Desde OPEN: estampa `accepted_at` (la primera aceptación gana) y
    ///   pasa a WAITING.
    /// - Desde WAITING: reintento idempotente, no escribe nada.
    /// - Desde IN_PROGRESS o DONE: `InvalidStateTransition`.
    pub fn accept_document(&self, document_id: &Uuid) -> Result<AcceptOutcome> {
        let doc = self.get_document(document_id)?;
        match doc.status {
            DocumentStatus::Open => {}
            DocumentStatus::Waiting => {
                // Ya recibido; accepted_at quedó fijado por la primera
                // aceptación.
                let accepted_at = doc.accepted_at.unwrap_or(doc.created_at);
                return Ok(AcceptOutcome { status: DocumentStatus::Waiting, accepted_at, newly_accepted: false });
            }
            DocumentStatus::InProgress => {
                return Err(TrackError::InvalidStateTransition(format!(
                    "El documento {} tiene una actividad en curso; no se puede volver a recibir",
                    doc.id
                )));
            }
            DocumentStatus::Done => {
                return Err(TrackError::InvalidStateTransition(format!("El documento {} ya terminó su proceso", doc.id)));
            }
        }

        let accepted_at = self.clock.now();
        let transition = Transition::Accept { accepted_at };
        match self.repo.apply_transition(&doc.id, doc.version, &transition)? {
            PersistResult::Ok { .. } => {
                Ok(AcceptOutcome { status: DocumentStatus::Waiting, accepted_at, newly_accepted: true })
            }
            PersistResult::Conflict => {
                // Carrera entre dos recepciones: el perdedor relee y, si el
                // ganador dejó el documento en WAITING, responde idempotente.
                let fresh = self.get_document(document_id)?;
                if fresh.status == DocumentStatus::Waiting {
                    let accepted_at = fresh.accepted_at.unwrap_or(fresh.created_at);
                    Ok(AcceptOutcome { status: DocumentStatus::Waiting, accepted_at, newly_accepted: false })
                } else {
                    Err(TrackError::Conflict(format!("Transición concurrente sobre el documento {}", doc.id)))
                }
            }
        }
    }

    /// Inicia la siguiente actividad del documento.
    ///
    /// Input:
    /// - `requested`: actividad pedida por el cliente; debe coincidir con la
    ///   resuelta por el motor (validación estricta de secuencia). `None`
    ///   usa la resuelta.
    ///
    /// Output: id de la nueva fila, instante de inicio y el hueco previo ya
    /// repartido en espera/reposo.
    pub fn start_activity(&self, document_id: &Uuid, requested: Option<Uuid>) -> Result<StartOutcome> {
        let doc = self.get_document(document_id)?;
        if doc.status == DocumentStatus::Done {
            return Err(TrackError::ProcessAlreadyDone(doc.id));
        }
        if let Some(open) = self.repo.find_open_scan(&doc.id)? {
            return Err(TrackError::ActivityAlreadyInProgress { scan_id: open.id, name: open.activity_name });
        }
        if doc.status == DocumentStatus::Open {
            return Err(TrackError::InvalidStateTransition(format!(
                "El documento {} aún no fue recibido; acéptelo antes de iniciar actividades",
                doc.id
            )));
        }

        let template = self.load_template(&doc.process_id)?;
        let last = self.repo.find_last_finished_scan(&doc.id)?;
        let next = self.resolve_next(&template, last.as_ref())?
                       .ok_or(TrackError::ProcessAlreadyDone(doc.id))?;

        if let Some(req) = requested {
            if req != next.id {
                let requested_name = template.by_id(&req).map(|a| a.name.clone()).unwrap_or_else(|| req.to_string());
                return Err(TrackError::OutOfSequence { requested: requested_name, expected: next.name.clone() });
            }
        }

        let now = self.clock.now();
        let anchor = self.gap_anchor(&doc, last.as_ref());
        let gap = self.calendar.split(anchor, now);
        log::debug!("start_activity doc={} act='{}' anchor={} waiting={} resting={}",
                    doc.id,
                    next.name,
                    anchor,
                    gap.waiting_seconds,
                    gap.resting_seconds);

        let scan = ActivityScan::open(doc.id, Some(next.id), &next.name, now, gap.waiting_seconds, gap.resting_seconds);
        let outcome = StartOutcome { scan_id: scan.id,
                                     start_time: now,
                                     waiting_seconds: gap.waiting_seconds,
                                     resting_seconds: gap.resting_seconds };

        match self.repo.apply_transition(&doc.id, doc.version, &Transition::Start { scan })? {
            PersistResult::Ok { .. } => Ok(outcome),
            PersistResult::Conflict => {
                // Dos escaneos del mismo QR compitiendo: exactamente uno
                // gana; el otro recibe el error tipado tras releer.
                if let Some(open) = self.repo.find_open_scan(&doc.id)? {
                    Err(TrackError::ActivityAlreadyInProgress { scan_id: open.id, name: open.activity_name })
                } else {
                    Err(TrackError::Conflict(format!("Transición concurrente sobre el documento {}", doc.id)))
                }
            }
        }
    }

    /// Finaliza la actividad abierta.
    ///
    /// Resolución del destino:
    /// - Punto de decisión: un override explícito del llamador (validado
    ///   contra la plantilla) tiene prioridad; si no, la rama mapeada por la
    ///   decisión; una rama sin mapeo explícito cae a la secuencia por
    ///   `order_no`. Sin decisión ni override ⇒ `DecisionRequired`.
    /// - Actividad normal: la siguiente por `order_no`; un override se
    ///   ignora.
    ///
    /// Sin destino resoluble el documento pasa a DONE, si no a WAITING.
    pub fn finish_activity(&self,
                           target: FinishTarget,
                           decision: Option<Decision>,
                           next_override: Option<Uuid>)
                           -> Result<FinishOutcome> {
        let scan = self.resolve_finish_target(target)?;
        let doc = self.get_document(&scan.document_id)?;
        let template = self.load_template(&doc.process_id)?;
        let tpl_act = scan.process_activity_id.and_then(|id| template.by_id(&id));

        let now = self.clock.now();
        let duration = (now - scan.start_time).num_seconds().max(0);

        let next_id = self.resolve_finish_next(&template, tpl_act, decision, next_override)?;
        let new_status = if next_id.is_some() { DocumentStatus::Waiting } else { DocumentStatus::Done };
        log::debug!("finish_activity doc={} scan={} duration={} next={:?} status={}",
                    doc.id,
                    scan.id,
                    duration,
                    next_id,
                    new_status);

        let transition = Transition::Finish { scan_id: scan.id,
                                              end_time: now,
                                              duration_seconds: duration,
                                              next_activity_id: next_id,
                                              new_status };
        match self.repo.apply_transition(&doc.id, doc.version, &transition)? {
            PersistResult::Ok { .. } => Ok(FinishOutcome { scan_id: scan.id,
                                                           end_time: now,
                                                           duration_seconds: duration,
                                                           done: next_id.is_none(),
                                                           next_activity_id: next_id }),
            PersistResult::Conflict => {
                let fresh = self.repo.get_scan(&scan.id)?;
                match fresh {
                    Some(s) if !s.is_open() => Err(TrackError::ActivityAlreadyFinished(s.id)),
                    _ => Err(TrackError::Conflict(format!("Transición concurrente sobre el documento {}", doc.id))),
                }
            }
        }
    }

    fn resolve_finish_target(&self, target: FinishTarget) -> Result<ActivityScan> {
        match target {
            FinishTarget::Scan(scan_id) => {
                let scan = self.repo.get_scan(&scan_id)?.ok_or(TrackError::NoActiveActivity(scan_id))?;
                if !scan.is_open() {
                    return Err(TrackError::ActivityAlreadyFinished(scan.id));
                }
                Ok(scan)
            }
            FinishTarget::Document(document_id) => {
                // Validar que el documento exista da un error más preciso
                // que "sin actividad activa".
                let doc = self.get_document(&document_id)?;
                self.repo.find_open_scan(&doc.id)?.ok_or(TrackError::NoActiveActivity(document_id))
            }
        }
    }

    fn resolve_finish_next(&self,
                           template: &ProcessTemplate,
                           tpl_act: Option<&ProcessActivity>,
                           decision: Option<Decision>,
                           next_override: Option<Uuid>)
                           -> Result<Option<Uuid>> {
        let Some(act) = tpl_act else {
            // Actividad ad hoc: no participa de la plantilla, no hay
            // destino que resolver.
            return Ok(None);
        };

        if act.is_decision {
            if let Some(over) = next_override {
                if !template.contains(&over) {
                    return Err(TrackError::InvalidStateTransition(format!(
                        "La actividad indicada como destino ({}) no pertenece al proceso {}",
                        over,
                        template.process().code()
                    )));
                }
                return Ok(Some(over));
            }
            let branch = match decision {
                Some(Decision::Accept) => act.next_on_accept,
                Some(Decision::Reject) => act.next_on_reject,
                None => return Err(TrackError::DecisionRequired(act.name.clone())),
            };
            // Rama sin mapeo explícito: secuencia por defecto por order_no.
            return Ok(branch.or_else(|| template.next_after(act.order_no).map(|a| a.id)));
        }

        Ok(template.next_after(act.order_no).map(|a| a.id))
    }
}
