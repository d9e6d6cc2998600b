use chrono::{DateTime, Duration, Utc};
use doc_domain::{Decision, Document, DocumentStatus, Process, ProcessActivity};
use std::sync::Arc;
use tracker::engine::{EngineConfig, WorkflowEngine};
use tracker::stubs::{FixedClock, InMemoryTrackRepository};
use tracker::{Clock, FinishTarget, TrackError, TrackRepository};
use uuid::Uuid;

fn utc(s: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(s).expect("fecha válida").with_timezone(&Utc)
}

struct Fixture {
  repo: Arc<InMemoryTrackRepository>,
  clock: Arc<FixedClock>,
  engine: WorkflowEngine<InMemoryTrackRepository>,
  process: Process,
  acts: Vec<ProcessActivity>,
}

impl Fixture {
  fn new_document(&self) -> Document {
    let mut doc = Document::new(self.process.id(), "Expediente", "Central", "Capital");
    // alta alineada al reloj de prueba para que los huecos sean exactos
    doc.created_at = self.clock.now();
    self.repo.create_document(&doc).unwrap();
    doc
  }
}

// Plantilla secuencial de tres pasos, sin decisiones.
fn three_step_fixture() -> Fixture {
  let repo = Arc::new(InMemoryTrackRepository::new());
  // Martes 2024-01-02 a las 08:00 hora local (UTC+7)
  let clock = Arc::new(FixedClock::new(utc("2024-01-02T08:00:00+07:00")));
  let engine = WorkflowEngine::with_clock(repo.clone(), EngineConfig::default(), clock.clone());
  let process = Process::new("REV", "Revisión de expediente").unwrap();
  let acts = vec![ProcessActivity::step(process.id(), "Registro", 1),
                  ProcessActivity::step(process.id(), "Análisis", 2),
                  ProcessActivity::step(process.id(), "Entrega", 3)];
  repo.create_process(&process, &acts).unwrap();
  Fixture { repo, clock, engine, process, acts }
}

// Plantilla con punto de decisión: aceptar avanza, rechazar repite la
// verificación (bucle de reproceso).
fn decision_fixture(explicit_branches: bool) -> Fixture {
  let repo = Arc::new(InMemoryTrackRepository::new());
  let clock = Arc::new(FixedClock::new(utc("2024-01-02T08:00:00+07:00")));
  let engine = WorkflowEngine::with_clock(repo.clone(), EngineConfig::default(), clock.clone());
  let process = Process::new("VAL", "Validación de documento").unwrap();
  let mut dec = ProcessActivity::step(process.id(), "Verificación", 1).as_decision("Verificación aprobada",
                                                                                  "Verificación rechazada");
  let medicion = ProcessActivity::step(process.id(), "Medición", 2);
  let emision = ProcessActivity::step(process.id(), "Emisión", 3);
  if explicit_branches {
    let dec_id = dec.id;
    dec = dec.with_branches(Some(medicion.id), Some(dec_id));
  }
  let acts = vec![dec, medicion, emision];
  repo.create_process(&process, &acts).unwrap();
  Fixture { repo, clock, engine, process, acts }
}

#[test]
fn end_to_end_three_activities() {
  let fx = three_step_fixture();
  let doc = fx.new_document();

  // Recién registrado: OPEN con la primera actividad como siguiente
  let state = fx.engine.compute_state(&doc.id).unwrap();
  assert_eq!(state.status, DocumentStatus::Open);
  assert_eq!(state.next.as_ref().unwrap().name, "Registro");
  assert!(state.current.is_none());

  let accepted = fx.engine.accept_document(&doc.id).unwrap();
  assert_eq!(accepted.status, DocumentStatus::Waiting);
  assert!(accepted.newly_accepted);

  for expected_next in ["Registro", "Análisis", "Entrega"] {
    let state = fx.engine.compute_state(&doc.id).unwrap();
    assert_eq!(state.status, DocumentStatus::Waiting);
    assert_eq!(state.next.as_ref().unwrap().name, expected_next);

    let started = fx.engine.start_activity(&doc.id, None).unwrap();
    let state = fx.engine.compute_state(&doc.id).unwrap();
    assert_eq!(state.status, DocumentStatus::InProgress);
    assert_eq!(state.current.as_ref().unwrap().name, expected_next);
    assert_eq!(state.current.as_ref().unwrap().scan_id, started.scan_id);
    assert!(state.next.is_none());

    fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None).unwrap();
  }

  // Plantilla agotada: DONE terminal, sin actual ni siguiente
  let state = fx.engine.compute_state(&doc.id).unwrap();
  assert_eq!(state.status, DocumentStatus::Done);
  assert!(state.current.is_none());
  assert!(state.next.is_none());
  assert_eq!(fx.repo.get_document(&doc.id).unwrap().unwrap().status, DocumentStatus::Done);

  let scans = fx.repo.list_scans(&doc.id).unwrap();
  assert_eq!(scans.len(), 3);
  assert!(scans.iter().all(|s| !s.is_open()));
}

#[test]
fn waiting_and_resting_stamped_on_start() {
  let fx = three_step_fixture();
  let doc = fx.new_document();

  // Recepción un martes a las 09:00; inicio a las 10:30 del mismo día
  fx.clock.set(utc("2024-01-02T09:00:00+07:00"));
  fx.engine.accept_document(&doc.id).unwrap();
  fx.clock.set(utc("2024-01-02T10:30:00+07:00"));
  let started = fx.engine.start_activity(&doc.id, None).unwrap();
  assert_eq!(started.waiting_seconds, 5400);
  assert_eq!(started.resting_seconds, 0);

  // Media hora de ejecución
  fx.clock.set(utc("2024-01-02T11:00:00+07:00"));
  let finished = fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None).unwrap();
  assert_eq!(finished.duration_seconds, 1800);
  assert!(!finished.done);

  // El hueco de la segunda actividad se ancla al fin de la primera
  fx.clock.set(utc("2024-01-02T12:00:00+07:00"));
  let started = fx.engine.start_activity(&doc.id, None).unwrap();
  assert_eq!(started.waiting_seconds, 3600);
  assert_eq!(started.resting_seconds, 0);

  let scans = fx.repo.list_scans(&doc.id).unwrap();
  assert_eq!(scans[0].waiting_seconds, 5400);
  assert_eq!(scans[0].duration_seconds, Some(1800));
  assert_eq!(scans[1].waiting_seconds, 3600);
}

#[test]
fn weekend_gap_counts_as_resting() {
  let fx = three_step_fixture();
  let doc = fx.new_document();

  // Recepción el viernes al cierre; inicio el lunes a la apertura
  fx.clock.set(utc("2024-01-05T17:00:00+07:00"));
  fx.engine.accept_document(&doc.id).unwrap();
  fx.clock.set(utc("2024-01-08T08:00:00+07:00"));
  let started = fx.engine.start_activity(&doc.id, None).unwrap();
  assert_eq!(started.waiting_seconds, 0);
  assert_eq!(started.resting_seconds, 63 * 3600);
}

#[test]
fn accept_is_idempotent_and_first_acceptance_wins() {
  let fx = three_step_fixture();
  let doc = fx.new_document();

  fx.clock.set(utc("2024-01-02T09:00:00+07:00"));
  let first = fx.engine.accept_document(&doc.id).unwrap();
  assert!(first.newly_accepted);

  fx.clock.advance(Duration::hours(2));
  let second = fx.engine.accept_document(&doc.id).unwrap();
  assert!(!second.newly_accepted);
  assert_eq!(second.accepted_at, first.accepted_at);

  let stored = fx.repo.get_document(&doc.id).unwrap().unwrap();
  assert_eq!(stored.accepted_at, Some(first.accepted_at));
  // el reintento no escribió nada: una sola transición confirmada
  assert_eq!(stored.version, 1);
}

#[test]
fn accept_rejected_outside_open_or_waiting() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();
  fx.engine.start_activity(&doc.id, None).unwrap();

  assert!(matches!(fx.engine.accept_document(&doc.id), Err(TrackError::InvalidStateTransition(_))));

  fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None).unwrap();
  fx.engine.start_activity(&doc.id, None).unwrap();
  fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None).unwrap();
  fx.engine.start_activity(&doc.id, None).unwrap();
  fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None).unwrap();

  assert!(matches!(fx.engine.accept_document(&doc.id), Err(TrackError::InvalidStateTransition(_))));
}

#[test]
fn start_requires_prior_acceptance() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  assert!(matches!(fx.engine.start_activity(&doc.id, None), Err(TrackError::InvalidStateTransition(_))));
}

#[test]
fn start_out_of_sequence_is_rejected() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();

  let second = fx.acts[1].id;
  match fx.engine.start_activity(&doc.id, Some(second)) {
    Err(TrackError::OutOfSequence { requested, expected }) => {
      assert_eq!(requested, "Análisis");
      assert_eq!(expected, "Registro");
    }
    other => panic!("se esperaba OutOfSequence, se obtuvo {:?}", other.map(|_| ())),
  }

  // La actividad correcta sí puede pedirse de forma explícita
  let first = fx.acts[0].id;
  assert!(fx.engine.start_activity(&doc.id, Some(first)).is_ok());
}

#[test]
fn start_while_in_progress_names_the_open_activity() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();
  let started = fx.engine.start_activity(&doc.id, None).unwrap();

  match fx.engine.start_activity(&doc.id, None) {
    Err(TrackError::ActivityAlreadyInProgress { scan_id, name }) => {
      assert_eq!(scan_id, started.scan_id);
      assert_eq!(name, "Registro");
    }
    other => panic!("se esperaba ActivityAlreadyInProgress, se obtuvo {:?}", other.map(|_| ())),
  }
}

#[test]
fn start_after_done_is_rejected() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();
  for _ in 0..3 {
    fx.engine.start_activity(&doc.id, None).unwrap();
    fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None).unwrap();
  }
  assert!(matches!(fx.engine.start_activity(&doc.id, None), Err(TrackError::ProcessAlreadyDone(id)) if id == doc.id));
}

#[test]
fn finish_without_open_activity_fails() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();

  assert!(matches!(fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None),
                   Err(TrackError::NoActiveActivity(id)) if id == doc.id));
  assert!(matches!(fx.engine.finish_activity(FinishTarget::Scan(Uuid::new_v4()), None, None),
                   Err(TrackError::NoActiveActivity(_))));
}

#[test]
fn finish_twice_reports_already_finished() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();
  let started = fx.engine.start_activity(&doc.id, None).unwrap();
  fx.engine.finish_activity(FinishTarget::Scan(started.scan_id), None, None).unwrap();

  assert!(matches!(fx.engine.finish_activity(FinishTarget::Scan(started.scan_id), None, None),
                   Err(TrackError::ActivityAlreadyFinished(id)) if id == started.scan_id));
}

#[test]
fn unknown_document_is_reported() {
  let fx = three_step_fixture();
  let ghost = Uuid::new_v4();
  assert!(matches!(fx.engine.compute_state(&ghost), Err(TrackError::DocumentNotFound(id)) if id == ghost));
  assert!(matches!(fx.engine.accept_document(&ghost), Err(TrackError::DocumentNotFound(_))));
  assert!(matches!(fx.engine.start_activity(&ghost, None), Err(TrackError::DocumentNotFound(_))));
}

#[test]
fn decision_reject_loops_back_to_itself() {
  let fx = decision_fixture(true);
  let doc = fx.new_document();
  let verificacion = fx.acts[0].id;
  fx.engine.accept_document(&doc.id).unwrap();

  // Primera verificación: rechazada, vuelve a sí misma
  fx.engine.start_activity(&doc.id, None).unwrap();
  let finished = fx.engine
                   .finish_activity(FinishTarget::Document(doc.id), Some(Decision::Reject), None)
                   .unwrap();
  assert!(!finished.done);
  assert_eq!(finished.next_activity_id, Some(verificacion));

  let state = fx.engine.compute_state(&doc.id).unwrap();
  assert_eq!(state.status, DocumentStatus::Waiting);
  assert_eq!(state.next.as_ref().unwrap().id, verificacion);

  // Segunda verificación: aprobada, avanza a Medición
  fx.engine.start_activity(&doc.id, None).unwrap();
  let finished = fx.engine
                   .finish_activity(FinishTarget::Document(doc.id), Some(Decision::Accept), None)
                   .unwrap();
  assert_eq!(finished.next_activity_id, Some(fx.acts[1].id));

  let state = fx.engine.compute_state(&doc.id).unwrap();
  assert_eq!(state.next.as_ref().unwrap().name, "Medición");
}

#[test]
fn decision_requires_a_verdict() {
  let fx = decision_fixture(true);
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();
  fx.engine.start_activity(&doc.id, None).unwrap();

  assert!(matches!(fx.engine.finish_activity(FinishTarget::Document(doc.id), None, None),
                   Err(TrackError::DecisionRequired(name)) if name == "Verificación"));
}

#[test]
fn decision_without_explicit_branches_falls_back_to_order() {
  let fx = decision_fixture(false);
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();
  fx.engine.start_activity(&doc.id, None).unwrap();

  let finished = fx.engine
                   .finish_activity(FinishTarget::Document(doc.id), Some(Decision::Reject), None)
                   .unwrap();
  // sin mapeo explícito la rama cae a la secuencia por order_no
  assert_eq!(finished.next_activity_id, Some(fx.acts[1].id));
}

#[test]
fn decision_override_takes_precedence() {
  let fx = decision_fixture(true);
  let doc = fx.new_document();
  let emision = fx.acts[2].id;
  fx.engine.accept_document(&doc.id).unwrap();
  fx.engine.start_activity(&doc.id, None).unwrap();

  // El destino explícito del llamador manda sobre la rama mapeada
  let finished = fx.engine
                   .finish_activity(FinishTarget::Document(doc.id), Some(Decision::Accept), Some(emision))
                   .unwrap();
  assert_eq!(finished.next_activity_id, Some(emision));

  // Un destino ajeno al proceso se rechaza
  fx.engine.start_activity(&doc.id, None).unwrap();
  assert!(matches!(fx.engine
                     .finish_activity(FinishTarget::Document(doc.id), Some(Decision::Accept), Some(Uuid::new_v4())),
                   Err(TrackError::InvalidStateTransition(_))));
}

#[test]
fn racing_starts_leave_exactly_one_open_scan() {
  let fx = three_step_fixture();
  let doc = fx.new_document();
  fx.engine.accept_document(&doc.id).unwrap();

  // El primer escaneo gana
  fx.engine.start_activity(&doc.id, None).unwrap();

  // Un segundo escaneo que leyó la versión vieja pierde con Conflict
  use doc_domain::ActivityScan;
  use tracker::{PersistResult, Transition};
  let stale = ActivityScan::open(doc.id, Some(fx.acts[0].id), "Registro", fx.clock.now(), 0, 0);
  let res = fx.repo
              .apply_transition(&doc.id, 1, &Transition::Start { scan: stale })
              .unwrap();
  assert_eq!(res, PersistResult::Conflict);

  let open: Vec<_> = fx.repo.list_scans(&doc.id).unwrap().into_iter().filter(|s| s.is_open()).collect();
  assert_eq!(open.len(), 1);
}
