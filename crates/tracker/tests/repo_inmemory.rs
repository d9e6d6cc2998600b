use chrono::Utc;
use doc_domain::{ActivityScan, Document, DocumentStatus, Process, ProcessActivity};
use tracker::stubs::InMemoryTrackRepository;
use tracker::{DocumentFilter, PersistResult, TrackRepository, Transition};
use uuid::Uuid;

fn seeded_document(repo: &InMemoryTrackRepository) -> (Document, Vec<ProcessActivity>) {
  let process = Process::new("REV", "Revisión de expediente").unwrap();
  let acts = vec![ProcessActivity::step(process.id(), "Registro", 1),
                  ProcessActivity::step(process.id(), "Análisis", 2)];
  repo.create_process(&process, &acts).unwrap();
  let doc = Document::new(process.id(), "Expediente", "Central", "Capital");
  repo.create_document(&doc).unwrap();
  (doc, acts)
}

#[test]
fn stale_version_conflicts_without_mutation() {
  let repo = InMemoryTrackRepository::new();
  let (doc, _) = seeded_document(&repo);

  let res = repo.apply_transition(&doc.id, 7, &Transition::Accept { accepted_at: Utc::now() }).unwrap();
  assert_eq!(res, PersistResult::Conflict);

  let stored = repo.get_document(&doc.id).unwrap().unwrap();
  assert_eq!(stored.status, DocumentStatus::Open);
  assert_eq!(stored.accepted_at, None);
  assert_eq!(stored.version, 0);
}

#[test]
fn accept_never_overwrites_accepted_at() {
  let repo = InMemoryTrackRepository::new();
  let (doc, _) = seeded_document(&repo);

  let first = Utc::now();
  let later = first + chrono::Duration::hours(3);
  repo.apply_transition(&doc.id, 0, &Transition::Accept { accepted_at: first }).unwrap();
  repo.apply_transition(&doc.id, 1, &Transition::Accept { accepted_at: later }).unwrap();

  let stored = repo.get_document(&doc.id).unwrap().unwrap();
  assert_eq!(stored.accepted_at, Some(first));
  assert_eq!(stored.version, 2);
}

#[test]
fn second_open_scan_is_refused_even_with_fresh_version() {
  let repo = InMemoryTrackRepository::new();
  let (doc, acts) = seeded_document(&repo);

  let scan = ActivityScan::open(doc.id, Some(acts[0].id), "Registro", Utc::now(), 0, 0);
  let res = repo.apply_transition(&doc.id, 0, &Transition::Start { scan }).unwrap();
  assert!(matches!(res, PersistResult::Ok { new_version: 1 }));

  // Aun leyendo la versión fresca, una segunda fila abierta viola el
  // invariante y se rechaza
  let second = ActivityScan::open(doc.id, Some(acts[1].id), "Análisis", Utc::now(), 0, 0);
  let res = repo.apply_transition(&doc.id, 1, &Transition::Start { scan: second }).unwrap();
  assert_eq!(res, PersistResult::Conflict);

  let open: Vec<_> = repo.list_scans(&doc.id).unwrap().into_iter().filter(|s| s.is_open()).collect();
  assert_eq!(open.len(), 1);
}

#[test]
fn finish_on_closed_scan_conflicts() {
  let repo = InMemoryTrackRepository::new();
  let (doc, acts) = seeded_document(&repo);

  let scan = ActivityScan::open(doc.id, Some(acts[0].id), "Registro", Utc::now(), 0, 0);
  let scan_id = scan.id;
  repo.apply_transition(&doc.id, 0, &Transition::Start { scan }).unwrap();
  let finish = Transition::Finish { scan_id,
                                    end_time: Utc::now(),
                                    duration_seconds: 60,
                                    next_activity_id: Some(acts[1].id),
                                    new_status: DocumentStatus::Waiting };
  repo.apply_transition(&doc.id, 1, &finish).unwrap();

  // La fila ya es inmutable: un segundo finish no encuentra fila abierta
  let res = repo.apply_transition(&doc.id, 2, &finish).unwrap();
  assert_eq!(res, PersistResult::Conflict);

  let stored = repo.get_scan(&scan_id).unwrap().unwrap();
  assert_eq!(stored.duration_seconds, Some(60));
  assert_eq!(stored.next_activity_id, Some(acts[1].id));
}

#[test]
fn missing_document_conflicts() {
  let repo = InMemoryTrackRepository::new();
  let res = repo.apply_transition(&Uuid::new_v4(), 0, &Transition::Accept { accepted_at: Utc::now() }).unwrap();
  assert_eq!(res, PersistResult::Conflict);
}

#[test]
fn delete_document_cascades_to_scans() {
  let repo = InMemoryTrackRepository::new();
  let (doc, acts) = seeded_document(&repo);
  let scan = ActivityScan::open(doc.id, Some(acts[0].id), "Registro", Utc::now(), 0, 0);
  repo.apply_transition(&doc.id, 0, &Transition::Start { scan }).unwrap();
  assert_eq!(repo.list_scans(&doc.id).unwrap().len(), 1);

  assert!(repo.delete_document(&doc.id).unwrap());
  assert!(repo.get_document(&doc.id).unwrap().is_none());
  assert!(repo.list_scans(&doc.id).unwrap().is_empty());
  // borrar dos veces reporta inexistente
  assert!(!repo.delete_document(&doc.id).unwrap());
}

#[test]
fn list_documents_filters_by_status_and_query() {
  let repo = InMemoryTrackRepository::new();
  let process = Process::new("REV", "Revisión de expediente").unwrap();
  repo.create_process(&process, &[ProcessActivity::step(process.id(), "Registro", 1)]).unwrap();

  let mut a = Document::new(process.id(), "Escritura", "Central", "Capital");
  a.status = DocumentStatus::Waiting;
  let b = Document::new(process.id(), "Hipoteca", "Regional", "Norte");
  repo.create_document(&a).unwrap();
  repo.create_document(&b).unwrap();

  let waiting = repo.list_documents(&DocumentFilter { status: Some(DocumentStatus::Waiting),
                                                      ..Default::default() })
                    .unwrap();
  assert_eq!(waiting.len(), 1);
  assert_eq!(waiting[0].id, a.id);

  let by_text = repo.list_documents(&DocumentFilter { query: Some("hipo".into()), ..Default::default() }).unwrap();
  assert_eq!(by_text.len(), 1);
  assert_eq!(by_text[0].id, b.id);

  let paged = repo.list_documents(&DocumentFilter { limit: 1, ..Default::default() }).unwrap();
  assert_eq!(paged.len(), 1);
}
