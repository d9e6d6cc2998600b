// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye el repositorio en memoria (`InMemoryTrackRepository`) y un reloj
// fijo (`FixedClock`) para controlar los instantes en las pruebas. Estas
// implementaciones no son durables.
use crate::domain::{DocumentFilter, PersistResult, Transition};
use crate::engine::Clock;
use crate::errors::{Result, TrackError};
use crate::repository::TrackRepository;
use chrono::{DateTime, Duration, Utc};
use doc_domain::{ActivityScan, Admin, Document, Process, ProcessActivity};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Reloj controlable para pruebas: siempre devuelve el instante fijado.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Fija el instante actual.
    pub fn set(&self, t: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = t;
    }

    /// Avanza el reloj la duración dada.
    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += d;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// Minimal in-memory repository for wiring examples and tests (not durable)
pub struct InMemoryTrackRepository {
    /// Documentos indexados por id.
    documents: Mutex<HashMap<Uuid, Document>>,
    /// Procesos indexados por id.
    processes: Mutex<HashMap<Uuid, Process>>,
    /// Actividades de plantilla por proceso.
    activities: Mutex<HashMap<Uuid, Vec<ProcessActivity>>>,
    /// Historial de escaneos por documento.
    scans: Mutex<HashMap<Uuid, Vec<ActivityScan>>>,
    /// Administradores por id.
    admins: Mutex<HashMap<String, Admin>>,
}

impl InMemoryTrackRepository {
    pub fn new() -> Self {
        Self { documents: Mutex::new(HashMap::new()),
               processes: Mutex::new(HashMap::new()),
               activities: Mutex::new(HashMap::new()),
               scans: Mutex::new(HashMap::new()),
               admins: Mutex::new(HashMap::new()) }
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `TrackError::Storage`.
    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> std::result::Result<MutexGuard<'a, T>, TrackError> {
        m.lock().map_err(|e| TrackError::Storage(format!("mutex poisoned: {:?}", e)))
    }
}

impl Default for InMemoryTrackRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackRepository for InMemoryTrackRepository {
    fn get_document(&self, id: &Uuid) -> Result<Option<Document>> {
        let docs = self.lock(&self.documents)?;
        Ok(docs.get(id).cloned())
    }

    fn create_document(&self, document: &Document) -> Result<()> {
        let mut docs = self.lock(&self.documents)?;
        docs.insert(document.id, document.clone());
        Ok(())
    }

    /// Listado con filtro por estado y texto libre, ordenado por alta
    /// descendente.
    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let docs = self.lock(&self.documents)?;
        let needle = filter.query.as_ref().map(|q| q.to_lowercase());
        let mut out: Vec<Document> =
            docs.values()
                .filter(|d| filter.status.map(|st| d.status == st).unwrap_or(true))
                .filter(|d| match &needle {
                    Some(q) => {
                        d.id.to_string().to_lowercase().contains(q)
                        || d.doc_type.to_lowercase().contains(q)
                        || d.region.to_lowercase().contains(q)
                    }
                    None => true,
                })
                .cloned()
                .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out.into_iter()
              .skip(filter.offset.max(0) as usize)
              .take(filter.limit.max(0) as usize)
              .collect())
    }

    fn delete_document(&self, id: &Uuid) -> Result<bool> {
        let mut docs = self.lock(&self.documents)?;
        let existed = docs.remove(id).is_some();
        if existed {
            // cascade: el historial del documento se va con él
            self.lock(&self.scans)?.remove(id);
        }
        Ok(existed)
    }

    fn get_process(&self, id: &Uuid) -> Result<Option<Process>> {
        let procs = self.lock(&self.processes)?;
        Ok(procs.get(id).cloned())
    }

    fn find_process(&self, code_or_name: &str) -> Result<Option<Process>> {
        let procs = self.lock(&self.processes)?;
        Ok(procs.values()
                .find(|p| p.code() == code_or_name || p.name() == code_or_name)
                .cloned())
    }

    fn list_processes(&self) -> Result<Vec<Process>> {
        let procs = self.lock(&self.processes)?;
        let mut out: Vec<Process> = procs.values().cloned().collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(out)
    }

    fn create_process(&self, process: &Process, activities: &[ProcessActivity]) -> Result<()> {
        self.lock(&self.processes)?.insert(process.id(), process.clone());
        self.lock(&self.activities)?.insert(process.id(), activities.to_vec());
        Ok(())
    }

    fn list_activities(&self, process_id: &Uuid) -> Result<Vec<ProcessActivity>> {
        let acts = self.lock(&self.activities)?;
        let mut out = acts.get(process_id).cloned().unwrap_or_default();
        out.sort_by_key(|a| a.order_no);
        Ok(out)
    }

    fn find_open_scan(&self, document_id: &Uuid) -> Result<Option<ActivityScan>> {
        let scans = self.lock(&self.scans)?;
        Ok(scans.get(document_id)
                .and_then(|list| list.iter().find(|s| s.is_open()))
                .cloned())
    }

    fn find_last_finished_scan(&self, document_id: &Uuid) -> Result<Option<ActivityScan>> {
        let scans = self.lock(&self.scans)?;
        Ok(scans.get(document_id)
                .and_then(|list| {
                    list.iter()
                        .filter(|s| s.end_time.is_some())
                        .max_by_key(|s| (s.end_time, s.start_time))
                })
                .cloned())
    }

    fn get_scan(&self, id: &Uuid) -> Result<Option<ActivityScan>> {
        let scans = self.lock(&self.scans)?;
        Ok(scans.values().flatten().find(|s| &s.id == id).cloned())
    }

    fn list_scans(&self, document_id: &Uuid) -> Result<Vec<ActivityScan>> {
        let scans = self.lock(&self.scans)?;
        let mut out = scans.get(document_id).cloned().unwrap_or_default();
        out.sort_by_key(|s| s.start_time);
        Ok(out)
    }

    fn get_admin(&self, admin_id: &str) -> Result<Option<Admin>> {
        let admins = self.lock(&self.admins)?;
        Ok(admins.get(admin_id).cloned())
    }

    fn upsert_admin(&self, admin: &Admin) -> Result<()> {
        self.lock(&self.admins)?.insert(admin.admin_id.clone(), admin.clone());
        Ok(())
    }

    /// Aplica la transición bajo un único tramo crítico (ambos mapas
    /// bloqueados): el equivalente en memoria de la transacción del
    /// repositorio durable.
    fn apply_transition(&self, document_id: &Uuid, expected_version: i64, transition: &Transition)
                        -> Result<PersistResult> {
        let mut docs = self.lock(&self.documents)?;
        let mut scans = self.lock(&self.scans)?;

        let Some(doc) = docs.get_mut(document_id) else {
            // Documento purgado en paralelo: el llamador relee y obtiene el
            // error preciso.
            return Ok(PersistResult::Conflict);
        };
        // Optimistic concurrency: check expected_version
        if doc.version != expected_version {
            return Ok(PersistResult::Conflict);
        }

        match transition {
            Transition::Accept { accepted_at } => {
                // La primera aceptación gana; nunca se sobreescribe.
                if doc.accepted_at.is_none() {
                    doc.accepted_at = Some(*accepted_at);
                }
                doc.status = doc_domain::DocumentStatus::Waiting;
            }
            Transition::Start { scan } => {
                if scan.document_id != *document_id {
                    return Err(TrackError::Storage("el escaneo no corresponde al documento".to_string()));
                }
                let list = scans.entry(*document_id).or_default();
                // Invariante: a lo sumo una fila abierta por documento.
                if list.iter().any(|s| s.is_open()) {
                    return Ok(PersistResult::Conflict);
                }
                list.push(scan.clone());
                doc.status = doc_domain::DocumentStatus::InProgress;
            }
            Transition::Finish { scan_id,
                                 end_time,
                                 duration_seconds,
                                 next_activity_id,
                                 new_status } => {
                let list = scans.entry(*document_id).or_default();
                let Some(row) = list.iter_mut().find(|s| &s.id == scan_id) else {
                    return Ok(PersistResult::Conflict);
                };
                if !row.is_open() {
                    // La fila ya es inmutable.
                    return Ok(PersistResult::Conflict);
                }
                row.end_time = Some(*end_time);
                row.duration_seconds = Some(*duration_seconds);
                row.next_activity_id = *next_activity_id;
                doc.status = *new_status;
            }
        }

        doc.version = doc.version.saturating_add(1);
        Ok(PersistResult::Ok { new_version: doc.version })
    }
}
