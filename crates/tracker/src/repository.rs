// Archivo: repository.rs
// Propósito: definir el trait `TrackRepository`, el contrato que deben
// implementar las persistencias (Diesel/SQLite/Postgres, in-memory, etc.).
// Es una única interfaz bien tipada: no hay resolución defensiva de
// adaptadores ni formas de export alternativas.
use crate::domain::{DocumentFilter, PersistResult, Transition};
use crate::errors::Result;
use doc_domain::{ActivityScan, Admin, Document, Process, ProcessActivity};
use uuid::Uuid;

/// Contrato de almacenamiento del seguimiento documental.
///
/// Todo el estado vive en el almacén persistente; los handlers que invocan
/// al motor son independientes y sin estado compartido en proceso, así que
/// la corrección bajo concurrencia se reduce a que `apply_transition` sea
/// atómica y verifique la versión esperada del documento.
pub trait TrackRepository: Send + Sync {
    /// Obtiene un documento por id.
    fn get_document(&self, id: &Uuid) -> Result<Option<Document>>;

    /// Alta administrativa de un documento (estado inicial OPEN).
    fn create_document(&self, document: &Document) -> Result<()>;

    /// Listado administrativo con filtro por estado y texto libre.
    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;

    /// Purga explícita: borra el documento y, en cascada, sus escaneos.
    /// Devuelve `false` si el documento no existía.
    fn delete_document(&self, id: &Uuid) -> Result<bool>;

    /// Obtiene un proceso por id.
    fn get_process(&self, id: &Uuid) -> Result<Option<Process>>;

    /// Busca un proceso por código o por nombre exactos.
    fn find_process(&self, code_or_name: &str) -> Result<Option<Process>>;

    fn list_processes(&self) -> Result<Vec<Process>>;

    /// Inserta un proceso con sus actividades. La plantilla es inmutable
    /// una vez en uso; no hay operación de modificación.
    fn create_process(&self, process: &Process, activities: &[ProcessActivity]) -> Result<()>;

    /// Actividades de un proceso ordenadas por `order_no` ascendente.
    fn list_activities(&self, process_id: &Uuid) -> Result<Vec<ProcessActivity>>;

    /// La fila de escaneo abierta del documento, si existe. Por el
    /// invariante del sistema hay a lo sumo una.
    fn find_open_scan(&self, document_id: &Uuid) -> Result<Option<ActivityScan>>;

    /// La fila finalizada más reciente (mayor `end_time`).
    fn find_last_finished_scan(&self, document_id: &Uuid) -> Result<Option<ActivityScan>>;

    fn get_scan(&self, id: &Uuid) -> Result<Option<ActivityScan>>;

    /// Historial completo del documento ordenado por `start_time`.
    fn list_scans(&self, document_id: &Uuid) -> Result<Vec<ActivityScan>>;

    /// Búsqueda simple de administrador; no es una frontera de seguridad.
    fn get_admin(&self, admin_id: &str) -> Result<Option<Admin>>;

    fn upsert_admin(&self, admin: &Admin) -> Result<()>;

    /// Aplica una transición sobre el documento con bloqueo optimista.
    ///
    /// Debe ejecutarse de forma atómica por el repositorio concreto: o se
    /// confirman todas las escrituras (documento + escaneo) y la versión
    /// avanza en uno, o no se confirma ninguna. `expected_version` distinta
    /// de la actual, o una precondición de la transición violada (segunda
    /// fila abierta, fila ya finalizada), devuelven `Conflict` sin mutar.
    fn apply_transition(&self, document_id: &Uuid, expected_version: i64, transition: &Transition)
                        -> Result<PersistResult>;
}
