use crate::schema;
use crate::schema::activity_scans::dsl as scan_dsl;
use crate::schema::admins::dsl as admin_dsl;
use crate::schema::documents::dsl as doc_dsl;
use crate::schema::process_activities::dsl as act_dsl;
use crate::schema::processes::dsl as proc_dsl;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use doc_domain::{ActivityScan, Admin, Document, DocumentStatus, Process, ProcessActivity};
use std::sync::Arc;
use tracker::{DocumentFilter, PersistResult, Result, TrackError, TrackRepository, Transition};
use uuid::Uuid;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(all(feature = "pg", not(test)))]
type DbPool = Pool<ConnectionManager<PgConnection>>;
#[cfg(any(test, not(feature = "pg")))]
type DbPool = Pool<ConnectionManager<SqliteConnection>>;
#[cfg(all(feature = "pg", not(test)))]
type DbConn = PgConnection;
#[cfg(any(test, not(feature = "pg")))]
type DbConn = SqliteConnection;

/// Repo Diesel que implementa `TrackRepository`.
pub struct DieselTrackRepository {
  pool: Arc<DbPool>,
}

impl DieselTrackRepository {
  pub fn new(database_url: &str) -> Self {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let pool = Pool::builder().max_size(4).build(manager).expect("no se pudo crear el pool de conexiones");
    let repo = DieselTrackRepository { pool: Arc::new(pool) };
    if let Ok(mut c) = repo.conn_raw() {
      // Pragmas de SQLite; sobre Postgres fallan y se ignoran.
      let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut c);
      let _ = diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(&mut c);
      let _ = c.run_pending_migrations(MIGRATIONS);
    }
    repo
  }

  fn conn_raw(&self) -> std::result::Result<PooledConnection<ConnectionManager<DbConn>>, r2d2::Error> {
    self.pool.get()
  }

  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>> {
    self.conn_raw().map_err(|e| TrackError::Storage(format!("pool: {}", e)))
  }
}

// Diesel row structs for the tracking tables
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::processes)]
struct ProcessRow {
  pub id: String,
  pub code: String,
  pub name: String,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::process_activities)]
struct ActivityRow {
  pub id: String,
  pub process_id: String,
  pub name: String,
  pub order_no: i32,
  pub is_mandatory: bool,
  pub is_decision: bool,
  pub decision_accept_label: Option<String>,
  pub decision_reject_label: Option<String>,
  pub next_on_accept: Option<String>,
  pub next_on_reject: Option<String>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::documents)]
struct DocumentRow {
  pub id: String,
  pub process_id: String,
  pub doc_type: String,
  pub office_type: String,
  pub region: String,
  pub status: String,
  pub accepted_at_ts: Option<i64>,
  pub created_at_ts: i64,
  pub version: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::activity_scans)]
struct ScanRow {
  pub id: String,
  pub document_id: String,
  pub process_activity_id: Option<String>,
  pub activity_name: String,
  pub start_time_ts: i64,
  pub end_time_ts: Option<i64>,
  pub duration_seconds: Option<i64>,
  pub waiting_seconds: i64,
  pub resting_seconds: i64,
  pub next_activity_id: Option<String>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::admins)]
struct AdminRow {
  pub admin_id: String,
  pub name: String,
  pub office_type: String,
  pub region: String,
}

fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
  res.map_err(|e| TrackError::Storage(format!("db: {}", e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| TrackError::Storage(format!("uuid inválido '{}': {}", s, e)))
}

fn ts_to_utc(ts: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp(ts, 0).ok_or_else(|| TrackError::Storage(format!("timestamp fuera de rango: {}", ts)))
}

fn document_from_row(r: DocumentRow) -> Result<Document> {
  Ok(Document { id: parse_uuid(&r.id)?,
                process_id: parse_uuid(&r.process_id)?,
                doc_type: r.doc_type,
                office_type: r.office_type,
                region: r.region,
                status: DocumentStatus::parse(&r.status).map_err(|e| TrackError::Storage(e.to_string()))?,
                accepted_at: r.accepted_at_ts.map(ts_to_utc).transpose()?,
                created_at: ts_to_utc(r.created_at_ts)?,
                version: r.version })
}

fn document_to_row(d: &Document) -> DocumentRow {
  DocumentRow { id: d.id.to_string(),
                process_id: d.process_id.to_string(),
                doc_type: d.doc_type.clone(),
                office_type: d.office_type.clone(),
                region: d.region.clone(),
                status: d.status.as_str().to_string(),
                accepted_at_ts: d.accepted_at.map(|t| t.timestamp()),
                created_at_ts: d.created_at.timestamp(),
                version: d.version }
}

fn activity_from_row(r: ActivityRow) -> Result<ProcessActivity> {
  Ok(ProcessActivity { id: parse_uuid(&r.id)?,
                       process_id: parse_uuid(&r.process_id)?,
                       name: r.name,
                       order_no: r.order_no,
                       is_mandatory: r.is_mandatory,
                       is_decision: r.is_decision,
                       decision_accept_label: r.decision_accept_label,
                       decision_reject_label: r.decision_reject_label,
                       next_on_accept: r.next_on_accept.as_deref().map(parse_uuid).transpose()?,
                       next_on_reject: r.next_on_reject.as_deref().map(parse_uuid).transpose()? })
}

fn activity_to_row(a: &ProcessActivity) -> ActivityRow {
  ActivityRow { id: a.id.to_string(),
                process_id: a.process_id.to_string(),
                name: a.name.clone(),
                order_no: a.order_no,
                is_mandatory: a.is_mandatory,
                is_decision: a.is_decision,
                decision_accept_label: a.decision_accept_label.clone(),
                decision_reject_label: a.decision_reject_label.clone(),
                next_on_accept: a.next_on_accept.map(|u| u.to_string()),
                next_on_reject: a.next_on_reject.map(|u| u.to_string()) }
}

fn scan_from_row(r: ScanRow) -> Result<ActivityScan> {
  Ok(ActivityScan { id: parse_uuid(&r.id)?,
                    document_id: parse_uuid(&r.document_id)?,
                    process_activity_id: r.process_activity_id.as_deref().map(parse_uuid).transpose()?,
                    activity_name: r.activity_name,
                    start_time: ts_to_utc(r.start_time_ts)?,
                    end_time: r.end_time_ts.map(ts_to_utc).transpose()?,
                    duration_seconds: r.duration_seconds,
                    waiting_seconds: r.waiting_seconds,
                    resting_seconds: r.resting_seconds,
                    next_activity_id: r.next_activity_id.as_deref().map(parse_uuid).transpose()? })
}

fn scan_to_row(s: &ActivityScan) -> ScanRow {
  ScanRow { id: s.id.to_string(),
            document_id: s.document_id.to_string(),
            process_activity_id: s.process_activity_id.map(|u| u.to_string()),
            activity_name: s.activity_name.clone(),
            start_time_ts: s.start_time.timestamp(),
            end_time_ts: s.end_time.map(|t| t.timestamp()),
            duration_seconds: s.duration_seconds,
            waiting_seconds: s.waiting_seconds,
            resting_seconds: s.resting_seconds,
            next_activity_id: s.next_activity_id.map(|u| u.to_string()) }
}

fn process_from_row(r: ProcessRow) -> Result<Process> {
  let id = parse_uuid(&r.id)?;
  Process::from_parts(id, &r.code, &r.name).map_err(|e| TrackError::Storage(e.to_string()))
}

impl TrackRepository for DieselTrackRepository {
  fn get_document(&self, id: &Uuid) -> Result<Option<Document>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(doc_dsl::documents.filter(doc_dsl::id.eq(id.to_string()))
                                           .first::<DocumentRow>(&mut conn)
                                           .optional())?;
    opt.map(document_from_row).transpose()
  }

  fn create_document(&self, document: &Document) -> Result<()> {
    let mut conn = self.conn()?;
    let row = document_to_row(document);
    map_db_err(diesel::insert_into(doc_dsl::documents).values(&row).execute(&mut conn))?;
    Ok(())
  }

  fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
    let mut conn = self.conn()?;
    let mut query = doc_dsl::documents.into_boxed();
    if let Some(st) = filter.status {
      query = query.filter(doc_dsl::status.eq(st.as_str()));
    }
    if let Some(term) = &filter.query {
      let like = format!("%{}%", term.to_lowercase());
      query = query.filter(doc_dsl::id.like(like.clone())
                                      .or(doc_dsl::doc_type.like(like.clone()))
                                      .or(doc_dsl::region.like(like)));
    }
    let rows = map_db_err(query.order(doc_dsl::created_at_ts.desc())
                               .limit(filter.limit.max(0))
                               .offset(filter.offset.max(0))
                               .load::<DocumentRow>(&mut conn))?;
    rows.into_iter().map(document_from_row).collect()
  }

  /// Purga en cascada: primero los escaneos, después el documento, dentro
  /// de la misma transacción.
  fn delete_document(&self, id: &Uuid) -> Result<bool> {
    let mut conn = self.conn()?;
    let id_s = id.to_string();
    let deleted = map_db_err(conn.transaction::<usize, DieselError, _>(|c| {
                    diesel::delete(scan_dsl::activity_scans.filter(scan_dsl::document_id.eq(&id_s))).execute(c)?;
                    diesel::delete(doc_dsl::documents.filter(doc_dsl::id.eq(&id_s))).execute(c)
                  }))?;
    Ok(deleted > 0)
  }

  fn get_process(&self, id: &Uuid) -> Result<Option<Process>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(proc_dsl::processes.filter(proc_dsl::id.eq(id.to_string()))
                                            .first::<ProcessRow>(&mut conn)
                                            .optional())?;
    opt.map(process_from_row).transpose()
  }

  fn find_process(&self, code_or_name: &str) -> Result<Option<Process>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(proc_dsl::processes.filter(proc_dsl::code.eq(code_or_name).or(proc_dsl::name.eq(code_or_name)))
                                            .first::<ProcessRow>(&mut conn)
                                            .optional())?;
    opt.map(process_from_row).transpose()
  }

  fn list_processes(&self) -> Result<Vec<Process>> {
    let mut conn = self.conn()?;
    let rows = map_db_err(proc_dsl::processes.order(proc_dsl::name.asc()).load::<ProcessRow>(&mut conn))?;
    rows.into_iter().map(process_from_row).collect()
  }

  fn create_process(&self, process: &Process, activities: &[ProcessActivity]) -> Result<()> {
    let mut conn = self.conn()?;
    let prow = ProcessRow { id: process.id().to_string(),
                            code: process.code().to_string(),
                            name: process.name().to_string() };
    let arows: Vec<ActivityRow> = activities.iter().map(activity_to_row).collect();
    map_db_err(conn.transaction::<(), DieselError, _>(|c| {
      diesel::insert_into(proc_dsl::processes).values(&prow).execute(c)?;
      diesel::insert_into(act_dsl::process_activities).values(&arows).execute(c)?;
      Ok(())
    }))
  }

  fn list_activities(&self, process_id: &Uuid) -> Result<Vec<ProcessActivity>> {
    let mut conn = self.conn()?;
    let rows = map_db_err(act_dsl::process_activities.filter(act_dsl::process_id.eq(process_id.to_string()))
                                                     .order(act_dsl::order_no.asc())
                                                     .load::<ActivityRow>(&mut conn))?;
    rows.into_iter().map(activity_from_row).collect()
  }

  fn find_open_scan(&self, document_id: &Uuid) -> Result<Option<ActivityScan>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(scan_dsl::activity_scans.filter(scan_dsl::document_id.eq(document_id.to_string())
                                                                              .and(scan_dsl::end_time_ts.is_null()))
                                                 .order(scan_dsl::start_time_ts.desc())
                                                 .first::<ScanRow>(&mut conn)
                                                 .optional())?;
    opt.map(scan_from_row).transpose()
  }

  fn find_last_finished_scan(&self, document_id: &Uuid) -> Result<Option<ActivityScan>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(scan_dsl::activity_scans.filter(scan_dsl::document_id.eq(document_id.to_string())
                                                                              .and(scan_dsl::end_time_ts.is_not_null()))
                                                 .order((scan_dsl::end_time_ts.desc(), scan_dsl::start_time_ts.desc()))
                                                 .first::<ScanRow>(&mut conn)
                                                 .optional())?;
    opt.map(scan_from_row).transpose()
  }

  fn get_scan(&self, id: &Uuid) -> Result<Option<ActivityScan>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(scan_dsl::activity_scans.filter(scan_dsl::id.eq(id.to_string()))
                                                 .first::<ScanRow>(&mut conn)
                                                 .optional())?;
    opt.map(scan_from_row).transpose()
  }

  fn list_scans(&self, document_id: &Uuid) -> Result<Vec<ActivityScan>> {
    let mut conn = self.conn()?;
    let rows = map_db_err(scan_dsl::activity_scans.filter(scan_dsl::document_id.eq(document_id.to_string()))
                                                  .order(scan_dsl::start_time_ts.asc())
                                                  .load::<ScanRow>(&mut conn))?;
    rows.into_iter().map(scan_from_row).collect()
  }

  fn get_admin(&self, admin_id: &str) -> Result<Option<Admin>> {
    let mut conn = self.conn()?;
    let opt = map_db_err(admin_dsl::admins.filter(admin_dsl::admin_id.eq(admin_id))
                                          .first::<AdminRow>(&mut conn)
                                          .optional())?;
    Ok(opt.map(|r| Admin { admin_id: r.admin_id, name: r.name, office_type: r.office_type, region: r.region }))
  }

  fn upsert_admin(&self, admin: &Admin) -> Result<()> {
    let mut conn = self.conn()?;
    let row = AdminRow { admin_id: admin.admin_id.clone(),
                         name: admin.name.clone(),
                         office_type: admin.office_type.clone(),
                         region: admin.region.clone() };
    // Upsert portable: intentar insert y, si choca la clave, delete+insert
    if diesel::insert_into(admin_dsl::admins).values(&row).execute(&mut conn).is_err() {
      let _ = diesel::delete(admin_dsl::admins.filter(admin_dsl::admin_id.eq(&row.admin_id))).execute(&mut conn);
      map_db_err(diesel::insert_into(admin_dsl::admins).values(&row).execute(&mut conn))?;
    }
    Ok(())
  }

  /// Transición atómica con bloqueo optimista.
  ///
  /// La primera sentencia es el compare-and-swap sobre `documents`
  /// (`WHERE id = ? AND version = ?`): si no afecta filas, la versión era
  /// vieja o el documento no existe y se revierte sin tocar nada. Las
  /// escrituras sobre `activity_scans` corren después, dentro de la misma
  /// transacción, con sus precondiciones verificadas bajo el candado de la
  /// fila del documento.
  fn apply_transition(&self, document_id: &Uuid, expected_version: i64, transition: &Transition)
                      -> Result<PersistResult> {
    let mut conn = self.conn()?;
    let id_s = document_id.to_string();
    let res = conn.transaction::<i64, DieselError, _>(|c| {
                match transition {
                  Transition::Accept { accepted_at } => {
                    let affected =
                      diesel::update(doc_dsl::documents.filter(doc_dsl::id.eq(&id_s)
                                                                          .and(doc_dsl::version.eq(expected_version))))
                        .set((doc_dsl::status.eq(DocumentStatus::Waiting.as_str()),
                              doc_dsl::version.eq(expected_version + 1)))
                        .execute(c)?;
                    if affected == 0 {
                      return Err(DieselError::RollbackTransaction);
                    }
                    // la primera aceptación gana: solo se escribe si sigue nula
                    diesel::update(doc_dsl::documents.filter(doc_dsl::id.eq(&id_s)
                                                                        .and(doc_dsl::accepted_at_ts.is_null())))
                      .set(doc_dsl::accepted_at_ts.eq(Some(accepted_at.timestamp())))
                      .execute(c)?;
                  }
                  Transition::Start { scan } => {
                    let affected =
                      diesel::update(doc_dsl::documents.filter(doc_dsl::id.eq(&id_s)
                                                                          .and(doc_dsl::version.eq(expected_version))))
                        .set((doc_dsl::status.eq(DocumentStatus::InProgress.as_str()),
                              doc_dsl::version.eq(expected_version + 1)))
                        .execute(c)?;
                    if affected == 0 {
                      return Err(DieselError::RollbackTransaction);
                    }
                    // Invariante: a lo sumo una fila abierta por documento
                    let open: i64 = scan_dsl::activity_scans.filter(scan_dsl::document_id.eq(&id_s)
                                                                                         .and(scan_dsl::end_time_ts.is_null()))
                                                            .count()
                                                            .get_result(c)?;
                    if open > 0 {
                      return Err(DieselError::RollbackTransaction);
                    }
                    let row = scan_to_row(scan);
                    diesel::insert_into(scan_dsl::activity_scans).values(&row).execute(c)?;
                  }
                  Transition::Finish { scan_id,
                                       end_time,
                                       duration_seconds,
                                       next_activity_id,
                                       new_status } => {
                    let affected =
                      diesel::update(doc_dsl::documents.filter(doc_dsl::id.eq(&id_s)
                                                                          .and(doc_dsl::version.eq(expected_version))))
                        .set((doc_dsl::status.eq(new_status.as_str()), doc_dsl::version.eq(expected_version + 1)))
                        .execute(c)?;
                    if affected == 0 {
                      return Err(DieselError::RollbackTransaction);
                    }
                    // La fila debe seguir abierta; después de esto es inmutable
                    let stamped =
                      diesel::update(scan_dsl::activity_scans.filter(scan_dsl::id.eq(scan_id.to_string())
                                                                                 .and(scan_dsl::document_id.eq(&id_s))
                                                                                 .and(scan_dsl::end_time_ts.is_null())))
                        .set((scan_dsl::end_time_ts.eq(Some(end_time.timestamp())),
                              scan_dsl::duration_seconds.eq(Some(*duration_seconds)),
                              scan_dsl::next_activity_id.eq(next_activity_id.map(|u| u.to_string()))))
                        .execute(c)?;
                    if stamped == 0 {
                      return Err(DieselError::RollbackTransaction);
                    }
                  }
                }
                Ok(expected_version + 1)
              });
    match res {
      Ok(new_version) => {
        log::debug!("transición aplicada doc={} v{} -> v{}", id_s, expected_version, new_version);
        Ok(PersistResult::Ok { new_version })
      }
      Err(DieselError::RollbackTransaction) => Ok(PersistResult::Conflict),
      Err(e) => Err(TrackError::Storage(format!("db: {}", e))),
    }
  }
}

/// Crear repo desde las variables de entorno. Con el feature `pg` la URL
/// debe apuntar a Postgres; sin él se usa SQLite (archivo local por
/// defecto, memoria compartida en pruebas).
#[cfg(all(feature = "pg", not(test)))]
pub fn new_from_env() -> Result<DieselTrackRepository> {
  dotenvy::dotenv().ok();
  let url = std::env::var("TRACK_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .map_err(|_| TrackError::Storage("TRACK_DB_URL / DATABASE_URL not set".into()))?;
  if !(url.starts_with("postgres") || url.starts_with("postgresql://") || url.contains('@')) {
    return Err(TrackError::Storage("doc-persistence: TRACK_DB_URL does not look like Postgres URL".into()));
  }
  Ok(DieselTrackRepository::new(&url))
}

#[cfg(test)]
pub fn new_from_env() -> Result<DieselTrackRepository> {
  dotenvy::dotenv().ok();
  let url = std::env::var("TRACK_DB_URL").unwrap_or_else(|_| "file:trackdb?mode=memory&cache=shared".into());
  Ok(DieselTrackRepository::new(&url))
}

#[cfg(all(not(feature = "pg"), not(test)))]
pub fn new_from_env() -> Result<DieselTrackRepository> {
  dotenvy::dotenv().ok();
  let url = std::env::var("TRACK_DB_URL").or_else(|_| std::env::var("DATABASE_URL")).unwrap_or_else(|_| {
                                                                                      log::warn!("TRACK_DB_URL no \
                                                                                                  definida; usando \
                                                                                                  doctrack.sqlite");
                                                                                      "doctrack.sqlite".into()
                                                                                    });
  Ok(DieselTrackRepository::new(&url))
}

// Test helper: construct a DieselTrackRepository backed by an explicit
// SQLite connection manager, bypassing environment parsing.
#[cfg(not(feature = "pg"))]
pub fn new_sqlite_for_test(database_url: &str) -> DieselTrackRepository {
  DieselTrackRepository::new(database_url)
}
