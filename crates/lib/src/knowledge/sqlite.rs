//! SQLite-backed knowledge store using sqlx.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::knowledge::model::{parse_keywords, Course, Faq};
use crate::knowledge::store::{KnowledgeCounts, KnowledgeStore, StoreError};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Demo catalog loaded by `edubot seed`.
static DEMO_CATALOG: &str = include_str!("../../config/catalog.json");

/// Knowledge store over a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
    /// Directory to create before the first connection (file databases only).
    file_dir: Option<PathBuf>,
    /// Set once migrations have run on this pool.
    migrated: Arc<OnceCell<()>>,
}

fn pool_options(max_connections: Option<u32>) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

impl SqliteKnowledgeStore {
    /// Connect and run migrations. The parent directory of a file database is created first.
    pub async fn connect(database_url: &str, max_connections: Option<u32>) -> Result<Self, StoreError> {
        if let Some(dir) = sqlite_file_dir(database_url) {
            std::fs::create_dir_all(dir)?;
        }
        let pool = pool_options(max_connections).connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::with_pool(pool))
    }

    /// Like [`connect`](Self::connect), but a database that cannot be reached yet is not fatal:
    /// the store falls back to a lazy pool and retries directory creation and migrations on
    /// every call until they succeed. Only an unparseable URL is an error.
    pub async fn open(database_url: &str, max_connections: Option<u32>) -> Result<Self, StoreError> {
        match Self::connect(database_url, max_connections).await {
            Ok(store) => Ok(store),
            Err(e) => {
                log::error!("knowledge store unavailable at startup, will retry on use: {}", e);
                let pool = pool_options(max_connections).connect_lazy(database_url)?;
                Ok(Self {
                    pool,
                    file_dir: sqlite_file_dir(database_url).map(Path::to_path_buf),
                    migrated: Arc::new(OnceCell::new()),
                })
            }
        }
    }

    /// Use an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            file_dir: None,
            migrated: Arc::new(OnceCell::from(())),
        }
    }

    /// Run pending setup (directory, migrations) if startup could not.
    async fn ready(&self) -> Result<(), StoreError> {
        self.migrated
            .get_or_try_init(|| async {
                if let Some(dir) = &self.file_dir {
                    std::fs::create_dir_all(dir)?;
                }
                run_migrations(&self.pool).await?;
                log::info!("knowledge store reachable, migrations applied");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Replace all rows with the bundled demo catalog. Returns (courses, faqs) inserted.
    pub async fn seed_demo_catalog(&self) -> Result<(usize, usize), StoreError> {
        let catalog: SeedCatalog = serde_json::from_str(DEMO_CATALOG)
            .map_err(|e| StoreError::InvalidRow(format!("bundled catalog: {}", e)))?;
        self.seed(&catalog).await
    }

    async fn seed(&self, catalog: &SeedCatalog) -> Result<(usize, usize), StoreError> {
        self.ready().await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM faqs").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM courses").execute(&mut *tx).await?;

        let mut course_ids = Vec::with_capacity(catalog.courses.len());
        for c in &catalog.courses {
            let result = sqlx::query(
                "INSERT INTO courses (title, description, price, duration_weeks, instructor, is_active)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&c.title)
            .bind(&c.description)
            .bind(c.price)
            .bind(c.duration_weeks as i64)
            .bind(&c.instructor)
            .bind(c.is_active)
            .execute(&mut *tx)
            .await?;
            course_ids.push(result.last_insert_rowid());
        }

        for f in &catalog.faqs {
            let course_id = match f.course_index {
                Some(i) => Some(*course_ids.get(i).ok_or_else(|| {
                    StoreError::InvalidRow(format!("faq {:?} references missing course #{}", f.question, i))
                })?),
                None => None,
            };
            sqlx::query(
                "INSERT INTO faqs (question, answer, keywords, course_id, is_active)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&f.question)
            .bind(&f.answer)
            .bind(&f.keywords)
            .bind(course_id)
            .bind(f.is_active)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        log::info!(
            "seeded knowledge store: {} course(s), {} faq(s)",
            catalog.courses.len(),
            catalog.faqs.len()
        );
        Ok((catalog.courses.len(), catalog.faqs.len()))
    }
}

/// Parent directory of a file-backed `sqlite://` URL.
fn sqlite_file_dir(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?.split('?').next()?;
    if path.is_empty() || path.starts_with(':') {
        return None;
    }
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}

/// Run the embedded schema migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn course_from_row(row: &SqliteRow) -> Result<Course, StoreError> {
    let id: i64 = row.try_get("id")?;
    let duration: i64 = row.try_get("duration_weeks")?;
    let duration_weeks = u32::try_from(duration)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| StoreError::InvalidRow(format!("course {} has duration {}", id, duration)))?;
    Ok(Course {
        id,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        duration_weeks,
        instructor: row.try_get("instructor")?,
        is_active: row.try_get("is_active")?,
    })
}

fn faq_from_row(row: &SqliteRow) -> Result<Faq, StoreError> {
    let keywords: Option<String> = row.try_get("keywords")?;
    Ok(Faq {
        id: row.try_get("id")?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        keywords: parse_keywords(keywords.as_deref().unwrap_or("")),
        course_id: row.try_get("course_id")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn active_courses(&self) -> Result<Vec<Course>, StoreError> {
        self.ready().await?;
        let rows = sqlx::query(
            "SELECT id, title, description, price, duration_weeks, instructor, is_active
             FROM courses WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut courses = Vec::with_capacity(rows.len());
        for row in &rows {
            match course_from_row(row) {
                Ok(c) => courses.push(c),
                Err(e) => log::warn!("skipping course row: {}", e),
            }
        }
        Ok(courses)
    }

    async fn active_faqs(&self) -> Result<Vec<Faq>, StoreError> {
        self.ready().await?;
        let rows = sqlx::query(
            "SELECT id, question, answer, keywords, course_id, is_active
             FROM faqs WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut faqs = Vec::with_capacity(rows.len());
        for row in &rows {
            match faq_from_row(row) {
                Ok(f) => faqs.push(f),
                Err(e) => log::warn!("skipping faq row: {}", e),
            }
        }
        Ok(faqs)
    }

    async fn counts(&self) -> Result<KnowledgeCounts, StoreError> {
        self.ready().await?;
        let row = sqlx::query(
            "SELECT (SELECT COUNT(*) FROM courses WHERE is_active = 1) AS courses,
                    (SELECT COUNT(*) FROM faqs WHERE is_active = 1) AS faqs",
        )
        .fetch_one(&self.pool)
        .await?;
        let courses: i64 = row.try_get("courses")?;
        let faqs: i64 = row.try_get("faqs")?;
        Ok(KnowledgeCounts {
            courses: courses.max(0) as u64,
            faqs: faqs.max(0) as u64,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCatalog {
    courses: Vec<SeedCourse>,
    faqs: Vec<SeedFaq>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedCourse {
    title: String,
    description: String,
    price: f64,
    duration_weeks: u32,
    instructor: String,
    #[serde(default = "default_active")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedFaq {
    question: String,
    answer: String,
    keywords: String,
    /// Index into `courses` of the course this FAQ is about.
    #[serde(default)]
    course_index: Option<usize>,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}
