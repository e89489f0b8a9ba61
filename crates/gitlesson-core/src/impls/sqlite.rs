//! SQLite-backed list/hash store and document store.
//!
//! One connection behind a mutex; every trait method runs one statement (or
//! one `RETURNING` statement) while holding it, which gives the per-operation
//! atomicity the ports promise.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use crate::domain::{Hook, Lesson, LessonId, RepoId, User, UserId};
use crate::ports::{DocumentError, DocumentStore, LessonQuery, ListStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS list_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    list TEXT NOT NULL,
    value TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS list_entries_by_list ON list_entries (list, id);

CREATE TABLE IF NOT EXISTS hash_entries (
    hash TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (hash, field)
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL,
    token TEXT NOT NULL,
    avatar_url TEXT
);

CREATE TABLE IF NOT EXISTS hooks (
    repo_id INTEGER PRIMARY KEY,
    owner_id INTEGER NOT NULL,
    owner_name TEXT NOT NULL,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    secret TEXT NOT NULL,
    linked_user_id INTEGER NOT NULL,
    add_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lessons (
    id TEXT PRIMARY KEY,
    title TEXT,
    tags TEXT NOT NULL,
    lang TEXT NOT NULL,
    body TEXT NOT NULL,
    rendered_html TEXT NOT NULL,
    repo_id INTEGER NOT NULL,
    commit_id TEXT NOT NULL,
    parent_commit_id TEXT,
    author INTEGER NOT NULL,
    post_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS lessons_by_parent ON lessons (repo_id, parent_commit_id);
CREATE INDEX IF NOT EXISTS lessons_by_commit ON lessons (repo_id, commit_id);
CREATE INDEX IF NOT EXISTS lessons_by_date ON lessons (post_date);
";

const LESSON_COLUMNS: &str = "id, title, tags, lang, body, rendered_html, repo_id, commit_id, \
                              parent_commit_id, author, post_date";

const HOOK_COLUMNS: &str =
    "repo_id, owner_id, owner_name, name, url, secret, linked_user_id, add_date";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(store_err)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn docs(&self) -> Result<MutexGuard<'_, Connection>, DocumentError> {
        self.conn.lock().map_err(|_| DocumentError::Poisoned)
    }
}

fn store_err(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn doc_err(e: rusqlite::Error) -> DocumentError {
    DocumentError::Backend(e.to_string())
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DocumentError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DocumentError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

// Host ids are stored as INTEGER; they never exceed i64::MAX on any real host.
fn sql_id(id: u64) -> i64 {
    id as i64
}

struct HookRow {
    hook: Hook,
    add_date: String,
}

fn hook_from_row(row: &Row<'_>) -> rusqlite::Result<HookRow> {
    let add_date: String = row.get(7)?;
    Ok(HookRow {
        hook: Hook {
            repo_id: RepoId::new(row.get::<_, i64>(0)? as u64),
            owner_id: UserId::new(row.get::<_, i64>(1)? as u64),
            owner_name: row.get(2)?,
            name: row.get(3)?,
            url: row.get(4)?,
            secret: row.get(5)?,
            linked_user_id: UserId::new(row.get::<_, i64>(6)? as u64),
            add_date: DateTime::<Utc>::MIN_UTC,
        },
        add_date,
    })
}

fn finish_hook(row: HookRow) -> Result<Hook, DocumentError> {
    let mut hook = row.hook;
    hook.add_date = parse_timestamp(&row.add_date)?;
    Ok(hook)
}

struct LessonRow {
    id: String,
    title: Option<String>,
    tags: String,
    lang: String,
    body: String,
    rendered_html: String,
    repo_id: i64,
    commit_id: String,
    parent_commit_id: Option<String>,
    author: i64,
    post_date: String,
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<LessonRow> {
    Ok(LessonRow {
        id: row.get(0)?,
        title: row.get(1)?,
        tags: row.get(2)?,
        lang: row.get(3)?,
        body: row.get(4)?,
        rendered_html: row.get(5)?,
        repo_id: row.get(6)?,
        commit_id: row.get(7)?,
        parent_commit_id: row.get(8)?,
        author: row.get(9)?,
        post_date: row.get(10)?,
    })
}

impl TryFrom<LessonRow> for Lesson {
    type Error = DocumentError;

    fn try_from(row: LessonRow) -> Result<Self, Self::Error> {
        let id = row
            .id
            .parse::<LessonId>()
            .map_err(|e| DocumentError::Corrupt(format!("lesson id {:?}: {e}", row.id)))?;
        let tags = serde_json::from_str(&row.tags)
            .map_err(|e| DocumentError::Corrupt(format!("lesson {id} tags: {e}")))?;
        Ok(Lesson {
            id,
            title: row.title,
            tags,
            lang: row.lang,
            body: row.body,
            rendered_html: row.rendered_html,
            repo_id: RepoId::new(row.repo_id as u64),
            commit_id: row.commit_id,
            parent_commit_id: row.parent_commit_id,
            author: UserId::new(row.author as u64),
            post_date: parse_timestamp(&row.post_date)?,
        })
    }
}

#[async_trait]
impl ListStore for SqliteStore {
    async fn push_tail(&self, list: &str, value: String) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO list_entries (list, value) VALUES (?1, ?2)",
            params![list, value],
        )
        .map_err(store_err)?;
        let len: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM list_entries WHERE list = ?1",
                params![list],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        Ok(len as usize)
    }

    async fn pop_head(&self, list: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "DELETE FROM list_entries WHERE id = (
                SELECT id FROM list_entries WHERE list = ?1 ORDER BY id LIMIT 1
             ) RETURNING value",
            params![list],
            |r| r.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    async fn length(&self, list: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let len: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM list_entries WHERE list = ?1",
                params![list],
                |r| r.get(0),
            )
            .map_err(store_err)?;
        Ok(len as usize)
    }

    async fn hash_set(&self, hash: &str, field: &str, value: String) -> Result<(), StoreError> {
        self.conn()?
            .execute(
                "INSERT INTO hash_entries (hash, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT (hash, field) DO UPDATE SET value = excluded.value",
                params![hash, field, value],
            )
            .map_err(store_err)?;
        Ok(())
    }

    async fn hash_get(&self, hash: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.conn()?
            .query_row(
                "SELECT value FROM hash_entries WHERE hash = ?1 AND field = ?2",
                params![hash, field],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)
    }

    async fn hash_get_all(&self, hash: &str) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT field, value FROM hash_entries WHERE hash = ?1")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![hash], |r| Ok((r.get(0)?, r.get(1)?)))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn hash_delete(&self, hash: &str, field: &str) -> Result<bool, StoreError> {
        let n = self
            .conn()?
            .execute(
                "DELETE FROM hash_entries WHERE hash = ?1 AND field = ?2",
                params![hash, field],
            )
            .map_err(store_err)?;
        Ok(n > 0)
    }

    async fn hash_exists(&self, hash: &str, field: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM hash_entries WHERE hash = ?1 AND field = ?2)",
            params![hash, field],
            |r| r.get(0),
        )
        .map_err(store_err)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, DocumentError> {
        self.docs()?
            .query_row(
                "SELECT id, username, token, avatar_url FROM users WHERE id = ?1",
                params![sql_id(id.get())],
                |r| {
                    Ok(User {
                        id: UserId::new(r.get::<_, i64>(0)? as u64),
                        username: r.get(1)?,
                        token: r.get(2)?,
                        avatar_url: r.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(doc_err)
    }

    async fn upsert_user(&self, user: User) -> Result<bool, DocumentError> {
        let conn = self.docs()?;
        let existed: bool = conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
                params![sql_id(user.id.get())],
                |r| r.get(0),
            )
            .map_err(doc_err)?;
        conn.execute(
            "INSERT INTO users (id, username, token, avatar_url) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                token = excluded.token,
                avatar_url = excluded.avatar_url",
            params![sql_id(user.id.get()), user.username, user.token, user.avatar_url],
        )
        .map_err(doc_err)?;
        Ok(!existed)
    }

    async fn find_hook(&self, repo_id: RepoId) -> Result<Option<Hook>, DocumentError> {
        let row = self
            .docs()?
            .query_row(
                &format!("SELECT {HOOK_COLUMNS} FROM hooks WHERE repo_id = ?1"),
                params![sql_id(repo_id.get())],
                hook_from_row,
            )
            .optional()
            .map_err(doc_err)?;
        row.map(finish_hook).transpose()
    }

    async fn hooked_repos(&self, repo_ids: &[RepoId]) -> Result<HashSet<RepoId>, DocumentError> {
        let conn = self.docs()?;
        let mut stmt = conn
            .prepare("SELECT EXISTS (SELECT 1 FROM hooks WHERE repo_id = ?1)")
            .map_err(doc_err)?;
        let mut hooked = HashSet::new();
        for id in repo_ids {
            let exists: bool = stmt
                .query_row(params![sql_id(id.get())], |r| r.get(0))
                .map_err(doc_err)?;
            if exists {
                hooked.insert(*id);
            }
        }
        Ok(hooked)
    }

    async fn all_hooks(&self) -> Result<Vec<Hook>, DocumentError> {
        let rows = {
            let conn = self.docs()?;
            let mut stmt = conn
                .prepare(&format!("SELECT {HOOK_COLUMNS} FROM hooks ORDER BY add_date"))
                .map_err(doc_err)?;
            let rows = stmt.query_map([], hook_from_row).map_err(doc_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(doc_err)?
        };
        rows.into_iter().map(finish_hook).collect()
    }

    async fn insert_hook(&self, hook: Hook) -> Result<(), DocumentError> {
        let res = self.docs()?.execute(
            &format!("INSERT INTO hooks ({HOOK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                sql_id(hook.repo_id.get()),
                sql_id(hook.owner_id.get()),
                hook.owner_name,
                hook.name,
                hook.url,
                hook.secret,
                sql_id(hook.linked_user_id.get()),
                timestamp(&hook.add_date),
            ],
        );
        match res {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DocumentError::DuplicateHook(hook.repo_id))
            }
            Err(e) => Err(doc_err(e)),
        }
    }

    async fn delete_hook(&self, repo_id: RepoId) -> Result<bool, DocumentError> {
        let n = self
            .docs()?
            .execute(
                "DELETE FROM hooks WHERE repo_id = ?1",
                params![sql_id(repo_id.get())],
            )
            .map_err(doc_err)?;
        Ok(n > 0)
    }

    async fn insert_lesson(&self, lesson: Lesson) -> Result<(), DocumentError> {
        let tags = serde_json::to_string(&lesson.tags)
            .map_err(|e| DocumentError::Corrupt(format!("lesson tags: {e}")))?;
        self.docs()?
            .execute(
                &format!(
                    "INSERT INTO lessons ({LESSON_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    lesson.id.to_string(),
                    lesson.title,
                    tags,
                    lesson.lang,
                    lesson.body,
                    lesson.rendered_html,
                    sql_id(lesson.repo_id.get()),
                    lesson.commit_id,
                    lesson.parent_commit_id,
                    sql_id(lesson.author.get()),
                    timestamp(&lesson.post_date),
                ],
            )
            .map_err(doc_err)?;
        Ok(())
    }

    async fn find_lesson(&self, id: LessonId) -> Result<Option<Lesson>, DocumentError> {
        let row = self
            .docs()?
            .query_row(
                &format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id = ?1"),
                params![id.to_string()],
                lesson_from_row,
            )
            .optional()
            .map_err(doc_err)?;
        row.map(Lesson::try_from).transpose()
    }

    async fn lesson_exists(&self, repo_id: RepoId, commit_id: &str) -> Result<bool, DocumentError> {
        self.docs()?
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM lessons WHERE repo_id = ?1 AND commit_id = ?2)",
                params![sql_id(repo_id.get()), commit_id],
                |r| r.get(0),
            )
            .map_err(doc_err)
    }

    async fn delete_lessons_by_parent(
        &self,
        repo_id: RepoId,
        parent_commit_id: &str,
    ) -> Result<usize, DocumentError> {
        self.docs()?
            .execute(
                "DELETE FROM lessons WHERE repo_id = ?1 AND parent_commit_id = ?2",
                params![sql_id(repo_id.get()), parent_commit_id],
            )
            .map_err(doc_err)
    }

    async fn latest_lessons(&self, query: LessonQuery) -> Result<Vec<Lesson>, DocumentError> {
        let rows = {
            let conn = self.docs()?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {LESSON_COLUMNS} FROM lessons
                     ORDER BY post_date DESC LIMIT ?1 OFFSET ?2"
                ))
                .map_err(doc_err)?;
            let rows = stmt
                .query_map(
                    params![query.limit as i64, query.skip as i64],
                    lesson_from_row,
                )
                .map_err(doc_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(doc_err)?
        };
        rows.into_iter().map(Lesson::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hook(repo: u64) -> Hook {
        Hook {
            repo_id: RepoId::new(repo),
            owner_id: UserId::new(2),
            owner_name: "octo-org".into(),
            name: "notes".into(),
            url: "https://example.test/hook".into(),
            secret: "abc".into(),
            linked_user_id: UserId::new(1),
            add_date: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitlesson.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.push_tail("tasks", "one".into()).await.unwrap();
            store.push_tail("tasks", "two".into()).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.length("tasks").await.unwrap(), 2);
        assert_eq!(store.pop_head("tasks").await.unwrap().as_deref(), Some("one"));
        assert_eq!(store.pop_head("tasks").await.unwrap().as_deref(), Some("two"));
        assert_eq!(store.pop_head("tasks").await.unwrap(), None);
    }

    #[tokio::test]
    async fn hash_set_overwrites_field() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.hash_set("delayed", "100", "[1]".into()).await.unwrap();
        store.hash_set("delayed", "100", "[1,2]".into()).await.unwrap();
        assert_eq!(
            store.hash_get("delayed", "100").await.unwrap().as_deref(),
            Some("[1,2]")
        );
        assert!(store.hash_exists("delayed", "100").await.unwrap());
        assert!(store.hash_delete("delayed", "100").await.unwrap());
        assert!(store.hash_get_all("delayed").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hooks_are_unique_per_repo() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_hook(hook(7)).await.unwrap();
        let err = store.insert_hook(hook(7)).await.unwrap_err();
        assert!(matches!(err, DocumentError::DuplicateHook(_)));

        let found = store.find_hook(RepoId::new(7)).await.unwrap().unwrap();
        assert_eq!(found, hook(7));

        let hooked = store
            .hooked_repos(&[RepoId::new(7), RepoId::new(8)])
            .await
            .unwrap();
        assert_eq!(hooked, HashSet::from([RepoId::new(7)]));
    }

    #[tokio::test]
    async fn upsert_user_reports_creation() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut user = User {
            id: UserId::new(1),
            username: "octo".into(),
            token: "t1".into(),
            avatar_url: None,
        };
        assert!(store.upsert_user(user.clone()).await.unwrap());
        user.token = "t2".into();
        assert!(!store.upsert_user(user).await.unwrap());
        let stored = store.find_user(UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.token, "t2");
    }

    #[tokio::test]
    async fn lessons_roundtrip_and_delete_by_parent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let lesson = Lesson {
            id: LessonId::generate(),
            title: Some("Foo".into()),
            tags: vec!["a".into(), "b".into()],
            lang: "go".into(),
            body: "Body line\r\n".into(),
            rendered_html: "<p>Body line</p>".into(),
            repo_id: RepoId::new(3),
            commit_id: "c2".into(),
            parent_commit_id: Some("c1".into()),
            author: UserId::new(1),
            post_date: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        };
        store.insert_lesson(lesson.clone()).await.unwrap();
        assert!(store.lesson_exists(RepoId::new(3), "c2").await.unwrap());
        assert_eq!(store.find_lesson(lesson.id).await.unwrap(), Some(lesson.clone()));
        assert_eq!(store.find_lesson(LessonId::generate()).await.unwrap(), None);

        let latest = store.latest_lessons(LessonQuery::default()).await.unwrap();
        assert_eq!(latest, vec![lesson]);

        assert_eq!(
            store.delete_lessons_by_parent(RepoId::new(3), "c1").await.unwrap(),
            1
        );
        assert!(!store.lesson_exists(RepoId::new(3), "c2").await.unwrap());
    }
}
