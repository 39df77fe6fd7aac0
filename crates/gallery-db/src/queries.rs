use crate::Database;
use crate::models::{NewPhoto, PhotoRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};

/// SQLite's default host parameter limit is far above this; batching keeps
/// the IN (...) lists short for large galleries.
const LIKES_BATCH: usize = 500;

const PHOTO_SELECT: &str = "SELECT p.id, p.title, p.description, p.file_url, p.user_id, u.name, p.created_at
     FROM photos p
     LEFT JOIN users u ON p.user_id = u.id";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, name: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            )?;
            Ok(())
        })
    }

    /// Case-insensitive lookup (the column is `COLLATE NOCASE`).
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Photos --

    /// Insert a photo and return it as stored, owner name resolved.
    pub fn insert_photo(&self, photo: &NewPhoto<'_>) -> Result<PhotoRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO photos (id, title, description, file_url, user_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                (photo.id, photo.title, photo.description, photo.file_url, photo.user_id),
            )?;
            query_photo(conn, photo.id)?.ok_or_else(|| anyhow!("Photo {} missing after insert", photo.id))
        })
    }

    pub fn get_photo(&self, id: &str) -> Result<Option<PhotoRow>> {
        self.with_conn(|conn| query_photo(conn, id))
    }

    /// All photos, newest first.
    pub fn list_photos(&self) -> Result<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PHOTO_SELECT} ORDER BY p.created_at DESC, p.rowid DESC");
            let mut rows = conn
                .prepare(&sql)?
                .query_map([], map_photo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_likes(conn, &mut rows)?;
            Ok(rows)
        })
    }

    /// Photos owned by one user, newest first.
    pub fn list_photos_by_owner(&self, owner_id: &str) -> Result<Vec<PhotoRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{PHOTO_SELECT} WHERE p.user_id = ?1 ORDER BY p.created_at DESC, p.rowid DESC"
            );
            let mut rows = conn
                .prepare(&sql)?
                .query_map([owner_id], map_photo)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            attach_likes(conn, &mut rows)?;
            Ok(rows)
        })
    }

    /// Overwrite title and description. Returns `None` if the photo is gone.
    pub fn update_photo(&self, id: &str, title: &str, description: &str) -> Result<Option<PhotoRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE photos SET title = ?1, description = ?2 WHERE id = ?3",
                (title, description, id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_photo(conn, id)
        })
    }

    /// Delete a photo and (by cascade) its likes. Returns false if it did not exist.
    pub fn delete_photo(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM photos WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Likes --

    /// Toggle a like: removes it if present, inserts it if not.
    ///
    /// Runs as one transaction on the writer connection, so concurrent toggles
    /// by different users are applied one after the other and none is lost.
    /// Returns `None` if the photo does not exist, otherwise `(added, photo)`.
    pub fn toggle_like(&self, photo_id: &str, user_id: &str) -> Result<Option<(bool, PhotoRow)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let exists = tx
                .query_row("SELECT 1 FROM photos WHERE id = ?1", [photo_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM likes WHERE photo_id = ?1 AND user_id = ?2",
                (photo_id, user_id),
            )?;
            let added = removed == 0;
            if added {
                tx.execute(
                    "INSERT INTO likes (photo_id, user_id) VALUES (?1, ?2)",
                    (photo_id, user_id),
                )?;
            }

            let row = query_photo(&tx, photo_id)?
                .ok_or_else(|| anyhow!("Photo {} missing inside toggle", photo_id))?;
            tx.commit()?;
            Ok(Some((added, row)))
        })
    }

    // -- Blob references --

    /// Every file URL referenced by a photo record.
    pub fn photo_file_urls(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT file_url FROM photos")?;
            let urls = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(urls)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, name, email, password, created_at FROM users WHERE {column} = ?1");
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_photo(conn: &Connection, id: &str) -> Result<Option<PhotoRow>> {
    let sql = format!("{PHOTO_SELECT} WHERE p.id = ?1");
    let row = conn.query_row(&sql, [id], map_photo).optional()?;

    match row {
        Some(photo) => {
            let mut rows = vec![photo];
            attach_likes(conn, &mut rows)?;
            Ok(rows.pop())
        }
        None => Ok(None),
    }
}

fn map_photo(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        file_url: row.get(3)?,
        user_id: row.get(4)?,
        owner_name: row.get::<_, Option<String>>(5)?.unwrap_or_else(|| "unknown".to_string()),
        created_at: row.get(6)?,
        likes: Vec::new(),
    })
}

/// Batch-fetch likes for a set of photos and fill in `PhotoRow::likes`.
fn attach_likes(conn: &Connection, rows: &mut [PhotoRow]) -> Result<()> {
    for batch in rows.chunks_mut(LIKES_BATCH) {
        let placeholders: Vec<String> = (1..=batch.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT photo_id, user_id FROM likes WHERE photo_id IN ({}) ORDER BY rowid",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = batch
            .iter()
            .map(|p| &p.id as &dyn rusqlite::types::ToSql)
            .collect();

        let likes = stmt
            .query_map(params.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (photo_id, user_id) in likes {
            if let Some(photo) = batch.iter_mut().find(|p| p.id == photo_id) {
                photo.likes.push(user_id);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::{is_foreign_key_violation, is_unique_violation};

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn add_user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@example.com", name.to_lowercase());
        db.create_user(&id, name, &email, "$argon2id$stub").unwrap();
        id
    }

    fn add_photo(db: &Database, owner: &str, title: &str) -> PhotoRow {
        let id = Uuid::new_v4().to_string();
        let url = format!("http://localhost/uploads/{}.jpg", id);
        db.insert_photo(&NewPhoto {
            id: &id,
            title,
            description: "",
            file_url: &url,
            user_id: owner,
        })
        .unwrap()
    }

    #[test]
    fn email_lookup_ignores_case() {
        let (_dir, db) = open();
        let id = add_user(&db, "Alice");

        let row = db.get_user_by_email("ALICE@Example.COM").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.name, "Alice");
        assert!(db.get_user_by_email("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_unique_violation() {
        let (_dir, db) = open();
        add_user(&db, "Alice");

        let err = db
            .create_user(&Uuid::new_v4().to_string(), "Other", "ALICE@example.com", "x")
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn unknown_user_is_foreign_key_violation() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let photo = add_photo(&db, &owner, "Sunset");
        let ghost = Uuid::new_v4().to_string();

        let err = db
            .insert_photo(&NewPhoto {
                id: &Uuid::new_v4().to_string(),
                title: "Ghost",
                description: "",
                file_url: "http://localhost/uploads/ghost.jpg",
                user_id: &ghost,
            })
            .unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(!is_unique_violation(&err));

        let err = db.toggle_like(&photo.id, &ghost).unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(db.get_photo(&photo.id).unwrap().unwrap().likes.is_empty());
    }

    #[test]
    fn insert_resolves_owner_name() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let photo = add_photo(&db, &owner, "Sunset");

        assert_eq!(photo.title, "Sunset");
        assert_eq!(photo.owner_name, "Alice");
        assert!(photo.likes.is_empty());
        assert!(photo.created_at.ends_with('Z'));
    }

    #[test]
    fn owner_listing_is_newest_first() {
        let (_dir, db) = open();
        let alice = add_user(&db, "Alice");
        let bob = add_user(&db, "Bob");

        add_photo(&db, &alice, "first");
        add_photo(&db, &bob, "bobs");
        add_photo(&db, &alice, "second");

        let titles: Vec<String> = db
            .list_photos_by_owner(&alice)
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(db.list_photos().unwrap().len(), 3);
    }

    #[test]
    fn toggle_like_twice_restores_membership() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let fan = add_user(&db, "Bob");
        let photo = add_photo(&db, &owner, "Sunset");

        let (added, row) = db.toggle_like(&photo.id, &fan).unwrap().unwrap();
        assert!(added);
        assert_eq!(row.likes, vec![fan.clone()]);

        let (added, row) = db.toggle_like(&photo.id, &fan).unwrap().unwrap();
        assert!(!added);
        assert!(row.likes.is_empty());
    }

    #[test]
    fn toggle_like_on_missing_photo() {
        let (_dir, db) = open();
        let fan = add_user(&db, "Bob");
        assert!(db.toggle_like("no-such-photo", &fan).unwrap().is_none());
    }

    #[test]
    fn concurrent_toggles_from_different_users_all_land() {
        let (_dir, db) = open();
        let db = Arc::new(db);
        let owner = add_user(&db, "Owner");
        let photo = add_photo(&db, &owner, "Crowd");

        let fans: Vec<String> = (0..8).map(|i| add_user(&db, &format!("Fan{}", i))).collect();

        let handles: Vec<_> = fans
            .iter()
            .cloned()
            .map(|fan| {
                let db = db.clone();
                let photo_id = photo.id.clone();
                thread::spawn(move || db.toggle_like(&photo_id, &fan).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let row = db.get_photo(&photo.id).unwrap().unwrap();
        assert_eq!(row.likes.len(), fans.len());
        for fan in &fans {
            assert!(row.likes.contains(fan));
        }
    }

    #[test]
    fn update_keeps_owner_and_likes() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let fan = add_user(&db, "Bob");
        let photo = add_photo(&db, &owner, "Sunset");
        db.toggle_like(&photo.id, &fan).unwrap();

        let row = db.update_photo(&photo.id, "Sunset2", "warm").unwrap().unwrap();
        assert_eq!(row.title, "Sunset2");
        assert_eq!(row.description, "warm");
        assert_eq!(row.user_id, owner);
        assert_eq!(row.likes, vec![fan]);

        assert!(db.update_photo("missing", "x", "").unwrap().is_none());
    }

    #[test]
    fn owner_column_cannot_be_rewritten() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let other = add_user(&db, "Bob");
        let photo = add_photo(&db, &owner, "Sunset");

        let result = db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE photos SET user_id = ?1 WHERE id = ?2",
                (&other, &photo.id),
            )?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(db.get_photo(&photo.id).unwrap().unwrap().user_id, owner);
    }

    #[test]
    fn delete_is_terminal_and_cascades_likes() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let fan = add_user(&db, "Bob");
        let photo = add_photo(&db, &owner, "Sunset");
        db.toggle_like(&photo.id, &fan).unwrap();

        assert!(db.delete_photo(&photo.id).unwrap());
        assert!(!db.delete_photo(&photo.id).unwrap());
        assert!(db.get_photo(&photo.id).unwrap().is_none());
        assert!(db.toggle_like(&photo.id, &fan).unwrap().is_none());

        let orphan_likes: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM likes", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(orphan_likes, 0);
    }

    #[test]
    fn file_urls_track_live_photos() {
        let (_dir, db) = open();
        let owner = add_user(&db, "Alice");
        let keep = add_photo(&db, &owner, "keep");
        let gone = add_photo(&db, &owner, "gone");
        db.delete_photo(&gone.id).unwrap();

        assert_eq!(db.photo_file_urls().unwrap(), vec![keep.file_url]);
    }
}
