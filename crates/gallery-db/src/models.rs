/// Database row types. These map directly to SQLite rows and stay
/// independent of the gallery-types API models.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PhotoRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub user_id: String,
    /// Resolved via JOIN on users.
    pub owner_name: String,
    pub created_at: String,
    /// Liking user ids, in the order the likes were added.
    pub likes: Vec<String>,
}

pub struct NewPhoto<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub file_url: &'a str,
    pub user_id: &'a str,
}
