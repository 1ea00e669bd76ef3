use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("roster.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS children(
            id TEXT PRIMARY KEY,
            page TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            date_of_birth TEXT NOT NULL DEFAULT '',
            stage_label TEXT NOT NULL DEFAULT '',
            birth_certificate TEXT NOT NULL DEFAULT '',
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_children_page ON children(page)",
        [],
    )?;

    // Existing workspaces may predate the updated_at column. Add if needed.
    ensure_children_updated_at(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_marks(
            child_id TEXT NOT NULL,
            dimension TEXT NOT NULL,
            period TEXT NOT NULL,
            present INTEGER NOT NULL,
            PRIMARY KEY(child_id, dimension, period),
            FOREIGN KEY(child_id) REFERENCES children(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_marks_child ON attendance_marks(child_id)",
        [],
    )?;

    Ok(conn)
}

fn ensure_children_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "children", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE children ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
