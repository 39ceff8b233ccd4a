use rusqlite::Connection;

use crate::error::Result;

/// Schema steps in order. Applying step `n` sets `user_version` to `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/0001_kv_entries.sql")];

pub(crate) fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

pub(crate) fn apply(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    let pending = MIGRATIONS
        .iter()
        .zip(1_i64..)
        .filter(|(_, version)| *version > current);

    for (sql, version) in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_twice_is_a_no_op() {
        let mut conn = Connection::open_in_memory().expect("open");
        apply(&mut conn).expect("first apply");
        apply(&mut conn).expect("second apply");

        assert_eq!(
            schema_version(&conn).expect("user_version"),
            MIGRATIONS.len() as i64
        );
    }

    #[test]
    fn newer_schemas_are_left_alone() {
        let mut conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "user_version", 99_i64)
            .expect("set version");
        apply(&mut conn).expect("apply");

        assert_eq!(schema_version(&conn).expect("user_version"), 99);
    }
}
