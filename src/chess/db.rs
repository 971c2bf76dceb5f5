//! Embedded DuckDB sessions used to write and query Parquet tables.

use super::error::{Error, Result};
use duckdb::Connection;
use std::path::Path;

/// Opens a private in-memory DuckDB session.
///
/// DuckDB runs single-threaded here: the pipeline already parallelises across
/// archives and a second level of threads per worker would oversubscribe the host.
pub fn open_session() -> Result<Connection> {
    let conn =
        Connection::open_in_memory().map_err(|e| Error::database("open in-memory session", e))?;
    conn.execute_batch("SET threads TO 1;")
        .map_err(|e| Error::database("configure session", e))?;
    Ok(conn)
}

/// Quotes `value` as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn quote_path(path: &Path) -> String {
    quote_literal(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal_escapes_single_quotes() {
        assert_eq!(quote_literal("plain"), "'plain'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_session_round_trips_a_query() {
        let conn = open_session().unwrap();
        let value: i64 = conn
            .query_row(&format!("SELECT length({})", quote_literal("o'clock")), [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(value, 7);
    }
}
