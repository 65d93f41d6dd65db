pub mod naming;

use std::path::PathBuf;
use which::which;

/// Finds the psql executable in the system PATH.
pub fn find_psql_executable() -> Result<PathBuf, String> {
    find_postgres_tool("psql")
}

/// Finds the pg_dump executable in the system PATH.
pub fn find_pg_dump_executable() -> Result<PathBuf, String> {
    find_postgres_tool("pg_dump")
}

fn find_postgres_tool(name: &str) -> Result<PathBuf, String> {
    which(name).map_err(|e| {
        format!(
            "{} executable not found in PATH ({}). Please ensure PostgreSQL client tools are installed and in your PATH.",
            name, e
        )
    })
}
