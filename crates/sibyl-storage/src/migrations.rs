// SPDX-FileCopyrightText: 2026 Sibyl Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! Migrations live as SQL files under `migrations/` and are compiled into
//! the binary with [`refinery::embed_migrations`]. They run once at startup,
//! inside the connection actor, before any query is accepted.

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("migrations");
}

/// Applies all pending migrations to the given connection.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), refinery::Error> {
    embedded::migrations::runner().run(conn)?;
    Ok(())
}
