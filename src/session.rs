//! The interactive dedup loop: one prompt and one transaction per group.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use tracing::{error, warn};

use crate::models::{DuplicateGroup, EntityKind, SessionStats};
use crate::prompt::Prompter;
use crate::resolution::{apply_action, Action};

/// Drop members deleted by an earlier group in the same session.
fn refresh_group(conn: &Connection, group: &DuplicateGroup) -> Result<DuplicateGroup> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", group.kind.entity().table());
    let mut stmt = conn.prepare(&sql)?;
    let mut members = Vec::with_capacity(group.len());
    for member in &group.members {
        if stmt.query_row([member.id], |_| Ok(())).optional()?.is_some() {
            members.push(member.clone());
        }
    }
    Ok(DuplicateGroup {
        kind: group.kind,
        key: group.key.clone(),
        members,
    })
}

/// Walk every group, ask what to do and apply it.
///
/// A failing group is rolled back and counted in `errors`; the loop moves on.
/// Errors from the prompter itself (closed input) end the session.
pub fn run_session<P: Prompter>(
    conn: &mut Connection,
    groups: &[DuplicateGroup],
    prompter: &mut P,
) -> Result<SessionStats> {
    let mut stats = SessionStats::default();
    let total = groups.len();

    for (i, group) in groups.iter().enumerate() {
        let group = refresh_group(conn, group)?;
        if group.len() < 2 {
            continue;
        }
        stats.groups_seen += 1;

        let action = prompter.choose(&group, i + 1, total)?;
        let outcome = match apply_action(conn, &group, action) {
            Ok(outcome) => outcome,
            Err(e) => {
                stats.errors += 1;
                eprintln!("Error resolving group '{}': {:#}", group.key, e);
                error!(key = %group.key, error = %e, "group rolled back");
                continue;
            }
        };

        match action {
            Action::KeepOne(_) => stats.kept_one += 1,
            Action::KeepAll => stats.kept_all += 1,
            Action::Skip => stats.skipped += 1,
            Action::Merge => stats.merged += 1,
        }
        stats.rows_deleted += outcome.rows_deleted;
        if outcome.rows_deleted > 0 {
            prompter.notify(&format!("Deleted {} row(s)", outcome.rows_deleted))?;
        }

        if group.kind.entity() == EntityKind::Song {
            for path in &outcome.orphaned_files {
                if !prompter.confirm(&format!("Delete file {} from disk?", path))? {
                    continue;
                }
                match fs::remove_file(path) {
                    Ok(()) => stats.files_deleted += 1,
                    Err(e) => {
                        stats.errors += 1;
                        eprintln!("Failed to delete {}: {}", path, e);
                        warn!(path = %path, error = %e, "file not deleted");
                    }
                }
            }
        }
    }

    Ok(stats)
}
