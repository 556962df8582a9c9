//! Console I/O for the interactive dedup session.
//!
//! The session only talks to a [`Prompter`]; tests drive it with in-memory
//! buffers instead of a terminal.

use anyhow::{bail, Result};
use std::io::{self, BufRead, StdinLock, Stdout, Write};

use crate::models::{DuplicateGroup, EntityKind};
use crate::resolution::{parse_action, parse_confirmation, Action};

pub trait Prompter {
    /// Ask what to do with `group` (the `position`-th of `total`).
    fn choose(&mut self, group: &DuplicateGroup, position: usize, total: usize) -> Result<Action>;

    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    fn notify(&mut self, message: &str) -> Result<()>;
}

/// Render a group as a numbered comparison table.
pub fn render_group(group: &DuplicateGroup, position: usize, total: usize) -> String {
    let mut out = format!(
        "\n[{}/{}] {} ({} rows): {}\n",
        position,
        total,
        group.kind.label(),
        group.len(),
        group.key
    );
    for (i, m) in group.members.iter().enumerate() {
        out.push_str(&format!("  {}. [id {}] {}\n", i + 1, m.id, m.label));
        let mut details = Vec::new();
        if let Some(bitrate) = m.bitrate {
            details.push(format!("bitrate: {} kbps", bitrate));
        }
        if let Some(tracks) = m.track_count {
            let noun = if group.kind.entity() == EntityKind::Artist { "albums" } else { "tracks" };
            details.push(format!("{}: {}", noun, tracks));
        }
        if let Some(updated) = &m.last_updated {
            details.push(format!("updated: {}", updated));
        }
        if !details.is_empty() {
            out.push_str(&format!("     {}\n", details.join(" | ")));
        }
        if let Some(path) = &m.path {
            out.push_str(&format!("     {}\n", path));
        }
    }
    out
}

fn choice_hint(group: &DuplicateGroup) -> String {
    let merge = if group.kind.entity() == EntityKind::Album { ", M = merge" } else { "" };
    format!(
        "Keep which? [1-{}], A = keep all{}, Enter = skip: ",
        group.len(),
        merge
    )
}

pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("Input closed while waiting for an answer");
        }
        Ok(line)
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn choose(&mut self, group: &DuplicateGroup, position: usize, total: usize) -> Result<Action> {
        write!(self.output, "{}", render_group(group, position, total))?;
        let allow_merge = group.kind.entity() == EntityKind::Album;
        let hint = choice_hint(group);
        loop {
            let answer = self.ask(&hint)?;
            match parse_action(&answer, group.len(), allow_merge) {
                Some(action) => return Ok(action),
                None => writeln!(self.output, "Invalid choice: {:?}", answer.trim())?,
            }
        }
    }

    fn confirm(&mut self, question: &str) -> Result<bool> {
        let question = format!("{} [S/N]: ", question);
        loop {
            let answer = self.ask(&question)?;
            match parse_confirmation(&answer) {
                Some(yes) => return Ok(yes),
                None => writeln!(self.output, "Please answer S or N")?,
            }
        }
    }

    fn notify(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DuplicateKind, GroupMember};
    use std::io::Cursor;

    fn group(kind: DuplicateKind) -> DuplicateGroup {
        DuplicateGroup {
            kind,
            key: "/a.mp3".to_string(),
            members: vec![
                GroupMember {
                    id: 1,
                    label: "Song - Artist - Album".to_string(),
                    bitrate: Some(320),
                    path: Some("/a.mp3".to_string()),
                    track_count: None,
                    last_updated: Some("2024-03-01".to_string()),
                },
                GroupMember {
                    id: 2,
                    label: "Song - Artist - Album".to_string(),
                    bitrate: None,
                    path: Some("/a.mp3".to_string()),
                    track_count: None,
                    last_updated: None,
                },
            ],
        }
    }

    fn prompter(input: &str) -> ConsolePrompter<Cursor<Vec<u8>>, Vec<u8>> {
        ConsolePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_render_group() {
        let text = render_group(&group(DuplicateKind::SongSamePath), 1, 3);
        assert!(text.contains("[1/3] songs sharing a file path (2 rows): /a.mp3"));
        assert!(text.contains("1. [id 1] Song - Artist - Album"));
        assert!(text.contains("bitrate: 320 kbps | updated: 2024-03-01"));
    }

    #[test]
    fn test_choose_reprompts_on_bad_input() {
        let mut p = prompter("x\n9\n2\n");
        let action = p.choose(&group(DuplicateKind::SongSamePath), 1, 1).unwrap();
        assert_eq!(action, Action::KeepOne(1));
        let output = String::from_utf8(p.into_output()).unwrap();
        assert_eq!(output.matches("Invalid choice").count(), 2);
    }

    #[test]
    fn test_merge_only_offered_for_albums() {
        let mut p = prompter("m\n\n");
        assert_eq!(p.choose(&group(DuplicateKind::SongSamePath), 1, 1).unwrap(), Action::Skip);

        let mut p = prompter("m\n");
        assert_eq!(p.choose(&group(DuplicateKind::AlbumExact), 1, 1).unwrap(), Action::Merge);
        let output = String::from_utf8(p.into_output()).unwrap();
        assert!(output.contains("M = merge"));
    }

    #[test]
    fn test_confirm() {
        let mut p = prompter("maybe\nS\n");
        assert!(p.confirm("Delete /a.mp3?").unwrap());
        let mut p = prompter("n\n");
        assert!(!p.confirm("Delete /a.mp3?").unwrap());
    }

    #[test]
    fn test_closed_input_is_an_error() {
        let mut p = prompter("");
        assert!(p.confirm("Delete?").is_err());
    }
}
