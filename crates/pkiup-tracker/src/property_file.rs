use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_DELIMITER: char = '=';

/// Line-preserving `key<delimiter>value` store. Comment, blank, and
/// delimiter-less lines ride along verbatim and keep their positions;
/// mutations touch only the first matching entry line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFile {
    path: PathBuf,
    delimiter: char,
    lines: Vec<String>,
}

impl PropertyFile {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        Self::load_with_delimiter(path, DEFAULT_DELIMITER)
    }

    pub fn load_with_delimiter(path: impl Into<PathBuf>, delimiter: char) -> Result<Self> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        let lines = raw.lines().map(str::to_string).collect();
        Ok(Self {
            path,
            delimiter,
            lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let payload = if self.lines.is_empty() {
            String::new()
        } else {
            let mut payload = self.lines.join("\n");
            payload.push('\n');
            payload
        };
        fs::write(&self.path, payload)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            let (name, value) = split_entry(line, self.delimiter)?;
            if name.trim().eq_ignore_ascii_case(key.trim()) {
                Some(value.trim())
            } else {
                None
            }
        })
    }

    pub fn set(&mut self, key: &str, value: &str) {
        for index in 0..self.lines.len() {
            let Some((name, _)) = split_entry(&self.lines[index], self.delimiter) else {
                continue;
            };
            if !name.trim().eq_ignore_ascii_case(key.trim()) {
                continue;
            }
            // rewrite in place, keeping the key spelling the file already has
            let stored_key = name.trim().to_string();
            self.lines[index] = format!("{}{}{}", stored_key, self.delimiter, value);
            return;
        }

        self.lines
            .push(format!("{}{}{}", key.trim(), self.delimiter, value));
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let position = self.lines.iter().position(|line| {
            split_entry(line, self.delimiter)
                .map_or(false, |(name, _)| {
                    name.trim().eq_ignore_ascii_case(key.trim())
                })
        })?;

        let line = self.lines.remove(position);
        split_entry(&line, self.delimiter).map(|(_, value)| value.trim().to_string())
    }
}

fn split_entry(line: &str, delimiter: char) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    line.split_once(delimiter)
}
