use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::config::MacroConfig;
use crate::error::{MacroError, Result};

const LOOP_COUNT_PREFIX: &str = "LoopCount=";
const CELLS_PER_ROW: usize = 4;

/// One macro row as authored; cells are trimmed text, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroRow {
    pub access: String,
    pub channel: String,
    pub action: String,
    pub delay: String,
}

impl MacroRow {
    pub fn new(
        access: impl Into<String>,
        channel: impl Into<String>,
        action: impl Into<String>,
        delay: impl Into<String>,
    ) -> Self {
        Self {
            access: access.into(),
            channel: channel.into(),
            action: action.into(),
            delay: delay.into(),
        }
    }

    pub fn cells(&self) -> [&str; CELLS_PER_ROW] {
        [&self.access, &self.channel, &self.action, &self.delay]
    }
}

/// A parsed macro file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroFile {
    pub rows: Vec<MacroRow>,
    /// Number of passes over `rows`.
    pub loop_count: u32,
}

impl Default for MacroFile {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            loop_count: 1,
        }
    }
}

impl MacroFile {
    /// Parse macro text.
    ///
    /// Each non-blank line is either `LoopCount=<n>` or a row of up to four
    /// comma-separated cells; missing trailing cells are empty. A file with no
    /// `LoopCount` line runs once.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with_config(text, &MacroConfig::default())
    }

    pub fn parse_with_config(text: &str, config: &MacroConfig) -> Result<Self> {
        let mut file = MacroFile::default();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(count) = line.trim().strip_prefix(LOOP_COUNT_PREFIX) {
                file.loop_count = count.trim().parse().map_err(|_| MacroError::Parse {
                    line: line_no,
                    message: format!("invalid loop count {:?}", count.trim()),
                })?;
                continue;
            }

            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            if cells.len() > CELLS_PER_ROW {
                return Err(MacroError::Parse {
                    line: line_no,
                    message: format!("expected at most {CELLS_PER_ROW} cells, found {}", cells.len()),
                });
            }
            if file.rows.len() >= config.max_rows {
                return Err(MacroError::Parse {
                    line: line_no,
                    message: format!("row count exceeds configured max ({})", config.max_rows),
                });
            }

            let cell = |i: usize| cells.get(i).copied().unwrap_or_default();
            file.rows
                .push(MacroRow::new(cell(0), cell(1), cell(2), cell(3)));
        }

        Ok(file)
    }

    /// Canonical text form: one `a,b,c,d` line per row, then `LoopCount=<n>`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&row.cells().join(","));
            out.push('\n');
        }
        out.push_str(LOOP_COUNT_PREFIX);
        out.push_str(&self.loop_count.to_string());
        out.push('\n');
        out
    }

    /// Load a macro file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_config(path, &MacroConfig::default())
    }

    /// Load a macro file with explicit size limits.
    pub fn load_with_config(path: &Path, config: &MacroConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| MacroError::LoadFailed(format!("{}: {err}", path.display())))?;
        let metadata = file
            .metadata()
            .map_err(|err| MacroError::LoadFailed(format!("{}: {err}", path.display())))?;
        if !metadata.is_file() {
            return Err(MacroError::LoadFailed(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() > config.max_file_size as u64 {
            return Err(MacroError::LoadFailed(format!(
                "macro file too large ({} bytes): {}",
                metadata.len(),
                path.display()
            )));
        }

        let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| MacroError::LoadFailed(format!("{}: {err}", path.display())))?;
        if content.len() > config.max_file_size {
            return Err(MacroError::LoadFailed(format!(
                "macro file too large while reading: {}",
                path.display()
            )));
        }

        let parsed = Self::parse_with_config(&content, config)?;
        debug!(
            path = %path.display(),
            rows = parsed.rows.len(),
            loop_count = parsed.loop_count,
            "macro loaded"
        );
        Ok(parsed)
    }

    /// Write the canonical text form, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| MacroError::SaveFailed(format!("{}: {err}", parent.display())))?;
        }
        std::fs::write(path, self.to_text())
            .map_err(|err| MacroError::SaveFailed(format!("{}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_temp_dir(prefix: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parse_rows_and_loop_count() {
        let file = MacroFile::parse("A,12,UP,3\nF4, 7 ,DOWN,0\nLoopCount=5\n").unwrap();
        assert_eq!(file.loop_count, 5);
        assert_eq!(file.rows.len(), 2);
        assert_eq!(file.rows[0], MacroRow::new("A", "12", "UP", "3"));
        assert_eq!(file.rows[1].channel, "7");
    }

    #[test]
    fn short_rows_pad_with_empty_cells() {
        let file = MacroFile::parse("B,,STOP\n").unwrap();
        assert_eq!(file.rows[0], MacroRow::new("B", "", "STOP", ""));
        assert_eq!(file.loop_count, 1);
    }

    #[test]
    fn canonical_text_roundtrips_exactly() {
        let text = "A,12,UP,3\nB,,STOP,0\nF9,65535,DOWN,\nLoopCount=2\n";
        let file = MacroFile::parse(text).unwrap();
        assert_eq!(file.to_text(), text);
    }

    #[test]
    fn rejects_extra_cells() {
        let err = MacroFile::parse("A,1,UP,0,extra\n").unwrap_err();
        assert!(matches!(err, MacroError::Parse { line: 1, .. }));
    }

    #[test]
    fn rejects_bad_loop_count() {
        let err = MacroFile::parse("A,1,UP,0\nLoopCount=lots\n").unwrap_err();
        assert!(matches!(err, MacroError::Parse { line: 2, .. }));
    }

    #[test]
    fn enforces_row_limit() {
        let config = MacroConfig {
            max_rows: 2,
            ..MacroConfig::default()
        };
        let err = MacroFile::parse_with_config("A,1,UP,0\nA,1,UP,0\nA,1,UP,0\n", &config)
            .unwrap_err();
        assert!(matches!(err, MacroError::Parse { line: 3, .. }));
    }

    #[test]
    fn save_then_load() {
        let dir = unique_temp_dir("liftctl-macro-save");
        let path = dir.join("nested").join("mode01.data");
        let file = MacroFile {
            rows: vec![MacroRow::new("C", "40", "DOWN", "1")],
            loop_count: 3,
        };

        file.save(&path).unwrap();
        assert_eq!(MacroFile::load(&path).unwrap(), file);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_rejects_oversized_file() {
        let dir = unique_temp_dir("liftctl-macro-large");
        let path = dir.join("big.data");
        std::fs::write(&path, "A,1,UP,0\n".repeat(64)).unwrap();

        let config = MacroConfig {
            max_file_size: 32,
            ..MacroConfig::default()
        };
        let err = MacroFile::load_with_config(&path, &config).unwrap_err();
        assert!(matches!(err, MacroError::LoadFailed(msg) if msg.contains("too large")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_missing_file() {
        let err = MacroFile::load(Path::new("/nonexistent/liftctl/mode.data")).unwrap_err();
        assert!(matches!(err, MacroError::LoadFailed(_)));
    }
}
