use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only log file with size-based rotation.
///
/// The file is opened lazily on the first write, so a process that never logs
/// leaves no file behind. Before each write, if the active file is non-empty and
/// the new line would push it past `max_bytes`, the file is rolled over:
/// `log.{n-1}` becomes `log.{n}`, ..., `log` becomes `log.1`, and anything that
/// would land beyond `log.{backup_count}` is overwritten. With `backup_count == 0`
/// the file never rolls over and keeps growing.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, backup_count: u32) -> Self {
        Self {
            path: path.into(),
            max_bytes: max_bytes.max(1),
            backup_count,
            file: None,
            size: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `generation`-th rotated predecessor (`ws.log.3`).
    pub fn backup_path(&self, generation: u32) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{generation}"));
        PathBuf::from(name)
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        self.ensure_open()?;
        if self.backup_count > 0
            && self.size > 0
            && self.size + bytes.len() as u64 > self.max_bytes
        {
            self.roll_over()?;
        }

        let file = self.ensure_open()?;
        file.write_all(&bytes)?;
        self.size += bytes.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn ensure_open(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                self.size = file.metadata()?.len();
                file
            }
        };
        Ok(self.file.insert(file))
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.file = None;
        for generation in (1..self.backup_count).rev() {
            let source = self.backup_path(generation);
            if source.exists() {
                fs::rename(&source, self.backup_path(generation + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.ensure_open()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn lines_in(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn creates_file_lazily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ws.log");
        let mut log = RotatingFile::new(&path, 1024, 2);

        assert!(!path.exists());
        log.write_line("hello").unwrap();
        assert_eq!(lines_in(&path), vec!["hello".to_string()]);
    }

    #[test]
    fn rotates_and_keeps_at_most_backup_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.log");
        // "line-NN\n" is 8 bytes, so each file holds four lines.
        let mut log = RotatingFile::new(&path, 32, 3);

        for i in 0..40 {
            log.write_line(&format!("line-{i:02}")).unwrap();
        }

        assert!(path.exists());
        for generation in 1..=3 {
            assert!(log.backup_path(generation).exists(), "missing .{generation}");
        }
        assert!(!log.backup_path(4).exists());

        for file in [
            path.clone(),
            log.backup_path(1),
            log.backup_path(2),
            log.backup_path(3),
        ] {
            let size = fs::metadata(&file).unwrap().len();
            assert!(size <= 32, "{} is {size} bytes", file.display());
        }
    }

    #[test]
    fn nothing_is_lost_inside_the_retention_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.log");
        let mut log = RotatingFile::new(&path, 32, 3);

        for i in 0..16 {
            log.write_line(&format!("line-{i:02}")).unwrap();
        }

        let mut all = Vec::new();
        for generation in (1..=3).rev() {
            all.extend(lines_in(&log.backup_path(generation)));
        }
        all.extend(lines_in(&path));

        let expected: Vec<String> = (0..16).map(|i| format!("line-{i:02}")).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn oldest_generation_is_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.log");
        let mut log = RotatingFile::new(&path, 8, 2);

        for name in ["aaaaaaa", "bbbbbbb", "ccccccc", "ddddddd"] {
            log.write_line(name).unwrap();
        }

        assert_eq!(lines_in(&path), vec!["ddddddd".to_string()]);
        assert_eq!(lines_in(&log.backup_path(1)), vec!["ccccccc".to_string()]);
        assert_eq!(lines_in(&log.backup_path(2)), vec!["bbbbbbb".to_string()]);
        assert!(!log.backup_path(3).exists());
    }

    #[test]
    fn zero_backups_never_rolls_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.log");
        let mut log = RotatingFile::new(&path, 16, 0);

        for name in ["first-1", "second2", "third-3"] {
            log.write_line(name).unwrap();
        }

        assert_eq!(
            lines_in(&path),
            vec![
                "first-1".to_string(),
                "second2".to_string(),
                "third-3".to_string()
            ]
        );
        assert_eq!(fs::metadata(&path).unwrap().len(), 24);
        assert!(!log.backup_path(1).exists());
    }

    #[test]
    fn resumes_size_of_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.log");
        fs::write(&path, "0123456789abcde\n").unwrap();

        let mut log = RotatingFile::new(&path, 24, 1);
        log.write_line("next").unwrap();
        log.write_line("more").unwrap();

        assert_eq!(lines_in(&path), vec!["more".to_string()]);
        assert_eq!(
            lines_in(&log.backup_path(1)),
            vec!["0123456789abcde".to_string(), "next".to_string()]
        );
    }

    #[test]
    fn oversized_line_goes_into_an_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ws.log");
        let mut log = RotatingFile::new(&path, 4, 1);

        log.write_line("much longer than four bytes").unwrap();
        assert_eq!(lines_in(&path).len(), 1);
        assert!(!log.backup_path(1).exists());
    }
}
