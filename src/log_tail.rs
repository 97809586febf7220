use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

pub const TAIL_LINES: usize = 200;

/// Writes the last `max_lines` lines of `path` to `out`, or a notice when the
/// file does not exist.
pub fn tail<W: Write>(path: &Path, max_lines: usize, out: &mut W) -> io::Result<()> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            writeln!(out, "Log file not found: {}", path.display())?;
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let mut last = VecDeque::with_capacity(max_lines);
    for line in BufReader::new(file).split(b'\n') {
        let line = line?;
        if max_lines == 0 {
            continue;
        }
        if last.len() == max_lines {
            last.pop_front();
        }
        last.push_back(line);
    }

    for line in last {
        writeln!(out, "{}", String::from_utf8_lossy(&line).trim_end())?;
    }
    out.flush()
}
