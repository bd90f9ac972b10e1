//! The textual `.ls8` program format.
//!
//! An `.ls8` file is a sequence of text lines:
//! - a line contributes a byte only if its first character is `0` or `1`
//! - an inline `#` starts a trailing comment, stripped before parsing
//! - the remaining text, right-trimmed, is parsed as a base-2 integer
//! - all other lines are ignored

use std::path::Path;
use std::io::{BufRead, BufReader, Write};
use thiserror::Error;

/// A loaded `.ls8` program.
#[derive(Debug, Clone)]
pub struct ProgramFile {
    /// The raw instruction bytes, in file order.
    pub bytes: Vec<u8>,
    /// Original source lines (for debugging).
    pub source_lines: Vec<String>,
}

impl ProgramFile {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    /// Add an instruction byte.
    pub fn push(&mut self, byte: u8, source: &str) {
        self.bytes.push(byte);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of instruction bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for ProgramFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `.ls8` source text into a program.
pub fn parse_source(source: &str) -> Result<ProgramFile, LoadError> {
    let mut program = ProgramFile::new();

    for (line_num, line) in source.lines().enumerate() {
        // Only lines that begin with a binary digit carry code
        if !line.starts_with('0') && !line.starts_with('1') {
            continue;
        }

        let code = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let code = code.trim_end();

        let byte = u8::from_str_radix(code, 2).map_err(|e| LoadError::Parse {
            line: line_num + 1,
            message: format!("invalid binary byte {:?}: {}", code, e),
        })?;

        program.push(byte, line);
    }

    Ok(program)
}

/// Load an `.ls8` file from disk.
pub fn load_program_file<P: AsRef<Path>>(path: P) -> Result<ProgramFile, LoadError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| LoadError::Io(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut source = String::new();
    for line_result in reader.lines() {
        let line = line_result.map_err(|e| LoadError::Io(e.to_string()))?;
        source.push_str(&line);
        source.push('\n');
    }

    parse_source(&source)
}

/// Save a program to disk in `.ls8` format.
pub fn save_program_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), LoadError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| LoadError::Io(e.to_string()))?;

    writeln!(file, "# LS-8 program")
        .map_err(|e| LoadError::Io(e.to_string()))?;
    writeln!(file, "# {} bytes", bytes.len())
        .map_err(|e| LoadError::Io(e.to_string()))?;
    writeln!(file).map_err(|e| LoadError::Io(e.to_string()))?;

    for (addr, byte) in bytes.iter().enumerate() {
        writeln!(file, "{:08b} # {:03}", byte, addr)
            .map_err(|e| LoadError::Io(e.to_string()))?;
    }

    Ok(())
}

/// Errors that can occur while loading `.ls8` programs.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_program() {
        let source = "\
# print8.ls8

10000010 # LDI R0,8
00000000
00001000
01000111 # PRN R0
00000000
00000001 # HLT
";
        let program = parse_source(source).unwrap();

        assert_eq!(
            program.bytes,
            vec![0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001]
        );
    }

    #[test]
    fn test_parse_ignores_non_binary_lines() {
        let source = "comment line\n\n# another\n00000001\n";
        let program = parse_source(source).unwrap();

        assert_eq!(program.bytes, vec![1]);
        assert_eq!(program.source_lines.len(), 1);
    }

    #[test]
    fn test_parse_strips_inline_comment() {
        let program = parse_source("00000001 # HLT   \n").unwrap();
        assert_eq!(program.bytes, vec![1]);
    }

    #[test]
    fn test_parse_malformed_binary() {
        let err = parse_source("0000000x\n").unwrap_err();

        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_overlong_binary() {
        // Nine bits does not fit a byte
        assert!(parse_source("100000000\n").is_err());
    }
}
