//! Input/output targets shared by every QA tool.
//!
//! A path of `-` always means standard input when reading and standard
//! output when writing; anything else is a filesystem path.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Where a tool reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Stdio,
    Path(PathBuf),
}

impl Target {
    pub fn open_read(&self) -> io::Result<Box<dyn Read>> {
        match self {
            Target::Stdio => Ok(Box::new(BufReader::new(io::stdin()))),
            Target::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        }
    }

    pub fn open_write(&self) -> io::Result<Box<dyn Write>> {
        match self {
            Target::Stdio => Ok(Box::new(BufWriter::new(io::stdout()))),
            Target::Path(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        }
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err("empty path".to_string()),
            "-" => Ok(Target::Stdio),
            other => Ok(Target::Path(PathBuf::from(other))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Stdio => write!(f, "-"),
            Target::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dash_is_stdio() {
        assert_eq!("-".parse::<Target>().unwrap(), Target::Stdio);
        assert_eq!(Target::Stdio.to_string(), "-");
    }

    #[test]
    fn test_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let target: Target = dir.path().join("out.csv").to_str().unwrap().parse().unwrap();

        {
            let mut writer = target.open_write().unwrap();
            writer.write_all(b"a,b\n1,2\n").unwrap();
        }

        let mut text = String::new();
        target.open_read().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "a,b\n1,2\n");
    }

    #[test]
    fn test_empty_rejected() {
        assert!("".parse::<Target>().is_err());
    }
}
