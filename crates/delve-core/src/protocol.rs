//! Line-tagged research stream: `LEARNING:<text>`, `REPORT:<markdown>`, `ERROR:<message>`.
//!
//! A report spans several physical lines. When parsing, a line without a known tag continues the
//! previous entry.

use crate::ResearchEvent;
use std::fmt;

const LEARNING: &str = "LEARNING:";
const REPORT: &str = "REPORT:";
const ERROR: &str = "ERROR:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Learning(String),
    Report(String),
    Error(String),
}

impl StreamLine {
    /// Wire form, newline terminated.
    pub fn encode(&self) -> String {
        format!("{self}\n")
    }

    pub fn parse(stream: &str) -> Vec<StreamLine> {
        let mut out: Vec<StreamLine> = Vec::new();
        for line in stream.lines() {
            if let Some(rest) = line.strip_prefix(LEARNING) {
                out.push(Self::Learning(rest.to_string()));
            } else if let Some(rest) = line.strip_prefix(REPORT) {
                out.push(Self::Report(rest.to_string()));
            } else if let Some(rest) = line.strip_prefix(ERROR) {
                out.push(Self::Error(rest.to_string()));
            } else if let Some(last) = out.last_mut() {
                let body = match last {
                    Self::Learning(s) | Self::Report(s) | Self::Error(s) => s,
                };
                body.push('\n');
                body.push_str(line);
            }
        }
        out
    }

    pub fn report(&self) -> Option<&str> {
        match self {
            Self::Report(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for StreamLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Learning(s) => write!(f, "{LEARNING}{s}"),
            Self::Report(s) => write!(f, "{REPORT}{s}"),
            Self::Error(s) => write!(f, "{ERROR}{s}"),
        }
    }
}

impl From<ResearchEvent> for StreamLine {
    fn from(event: ResearchEvent) -> Self {
        match event {
            ResearchEvent::Learning(s) => Self::Learning(s),
        }
    }
}
