use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::config::Config;
use crate::core::corpus::{Corpus, ExtractionFailure};
use crate::core::matcher::{Orientation, Peer};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Html,
    Json,
}

/// A distinct match list. Records whose lists are identical share one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchGroup {
    pub members: Vec<Peer>,
}

impl MatchGroup {
    pub fn is_singleton(&self) -> bool {
        self.members.len() < 2
    }
}

/// Distinct match lists in corpus order (records are sorted by path).
pub fn match_groups(corpus: &Corpus, only_duplicates: bool) -> Vec<MatchGroup> {
    let mut seen: HashSet<&[Peer]> = HashSet::new();
    corpus
        .records
        .iter()
        .filter(|record| seen.insert(record.matches.as_slice()))
        .map(|record| MatchGroup {
            members: record.matches.clone(),
        })
        .filter(|group| !only_duplicates || !group.is_singleton())
        .collect()
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub generated_at: DateTime<Utc>,
    pub config: &'a Config,
    pub groups: Vec<MatchGroup>,
    pub failures: &'a [ExtractionFailure],
}

impl<'a> Report<'a> {
    pub fn new(corpus: &'a Corpus, config: &'a Config, only_duplicates: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            config,
            groups: match_groups(corpus, only_duplicates),
            failures: &corpus.failures,
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Html => Ok(self.render_html()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    pub fn write(&self, path: &Path, format: ReportFormat) -> Result<(), ReportError> {
        fs::write(path, self.render(format)?)?;
        Ok(())
    }

    /// One `<div class="group">` per group, separated by `<hr>`. Previews are
    /// sized along their dominant side.
    pub fn render_html(&self) -> String {
        let size = self.config.max_dimension;
        let mut out = String::from(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>simcull report</title>\n</head>\n<body>\n",
        );

        let blocks: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                let mut block = String::from("<div class=\"group\">\n");
                for peer in &group.members {
                    let dimension = match peer.orientation {
                        Orientation::Landscape => "width",
                        Orientation::Portrait => "height",
                    };
                    let _ = writeln!(
                        block,
                        "<img src=\"{}\" {}=\"{}\" title=\"{}\">",
                        escape(&peer.path),
                        dimension,
                        size,
                        escape(&peer.path)
                    );
                }
                block.push_str("</div>\n");
                block
            })
            .collect();
        out.push_str(&blocks.join("<hr>\n"));

        out.push_str("<footer>\n");
        if !self.failures.is_empty() {
            let _ = writeln!(out, "<p>Skipped {} file(s):</p>\n<ul>", self.failures.len());
            for failure in self.failures {
                let _ = writeln!(
                    out,
                    "<li>{}: {}</li>",
                    escape(&failure.path),
                    escape(&failure.error)
                );
            }
            out.push_str("</ul>\n");
        }
        let _ = writeln!(
            out,
            "<p>Generated {}</p>\n</footer>\n</body>\n</html>",
            self.generated_at.to_rfc3339()
        );
        out
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
