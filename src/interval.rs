//! Spans over the working string of the highlighter.
//!
//! Offsets are byte offsets. An interval whose bounds do not fall on character
//! boundaries of the target is never spliced; `inject` returns `None` instead.

use crate::morph::LearningStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Markup that can wrap a span of text.
pub trait Markup {
    fn span(&self) -> Range<usize>;

    fn open(&self) -> String;

    fn close(&self) -> String;

    /// `target` with this interval's markup around `target[start..end]`.
    fn inject(&self, target: &str) -> Option<String> {
        let span = self.span();
        let before = target.get(..span.start)?;
        let inner = target.get(span.clone())?;
        let after = target.get(span.end..)?;
        Some(format!("{before}{}{inner}{}{after}", self.open(), self.close()))
    }
}

/// How ruby annotations are written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RubyStyle {
    /// Anki field syntax: ` base[ruby]`
    #[default]
    Text,
    /// `<ruby>base<rt>ruby</rt></ruby>`
    Html,
}

/// A furigana annotation of `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ruby {
    pub start: usize,
    pub end: usize,
    pub base: String,
    pub ruby: String,
    pub style: RubyStyle,
}

impl Ruby {
    pub fn new(
        start: usize,
        end: usize,
        base: impl Into<String>,
        ruby: impl Into<String>,
        style: RubyStyle,
    ) -> Self {
        Self {
            start,
            end,
            base: base.into(),
            ruby: ruby.into(),
            style,
        }
    }

    pub fn shift(&mut self, by: usize) {
        self.start += by;
        self.end += by;
    }
}

impl Markup for Ruby {
    fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    fn open(&self) -> String {
        match self.style {
            RubyStyle::Text => " ".to_string(),
            RubyStyle::Html => "<ruby>".to_string(),
        }
    }

    fn close(&self) -> String {
        match self.style {
            RubyStyle::Text => format!("[{}]", self.ruby),
            RubyStyle::Html => format!("<rt>{}</rt></ruby>", self.ruby),
        }
    }
}

impl fmt::Display for Ruby {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.open(), self.base, self.close())
    }
}

/// The learning status of one morph match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub start: usize,
    pub end: usize,
    pub status: LearningStatus,
    pub morph: String,
}

impl Status {
    pub fn new(start: usize, end: usize, status: LearningStatus, morph: impl Into<String>) -> Self {
        Self {
            start,
            end,
            status,
            morph: morph.into(),
        }
    }

    pub fn open_len(&self) -> usize {
        self.open().len()
    }
}

impl Markup for Status {
    fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    fn open(&self) -> String {
        format!("<span morph-status=\"{}\">", self.status)
    }

    fn close(&self) -> String {
        "</span>".to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.open(), self.morph, self.close())
    }
}
