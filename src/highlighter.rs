//! Morph status highlighting of flashcard expressions.
//!
//! Two kinds of spans are collected from an expression: ruby annotations
//! (`base[ruby]`) and morph matches with their learning status. They are
//! discovered independently and may overlap in any way, so they are merged by
//! sweeping both sets from the right end of the string to the left. Splicing
//! markup into the string only moves text to the right of the splice, which
//! keeps the offsets of every span still waiting to be processed valid.

use crate::config::SieveConfig;
use crate::interval::{Markup, Ruby, RubyStyle, Status};
use crate::morph::{Classify, Evaluation, LearningStatus};
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;
use tracing::warn;

lazy_static! {
    // The base must not contain whitespace, so with Anki's ruby syntax it starts
    // after a space or at the start of the expression: "世[よ]の 中[なか]".
    static ref RUBY_PATTERN: Regex = Regex::new(r" ?([^\] \W]+)\[(.+?)\]").unwrap();
}

/// Settings that affect how morphs are classified and rubies are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSettings {
    pub evaluation: Evaluation,
    pub interval_for_known_morphs: u32,
    pub ruby_style: RubyStyle,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            evaluation: Evaluation::Lemma,
            interval_for_known_morphs: 21,
            ruby_style: RubyStyle::Text,
        }
    }
}

impl From<&SieveConfig> for HighlightSettings {
    fn from(config: &SieveConfig) -> Self {
        Self {
            evaluation: config.evaluation,
            interval_for_known_morphs: config.interval_for_known_morphs,
            ruby_style: config.ruby_style,
        }
    }
}

/// An expression with its discovered rubies and morph statuses.
#[derive(Debug, Clone)]
pub struct TextHighlighter {
    expression: String,
    rubies: Vec<Ruby>,
    statuses: Vec<Status>,
}

impl TextHighlighter {
    pub fn new<M: Classify>(
        settings: &HighlightSettings,
        expression: &str,
        morphemes: &[M],
    ) -> Self {
        let (expression, rubies) = tag_rubies(expression, settings.ruby_style);
        let statuses = tag_morphemes(&expression, morphemes, settings);
        Self {
            expression,
            rubies,
            statuses,
        }
    }

    /// The expression with ruby annotations removed.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn rubies(&self) -> &[Ruby] {
        &self.rubies
    }

    /// Morph matches, sorted by start offset.
    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    pub fn highlighted(&self) -> String {
        if self.expression.is_empty() || (self.rubies.is_empty() && self.statuses.is_empty()) {
            return self.expression.clone();
        }

        let mut sweep = Sweep {
            highlighted: self.expression.clone(),
            rubies: self.rubies.clone(),
            statuses: self.statuses.clone(),
            ruby: None,
            status: None,
        };
        while sweep.step() {}
        sweep.highlighted
    }
}

/// Finds `base[ruby]` annotations and strips them down to their base text.
///
/// Each ruby is recorded at its base's offsets in the stripped string, and
/// scanning resumes right after that base.
fn tag_rubies(expression: &str, style: RubyStyle) -> (String, Vec<Ruby>) {
    let mut expression = expression.to_string();
    let mut rubies = Vec::new();
    let mut end = 0;

    while let Some(caps) = RUBY_PATTERN.captures_at(&expression, end) {
        let (Some(whole), Some(base), Some(ruby)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        let start = whole.start();
        let whole_end = whole.end();
        let base = base.as_str().to_string();
        let ruby = ruby.as_str().to_string();

        end = start + base.len();
        expression.replace_range(start..whole_end, &base);
        rubies.push(Ruby::new(start, end, base, ruby, style));
    }

    (expression, rubies)
}

/// Finds every occurrence of every morph, longest inflections first.
///
/// Matches are blanked out with spaces in a scratch copy so a shorter morph
/// never claims part of a longer one and offsets stay put.
fn tag_morphemes<M: Classify>(
    expression: &str,
    morphemes: &[M],
    settings: &HighlightSettings,
) -> Vec<Status> {
    let mut scratch = lowercase_in_place(expression);
    let mut statuses = Vec::new();

    let mut ordered: Vec<&M> = morphemes.iter().collect();
    ordered.sort_by_key(|morph| std::cmp::Reverse(morph.inflection().chars().count()));

    for morph in ordered {
        let inflection = morph.inflection();
        if inflection.is_empty() {
            continue;
        }

        while let Some(start) = scratch.find(inflection) {
            let end = start + inflection.len();
            let status =
                morph.learning_status(settings.evaluation, settings.interval_for_known_morphs);
            statuses.push(Status::new(start, end, status, inflection));
            scratch.replace_range(start..end, &" ".repeat(end - start));
        }
    }

    statuses.sort_by_key(|status| status.start);
    statuses
}

/// Lowercases without moving any byte offset.
///
/// Characters whose lowercase form has a different UTF-8 length (or expands to
/// several characters) are kept as they are.
fn lowercase_in_place(text: &str) -> String {
    text.chars()
        .map(|ch| {
            let mut lower = ch.to_lowercase();
            match (lower.next(), lower.next()) {
                (Some(single), None) if single.len_utf8() == ch.len_utf8() => single,
                _ => ch,
            }
        })
        .collect()
}

/// State of the right-to-left merge of rubies and statuses.
///
/// Both stacks are sorted by start offset, so popping yields the rightmost
/// remaining span. `ruby` and `status` hold the current candidates.
struct Sweep {
    highlighted: String,
    rubies: Vec<Ruby>,
    statuses: Vec<Status>,
    ruby: Option<Ruby>,
    status: Option<Status>,
}

impl Sweep {
    /// Advances one step; `false` once everything is spliced in.
    fn step(&mut self) -> bool {
        if self.ruby.is_none() {
            self.ruby = self.rubies.pop();
        }
        if self.status.is_none() {
            self.status = self.statuses.pop();
        }

        match (self.ruby.take(), self.status.take()) {
            (None, None) => false,

            (None, Some(status)) => {
                let injected = status.inject(&self.highlighted);
                self.apply(injected);
                true
            }

            // A ruby without a morph means the morphemizer disagrees with the curated
            // ruby, so the text gets an undefined status. The next step wraps it.
            (Some(ruby), None) => {
                self.status = Some(self.undefined_status(&ruby));
                self.ruby = Some(ruby);
                true
            }

            (Some(ruby), Some(status)) => {
                if ruby.end <= status.start || ruby.start >= status.end {
                    self.disjoint(ruby, status);
                } else if ruby.start >= status.start && ruby.end <= status.end {
                    self.ruby_inside_status(ruby, status);
                } else if ruby.start <= status.start {
                    self.status_inside_ruby(ruby, status);
                } else {
                    warn!(
                        ruby = ?ruby.span(),
                        status = ?status.span(),
                        "dropping unresolvable highlight spans"
                    );
                }
                true
            }
        }
    }

    /// Only the later span is written; the other one stays for the next step.
    fn disjoint(&mut self, ruby: Ruby, status: Status) {
        if ruby.start > status.start {
            let undefined = self.undefined_status(&ruby);
            let wrapped = wrap_with_ruby(&self.highlighted, &undefined, &ruby, ruby.span());
            self.apply(wrapped);
            self.status = Some(status);
        } else {
            let injected = status.inject(&self.highlighted);
            self.apply(injected);
            self.ruby = Some(ruby);
        }
    }

    /// The status wraps the ruby. Rubies further left inside the same status are
    /// injected as well; they sit behind the status's opening markup by now.
    fn ruby_inside_status(&mut self, ruby: Ruby, status: Status) {
        let wrapped = wrap_with_ruby(&self.highlighted, &status, &ruby, status.span());
        if !self.apply(wrapped) {
            return;
        }

        while self.rubies.last().is_some_and(|next| next.end > status.start) {
            let Some(mut inner) = self.rubies.pop() else {
                break;
            };
            inner.shift(status.open_len());
            let injected = inner.inject(&self.highlighted);
            self.apply(injected);
        }
    }

    /// One or more morphs split the ruby. Their statuses cannot be trusted, so
    /// the ruby is wrapped as undefined and the remaining statuses inside it are
    /// discarded.
    fn status_inside_ruby(&mut self, ruby: Ruby, mut status: Status) {
        status.status = LearningStatus::Undefined;
        let region = ruby.start..ruby.end.max(status.end);
        let wrapped = wrap_with_ruby(&self.highlighted, &status, &ruby, region);
        self.apply(wrapped);

        while self
            .statuses
            .last()
            .is_some_and(|next| next.end > ruby.start)
        {
            self.statuses.pop();
        }
    }

    fn undefined_status(&self, ruby: &Ruby) -> Status {
        let text = self.highlighted.get(ruby.span()).unwrap_or_default();
        Status::new(ruby.start, ruby.end, LearningStatus::Undefined, text)
    }

    /// Stores a splice result. A failed splice leaves the text untouched.
    fn apply(&mut self, spliced: Option<String>) -> bool {
        match spliced {
            Some(text) => {
                self.highlighted = text;
                true
            }
            None => {
                warn!("highlight span is not on a character boundary, skipping it");
                false
            }
        }
    }
}

/// Wraps `region` in the status markup, with the rendered ruby in place of the
/// ruby's base text. The ruby must lie inside `region`.
fn wrap_with_ruby(
    text: &str,
    status: &Status,
    ruby: &Ruby,
    region: Range<usize>,
) -> Option<String> {
    if ruby.start < region.start || ruby.end > region.end {
        return None;
    }
    let before = text.get(..region.start)?;
    let lead = text.get(region.start..ruby.start)?;
    let trail = text.get(ruby.end..region.end)?;
    let after = text.get(region.end..)?;
    Some(format!(
        "{before}{}{lead}{ruby}{trail}{}{after}",
        status.open(),
        status.close()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::Morpheme;

    const KNOWN: u32 = 30;
    const LEARNING: u32 = 5;
    const UNKNOWN: u32 = 0;

    fn morph(inflection: &str, interval: u32) -> Morpheme {
        Morpheme::new(inflection, inflection).with_interval(interval)
    }

    fn highlight(expression: &str, morphs: &[Morpheme]) -> String {
        TextHighlighter::new(&HighlightSettings::default(), expression, morphs).highlighted()
    }

    fn span(status: &str, text: &str) -> String {
        format!("<span morph-status=\"{status}\">{text}</span>")
    }

    // ─────────────────────────────────────────────────────────────
    // Discovery
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn rubies_are_stripped_and_located() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "世[よ]の 中[なか]",
            &[] as &[Morpheme],
        );
        assert_eq!(highlighter.expression(), "世の中");
        let rubies = highlighter.rubies();
        assert_eq!(rubies.len(), 2);
        assert_eq!((rubies[0].start, rubies[0].end), (0, 3));
        assert_eq!(rubies[0].ruby, "よ");
        assert_eq!((rubies[1].start, rubies[1].end), (6, 9));
        assert_eq!(rubies[1].base, "中");
    }

    #[test]
    fn ruby_without_space_swallows_preceding_word() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "世[よ]の中[なか]",
            &[] as &[Morpheme],
        );
        assert_eq!(highlighter.rubies()[1].base, "の中");
    }

    #[test]
    fn longest_morph_is_matched_first() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "食べ物",
            &[morph("食べ", KNOWN), morph("食べ物", UNKNOWN)],
        );
        let statuses = highlighter.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].morph, "食べ物");
    }

    #[test]
    fn repeated_morph_is_matched_every_time() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "猫と猫",
            &[morph("猫", KNOWN), morph("と", KNOWN)],
        );
        let starts: Vec<usize> = highlighter.statuses().iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 3, 6]);
    }

    #[test]
    fn empty_inflection_is_ignored() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "abc",
            &[morph("", KNOWN)],
        );
        assert!(highlighter.statuses().is_empty());
    }

    #[test]
    fn evaluation_axis_drives_status() {
        let mut eaten = Morpheme::new("食べる", "食べた");
        eaten.highest_lemma_learning_interval = Some(KNOWN);
        eaten.highest_inflection_learning_interval = Some(UNKNOWN);
        let settings = HighlightSettings {
            evaluation: Evaluation::Inflection,
            ..HighlightSettings::default()
        };
        let highlighted = TextHighlighter::new(&settings, "食べた", &[eaten]).highlighted();
        assert_eq!(highlighted, span("unknown", "食べた"));
    }

    #[test]
    fn lowercase_keeps_byte_offsets() {
        assert_eq!(lowercase_in_place("HeLLo Ä"), "hello ä");
        // U+0130 lowercases to two characters
        assert_eq!(lowercase_in_place("İ"), "İ");
    }

    // ─────────────────────────────────────────────────────────────
    // Sweep scenarios
    // ─────────────────────────────────────────────────────────────

    #[test]
    fn nothing_to_highlight_is_unchanged() {
        assert_eq!(highlight("(ㆆ _ ㆆ)?!", &[]), "(ㆆ _ ㆆ)?!");
        assert_eq!(highlight("", &[morph("x", KNOWN)]), "");
    }

    #[test]
    fn only_statuses() {
        assert_eq!(
            highlight("私...", &[morph("私", UNKNOWN)]),
            format!("{}...", span("unknown", "私"))
        );
    }

    #[test]
    fn match_is_case_insensitive_but_output_keeps_case() {
        assert_eq!(
            highlight("Hello world", &[morph("hello", LEARNING)]),
            format!("{} world", span("learning", "Hello"))
        );
    }

    #[test]
    fn only_rubies() {
        assert_eq!(
            highlight("37[さんじゅうなな]！", &[]),
            format!("{}！", span("undefined", " 37[さんじゅうなな]"))
        );
    }

    #[test]
    fn disjoint_ruby_last() {
        assert_eq!(
            highlight("です。 予定[よてい]", &[morph("です", KNOWN)]),
            format!(
                "{}。{}",
                span("known", "です"),
                span("undefined", " 予定[よてい]")
            )
        );
    }

    #[test]
    fn disjoint_status_last() {
        assert_eq!(
            highlight("予定[よてい]です", &[morph("です", KNOWN)]),
            format!(
                "{}{}",
                span("undefined", " 予定[よてい]"),
                span("known", "です")
            )
        );
    }

    #[test]
    fn ruby_matches_status_exactly() {
        assert_eq!(
            highlight("予定[よてい]", &[morph("予定", KNOWN)]),
            span("known", " 予定[よてい]")
        );
    }

    #[test]
    fn ruby_inside_status() {
        assert_eq!(
            highlight("相変[あいか]わらず", &[morph("相変わらず", LEARNING)]),
            span("learning", " 相変[あいか]わらず")
        );
    }

    #[test]
    fn several_rubies_inside_one_status() {
        assert_eq!(
            highlight("取[と]り 扱[あつか]い", &[morph("取り扱い", KNOWN)]),
            span("known", " 取[と]り 扱[あつか]い")
        );
    }

    #[test]
    fn status_inside_ruby() {
        assert_eq!(
            highlight(
                "錬金術師[れんきんじゅつし]",
                &[morph("錬金術", KNOWN), morph("師", KNOWN)]
            ),
            span("undefined", " 錬金術師[れんきんじゅつし]")
        );
    }

    #[test]
    fn ruby_and_status_overlap_partially() {
        assert_eq!(
            highlight("謎解[なぞと]き", &[morph("謎", KNOWN), morph("解き", KNOWN)]),
            span("undefined", " 謎解[なぞと]き")
        );
    }

    #[test]
    fn status_starting_before_ruby_and_ending_inside_is_dropped() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "x-解き[と]",
            &[morph("x-解", KNOWN)],
        );
        assert_eq!(highlighter.rubies()[0].span(), 2..8);
        assert_eq!(highlighter.statuses()[0].span(), 0..5);
        assert_eq!(highlighter.highlighted(), "x-解き");
    }

    #[test]
    fn status_ending_inside_ruby_does_not_duplicate_text() {
        assert_eq!(
            highlight(
                "錬金術師[れんきんじゅつし]",
                &[morph("錬金", KNOWN), morph("術", KNOWN)]
            ),
            span("undefined", " 錬金術師[れんきんじゅつし]")
        );
    }

    #[test]
    fn mixed_sentence() {
        let morphs = [
            morph("私", KNOWN),
            morph("は", KNOWN),
            morph("予定", LEARNING),
            morph("です", UNKNOWN),
        ];
        assert_eq!(
            highlight("私は 予定[よてい]です", &morphs),
            format!(
                "{}{}{}{}",
                span("known", "私"),
                span("known", "は"),
                span("learning", " 予定[よてい]"),
                span("unknown", "です")
            )
        );
    }

    #[test]
    fn html_rubies() {
        let settings = HighlightSettings {
            ruby_style: RubyStyle::Html,
            ..HighlightSettings::default()
        };
        let highlighted = TextHighlighter::new(&settings, "予定[よてい]です", &[morph("予定", KNOWN)])
            .highlighted();
        assert_eq!(
            highlighted,
            format!("{}です", span("known", "<ruby>予定<rt>よてい</rt></ruby>"))
        );
    }

    #[test]
    fn highlighted_is_repeatable() {
        let highlighter = TextHighlighter::new(
            &HighlightSettings::default(),
            "予定[よてい]です",
            &[morph("です", KNOWN)],
        );
        assert_eq!(highlighter.highlighted(), highlighter.highlighted());
    }
}
