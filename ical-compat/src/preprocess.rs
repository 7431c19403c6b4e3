//! Textual fixes applied to raw iCalendar streams before they reach the grammar parser.
//!
//! Every rule is line oriented: it only touches complete property lines that match its pattern
//! and leaves everything else byte for byte as it was.

use regex::{Captures, Regex};
use std::{
    borrow::Cow,
    io::{self, BufRead, Cursor, Read, Seek, SeekFrom},
    sync::LazyLock,
};
use tracing::debug;

/// A single fix for a known kind of malformed content line.
pub trait StreamPreprocessor {
    /// Pattern that matches every line this rule would rewrite.
    fn regex_for_problem(&self) -> &Regex;

    /// Cheap probe: does `text` contain anything this rule would rewrite?
    fn matches(&self, text: &str) -> bool {
        self.regex_for_problem().is_match(text)
    }

    /// Rewrite all affected lines of `text`.
    fn fix_string(&self, text: &str) -> String;
}

static RE_INVALID_UTC_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?miR)^(TZOFFSET(?:FROM|TO):[+\-]?)((?:18|19|[2-6]\d)\d\d)$")
        .expect("valid utc offset regex")
});

static RE_INVALID_DAY_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?miR)^((?:(?:DURATION|REFRESH-INTERVAL|RELATED-TO|TRIGGER);VALUE=)?(?:DURATION|TRIGGER):)(-?P(?:T-?\d+D|-?\d+DT))$",
    )
    .expect("valid day offset regex")
});

static RE_MISSING_T_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?miR)^((?:DURATION|TRIGGER):-?P)([^T]?\d+[SMH])$")
        .expect("valid missing time prefix regex")
});

/// `TZOFFSETFROM:+5730` → `TZOFFSETFROM:+005730`.
///
/// Some senders drop the hour field of sub-hour offsets (historical local mean times), leaving a
/// four digit `mmss` value that would otherwise be read as 57 hours 30 minutes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixInvalidUtcOffset;

impl StreamPreprocessor for FixInvalidUtcOffset {
    fn regex_for_problem(&self) -> &Regex {
        &RE_INVALID_UTC_OFFSET
    }

    fn fix_string(&self, text: &str) -> String {
        RE_INVALID_UTC_OFFSET
            .replace_all(text, |caps: &Captures<'_>| {
                debug!(line = &caps[0], "inserting missing hour field into utc offset");
                format!("{}00{}", &caps[1], &caps[2])
            })
            .into_owned()
    }
}

/// `DURATION:-P2DT` → `DURATION:-P2D`, `TRIGGER:PT1D` → `TRIGGER:P1D`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixInvalidDayOffset;

impl StreamPreprocessor for FixInvalidDayOffset {
    fn regex_for_problem(&self) -> &Regex {
        &RE_INVALID_DAY_OFFSET
    }

    fn fix_string(&self, text: &str) -> String {
        RE_INVALID_DAY_OFFSET
            .replace_all(text, |caps: &Captures<'_>| {
                debug!(line = &caps[0], "moving day offset in front of the time separator");
                let value = caps[2].to_ascii_uppercase().replace("PT", "P").replace("DT", "D");
                format!("{}{value}", &caps[1])
            })
            .into_owned()
    }
}

/// `TRIGGER:-P5S` → `TRIGGER:-PT5S`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixMissingTPrefix;

impl StreamPreprocessor for FixMissingTPrefix {
    fn regex_for_problem(&self) -> &Regex {
        &RE_MISSING_T_PREFIX
    }

    fn fix_string(&self, text: &str) -> String {
        RE_MISSING_T_PREFIX
            .replace_all(text, |caps: &Captures<'_>| {
                debug!(line = &caps[0], "inserting missing time separator");
                format!("{}T{}", &caps[1], &caps[2])
            })
            .into_owned()
    }
}

/// Input after preprocessing: either the untouched reader or the rewritten text.
pub enum Preprocessed<R> {
    Original(R),
    Fixed(Cursor<String>),
}

impl<R: Read> Read for Preprocessed<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Preprocessed::Original(reader) => reader.read(buf),
            Preprocessed::Fixed(cursor) => cursor.read(buf),
        }
    }
}

/// Ordered chain of [`StreamPreprocessor`]s.
pub struct Preprocessor {
    rules: Vec<Box<dyn StreamPreprocessor + Send + Sync>>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Preprocessor {
            rules: vec![
                Box::new(FixInvalidUtcOffset),
                Box::new(FixInvalidDayOffset),
                Box::new(FixMissingTPrefix),
            ],
        }
    }
}

impl Preprocessor {
    /// Chain without any rule.
    pub fn empty() -> Self {
        Preprocessor { rules: Vec::new() }
    }

    /// Append a rule; rules run in the order they were added.
    pub fn with_rule(mut self, rule: impl StreamPreprocessor + Send + Sync + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Run every rule over `text`. Rules whose probe doesn't match are skipped, so clean input
    /// comes back borrowed.
    pub fn preprocess<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut text = Cow::Borrowed(text);
        for rule in &self.rules {
            if rule.matches(&text) {
                text = Cow::Owned(rule.fix_string(&text));
            }
        }
        text
    }

    /// Preprocess a reader that can be rewound.
    ///
    /// The input is probed line by line first; when no rule matches, the reader is rewound and
    /// handed back as is without ever holding the whole input in memory.
    pub fn preprocess_seekable<R: BufRead + Seek>(
        &self,
        mut reader: R,
    ) -> io::Result<Preprocessed<R>> {
        let start = reader.stream_position()?;

        let mut needs_fix = false;
        let mut line = String::new();
        while reader.read_line(&mut line)? != 0 {
            if self.rules.iter().any(|rule| rule.matches(&line)) {
                needs_fix = true;
                break;
            }
            line.clear();
        }

        reader.seek(SeekFrom::Start(start))?;
        if !needs_fix {
            return Ok(Preprocessed::Original(reader));
        }

        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Preprocessed::Fixed(Cursor::new(self.preprocess(&text).into_owned())))
    }

    /// Preprocess a reader that can't be rewound. The input is buffered once.
    pub fn preprocess_reader<R: Read>(&self, mut reader: R) -> io::Result<String> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(self.preprocess(&text).into_owned())
    }
}
