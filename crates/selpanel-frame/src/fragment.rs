//! Declared fragment table.
//!
//! USB-CDC on the panel side regularly splits a line such as `PRESS 007`
//! into `PR` + `ESS 007`, or `PRESS ` + `007`, sometimes with a pause longer
//! than the fragment timeout in between. Instead of special-casing strings,
//! the reassembler checks partial input against a table of keywords and the
//! argument each one carries.

/// A keyword that carries a fixed-width numeric argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordShape {
    pub keyword: &'static str,
    /// Declared argument width in digits (`PRESS 007` has 3).
    pub digits: usize,
}

/// Keywords the panel firmware sends with a numeric argument.
pub const DEFAULT_FRAGMENT_TABLE: &[KeywordShape] = &[
    KeywordShape {
        keyword: "PRESS",
        digits: 3,
    },
    KeywordShape {
        keyword: "RELEASE",
        digits: 3,
    },
];

/// How a piece of partial input relates to the fragment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentShape {
    /// Non-empty strict prefix of a keyword, or the bare keyword.
    KeywordPrefix,
    /// Keyword and separator followed by fewer digits than declared.
    PartialArgument,
    /// Keyword and separator followed by at least the declared digits.
    Complete,
    /// Digits only.
    Numeric,
    Unrelated,
}

impl FragmentShape {
    /// Shapes that are held back waiting for the rest of the line.
    pub fn is_incomplete(self) -> bool {
        matches!(self, FragmentShape::KeywordPrefix | FragmentShape::PartialArgument)
    }

    /// Shapes that form a keyword line once a delimiter has been seen.
    pub fn has_argument(self) -> bool {
        matches!(self, FragmentShape::PartialArgument | FragmentShape::Complete)
    }
}

/// A set of [`KeywordShape`]s used to classify and splice fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentTable {
    shapes: &'static [KeywordShape],
}

impl FragmentTable {
    pub const fn new(shapes: &'static [KeywordShape]) -> Self {
        Self { shapes }
    }

    /// Classify trimmed partial input.
    pub fn classify(&self, text: &str) -> FragmentShape {
        if text.is_empty() {
            return FragmentShape::Unrelated;
        }
        if is_digits(text) {
            return FragmentShape::Numeric;
        }

        for shape in self.shapes {
            if shape.keyword.starts_with(text) {
                return FragmentShape::KeywordPrefix;
            }
            let Some(argument) = text
                .strip_prefix(shape.keyword)
                .and_then(|rest| rest.strip_prefix(' '))
            else {
                continue;
            };
            if argument.is_empty() {
                return FragmentShape::KeywordPrefix;
            }
            if is_digits(argument) {
                return if argument.len() < shape.digits {
                    FragmentShape::PartialArgument
                } else {
                    FragmentShape::Complete
                };
            }
        }

        FragmentShape::Unrelated
    }

    /// Join a pending fragment with the piece that followed it.
    ///
    /// A bare keyword followed by digits gets its separator back; every other
    /// combination is concatenated as received.
    pub fn splice(&self, pending: &str, next: &str) -> String {
        let bare_keyword = self.shapes.iter().any(|shape| shape.keyword == pending);
        if bare_keyword && next.starts_with(|c: char| c.is_ascii_digit()) {
            format!("{pending} {next}")
        } else {
            format!("{pending}{next}")
        }
    }
}

impl Default for FragmentTable {
    fn default() -> Self {
        Self::new(DEFAULT_FRAGMENT_TABLE)
    }
}

pub(crate) fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_keyword_prefixes() {
        let table = FragmentTable::default();
        for text in ["P", "PR", "PRE", "PRES", "PRESS", "PRESS ", "REL", "RELEASE"] {
            assert_eq!(table.classify(text), FragmentShape::KeywordPrefix, "{text}");
        }
    }

    #[test]
    fn classifies_arguments_by_width() {
        let table = FragmentTable::default();
        assert_eq!(table.classify("PRESS 0"), FragmentShape::PartialArgument);
        assert_eq!(table.classify("PRESS 00"), FragmentShape::PartialArgument);
        assert_eq!(table.classify("PRESS 007"), FragmentShape::Complete);
        assert_eq!(table.classify("RELEASE 010"), FragmentShape::Complete);
    }

    #[test]
    fn classifies_numeric_and_unrelated() {
        let table = FragmentTable::default();
        assert_eq!(table.classify("007"), FragmentShape::Numeric);
        assert_eq!(table.classify("READY"), FragmentShape::Unrelated);
        assert_eq!(table.classify("PONG"), FragmentShape::Unrelated);
        assert_eq!(table.classify("PRESS x"), FragmentShape::Unrelated);
        assert_eq!(table.classify("PRESSED"), FragmentShape::Unrelated);
        assert_eq!(table.classify(""), FragmentShape::Unrelated);
    }

    #[test]
    fn splice_restores_separator_after_bare_keyword() {
        let table = FragmentTable::default();
        assert_eq!(table.splice("PRESS", "007"), "PRESS 007");
        assert_eq!(table.splice("PR", "ESS 007"), "PRESS 007");
        assert_eq!(table.splice("PRESS 0", "07"), "PRESS 007");
        assert_eq!(table.splice("PR", "ESS"), "PRESS");
    }

    #[test]
    fn custom_table_is_honoured() {
        const TABLE: &[KeywordShape] = &[KeywordShape {
            keyword: "LEVEL",
            digits: 2,
        }];
        let table = FragmentTable::new(TABLE);
        assert_eq!(table.classify("LEV"), FragmentShape::KeywordPrefix);
        assert_eq!(table.classify("LEVEL 4"), FragmentShape::PartialArgument);
        assert_eq!(table.classify("LEVEL 42"), FragmentShape::Complete);
        assert_eq!(table.classify("PRESS"), FragmentShape::Unrelated);
    }
}
