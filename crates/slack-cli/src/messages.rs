use std::fmt;

/// Upper bound for posted text, counted in characters after any wrapping.
pub const MAX_TEXT_CHARS: usize = 40_000;
/// Longest snooze Slack accepts from this tool (24h).
pub const MAX_SNOOZE_MINUTES: u64 = 1440;
pub const SELECTION_FENCE: &str = "```";

pub const MESSAGE_PLACEHOLDER: &str = "Message";
pub const SNOOZE_PLACEHOLDER: &str = "Snooze duration in minutes (max 1440)";
pub const SELECT_WORKSPACE_PLACEHOLDER: &str = "Select a workspace";
pub const SELECT_CHANNEL_PLACEHOLDER: &str = "Select a channel";

pub const MISSING_TOKEN_ERROR: &str =
    "no Slack token configured: set `token` or add an entry to `workspaces`";

/// Informational feedback for a guard that stopped an action before any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    MessageTooLong,
    SelectionTooLong,
    NoTextSelected,
    InvalidSnooze,
    FileEmpty,
    FileUnreadable,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Self::MessageTooLong => "Message is too long (max 40000 characters).",
            Self::SelectionTooLong => "Selection is too long (max 40000 characters).",
            Self::NoTextSelected => "No text selected.",
            Self::InvalidSnooze => "Snooze duration is empty or not a number.",
            Self::FileEmpty => "File is empty.",
            Self::FileUnreadable => "File could not be read.",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::MessageTooLong => "message-too-long",
            Self::SelectionTooLong => "selection-too-long",
            Self::NoTextSelected => "no-text-selected",
            Self::InvalidSnooze => "invalid-snooze",
            Self::FileEmpty => "file-empty",
            Self::FileUnreadable => "file-unreadable",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Length is measured in UTF-16 code units, the unit Slack's limit is defined in.
pub fn exceeds_text_limit(text: &str) -> bool {
    text.encode_utf16().count() > MAX_TEXT_CHARS
}

pub fn wrap_selection(selection: &str) -> String {
    format!("{SELECTION_FENCE}{selection}{SELECTION_FENCE}")
}

/// A snooze duration as typed, plus its numeric value.
///
/// The trimmed text is what gets sent as `num_minutes`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnoozeMinutes {
    raw: String,
    value: f64,
}

impl SnoozeMinutes {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn exceeds_limit(&self) -> bool {
        self.value > MAX_SNOOZE_MINUTES as f64
    }

    pub fn into_raw(self) -> String {
        self.raw
    }
}

/// Accepts any finite, non-zero number: decimals, exponents, signs and
/// `0x`/`0o`/`0b` integers. Empty input, zero, and text are invalid.
pub fn parse_snooze_minutes(raw: &str) -> Option<SnoozeMinutes> {
    let trimmed = raw.trim();
    let value = parse_number(trimmed)?;
    if !value.is_finite() || value == 0.0 {
        return None;
    }

    Some(SnoozeMinutes {
        raw: trimmed.to_string(),
        value,
    })
}

fn parse_number(text: &str) -> Option<f64> {
    let prefixed = text.get(..2).map(str::to_ascii_lowercase);
    let radix = match prefixed.as_deref() {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };

    if let Some(radix) = radix {
        let digits = &text[2..];
        if digits.is_empty() {
            return None;
        }
        return digits.chars().try_fold(0.0_f64, |acc, digit| {
            digit
                .to_digit(radix)
                .map(|digit| acc * f64::from(radix) + f64::from(digit))
        });
    }

    // `f64::from_str` also takes "inf"/"nan", which are not durations.
    let decimal = text
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.' | 'e' | 'E'));
    if !decimal {
        return None;
    }
    text.parse::<f64>().ok()
}
