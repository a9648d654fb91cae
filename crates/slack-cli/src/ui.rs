use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

const TTY_PATH: &str = "/dev/tty";

/// One entry of a pick list. `value` is what the caller acts on (token, channel id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub label: String,
    pub description: Option<String>,
    pub value: String,
}

impl PickItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            value: value.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.label.to_lowercase().contains(&query)
            || self
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(&query))
    }

    fn matches_preset(&self, preset: &str) -> bool {
        let preset = normalize_preset(preset);
        [Some(self.label.as_str()), Some(self.value.as_str()), self.description.as_deref()]
            .into_iter()
            .flatten()
            .any(|candidate| normalize_preset(candidate) == preset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Message,
    SnoozeMinutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickKind {
    Workspace,
    Channel,
}

/// Host surfaces the dispatcher suspends on.
///
/// `None` from `prompt`/`pick` means the user dismissed it.
pub trait HostUi {
    fn prompt(&mut self, kind: PromptKind, placeholder: &str) -> Option<String>;
    fn pick(&mut self, kind: PickKind, items: &[PickItem], placeholder: &str) -> Option<PickItem>;
    fn show_error(&mut self, message: &str);
    fn selection(&mut self) -> Option<String>;
}

/// Answers supplied up front on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presets {
    pub text: Option<String>,
    pub minutes: Option<String>,
    pub workspace: Option<String>,
    pub channel: Option<String>,
    pub selection: Option<String>,
}

pub struct TerminalUi<R, W> {
    input: R,
    output: W,
    presets: Presets,
}

impl TerminalUi<Box<dyn BufRead>, io::Stderr> {
    /// Reads answers from the controlling terminal so stdin can carry a selection.
    pub fn open(presets: Presets) -> Self {
        let input: Box<dyn BufRead> = match File::open(TTY_PATH) {
            Ok(tty) => Box::new(BufReader::new(tty)),
            Err(_) => Box::new(BufReader::new(io::stdin())),
        };

        Self::new(input, io::stderr(), presets)
    }
}

impl<R: BufRead, W: Write> TerminalUi<R, W> {
    pub fn new(input: R, output: W, presets: Presets) -> Self {
        Self {
            input,
            output,
            presets,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn read_answer(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.output, "{line}");
    }

    fn write_prompt(&mut self, text: &str) {
        let _ = write!(self.output, "{text}");
        let _ = self.output.flush();
    }

    fn interactive_pick(&mut self, items: &[PickItem], placeholder: &str) -> Option<PickItem> {
        let mut visible: Vec<&PickItem> = items.iter().collect();

        loop {
            for (index, item) in visible.iter().enumerate() {
                let line = match &item.description {
                    Some(description) => format!("{:>3}. {}  ({description})", index + 1, item.label),
                    None => format!("{:>3}. {}", index + 1, item.label),
                };
                self.write_line(&line);
            }
            self.write_prompt(&format!("{placeholder} (number or filter, blank to cancel): "));

            let answer = self.read_answer()?;
            let answer = answer.trim();
            if answer.is_empty() {
                return None;
            }

            if let Ok(number) = answer.parse::<usize>() {
                if (1..=visible.len()).contains(&number) {
                    return Some(visible[number - 1].clone());
                }
            }

            let narrowed = filter_items(&visible, answer);
            if narrowed.is_empty() {
                self.write_line(&format!("no match for '{answer}'"));
            } else if narrowed.len() == 1 {
                return Some(narrowed[0].clone());
            } else {
                visible = narrowed;
            }
        }
    }
}

impl<R: BufRead, W: Write> HostUi for TerminalUi<R, W> {
    fn prompt(&mut self, kind: PromptKind, placeholder: &str) -> Option<String> {
        let preset = match kind {
            PromptKind::Message => self.presets.text.take(),
            PromptKind::SnoozeMinutes => self.presets.minutes.take(),
        };
        if preset.is_some() {
            return preset;
        }

        self.write_prompt(&format!("{placeholder}: "));
        self.read_answer()
    }

    fn pick(&mut self, kind: PickKind, items: &[PickItem], placeholder: &str) -> Option<PickItem> {
        if items.is_empty() {
            self.write_line(&format!("{placeholder}: nothing to choose from"));
            return None;
        }

        let preset = match kind {
            PickKind::Workspace => self.presets.workspace.take(),
            PickKind::Channel => self.presets.channel.take(),
        };
        if let Some(preset) = preset {
            if let Some(item) = items.iter().find(|item| item.matches_preset(&preset)) {
                return Some(item.clone());
            }
            self.write_line(&format!("no entry matches '{preset}'"));
        }

        self.interactive_pick(items, placeholder)
    }

    fn show_error(&mut self, message: &str) {
        self.write_line(&format!("error: {message}"));
    }

    fn selection(&mut self) -> Option<String> {
        self.presets.selection.take()
    }
}

pub fn filter_items<'a>(items: &[&'a PickItem], query: &str) -> Vec<&'a PickItem> {
    items
        .iter()
        .copied()
        .filter(|item| item.matches_query(query))
        .collect()
}

fn normalize_preset(raw: &str) -> String {
    raw.trim().trim_start_matches(['#', '@']).to_lowercase()
}
