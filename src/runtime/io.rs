/// Program input consumed by `read()` and `getc()`.
///
/// The two builtins read the same text through independent cursors: `read()`
/// walks whitespace-separated tokens, `getc()` walks raw characters.
#[derive(Debug, Clone, Default)]
pub struct InputStream {
    chars: Vec<char>,
    token_position: usize,
    char_position: usize,
}

impl InputStream {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            token_position: 0,
            char_position: 0,
        }
    }

    /// Next whitespace-separated token that parses as an integer.
    ///
    /// Tokens that are not integers are consumed and skipped.
    pub fn read_integer(&mut self) -> Option<i64> {
        loop {
            while self
                .chars
                .get(self.token_position)
                .is_some_and(|c| c.is_whitespace())
            {
                self.token_position += 1;
            }
            if self.token_position >= self.chars.len() {
                return None;
            }

            let start = self.token_position;
            while self
                .chars
                .get(self.token_position)
                .is_some_and(|c| !c.is_whitespace())
            {
                self.token_position += 1;
            }
            let token: String = self.chars[start..self.token_position].iter().collect();
            if let Ok(value) = token.parse::<i64>() {
                return Some(value);
            }
        }
    }

    pub fn read_char(&mut self) -> Option<char> {
        let c = self.chars.get(self.char_position).copied()?;
        self.char_position += 1;
        Some(c)
    }
}

/// Text written by a run: `print` appends a line, `putc` a single character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    text: String,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `line` followed by a newline.
    pub fn push(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn push_char(&mut self, c: char) {
        self.text.push(c);
    }

    /// Printed lines; a trailing unterminated line is included.
    pub fn lines(&self) -> Vec<String> {
        self.text.lines().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Everything written, exactly as it goes to stdout.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Input and output of one run.
///
/// Execution borrows it mutably so whatever was printed before a failure is
/// still available to the caller.
#[derive(Debug, Clone, Default)]
pub struct Io {
    pub input: InputStream,
    pub output: Output,
}

impl Io {
    pub fn new(input: &str) -> Self {
        Self {
            input: InputStream::new(input),
            output: Output::new(),
        }
    }
}
