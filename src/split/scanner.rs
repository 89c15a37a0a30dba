use super::parsers::{is_block_comment_end, is_block_comment_start, is_line_comment_start};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    Bracketed,
    LineComment,
    BlockComment,
}

/// Text up to a candidate terminator: a `;` outside literals and comments, or the
/// end of the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Segment {
    /// Byte position just past the terminator
    pub(super) end: usize,
    /// Whether anything besides whitespace and comments precedes the terminator
    pub(super) has_content: bool,
}

pub(super) fn segments(sql: &str) -> Vec<Segment> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut state = State::Normal;
    let mut has_content = false;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b';' => {
                    out.push(Segment {
                        end: idx + 1,
                        has_content,
                    });
                    has_content = false;
                }
                b'\'' => {
                    has_content = true;
                    state = State::SingleQuoted;
                }
                b'"' => {
                    has_content = true;
                    state = State::DoubleQuoted;
                }
                b'`' => {
                    has_content = true;
                    state = State::Backticked;
                }
                b'[' => {
                    has_content = true;
                    state = State::Bracketed;
                }
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment;
                    idx += 1;
                }
                _ if b.is_ascii_whitespace() => {}
                _ => has_content = true,
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backticked => {
                let quote = match state {
                    State::SingleQuoted => b'\'',
                    State::DoubleQuoted => b'"',
                    _ => b'`',
                };
                if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    if out.last().is_none_or(|last| last.end < bytes.len()) {
        out.push(Segment {
            end: bytes.len(),
            has_content,
        });
    }
    out
}
