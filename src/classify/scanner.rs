#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    LineComment,
    BlockComment(u32),
    Hint(u32),
}

pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'#')
        || (bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-'))
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

pub(super) fn is_hint_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'@') && bytes.get(idx + 1) == Some(&b'{')
}

/// Offset of the first byte that is not whitespace, a comment, an opening parenthesis, or a
/// leading `@{...}` statement hint.
pub(super) fn skip_leading_trivia(bytes: &[u8]) -> usize {
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                if b.is_ascii_whitespace() || b == b'(' {
                    // keep going
                } else if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(1);
                    idx += 1;
                } else if is_hint_start(bytes, idx) {
                    state = State::Hint(1);
                    idx += 1;
                } else {
                    return idx;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::Hint(depth) => match b {
                b'{' => state = State::Hint(depth + 1),
                b'}' if depth == 1 => state = State::Normal,
                b'}' => state = State::Hint(depth - 1),
                _ => {}
            },
        }
        idx += 1;
    }

    bytes.len()
}
