//! User defined completion callbacks (^X^U, ^X^O and `F`/`o` entries)
//!
//! Callbacks get the live buffer and cursor. Both are snapshotted before the
//! call; if either changed the result is thrown away and the cursor is put
//! back.

use tracing::{debug, warn};

use super::super::candidate::CompletionItem;
use super::super::provider::{
    CallbackContext, CallbackReply, Editor, FindStart, Position, UserCallback,
};
use super::Collector;

/// Result of the find-start probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Start(usize),
    NotNow,
    CancelMode,
    /// The callback changed the buffer or moved the cursor.
    Mutated,
}

/// Result of the completion call.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Items {
        items: Vec<CompletionItem>,
        refresh_always: bool,
    },
    NotNow,
    CancelMode,
    Mutated,
}

struct Snapshot {
    cursor: Position,
    tick: u64,
}

impl Snapshot {
    fn take(editor: &Editor) -> Self {
        Self {
            cursor: editor.cursor,
            tick: editor.buffer.changed_tick(),
        }
    }

    /// Put the cursor back and report whether anything changed.
    fn restore(self, editor: &mut Editor) -> bool {
        let moved = editor.cursor != self.cursor;
        editor.cursor = self.cursor;
        moved || editor.buffer.changed_tick() != self.tick
    }
}

/// Ask `cb` where completion starts.
pub fn probe_start(name: &str, cb: &mut dyn UserCallback, editor: &mut Editor) -> Probe {
    let snapshot = Snapshot::take(editor);
    let cursor_col = editor.cursor.col;
    let reply = {
        let mut ctx = CallbackContext {
            buffer: editor.buffer.as_mut(),
            cursor: &mut editor.cursor,
        };
        cb.find_start(&mut ctx)
    };
    if snapshot.restore(editor) {
        warn!("completion function {name} changed the text during find-start");
        return Probe::Mutated;
    }
    match reply {
        FindStart::Column(col) if col <= cursor_col => Probe::Start(col),
        FindStart::Column(_) | FindStart::Cursor => Probe::Start(cursor_col),
        FindStart::NotNow => Probe::NotNow,
        FindStart::CancelMode => Probe::CancelMode,
    }
}

/// Ask `cb` for the matches of `base`.
pub fn fetch(name: &str, cb: &mut dyn UserCallback, base: &str, editor: &mut Editor) -> Fetch {
    let snapshot = Snapshot::take(editor);
    let reply = {
        let mut ctx = CallbackContext {
            buffer: editor.buffer.as_mut(),
            cursor: &mut editor.cursor,
        };
        cb.complete(base, &mut ctx)
    };
    if snapshot.restore(editor) {
        warn!("completion function {name} changed the text");
        return Fetch::Mutated;
    }
    match reply {
        CallbackReply::List(items) => Fetch::Items {
            items,
            refresh_always: false,
        },
        CallbackReply::Mapping {
            words,
            refresh_always,
        } => Fetch::Items {
            items: words,
            refresh_always,
        },
        CallbackReply::NotNow => Fetch::NotNow,
        CallbackReply::CancelMode => Fetch::CancelMode,
    }
}

/// Add callback items to the ring. Returns how many were new.
pub fn add_items(items: Vec<CompletionItem>, out: &mut Collector<'_>) -> usize {
    let before = out.added;
    let total = items.len();
    for item in items {
        if let Some(cand) = item.into_candidate(false) {
            out.add(cand);
        }
    }
    debug!(total, added = out.added - before, "callback items");
    out.added - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LineBuffer;
    use crate::completion::provider::{FnCallback, WordListCallback};

    fn editor(line: &str) -> Editor {
        let col = line.len();
        Editor::new(
            Box::new(LineBuffer::from_lines("main", &[line])),
            Position::new(0, col),
        )
    }

    #[test]
    fn test_probe_clamps_to_cursor() {
        let mut ed = editor("abc");
        let mut cb = FnCallback::new(
            |_ctx: &mut CallbackContext<'_>| FindStart::Column(10),
            |_: &str, _: &mut CallbackContext<'_>| CallbackReply::NotNow,
        );
        assert_eq!(probe_start("f", &mut cb, &mut ed), Probe::Start(3));

        let mut cb = WordListCallback::new(["abcdef"]);
        assert_eq!(probe_start("w", &mut cb, &mut ed), Probe::Start(0));
    }

    #[test]
    fn test_probe_detects_mutation() {
        let mut ed = editor("abc");
        let mut cb = FnCallback::new(
            |ctx: &mut CallbackContext<'_>| {
                ctx.buffer
                    .replace_range(Position::new(0, 0), Position::new(0, 1), "");
                FindStart::Cursor
            },
            |_: &str, _: &mut CallbackContext<'_>| CallbackReply::NotNow,
        );
        assert_eq!(probe_start("f", &mut cb, &mut ed), Probe::Mutated);

        let mut ed = editor("abc");
        let mut cb = FnCallback::new(
            |ctx: &mut CallbackContext<'_>| {
                ctx.cursor.col = 0;
                FindStart::Cursor
            },
            |_: &str, _: &mut CallbackContext<'_>| CallbackReply::NotNow,
        );
        assert_eq!(probe_start("f", &mut cb, &mut ed), Probe::Mutated);
        // the cursor is put back
        assert_eq!(ed.cursor, Position::new(0, 3));
    }

    #[test]
    fn test_fetch_mapping() {
        let mut ed = editor("x");
        let mut cb = FnCallback::new(
            |_: &mut CallbackContext<'_>| FindStart::Cursor,
            |base: &str, _: &mut CallbackContext<'_>| CallbackReply::Mapping {
                words: vec![CompletionItem::word(format!("{base}1"))],
                refresh_always: true,
            },
        );
        assert_eq!(
            fetch("f", &mut cb, "x", &mut ed),
            Fetch::Items {
                items: vec![CompletionItem::word("x1")],
                refresh_always: true
            }
        );
    }
}
