//! Register contents (^X^R) and buffer names (`f`)

use super::super::leader::{find_word_end, find_word_start, starts_with};
use super::super::provider::{Editor, RegisterStore};
use super::Collector;

/// Add words from every register that start with `typed`. In adding mode
/// whole register lines are offered instead.
pub fn collect_registers(
    registers: &dyn RegisterStore,
    typed: &str,
    adding: bool,
    out: &mut Collector<'_>,
) -> usize {
    let before = out.added;
    let icase = out.icase;
    for content in registers.contents() {
        for line in content.lines() {
            if adding {
                if starts_with(line, typed, icase) {
                    out.add_word(line, None, Default::default(), 0);
                }
                continue;
            }
            let mut pos = 0;
            loop {
                let start = find_word_start(line, pos);
                if start >= line.len() {
                    break;
                }
                let end = find_word_end(line, start);
                let word = &line[start..end];
                if starts_with(word, typed, icase) {
                    out.add_word(word, None, Default::default(), 0);
                }
                pos = end.max(start + 1);
                while pos < line.len() && !line.is_char_boundary(pos) {
                    pos += 1;
                }
            }
        }
    }
    out.added - before
}

/// Add names of the other buffers that start with `typed`, either as a
/// whole or by their last path component.
pub fn collect_buffer_names(editor: &Editor, typed: &str, out: &mut Collector<'_>) -> usize {
    let before = out.added;
    let icase = out.icase;
    for buf in &editor.others {
        let name = buf.name();
        let tail = name.rsplit('/').next().unwrap_or(name);
        if starts_with(name, typed, icase) {
            out.add_word(name, None, Default::default(), 0);
        } else if starts_with(tail, typed, icase) {
            out.add_word(tail, None, Default::default(), 0);
        }
    }
    out.added - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LineBuffer, StaticRegisters};
    use crate::completion::candidate::Direction;
    use crate::completion::mode::ModeState;
    use crate::completion::provider::Position;
    use crate::completion::sources::PollState;
    use crate::completion::store::CandidateStore;

    fn run<F>(f: F) -> Vec<String>
    where
        F: FnOnce(&mut Collector<'_>),
    {
        let mut store = CandidateStore::new();
        let mut poll = PollState::default();
        let mode = ModeState::Idle;
        let mut out = Collector {
            store: &mut store,
            poll: &mut poll,
            keys: None,
            mode: &mode,
            pum_visible: false,
            dir: Direction::Forward,
            icase: false,
            infer_from: None,
            source: None,
            keep_best_score: false,
            added: 0,
        };
        f(&mut out);
        store.iter().map(|(_, c)| c.text.clone()).collect()
    }

    #[test]
    fn test_register_words() {
        let regs = StaticRegisters::new(["let value = compute()", "vector\nvalue"]);
        let words = run(|out| {
            collect_registers(&regs, "v", false, out);
        });
        assert_eq!(words, ["value", "vector"]);
    }

    #[test]
    fn test_register_lines_when_adding() {
        let regs = StaticRegisters::new(["let a = 1;\nlet b = 2;\nfn main()"]);
        let lines = run(|out| {
            collect_registers(&regs, "let", true, out);
        });
        assert_eq!(lines, ["let a = 1;", "let b = 2;"]);
    }

    #[test]
    fn test_buffer_names() {
        let editor = Editor::new(
            Box::new(LineBuffer::from_lines("main.rs", &[""])),
            Position::default(),
        )
        .with_buffers(vec![
            Box::new(LineBuffer::from_lines("src/lib.rs", &[""])),
            Box::new(LineBuffer::from_lines("src/list.rs", &[""])),
            Box::new(LineBuffer::from_lines("README", &[""])),
        ]);
        let names = run(|out| {
            collect_buffer_names(&editor, "li", out);
        });
        assert_eq!(names, ["lib.rs", "list.rs"]);
    }
}
