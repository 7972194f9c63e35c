//! Scenario tests: keys fed to an engine over an in-memory buffer.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use super::*;
use crate::backend::{KeyQueue, LineBuffer, StaticRegisters, TagFile};
use crate::config::CompletionConfig;

fn engine_with(lines: &[&str], cursor: Position, cfg: CompletionConfig) -> CompletionEngine {
    let editor = Editor::new(Box::new(LineBuffer::from_lines("main", lines)), cursor);
    CompletionEngine::new(cfg, editor, Collaborators::default()).unwrap()
}

fn engine(lines: &[&str], cursor: Position) -> CompletionEngine {
    engine_with(lines, cursor, CompletionConfig::default())
}

fn with_opts(completeopt: &str) -> CompletionConfig {
    CompletionConfig {
        completeopt: completeopt.to_string(),
        ..Default::default()
    }
}

fn press(engine: &mut CompletionEngine, keys: &str) {
    engine.feed_keys(&parse_keys(keys).unwrap()).unwrap();
}

fn line(engine: &CompletionEngine) -> String {
    engine.editor().current_line().to_string()
}

fn menu_words(engine: &CompletionEngine) -> Vec<String> {
    engine
        .complete_info()
        .items
        .into_iter()
        .map(|item| item.word)
        .collect()
}

#[test]
fn test_ctrl_n_cycles_back_to_original() {
    let mut e = engine(&["hello help held", "he"], Position::new(1, 2));

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hello");
    assert_eq!(e.status_message(), Some("match 1 of 3"));
    let info = e.complete_info();
    assert!(info.pum_visible);
    assert_eq!(info.mode, "keyword");
    assert_eq!(info.selected, 0);
    assert_eq!(menu_words(&e), ["hello", "help", "held"]);

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "help");
    assert_eq!(e.status_message(), Some("match 2 of 3"));

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "held");

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "he");
    assert_eq!(e.status_message(), Some("Back at original"));
    assert!(e.is_active());
}

#[test]
fn test_ctrl_y_accepts() {
    let mut e = engine(&["hello help held", "he"], Position::new(1, 2));
    press(&mut e, "<C-N><C-Y>");

    assert_eq!(line(&e), "hello");
    assert!(!e.is_active());
    let done = e.events().last().unwrap();
    assert_eq!(done.word, "hello");
    assert_eq!(done.mode, "keyword");
    assert_eq!(done.reason, DoneReason::Accept);
}

#[test]
fn test_ctrl_e_restores_typed_text() {
    let mut e = engine(&["hello help held", "he"], Position::new(1, 2));
    press(&mut e, "<C-N><C-E>");

    assert_eq!(line(&e), "he");
    assert!(!e.is_active());
    assert_eq!(e.events().last().unwrap().reason, DoneReason::Cancel);
}

#[test]
fn test_done_listener_is_called() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut e = engine(&["hello help held", "he"], Position::new(1, 2));
    let sink = Rc::clone(&seen);
    e.on_complete_done(move |done: &CompleteDone| sink.borrow_mut().push(done.word.clone()));

    press(&mut e, "<C-N><C-N><C-Y>");
    assert_eq!(*seen.borrow(), ["help"]);
}

#[test]
fn test_typing_narrows_menu_without_insert() {
    let mut e = engine_with(
        &["hello help world", "he"],
        Position::new(1, 2),
        with_opts("menu,menuone,noinsert"),
    );

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "he");
    assert_eq!(menu_words(&e), ["hello", "help"]);
    assert_eq!(e.complete_info().selected, 0);

    press(&mut e, "l");
    assert_eq!(line(&e), "hel");
    assert_eq!(e.current_leader(), "hel");
    assert_eq!(menu_words(&e), ["hello", "help"]);

    press(&mut e, "p");
    assert_eq!(line(&e), "help");
    assert_eq!(menu_words(&e), ["help"]);
    assert_eq!(e.complete_info().selected, 0);

    press(&mut e, "<CR>");
    assert_eq!(line(&e), "help");
    assert_eq!(e.editor().buffer.line_count(), 2);
    let done = e.events().last().unwrap();
    assert_eq!(done.word, "help");
    assert_eq!(done.reason, DoneReason::Accept);
}

#[test]
fn test_backspace_widens_menu() {
    let mut e = engine_with(
        &["hello help world", "he"],
        Position::new(1, 2),
        with_opts("menu,menuone,noinsert"),
    );

    press(&mut e, "<C-N>lp");
    assert_eq!(menu_words(&e), ["help"]);

    press(&mut e, "<BS>");
    assert_eq!(line(&e), "hel");
    assert_eq!(e.current_leader(), "hel");
    assert_eq!(menu_words(&e), ["hello", "help"]);
    assert!(e.is_active());
}

#[test]
fn test_callback_sources_respect_caps() {
    let cfg = CompletionConfig {
        complete: "Fa^1,Fb".to_string(),
        ..Default::default()
    };
    let mut e = engine_with(&["al"], Position::new(0, 2), cfg);
    let collab = e.collaborators_mut();
    collab.register_callback("a", Box::new(WordListCallback::new(["alpha", "alpine", "altitude"])));
    collab.register_callback("b", Box::new(WordListCallback::new(["always"])));

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "alpha");
    assert_eq!(menu_words(&e), ["alpha", "always"]);
    assert_eq!(e.status_message(), Some("match 1 of 4"));
}

#[test]
fn test_typed_key_interrupts_scan() {
    let mut e = engine(&["hello help held", "he"], Position::new(1, 2));
    let handle = KeyQueue::from_keys([Key::Char('x')]);
    e.collaborators_mut().keys = Some(Box::new(handle.clone()));

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hello");
    assert_eq!(e.status_message(), Some("match 1"));
    assert!(!e.complete_info().pum_visible);

    // the typed key is handled by the caller, the scan resumes on ^N
    let mut source = handle.clone();
    assert_eq!(source.take_key(), Some(Key::Char('x')));
    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "help");
    assert_eq!(e.status_message(), Some("match 2 of 3"));
}

#[test]
fn test_callback_deleting_text_is_an_error() {
    let cfg = CompletionConfig {
        completefunc: Some("bad".to_string()),
        ..Default::default()
    };
    let mut e = engine_with(&["ab"], Position::new(0, 2), cfg);
    let bad = FnCallback::new(
        |ctx: &mut CallbackContext<'_>| {
            ctx.buffer.mark_changed();
            FindStart::Column(0)
        },
        |_base: &str, _ctx: &mut CallbackContext<'_>| CallbackReply::List(Vec::new()),
    );
    e.collaborators_mut().register_callback("bad", Box::new(bad));

    press(&mut e, "<C-X><C-U>");
    assert_eq!(e.error_message(), Some("E840: Completion function deleted text"));
    assert_eq!(line(&e), "ab");
}

#[test]
fn test_empty_dictionary_option() {
    let mut e = engine(&["ap"], Position::new(0, 2));
    press(&mut e, "<C-X><C-K>");
    assert_eq!(e.error_message(), Some("'dictionary' option is empty"));
    assert_eq!(line(&e), "ap");
    assert!(!e.is_active());
}

#[test]
fn test_dictionary_words() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("words");
    fs::write(&path, "apple\napricot\nbanana\n").unwrap();
    let cfg = CompletionConfig {
        dictionary: vec![path.display().to_string()],
        ..Default::default()
    };
    let mut e = engine_with(&["ap"], Position::new(0, 2), cfg);

    press(&mut e, "<C-X><C-K>");
    assert_eq!(line(&e), "apple");
    assert_eq!(e.status_message(), Some("match 1 of 2"));
    assert_eq!(e.complete_info().mode, "dictionary");
    assert_eq!(menu_words(&e), ["apple", "apricot"]);

    press(&mut e, "<C-K>");
    assert_eq!(line(&e), "apricot");
}

#[test]
fn test_ctrl_x_waits_for_submode() {
    let mut e = engine(&["ab"], Position::new(0, 2));
    press(&mut e, "<C-X>");
    assert_eq!(*e.mode(), ModeState::Selecting);
    assert!(e.mode_message().is_some());

    press(&mut e, "<C-Z>");
    assert_eq!(*e.mode(), ModeState::Idle);
    assert_eq!(e.mode_message(), None);
    assert_eq!(line(&e), "ab");
}

#[test]
fn test_whole_line_searches_backward() {
    let mut e = engine(&["  let x = 1;", "let y = 2;", "  le"], Position::new(2, 4));

    press(&mut e, "<C-X><C-L>");
    assert_eq!(line(&e), "  let y = 2;");
    assert_eq!(e.complete_info().mode, "whole_line");

    press(&mut e, "<C-L>");
    assert_eq!(line(&e), "  let x = 1;");
}

#[test]
fn test_adding_continues_with_following_word() {
    let mut e = engine(&["the quick brown fox", "the q"], Position::new(1, 5));

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "the quick");

    press(&mut e, "<C-X><C-N>");
    assert_eq!(line(&e), "the quick brown");
    assert!(e.mode_message().unwrap().contains("Adding"));
}

#[test]
fn test_register_words() {
    let mut e = engine(&["va"], Position::new(0, 2));
    e.collaborators_mut().registers = Some(Box::new(StaticRegisters::new(["let value = compute()"])));

    press(&mut e, "<C-X><C-R>");
    assert_eq!(line(&e), "value");
    assert_eq!(e.status_message(), Some("The only match"));
}

#[test]
fn test_tags_respect_case() {
    let mut e = engine(&["par"], Position::new(0, 3));
    e.collaborators_mut().tags = Some(Box::new(TagFile::parse(
        "parse_args\tsrc/cli.rs\t/^fn parse_args/;\"\tf\nParser\tsrc/parser.rs\t12;\"\ts\n",
    )));

    press(&mut e, "<C-X><C-]>");
    assert_eq!(line(&e), "parse_args");
}

struct Commands;

impl CommandGrammar for Commands {
    fn find_start(&self, line: &str, col: usize) -> usize {
        line[..col].rfind(' ').map_or(0, |i| i + 1)
    }

    fn expand(&self, _line: &str, prefix: &str) -> Vec<String> {
        ["edit", "echo", "write"]
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(|c| c.to_string())
            .collect()
    }
}

#[test]
fn test_cmdline_expansion() {
    let mut e = engine(&["e"], Position::new(0, 1));
    e.collaborators_mut().cmdline = Some(Box::new(Commands));

    press(&mut e, "<C-X><C-V>");
    assert_eq!(line(&e), "edit");
    assert_eq!(e.complete_info().mode, "cmdline");
    assert_eq!(menu_words(&e), ["edit", "echo"]);
    assert_eq!(e.status_message(), Some("match 1 of 2"));
}

#[test]
fn test_set_completion_from_caller() {
    let mut e = engine(&["x"], Position::new(0, 1));
    e.set_completion(0, vec![CompletionItem::word("apple"), CompletionItem::word("apricot")])
        .unwrap();

    assert_eq!(line(&e), "apple");
    let info = e.complete_info();
    assert_eq!(info.mode, "eval");
    assert!(info.pum_visible);
    assert_eq!(info.selected, 0);
    assert_eq!(menu_words(&e), ["apple", "apricot"]);

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "apricot");
}

#[test]
fn test_ctrl_p_walks_backward() {
    let mut e = engine(&["hello help held", "he"], Position::new(1, 2));

    press(&mut e, "<C-P>");
    assert_eq!(line(&e), "held");
    press(&mut e, "<C-P>");
    assert_eq!(line(&e), "help");
    press(&mut e, "<C-P>");
    assert_eq!(line(&e), "hello");
    press(&mut e, "<C-P>");
    assert_eq!(line(&e), "he");
    assert!(e.is_active());
}

#[test]
fn test_noselect_starts_on_typed_text() {
    let mut e = engine_with(
        &["hello help held", "he"],
        Position::new(1, 2),
        with_opts("menu,menuone,noselect"),
    );

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "he");
    let info = e.complete_info();
    assert!(info.pum_visible);
    assert_eq!(info.selected, -1);
    assert_eq!(menu_words(&e), ["hello", "help", "held"]);

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hello");
    assert_eq!(e.complete_info().selected, 0);
}

#[test]
fn test_longest_inserts_common_text() {
    let mut e = engine_with(
        &["hello helmet helper", "he"],
        Position::new(1, 2),
        with_opts("menu,longest"),
    );

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hel");
    assert_eq!(e.current_leader(), "hel");
    assert_eq!(menu_words(&e), ["hello", "helmet", "helper"]);

    press(&mut e, "p");
    assert_eq!(line(&e), "help");
    assert_eq!(menu_words(&e), ["helper"]);

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "helper");
}

#[test]
fn test_preinsert_keeps_cursor_after_leader() {
    let mut e = engine_with(
        &["hello help held", "he"],
        Position::new(1, 2),
        with_opts("menu,menuone,preinsert"),
    );

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hello");
    assert_eq!(e.editor().cursor.col, 2);

    // typing narrows and previews the rest of the match again
    press(&mut e, "l");
    assert_eq!(line(&e), "hello");
    assert_eq!(e.current_leader(), "hel");
    assert_eq!(e.editor().cursor.col, 3);

    press(&mut e, "<C-Y>");
    assert_eq!(line(&e), "hello");
    assert_eq!(e.editor().cursor.col, 5);
    let done = e.events().last().unwrap();
    assert_eq!(done.word, "hello");
    assert_eq!(done.reason, DoneReason::Accept);
}

#[test]
fn test_fuzzy_filters_and_ranks_by_score() {
    let mut e = engine_with(
        &["hello happy help", "h"],
        Position::new(1, 1),
        with_opts("menu,menuone,noinsert,fuzzy"),
    );

    press(&mut e, "<C-N>");
    assert_eq!(menu_words(&e), ["hello", "happy", "help"]);

    // "hp" is no prefix of anything, but a subsequence of two words
    press(&mut e, "p");
    assert_eq!(line(&e), "hp");
    assert_eq!(menu_words(&e), ["help", "happy"]);
    assert_eq!(e.complete_info().selected, 0);

    press(&mut e, "<C-Y>");
    assert_eq!(line(&e), "help");
}

#[test]
fn test_nearest_prefers_closer_lines() {
    let mut e = engine_with(
        &["hello", "", "", "help", "he"],
        Position::new(4, 2),
        with_opts("menu,nearest"),
    );

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "help");
    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hello");
    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "he");
}

#[test]
fn test_infercase_adjusts_matches() {
    let cfg = CompletionConfig {
        ignorecase: true,
        infercase: true,
        ..Default::default()
    };
    let mut e = engine_with(&["Hello HELP", "he"], Position::new(1, 2), cfg);

    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "hello");
    press(&mut e, "<C-N>");
    assert_eq!(line(&e), "help");
}

#[test]
fn test_smartcase_applies_to_typed_leader() {
    let cfg = CompletionConfig {
        ignorecase: true,
        smartcase: true,
        completeopt: "menu,menuone,noinsert".to_string(),
        ..Default::default()
    };

    let mut e = engine_with(&["hello Help", "he"], Position::new(1, 2), cfg.clone());
    press(&mut e, "<C-N>");
    assert_eq!(menu_words(&e), ["hello", "Help"]);
    press(&mut e, "l");
    assert_eq!(menu_words(&e), ["hello", "Help"]);

    // an upper case letter in the leader makes the match case sensitive
    let mut e = engine_with(&["hello Help", "he"], Position::new(1, 2), cfg);
    press(&mut e, "<C-N>L");
    assert_eq!(line(&e), "heL");
    assert_eq!(e.current_leader(), "heL");
    assert!(!e.complete_info().pum_visible);
}

#[test]
fn test_refresh_always_source_is_asked_again() {
    let cfg = CompletionConfig {
        complete: "Fr".to_string(),
        completeopt: "menu,menuone,noinsert".to_string(),
        ..Default::default()
    };
    let mut e = engine_with(&["al"], Position::new(0, 2), cfg);
    let bases = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&bases);
    let refreshing = FnCallback::new(
        |_ctx: &mut CallbackContext<'_>| FindStart::Column(0),
        move |base: &str, _ctx: &mut CallbackContext<'_>| {
            seen.borrow_mut().push(base.to_string());
            let words = ["alpha", "alpine", "altitude"]
                .into_iter()
                .filter(|w| w.starts_with(base))
                .map(CompletionItem::word)
                .collect();
            CallbackReply::Mapping {
                words,
                refresh_always: true,
            }
        },
    );
    e.collaborators_mut().register_callback("r", Box::new(refreshing));

    press(&mut e, "<C-N>");
    assert_eq!(menu_words(&e), ["alpha", "alpine", "altitude"]);

    press(&mut e, "p");
    assert_eq!(line(&e), "alp");
    assert_eq!(menu_words(&e), ["alpha", "alpine"]);
    assert_eq!(*bases.borrow(), ["al", "alp"]);
}
