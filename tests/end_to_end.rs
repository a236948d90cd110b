//! End-to-end scenarios: translate source text and execute it on the machine.
//!
//! Each test drives the full pipeline the CLI wires together (macro
//! expansion, structural parsing, jump resolution, then the fetch/decode/
//! execute loop) and checks the produced output text and termination status.

use sigil::{CompiledProgram, RunOptions, RunReport, RunStatus, simulate, translate};

fn run_source(source: &str, input: &str) -> RunReport {
    let program = translate(source).expect("translation failed");
    simulate(&program, input, &RunOptions::default()).expect("machine faulted")
}

#[test]
fn addition_prints_digits() {
    let report = run_source("1 2 + .", "");
    assert_eq!(report.output, "3");
    assert_eq!(report.instructions, 4);
    assert_eq!(report.status, RunStatus::Halted);
}

#[test]
fn user_word_doubles_a_value() {
    let report = run_source(": double dup + ; 5 double .", "");
    assert_eq!(report.output, "10");
}

#[test]
fn zero_condition_takes_the_else_branch() {
    let report = run_source("0 if 1 . else 2 . then", "");
    assert_eq!(report.output, "2");
}

#[test]
fn nonzero_condition_takes_the_then_branch() {
    let report = run_source("7 if 1 . else 2 . then", "");
    assert_eq!(report.output, "1");
}

#[test]
fn string_literal_prints_its_text() {
    let report = run_source(r#"."hello, world!""#, "");
    assert_eq!(report.output, "hello, world!");
    assert_eq!(report.status, RunStatus::Halted);
}

#[test]
fn string_printing_restores_the_stack() {
    // The value pushed before the literal is still on top afterwards.
    let report = run_source(r#"5 ."ab" ."#, "");
    assert_eq!(report.output, "ab5");
}

#[test]
fn source_text_is_lowercased_before_translation() {
    let report = run_source(r#"."Hi!""#, "");
    assert_eq!(report.output, "hi!");
}

#[test]
fn swap_exchanges_the_top_two_values() {
    let report = run_source("1 2 swap . .", "");
    assert_eq!(report.output, "12");
}

#[test]
fn drop_discards_the_top_value() {
    let report = run_source("1 2 drop .", "");
    assert_eq!(report.output, "1");
}

#[test]
fn countdown_loop_terminates_at_zero() {
    let report = run_source("3 begin 1 swap - dup until .", "");
    assert_eq!(report.output, "0");
    assert_eq!(report.status, RunStatus::Halted);
}

#[test]
fn character_literals_push_code_points() {
    assert_eq!(run_source("'a' .", "").output, "a");
    assert_eq!(run_source("1 . ' ' . 2 .", "").output, "1 2");
}

#[test]
fn input_characters_reach_the_stack() {
    let report = run_source("input .", "A");
    assert_eq!(report.output, "A");
}

#[test]
fn runaway_loop_is_stopped_at_the_limit() {
    let program = translate("begin 1 until").expect("translation failed");
    let options = RunOptions {
        step_limit: 50,
        ..RunOptions::default()
    };
    let report = simulate(&program, "", &options).expect("machine faulted");

    assert_eq!(report.status, RunStatus::LimitReached);
    assert_eq!(report.instructions, 50);
    assert_eq!(report.output, "");
}

#[test]
fn exhausted_input_keeps_prior_output() {
    let report = run_source(r#"."ok" input ."#, "");
    assert_eq!(report.output, "ok");
    assert_eq!(report.status, RunStatus::InputExhausted);
}

#[test]
fn programs_survive_the_json_round_trip() {
    let program = translate(": double dup + ; 5 double .").expect("translation failed");
    let json = program.to_json().expect("serialization failed");
    let reloaded = CompiledProgram::from_json(&json).expect("deserialization failed");
    assert_eq!(reloaded, program);

    let report = simulate(&reloaded, "", &RunOptions::default()).expect("machine faulted");
    assert_eq!(report.output, "10");
}
