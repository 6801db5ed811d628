use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use pipewright::definition::PipelineDefinition;
use pipewright::io::OpenMode;
use pipewright::stages::{
    bind, exclude_lines, exec, insert, load_file_handle, marshal_json, read_file, unmarshal_json,
    write_file, write_temp_file, write_temp_file_with,
};
use pipewright::{run, split, EngineConfig, Error, PipelineValue, Runner, Stage};

static PREFIX_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A temporary prefix no other test uses, so residue can be counted exactly.
fn unique_prefix() -> String {
    format!(
        "pipewright-it-{}-{}-",
        std::process::id(),
        PREFIX_COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

fn residue(prefix: &str) -> usize {
    fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .count()
}

fn runner_with_prefix(prefix: &str) -> Runner {
    Runner::new(EngineConfig {
        temp_prefix: prefix.to_string(),
        ..EngineConfig::default()
    })
}

#[test]
fn bound_variable_is_substituted_into_command() {
    let out = run(
        None,
        &[
            insert("hello"),
            bind("greeting"),
            insert(PipelineValue::Empty),
            exec(r##"echo -n "#{greeting}""##),
        ],
    )
    .unwrap();
    assert_eq!(out, PipelineValue::bytes(b"hello".to_vec()));
}

#[test]
fn command_output_can_be_filtered_by_line() {
    let out = run(
        None,
        &[
            exec(r#"echo -e "hi\nthere and here\nyou""#),
            exclude_lines("\n", &["hi", "there"]),
        ],
    )
    .unwrap();
    assert_eq!(out, PipelineValue::text("you\n"));
}

#[test]
fn temp_file_path_is_available_as_file_placeholder() {
    let out = run(None, &[insert("hello"), write_temp_file(), exec("cat #{file}")]).unwrap();
    assert_eq!(out, PipelineValue::bytes(b"hello".to_vec()));
}

#[test]
fn temp_file_can_be_bound_and_read_later() {
    let out = run(
        None,
        &[
            insert("saved content"),
            write_temp_file(),
            bind("tmp"),
            insert(PipelineValue::Empty),
            exec("cat #{tmp}"),
        ],
    )
    .unwrap();
    assert_eq!(out, PipelineValue::bytes(b"saved content".to_vec()));
}

#[test]
fn loaded_file_handle_feeds_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.txt");
    fs::write(&path, "from disk").unwrap();

    let out = run(None, &[load_file_handle(&path, OpenMode::Read), exec("cat #{file}")]).unwrap();
    assert_eq!(out, PipelineValue::bytes(b"from disk".to_vec()));
    assert!(path.exists());
}

#[test]
fn missing_command_reports_exit_status() {
    let err = run(None, &[exec("pipewright-definitely-not-a-command")]).unwrap_err();
    assert_eq!(err.message, "exit status 127");
    assert_eq!(err.details["exitCode"], 127);
}

#[test]
fn temp_files_are_removed_after_success() {
    let prefix = unique_prefix();
    let stages: Vec<Stage> = (0..5)
        .flat_map(|i| vec![insert(format!("file {}", i)), write_temp_file_with(prefix.clone())])
        .collect();

    let outcome = runner_with_prefix(&prefix).execute(None, &stages);
    assert!(outcome.is_success());
    assert_eq!(outcome.stats.files_deleted, 5);
    assert_eq!(residue(&prefix), 0);
}

#[test]
fn temp_files_are_removed_after_failure() {
    let prefix = unique_prefix();
    let stages = vec![
        insert("one"),
        write_temp_file_with(prefix.clone()),
        insert("two"),
        write_temp_file_with(prefix.clone()),
        exec("exit 3"),
        insert("three"),
        write_temp_file_with(prefix.clone()),
    ];

    let outcome = runner_with_prefix(&prefix).execute(None, &stages);
    assert_eq!(outcome.error.unwrap().message, "exit status 3");
    assert_eq!(outcome.stats.files_deleted, 2);
    assert_eq!(residue(&prefix), 0);
}

#[test]
fn persistent_file_written_by_pipeline_survives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");

    let out = run(
        None,
        &[
            insert(r#"{"status": "ok"}"#),
            unmarshal_json(),
            marshal_json(),
            write_file(&path),
            read_file(&path),
        ],
    )
    .unwrap();
    assert_eq!(out, PipelineValue::bytes(br#"{"status":"ok"}"#.to_vec()));
    assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"status":"ok"}"#);
}

#[test]
fn split_runs_both_branches_on_the_same_input() {
    let out = run(
        None,
        &[
            insert("shared"),
            split(
                vec![exec("printf 'left:%s' '#{content}'")],
                vec![exec("printf 'right:%s' '#{content}'")],
            ),
        ],
    )
    .unwrap();

    assert_eq!(
        out,
        PipelineValue::Split {
            left: Box::new(PipelineValue::bytes(b"left:shared".to_vec())),
            right: Box::new(PipelineValue::bytes(b"right:shared".to_vec())),
        }
    );
}

#[test]
fn split_left_failure_skips_right_branch() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("right-ran");

    let err = run(
        None,
        &[
            insert("x"),
            split(
                vec![exec("exit 4")],
                vec![exec(format!("touch {}", marker.display()))],
            ),
        ],
    )
    .unwrap_err();

    assert_eq!(err.message, "exit status 4");
    assert!(!marker.exists());
}

#[test]
fn progress_includes_command_output() {
    let mut progress = Vec::new();
    run(Some(&mut progress), &[exec("echo streamed; echo oops >&2")]).unwrap();

    let text = String::from_utf8(progress).unwrap();
    assert!(text.contains("Executing command: echo streamed"));
    assert!(text.contains("streamed"));
    assert!(text.contains("oops"));
}

#[test]
fn definition_file_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let def_path = dir.path().join("pipeline.json");
    fs::write(
        &def_path,
        r##"{
            "description": "greeting",
            "stages": [
                {"type": "insert", "value": "world"},
                {"type": "bind", "name": "who"},
                {"type": "insert", "value": "hi\nhello #{who}\n"},
                {"type": "write_temp_file"},
                {"type": "exec", "command": "cat #{file}"},
                {"type": "exclude_lines", "exclude": ["hi"]}
            ]
        }"##,
    )
    .unwrap();

    let definition = PipelineDefinition::load(&def_path).unwrap();
    let config = EngineConfig::default();
    assert!(definition.check(&config).unwrap().warnings.is_empty());

    let out = Runner::new(config.clone())
        .execute(None, &definition.build(&config))
        .into_result()
        .unwrap();
    // Substitution applies to the command, not to file contents.
    assert_eq!(out, PipelineValue::text("hello #{who}\n"));
}

#[test]
fn unsupported_bound_value_fails_command() {
    let err: Error = run(
        None,
        &[
            insert(PipelineValue::Struct(serde_json::json!({"a": 1}))),
            bind("data"),
            insert(PipelineValue::Empty),
            exec("echo #{data}"),
        ],
    )
    .unwrap_err();
    assert_eq!(err.code.as_str(), "type.unsupported_variable");
}
