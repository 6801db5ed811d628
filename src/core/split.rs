//! Forking one input into two independent nested runs.

use std::io::Write;

use crate::defaults::EngineConfig;
use crate::error::Result;
use crate::runner::Runner;
use crate::stage::{report_progress, Stage};
use crate::stages::insert;
use crate::value::PipelineValue;

/// Run `left` and then `right`, each starting from the split's input.
///
/// Every branch is a separate run with its own variable store and tracked
/// files. The left branch completes before the right one starts; a failing
/// left branch means the right branch never runs. The output is
/// `PipelineValue::Split { left, right }`.
pub fn split(left: Vec<Stage>, right: Vec<Stage>) -> Stage {
    split_with(EngineConfig::default(), left, right)
}

/// [`split`] with nested runs using `config`.
pub fn split_with(config: EngineConfig, left: Vec<Stage>, right: Vec<Stage>) -> Stage {
    let runner = Runner::new(config);
    Stage::new("split", move |input, progress: &mut dyn Write| {
        report_progress(progress, "Running left branch");
        let left_value = run_branch(&runner, &input, &left, progress)?;

        report_progress(progress, "Running right branch");
        let right_value = run_branch(&runner, &input, &right, progress)?;

        Ok(PipelineValue::Split {
            left: Box::new(left_value),
            right: Box::new(right_value),
        })
    })
}

fn run_branch(
    runner: &Runner,
    input: &PipelineValue,
    stages: &[Stage],
    progress: &mut dyn Write,
) -> Result<PipelineValue> {
    let mut branch = Vec::with_capacity(stages.len() + 1);
    branch.push(insert(input.clone()));
    branch.extend(stages.iter().cloned());
    runner.execute(Some(progress), &branch).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runner::run;
    use crate::stages::{bind, exec, unmarshal_json};
    use std::sync::{Arc, Mutex};

    fn recording(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Stage {
        let log = Arc::clone(log);
        Stage::new(label, move |input, _| {
            log.lock().unwrap().push(label);
            Ok(input)
        })
    }

    #[test]
    fn both_branches_start_from_the_same_input() {
        let out = run(
            None,
            &[
                insert(r#"{"name": "bob"}"#),
                split(
                    vec![unmarshal_json()],
                    vec![exec("printf '%s' '#{content}' | wc -c | tr -d ' '")],
                ),
            ],
        )
        .unwrap();

        assert_eq!(
            out,
            PipelineValue::Split {
                left: Box::new(PipelineValue::Struct(serde_json::json!({"name": "bob"}))),
                right: Box::new(PipelineValue::bytes(b"15\n".to_vec())),
            }
        );
    }

    #[test]
    fn left_runs_before_right() {
        let log = Arc::new(Mutex::new(Vec::new()));
        run(
            None,
            &[split(
                vec![recording("left", &log)],
                vec![recording("right", &log)],
            )],
        )
        .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["left", "right"]);
    }

    #[test]
    fn failing_left_skips_right() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fail = Stage::new("fail", |_, _| Err(Error::internal_io("left broke", None)));

        let err = run(
            None,
            &[split(vec![fail], vec![recording("right", &log)])],
        )
        .unwrap_err();
        assert_eq!(err.message, "left broke");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_right_reports_right_error() {
        let fail = Stage::new("fail", |_, _| Err(Error::internal_io("right broke", None)));
        let err = run(None, &[insert("x"), split(vec![], vec![fail])]).unwrap_err();
        assert_eq!(err.message, "right broke");
    }

    #[test]
    fn branches_have_independent_bindings() {
        // The same name bound on both sides is not a duplicate.
        let out = run(
            None,
            &[
                insert("v"),
                split(
                    vec![bind("name"), insert(PipelineValue::Empty), exec("echo -n L#{name}")],
                    vec![bind("name"), insert(PipelineValue::Empty), exec("echo -n R#{name}")],
                ),
            ],
        )
        .unwrap();

        assert_eq!(
            out,
            PipelineValue::Split {
                left: Box::new(PipelineValue::bytes(b"Lv".to_vec())),
                right: Box::new(PipelineValue::bytes(b"Rv".to_vec())),
            }
        );
    }

    #[test]
    fn outer_bindings_are_not_visible_in_branches() {
        let out = run(
            None,
            &[
                insert("outer"),
                bind("shared"),
                insert(PipelineValue::Empty),
                split(vec![exec("echo -n '#{shared}'")], vec![]),
            ],
        )
        .unwrap();

        match out {
            PipelineValue::Split { left, right } => {
                assert_eq!(*left, PipelineValue::bytes(b"#{shared}".to_vec()));
                assert_eq!(*right, PipelineValue::Empty);
            }
            other => panic!("expected split result, got {:?}", other),
        }
    }
}
