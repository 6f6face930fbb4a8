//! Command-line parsing of the foreman binary's interface.

use clap::Parser;
use foreman::cli::commands::project::ProjectCommands;
use foreman::cli::commands::settings::SettingsCommands;
use foreman::cli::commands::task::TaskCommands;
use foreman::cli::{Cli, Commands};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("foreman").chain(args.iter().copied())).expect("arguments parse")
}

#[test]
fn test_task_add_with_all_options() {
    let cli = parse(&[
        "task", "add", "fix the flaky test", "-p", "3f2a", "-s", "9c", "-m", "gpt-5", "-r", "high", "--context", "3",
        "--paused", "--metadata", r#"{"tag":"ci"}"#,
    ]);

    let Commands::Task(args) = cli.command else { panic!("expected task command") };
    match args.command {
        TaskCommands::Add { text, project, subproject, model, reasoning, context, paused, metadata } => {
            assert_eq!(text, "fix the flaky test");
            assert_eq!(project, "3f2a");
            assert_eq!(subproject.as_deref(), Some("9c"));
            assert_eq!(model.as_deref(), Some("gpt-5"));
            assert_eq!(reasoning.as_deref(), Some("high"));
            assert_eq!(context, Some(3));
            assert!(paused);
            assert_eq!(metadata.as_deref(), Some(r#"{"tag":"ci"}"#));
        }
        other => panic!("unexpected subcommand {other:?}"),
    }
}

#[test]
fn test_task_add_requires_project() {
    assert!(Cli::try_parse_from(["foreman", "task", "add", "orphan"]).is_err());
}

#[test]
fn test_edit_context_flags_conflict() {
    let result = Cli::try_parse_from(["foreman", "task", "edit", "ab12", "--context", "2", "--no-context"]);
    assert!(result.is_err());

    let cli = parse(&["task", "edit", "ab12", "--no-context"]);
    let Commands::Task(args) = cli.command else { panic!("expected task command") };
    assert!(matches!(args.command, TaskCommands::Edit { no_context: true, context: None, .. }));
}

#[test]
fn test_reorder_needs_ids() {
    assert!(Cli::try_parse_from(["foreman", "task", "reorder", "-p", "ab"]).is_err());

    let cli = parse(&["task", "reorder", "-p", "ab", "t1", "t2", "t3"]);
    let Commands::Task(args) = cli.command else { panic!("expected task command") };
    match args.command {
        TaskCommands::Reorder { project, subproject, ids } => {
            assert_eq!(project, "ab");
            assert!(subproject.is_none());
            assert_eq!(ids, ["t1", "t2", "t3"]);
        }
        other => panic!("unexpected subcommand {other:?}"),
    }
}

#[test]
fn test_action_subcommands() {
    for (name, id) in [("pause", "a1"), ("resume", "b2"), ("stop", "c3"), ("rm", "d4")] {
        let cli = parse(&["task", name, id]);
        let Commands::Task(args) = cli.command else { panic!("expected task command") };
        let parsed = match args.command {
            TaskCommands::Pause { id }
            | TaskCommands::Resume { id }
            | TaskCommands::Stop { id }
            | TaskCommands::Rm { id } => id,
            other => panic!("unexpected subcommand {other:?}"),
        };
        assert_eq!(parsed, id);
    }
}

#[test]
fn test_project_update_show_on_main_takes_a_value() {
    let cli = parse(&["project", "update", "ab", "--show-on-main", "false"]);
    let Commands::Project(args) = cli.command else { panic!("expected project command") };
    assert!(matches!(args.command, ProjectCommands::Update { show_on_main: Some(false), .. }));
}

#[test]
fn test_settings_set_and_global_flags() {
    let cli = parse(&["settings", "set", "max_parallel_tasks", "4", "--json", "-v"]);
    assert!(cli.json);
    assert!(cli.verbose);
    let Commands::Settings(args) = cli.command else { panic!("expected settings command") };
    match args.command {
        SettingsCommands::Set { key, value } => {
            assert_eq!(key, "max_parallel_tasks");
            assert_eq!(value, "4");
        }
        other => panic!("unexpected subcommand {other:?}"),
    }
}

#[test]
fn test_daemon_once_and_usage_refresh() {
    let Commands::Daemon(daemon) = parse(&["daemon", "--once"]).command else { panic!("expected daemon") };
    assert!(daemon.once);

    let Commands::Usage(usage) = parse(&["usage", "--refresh"]).command else { panic!("expected usage") };
    assert!(usage.refresh);
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["foreman", "goal", "list"]).is_err());
}
