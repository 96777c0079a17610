use super::*;

use std::path::Path;

use crate::infer::{plan_from_files, simulate};

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["simgraph-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["simgraph-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["simgraph-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn recompute_defaults_to_writing() {
    let cli = Cli::try_parse_from(["simgraph-cli", "recompute"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Recompute { dry_run: false })
    ));
}

#[test]
fn recompute_accepts_dry_run() {
    let cli = Cli::try_parse_from(["simgraph-cli", "recompute", "--dry-run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Recompute { dry_run: true })
    ));
}

#[test]
fn parses_graph_command() {
    let cli = Cli::try_parse_from(["simgraph-cli", "graph"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Graph)));
}

#[test]
fn infer_requires_posts_file() {
    assert!(Cli::try_parse_from(["simgraph-cli", "infer"]).is_err());
}

#[test]
fn infer_parses_all_options() {
    let cli = Cli::try_parse_from([
        "simgraph-cli",
        "infer",
        "--posts",
        "posts.json",
        "--prior",
        "edges.json",
        "--threshold",
        "0.5",
        "--simulate",
    ])
    .unwrap();
    let Some(Commands::Infer {
        posts,
        prior,
        threshold,
        lexicon,
        simulate,
    }) = cli.command
    else {
        panic!("expected infer command");
    };
    assert_eq!(posts, Path::new("posts.json"));
    assert_eq!(prior.as_deref(), Some(Path::new("edges.json")));
    assert_eq!(threshold, Some(0.5));
    assert!(lexicon.is_none());
    assert!(simulate);
}

#[test]
fn infer_rejects_threshold_outside_unit_interval() {
    for bad in ["1.5", "-0.1", "high"] {
        assert!(
            Cli::try_parse_from(["simgraph-cli", "infer", "--posts", "p.json", "--threshold", bad])
                .is_err(),
            "threshold {bad} should be rejected"
        );
    }
}

/// Write `contents` to a file unique to this test process.
fn fixture(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("simgraph-cli-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

const POSTS: &str = r#"[
    {"id": "p1", "author_id": "alice", "author_name": "Alice", "text": "I love this new trail"},
    {"id": "p2", "author_id": "bob", "text": "Love this trail so much"},
    {"id": "p3", "author_id": "carol", "text": "Traffic was terrible today"}
]"#;

#[test]
fn plan_from_files_infers_edges_and_retractions() {
    let posts = fixture("plan-posts.json", POSTS);
    let prior = fixture(
        "plan-prior.json",
        r#"[{"user_a": "bob", "user_b": "carol", "score": 0.4, "label": "neutral"}]"#,
    );
    let plan = plan_from_files(&InferOptions {
        posts,
        prior: Some(prior),
        threshold: Some(0.3),
        lexicon: None,
        simulate: false,
    })
    .unwrap();

    assert_eq!(plan.users.len(), 3);
    assert_eq!(plan.users[0].name, "Alice");
    assert_eq!(plan.edges_upsert.len(), 1);
    let edge = &plan.edges_upsert[0];
    assert_eq!(edge.pair.user_a(), "alice");
    assert_eq!(edge.pair.user_b(), "bob");
    assert_eq!(edge.label, simgraph_core::SentimentLabel::Positive);
    assert_eq!(plan.edges_retract.len(), 1);
    assert_eq!(plan.edges_retract[0].user_a(), "bob");
}

#[test]
fn plan_from_files_reports_unreadable_input() {
    let err = plan_from_files(&InferOptions {
        posts: PathBuf::from("/nonexistent/posts.json"),
        prior: None,
        threshold: None,
        lexicon: None,
        simulate: false,
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/posts.json"));
}

#[test]
fn plan_from_files_rejects_post_without_author() {
    let posts = fixture("bad-posts.json", r#"[{"id": "p1", "text": "orphan"}]"#);
    let result = plan_from_files(&InferOptions {
        posts,
        prior: None,
        threshold: None,
        lexicon: None,
        simulate: false,
    });
    assert!(result.is_err());
}

#[tokio::test]
async fn simulation_applies_plan_to_memory_graph() {
    let posts = fixture("sim-posts.json", POSTS);
    let plan = plan_from_files(&InferOptions {
        posts,
        prior: None,
        threshold: Some(0.3),
        lexicon: None,
        simulate: true,
    })
    .unwrap();

    let simulation = simulate(plan).await.unwrap();
    assert_eq!(simulation.report.users_upserted, 3);
    assert_eq!(simulation.report.posts_upserted, 3);
    assert_eq!(simulation.report.edges_upserted, 1);
    assert_eq!(simulation.edges.len(), 1);
    assert_eq!(simulation.edges, simulation.plan.edges_upsert);
}
