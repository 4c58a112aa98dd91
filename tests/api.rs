//! Public API: options, cancellation, JSON output, and parallel use.

use bash_cst::{parse, CancellationToken, ErrorKind, NodeKind, ParseOptions, Parser};
use pretty_assertions::assert_eq;

#[test]
fn options_deserialize_with_defaults() {
    let options: ParseOptions = serde_json::from_str(r#"{"max_depth": 16}"#).unwrap();
    assert_eq!(
        options,
        ParseOptions {
            max_depth: 16,
            ..ParseOptions::default()
        }
    );

    let options: ParseOptions = serde_json::from_str(r#"{"max_statements": null}"#).unwrap();
    assert_eq!(options.max_statements, None);
    assert_eq!(options.max_depth, ParseOptions::default().max_depth);
}

#[test]
fn unlimited_statement_budget() {
    let src = "true\n".repeat(50);
    let options = ParseOptions {
        max_statements: None,
        ..ParseOptions::default()
    };
    let tree = Parser::with_options(&src, options).parse();
    assert!(!tree.has_errors());
    let commands = tree
        .root()
        .children
        .iter()
        .filter(|n| n.kind == NodeKind::Command)
        .count();
    assert_eq!(commands, 50);
}

#[test]
fn cancellation_keeps_tree_total() {
    let token = CancellationToken::new();
    let handle = token.clone();
    handle.cancel();
    assert!(token.is_cancelled());

    let src = "echo one\necho two\n";
    let tree = Parser::new(src).with_cancellation(token).parse();
    assert!(tree.was_cancelled());
    assert_eq!(tree.errors().len(), 1);
    assert_eq!(tree.errors()[0].kind, ErrorKind::Cancelled);
    assert_eq!(tree.reconstruct(), src);
}

#[test]
fn uncancelled_token_is_inert() {
    let token = CancellationToken::new();
    let tree = Parser::new("echo ok").with_cancellation(token).parse();
    assert!(!tree.was_cancelled());
    assert!(!tree.has_errors());
}

#[test]
fn parses_run_in_parallel() {
    let scripts: Vec<String> = (0..8)
        .map(|i| format!("for x in {}; do echo $x; done\n", i))
        .collect();
    let expected: Vec<_> = scripts.iter().map(|s| parse(s)).collect();

    let trees: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = scripts
            .iter()
            .map(|s| scope.spawn(move || parse(s)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect()
    });
    assert_eq!(trees, expected);
}

#[test]
fn json_output() {
    let tree = parse("echo \"$x");
    let json: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();

    assert_eq!(json["root"]["kind"], "program");
    assert_eq!(json["root"]["span"]["start"], 0);
    assert_eq!(json["root"]["span"]["end"], 8);

    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "unterminated_construct");
    assert_eq!(errors[0]["span"]["start"], 5);
}

#[test]
fn error_display() {
    let tree = parse("echo ok\n  )");
    let message = tree.errors()[0].to_string();
    assert!(message.starts_with("syntax error at 2:3:"), "{}", message);
}
