//! CLI integration tests
//!
//! Tests for command-line interface parsing.

use clap::Parser;
use reqguard::cli::{Cli, Commands};

#[test]
fn test_version_available() {
    let result = Cli::try_parse_from(["reqguard", "--version"]);
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
}

#[test]
fn test_help_available() {
    let result = Cli::try_parse_from(["reqguard", "--help"]);
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
}

#[test]
fn test_verify_subcommand_parses() {
    let cli = Cli::try_parse_from(["reqguard", "verify", "--json"]).unwrap();
    assert!(matches!(cli.command, Commands::Verify(ref args) if args.json));
}

#[test]
fn test_cleanup_subcommand_parses() {
    let cli = Cli::try_parse_from(["reqguard", "cleanup", "--older-than-secs", "3600"]).unwrap();
    match cli.command {
        Commands::Cleanup(args) => assert_eq!(args.older_than_secs, Some(3600)),
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_anonymize_and_run_subcommands_parse() {
    assert!(Cli::try_parse_from(["reqguard", "anonymize"]).is_ok());
    assert!(Cli::try_parse_from(["reqguard", "run", "--skip-verify"]).is_ok());
}

#[test]
fn test_export_rejects_invalid_timestamp() {
    let result = Cli::try_parse_from([
        "reqguard", "export", "--user", "did:example:1", "--from", "last week",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_unknown_arg_rejected() {
    let result = Cli::try_parse_from(["reqguard", "verify", "--unknown-flag"]);
    assert!(result.is_err());
}
