// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod parser;

use clap::error::ErrorKind;
use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use memtrace::options::AnalyzerOptions;
use memtrace_log::{init_logger, LogEventLevel, LogTarget, LoggerConfig};
use parser::{parse, ParseOptions};
use std::path::PathBuf;
use std::process::ExitCode;

fn cli() -> Command {
    command!()
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("the trace file to parse")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("write every record in human-readable form to this file")
                .value_parser(value_parser!(PathBuf))
                .required(false),
        )
        .arg(
            Arg::new("analyze")
                .long("analyze")
                .action(ArgAction::SetTrue)
                .help("compute throughput statistics (requires --dump-dir)"),
        )
        .arg(
            Arg::new("dump-dir")
                .short('d')
                .long("dump-dir")
                .help("directory receiving the statistics reports")
                .value_parser(value_parser!(PathBuf))
                .required(false),
        )
        .arg(
            Arg::new("bucket-width")
                .long("bucket-width")
                .help("width of a throughput bucket, in trace timestamp units")
                .value_parser(value_parser!(u64))
                .default_value("1000000"),
        )
        .arg(
            Arg::new("time-unit")
                .long("time-unit")
                .help("trace timestamp units per reported second")
                .value_parser(value_parser!(u64))
                .default_value("1000000"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .help("trace, debug, info, warn or error")
                .value_parser(|s: &str| s.parse::<LogEventLevel>())
                .default_value("info"),
        )
}

fn parse_options(matches: &ArgMatches) -> anyhow::Result<ParseOptions> {
    let input = matches
        .get_one::<PathBuf>("input")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("--input is required"))?;
    let report_dir = if matches.get_flag("analyze") {
        let dir = matches
            .get_one::<PathBuf>("dump-dir")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("--analyze needs a report directory (--dump-dir)"))?;
        Some(dir)
    } else {
        None
    };
    let defaults = AnalyzerOptions::default();
    Ok(ParseOptions {
        input,
        output: matches.get_one::<PathBuf>("output").cloned(),
        report_dir,
        analyzer: AnalyzerOptions {
            bucket_width: matches
                .get_one::<u64>("bucket-width")
                .copied()
                .unwrap_or(defaults.bucket_width),
            time_unit: matches
                .get_one::<u64>("time-unit")
                .copied()
                .unwrap_or(defaults.time_unit),
        },
    })
}

fn main() -> ExitCode {
    let matches = match cli().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let level = matches
        .get_one::<LogEventLevel>("log-level")
        .copied()
        .unwrap_or_default();
    let _log_guard = match init_logger(&LoggerConfig {
        level,
        target: LogTarget::Stderr,
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {e}");
            None
        }
    };

    let options = match parse_options(&matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match parse(&options, &mut std::io::stdout().lock()) {
        Ok(summary) => {
            if let Some(e) = summary.stopped_early {
                eprintln!(
                    "warning: {}: trace ended early after {} records: {e}",
                    options.input.display(),
                    summary.records
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
