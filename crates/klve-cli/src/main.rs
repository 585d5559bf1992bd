use std::{env, fs, io, process::ExitCode, time::Instant};

use klve::{LANGS, MaxLimits, RecordConfig, TraceError, record_sync};

const USAGE: &str = "usage: klve <file.js> [--max-steps N] [--max-time MS] [--compact]";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut file_path: Option<String> = None;
    let mut limits = MaxLimits::default();
    let mut compact = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--max-steps" => match iter.next().and_then(|v| v.parse::<usize>().ok()) {
                Some(steps) => limits.steps = Some(steps),
                None => {
                    eprintln!("error: --max-steps expects an integer\n{USAGE}");
                    return ExitCode::FAILURE;
                }
            },
            "--max-time" => match iter.next().and_then(|v| v.parse::<u64>().ok()) {
                Some(ms) => limits.time = Some(ms),
                None => {
                    eprintln!("error: --max-time expects milliseconds\n{USAGE}");
                    return ExitCode::FAILURE;
                }
            },
            "--compact" => compact = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            _ if file_path.is_none() => file_path = Some(arg.clone()),
            other => {
                eprintln!("error: unexpected argument '{other}'\n{USAGE}");
                return ExitCode::FAILURE;
            }
        }
    }

    let Some(file_path) = file_path else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    if let Some(extension) = file_path.rsplit('.').next()
        && !LANGS.contains(&extension)
    {
        eprintln!("warning: '{file_path}' does not look like a JavaScript file ({LANGS:?})");
    }

    let source = match read_file(&file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config = RecordConfig {
        meta: klve::RecordMeta { max: limits },
        options: klve::TraceOptions::default(),
    };

    let start = Instant::now();
    match record_sync(&source, &config) {
        Ok(steps) => {
            let elapsed = start.elapsed();
            let rendered = if compact {
                serde_json::to_string(&steps)
            } else {
                serde_json::to_string_pretty(&steps)
            };
            match rendered {
                Ok(text) => println!("{text}"),
                Err(err) => {
                    eprintln!("error: failed to serialize steps: {err}");
                    return ExitCode::FAILURE;
                }
            }
            eprintln!("{} steps in {elapsed:?}", steps.len());
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &TraceError) {
    eprintln!("{}: {err}", err.kind());
}

fn read_file(path: &str) -> io::Result<String> {
    fs::read_to_string(path)
}
