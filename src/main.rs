use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;

use crate::logger::verbose;

mod codegen;
mod error;
mod fileio;
mod logger;
mod tokenizer;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Compile a single .jack source file
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    file: Option<PathBuf>,

    /// Compile every .jack file in a directory (non-recursive)
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Enable verbose developer logs
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::toggle(cli.verbose);

    if cli.file.is_none() && cli.dir.is_none() {
        eprintln!("nothing to compile: pass a file (-f) or a directory (-d)");
        return ExitCode::from(2);
    }

    let mut inputs = Vec::new();
    if let Some(file) = cli.file {
        inputs.push(file);
    }
    if let Some(dir) = cli.dir {
        match fileio::input::jack_sources(&dir) {
            Ok(sources) => inputs.extend(sources),
            Err(error) => {
                eprintln!("unable to read directory {}: {error}", dir.display());
                return ExitCode::FAILURE;
            }
        }
    }

    for path in inputs {
        if let Err(code) = compile_file(&path) {
            return code;
        }
    }

    ExitCode::SUCCESS
}

/// Compile one source file to its sibling `.vm`. The first failure
/// aborts the run, after its diagnostic has been rendered.
fn compile_file(path: &Path) -> Result<(), ExitCode> {
    verbose!("input:\t{}", path.display());

    let content = fs::read_to_string(path).map_err(|error| {
        eprintln!("unable to read {}: {error}", path.display());
        ExitCode::FAILURE
    })?;

    let vm_text = codegen::compile(content.as_bytes()).map_err(|error| {
        error_report::display(&path.to_string_lossy(), &content, &error);
        ExitCode::FAILURE
    })?;

    let output_path = fileio::output::generate(path, &vm_text).map_err(|error| {
        eprintln!("unable to write output for {}: {error}", path.display());
        ExitCode::FAILURE
    })?;

    verbose!("output:\t{}", output_path.display());

    Ok(())
}

mod error_report {
    use ariadne::{Label, Report, ReportKind, Source};

    use crate::error::CompileError;

    /// Render a compile error as a terminal report pointing at the
    /// offending source line.
    pub fn display(file_path: &str, file_content: &str, error: &CompileError) {
        let span = error
            .line()
            .map_or(0..0, |line| line_span(file_content, line));

        Report::build(ReportKind::Error, file_path, span.start)
            .with_message(error.to_string())
            .with_label(Label::new((file_path, span)).with_message("error occurred here"))
            .finish()
            .eprint((file_path, Source::from(file_content)))
            .expect("error report should be valid");
    }

    /// Byte range of the 1-based `line` within `content`.
    fn line_span(content: &str, line: usize) -> std::ops::Range<usize> {
        let mut start = 0;

        for (nr, text) in content.split_inclusive('\n').enumerate() {
            if nr + 1 == line {
                return start..start + text.trim_end().len();
            }
            start += text.len();
        }

        start..start
    }
}
