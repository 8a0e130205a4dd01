use std::io::{self, BufRead, Write};

use crate::frontend::tree::parse_program;
use crate::session::{Session, SessionError};

const PROMPT: &str = ">> ";

/// Read-eval-print loop over JSON syntax trees, one program per line.
///
/// Errors are reported and the loop continues with the session intact.
pub fn start<R: BufRead, W: Write>(input: R, mut output: W) -> io::Result<()> {
    let mut session = Session::new();
    let mut lines = input.lines();

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            return Ok(());
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let program = match parse_program(&line) {
            Ok(program) => program,
            Err(e) => {
                writeln!(output, "{}", e)?;
                continue;
            }
        };

        match session.eval(&program) {
            Ok(Some(value)) => writeln!(output, "{}", value)?,
            Ok(None) => {}
            Err(SessionError::Compile(e)) => {
                writeln!(output, "compile error: {}", e)?;
                if let Some(hint) = e.hint() {
                    writeln!(output, "  hint: {}", hint)?;
                }
            }
            Err(e @ SessionError::Runtime(_)) => writeln!(output, "{}", e)?,
        }
    }
}
