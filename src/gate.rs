use std::io::{BufRead, Write};

use crate::errors::Result;

/// Outcome of a user checkpoint. Refusal is an ordinary value, not an
/// error; the driver maps it to a non-zero exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Abort,
}

/// Cost-confirmation gate in front of a multi-image run.
///
/// With `item_count` at or below `threshold` the gate passes silently.
/// Above it, the estimated wall-clock cost (one minute per image, the
/// no-GPU assumption) is printed and one line is read; only a trimmed,
/// case-insensitive `y` proceeds. EOF counts as refusal.
pub fn confirm<R: BufRead, W: Write>(
    item_count: usize,
    threshold: usize,
    input: &mut R,
    output: &mut W,
) -> Result<Decision> {
    if item_count <= threshold {
        return Ok(Decision::Proceed);
    }

    write!(
        output,
        "There are multiple images in the folder. This will take approx \
         {item_count} min. to segment without a GPU. Do you want to continue? (y/n): "
    )?;
    output.flush()?;

    if read_affirmative(input)? {
        writeln!(output, "Continuing...")?;
        Ok(Decision::Proceed)
    } else {
        Ok(Decision::Abort)
    }
}

/// Shared y/n convention for every prompt in the pipeline: read one line,
/// trim it, and accept exactly `y` ignoring ASCII case.
pub(crate) fn read_affirmative<R: BufRead>(input: &mut R) -> Result<bool> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(false);
    }
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_gate(item_count: usize, threshold: usize, reply: &str) -> (Decision, String) {
        let mut input = Cursor::new(reply.as_bytes().to_vec());
        let mut output = Vec::new();
        let decision = confirm(item_count, threshold, &mut input, &mut output).unwrap();
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn single_item_passes_without_prompting() {
        let (decision, transcript) = run_gate(1, 1, "");
        assert_eq!(decision, Decision::Proceed);
        assert!(transcript.is_empty());
    }

    #[test]
    fn multi_item_prompt_reports_minutes_estimate() {
        let (decision, transcript) = run_gate(5, 1, "y\n");
        assert_eq!(decision, Decision::Proceed);
        assert!(transcript.contains("approx 5 min."));
        assert!(transcript.contains("Continuing..."));
    }

    #[test]
    fn affirmative_is_case_insensitive_and_trimmed() {
        assert_eq!(run_gate(3, 1, "  Y  \n").0, Decision::Proceed);
        assert_eq!(run_gate(3, 1, "y\n").0, Decision::Proceed);
    }

    #[test]
    fn anything_but_y_refuses() {
        assert_eq!(run_gate(5, 1, "n\n").0, Decision::Abort);
        assert_eq!(run_gate(5, 1, "yes\n").0, Decision::Abort);
        assert_eq!(run_gate(5, 1, "\n").0, Decision::Abort);
        // EOF without a line
        assert_eq!(run_gate(5, 1, "").0, Decision::Abort);
    }

    #[test]
    fn threshold_is_inclusive() {
        let (decision, transcript) = run_gate(3, 3, "");
        assert_eq!(decision, Decision::Proceed);
        assert!(transcript.is_empty());
    }
}
